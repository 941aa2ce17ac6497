use std::time::Duration;

/// 对账错误
///
/// 数据缺失、歧义、幂等冲突都不是错误, 它们以 `Warning` 形式进入结果。
/// 这里只有会让单个请求中止的失败。
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    #[error("{system} unreachable during {operation}: {reason}")]
    Transport {
        system: &'static str,
        operation: &'static str,
        reason: String,
    },

    #[error("{system} timed out during {operation} after {timeout:?}")]
    Timeout {
        system: &'static str,
        operation: &'static str,
        timeout: Duration,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Registry snapshot error: {0}")]
    Snapshot(String),
}

impl ReconError {
    pub fn transport(system: &'static str, operation: &'static str, reason: impl ToString) -> Self {
        Self::Transport {
            system,
            operation,
            reason: reason.to_string(),
        }
    }

    /// 外部系统不可用 (由外层机器人重试)
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Timeout { .. } | Self::Database(_)
        )
    }
}

pub type Result<T, E = ReconError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_transport_failures() {
        let t = ReconError::transport("registry", "find_owners", "connection reset");
        assert!(t.is_transport());
        assert_eq!(t.to_string(), "registry unreachable during find_owners: connection reset");

        let timeout = ReconError::Timeout {
            system: "case system",
            operation: "create_case",
            timeout: Duration::from_secs(5),
        };
        assert!(timeout.is_transport());

        assert!(!ReconError::Publish("disk full".into()).is_transport());
    }
}
