use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub registry: RegistryConfig,
    pub matching: MatchingConfig,
    pub debt: DebtConfig,
    pub pipeline: PipelineConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    /// 慢查询日志阈值
    pub slow_statement_secs: u64,
}

/// 登记系统快照 (由外层机器人导出的 JSON)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// 姓名匹配阈值
    pub name_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtConfig {
    /// 移交催收后 N 天内的债务不对外展示
    pub suppression_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub collaborator_timeout_secs: u64,
    pub max_concurrent_requests: usize,
    /// 评税年度, 缺省取处理当年
    pub assessment_year: Option<i32>,
    /// 固定周期标记, 缺省取请求 correlation id
    pub cycle_marker: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportConfig {
    pub dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgres://localhost/property_tax_recon".to_string()),
                max_connections: 20,
                acquire_timeout_secs: 10,
                slow_statement_secs: 5,
            },
            registry: RegistryConfig::default(),
            matching: MatchingConfig::default(),
            debt: DebtConfig::default(),
            pipeline: PipelineConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self { name_threshold: 0.6 }
    }
}

impl Default for DebtConfig {
    fn default() -> Self {
        Self { suppression_days: 3 }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            collaborator_timeout_secs: 30,
            max_concurrent_requests: 4,
            assessment_year: None,
            cycle_marker: None,
        }
    }
}

impl PipelineConfig {
    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborator_timeout_secs)
    }
}

impl AppConfig {
    /// 加载配置: 默认值 -> recon.toml (可选) -> RECON__* 环境变量
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let mut loaded: AppConfig = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("recon").required(false))
            .add_source(
                config::Environment::with_prefix("RECON")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            loaded.database.url = url;
        }
        Ok(loaded)
    }
}
