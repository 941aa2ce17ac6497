use serde::{Deserialize, Serialize};

/// 查询请求 (来自自助表单邮件)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub address: String,
    pub owner_names: Vec<String>,
    pub correlation_id: String,
}

impl Request {
    pub fn new(
        address: impl Into<String>,
        owner_names: impl IntoIterator<Item = impl Into<String>>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            owner_names: owner_names.into_iter().map(Into::into).collect(),
            correlation_id: correlation_id.into(),
        }
    }
}

/// 建案元数据 (传给案件系统)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub correlation_id: String,
    pub cycle_marker: String,
    pub title: String,
}

impl RequestMetadata {
    /// 周期标记: 未配置固定值时使用请求的 correlation id
    pub fn for_request(request: &Request, fixed_cycle_marker: Option<&str>, title: String) -> Self {
        Self {
            correlation_id: request.correlation_id.clone(),
            cycle_marker: fixed_cycle_marker
                .map(str::to_string)
                .unwrap_or_else(|| request.correlation_id.clone()),
            title,
        }
    }
}
