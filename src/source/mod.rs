//! 外部系统接口
//!
//! 登记系统、档案系统、案件系统都由外层机器人通过界面自动化驱动,
//! 这里只描述能力。所有调用都可能很慢, 调用方必须加超时。

pub mod memory;

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::error::{ReconError, Result};
use crate::models::{
    CaseRef, DebtItem, OwnerRecord, PropertyRecord, ReconciliationResult, RequestMetadata,
    TaxAdjustment, TaxItem,
};

pub use memory::{InMemoryArchive, InMemoryCaseSystem, RegistrySnapshot};

/// 不动产登记 / 催收系统查询
#[async_trait]
pub trait RegistryLookup: Send + Sync {
    async fn find_properties_by_address(&self, address: &str) -> Result<Vec<PropertyRecord>>;

    async fn find_owners(&self, property_id: &str) -> Result<Vec<OwnerRecord>>;

    async fn find_debt(&self, property_id: &str) -> Result<Vec<DebtItem>>;

    async fn find_tax(&self, property_id: &str, year: i32) -> Result<Vec<TaxItem>>;
}

/// 档案系统查询
#[async_trait]
pub trait ArchiveLookup: Send + Sync {
    async fn find_adjustments(&self, property_id: &str) -> Result<Vec<TaxAdjustment>>;
}

/// 案件系统
#[async_trait]
pub trait CaseSystem: Send + Sync {
    /// 按 propertyId + 周期标记查找已有案件 (可能因历史问题返回多条)
    async fn find_existing_cases(&self, property_id: &str, cycle_marker: &str) -> Result<Vec<CaseRef>>;

    async fn create_case(&self, property_id: &str, metadata: &RequestMetadata) -> Result<CaseRef>;
}

/// 结果发布 (邮件正文、附件导出等)
#[async_trait]
pub trait ResultSink: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(&self, result: &ReconciliationResult) -> Result<()>;
}

/// 给外部调用加上限时, 超时视为传输失败
pub async fn bounded<T, F>(
    system: &'static str,
    operation: &'static str,
    timeout: Duration,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let start = std::time::Instant::now();
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => {
            tracing::debug!("{} {} 完成, 耗时: {:?}", system, operation, start.elapsed());
            Ok(value)
        }
        Ok(Err(e)) => {
            tracing::error!("✗ {} {} 失败, 耗时: {:?}, 错误: {}", system, operation, start.elapsed(), e);
            Err(e)
        }
        Err(_) => {
            tracing::error!("✗ {} {} 超时 (>{:?})!", system, operation, timeout);
            Err(ReconError::Timeout {
                system,
                operation,
                timeout,
            })
        }
    }
}
