use async_trait::async_trait;
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{ArchiveLookup, CaseSystem, RegistryLookup};
use crate::error::{ReconError, Result};
use crate::models::{
    AdjustmentReport, CaseRef, DebtItem, OwnerRecord, ParsedAddress, PropertyRecord, RequestMetadata, TaxAdjustment,
    TaxItem,
};

/// 登记系统快照
///
/// 外层机器人把界面上读到的行导出成 JSON, 这里按登记系统的搜索方式回放:
/// 地址按 "街道 门牌号" 前缀检索, 因此可能带出相邻门牌, 由 AddressResolver 再筛。
/// 税费查询不按年度过滤, 与源系统一样返回该物业下所有可见行。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistrySnapshot {
    pub properties: Vec<PropertyRecord>,
    pub owners: Vec<OwnerRecord>,
    pub debt: Vec<DebtItem>,
    pub tax: Vec<TaxItem>,
}

impl RegistrySnapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ReconError::Snapshot(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ReconError::Snapshot(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }
}

#[async_trait]
impl RegistryLookup for RegistrySnapshot {
    async fn find_properties_by_address(&self, address: &str) -> Result<Vec<PropertyRecord>> {
        let needle = match ParsedAddress::parse_lenient(address) {
            Some(p) => format!("{} {}", p.street, p.number).to_lowercase(),
            None => address.trim().to_lowercase(),
        };
        Ok(self
            .properties
            .iter()
            .filter(|p| p.address.to_lowercase().starts_with(&needle))
            .cloned()
            .collect())
    }

    async fn find_owners(&self, property_id: &str) -> Result<Vec<OwnerRecord>> {
        Ok(self
            .owners
            .iter()
            .filter(|o| o.property_id == property_id)
            .cloned()
            .collect())
    }

    async fn find_debt(&self, property_id: &str) -> Result<Vec<DebtItem>> {
        Ok(self
            .debt
            .iter()
            .filter(|d| d.property_id == property_id)
            .cloned()
            .collect())
    }

    async fn find_tax(&self, property_id: &str, _year: i32) -> Result<Vec<TaxItem>> {
        Ok(self
            .tax
            .iter()
            .filter(|t| t.property_id == property_id)
            .cloned()
            .collect())
    }
}

/// 内存档案
#[derive(Debug, Clone, Default)]
pub struct InMemoryArchive {
    adjustments: Vec<TaxAdjustment>,
}

impl InMemoryArchive {
    pub fn new(adjustments: Vec<TaxAdjustment>) -> Self {
        Self { adjustments }
    }

    /// 由变更报告构建 (每份报告展开为按物业的调整)
    pub fn from_reports(reports: &[AdjustmentReport]) -> Self {
        Self::new(reports.iter().flat_map(|r| r.adjustments()).collect())
    }
}

#[async_trait]
impl ArchiveLookup for InMemoryArchive {
    async fn find_adjustments(&self, property_id: &str) -> Result<Vec<TaxAdjustment>> {
        let mut found: Vec<TaxAdjustment> = self
            .adjustments
            .iter()
            .filter(|a| a.property_id == property_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.adjustment_date.cmp(&b.adjustment_date));
        Ok(found)
    }
}

#[derive(Debug, Default)]
struct CaseRegister {
    cases: Vec<(String, CaseRef)>,
    next_seq: u64,
}

/// 内存案件系统, 可模拟查询延迟
#[derive(Debug, Default)]
pub struct InMemoryCaseSystem {
    register: Mutex<CaseRegister>,
    latency: Duration,
}

impl InMemoryCaseSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// 预置已有案件 (周期标记, 案件)
    pub async fn seed(&self, cycle_marker: &str, case: CaseRef) {
        self.register
            .lock()
            .await
            .cases
            .push((cycle_marker.to_string(), case));
    }

    pub async fn created_count(&self) -> u64 {
        self.register.lock().await.next_seq
    }
}

#[async_trait]
impl CaseSystem for InMemoryCaseSystem {
    async fn find_existing_cases(&self, property_id: &str, cycle_marker: &str) -> Result<Vec<CaseRef>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let register = self.register.lock().await;
        Ok(register
            .cases
            .iter()
            .filter(|(marker, c)| marker == cycle_marker && c.property_id == property_id)
            .map(|(_, c)| c.clone())
            .collect())
    }

    async fn create_case(&self, property_id: &str, metadata: &RequestMetadata) -> Result<CaseRef> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let mut register = self.register.lock().await;
        register.next_seq += 1;
        let now = Utc::now();
        let case = CaseRef {
            case_id: format!("GEO-{}-{:06}", now.year(), register.next_seq),
            property_id: property_id.to_string(),
            created_date: now,
        };
        register.cases.push((metadata.cycle_marker.clone(), case.clone()));
        Ok(case)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "properties": [
            {"propertyId": "P1", "address": "Hovedgaden 10, 1. tv, 8000 Aarhus C"},
            {"propertyId": "P3", "address": "Hovedgaden 100, 8000 Aarhus C"},
            {"propertyId": "P4", "address": "Søndergade 3, 8000 Aarhus C"}
        ],
        "owners": [{"ownerId": "O1", "name": "Jensen, Anna", "propertyId": "P1"}]
    }"#;

    #[tokio::test]
    async fn snapshot_search_behaves_like_prefix_search() {
        let snapshot = RegistrySnapshot::from_json(SNAPSHOT).unwrap();
        let found = snapshot
            .find_properties_by_address("Hovedgaden 10, 8000 Aarhus C")
            .await
            .unwrap();
        let ids: Vec<_> = found.iter().map(|p| p.property_id.as_str()).collect();
        assert_eq!(ids, vec!["P1", "P3"]);
        assert_eq!(snapshot.find_owners("P1").await.unwrap().len(), 1);
        assert!(snapshot.find_debt("P1").await.unwrap().is_empty());
    }

    #[test]
    fn snapshot_rejects_malformed_json() {
        assert!(matches!(
            RegistrySnapshot::from_json("{not json"),
            Err(ReconError::Snapshot(_))
        ));
    }

    #[tokio::test]
    async fn case_system_scopes_lookup_by_cycle() {
        let cases = InMemoryCaseSystem::new();
        let meta = RequestMetadata {
            correlation_id: "c1".into(),
            cycle_marker: "c1".into(),
            title: "Hovedgaden 10".into(),
        };
        let created = cases.create_case("P1", &meta).await.unwrap();
        assert!(created.case_id.starts_with("GEO-"));
        assert_eq!(cases.find_existing_cases("P1", "c1").await.unwrap(), vec![created]);
        assert!(cases.find_existing_cases("P1", "c2").await.unwrap().is_empty());
        assert_eq!(cases.created_count().await, 1);
    }

    #[tokio::test]
    async fn archive_expands_reports_per_property() {
        use crate::models::AdjustmentLine;
        use bigdecimal::BigDecimal;
        use chrono::NaiveDate;
        use std::str::FromStr;

        let report = |doc: &str, day: u32| AdjustmentReport {
            document_id: doc.into(),
            report_date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            tax_year: Some(2026),
            lines: vec![
                AdjustmentLine { property_id: "P1".into(), amount: BigDecimal::from_str("-120.50").unwrap() },
                AdjustmentLine { property_id: "P2".into(), amount: BigDecimal::from_str("80").unwrap() },
            ],
        };
        let archive = InMemoryArchive::from_reports(&[report("D2", 20), report("D1", 5)]);
        let found = archive.find_adjustments("P1").await.unwrap();
        let docs: Vec<_> = found.iter().map(|a| a.document_id.as_str()).collect();
        assert_eq!(docs, vec!["D1", "D2"]);
        assert!(archive.find_adjustments("P9").await.unwrap().is_empty());
    }
}
