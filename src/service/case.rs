use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::{CaseRef, RequestMetadata, Warning};
use crate::source::{bounded, CaseSystem};

/// 案件解析结果
#[derive(Debug, Clone)]
pub struct CaseResolution {
    pub case: CaseRef,
    pub created: bool,
    pub warnings: Vec<Warning>,
}

/// 先查后建, 保证同一 (propertyId, 周期标记) 只有一个案件
///
/// 并发请求共享同一个 resolver; 查找与创建之间按键加锁 (single-flight),
/// 后到的调用等待前者完成后再查, 必然看到前者建好的案件。
pub struct CaseResolver {
    cases: Arc<dyn CaseSystem>,
    timeout: Duration,
    in_flight: DashMap<(String, String), Arc<Mutex<()>>>,
}

impl CaseResolver {
    pub fn new(cases: Arc<dyn CaseSystem>, timeout: Duration) -> Self {
        Self {
            cases,
            timeout,
            in_flight: DashMap::new(),
        }
    }

    pub async fn resolve_or_create(&self, property_id: &str, metadata: &RequestMetadata) -> Result<CaseResolution> {
        let key = (property_id.to_string(), metadata.cycle_marker.clone());
        let gate = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let outcome = {
            let _guard = gate.lock().await;
            self.lookup_then_create(property_id, metadata).await
        };

        // 没有其他等待者时清理锁
        drop(gate);
        self.in_flight.remove_if(&key, |_, g| Arc::strong_count(g) == 1);

        outcome
    }

    async fn lookup_then_create(&self, property_id: &str, metadata: &RequestMetadata) -> Result<CaseResolution> {
        let mut existing = bounded(
            "case system",
            "find_existing_cases",
            self.timeout,
            self.cases.find_existing_cases(property_id, &metadata.cycle_marker),
        )
        .await?;

        existing.sort_by(|a, b| {
            a.created_date
                .cmp(&b.created_date)
                .then_with(|| a.case_id.cmp(&b.case_id))
        });

        let mut warnings = Vec::new();
        let count = existing.len();
        let Some(earliest) = existing.into_iter().next() else {
            let case = bounded(
                "case system",
                "create_case",
                self.timeout,
                self.cases.create_case(property_id, metadata),
            )
            .await?;
            tracing::info!(
                "[{}] 物业 {} 新建案件 {}",
                metadata.correlation_id, property_id, case.case_id
            );
            return Ok(CaseResolution {
                case,
                created: true,
                warnings,
            });
        };

        if count > 1 {
            warnings.push(Warning::DuplicateCases {
                property_id: property_id.to_string(),
                count,
                chosen: earliest.case_id.clone(),
            });
        }
        tracing::info!(
            "[{}] 物业 {} 复用已有案件 {}",
            metadata.correlation_id, property_id, earliest.case_id
        );
        Ok(CaseResolution {
            case: earliest,
            created: false,
            warnings,
        })
    }

    /// 当前持有的锁数量
    pub fn in_flight_keys(&self) -> usize {
        self.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryCaseSystem;
    use chrono::{TimeZone, Utc};

    fn meta(cycle: &str) -> RequestMetadata {
        RequestMetadata {
            correlation_id: "req-1".into(),
            cycle_marker: cycle.into(),
            title: "Hovedgaden 10".into(),
        }
    }

    #[tokio::test]
    async fn second_call_returns_same_case() {
        let system = Arc::new(InMemoryCaseSystem::new());
        let resolver = CaseResolver::new(system.clone(), Duration::from_secs(1));

        let first = resolver.resolve_or_create("P1", &meta("c1")).await.unwrap();
        let second = resolver.resolve_or_create("P1", &meta("c1")).await.unwrap();
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.case, second.case);
        assert_eq!(system.created_count().await, 1);
        assert_eq!(resolver.in_flight_keys(), 0);
    }

    #[tokio::test]
    async fn different_cycles_get_different_cases() {
        let system = Arc::new(InMemoryCaseSystem::new());
        let resolver = CaseResolver::new(system.clone(), Duration::from_secs(1));
        let a = resolver.resolve_or_create("P1", &meta("c1")).await.unwrap();
        let b = resolver.resolve_or_create("P1", &meta("c2")).await.unwrap();
        assert_ne!(a.case.case_id, b.case.case_id);
    }

    #[tokio::test]
    async fn duplicate_cases_pick_earliest() {
        let system = Arc::new(InMemoryCaseSystem::new());
        let late = CaseRef {
            case_id: "GEO-2026-000009".into(),
            property_id: "P1".into(),
            created_date: Utc.with_ymd_and_hms(2026, 9, 2, 8, 0, 0).unwrap(),
        };
        let early = CaseRef {
            case_id: "GEO-2026-000003".into(),
            property_id: "P1".into(),
            created_date: Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap(),
        };
        system.seed("c1", late).await;
        system.seed("c1", early.clone()).await;

        let resolver = CaseResolver::new(system.clone(), Duration::from_secs(1));
        let res = resolver.resolve_or_create("P1", &meta("c1")).await.unwrap();
        assert_eq!(res.case, early);
        assert!(!res.created);
        assert!(matches!(&res.warnings[0], Warning::DuplicateCases { count: 2, .. }));
        assert_eq!(system.created_count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_creation() {
        let system = Arc::new(InMemoryCaseSystem::with_latency(Duration::from_millis(20)));
        let resolver = Arc::new(CaseResolver::new(system.clone(), Duration::from_secs(5)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let resolver = resolver.clone();
                tokio::spawn(async move { resolver.resolve_or_create("P1", &meta("c1")).await })
            })
            .collect();

        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap().unwrap().case.case_id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(system.created_count().await, 1);
    }

    #[tokio::test]
    async fn slow_case_system_times_out() {
        let system = Arc::new(InMemoryCaseSystem::with_latency(Duration::from_millis(200)));
        let resolver = CaseResolver::new(system, Duration::from_millis(10));
        let err = resolver.resolve_or_create("P1", &meta("c1")).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(resolver.in_flight_keys(), 0);
    }
}
