use chrono::{Datelike, Local, NaiveDate};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::address::AddressResolver;
use super::case::CaseResolver;
use super::debt::{self, DebtAggregator};
use super::name_matcher::NameMatcher;
use super::owner::OwnerResolver;
use super::tax::{join_adjustments, TaxAggregator};
use crate::config::AppConfig;
use crate::error::Result;
use crate::models::{ReconciliationResult, Request, RequestMetadata, Warning};
use crate::source::{bounded, ArchiveLookup, CaseSystem, RegistryLookup, ResultSink};

/// 流水线阶段 (严格顺序, 不回退)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ReceiveRequest,
    ResolveAddress,
    ResolveOwners,
    AggregateDebt,
    AggregateTax,
    JoinAdjustments,
    ResolveCase,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 流水线参数
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub name_threshold: f64,
    pub suppression_days: i64,
    pub collaborator_timeout: Duration,
    pub assessment_year: Option<i32>,
    pub cycle_marker: Option<String>,
    pub max_concurrent_requests: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            name_threshold: config.matching.name_threshold,
            suppression_days: config.debt.suppression_days,
            collaborator_timeout: config.pipeline.collaborator_timeout(),
            assessment_year: config.pipeline.assessment_year,
            cycle_marker: config.pipeline.cycle_marker.clone(),
            max_concurrent_requests: config.pipeline.max_concurrent_requests.max(1),
        }
    }
}

/// 对账流水线
///
/// 一个请求一个结果。数据缺失/歧义只产生告警, 结果总会走到 Publish;
/// 只有外部系统不可用 (超时、连不上) 才中止该请求, 由外层重试。
pub struct ReconciliationPipeline {
    registry: Arc<dyn RegistryLookup>,
    archive: Arc<dyn ArchiveLookup>,
    sinks: Vec<Arc<dyn ResultSink>>,
    address_resolver: AddressResolver,
    owner_resolver: OwnerResolver,
    debt_aggregator: DebtAggregator,
    tax_aggregator: TaxAggregator,
    case_resolver: CaseResolver,
    settings: PipelineSettings,
}

impl ReconciliationPipeline {
    pub fn new(
        registry: Arc<dyn RegistryLookup>,
        archive: Arc<dyn ArchiveLookup>,
        cases: Arc<dyn CaseSystem>,
        settings: PipelineSettings,
    ) -> Self {
        let timeout = settings.collaborator_timeout;
        Self {
            address_resolver: AddressResolver::new(registry.clone(), timeout),
            owner_resolver: OwnerResolver::new(registry.clone(), NameMatcher::new(settings.name_threshold), timeout),
            debt_aggregator: DebtAggregator::new(settings.suppression_days),
            tax_aggregator: TaxAggregator,
            case_resolver: CaseResolver::new(cases, timeout),
            registry,
            archive,
            sinks: Vec::new(),
            settings,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// 处理单个请求 (以本地日期为处理时间)
    pub async fn reconcile(&self, request: Request) -> Result<ReconciliationResult> {
        self.reconcile_on(request, Local::now().date_naive()).await
    }

    /// 处理单个请求, 指定处理日期
    pub async fn reconcile_on(&self, request: Request, today: NaiveDate) -> Result<ReconciliationResult> {
        let cid = request.correlation_id.clone();
        let outcome = self.run_stages(request, today).await;
        if let Err(e) = &outcome {
            tracing::error!("[{}] 请求中止: {}", cid, e);
        }
        outcome
    }

    async fn run_stages(&self, request: Request, today: NaiveDate) -> Result<ReconciliationResult> {
        let cid = request.correlation_id.clone();
        let timeout = self.settings.collaborator_timeout;
        let current_year = self.settings.assessment_year.unwrap_or_else(|| today.year());

        // ReceiveRequest
        log_stage(&cid, Stage::ReceiveRequest);
        let mut result = ReconciliationResult::new(request);

        // ResolveAddress
        log_stage(&cid, Stage::ResolveAddress);
        let resolution = self.address_resolver.resolve(&result.request.address).await?;
        result.extend_warnings(resolution.warnings);
        let properties = resolution.properties;
        result.matched_properties = properties.clone();
        tracing::info!("[{}] 命中物业 {} 个", cid, properties.len());

        // ResolveOwners
        log_stage(&cid, Stage::ResolveOwners);
        for property in &properties {
            let owners = self
                .owner_resolver
                .resolve(property, &result.request.owner_names)
                .await?;
            result.extend_warnings(owners.warnings);
            result.confirmed_owners.extend(owners.confirmed);
            result.owner_candidates.extend(owners.candidates);
        }

        // AggregateDebt
        log_stage(&cid, Stage::AggregateDebt);
        for property in &properties {
            let owner_ids: HashSet<String> = result
                .confirmed_owners
                .iter()
                .filter(|c| c.owner.property_id == property.property_id)
                .map(|c| c.owner.owner_id.clone())
                .collect();
            let raw = bounded(
                "registry",
                "find_debt",
                timeout,
                self.registry.find_debt(&property.property_id),
            )
            .await?;
            let raw = DebtAggregator::merge_line_items(raw);
            let debt = self
                .debt_aggregator
                .aggregate(&property.property_id, &owner_ids, raw, today);
            result.suppressed_debt_count += debt.suppressed;
            result.extend_warnings(debt.warnings);
            result.debt.extend(debt.items);
        }
        result.debt_total = debt::total(&result.debt);

        // AggregateTax
        log_stage(&cid, Stage::AggregateTax);
        for property in &properties {
            let raw = bounded(
                "registry",
                "find_tax",
                timeout,
                self.registry.find_tax(&property.property_id, current_year),
            )
            .await?;
            let tax = self
                .tax_aggregator
                .aggregate(&property.property_id, current_year, raw);
            result.tax_total = &result.tax_total + &tax.total;
            result.extend_warnings(tax.warnings);
            result.tax.extend(tax.items);
        }

        // JoinAdjustments
        log_stage(&cid, Stage::JoinAdjustments);
        for property in &properties {
            let raw = bounded(
                "archive",
                "find_adjustments",
                timeout,
                self.archive.find_adjustments(&property.property_id),
            )
            .await?;
            result
                .adjustments
                .extend(join_adjustments(&property.property_id, raw));
        }

        // ResolveCase
        log_stage(&cid, Stage::ResolveCase);
        if properties.is_empty() {
            result.warn(Warning::NoCase);
        }
        for property in &properties {
            let metadata = RequestMetadata::for_request(
                &result.request,
                self.settings.cycle_marker.as_deref(),
                format!("Ejendomsoplysning: {} ({})", property.address, property.property_id),
            );
            let case = self
                .case_resolver
                .resolve_or_create(&property.property_id, &metadata)
                .await?;
            result.extend_warnings(case.warnings);
            result.cases.push(case.case);
        }

        // Publish
        log_stage(&cid, Stage::Publish);
        for sink in &self.sinks {
            sink.publish(&result).await?;
            tracing::debug!("[{}] 已发布到 {}", cid, sink.name());
        }

        tracing::info!(
            "[{}] 对账完成: 物业 {}, 业主 {}, 债务 {} (隐藏 {}), 税费 {}, 调整 {}, 告警 {}",
            cid,
            result.matched_properties.len(),
            result.confirmed_owners.len(),
            result.debt.len(),
            result.suppressed_debt_count,
            result.tax.len(),
            result.adjustments.len(),
            result.warnings.len()
        );
        Ok(result)
    }

    /// 批量处理, 请求之间互不影响 (单个失败不拖累其他请求)
    pub async fn reconcile_batch(&self, requests: Vec<Request>) -> Vec<Result<ReconciliationResult>> {
        let total = requests.len();
        tracing::info!("批量对账开始: {} 个请求, 并发 {}", total, self.settings.max_concurrent_requests);

        let results: Vec<_> = stream::iter(requests)
            .map(|request| self.reconcile(request))
            .buffered(self.settings.max_concurrent_requests)
            .collect()
            .await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        tracing::info!("批量对账完成: 成功 {}, 失败 {}", total - failed, failed);
        results
    }
}

fn log_stage(correlation_id: &str, stage: Stage) {
    tracing::info!("[{}] 阶段 {}", correlation_id, stage);
}
