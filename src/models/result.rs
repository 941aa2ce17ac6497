use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{CaseRef, DebtItem, OwnerRecord, PropertyRecord, Request, TaxAdjustment, TaxItem};

/// 已确认业主 (附带匹配分数)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedOwner {
    pub owner: OwnerRecord,
    pub requested_name: String,
    pub score: f64,
}

/// 未达阈值的候选, 交由人工复核
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameCandidate {
    pub property_id: String,
    pub requested_name: String,
    pub candidate_name: String,
    pub owner_id: String,
    pub score: f64,
}

/// 非致命告警: 数据缺失 / 歧义 / 幂等冲突
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    AddressNotFound { address: String },
    AddressUnparsed { address: String },
    MultipleProperties { address: String, count: usize },
    WithdrawnExcluded { count: usize },
    OutsideAddressExcluded { count: usize },
    NoOwnersMatched { property_id: String },
    OwnerNameUnmatched { property_id: String, name: String, best_score: Option<f64> },
    OwnerNameDemoted { property_id: String, name: String, owner_name: String, kept_name: String },
    OwnerMatchAmbiguous { property_id: String, name: String, candidates: usize },
    HistoricalOwner { property_id: String, owner_name: String },
    DebtSuppressed { property_id: String, count: usize, days: i64 },
    DebtOtherOwnersExcluded { property_id: String, count: usize },
    TaxYearMissing { property_id: String, year: i32 },
    TaxWithoutYear { property_id: String, count: usize },
    DuplicateCases { property_id: String, count: usize, chosen: String },
    NoCase,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddressNotFound { address } => write!(f, "address not found: {address}"),
            Self::AddressUnparsed { address } => {
                write!(f, "address could not be parsed, registry results kept unverified: {address}")
            }
            Self::MultipleProperties { address, count } => {
                write!(f, "multiple properties ({count}) at one address: {address}")
            }
            Self::WithdrawnExcluded { count } => {
                write!(f, "{count} withdrawn/retired propert(y/ies) excluded")
            }
            Self::OutsideAddressExcluded { count } => {
                write!(f, "{count} registry row(s) outside the requested address excluded")
            }
            Self::NoOwnersMatched { property_id } => {
                write!(f, "property {property_id}: no requested owner matched")
            }
            Self::OwnerNameUnmatched { property_id, name, best_score } => match best_score {
                Some(score) => write!(
                    f,
                    "property {property_id}: '{name}' unmatched (best score {score:.2})"
                ),
                None => write!(f, "property {property_id}: '{name}' unmatched (no owners listed)"),
            },
            Self::OwnerNameDemoted { property_id, name, owner_name, kept_name } => write!(
                f,
                "property {property_id}: '{name}' also matched '{owner_name}', kept for '{kept_name}'"
            ),
            Self::OwnerMatchAmbiguous { property_id, name, candidates } => write!(
                f,
                "property {property_id}: '{name}' ties between {candidates} owners, low confidence"
            ),
            Self::HistoricalOwner { property_id, owner_name } => {
                write!(f, "property {property_id}: '{owner_name}' is a historical owner")
            }
            Self::DebtSuppressed { property_id, count, days } => write!(
                f,
                "property {property_id}: {count} debt item(s) sent to collection within {days} days suppressed"
            ),
            Self::DebtOtherOwnersExcluded { property_id, count } => write!(
                f,
                "property {property_id}: {count} debt item(s) of other owners excluded"
            ),
            Self::TaxYearMissing { property_id, year } => {
                write!(f, "property {property_id}: no tax data for {year}")
            }
            Self::TaxWithoutYear { property_id, count } => write!(
                f,
                "property {property_id}: {count} tax item(s) without assessment year ignored"
            ),
            Self::DuplicateCases { property_id, count, chosen } => write!(
                f,
                "property {property_id}: {count} existing cases for this cycle, using earliest {chosen}"
            ),
            Self::NoCase => write!(f, "no property resolved, no case created"),
        }
    }
}

/// 对账结果 (一个请求一个结果, 必须经人工复核)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    pub request: Request,
    pub matched_properties: Vec<PropertyRecord>,
    pub confirmed_owners: Vec<ConfirmedOwner>,
    pub owner_candidates: Vec<NameCandidate>,
    pub debt: Vec<DebtItem>,
    pub suppressed_debt_count: usize,
    pub debt_total: BigDecimal,
    pub tax: Vec<TaxItem>,
    pub tax_total: BigDecimal,
    pub adjustments: Vec<TaxAdjustment>,
    pub cases: Vec<CaseRef>,
    pub warnings: Vec<String>,
    pub processed_at: DateTime<Utc>,
}

impl ReconciliationResult {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            matched_properties: Vec::new(),
            confirmed_owners: Vec::new(),
            owner_candidates: Vec::new(),
            debt: Vec::new(),
            suppressed_debt_count: 0,
            debt_total: BigDecimal::zero(),
            tax: Vec::new(),
            tax_total: BigDecimal::zero(),
            adjustments: Vec::new(),
            cases: Vec::new(),
            warnings: Vec::new(),
            processed_at: Utc::now(),
        }
    }

    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("[{}] {}", self.request.correlation_id, warning);
        self.warnings.push(warning.to_string());
    }

    pub fn extend_warnings(&mut self, warnings: impl IntoIterator<Item = Warning>) {
        for w in warnings {
            self.warn(w);
        }
    }

    pub fn case_for(&self, property_id: &str) -> Option<&CaseRef> {
        self.cases.iter().find(|c| c.property_id == property_id)
    }
}
