use indexmap::IndexMap;
use std::sync::Arc;
use std::time::Duration;

use super::name_matcher::{normalize, NameMatcher};
use crate::error::Result;
use crate::models::{ConfirmedOwner, NameCandidate, OwnerRecord, PropertyRecord, Warning};
use crate::source::{bounded, RegistryLookup};

const TIE_EPSILON: f64 = 1e-9;

/// 业主确认结果
#[derive(Debug, Clone, Default)]
pub struct OwnerResolution {
    pub confirmed: Vec<ConfirmedOwner>,
    pub candidates: Vec<NameCandidate>,
    pub warnings: Vec<Warning>,
}

/// 在物业的业主列表中确认请求里的姓名
pub struct OwnerResolver {
    registry: Arc<dyn RegistryLookup>,
    matcher: NameMatcher,
    timeout: Duration,
}

impl OwnerResolver {
    pub fn new(registry: Arc<dyn RegistryLookup>, matcher: NameMatcher, timeout: Duration) -> Self {
        Self {
            registry,
            matcher,
            timeout,
        }
    }

    pub async fn resolve(&self, property: &PropertyRecord, requested_names: &[String]) -> Result<OwnerResolution> {
        let owners = bounded(
            "registry",
            "find_owners",
            self.timeout,
            self.registry.find_owners(&property.property_id),
        )
        .await?;

        Ok(match_owners(&self.matcher, property, &owners, requested_names))
    }
}

/// 纯匹配逻辑
///
/// 每个请求姓名取得分最高的业主 (并列时全部保留并标记低置信);
/// 多个姓名命中同一业主时只保留分数最高的关联, 其余姓名降级为未匹配。
pub fn match_owners(
    matcher: &NameMatcher,
    property: &PropertyRecord,
    owners: &[OwnerRecord],
    requested_names: &[String],
) -> OwnerResolution {
    let property_id = &property.property_id;
    let mut out = OwnerResolution::default();
    // (姓名下标, 业主下标, 分数)
    let mut associations: Vec<(usize, usize, f64)> = Vec::new();

    let owners: Vec<&OwnerRecord> = owners.iter().filter(|o| &o.property_id == property_id).collect();

    for (ni, name) in requested_names.iter().enumerate() {
        if normalize(name).is_empty() {
            tracing::debug!("物业 {} 跳过空姓名 '{}'", property_id, name);
            continue;
        }

        let scores: Vec<f64> = owners.iter().map(|o| matcher.score(name, &o.name)).collect();
        let best = scores.iter().copied().fold(None, |acc: Option<f64>, s| match acc {
            Some(b) if b >= s => Some(b),
            _ => Some(s),
        });

        match best {
            Some(best) if matcher.is_match(best) => {
                let tied: Vec<usize> = scores
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| (best - **s).abs() < TIE_EPSILON)
                    .map(|(oi, _)| oi)
                    .collect();
                if tied.len() > 1 {
                    out.warnings.push(Warning::OwnerMatchAmbiguous {
                        property_id: property_id.clone(),
                        name: name.clone(),
                        candidates: tied.len(),
                    });
                }
                associations.extend(tied.into_iter().map(|oi| (ni, oi, best)));
            }
            _ => {
                let mut below: Vec<NameCandidate> = owners
                    .iter()
                    .zip(&scores)
                    .map(|(o, s)| candidate(property_id, name, o, *s))
                    .collect();
                below.sort_by(|a, b| b.score.total_cmp(&a.score));
                out.candidates.extend(below);
                out.warnings.push(Warning::OwnerNameUnmatched {
                    property_id: property_id.clone(),
                    name: name.clone(),
                    best_score: best,
                });
            }
        }
    }

    // 分数高者优先认领业主, 同分按请求顺序
    associations.sort_by(|a, b| b.2.total_cmp(&a.2));
    let mut claimed: IndexMap<usize, usize> = IndexMap::new();
    let mut kept: Vec<(usize, usize, f64)> = Vec::new();

    for (ni, oi, score) in associations {
        match claimed.get(&oi) {
            None => {
                claimed.insert(oi, ni);
                kept.push((ni, oi, score));
            }
            Some(&winner) if winner == ni => {}
            Some(&winner) => {
                let owner = owners[oi];
                out.warnings.push(Warning::OwnerNameDemoted {
                    property_id: property_id.clone(),
                    name: requested_names[ni].clone(),
                    owner_name: owner.name.clone(),
                    kept_name: requested_names[winner].clone(),
                });
                out.candidates
                    .push(candidate(property_id, &requested_names[ni], owner, score));
            }
        }
    }

    kept.sort_by_key(|(ni, oi, _)| (*ni, *oi));
    for (ni, oi, score) in kept {
        let owner = owners[oi];
        if owner.historical {
            out.warnings.push(Warning::HistoricalOwner {
                property_id: property_id.clone(),
                owner_name: owner.name.clone(),
            });
        }
        out.confirmed.push(ConfirmedOwner {
            owner: owner.clone(),
            requested_name: requested_names[ni].clone(),
            score,
        });
    }

    if out.confirmed.is_empty() {
        out.warnings.push(Warning::NoOwnersMatched {
            property_id: property_id.clone(),
        });
    }

    out
}

fn candidate(property_id: &str, requested: &str, owner: &OwnerRecord, score: f64) -> NameCandidate {
    NameCandidate {
        property_id: property_id.to_string(),
        requested_name: requested.to_string(),
        candidate_name: owner.name.clone(),
        owner_id: owner.owner_id.clone(),
        score,
    }
}
