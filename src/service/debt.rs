use bigdecimal::{BigDecimal, Zero};
use chrono::NaiveDate;
use indexmap::map::Entry;
use indexmap::IndexMap;
use std::collections::HashSet;

use crate::models::{DebtItem, DebtStatus, Warning};

/// 催收系统 (按案件拆行)
pub const COLLECTION_SOURCE: &str = "sap";

/// 债务汇总结果
#[derive(Debug, Clone, Default)]
pub struct DebtAggregation {
    pub items: Vec<DebtItem>,
    /// 最近移交催收而被隐藏的条数
    pub suppressed: usize,
    /// 去重合并掉的条数
    pub duplicates: usize,
    pub warnings: Vec<Warning>,
}

/// 债务去重 + 时间窗隐藏
#[derive(Debug, Clone, Copy)]
pub struct DebtAggregator {
    suppression_days: i64,
}

impl Default for DebtAggregator {
    fn default() -> Self {
        Self { suppression_days: 3 }
    }
}

impl DebtAggregator {
    pub fn new(suppression_days: i64) -> Self {
        Self {
            suppression_days: suppression_days.max(0),
        }
    }

    /// 催收系统中同一业主、同一描述与状态的明细金额相加
    /// (同一催收案件常拆成多行同名记录); 其他来源原样保留, 交给去重处理
    pub fn merge_line_items(raw: Vec<DebtItem>) -> Vec<DebtItem> {
        let mut merged: Vec<DebtItem> = Vec::with_capacity(raw.len());
        for item in raw {
            if item.source_system != COLLECTION_SOURCE || item.description.is_empty() {
                merged.push(item);
                continue;
            }
            let existing = merged.iter_mut().find(|m| {
                m.source_system == item.source_system
                    && m.property_id == item.property_id
                    && m.owner_id == item.owner_id
                    && m.description == item.description
                    && m.status == item.status
                    && m.case_reference_date == item.case_reference_date
            });
            match existing {
                Some(m) => m.amount = &m.amount + &item.amount,
                None => merged.push(item),
            }
        }
        merged
    }

    /// 汇总某物业的债务
    ///
    /// `owner_ids` 为空时不按业主过滤 (业主未确认时仍展示物业整体债务)。
    /// 去重键相同的明细只保留一条, 状态取推进最远者:
    /// SentToCollection > Frozen > Released。
    pub fn aggregate(
        &self,
        property_id: &str,
        owner_ids: &HashSet<String>,
        raw: Vec<DebtItem>,
        today: NaiveDate,
    ) -> DebtAggregation {
        let mut out = DebtAggregation::default();
        let mut groups: IndexMap<_, DebtItem> = IndexMap::new();
        let mut other_owners = 0usize;

        for item in raw {
            if item.property_id != property_id {
                tracing::debug!("债务 {:?} 不属于物业 {}, 忽略", item.description, property_id);
                continue;
            }
            if !owner_ids.is_empty() {
                if let Some(owner) = &item.owner_id {
                    if !owner_ids.contains(owner) {
                        other_owners += 1;
                        continue;
                    }
                }
            }

            match groups.entry(item.dedup_key()) {
                Entry::Occupied(mut e) => {
                    out.duplicates += 1;
                    // 状态相同时取状态日期最新者, 结果与输入顺序无关
                    let current = e.get();
                    if (item.status, item.status_date) > (current.status, current.status_date) {
                        e.insert(item);
                    }
                }
                Entry::Vacant(e) => {
                    e.insert(item);
                }
            }
        }

        let cutoff = today - chrono::Duration::days(self.suppression_days);
        for item in groups.into_values() {
            if is_recently_collected(&item, cutoff) {
                out.suppressed += 1;
            } else {
                out.items.push(item);
            }
        }

        if other_owners > 0 {
            out.warnings.push(Warning::DebtOtherOwnersExcluded {
                property_id: property_id.to_string(),
                count: other_owners,
            });
        }
        if out.suppressed > 0 {
            out.warnings.push(Warning::DebtSuppressed {
                property_id: property_id.to_string(),
                count: out.suppressed,
                days: self.suppression_days,
            });
        }

        tracing::debug!(
            "物业 {} 债务汇总: 保留 {}, 合并重复 {}, 隐藏 {}",
            property_id, out.items.len(), out.duplicates, out.suppressed
        );
        out
    }
}

fn is_recently_collected(item: &DebtItem, cutoff: NaiveDate) -> bool {
    item.status == DebtStatus::SentToCollection && item.status_date.is_some_and(|d| d > cutoff)
}

/// 合计金额
pub fn total(items: &[DebtItem]) -> BigDecimal {
    items.iter().fold(BigDecimal::zero(), |acc, i| acc + &i.amount)
}
