use bigdecimal::{BigDecimal, Zero};
use indexmap::IndexMap;

use crate::models::{TaxAdjustment, TaxItem, Warning};

/// 税费汇总结果
#[derive(Debug, Clone, Default)]
pub struct TaxAggregation {
    pub items: Vec<TaxItem>,
    /// 当年没有任何税费数据
    pub missing_current_year: bool,
    pub total: BigDecimal,
    pub warnings: Vec<Warning>,
}

/// 当年税费汇总
///
/// 只取评税年度等于当年的明细; 当年没有数据时明确报告缺失,
/// 绝不退而使用往年数据。同一 (propertyId, category) 后出现的覆盖先出现的。
#[derive(Debug, Clone, Copy, Default)]
pub struct TaxAggregator;

impl TaxAggregator {
    pub fn aggregate(&self, property_id: &str, current_year: i32, raw: Vec<TaxItem>) -> TaxAggregation {
        let mut out = TaxAggregation::default();
        let mut by_category: IndexMap<String, TaxItem> = IndexMap::new();
        let mut without_year = 0usize;
        let mut other_years = 0usize;

        for item in raw {
            if item.property_id != property_id {
                continue;
            }
            match item.assessment_year {
                None => without_year += 1,
                Some(year) if year != current_year => other_years += 1,
                Some(_) => {
                    by_category.insert(item.category.clone(), item);
                }
            }
        }

        out.items = by_category.into_values().collect();
        out.total = out.items.iter().fold(BigDecimal::zero(), |acc, i| acc + &i.amount);

        if without_year > 0 {
            out.warnings.push(Warning::TaxWithoutYear {
                property_id: property_id.to_string(),
                count: without_year,
            });
        }
        if out.items.is_empty() {
            out.missing_current_year = true;
            out.warnings.push(Warning::TaxYearMissing {
                property_id: property_id.to_string(),
                year: current_year,
            });
        }

        tracing::debug!(
            "物业 {} {} 年税费: {} 类, 其他年度 {} 条已忽略",
            property_id, current_year, out.items.len(), other_years
        );
        out
    }
}

/// 按 propertyId 关联调整记录 (按日期升序)
pub fn join_adjustments(property_id: &str, raw: Vec<TaxAdjustment>) -> Vec<TaxAdjustment> {
    let mut joined: Vec<TaxAdjustment> = raw.into_iter().filter(|a| a.property_id == property_id).collect();
    joined.sort_by(|a, b| {
        a.adjustment_date
            .cmp(&b.adjustment_date)
            .then_with(|| a.document_id.cmp(&b.document_id))
    });
    joined
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn tax(year: Option<i32>, category: &str, amount: &str) -> TaxItem {
        TaxItem {
            property_id: "P1".into(),
            assessment_year: year,
            amount: BigDecimal::from_str(amount).unwrap(),
            category: category.into(),
        }
    }

    #[test]
    fn keeps_only_current_year_and_newest_per_category() {
        let raw = vec![
            tax(Some(2026), "Grundskyld", "4000"),
            tax(Some(2025), "Grundskyld", "3800"),
            tax(Some(2026), "Renovation", "2100.00"),
            tax(Some(2026), "Grundskyld", "4200.50"),
        ];
        let res = TaxAggregator.aggregate("P1", 2026, raw);
        assert_eq!(res.items.len(), 2);
        assert!(res.items.iter().all(|t| t.assessment_year == Some(2026)));
        assert_eq!(res.items[0].category, "Grundskyld");
        assert_eq!(res.items[0].amount, BigDecimal::from_str("4200.50").unwrap());
        assert_eq!(res.total, BigDecimal::from_str("6300.50").unwrap());
        assert!(!res.missing_current_year);
    }

    #[test]
    fn prior_year_is_never_substituted() {
        let res = TaxAggregator.aggregate("P1", 2026, vec![tax(Some(2025), "Grundskyld", "3800")]);
        assert!(res.items.is_empty());
        assert!(res.missing_current_year);
        assert_eq!(
            res.warnings,
            vec![Warning::TaxYearMissing {
                property_id: "P1".into(),
                year: 2026
            }]
        );
    }

    #[test]
    fn items_without_year_are_counted() {
        let res = TaxAggregator.aggregate(
            "P1",
            2026,
            vec![tax(None, "Grundskyld", "1"), tax(Some(2026), "Grundskyld", "2")],
        );
        assert_eq!(res.items.len(), 1);
        assert!(res.warnings.iter().any(|w| matches!(w, Warning::TaxWithoutYear { count: 1, .. })));
    }

    #[test]
    fn adjustments_join_by_property_only() {
        let adj = |p: &str, doc: &str, d: u32| TaxAdjustment {
            property_id: p.into(),
            document_id: doc.into(),
            adjustment_date: NaiveDate::from_ymd_opt(2026, 5, d).unwrap(),
            amount: BigDecimal::from(-150),
            tax_year: Some(2025),
        };
        let joined = join_adjustments("P1", vec![adj("P1", "D2", 9), adj("P2", "D9", 1), adj("P1", "D1", 3)]);
        let docs: Vec<_> = joined.iter().map(|a| a.document_id.as_str()).collect();
        assert_eq!(docs, vec!["D1", "D2"]);
    }
}
