use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 税费明细 (每个 propertyId + 年度 + 类别 一条)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxItem {
    pub property_id: String,
    /// 源系统偶尔缺失年度
    pub assessment_year: Option<i32>,
    pub amount: BigDecimal,
    pub category: String,
}

/// 税费调整 (档案系统中的变更报告)
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxAdjustment {
    pub property_id: String,
    pub document_id: String,
    pub adjustment_date: NaiveDate,
    pub amount: BigDecimal,
    #[serde(default)]
    pub tax_year: Option<i32>,
}

/// 档案系统中的一份税费变更报告, 列出受影响的物业
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentReport {
    pub document_id: String,
    pub report_date: NaiveDate,
    pub tax_year: Option<i32>,
    pub lines: Vec<AdjustmentLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentLine {
    pub property_id: String,
    pub amount: BigDecimal,
}

impl AdjustmentReport {
    /// 展开为按物业的调整记录
    pub fn adjustments(&self) -> Vec<TaxAdjustment> {
        self.lines
            .iter()
            .map(|l| TaxAdjustment {
                property_id: l.property_id.clone(),
                document_id: self.document_id.clone(),
                adjustment_date: self.report_date,
                amount: l.amount.clone(),
                tax_year: self.tax_year,
            })
            .collect()
    }
}
