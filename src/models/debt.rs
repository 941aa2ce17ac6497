use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 债务状态, 按推进程度排序: Released < Frozen < SentToCollection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DebtStatus {
    Released,
    Frozen,
    SentToCollection,
}

static COLLECTION_STATUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Indfrielse pr\. (\d{2}\.\d{2}\.\d{4})").unwrap());

impl DebtStatus {
    /// 解析登记系统里的状态文本, 返回 (状态, 状态变更日期)
    pub fn parse_structura(text: &str) -> Option<(Self, Option<NaiveDate>)> {
        let text = text.trim().trim_start_matches('(').trim_end_matches(')');
        if let Some(caps) = COLLECTION_STATUS.captures(text) {
            let date = NaiveDate::parse_from_str(&caps[1], "%d.%m.%Y").ok()?;
            return Some((Self::SentToCollection, Some(date)));
        }
        match text {
            "Accepteret med indefrysning" => Some((Self::Frozen, None)),
            "Indfriet" => Some((Self::Released, None)),
            _ => None,
        }
    }
}

/// 债务明细
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtItem {
    pub source_system: String,
    pub property_id: String,
    pub owner_id: Option<String>,
    #[serde(default)]
    pub description: String,
    pub amount: BigDecimal,
    pub case_reference_date: NaiveDate,
    pub status: DebtStatus,
    /// 状态变更日期 (如移交催收的日期)
    #[serde(default)]
    pub status_date: Option<NaiveDate>,
}

/// 去重键: (propertyId, ownerId, 金额, 参考期间)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DebtKey {
    pub property_id: String,
    pub owner_id: Option<String>,
    pub amount: String,
    pub period: (i32, u32),
}

impl DebtItem {
    /// 参考期间取到自然月
    pub fn dedup_key(&self) -> DebtKey {
        DebtKey {
            property_id: self.property_id.clone(),
            owner_id: self.owner_id.clone(),
            amount: self.amount.round(2).with_scale(2).to_string(),
            period: (self.case_reference_date.year(), self.case_reference_date.month()),
        }
    }
}

/// 解析丹麦格式金额: "1.234,56-" -> -1234.56
pub fn parse_danish_amount(raw: &str) -> Option<BigDecimal> {
    let s = raw.trim().replace('.', "").replace(',', ".");
    let negative = s.ends_with('-') || s.starts_with('-');
    let digits = s.trim_matches('-').trim();
    if digits.is_empty() {
        return None;
    }
    let value = BigDecimal::from_str(digits).ok()?;
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_precedence_ordering() {
        assert!(DebtStatus::SentToCollection > DebtStatus::Frozen);
        assert!(DebtStatus::Frozen > DebtStatus::Released);
    }

    #[test]
    fn parses_structura_status_texts() {
        assert_eq!(
            DebtStatus::parse_structura("(Accepteret med indefrysning)"),
            Some((DebtStatus::Frozen, None))
        );
        assert_eq!(
            DebtStatus::parse_structura("Indfrielse pr. 05.03.2024"),
            Some((
                DebtStatus::SentToCollection,
                NaiveDate::from_ymd_opt(2024, 3, 5)
            ))
        );
        assert_eq!(DebtStatus::parse_structura("Indfriet"), Some((DebtStatus::Released, None)));
        assert_eq!(DebtStatus::parse_structura("Noget andet"), None);
    }

    #[test]
    fn parses_danish_amounts() {
        assert_eq!(parse_danish_amount("1.234,56-"), BigDecimal::from_str("-1234.56").ok());
        assert_eq!(parse_danish_amount("500,00"), BigDecimal::from_str("500").ok());
        assert_eq!(parse_danish_amount(" "), None);
        assert_eq!(parse_danish_amount("abc"), None);
    }

    #[test]
    fn dedup_key_ignores_amount_scale_and_day() {
        let a = DebtItem {
            source_system: "structura".into(),
            property_id: "P1".into(),
            owner_id: Some("O1".into()),
            description: String::new(),
            amount: BigDecimal::from(500),
            case_reference_date: NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
            status: DebtStatus::Frozen,
            status_date: None,
        };
        let mut b = a.clone();
        b.amount = BigDecimal::from_str("500.00").unwrap();
        b.case_reference_date = NaiveDate::from_ymd_opt(2026, 1, 28).unwrap();
        assert_eq!(a.dedup_key(), b.dedup_key());

        b.case_reference_date = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        assert_ne!(a.dedup_key(), b.dedup_key());
    }
}
