use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// 不动产登记记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub property_id: String,
    pub address: String,
    #[serde(default)]
    pub unit_descriptors: Vec<String>,
    /// 已注销/退役的登记 (不参与后续匹配)
    #[serde(default)]
    pub withdrawn: bool,
}

/// 业主记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRecord {
    pub owner_id: String,
    pub name: String,
    pub property_id: String,
    /// 来自"历史业主"列表
    #[serde(default)]
    pub historical: bool,
}

// 邮编锚点: ", 8000 Aarhus C" -> 邮编后的全部内容都属于地名
static POSTAL_ANCHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*(?P<postal>\d{4})\s+(?P<locality>\S.*?)\s*$").unwrap());

static STREET_PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<street>\S.*?)\s+(?P<number>\d{1,3}[A-Za-z]?)(?:\s*,\s*(?P<floor>[^\s,.]+)\.?(?:\s*(?P<door>[^\s,.]+)\.?)?)?\s*$",
    )
    .unwrap()
});

/// 按丹麦地址规范拆分后的地址
/// `street number[, floor[. door]], postal locality`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAddress {
    pub street: String,
    pub number: String,
    pub floor: Option<String>,
    pub door: Option<String>,
    pub postal_code: Option<String>,
    pub locality: Option<String>,
}

impl ParsedAddress {
    /// 解析完整地址 (必须带邮编)
    pub fn parse(address: &str) -> Option<Self> {
        let caps = POSTAL_ANCHOR.captures(address)?;
        let head_end = caps.get(0)?.start();
        let mut parsed = Self::parse_street_part(&address[..head_end])?;
        parsed.postal_code = Some(caps["postal"].to_string());
        parsed.locality = Some(caps["locality"].to_string());
        Some(parsed)
    }

    /// 解析登记系统返回的地址, 邮编可缺省
    pub fn parse_lenient(address: &str) -> Option<Self> {
        Self::parse(address).or_else(|| {
            let head = address.split(',').take(2).collect::<Vec<_>>().join(",");
            Self::parse_street_part(&head).or_else(|| Self::parse_street_part(address))
        })
    }

    fn parse_street_part(head: &str) -> Option<Self> {
        let caps = STREET_PART.captures(head.trim())?;
        Some(Self {
            street: caps["street"].trim().to_string(),
            number: caps["number"].to_string(),
            floor: caps.name("floor").map(|m| m.as_str().to_string()),
            door: caps.name("door").map(|m| m.as_str().to_string()),
            postal_code: None,
            locality: None,
        })
    }

    /// 判断登记地址是否落在请求地址范围内
    /// 请求未指定楼层/门牌时, 同一门牌号下所有单元都算命中
    pub fn covers(&self, candidate: &ParsedAddress) -> bool {
        fn same(a: &str, b: &str) -> bool {
            a.to_lowercase() == b.to_lowercase()
        }

        if !same(&self.street, &candidate.street) || !same(&self.number, &candidate.number) {
            return false;
        }
        if let (Some(a), Some(b)) = (&self.postal_code, &candidate.postal_code) {
            if a != b {
                return false;
            }
        }
        let floor_ok = match &self.floor {
            Some(f) => candidate.floor.as_deref().is_some_and(|c| same(f, c)),
            None => true,
        };
        let door_ok = match &self.door {
            Some(d) => candidate.door.as_deref().is_some_and(|c| same(d, c)),
            None => true,
        };
        floor_ok && door_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_locality_with_spaces() {
        let p = ParsedAddress::parse("Hovedgaden 10, 8000 Aarhus C").unwrap();
        assert_eq!(p.street, "Hovedgaden");
        assert_eq!(p.number, "10");
        assert_eq!(p.floor, None);
        assert_eq!(p.postal_code.as_deref(), Some("8000"));
        assert_eq!(p.locality.as_deref(), Some("Aarhus C"));
    }

    #[test]
    fn parses_multi_word_street_with_floor_and_door() {
        let p = ParsedAddress::parse("Niels Juels Gade 46B, 3. th, 8200 Aarhus N").unwrap();
        assert_eq!(p.street, "Niels Juels Gade");
        assert_eq!(p.number, "46B");
        assert_eq!(p.floor.as_deref(), Some("3"));
        assert_eq!(p.door.as_deref(), Some("th"));
        assert_eq!(p.locality.as_deref(), Some("Aarhus N"));
    }

    #[test]
    fn rejects_address_without_postal_code() {
        assert!(ParsedAddress::parse("Hovedgaden 10").is_none());
        assert!(ParsedAddress::parse("just some text").is_none());
    }

    #[test]
    fn lenient_parse_accepts_registry_rows() {
        let p = ParsedAddress::parse_lenient("Skejbygårdsvej 46, 3. TH").unwrap();
        assert_eq!(p.street, "Skejbygårdsvej");
        assert_eq!(p.floor.as_deref(), Some("3"));
        assert_eq!(p.door.as_deref(), Some("TH"));
    }

    #[test]
    fn covers_all_units_when_request_has_no_floor() {
        let req = ParsedAddress::parse("Hovedgaden 10, 8000 Aarhus C").unwrap();
        let unit = ParsedAddress::parse("Hovedgaden 10, 1. tv, 8000 Aarhus C").unwrap();
        let neighbour = ParsedAddress::parse("Hovedgaden 12, 8000 Aarhus C").unwrap();
        assert!(req.covers(&unit));
        assert!(!req.covers(&neighbour));
    }

    #[test]
    fn covers_requires_matching_door_when_given() {
        let req = ParsedAddress::parse("Hovedgaden 10, 1. tv, 8000 Aarhus C").unwrap();
        let th = ParsedAddress::parse("Hovedgaden 10, 1. TH, 8000 Aarhus C").unwrap();
        let tv = ParsedAddress::parse("hovedgaden 10, 1. TV, 8000 Aarhus C").unwrap();
        assert!(!req.covers(&th));
        assert!(req.covers(&tv));
    }
}
