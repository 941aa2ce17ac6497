use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::models::{ParsedAddress, PropertyRecord, Warning};
use crate::source::{bounded, RegistryLookup};

/// 地址解析结果
#[derive(Debug, Clone, Default)]
pub struct AddressResolution {
    pub properties: Vec<PropertyRecord>,
    pub warnings: Vec<Warning>,
}

/// 地址 -> 登记记录
pub struct AddressResolver {
    registry: Arc<dyn RegistryLookup>,
    timeout: Duration,
}

impl AddressResolver {
    pub fn new(registry: Arc<dyn RegistryLookup>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub async fn resolve(&self, address: &str) -> Result<AddressResolution> {
        let raw = bounded(
            "registry",
            "find_properties_by_address",
            self.timeout,
            self.registry.find_properties_by_address(address),
        )
        .await?;

        Ok(filter_records(address, raw))
    }
}

/// 登记系统的搜索可能带出相邻门牌、已注销记录, 在这里筛掉
pub fn filter_records(address: &str, raw: Vec<PropertyRecord>) -> AddressResolution {
    let mut out = AddressResolution::default();

    if raw.is_empty() {
        out.warnings.push(Warning::AddressNotFound {
            address: address.to_string(),
        });
        return out;
    }

    let requested = ParsedAddress::parse(address);
    if requested.is_none() {
        out.warnings.push(Warning::AddressUnparsed {
            address: address.to_string(),
        });
    }

    let mut withdrawn = 0usize;
    let mut outside = 0usize;
    let mut seen = indexmap::IndexSet::new();

    for record in raw {
        if let Some(req) = &requested {
            let covered = match ParsedAddress::parse_lenient(&record.address) {
                Some(candidate) => req.covers(&candidate),
                None => false,
            };
            if !covered {
                tracing::debug!("登记记录 {} ({}) 不在请求地址内", record.property_id, record.address);
                outside += 1;
                continue;
            }
        }
        if record.withdrawn {
            withdrawn += 1;
            continue;
        }
        // propertyId 唯一
        if seen.insert(record.property_id.clone()) {
            out.properties.push(record);
        }
    }

    if withdrawn > 0 {
        out.warnings.push(Warning::WithdrawnExcluded { count: withdrawn });
    }
    if outside > 0 {
        out.warnings.push(Warning::OutsideAddressExcluded { count: outside });
    }
    if out.properties.is_empty() {
        out.warnings.push(Warning::AddressNotFound {
            address: address.to_string(),
        });
    } else if out.properties.len() > 1 {
        out.warnings.push(Warning::MultipleProperties {
            address: address.to_string(),
            count: out.properties.len(),
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, address: &str, withdrawn: bool) -> PropertyRecord {
        PropertyRecord {
            property_id: id.into(),
            address: address.into(),
            unit_descriptors: vec![],
            withdrawn,
        }
    }

    #[test]
    fn empty_registry_answer_is_a_warning() {
        let res = filter_records("Hovedgaden 10, 8000 Aarhus C", vec![]);
        assert!(res.properties.is_empty());
        assert_eq!(
            res.warnings,
            vec![Warning::AddressNotFound {
                address: "Hovedgaden 10, 8000 Aarhus C".into()
            }]
        );
    }

    #[test]
    fn withdrawn_and_neighbouring_records_are_excluded() {
        let res = filter_records(
            "Hovedgaden 10, 8000 Aarhus C",
            vec![
                record("P1", "Hovedgaden 10, 1. tv, 8000 Aarhus C", false),
                record("P2", "Hovedgaden 10, 1. th, 8000 Aarhus C", true),
                record("P3", "Hovedgaden 100, 8000 Aarhus C", false),
            ],
        );
        let ids: Vec<_> = res.properties.iter().map(|p| p.property_id.as_str()).collect();
        assert_eq!(ids, vec!["P1"]);
        assert!(res.warnings.contains(&Warning::WithdrawnExcluded { count: 1 }));
        assert!(res.warnings.contains(&Warning::OutsideAddressExcluded { count: 1 }));
    }

    #[test]
    fn several_units_raise_ambiguity_warning() {
        let res = filter_records(
            "Hovedgaden 10, 8000 Aarhus C",
            vec![
                record("P1", "Hovedgaden 10, 1. tv, 8000 Aarhus C", false),
                record("P2", "Hovedgaden 10, 1. th, 8000 Aarhus C", false),
            ],
        );
        assert_eq!(res.properties.len(), 2);
        assert!(res.warnings.iter().any(|w| matches!(w, Warning::MultipleProperties { count: 2, .. })));
    }

    #[test]
    fn unparseable_request_keeps_registry_rows_with_warning() {
        let res = filter_records("somewhere in town", vec![record("P1", "Hovedgaden 10, 8000 Aarhus C", false)]);
        assert_eq!(res.properties.len(), 1);
        assert!(matches!(res.warnings[0], Warning::AddressUnparsed { .. }));
    }

    #[test]
    fn locality_with_spaces_is_not_mistaken_for_street() {
        let res = filter_records(
            "Ny Munkegade 5, 8000 Aarhus C",
            vec![record("P9", "Ny Munkegade 5, 8000 Aarhus C", false)],
        );
        assert_eq!(res.properties.len(), 1);
        assert!(res.warnings.is_empty());
    }
}
