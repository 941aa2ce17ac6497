pub mod case;
pub mod debt;
pub mod property;
pub mod request;
pub mod result;
pub mod tax;

pub use case::CaseRef;
pub use debt::{parse_danish_amount, DebtItem, DebtKey, DebtStatus};
pub use property::{OwnerRecord, ParsedAddress, PropertyRecord};
pub use request::{Request, RequestMetadata};
pub use result::{ConfirmedOwner, NameCandidate, ReconciliationResult, Warning};
pub use tax::{AdjustmentLine, AdjustmentReport, TaxAdjustment, TaxItem};
