pub mod address;
pub mod case;
pub mod debt;
pub mod name_matcher;
pub mod owner;
pub mod pipeline;
pub mod tax;

pub use address::{AddressResolution, AddressResolver};
pub use case::{CaseResolution, CaseResolver};
pub use debt::{DebtAggregation, DebtAggregator};
pub use name_matcher::NameMatcher;
pub use owner::{OwnerResolution, OwnerResolver};
pub use pipeline::{PipelineSettings, ReconciliationPipeline, Stage};
pub use tax::{TaxAggregation, TaxAggregator};
