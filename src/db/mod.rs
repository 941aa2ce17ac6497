pub mod archive;
pub mod cases;
pub mod export;
pub mod pool;
pub mod schema;

pub use archive::PgArchive;
pub use cases::PgCaseSystem;
pub use export::{export_to_csv, CsvExportSink};
pub use pool::create_pool;
pub use schema::ensure_schema;
