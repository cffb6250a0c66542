pub mod export;
pub mod types;

pub use export::{copy_text, export_results, render};
pub use types::{ExportFormat, ReportDocument};
