pub mod config;
pub mod logging;
pub mod module;

pub use config::Config;
pub use module::export::{export_csv, timestamped_export_path, ExportError, ExportOutcome};
pub use module::openfda::{Category, Device, DeviceKind, OpenFdaClient, RecordSource};
pub use module::pipeline::{Pipeline, PipelineReport, RunOptions};
pub use module::store::{DeviceFilter, DeviceStore, StoreError, StoreOutcome};
