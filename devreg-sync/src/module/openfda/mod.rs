//! openFDA device decision module
//!
//! Pages through the openFDA `pma` and `510k` device endpoints and maps the
//! raw results onto a single normalized device record.

pub mod types;
pub mod decision;
pub mod client;
pub mod fetcher;
pub mod parser;

pub use client::{FetchError, OpenFdaClient, PageRequest, RecordSource};
pub use decision::{normalize, DecisionStatus};
pub use fetcher::{fetch_records, BATCH_SIZE};
pub use parser::{transform, TransformError};
pub use types::{Category, Device, DeviceKind, DeviceRow, RawRecord};
