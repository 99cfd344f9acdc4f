//! Paginated fetching
//!
//! Walks a category endpoint in fixed-size batches until the requested
//! number of records is reached, the source runs dry, or a request fails.

use tracing::{info, warn};

use super::client::{PageRequest, RecordSource};
use super::types::{Category, RawRecord};

/// Records requested per page
pub const BATCH_SIZE: usize = 100;

/// Fetch up to `max_records` raw records of one category.
///
/// A failed request ends pagination and the records gathered so far are
/// returned. Nothing is retried and no error reaches the caller.
pub async fn fetch_records(
    source: &dyn RecordSource,
    category: Category,
    search: Option<&str>,
    max_records: usize,
) -> Vec<RawRecord> {
    let mut records: Vec<RawRecord> = Vec::new();

    while records.len() < max_records {
        let page = PageRequest {
            category,
            search,
            limit: BATCH_SIZE.min(max_records - records.len()),
            skip: records.len(),
        };

        match source.fetch_page(page).await {
            Ok(batch) if batch.is_empty() => {
                info!("{}: no more records after {}", category, records.len());
                break;
            }
            Ok(batch) => {
                info!(
                    "{}: fetched {} records (skip {}, total {})",
                    category,
                    batch.len(),
                    page.skip,
                    records.len() + batch.len()
                );
                records.extend(batch);
            }
            Err(e) => {
                warn!(
                    "{}: fetch failed at skip {}, keeping {} records: {}",
                    category,
                    page.skip,
                    records.len(),
                    e
                );
                break;
            }
        }
    }

    // A source may hand back more than `limit`; never exceed the quota.
    records.truncate(max_records);
    records
}
