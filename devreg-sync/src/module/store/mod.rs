//! SQLite-backed device store
//!
//! Insert-only: a submission number that is already stored is skipped, never
//! overwritten. The handle is constructed explicitly and shared by reference.

pub mod schema;
pub mod query;

use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::debug;

use crate::module::openfda::{Device, DeviceRow};

pub use query::DeviceFilter;

const INSERT_DEVICE: &str = "INSERT OR IGNORE INTO devices (
        submissionNumber,
        deviceName,
        submissionType,
        decision,
        decisionDate,
        applicant,
        productCode,
        regulationNumber
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("sqlite error during {operation}: {source}")]
    Sqlite {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("store connection lock poisoned")]
    Poisoned,
}

pub(crate) fn sqlite(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |source| StoreError::Sqlite { operation, source }
}

/// Result of one [`DeviceStore::store`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOutcome {
    pub added: usize,
    pub skipped: usize,
}

/// Handle to the `devices` table
pub struct DeviceStore {
    conn: Mutex<Connection>,
}

impl DeviceStore {
    /// Open (or create) a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.display().to_string(),
            source,
        })?;
        debug!("Opened device store at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Private in-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: ":memory:".to_string(),
            source,
        })?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Insert new devices, skipping submission numbers that already exist.
    ///
    /// All rows go in one transaction; on error nothing from this call is kept.
    pub fn store(&self, devices: &[Device]) -> Result<StoreOutcome, StoreError> {
        let mut outcome = StoreOutcome::default();
        if devices.is_empty() {
            return Ok(outcome);
        }

        let mut conn = self.lock()?;
        let transaction = conn.transaction().map_err(sqlite("begin insert transaction"))?;
        {
            let mut insert = transaction
                .prepare_cached(INSERT_DEVICE)
                .map_err(sqlite("prepare insert device"))?;

            for device in devices {
                let row = DeviceRow::from(device);
                let changed = insert
                    .execute(params![
                        row.submission_number,
                        row.device_name,
                        row.submission_type,
                        row.decision,
                        row.decision_date,
                        row.applicant,
                        row.product_code,
                        row.regulation_number,
                    ])
                    .map_err(sqlite("insert device"))?;

                if changed == 0 {
                    outcome.skipped += 1;
                } else {
                    outcome.added += 1;
                }
            }
        }
        transaction.commit().map_err(sqlite("commit insert transaction"))?;

        debug!("Stored devices: {} added, {} skipped", outcome.added, outcome.skipped);
        Ok(outcome)
    }

    /// Number of stored devices
    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM devices", [], |row| row.get(0))
            .map_err(sqlite("count devices"))?;
        Ok(count.max(0) as usize)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::module::openfda::DeviceKind;
    use chrono::NaiveDate;

    pub(crate) fn device(number: &str, decision: &str, applicant: Option<&str>) -> Device {
        Device {
            submission_number: number.to_string(),
            device_name: Some(format!("Device {}", number)),
            decision: decision.to_string(),
            decision_date: NaiveDate::from_ymd_opt(2024, 1, 31),
            applicant: applicant.map(str::to_string),
            product_code: Some("ABC".to_string()),
            kind: if number.starts_with('K') {
                DeviceKind::K510 {
                    regulation_number: Some("880.5725".to_string()),
                }
            } else {
                DeviceKind::Pma
            },
        }
    }

    pub(crate) fn store_with_schema() -> DeviceStore {
        let store = DeviceStore::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        store
    }

    #[test]
    fn test_empty_input_touches_nothing() {
        // No schema: any database access would fail
        let store = DeviceStore::open_in_memory().unwrap();
        let outcome = store.store(&[]).unwrap();
        assert_eq!(outcome, StoreOutcome { added: 0, skipped: 0 });
    }

    #[test]
    fn test_duplicate_across_calls_is_skipped() {
        let store = store_with_schema();

        let first = store.store(&[device("P1", "Approved", None)]).unwrap();
        assert_eq!(first, StoreOutcome { added: 1, skipped: 0 });

        let mut changed = device("P1", "Denied", Some("Other"));
        changed.device_name = None;
        let second = store.store(&[changed, device("P2", "Approved", None)]).unwrap();
        assert_eq!(second, StoreOutcome { added: 1, skipped: 1 });

        assert_eq!(store.count().unwrap(), 2);
        // First write wins
        let stored = store.find(&DeviceFilter::default().decision("Denied")).unwrap();
        assert!(stored.is_empty());
    }

    #[test]
    fn test_duplicate_within_one_call_is_skipped() {
        let store = store_with_schema();
        let outcome = store
            .store(&[
                device("P1", "Approved", None),
                device("P1", "Approved", None),
                device("K1", "Cleared", None),
            ])
            .unwrap();
        assert_eq!(outcome, StoreOutcome { added: 2, skipped: 1 });
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_store_without_schema_fails() {
        let store = DeviceStore::open_in_memory().unwrap();
        let result = store.store(&[device("P1", "Approved", None)]);
        assert!(matches!(result, Err(StoreError::Sqlite { .. })));
    }

    #[test]
    fn test_round_trip_keeps_kind() {
        let store = store_with_schema();
        let k510 = device("K1", "Cleared", Some("Acme"));
        let pma = device("P1", "Approved", None);
        store.store(&[k510.clone(), pma.clone()]).unwrap();

        let all = store.all().unwrap();
        assert_eq!(all, vec![k510, pma]);
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("devices.db");
        {
            let store = DeviceStore::open(&path).unwrap();
            store.ensure_schema().unwrap();
            store.store(&[device("P1", "Approved", None)]).unwrap();
        }
        let reopened = DeviceStore::open(&path).unwrap();
        reopened.ensure_schema().unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }
}
