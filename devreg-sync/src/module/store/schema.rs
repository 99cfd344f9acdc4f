use super::{sqlite, DeviceStore, StoreError};

/// Column names double as the CSV header, so they keep the record's field names.
const CREATE_DEVICES: &str = "CREATE TABLE IF NOT EXISTS devices (
        submissionNumber TEXT PRIMARY KEY NOT NULL CHECK (length(trim(submissionNumber)) > 0),
        deviceName TEXT,
        submissionType TEXT NOT NULL CHECK (submissionType IN ('PMA', '510k')),
        decision TEXT NOT NULL,
        decisionDate TEXT,
        applicant TEXT,
        productCode TEXT,
        regulationNumber TEXT
    )";

const CREATE_DECISION_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_devices_decision ON devices (decision)";

impl DeviceStore {
    /// Create the `devices` table if it does not exist yet. Idempotent.
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(CREATE_DEVICES, [])
            .map_err(sqlite("create devices table"))?;
        conn.execute(CREATE_DECISION_INDEX, [])
            .map_err(sqlite("create decision index"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let store = DeviceStore::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        store.ensure_schema().unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_columns_match_record_fields() {
        let store = DeviceStore::open_in_memory().unwrap();
        store.ensure_schema().unwrap();

        let conn = store.lock().unwrap();
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('devices')").unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(
            columns,
            vec![
                "submissionNumber",
                "deviceName",
                "submissionType",
                "decision",
                "decisionDate",
                "applicant",
                "productCode",
                "regulationNumber",
            ]
        );
    }
}
