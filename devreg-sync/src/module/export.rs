//! CSV export of the whole device store

use chrono::{DateTime, TimeZone};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::module::openfda::{Device, DeviceRow};
use crate::module::store::{DeviceStore, StoreError};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to read devices for export: {0}")]
    Store(#[from] StoreError),
    #[error("export I/O failed for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write CSV export {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// What an export run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The store was empty; no file was written
    Empty,
    Written { path: PathBuf, count: usize },
}

impl ExportOutcome {
    pub fn count(&self) -> usize {
        match self {
            ExportOutcome::Empty => 0,
            ExportOutcome::Written { count, .. } => *count,
        }
    }
}

/// `<dir>/devices_<YYYYmmdd_HHMMSS>.csv`
pub fn timestamped_export_path<Tz: TimeZone>(dir: impl AsRef<Path>, now: &DateTime<Tz>) -> PathBuf
where
    Tz::Offset: std::fmt::Display,
{
    dir.as_ref()
        .join(format!("devices_{}.csv", now.format("%Y%m%d_%H%M%S")))
}

/// Write every stored device to `destination`, replacing any existing file.
pub fn export_csv(store: &DeviceStore, destination: impl AsRef<Path>) -> Result<ExportOutcome, ExportError> {
    let destination = destination.as_ref();
    let devices = store.all()?;

    if devices.is_empty() {
        info!("No devices stored, skipping export to {:?}", destination);
        return Ok(ExportOutcome::Empty);
    }

    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|source| ExportError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
            info!("Created export directory: {:?}", parent);
        }
    }

    // Rows go to a sibling file that is renamed into place once complete
    let partial = partial_path(destination);
    let written = write_rows(&partial, &devices).and_then(|()| {
        fs::rename(&partial, destination).map_err(|source| ExportError::Io {
            path: destination.to_path_buf(),
            source,
        })
    });
    if let Err(e) = written {
        discard(&partial);
        return Err(e);
    }

    info!("Exported {} devices to {:?}", devices.len(), destination);
    Ok(ExportOutcome::Written {
        path: destination.to_path_buf(),
        count: devices.len(),
    })
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("devices.csv"));
    name.push(".partial");
    destination.with_file_name(name)
}

fn write_rows(path: &Path, devices: &[Device]) -> Result<(), ExportError> {
    let csv_error = |source: csv::Error| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    for device in devices {
        writer.serialize(DeviceRow::from(device)).map_err(csv_error)?;
    }
    writer.flush().map_err(|e| csv_error(csv::Error::from(e)))?;
    Ok(())
}

fn discard(partial: &Path) {
    match fs::remove_file(partial) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial export {:?}: {}", partial, e),
    }
}
