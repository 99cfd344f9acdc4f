//! Sync pipeline - fetch, transform, store and export in one pass
//!
//! Both entry points run the same sequence:
//! - PMA decisions, unfiltered
//! - 510(k) decisions inside a trailing date window
//! - (run-once only) a preview of approved devices
//! - CSV export of the whole store
//!
//! Fetch, store and export failures are logged and the sequence moves on.
//! Anything else propagates to the caller.

use anyhow::Context;
use chrono::{Days, Local, NaiveDate};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::module::export::{export_csv, ExportOutcome};
use crate::module::openfda::{fetch_records, transform, Category, Device, RecordSource};
use crate::module::store::{DeviceFilter, DeviceStore};

/// Number of approved devices shown by the run-once preview
pub const APPROVED_PREVIEW_LIMIT: usize = 5;

/// Inclusive range of decision dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// `days` days back from `today`, both ends included
    pub fn trailing(today: NaiveDate, days: u32) -> Self {
        let start = today
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end: today }
    }

    /// openFDA range query, e.g. `decision_date:[2024-01-01+TO+2024-03-31]`
    pub fn search_filter(&self) -> String {
        format!(
            "decision_date:[{}+TO+{}]",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Per-run options that differ between the entry points
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub export_path: PathBuf,
    /// Log the first approved devices after syncing
    pub preview_approved: bool,
}

/// Counts for one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryReport {
    pub category: Category,
    pub fetched: usize,
    pub transformed: usize,
    pub added: usize,
    pub skipped: usize,
    /// The store step failed and nothing from this category was kept
    pub store_failed: bool,
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub pma: CategoryReport,
    pub k510: CategoryReport,
    pub window: DateWindow,
    pub approved_preview: Vec<Device>,
    /// `None` when the export failed
    pub export: Option<ExportOutcome>,
    pub total_stored: usize,
}

/// Owns the record source and the store handle for the lifetime of the process.
pub struct Pipeline {
    source: Arc<dyn RecordSource>,
    store: Arc<DeviceStore>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(source: Arc<dyn RecordSource>, store: Arc<DeviceStore>, config: PipelineConfig) -> Self {
        Self {
            source,
            store,
            config,
        }
    }

    /// Run the full sequence with today's local date.
    pub async fn run(&self, options: &RunOptions) -> anyhow::Result<PipelineReport> {
        self.run_on(Local::now().date_naive(), options).await
    }

    /// Run the full sequence as if today were `today`.
    pub async fn run_on(&self, today: NaiveDate, options: &RunOptions) -> anyhow::Result<PipelineReport> {
        info!("Starting device sync...");

        self.store
            .ensure_schema()
            .context("Failed to ensure device schema")?;

        let pma = self
            .sync_category(Category::Pma, None, self.config.pma_max_records)
            .await;

        let window = DateWindow::trailing(today, self.config.window_days);
        let search = window.search_filter();
        info!("510k window: {} to {}", window.start, window.end);
        let k510 = self
            .sync_category(Category::K510, Some(search.as_str()), self.config.k510_max_records)
            .await;

        let approved_preview = if options.preview_approved {
            self.preview_approved()?
        } else {
            Vec::new()
        };

        let export = match export_csv(&self.store, &options.export_path) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("Export to {:?} failed: {}", options.export_path, e);
                None
            }
        };

        let total_stored = self.store.count().context("Failed to count stored devices")?;

        info!(
            "Device sync finished: PMA {} added / {} skipped, 510k {} added / {} skipped, {} devices stored",
            pma.added, pma.skipped, k510.added, k510.skipped, total_stored
        );

        Ok(PipelineReport {
            pma,
            k510,
            window,
            approved_preview,
            export,
            total_stored,
        })
    }

    /// Fetch → transform → store for one category
    async fn sync_category(
        &self,
        category: Category,
        search: Option<&str>,
        max_records: usize,
    ) -> CategoryReport {
        let raw = fetch_records(self.source.as_ref(), category, search, max_records).await;
        let devices = transform(&raw, category);

        let mut report = CategoryReport {
            category,
            fetched: raw.len(),
            transformed: devices.len(),
            added: 0,
            skipped: 0,
            store_failed: false,
        };

        match self.store.store(&devices) {
            Ok(outcome) => {
                report.added = outcome.added;
                report.skipped = outcome.skipped;
            }
            Err(e) => {
                error!("{}: failed to store {} devices: {}", category, devices.len(), e);
                report.store_failed = true;
            }
        }

        info!(
            "{}: fetched {}, transformed {}, added {}, skipped {}",
            category, report.fetched, report.transformed, report.added, report.skipped
        );
        report
    }

    fn preview_approved(&self) -> anyhow::Result<Vec<Device>> {
        let mut approved = self
            .store
            .find(&DeviceFilter::default().decision("Approved"))
            .context("Failed to query approved devices")?;
        approved.truncate(APPROVED_PREVIEW_LIMIT);

        info!("Approved devices (first {}):", approved.len());
        for device in &approved {
            info!(
                "  {} | {} | {}",
                device.submission_number,
                device.device_name.as_deref().unwrap_or("-"),
                device.applicant.as_deref().unwrap_or("-")
            );
        }
        Ok(approved)
    }
}
