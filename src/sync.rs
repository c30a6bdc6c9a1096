//! Purpose: Copy or import datasets between any two stores.
//! Exports: `copy_data`, `import_data`, `CopyOptions`, `SyncReport`, `DatasetSync`, `SyncOutcome`.
//! Role: Enumerates source datasets, reconciles schema on the destination, and
//! transfers only the rows the destination has not seen.
//! Invariants: Folder and file filters match case-insensitively.
//! Invariants: One dataset failing never stops the others; failures are raised
//! together after every pair was attempted and partial progress is kept.
//! Invariants: Schema reconciliation always takes the source schema; a mismatch
//! drops the destination rows.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::error::Error;
use crate::core::store::{Manager, Provider};

pub const ALL_FILES: &str = "*";
pub const DEFAULT_BATCH_SIZE: i64 = 10_000;

#[derive(Clone, Copy, Debug)]
pub struct CopyOptions {
    /// Keep existing destination rows instead of clearing them first.
    pub append_dest: bool,
    /// Transfer from row 0 instead of from the destination's item count.
    pub echo_source: bool,
    /// Rows read from the source per round trip.
    pub batch_size: i64,
}

impl CopyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_append_dest(mut self, append_dest: bool) -> Self {
        self.append_dest = append_dest;
        self
    }

    pub fn with_echo_source(mut self, echo_source: bool) -> Self {
        self.echo_source = echo_source;
        self
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            append_dest: false,
            echo_source: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Copied { rows: i64 },
    UpToDate,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DatasetSync {
    pub folder: String,
    pub file: String,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct SyncReport {
    pub datasets: Vec<DatasetSync>,
}

impl SyncReport {
    pub fn rows_copied(&self) -> i64 {
        self.datasets
            .iter()
            .map(|entry| match entry.outcome {
                SyncOutcome::Copied { rows } => rows,
                SyncOutcome::UpToDate => 0,
            })
            .sum()
    }

    fn record(&mut self, folder: &str, file: &str, outcome: SyncOutcome) {
        self.datasets.push(DatasetSync {
            folder: folder.to_string(),
            file: file.to_string(),
            outcome,
        });
    }
}

/// Copies datasets from `source` to `dest`, optionally restricted to one folder
/// and one file (`None` or `"*"` selects every file).
pub fn copy_data<S, D>(
    source: &S,
    dest: &D,
    options: CopyOptions,
    folder: Option<&str>,
    file: Option<&str>,
) -> Result<SyncReport, Error>
where
    S: Provider + ?Sized,
    D: Manager + ?Sized,
{
    let file = file.filter(|name| *name != ALL_FILES);
    transfer(source, dest, options, folder, file)
}

/// Imports every dataset of `source`, appending the unseen tail of each one.
/// With `append == false` destination rows are cleared first.
pub fn import_data<S, D>(source: &S, dest: &D, append: bool) -> Result<SyncReport, Error>
where
    S: Provider + ?Sized,
    D: Manager + ?Sized,
{
    let options = CopyOptions::new().with_append_dest(append);
    transfer(source, dest, options, None, None)
}

fn transfer<S, D>(
    source: &S,
    dest: &D,
    options: CopyOptions,
    folder_filter: Option<&str>,
    file_filter: Option<&str>,
) -> Result<SyncReport, Error>
where
    S: Provider + ?Sized,
    D: Manager + ?Sized,
{
    let mut report = SyncReport::default();
    let mut failures = Vec::new();

    let folders = source.list_folders()?;
    for folder in folders
        .iter()
        .filter(|name| folder_filter.is_none_or(|wanted| same_name(name, wanted)))
    {
        let files = match source.list_files(folder) {
            Ok(files) => files,
            Err(err) => {
                let err = err.with_dataset(folder, ALL_FILES);
                warn!(%folder, error = %err, "failed to list source files");
                failures.push(err);
                continue;
            }
        };
        for file in files
            .iter()
            .filter(|name| file_filter.is_none_or(|wanted| same_name(name, wanted)))
        {
            match sync_dataset(source, dest, options, folder, file) {
                Ok(0) => {
                    debug!(%folder, %file, "destination up to date");
                    report.record(folder, file, SyncOutcome::UpToDate);
                }
                Ok(rows) => {
                    info!(%folder, %file, rows, "copied dataset tail");
                    report.record(folder, file, SyncOutcome::Copied { rows });
                }
                Err(err) => {
                    let err = err.with_dataset(folder, file);
                    warn!(%folder, %file, error = %err, "dataset sync failed");
                    failures.push(err);
                }
            }
        }
    }

    let attempted = report.datasets.len() + failures.len();
    Error::aggregate(
        format!("{} of {attempted} datasets failed to sync", failures.len()),
        failures,
    )?;
    Ok(report)
}

/// Returns the number of rows appended to the destination.
fn sync_dataset<S, D>(
    source: &S,
    dest: &D,
    options: CopyOptions,
    folder: &str,
    file: &str,
) -> Result<i64, Error>
where
    S: Provider + ?Sized,
    D: Manager + ?Sized,
{
    let src_meta = source.get_metadata(folder, file)?;
    if dest.file_exists(folder, file)? {
        if !options.append_dest {
            dest.clear_items(folder, file)?;
        }
        dest.edit_file(&src_meta)?;
    } else {
        dest.add_file(&src_meta.clone().with_item_count(0))?;
    }
    let dest_meta = dest.get_metadata(folder, file)?;

    let start = if options.echo_source {
        0
    } else {
        dest_meta.item_count
    };
    let num_items = src_meta.item_count - start;
    if num_items <= 0 {
        return Ok(0);
    }

    let batch_size = options.batch_size.max(1);
    let end = start + num_items;
    let mut next = start;
    while next < end {
        let count = batch_size.min(end - next);
        let rows = source.get_items(folder, file, next, count)?;
        if rows.is_empty() {
            break;
        }
        dest.add_items(folder, file, &rows)?;
        next += rows.len() as i64;
    }
    Ok(next - start)
}

fn same_name(name: &str, wanted: &str) -> bool {
    name.to_lowercase() == wanted.to_lowercase()
}
