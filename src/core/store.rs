//! Purpose: Define the dataset contract shared by every storage backend.
//! Exports: `Provider` (read side) and `Manager` (read + write side).
//! Role: The sync layer is written against these traits only.
//! Invariants: Metadata is derived from backend state on every call, never cached.
//! Invariants: Callers serialize writers to one (folder, file); backends do not lock.

use crate::core::error::{Error, ErrorKind};
use crate::core::metadata::Metadata;
use crate::core::value::Row;

pub trait Provider {
    fn list_folders(&self) -> Result<Vec<String>, Error>;

    fn list_files(&self, folder: &str) -> Result<Vec<String>, Error>;

    fn file_exists(&self, folder: &str, file: &str) -> Result<bool, Error>;

    /// Fails with `NotFound` when the dataset is absent.
    fn get_metadata(&self, folder: &str, file: &str) -> Result<Metadata, Error>;

    /// Reads `[start, start + count)`, clipped to the item count. Never fails on an empty range.
    fn get_items(&self, folder: &str, file: &str, start: i64, count: i64)
    -> Result<Vec<Row>, Error>;

    fn get_item(&self, folder: &str, file: &str, index: i64) -> Result<Row, Error> {
        let meta = self.get_metadata(folder, file)?;
        if index < 0 || index >= meta.item_count {
            return Err(Error::new(ErrorKind::OutOfRange)
                .with_message(format!("dataset holds {} items", meta.item_count))
                .with_dataset(folder, file)
                .with_index(index));
        }
        self.get_items(folder, file, index, 1)?
            .pop()
            .ok_or_else(|| {
                Error::new(ErrorKind::Corrupt)
                    .with_message("item missing below item count")
                    .with_dataset(folder, file)
                    .with_index(index)
            })
    }
}

pub trait Manager: Provider {
    /// Creates an empty dataset; fails with `AlreadyExists` if it is present.
    fn add_file(&self, metadata: &Metadata) -> Result<(), Error>;

    /// Updates description and default field. A different schema drops every row
    /// and recreates the dataset with the incoming schema.
    fn edit_file(&self, metadata: &Metadata) -> Result<(), Error>;

    /// Appends in order. Rows that do not fit the schema are skipped and reported
    /// together in one `Aggregate` error after the rest of the batch is written.
    fn add_items(&self, folder: &str, file: &str, rows: &[Row]) -> Result<(), Error>;

    fn add_item(&self, folder: &str, file: &str, row: &Row) -> Result<(), Error> {
        self.add_items(folder, file, std::slice::from_ref(row))
    }

    fn clear_items(&self, folder: &str, file: &str) -> Result<(), Error>;

    fn remove_file(&self, folder: &str, file: &str) -> Result<(), Error>;
}

pub(crate) fn check_range(start: i64, count: i64) -> Result<(), Error> {
    if start < 0 || count < 0 {
        return Err(Error::invalid(format!(
            "range start {start} and count {count} must not be negative"
        )));
    }
    Ok(())
}

/// Splits a batch into rows that fit `meta` and per-row errors for the rest.
/// Accepted rows keep their position in the caller's batch.
pub(crate) fn partition_rows<'a>(
    meta: &Metadata,
    rows: &'a [Row],
) -> (Vec<(usize, &'a Row)>, Vec<Error>) {
    let mut accepted = Vec::with_capacity(rows.len());
    let mut failures = Vec::new();
    for (position, row) in rows.iter().enumerate() {
        match meta.check_row(row) {
            Ok(()) => accepted.push((position, row)),
            Err(err) => failures.push(
                err.with_dataset(&meta.folder_name, &meta.file_name)
                    .with_index(position as i64),
            ),
        }
    }
    (accepted, failures)
}
