//! Purpose: Resolve store references and open the matching backend.
//! Exports: `StoreRef`, `StoreOptions`, `Store`.
//! Role: One entry point for the CLI and embedders to reach either backend.
//! Invariants: `sqlite:<path>` selects the relational backend, `file:<dir>` the flat-file one.
//! Invariants: Bare paths ending in `.db`, `.sqlite` or `.sqlite3` are relational; others are flat-file.
#![allow(clippy::result_large_err)]

use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::error::Error;
use crate::core::flatfile::{FlatFileOptions, FlatFileStore};
use crate::core::metadata::Metadata;
use crate::core::sql::{SqlOptions, SqlStore};
use crate::core::store::{Manager, Provider};
use crate::core::value::Row;

pub type ApiResult<T> = Result<T, Error>;

const SQLITE_SCHEME: &str = "sqlite:";
const FILE_SCHEME: &str = "file:";
const SQLITE_EXTENSIONS: [&str; 3] = ["db", "sqlite", "sqlite3"];

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StoreRef {
    FlatFile(PathBuf),
    Sqlite(PathBuf),
}

impl StoreRef {
    pub fn flat_file(dir: impl Into<PathBuf>) -> Self {
        Self::FlatFile(dir.into())
    }

    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self::Sqlite(path.into())
    }

    pub fn parse(text: &str) -> ApiResult<Self> {
        let text = text.trim();
        if let Some(path) = text.strip_prefix(SQLITE_SCHEME) {
            return non_empty(path).map(Self::sqlite);
        }
        if let Some(path) = text.strip_prefix(FILE_SCHEME) {
            return non_empty(path).map(Self::flat_file);
        }
        let path = non_empty(text)?;
        let is_sqlite = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SQLITE_EXTENSIONS.contains(&ext));
        Ok(if is_sqlite {
            Self::Sqlite(path)
        } else {
            Self::FlatFile(path)
        })
    }

    pub fn open(&self, options: StoreOptions) -> ApiResult<Store> {
        match self {
            StoreRef::FlatFile(dir) => {
                FlatFileStore::open(dir, options.flat_file).map(Store::FlatFile)
            }
            StoreRef::Sqlite(path) => SqlStore::open(path, options.sql).map(Store::Sql),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            StoreRef::FlatFile(path) | StoreRef::Sqlite(path) => path,
        }
    }
}

impl fmt::Display for StoreRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreRef::FlatFile(dir) => write!(f, "{FILE_SCHEME}{}", dir.display()),
            StoreRef::Sqlite(path) => write!(f, "{SQLITE_SCHEME}{}", path.display()),
        }
    }
}

fn non_empty(path: &str) -> ApiResult<PathBuf> {
    if path.trim().is_empty() {
        return Err(Error::invalid("store reference has no path")
            .with_hint("Use `file:<dir>`, `sqlite:<path>`, or a bare path."));
    }
    Ok(PathBuf::from(path))
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StoreOptions {
    pub flat_file: FlatFileOptions,
    pub sql: SqlOptions,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flat_file(mut self, flat_file: FlatFileOptions) -> Self {
        self.flat_file = flat_file;
        self
    }

    pub fn with_sql(mut self, sql: SqlOptions) -> Self {
        self.sql = sql;
        self
    }
}

/// Either backend behind one concrete type.
#[derive(Clone, Debug)]
pub enum Store {
    FlatFile(FlatFileStore),
    Sql(SqlStore),
}

impl Store {
    fn backend(&self) -> &dyn Manager {
        match self {
            Store::FlatFile(store) => store,
            Store::Sql(store) => store,
        }
    }
}

impl Provider for Store {
    fn list_folders(&self) -> Result<Vec<String>, Error> {
        self.backend().list_folders()
    }

    fn list_files(&self, folder: &str) -> Result<Vec<String>, Error> {
        self.backend().list_files(folder)
    }

    fn file_exists(&self, folder: &str, file: &str) -> Result<bool, Error> {
        self.backend().file_exists(folder, file)
    }

    fn get_metadata(&self, folder: &str, file: &str) -> Result<Metadata, Error> {
        self.backend().get_metadata(folder, file)
    }

    fn get_items(
        &self,
        folder: &str,
        file: &str,
        start: i64,
        count: i64,
    ) -> Result<Vec<Row>, Error> {
        self.backend().get_items(folder, file, start, count)
    }
}

impl Manager for Store {
    fn add_file(&self, metadata: &Metadata) -> Result<(), Error> {
        self.backend().add_file(metadata)
    }

    fn edit_file(&self, metadata: &Metadata) -> Result<(), Error> {
        self.backend().edit_file(metadata)
    }

    fn add_items(&self, folder: &str, file: &str, rows: &[Row]) -> Result<(), Error> {
        self.backend().add_items(folder, file, rows)
    }

    fn clear_items(&self, folder: &str, file: &str) -> Result<(), Error> {
        self.backend().clear_items(folder, file)
    }

    fn remove_file(&self, folder: &str, file: &str) -> Result<(), Error> {
        self.backend().remove_file(folder, file)
    }
}

#[cfg(test)]
mod tests {
    use super::{Store, StoreOptions, StoreRef};
    use crate::core::error::ErrorKind;
    use crate::core::store::Provider;
    use std::path::PathBuf;

    #[test]
    fn schemes_select_backend() {
        assert_eq!(
            StoreRef::parse("sqlite:/tmp/x").expect("sqlite"),
            StoreRef::Sqlite(PathBuf::from("/tmp/x"))
        );
        assert_eq!(
            StoreRef::parse("file:/tmp/x.db").expect("file"),
            StoreRef::FlatFile(PathBuf::from("/tmp/x.db"))
        );
    }

    #[test]
    fn bare_paths_use_extension() {
        assert_eq!(
            StoreRef::parse("data/archive.sqlite").expect("sqlite"),
            StoreRef::sqlite("data/archive.sqlite")
        );
        assert_eq!(
            StoreRef::parse("data/archive").expect("dir"),
            StoreRef::flat_file("data/archive")
        );
    }

    #[test]
    fn empty_reference_is_invalid() {
        let err = StoreRef::parse("sqlite:").expect_err("empty");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(StoreRef::parse("  ").is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let store_ref = StoreRef::sqlite("a/b.db");
        assert_eq!(StoreRef::parse(&store_ref.to_string()).expect("parse"), store_ref);
    }

    #[test]
    fn open_yields_matching_backend() {
        let dir = tempfile::tempdir().expect("tempdir");
        let flat = StoreRef::flat_file(dir.path().join("flat"))
            .open(StoreOptions::new())
            .expect("flat");
        assert!(matches!(flat, Store::FlatFile(_)));
        let sql = StoreRef::sqlite(dir.path().join("s.db"))
            .open(StoreOptions::new())
            .expect("sql");
        assert!(matches!(sql, Store::Sql(_)));
        assert!(sql.list_folders().expect("folders").is_empty());
    }
}
