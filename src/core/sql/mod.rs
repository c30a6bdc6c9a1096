//! Purpose: Catalog-driven SQLite implementation of the dataset contract.
//! Exports: `SqlStore`, `SqlOptions`, `RetryPolicy`, `Backoff`, `classify`.
//! Role: Each dataset is a physical table `"<folder>.<file>"` registered in the
//! `DataIO` catalog; the schema is read back from the table's columns.
//! Invariants: `Id` is the 0-based row index; it restarts at 0 after a clear.
//! Invariants: Every operation owns one connection and one transaction for its duration.

mod catalog;
mod txn;
mod types;

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, params};
use tracing::debug;

use crate::core::error::{Error, ErrorKind};
use crate::core::metadata::{Metadata, validate_identity};
use crate::core::store::{Manager, Provider, check_range, partition_rows};
use crate::core::value::{FieldType, Row};

pub use txn::{Backoff, DEFAULT_COMMAND_TIMEOUT, RetryPolicy, classify};

use txn::{TxnRunner, sql_error};

#[derive(Clone, Copy, Debug)]
pub struct SqlOptions {
    /// Applied as the connection busy timeout for every statement.
    pub command_timeout: Duration,
    pub retry: RetryPolicy,
}

impl SqlOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command_timeout(mut self, command_timeout: Duration) -> Self {
        self.command_timeout = command_timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SqlOptions {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SqlStore {
    runner: TxnRunner,
}

impl SqlStore {
    /// Opens (or creates) the database file and installs the catalog.
    pub fn open(path: impl Into<PathBuf>, options: SqlOptions) -> Result<Self, Error> {
        let runner = TxnRunner::new(path, options.command_timeout, options.retry);
        runner.write(catalog::install)?;
        Ok(Self { runner })
    }

    pub fn path(&self) -> &Path {
        self.runner.path()
    }
}

/// Folder names never contain `.`, so the first dot splits the name back apart.
fn physical_name(folder: &str, file: &str) -> String {
    format!("{folder}.{file}")
}

fn table_name(folder: &str, file: &str) -> String {
    quote(&physical_name(folder, file))
}

/// Neither identity part may contain `:` and field names never contain `::`.
fn index_name(folder: &str, file: &str, field: &str) -> String {
    quote(&format!("IX_{}::{field}", physical_name(folder, file)))
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn require_file(conn: &Connection, folder: &str, file: &str) -> Result<(i16, String), Error> {
    catalog::get_file(conn, folder, file)?.ok_or_else(|| Error::not_found(folder, file))
}

/// Field names and types of the physical table, skipping the `Id` column.
fn read_schema(conn: &Connection, folder: &str, file: &str) -> Result<Vec<(String, FieldType)>, Error> {
    let sql = format!("PRAGMA table_info({})", table_name(folder, file));
    let mut stmt = conn.prepare(&sql).map_err(sql_error)?;
    let columns = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?, row.get::<_, i64>(5)?))
        })
        .map_err(sql_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sql_error)?;
    if columns.is_empty() {
        return Err(Error::new(ErrorKind::Corrupt)
            .with_message("catalog entry has no physical table")
            .with_dataset(folder, file));
    }

    let mut fields = Vec::with_capacity(columns.len());
    for (name, declared, pk) in columns {
        if pk != 0 && name == "Id" {
            continue;
        }
        let ty = types::field_type(&declared).map_err(|err| err.with_dataset(folder, file))?;
        fields.push((name, ty));
    }
    Ok(fields)
}

fn row_count(conn: &Connection, folder: &str, file: &str) -> Result<i64, Error> {
    let sql = format!("SELECT COUNT(*) FROM {}", table_name(folder, file));
    conn.query_row(&sql, [], |row| row.get(0)).map_err(sql_error)
}

fn load_metadata(conn: &Connection, folder: &str, file: &str) -> Result<Metadata, Error> {
    let (default_field, desc) = require_file(conn, folder, file)?;
    let mut meta = Metadata::new(folder, file)
        .with_default_field(default_field)
        .with_desc(desc)
        .with_item_count(row_count(conn, folder, file)?);
    for (name, ty) in read_schema(conn, folder, file)? {
        meta = meta.with_field(name, ty);
    }
    Ok(meta)
}

fn create_table(conn: &Connection, meta: &Metadata) -> Result<(), Error> {
    let (folder, file) = (&meta.folder_name, &meta.file_name);
    let table = table_name(folder, file);
    let columns = meta
        .field_names
        .iter()
        .zip(&meta.field_types)
        .map(|(name, ty)| format!("{} {}", quote(name), types::column_type(*ty)))
        .collect::<Vec<_>>()
        .join(", ");
    let mut ddl = format!("CREATE TABLE {table} (\"Id\" INTEGER PRIMARY KEY NOT NULL, {columns});\n");
    for (name, ty) in meta.field_names.iter().zip(&meta.field_types) {
        if !ty.is_indexable() {
            continue;
        }
        let index = index_name(folder, file, name);
        ddl.push_str(&format!("CREATE INDEX {index} ON {table} ({});\n", quote(name)));
    }
    conn.execute_batch(&ddl).map_err(sql_error)
}

fn table_exists(conn: &Connection, folder: &str, file: &str) -> Result<bool, Error> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        params![physical_name(folder, file)],
        |row| row.get(0),
    )
    .map_err(sql_error)
}

fn drop_table(conn: &Connection, folder: &str, file: &str) -> Result<(), Error> {
    let sql = format!("DROP TABLE IF EXISTS {}", table_name(folder, file));
    conn.execute_batch(&sql).map_err(sql_error)
}

fn bind_row(id: i64, row: &Row) -> Result<Vec<rusqlite::types::Value>, Error> {
    let mut bound = Vec::with_capacity(row.len() + 1);
    bound.push(rusqlite::types::Value::Integer(id));
    for value in row {
        bound.push(types::to_sql(value)?);
    }
    Ok(bound)
}

impl Provider for SqlStore {
    fn list_folders(&self) -> Result<Vec<String>, Error> {
        self.runner.read(catalog::list_folders)
    }

    fn list_files(&self, folder: &str) -> Result<Vec<String>, Error> {
        self.runner.read(|conn| catalog::list_files(conn, folder))
    }

    fn file_exists(&self, folder: &str, file: &str) -> Result<bool, Error> {
        validate_identity(folder, file)?;
        self.runner.read(|conn| catalog::file_exists(conn, folder, file))
    }

    fn get_metadata(&self, folder: &str, file: &str) -> Result<Metadata, Error> {
        validate_identity(folder, file)?;
        self.runner.read(|conn| load_metadata(conn, folder, file))
    }

    fn get_items(
        &self,
        folder: &str,
        file: &str,
        start: i64,
        count: i64,
    ) -> Result<Vec<Row>, Error> {
        validate_identity(folder, file)?;
        check_range(start, count)?;
        self.runner.read(|conn| {
            require_file(conn, folder, file)?;
            let schema = read_schema(conn, folder, file)?;
            let columns = schema
                .iter()
                .map(|(name, _)| quote(name))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT {columns} FROM {} WHERE \"Id\" >= ?1 ORDER BY \"Id\" LIMIT ?2",
                table_name(folder, file)
            );
            let mut stmt = conn.prepare(&sql).map_err(sql_error)?;
            let mut rows = stmt.query(params![start, count]).map_err(sql_error)?;
            let mut out = Vec::new();
            while let Some(row) = rows.next().map_err(sql_error)? {
                let mut values = Vec::with_capacity(schema.len());
                for (i, (_, ty)) in schema.iter().enumerate() {
                    let cell = row.get_ref(i).map_err(sql_error)?;
                    let value = types::from_sql(*ty, cell)
                        .map_err(|err| err.with_dataset(folder, file))?;
                    values.push(value);
                }
                out.push(values);
            }
            Ok(out)
        })
    }
}

impl Manager for SqlStore {
    fn add_file(&self, metadata: &Metadata) -> Result<(), Error> {
        metadata.validate()?;
        let (folder, file) = (&metadata.folder_name, &metadata.file_name);
        self.runner.write(|conn| {
            if catalog::file_exists(conn, folder, file)? {
                return Err(Error::already_exists(folder, file));
            }
            if table_exists(conn, folder, file)? {
                return Err(Error::already_exists(folder, file)
                    .with_message("an uncatalogued table already uses this dataset's name")
                    .with_hint("Rename or drop the table before adding the dataset."));
            }
            if catalog::ensure_folder(conn, folder)? {
                debug!(%folder, "registered folder namespace");
            }
            catalog::add_file(conn, folder, file, metadata.default_field, &metadata.desc)?;
            create_table(conn, metadata)
        })?;
        debug!(%folder, %file, fields = metadata.field_count(), "created dataset table");
        Ok(())
    }

    fn edit_file(&self, metadata: &Metadata) -> Result<(), Error> {
        metadata.validate()?;
        let (folder, file) = (&metadata.folder_name, &metadata.file_name);
        let recreated = self.runner.write(|conn| {
            let stored = load_metadata(conn, folder, file)?;
            if stored.desc != metadata.desc || stored.default_field != metadata.default_field {
                catalog::edit_file(conn, folder, file, metadata.default_field, &metadata.desc)?;
            }
            if stored.schema_equals(metadata) {
                return Ok(None);
            }
            drop_table(conn, folder, file)?;
            create_table(conn, metadata)?;
            Ok(Some(stored.item_count))
        })?;
        if let Some(dropped) = recreated {
            debug!(%folder, %file, dropped, "schema changed, dataset table recreated");
        }
        Ok(())
    }

    fn add_items(&self, folder: &str, file: &str, rows: &[Row]) -> Result<(), Error> {
        validate_identity(folder, file)?;
        let failures = self.runner.write(|conn| {
            let meta = load_metadata(conn, folder, file)?;
            let (accepted, mut failures) = partition_rows(&meta, rows);
            if accepted.is_empty() {
                return Ok(failures);
            }

            let columns = meta
                .field_names
                .iter()
                .map(|name| quote(name))
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = (2..=meta.field_count() + 1)
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let table = table_name(folder, file);
            let sql = format!("INSERT INTO {table} (\"Id\", {columns}) VALUES (?1, {placeholders})");
            let mut next_id: i64 = conn
                .query_row(
                    &format!("SELECT COALESCE(MAX(\"Id\") + 1, 0) FROM {table}"),
                    [],
                    |row| row.get(0),
                )
                .map_err(sql_error)?;

            let mut stmt = conn.prepare_cached(&sql).map_err(sql_error)?;
            for (position, row) in accepted {
                let inserted = bind_row(next_id, row).and_then(|bound| {
                    stmt.execute(rusqlite::params_from_iter(bound))
                        .map_err(sql_error)
                });
                match inserted {
                    Ok(_) => next_id += 1,
                    Err(err) if err.is_transient() => return Err(err),
                    Err(err) => {
                        failures.push(err.with_dataset(folder, file).with_index(position as i64));
                    }
                }
            }
            debug!(%folder, %file, next_id, "appended batch");
            Ok(failures)
        })?;

        Error::aggregate(
            format!("{} of {} rows rejected", failures.len(), rows.len()),
            failures,
        )
    }

    fn clear_items(&self, folder: &str, file: &str) -> Result<(), Error> {
        validate_identity(folder, file)?;
        self.runner.write(|conn| {
            require_file(conn, folder, file)?;
            let sql = format!("DELETE FROM {}", table_name(folder, file));
            conn.execute_batch(&sql).map_err(sql_error)
        })
    }

    fn remove_file(&self, folder: &str, file: &str) -> Result<(), Error> {
        validate_identity(folder, file)?;
        self.runner.write(|conn| {
            require_file(conn, folder, file)?;
            catalog::remove_file(conn, folder, file)?;
            drop_table(conn, folder, file)
        })?;
        debug!(%folder, %file, "removed dataset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{SqlOptions, SqlStore, index_name, quote, table_name};
    use crate::core::error::ErrorKind;
    use crate::core::metadata::Metadata;
    use crate::core::sql::RetryPolicy;
    use crate::core::store::{Manager, Provider};
    use crate::core::value::{FieldType, Value};

    fn open(dir: &std::path::Path) -> SqlStore {
        let options = SqlOptions::new().with_retry(RetryPolicy::none());
        SqlStore::open(dir.join("store.db"), options).expect("open")
    }

    fn schema() -> Metadata {
        Metadata::new("lab", "samples")
            .with_desc("bench samples")
            .with_field("Seq", FieldType::Int64)
            .with_field("Label", FieldType::String)
            .with_field("Raw", FieldType::Binary)
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(table_name("lab", "samples"), "\"lab.samples\"");
        assert_eq!(index_name("lab", "samples", "Seq"), "\"IX_lab.samples::Seq\"");
        assert_eq!(quote("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn dotted_file_names_keep_datasets_apart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open(dir.path());
        let first = Metadata::new("a", "b.c").with_field("N", FieldType::Int64);
        store.add_file(&first).expect("dotted file");
        store
            .add_items("a", "b.c", &[vec![Value::Int64(1)], vec![Value::Int64(2)]])
            .expect("items");

        let dotted_folder = Metadata::new("a.b", "c").with_field("S", FieldType::String);
        let err = store.add_file(&dotted_folder).expect_err("dotted folder");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let meta = store.get_metadata("a", "b.c").expect("meta");
        assert!(meta.schema_equals(&first));
        assert_eq!(meta.item_count, 2);
    }

    #[test]
    fn index_names_do_not_collide_across_datasets() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open(dir.path());
        store
            .add_file(&Metadata::new("f", "a_b").with_field("c", FieldType::Int64))
            .expect("first");
        store
            .add_file(&Metadata::new("f", "a").with_field("b_c", FieldType::Int64))
            .expect("second");
        assert_eq!(store.list_files("f").expect("files"), vec!["a", "a_b"]);
    }

    #[test]
    fn uncatalogued_table_is_not_clobbered() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open(dir.path());
        let conn = rusqlite::Connection::open(store.path()).expect("conn");
        conn.execute_batch(
            "CREATE TABLE \"lab.samples\" (x INT); INSERT INTO \"lab.samples\" VALUES (7);",
        )
        .expect("foreign table");

        let err = store.add_file(&schema()).expect_err("occupied");
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert!(!store.file_exists("lab", "samples").expect("exists"));
        let kept: i64 = conn
            .query_row("SELECT x FROM \"lab.samples\"", [], |row| row.get(0))
            .expect("row survives");
        assert_eq!(kept, 7);
    }

    #[test]
    fn failure_index_is_the_batch_position() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open(dir.path());
        store.add_file(&schema()).expect("add");
        let good = vec![Value::Int64(1), Value::Null, Value::Null];
        let mistyped = vec![Value::Null, Value::Int64(2), Value::Null];
        let short = vec![Value::Null];
        let err = store
            .add_items("lab", "samples", &[mistyped, good.clone(), short, good])
            .expect_err("aggregate");
        let indexes = err.failures().iter().map(|failure| failure.index()).collect::<Vec<_>>();
        assert_eq!(indexes, vec![Some(0), Some(2)]);
        assert_eq!(store.get_metadata("lab", "samples").expect("meta").item_count, 2);
    }

    #[test]
    fn unformattable_timestamp_is_collected_not_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open(dir.path());
        let meta = Metadata::new("lab", "stamps").with_field("At", FieldType::DateTime);
        store.add_file(&meta).expect("add");
        let ok = vec![Value::DateTime(time::macros::datetime!(2024-01-01 0:00 UTC))];
        let ancient = time::Date::from_calendar_date(-1, time::Month::January, 1)
            .expect("date")
            .midnight()
            .assume_utc();
        let row = vec![Value::DateTime(ancient)];
        let bound = super::bind_row(0, &row);
        assert_eq!(bound.expect_err("no text form").kind(), ErrorKind::InvalidArgument);

        let err = store
            .add_items("lab", "stamps", &[ok.clone(), row, ok.clone()])
            .expect_err("aggregate");
        assert_eq!(err.kind(), ErrorKind::Aggregate);
        assert_eq!(err.failures()[0].index(), Some(1));
        assert_eq!(store.get_items("lab", "stamps", 0, 10).expect("rows"), vec![ok.clone(), ok]);
    }

    #[test]
    fn metadata_is_derived_from_table_and_catalog() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open(dir.path());
        store.add_file(&schema().with_item_count(99)).expect("add");

        let meta = store.get_metadata("lab", "samples").expect("meta");
        assert!(meta.schema_equals(&schema()));
        assert_eq!(meta.item_count, 0);
        assert_eq!(meta.desc, "bench samples");
        assert_eq!(store.list_folders().expect("folders"), vec!["lab"]);
        assert_eq!(store.list_files("lab").expect("files"), vec!["samples"]);
    }

    #[test]
    fn ids_restart_at_zero_after_clear() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open(dir.path());
        store.add_file(&schema()).expect("add");
        let row = vec![Value::Int64(1), Value::Null, Value::Binary(vec![1, 2])];
        store.add_items("lab", "samples", &[row.clone(), row.clone()]).expect("items");
        store.clear_items("lab", "samples").expect("clear");
        store.add_item("lab", "samples", &row).expect("item");

        assert_eq!(store.get_item("lab", "samples", 0).expect("first"), row);
        let err = store.get_item("lab", "samples", 1).expect_err("past end");
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn rejected_rows_do_not_stop_the_batch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open(dir.path());
        store.add_file(&schema()).expect("add");
        let good = vec![Value::Int64(1), Value::String("a".into()), Value::Null];
        let bad = vec![Value::String("oops".into()), Value::Null, Value::Null];
        let err = store
            .add_items("lab", "samples", &[good.clone(), bad, good.clone()])
            .expect_err("aggregate");

        assert_eq!(err.kind(), ErrorKind::Aggregate);
        assert_eq!(err.failures().len(), 1);
        assert_eq!(err.failures()[0].index(), Some(1));
        assert_eq!(store.get_metadata("lab", "samples").expect("meta").item_count, 2);
        assert_eq!(store.get_items("lab", "samples", 0, 10).expect("rows"), vec![good.clone(), good]);
    }

    #[test]
    fn description_only_edit_keeps_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open(dir.path());
        store.add_file(&schema()).expect("add");
        let row = vec![Value::Int64(5), Value::Null, Value::Null];
        store.add_item("lab", "samples", &row).expect("item");

        store
            .edit_file(&schema().with_desc("renamed").with_default_field(1))
            .expect("edit");
        let meta = store.get_metadata("lab", "samples").expect("meta");
        assert_eq!(meta.desc, "renamed");
        assert_eq!(meta.default_field, 1);
        assert_eq!(meta.item_count, 1);
    }

    #[test]
    fn remove_file_drops_table_and_catalog_row() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open(dir.path());
        store.add_file(&schema()).expect("add");
        store.remove_file("lab", "samples").expect("remove");

        assert!(!store.file_exists("lab", "samples").expect("exists"));
        let err = store.get_metadata("lab", "samples").expect_err("gone");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        store.add_file(&schema()).expect("re-add");
    }
}
