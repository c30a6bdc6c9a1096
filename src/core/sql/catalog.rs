// Catalog procedures for the reserved `DataIO` namespace.
//
// Folder names are registered in `DataIO_Folders` (the namespace registry) and
// dataset identities plus descriptive metadata live in `DataIO_Files`. Every
// procedure runs inside the caller's transaction.
use rusqlite::{Connection, OptionalExtension, params};

use crate::core::error::Error;
use crate::core::sql::txn::sql_error;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS "DataIO_Folders" (
    Name TEXT PRIMARY KEY NOT NULL
);
CREATE TABLE IF NOT EXISTS "DataIO_Files" (
    Folder TEXT NOT NULL,
    File TEXT NOT NULL,
    DefaultField INTEGER NOT NULL DEFAULT 0,
    Description TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (Folder, File)
);
"#;

pub(crate) fn install(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(SCHEMA).map_err(sql_error)
}

pub(crate) fn list_folders(conn: &Connection) -> Result<Vec<String>, Error> {
    collect_names(conn, r#"SELECT Name FROM "DataIO_Folders" ORDER BY Name"#, [])
}

pub(crate) fn list_files(conn: &Connection, folder: &str) -> Result<Vec<String>, Error> {
    collect_names(
        conn,
        r#"SELECT File FROM "DataIO_Files" WHERE Folder = ?1 ORDER BY File"#,
        [folder],
    )
}

pub(crate) fn file_exists(conn: &Connection, folder: &str, file: &str) -> Result<bool, Error> {
    conn.query_row(
        r#"SELECT EXISTS(SELECT 1 FROM "DataIO_Files" WHERE Folder = ?1 AND File = ?2)"#,
        [folder, file],
        |row| row.get(0),
    )
    .map_err(sql_error)
}

/// Returns `(default_field, desc)` for a registered dataset.
pub(crate) fn get_file(
    conn: &Connection,
    folder: &str,
    file: &str,
) -> Result<Option<(i16, String)>, Error> {
    conn.query_row(
        r#"SELECT DefaultField, Description FROM "DataIO_Files" WHERE Folder = ?1 AND File = ?2"#,
        [folder, file],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
    .map_err(sql_error)
}

/// Registers the folder namespace if this is its first dataset.
pub(crate) fn ensure_folder(conn: &Connection, folder: &str) -> Result<bool, Error> {
    let inserted = conn
        .execute(
            r#"INSERT OR IGNORE INTO "DataIO_Folders" (Name) VALUES (?1)"#,
            [folder],
        )
        .map_err(sql_error)?;
    Ok(inserted > 0)
}

pub(crate) fn add_file(
    conn: &Connection,
    folder: &str,
    file: &str,
    default_field: i16,
    desc: &str,
) -> Result<(), Error> {
    conn.execute(
        r#"INSERT INTO "DataIO_Files" (Folder, File, DefaultField, Description) VALUES (?1, ?2, ?3, ?4)"#,
        params![folder, file, default_field, desc],
    )
    .map_err(sql_error)?;
    Ok(())
}

pub(crate) fn edit_file(
    conn: &Connection,
    folder: &str,
    file: &str,
    default_field: i16,
    desc: &str,
) -> Result<(), Error> {
    conn.execute(
        r#"UPDATE "DataIO_Files" SET DefaultField = ?3, Description = ?4 WHERE Folder = ?1 AND File = ?2"#,
        params![folder, file, default_field, desc],
    )
    .map_err(sql_error)?;
    Ok(())
}

pub(crate) fn remove_file(conn: &Connection, folder: &str, file: &str) -> Result<(), Error> {
    conn.execute(
        r#"DELETE FROM "DataIO_Files" WHERE Folder = ?1 AND File = ?2"#,
        [folder, file],
    )
    .map_err(sql_error)?;
    Ok(())
}

fn collect_names<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<String>, Error> {
    let mut stmt = conn.prepare(sql).map_err(sql_error)?;
    let rows = stmt
        .query_map(params, |row| row.get::<_, String>(0))
        .map_err(sql_error)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_error)
}
