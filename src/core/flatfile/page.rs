// Page files: one row per line, values tab-separated in field order.
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::core::error::{Error, ErrorKind, io_error};
use crate::core::value::{FieldType, Row, Value};

/// Reads `take` rows of one page after skipping `skip` rows.
pub(crate) fn read_rows(
    path: &Path,
    types: &[FieldType],
    skip: usize,
    take: usize,
) -> Result<Vec<Row>, Error> {
    let file = File::open(path).map_err(|err| io_error(err, path))?;
    let mut rows = Vec::with_capacity(take);
    for (offset, line) in BufReader::new(file).lines().enumerate().skip(skip).take(take) {
        let line = line.map_err(|err| io_error(err, path))?;
        let row = decode_row(&line, types).map_err(|err| {
            err.with_path(path).with_index(offset as i64)
        })?;
        rows.push(row);
    }
    if rows.len() < take {
        return Err(Error::new(ErrorKind::Corrupt)
            .with_message(format!(
                "page holds {} rows past offset {skip}, header promised {take}",
                rows.len()
            ))
            .with_path(path));
    }
    Ok(rows)
}

/// Writes encoded rows to a page after its first `offset` rows.
/// Lines past `offset` are left over from an interrupted append and are cut off.
pub(crate) fn write_lines(path: &Path, lines: &[String], offset: usize) -> Result<(), Error> {
    let file = if offset == 0 {
        File::create(path).map_err(|err| io_error(err, path))?
    } else {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|err| io_error(err, path))?;
        let end = line_end(&file, offset, path)?;
        file.set_len(end).map_err(|err| io_error(err, path))?;
        file.seek(SeekFrom::Start(end))
            .map_err(|err| io_error(err, path))?;
        file
    };
    let mut writer = BufWriter::new(file);
    for line in lines {
        writer
            .write_all(line.as_bytes())
            .map_err(|err| io_error(err, path))?;
    }
    writer.flush().map_err(|err| io_error(err, path))?;
    Ok(())
}

/// Byte position just past the first `rows` lines of a page.
fn line_end(file: &File, rows: usize, path: &Path) -> Result<u64, Error> {
    let mut reader = BufReader::new(file);
    let mut line = Vec::new();
    let mut end = 0u64;
    for seen in 0..rows {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(|err| io_error(err, path))?;
        if read == 0 || line.last() != Some(&b'\n') {
            return Err(Error::new(ErrorKind::Corrupt).with_message(format!(
                "page holds {seen} complete rows, header promised {rows}"
            ))
            .with_path(path));
        }
        end += read as u64;
    }
    Ok(end)
}

/// Missing pages are fine; a cleared dataset may never have filled them.
pub(crate) fn remove(path: &Path) -> Result<(), Error> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_error(err, path)),
    }
}

pub(crate) fn encode_row(row: &Row) -> Result<String, Error> {
    let mut line = String::new();
    for (i, value) in row.iter().enumerate() {
        if i > 0 {
            line.push('\t');
        }
        line.push_str(&value.to_text()?);
    }
    line.push('\n');
    Ok(line)
}

fn decode_row(line: &str, types: &[FieldType]) -> Result<Row, Error> {
    let cells = line.split('\t').collect::<Vec<_>>();
    if cells.len() != types.len() {
        return Err(Error::new(ErrorKind::Corrupt).with_message(format!(
            "row has {} cells, schema has {} fields",
            cells.len(),
            types.len()
        )));
    }
    cells
        .into_iter()
        .zip(types)
        .map(|(cell, ty)| Value::from_text(*ty, cell))
        .collect()
}
