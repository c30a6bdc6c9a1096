//! Purpose: Paginated flat-file implementation of the dataset contract.
//! Exports: `FlatFileStore`, `FlatFileOptions`.
//! Role: Stores `<base>/<folder>/<file>.meta` plus `<file>.<page>.data` page files.
//! Invariants: Row `i` lives in page `i / page_size` at line `i % page_size`.
//! Invariants: The meta file is rewritten after every successful batch; files are
//! opened per call and never held open between calls.

mod meta;
mod page;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::error::{Error, io_error};
use crate::core::metadata::{Metadata, validate_identity};
use crate::core::store::{Manager, Provider, check_range, partition_rows};
use crate::core::value::Row;

const META_EXT: &str = "meta";
const PAGE_EXT: &str = "data";

#[derive(Clone, Copy, Debug, Default)]
pub struct FlatFileOptions {
    /// When set, every dataset created through this store uses this page size
    /// instead of the one carried by the incoming metadata.
    pub page_size: Option<usize>,
}

impl FlatFileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

#[derive(Clone, Debug)]
pub struct FlatFileStore {
    base_dir: PathBuf,
    options: FlatFileOptions,
}

impl FlatFileStore {
    /// Opens a store rooted at `base_dir`, creating the directory if missing.
    pub fn open(base_dir: impl Into<PathBuf>, options: FlatFileOptions) -> Result<Self, Error> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).map_err(|err| {
            io_error(err, &base_dir).with_message("failed to create store directory")
        })?;
        if options.page_size == Some(0) {
            return Err(Error::invalid("page size must be positive"));
        }
        Ok(Self { base_dir, options })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn folder_dir(&self, folder: &str) -> PathBuf {
        self.base_dir.join(folder)
    }

    fn meta_path(&self, folder: &str, file: &str) -> PathBuf {
        self.folder_dir(folder).join(format!("{file}.{META_EXT}"))
    }

    fn page_path(&self, folder: &str, file: &str, page: i64) -> PathBuf {
        self.folder_dir(folder)
            .join(format!("{file}.{page}.{PAGE_EXT}"))
    }

    fn read_meta(&self, folder: &str, file: &str) -> Result<Metadata, Error> {
        validate_identity(folder, file)?;
        let path = self.meta_path(folder, file);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::not_found(folder, file));
            }
            Err(err) => return Err(io_error(err, &path).with_dataset(folder, file)),
        };
        meta::decode(folder, file, &text).map_err(|err| err.with_path(&path))
    }

    fn write_meta(&self, meta: &Metadata) -> Result<(), Error> {
        let path = self.meta_path(&meta.folder_name, &meta.file_name);
        fs::write(&path, meta::encode(meta)).map_err(|err| io_error(err, &path))
    }

    /// Deletes pages `0..=last` for the stored item count.
    fn remove_pages(&self, meta: &Metadata) -> Result<(), Error> {
        if meta.item_count == 0 {
            return Ok(());
        }
        let last_page = (meta.item_count - 1) / meta.page_size as i64;
        for page_index in 0..=last_page {
            page::remove(&self.page_path(&meta.folder_name, &meta.file_name, page_index))?;
        }
        debug!(
            folder = %meta.folder_name,
            file = %meta.file_name,
            pages = last_page + 1,
            "removed page files"
        );
        Ok(())
    }
}

impl Provider for FlatFileStore {
    fn list_folders(&self) -> Result<Vec<String>, Error> {
        let entries = fs::read_dir(&self.base_dir).map_err(|err| {
            io_error(err, &self.base_dir).with_message("failed to read store directory")
        })?;
        let mut folders = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| io_error(err, &self.base_dir))?;
            let is_dir = entry
                .file_type()
                .map_err(|err| io_error(err, entry.path()))?
                .is_dir();
            if let (true, Some(name)) = (is_dir, entry.file_name().to_str()) {
                if !name.contains('.') {
                    folders.push(name.to_string());
                }
            }
        }
        folders.sort();
        Ok(folders)
    }

    fn list_files(&self, folder: &str) -> Result<Vec<String>, Error> {
        let dir = self.folder_dir(folder);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_error(err, &dir)),
        };
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|err| io_error(err, &dir))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(META_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                files.push(stem.to_string());
            }
        }
        files.sort();
        Ok(files)
    }

    fn file_exists(&self, folder: &str, file: &str) -> Result<bool, Error> {
        validate_identity(folder, file)?;
        Ok(self.meta_path(folder, file).is_file())
    }

    fn get_metadata(&self, folder: &str, file: &str) -> Result<Metadata, Error> {
        self.read_meta(folder, file)
    }

    fn get_items(
        &self,
        folder: &str,
        file: &str,
        start: i64,
        count: i64,
    ) -> Result<Vec<Row>, Error> {
        check_range(start, count)?;
        let meta = self.read_meta(folder, file)?;
        let end = start.saturating_add(count).min(meta.item_count);
        if start >= end {
            return Ok(Vec::new());
        }

        let page_size = meta.page_size as i64;
        let first_page = start / page_size;
        let last_page = (end - 1) / page_size;
        let mut rows = Vec::with_capacity((end - start) as usize);
        for page_index in first_page..=last_page {
            let page_start = page_index * page_size;
            let skip = (start - page_start).max(0);
            let stop = (end - page_start).min(page_size);
            let path = self.page_path(folder, file, page_index);
            let page_rows =
                page::read_rows(&path, &meta.field_types, skip as usize, (stop - skip) as usize)
                    .map_err(|err| err.with_dataset(folder, file))?;
            rows.extend(page_rows);
        }
        Ok(rows)
    }
}

impl Manager for FlatFileStore {
    fn add_file(&self, metadata: &Metadata) -> Result<(), Error> {
        metadata.validate()?;
        let (folder, file) = (&metadata.folder_name, &metadata.file_name);
        if self.file_exists(folder, file)? {
            return Err(Error::already_exists(folder, file));
        }
        let dir = self.folder_dir(folder);
        fs::create_dir_all(&dir).map_err(|err| io_error(err, &dir))?;

        let mut created = metadata.clone().with_item_count(0);
        if let Some(page_size) = self.options.page_size {
            created.page_size = page_size;
        }
        self.write_meta(&created)?;
        debug!(%folder, %file, page_size = created.page_size, "created dataset");
        Ok(())
    }

    fn edit_file(&self, metadata: &Metadata) -> Result<(), Error> {
        metadata.validate()?;
        let stored = self.read_meta(&metadata.folder_name, &metadata.file_name)?;
        if stored.schema_equals(metadata) {
            if stored.desc == metadata.desc && stored.default_field == metadata.default_field {
                return Ok(());
            }
            let updated = Metadata {
                desc: metadata.desc.clone(),
                default_field: metadata.default_field,
                ..stored
            };
            return self.write_meta(&updated);
        }

        self.remove_pages(&stored)?;
        let mut recreated = metadata.clone().with_item_count(0);
        if let Some(page_size) = self.options.page_size {
            recreated.page_size = page_size;
        }
        self.write_meta(&recreated)?;
        debug!(
            folder = %metadata.folder_name,
            file = %metadata.file_name,
            dropped = stored.item_count,
            "schema changed, dataset recreated"
        );
        Ok(())
    }

    fn add_items(&self, folder: &str, file: &str, rows: &[Row]) -> Result<(), Error> {
        let mut meta = self.read_meta(folder, file)?;
        let (accepted, mut failures) = partition_rows(&meta, rows);
        let mut lines = Vec::with_capacity(accepted.len());
        for (position, row) in accepted {
            match page::encode_row(row) {
                Ok(line) => lines.push(line),
                Err(err) => failures.push(
                    err.with_dataset(folder, file)
                        .with_index(position as i64),
                ),
            }
        }
        failures.sort_by_key(|failure| failure.index());

        let page_size = meta.page_size as i64;
        let committed = meta.item_count;
        let mut remaining = lines.as_slice();
        while !remaining.is_empty() {
            let page_index = meta.item_count / page_size;
            let offset = meta.item_count % page_size;
            let room = (page_size - offset) as usize;
            let (chunk, rest) = remaining.split_at(room.min(remaining.len()));
            let path = self.page_path(folder, file, page_index);
            if let Err(err) = page::write_lines(&path, chunk, offset as usize) {
                // Record the pages that did land; the next append trims this one.
                if meta.item_count != committed {
                    self.write_meta(&meta)?;
                }
                return Err(err.with_dataset(folder, file));
            }
            meta.item_count += chunk.len() as i64;
            remaining = rest;
            if offset == 0 {
                debug!(%folder, %file, page = page_index, "started page");
            }
        }
        if !lines.is_empty() {
            self.write_meta(&meta)?;
        }

        Error::aggregate(
            format!("{} of {} rows rejected", failures.len(), rows.len()),
            failures,
        )
    }

    fn clear_items(&self, folder: &str, file: &str) -> Result<(), Error> {
        let meta = self.read_meta(folder, file)?;
        self.remove_pages(&meta)?;
        self.write_meta(&meta.with_item_count(0))
    }

    fn remove_file(&self, folder: &str, file: &str) -> Result<(), Error> {
        let meta = self.read_meta(folder, file)?;
        self.remove_pages(&meta)?;
        page::remove(&self.meta_path(folder, file))
    }
}
