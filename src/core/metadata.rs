// Schema and identity record for one dataset.
use crate::core::error::Error;
use crate::core::value::{FieldType, Row, Value};

pub const DEFAULT_PAGE_SIZE: usize = 10_000;

#[derive(Clone, Debug, PartialEq)]
pub struct Metadata {
    pub folder_name: String,
    pub file_name: String,
    pub field_names: Vec<String>,
    pub field_types: Vec<FieldType>,
    pub default_field: i16,
    pub item_count: i64,
    pub desc: String,
    /// Rows per page file; only the flat-file backend reads it.
    pub page_size: usize,
}

impl Metadata {
    pub fn new(folder_name: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            folder_name: folder_name.into(),
            file_name: file_name.into(),
            field_names: Vec::new(),
            field_types: Vec::new(),
            default_field: 0,
            item_count: 0,
            desc: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.field_names.push(name.into());
        self.field_types.push(field_type);
        self
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    pub fn with_default_field(mut self, default_field: i16) -> Self {
        self.default_field = default_field;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_item_count(mut self, item_count: i64) -> Self {
        self.item_count = item_count;
        self
    }

    pub fn field_count(&self) -> usize {
        self.field_types.len()
    }

    /// Positional, case-sensitive comparison of (name, type) pairs.
    pub fn schema_equals(&self, other: &Metadata) -> bool {
        self.field_names == other.field_names && self.field_types == other.field_types
    }

    pub fn validate(&self) -> Result<(), Error> {
        validate_identity(&self.folder_name, &self.file_name)?;
        if self.field_names.is_empty() || self.field_types.is_empty() {
            return Err(Error::invalid("schema must define at least one field")
                .with_dataset(&self.folder_name, &self.file_name));
        }
        if self.field_names.len() != self.field_types.len() {
            return Err(Error::invalid(format!(
                "{} field names but {} field types",
                self.field_names.len(),
                self.field_types.len()
            ))
            .with_dataset(&self.folder_name, &self.file_name));
        }
        for name in &self.field_names {
            validate_field_name(name)?;
        }
        if self.default_field < 0 || self.default_field as usize >= self.field_count() {
            return Err(Error::invalid(format!(
                "default field {} is not a field index",
                self.default_field
            ))
            .with_dataset(&self.folder_name, &self.file_name));
        }
        if self.page_size == 0 {
            return Err(Error::invalid("page size must be positive"));
        }
        if self.desc.contains(['\n', '\r']) {
            return Err(Error::invalid("description must be a single line"));
        }
        Ok(())
    }

    /// Checks arity and per-field type of one row against this schema.
    pub fn check_row(&self, row: &Row) -> Result<(), Error> {
        if row.len() != self.field_count() {
            return Err(Error::invalid(format!(
                "row has {} values, schema has {} fields",
                row.len(),
                self.field_count()
            )));
        }
        for ((value, ty), name) in row.iter().zip(&self.field_types).zip(&self.field_names) {
            if !value.fits(*ty) {
                return Err(Error::invalid(format!(
                    "field `{name}` expects {ty}, got {:?}",
                    value.field_type()
                )));
            }
            if matches!(value, Value::DateTime(_)) {
                value.to_text().map_err(|err| {
                    err.with_message(format!(
                        "field `{name}` holds a timestamp with no RFC 3339 form"
                    ))
                })?;
            }
        }
        Ok(())
    }
}

/// Folder and file names become directory names and SQL identifiers.
/// Folder names carry no `.` so the `<folder>.<file>` table name splits one way only.
pub fn validate_identity(folder: &str, file: &str) -> Result<(), Error> {
    validate_name("folder", folder)?;
    if folder.contains('.') {
        return Err(Error::invalid(format!("folder name `{folder}` must not contain `.`"))
            .with_hint("Dots are allowed in file names only."));
    }
    validate_name("file", file)
}

fn validate_name(label: &str, name: &str) -> Result<(), Error> {
    if name.trim().is_empty() {
        return Err(Error::invalid(format!("{label} name must not be empty")));
    }
    if name == "." || name == ".." {
        return Err(Error::invalid(format!("{label} name `{name}` is reserved")));
    }
    if name
        .chars()
        .any(|ch| ch.is_control() || matches!(ch, '/' | '\\' | '"' | ':' | '\t'))
    {
        return Err(Error::invalid(format!(
            "{label} name `{name}` contains a reserved character"
        ))
        .with_hint("Names must not contain path separators, quotes, colons or control characters."));
    }
    Ok(())
}

fn validate_field_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::invalid("field name must not be empty"));
    }
    if name.contains("::") || name.chars().any(|ch| ch.is_control() || ch == '"') {
        return Err(Error::invalid(format!(
            "field name `{name}` contains a reserved character"
        )));
    }
    if name.eq_ignore_ascii_case("Id") {
        return Err(Error::invalid("field name `Id` is reserved for the row index"));
    }
    Ok(())
}
