// Text header stored in `<file>.meta`: description, counts, and the field list.
use crate::core::error::{Error, ErrorKind};
use crate::core::metadata::Metadata;
use crate::core::value::FieldType;

const ITEMS_SUFFIX: &str = "items";
const PAGE_SUFFIX: &str = "items/page";
const DIMS_SUFFIX: &str = "dims";
const DEFAULT_SUFFIX: &str = "default";

pub(crate) fn encode(meta: &Metadata) -> String {
    let fields = meta
        .field_names
        .iter()
        .zip(&meta.field_types)
        .map(|(name, ty)| format!("{name}::{}", ty.name()))
        .collect::<Vec<_>>()
        .join("\t");
    // Line five stays blank unless a non-zero default field must be kept.
    let default_line = if meta.default_field == 0 {
        String::new()
    } else {
        format!("{} {DEFAULT_SUFFIX}", meta.default_field)
    };
    format!(
        "{}\n{} {ITEMS_SUFFIX}\n{} {PAGE_SUFFIX}\n{} {DIMS_SUFFIX}\n{default_line}\n{fields}\n",
        meta.desc,
        meta.item_count,
        meta.page_size,
        meta.field_count(),
    )
}

pub(crate) fn decode(folder: &str, file: &str, text: &str) -> Result<Metadata, Error> {
    let corrupt = |message: String| {
        Error::new(ErrorKind::Corrupt)
            .with_message(message)
            .with_dataset(folder, file)
    };
    let mut lines = text.lines();
    let mut next_line = |what: &str| {
        lines
            .next()
            .ok_or_else(|| corrupt(format!("meta file ends before {what}")))
    };

    let desc = next_line("description")?.to_string();
    let item_count: i64 = counted(next_line("item count")?, ITEMS_SUFFIX).map_err(&corrupt)?;
    let page_size: usize = counted(next_line("page size")?, PAGE_SUFFIX).map_err(&corrupt)?;
    let dims: usize = counted(next_line("field count")?, DIMS_SUFFIX).map_err(&corrupt)?;
    let default_line = next_line("field list")?;
    let default_field: i16 = if default_line.trim().is_empty() {
        0
    } else {
        counted(default_line, DEFAULT_SUFFIX).map_err(&corrupt)?
    };
    let field_line = next_line("field list")?;

    let mut meta = Metadata::new(folder, file)
        .with_desc(desc)
        .with_item_count(item_count)
        .with_page_size(page_size)
        .with_default_field(default_field);
    for entry in field_line.split('\t') {
        let (name, type_name) = entry
            .rsplit_once("::")
            .ok_or_else(|| corrupt(format!("field entry `{entry}` lacks a type")))?;
        let ty = FieldType::from_name(type_name)
            .map_err(|err| corrupt(err.message().unwrap_or("unknown type").to_string()))?;
        meta = meta.with_field(name, ty);
    }

    if meta.field_count() != dims {
        return Err(corrupt(format!(
            "header declares {dims} dims but lists {} fields",
            meta.field_count()
        )));
    }
    if item_count < 0 || page_size == 0 {
        return Err(corrupt("negative item count or zero page size".to_string()));
    }
    Ok(meta)
}

fn counted<T: std::str::FromStr>(line: &str, suffix: &str) -> Result<T, String> {
    let (number, rest) = line
        .trim()
        .split_once(' ')
        .ok_or_else(|| format!("expected `<n> {suffix}`, found `{line}`"))?;
    if rest.trim() != suffix {
        return Err(format!("expected `<n> {suffix}`, found `{line}`"));
    }
    number
        .parse()
        .map_err(|_| format!("`{number}` is not a valid count"))
}
