// Error kinds shared by both storage backends and the sync layer.
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    InvalidArgument,
    NotFound,
    AlreadyExists,
    OutOfRange,
    Transient,
    Aggregate,
    Corrupt,
    Io,
    Database,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    path: Option<PathBuf>,
    dataset: Option<String>,
    index: Option<i64>,
    failures: Vec<Error>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            path: None,
            dataset: None,
            index: None,
            failures: Vec::new(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn path(&self) -> Option<&std::path::Path> {
        self.path.as_deref()
    }

    pub fn dataset(&self) -> Option<&str> {
        self.dataset.as_deref()
    }

    pub fn index(&self) -> Option<i64> {
        self.index
    }

    /// Child errors collected by a batch append or a sync run.
    pub fn failures(&self) -> &[Error] {
        &self.failures
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_dataset(mut self, folder: &str, file: &str) -> Self {
        self.dataset = Some(format!("{folder}/{file}"));
        self
    }

    pub fn with_index(mut self, index: i64) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_failures(mut self, failures: Vec<Error>) -> Self {
        self.failures = failures;
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::Transient
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument).with_message(message)
    }

    pub(crate) fn not_found(folder: &str, file: &str) -> Self {
        Self::new(ErrorKind::NotFound)
            .with_message("dataset does not exist")
            .with_dataset(folder, file)
    }

    pub(crate) fn already_exists(folder: &str, file: &str) -> Self {
        Self::new(ErrorKind::AlreadyExists)
            .with_message("dataset already exists")
            .with_dataset(folder, file)
    }

    /// Wraps collected failures; `Ok` when nothing failed.
    pub(crate) fn aggregate(message: impl Into<String>, failures: Vec<Error>) -> Result<(), Self> {
        if failures.is_empty() {
            return Ok(());
        }
        Err(Self::new(ErrorKind::Aggregate)
            .with_message(message)
            .with_failures(failures))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(dataset) = &self.dataset {
            write!(f, " (dataset: {dataset})")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        if let Some(index) = self.index {
            write!(f, " (index: {index})")?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        if !self.failures.is_empty() {
            write!(f, " [{} failed:", self.failures.len())?;
            for (i, failure) in self.failures.iter().enumerate() {
                let sep = if i == 0 { " " } else { "; " };
                write!(f, "{sep}{failure}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub(crate) fn io_error_kind(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        _ => ErrorKind::Io,
    }
}

pub(crate) fn io_error(err: io::Error, path: impl Into<PathBuf>) -> Error {
    Error::new(io_error_kind(&err))
        .with_path(path)
        .with_source(err)
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::InvalidArgument => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::AlreadyExists => 4,
        ErrorKind::OutOfRange => 5,
        ErrorKind::Transient => 6,
        ErrorKind::Aggregate => 7,
        ErrorKind::Corrupt => 8,
        ErrorKind::Io => 9,
        ErrorKind::Database => 10,
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, to_exit_code};

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (ErrorKind::Internal, 1),
            (ErrorKind::InvalidArgument, 2),
            (ErrorKind::NotFound, 3),
            (ErrorKind::AlreadyExists, 4),
            (ErrorKind::OutOfRange, 5),
            (ErrorKind::Transient, 6),
            (ErrorKind::Aggregate, 7),
            (ErrorKind::Corrupt, 8),
            (ErrorKind::Io, 9),
            (ErrorKind::Database, 10),
        ];

        for (kind, code) in cases {
            assert_eq!(to_exit_code(kind), code);
        }
    }

    #[test]
    fn aggregate_is_ok_without_failures() {
        assert!(Error::aggregate("nothing", Vec::new()).is_ok());
    }

    #[test]
    fn aggregate_display_names_every_failure() {
        let failures = vec![
            Error::not_found("a", "one"),
            Error::new(ErrorKind::OutOfRange).with_index(7),
        ];
        let err = Error::aggregate("batch failed", failures).expect_err("aggregate");
        assert_eq!(err.kind(), ErrorKind::Aggregate);
        assert_eq!(err.failures().len(), 2);

        let text = err.to_string();
        assert!(text.contains("batch failed"));
        assert!(text.contains("a/one"));
        assert!(text.contains("index: 7"));
    }
}
