//! Purpose: Define the stable public Rust API boundary for dataio.
//! Exports: Contract traits, both backends, metadata/value types, sync entry points.
//! Role: Public, additive-only surface used by the CLI and embedders.
//! Invariants: Everything a caller needs is reachable from this module.

mod client;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::flatfile::{FlatFileOptions, FlatFileStore};
pub use crate::core::metadata::{DEFAULT_PAGE_SIZE, Metadata};
pub use crate::core::sql::{Backoff, RetryPolicy, SqlOptions, SqlStore};
pub use crate::core::store::{Manager, Provider};
pub use crate::core::value::{FieldType, Row, Value};
pub use crate::sync::{CopyOptions, DatasetSync, SyncOutcome, SyncReport, copy_data, import_data};
pub use client::{ApiResult, Store, StoreOptions, StoreRef};
