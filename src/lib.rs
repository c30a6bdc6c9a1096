//! Purpose: Shared library crate used by the `dataio` CLI and tests.
//! Exports: `core` (contract, backends, errors), `sync` (copy/import), `api` (public surface).
//! Role: Schema-typed tabular datasets over flat files or SQLite, with incremental sync.
//! Invariants: Backends are stateless handles; every call derives state from storage.
//! Invariants: Configuration is passed explicitly; there is no process-wide mutable state.
pub mod api;
pub mod core;
pub mod sync;
