//! Purpose: Hold top-level CLI command dispatch for `dataio`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Every store access goes through `api::StoreRef::open` and the contract traits.
//! Invariants: Sync failures surface as one aggregate error after all datasets ran.

use super::*;
use dataio::api::{
    CopyOptions, FlatFileOptions, Provider, RetryPolicy, SqlOptions, Store, StoreOptions,
    StoreRef, copy_data, import_data,
};
use super::metadata_json::{metadata_json, report_json, rows_json};
use tracing::debug;

pub(super) fn dispatch_command(
    command: Command,
    settings: StoreSettings,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "dataio", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Folders { store } => {
            let store = open_store(&store, settings)?;
            emit_json(json!({ "folders": store.list_folders()? }));
            Ok(RunOutcome::ok())
        }
        Command::Files { store, folder } => {
            let store = open_store(&store, settings)?;
            let files = store.list_files(&folder)?;
            emit_json(json!({ "folder": folder, "files": files }));
            Ok(RunOutcome::ok())
        }
        Command::Info {
            store,
            folder,
            file,
        } => {
            let store = open_store(&store, settings)?;
            let meta = store.get_metadata(&folder, &file)?;
            emit_json(metadata_json(&meta));
            Ok(RunOutcome::ok())
        }
        Command::Get {
            store,
            folder,
            file,
            start,
            count,
        } => {
            let store = open_store(&store, settings)?;
            let meta = store.get_metadata(&folder, &file)?;
            let rows = store.get_items(&folder, &file, start, count)?;
            emit_json(json!({
                "dataset": format!("{folder}/{file}"),
                "start": start,
                "rows": rows_json(&meta, &rows),
            }));
            Ok(RunOutcome::ok())
        }
        Command::Copy {
            source,
            dest,
            folder,
            file,
            append,
            echo,
            batch_size,
        } => {
            let (source, dest) = open_pair(&source, &dest, settings)?;
            let mut options = CopyOptions::new()
                .with_append_dest(append)
                .with_echo_source(echo);
            if let Some(batch_size) = batch_size {
                options = options.with_batch_size(batch_size);
            }
            let report = copy_data(
                &source,
                &dest,
                options,
                folder.as_deref(),
                file.as_deref(),
            )?;
            emit_json(report_json(&report));
            Ok(RunOutcome::ok())
        }
        Command::Import {
            source,
            dest,
            append,
        } => {
            let (source, dest) = open_pair(&source, &dest, settings)?;
            let report = import_data(&source, &dest, append)?;
            emit_json(report_json(&report));
            Ok(RunOutcome::ok())
        }
    }
}

fn store_options(settings: StoreSettings) -> StoreOptions {
    let mut flat_file = FlatFileOptions::new();
    if let Some(page_size) = settings.page_size {
        flat_file = flat_file.with_page_size(page_size);
    }
    let mut sql = SqlOptions::new();
    if let Some(timeout) = settings.command_timeout {
        sql = sql.with_command_timeout(timeout);
    }
    if let Some(max_attempts) = settings.max_attempts {
        sql = sql.with_retry(RetryPolicy::default().with_max_attempts(max_attempts));
    }
    StoreOptions::new().with_flat_file(flat_file).with_sql(sql)
}

fn open_store(text: &str, settings: StoreSettings) -> Result<Store, Error> {
    let store_ref = StoreRef::parse(text)?;
    debug!(store = %store_ref, "opening store");
    store_ref.open(store_options(settings))
}

fn open_pair(source: &str, dest: &str, settings: StoreSettings) -> Result<(Store, Store), Error> {
    let source_ref = StoreRef::parse(source)?;
    let dest_ref = StoreRef::parse(dest)?;
    if source_ref == dest_ref {
        return Err(Error::new(ErrorKind::InvalidArgument)
            .with_message("source and destination are the same store")
            .with_hint("Pass two different stores to copy or import."));
    }
    let options = store_options(settings);
    Ok((source_ref.open(options)?, dest_ref.open(options)?))
}
