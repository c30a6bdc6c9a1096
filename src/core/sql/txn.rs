// Connection-scoped transactions with bounded retry on transient SQLite faults.
use std::error::Error as StdError;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use rusqlite::{Connection, ErrorCode, TransactionBehavior};
use tracing::warn;

use crate::core::error::{Error, ErrorKind};

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first; `1` disables retries.
    pub max_attempts: u32,
    pub short_backoff: Duration,
    pub long_backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, short_backoff: Duration, long_backoff: Duration) -> Self {
        self.short_backoff = short_backoff;
        self.long_backoff = long_backoff;
        self
    }

    fn delay(&self, backoff: Backoff) -> Duration {
        match backoff {
            Backoff::Short => self.short_backoff,
            Backoff::Long => self.long_backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            short_backoff: Duration::from_secs(5),
            long_backoff: Duration::from_secs(15),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Backoff {
    Short,
    Long,
}

/// Lock contention retries soon; a lost or exhausted database waits longer.
pub fn classify(err: &rusqlite::Error) -> Option<Backoff> {
    let rusqlite::Error::SqliteFailure(failure, _) = err else {
        return None;
    };
    match failure.code {
        ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => Some(Backoff::Short),
        ErrorCode::CannotOpen | ErrorCode::SystemIoFailure | ErrorCode::OutOfMemory => {
            Some(Backoff::Long)
        }
        _ => None,
    }
}

pub(crate) fn sql_error(err: rusqlite::Error) -> Error {
    let kind = if classify(&err).is_some() {
        ErrorKind::Transient
    } else {
        ErrorKind::Database
    };
    Error::new(kind).with_source(err)
}

fn backoff_of(err: &Error) -> Option<Backoff> {
    if !err.is_transient() {
        return None;
    }
    StdError::source(err)
        .and_then(|source| source.downcast_ref::<rusqlite::Error>())
        .and_then(classify)
        .or(Some(Backoff::Short))
}

/// Runs units of work against one SQLite file. Each attempt opens its own
/// connection and transaction; both are released on every exit path.
#[derive(Clone, Debug)]
pub(crate) struct TxnRunner {
    path: PathBuf,
    command_timeout: Duration,
    retry: RetryPolicy,
}

impl TxnRunner {
    pub(crate) fn new(path: impl Into<PathBuf>, command_timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            path: path.into(),
            command_timeout,
            retry,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn read<T, F>(&self, work: F) -> Result<T, Error>
    where
        F: FnMut(&Connection) -> Result<T, Error>,
    {
        self.run(TransactionBehavior::Deferred, work)
    }

    pub(crate) fn write<T, F>(&self, work: F) -> Result<T, Error>
    where
        F: FnMut(&Connection) -> Result<T, Error>,
    {
        self.run(TransactionBehavior::Immediate, work)
    }

    fn run<T, F>(&self, behavior: TransactionBehavior, mut work: F) -> Result<T, Error>
    where
        F: FnMut(&Connection) -> Result<T, Error>,
    {
        let mut attempt = 1;
        loop {
            let err = match self.run_once(behavior, &mut work) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            let Some(backoff) = backoff_of(&err) else {
                return Err(err);
            };
            if attempt >= self.retry.max_attempts {
                return Err(err.with_hint(format!("gave up after {attempt} attempts")));
            }
            let delay = self.retry.delay(backoff);
            warn!(
                path = %self.path.display(),
                attempt,
                max_attempts = self.retry.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient database fault, retrying"
            );
            thread::sleep(delay);
            attempt += 1;
        }
    }

    fn run_once<T, F>(&self, behavior: TransactionBehavior, work: &mut F) -> Result<T, Error>
    where
        F: FnMut(&Connection) -> Result<T, Error>,
    {
        let mut conn = Connection::open(&self.path)
            .map_err(|err| sql_error(err).with_path(&self.path))?;
        conn.busy_timeout(self.command_timeout).map_err(sql_error)?;

        let tx = conn.transaction_with_behavior(behavior).map_err(sql_error)?;
        match work(&*tx) {
            Ok(value) => {
                tx.commit().map_err(sql_error)?;
                Ok(value)
            }
            Err(err) => {
                let _ = tx.rollback();
                Err(err)
            }
        }
    }
}
