//! # Telemetry Log
//!
//! Append-only CSV store of received frames.
//!
//! Every append opens the file in append mode, writes a single row, flushes
//! and closes it again. Nothing is ever truncated; rows accumulate across
//! restarts.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::frame::encoder::{encode_header, encode_row};

/// When the header row is written at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderPolicy {
    /// Append the header on every start, marking each run in the file
    EveryStart,

    /// Write the header only when the file is new or empty
    #[default]
    IfEmpty,
}

/// Append-only telemetry log
///
/// Appends are serialized through an internal lock so rows are never
/// interleaved, even if more than one task holds the log.
#[derive(Debug)]
pub struct TelemetryLog {
    path: PathBuf,
    write_lock: Mutex<()>,
    rows_appended: AtomicU64,
}

impl TelemetryLog {
    /// Open (or create) the log and write the header according to `policy`
    ///
    /// # Arguments
    ///
    /// * `path` - CSV file location; missing parent directories are created
    /// * `policy` - Header policy
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be created or written
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use telemetry_ingest::telemetry::log::{HeaderPolicy, TelemetryLog};
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let log = TelemetryLog::initialize("datos.csv", HeaderPolicy::IfEmpty).await?;
    ///     log.append(&["40.4168", "-3.7038"]).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn initialize<P: AsRef<Path>>(path: P, policy: HeaderPolicy) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let existing_len = file.metadata().await?.len();
        let write_header = match policy {
            HeaderPolicy::EveryStart => true,
            HeaderPolicy::IfEmpty => existing_len == 0,
        };

        if write_header {
            file.write_all(encode_header().as_bytes()).await?;
            file.flush().await?;
            debug!("Wrote header to {}", path.display());
        }

        info!(
            "Telemetry log ready at {} ({} bytes existing, header policy {:?})",
            path.display(),
            existing_len,
            policy
        );

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
            rows_appended: AtomicU64::new(0),
        })
    }

    /// Append one row and flush it before returning
    ///
    /// The file handle is scoped to this call and released on every exit
    /// path, including a failed write.
    ///
    /// # Errors
    ///
    /// Returns error on open/write/flush failure (permissions, disk full).
    /// No retry is attempted.
    pub async fn append<S: AsRef<str>>(&self, tokens: &[S]) -> Result<()> {
        let row = encode_row(tokens);
        let _guard = self.write_lock.lock().await;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(row.as_bytes()).await?;
        file.flush().await?;

        self.rows_appended.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Location of the CSV file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended by this handle since it was initialized
    pub fn rows_appended(&self) -> u64 {
        self.rows_appended.load(Ordering::Relaxed)
    }
}
