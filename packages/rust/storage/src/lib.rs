//! Tabular store: CSV link tables loaded once and rewritten whole.
//!
//! [`TableStore::save`] always writes the complete snapshot, staged in a
//! sibling file and renamed over the target, so readers see either the
//! previous table or the new one. A target held open by another process is
//! retried with a linearly growing delay before the save reports
//! [`JobLensError::ResourceBusy`].

mod table;

use std::io;
use std::path::{Path, PathBuf};

use joblens_shared::{JobLensError, Result, StoreConfig};
use tracing::{debug, info, instrument};

pub use table::{LINK_COLUMN, Row, TITLE_COLUMN, Table};

/// Windows `ERROR_SHARING_VIOLATION` / `ERROR_LOCK_VIOLATION`.
const WINDOWS_LOCK_ERRORS: [i32; 2] = [32, 33];

/// Unix `EBUSY`.
const EBUSY: i32 = 16;

/// Whether an I/O error means "another process holds the file".
pub fn is_lock_contention(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::ResourceBusy | io::ErrorKind::WouldBlock
    ) || err
        .raw_os_error()
        .is_some_and(|code| code == EBUSY || (cfg!(windows) && WINDOWS_LOCK_ERRORS.contains(&code)))
}

/// Load a link table. Fails if the file is missing, has no `Link` column,
/// or repeats a column name.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_table(path: &Path) -> Result<Table> {
    let file = std::fs::File::open(path).map_err(|e| JobLensError::io(path, e))?;
    let table = Table::from_csv(io::BufReader::new(file), path)?;

    info!(rows = table.len(), columns = table.columns().len(), "table loaded");
    Ok(table)
}

// ---------------------------------------------------------------------------
// Snapshot writers
// ---------------------------------------------------------------------------

/// Puts a complete encoded snapshot at `path`.
pub trait SnapshotWriter: Send + Sync {
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
}

/// Filesystem writer: stage next to the target, then rename over it.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsWriter;

impl FsWriter {
    fn staging_path(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "table".into());
        path.with_file_name(format!(".{name}.joblens-tmp"))
    }
}

impl SnapshotWriter for FsWriter {
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let staging = Self::staging_path(path);
        std::fs::write(&staging, bytes)?;

        if let Err(e) = std::fs::rename(&staging, path) {
            let _ = std::fs::remove_file(&staging);
            return Err(e);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TableStore
// ---------------------------------------------------------------------------

/// Persists table snapshots with lock-contention retry.
pub struct TableStore<W = FsWriter> {
    config: StoreConfig,
    writer: W,
}

impl TableStore<FsWriter> {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_writer(config, FsWriter)
    }
}

impl<W: SnapshotWriter> TableStore<W> {
    pub fn with_writer(config: StoreConfig, writer: W) -> Self {
        Self { config, writer }
    }

    /// Write the whole table to `path`.
    ///
    /// Lock contention is retried up to the configured ceiling; any other
    /// I/O error is returned at once.
    #[instrument(skip_all, fields(path = %path.display(), rows = table.len()))]
    pub async fn save(&self, path: &Path, table: &Table) -> Result<()> {
        let bytes = table.to_csv()?;
        let writer = &self.writer;
        let bytes = bytes.as_slice();

        let outcome = self
            .config
            .retry
            .run(
                "save_table",
                move |_| async move { writer.write(path, bytes) },
                is_lock_contention,
            )
            .await;

        match outcome {
            Ok(()) => {
                debug!(bytes = bytes.len(), "snapshot written");
                Ok(())
            }
            Err(e) if e.exhausted => Err(JobLensError::ResourceBusy {
                path: path.to_path_buf(),
                attempts: e.attempts,
            }),
            Err(e) => Err(JobLensError::io(path, e.error)),
        }
    }
}
