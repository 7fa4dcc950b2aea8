// JSON document store with crash-safe saves and corruption quarantine.
//
// Save path: serialize, write to a temp file, fsync, read the bytes back
// and re-parse them, then atomically rename over the target. A failure at
// any step leaves the previous document untouched. The whole sequence is
// retried, and when the canonical location stays unwritable the document
// is written as a timestamped emergency copy to the backup directories
// instead. Load quarantines unparseable files aside as
// `<name>.corrupted.<timestamp>` and starts from an empty document.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

const SAVE_ATTEMPTS: u32 = 3;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Serialization failed: {0}")]
    Serialize(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Write verification failed for {0}: re-read bytes did not parse")]
    VerifyFailed(PathBuf),

    #[error("Disk operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Where a save actually landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Canonical document replaced atomically
    Persisted,
    /// Canonical location failed; a timestamped copy went to a backup dir
    Emergency(PathBuf),
    /// Nothing durable was written; the in-memory copy is the only one
    InMemoryOnly,
}

impl SaveOutcome {
    pub fn is_durable(&self) -> bool {
        !matches!(self, SaveOutcome::InMemoryOnly)
    }
}

/// Store for the ledger's JSON documents. Cheap to clone; all state is
/// paths and knobs.
#[derive(Debug, Clone)]
pub struct JsonStore {
    data_dir: Option<PathBuf>,
    backup_dirs: Vec<PathBuf>,
    io_timeout: Duration,
}

impl JsonStore {
    pub fn new(
        data_dir: Option<PathBuf>,
        backup_dirs: Vec<PathBuf>,
        io_timeout: Duration,
    ) -> Self {
        Self {
            data_dir,
            backup_dirs,
            io_timeout,
        }
    }

    /// Store rooted at a single directory, no backup targets. Used by tests.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self::new(Some(dir.into()), Vec::new(), Duration::from_secs(10))
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    pub fn document_path(&self, name: &str) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(name))
    }

    /// Load a document, or its default when the file is missing, empty, or
    /// unparseable. A bad file is renamed aside rather than deleted.
    pub async fn load<T>(&self, name: &str) -> Result<T, StoreError>
    where
        T: DeserializeOwned + Default + Send + 'static,
    {
        let Some(path) = self.document_path(name) else {
            return Ok(T::default());
        };

        self.run_blocking(move || load_document::<T>(&path)).await
    }

    /// Persist a document with write-verify-rename semantics, falling back
    /// to emergency copies when the canonical location will not accept the
    /// write. Never returns an error for disk trouble - the outcome says
    /// where (or whether) the bytes landed.
    pub async fn save<T>(&self, name: &str, value: &T) -> Result<SaveOutcome, StoreError>
    where
        T: Serialize,
    {
        // Serialize up front so the blocking task only moves bytes
        let bytes = to_pretty_json(value).map_err(|e| StoreError::Serialize(e.to_string()))?;

        let path = self.document_path(name);
        let backups = self.backup_dirs.clone();
        let name = name.to_string();

        self.run_blocking(move || Ok(save_document(path.as_deref(), &backups, &name, &bytes)))
            .await
    }

    async fn run_blocking<T, F>(&self, job: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    {
        let timeout = self.io_timeout;
        match tokio::time::timeout(timeout, tokio::task::spawn_blocking(job)).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(StoreError::Serialize(format!(
                "Blocking store task panicked: {}",
                join_err
            ))),
            Err(_) => Err(StoreError::Timeout(timeout)),
        }
    }
}

/// Pretty-print with 4-space indentation - the persisted document format
fn to_pretty_json<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(4096);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

fn load_document<T>(path: &Path) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
{
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        },
    };

    // Tolerate a UTF-8 BOM left behind by manual edits
    let text = String::from_utf8_lossy(&bytes);
    let text = text.trim_start_matches('\u{feff}').trim();
    if text.is_empty() {
        return Ok(T::default());
    }

    match serde_json::from_str::<T>(text) {
        Ok(value) => Ok(value),
        Err(e) => {
            let quarantine = quarantine_path(path);
            warn!(
                path = %path.display(),
                quarantine = %quarantine.display(),
                error = %e,
                "Document is unparseable; quarantining and starting empty"
            );
            if let Err(rename_err) = fs::rename(path, &quarantine) {
                error!(
                    path = %path.display(),
                    error = %rename_err,
                    "Failed to quarantine corrupted document"
                );
            }
            Ok(T::default())
        },
    }
}

fn quarantine_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".corrupted.{}", chrono::Utc::now().timestamp()));
    path.with_file_name(name)
}

fn save_document(
    path: Option<&Path>,
    backup_dirs: &[PathBuf],
    name: &str,
    bytes: &[u8],
) -> SaveOutcome {
    if let Some(path) = path {
        for attempt in 1..=SAVE_ATTEMPTS {
            match write_verify_rename(path, bytes) {
                Ok(()) => return SaveOutcome::Persisted,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        attempt,
                        error = %e,
                        "Atomic save attempt failed"
                    );
                },
            }
        }
        error!(
            path = %path.display(),
            "All save attempts failed; trying emergency backup locations"
        );
    }

    for dir in backup_dirs {
        let emergency = dir.join(format!(
            "{}.emergency.{}.json",
            name.trim_end_matches(".json"),
            chrono::Utc::now().timestamp_millis()
        ));
        match write_verify_rename(&emergency, bytes) {
            Ok(()) => {
                warn!(path = %emergency.display(), "Document saved to emergency location");
                return SaveOutcome::Emergency(emergency);
            },
            Err(e) => {
                warn!(path = %emergency.display(), error = %e, "Emergency save failed");
            },
        }
    }

    error!(document = name, "No durable copy written; data held in memory only");
    SaveOutcome::InMemoryOnly
}

/// One write-verify-rename cycle. On any failure the temp file is removed
/// and the target file keeps its previous contents.
fn write_verify_rename(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let tmp = path.with_extension(format!(
        "tmp.{}.{}",
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));

    let result = (|| {
        let mut file = fs::File::create(&tmp).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        file.write_all(bytes).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        file.sync_all().map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        drop(file);

        // Read back and re-parse before letting the temp file replace the
        // canonical document
        let written = fs::read(&tmp).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        if written != bytes || serde_json::from_slice::<serde_json::Value>(&written).is_err() {
            return Err(StoreError::VerifyFailed(tmp.clone()));
        }

        fs::rename(&tmp, path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}
