//! Reading a file that an office application may still be writing or holding
//! locked.
//!
//! ```text
//! path ──▶ wait until size is stable ──▶ copy to <stem>.tmpcopy.<ext> ──▶ decode
//!                                          (removed again on drop)
//! ```
//!
//! The size poll treats a missing file as "not stable yet" because save
//! dialogs often delete and recreate the target. The copy dodges writer
//! locks: desktop spreadsheet apps keep the original open, but a finished
//! save can be copied even while locked for writing on most platforms, and
//! where it cannot, the retry loop waits the lock out.

use crate::decode::{decode_bytes, Table, TableFormat};
use crate::error::{ReadError, Result};
use log::{debug, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tuning for the stability wait and the lock-dodging copy.
#[derive(Debug, Clone)]
pub struct StableReadConfig {
    /// Pause between size polls.
    pub poll_interval: Duration,
    /// Consecutive equal, non-zero size observations required.
    pub stable_checks: u32,
    /// Total size polls before giving up.
    pub max_polls: u32,
    /// Copy attempts before giving up.
    pub copy_retries: u32,
    /// Pause between copy attempts.
    pub copy_retry_delay: Duration,
}

impl Default for StableReadConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(300),
            stable_checks: 3,
            max_polls: 40,
            copy_retries: 40,
            copy_retry_delay: Duration::from_millis(750),
        }
    }
}

/// Read and decode `path` once it has stopped changing.
pub async fn read_table(path: &Path, config: &StableReadConfig) -> Result<Table> {
    let format = TableFormat::from_path(path)?;
    wait_until_stable(path, config).await?;

    let copy = TempCopy::create(path, config).await?;
    let bytes = tokio::fs::read(copy.path()).await?;
    decode_bytes(format, &bytes)
}

async fn wait_until_stable(path: &Path, config: &StableReadConfig) -> Result<()> {
    let mut last_size: Option<u64> = None;
    let mut stable = 0u32;

    for _ in 0..config.max_polls {
        match tokio::fs::metadata(path).await {
            Ok(meta) => {
                let size = meta.len();
                if Some(size) == last_size && size > 0 {
                    stable += 1;
                    if stable >= config.stable_checks {
                        debug!("{} stable at {size} bytes", path.display());
                        return Ok(());
                    }
                } else {
                    stable = 0;
                    last_size = Some(size);
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                // Save may still be landing; keep polling.
            }
            Err(err) => return Err(err.into()),
        }
        tokio::time::sleep(config.poll_interval).await;
    }

    Err(ReadError::NeverStabilized {
        path: path.to_path_buf(),
    })
}

/// Guard around the sibling copy decoded in place of the possibly locked
/// original. The copy is deleted when the guard drops, parse or no parse.
pub struct TempCopy {
    path: PathBuf,
}

impl TempCopy {
    pub async fn create(source: &Path, config: &StableReadConfig) -> Result<Self> {
        let path = temp_copy_path(source);
        let mut attempt = 0u32;
        loop {
            match tokio::fs::copy(source, &path).await {
                Ok(_) => return Ok(Self { path }),
                Err(err) => {
                    attempt += 1;
                    if attempt >= config.copy_retries {
                        return Err(ReadError::CopyExhausted {
                            path: source.to_path_buf(),
                            source: err,
                        });
                    }
                    debug!(
                        "copy attempt {attempt} for {} failed: {err}",
                        source.display()
                    );
                    tokio::time::sleep(config.copy_retry_delay).await;
                }
            }
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempCopy {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != ErrorKind::NotFound {
                warn!("could not remove temp copy {}: {err}", self.path.display());
            }
        }
    }
}

/// `contacts.csv` → `contacts.tmpcopy.csv`, keeping the extension last so
/// format dispatch still works on the copy.
fn temp_copy_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("table");
    let name = match source.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}.tmpcopy.{ext}"),
        None => format!("{stem}.tmpcopy"),
    };
    source.with_file_name(name)
}
