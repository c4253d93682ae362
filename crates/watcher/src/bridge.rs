//! The watch loop: filesystem events in, ingest requests out.

use crate::debounce::{DebounceGate, DEFAULT_DEBOUNCE};
use crate::error::{Result, WatcherError};
use crate::sink::RowSink;
use log::{debug, error, info, warn};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use sheetbridge_protocol::{IngestRequest, WatchedSource};
use sheetbridge_tabular::{read_table, StableReadConfig};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// What to watch and how to read it.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Spreadsheet file to watch. A relative path resolves against the
    /// current directory at startup.
    pub file: PathBuf,
    /// Source identity stamped on every submitted row.
    pub source: WatchedSource,
    /// Minimum spacing between processed change signals.
    pub debounce: Duration,
    /// Stability and copy tuning for reads.
    pub read: StableReadConfig,
}

impl BridgeConfig {
    #[must_use]
    pub fn new(file: impl Into<PathBuf>, source: WatchedSource) -> Self {
        Self {
            file: file.into(),
            source,
            debounce: DEFAULT_DEBOUNCE,
            read: StableReadConfig::default(),
        }
    }
}

/// Watch one spreadsheet file and submit its first data row to `sink` after
/// every settled change.
///
/// The parent directory is watched non-recursively and events are filtered
/// by file name, so sibling churn never triggers a read. That same filter
/// keeps the stable read's `.tmpcopy` sibling from re-triggering the loop.
/// Read and submission failures are logged and the watch continues; the
/// function itself only returns if the watch backend shuts down.
pub async fn run_bridge(config: BridgeConfig, sink: Arc<dyn RowSink>) -> Result<()> {
    let file = absolutize(&config.file)?;
    let parent = file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| WatcherError::InvalidTarget(file.clone()))?;
    let target = file
        .file_name()
        .ok_or_else(|| WatcherError::InvalidTarget(file.clone()))?
        .to_os_string();

    let (tx, mut rx) = mpsc::channel::<notify::Result<Event>>(256);
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = tx.blocking_send(res);
        },
        NotifyConfig::default(),
    )?;
    watcher.watch(parent, RecursiveMode::NonRecursive)?;
    info!(
        "watching {} for changes to {}",
        parent.display(),
        target.to_string_lossy()
    );

    let mut gate = DebounceGate::new(config.debounce);
    while let Some(event) = rx.recv().await {
        let event = match event {
            Ok(event) => event,
            Err(err) => {
                warn!("watch error: {err}");
                continue;
            }
        };
        if !is_target_event(&event, &target) {
            continue;
        }
        if !gate.accept() {
            debug!("change inside debounce window, skipping");
            continue;
        }
        handle_change(&config, &file, sink.as_ref()).await;
    }
    Ok(())
}

async fn handle_change(config: &BridgeConfig, file: &Path, sink: &dyn RowSink) {
    info!("change detected: {}", file.display());

    let table = match read_table(file, &config.read).await {
        Ok(table) => table,
        Err(err) => {
            error!("could not read {}: {err}", file.display());
            return;
        }
    };
    let Some(values) = table.first_row() else {
        info!("{} has no data rows, nothing to submit", file.display());
        return;
    };

    let request = IngestRequest {
        source: config.source.clone(),
        row_index: 0,
        headers: table.headers.clone(),
        values: values.to_vec(),
        mapping: None,
    };
    match sink.submit_row(&request).await {
        Ok(reply) => info!("submitted row 0 of {}: {reply:?}", file.display()),
        Err(err) => error!("row submission failed: {err}"),
    }
}

/// A change signal is anything created or modified whose final path
/// component matches the watched file name. Renames arrive as modify
/// events and carry both paths, either of which may match.
fn is_target_event(event: &Event, target: &OsStr) -> bool {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|path| path.file_name() == Some(target))
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
