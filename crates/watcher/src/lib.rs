//! # SheetBridge Watcher
//!
//! Desktop-side bridge from a spreadsheet file to the ingest pipeline. It
//! watches a single CSV or Excel file and, whenever the file settles after
//! a save, lifts the first data row into an [`IngestRequest`] and hands it
//! to a pluggable sink.
//!
//! ```text
//! fs event ──▶ name filter ──▶ debounce ──▶ stable read ──▶ RowSink
//! ```
//!
//! [`IngestRequest`]: sheetbridge_protocol::IngestRequest

mod bridge;
mod debounce;
mod error;
mod sink;

pub use bridge::{run_bridge, BridgeConfig};
pub use debounce::{DebounceGate, DEFAULT_DEBOUNCE};
pub use error::{Result, WatcherError};
pub use sink::RowSink;
