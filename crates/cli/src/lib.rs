//! # SheetBridge CLI
//!
//! Library side of the `sheetbridge` binary. The binary stays a thin
//! argument-parsing shell; servers, sinks and settings live here so the
//! integration tests can drive them in-process.

mod security;
pub mod server;
pub mod settings;
pub mod sinks;

pub use server::{router, serve, AppState};
pub use settings::Settings;
pub use sinks::{HttpRowSink, LocalSink};
