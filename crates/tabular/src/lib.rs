//! # SheetBridge Tabular
//!
//! Turns a spreadsheet file on disk into rows of optional strings, safely:
//! waits for the file to stop changing, copies it aside to dodge writer
//! locks, then decodes CSV or Excel content with one documented set of cell
//! coercion rules.

mod decode;
mod error;
mod stable;

pub use decode::{decode_bytes, Table, TableFormat};
pub use error::{ReadError, Result};
pub use stable::{read_table, StableReadConfig, TempCopy};
