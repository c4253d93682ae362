//! Content identity of one spreadsheet row.
//!
//! The fingerprint is the lowercase hex SHA-256 of the headers joined with
//! `|` followed by the values joined with `|` (a missing value joins as the
//! empty string). It is sensitive to both content and column order, so a
//! reordered or edited row fingerprints differently.

use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowFingerprint(String);

impl RowFingerprint {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[must_use]
pub fn fingerprint(headers: &[String], values: &[Option<String>]) -> RowFingerprint {
    let mut hasher = Sha256::new();
    hasher.update(headers.join("|").as_bytes());
    let values: Vec<&str> = values
        .iter()
        .map(|v| v.as_deref().unwrap_or_default())
        .collect();
    hasher.update(values.join("|").as_bytes());
    RowFingerprint(to_lower_hex(&hasher.finalize()))
}

fn to_lower_hex(bytes: &[u8]) -> String {
    const LUT: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(LUT[(byte >> 4) as usize] as char);
        out.push(LUT[(byte & 0x0f) as usize] as char);
    }
    out
}
