//! MAC address canonicalization and formatting.
//!
//! The provisioning flow and the direct-download flow historically formatted
//! MAC addresses differently (colon-delimited vs. stripped). Everything in
//! this workspace stores and compares the canonical stripped form; the
//! delimited and filename forms are produced only by the explicit formatters
//! here.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A canonical MAC address: exactly 12 uppercase hex digits, no separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacAddr(String);

impl MacAddr {
    /// Parse a MAC address from any conventional notation.
    ///
    /// All non-hex characters are stripped, the remainder is uppercased and
    /// must be exactly 12 hex digits.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMac`] when the input does not contain exactly
    /// 12 hex digits.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let stripped: String = input
            .chars()
            .filter(char::is_ascii_hexdigit)
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if stripped.len() == 12 {
            Ok(Self(stripped))
        } else {
            Err(Error::InvalidMac(input.to_string()))
        }
    }

    /// Parse a provisioning config filename of the form `001565aabb01.cfg`.
    ///
    /// The filename convention is strict: 12 lowercase hex digits followed
    /// by `.cfg`. Returns `None` for anything else.
    #[must_use]
    pub fn from_config_filename(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(".cfg")?;
        if stem.len() != 12 {
            return None;
        }
        if !stem.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()) {
            return None;
        }
        Some(Self(stem.to_ascii_uppercase()))
    }

    /// The canonical stripped form, e.g. `001565AABB01`.
    #[must_use]
    pub fn as_plain(&self) -> &str {
        &self.0
    }

    /// The colon-delimited form, e.g. `00:15:65:AA:BB:01`.
    #[must_use]
    pub fn delimited(&self) -> String {
        self.0
            .as_bytes()
            .chunks(2)
            .map(|pair| std::str::from_utf8(pair).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(":")
    }

    /// The provisioning filename for this device, e.g. `001565aabb01.cfg`.
    #[must_use]
    pub fn config_filename(&self) -> String {
        format!("{}.cfg", self.0.to_ascii_lowercase())
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.delimited())
    }
}
