//! Single-use download tokens.
//!
//! A token grants one time-boxed download of a rendered config without
//! prior device identification. Tokens transition unused -> used exactly
//! once; expired tokens become inert without ever being marked used.

use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::mac::MacAddr;

/// Random bytes per token; hex-encoded to twice this many characters.
pub const TOKEN_BYTES: usize = 32;

/// Generate an opaque token string from OS randomness.
#[must_use]
pub fn generate_token() -> String {
    let mut buf = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Absolute expiry timestamp `ttl_secs` from now, in store format (UTC).
#[must_use]
pub fn expiry_timestamp(ttl_secs: u32) -> String {
    let expires = chrono::Utc::now() + chrono::Duration::seconds(i64::from(ttl_secs));
    expires.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// A minted download token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadToken {
    /// Row id
    pub id: i64,
    /// Opaque token string handed to the caller
    pub token: String,
    /// Version served when no device can be resolved at redemption
    pub config_version_id: i64,
    /// When set, redemption must present a matching MAC
    pub mac: Option<MacAddr>,
    /// Model hint used for variable resolution at redemption
    pub device_model: Option<String>,
    /// Principal that minted the token
    pub created_by: String,
    /// Mint timestamp (UTC)
    pub created_at: String,
    /// Absolute expiry (UTC)
    pub expires_at: String,
    /// Redemption timestamp; null until the single use
    pub used_at: Option<String>,
}

impl DownloadToken {
    /// True once the token has been redeemed.
    #[must_use]
    pub fn is_redeemed(&self) -> bool {
        self.used_at.is_some()
    }

    /// True when `now` (store format, UTC) is past the expiry.
    ///
    /// Store timestamps are fixed-width `YYYY-MM-DD HH:MM:SS`, so string
    /// order is chronological order.
    #[must_use]
    pub fn is_expired(&self, now: &str) -> bool {
        self.expires_at.as_str() <= now
    }
}

/// Why a redemption attempt was refused.
///
/// Callers surface all variants as the same generic failure; the reason
/// is kept for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemDenied {
    /// No token row matches the presented string
    Unknown,
    /// Token exists but its expiry has passed
    Expired,
    /// Token was already redeemed once
    AlreadyUsed,
    /// Token is MAC-scoped and the presented MAC does not match
    MacMismatch,
}

impl RedeemDenied {
    /// Stable name for log fields.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Expired => "expired",
            Self::AlreadyUsed => "already_used",
            Self::MacMismatch => "mac_mismatch",
        }
    }
}
