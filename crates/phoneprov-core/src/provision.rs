//! Provisioning protocol domain types.
//!
//! Every device request is recorded as a [`ProvisionAttempt`] keyed by
//! (normalized MAC, requested filename); repeats bump a counter instead
//! of inserting new rows. The outcome of each request is one of a fixed
//! status taxonomy so operators can tell misconfigured devices apart
//! from unknown ones.

use serde::{Deserialize, Serialize};

/// Outcome of one provisioning request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStatus {
    /// Config rendered and served
    Success,
    /// MAC is valid but matches no active device
    DeviceNotFound,
    /// Device exists but has no active assignment
    NoActiveConfig,
    /// Requested MAC does not normalize to 12 hex digits
    InvalidMac,
    /// User agent is not a recognized device and no test token was given
    BlockedUserAgent,
    /// Store or render failure while handling the request
    ServerError,
}

impl ProvisionStatus {
    /// Stable name used in store rows and log fields.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::DeviceNotFound => "device_not_found",
            Self::NoActiveConfig => "no_active_config",
            Self::InvalidMac => "invalid_mac",
            Self::BlockedUserAgent => "blocked_user_agent",
            Self::ServerError => "server_error",
        }
    }

    /// Parse a stored status name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(Self::Success),
            "device_not_found" => Some(Self::DeviceNotFound),
            "no_active_config" => Some(Self::NoActiveConfig),
            "invalid_mac" => Some(Self::InvalidMac),
            "blocked_user_agent" => Some(Self::BlockedUserAgent),
            "server_error" => Some(Self::ServerError),
            _ => None,
        }
    }
}

/// One distinct (MAC, filename) pair seen by the provisioning endpoint.
///
/// The MAC is stored in its best-effort normalized form so that repeated
/// requests with an invalid MAC still collapse into one row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionAttempt {
    /// Row id
    pub id: i64,
    /// Normalized MAC, or the hex-stripped remainder when invalid
    pub mac: String,
    /// Requested filename
    pub filename: String,
    /// Number of requests seen for this pair
    pub attempt_count: i64,
    /// First request timestamp (UTC)
    pub first_seen_at: String,
    /// Most recent request timestamp (UTC)
    pub last_seen_at: String,
    /// Outcome of the most recent request
    pub last_status: ProvisionStatus,
    /// Device model from the most recent request's user agent
    pub last_model: Option<String>,
}

/// Best-effort attempt-log key for a raw MAC parameter.
///
/// Invalid MACs never become a [`crate::mac::MacAddr`], but their repeated
/// requests still have to collapse into one attempt row. The key is the
/// hex-stripped uppercase remainder of whatever the client sent.
#[must_use]
pub fn attempt_mac_key(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Extract the device model from a firmware user agent.
///
/// Device firmware sends `Vendor Model firmware ...`; the model is the
/// first two whitespace-separated tokens.
#[must_use]
pub fn model_from_user_agent(user_agent: &str) -> Option<String> {
    let mut tokens = user_agent.split_whitespace();
    let vendor = tokens.next()?;
    let model = tokens.next()?;
    Some(format!("{vendor} {model}"))
}

/// True when the user agent matches one of the recognized device vendors.
///
/// Matching is a case-insensitive substring check so firmware revisions
/// do not need individual allowlist entries.
#[must_use]
pub fn is_device_user_agent(user_agent: &str, allowed: &[String]) -> bool {
    let lowered = user_agent.to_lowercase();
    allowed
        .iter()
        .any(|vendor| lowered.contains(&vendor.to_lowercase()))
}
