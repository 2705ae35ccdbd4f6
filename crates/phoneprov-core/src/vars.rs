//! Variable maps and tier merging for config resolution.
//!
//! Merge precedence is an explicit ordered list of tiers, merged
//! left-to-right: global variables, then template defaults, then
//! device-derived values, then explicit caller overrides. A later tier
//! overwrites an earlier one key-for-key; collisions are silent and the
//! highest tier always wins.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::device::{Device, Pabx};
use crate::mac::MacAddr;

/// A flat variable map used for rendering.
pub type VarMap = BTreeMap<String, String>;

static KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9_]+$").expect("variable key pattern is valid"));

/// Check whether a string is a well-formed variable key.
///
/// Keys are uppercase alphanumeric/underscore tokens, matching what the
/// template renderer recognizes as a placeholder.
#[must_use]
pub fn is_valid_key(key: &str) -> bool {
    KEY_PATTERN.is_match(key)
}

/// Merge variable tiers left-to-right; later tiers overwrite key-for-key.
#[must_use]
pub fn merge_tiers<'a, I>(tiers: I) -> VarMap
where
    I: IntoIterator<Item = &'a VarMap>,
{
    let mut merged = VarMap::new();
    for tier in tiers {
        for (key, value) in tier {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// The four variable tiers for one render target, lowest precedence first.
#[derive(Debug, Clone, Default)]
pub struct TierSet {
    /// Global operator-managed variables
    pub global: VarMap,
    /// Template variable defaults (empty when not rendering a template)
    pub template_defaults: VarMap,
    /// Values derived from the target device and its PABX
    pub device: VarMap,
    /// Explicit caller-supplied overrides
    pub overrides: VarMap,
}

impl TierSet {
    /// Resolve the tiers into one flat map.
    #[must_use]
    pub fn resolve(&self) -> VarMap {
        merge_tiers([&self.global, &self.template_defaults, &self.device, &self.overrides])
    }
}

/// Build the device-derived variable tier.
///
/// The MAC is emitted under both conventions so templates can pick either:
/// `PHONE_MAC` is colon-delimited, `PHONE_MAC_PLAIN` is the stripped
/// canonical form.
#[must_use]
pub fn device_tier(device: &Device, pabx: Option<&Pabx>) -> VarMap {
    let mut vars = mac_tier(&device.mac, device.model.as_deref());
    vars.insert("PHONE_NAME".to_string(), device.name.clone());
    if let Some(pabx) = pabx {
        vars.insert("PABX_NAME".to_string(), pabx.name.clone());
        vars.insert("PABX_HOST".to_string(), pabx.host.clone());
        vars.insert("PABX_PORT".to_string(), pabx.port.to_string());
    }
    vars
}

/// Device tier for a bare MAC, used when no device record exists.
///
/// Token redemptions fall back to this when the MAC resolves no device:
/// the rendered config still gets both MAC forms and the model hint.
#[must_use]
pub fn mac_tier(mac: &MacAddr, model: Option<&str>) -> VarMap {
    let mut vars = VarMap::new();
    vars.insert("PHONE_MAC".to_string(), mac.delimited());
    vars.insert("PHONE_MAC_PLAIN".to_string(), mac.as_plain().to_string());
    if let Some(model) = model {
        vars.insert("PHONE_MODEL".to_string(), model.to_string());
    }
    vars
}

/// A global operator-managed variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalVariable {
    /// Row id
    pub id: i64,
    /// Uppercase `[A-Z0-9_]` key
    pub key: String,
    /// Substituted value
    pub value: String,
    /// Operator-facing description
    pub description: Option<String>,
    /// Last edit timestamp (UTC)
    pub updated_at: String,
}
