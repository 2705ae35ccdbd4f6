//! Configuration template rendering.
//!
//! Rendering is flat token substitution only: no conditionals, loops, or
//! nested expressions. Placeholders look like `{{PABX_HOST}}`; tokens are
//! case-sensitive. A token with no entry in the variable map is left
//! verbatim so templates may reference variables introduced later.
//! Substitution is single-pass: substituted values are never re-scanned, so
//! a value that itself contains `{{OTHER}}` is emitted literally.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::vars::VarMap;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Z0-9_]+)\s*\}\}").expect("placeholder pattern is valid"));

/// Render `content` by substituting `{{TOKEN}}` placeholders from `vars`.
///
/// Unknown tokens are kept verbatim, including their original inner
/// whitespace; no error is raised for them.
#[must_use]
pub fn render(content: &str, vars: &VarMap) -> String {
    PLACEHOLDER
        .replace_all(content, |caps: &Captures<'_>| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Placeholder names referenced by `content`, in order of first appearance.
#[must_use]
pub fn referenced_tokens(content: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in PLACEHOLDER.captures_iter(content) {
        let token = &caps[1];
        if !seen.iter().any(|existing| existing == token) {
            seen.push(token.to_string());
        }
    }
    seen
}

/// An editable configuration template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    /// Row id
    pub id: i64,
    /// Display name
    pub name: String,
    /// Template body with `{{TOKEN}}` placeholders
    pub content: String,
    /// Operator-facing description
    pub description: Option<String>,
    /// Creation timestamp (UTC)
    pub created_at: String,
    /// Last edit timestamp (UTC)
    pub updated_at: String,
}
