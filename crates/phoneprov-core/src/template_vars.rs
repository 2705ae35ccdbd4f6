//! Per-template variable declarations and their validation rules.
//!
//! A declaration describes one operator-editable value: its type, default,
//! validation constraints, and an optional master/child relationship that
//! hides the variable unless its parent holds a given value. Hidden
//! variables are not validated; their defaults still participate in
//! rendering.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::vars::{VarMap, is_valid_key};

/// Type tag of a template variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarType {
    /// Free text, optionally constrained by a pattern
    Text,
    /// Numeric value, optionally bounded
    Number,
    /// One of a fixed option list
    Select,
}

impl VarType {
    /// Stable name used in store rows.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Select => "select",
        }
    }

    /// Parse a stored type name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "number" => Some(Self::Number),
            "select" => Some(Self::Select),
            _ => None,
        }
    }
}

/// One variable declaration scoped to a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateVariable {
    /// Row id
    pub id: i64,
    /// Template the declaration belongs to
    pub template_id: i64,
    /// Placeholder name, uppercase `[A-Z0-9_]`
    pub name: String,
    /// Type tag
    pub var_type: VarType,
    /// Value used when the operator supplies none
    pub default_value: Option<String>,
    /// Whether an effective value must be present
    pub required: bool,
    /// Pattern a text value must match
    pub validation_regex: Option<String>,
    /// Lower bound for number values
    pub min_value: Option<f64>,
    /// Upper bound for number values
    pub max_value: Option<f64>,
    /// Allowed values for select variables
    pub options: Vec<String>,
    /// Master variable controlling this declaration's visibility
    pub parent_id: Option<i64>,
    /// Parent value that makes this declaration visible; defaults to "1"
    pub visible_when: Option<String>,
}

impl TemplateVariable {
    /// Check that the declaration itself is well formed.
    pub fn validate_declaration(&self) -> Result<()> {
        if !is_valid_key(&self.name) {
            return Err(Error::InvalidVariableKey(self.name.clone()));
        }
        if let (Some(min), Some(max)) = (self.min_value, self.max_value)
            && min > max
        {
            return Err(Error::validation(&self.name, "minimum exceeds maximum"));
        }
        if self.var_type == VarType::Select && self.options.is_empty() {
            return Err(Error::validation(&self.name, "select variable has no options"));
        }
        Ok(())
    }

    /// The value this declaration contributes: supplied or default.
    #[must_use]
    pub fn effective_value<'a>(&'a self, values: &'a VarMap) -> Option<&'a str> {
        values
            .get(&self.name)
            .map(String::as_str)
            .or(self.default_value.as_deref())
    }

    /// Whether the declaration is visible given its parent's value.
    #[must_use]
    pub fn is_visible(&self, declarations: &[TemplateVariable], values: &VarMap) -> bool {
        let Some(parent_id) = self.parent_id else {
            return true;
        };
        let Some(parent) = declarations.iter().find(|decl| decl.id == parent_id) else {
            return true;
        };
        let expected = self.visible_when.as_deref().unwrap_or("1");
        parent.effective_value(values) == Some(expected)
    }

    /// Validate one supplied value against this declaration.
    pub fn validate_value(&self, value: &str) -> Result<()> {
        if value.is_empty() {
            if self.required {
                return Err(Error::validation(&self.name, "value is required"));
            }
            return Ok(());
        }
        match self.var_type {
            VarType::Number => {
                let number: f64 = value
                    .parse()
                    .map_err(|_| Error::validation(&self.name, "not a number"))?;
                if let Some(min) = self.min_value
                    && number < min
                {
                    return Err(Error::validation(&self.name, "below minimum"));
                }
                if let Some(max) = self.max_value
                    && number > max
                {
                    return Err(Error::validation(&self.name, "above maximum"));
                }
            }
            VarType::Select => {
                if !self.options.iter().any(|option| option == value) {
                    return Err(Error::validation(&self.name, "not an allowed option"));
                }
            }
            VarType::Text => {
                if let Some(pattern) = self.validation_regex.as_deref() {
                    match Regex::new(pattern) {
                        Ok(regex) => {
                            if !regex.is_match(value) {
                                return Err(Error::validation(
                                    &self.name,
                                    "does not match the required pattern",
                                ));
                            }
                        }
                        Err(error) => {
                            warn!(
                                variable = %self.name,
                                %error,
                                "unusable validation pattern, constraint skipped"
                            );
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// The defaults tier for rendering: every declaration's default value.
///
/// Visibility does not gate defaults; a hidden child still renders with
/// its default so templates never see half-filled toggle groups.
#[must_use]
pub fn defaults_tier(declarations: &[TemplateVariable]) -> VarMap {
    declarations
        .iter()
        .filter_map(|decl| {
            decl.default_value
                .as_ref()
                .map(|value| (decl.name.clone(), value.clone()))
        })
        .collect()
}

/// Validate operator-supplied values against visible declarations.
///
/// Hidden declarations are skipped entirely; keys without a declaration
/// are ignored so callers can mix in overrides for global variables.
pub fn validate_values(declarations: &[TemplateVariable], values: &VarMap) -> Result<()> {
    for decl in declarations {
        if !decl.is_visible(declarations, values) {
            continue;
        }
        match decl.effective_value(values) {
            Some(value) => {
                // Only validate what the caller actually supplied; stored
                // defaults were validated when the declaration was saved.
                if values.contains_key(&decl.name) {
                    decl.validate_value(value)?;
                }
            }
            None => {
                if decl.required {
                    return Err(Error::validation(&decl.name, "value is required"));
                }
            }
        }
    }
    Ok(())
}
