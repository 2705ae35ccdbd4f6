//! Bulk find/replace domain types.
//!
//! A bulk operation runs in two phases with no lock held between them:
//! a read-only preview that counts matches across active configs, and an
//! execute that re-scans before mutating. Every executed operation keeps
//! enough per-device detail to be rolled back as a unit.

use serde::{Deserialize, Serialize};

/// Count literal, case-sensitive occurrences of `needle` in `haystack`.
///
/// An empty needle matches nothing.
#[must_use]
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

/// One matching device found during a preview or execute scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewHit {
    /// Device whose active config matched
    pub device_id: i64,
    /// Device display name
    pub device_name: String,
    /// The active version that was scanned
    pub config_version_id: i64,
    /// Occurrences of the search term in that version's content
    pub match_count: usize,
}

/// Result of a preview scan.
///
/// Totals always cover every matching device; `hits` may be truncated to
/// a display cap, in which case `truncated` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewReport {
    /// Matching devices, possibly capped for display
    pub hits: Vec<PreviewHit>,
    /// True number of matching devices
    pub matched_devices: usize,
    /// True number of occurrences across all matching devices
    pub total_occurrences: usize,
    /// Whether `hits` was cut short by the display cap
    pub truncated: bool,
}

impl PreviewReport {
    /// Build a report from a full scan, capping the displayed hits.
    #[must_use]
    pub fn from_hits(mut hits: Vec<PreviewHit>, display_limit: Option<usize>) -> Self {
        let matched_devices = hits.len();
        let total_occurrences = hits.iter().map(|hit| hit.match_count).sum();
        let truncated = match display_limit {
            Some(limit) if hits.len() > limit => {
                hits.truncate(limit);
                true
            }
            _ => false,
        };
        Self {
            hits,
            matched_devices,
            total_occurrences,
            truncated,
        }
    }
}

/// One device mutated by an execute run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutatedDevice {
    /// Device that received a new version
    pub device_id: i64,
    /// Version that was active before the run
    pub old_version_id: i64,
    /// Replacement version created by the run
    pub new_version_id: i64,
    /// Occurrences replaced in this device's config
    pub match_count: usize,
}

/// Result of an execute run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteReport {
    /// Recorded operation, for later rollback
    pub operation_id: i64,
    /// Devices mutated in this run
    pub mutated: Vec<MutatedDevice>,
    /// Matching devices left untouched by the device cap
    pub remaining: usize,
}

/// One recorded find/replace run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkOperation {
    /// Row id
    pub id: i64,
    /// Literal search term
    pub search_term: String,
    /// Literal replacement term
    pub replace_term: String,
    /// Principal that executed the run
    pub executed_by: String,
    /// Execution timestamp (UTC)
    pub executed_at: String,
    /// Devices mutated by the run
    pub affected_count: i64,
    /// Set when the operation has been rolled back
    pub rolled_back_at: Option<String>,
    /// Principal that rolled the operation back
    pub rolled_back_by: Option<String>,
}

impl BulkOperation {
    /// True once the operation has been reversed.
    #[must_use]
    pub fn is_rolled_back(&self) -> bool {
        self.rolled_back_at.is_some()
    }
}

/// Per-device reversal record for one operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkOperationDetail {
    /// Row id
    pub id: i64,
    /// Operation this detail belongs to
    pub operation_id: i64,
    /// Mutated device
    pub device_id: i64,
    /// Version that was active before the run
    pub old_version_id: i64,
    /// Version the run activated
    pub new_version_id: i64,
    /// Occurrences replaced
    pub match_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(device_id: i64, match_count: usize) -> PreviewHit {
        PreviewHit {
            device_id,
            device_name: format!("phone-{device_id}"),
            config_version_id: device_id * 10,
            match_count,
        }
    }

    #[test]
    fn test_count_occurrences_literal() {
        assert_eq!(count_occurrences("sip.example.com sip.example.com", "sip.example.com"), 2);
        assert_eq!(count_occurrences("abcabcabc", "abc"), 3);
        assert_eq!(count_occurrences("abc", "xyz"), 0);
    }

    #[test]
    fn test_count_occurrences_case_sensitive() {
        assert_eq!(count_occurrences("Host host HOST", "host"), 1);
    }

    #[test]
    fn test_count_occurrences_not_regex() {
        assert_eq!(count_occurrences("a.c abc", "a.c"), 1);
    }

    #[test]
    fn test_count_occurrences_empty_needle() {
        assert_eq!(count_occurrences("abc", ""), 0);
    }

    #[test]
    fn test_preview_totals_unaffected_by_cap() {
        let report = PreviewReport::from_hits(vec![hit(1, 3), hit(2, 1), hit(3, 1)], Some(1));
        assert_eq!(report.hits.len(), 1);
        assert_eq!(report.matched_devices, 3);
        assert_eq!(report.total_occurrences, 5);
        assert!(report.truncated);
    }

    #[test]
    fn test_preview_without_cap() {
        let report = PreviewReport::from_hits(vec![hit(1, 3), hit(2, 1)], None);
        assert_eq!(report.hits.len(), 2);
        assert_eq!(report.matched_devices, 2);
        assert_eq!(report.total_occurrences, 4);
        assert!(!report.truncated);
    }

    #[test]
    fn test_preview_cap_equal_to_len_is_not_truncated() {
        let report = PreviewReport::from_hits(vec![hit(1, 2), hit(2, 2)], Some(2));
        assert!(!report.truncated);
        assert_eq!(report.hits.len(), 2);
    }
}
