//! Canonical formatting for rendered configuration text.
//!
//! Device firmware is picky about the files it ingests, so every rendered
//! config passes through one normalization step: line endings become `\n`,
//! lines are trimmed, blank lines are dropped except the single separator
//! inserted before each `[section]` header, comment lines survive
//! untouched, and `key = value` spacing collapses to `key=value`. The
//! output always ends with exactly one newline, and the whole function is
//! idempotent.

/// True when a trimmed line is a `[section]` header.
fn is_section_header(line: &str) -> bool {
    line.len() > 2 && line.starts_with('[') && line.ends_with(']')
}

/// True when a trimmed line is a comment.
fn is_comment(line: &str) -> bool {
    line.starts_with('#') || line.starts_with(';')
}

/// Collapse spacing around the first `=`; inner value spacing survives.
fn collapse_assignment(line: &str) -> String {
    match line.split_once('=') {
        Some((key, value)) => format!("{}={}", key.trim_end(), value.trim_start()),
        None => line.to_string(),
    }
}

/// Normalize rendered configuration text into its canonical form.
#[must_use]
pub fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut out: Vec<String> = Vec::new();
    for raw in unified.split('\n') {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if is_section_header(line) {
            if !out.is_empty() {
                out.push(String::new());
            }
            out.push(line.to_string());
        } else if is_comment(line) {
            out.push(line.to_string());
        } else {
            out.push(collapse_assignment(line));
        }
    }

    let mut result = out.join("\n");
    result.push('\n');
    result
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_line_endings_unified() {
        assert_eq!(normalize("a=1\r\nb=2\rc=3\n"), "a=1\nb=2\nc=3\n");
    }

    #[test]
    fn test_lines_trimmed_and_blanks_dropped() {
        assert_eq!(normalize("  a = 1  \n\n\n   \n b=2 "), "a=1\nb=2\n");
    }

    #[test]
    fn test_separator_inserted_before_section() {
        assert_eq!(normalize("a=1\n[sip]\nb=2"), "a=1\n\n[sip]\nb=2\n");
    }

    #[test]
    fn test_no_separator_before_leading_section() {
        assert_eq!(normalize("[sip]\na=1"), "[sip]\na=1\n");
    }

    #[test]
    fn test_existing_blanks_around_sections_collapse_to_one() {
        assert_eq!(normalize("a=1\n\n\n\n[sip]\nb=2"), "a=1\n\n[sip]\nb=2\n");
    }

    #[test]
    fn test_comments_preserved() {
        let out = normalize("# top = comment\n; other comment\nkey = value");
        assert_eq!(out, "# top = comment\n; other comment\nkey=value\n");
    }

    #[test]
    fn test_assignment_collapsed_at_first_equals_only() {
        assert_eq!(normalize("expr = a = b"), "expr=a = b\n");
    }

    #[test]
    fn test_value_inner_spacing_survives() {
        assert_eq!(normalize("label = Front  Desk"), "label=Front  Desk\n");
    }

    #[test]
    fn test_exactly_one_trailing_newline() {
        assert_eq!(normalize("a=1"), "a=1\n");
        assert_eq!(normalize("a=1\n\n\n"), "a=1\n");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "\n");
        assert_eq!(normalize("\n\n"), "\n");
    }

    #[test]
    fn test_bracket_only_line_is_not_a_section() {
        // `[]` has no name; it is treated as a plain line.
        assert_eq!(normalize("a=1\n[]"), "a=1\n[]\n");
    }

    #[test]
    fn test_idempotent_on_mixed_document() {
        let input = "  # Yealink base\r\n\r\n[account1]\r\nuser = 100\r\n\r\n\r\n[network]\r\nvlan =  7\r\n";
        let once = normalize(input);
        assert_eq!(normalize(&once), once);
        assert_eq!(once, "# Yealink base\n\n[account1]\nuser=100\n\n[network]\nvlan=7\n");
    }

    proptest! {
        #[test]
        fn prop_normalize_idempotent(input in r"[ a-z0-9=\[\]#;\r\n._-]{0,200}") {
            let once = normalize(&input);
            let twice = normalize(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_output_ends_with_single_newline(input in r"[ a-z0-9=\[\]#;\r\n._-]{0,200}") {
            let out = normalize(&input);
            prop_assert!(out.ends_with('\n'));
            prop_assert!(!out.ends_with("\n\n") || out == "\n");
        }
    }
}
