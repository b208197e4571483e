//! Identifier sanitization for event folders and certificate files.

use crate::validation::{ValidationError, ValidationViolation};

pub const FOLDER_MAX_LEN: usize = 80;
pub const FILE_MAX_LEN: usize = 120;

const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Strip forbidden and control characters, collapse whitespace runs to `_`
/// and keep at most `max_len` characters. May return an empty string.
pub fn sanitize_with_limit(input: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_space = false;

    for c in input.trim().chars() {
        if FORBIDDEN.contains(&c) || c.is_ascii_control() {
            continue;
        }
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
                in_space = true;
            }
        } else {
            out.push(c);
            in_space = false;
        }
    }

    out.chars().take(max_len).collect()
}

pub fn sanitize(input: &str) -> String {
    sanitize_folder_name(input)
}

pub fn sanitize_folder_name(input: &str) -> String {
    sanitize_with_limit(input, FOLDER_MAX_LEN)
}

pub fn sanitize_file_name(input: &str) -> String {
    sanitize_with_limit(input, FILE_MAX_LEN)
}

/// Folder identifier for an event, rejecting names that sanitize to nothing.
pub fn folder_identifier(input: &str) -> Result<String, ValidationError> {
    non_empty(sanitize_folder_name(input), input, "folder_identifier")
}

/// File stem for a participant artifact, rejecting names that sanitize to nothing.
pub fn file_identifier(input: &str) -> Result<String, ValidationError> {
    non_empty(sanitize_file_name(input), input, "file_identifier")
}

fn non_empty(sanitized: String, raw: &str, rule: &str) -> Result<String, ValidationError> {
    if sanitized.is_empty() {
        Err(ValidationViolation::new(rule, "Name reduces to an empty identifier")
            .actual(raw)
            .into())
    } else {
        Ok(sanitized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_forbidden_characters() {
        let s = sanitize("Team/Alpha: 2025");
        assert!(!s.contains('/'));
        assert!(!s.contains(':'));
        assert_eq!(s, "TeamAlpha_2025");
    }

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(sanitize("  Annual \t\n  Gala   Night "), "Annual_Gala_Night");
        assert_eq!(sanitize("a\u{00a0}\u{2003}b"), "a_b");
    }

    #[test]
    fn strips_control_characters() {
        assert_eq!(sanitize("ab\u{0007}c\u{007f}"), "abc");
    }

    #[test]
    fn idempotent_on_awkward_inputs() {
        let repeated = "x ".repeat(100);
        let inputs = [
            "Team/Alpha: 2025",
            "<  leading",
            "trailing  >",
            " * ? ",
            "tab\tinside",
            "ünïcödé   námé",
            repeated.as_str(),
            "",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "input {:?}", input);
            let once = sanitize_file_name(input);
            assert_eq!(sanitize_file_name(&once), once, "input {:?}", input);
        }
    }

    #[test]
    fn truncates_by_characters() {
        let long = "é".repeat(200);
        assert_eq!(sanitize_folder_name(&long).chars().count(), FOLDER_MAX_LEN);
        assert_eq!(sanitize_file_name(&long).chars().count(), FILE_MAX_LEN);
    }

    #[test]
    fn empty_identifier_is_a_validation_error() {
        let err = folder_identifier(" <>?* ").unwrap_err();
        assert!(err.has_rule("folder_identifier"));
        assert!(file_identifier("").is_err());
        assert_eq!(file_identifier("Jane Doe").unwrap(), "Jane_Doe");
    }
}
