//! Validation System - Rule/Report Separation
//!
//! Rules produce structured violations.
//! A report collects them and decides whether the operation may proceed.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::dates::parse_date_ymd;
use crate::model::{EventMetadata, Signatory};
use crate::sanitize::sanitize_folder_name;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationViolation {
    pub rule: String,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

impl ValidationViolation {
    pub fn new(rule: &str, message: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    pub fn expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }
}

impl fmt::Display for ValidationViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.rule, self.message)?;
        match (&self.expected, &self.actual) {
            (Some(e), Some(a)) => write!(f, " (expected {}, got '{}')", e, a),
            (Some(e), None) => write!(f, " (expected {})", e),
            (None, Some(a)) => write!(f, " (got '{}')", a),
            (None, None) => Ok(()),
        }
    }
}

/// One or more violations that block an operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationError {
    pub violations: Vec<ValidationViolation>,
}

impl ValidationError {
    pub fn single(violation: ValidationViolation) -> Self {
        Self {
            violations: vec![violation],
        }
    }

    pub fn has_rule(&self, rule: &str) -> bool {
        self.violations.iter().any(|v| v.rule == rule)
    }
}

impl From<ValidationViolation> for ValidationError {
    fn from(violation: ValidationViolation) -> Self {
        Self::single(violation)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<_> = self.violations.iter().map(|v| v.to_string()).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub violations: Vec<ValidationViolation>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: ValidationViolation) {
        self.violations.push(violation);
    }

    pub fn extend(&mut self, violations: impl IntoIterator<Item = ValidationViolation>) {
        self.violations.extend(violations);
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                violations: self.violations,
            })
        }
    }
}

/// Validation rule trait - produces violations
pub trait ValidationRule<T: ?Sized> {
    fn name(&self) -> &'static str;
    fn validate(&self, input: &T) -> Vec<ValidationViolation>;
}

// --- Tabular rules ---

/// Every listed column must be present in the header row.
pub struct RequiredColumnsRule {
    pub columns: &'static [&'static str],
}

impl ValidationRule<[String]> for RequiredColumnsRule {
    fn name(&self) -> &'static str { "required_column" }

    fn validate(&self, headers: &[String]) -> Vec<ValidationViolation> {
        self.columns
            .iter()
            .filter(|col| !headers.iter().any(|h| h == *col))
            .map(|col| {
                ValidationViolation::new(self.name(), format!("CSV missing required column: {}", col))
                    .expected(col.to_string())
                    .actual(headers.join(","))
            })
            .collect()
    }
}

// --- Signatory rules ---

pub struct SignatoryCountRule {
    pub max: usize,
}

impl ValidationRule<[Signatory]> for SignatoryCountRule {
    fn name(&self) -> &'static str { "signatory_count" }

    fn validate(&self, signatories: &[Signatory]) -> Vec<ValidationViolation> {
        let n = signatories.len();
        if n == 0 || n > self.max {
            vec![ValidationViolation::new(self.name(), "Need between 1 and 3 signatories (name + position)")
                .expected(format!("1..={}", self.max))
                .actual(n.to_string())]
        } else {
            vec![]
        }
    }
}

pub struct SignatoryFieldsRule;

impl ValidationRule<[Signatory]> for SignatoryFieldsRule {
    fn name(&self) -> &'static str { "signatory_fields" }

    fn validate(&self, signatories: &[Signatory]) -> Vec<ValidationViolation> {
        signatories
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_valid())
            .map(|(i, s)| {
                ValidationViolation::new(
                    self.name(),
                    format!("Signatory #{} needs both a name and a position", i + 1),
                )
                .actual(format!("{}|{}", s.name, s.position))
            })
            .collect()
    }
}

// --- Event rules ---

pub struct EventTitleRule;

impl ValidationRule<EventMetadata> for EventTitleRule {
    fn name(&self) -> &'static str { "event_title" }

    fn validate(&self, event: &EventMetadata) -> Vec<ValidationViolation> {
        if event.title.trim().is_empty() {
            return vec![ValidationViolation::new(self.name(), "Event name is required")];
        }
        if sanitize_folder_name(&event.title).is_empty() {
            return vec![ValidationViolation::new(self.name(), "Event name contains only invalid characters")
                .actual(event.title.clone())];
        }
        vec![]
    }
}

pub struct EventDatesRule;

impl ValidationRule<EventMetadata> for EventDatesRule {
    fn name(&self) -> &'static str { "event_dates" }

    fn validate(&self, event: &EventMetadata) -> Vec<ValidationViolation> {
        let mut violations = vec![];
        let start = parse_date_ymd(&event.start_date).map_err(|e| violations.extend(e.violations));
        let end = parse_date_ymd(&event.end_date).map_err(|e| violations.extend(e.violations));

        if let (Ok(Some(s)), Ok(Some(e))) = (start, end) {
            if e < s {
                violations.push(
                    ValidationViolation::new(self.name(), "End date is before start date")
                        .expected(format!(">= {}", s))
                        .actual(e.to_string()),
                );
            }
        }
        violations
    }
}

/// Runs every rule for a given input type and collects the report.
pub struct Validator<T: ?Sized + 'static> {
    rules: Vec<Box<dyn ValidationRule<T>>>,
}

impl<T: ?Sized + 'static> Validator<T> {
    pub fn with_rules(rules: Vec<Box<dyn ValidationRule<T>>>) -> Self {
        Self { rules }
    }

    pub fn validate(&self, input: &T) -> ValidationReport {
        let mut report = ValidationReport::new();
        for rule in &self.rules {
            report.extend(rule.validate(input));
        }
        report
    }
}

impl Validator<EventMetadata> {
    pub fn for_events() -> Self {
        Self::with_rules(vec![Box::new(EventTitleRule), Box::new(EventDatesRule)])
    }
}

impl Validator<[Signatory]> {
    pub fn for_signatories() -> Self {
        Self::with_rules(vec![
            Box::new(SignatoryFieldsRule),
            Box::new(SignatoryCountRule { max: crate::layout::MAX_SIGNATORIES }),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(title: &str, start: &str, end: &str) -> EventMetadata {
        EventMetadata {
            title: title.to_string(),
            organization: String::new(),
            start_date: start.to_string(),
            end_date: end.to_string(),
        }
    }

    #[test]
    fn required_columns_reports_every_missing_column() {
        let rule = RequiredColumnsRule { columns: &["event_name", "name", "signatory_name"] };
        let headers = vec!["name".to_string()];
        let violations = rule.validate(&headers);
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].expected.as_deref(), Some("event_name"));
        assert_eq!(violations[1].expected.as_deref(), Some("signatory_name"));
    }

    #[test]
    fn event_validator_collects_date_errors() {
        let report = Validator::for_events().validate(&event("Expo", "2025-13-01", "bad"));
        assert_eq!(report.violations.len(), 2);
        assert!(report.violations.iter().all(|v| v.rule == "date_format"));
    }

    #[test]
    fn event_validator_rejects_reversed_range() {
        let err = Validator::for_events()
            .validate(&event("Expo", "2025-02-02", "2025-02-01"))
            .into_result()
            .unwrap_err();
        assert!(err.has_rule("event_dates"));
    }

    #[test]
    fn event_validator_rejects_unsanitizable_title() {
        let err = Validator::for_events().validate(&event("???", "", "")).into_result().unwrap_err();
        assert!(err.has_rule("event_title"));
    }

    #[test]
    fn signatory_validator_enforces_bounds() {
        let sig = |n: &str| Signatory::new(n, "Dean");
        let none: Vec<Signatory> = vec![];
        assert!(!Validator::for_signatories().validate(&none[..]).is_valid());

        let four = vec![sig("a"), sig("b"), sig("c"), sig("d")];
        assert!(!Validator::for_signatories().validate(&four[..]).is_valid());

        let blank_position = vec![Signatory::new("a", " ")];
        let report = Validator::for_signatories().validate(&blank_position[..]);
        assert_eq!(report.violations[0].rule, "signatory_fields");
    }

    #[test]
    fn violation_display_includes_expected_and_actual() {
        let v = ValidationViolation::new("date_format", "Invalid date").expected("YYYY-MM-DD").actual("2025/01/01");
        assert_eq!(v.to_string(), "date_format: Invalid date (expected YYYY-MM-DD, got '2025/01/01')");
    }
}
