pub mod response;

pub use response::{validate_response, ChallengeMarkers, InvalidReason, Verdict};

use campus_model::{AttendanceSummary, SubjectAttendanceRecord};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("subject '{subject}' has {present} present out of {total}")]
    PresentExceedsTotal {
        subject: String,
        present: u32,
        total: u32,
    },

    #[error("subject '{subject}' has percentage {percentage} outside 0..=100")]
    PercentageOutOfRange { subject: String, percentage: f64 },

    #[error("subject '{0}' appears more than once")]
    DuplicateSubject(String),

    #[error("summary counts {present}+{absent}+{no_class} do not add up to {total}")]
    SummaryMismatch {
        present: usize,
        absent: usize,
        no_class: usize,
        total: usize,
    },

    #[error("{0}")]
    Other(String),
}

/// Check subject-ratio records for internal consistency.
pub fn validate_subject_records(records: &[SubjectAttendanceRecord]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for r in records {
        if r.present > r.total {
            errors.push(ValidationError::PresentExceedsTotal {
                subject: r.subject.clone(),
                present: r.present,
                total: r.total,
            });
        }
        if !(0.0..=100.0).contains(&r.percentage) || r.percentage.is_nan() {
            errors.push(ValidationError::PercentageOutOfRange {
                subject: r.subject.clone(),
                percentage: r.percentage,
            });
        }
        if !seen.insert(r.subject.as_str()) {
            errors.push(ValidationError::DuplicateSubject(r.subject.clone()));
        }
    }

    for e in &errors {
        tracing::warn!("{e}");
    }
    errors
}

/// Check that a grid summary's counts are coherent.
pub fn validate_summary(summary: &AttendanceSummary) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if summary.present + summary.absent + summary.no_class != summary.total_periods {
        errors.push(ValidationError::SummaryMismatch {
            present: summary.present,
            absent: summary.absent,
            no_class: summary.no_class,
            total: summary.total_periods,
        });
    }
    if !(0.0..=100.0).contains(&summary.percentage) {
        errors.push(ValidationError::Other(format!(
            "summary percentage {} outside 0..=100",
            summary.percentage
        )));
    }

    for e in &errors {
        tracing::warn!("{e}");
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(name: &str, present: u32, total: u32, percentage: f64) -> SubjectAttendanceRecord {
        SubjectAttendanceRecord {
            subject: name.to_string(),
            present,
            total,
            percentage,
        }
    }

    #[test]
    fn test_valid_subject_records() {
        let records = vec![subject("DS", 46, 49, 94.0), subject("OS", 10, 10, 100.0)];
        let errors = validate_subject_records(&records);
        assert!(errors.is_empty(), "Expected no errors, got: {:?}", errors);
    }

    #[test]
    fn test_present_exceeds_total() {
        let errors = validate_subject_records(&[subject("DS", 12, 10, 100.0)]);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::PresentExceedsTotal { .. })));
    }

    #[test]
    fn test_percentage_out_of_range() {
        let errors = validate_subject_records(&[subject("DS", 1, 10, -5.0)]);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::PercentageOutOfRange { .. })));
    }

    #[test]
    fn test_duplicate_subject() {
        let errors =
            validate_subject_records(&[subject("DS", 1, 2, 50.0), subject("DS", 2, 2, 100.0)]);
        assert_eq!(errors, vec![ValidationError::DuplicateSubject("DS".into())]);
    }

    #[test]
    fn test_summary_mismatch() {
        let summary = AttendanceSummary {
            total_periods: 5,
            present: 2,
            absent: 1,
            no_class: 1,
            percentage: 66.67,
        };
        let errors = validate_summary(&summary);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::SummaryMismatch { .. })));
    }
}
