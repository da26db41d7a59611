use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of the internal assessment results table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultRecord {
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semester: Option<String>,
    /// Assessment kind: exam, assignment, project title, etc.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_marks: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marks: Option<u32>,
    /// Text printed instead of marks (e.g. "Results not published").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// One course row from an end-semester grade card.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExamSubject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit: Option<u32>,
    /// Pass/fail text as printed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// A published end-semester examination result.
///
/// Metadata fields are empty strings when the page does not state them and
/// they cannot be read off the exam name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExamResult {
    pub exam_name: String,
    pub degree: String,
    pub semester: String,
    pub academic_year: String,
    pub month: String,
    pub year: String,
    pub subjects: Vec<ExamSubject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earned_credit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sgpa: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cgpa: Option<f64>,
}

/// Label/value pairs scraped from the profile page, keyed in snake_case.
pub type Profile = BTreeMap<String, String>;
