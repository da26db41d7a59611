use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Day of the teaching week. Ordering follows the calendar week starting Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
        Day::Sunday,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
            Day::Sunday => "Sunday",
        }
    }

    /// Exact (case-insensitive, trimmed) match against a full day name.
    pub fn from_name(s: &str) -> Option<Day> {
        let s = s.trim();
        Day::ALL.into_iter().find(|d| d.name().eq_ignore_ascii_case(s))
    }

    /// First day whose name appears anywhere in `s`, case-insensitively.
    pub fn mentioned_in(s: &str) -> Option<Day> {
        let lower = s.to_lowercase();
        Day::ALL
            .into_iter()
            .find(|d| lower.contains(&d.name().to_lowercase()))
    }
}

impl std::fmt::Display for Day {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where an entry sits in the day: a printed time label or a period column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Time(String),
    Period(usize),
}

/// The `type` value marking an explicit free period.
pub const FREE_PERIOD_TYPE: &str = "free";

/// One scheduled (or explicitly free) slot in the timetable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableEntry {
    #[serde(flatten)]
    pub slot: Slot,
    /// Full cell text after line-break normalization.
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Session kind from the bracketed tag (e.g. "Lecture"), or `free`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher: Option<String>,
}

impl TimetableEntry {
    /// An entry holding only a subject label.
    pub fn plain(slot: Slot, subject: impl Into<String>) -> Self {
        Self {
            slot,
            subject: subject.into(),
            code: None,
            name: None,
            kind: None,
            teacher: None,
        }
    }

    pub fn free(slot: Slot, label: impl Into<String>) -> Self {
        Self {
            kind: Some(FREE_PERIOD_TYPE.to_string()),
            ..Self::plain(slot, label)
        }
    }

    pub fn is_free(&self) -> bool {
        self.kind.as_deref() == Some(FREE_PERIOD_TYPE)
    }
}

/// Day → entries, always holding all seven days in week order.
pub type Schedule = BTreeMap<Day, Vec<TimetableEntry>>;

pub fn empty_schedule() -> Schedule {
    Day::ALL.into_iter().map(|d| (d, Vec::new())).collect()
}

/// Output of the timetable extractor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimetableExtraction {
    pub schedule: Schedule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    pub total_periods: usize,
}

impl TimetableExtraction {
    pub fn from_schedule(schedule: Schedule) -> Self {
        let total_periods = schedule.values().map(Vec::len).sum();
        Self {
            schedule,
            diagnostic: None,
            total_periods,
        }
    }

    pub fn empty(diagnostic: impl Into<String>) -> Self {
        Self {
            schedule: empty_schedule(),
            diagnostic: Some(diagnostic.into()),
            total_periods: 0,
        }
    }
}
