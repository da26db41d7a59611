use serde::{Deserialize, Serialize};

use crate::round2;

/// Attendance state of a single period.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    /// No class was held (or recorded) in this slot.
    NoClass,
}

/// One cell of the day-by-day attendance grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttendancePeriodRecord {
    /// Date exactly as printed in the grid's first column.
    pub date: String,
    /// 1-based period index, sequential within a date.
    pub period: usize,
    pub status: AttendanceStatus,
    /// Subject label from the cell text; empty when the cell had none.
    pub subject: String,
}

/// All periods recorded for one date, in grid order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DateAttendance {
    pub date: String,
    pub periods: Vec<PeriodEntry>,
}

/// A period entry without the repeated date, as nested under `DateAttendance`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeriodEntry {
    pub period: usize,
    pub status: AttendanceStatus,
    pub subject: String,
}

/// Aggregate counts over a set of period records.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AttendanceSummary {
    pub total_periods: usize,
    pub present: usize,
    pub absent: usize,
    pub no_class: usize,
    /// `present / (present + absent) * 100`, two decimals. `no_class`
    /// periods are not part of the denominator.
    pub percentage: f64,
}

impl AttendanceSummary {
    pub fn from_records(records: &[AttendancePeriodRecord]) -> Self {
        let mut summary = Self::default();
        for record in records {
            summary.total_periods += 1;
            match record.status {
                AttendanceStatus::Present => summary.present += 1,
                AttendanceStatus::Absent => summary.absent += 1,
                AttendanceStatus::NoClass => summary.no_class += 1,
            }
        }
        summary.percentage = attendance_percentage(summary.present, summary.present + summary.absent);
        summary
    }
}

/// Percentage of `attended` over `held`, rounded to two decimals; 0 when nothing was held.
pub fn attendance_percentage(attended: usize, held: usize) -> f64 {
    if held == 0 {
        return 0.0;
    }
    round2(attended as f64 / held as f64 * 100.0)
}

/// Group flat period records by date, preserving first-seen date order.
pub fn group_by_date(records: &[AttendancePeriodRecord]) -> Vec<DateAttendance> {
    let mut grouped: Vec<DateAttendance> = Vec::new();
    for record in records {
        let entry = PeriodEntry {
            period: record.period,
            status: record.status,
            subject: record.subject.clone(),
        };
        match grouped.iter_mut().find(|d| d.date == record.date) {
            Some(day) => day.periods.push(entry),
            None => grouped.push(DateAttendance {
                date: record.date.clone(),
                periods: vec![entry],
            }),
        }
    }
    grouped
}

/// Per-subject attendance ratio from the subject summary page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubjectAttendanceRecord {
    pub subject: String,
    pub present: u32,
    pub total: u32,
    /// 0–100, two decimals. Taken from the page when printed, otherwise computed.
    pub percentage: f64,
}

/// Mean of the subject percentages, two decimals. `None` when there are no subjects.
pub fn overall_percentage(records: &[SubjectAttendanceRecord]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    let sum: f64 = records.iter().map(|r| r.percentage).sum();
    Some(round2(sum / records.len() as f64))
}
