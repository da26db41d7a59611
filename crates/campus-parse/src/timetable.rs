use regex::Regex;
use std::sync::OnceLock;

use campus_model::{
    empty_schedule, Day, DocumentKind, RawDocument, Schedule, Slot, TimetableEntry,
    TimetableExtraction,
};

use crate::lexicon::Lexicon;
use crate::normalize::normalize_text;

/// How the timetable export is laid out.
#[derive(Debug, PartialEq)]
enum Orientation {
    /// A header row holds a time/period column plus one column per day.
    ColumnsAsDays {
        header_row: usize,
        slot_col: usize,
        day_cols: Vec<(Day, usize)>,
    },
    /// Each row starts with a day name followed by one cell per period.
    RowsAsDays,
    Unknown,
}

/// Build a weekly schedule from a timetable export.
pub fn extract_timetable(doc: &RawDocument) -> TimetableExtraction {
    extract_timetable_with(doc, &Lexicon::default())
}

pub fn extract_timetable_with(doc: &RawDocument, lexicon: &Lexicon) -> TimetableExtraction {
    if doc.kind() == DocumentKind::Markup {
        return if crate::is_login_page_with(&doc.text, lexicon) {
            TimetableExtraction::empty("Session expired")
        } else {
            TimetableExtraction::empty("Timetable data not available or endpoint format has changed")
        };
    }

    let rows = read_rows(&doc.text);
    if rows.is_empty() {
        return TimetableExtraction::empty("No timetable data found");
    }

    let schedule = match detect_orientation(&rows, lexicon) {
        Orientation::ColumnsAsDays {
            header_row,
            slot_col,
            day_cols,
        } => parse_columns_as_days(&rows, header_row, slot_col, &day_cols, lexicon),
        Orientation::RowsAsDays => parse_rows_as_days(&rows, lexicon),
        Orientation::Unknown => {
            return TimetableExtraction::empty("Unrecognized timetable layout");
        }
    };

    let extraction = TimetableExtraction::from_schedule(schedule);
    tracing::info!(periods = extraction.total_periods, "Extracted timetable");
    extraction
}

/// Read delimited rows, tolerating ragged lengths.
fn read_rows(text: &str) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.trim_start_matches('\u{feff}').as_bytes());

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        match record {
            Ok(record) => rows.push(record.iter().map(str::to_string).collect()),
            Err(e) => tracing::warn!(row = i, "Skipping unreadable timetable row: {e}"),
        }
    }
    rows
}

fn detect_orientation(rows: &[Vec<String>], lexicon: &Lexicon) -> Orientation {
    for (i, row) in rows.iter().enumerate() {
        // A day-led row is data; its cells may still read like "Time Series".
        if row.first().is_some_and(|c| Day::from_name(c).is_some()) {
            continue;
        }
        let Some(slot_col) = row.iter().position(|c| lexicon.is_slot_header(c)) else {
            continue;
        };
        let day_cols: Vec<(Day, usize)> = row
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != slot_col)
            .filter_map(|(j, c)| Day::mentioned_in(c).map(|d| (d, j)))
            .collect();
        if !day_cols.is_empty() {
            return Orientation::ColumnsAsDays {
                header_row: i,
                slot_col,
                day_cols,
            };
        }
    }

    let day_led = rows
        .iter()
        .any(|r| r.first().is_some_and(|c| Day::from_name(c).is_some()));
    if day_led {
        Orientation::RowsAsDays
    } else {
        Orientation::Unknown
    }
}

fn parse_columns_as_days(
    rows: &[Vec<String>],
    header_row: usize,
    slot_col: usize,
    day_cols: &[(Day, usize)],
    lexicon: &Lexicon,
) -> Schedule {
    let mut schedule = empty_schedule();
    for row in rows.iter().skip(header_row + 1) {
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let time = row.get(slot_col).map(|c| c.trim()).unwrap_or("");
        for &(day, col) in day_cols {
            let Some(cell) = row.get(col).map(|c| c.trim()) else {
                continue;
            };
            if lexicon.skips_column_cell(cell) {
                continue;
            }
            schedule
                .entry(day)
                .or_default()
                .push(TimetableEntry::plain(Slot::Time(time.to_string()), cell));
        }
    }
    schedule
}

fn parse_rows_as_days(rows: &[Vec<String>], lexicon: &Lexicon) -> Schedule {
    let mut schedule = empty_schedule();
    for row in rows {
        let Some(day) = row.first().and_then(|c| Day::from_name(c)) else {
            continue;
        };
        let entries = schedule.entry(day).or_default();
        for (period, cell) in row.iter().enumerate().skip(1) {
            let cell = cell.trim();
            if cell.is_empty() {
                continue;
            }
            if lexicon.is_free_period(cell) {
                entries.push(TimetableEntry::free(Slot::Period(period), cell));
            } else {
                entries.push(decompose_cell(&clean_cell_text(cell), period));
            }
        }
    }
    schedule
}

/// Flatten line breaks (literal and `<br>`) into a single spaced line.
fn clean_cell_text(cell: &str) -> String {
    static BR: OnceLock<Regex> = OnceLock::new();
    let re = BR.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));
    normalize_text(&re.replace_all(cell, " - "))
}

/// Split "CODE - Name [Type] - Teacher" into its parts where present.
///
/// Cells without a " - " separator keep only the subject text.
fn decompose_cell(text: &str, period: usize) -> TimetableEntry {
    let mut entry = TimetableEntry::plain(Slot::Period(period), text);
    let parts: Vec<&str> = text.split(" - ").collect();
    if parts.len() < 2 {
        return entry;
    }

    entry.code = non_empty(parts[0]);
    entry.name = parts[1].split('[').next().and_then(non_empty);
    if let (Some(open), Some(close)) = (text.find('['), text.find(']')) {
        if open < close {
            entry.kind = non_empty(&text[open + 1..close]);
        }
    }
    let segments: Vec<&str> = text.split(['[', ']', '-']).collect();
    if segments.len() > 2 {
        entry.teacher = segments.last().and_then(|s| non_empty(s));
    }
    entry
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(out: &TimetableExtraction, day: Day) -> &[TimetableEntry] {
        &out.schedule[&day]
    }

    #[test]
    fn test_rows_as_days_decomposition() {
        let csv = "Day,Period 1,Period 2,Period 3\n\
                   Monday,CS101 - Data Structures [Lecture] - Dr. Smith,break,-\n";
        let out = extract_timetable(&RawDocument::new(csv));
        assert!(out.diagnostic.is_none());

        let monday = entries(&out, Day::Monday);
        assert_eq!(monday.len(), 3);
        assert_eq!(monday[0].slot, Slot::Period(1));
        assert_eq!(monday[0].code.as_deref(), Some("CS101"));
        assert_eq!(monday[0].name.as_deref(), Some("Data Structures"));
        assert_eq!(monday[0].kind.as_deref(), Some("Lecture"));
        assert_eq!(monday[0].teacher.as_deref(), Some("Dr. Smith"));
        assert_eq!(monday[1], TimetableEntry::free(Slot::Period(2), "break"));
        assert_eq!(monday[2], TimetableEntry::free(Slot::Period(3), "-"));
        assert_eq!(out.total_periods, 3);
        assert!(entries(&out, Day::Sunday).is_empty());
    }

    #[test]
    fn test_columns_as_days() {
        let csv = "Time,Monday,Tuesday\n\
                   9:00-10:00,CS101,\n\
                   10:00-11:00,Lunch,MA201\n\
                   ,,\n";
        let out = extract_timetable(&RawDocument::new(csv));
        assert_eq!(
            entries(&out, Day::Monday),
            &[TimetableEntry::plain(Slot::Time("9:00-10:00".into()), "CS101")]
        );
        assert_eq!(
            entries(&out, Day::Tuesday),
            &[TimetableEntry::plain(Slot::Time("10:00-11:00".into()), "MA201")]
        );
        assert_eq!(out.total_periods, 2);
    }

    #[test]
    fn test_orientation_independence() {
        let columns = "Period,Monday,Wednesday\n1,CS101,MA201\n2,PH101,\n";
        let rows = "Monday,CS101,PH101\nWednesday,MA201\n";
        let a = extract_timetable(&RawDocument::new(columns));
        let b = extract_timetable(&RawDocument::new(rows));

        let subjects = |out: &TimetableExtraction, day: Day| -> Vec<String> {
            out.schedule[&day].iter().map(|e| e.subject.clone()).collect()
        };
        for day in Day::ALL {
            assert_eq!(subjects(&a, day), subjects(&b, day), "{day}");
        }
        assert_eq!(a.total_periods, b.total_periods);
    }

    #[test]
    fn test_free_period_cell_in_rows_does_not_flip_orientation() {
        let csv = "Monday,free period,CS101\n";
        let out = extract_timetable(&RawDocument::new(csv));
        let monday = entries(&out, Day::Monday);
        assert!(monday[0].is_free());
        assert_eq!(monday[1].slot, Slot::Period(2));
    }

    #[test]
    fn test_subject_named_like_header_stays_rows_as_days() {
        let csv = "Monday,Time Series Analysis,CS101\nTuesday,MA201,PH101\n";
        let out = extract_timetable(&RawDocument::new(csv));
        assert!(out.diagnostic.is_none());
        assert_eq!(out.total_periods, 4);

        let monday = entries(&out, Day::Monday);
        assert_eq!(
            monday[0],
            TimetableEntry::plain(Slot::Period(1), "Time Series Analysis")
        );
        assert_eq!(monday[1], TimetableEntry::plain(Slot::Period(2), "CS101"));
        let tuesday: Vec<&str> = entries(&out, Day::Tuesday)
            .iter()
            .map(|e| e.subject.as_str())
            .collect();
        assert_eq!(tuesday, ["MA201", "PH101"]);
    }

    #[test]
    fn test_br_cell_cleaning() {
        let csv = "Tuesday,\"CS102<br>Algorithms [Lab]<br/>Prof. Rao\"\n";
        let out = extract_timetable(&RawDocument::new(csv));
        let e = &entries(&out, Day::Tuesday)[0];
        assert_eq!(e.subject, "CS102 - Algorithms [Lab] - Prof. Rao");
        assert_eq!(e.code.as_deref(), Some("CS102"));
        assert_eq!(e.kind.as_deref(), Some("Lab"));
        assert_eq!(e.teacher.as_deref(), Some("Prof. Rao"));
    }

    #[test]
    fn test_plain_cell_keeps_subject_only() {
        let e = decompose_cell("Library", 4);
        assert_eq!(e, TimetableEntry::plain(Slot::Period(4), "Library"));
    }

    #[test]
    fn test_markup_responses() {
        let login = RawDocument::new("<html><head><title>Student Login</title></head></html>");
        assert_eq!(extract_timetable(&login).diagnostic.as_deref(), Some("Session expired"));

        let other = RawDocument::new("<html><head><title>Home</title></head></html>");
        let out = extract_timetable(&other);
        assert_eq!(
            out.diagnostic.as_deref(),
            Some("Timetable data not available or endpoint format has changed")
        );
        assert_eq!(out.schedule.len(), 7);
    }

    #[test]
    fn test_empty_and_unknown() {
        let out = extract_timetable(&RawDocument::new(""));
        assert_eq!(out.diagnostic.as_deref(), Some("No timetable data found"));
        assert_eq!(out.total_periods, 0);

        let out = extract_timetable(&RawDocument::new("a,b\nc,d\n"));
        assert_eq!(out.diagnostic.as_deref(), Some("Unrecognized timetable layout"));
    }
}
