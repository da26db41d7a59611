use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

use campus_model::{
    attendance_percentage, AttendancePeriodRecord, AttendanceStatus, Extracted, RawDocument,
    SubjectAttendanceRecord,
};

use crate::lexicon::Lexicon;
use crate::normalize::cell_text;

fn selector(s: &str) -> Selector {
    Selector::parse(s).expect("valid selector")
}

/// Extract per-period records from the day-by-day attendance grid.
pub fn extract_attendance_grid(doc: &RawDocument) -> Extracted<AttendancePeriodRecord> {
    extract_attendance_grid_with(doc, &Lexicon::default())
}

/// Grid extraction with a caller-supplied vocabulary.
///
/// The grid is the first table whose header cells include one containing
/// "period" and one equal to "date". Every row after the header contributes
/// one record per cell after the date column. Status comes from colour hints
/// in the cell's `style`, `class` and `bgcolor`; a cell with neither hint is
/// present when it names a subject and no-class otherwise.
pub fn extract_attendance_grid_with(
    doc: &RawDocument,
    lexicon: &Lexicon,
) -> Extracted<AttendancePeriodRecord> {
    let html = Html::parse_document(&doc.text);
    let table_sel = selector("table");
    let row_sel = selector("tr");
    let cell_sel = selector("td, th");

    let Some(table) = html.select(&table_sel).find(|t| is_grid_table(t)) else {
        return Extracted::empty("no attendance grid found (expected a table with 'Period' and 'Date' headers)");
    };

    let mut records = Vec::new();
    for row in table.select(&row_sel).skip(1) {
        let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
        if cells.len() < 2 {
            continue;
        }
        let date = cell_text(cells[0]);
        if date.is_empty() || lexicon.is_summary_label(&date) {
            tracing::debug!(label = %date, "Skipping non-date grid row");
            continue;
        }
        for (i, cell) in cells[1..].iter().enumerate() {
            let (status, subject) = classify_cell(*cell, lexicon);
            records.push(AttendancePeriodRecord {
                date: date.clone(),
                period: i + 1,
                status,
                subject,
            });
        }
    }

    if records.is_empty() {
        return Extracted::empty("attendance grid has no dated rows");
    }
    tracing::info!(records = records.len(), "Extracted attendance grid");
    Extracted::found(records)
}

fn is_grid_table(table: &ElementRef) -> bool {
    let th_sel = selector("th");
    let headers: Vec<String> = table
        .select(&th_sel)
        .map(|th| cell_text(th).to_lowercase())
        .collect();
    headers.iter().any(|h| h.contains("period")) && headers.iter().any(|h| h == "date")
}

fn classify_cell(cell: ElementRef, lexicon: &Lexicon) -> (AttendanceStatus, String) {
    let elem = cell.value();
    let hints = format!(
        "{} {} {}",
        elem.attr("style").unwrap_or(""),
        elem.classes().collect::<Vec<_>>().join(" "),
        elem.attr("bgcolor").unwrap_or(""),
    )
    .to_lowercase();

    let text = cell_text(cell);
    let subject = if lexicon.is_placeholder(&text) {
        String::new()
    } else {
        text
    };

    let status = if lexicon.hints_present(&hints) {
        AttendanceStatus::Present
    } else if lexicon.hints_absent(&hints) {
        AttendanceStatus::Absent
    } else if !subject.is_empty() {
        AttendanceStatus::Present
    } else {
        AttendanceStatus::NoClass
    };
    (status, subject)
}

/// Extract per-subject ratios ("46/49 (94%)") from the subject summary table.
pub fn extract_subject_attendance(doc: &RawDocument) -> Extracted<SubjectAttendanceRecord> {
    extract_subject_attendance_with(doc, &Lexicon::default())
}

/// Subject-ratio extraction with a caller-supplied vocabulary.
pub fn extract_subject_attendance_with(
    doc: &RawDocument,
    lexicon: &Lexicon,
) -> Extracted<SubjectAttendanceRecord> {
    let html = Html::parse_document(&doc.text);
    let row_sel = selector("tr");
    let cell_sel = selector("td, th");

    let marked = Selector::parse(&lexicon.subject_table_selector)
        .ok()
        .and_then(|sel| html.select(&sel).next());
    let table = marked.or_else(|| {
        html.select(&selector("table"))
            .find(|t| lexicon.mentions_subject_table(&t.text().collect::<String>()))
    });
    let Some(table) = table else {
        return Extracted::empty("no subject attendance table found");
    };

    let rows: Vec<ElementRef> = table.select(&row_sel).collect();
    if rows.len() < 2 {
        return Extracted::empty("subject attendance table has no data rows");
    }
    let headers: Vec<String> = rows[0].select(&cell_sel).map(cell_text).collect();

    let mut records = Vec::new();
    for row in &rows[1..] {
        for (col, cell) in row.select(&cell_sel).enumerate() {
            if col < lexicon.ratio_first_column {
                continue;
            }
            let text = cell_text(cell);
            let Some(ratio) = parse_ratio(&text) else {
                continue;
            };
            let subject = headers
                .get(col)
                .cloned()
                .unwrap_or_else(|| format!("Subject_{col}"));
            if ratio.present > ratio.total {
                tracing::debug!(%subject, cell = %text, "Dropping ratio with present above total");
                continue;
            }
            if ratio.percent.is_some_and(|p| !(0.0..=100.0).contains(&p)) {
                tracing::debug!(%subject, cell = %text, "Dropping ratio with percentage outside 0-100");
                continue;
            }
            let percentage = ratio
                .percent
                .unwrap_or_else(|| attendance_percentage(ratio.present as usize, ratio.total as usize));
            records.push(SubjectAttendanceRecord {
                subject,
                present: ratio.present,
                total: ratio.total,
                percentage,
            });
        }
    }

    if records.is_empty() {
        return Extracted::empty("subject attendance table has no ratio cells");
    }
    tracing::info!(subjects = records.len(), "Extracted subject attendance");
    Extracted::found(records)
}

#[derive(Debug, PartialEq)]
struct Ratio {
    present: u32,
    total: u32,
    percent: Option<f64>,
}

/// Parse `<present>/<total>` optionally followed by `(<n>%)`.
fn parse_ratio(text: &str) -> Option<Ratio> {
    static RATIO: OnceLock<Regex> = OnceLock::new();
    let re = RATIO.get_or_init(|| {
        Regex::new(r"(\d+)\s*/\s*(\d+)(?:\s*\(\s*(\d+(?:\.\d+)?)\s*%\s*\))?").expect("valid regex")
    });
    let caps = re.captures(text)?;
    Some(Ratio {
        present: caps[1].parse().ok()?,
        total: caps[2].parse().ok()?,
        percent: caps.get(3).and_then(|m| m.as_str().parse().ok()),
    })
}
