use scraper::{ElementRef, Html, Selector};

use campus_model::{Extracted, Profile, RawDocument, ResultRecord};

use crate::lexicon::Lexicon;
use crate::normalize::{cell_text, normalize_text};

/// Characters of body text kept when the profile page has no label/value rows.
const RAW_PROFILE_CHARS: usize = 500;

fn selector(s: &str) -> Selector {
    Selector::parse(s).expect("valid selector")
}

/// Extract internal assessment rows from the results page.
pub fn extract_results(doc: &RawDocument) -> Extracted<ResultRecord> {
    extract_results_with(doc, &Lexicon::default())
}

pub fn extract_results_with(doc: &RawDocument, lexicon: &Lexicon) -> Extracted<ResultRecord> {
    let html = Html::parse_document(&doc.text);
    let row_sel = selector("tr");
    let cell_sel = selector("td, th");

    let mut records = Vec::new();
    for table in html.select(&selector("table")) {
        if !lexicon.mentions_results_table(&table.text().collect::<String>()) {
            continue;
        }
        let rows: Vec<ElementRef> = table.select(&row_sel).collect();
        let Some(header_row) = rows.first() else {
            continue;
        };
        let headers: Vec<String> = header_row
            .select(&cell_sel)
            .map(|c| cell_text(c).to_lowercase())
            .collect();
        let data_rows = if rows.len() > 1 { &rows[1..] } else { &rows[..] };

        for row in data_rows {
            let cells: Vec<String> = row.select(&cell_sel).map(cell_text).collect();
            if cells.len() < 2 {
                continue;
            }
            let record = result_row(&headers, &cells, lexicon);
            if !record.subject.is_empty() {
                records.push(record);
            }
        }
    }

    if records.is_empty() {
        return Extracted::empty("no results table found");
    }
    tracing::info!(records = records.len(), "Extracted results");
    Extracted::found(records)
}

fn result_row(headers: &[String], cells: &[String], lexicon: &Lexicon) -> ResultRecord {
    let mut record = ResultRecord::default();
    for (header, cell) in headers.iter().zip(cells) {
        if cell.is_empty() {
            continue;
        }
        if header.contains("subject") {
            record.subject = cell.clone();
        } else if header.contains("semester") {
            record.semester = Some(cell.clone());
        } else if lexicon.results_type_headers.iter().any(|k| header.contains(k.as_str())) {
            record.kind = Some(cell.clone());
        } else if header.contains("maximum") {
            if let Some(marks) = parse_marks(cell) {
                record.max_marks = Some(marks);
            }
        } else if header.contains("obtained") {
            match parse_marks(cell) {
                Some(marks) => record.marks = Some(marks),
                None => record.status = Some(cell.clone()),
            }
        }
    }
    record
}

/// Whole marks; "40.0" is accepted, fractional or non-numeric text is not.
fn parse_marks(cell: &str) -> Option<u32> {
    let value: f64 = cell.trim().parse().ok()?;
    (value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64).then_some(value as u32)
}

/// Collect label/value pairs from two-cell table rows on the profile page.
///
/// Labels become lower_snake_case keys. When no such rows exist the first
/// part of the page text is returned under `raw_content`.
pub fn extract_profile(doc: &RawDocument) -> Profile {
    let html = Html::parse_document(&doc.text);
    let row_sel = selector("tr");
    let cell_sel = selector("td, th");

    let mut profile = Profile::new();
    for row in html.select(&row_sel) {
        let cells: Vec<String> = row.select(&cell_sel).map(cell_text).collect();
        if let [label, value] = cells.as_slice() {
            if label.is_empty() || value.is_empty() {
                continue;
            }
            let key = label
                .trim_end_matches(':')
                .trim()
                .to_lowercase()
                .replace(' ', "_");
            profile.insert(key, value.clone());
        }
    }

    if profile.is_empty() {
        let text = html
            .select(&selector("body"))
            .next()
            .map(|b| normalize_text(&b.text().collect::<String>()))
            .unwrap_or_default();
        if !text.is_empty() {
            let mut raw: String = text.chars().take(RAW_PROFILE_CHARS).collect();
            if text.chars().count() > RAW_PROFILE_CHARS {
                raw.push_str("...");
            }
            profile.insert("raw_content".to_string(), raw);
        }
    }
    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS: &str = r#"
        <table>
          <tr><th>Semester</th><th>Subject</th><th>Exam</th><th>Maximum Marks</th><th>Marks Obtained</th></tr>
          <tr><td>5</td><td>Data Structures</td><td>Internal 1</td><td>50</td><td>42</td></tr>
          <tr><td>5</td><td>Operating Systems</td><td>Internal 1</td><td>50</td><td>Not published</td></tr>
          <tr><td>5</td><td></td><td>Internal 1</td><td>50</td><td>40</td></tr>
        </table>"#;

    #[test]
    fn test_results_rows() {
        let out = extract_results(&RawDocument::new(RESULTS));
        assert_eq!(out.records.len(), 2);
        assert_eq!(
            out.records[0],
            ResultRecord {
                subject: "Data Structures".into(),
                semester: Some("5".into()),
                kind: Some("Internal 1".into()),
                max_marks: Some(50),
                marks: Some(42),
                status: None,
            }
        );
        assert_eq!(out.records[1].marks, None);
        assert_eq!(out.records[1].status.as_deref(), Some("Not published"));
    }

    #[test]
    fn test_results_missing() {
        let out = extract_results(&RawDocument::new("<table><tr><td>Menu</td></tr></table>"));
        assert!(out.is_empty());
    }

    #[test]
    fn test_parse_marks() {
        assert_eq!(parse_marks("40"), Some(40));
        assert_eq!(parse_marks("40.0"), Some(40));
        assert_eq!(parse_marks("40.5"), None);
        assert_eq!(parse_marks("AB"), None);
    }

    #[test]
    fn test_profile_pairs() {
        let html = r#"<table>
            <tr><th>Student Name:</th><td>Asha K</td></tr>
            <tr><td>Roll Number</td><td>21CS001</td></tr>
            <tr><td>Empty</td><td></td></tr>
            <tr><td>a</td><td>b</td><td>c</td></tr>
        </table>"#;
        let profile = extract_profile(&RawDocument::new(html));
        assert_eq!(profile.len(), 2);
        assert_eq!(profile["student_name"], "Asha K");
        assert_eq!(profile["roll_number"], "21CS001");
    }

    #[test]
    fn test_profile_raw_fallback() {
        let body = "x".repeat(600);
        let profile = extract_profile(&RawDocument::new(format!("<html><body><p>{body}</p></body></html>")));
        let raw = &profile["raw_content"];
        assert_eq!(raw.len(), 503);
        assert!(raw.ends_with("..."));
    }
}
