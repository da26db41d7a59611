//! End-semester grade cards and the listing that links to them.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

use campus_model::{ExamResult, ExamSubject, RawDocument};

use crate::normalize::cell_text;

/// Href fragments of links from the results listing to individual grade cards.
const RESULT_LINK_MARKERS: [&str; 2] = ["viewresult", "examresult"];

/// Header text identifying the course table on a grade card.
const GRADE_TABLE_HEADERS: [&str; 4] = ["course code", "course name", "grade", "slot"];

fn selector(s: &str) -> Selector {
    Selector::parse(s).expect("valid selector")
}

/// Grade-card links on the results listing page, in page order without duplicates.
///
/// Hrefs are returned as written; the caller resolves relative ones.
pub fn exam_result_links(doc: &RawDocument) -> Vec<String> {
    let html = Html::parse_document(&doc.text);
    let mut links: Vec<String> = Vec::new();
    for anchor in html.select(&selector("a[href]")) {
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        let lower = href.to_lowercase();
        if RESULT_LINK_MARKERS.iter().any(|m| lower.contains(m)) && !links.iter().any(|l| l == href) {
            links.push(href.to_string());
        }
    }
    links
}

/// Extract one grade card: exam metadata, course rows and the grade-point summary.
///
/// Returns `None` when the page holds no course rows.
pub fn extract_exam_result(doc: &RawDocument) -> Option<ExamResult> {
    let html = Html::parse_document(&doc.text);
    let mut exam = ExamResult::default();

    read_metadata_rows(&html, &mut exam);
    if exam.exam_name.is_empty() {
        exam.exam_name = exam_name_from_headings(&html).unwrap_or_default();
    }
    if !exam.exam_name.is_empty() {
        fill_from_exam_name(&mut exam);
    }

    for table in html.select(&selector("table")) {
        read_grade_table(table, &mut exam);
    }

    if exam.subjects.is_empty() {
        tracing::debug!(exam = %exam.exam_name, "Grade card has no course rows");
        return None;
    }
    tracing::info!(exam = %exam.exam_name, subjects = exam.subjects.len(), "Extracted exam result");
    Some(exam)
}

/// Label/value rows such as "Name of Exam | B.Tech S5 ...".
fn read_metadata_rows(html: &Html, exam: &mut ExamResult) {
    let td = selector("td");
    for row in html.select(&selector("tr")) {
        let cells: Vec<String> = row.select(&td).map(cell_text).collect();
        let [label, value, ..] = cells.as_slice() else {
            continue;
        };
        let label = label.to_lowercase();
        let value = value.clone();
        if label.contains("name of exam") {
            exam.exam_name = value;
        } else if label.contains("degree") && exam.degree.is_empty() {
            exam.degree = value;
        } else if label.contains("semester") && exam.semester.is_empty() {
            exam.semester = value;
        } else if label.contains("academic year") {
            exam.academic_year = value;
        } else if label.contains("month") && !label.contains("academic") {
            exam.month = value;
        } else if label.trim_end_matches(':').trim() == "year" {
            exam.year = value;
        }
    }
}

fn exam_name_from_headings(html: &Html) -> Option<String> {
    let headings = html
        .select(&selector("h1, h2, h3, title"))
        .map(cell_text)
        .find(|text| {
            let lower = text.to_lowercase();
            lower.contains("semester") && lower.contains("exam")
        });
    headings.or_else(|| {
        html.select(&selector("a[href]"))
            .map(cell_text)
            .find(|text| text.to_lowercase().contains("semester") && text.chars().count() > 20)
    })
}

/// Fill metadata the page did not state from the exam name
/// (e.g. "B.Tech Fifth Semester Exam December 2024 (2022 Admission)").
fn fill_from_exam_name(exam: &mut ExamResult) {
    static SEMESTER: OnceLock<Regex> = OnceLock::new();
    static MONTH_YEAR: OnceLock<Regex> = OnceLock::new();
    static ADMISSION: OnceLock<Regex> = OnceLock::new();
    static YEAR_RANGE: OnceLock<Regex> = OnceLock::new();

    let name = exam.exam_name.clone();

    if exam.semester.is_empty() {
        let re = SEMESTER.get_or_init(|| {
            Regex::new(
                r"(?i)(First|Second|Third|Fourth|Fifth|Sixth|Seventh|Eighth|Ist|IInd|IIIrd|IVth|Vth|VIth|VIIth|VIIIth)\s+Semester",
            )
            .expect("valid regex")
        });
        if let Some(m) = re.find(&name) {
            exam.semester = m.as_str().to_string();
        }
    }

    if exam.degree.is_empty() {
        if ["B.Tech", "B Tech", "BTech"].iter().any(|d| name.contains(d)) {
            exam.degree = "BTech KTU".to_string();
        } else if ["M.Tech", "M Tech", "MTech"].iter().any(|d| name.contains(d)) {
            exam.degree = "MTech KTU".to_string();
        }
    }

    if exam.month.is_empty() || exam.year.is_empty() {
        let re = MONTH_YEAR.get_or_init(|| {
            Regex::new(
                r"(January|February|March|April|May|June|July|August|September|October|November|December)\s+(\d{4})",
            )
            .expect("valid regex")
        });
        if let Some(caps) = re.captures(&name) {
            if exam.month.is_empty() {
                exam.month = caps[1].to_string();
            }
            if exam.year.is_empty() {
                exam.year = caps[2].to_string();
            }
        }
    }

    if exam.academic_year.is_empty() {
        let admission = ADMISSION
            .get_or_init(|| Regex::new(r"\((\d{4})\s+Admission\)").expect("valid regex"));
        let range = YEAR_RANGE.get_or_init(|| Regex::new(r"(\d{4})-(\d{4})").expect("valid regex"));
        if let Some(start) = admission
            .captures(&name)
            .and_then(|c| c[1].parse::<u32>().ok())
        {
            exam.academic_year = format!("{}-{}", start, start + 1);
        } else if let Some(caps) = range.captures(&name) {
            exam.academic_year = format!("{}-{}", &caps[1], &caps[2]);
        }
    }
}

/// Course rows and the SGPA/CGPA/earned-credit lines below the header row.
fn read_grade_table(table: ElementRef, exam: &mut ExamResult) {
    let row_sel = selector("tr");
    let header_sel = selector("th, td");
    let td = selector("td");

    let rows: Vec<ElementRef> = table.select(&row_sel).collect();
    let header_of = |row: &ElementRef| -> Vec<String> {
        row.select(&header_sel)
            .map(|c| cell_text(c).to_lowercase())
            .collect()
    };
    let Some(header_idx) = rows.iter().position(|row| {
        let text = header_of(row).join(" ");
        GRADE_TABLE_HEADERS.iter().any(|k| text.contains(k))
    }) else {
        return;
    };
    let headers = header_of(&rows[header_idx]);

    for row in &rows[header_idx + 1..] {
        let cells: Vec<String> = row.select(&td).map(cell_text).collect();
        if cells.len() < 2 {
            continue;
        }
        let row_text = cells.join(" ");
        if row_text.contains("SGPA") {
            exam.sgpa = last_number(&cells).or(exam.sgpa);
            continue;
        }
        if row_text.contains("CGPA") {
            exam.cgpa = last_number(&cells).or(exam.cgpa);
            continue;
        }
        if row_text.contains("Earned Credit") {
            exam.earned_credit = cells
                .iter()
                .rev()
                .find_map(|c| c.trim().parse::<u32>().ok())
                .or(exam.earned_credit);
            continue;
        }

        let subject = subject_row(&headers, &cells);
        if subject.code.is_some() || subject.name.is_some() {
            exam.subjects.push(subject);
        }
    }
}

fn subject_row(headers: &[String], cells: &[String]) -> ExamSubject {
    let mut subject = ExamSubject::default();
    for (header, cell) in headers.iter().zip(cells) {
        if cell.is_empty() {
            continue;
        }
        let value = Some(cell.clone());
        if header.contains("slot") || header == "no" {
            subject.slot = value;
        } else if header.contains("code") {
            subject.code = value;
        } else if header.contains("name") {
            subject.name = value;
        } else if header.contains("grade") {
            subject.grade = value;
        } else if header.contains("credit") {
            subject.credit = cell.trim().parse().ok();
        } else if header.contains("pass") || header.contains("status") {
            subject.status = value;
        }
    }
    subject
}

/// Last cell that is a plain decimal number; a comma counts as the decimal point.
fn last_number(cells: &[String]) -> Option<f64> {
    cells.iter().rev().find_map(|c| {
        let c = c.trim();
        let numeric = !c.is_empty() && c.chars().all(|ch| ch.is_ascii_digit() || ch == '.' || ch == ',');
        numeric.then(|| c.replace(',', ".").parse().ok()).flatten()
    })
}
