//! Structured extraction from academic portal pages.
//!
//! Every extractor takes a decoded [`RawDocument`] and returns records plus
//! a diagnostic; layout drift shows up as an empty result, never a panic.

use scraper::{Html, Selector};

use campus_model::RawDocument;

pub mod attendance;
pub mod exam;
pub mod lexicon;
pub mod normalize;
pub mod results;
pub mod timetable;

pub use attendance::{
    extract_attendance_grid, extract_attendance_grid_with, extract_subject_attendance,
    extract_subject_attendance_with,
};
pub use exam::{exam_result_links, extract_exam_result};
pub use lexicon::Lexicon;
pub use results::{extract_profile, extract_results, extract_results_with};
pub use timetable::{extract_timetable, extract_timetable_with};

/// True when the document is the portal's login page, i.e. the session lapsed.
pub fn is_login_page(doc: &RawDocument) -> bool {
    is_login_page_with(&doc.text, &Lexicon::default())
}

pub fn is_login_page_with(text: &str, lexicon: &Lexicon) -> bool {
    let html = Html::parse_document(text);
    let title_sel = Selector::parse("title").expect("valid selector");
    html.select(&title_sel)
        .next()
        .map(|t| t.text().collect::<String>().to_lowercase())
        .is_some_and(|title| title.contains(lexicon.login_marker.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_page_detection() {
        let login = RawDocument::new("<html><head><title>Portal | Login</title></head><body></body></html>");
        assert!(is_login_page(&login));

        let home = RawDocument::new("<html><head><title>Dashboard</title></head><body>login</body></html>");
        assert!(!is_login_page(&home));
    }
}
