// Keyword and colour tables driving the heuristic classifiers.
//
// The extractors never hard-code these lists; tests and callers can swap in
// their own `Lexicon` to match a different portal skin.

/// Vocabulary the extractors match against, all compared lower-cased.
#[derive(Debug, Clone)]
pub struct Lexicon {
    /// Style/class/bgcolor fragments meaning "present" (green family).
    pub present_hints: Vec<String>,
    /// Style/class/bgcolor fragments meaning "absent" (red family).
    pub absent_hints: Vec<String>,
    /// Cell text standing for "nothing here".
    pub placeholder: String,
    /// First-column labels of grid rows that hold totals, not dates.
    pub summary_labels: Vec<String>,
    /// CSS selector of the subject summary table when the portal tags it.
    pub subject_table_selector: String,
    /// Words identifying a subject summary table by its text.
    pub subject_table_keywords: Vec<String>,
    /// Leading identity columns (id, roll no, name) skipped in ratio rows.
    pub ratio_first_column: usize,
    /// Header tokens naming the time/period column of a day-columns timetable.
    pub slot_header_tokens: Vec<String>,
    /// Cells skipped in day-columns timetables.
    pub column_skip_cells: Vec<String>,
    /// Cells recorded as free periods in day-rows timetables.
    pub free_period_labels: Vec<String>,
    /// Title fragment identifying the portal's login page.
    pub login_marker: String,
    /// Words identifying a results table by its text.
    pub results_table_keywords: Vec<String>,
    /// Header words mapping a results column to the assessment type.
    pub results_type_headers: Vec<String>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            present_hints: owned(&[
                "green",
                "#00ff00",
                "#0f0",
                "rgb(0, 255, 0)",
                "rgb(0,255,0)",
                "#90ee90",
                "#00ff7f",
                "success",
                "present",
            ]),
            absent_hints: owned(&[
                "red",
                "#ff0000",
                "#f00",
                "rgb(255, 0, 0)",
                "rgb(255,0,0)",
                "#dc143c",
                "#ff6b6b",
                "danger",
                "absent",
            ]),
            placeholder: "-".to_string(),
            summary_labels: owned(&["total", "percentage"]),
            subject_table_selector: "table.items".to_string(),
            subject_table_keywords: owned(&["attendance", "present", "absent", "subject"]),
            ratio_first_column: 3,
            slot_header_tokens: owned(&["time", "period"]),
            column_skip_cells: owned(&["", "-", "break", "lunch"]),
            free_period_labels: owned(&["free period", "break", "lunch", "-"]),
            login_marker: "login".to_string(),
            results_table_keywords: owned(&["result", "grade", "marks", "subject", "score"]),
            results_type_headers: owned(&["exam", "assignment", "project", "class project", "title"]),
        }
    }
}

impl Lexicon {
    pub fn hints_present(&self, hints: &str) -> bool {
        contains_any(hints, &self.present_hints)
    }

    pub fn hints_absent(&self, hints: &str) -> bool {
        contains_any(hints, &self.absent_hints)
    }

    pub fn is_placeholder(&self, text: &str) -> bool {
        text.trim() == self.placeholder
    }

    pub fn is_summary_label(&self, text: &str) -> bool {
        equals_any(text, &self.summary_labels)
    }

    /// A header cell naming the time/period column ("Time", "Period", "Time Slot").
    pub fn is_slot_header(&self, cell: &str) -> bool {
        let lower = cell.trim().to_lowercase();
        self.slot_header_tokens.iter().any(|t| lower.starts_with(t.as_str()))
    }

    pub fn skips_column_cell(&self, cell: &str) -> bool {
        equals_any(cell, &self.column_skip_cells)
    }

    pub fn is_free_period(&self, cell: &str) -> bool {
        equals_any(cell, &self.free_period_labels)
    }

    pub fn mentions_subject_table(&self, text: &str) -> bool {
        contains_any(text, &self.subject_table_keywords)
    }

    pub fn mentions_results_table(&self, text: &str) -> bool {
        contains_any(text, &self.results_table_keywords)
    }
}

/// `haystack` (lower-cased here) contains any of the lower-case `needles`.
fn contains_any(haystack: &str, needles: &[String]) -> bool {
    let lower = haystack.to_lowercase();
    needles.iter().any(|n| lower.contains(n.as_str()))
}

fn equals_any(text: &str, options: &[String]) -> bool {
    let lower = text.trim().to_lowercase();
    options.iter().any(|o| *o == lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colour_hints() {
        let lex = Lexicon::default();
        assert!(lex.hints_present("background-color: #90EE90".to_lowercase().as_str()));
        assert!(lex.hints_absent("label-danger"));
        assert!(!lex.hints_present("label-danger"));
    }

    #[test]
    fn test_slot_header() {
        let lex = Lexicon::default();
        assert!(lex.is_slot_header("Time"));
        assert!(lex.is_slot_header(" Period 1 "));
        assert!(!lex.is_slot_header("free period"));
        assert!(!lex.is_slot_header("Monday"));
    }

    #[test]
    fn test_free_and_skip_cells() {
        let lex = Lexicon::default();
        assert!(lex.is_free_period("Free Period"));
        assert!(lex.is_free_period("-"));
        assert!(!lex.is_free_period("CS101"));
        assert!(lex.skips_column_cell(" LUNCH "));
        assert!(lex.skips_column_cell(""));
        assert!(!lex.skips_column_cell("free period"));
    }
}
