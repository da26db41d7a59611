// Classification of fetched pages: real content vs. an anti-bot interstitial.
//
// Everything here is pure string inspection so it can be exercised against
// literal fixtures.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use thiserror::Error;

/// Body shorter than this (after trimming) is treated as a block page.
pub const MIN_BODY_CHARS: usize = 100;

/// Literal phrases and title rules identifying challenge pages.
#[derive(Debug, Clone)]
pub struct ChallengeMarkers {
    /// Substrings that mark a challenge page anywhere in the body.
    pub body: Vec<String>,
    /// Protection vendor name looked for in the `<title>`.
    pub vendor: String,
    /// Phrases that, together with the vendor, mark a challenge title.
    pub title_phases: Vec<String>,
    pub min_body_chars: usize,
}

impl Default for ChallengeMarkers {
    fn default() -> Self {
        Self {
            body: [
                "Checking your browser",
                "DDoS protection by Cloudflare",
                "cf-browser-verification",
                "cf-challenge-form",
                "__cf_chl_jschl_tk__",
                "cf-challenge-running",
                "challenge-platform",
                "Enable JavaScript and cookies to continue",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            vendor: "cloudflare".to_string(),
            title_phases: ["checking", "please wait", "attention", "just a moment"]
                .into_iter()
                .map(String::from)
                .collect(),
            min_body_chars: MIN_BODY_CHARS,
        }
    }
}

/// Outcome of classifying one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum Verdict {
    Valid,
    Invalid(InvalidReason),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    #[error("status {0} is not a success code")]
    Status(u16),

    #[error("body has only {0} characters")]
    TooShort(usize),

    #[error("body contains challenge marker '{0}'")]
    ChallengeMarker(String),

    #[error("title '{0}' looks like a challenge page")]
    ChallengeTitle(String),
}

impl ChallengeMarkers {
    /// Classify a response. Markers are checked before the status code so a
    /// challenge page is reported as such whatever status it came with.
    pub fn validate(&self, status: u16, body: &str) -> Verdict {
        if let Some(marker) = self.find_marker(body) {
            return Verdict::Invalid(InvalidReason::ChallengeMarker(marker.to_string()));
        }
        if let Some(title) = self.challenge_title(body) {
            return Verdict::Invalid(InvalidReason::ChallengeTitle(title));
        }
        if !(200..300).contains(&status) {
            return Verdict::Invalid(InvalidReason::Status(status));
        }
        let chars = body.trim().chars().count();
        if chars < self.min_body_chars {
            return Verdict::Invalid(InvalidReason::TooShort(chars));
        }
        Verdict::Valid
    }

    /// First body marker present in `body`, compared case-insensitively.
    pub fn find_marker(&self, body: &str) -> Option<&str> {
        let lower = body.to_lowercase();
        self.body
            .iter()
            .find(|m| lower.contains(&m.to_lowercase()))
            .map(String::as_str)
    }

    /// The page title, if it names the vendor together with a challenge phase.
    pub fn challenge_title(&self, body: &str) -> Option<String> {
        let title = page_title(body)?;
        let lower = title.to_lowercase();
        let vendor = lower.contains(&self.vendor.to_lowercase());
        let phase = self
            .title_phases
            .iter()
            .any(|p| lower.contains(&p.to_lowercase()));
        (vendor && phase).then_some(title)
    }

    /// True when `body` still shows any challenge sign (used while waiting in a browser).
    pub fn is_challenge(&self, body: &str) -> bool {
        self.find_marker(body).is_some() || self.challenge_title(body).is_some()
    }
}

/// Classify with the default marker set.
pub fn validate_response(status: u16, body: &str) -> Verdict {
    ChallengeMarkers::default().validate(status, body)
}

/// Text of the first `<title>` element, trimmed.
pub fn page_title(body: &str) -> Option<String> {
    static TITLE: OnceLock<Regex> = OnceLock::new();
    let re = TITLE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));
    re.captures(body).map(|c| c[1].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn real_page() -> String {
        format!(
            "<html><head><title>Student Dashboard</title></head><body>{}</body></html>",
            "<p>Attendance for the current semester.</p>".repeat(5)
        )
    }

    #[test]
    fn test_real_page_is_valid() {
        assert_eq!(validate_response(200, &real_page()), Verdict::Valid);
        assert_eq!(validate_response(204, &real_page()), Verdict::Valid);
    }

    #[test]
    fn test_marker_invalid_regardless_of_status() {
        let body = format!("{}<div id=\"challenge-platform\"></div>", real_page());
        for status in [200, 403, 503] {
            assert_eq!(
                validate_response(status, &body),
                Verdict::Invalid(InvalidReason::ChallengeMarker("challenge-platform".into()))
            );
        }
    }

    #[test]
    fn test_marker_match_is_case_insensitive() {
        let body = format!("{} checking YOUR browser before accessing", real_page());
        assert!(!validate_response(200, &body).is_valid());
    }

    #[test]
    fn test_non_success_status() {
        assert_eq!(
            validate_response(404, &real_page()),
            Verdict::Invalid(InvalidReason::Status(404))
        );
    }

    #[test]
    fn test_short_body() {
        assert_eq!(
            validate_response(200, "   <html>ok</html>   "),
            Verdict::Invalid(InvalidReason::TooShort(15))
        );
    }

    #[test]
    fn test_challenge_title() {
        let body = real_page().replace("Student Dashboard", "Attention Required! | Cloudflare");
        assert_eq!(
            validate_response(200, &body),
            Verdict::Invalid(InvalidReason::ChallengeTitle(
                "Attention Required! | Cloudflare".into()
            ))
        );
    }

    #[test]
    fn test_vendor_title_without_phase_is_fine() {
        let body = real_page().replace("Student Dashboard", "Cloudflare status report");
        assert!(validate_response(200, &body).is_valid());
    }

    #[test]
    fn test_substituted_markers() {
        let markers = ChallengeMarkers {
            body: vec!["captcha-wall".into()],
            vendor: "acme".into(),
            title_phases: vec!["hold on".into()],
            min_body_chars: 10,
        };
        assert!(markers.validate(200, "<p>plain content here</p>").is_valid());
        assert!(!markers.validate(200, "<div class=captcha-wall>solve me</div>").is_valid());
        assert!(markers.validate(200, &real_page()).is_valid());
    }

    #[test]
    fn test_page_title() {
        assert_eq!(page_title("<TITLE>\n Login \n</TITLE>").as_deref(), Some("Login"));
        assert_eq!(page_title("<p>no title</p>"), None);
    }

    #[test]
    fn test_verdict_serializes() {
        let v = Verdict::Invalid(InvalidReason::Status(503));
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["verdict"], "invalid");
    }
}
