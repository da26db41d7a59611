use thiserror::Error;

use campus_model::{AuthFailure, ExamResult, RawDocument, SessionToken};
use campus_parse::exam::{exam_result_links, extract_exam_result};
use campus_validate::response::page_title;

use crate::config::PortalConfig;
use crate::orchestrator::Orchestrator;
use crate::session::evaluate_login_with;
use crate::types::{AcquireError, FetchRequest};

pub const LOGIN_PATH: &str = "/user/login";
pub const ATTENDANCE_PATH: &str = "/ktuacademics/student/attendance";
pub const SUBJECT_ATTENDANCE_PATH: &str = "/ktuacademics/student/viewattendancesubject";
pub const TIMETABLE_PATH: &str = "/student/timetable?format=csv&yt0=";
pub const RESULTS_PATH: &str = "/ktuacademics/student/results";
pub const PROFILE_PATH: &str = "/student/profile";
pub const EXAM_RESULTS_PATH: &str = "/universityexam/student/examresult";

#[derive(Debug, Error)]
pub enum PortalError {
    #[error(transparent)]
    Acquire(#[from] AcquireError),

    #[error(transparent)]
    Auth(#[from] AuthFailure),

    #[error("session expired; log in again")]
    SessionExpired,
}

/// The portal's pages, fetched through the acquisition chain.
pub struct Portal {
    config: PortalConfig,
    orchestrator: Orchestrator,
}

impl Portal {
    pub fn new(config: PortalConfig, orchestrator: Orchestrator) -> Self {
        Self { config, orchestrator }
    }

    pub fn from_config(config: PortalConfig) -> Self {
        let orchestrator = Orchestrator::from_config(&config);
        Self::new(config, orchestrator)
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<SessionToken, PortalError> {
        let request = FetchRequest::post(
            self.config.endpoint(LOGIN_PATH),
            [
                ("LoginForm[username]", username),
                ("LoginForm[password]", password),
                ("yt0", ""),
            ],
        );
        let result = self.orchestrator.acquire(&request).await?;
        let token = evaluate_login_with(&result, &self.config.cookie_key, &self.config.login_marker)?;
        tracing::info!(strategy = %result.strategy, "Logged in");
        Ok(token)
    }

    /// Day-by-day attendance grid for one month.
    pub async fn attendance_page(
        &self,
        token: &SessionToken,
        month: u32,
        year: i32,
        semester: u32,
    ) -> Result<RawDocument, PortalError> {
        let request = FetchRequest::post(
            self.config.endpoint(ATTENDANCE_PATH),
            [
                ("month", month.to_string()),
                ("year", year.to_string()),
                ("semester", semester.to_string()),
            ],
        );
        self.fetch_authenticated(request, token).await
    }

    pub async fn subject_attendance_page(
        &self,
        token: &SessionToken,
        semester: u32,
    ) -> Result<RawDocument, PortalError> {
        let url = self.config.endpoint(&format!("{SUBJECT_ATTENDANCE_PATH}/{semester}"));
        self.fetch_authenticated(FetchRequest::get(url), token).await
    }

    pub async fn timetable_export(&self, token: &SessionToken) -> Result<RawDocument, PortalError> {
        self.fetch_authenticated(FetchRequest::get(self.config.endpoint(TIMETABLE_PATH)), token)
            .await
    }

    pub async fn results_page(&self, token: &SessionToken) -> Result<RawDocument, PortalError> {
        self.fetch_authenticated(FetchRequest::get(self.config.endpoint(RESULTS_PATH)), token)
            .await
    }

    pub async fn profile_page(&self, token: &SessionToken) -> Result<RawDocument, PortalError> {
        self.fetch_authenticated(FetchRequest::get(self.config.endpoint(PROFILE_PATH)), token)
            .await
    }

    /// Every published end-semester grade card reachable from the results listing.
    ///
    /// A card that cannot be fetched is logged and skipped; an expired session aborts.
    pub async fn exam_results(&self, token: &SessionToken) -> Result<Vec<ExamResult>, PortalError> {
        let listing_url = self.config.endpoint(EXAM_RESULTS_PATH);
        let listing = self
            .fetch_authenticated(FetchRequest::get(listing_url.clone()), token)
            .await?;

        let mut results = Vec::new();
        for href in exam_result_links(&listing) {
            let url = self.resolve_link(&href);
            if url == listing_url {
                continue;
            }
            match self.fetch_authenticated(FetchRequest::get(url.clone()), token).await {
                Ok(doc) => results.extend(extract_exam_result(&doc)),
                Err(PortalError::Acquire(e)) => {
                    tracing::warn!(url = %url, "Skipping grade card: {e}");
                }
                Err(e) => return Err(e),
            }
        }
        tracing::info!(exams = results.len(), "Collected end-semester results");
        Ok(results)
    }

    fn resolve_link(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            self.config.endpoint(href)
        }
    }

    async fn fetch_authenticated(
        &self,
        request: FetchRequest,
        token: &SessionToken,
    ) -> Result<RawDocument, PortalError> {
        let request = request.with_cookie(&self.config.cookie_key, token.as_str());
        let result = self.orchestrator.acquire(&request).await?;
        if self.is_login_page(&result.body) {
            tracing::warn!(url = %request.url, "Portal answered with its login page");
            return Err(PortalError::SessionExpired);
        }
        Ok(result.document())
    }

    fn is_login_page(&self, body: &str) -> bool {
        let marker = self.config.login_marker.to_lowercase();
        page_title(body).is_some_and(|t| t.to_lowercase().contains(&marker))
    }
}
