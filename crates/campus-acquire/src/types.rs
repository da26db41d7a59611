use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use campus_model::RawDocument;
use campus_validate::InvalidReason;

/// Identifier of one link in the acquisition chain, in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    BrowserProfile,
    Session,
    AlternateProtocol,
    ScriptedRendering,
    BrowserAutomation,
}

impl StrategyKind {
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::BrowserProfile => "browser-profile",
            StrategyKind::Session => "session",
            StrategyKind::AlternateProtocol => "alternate-protocol",
            StrategyKind::ScriptedRendering => "scripted-rendering",
            StrategyKind::BrowserAutomation => "browser-automation",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

/// Cookie name → value, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CookieSet(BTreeMap<String, String>);

impl CookieSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Add every cookie of `other`, replacing values of the same name.
    pub fn merge(&mut self, other: &CookieSet) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a `Cookie` request header value (`a=1; b=2`).
    pub fn parse_header(header: &str) -> Self {
        header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                let name = name.trim();
                (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
            })
            .collect()
    }
}

impl FromIterator<(String, String)> for CookieSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// What to fetch. Built once per logical request and shared by every attempt.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    /// Form fields sent urlencoded with POST.
    pub form: Vec<(String, String)>,
    /// Extra headers applied after the strategy's own identity headers.
    pub headers: Vec<(String, String)>,
    pub cookies: CookieSet,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            form: Vec::new(),
            headers: Vec::new(),
            cookies: CookieSet::new(),
        }
    }

    pub fn post<K, V>(url: impl Into<String>, form: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            method: Method::Post,
            form: form.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            ..Self::get(url)
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name, value);
        self
    }
}

/// A response produced by one strategy, before validation.
#[derive(Debug, Clone, Default)]
pub struct Fetched {
    pub status: u16,
    pub body: String,
    pub final_url: String,
    pub headers: Vec<(String, String)>,
    /// Cookies the strategy observed, redirects included.
    pub cookies: CookieSet,
    /// Raw `Set-Cookie` lines of the final response.
    pub set_cookie_lines: Vec<String>,
    pub encoding: Option<String>,
}

/// Why a strategy produced no response.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("unsupported request: {0}")]
    Unsupported(String),
}

/// How one attempt ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Accepted,
    Rejected(InvalidReason),
    Failed(String),
}

/// Log entry for one strategy attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchAttempt {
    pub strategy: StrategyKind,
    pub status: Option<u16>,
    pub elapsed_ms: u64,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

impl fmt::Display for FetchAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            AttemptOutcome::Accepted => write!(f, "{}: accepted", self.strategy),
            AttemptOutcome::Rejected(reason) => write!(f, "{}: rejected ({reason})", self.strategy),
            AttemptOutcome::Failed(e) => write!(f, "{}: failed ({e})", self.strategy),
        }
    }
}

/// A validated response plus everything gathered on the way to it.
#[derive(Debug, Clone, Serialize)]
pub struct AcquisitionResult {
    pub body: String,
    pub status: u16,
    pub final_url: String,
    pub headers: Vec<(String, String)>,
    /// Cookies accumulated across every attempt.
    pub cookies: CookieSet,
    pub set_cookie_lines: Vec<String>,
    pub encoding: Option<String>,
    pub strategy: StrategyKind,
    pub attempts: Vec<FetchAttempt>,
}

impl AcquisitionResult {
    pub fn document(&self) -> RawDocument {
        RawDocument::with_encoding(self.body.clone(), self.encoding.clone())
    }
}

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("{}", exhausted_message(.attempts, .deadline_exceeded))]
    Exhausted {
        attempts: Vec<FetchAttempt>,
        deadline_exceeded: bool,
    },
}

fn exhausted_message(attempts: &[FetchAttempt], deadline_exceeded: &bool) -> String {
    let mut msg = if *deadline_exceeded {
        "deadline exceeded before a valid response".to_string()
    } else {
        "all acquisition strategies failed".to_string()
    };
    if !attempts.is_empty() {
        let log: Vec<String> = attempts.iter().map(ToString::to_string).collect();
        msg.push_str(": ");
        msg.push_str(&log.join("; "));
    }
    msg
}
