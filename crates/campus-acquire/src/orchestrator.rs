use std::sync::Arc;
use tokio::time::Instant;

use campus_validate::{ChallengeMarkers, Verdict};

use crate::config::PortalConfig;
use crate::dns::FallbackResolver;
use crate::identity::IdentityRotation;
use crate::strategy::{assemble_chain, AcquisitionStrategy, Capabilities};
use crate::types::{
    AcquireError, AcquisitionResult, AttemptError, AttemptOutcome, FetchAttempt, FetchRequest,
    StrategyKind,
};

/// Runs the strategy chain until one attempt passes validation.
pub struct Orchestrator {
    chain: Vec<Box<dyn AcquisitionStrategy>>,
    markers: ChallengeMarkers,
}

impl Orchestrator {
    pub fn new(chain: Vec<Box<dyn AcquisitionStrategy>>) -> Self {
        Self {
            chain,
            markers: ChallengeMarkers::default(),
        }
    }

    pub fn with_markers(mut self, markers: ChallengeMarkers) -> Self {
        self.markers = markers;
        self
    }

    /// Detect capabilities and build the full chain for `config`.
    pub fn from_config(config: &PortalConfig) -> Self {
        let resolver = Arc::new(FallbackResolver::new());
        let identity = Arc::new(if config.jitter {
            IdentityRotation::default()
        } else {
            IdentityRotation::without_jitter()
        });
        let capabilities = Capabilities::detect(config);
        Self::new(assemble_chain(config, &capabilities, resolver, identity))
    }

    pub fn strategies(&self) -> Vec<StrategyKind> {
        self.chain.iter().map(|s| s.kind()).collect()
    }

    pub async fn acquire(&self, request: &FetchRequest) -> Result<AcquisitionResult, AcquireError> {
        self.acquire_with_deadline(request, None).await
    }

    /// Like [`acquire`](Self::acquire), but stop starting attempts once
    /// `deadline` passes and cut the running attempt short at it.
    pub async fn acquire_with_deadline(
        &self,
        request: &FetchRequest,
        deadline: Option<Instant>,
    ) -> Result<AcquisitionResult, AcquireError> {
        tracing::info!(url = %request.url, method = ?request.method, "Acquiring page");

        let mut cookies = request.cookies.clone();
        let mut attempts = Vec::new();

        for strategy in &self.chain {
            let kind = strategy.kind();
            let mut timeout = strategy.attempt_timeout();
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    tracing::warn!(next = %kind, "Deadline reached, abandoning remaining strategies");
                    return Err(AcquireError::Exhausted {
                        attempts,
                        deadline_exceeded: true,
                    });
                }
                timeout = timeout.min(deadline - now);
            }

            tracing::debug!(strategy = %kind, timeout_ms = timeout.as_millis() as u64, "Starting attempt");
            let started = Instant::now();
            let outcome = tokio::time::timeout(timeout, strategy.fetch(request, &cookies)).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let fetched = match outcome {
                Ok(Ok(fetched)) => fetched,
                Ok(Err(e)) => {
                    tracing::warn!(strategy = %kind, "Attempt failed: {e}");
                    attempts.push(FetchAttempt {
                        strategy: kind,
                        status: None,
                        elapsed_ms,
                        outcome: AttemptOutcome::Failed(e.to_string()),
                    });
                    continue;
                }
                Err(_) => {
                    let e = AttemptError::Timeout(timeout);
                    tracing::warn!(strategy = %kind, "Attempt failed: {e}");
                    attempts.push(FetchAttempt {
                        strategy: kind,
                        status: None,
                        elapsed_ms,
                        outcome: AttemptOutcome::Failed(e.to_string()),
                    });
                    continue;
                }
            };

            // Challenge pages often set clearance cookies worth forwarding.
            cookies.merge(&fetched.cookies);

            match self.markers.validate(fetched.status, &fetched.body) {
                Verdict::Valid => {
                    attempts.push(FetchAttempt {
                        strategy: kind,
                        status: Some(fetched.status),
                        elapsed_ms,
                        outcome: AttemptOutcome::Accepted,
                    });
                    tracing::info!(
                        strategy = %kind,
                        status = fetched.status,
                        attempts = attempts.len(),
                        cookies = cookies.len(),
                        "Acquired page"
                    );
                    return Ok(AcquisitionResult {
                        body: fetched.body,
                        status: fetched.status,
                        final_url: fetched.final_url,
                        headers: fetched.headers,
                        cookies,
                        set_cookie_lines: fetched.set_cookie_lines,
                        encoding: fetched.encoding,
                        strategy: kind,
                        attempts,
                    });
                }
                Verdict::Invalid(reason) => {
                    tracing::warn!(strategy = %kind, status = fetched.status, "Response rejected: {reason}");
                    attempts.push(FetchAttempt {
                        strategy: kind,
                        status: Some(fetched.status),
                        elapsed_ms,
                        outcome: AttemptOutcome::Rejected(reason),
                    });
                }
            }
        }

        let deadline_exceeded = deadline.is_some_and(|d| Instant::now() >= d);
        tracing::warn!(attempts = attempts.len(), deadline_exceeded, "All strategies exhausted");
        Err(AcquireError::Exhausted {
            attempts,
            deadline_exceeded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CookieSet, Fetched};
    use async_trait::async_trait;
    use campus_validate::InvalidReason;
    use std::sync::Mutex;
    use std::time::Duration;

    enum Script {
        Page { status: u16, body: String, cookies: CookieSet },
        Fail,
        Hang,
    }

    struct Fake {
        kind: StrategyKind,
        script: Script,
        seen_cookies: Arc<Mutex<Vec<CookieSet>>>,
    }

    impl Fake {
        fn boxed(kind: StrategyKind, script: Script) -> Box<dyn AcquisitionStrategy> {
            Box::new(Self {
                kind,
                script,
                seen_cookies: Arc::default(),
            })
        }
    }

    #[async_trait]
    impl AcquisitionStrategy for Fake {
        fn kind(&self) -> StrategyKind {
            self.kind
        }

        fn attempt_timeout(&self) -> Duration {
            Duration::from_millis(100)
        }

        async fn fetch(&self, _request: &FetchRequest, cookies: &CookieSet) -> Result<Fetched, AttemptError> {
            self.seen_cookies.lock().unwrap().push(cookies.clone());
            match &self.script {
                Script::Page { status, body, cookies } => Ok(Fetched {
                    status: *status,
                    body: body.clone(),
                    final_url: "http://portal.test/".into(),
                    cookies: cookies.clone(),
                    ..Default::default()
                }),
                Script::Fail => Err(AttemptError::Unsupported("scripted failure".into())),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Err(AttemptError::Unsupported("unreachable".into()))
                }
            }
        }
    }

    fn real_page() -> String {
        format!("<html><head><title>Dashboard</title></head><body>{}</body></html>", "x".repeat(200))
    }

    fn challenge_page() -> String {
        format!("<html><body>Checking your browser before accessing. {}</body></html>", "x".repeat(200))
    }

    fn page(status: u16, body: String) -> Script {
        Script::Page {
            status,
            body,
            cookies: CookieSet::new(),
        }
    }

    #[tokio::test]
    async fn test_first_valid_attempt_wins() {
        let orchestrator = Orchestrator::new(vec![
            Fake::boxed(StrategyKind::BrowserProfile, page(200, real_page())),
            Fake::boxed(StrategyKind::Session, Script::Fail),
        ]);
        let result = orchestrator.acquire(&FetchRequest::get("http://portal.test/")).await.unwrap();
        assert_eq!(result.strategy, StrategyKind::BrowserProfile);
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(result.attempts[0].outcome, AttemptOutcome::Accepted);
    }

    #[tokio::test]
    async fn test_invalid_responses_fall_through() {
        let orchestrator = Orchestrator::new(vec![
            Fake::boxed(StrategyKind::BrowserProfile, page(200, challenge_page())),
            Fake::boxed(StrategyKind::Session, Script::Fail),
            Fake::boxed(StrategyKind::AlternateProtocol, page(403, real_page())),
            Fake::boxed(StrategyKind::ScriptedRendering, page(200, real_page())),
        ]);
        let result = orchestrator.acquire(&FetchRequest::get("http://portal.test/")).await.unwrap();
        assert_eq!(result.strategy, StrategyKind::ScriptedRendering);

        let outcomes: Vec<&AttemptOutcome> = result.attempts.iter().map(|a| &a.outcome).collect();
        assert!(matches!(outcomes[0], AttemptOutcome::Rejected(InvalidReason::ChallengeMarker(_))));
        assert!(matches!(outcomes[1], AttemptOutcome::Failed(_)));
        assert_eq!(outcomes[2], &AttemptOutcome::Rejected(InvalidReason::Status(403)));
        assert_eq!(outcomes[3], &AttemptOutcome::Accepted);
    }

    #[tokio::test]
    async fn test_exhaustion_lists_attempts_in_order() {
        let orchestrator = Orchestrator::new(vec![
            Fake::boxed(StrategyKind::BrowserProfile, page(503, challenge_page())),
            Fake::boxed(StrategyKind::Session, page(200, "<p>blocked</p>".into())),
        ]);
        let err = orchestrator
            .acquire(&FetchRequest::get("http://portal.test/"))
            .await
            .unwrap_err();
        let AcquireError::Exhausted {
            attempts,
            deadline_exceeded,
        } = err;
        assert!(!deadline_exceeded);
        let kinds: Vec<StrategyKind> = attempts.iter().map(|a| a.strategy).collect();
        assert_eq!(kinds, vec![StrategyKind::BrowserProfile, StrategyKind::Session]);
        assert_eq!(attempts[1].outcome, AttemptOutcome::Rejected(InvalidReason::TooShort(14)));
    }

    #[tokio::test]
    async fn test_cookies_forwarded_to_later_attempts() {
        let mut clearance = CookieSet::new();
        clearance.insert("cf_clearance", "token");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let second = Fake {
            kind: StrategyKind::Session,
            script: page(200, real_page()),
            seen_cookies: seen.clone(),
        };
        let orchestrator = Orchestrator::new(vec![
            Fake::boxed(
                StrategyKind::BrowserProfile,
                Script::Page {
                    status: 403,
                    body: challenge_page(),
                    cookies: clearance,
                },
            ),
            Box::new(second),
        ]);

        let request = FetchRequest::get("http://portal.test/").with_cookie("SID", "abc");
        let result = orchestrator.acquire(&request).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].get("cf_clearance"), Some("token"));
        assert_eq!(seen[0].get("SID"), Some("abc"));
        assert_eq!(result.cookies.get("cf_clearance"), Some("token"));
    }

    #[tokio::test]
    async fn test_hanging_attempt_times_out() {
        let orchestrator = Orchestrator::new(vec![
            Fake::boxed(StrategyKind::BrowserAutomation, Script::Hang),
            Fake::boxed(StrategyKind::Session, page(200, real_page())),
        ]);
        let result = orchestrator.acquire(&FetchRequest::get("http://portal.test/")).await.unwrap();
        assert_eq!(result.strategy, StrategyKind::Session);
        match &result.attempts[0].outcome {
            AttemptOutcome::Failed(msg) => assert!(msg.contains("timed out"), "{msg}"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_past_deadline_stops_before_first_attempt() {
        let orchestrator = Orchestrator::new(vec![Fake::boxed(
            StrategyKind::BrowserProfile,
            page(200, real_page()),
        )]);
        let deadline = Instant::now() - Duration::from_millis(1);
        let err = orchestrator
            .acquire_with_deadline(&FetchRequest::get("http://portal.test/"), Some(deadline))
            .await
            .unwrap_err();
        let AcquireError::Exhausted {
            attempts,
            deadline_exceeded,
        } = err;
        assert!(deadline_exceeded);
        assert!(attempts.is_empty());
    }

    #[tokio::test]
    async fn test_deadline_cuts_running_attempt() {
        let orchestrator = Orchestrator::new(vec![
            Fake::boxed(StrategyKind::BrowserAutomation, Script::Hang),
            Fake::boxed(StrategyKind::Session, page(200, real_page())),
        ]);
        let deadline = Instant::now() + Duration::from_millis(30);
        let err = orchestrator
            .acquire_with_deadline(&FetchRequest::get("http://portal.test/"), Some(deadline))
            .await
            .unwrap_err();
        let AcquireError::Exhausted {
            attempts,
            deadline_exceeded,
        } = err;
        assert!(deadline_exceeded);
        assert_eq!(attempts.len(), 1);
    }
}
