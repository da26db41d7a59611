// Per-attempt client identity: user agent, accept-language and pauses.
//
// This is cosmetic variation only; nothing here is relied on to defeat a
// particular defense.

use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.9",
    "en-US,en;q=0.8,es;q=0.7",
    "en-US,en;q=0.9,fr;q=0.8",
];

/// Headers presented for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_agent: String,
    pub accept_language: String,
}

/// A closed range of pause lengths, sampled uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jitter {
    pub min: Duration,
    pub max: Duration,
}

impl Jitter {
    pub const NONE: Jitter = Jitter {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    pub fn secs(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_secs(min),
            max: Duration::from_secs(max),
        }
    }

    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let ms = rand::thread_rng().gen_range(self.min.as_millis()..=self.max.as_millis());
        Duration::from_millis(ms as u64)
    }

    async fn pause(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Jitter pause");
            tokio::time::sleep(delay).await;
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdentityRotation {
    user_agents: Vec<String>,
    accept_languages: Vec<String>,
    /// Before attempts that opt into jitter.
    pre_attempt: Jitter,
    /// After a browser challenge wait.
    post_challenge: Jitter,
}

impl Default for IdentityRotation {
    fn default() -> Self {
        Self {
            user_agents: USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            accept_languages: ACCEPT_LANGUAGES.iter().map(|s| s.to_string()).collect(),
            pre_attempt: Jitter::secs(1, 3),
            post_challenge: Jitter::secs(2, 5),
        }
    }
}

impl IdentityRotation {
    /// Default pools with every pause disabled.
    pub fn without_jitter() -> Self {
        Self::default().with_jitter(Jitter::NONE, Jitter::NONE)
    }

    pub fn with_jitter(mut self, pre_attempt: Jitter, post_challenge: Jitter) -> Self {
        self.pre_attempt = pre_attempt;
        self.post_challenge = post_challenge;
        self
    }

    pub fn pick(&self) -> Identity {
        let mut rng = rand::thread_rng();
        Identity {
            user_agent: self
                .user_agents
                .choose(&mut rng)
                .cloned()
                .unwrap_or_else(|| USER_AGENTS[0].to_string()),
            accept_language: self
                .accept_languages
                .choose(&mut rng)
                .cloned()
                .unwrap_or_else(|| ACCEPT_LANGUAGES[0].to_string()),
        }
    }

    pub fn accept_language(&self) -> String {
        self.pick().accept_language
    }

    pub async fn pre_attempt_pause(&self) {
        self.pre_attempt.pause().await;
    }

    pub async fn post_challenge_pause(&self) {
        self.post_challenge.pause().await;
    }
}
