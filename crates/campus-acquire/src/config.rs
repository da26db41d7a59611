use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://sahrdaya.etlab.in";
pub const DEFAULT_COOKIE_KEY: &str = "SAHRDAYASESSIONID";

/// Settings for talking to one portal instance.
///
/// The CLI fills this from arguments and environment variables; tests build
/// it directly.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Scheme and host of the portal, without a trailing slash.
    pub base_url: String,
    /// Name of the session cookie issued on login.
    pub cookie_key: String,
    /// Title fragment identifying the login page.
    pub login_marker: String,
    /// Bound on each HTTP attempt.
    pub request_timeout: Duration,
    /// Bound on a browser automation attempt, challenge wait included.
    pub automation_timeout: Duration,
    /// Allow the browser strategies when a Chromium binary is found.
    pub automation_enabled: bool,
    pub headless: bool,
    /// Explicit Chromium binary; searched on PATH when unset.
    pub chromium_path: Option<PathBuf>,
    /// Random pauses between attempts. Off in tests.
    pub jitter: bool,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            cookie_key: DEFAULT_COOKIE_KEY.to_string(),
            login_marker: "login".to_string(),
            request_timeout: Duration::from_secs(30),
            automation_timeout: Duration::from_secs(60),
            automation_enabled: true,
            headless: true,
            chromium_path: None,
            jitter: true,
        }
    }
}

impl PortalConfig {
    /// Absolute URL for a portal path such as `/user/login`.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_slashes() {
        let config = PortalConfig {
            base_url: "http://portal.test/".into(),
            ..Default::default()
        };
        assert_eq!(config.endpoint("/user/login"), "http://portal.test/user/login");
        assert_eq!(config.endpoint("student/profile"), "http://portal.test/student/profile");
    }
}
