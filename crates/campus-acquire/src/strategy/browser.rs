//! Chromium-backed strategies using chromiumoxide.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::http::{profile_fetch, HttpSettings};
use super::AcquisitionStrategy;
use crate::identity::IdentityRotation;
use crate::types::{AttemptError, CookieSet, FetchRequest, Fetched, Method, StrategyKind};
use campus_validate::ChallengeMarkers;

const CHALLENGE_WAIT: Duration = Duration::from_secs(30);
const CHALLENGE_POLL: Duration = Duration::from_millis(500);
const RENDER_SETTLE: Duration = Duration::from_millis(1500);

/// Find a Chromium binary: the configured path, then PATH, then the macOS app bundle.
pub fn find_chromium(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        tracing::warn!(path = %path.display(), "Configured Chromium path does not exist");
    }

    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub chromium: PathBuf,
    pub headless: bool,
}

/// A browser process scoped to one attempt.
///
/// Call [`release`](Self::release) on the way out. If the owning future is
/// cancelled instead, dropping the handle stops the event task and the
/// `Browser` drop kills the child process.
pub struct AutomationHandle {
    browser: Option<Browser>,
    handler: JoinHandle<()>,
}

impl AutomationHandle {
    pub async fn launch(options: &LaunchOptions, user_agent: &str) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .chrome_executable(&options.chromium)
            .window_size(1920, 1080)
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={user_agent}"));
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        tracing::debug!(chromium = %options.chromium.display(), "Launched browser");
        Ok(Self {
            browser: Some(browser),
            handler,
        })
    }

    pub async fn new_page(&self) -> Result<Page> {
        let browser = self.browser.as_ref().context("browser already released")?;
        browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")
    }

    /// Close the browser and wait for the process to exit.
    pub async fn release(mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                tracing::debug!("Browser close failed: {e}");
            }
            if let Err(e) = browser.wait().await {
                tracing::debug!("Waiting for browser exit failed: {e}");
            }
        }
        self.handler.abort();
    }
}

impl Drop for AutomationHandle {
    fn drop(&mut self) {
        self.handler.abort();
        if self.browser.is_some() {
            tracing::warn!("Automation handle dropped before release; killing browser");
        }
    }
}

fn browser_error(e: anyhow::Error) -> AttemptError {
    AttemptError::Browser(format!("{e:#}"))
}

/// Fetch over HTTP, then run the document's scripts in a headless page.
pub struct RenderStrategy {
    settings: HttpSettings,
    identity: Arc<IdentityRotation>,
    launch: LaunchOptions,
}

impl RenderStrategy {
    pub fn new(settings: HttpSettings, identity: Arc<IdentityRotation>, launch: LaunchOptions) -> Self {
        Self {
            settings,
            identity,
            launch,
        }
    }
}

#[async_trait]
impl AcquisitionStrategy for RenderStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ScriptedRendering
    }

    fn attempt_timeout(&self) -> Duration {
        self.settings.timeout
    }

    async fn fetch(&self, request: &FetchRequest, cookies: &CookieSet) -> Result<Fetched, AttemptError> {
        let fetched = profile_fetch(&self.settings, &self.identity, request, cookies).await?;
        let user_agent = self.identity.pick().user_agent;

        let handle = AutomationHandle::launch(&self.launch, &user_agent)
            .await
            .map_err(browser_error)?;
        let rendered = render(&handle, &fetched.body).await;
        handle.release().await;

        let body = rendered.map_err(browser_error)?;
        Ok(Fetched { body, ..fetched })
    }
}

async fn render(handle: &AutomationHandle, html: &str) -> Result<String> {
    let page = handle.new_page().await?;
    page.set_content(html).await.context("failed to load document")?;
    tokio::time::sleep(RENDER_SETTLE).await;
    page.content().await.context("failed to read rendered DOM")
}

/// Full stealth browser session: seed cookies, navigate, outwait the
/// challenge, submit forms through the DOM.
pub struct AutomationStrategy {
    launch: LaunchOptions,
    identity: Arc<IdentityRotation>,
    timeout: Duration,
    markers: ChallengeMarkers,
}

impl AutomationStrategy {
    pub fn new(launch: LaunchOptions, identity: Arc<IdentityRotation>, timeout: Duration) -> Self {
        Self {
            launch,
            identity,
            timeout,
            markers: ChallengeMarkers::default(),
        }
    }

    async fn drive(
        &self,
        handle: &AutomationHandle,
        request: &FetchRequest,
        cookies: &CookieSet,
        user_agent: &str,
    ) -> Result<Fetched> {
        let page = handle.new_page().await?;
        page.enable_stealth_mode_with_agent(user_agent)
            .await
            .context("failed to enable stealth mode")?;

        if !cookies.is_empty() {
            page.set_cookies(cookie_params(&request.url, cookies)?)
                .await
                .context("failed to seed cookies")?;
        }

        page.goto(request.url.as_str()).await.context("navigation failed")?;
        self.wait_for_challenge(&page).await;
        self.identity.post_challenge_pause().await;

        if request.method == Method::Post {
            page.evaluate(post_form_script(&request.url, &request.form))
                .await
                .context("form submission failed")?;
            page.wait_for_navigation()
                .await
                .context("navigation after form submission failed")?;
            self.wait_for_challenge(&page).await;
        }

        let body = page.content().await.context("failed to read page content")?;
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| request.url.clone());
        let cookies: CookieSet = page
            .get_cookies()
            .await
            .context("failed to read browser cookies")?
            .into_iter()
            .map(|c| (c.name, c.value))
            .collect();

        Ok(Fetched {
            // The DevTools page API does not surface the document status.
            status: 200,
            body,
            final_url,
            headers: Vec::new(),
            cookies,
            set_cookie_lines: Vec::new(),
            encoding: Some("utf-8".to_string()),
        })
    }

    /// Poll the page until no challenge sign remains or the wait budget runs out.
    async fn wait_for_challenge(&self, page: &Page) {
        let started = Instant::now();
        loop {
            match page.content().await {
                Ok(html) if !self.markers.is_challenge(&html) => return,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!("Could not read page while waiting for challenge: {e}");
                    return;
                }
            }
            if started.elapsed() >= CHALLENGE_WAIT {
                tracing::warn!(waited_secs = CHALLENGE_WAIT.as_secs(), "Challenge still present");
                return;
            }
            tokio::time::sleep(CHALLENGE_POLL).await;
        }
    }
}

#[async_trait]
impl AcquisitionStrategy for AutomationStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BrowserAutomation
    }

    fn attempt_timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(&self, request: &FetchRequest, cookies: &CookieSet) -> Result<Fetched, AttemptError> {
        let user_agent = self.identity.pick().user_agent;
        let handle = AutomationHandle::launch(&self.launch, &user_agent)
            .await
            .map_err(browser_error)?;
        let result = self.drive(&handle, request, cookies, &user_agent).await;
        handle.release().await;
        result.map_err(browser_error)
    }
}

fn cookie_params(url: &str, cookies: &CookieSet) -> Result<Vec<CookieParam>> {
    cookies
        .iter()
        .map(|(name, value)| {
            CookieParam::builder()
                .name(name)
                .value(value)
                .url(url)
                .path("/")
                .build()
                .map_err(|e| anyhow::anyhow!("invalid cookie {name}: {e}"))
        })
        .collect()
}

/// Script that posts `form` to `url` through a generated DOM form.
fn post_form_script(url: &str, form: &[(String, String)]) -> String {
    let fields = serde_json::Value::Array(
        form.iter()
            .map(|(name, value)| serde_json::json!([name, value]))
            .collect(),
    );
    let action = serde_json::Value::String(url.to_string());
    format!(
        "(() => {{ \
           const f = document.createElement('form'); \
           f.method = 'POST'; \
           f.action = {action}; \
           for (const [name, value] of {fields}) {{ \
             const input = document.createElement('input'); \
             input.type = 'hidden'; input.name = name; input.value = value; \
             f.appendChild(input); \
           }} \
           document.body.appendChild(f); \
           f.submit(); \
           return true; \
         }})()"
    )
}
