use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, SET_COOKIE};
use reqwest::{Client, ClientBuilder, Response, Url};
use std::sync::Arc;
use std::time::Duration;

use super::AcquisitionStrategy;
use crate::dns::FallbackResolver;
use crate::identity::{Identity, IdentityRotation};
use crate::types::{AttemptError, CookieSet, FetchRequest, Fetched, Method, StrategyKind};

const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const CHROME_CLIENT_HINTS: &str = r#""Chromium";v="124", "Google Chrome";v="124", "Not-A.Brand";v="99""#;
const DOCUMENT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";
const PLAIN_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Client settings shared by every HTTP strategy.
#[derive(Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub resolver: Arc<FallbackResolver>,
}

impl HttpSettings {
    /// A builder with the injected resolver and a per-attempt cookie jar.
    fn builder(&self, jar: Arc<Jar>) -> ClientBuilder {
        Client::builder()
            .dns_resolver(self.resolver.clone())
            .cookie_provider(jar)
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
    }
}

/// Chrome's header set in Chrome's order.
pub struct BrowserProfileStrategy {
    settings: HttpSettings,
    identity: Arc<IdentityRotation>,
}

impl BrowserProfileStrategy {
    pub fn new(settings: HttpSettings, identity: Arc<IdentityRotation>) -> Self {
        Self { settings, identity }
    }
}

#[async_trait]
impl AcquisitionStrategy for BrowserProfileStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BrowserProfile
    }

    fn attempt_timeout(&self) -> Duration {
        self.settings.timeout
    }

    async fn fetch(&self, request: &FetchRequest, cookies: &CookieSet) -> Result<Fetched, AttemptError> {
        profile_fetch(&self.settings, &self.identity, request, cookies).await
    }
}

/// Fetch with the Chrome profile. Also the first half of scripted rendering.
pub(crate) async fn profile_fetch(
    settings: &HttpSettings,
    identity: &IdentityRotation,
    request: &FetchRequest,
    cookies: &CookieSet,
) -> Result<Fetched, AttemptError> {
    let url = parse_url(&request.url)?;
    let jar = seeded_jar(&url, cookies);
    let client = settings.builder(jar.clone()).build()?;
    let headers = chrome_profile_headers(&identity.accept_language());
    send(&client, request, headers, &jar).await
}

/// Randomized identity headers after a jitter pause.
pub struct SessionStrategy {
    settings: HttpSettings,
    identity: Arc<IdentityRotation>,
}

impl SessionStrategy {
    pub fn new(settings: HttpSettings, identity: Arc<IdentityRotation>) -> Self {
        Self { settings, identity }
    }
}

#[async_trait]
impl AcquisitionStrategy for SessionStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Session
    }

    fn attempt_timeout(&self) -> Duration {
        self.settings.timeout
    }

    async fn fetch(&self, request: &FetchRequest, cookies: &CookieSet) -> Result<Fetched, AttemptError> {
        self.identity.pre_attempt_pause().await;
        let identity = self.identity.pick();
        let url = parse_url(&request.url)?;
        let jar = seeded_jar(&url, cookies);
        let client = self.settings.builder(jar.clone()).build()?;
        send(&client, request, session_headers(&identity), &jar).await
    }
}

/// HTTP/2 with prior knowledge, falling back once to HTTP/1.1.
pub struct AlternateProtocolStrategy {
    settings: HttpSettings,
    identity: Arc<IdentityRotation>,
}

impl AlternateProtocolStrategy {
    pub fn new(settings: HttpSettings, identity: Arc<IdentityRotation>) -> Self {
        Self { settings, identity }
    }
}

#[async_trait]
impl AcquisitionStrategy for AlternateProtocolStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::AlternateProtocol
    }

    fn attempt_timeout(&self) -> Duration {
        self.settings.timeout
    }

    async fn fetch(&self, request: &FetchRequest, cookies: &CookieSet) -> Result<Fetched, AttemptError> {
        let identity = self.identity.pick();
        let headers = header_map(&[
            ("user-agent", identity.user_agent.as_str()),
            ("accept", PLAIN_ACCEPT),
            ("accept-language", identity.accept_language.as_str()),
        ]);
        let url = parse_url(&request.url)?;
        let jar = seeded_jar(&url, cookies);

        let h2 = self.settings.builder(jar.clone()).http2_prior_knowledge().build()?;
        match send(&h2, request, headers.clone(), &jar).await {
            Err(AttemptError::Transport(e)) if !e.is_timeout() => {
                tracing::debug!("HTTP/2 prior knowledge failed, retrying over HTTP/1.1: {e}");
                let h1 = self.settings.builder(jar.clone()).http1_only().build()?;
                send(&h1, request, headers, &jar).await
            }
            other => other,
        }
    }
}

fn chrome_profile_headers(accept_language: &str) -> HeaderMap {
    header_map(&[
        ("sec-ch-ua", CHROME_CLIENT_HINTS),
        ("sec-ch-ua-mobile", "?0"),
        ("sec-ch-ua-platform", "\"Windows\""),
        ("upgrade-insecure-requests", "1"),
        ("user-agent", CHROME_USER_AGENT),
        ("accept", DOCUMENT_ACCEPT),
        ("sec-fetch-site", "none"),
        ("sec-fetch-mode", "navigate"),
        ("sec-fetch-user", "?1"),
        ("sec-fetch-dest", "document"),
        ("accept-language", accept_language),
    ])
}

fn session_headers(identity: &Identity) -> HeaderMap {
    header_map(&[
        ("user-agent", identity.user_agent.as_str()),
        ("accept", DOCUMENT_ACCEPT),
        ("accept-language", identity.accept_language.as_str()),
        ("dnt", "1"),
        ("upgrade-insecure-requests", "1"),
        ("sec-fetch-dest", "document"),
        ("sec-fetch-mode", "navigate"),
        ("sec-fetch-site", "none"),
        ("sec-fetch-user", "?1"),
        ("cache-control", "max-age=0"),
    ])
}

fn header_map(pairs: &[(&str, &str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Skipping malformed header"),
        }
    }
    map
}

fn parse_url(raw: &str) -> Result<Url, AttemptError> {
    Url::parse(raw).map_err(|e| AttemptError::Unsupported(format!("invalid url {raw}: {e}")))
}

/// A fresh jar holding `cookies` for the whole host.
pub(crate) fn seeded_jar(url: &Url, cookies: &CookieSet) -> Arc<Jar> {
    let jar = Jar::default();
    for (name, value) in cookies.iter() {
        jar.add_cookie_str(&format!("{name}={value}; Path=/"), url);
    }
    Arc::new(jar)
}

async fn send(
    client: &Client,
    request: &FetchRequest,
    headers: HeaderMap,
    jar: &Jar,
) -> Result<Fetched, AttemptError> {
    let builder = match request.method {
        Method::Get => client.get(&request.url),
        Method::Post => client.post(&request.url).form(&request.form),
    };
    let mut builder = builder.headers(headers);
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let response = builder.send().await?;
    read_response(response, jar).await
}

/// Collect status, headers and cookies, then decode the body.
///
/// Cookies come from the jar as well as the final response so that a
/// `Set-Cookie` on a redirect hop is not lost.
async fn read_response(response: Response, jar: &Jar) -> Result<Fetched, AttemptError> {
    let status = response.status().as_u16();
    let final_url = response.url().clone();
    let headers: Vec<(String, String)> = response
        .headers()
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
        .collect();
    let set_cookie_lines: Vec<String> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect();
    let encoding = charset_label(response.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()));

    let mut cookies = jar
        .cookies(&final_url)
        .and_then(|h| h.to_str().ok().map(CookieSet::parse_header))
        .unwrap_or_default();
    for cookie in response.cookies() {
        cookies.insert(cookie.name(), cookie.value());
    }

    let body = response.text().await?;
    tracing::debug!(status, url = %final_url, bytes = body.len(), "Received response");

    Ok(Fetched {
        status,
        body,
        final_url: final_url.to_string(),
        headers,
        cookies,
        set_cookie_lines,
        encoding: Some(encoding),
    })
}

/// Charset named in a `Content-Type` value, or the decoder's UTF-8 default.
fn charset_label(content_type: Option<&str>) -> String {
    content_type
        .and_then(|ct| {
            ct.split(';').find_map(|param| {
                let (key, value) = param.trim().split_once('=')?;
                key.trim()
                    .eq_ignore_ascii_case("charset")
                    .then(|| value.trim().trim_matches('"').to_lowercase())
            })
        })
        .unwrap_or_else(|| "utf-8".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charset_label() {
        assert_eq!(charset_label(Some("text/html; charset=ISO-8859-1")), "iso-8859-1");
        assert_eq!(charset_label(Some("text/html;charset=\"utf-8\"")), "utf-8");
        assert_eq!(charset_label(Some("text/csv")), "utf-8");
        assert_eq!(charset_label(None), "utf-8");
    }

    #[test]
    fn test_chrome_profile_order() {
        let headers = chrome_profile_headers("en-GB,en;q=0.9");
        let names: Vec<&str> = headers.keys().map(|k| k.as_str()).collect();
        assert_eq!(names.first(), Some(&"sec-ch-ua"));
        assert_eq!(names.last(), Some(&"accept-language"));
        assert_eq!(headers["user-agent"], CHROME_USER_AGENT);
    }

    #[test]
    fn test_seeded_jar_covers_other_paths() {
        let url = Url::parse("http://portal.test/ktuacademics/student/attendance").unwrap();
        let mut cookies = CookieSet::new();
        cookies.insert("SID", "abc");
        let jar = seeded_jar(&url, &cookies);

        let other = Url::parse("http://portal.test/user/login").unwrap();
        let header = jar.cookies(&other).unwrap();
        assert_eq!(header.to_str().unwrap(), "SID=abc");
    }
}
