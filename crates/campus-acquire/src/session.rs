use regex::Regex;

use campus_model::{AuthFailure, SessionToken};
use campus_validate::response::page_title;

use crate::types::AcquisitionResult;

/// Decide whether a login submission worked and pull out the session token.
pub fn evaluate_login(result: &AcquisitionResult, cookie_key: &str) -> Result<SessionToken, AuthFailure> {
    evaluate_login_with(result, cookie_key, "login")
}

/// Login evaluation with an explicit login-page title marker.
///
/// Still seeing the login page means the credentials were refused. Otherwise
/// the token comes from the collected cookies, then from the raw
/// `Set-Cookie` lines.
pub fn evaluate_login_with(
    result: &AcquisitionResult,
    cookie_key: &str,
    login_marker: &str,
) -> Result<SessionToken, AuthFailure> {
    let marker = login_marker.to_lowercase();
    if page_title(&result.body).is_some_and(|t| t.to_lowercase().contains(&marker)) {
        tracing::warn!("Login page returned after submitting credentials");
        return Err(AuthFailure::BadCredentials);
    }

    if let Some(value) = result.cookies.get(cookie_key).filter(|v| !v.is_empty()) {
        tracing::info!(cookie = cookie_key, "Session token found in cookies");
        return Ok(SessionToken::new(value));
    }

    if let Some(value) = token_from_set_cookie(&result.set_cookie_lines, cookie_key) {
        tracing::info!(cookie = cookie_key, "Session token found in Set-Cookie header");
        return Ok(SessionToken::new(value));
    }

    tracing::error!(cookie = cookie_key, "No session token in login response");
    Err(AuthFailure::NoSessionToken {
        cookie_key: cookie_key.to_string(),
    })
}

fn token_from_set_cookie(lines: &[String], cookie_key: &str) -> Option<String> {
    let re = Regex::new(&format!("{}=([^;]+)", regex::escape(cookie_key))).ok()?;
    lines
        .iter()
        .find_map(|line| re.captures(line).map(|c| c[1].trim().to_string()))
        .filter(|v| !v.is_empty())
}
