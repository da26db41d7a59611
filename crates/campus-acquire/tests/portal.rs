use std::sync::Arc;
use std::time::Duration;

use campus_acquire::strategy::{BrowserProfileStrategy, HttpSettings};
use campus_acquire::{
    AcquisitionStrategy, FallbackResolver, IdentityRotation, Orchestrator, Portal, PortalConfig,
    PortalError,
};
use campus_model::{AuthFailure, DocumentKind, SessionToken};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COOKIE_KEY: &str = "SAHRDAYASESSIONID";

fn portal(server: &MockServer) -> Portal {
    let config = PortalConfig {
        base_url: server.uri(),
        cookie_key: COOKIE_KEY.to_string(),
        request_timeout: Duration::from_secs(5),
        automation_enabled: false,
        jitter: false,
        ..Default::default()
    };
    let settings = HttpSettings {
        timeout: config.request_timeout,
        resolver: Arc::new(FallbackResolver::new()),
    };
    let chain: Vec<Box<dyn AcquisitionStrategy>> = vec![Box::new(BrowserProfileStrategy::new(
        settings,
        Arc::new(IdentityRotation::without_jitter()),
    ))];
    Portal::new(config, Orchestrator::new(chain))
}

fn page(title: &str) -> ResponseTemplate {
    let body = format!(
        "<html><head><title>{title}</title></head><body>{}</body></html>",
        "<div>portal content</div>".repeat(10)
    );
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

#[tokio::test]
async fn test_login_follows_redirect_and_returns_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/login"))
        .and(body_string_contains("LoginForm%5Busername%5D=alice"))
        .and(body_string_contains("LoginForm%5Bpassword%5D=secret"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", "/dashboard")
                .insert_header("set-cookie", "SAHRDAYASESSIONID=tok123; Path=/; HttpOnly"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(page("Student Dashboard"))
        .mount(&server)
        .await;

    let token = portal(&server).login("alice", "secret").await.unwrap();
    assert_eq!(token.as_str(), "tok123");
}

#[tokio::test]
async fn test_login_page_again_is_bad_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/login"))
        .respond_with(page("Login | Portal"))
        .mount(&server)
        .await;

    let err = portal(&server).login("alice", "wrong").await.unwrap_err();
    assert!(matches!(err, PortalError::Auth(AuthFailure::BadCredentials)));
}

#[tokio::test]
async fn test_login_without_cookie_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/login"))
        .respond_with(page("Student Dashboard"))
        .mount(&server)
        .await;

    let err = portal(&server).login("alice", "secret").await.unwrap_err();
    assert!(matches!(
        err,
        PortalError::Auth(AuthFailure::NoSessionToken { .. })
    ));
}

#[tokio::test]
async fn test_login_page_on_data_fetch_is_session_expired() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ktuacademics/student/results"))
        .and(header("cookie", "SAHRDAYASESSIONID=stale"))
        .respond_with(page("Login"))
        .mount(&server)
        .await;

    let err = portal(&server)
        .results_page(&SessionToken::new("stale"))
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::SessionExpired));
}

#[tokio::test]
async fn test_timetable_export_is_tabular() {
    let server = MockServer::start().await;
    let csv = format!(
        "Day,Period 1,Period 2\n{}",
        "Monday,CS101 - Data Structures [Lecture] - Dr. Smith,break\n".repeat(3)
    );
    Mock::given(method("GET"))
        .and(path("/student/timetable"))
        .and(query_param("format", "csv"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(csv, "text/csv"))
        .mount(&server)
        .await;

    let doc = portal(&server)
        .timetable_export(&SessionToken::new("tok"))
        .await
        .unwrap();
    assert_eq!(doc.kind(), DocumentKind::Tabular);
    assert!(doc.text.starts_with("Day,Period 1"));
}

#[tokio::test]
async fn test_exam_results_follow_listing_links() {
    let server = MockServer::start().await;
    let listing = format!(
        r#"<html><head><title>University Exam Results</title></head><body>
        <a href="/universityexam/student/examresult">Results</a>
        <a href="/universityexam/student/viewresult/7">View Result</a>
        <a href="universityexam/student/viewresult/8">View Result</a>
        {}</body></html>"#,
        "<div>portal content</div>".repeat(5)
    );
    let card = r#"<html><head><title>Result</title></head><body>
        <table>
          <tr><td>Name of Exam</td><td>B.Tech Fifth Semester Exam December 2024 (2022 Admission)</td></tr>
        </table>
        <table>
          <tr><th>Slot</th><th>Course Code</th><th>Course Name</th><th>Grade</th><th>Credit</th></tr>
          <tr><td>A</td><td>CST301</td><td>Formal Languages and Automata Theory</td><td>A+</td><td>4</td></tr>
          <tr><td>SGPA</td><td>8.45</td></tr>
          <tr><td>Earned Credit</td><td>4</td></tr>
        </table>
        </body></html>"#;

    Mock::given(method("GET"))
        .and(path("/universityexam/student/examresult"))
        .and(header("cookie", "SAHRDAYASESSIONID=tok123"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(listing, "text/html; charset=utf-8"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/universityexam/student/viewresult/7"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(card, "text/html; charset=utf-8"))
        .mount(&server)
        .await;
    // viewresult/8 is unmocked: the 404 is skipped, not fatal.

    let exams = portal(&server)
        .exam_results(&SessionToken::new("tok123"))
        .await
        .unwrap();
    assert_eq!(exams.len(), 1);
    let exam = &exams[0];
    assert_eq!(exam.degree, "BTech KTU");
    assert_eq!(exam.semester, "Fifth Semester");
    assert_eq!(exam.academic_year, "2022-2023");
    assert_eq!(exam.sgpa, Some(8.45));
    assert_eq!(exam.earned_credit, Some(4));
    assert_eq!(exam.subjects[0].code.as_deref(), Some("CST301"));
    assert_eq!(exam.subjects[0].credit, Some(4));
}

#[tokio::test]
async fn test_exam_results_session_expired() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/universityexam/student/examresult"))
        .respond_with(page("Login | Portal"))
        .mount(&server)
        .await;

    let err = portal(&server)
        .exam_results(&SessionToken::new("stale"))
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::SessionExpired));
}
