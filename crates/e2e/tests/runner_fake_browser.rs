//! Runner behaviour with a stand-in for Node.js.
//!
//! The stand-in answers the Playwright availability probe and prints canned
//! step events, so the whole runner path (reachability, session output
//! parsing, evidence, report) runs without a real browser.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use vipauto_e2e::playwright::{PlaywrightConfig, StepStatus};
use vipauto_e2e::runner::RunnerConfig;
use vipauto_e2e::server::ServerConfig;
use vipauto_e2e::{LoginScenario, TestRunner};

fn fake_node(dir: &Path, events: &[&str]) -> PathBuf {
    let mut body = String::from("#!/bin/sh\nif [ \"$1\" = \"-e\" ]; then exit 0; fi\n");
    for event in events {
        body.push_str(&format!("echo '@@e2e {}'\n", event));
    }
    body.push_str("echo 'browser chatter'\n");

    let path = dir.join("fake-node");
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn write_screenshot(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    image::RgbaImage::from_pixel(16, 9, image::Rgba([20, 40, 60, 255]))
        .save(path)
        .unwrap();
}

async fn crm() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h2>Вход в систему</h2>"))
        .mount(&server)
        .await;
    server
}

fn config(work: &Path, node: PathBuf, base_url: &str) -> RunnerConfig {
    RunnerConfig {
        server: ServerConfig {
            startup_timeout: Duration::from_secs(2),
            ..Default::default()
        },
        playwright: PlaywrightConfig {
            base_url: Url::parse(base_url).unwrap(),
            node_binary: node,
            working_dir: work.to_path_buf(),
            script_timeout: Duration::from_secs(10),
            ..Default::default()
        },
        output_dir: work.join("test-results"),
        ..Default::default()
    }
}

#[tokio::test]
async fn login_passes_and_keeps_evidence() {
    let work = tempfile::tempdir().unwrap();
    let server = crm().await;

    let node = fake_node(
        work.path(),
        &[
            r#"{"event":"step","index":0,"ok":true,"duration_ms":120}"#,
            r#"{"event":"step","index":1,"ok":true,"duration_ms":30}"#,
            r#"{"event":"step","index":2,"ok":true,"duration_ms":25}"#,
            r#"{"event":"step","index":3,"ok":true,"duration_ms":60}"#,
            r#"{"event":"step","index":4,"ok":true,"duration_ms":900}"#,
            r#"{"event":"step","index":5,"ok":true,"duration_ms":200}"#,
            r#"{"event":"done","ok":true}"#,
        ],
    );
    // The real browser would write this during step 6.
    let shot = work.path().join("jules-scratch/verification/verification.png");
    write_screenshot(&shot);

    let mut runner = TestRunner::with_config(config(work.path(), node, &server.uri()));
    let suite = runner.run_login(&LoginScenario::new()).await.unwrap();

    assert!(suite.all_passed());
    assert_eq!(suite.total, 1);
    let result = &suite.results[0];
    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.steps.len(), 6);
    assert!(result.steps.iter().all(|s| s.status == StepStatus::Passed));
    assert_eq!(result.evidence.len(), 1);
    assert_eq!(result.evidence[0].path, shot);
    assert_eq!((result.evidence[0].width, result.evidence[0].height), (16, 9));

    let report = runner.write_results(&suite).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(report).unwrap()).unwrap();
    assert_eq!(json["passed"], 1);
    assert_eq!(json["results"][0]["name"], "login-flow");
}

#[tokio::test]
async fn heading_timeout_fails_and_skips_screenshot() {
    let work = tempfile::tempdir().unwrap();
    let server = crm().await;

    let node = fake_node(
        work.path(),
        &[
            r#"{"event":"step","index":0,"ok":true,"duration_ms":120}"#,
            r#"{"event":"step","index":1,"ok":true,"duration_ms":30}"#,
            r#"{"event":"step","index":2,"ok":true,"duration_ms":25}"#,
            r#"{"event":"step","index":3,"ok":true,"duration_ms":60}"#,
            r#"{"event":"step","index":4,"ok":false,"duration_ms":10003,"error":"Timeout 10000ms exceeded.","timeout":true}"#,
            r#"{"event":"done","ok":false}"#,
        ],
    );

    let mut runner = TestRunner::with_config(config(work.path(), node, &server.uri()));
    let suite = runner.run_login(&LoginScenario::new()).await.unwrap();

    assert!(!suite.all_passed());
    let result = &suite.results[0];
    assert!(!result.success);
    assert!(result.timed_out);
    assert!(result.error.as_deref().unwrap().contains("Vip-Auto CRM"));
    assert_eq!(result.steps[4].status, StepStatus::Failed);
    assert_eq!(result.steps[5].status, StepStatus::Skipped);
    assert!(result.evidence.is_empty());
}

#[tokio::test]
async fn missing_screenshot_fails_the_run() {
    let work = tempfile::tempdir().unwrap();
    let server = crm().await;

    let events: Vec<String> = (0..6)
        .map(|i| format!(r#"{{"event":"step","index":{},"ok":true,"duration_ms":1}}"#, i))
        .chain(std::iter::once(r#"{"event":"done","ok":true}"#.to_string()))
        .collect();
    let refs: Vec<&str> = events.iter().map(String::as_str).collect();
    let node = fake_node(work.path(), &refs);

    let mut runner = TestRunner::with_config(config(work.path(), node, &server.uri()));
    let suite = runner.run_login(&LoginScenario::new()).await.unwrap();

    let result = &suite.results[0];
    assert!(!result.success);
    assert!(!result.timed_out);
    assert!(result.error.as_deref().unwrap().contains("verification.png"));
}

#[tokio::test]
async fn crashed_browser_is_a_harness_error() {
    let work = tempfile::tempdir().unwrap();
    let server = crm().await;

    // No events at all: the process "crashed" before the first step.
    let node = fake_node(work.path(), &[]);

    let mut runner = TestRunner::with_config(config(work.path(), node, &server.uri()));
    let suite = runner.run_login(&LoginScenario::new()).await.unwrap();

    assert!(suite.has_harness_errors());
    assert_eq!(suite.harness_errors, 1);
    let result = &suite.results[0];
    assert!(!result.success);
    assert!(result.harness_error);
    assert!(!result.timed_out);
    assert!(result.steps.is_empty());
    assert!(result.error.as_deref().unwrap().contains("before finishing"));
}

#[tokio::test]
async fn missing_node_is_a_harness_error() {
    let work = tempfile::tempdir().unwrap();
    let server = crm().await;

    let node = work.path().join("no-such-node");
    let mut runner = TestRunner::with_config(config(work.path(), node, &server.uri()));
    let suite = runner.run_login(&LoginScenario::new()).await.unwrap();

    assert!(suite.has_harness_errors());
    let result = &suite.results[0];
    assert!(result.harness_error);
    assert!(result.error.as_deref().unwrap().contains("Playwright not found"));
}

#[tokio::test]
async fn session_limit_is_a_harness_error_not_a_step_timeout() {
    let work = tempfile::tempdir().unwrap();
    let server = crm().await;

    let node = work.path().join("slow-node");
    std::fs::write(
        &node,
        "#!/bin/sh\nif [ \"$1\" = \"-e\" ]; then exit 0; fi\nsleep 5\n",
    )
    .unwrap();
    std::fs::set_permissions(&node, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut cfg = config(work.path(), node, &server.uri());
    cfg.playwright.script_timeout = Duration::from_millis(300);

    let mut runner = TestRunner::with_config(cfg);
    let suite = runner.run_login(&LoginScenario::new()).await.unwrap();

    let result = &suite.results[0];
    assert!(result.harness_error);
    assert!(!result.timed_out);
    assert!(suite.has_harness_errors());
}

#[tokio::test]
async fn unreachable_target_fails_with_the_browser_error() {
    let work = tempfile::tempdir().unwrap();
    let node = fake_node(
        work.path(),
        &[
            r#"{"event":"step","index":0,"ok":false,"duration_ms":4,"error":"page.goto: net::ERR_CONNECTION_REFUSED at http://127.0.0.1:9/"}"#,
            r#"{"event":"done","ok":false}"#,
        ],
    );

    // Nothing listens there, and the runner does not poll it first.
    let mut runner = TestRunner::with_config(config(work.path(), node, "http://127.0.0.1:9"));
    let suite = runner.run_login(&LoginScenario::new()).await.unwrap();

    assert!(!suite.has_harness_errors());
    let result = &suite.results[0];
    assert!(!result.success);
    assert!(!result.harness_error);
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .contains("page.goto: net::ERR_CONNECTION_REFUSED at http://127.0.0.1:9/"));
    assert_eq!(result.steps[0].status, StepStatus::Failed);
    assert!(result.steps[1..].iter().all(|s| s.status == StepStatus::Skipped));
}

#[tokio::test]
async fn waiting_for_unreachable_target_is_an_error() {
    let work = tempfile::tempdir().unwrap();
    let node = fake_node(work.path(), &[]);

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut cfg = config(work.path(), node, &format!("http://127.0.0.1:{}", port));
    cfg.server.wait_for_ready = true;
    cfg.server.startup_timeout = Duration::from_millis(300);

    let mut runner = TestRunner::with_config(cfg);
    let err = runner.run_login(&LoginScenario::new()).await.unwrap_err();
    assert!(matches!(err, vipauto_e2e::E2eError::ServerHealthCheck { .. }));
}
