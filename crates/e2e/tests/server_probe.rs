//! Reachability and login preflight against a fake CRM server.

use std::time::Duration;

use reqwest::Url;
use test_case::test_case;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vipauto_e2e::server::{login_preflight, wait_for_reachable};
use vipauto_e2e::{Credentials, E2eError};

fn url_of(server: &MockServer) -> Url {
    Url::parse(&server.uri()).unwrap()
}

#[test_case(200 ; "login page")]
#[test_case(302 ; "redirect")]
#[test_case(404 ; "missing route still means the server is up")]
#[tokio::test]
async fn reachable_for_non_server_errors(status: u16) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;

    wait_for_reachable(&url_of(&server), Duration::from_secs(2))
        .await
        .unwrap();
}

#[tokio::test]
async fn server_errors_keep_waiting_until_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = wait_for_reachable(&url_of(&server), Duration::from_millis(400))
        .await
        .unwrap_err();
    match err {
        E2eError::ServerHealthCheck { attempts, url } => {
            assert!(attempts > 1);
            assert!(url.starts_with("http://127.0.0.1"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn preflight_accepts_director() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(serde_json::json!({ "login": "director", "password": "password" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": "Успешный вход",
            "token": "eyJhbGciOiJIUzI1NiJ9.test.sig",
            "user": { "login": "director", "name": "Директор", "role": "DIRECTOR" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = login_preflight(&url_of(&server), &Credentials::default())
        .await
        .unwrap();
    assert!(!resp.token.is_empty());
    let user = resp.user.unwrap();
    assert_eq!(user.role, "DIRECTOR");
    assert_eq!(user.name, "Директор");
}

#[test_case(401, "Неверный логин или пароль" ; "wrong password")]
#[test_case(500, "Internal Server Error" ; "server failure")]
#[tokio::test]
async fn preflight_reports_rejection(status: u16, expected: &str) {
    let server = MockServer::start().await;
    let template = if status == 401 {
        ResponseTemplate::new(status)
            .set_body_json(serde_json::json!({ "message": "Неверный логин или пароль" }))
    } else {
        ResponseTemplate::new(status)
    };
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(template)
        .mount(&server)
        .await;

    let creds = Credentials {
        login: "director".into(),
        password: "wrong".into(),
    };
    let err = login_preflight(&url_of(&server), &creds).await.unwrap_err();
    match err {
        E2eError::Authentication { message, url } => {
            assert!(message.contains(expected), "message was {message}");
            assert!(url.ends_with("/login"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn preflight_rejects_empty_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "" })),
        )
        .mount(&server)
        .await;

    let err = login_preflight(&url_of(&server), &Credentials::default())
        .await
        .unwrap_err();
    assert!(matches!(err, E2eError::Authentication { .. }));
}
