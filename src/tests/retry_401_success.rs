use crate::tests::test_support::{STORES_PATH, capture_logs, client_with};
use crate::{ApiClient, Credentials, Endpoint, TokenKind, TokenStore, WithResponse};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

#[derive(serde::Deserialize, Debug)]
struct Store {
    id: u64,
}

#[tokio::test]
async fn replays_once_after_401_with_reissued_token() {
    let server = MockServer::start().await;

    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();

    Mock::given(method("GET"))
        .and(path(STORES_PATH))
        .respond_with(move |req: &Request| {
            let auth = req
                .headers
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.to_string())
                .expect("bearer header missing");
            let mut guard = seen_clone.lock().unwrap();
            guard.push(auth.clone());
            if auth == "Bearer access-1" {
                ResponseTemplate::new(401)
            } else {
                ResponseTemplate::new(200).set_body_json(serde_json::json!([{"id": 7}]))
            }
        })
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/reissue"))
        .and(header("Authorization-Refresh", "Bearer refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accessToken": "access-2",
            "refreshToken": "refresh-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = client_with(
        &server.uri(),
        Some(Credentials::new("access-1", "refresh-1")),
    );

    let (logs, guard) = capture_logs();
    let endpoint: Endpoint<WithResponse<Vec<Store>>> = Endpoint::get(server.uri(), STORES_PATH);
    let res = client.send(&endpoint).await;
    drop(guard);

    let stores = res.expect("request should succeed after reissue");
    assert_eq!(stores.len(), 1);
    assert_eq!(stores[0].id, 7);

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen, vec!["Bearer access-1", "Bearer access-2"]);
    assert_eq!(store.get(TokenKind::Access).await.unwrap(), "access-2");
    assert_eq!(store.get(TokenKind::Refresh).await.unwrap(), "refresh-2");

    assert!(
        logs.count_matching(&["WARN", "401"]) >= 1,
        "expected warning log mentioning 401, got: {:?}",
        logs.lines()
    );
    assert_eq!(
        logs.count_matching(&["INFO", "reissue.success"]),
        1,
        "expected one reissue telemetry event, got: {:?}",
        logs.lines()
    );
}
