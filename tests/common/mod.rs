#![allow(dead_code)]

use std::sync::Arc;

use popup_net::{AuthenticatedClient, Config, Credentials, MemoryTokenStore, RetryPolicy};
use serde_json::json;
use wiremock::ResponseTemplate;

pub const STORES_PATH: &str = "/api/v1/popup-stores";
pub const REISSUE_PATH: &str = "/api/v1/auth/reissue";

pub fn memory_store(credentials: Option<Credentials>) -> Arc<MemoryTokenStore> {
    Arc::new(match credentials {
        Some(creds) => MemoryTokenStore::with_credentials(creds),
        None => MemoryTokenStore::new(),
    })
}

pub fn client(
    server_uri: &str,
    store: Arc<MemoryTokenStore>,
    policy: RetryPolicy,
) -> AuthenticatedClient<MemoryTokenStore> {
    let config = Config::new(server_uri).with_retry_policy(policy);
    AuthenticatedClient::from_config(&config, store).expect("client from config")
}

pub fn reissued(access: &str, refresh: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "accessToken": access,
        "refreshToken": refresh,
        "accessTokenExpiresAt": "2030-01-01T00:00:00Z",
        "refreshTokenExpiresAt": "2030-02-01T00:00:00Z"
    }))
}

pub fn stores_body() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!([
        {"id": 1, "name": "Cafe Pop"},
        {"id": 2, "name": "Sneaker Drop"}
    ]))
}

#[derive(Debug, serde::Deserialize, PartialEq)]
pub struct Store {
    pub id: u64,
    pub name: String,
}
