#![allow(dead_code)]

pub use clusterflow_cloud_ovh::{ClientConfig, OvhClient};
pub use serde_json::json;
pub use wiremock::{Mock, MockServer, ResponseTemplate};

use clusterflow_cloud::PollConfig;
use std::time::Duration;

pub const TOKEN: &str = "test-token";
pub const USERS_PATH: &str = "/cloud/project/svc1/database/opensearch/clust1/user";
pub const USER_PATH: &str = "/cloud/project/svc1/database/opensearch/clust1/user/user1";

pub fn client_for(server: &MockServer) -> OvhClient {
    OvhClient::new(ClientConfig::new(server.uri(), TOKEN)).unwrap()
}

/// Poll fast enough to keep tests short
pub fn fast_poll() -> PollConfig {
    PollConfig::fixed(Duration::from_millis(10))
}

pub fn user_body(status: &str) -> serde_json::Value {
    json!({
        "acls": [{ "pattern": "*", "permission": "all" }],
        "createdAt": "2024-05-01T10:00:00+02:00",
        "id": "user1",
        "name": "alice",
        "status": status
    })
}

pub fn not_found() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({
        "class": "Client::NotFound",
        "message": "This object does not exist"
    }))
}

pub async fn count_requests(server: &MockServer, verb: &str, path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == verb && r.url.path() == path)
        .count()
}
