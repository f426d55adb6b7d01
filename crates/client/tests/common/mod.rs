//! Shared fixtures for admin API tests against a mock homeserver

#![allow(dead_code)]

use std::time::Duration;

use hsadmin::{AdminClient, ClientOptions, Session};
use mockito::{Mock, Server, ServerGuard};
use serde_json::{json, Value};
use url::Url;

pub const TOKEN: &str = "syt_test_token";
pub const ADMIN: &str = "@admin:example.org";

/// Client with a tiny retry delay so network-failure tests stay fast
pub fn client(fetch_limit: u32) -> AdminClient {
    AdminClient::new(ClientOptions {
        request_timeout: Duration::from_secs(5),
        retry_delay: Duration::from_millis(1),
        fetch_limit,
    })
    .expect("client")
}

pub async fn mock_whoami(server: &mut ServerGuard) -> Mock {
    server
        .mock("GET", "/_matrix/client/v3/account/whoami")
        .match_header("authorization", format!("Bearer {}", TOKEN).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "user_id": ADMIN, "device_id": "DEV" }).to_string())
        .create_async()
        .await
}

/// Mock server, client and an authenticated session
pub async fn setup() -> (ServerGuard, AdminClient, Session) {
    let mut server = Server::new_async().await;
    mock_whoami(&mut server).await;
    let client = client(100);
    let base = Url::parse(&server.url()).expect("mock url");
    let session = client.authenticate(&base, TOKEN).await.expect("authenticate");
    (server, client, session)
}

pub fn room(n: u32) -> Value {
    json!({
        "room_id": format!("!r{}:example.org", n),
        "name": format!("Room {}", n),
        "canonical_alias": format!("#room{}:example.org", n),
        "joined_members": n * 2,
        "joined_local_members": n,
        "creation_ts": 1_700_000_000_000_i64 + i64::from(n),
    })
}

pub fn rooms_page(rooms: impl IntoIterator<Item = u32>, next_batch: Option<u64>, total: u64) -> String {
    let mut body = json!({
        "rooms": rooms.into_iter().map(room).collect::<Vec<_>>(),
        "offset": 0,
        "total_rooms": total,
    });
    if let Some(next) = next_batch {
        body["next_batch"] = json!(next);
    }
    body.to_string()
}
