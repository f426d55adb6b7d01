//! AdminClient behaviour against a mock homeserver

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use hsadmin::api::NewToken;
use hsadmin::{AdminError, Filter, FilterField, RegistrationToken, Room, Sort, SortKey, User};
use mockito::{Matcher, Server};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

use common::{client, mock_whoami, rooms_page, setup, ADMIN, TOKEN};

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_authenticate_returns_session_identity() {
    let (_server, _client, session) = setup().await;
    assert_eq!(session.user_id(), ADMIN);
    assert_eq!(session.server_name(), Some("example.org"));
}

#[tokio::test]
async fn test_authenticate_rejects_bad_token() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/_matrix/client/v3/account/whoami")
        .with_status(401)
        .with_body(r#"{"errcode":"M_UNKNOWN_TOKEN","error":"Invalid access token passed."}"#)
        .create_async()
        .await;

    let base = Url::parse(&server.url()).unwrap();
    let err = client(100).authenticate(&base, "wrong").await.unwrap_err();
    assert!(err.is_fatal(), "expected auth error, got {:?}", err);
}

#[tokio::test]
async fn test_authenticate_requires_user_id() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/_matrix/client/v3/account/whoami")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let base = Url::parse(&server.url()).unwrap();
    let err = client(100).authenticate(&base, TOKEN).await.unwrap_err();
    assert!(matches!(err, AdminError::Auth(_)));
}

#[tokio::test]
async fn test_forbidden_whoami_fails_authentication() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/_matrix/client/v3/account/whoami")
        .with_status(403)
        .with_body(r#"{"errcode":"M_FORBIDDEN","error":"You are not a server admin"}"#)
        .create_async()
        .await;

    // At login any refusal means the token is unusable
    let base = Url::parse(&server.url()).unwrap();
    let err = client(100).authenticate(&base, TOKEN).await.unwrap_err();
    assert!(matches!(err, AdminError::Auth(ref m) if m.contains("not a server admin")));
}

/// Homeserver that hangs up on the first `drops` connections without
/// answering and serves whoami on the rest. Returns the URL and a count
/// of accepted connections.
async fn flaky_homeserver(drops: usize) -> (Url, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            read_request_head(&mut socket).await;
            if n <= drops {
                continue;
            }
            let body = json!({ "user_id": ADMIN }).to_string();
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (Url::parse(&format!("http://{}", addr)).unwrap(), connections)
}

async fn read_request_head(socket: &mut TcpStream) {
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&chunk[..n]),
        }
    }
}

#[tokio::test]
async fn test_dropped_connection_is_retried_once() {
    let (base, connections) = flaky_homeserver(1).await;

    let session = client(100).authenticate(&base, TOKEN).await.unwrap();

    assert_eq!(session.user_id(), ADMIN);
    assert_eq!(connections.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_network_failure_surfaces_after_one_retry() {
    let (base, connections) = flaky_homeserver(usize::MAX).await;

    let err = client(100).authenticate(&base, TOKEN).await.unwrap_err();

    assert!(matches!(err, AdminError::Network(_)), "expected network error, got {:?}", err);
    assert_eq!(connections.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unreachable_server_is_a_network_error() {
    // Nothing listens on port 1
    let base = Url::parse("http://127.0.0.1:1").unwrap();
    let err = client(100).authenticate(&base, TOKEN).await.unwrap_err();
    assert!(err.is_transient(), "expected network error, got {:?}", err);
}

// ============================================================================
// Aliases
// ============================================================================

#[tokio::test]
async fn test_alias_resolution_is_idempotent() {
    let (mut server, client, session) = setup().await;
    let lookup = server
        .mock("GET", "/_matrix/client/v3/directory/room/%23ops:example.org")
        .with_status(200)
        .with_body(r#"{"room_id":"!ops:example.org","servers":["example.org"]}"#)
        .expect(2)
        .create_async()
        .await;

    let first = client.resolve_room(&session, "#ops:example.org").await.unwrap();
    let second = client.resolve_room(&session, "#ops:example.org").await.unwrap();
    assert_eq!(first, "!ops:example.org");
    assert_eq!(first, second);

    // IDs pass through without a request
    let id = client.resolve_room(&session, "!ops:example.org").await.unwrap();
    assert_eq!(id, "!ops:example.org");
    lookup.assert_async().await;
}

#[tokio::test]
async fn test_unknown_alias_is_not_found() {
    let (mut server, client, session) = setup().await;
    server
        .mock("GET", "/_matrix/client/v3/directory/room/%23gone:example.org")
        .with_status(404)
        .with_body(r#"{"errcode":"M_NOT_FOUND","error":"Room alias #gone:example.org not found"}"#)
        .create_async()
        .await;

    let err = client.resolve_alias(&session, "#gone:example.org").await.unwrap_err();
    match err {
        AdminError::NotFound(message) => assert_eq!(message, "No room with alias #gone:example.org"),
        other => panic!("expected not found, got {:?}", other),
    }
}

// ============================================================================
// Listings
// ============================================================================

#[tokio::test]
async fn test_room_listing_follows_next_batch() {
    let mut server = Server::new_async().await;
    mock_whoami(&mut server).await;
    let client = client(2);
    let base = Url::parse(&server.url()).unwrap();
    let session = client.authenticate(&base, TOKEN).await.unwrap();

    let first = server
        .mock("GET", "/_synapse/admin/v1/rooms")
        .match_query(Matcher::Regex("^limit=2$".to_string()))
        .with_status(200)
        .with_body(rooms_page([1, 2], Some(2), 3))
        .expect(2)
        .create_async()
        .await;
    let second = server
        .mock("GET", "/_synapse/admin/v1/rooms")
        .match_query(Matcher::UrlEncoded("from".to_string(), "2".to_string()))
        .with_status(200)
        .with_body(rooms_page([3], None, 3))
        .expect(2)
        .create_async()
        .await;

    let rooms = client.collect_all::<Room>(&session).await.unwrap();
    let ids: Vec<&str> = rooms.iter().map(|r| r.room_id.as_str()).collect();
    assert_eq!(ids, vec!["!r1:example.org", "!r2:example.org", "!r3:example.org"]);

    // The stream starts over on every call
    let again: Vec<_> = client.list_stream::<Room>(&session).collect().await;
    assert_eq!(again.len(), 3);

    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_user_listing_includes_deactivated_and_follows_next_token() {
    let (mut server, client, session) = setup().await;

    server
        .mock("GET", "/_synapse/admin/v2/users")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("deactivated".to_string(), "true".to_string()),
            Matcher::Regex("^limit=100&deactivated=true$".to_string()),
        ]))
        .with_status(200)
        .with_body(
            json!({
                "users": [
                    { "name": "@alice:example.org", "displayname": "Alice", "admin": 1 },
                    { "name": "@bob:example.org", "deactivated": true }
                ],
                "next_token": "2",
                "total": 3
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/_synapse/admin/v2/users")
        .match_query(Matcher::UrlEncoded("from".to_string(), "2".to_string()))
        .with_status(200)
        .with_body(json!({ "users": [{ "name": "@carol:example.org" }], "total": 3 }).to_string())
        .create_async()
        .await;

    let users = client.collect_all::<User>(&session).await.unwrap();
    let roles: Vec<&str> = users.iter().map(User::role).collect();
    assert_eq!(roles, vec!["ADMIN", "DEACTIVATED", "USER"]);
}

#[tokio::test]
async fn test_list_applies_filter_and_sort() {
    let (mut server, client, session) = setup().await;
    server
        .mock("GET", "/_synapse/admin/v1/rooms")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(rooms_page(1..=6, None, 6))
        .create_async()
        .await;

    // joined_members is twice the room number
    let filter = Filter::parse(FilterField::Count, "4-10").unwrap();
    let sort = Sort::new(SortKey::Count, true);
    let rooms = client
        .list::<Room>(&session, Some(&filter), Some(&sort))
        .await
        .unwrap();
    let names: Vec<&str> = rooms.iter().filter_map(|r| r.name.as_deref()).collect();
    assert_eq!(names, vec!["Room 5", "Room 4", "Room 3", "Room 2"]);
}

#[tokio::test]
async fn test_listing_error_is_surfaced() {
    let (mut server, client, session) = setup().await;
    server
        .mock("GET", "/_synapse/admin/v1/rooms")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body(r#"{"errcode":"M_FORBIDDEN","error":"You are not a server admin"}"#)
        .create_async()
        .await;

    let err = client.collect_all::<Room>(&session).await.unwrap_err();
    match err {
        AdminError::Remote { status, errcode, .. } => {
            assert_eq!(status, 403);
            assert_eq!(errcode.as_deref(), Some("M_FORBIDDEN"));
        }
        other => panic!("expected remote error, got {:?}", other),
    }
}

// ============================================================================
// Rooms
// ============================================================================

#[tokio::test]
async fn test_delete_room_and_wait_for_completion() {
    let (mut server, client, session) = setup().await;
    server
        .mock("DELETE", "/_synapse/admin/v2/rooms/!r1:example.org")
        .match_body(Matcher::Json(json!({
            "block": true,
            "purge": false,
            "message": "This room has been deleted by an administrator"
        })))
        .with_status(200)
        .with_body(r#"{"delete_id":"abc123"}"#)
        .create_async()
        .await;
    let status = server
        .mock("GET", "/_synapse/admin/v2/rooms/delete_status/abc123")
        .with_status(200)
        .with_body(r#"{"status":"active","room_id":"!r1:example.org"}"#)
        .expect(3)
        .create_async()
        .await;

    let options = hsadmin::api::DeleteRoomOptions::with_purge(false);
    let delete_id = client
        .delete_room(&session, "!r1:example.org", &options)
        .await
        .unwrap();
    assert_eq!(delete_id, "abc123");

    let mut polls = Vec::new();
    let last = client
        .wait_for_deletion(&session, &delete_id, 3, Duration::from_millis(1), |n, s| {
            polls.push((n, s.status.clone()))
        })
        .await
        .unwrap();

    assert!(!last.is_finished());
    assert_eq!(last.delete_id.as_deref(), Some("abc123"));
    assert_eq!(polls.len(), 3);
    status.assert_async().await;
}

#[tokio::test]
async fn test_delete_response_without_id_is_invalid() {
    let (mut server, client, session) = setup().await;
    server
        .mock("DELETE", "/_synapse/admin/v2/rooms/!r1:example.org")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let err = client
        .delete_room(&session, "!r1:example.org", &Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_check_call_permissions() {
    let (mut server, client, session) = setup().await;
    server
        .mock("GET", "/_matrix/client/v3/rooms/!r1:example.org/state/m.room.power_levels")
        .with_status(200)
        .with_body(r#"{"events":{"m.call":0,"m.call.member":100}}"#)
        .create_async()
        .await;

    let report = client
        .check_call_permissions(&session, "!r1:example.org")
        .await
        .unwrap();
    assert!(report.needs_fix());
    assert!(report.levels.contains(&("m.call.member", Some(100))));
    assert!(report.levels.contains(&("m.call", Some(0))));
}

// ============================================================================
// Tokens and server
// ============================================================================

#[tokio::test]
async fn test_create_and_list_registration_tokens() {
    let (mut server, client, session) = setup().await;
    let create = server
        .mock("POST", "/_synapse/admin/v1/registration_tokens/new")
        .match_body(Matcher::PartialJson(json!({ "uses_allowed": 3, "expiry_time": null })))
        .with_status(200)
        .with_body(
            r#"{"token":"abcdefghijklmnopqrstuvwxyz","uses_allowed":3,"pending":0,"completed":0,"expiry_time":null}"#,
        )
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/_synapse/admin/v1/registration_tokens")
        .with_status(200)
        .with_body(
            r#"{"registration_tokens":[{"token":"abcdefghijklmnopqrstuvwxyz","uses_allowed":3,"pending":1,"completed":1,"expiry_time":null}]}"#,
        )
        .create_async()
        .await;

    let new_token = NewToken::generate(Some(3), None, time::OffsetDateTime::now_utc());
    let created = client
        .create_registration_token(&session, &new_token)
        .await
        .unwrap();
    assert_eq!(created.uses_allowed, Some(3));

    let tokens = client.collect_all::<RegistrationToken>(&session).await.unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].remaining_uses(), Some(1));
    create.assert_async().await;
}

#[tokio::test]
async fn test_server_stats() {
    let (mut server, client, session) = setup().await;
    server
        .mock("GET", "/_synapse/admin/v1/server_version")
        .with_status(200)
        .with_body(r#"{"server_version":"1.98.0"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/_synapse/admin/v2/users")
        .match_query(Matcher::UrlEncoded("limit".to_string(), "1".to_string()))
        .with_status(200)
        .with_body(r#"{"users":[{"name":"@a:example.org"}],"total":42}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/_synapse/admin/v1/rooms")
        .match_query(Matcher::UrlEncoded("limit".to_string(), "1".to_string()))
        .with_status(200)
        .with_body(rooms_page([1], Some(1), 7))
        .create_async()
        .await;

    let stats = client.server_stats(&session).await.unwrap();
    assert_eq!(stats.server_version, "1.98.0");
    assert_eq!(stats.total_users, Some(42));
    assert_eq!(stats.total_rooms, Some(7));
}
