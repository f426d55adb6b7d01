//! Room operations: details, deletion, call permissions

use std::time::Duration;

use reqwest::Method;
use serde_json::{json, Map, Value};

use hsadmin_shared::{AdminError, AdminResult, DeleteStatus, Room};

use crate::client::{AdminClient, Session};

/// Event types whose send level must be 0 for group calls to work
pub const CALL_EVENT_TYPES: [&str; 4] = [
    "org.matrix.msc3401.call.member",
    "org.matrix.msc3401.call",
    "m.call.member",
    "m.call",
];

const DEFAULT_DELETE_MESSAGE: &str = "This room has been deleted by an administrator";

/// Body of a room deletion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRoomOptions {
    /// Remove all history from the database
    pub purge: bool,
    /// Prevent the room from being joined again
    pub block: bool,
    /// Notice shown to members that get kicked
    pub message: String,
}

impl Default for DeleteRoomOptions {
    fn default() -> Self {
        Self {
            purge: true,
            block: true,
            message: DEFAULT_DELETE_MESSAGE.to_string(),
        }
    }
}

impl DeleteRoomOptions {
    pub fn with_purge(purge: bool) -> Self {
        Self {
            purge,
            ..Self::default()
        }
    }

    fn body(&self) -> Value {
        json!({
            "block": self.block,
            "purge": self.purge,
            "message": self.message,
        })
    }
}

/// Result of a call-permission fix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixOutcome {
    /// Every call event type was already at level 0
    AlreadyCompliant,
    Updated { event_id: String },
}

/// Current send levels of the call event types in one room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPermissionReport {
    pub room_id: String,
    /// `None` when the event type has no explicit level
    pub levels: Vec<(&'static str, Option<i64>)>,
}

impl CallPermissionReport {
    fn from_power_levels(room_id: &str, power_levels: &Value) -> Self {
        let events = power_levels.get("events");
        let levels = CALL_EVENT_TYPES
            .iter()
            .map(|&event| (event, events.and_then(|e| e.get(event)).and_then(Value::as_i64)))
            .collect();
        Self {
            room_id: room_id.to_string(),
            levels,
        }
    }

    /// A missing level falls back to the room default, so it also needs fixing
    pub fn needs_fix(&self) -> bool {
        self.levels.iter().any(|(_, level)| *level != Some(0))
    }
}

/// Set every call event type to level 0, returning whether anything changed
pub fn apply_call_levels(power_levels: &mut Value) -> AdminResult<bool> {
    let content = power_levels
        .as_object_mut()
        .ok_or_else(|| AdminError::InvalidResponse("power levels are not an object".to_string()))?;
    let events = content
        .entry("events")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| AdminError::InvalidResponse("'events' is not an object".to_string()))?;

    let mut changed = false;
    for event in CALL_EVENT_TYPES {
        if events.get(event).and_then(Value::as_i64) != Some(0) {
            events.insert(event.to_string(), json!(0));
            changed = true;
        }
    }
    Ok(changed)
}

fn room_path<'a>(version: &'a str, room_id: &'a str) -> [&'a str; 5] {
    ["_synapse", "admin", version, "rooms", room_id]
}

fn power_levels_path(room_id: &str) -> [&str; 7] {
    [
        "_matrix",
        "client",
        "v3",
        "rooms",
        room_id,
        "state",
        "m.room.power_levels",
    ]
}

impl AdminClient {
    pub async fn room_details(&self, session: &Session, room_id: &str) -> AdminResult<Room> {
        self.request_as(session, Method::GET, &room_path("v1", room_id), None)
            .await
    }

    /// Schedule a room for deletion and return the deletion ID
    pub async fn delete_room(
        &self,
        session: &Session,
        room_id: &str,
        options: &DeleteRoomOptions,
    ) -> AdminResult<String> {
        let body = options.body();
        let response = self
            .request(session, Method::DELETE, &room_path("v2", room_id), &[], Some(&body))
            .await?;

        let delete_id = response
            .get("delete_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AdminError::InvalidResponse(format!("no delete_id in response: {}", response))
            })?;

        tracing::info!(room_id, delete_id, purge = options.purge, "Room deletion scheduled");
        Ok(delete_id.to_string())
    }

    pub async fn delete_status(&self, session: &Session, delete_id: &str) -> AdminResult<DeleteStatus> {
        let mut status: DeleteStatus = self
            .request_as(
                session,
                Method::GET,
                &["_synapse", "admin", "v2", "rooms", "delete_status", delete_id],
                None,
            )
            .await?;
        if status.delete_id.is_none() {
            status.delete_id = Some(delete_id.to_string());
        }
        Ok(status)
    }

    /// Poll a deletion until it finishes or `attempts` polls have been made
    ///
    /// Returns the last status seen, finished or not.
    pub async fn wait_for_deletion<F>(
        &self,
        session: &Session,
        delete_id: &str,
        attempts: u32,
        interval: Duration,
        mut on_poll: F,
    ) -> AdminResult<DeleteStatus>
    where
        F: FnMut(u32, &DeleteStatus),
    {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            let status = self.delete_status(session, delete_id).await?;
            on_poll(attempt, &status);
            if status.is_finished() || attempt >= attempts {
                return Ok(status);
            }
            attempt += 1;
            tokio::time::sleep(interval).await;
        }
    }

    pub async fn power_levels(&self, session: &Session, room_id: &str) -> AdminResult<Value> {
        self.request(session, Method::GET, &power_levels_path(room_id), &[], None)
            .await
    }

    /// Replace the power-levels state and return the new event ID
    pub async fn set_power_levels(
        &self,
        session: &Session,
        room_id: &str,
        content: &Value,
    ) -> AdminResult<String> {
        let response = self
            .request(session, Method::PUT, &power_levels_path(room_id), &[], Some(content))
            .await?;
        response
            .get("event_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AdminError::InvalidResponse("no event_id in response".to_string()))
    }

    pub async fn check_call_permissions(
        &self,
        session: &Session,
        room_id: &str,
    ) -> AdminResult<CallPermissionReport> {
        let power_levels = self.power_levels(session, room_id).await?;
        Ok(CallPermissionReport::from_power_levels(room_id, &power_levels))
    }

    /// Lower the call event types to level 0 by read-modify-write
    pub async fn fix_call_permissions(&self, session: &Session, room_id: &str) -> AdminResult<FixOutcome> {
        let mut power_levels = self.power_levels(session, room_id).await?;
        if !apply_call_levels(&mut power_levels)? {
            tracing::debug!(room_id, "Call permissions already compliant");
            return Ok(FixOutcome::AlreadyCompliant);
        }

        let event_id = self.set_power_levels(session, room_id, &power_levels).await?;
        tracing::info!(room_id, event_id = %event_id, "Call permissions updated");
        Ok(FixOutcome::Updated { event_id })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_call_levels_keeps_other_events() {
        let mut content = json!({
            "users": { "@admin:example.org": 100 },
            "events": { "m.room.name": 50, "m.call": 50 }
        });
        assert!(apply_call_levels(&mut content).unwrap());
        assert_eq!(content["events"]["m.room.name"], 50);
        for event in CALL_EVENT_TYPES {
            assert_eq!(content["events"][event], 0);
        }
        assert_eq!(content["users"]["@admin:example.org"], 100);

        // Second pass changes nothing
        assert!(!apply_call_levels(&mut content).unwrap());
    }

    #[test]
    fn test_apply_call_levels_creates_events_map() {
        let mut content = json!({ "users_default": 0 });
        assert!(apply_call_levels(&mut content).unwrap());
        assert_eq!(content["events"]["m.call.member"], 0);

        let mut bad = json!({ "events": [] });
        assert!(apply_call_levels(&mut bad).is_err());
    }

    #[test]
    fn test_report_needs_fix() {
        let report = CallPermissionReport::from_power_levels(
            "!r:example.org",
            &json!({ "events": { "m.call": 0, "m.call.member": 0, "org.matrix.msc3401.call": 0 } }),
        );
        assert!(report.needs_fix());
        assert_eq!(report.levels[0], ("org.matrix.msc3401.call.member", None));

        let fixed = CallPermissionReport::from_power_levels(
            "!r:example.org",
            &json!({ "events": {
                "m.call": 0, "m.call.member": 0,
                "org.matrix.msc3401.call": 0, "org.matrix.msc3401.call.member": 0
            } }),
        );
        assert!(!fixed.needs_fix());
    }

    #[test]
    fn test_delete_options_default_to_purge() {
        let body = DeleteRoomOptions::default().body();
        assert_eq!(body["purge"], true);
        assert_eq!(body["block"], true);
        assert_eq!(DeleteRoomOptions::with_purge(false).body()["purge"], false);
    }
}
