//! Resource records returned by the homeserver admin API

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

// =============================================================================
// Resource kinds
// =============================================================================

/// Collections the admin API exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Room,
    User,
    RegistrationToken,
}

impl ResourceKind {
    /// Path segments of the listing endpoint
    pub fn collection_path(self) -> &'static [&'static str] {
        match self {
            ResourceKind::Room => &["_synapse", "admin", "v1", "rooms"],
            ResourceKind::User => &["_synapse", "admin", "v2", "users"],
            ResourceKind::RegistrationToken => {
                &["_synapse", "admin", "v1", "registration_tokens"]
            }
        }
    }

    /// Key of the item array inside a listing page
    pub fn items_key(self) -> &'static str {
        match self {
            ResourceKind::Room => "rooms",
            ResourceKind::User => "users",
            ResourceKind::RegistrationToken => "registration_tokens",
        }
    }

    /// Key of the pagination cursor, for collections the server pages
    pub fn cursor_key(self) -> Option<&'static str> {
        match self {
            ResourceKind::Room => Some("next_batch"),
            ResourceKind::User => Some("next_token"),
            ResourceKind::RegistrationToken => None,
        }
    }

    /// Fixed query parameters sent with every listing request
    pub fn list_query(self) -> &'static [(&'static str, &'static str)] {
        match self {
            // Deactivated accounts are hidden unless asked for
            ResourceKind::User => &[("deactivated", "true")],
            _ => &[],
        }
    }

    /// Key holding the total item count in a listing page
    pub fn total_key(self) -> Option<&'static str> {
        match self {
            ResourceKind::Room => Some("total_rooms"),
            ResourceKind::User => Some("total"),
            ResourceKind::RegistrationToken => None,
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            ResourceKind::Room => "rooms",
            ResourceKind::User => "users",
            ResourceKind::RegistrationToken => "registration tokens",
        }
    }
}

/// Cursor values come back as numbers for rooms and strings for users
pub fn cursor_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// =============================================================================
// Resource trait
// =============================================================================

/// A server-side record addressable by a stable ID and optionally an alias.
///
/// The client never owns these records; they are a transient view over what
/// the server returned.
pub trait Resource: DeserializeOwned + Clone + Send + 'static {
    const KIND: ResourceKind;

    /// Canonical identifier used in API paths
    fn id(&self) -> &str;

    /// Human-readable alias, if the record has one
    fn alias(&self) -> Option<&str>;

    /// Display name, if the record has one
    fn name(&self) -> Option<&str>;

    /// Numeric attribute used by count filters and count sorting
    fn count(&self) -> Option<u64>;

    /// Creation time in milliseconds since the epoch
    fn created_at(&self) -> Option<i64>;

    /// Single line shown next to the listing index
    fn headline(&self) -> String;

    /// Indented lines shown under the headline
    fn details(&self) -> Vec<String>;

    /// Position when sorting by role, lower first
    fn role_rank(&self) -> Option<u8> {
        None
    }

    /// Best short label for progress output
    fn label(&self) -> &str {
        self.name()
            .filter(|n| !n.is_empty())
            .or_else(|| self.alias())
            .unwrap_or_else(|| self.id())
    }
}

// =============================================================================
// Rooms
// =============================================================================

/// Room entry from the room listing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub room_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub canonical_alias: Option<String>,
    #[serde(default)]
    pub joined_members: u64,
    #[serde(default)]
    pub joined_local_members: u64,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub encryption: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub creation_ts: Option<i64>,
}

impl Resource for Room {
    const KIND: ResourceKind = ResourceKind::Room;

    fn id(&self) -> &str {
        &self.room_id
    }

    fn alias(&self) -> Option<&str> {
        self.canonical_alias.as_deref()
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn count(&self) -> Option<u64> {
        Some(self.joined_members)
    }

    fn created_at(&self) -> Option<i64> {
        self.creation_ts
    }

    fn headline(&self) -> String {
        let members = match self.joined_members {
            0 => "empty".to_string(),
            1 => "1 member".to_string(),
            n => format!("{} members", n),
        };
        format!(
            "[{}] {}",
            members,
            self.name.as_deref().unwrap_or("Unnamed room")
        )
    }

    fn details(&self) -> Vec<String> {
        vec![
            format!("ID: {}", self.room_id),
            format!("Alias: {}", self.canonical_alias.as_deref().unwrap_or("No alias")),
        ]
    }
}

// =============================================================================
// Users
// =============================================================================

/// Account entry from the user listing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Fully qualified user ID, e.g. `@alice:example.org`
    pub name: String,
    #[serde(default)]
    pub displayname: Option<String>,
    #[serde(default, deserialize_with = "bool_or_int")]
    pub admin: bool,
    #[serde(default, deserialize_with = "bool_or_int")]
    pub deactivated: bool,
    #[serde(default, deserialize_with = "bool_or_int")]
    pub is_guest: bool,
    #[serde(default)]
    pub user_type: Option<String>,
    #[serde(default)]
    pub creation_ts: Option<i64>,
}

impl User {
    /// Role tag shown in listings and confirmations
    pub fn role(&self) -> &'static str {
        if self.deactivated {
            "DEACTIVATED"
        } else if self.admin {
            "ADMIN"
        } else {
            "USER"
        }
    }
}

impl Resource for User {
    const KIND: ResourceKind = ResourceKind::User;

    fn id(&self) -> &str {
        &self.name
    }

    fn alias(&self) -> Option<&str> {
        self.displayname.as_deref()
    }

    fn name(&self) -> Option<&str> {
        self.displayname.as_deref()
    }

    fn count(&self) -> Option<u64> {
        None
    }

    fn created_at(&self) -> Option<i64> {
        self.creation_ts
    }

    /// Admins, then regular users, then deactivated accounts
    fn role_rank(&self) -> Option<u8> {
        Some(if self.deactivated {
            2
        } else if self.admin {
            0
        } else {
            1
        })
    }

    fn headline(&self) -> String {
        format!("[{}] {}", self.role(), self.name)
    }

    fn details(&self) -> Vec<String> {
        vec![format!(
            "Display: {}",
            self.displayname.as_deref().unwrap_or("No display name")
        )]
    }
}

/// Older servers report flags as 0/1
fn bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => Ok(b),
        Some(Value::Number(n)) => Ok(n.as_i64().unwrap_or(0) != 0),
        _ => Ok(false),
    }
}

// =============================================================================
// Registration tokens
// =============================================================================

/// Registration token entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationToken {
    pub token: String,
    #[serde(default)]
    pub uses_allowed: Option<u32>,
    #[serde(default)]
    pub pending: u32,
    #[serde(default)]
    pub completed: u32,
    /// Milliseconds since the epoch
    #[serde(default)]
    pub expiry_time: Option<i64>,
}

impl RegistrationToken {
    /// Uses left, or `None` when the token is unlimited
    pub fn remaining_uses(&self) -> Option<u32> {
        self.uses_allowed
            .map(|allowed| allowed.saturating_sub(self.completed.saturating_add(self.pending)))
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        let now_ms = (now.unix_timestamp_nanos() / 1_000_000) as i64;
        self.expiry_time.map(|t| t <= now_ms).unwrap_or(false)
    }

    /// Shortened form for progress lines, the full token is a credential
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.token.chars().collect();
        if chars.len() <= 20 {
            return self.token.clone();
        }
        let head: String = chars[..12].iter().collect();
        let tail: String = chars[chars.len() - 8..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

impl Resource for RegistrationToken {
    const KIND: ResourceKind = ResourceKind::RegistrationToken;

    fn id(&self) -> &str {
        &self.token
    }

    fn alias(&self) -> Option<&str> {
        None
    }

    fn name(&self) -> Option<&str> {
        None
    }

    fn count(&self) -> Option<u64> {
        Some(u64::from(self.completed))
    }

    fn created_at(&self) -> Option<i64> {
        None
    }

    fn headline(&self) -> String {
        self.masked()
    }

    fn details(&self) -> Vec<String> {
        let uses = match (self.uses_allowed, self.remaining_uses()) {
            (Some(_), Some(remaining)) => format!(
                "Uses: {} completed, {} pending, {} remaining",
                self.completed, self.pending, remaining
            ),
            _ => format!("Uses: {} completed, unlimited", self.completed),
        };
        let expiry = match self.expiry_time.and_then(format_millis) {
            Some(when) => format!("Expires: {}", when),
            None => "Expires: never".to_string(),
        };
        vec![uses, expiry]
    }
}

/// Render epoch milliseconds as `YYYY-MM-DD HH:MM` UTC
pub fn format_millis(ms: i64) -> Option<String> {
    let format = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute] UTC");
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .ok()
        .and_then(|dt| dt.format(&format).ok())
}

// =============================================================================
// Small response records
// =============================================================================

/// Identity behind a token
#[derive(Debug, Clone, Deserialize)]
pub struct WhoAmI {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
}

/// Progress of an asynchronous room deletion
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeleteStatus {
    #[serde(default)]
    pub delete_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl DeleteStatus {
    pub fn is_finished(&self) -> bool {
        self.status == "complete" || self.status == "failed"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerVersion {
    pub server_version: String,
}
