//! Server information

use reqwest::Method;
use serde_json::Value;

use hsadmin_shared::{AdminResult, ResourceKind, Room, ServerVersion, User};

use crate::client::{AdminClient, Session};

/// Headline numbers shown by `stats`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStats {
    pub server_version: String,
    pub total_users: Option<u64>,
    pub total_rooms: Option<u64>,
}

/// Account counts by state, from the user listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserBreakdown {
    pub active: usize,
    pub admins: usize,
    pub deactivated: usize,
}

impl UserBreakdown {
    pub fn from_users(users: &[User]) -> Self {
        users.iter().fold(Self::default(), |mut acc, user| {
            if user.deactivated {
                acc.deactivated += 1;
            } else {
                acc.active += 1;
            }
            if user.admin {
                acc.admins += 1;
            }
            acc
        })
    }
}

/// Rooms bucketed by joined members
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RoomBreakdown {
    /// No joined members
    pub empty: usize,
    /// 1 to 5 members
    pub small: usize,
    /// 6 to 20 members
    pub medium: usize,
    /// More than 20 members
    pub large: usize,
    pub average_members: f64,
}

impl RoomBreakdown {
    pub fn from_rooms(rooms: &[Room]) -> Self {
        let mut breakdown = Self::default();
        let mut members: u64 = 0;
        for room in rooms {
            members = members.saturating_add(room.joined_members);
            match room.joined_members {
                0 => breakdown.empty += 1,
                1..=5 => breakdown.small += 1,
                6..=20 => breakdown.medium += 1,
                _ => breakdown.large += 1,
            }
        }
        if !rooms.is_empty() {
            breakdown.average_members = members as f64 / rooms.len() as f64;
        }
        breakdown
    }
}

/// Breakdowns shown by `stats --detailed`; `None` when a listing failed
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetailedStats {
    pub users: Option<UserBreakdown>,
    pub rooms: Option<RoomBreakdown>,
}

/// Endpoints checked by `info`, with their paths
const ENDPOINTS: [(&str, &[&str]); 3] = [
    ("Client API", &["_matrix", "client", "versions"]),
    ("Admin API", &["_synapse", "admin", "v1", "server_version"]),
    ("Federation", &["_matrix", "federation", "v1", "version"]),
];

/// Whether one endpoint answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointStatus {
    pub name: &'static str,
    /// `Err` holds the reason the endpoint is unavailable
    pub state: Result<(), String>,
}

impl EndpointStatus {
    pub fn is_available(&self) -> bool {
        self.state.is_ok()
    }
}

impl AdminClient {
    pub async fn server_version(&self, session: &Session) -> AdminResult<ServerVersion> {
        self.request_as(
            session,
            Method::GET,
            &["_synapse", "admin", "v1", "server_version"],
            None,
        )
        .await
    }

    /// Total size of a collection, asking the server for a single item
    pub async fn collection_total(&self, session: &Session, kind: ResourceKind) -> AdminResult<Option<u64>> {
        let Some(total_key) = kind.total_key() else {
            return Ok(None);
        };
        let mut query = vec![("limit", "1".to_string())];
        for &(key, value) in kind.list_query() {
            query.push((key, value.to_string()));
        }
        let page = self
            .request(session, Method::GET, kind.collection_path(), &query, None)
            .await?;
        Ok(page.get(total_key).and_then(Value::as_u64))
    }

    pub async fn server_stats(&self, session: &Session) -> AdminResult<ServerStats> {
        let version = self.server_version(session).await?;
        let total_users = self.collection_total(session, ResourceKind::User).await?;
        let total_rooms = self.collection_total(session, ResourceKind::Room).await?;
        Ok(ServerStats {
            server_version: version.server_version,
            total_users,
            total_rooms,
        })
    }

    /// Break down users and rooms from full listings
    ///
    /// A listing that fails is reported as missing. Authentication loss
    /// still fails the whole call.
    pub async fn detailed_stats(&self, session: &Session) -> AdminResult<DetailedStats> {
        let users = self.collect_all::<User>(session).await;
        let rooms = self.collect_all::<Room>(session).await;
        Ok(DetailedStats {
            users: breakdown(users, |u| UserBreakdown::from_users(&u))?,
            rooms: breakdown(rooms, |r| RoomBreakdown::from_rooms(&r))?,
        })
    }

    /// Check which well-known endpoints answer
    pub async fn check_endpoints(&self, session: &Session) -> Vec<EndpointStatus> {
        let mut statuses = Vec::with_capacity(ENDPOINTS.len());
        for (name, path) in ENDPOINTS {
            let state = match self.request(session, Method::GET, path, &[], None).await {
                Ok(_) => Ok(()),
                Err(e) => {
                    tracing::debug!(endpoint = name, error = %e, "Endpoint unavailable");
                    Err(e.to_string())
                }
            };
            statuses.push(EndpointStatus { name, state });
        }
        statuses
    }
}

fn breakdown<T, B>(
    listing: AdminResult<Vec<T>>,
    build: impl FnOnce(Vec<T>) -> B,
) -> AdminResult<Option<B>> {
    match listing {
        Ok(items) => Ok(Some(build(items))),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::warn!(error = %e, "Listing for detailed stats failed");
            Ok(None)
        }
    }
}
