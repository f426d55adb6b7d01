//! Account operations

use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};

use hsadmin_shared::{AdminError, AdminResult, User};

use crate::client::{AdminClient, Session};

/// Account to create through the admin API
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    #[serde(skip)]
    pub user_id: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub displayname: Option<String>,
    pub admin: bool,
}

impl NewUser {
    /// Build a fully qualified user ID from a localpart or a full `@user:server`
    pub fn qualify(username: &str, server_name: &str) -> String {
        let username = username.trim();
        if username.starts_with('@') && username.contains(':') {
            username.to_string()
        } else {
            format!("@{}:{}", username.trim_start_matches('@'), server_name)
        }
    }
}

fn user_path(user_id: &str) -> [&str; 5] {
    ["_synapse", "admin", "v2", "users", user_id]
}

impl AdminClient {
    pub async fn user_details(&self, session: &Session, user_id: &str) -> AdminResult<User> {
        self.request_as(session, Method::GET, &user_path(user_id), None)
            .await
    }

    /// Create an account, or update it if it already exists
    pub async fn create_user(&self, session: &Session, user: &NewUser) -> AdminResult<User> {
        let body = serde_json::to_value(user).map_err(|e| AdminError::InvalidResponse(e.to_string()))?;
        let value = self
            .request(session, Method::PUT, &user_path(&user.user_id), &[], Some(&body))
            .await?;

        tracing::info!(user_id = %user.user_id, admin = user.admin, "User created");
        serde_json::from_value(value).map_err(|e| AdminError::InvalidResponse(e.to_string()))
    }

    /// Deactivate an account, optionally erasing its data
    ///
    /// Returns the identity-server unbind result reported by the server.
    pub async fn deactivate_user(
        &self,
        session: &Session,
        user_id: &str,
        erase: bool,
    ) -> AdminResult<Option<String>> {
        let body = json!({ "erase": erase });
        let response = self
            .request(
                session,
                Method::POST,
                &["_synapse", "admin", "v1", "deactivate", user_id],
                &[],
                Some(&body),
            )
            .await?;

        tracing::info!(user_id, erase, "User deactivated");
        Ok(response
            .get("id_server_unbind_result")
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}
