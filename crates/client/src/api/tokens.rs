//! Registration token operations

use std::path::Path;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use reqwest::Method;
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use hsadmin_shared::{format_millis, AdminError, AdminResult, RegistrationToken};

use crate::client::{AdminClient, Session};

/// Random bytes per generated token
const TOKEN_BYTES: usize = 32;

/// Registration token to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewToken {
    pub token: String,
    pub uses_allowed: Option<u32>,
    /// Milliseconds since the epoch
    pub expiry_time: Option<i64>,
}

impl NewToken {
    /// A freshly generated token
    pub fn generate(uses_allowed: Option<u32>, expiry_days: Option<u32>, now: OffsetDateTime) -> Self {
        let expiry_time = expiry_days.map(|days| {
            let at = now + Duration::days(i64::from(days));
            (at.unix_timestamp_nanos() / 1_000_000) as i64
        });
        Self {
            token: generate_token(),
            uses_allowed,
            expiry_time,
        }
    }
}

/// 32 random bytes, URL-safe base64 without padding
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Which existing tokens an export includes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFilter {
    All,
    /// Not expired and with uses left
    Active,
    /// Never used, not even pending
    Unused,
}

impl TokenFilter {
    pub fn matches(self, token: &RegistrationToken, now: OffsetDateTime) -> bool {
        match self {
            TokenFilter::All => true,
            TokenFilter::Active => {
                !token.is_expired_at(now) && token.remaining_uses().map_or(true, |left| left > 0)
            }
            TokenFilter::Unused => token.completed == 0 && token.pending == 0,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            TokenFilter::All => "all tokens",
            TokenFilter::Active => "active tokens only",
            TokenFilter::Unused => "unused tokens only",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown token filter '{0}' (expected all, active or unused)")]
pub struct UnknownTokenFilter(String);

impl FromStr for TokenFilter {
    type Err = UnknownTokenFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "1" => Ok(TokenFilter::All),
            "active" | "2" => Ok(TokenFilter::Active),
            "unused" | "3" => Ok(TokenFilter::Unused),
            other => Err(UnknownTokenFilter(other.to_string())),
        }
    }
}

/// Write `tokens` to `path` for hand-off to new users
///
/// `contents` says which tokens the file holds, e.g. `active tokens only`.
pub fn write_token_file(
    path: &Path,
    server: &str,
    tokens: &[RegistrationToken],
    contents: &str,
    generated_at: OffsetDateTime,
) -> std::io::Result<()> {
    let rule = "=".repeat(50);
    let generated = format_millis((generated_at.unix_timestamp_nanos() / 1_000_000) as i64)
        .unwrap_or_default();

    let mut out = format!(
        "Registration Tokens\n{rule}\nGenerated: {generated}\nServer: {server}\n\
         Contents: {contents}\nTotal tokens: {total}\n\n",
        total = tokens.len(),
    );
    for (i, token) in tokens.iter().enumerate() {
        let uses = token
            .uses_allowed
            .map_or_else(|| "unlimited".to_string(), |n| n.to_string());
        let expiry = token
            .expiry_time
            .and_then(format_millis)
            .unwrap_or_else(|| "never".to_string());
        out.push_str(&format!(
            "Token {}: {}  (uses: {}, expires: {})\n",
            i + 1,
            token.token,
            uses,
            expiry
        ));
    }
    out.push_str(&format!("\n{rule}\n"));
    out.push_str("Anyone holding one of these tokens can register an account.\n");
    out.push_str("Delete unused tokens when they are no longer needed.\n");

    std::fs::write(path, out)
}

fn token_path(token: &str) -> [&str; 5] {
    ["_synapse", "admin", "v1", "registration_tokens", token]
}

impl AdminClient {
    pub async fn create_registration_token(
        &self,
        session: &Session,
        new_token: &NewToken,
    ) -> AdminResult<RegistrationToken> {
        let body = serde_json::to_value(new_token).map_err(|e| AdminError::InvalidResponse(e.to_string()))?;
        let token: RegistrationToken = self
            .request(session, Method::POST, &token_path("new"), &[], Some(&body))
            .await
            .and_then(|v| {
                serde_json::from_value(v).map_err(|e| AdminError::InvalidResponse(e.to_string()))
            })?;

        tracing::info!(token = %token.masked(), uses_allowed = ?token.uses_allowed, "Registration token created");
        Ok(token)
    }

    pub async fn delete_registration_token(&self, session: &Session, token: &str) -> AdminResult<()> {
        self.request(session, Method::DELETE, &token_path(token), &[], None)
            .await?;
        Ok(())
    }
}
