//! Admin API Client
//!
//! Authenticated access to the homeserver admin API. The client holds no
//! credentials of its own: every call takes the [`Session`] returned by
//! [`AdminClient::authenticate`].

use std::time::Duration;

use futures::stream::{self, Stream, TryStreamExt};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use hsadmin_shared::{cursor_value, AdminError, AdminResult, Resource, WhoAmI};

use crate::config::Config;
use crate::listing::{self, Filter, Sort};

/// Maximum number of retry attempts for transient failures
const MAX_RETRIES: usize = 1;

/// Maximum backoff duration for retries (5 seconds)
const RETRY_MAX_DELAY: Duration = Duration::from_secs(5);

/// Longest slice of a response body quoted in error messages
const BODY_SNIPPET_LEN: usize = 200;

/// An authenticated session against one homeserver
#[derive(Debug, Clone)]
pub struct Session {
    base_url: Url,
    token: String,
    user_id: String,
}

impl Session {
    #[cfg(test)]
    pub(crate) fn new(base_url: Url, token: &str, user_id: &str) -> Self {
        Self {
            base_url,
            token: token.to_string(),
            user_id: user_id.to_string(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Identity the token belongs to
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Server name part of the identity, e.g. `example.org`
    pub fn server_name(&self) -> Option<&str> {
        self.user_id.split_once(':').map(|(_, server)| server)
    }
}

/// Tunables for [`AdminClient`]
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub request_timeout: Duration,
    pub retry_delay: Duration,
    /// Items requested per server page
    pub fetch_limit: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            retry_delay: Duration::from_millis(500),
            fetch_limit: 100,
        }
    }
}

impl From<&Config> for ClientOptions {
    fn from(config: &Config) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            retry_delay: config.retry_delay(),
            fetch_limit: config.fetch_limit,
        }
    }
}

/// Error object returned by the server on non-2xx responses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    errcode: Option<String>,
    error: Option<String>,
}

/// One page of a collection listing
#[derive(Debug)]
pub struct Page<R> {
    pub items: Vec<R>,
    pub next: Option<String>,
    pub total: Option<u64>,
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Client for the homeserver admin API
#[derive(Clone)]
pub struct AdminClient {
    http_client: Client,
    retry_delay: Duration,
    fetch_limit: u32,
}

impl AdminClient {
    /// Create a new admin client
    pub fn new(options: ClientOptions) -> AdminResult<Self> {
        let http_client = Client::builder()
            .timeout(options.request_timeout)
            .user_agent(concat!("hsadmin/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AdminError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            retry_delay: options.retry_delay,
            fetch_limit: options.fetch_limit.max(1),
        })
    }

    pub fn from_config(config: &Config) -> AdminResult<Self> {
        Self::new(ClientOptions::from(config))
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Validate `token` against the "who am I" endpoint
    ///
    /// Any non-2xx answer, or a 2xx answer without `user_id`, is an
    /// [`AdminError::Auth`].
    pub async fn authenticate(&self, base_url: &Url, token: &str) -> AdminResult<Session> {
        let url = build_url(base_url, &["_matrix", "client", "v3", "account", "whoami"], &[])?;

        let value = self
            .send_with_retry(token, Method::GET, &url, None)
            .await
            .map_err(|e| match e {
                AdminError::Network(_) | AdminError::Auth(_) => e,
                other => AdminError::Auth(other.to_string()),
            })?;

        let whoami: WhoAmI = serde_json::from_value(value)
            .map_err(|e| AdminError::Auth(format!("Unexpected whoami response: {}", e)))?;
        let user_id = whoami
            .user_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AdminError::Auth("whoami response has no user_id".to_string()))?;

        tracing::info!(user_id = %user_id, server = %base_url, "Authenticated");

        Ok(Session {
            base_url: base_url.clone(),
            token: token.to_string(),
            user_id,
        })
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Send a request to `segments` (each percent-encoded) and return the JSON body
    pub async fn request(
        &self,
        session: &Session,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> AdminResult<Value> {
        let url = build_url(&session.base_url, segments, query)?;
        self.send_with_retry(&session.token, method, &url, body).await
    }

    /// Typed variant of [`AdminClient::request`]
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        session: &Session,
        method: Method,
        segments: &[&str],
        body: Option<&Value>,
    ) -> AdminResult<T> {
        let value = self.request(session, method, segments, &[], body).await?;
        serde_json::from_value(value).map_err(|e| AdminError::InvalidResponse(e.to_string()))
    }

    /// Send request with retry on transient errors
    ///
    /// Only network failures are retried, exactly once after a jittered
    /// backoff. Server answers (including errors) are never retried.
    async fn send_with_retry(
        &self,
        token: &str,
        method: Method,
        url: &Url,
        body: Option<&Value>,
    ) -> AdminResult<Value> {
        use tokio_retry::strategy::{jitter, ExponentialBackoff};
        use tokio_retry::Retry;

        let base_ms = (self.retry_delay.as_millis() as u64).max(1);
        let retry_strategy = ExponentialBackoff::from_millis(base_ms)
            .max_delay(RETRY_MAX_DELAY)
            .take(MAX_RETRIES)
            .map(jitter);

        Retry::spawn(retry_strategy, || async {
            let result = self.send_once(token, method.clone(), url, body).await;

            match &result {
                Ok(_) => Ok(result),
                Err(e) if e.is_transient() => {
                    tracing::debug!(
                        method = %method,
                        path = url.path(),
                        error = %e,
                        "Transient error - will retry"
                    );
                    Err(result) // Return error to trigger retry
                }
                Err(_) => Ok(result), // Permanent error, stop retrying
            }
        })
        .await
        .unwrap_or_else(|e| e) // Extract the inner result
    }

    async fn send_once(
        &self,
        token: &str,
        method: Method,
        url: &Url,
        body: Option<&Value>,
    ) -> AdminResult<Value> {
        tracing::debug!(method = %method, path = url.path(), "Admin API request");

        let mut req_builder = self
            .http_client
            .request(method, url.clone())
            .bearer_auth(token)
            .header("Accept", "application/json");
        if let Some(body) = body {
            req_builder = req_builder.json(body);
        }

        let response = req_builder
            .send()
            .await
            .map_err(|e| AdminError::Network(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AdminError::Network(e.to_string()))?;

        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(Value::Object(Default::default()));
            }
            return serde_json::from_str(&text).map_err(|e| {
                AdminError::InvalidResponse(format!("{}: {}", e, snippet(&text)))
            });
        }

        Err(error_from_response(status, url, text))
    }

    // =========================================================================
    // Collections
    // =========================================================================

    /// Fetch one page of a collection starting at `from`
    pub async fn fetch_page<R: Resource>(
        &self,
        session: &Session,
        from: Option<&str>,
    ) -> AdminResult<Page<R>> {
        let kind = R::KIND;
        let mut query: Vec<(&str, String)> = Vec::new();
        if kind.cursor_key().is_some() {
            query.push(("limit", self.fetch_limit.to_string()));
            if let Some(from) = from {
                query.push(("from", from.to_string()));
            }
        }
        for &(key, value) in kind.list_query() {
            query.push((key, value.to_string()));
        }

        let mut body = self
            .request(session, Method::GET, kind.collection_path(), &query, None)
            .await?;

        let items = match body.get_mut(kind.items_key()).map(Value::take) {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(serde_json::from_value::<R>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| AdminError::InvalidResponse(e.to_string()))?,
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                return Err(AdminError::InvalidResponse(format!(
                    "'{}' is not an array",
                    kind.items_key()
                )))
            }
        };
        let next = kind
            .cursor_key()
            .and_then(|key| body.get(key))
            .and_then(cursor_value);
        let total = kind
            .total_key()
            .and_then(|key| body.get(key))
            .and_then(Value::as_u64);

        Ok(Page { items, next, total })
    }

    /// Lazily walk a collection, following the server's pagination cursor
    ///
    /// Each call starts again from the first page.
    pub fn list_stream<'a, R: Resource>(
        &'a self,
        session: &'a Session,
    ) -> impl Stream<Item = AdminResult<R>> + 'a {
        stream::try_unfold(Cursor::Start, move |cursor| async move {
            let from = match cursor {
                Cursor::Start => None,
                Cursor::Next(token) => Some(token),
                Cursor::Done => return Ok::<_, AdminError>(None),
            };
            let page = self.fetch_page::<R>(session, from.as_deref()).await?;

            // An empty page or a cursor that does not advance ends the walk
            let next = match page.next {
                Some(next) if !page.items.is_empty() && Some(&next) != from.as_ref() => {
                    Cursor::Next(next)
                }
                _ => Cursor::Done,
            };
            let items = stream::iter(page.items.into_iter().map(Ok::<R, AdminError>));
            Ok(Some((items, next)))
        })
        .try_flatten()
    }

    /// Fetch a whole collection
    pub async fn collect_all<R: Resource>(&self, session: &Session) -> AdminResult<Vec<R>> {
        self.list_stream::<R>(session).try_collect().await
    }

    /// Fetch a collection and apply client-side filtering and sorting
    pub async fn list<R: Resource>(
        &self,
        session: &Session,
        filter: Option<&Filter>,
        sort: Option<&Sort>,
    ) -> AdminResult<Vec<R>> {
        let items = self.collect_all::<R>(session).await?;
        let view = listing::apply(&items, filter, sort);
        Ok(view.into_iter().map(|i| items[i].clone()).collect())
    }

    // =========================================================================
    // Aliases
    // =========================================================================

    /// Map a room alias such as `#ops:example.org` to its room ID
    pub async fn resolve_alias(&self, session: &Session, alias: &str) -> AdminResult<String> {
        let value = self
            .request(
                session,
                Method::GET,
                &["_matrix", "client", "v3", "directory", "room", alias],
                &[],
                None,
            )
            .await
            .map_err(|e| match e {
                AdminError::NotFound(_) => AdminError::NotFound(format!("No room with alias {}", alias)),
                other => other,
            })?;

        value
            .get("room_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AdminError::NotFound(format!("No room with alias {}", alias)))
    }

    /// Accept either a room ID or an alias and return the room ID
    pub async fn resolve_room(&self, session: &Session, identifier: &str) -> AdminResult<String> {
        let identifier = identifier.trim();
        if identifier.starts_with('#') {
            self.resolve_alias(session, identifier).await
        } else if identifier.is_empty() {
            Err(AdminError::NotFound("empty room identifier".to_string()))
        } else {
            Ok(identifier.to_string())
        }
    }
}

/// Join percent-encoded path segments onto the homeserver base URL
fn build_url(base: &Url, segments: &[&str], query: &[(&str, String)]) -> AdminResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| AdminError::InvalidResponse(format!("{} cannot be a base URL", base)))?
        .pop_if_empty()
        .extend(segments);
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

fn error_from_response(status: StatusCode, url: &Url, body: String) -> AdminError {
    let parsed = serde_json::from_str::<ErrorBody>(&body).ok();
    let errcode = parsed.as_ref().and_then(|b| b.errcode.clone());
    let message = parsed
        .and_then(|b| b.error)
        .unwrap_or_else(|| snippet(&body).to_string());

    match status {
        StatusCode::UNAUTHORIZED => AdminError::Auth(format!(
            "{} ({})",
            message,
            errcode.as_deref().unwrap_or("HTTP 401")
        )),
        StatusCode::NOT_FOUND => AdminError::NotFound(if message.is_empty() {
            url.path().to_string()
        } else {
            message
        }),
        _ => AdminError::Remote {
            status: status.as_u16(),
            errcode,
            message,
            body,
        },
    }
}

fn snippet(text: &str) -> &str {
    match text.char_indices().nth(BODY_SNIPPET_LEN) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
