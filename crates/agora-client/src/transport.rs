//! Transport guard.
//!
//! Every request to the game server goes through [`Transport`], which
//! classifies the HTTP status uniformly: 401 invalidates the shared auth
//! state before the error surfaces, 404 extracts the server's `detail`
//! message, and any other non-2xx becomes [`ClientError::RequestFailed`].
//! Session credentials ride in the HTTP client's cookie store. This layer
//! does network I/O only; beyond the 401 invalidation it never touches
//! session state.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use reqwest::{Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use agora_protocol::UserInfo;

use crate::error::{ClientError, ClientResult};

/// Locally cached authentication state, shared between the transport guard
/// and the client façade.
#[derive(Debug, Default)]
pub struct AuthState {
    /// Identifier of the active game session, if any.
    pub session_id: Option<String>,
    /// The authenticated user, when known.
    pub user: Option<UserInfo>,
}

/// Shared handle to [`AuthState`].
pub type SharedAuth = Arc<RwLock<AuthState>>;

/// Fallback detail when a 404 body carries none.
const UNKNOWN_SESSION_DETAIL: &str = "unknown session";

/// HTTP wrapper around the game server.
pub struct Transport {
    base_url: String,
    http: reqwest::Client,
    auth: SharedAuth,
}

impl Transport {
    /// Build a transport for `base_url` with a cookie store for the session
    /// credential. `connect_timeout` bounds connection establishment only;
    /// streaming reads are deliberately unbounded.
    pub fn new(base_url: &str, connect_timeout: Duration, auth: SharedAuth) -> ClientResult<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .map_err(|e| ClientError::InvalidBaseUrl(format!("{base_url}: {e}")))?;

        let http = reqwest::Client::builder()
            .cookie_store(true)
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            base_url,
            http,
            auth,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET returning the parsed JSON body. No schema validation here;
    /// callers deserialize into protocol types.
    pub async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> ClientResult<Value> {
        let res = self
            .http
            .get(self.url(path))
            .query(query)
            .send()
            .await?;
        let res = self.guard(res, false).await?;
        Ok(res.json().await?)
    }

    /// POST a JSON body, returning the parsed JSON response.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> ClientResult<Value> {
        let res = self.http.post(self.url(path)).json(body).send().await?;
        let res = self.guard(res, true).await?;
        Ok(res.json().await?)
    }

    /// POST a JSON body requesting a streamed `text/event-stream` response.
    /// The raw response is handed back for the caller to drain.
    pub async fn post_stream<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> ClientResult<Response> {
        let res = self
            .http
            .post(self.url(path))
            .header("Accept", "text/event-stream")
            .json(body)
            .send()
            .await?;
        self.guard(res, true).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Classify a response status. 2xx passes through; everything else maps
    /// onto the error taxonomy, with the 401 invalidation side effect applied
    /// before the error is returned.
    async fn guard(&self, res: Response, json_detail: bool) -> ClientResult<Response> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }

        match status {
            StatusCode::UNAUTHORIZED => {
                self.invalidate().await;
                Err(ClientError::SessionExpired)
            }
            StatusCode::NOT_FOUND => {
                let detail = json_detail_field(res)
                    .await
                    .unwrap_or_else(|| UNKNOWN_SESSION_DETAIL.to_string());
                Err(ClientError::SessionNotFound(detail))
            }
            _ => {
                let detail = if json_detail {
                    json_detail_field(res)
                        .await
                        .unwrap_or_else(|| format!("error {}", status.as_u16()))
                } else {
                    let body = res.text().await.unwrap_or_default();
                    if body.is_empty() {
                        format!("error {}", status.as_u16())
                    } else {
                        body
                    }
                };
                Err(ClientError::RequestFailed {
                    status: status.as_u16(),
                    detail,
                })
            }
        }
    }

    /// Clear the cached session identifier and user.
    async fn invalidate(&self) {
        let mut auth = self.auth.write().await;
        if auth.session_id.is_some() || auth.user.is_some() {
            warn!("session credentials rejected, clearing local auth state");
        }
        auth.session_id = None;
        auth.user = None;
    }
}

/// Best-effort extraction of the `detail` field from a JSON error body.
async fn json_detail_field(res: Response) -> Option<String> {
    let body = res.text().await.ok()?;
    let value: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            debug!("error body is not JSON: {e}");
            return None;
        }
    };
    value
        .get("detail")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unparseable_base_url() {
        let auth = SharedAuth::default();
        let result = Transport::new("not a url", Duration::from_secs(1), auth);
        assert!(matches!(result, Err(ClientError::InvalidBaseUrl(_))));
    }

    #[test]
    fn test_trailing_slash_is_normalized() {
        let auth = SharedAuth::default();
        let transport =
            Transport::new("http://localhost:8000/", Duration::from_secs(1), auth).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:8000");
        assert_eq!(transport.url("/game/status"), "http://localhost:8000/game/status");
    }
}
