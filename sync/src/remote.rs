//! Client for the remote REST store.
//!
//! Routes:
//!
//! - `GET    /api/{kind}`
//! - `GET    /api/{kind}/{parent}/{parentId}`
//! - `GET    /api/{kind}/{id}`
//! - `POST   /api/{kind}`
//! - `PUT    /api/{kind}/{id}`
//! - `DELETE /api/{kind}/{id}`
//! - `GET    /health`
//!
//! Bodies are the camelCase entity JSON. Failures are split into transport
//! problems (retry later) and explicit rejections (the server said no).

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use groundbook_engine::{Entity, EntityKind};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode, Url};
use serde_json::Value;

/// Why a transport attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Timeout,
    Connect,
    Other,
}

/// Errors from talking to the remote store.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Transport error ({kind:?}): {message}")]
    Transport { kind: TransportKind, message: String },

    #[error("Remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The server answered with a success status but its body could not be
    /// read.
    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("Could not encode request body: {0}")]
    Encode(String),

    #[error("Invalid remote configuration: {0}")]
    Config(String),
}

impl RemoteError {
    /// Whether the request may succeed if retried once connectivity returns.
    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Transport { .. })
    }

    /// Whether the server accepted the request even though the call failed.
    pub fn was_accepted(&self) -> bool {
        matches!(self, RemoteError::Decode(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::Rejected { status: 404, .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return RemoteError::Decode(e.to_string());
        }
        let kind = if e.is_timeout() {
            TransportKind::Timeout
        } else if e.is_connect() {
            TransportKind::Connect
        } else {
            TransportKind::Other
        };
        RemoteError::Transport {
            kind,
            message: e.to_string(),
        }
    }
}

/// The remote store, one JSON collection per entity kind.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn list(&self, kind: EntityKind) -> Result<Vec<Value>, RemoteError>;

    /// Records of `kind` belonging to a parent, e.g. `bookings/user/{id}`.
    async fn list_by_parent(
        &self,
        kind: EntityKind,
        parent: &str,
        parent_id: &str,
    ) -> Result<Vec<Value>, RemoteError>;

    /// `None` when the record does not exist.
    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Value>, RemoteError>;

    /// Create a record; returns the stored copy.
    async fn create(&self, kind: EntityKind, body: &Value) -> Result<Value, RemoteError>;

    /// Replace a record; returns the stored copy.
    async fn update(&self, kind: EntityKind, id: &str, body: &Value) -> Result<Value, RemoteError>;

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<(), RemoteError>;
}

/// Typed view of one collection of a [`RemoteApi`].
pub struct Endpoint<'a, E> {
    api: &'a dyn RemoteApi,
    _kind: PhantomData<fn() -> E>,
}

impl<'a, E: Entity> Endpoint<'a, E> {
    pub fn new(api: &'a dyn RemoteApi) -> Self {
        Self {
            api,
            _kind: PhantomData,
        }
    }

    pub async fn list(&self) -> Result<Vec<E>, RemoteError> {
        self.api.list(E::KIND).await?.into_iter().map(from_value).collect()
    }

    pub async fn list_by_parent(&self, parent: &str, parent_id: &str) -> Result<Vec<E>, RemoteError> {
        self.api
            .list_by_parent(E::KIND, parent, parent_id)
            .await?
            .into_iter()
            .map(from_value)
            .collect()
    }

    pub async fn get(&self, id: &str) -> Result<Option<E>, RemoteError> {
        self.api.get(E::KIND, id).await?.map(from_value).transpose()
    }

    pub async fn create(&self, entity: &E) -> Result<E, RemoteError> {
        let body = to_value(entity)?;
        from_value(self.api.create(E::KIND, &body).await?)
    }

    pub async fn update(&self, entity: &E) -> Result<E, RemoteError> {
        let body = to_value(entity)?;
        from_value(self.api.update(E::KIND, entity.id(), &body).await?)
    }

    pub async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.api.delete(E::KIND, id).await
    }
}

fn to_value<E: Entity>(entity: &E) -> Result<Value, RemoteError> {
    serde_json::to_value(entity).map_err(|e| RemoteError::Encode(e.to_string()))
}

fn from_value<E: Entity>(value: Value) -> Result<E, RemoteError> {
    serde_json::from_value(value)
        .map_err(|e| RemoteError::Decode(format!("{} record: {e}", E::KIND)))
}

/// Connection settings for [`HttpRemote`].
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// [`RemoteApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    http: Client,
    base_url: Url,
}

impl HttpRemote {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| RemoteError::Config(format!("{}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::Config(format!(
                "{} cannot be used as a base URL",
                config.base_url
            )));
        }

        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| RemoteError::Config(format!("invalid token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Check that the remote store answers at all.
    pub async fn health(&self) -> Result<(), RemoteError> {
        let url = self.url(&["health"]);
        let resp = self.http.get(url).send().await?;
        check_status(resp).await?;
        Ok(())
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn collection_url(&self, kind: EntityKind, rest: &[&str]) -> Url {
        let mut segments = vec!["api", kind.as_str()];
        segments.extend_from_slice(rest);
        self.url(&segments)
    }
}

/// Map non-success statuses to [`RemoteError::Rejected`], using the body as
/// the message when there is one.
async fn check_status(resp: Response) -> Result<Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("unknown").to_string()
            } else {
                body
            }
        });
    Err(RemoteError::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// Read a JSON body, falling back to `sent` when the server answers with an
/// empty body.
async fn json_or(resp: Response, sent: &Value) -> Result<Value, RemoteError> {
    let bytes = resp.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(sent.clone());
    }
    serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))
}

async fn json_list(resp: Response) -> Result<Vec<Value>, RemoteError> {
    let value: Value = resp.json().await?;
    match value {
        Value::Array(items) => Ok(items),
        other => Err(RemoteError::Decode(format!("expected a JSON array, got {other}"))),
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn list(&self, kind: EntityKind) -> Result<Vec<Value>, RemoteError> {
        let resp = self.http.get(self.collection_url(kind, &[])).send().await?;
        json_list(check_status(resp).await?).await
    }

    async fn list_by_parent(
        &self,
        kind: EntityKind,
        parent: &str,
        parent_id: &str,
    ) -> Result<Vec<Value>, RemoteError> {
        let url = self.collection_url(kind, &[parent, parent_id]);
        let resp = self.http.get(url).send().await?;
        json_list(check_status(resp).await?).await
    }

    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Value>, RemoteError> {
        let resp = self.http.get(self.collection_url(kind, &[id])).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = check_status(resp).await?;
        Ok(Some(resp.json().await?))
    }

    async fn create(&self, kind: EntityKind, body: &Value) -> Result<Value, RemoteError> {
        let resp = self
            .http
            .post(self.collection_url(kind, &[]))
            .json(body)
            .send()
            .await?;
        json_or(check_status(resp).await?, body).await
    }

    async fn update(&self, kind: EntityKind, id: &str, body: &Value) -> Result<Value, RemoteError> {
        let resp = self
            .http
            .put(self.collection_url(kind, &[id]))
            .json(body)
            .send()
            .await?;
        json_or(check_status(resp).await?, body).await
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<(), RemoteError> {
        let resp = self.http.delete(self.collection_url(kind, &[id])).send().await?;
        check_status(resp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(base: &str) -> HttpRemote {
        HttpRemote::new(&RemoteConfig::new(base)).unwrap()
    }

    #[test]
    fn urls_are_built_per_segment() {
        let r = remote("http://localhost:8080");
        assert_eq!(
            r.collection_url(EntityKind::Venue, &[]).as_str(),
            "http://localhost:8080/api/grounds"
        );
        assert_eq!(
            r.collection_url(EntityKind::Booking, &["user", "u 1"]).as_str(),
            "http://localhost:8080/api/bookings/user/u%201"
        );
    }

    #[test]
    fn base_path_is_kept() {
        let r = remote("http://localhost:8080/v2/");
        assert_eq!(
            r.collection_url(EntityKind::Favorite, &["u_v"]).as_str(),
            "http://localhost:8080/v2/api/favorites/u_v"
        );
        assert_eq!(r.url(&["health"]).as_str(), "http://localhost:8080/v2/health");
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let err = HttpRemote::new(&RemoteConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, RemoteError::Config(_)));
        assert!(!err.is_transport());
    }

    #[test]
    fn error_classification() {
        let rejected = RemoteError::Rejected {
            status: 404,
            message: "gone".into(),
        };
        assert!(rejected.is_not_found());
        assert_eq!(rejected.status(), Some(404));

        let transport = RemoteError::Transport {
            kind: TransportKind::Timeout,
            message: "timed out".into(),
        };
        assert!(transport.is_transport());
        assert_eq!(transport.status(), None);
    }
}
