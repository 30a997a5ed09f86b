use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use std::fmt;
use tracing::{debug, warn};

use crate::config::{Config, ConfigError};
use crate::error::TransportError;
use crate::model::{EntryId, EntryPayload, EntryRecord};

/// The backend operations a row synchronizer depends on.
#[async_trait]
pub trait EntryApi: Send + Sync {
    /// `POST /entry`; resolves to the identifier assigned by the backend.
    async fn create(&self, entry: &EntryPayload) -> Result<EntryId, TransportError>;

    /// `PUT /entry/{id}`.
    async fn update(&self, id: &EntryId, entry: &EntryPayload) -> Result<(), TransportError>;

    /// `DELETE /entry/{id}`.
    async fn delete(&self, id: &EntryId) -> Result<(), TransportError>;

    /// `GET /entry`.
    async fn list(&self) -> Result<Vec<EntryRecord>, TransportError>;
}

#[derive(Clone)]
pub struct HttpEntryApi {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl fmt::Debug for HttpEntryApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpEntryApi")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpEntryApi {
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        let base_url = cfg.base_url()?;
        let http = Client::builder()
            .user_agent(cfg.backend.user_agent.clone())
            .build()
            .map_err(|_| ConfigError::Invalid("failed to build HTTP client"))?;
        Ok(Self::with_client(
            http,
            base_url,
            cfg.bearer_token().map(str::to_string),
        ))
    }

    pub fn with_client(http: Client, base_url: Url, token: Option<String>) -> Self {
        Self {
            http,
            base_url,
            token,
        }
    }

    /// `entry` beneath the base URL, plus the identifier as one escaped
    /// path segment.
    fn endpoint(&self, id: Option<&EntryId>) -> Result<Url, TransportError> {
        let mut url = self
            .base_url
            .join("entry")
            .map_err(|err| TransportError::Endpoint(err.to_string()))?;
        if let Some(id) = id {
            // `.` and `..` are dropped by the segment setter and would
            // address the collection itself.
            if matches!(id.as_str(), "" | "." | "..") {
                return Err(TransportError::Endpoint(format!(
                    "identifier {:?} cannot be used as a path segment",
                    id.as_str()
                )));
            }
            url.path_segments_mut()
                .map_err(|_| TransportError::Endpoint(format!("{} cannot be a base", self.base_url)))?
                .pop_if_empty()
                .push(id.as_str());
        }
        Ok(url)
    }

    pub fn build_request(
        &self,
        method: Method,
        id: Option<&EntryId>,
        body: Option<&EntryPayload>,
    ) -> Result<reqwest::Request, TransportError> {
        let mut builder = self.http.request(method, self.endpoint(id)?);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Ok(builder.build()?)
    }

    async fn execute(&self, request: reqwest::Request) -> Result<String, TransportError> {
        debug!(method=%request.method(), url=%request.url(), "sending entry request");
        let res = self.http.execute(request).await?;

        let status = res.status();
        let body = if status.is_success() {
            res.text().await?
        } else {
            res.text().await.unwrap_or_default()
        };
        check_status(status, body)
    }
}

/// Non-2xx responses become `TransportError::Status`; the body is kept
/// for logging.
pub fn check_status(status: StatusCode, body: String) -> Result<String, TransportError> {
    if !status.is_success() {
        warn!(%status, %body, "backend rejected entry request");
        return Err(TransportError::Status { status, body });
    }
    Ok(body)
}

/// Body of a successful `POST /entry`.
pub fn parse_created(body: String) -> Result<EntryId, TransportError> {
    EntryId::from_response_body(&body).ok_or(TransportError::MalformedIdentifier(body))
}

/// Body of a successful `GET /entry`. Records that do not decode are
/// logged and skipped so one bad row does not hide the rest.
pub fn decode_listing(body: &str) -> Result<Vec<EntryRecord>, TransportError> {
    let items: Vec<serde_json::Value> =
        serde_json::from_str(body).map_err(|err| TransportError::InvalidBody(err.to_string()))?;
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<EntryRecord>(item.clone()) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(%err, record = %item, "skipping unrecognised entry");
                None
            }
        })
        .collect())
}

#[async_trait]
impl EntryApi for HttpEntryApi {
    async fn create(&self, entry: &EntryPayload) -> Result<EntryId, TransportError> {
        let request = self.build_request(Method::POST, None, Some(entry))?;
        parse_created(self.execute(request).await?)
    }

    async fn update(&self, id: &EntryId, entry: &EntryPayload) -> Result<(), TransportError> {
        let request = self.build_request(Method::PUT, Some(id), Some(entry))?;
        self.execute(request).await.map(|_| ())
    }

    async fn delete(&self, id: &EntryId) -> Result<(), TransportError> {
        let request = self.build_request(Method::DELETE, Some(id), None)?;
        self.execute(request).await.map(|_| ())
    }

    async fn list(&self) -> Result<Vec<EntryRecord>, TransportError> {
        let request = self.build_request(Method::GET, None, None)?;
        decode_listing(&self.execute(request).await?)
    }
}
