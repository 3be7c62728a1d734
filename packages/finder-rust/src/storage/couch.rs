//! HTTP [`ViewStore`] for CouchDB-compatible servers.

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use viewfind_core::{StoreError, ViewPath, ViewQuery, ViewResult};

use crate::config::StoreConfig;
use crate::traits::ViewStore;

/// Parameters whose values the server expects JSON-encoded.
const JSON_PARAMS: [&str; 4] = ["key", "keys", "startkey", "endkey"];

#[derive(Debug, Deserialize)]
struct SaveResponse {
    rev: String,
}

fn transport(error: reqwest::Error) -> StoreError {
    StoreError::Transport(anyhow::Error::from(error))
}

/// Client for one database on a CouchDB-compatible server.
#[derive(Debug, Clone)]
pub struct CouchClient {
    client: Client,
    database: Url,
    config: StoreConfig,
}

impl CouchClient {
    /// Builds a client for `config.database` on `config.url`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Transport`] for an unparseable URL or when the HTTP
    /// client cannot be built.
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        let database = Url::parse(&config.database_url())
            .map_err(|e| StoreError::Transport(anyhow!("invalid store url {}: {e}", config.url)))?;
        if database.cannot_be_a_base() {
            return Err(StoreError::Transport(anyhow!(
                "store url {} cannot carry a path",
                config.url
            )));
        }
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            database,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn url_with(&self, segments: &[&str]) -> Url {
        let mut url = self.database.clone();
        // Checked in `new`.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// URL of a document. Design document ids keep their `_design/` prefix
    /// as a path segment; the rest of the id is percent-encoded.
    #[must_use]
    pub fn document_url(&self, id: &str) -> Url {
        match id.strip_prefix("_design/") {
            Some(name) => self.url_with(&["_design", name]),
            None => self.url_with(&[id]),
        }
    }

    /// URL of a view.
    #[must_use]
    pub fn view_url(&self, path: &ViewPath) -> Url {
        self.url_with(&["_design", &path.design, "_view", &path.view])
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.config.username {
            Some(user) => builder.basic_auth(user, self.config.password.as_deref()),
            None => builder,
        }
    }

    async fn check(response: Response, resource: &str) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => Err(StoreError::not_found(with_reason(resource, &body))),
            StatusCode::CONFLICT => Err(StoreError::conflict(resource)),
            _ => Err(StoreError::Transport(anyhow!(
                "{resource}: unexpected status {status}: {body}"
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// `resource` annotated with the server's `reason` (`missing_named_view`,
/// `Database does not exist.`, ...) when the body carries one.
#[must_use]
pub fn with_reason(resource: &str, body: &str) -> String {
    let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) else {
        return resource.to_string();
    };
    match (parsed.error, parsed.reason) {
        (_, Some(reason)) => format!("{resource} ({reason})"),
        (Some(error), None) => format!("{resource} ({error})"),
        (None, None) => resource.to_string(),
    }
}

/// Query-string pairs for `query`. Key parameters are JSON-encoded, string
/// options are passed as-is, everything else as JSON text. `keys` is left
/// out; it travels in the request body.
#[must_use]
pub fn query_pairs(query: &ViewQuery) -> Vec<(String, String)> {
    query
        .to_params()
        .into_iter()
        .filter(|(name, _)| name != "keys")
        .map(|(name, value)| {
            let encoded = match value {
                Value::String(text) if !JSON_PARAMS.contains(&name.as_str()) => text,
                other => other.to_string(),
            };
            (name, encoded)
        })
        .collect()
}

/// POST body carrying the query's `keys` parameter, compiled or caller
/// supplied. `None` when the query has no `keys`.
#[must_use]
pub fn keys_body(query: &ViewQuery) -> Option<Value> {
    query
        .to_params()
        .remove("keys")
        .map(|keys| json!({ "keys": keys }))
}

#[async_trait]
impl ViewStore for CouchClient {
    async fn query_view(
        &self,
        path: &ViewPath,
        query: &ViewQuery,
    ) -> Result<ViewResult, StoreError> {
        let url = self.view_url(path);
        let pairs = query_pairs(query);
        let request = match keys_body(query) {
            Some(body) => self.request(Method::POST, url).query(&pairs).json(&body),
            None => self.request(Method::GET, url).query(&pairs),
        };
        let response = request.send().await.map_err(transport)?;
        let response = Self::check(response, &path.to_string()).await?;
        response.json::<ViewResult>().await.map_err(transport)
    }

    async fn get_document(&self, id: &str) -> Result<Value, StoreError> {
        let response = self
            .request(Method::GET, self.document_url(id))
            .send()
            .await
            .map_err(transport)?;
        let response = Self::check(response, id).await?;
        response.json::<Value>().await.map_err(transport)
    }

    async fn save_document(&self, document: &Value) -> Result<String, StoreError> {
        let request = match document.get("_id").and_then(Value::as_str) {
            Some(id) => self.request(Method::PUT, self.document_url(id)),
            None => self.request(Method::POST, self.database.clone()),
        };
        let resource = document
            .get("_id")
            .and_then(Value::as_str)
            .unwrap_or(self.config.database.as_str())
            .to_string();
        let response = request.json(document).send().await.map_err(transport)?;
        let response = Self::check(response, &resource).await?;
        let saved: SaveResponse = response.json().await.map_err(transport)?;
        tracing::trace!(id = %resource, rev = %saved.rev, "document saved");
        Ok(saved.rev)
    }
}
