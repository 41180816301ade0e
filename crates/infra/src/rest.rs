use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::config::AppConfig;

const API_KEY_HEADER: &str = "apikey";
const PREFER_HEADER: &str = "prefer";
const RETURN_MINIMAL: &str = "return=minimal";

#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("rest client configuration error: {0}")]
    Configuration(String),
    #[error("rest transport error: {0}")]
    Transport(String),
    #[error("rest request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("rest response decode error: {0}")]
    Decode(String),
}

impl RestError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status == StatusCode::CONFLICT)
    }
}

/// Authenticated client for the PostgREST-style backing store. Row reads are
/// filter-predicate query strings over named collections; RPCs are POSTs to
/// `rpc/<fn>`.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
}

impl RestClient {
    pub fn new(config: &AppConfig) -> Result<Self, RestError> {
        if config.store_base_url.trim().is_empty() {
            return Err(RestError::Configuration("store_base_url is empty".into()));
        }

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.store_service_key)
            .map_err(|err| RestError::Configuration(format!("invalid service key: {err}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.store_service_key))
            .map_err(|err| RestError::Configuration(format!("invalid service key: {err}")))?;
        headers.insert(API_KEY_HEADER, key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.store_timeout_ms))
            .build()
            .map_err(|err| RestError::Configuration(err.to_string()))?;

        Ok(Self {
            http,
            base_url: config.store_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn select(&self, path_and_query: &str) -> Result<Value, RestError> {
        let response = self
            .send(Method::GET, path_and_query, None, false)
            .await?;
        response
            .json()
            .await
            .map_err(|err| RestError::Decode(err.to_string()))
    }

    pub async fn insert(&self, table: &str, body: &Value) -> Result<(), RestError> {
        self.send(Method::POST, table, Some(body), true).await?;
        Ok(())
    }

    /// Insert-or-update keyed on `on_conflict` columns.
    pub async fn upsert(&self, table: &str, on_conflict: &str, body: &Value) -> Result<(), RestError> {
        let path = format!("{table}?on_conflict={on_conflict}");
        let response = self
            .http
            .post(self.table_url(&path))
            .header(PREFER_HEADER, "resolution=merge-duplicates,return=minimal")
            .json(body)
            .send()
            .await
            .map_err(|err| RestError::Transport(err.to_string()))?;
        Self::check_status(response).await?;
        Ok(())
    }

    pub async fn update(&self, path_and_query: &str, body: &Value) -> Result<(), RestError> {
        self.send(Method::PATCH, path_and_query, Some(body), true)
            .await?;
        Ok(())
    }

    pub async fn rpc(&self, function: &str, body: &Value) -> Result<Value, RestError> {
        let path = format!("rpc/{function}");
        let response = self.send(Method::POST, &path, Some(body), false).await?;
        response
            .json()
            .await
            .map_err(|err| RestError::Decode(err.to_string()))
    }

    async fn send(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<&Value>,
        minimal: bool,
    ) -> Result<reqwest::Response, RestError> {
        let mut request = self.http.request(method, self.table_url(path_and_query));
        if minimal {
            request = request.header(PREFER_HEADER, RETURN_MINIMAL);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|err| RestError::Transport(err.to_string()))?;
        Self::check_status(response).await
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RestError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status = %status, body, "store request rejected");
        Err(RestError::Status { status, body })
    }

    fn table_url(&self, path_and_query: &str) -> String {
        format!("{}/rest/v1/{path_and_query}", self.base_url)
    }
}
