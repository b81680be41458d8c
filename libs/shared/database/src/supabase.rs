use std::time::Duration;

use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Authentication error: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Database unreachable: {0}")]
    Unreachable(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid request header: {0}")]
    InvalidHeader(String),
}

impl DatabaseError {
    /// True when the storage backend could not be reached at all, as opposed to
    /// answering with an error.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, DatabaseError::Unreachable(_))
    }
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs.max(1)))
            .build()
            .unwrap_or_else(|e| {
                error!("Failed to build HTTP client with timeout, using defaults: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, DatabaseError> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.anon_key)
                .map_err(|e| DatabaseError::InvalidHeader(e.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| DatabaseError::InvalidHeader(e.to_string()))?,
            );
        }

        Ok(headers)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, DatabaseError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req
            .send()
            .await
            .map_err(|e| DatabaseError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .map_err(|e| DatabaseError::Unreachable(e.to_string()))?;
            error!("API error ({}): {}", status, error_text);
            return Err(classify_error(status, error_text));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| DatabaseError::Decode(e.to_string()))
    }

    /// Headers asking PostgREST to echo the affected rows back.
    pub fn return_representation() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn classify_error(status: StatusCode, body: String) -> DatabaseError {
    let pg_code = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("code").and_then(Value::as_str).map(str::to_string));

    if pg_code.as_deref() == Some(UNIQUE_VIOLATION) {
        return DatabaseError::UniqueViolation(body);
    }

    match status.as_u16() {
        409 => DatabaseError::UniqueViolation(body),
        401 | 403 => DatabaseError::Unauthorized(body),
        404 => DatabaseError::NotFound(body),
        502..=504 => DatabaseError::Unreachable(body),
        code => DatabaseError::Api { status: code, body },
    }
}
