//! REST client for the command-deck backend.
//!
//! The streaming chat socket has its own transport (see [`crate::transport`]);
//! this client covers the request/response endpoints: the agent memory feed
//! and the planner.

use std::env;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::observability;
use crate::types::{MemoryHistoryResponse, MemoryRecord, Plan, PlanRequest};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const MEMORY_HISTORY_PATH: &str = "api/memory/history";
const PLAN_PATH: &str = "api/agent/plan";

/// Client for the command-deck backend's REST endpoints.
#[derive(Debug, Clone)]
pub struct Deck {
    client: ReqwestClient,
    base_url: String,
    timeout: Duration,
}

impl Deck {
    /// Create a new client against the default backend address.
    ///
    /// The base URL can be overridden with the AGENTDECK_BASE_URL
    /// environment variable.
    pub fn new() -> Result<Self> {
        Self::with_options(None, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(base_url: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let base_url = base_url
            .or_else(|| env::var("AGENTDECK_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = if base_url.ends_with('/') {
            base_url
        } else {
            format!("{base_url}/")
        };
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// Returns the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status = response.status();
        let status_code = status.as_u16();

        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|val| val.to_str().ok())
            .map(String::from);

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        // The backend reports errors as either {"detail": ...} or
        // {"error": ...}; fall back to the raw body otherwise.
        #[derive(Deserialize)]
        struct ErrorBody {
            detail: Option<String>,
            error: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        let error_message = serde_json::from_str::<ErrorBody>(&error_body)
            .ok()
            .and_then(|body| body.detail.or(body.error))
            .unwrap_or_else(|| error_body.clone());

        match status_code {
            400 => Error::bad_request(error_message, None),
            401 => Error::authentication(error_message),
            403 => Error::permission(error_message),
            404 => Error::not_found(error_message),
            408 => Error::timeout(error_message, None),
            429 => Error::rate_limit(error_message, retry_after),
            500 => Error::internal_server(error_message, request_id),
            502..=504 => Error::service_unavailable(error_message, retry_after),
            _ => Error::api(status_code, None, error_message, request_id),
        }
    }

    fn map_request_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {}", e),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
        }
    }

    /// Fetch the agent's memory history.
    pub async fn memory_history(&self) -> Result<Vec<MemoryRecord>> {
        let url = format!("{}{}", self.base_url, MEMORY_HISTORY_PATH);

        observability::REST_REQUESTS.click();
        let response = self
            .client
            .get(&url)
            .headers(self.default_headers())
            .send()
            .await
            .map_err(|e| {
                observability::REST_REQUEST_ERRORS.click();
                self.map_request_error(e)
            })?;

        if !response.status().is_success() {
            observability::REST_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }

        let history = response
            .json::<MemoryHistoryResponse>()
            .await
            .map_err(|e| {
                Error::serialization(
                    format!("Failed to parse memory history: {}", e),
                    Some(Box::new(e)),
                )
            })?;
        Ok(history.into_records())
    }

    /// Ask the backend to generate an execution plan for a goal.
    ///
    /// Plan steps come back `Pending`; driving them is a separate per-step
    /// execution RPC that the backend does not expose yet.
    pub async fn create_plan(&self, goal: &str) -> Result<Plan> {
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(Error::validation(
                "goal must not be empty",
                Some("goal".to_string()),
            ));
        }
        let url = format!("{}{}", self.base_url, PLAN_PATH);

        observability::REST_REQUESTS.click();
        let response = self
            .client
            .post(&url)
            .headers(self.default_headers())
            .json(&PlanRequest::new(goal))
            .send()
            .await
            .map_err(|e| {
                observability::REST_REQUEST_ERRORS.click();
                self.map_request_error(e)
            })?;

        if !response.status().is_success() {
            observability::REST_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }

        response.json::<Plan>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse plan: {}", e),
                Some(Box::new(e)),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = Deck::with_options(None, None).unwrap();
        assert_eq!(client.timeout, DEFAULT_TIMEOUT);

        let client = Deck::with_options(
            Some("http://deck.example.com:8000".to_string()),
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(client.base_url, "http://deck.example.com:8000/");
        assert_eq!(client.timeout, Duration::from_secs(5));
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = Deck::with_options(Some("http://10.0.0.5:8000".to_string()), None).unwrap();
        assert_eq!(client.base_url(), "http://10.0.0.5:8000/");
    }

    #[tokio::test]
    async fn blank_goal_rejected_without_request() {
        let client = Deck::with_options(Some("http://127.0.0.1:1".to_string()), None).unwrap();
        let err = client.create_plan("   ").await.unwrap_err();
        assert!(err.is_validation());
    }
}
