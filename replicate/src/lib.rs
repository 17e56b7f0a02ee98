//! Minimal Replicate predictions API client.
//!
//! This crate provides a focused client for Replicate's asynchronous
//! predictions API:
//! - Prediction creation against a named model
//! - Status queries by prediction id
//! - A fixed-interval wait loop with a wall-clock ceiling

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use thiserror::Error;

const API_BASE: &str = "https://api.replicate.com/v1";
const DEFAULT_MODEL: &str = "ibm-granite/granite-3.3-8b-instruct";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(600);

/// Errors that can occur when using the Replicate client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API token not configured")]
    NoApiToken,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Prediction failed: {0}")]
    Failed(String),

    #[error("Prediction did not complete before the wait ceiling")]
    Timeout,
}

/// Replicate API client.
#[derive(Clone)]
pub struct Replicate {
    client: reqwest::Client,
    token: String,
    model: String,
    base_url: String,
    poll_interval: Duration,
    max_wait: Duration,
}

impl Replicate {
    /// Create a new Replicate client with the given API token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .connect_timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            token: token.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: API_BASE.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }

    /// Create a Replicate client from the REPLICATE_API_TOKEN environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let token = std::env::var("REPLICATE_API_TOKEN").map_err(|_| Error::NoApiToken)?;
        Ok(Self::new(token))
    }

    /// Set the model predictions are created against.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the interval between status queries while waiting.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the wall-clock ceiling on a single wait.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Create a prediction and return it immediately, without waiting.
    ///
    /// This call is never retried: any failure here propagates to the
    /// caller as a submission failure.
    pub async fn create_prediction(&self, input: &GenerationInput) -> Result<Prediction, Error> {
        let url = format!("{}/models/{}/predictions", self.base_url, self.model);
        let headers = self.build_headers()?;

        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(&CreateRequest { input })
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))
    }

    /// Query the current state of a prediction by id.
    pub async fn get_prediction(&self, id: &str) -> Result<Prediction, Error> {
        let url = format!("{}/predictions/{}", self.base_url, id);
        let headers = self.build_headers()?;

        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))
    }

    /// Poll a prediction until it reaches a terminal status.
    ///
    /// Queries on a fixed interval (no backoff, no jitter) until the
    /// prediction succeeds, fails, or the wall-clock ceiling is exceeded.
    /// Unrecognized statuses are treated as still pending. The loop is a
    /// plain awaited future: dropping it abandons the wait cleanly.
    pub async fn wait_for_completion(&self, id: &str) -> Result<Prediction, Error> {
        let started = Instant::now();
        loop {
            let prediction = self.get_prediction(id).await?;
            match prediction.status.as_str() {
                "succeeded" => return Ok(prediction),
                "failed" | "canceled" => {
                    return Err(Error::Failed(
                        prediction
                            .error
                            .unwrap_or_else(|| format!("prediction ended as {}", prediction.status)),
                    ))
                }
                other => log::debug!("prediction {id} still {other}"),
            }
            if started.elapsed() >= self.max_wait {
                log::warn!("prediction {id} exceeded the {:?} wait ceiling", self.max_wait);
                return Err(Error::Timeout);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Create a prediction, wait for it, and return its joined output text.
    pub async fn run(&self, input: &GenerationInput) -> Result<String, Error> {
        let prediction = self.create_prediction(input).await?;
        let finished = self.wait_for_completion(&prediction.id).await?;
        Ok(finished.output_text())
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Token {}", self.token))
                .map_err(|e| Error::Config(format!("Invalid API token: {e}")))?,
        );
        Ok(headers)
    }
}

// ============================================================================
// Public types
// ============================================================================

/// Input parameters for a text-generation prediction.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationInput {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

/// A prediction as reported by the API.
///
/// `status` is kept as the raw wire string: the API grows statuses over
/// time and anything unrecognized counts as still pending.
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub output: Option<Vec<String>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Prediction {
    /// Join the output fragments in order and trim surrounding whitespace.
    pub fn output_text(&self) -> String {
        self.output
            .as_deref()
            .unwrap_or_default()
            .concat()
            .trim()
            .to_string()
    }
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
struct CreateRequest<'a> {
    input: &'a GenerationInput,
}
