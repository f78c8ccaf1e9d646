//! Road-condition scoring model client.
//!
//! The model runs behind an HTTP inference endpoint: POST the image
//! bytes, get the raw signal JSON back. The pipeline maps that raw
//! output into persisted metrics; this client never interprets it.

use async_trait::async_trait;
use kerb_core::road::{ModelInfo, RawScorerOutput};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::rate_limit::RateLimiter;

#[async_trait]
pub trait Scorer: Send + Sync {
    /// Identity of the model behind this scorer, stamped onto every
    /// analysis row it produces.
    fn model_info(&self) -> ModelInfo;

    /// Score one image. `Err(SourceError::Model)` means the model saw
    /// the image and failed on it; transport errors mean it never did.
    async fn score(&self, image: &[u8]) -> Result<RawScorerOutput, SourceError>;
}

/// Client for an HTTP inference endpoint.
pub struct HttpScorer {
    http: reqwest::Client,
    endpoint: String,
    model: ModelInfo,
    limiter: Arc<RateLimiter>,
}

/// Inference responses are either the raw output or a structured error.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScoreResponse {
    Output(RawScorerOutput),
    Failure { error: String },
}

impl HttpScorer {
    pub fn new(endpoint: impl Into<String>, model: ModelInfo, limiter: Arc<RateLimiter>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model,
            limiter,
        }
    }
}

#[async_trait]
impl Scorer for HttpScorer {
    fn model_info(&self) -> ModelInfo {
        self.model.clone()
    }

    async fn score(&self, image: &[u8]) -> Result<RawScorerOutput, SourceError> {
        self.limiter.acquire().await;
        let response = self
            .http
            .post(&self.endpoint)
            .header("content-type", "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "inference request failed");
            return Err(SourceError::from_status(response.status(), "inference"));
        }

        match response.json::<ScoreResponse>().await? {
            ScoreResponse::Output(raw) => {
                debug!(crack = raw.crack_confidence, pothole = raw.pothole_confidence,
                    "image scored");
                Ok(raw)
            }
            ScoreResponse::Failure { error } => Err(SourceError::Model(error)),
        }
    }
}
