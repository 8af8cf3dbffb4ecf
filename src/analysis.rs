//! Client for the remote sentiment scoring endpoint.
//!
//! The endpoint accepts `POST` with a JSON body `{"text": ...}` and answers
//! with a JSON object carrying at least a numeric `compound` field.

use crate::types::{AnalysisError, AnalysisRequest, AnalysisResult};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace};

/// Trait for sentiment analyzers
#[async_trait::async_trait]
pub trait Analyzer: Send + Sync {
    /// Score the request's text
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError>;
}

/// HTTP analyzer backed by a shared reqwest client
pub struct HttpAnalyzer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAnalyzer {
    /// Create an analyzer for `endpoint` with a per-request timeout
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl Analyzer for HttpAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        trace!("POST {} ({} chars)", self.endpoint, request.text.len());

        // .json() sets Content-Type: application/json
        let response = self.client.post(&self.endpoint).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        debug!("Text analysis response: {}", body);
        parse_analysis_body(body)
    }
}

/// Parse a response body, keeping it verbatim alongside the score
pub fn parse_analysis_body(body: String) -> Result<AnalysisResult, AnalysisError> {
    let compound = parse_compound(&body)?;
    Ok(AnalysisResult {
        compound,
        raw: body,
    })
}

/// Extract the numeric `compound` field from a JSON payload
pub fn parse_compound(payload: &str) -> Result<f64, AnalysisError> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| AnalysisError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    let compound = value
        .get("compound")
        .ok_or_else(|| AnalysisError::MalformedResponse("missing 'compound' field".to_string()))?;

    compound.as_f64().ok_or_else(|| {
        AnalysisError::MalformedResponse(format!("'compound' is not a number: {}", compound))
    })
}
