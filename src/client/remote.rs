// src/client/remote.rs

//! HTTP client for the remote analysis service.
//!
//! `analyze` and `classify` run behind a per-endpoint circuit breaker that
//! wraps the whole retry loop. Each endpoint has a fixed overall deadline
//! that cuts the retry loop short. Health and metrics probes go straight
//! to the network with their own short deadlines.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::auth::{EnvToken, TokenProvider};
use crate::client::breaker::CircuitBreaker;
use crate::client::retry::RetryPolicy;
use crate::error::{AppError, Result};
use crate::models::{
    AnalysisContext, AnalysisResult, AnalysisWeights, CategoryScores, Classification,
    ClientConfig, Config, Finding, OrganizationConfig, Parameters,
};
use crate::scoring::ScoreCalculator;
use crate::service::Analyzer;

const ANALYZE_PATH: &str = "analyze";
const CLASSIFY_PATH: &str = "classify";
const HEALTH_PATH: &str = "health";
const METRICS_PATH: &str = "metrics";

// --- Wire types ---

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    document_content: &'a str,
    classification: &'a Classification,
    organization_config: &'a OrganizationConfig,
    analysis_options: &'a Parameters,
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    document_content: &'a str,
    metadata: &'a serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RemoteStatus {
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Deserialize)]
struct RemoteResults {
    categories: CategoryScores,
    /// Free-form on the wire; entries shaped like a [`Finding`] are kept.
    #[serde(default)]
    problems: Vec<serde_json::Value>,
    #[serde(default)]
    recommendations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    #[serde(default)]
    analysis_id: Option<String>,
    status: RemoteStatus,
    #[serde(default)]
    results: Option<RemoteResults>,
    #[serde(default)]
    error: Option<String>,
}

impl AnalyzeResponse {
    /// Weighted score is recomputed with the caller's weights so a remote
    /// result can never bypass weight validation.
    fn into_result(self, weights: &AnalysisWeights) -> Result<AnalysisResult> {
        let id = self.analysis_id.as_deref().unwrap_or("unknown");
        match (self.status, self.results) {
            (RemoteStatus::Completed, Some(results)) => {
                let weighted_score = ScoreCalculator::weighted_score(&results.categories, weights)?;
                let findings = results
                    .problems
                    .into_iter()
                    .filter_map(|problem| match serde_json::from_value::<Finding>(problem) {
                        Ok(finding) => Some(finding),
                        Err(e) => {
                            log::debug!("Analysis {id}: skipping unrecognized problem: {e}");
                            None
                        }
                    })
                    .collect();
                Ok(AnalysisResult {
                    scores: results.categories,
                    weighted_score,
                    findings,
                    recommendations: results.recommendations,
                    analyzed_at: Utc::now(),
                })
            }
            (RemoteStatus::Completed, None) => Err(AppError::validation(format!(
                "Analysis {id} completed without results"
            ))),
            (RemoteStatus::Processing, _) => Err(AppError::validation(format!(
                "Analysis {id} is still processing"
            ))),
            (RemoteStatus::Failed, _) => Err(AppError::validation(format!(
                "Analysis {id} failed: {}",
                self.error.as_deref().unwrap_or("no reason given")
            ))),
        }
    }
}

/// `GET /health` payload.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub services: HashMap<String, bool>,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

// --- Client ---

/// Remote analyzer client with circuit breaking, retry and bearer auth.
pub struct ResilientClient {
    http: reqwest::Client,
    base_url: Url,
    config: ClientConfig,
    token: Arc<dyn TokenProvider>,
    retry: RetryPolicy,
    analyze_breaker: CircuitBreaker,
    classify_breaker: CircuitBreaker,
}

impl ResilientClient {
    /// Create a client that reads its bearer token from `client.token_env`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let token = Arc::new(EnvToken::new(&config.client.token_env));
        Self::new(config, token)
    }

    pub fn new(config: &Config, token: Arc<dyn TokenProvider>) -> Result<Self> {
        let mut base_url = Url::parse(&config.client.base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .user_agent(&config.client.user_agent)
            .build()?;

        Ok(Self {
            http,
            base_url,
            config: config.client.clone(),
            token,
            retry: RetryPolicy::from(&config.retry),
            analyze_breaker: CircuitBreaker::new("/analyze", &config.circuit_breaker),
            classify_breaker: CircuitBreaker::new("/classify", &config.circuit_breaker),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn analyze_breaker(&self) -> &CircuitBreaker {
        &self.analyze_breaker
    }

    pub fn classify_breaker(&self) -> &CircuitBreaker {
        &self.classify_breaker
    }

    /// `POST /analyze`.
    pub async fn analyze(
        &self,
        context: &AnalysisContext,
        organization: &OrganizationConfig,
    ) -> Result<AnalysisResult> {
        let request = AnalyzeRequest {
            document_content: &context.text,
            classification: &context.classification,
            organization_config: organization,
            analysis_options: &context.parameters,
        };

        let response: AnalyzeResponse = self
            .guarded(
                &self.analyze_breaker,
                ANALYZE_PATH,
                &request,
                self.config.analyze_timeout(),
            )
            .await?;

        log::info!(
            "Remote analysis {} finished for '{}'",
            response.analysis_id.as_deref().unwrap_or("-"),
            context.classification
        );
        response.into_result(&organization.effective_weights())
    }

    /// `POST /classify`. The response shape is owned by the service.
    pub async fn classify(
        &self,
        text: &str,
        metadata: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let request = ClassifyRequest {
            document_content: text,
            metadata,
        };
        self.guarded(
            &self.classify_breaker,
            CLASSIFY_PATH,
            &request,
            self.config.classify_timeout(),
        )
        .await
    }

    /// `GET /health`, no breaker or retry.
    pub async fn health_check(&self) -> Result<HealthResponse> {
        let timeout = self.config.health_timeout();
        let probe = self.send(Method::GET, HEALTH_PATH, None::<&()>, timeout);
        Self::deadline(HEALTH_PATH, timeout, probe)
            .await
            .inspect_err(|e| log::error!("Health check failed: {e}"))
    }

    /// `GET /metrics`, no breaker or retry.
    pub async fn metrics(&self) -> Result<serde_json::Value> {
        let timeout = self.config.metrics_timeout();
        let probe = self.send(Method::GET, METRICS_PATH, None::<&()>, timeout);
        Self::deadline(METRICS_PATH, timeout, probe)
            .await
            .inspect_err(|e| log::error!("Fetching service metrics failed: {e}"))
    }

    /// True iff the health probe answers with status "healthy".
    pub async fn is_available(&self) -> bool {
        self.health_check()
            .await
            .map(|health| health.is_healthy())
            .unwrap_or(false)
    }

    /// Breaker around an overall deadline around the retry loop.
    async fn guarded<B, R>(
        &self,
        breaker: &CircuitBreaker,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<R>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        breaker
            .execute(|| {
                Self::deadline(
                    path,
                    timeout,
                    self.retry.retry_with_backoff(path, || {
                        self.send(Method::POST, path, Some(body), timeout)
                    }),
                )
            })
            .await
    }

    async fn deadline<T>(
        path: &str,
        timeout: Duration,
        operation: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(AppError::timeout(format!("/{path}"), timeout)),
        }
    }

    /// One authenticated attempt.
    async fn send<B, R>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        timeout: Duration,
    ) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.base_url.join(path)?;
        let token = self.token.token().await?;

        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(token)
            .timeout(timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = error_detail(&text)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_string());
            log::error!("{} /{} failed: {} {}", method, path, status.as_u16(), detail);
            return Err(AppError::from_status(status.as_u16(), detail));
        }

        log::debug!("{} /{} succeeded", method, path);
        Ok(response.json::<R>().await?)
    }
}

#[async_trait]
impl Analyzer for ResilientClient {
    async fn analyze(
        &self,
        context: &AnalysisContext,
        organization: &OrganizationConfig,
    ) -> Result<AnalysisResult> {
        ResilientClient::analyze(self, context, organization).await
    }
}

/// The `error` field of a JSON error body, if any.
fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("error")?.as_str().map(str::to_string)
}
