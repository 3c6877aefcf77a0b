// src/service.rs

//! Analysis orchestration: cache lookup, analyzer call, cache store.
//!
//! The cache lock is never held while the analyzer runs; only the final
//! store takes it again.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::cache::{CacheWrite, ResultCache};
use crate::error::Result;
use crate::models::{AnalysisContext, AnalysisResult, Finding, OrganizationConfig, ServiceConfig};

/// Trait for analysis backends.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Score a document with an organization's rubric.
    async fn analyze(
        &self,
        context: &AnalysisContext,
        organization: &OrganizationConfig,
    ) -> Result<AnalysisResult>;
}

/// Cached analysis for one organization.
pub struct AnalysisService {
    cache: Arc<ResultCache>,
    analyzer: Arc<dyn Analyzer>,
    organization: OrganizationConfig,
    config: ServiceConfig,
}

impl AnalysisService {
    pub fn new(
        cache: Arc<ResultCache>,
        analyzer: Arc<dyn Analyzer>,
        organization: OrganizationConfig,
        config: ServiceConfig,
    ) -> Self {
        Self {
            cache,
            analyzer,
            organization,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn organization(&self) -> &OrganizationConfig {
        &self.organization
    }

    /// Analyze one document, serving from cache when possible.
    pub async fn analyze(&self, context: &AnalysisContext) -> Result<Arc<AnalysisResult>> {
        if let Some(hit) = self.cache.get(context) {
            log::debug!("Cache hit for '{}'", context.classification);
            return Ok(hit);
        }

        let mut result = self.analyzer.analyze(context, &self.organization).await?;
        if let Some(limit) = self.config.max_findings {
            keep_most_severe(&mut result.findings, limit);
        }

        let result = Arc::new(result);
        match self.cache.set(context, Arc::clone(&result)) {
            Ok(CacheWrite::Stored { evicted, .. }) if evicted > 0 => {
                log::debug!("Stored result, evicted {evicted} entries");
            }
            Ok(_) => {}
            Err(e) => log::warn!("Failed to cache analysis result: {e}"),
        }

        Ok(result)
    }

    /// Analyze many documents with at most `max_concurrent` in flight.
    ///
    /// Results come back in input order.
    pub async fn analyze_batch(
        &self,
        contexts: &[AnalysisContext],
    ) -> Vec<Result<Arc<AnalysisResult>>> {
        let concurrency = self.config.max_concurrent.max(1);
        log::info!(
            "Analyzing {} documents ({} concurrent)",
            contexts.len(),
            concurrency
        );

        let mut indexed: Vec<(usize, Result<Arc<AnalysisResult>>)> =
            stream::iter(contexts.iter().enumerate())
                .map(|(index, context)| async move { (index, self.analyze(context).await) })
                .buffer_unordered(concurrency)
                .collect()
                .await;
        indexed.sort_by_key(|(index, _)| *index);

        let failures = indexed.iter().filter(|(_, r)| r.is_err()).count();
        if failures > 0 {
            log::warn!("{failures} of {} analyses failed", contexts.len());
        }

        indexed.into_iter().map(|(_, result)| result).collect()
    }
}

/// Keep the `limit` findings with the highest severity, then rule weight.
fn keep_most_severe(findings: &mut Vec<Finding>, limit: usize) {
    if findings.len() <= limit {
        return;
    }
    findings.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.weight.total_cmp(&a.weight))
    });
    findings.truncate(limit);
}
