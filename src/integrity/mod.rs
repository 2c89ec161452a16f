//! Results of data integrity checks
//!
//! Check runs are scheduled elsewhere; they report here when they start,
//! finish or fail, and the summary endpoint reads the latest result per
//! check. Each host owns its store, so results never leak between hosts.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Latest result of one check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSummary {
    pub name: String,
    pub started_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_time: Option<DateTime<Utc>>,
    /// Number of issues found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    /// Share of checked objects with issues, in percent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckSummary {
    pub fn is_completed(&self) -> bool {
        self.finished_time.is_some()
    }
}

/// Storage of check results
#[async_trait]
pub trait CheckResultStore: Send + Sync {
    /// Record that a check run started, replacing any earlier result
    async fn record_started(&self, name: &str) -> Result<()>;

    /// Record the outcome of a started run
    async fn record_finished(&self, name: &str, count: u64, percentage: Option<f64>) -> Result<()>;

    /// Record that a started run failed
    async fn record_failed(&self, name: &str, error: &str) -> Result<()>;

    /// Latest results, optionally restricted to the given check names
    async fn summaries(&self, names: &[String]) -> Result<Vec<CheckSummary>>;

    /// Names of checks whose latest run has finished
    async fn completed(&self) -> Result<Vec<String>>;

    /// Forget all results
    async fn clear(&self) -> Result<()>;
}

/// In-memory check result store
#[derive(Clone, Default)]
pub struct InMemoryCheckResultStore {
    results: Arc<RwLock<IndexMap<String, CheckSummary>>>,
}

impl InMemoryCheckResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn finish(&self, name: &str, update: impl FnOnce(&mut CheckSummary)) -> Result<()> {
        let mut results = self
            .results
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let summary = results
            .get_mut(name)
            .ok_or_else(|| anyhow!("Check '{}' was not started", name))?;
        summary.finished_time = Some(Utc::now());
        update(summary);
        Ok(())
    }
}

#[async_trait]
impl CheckResultStore for InMemoryCheckResultStore {
    async fn record_started(&self, name: &str) -> Result<()> {
        let mut results = self
            .results
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        results.insert(
            name.to_string(),
            CheckSummary {
                name: name.to_string(),
                started_time: Utc::now(),
                finished_time: None,
                count: None,
                percentage: None,
                error: None,
            },
        );
        tracing::debug!(check = %name, "integrity check started");
        Ok(())
    }

    async fn record_finished(&self, name: &str, count: u64, percentage: Option<f64>) -> Result<()> {
        self.finish(name, |summary| {
            summary.count = Some(count);
            summary.percentage = percentage;
        })
    }

    async fn record_failed(&self, name: &str, error: &str) -> Result<()> {
        tracing::warn!(check = %name, error = %error, "integrity check failed");
        self.finish(name, |summary| summary.error = Some(error.to_string()))
    }

    async fn summaries(&self, names: &[String]) -> Result<Vec<CheckSummary>> {
        let results = self
            .results
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(results
            .values()
            .filter(|s| names.is_empty() || names.contains(&s.name))
            .cloned()
            .collect())
    }

    async fn completed(&self) -> Result<Vec<String>> {
        let results = self
            .results
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(results
            .values()
            .filter(|s| s.is_completed())
            .map(|s| s.name.clone())
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        let mut results = self
            .results
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        results.clear();
        Ok(())
    }
}
