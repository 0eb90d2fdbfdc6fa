//! Bounded in-memory metric sample store.
//!
//! One series per metric, insertion order = chronological order. Producers
//! are expected to push samples in timestamp order; the store preserves
//! whatever order it is given. Eviction runs synchronously inside
//! [`SampleStore::record`], so memory stays bounded without a background
//! sweep.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pulse_types::MetricSample;
use tracing::trace;

use crate::config::StoreConfig;

/// Per-metric bounded time series store.
///
/// Backed by a concurrent map keyed by metric name, so ingestion for
/// unrelated metrics never contends on a single lock.
pub struct SampleStore {
    config: StoreConfig,
    series: DashMap<String, VecDeque<MetricSample>>,
}

impl SampleStore {
    /// Create a store with the given bounds.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            series: DashMap::new(),
        }
    }

    /// Append a sample to its metric's series. Never fails.
    ///
    /// When the series exceeds the configured cap, the oldest entries are
    /// evicted down to the retention floor.
    pub fn record(&self, sample: MetricSample) {
        let metric = sample.metric_name.clone();
        let mut series = self.series.entry(metric.clone()).or_default();

        series.push_back(sample);

        if series.len() > self.config.max_samples_per_metric {
            // A floor above the cap would make eviction a no-op.
            let floor = self
                .config
                .retention_floor
                .min(self.config.max_samples_per_metric);
            let excess = series.len() - floor;
            series.drain(..excess);
            trace!(metric = %metric, evicted = excess, "Evicted oldest samples");
        }
    }

    /// Last `n` samples for a metric, in chronological order.
    ///
    /// Returns fewer than `n` (possibly zero) when less data exists;
    /// callers check the length, this is not an error.
    pub fn recent(&self, metric_name: &str, n: usize) -> Vec<MetricSample> {
        match self.series.get(metric_name) {
            Some(series) => {
                let skip = series.len().saturating_sub(n);
                series.iter().skip(skip).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// All samples for a metric with `start <= timestamp <= end`.
    pub fn window(
        &self,
        metric_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<MetricSample> {
        match self.series.get(metric_name) {
            Some(series) => series
                .iter()
                .filter(|s| s.timestamp >= start && s.timestamp <= end)
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Names of all tracked metrics, sorted for deterministic iteration.
    pub fn metric_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.series.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of samples currently held for a metric.
    pub fn len(&self, metric_name: &str) -> usize {
        self.series.get(metric_name).map(|s| s.len()).unwrap_or(0)
    }

    /// Whether any samples are stored at all.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
