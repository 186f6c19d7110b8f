//! Measurement store trait
//!
//! The seam between the statistics pipeline and whatever holds the raw
//! telemetry. Implementations are read-only from the pipeline's point of
//! view; writes belong to the import jobs.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::storage::error::{StoreError, StoreResult};
use crate::storage::types::{ParameterCode, Sample, TimeRange};

/// A time-series source addressed by (station, parameter, timestamp)
#[async_trait]
pub trait MeasurementStore: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// All samples of one station and parameter inside `range`, in any order.
    ///
    /// Missing values may be included; the adapter filters them.
    async fn query(
        &self,
        station_id: &str,
        parameter: ParameterCode,
        range: TimeRange,
    ) -> StoreResult<Vec<Sample>>;

    /// Check that the store is reachable
    async fn ping(&self) -> StoreResult<()>;

    /// Release connections; later calls report `Unavailable`
    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// In-memory store for tests and embedding
#[derive(Default)]
pub struct MemoryStore {
    series: RwLock<HashMap<(String, ParameterCode), Vec<Sample>>>,
    closed: RwLock<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single sample
    pub async fn insert(&self, sample: Sample) {
        let mut series = self.series.write().await;
        series
            .entry((sample.station_id.clone(), sample.parameter))
            .or_default()
            .push(sample);
    }

    /// Append a batch of samples
    pub async fn insert_batch(&self, samples: impl IntoIterator<Item = Sample>) {
        let mut series = self.series.write().await;
        for sample in samples {
            series
                .entry((sample.station_id.clone(), sample.parameter))
                .or_default()
                .push(sample);
        }
    }

    /// Number of stored samples
    pub async fn len(&self) -> usize {
        self.series.read().await.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl MeasurementStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn query(
        &self,
        station_id: &str,
        parameter: ParameterCode,
        range: TimeRange,
    ) -> StoreResult<Vec<Sample>> {
        if *self.closed.read().await {
            return Err(StoreError::Unavailable("store is closed".to_string()));
        }

        let series = self.series.read().await;
        let samples = series
            .get(&(station_id.to_string(), parameter))
            .map(|points| {
                points
                    .iter()
                    .filter(|s| range.contains(s.timestamp))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(samples)
    }

    async fn ping(&self) -> StoreResult<()> {
        if *self.closed.read().await {
            return Err(StoreError::Unavailable("store is closed".to_string()));
        }
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        *self.closed.write().await = true;
        Ok(())
    }
}
