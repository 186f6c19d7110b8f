//! Measurement adapter
//!
//! Wraps a [`MeasurementStore`] with the policies the statistics pipeline
//! relies on:
//!
//! ```text
//! fetch(station, parameter, date)
//!   → UTC day window
//!   → store.query (timeout per attempt, retry transient failures)
//!   → drop missing / sentinel readings
//!   → sort by timestamp
//! ```
//!
//! No data is an empty vector, never an error.

use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;

use crate::index::Station;
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::store::MeasurementStore;
use crate::storage::types::{ParameterCode, Sample, TimeRange};

/// Timeout and retry policy for store calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterConfig {
    /// Deadline for one store call
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `backoff * n²`
    pub backoff: Duration,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_retries: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

/// Policy layer between the pipeline and a measurement store
#[derive(Clone)]
pub struct MeasurementAdapter {
    store: Arc<dyn MeasurementStore>,
    config: AdapterConfig,
}

impl MeasurementAdapter {
    pub fn new(store: Arc<dyn MeasurementStore>, config: AdapterConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn MeasurementStore> {
        &self.store
    }

    /// Valid samples of one station and parameter for a UTC calendar day
    pub async fn fetch(
        &self,
        station: &Station,
        parameter: ParameterCode,
        date: NaiveDate,
    ) -> StoreResult<Vec<Sample>> {
        self.fetch_range(&station.id, parameter, TimeRange::for_date(date))
            .await
    }

    /// Valid samples of one station and parameter inside `range`, time ordered
    pub async fn fetch_range(
        &self,
        station_id: &str,
        parameter: ParameterCode,
        range: TimeRange,
    ) -> StoreResult<Vec<Sample>> {
        let raw = self.query_with_retry(station_id, parameter, range).await?;
        let total = raw.len();

        let mut samples: Vec<Sample> = raw.into_iter().filter(|s| !s.is_missing()).collect();
        samples.sort_by_key(|s| s.timestamp);

        if samples.len() < total {
            tracing::debug!(
                station_id,
                parameter = %parameter,
                dropped = total - samples.len(),
                "Dropped missing readings"
            );
        }

        Ok(samples)
    }

    /// Check the store, applying the same timeout as queries
    pub async fn ping(&self) -> StoreResult<()> {
        match tokio::time::timeout(self.config.timeout, self.store.ping()).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.config.timeout)),
        }
    }

    async fn query_with_retry(
        &self,
        station_id: &str,
        parameter: ParameterCode,
        range: TimeRange,
    ) -> StoreResult<Vec<Sample>> {
        let attempts = self.config.max_retries + 1;
        let mut last_error = StoreError::Unavailable("no attempt made".to_string());

        for attempt in 0..attempts {
            if attempt > 0 {
                // Backoff: base, 4x base, 9x base...
                let delay = self.config.backoff * attempt.pow(2);
                tokio::time::sleep(delay).await;
            }

            let call = self.store.query(station_id, parameter, range);
            let result = match tokio::time::timeout(self.config.timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout(self.config.timeout)),
            };

            match result {
                Ok(samples) => return Ok(samples),
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        store = self.store.name(),
                        station_id,
                        parameter = %parameter,
                        attempt = attempt + 1,
                        error = %e,
                        "Measurement store call failed, retrying"
                    );
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }

        Err(StoreError::RetriesExhausted {
            attempts,
            reason: last_error.to_string(),
        })
    }
}
