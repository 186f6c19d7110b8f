//! Statistics service
//!
//! Orchestrates one `compute_statistics(region, date)` request:
//!
//! ```text
//! resolve(region) → stations_in(unit)
//!   → fetch (station × parameter), bounded concurrency, all-or-nothing
//!   → partition each station's samples into day / night
//!   → pool per parameter and period, sorted by (station, timestamp)
//!   → aggregate → AggregationResult
//! ```
//!
//! The whole pipeline runs inside the result cache, so concurrent requests
//! for the same key share one computation.

use chrono::NaiveDate;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{CacheKey, CacheStats, ResultCache, SqliteCacheBackend};
use crate::config::Config;
use crate::index::{AdministrativeUnit, GeoIndex, SqliteGeoStore, Station, UnitLevel};
use crate::query::aggregate::Aggregator;
use crate::query::error::{StatsError, StatsResult};
use crate::query::result::{AggregationResult, Comparison, ParameterStatistics};
use crate::solar::{DayNightPartitioner, SolarCalculator};
use crate::storage::{
    AdapterConfig, MeasurementAdapter, MeasurementStore, ParameterCode, ParameterRegistry, Sample,
    SqliteMeasurementStore,
};

/// Default number of store queries in flight per request
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Regional day/night statistics over a geospatial index and a measurement store
pub struct StatisticsService {
    index: Arc<GeoIndex>,
    adapter: MeasurementAdapter,
    partitioner: DayNightPartitioner,
    aggregator: Aggregator,
    cache: ResultCache,
    registry: ParameterRegistry,
    max_concurrency: usize,
}

impl StatisticsService {
    /// Service with the standard parameters, astronomical sun times and an in-memory cache
    pub fn new(index: Arc<GeoIndex>, store: Arc<dyn MeasurementStore>) -> Self {
        Self {
            index,
            adapter: MeasurementAdapter::new(store, AdapterConfig::default()),
            partitioner: DayNightPartitioner::default(),
            aggregator: Aggregator::default(),
            cache: ResultCache::default(),
            registry: ParameterRegistry::standard(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Builder: sunrise/sunset source
    pub fn with_solar(mut self, calculator: Arc<dyn SolarCalculator>) -> Self {
        self.partitioner = DayNightPartitioner::new(calculator);
        self
    }

    /// Builder: result cache
    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = cache;
        self
    }

    /// Builder: trimmed-mean proportion
    pub fn with_trim(mut self, proportion: f64) -> Self {
        self.aggregator = Aggregator::new(proportion);
        self
    }

    /// Builder: parameter table
    pub fn with_parameters(mut self, registry: ParameterRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Builder: store queries in flight per request (at least one)
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Builder: timeout and retry policy
    pub fn with_adapter_config(mut self, config: AdapterConfig) -> Self {
        self.adapter = MeasurementAdapter::new(Arc::clone(self.adapter.store()), config);
        self
    }

    /// Open the SQLite databases named by the configuration
    pub fn open(config: &Config) -> StatsResult<Self> {
        config.validate()?;

        let geo_path = config.storage.geo_path();
        let geo_store = SqliteGeoStore::open(&geo_path)?;
        let index = GeoIndex::load(&geo_store)?;
        tracing::info!(path = ?geo_path, stats = %index.stats(), "Loaded geospatial index");

        let measurements_path = config.storage.measurements_path();
        let store = SqliteMeasurementStore::open(&measurements_path)?;
        tracing::info!(path = ?measurements_path, "Opened measurement store");

        let mut cache = ResultCache::new(config.cache.ttl());
        if config.cache.persistent {
            let cache_path = config.cache_path();
            match SqliteCacheBackend::open(&cache_path, config.cache.ttl()) {
                Ok(backend) => {
                    tracing::info!(path = ?cache_path, "Persistent result cache enabled");
                    cache = cache.with_backend(Arc::new(backend));
                }
                Err(e) => {
                    tracing::warn!(path = ?cache_path, error = %e, "Persistent cache unavailable, using memory only");
                }
            }
        }

        Ok(Self::new(Arc::new(index), Arc::new(store))
            .with_solar(config.statistics.solar_calculator()?)
            .with_trim(config.statistics.trim_proportion)
            .with_parameters(config.parameter_registry()?)
            .with_max_concurrency(config.statistics.max_concurrent_fetches)
            .with_adapter_config(config.fetch.adapter_config())
            .with_cache(cache))
    }

    pub fn index(&self) -> &GeoIndex {
        &self.index
    }

    pub fn parameters(&self) -> &ParameterRegistry {
        &self.registry
    }

    /// Day/night statistics of every configured parameter for a region and date
    pub async fn compute_statistics(
        &self,
        region: &str,
        date: NaiveDate,
    ) -> StatsResult<Arc<AggregationResult>> {
        self.compute_with(region, date, &self.registry).await
    }

    /// Like [`compute_statistics`](Self::compute_statistics) for a subset of parameters
    pub async fn compute_for(
        &self,
        region: &str,
        date: NaiveDate,
        parameters: &[ParameterCode],
    ) -> StatsResult<Arc<AggregationResult>> {
        if parameters.is_empty() {
            return self.compute_statistics(region, date).await;
        }
        let registry = self.registry.subset(parameters)?;
        self.compute_with(region, date, &registry).await
    }

    async fn compute_with(
        &self,
        region: &str,
        date: NaiveDate,
        registry: &ParameterRegistry,
    ) -> StatsResult<Arc<AggregationResult>> {
        let unit = self.index.resolve(region)?.clone();
        let key = CacheKey::new(unit.id.clone(), date, registry.codes());

        self.cache
            .get_or_compute(key, || self.compute_uncached(&unit, date, registry))
            .await
    }

    async fn compute_uncached(
        &self,
        unit: &AdministrativeUnit,
        date: NaiveDate,
        registry: &ParameterRegistry,
    ) -> StatsResult<AggregationResult> {
        let start = Instant::now();
        let stations = self.index.stations_in(unit);

        if stations.is_empty() {
            tracing::info!(region = %unit.id, %date, "Region has no stations");
        }

        let codes = registry.codes();
        let jobs: Vec<(Station, ParameterCode)> = stations
            .iter()
            .flat_map(|station| codes.iter().map(move |code| (station.clone(), *code)))
            .collect();
        let job_count = jobs.len();

        // Any unavailable station fails the request; no partial results
        let fetched: Vec<(Station, ParameterCode, Vec<Sample>)> = stream::iter(jobs)
            .map(|(station, code)| async move {
                self.adapter
                    .fetch(&station, code, date)
                    .await
                    .map(|samples| (station, code, samples))
            })
            .buffer_unordered(self.max_concurrency)
            .try_collect()
            .await
            .map_err(|e| {
                tracing::warn!(region = %unit.id, %date, error = %e, "Measurement fetch failed");
                StatsError::from(e)
            })?;

        let mut parameters = Vec::with_capacity(registry.len());
        for def in registry.all() {
            let mut day = Vec::new();
            let mut night = Vec::new();

            for (station, _, samples) in fetched.iter().filter(|(_, code, _)| *code == def.code) {
                let partition = self.partitioner.partition(station, date, samples.iter().cloned());
                day.extend(partition.day);
                night.extend(partition.night);
            }

            sort_for_pooling(&mut day);
            sort_for_pooling(&mut night);

            tracing::debug!(
                region = %unit.id,
                parameter = %def.code,
                day = day.len(),
                night = night.len(),
                "Pooled samples"
            );

            parameters.push(ParameterStatistics {
                parameter: def.code,
                unit: def.unit.clone(),
                aggregation: def.aggregation,
                day: self.aggregator.aggregate(def, &day),
                night: self.aggregator.aggregate(def, &night),
            });
        }

        tracing::info!(
            region = %unit.id,
            %date,
            stations = stations.len(),
            queries = job_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Computed regional statistics"
        );

        Ok(AggregationResult {
            region_id: unit.id.clone(),
            region_name: unit.name.clone(),
            level: unit.level,
            date,
            station_count: stations.len(),
            parameters,
        })
    }

    /// Change of each parameter's headline value between two dates
    pub async fn compare(
        &self,
        region: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StatsResult<Comparison> {
        if from > to {
            return Err(StatsError::InvalidRequest(format!(
                "start date {} is after end date {}",
                from, to
            )));
        }

        let (before, after) = futures_util::try_join!(
            self.compute_statistics(region, from),
            self.compute_statistics(region, to)
        )?;

        Ok(Comparison::between(&before, &after))
    }

    /// Drop every cached result; returns how many in-memory entries were dropped
    pub async fn clear_cache(&self) -> usize {
        self.cache.clear().await
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Units of one level, or all units, sorted by id
    pub fn regions(&self, level: Option<UnitLevel>) -> Vec<AdministrativeUnit> {
        self.index.units(level).into_iter().cloned().collect()
    }

    /// Units whose parent is `parent`
    pub fn subregions(&self, parent: &str) -> StatsResult<Vec<AdministrativeUnit>> {
        let parent = self.index.resolve(parent)?;
        Ok(self.index.children(&parent.id).into_iter().cloned().collect())
    }

    pub fn region(&self, key: &str) -> StatsResult<AdministrativeUnit> {
        Ok(self.index.resolve(key)?.clone())
    }

    /// Stations inside a region, sorted by id
    pub fn stations(&self, region: &str) -> StatsResult<Vec<Station>> {
        let unit = self.index.resolve(region)?;
        Ok(self.index.stations_in(unit))
    }

    /// Check that the measurement store answers
    pub async fn ping(&self) -> StatsResult<()> {
        self.adapter.ping().await?;
        Ok(())
    }

    /// Release the measurement store
    pub async fn shutdown(&self) -> StatsResult<()> {
        tracing::info!("Shutting down statistics service");
        self.adapter.store().close().await?;
        Ok(())
    }
}

fn sort_for_pooling(samples: &mut [Sample]) {
    samples.sort_by(|a, b| {
        a.station_id
            .cmp(&b.station_id)
            .then(a.timestamp.cmp(&b.timestamp))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Boundary, Ring};
    use crate::query::Statistic;
    use crate::solar::{FixedSchedule, Period};
    use crate::storage::{MemoryStore, StoreError, StoreResult, TimeRange};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn square(min_lon: f64, min_lat: f64, size: f64) -> Boundary {
        Boundary::from_ring(Ring::from_coords(&[
            (min_lon, min_lat),
            (min_lon + size, min_lat),
            (min_lon + size, min_lat + size),
            (min_lon, min_lat + size),
        ]))
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 10).unwrap()
    }

    fn at(hour: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 10, hour, 0, 0).unwrap()
    }

    fn index() -> Arc<GeoIndex> {
        let units = vec![
            AdministrativeUnit::new("14", "mazowieckie", UnitLevel::Province, square(20.0, 51.0, 2.0)),
            AdministrativeUnit::new("1465", "Warszawa", UnitLevel::County, square(20.0, 51.0, 1.0))
                .parent("14"),
            AdministrativeUnit::new("1499", "pusty", UnitLevel::County, square(21.5, 52.5, 0.4))
                .parent("14"),
        ];
        let stations = vec![
            Station::new("S1", "one", 51.5, 20.5),
            Station::new("S2", "two", 52.0, 21.2),
        ];
        Arc::new(GeoIndex::new(units, stations).unwrap())
    }

    /// Counts queries and fails every one while `down` is set
    struct CountingStore {
        inner: MemoryStore,
        queries: AtomicUsize,
        down: std::sync::atomic::AtomicBool,
    }

    impl CountingStore {
        fn new(inner: MemoryStore) -> Self {
            Self {
                inner,
                queries: AtomicUsize::new(0),
                down: std::sync::atomic::AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl MeasurementStore for CountingStore {
        fn name(&self) -> &str {
            "counting"
        }

        async fn query(
            &self,
            station_id: &str,
            parameter: ParameterCode,
            range: TimeRange,
        ) -> StoreResult<Vec<Sample>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection refused".to_string()));
            }
            self.inner.query(station_id, parameter, range).await
        }

        async fn ping(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_batch(vec![
                Sample::at("S1", ParameterCode::AirTemperature, at(4), 2.0),
                Sample::at("S1", ParameterCode::AirTemperature, at(12), 20.0),
                Sample::at("S2", ParameterCode::AirTemperature, at(13), 22.0),
                Sample::at("S2", ParameterCode::AirTemperature, at(23), 4.0),
                Sample::at("S1", ParameterCode::HourlyPrecipitation, at(3), 0.4),
                Sample::at("S2", ParameterCode::HourlyPrecipitation, at(2), 0.6),
            ])
            .await;
        store
    }

    fn fast_retries() -> AdapterConfig {
        AdapterConfig {
            timeout: Duration::from_millis(200),
            max_retries: 1,
            backoff: Duration::from_millis(1),
        }
    }

    fn service(store: Arc<dyn MeasurementStore>) -> StatisticsService {
        StatisticsService::new(index(), store)
            .with_solar(Arc::new(FixedSchedule::default()))
            .with_adapter_config(fast_retries())
    }

    #[tokio::test]
    async fn test_county_with_one_station() {
        let svc = service(Arc::new(store().await));
        let result = svc.compute_statistics("1465", date()).await.unwrap();

        assert_eq!(result.station_count, 1);
        assert_eq!(result.parameters.len(), ParameterCode::all().len());

        let temp = result.get(ParameterCode::AirTemperature).unwrap();
        assert_eq!(
            temp.get(Period::Night),
            Some(&Statistic::MeanMedian {
                mean: 2.0,
                median: None,
                trimmed_mean: 2.0,
                count: 1,
            })
        );
        assert_eq!(temp.get(Period::Day).map(Statistic::value), Some(20.0));

        let wind = result.get(ParameterCode::WindSpeed).unwrap();
        assert!(wind.is_absent());
    }

    #[tokio::test]
    async fn test_province_pools_all_stations() {
        let svc = service(Arc::new(store().await));
        let result = svc.compute_statistics("mazowieckie", date()).await.unwrap();

        assert_eq!(result.region_id, "14");
        assert_eq!(result.station_count, 2);

        let temp = result.get(ParameterCode::AirTemperature).unwrap();
        assert_eq!(temp.day.as_ref().map(Statistic::value), Some(21.0));
        assert_eq!(temp.night.as_ref().map(Statistic::value), Some(3.0));

        let rain = result.get(ParameterCode::HourlyPrecipitation).unwrap();
        assert_eq!(rain.night, Some(Statistic::Sum { total: 1.0, count: 2 }));
        assert_eq!(rain.day, None);
    }

    #[tokio::test]
    async fn test_region_without_stations_is_all_absent() {
        let counting = Arc::new(CountingStore::new(store().await));
        let svc = service(counting.clone());

        let result = svc.compute_statistics("1499", date()).await.unwrap();
        assert_eq!(result.station_count, 0);
        assert!(result.is_empty());
        assert_eq!(counting.queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_region() {
        let svc = service(Arc::new(store().await));
        let err = svc.compute_statistics("nowhere", date()).await.unwrap_err();
        assert!(matches!(err, StatsError::RegionNotFound(_)));
    }

    #[tokio::test]
    async fn test_results_are_cached_until_cleared() {
        let counting = Arc::new(CountingStore::new(store().await));
        let svc = service(counting.clone());
        let per_request = ParameterCode::all().len();

        let first = svc.compute_statistics("1465", date()).await.unwrap();
        let second = svc.compute_statistics("Warszawa", date()).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(counting.queries.load(Ordering::SeqCst), per_request);

        svc.clear_cache().await;
        svc.compute_statistics("1465", date()).await.unwrap();
        assert_eq!(counting.queries.load(Ordering::SeqCst), 2 * per_request);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_and_caches_nothing() {
        let counting = Arc::new(CountingStore::new(store().await));
        counting.down.store(true, Ordering::SeqCst);
        let svc = service(counting.clone());

        let err = svc.compute_statistics("1465", date()).await.unwrap_err();
        assert!(err.is_unavailable());

        counting.down.store(false, Ordering::SeqCst);
        let result = svc.compute_statistics("1465", date()).await.unwrap();
        assert_eq!(result.station_count, 1);
    }

    #[tokio::test]
    async fn test_parameter_subset() {
        let svc = service(Arc::new(store().await));
        let result = svc
            .compute_for("1465", date(), &[ParameterCode::AirTemperature])
            .await
            .unwrap();
        assert_eq!(result.parameters.len(), 1);

        let err = StatisticsService::new(index(), Arc::new(MemoryStore::new()))
            .with_parameters(
                ParameterRegistry::from_definitions(vec![
                    ParameterCode::AirTemperature.standard_definition(),
                ])
                .unwrap(),
            )
            .compute_for("1465", date(), &[ParameterCode::MaxGust])
            .await
            .unwrap_err();
        assert!(matches!(err, StatsError::Config(_)));
    }

    #[tokio::test]
    async fn test_repeated_runs_agree() {
        let a = service(Arc::new(store().await))
            .compute_statistics("14", date())
            .await
            .unwrap();
        let b = service(Arc::new(store().await))
            .with_max_concurrency(1)
            .compute_statistics("14", date())
            .await
            .unwrap();
        assert_eq!(*a, *b);
    }

    #[tokio::test]
    async fn test_compare_dates() {
        let memory = store().await;
        let next = NaiveDate::from_ymd_opt(2024, 4, 11).unwrap();
        memory
            .insert(Sample::at(
                "S1",
                ParameterCode::AirTemperature,
                Utc.with_ymd_and_hms(2024, 4, 11, 12, 0, 0).unwrap(),
                15.0,
            ))
            .await;

        let svc = service(Arc::new(memory));
        let cmp = svc.compare("1465", date(), next).await.unwrap();
        let temp = cmp
            .changes
            .iter()
            .find(|c| c.parameter == ParameterCode::AirTemperature)
            .unwrap();
        assert_eq!(temp.day, Some(-5.0));
        assert_eq!(temp.night, None);

        assert!(matches!(
            svc.compare("1465", next, date()).await,
            Err(StatsError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_region_listing() {
        let svc = service(Arc::new(MemoryStore::new()));

        assert_eq!(svc.regions(Some(UnitLevel::Province)).len(), 1);
        assert_eq!(svc.regions(None).len(), 3);
        assert_eq!(svc.subregions("14").unwrap().len(), 2);
        assert_eq!(svc.stations("14").unwrap().len(), 2);
        assert_eq!(svc.region("warszawa").unwrap().id, "1465");
    }
}
