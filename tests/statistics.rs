//! End-to-end statistics over SQLite stores opened from configuration

use chrono::{NaiveDate, TimeZone, Utc};
use meteo_region::config::{Config, SolarModel};
use meteo_region::index::{AdministrativeUnit, Boundary, Ring, SqliteGeoStore, Station, UnitLevel};
use meteo_region::query::{StatisticsService, StatsError, Statistic};
use meteo_region::solar::Period;
use meteo_region::storage::{ParameterCode, Sample, SqliteMeasurementStore, MISSING_VALUE};
use std::path::Path;
use tempfile::tempdir;

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

fn sample(station: &str, code: ParameterCode, hour: u32, value: f64) -> Sample {
    Sample::at(
        station,
        code,
        Utc.with_ymd_and_hms(2024, 4, 10, hour, 0, 0).unwrap(),
        value,
    )
}

fn config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = dir.to_string_lossy().to_string();
    config.statistics.solar = SolarModel::Fixed;
    config.cache.persistent = true;
    config
}

fn seed(config: &Config) {
    let geo = SqliteGeoStore::open(&config.storage.geo_path()).unwrap();
    geo.upsert_unit(&AdministrativeUnit::new(
        "32",
        "zachodniopomorskie",
        UnitLevel::Province,
        square(14.0, 52.6, 2.0),
    ))
    .unwrap();
    geo.upsert_unit(
        &AdministrativeUnit::new("3262", "Szczecin", UnitLevel::County, square(14.4, 53.3, 0.3))
            .parent("32"),
    )
    .unwrap();
    geo.upsert_unit(
        &AdministrativeUnit::new("3201", "białogardzki", UnitLevel::County, square(15.8, 54.0, 0.2))
            .parent("32"),
    )
    .unwrap();
    geo.upsert_station(&Station::new("12205", "Szczecin", 53.4, 14.6)).unwrap();
    geo.upsert_station(&Station::new("12160", "Świnoujście", 53.9, 14.2)).unwrap();

    let store = SqliteMeasurementStore::open(&config.storage.measurements_path()).unwrap();
    store
        .append_batch(&[
            sample("12205", ParameterCode::AirTemperature, 4, 2.0),
            sample("12205", ParameterCode::AirTemperature, 12, 20.0),
            sample("12160", ParameterCode::AirTemperature, 10, 14.0),
            sample("12160", ParameterCode::AirTemperature, 11, MISSING_VALUE),
            sample("12205", ParameterCode::MaxGust, 15, 17.5),
            sample("12160", ParameterCode::MaxGust, 16, 24.0),
        ])
        .unwrap();
}

#[tokio::test]
async fn test_county_statistics_from_sqlite() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    seed(&config);

    let service = StatisticsService::open(&config).unwrap();
    let result = service.compute_statistics("3262", date()).await.unwrap();

    assert_eq!(result.region_name, "Szczecin");
    assert_eq!(result.station_count, 1);

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
}

#[tokio::test]
async fn test_province_pools_stations_and_skips_missing() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    seed(&config);

    let service = StatisticsService::open(&config).unwrap();
    let result = service
        .compute_statistics("Zachodniopomorskie", date())
        .await
        .unwrap();

    assert_eq!(result.station_count, 2);

    let temp = result.get(ParameterCode::AirTemperature).unwrap();
    assert_eq!(temp.day.as_ref().map(Statistic::count), Some(2));
    assert_eq!(temp.day.as_ref().map(Statistic::value), Some(17.0));

    let gust = result.get(ParameterCode::MaxGust).unwrap();
    assert_eq!(gust.day, Some(Statistic::Max { max: 24.0, count: 2 }));
    assert_eq!(gust.night, None);
}

#[tokio::test]
async fn test_zero_station_county_and_unknown_region() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    seed(&config);

    let service = StatisticsService::open(&config).unwrap();

    let result = service.compute_statistics("3201", date()).await.unwrap();
    assert_eq!(result.station_count, 0);
    assert_eq!(result.parameters.len(), ParameterCode::all().len());
    assert!(result.is_empty());

    let err = service.compute_statistics("0000", date()).await.unwrap_err();
    assert!(matches!(err, StatsError::RegionNotFound(_)));
}

#[tokio::test]
async fn test_persistent_cache_survives_restart_until_cleared() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    seed(&config);

    let first = StatisticsService::open(&config).unwrap();
    let before = first.compute_statistics("3262", date()).await.unwrap();
    first.shutdown().await.unwrap();

    // New reading after the result was cached
    SqliteMeasurementStore::open(&config.storage.measurements_path())
        .unwrap()
        .append_batch(&[sample("12205", ParameterCode::AirTemperature, 13, 30.0)])
        .unwrap();

    let second = StatisticsService::open(&config).unwrap();
    let cached = second.compute_statistics("3262", date()).await.unwrap();
    assert_eq!(*cached, *before);
    assert_eq!(second.cache_stats().backend_hits, 1);

    second.clear_cache().await;
    let fresh = second.compute_statistics("3262", date()).await.unwrap();
    let day = fresh
        .get(ParameterCode::AirTemperature)
        .and_then(|p| p.day.as_ref())
        .map(Statistic::value);
    assert_eq!(day, Some(25.0));
}
