//! Benchmarks for aggregation, partitioning and the spatial join
//!
//! Run with: cargo bench

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use meteo_region::index::{AdministrativeUnit, Boundary, GeoIndex, Ring, Station, UnitLevel};
use meteo_region::query::Aggregator;
use meteo_region::solar::DayNightPartitioner;
use meteo_region::storage::{AggregationKind, ParameterCode, Sample};

/// One reading every 10 minutes across a UTC day
fn create_day_samples(date: NaiveDate) -> Vec<Sample> {
    let start = date
        .and_hms_opt(0, 0, 0)
        .map(|t| t.and_utc().timestamp_millis())
        .unwrap_or_default();

    (0..144)
        .map(|i| {
            let value = 10.0 + (i as f64 / 144.0 * std::f64::consts::TAU).sin() * 8.0;
            Sample::new("12375", ParameterCode::AirTemperature, start + i * 600_000, value)
        })
        .collect()
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");
    let aggregator = Aggregator::default();

    for size in [100, 1000, 10000] {
        let values: Vec<f64> = (0..size).map(|i| ((i * 7919) % 1000) as f64 / 10.0).collect();

        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("mean_median_{}", size), |b| {
            b.iter(|| aggregator.aggregate_values(AggregationKind::MeanMedian, black_box(&values)))
        });

        group.bench_function(format!("sum_{}", size), |b| {
            b.iter(|| aggregator.aggregate_values(AggregationKind::Sum, black_box(&values)))
        });
    }

    group.finish();
}

fn bench_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition");
    let partitioner = DayNightPartitioner::default();
    let station = Station::new("12375", "Warszawa-Okęcie", 52.16, 20.96);
    let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap_or_default();
    let samples = create_day_samples(date);

    group.throughput(Throughput::Elements(samples.len() as u64));
    group.bench_function("noaa_one_station_day", |b| {
        b.iter(|| partitioner.partition(&station, date, black_box(samples.iter().cloned())))
    });

    group.finish();
}

fn bench_spatial_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("spatial_join");

    // 16 x 16 grid of counties over Poland's bounding box, one station per 0.1°
    let mut units = Vec::new();
    for row in 0..16 {
        for col in 0..16 {
            let lon = 14.0 + col as f64 * 0.6;
            let lat = 49.0 + row as f64 * 0.35;
            let ring = Ring::from_coords(&[
                (lon, lat),
                (lon + 0.6, lat),
                (lon + 0.6, lat + 0.35),
                (lon, lat + 0.35),
            ]);
            units.push(AdministrativeUnit::new(
                format!("{:02}{:02}", row, col),
                format!("county {} {}", row, col),
                UnitLevel::County,
                Boundary::from_ring(ring),
            ));
        }
    }

    let mut stations = Vec::new();
    for i in 0..96 {
        for j in 0..56 {
            let lon = 14.05 + i as f64 * 0.1;
            let lat = 49.05 + j as f64 * 0.1;
            stations.push(Station::new(format!("S{}_{}", i, j), "bench", lat, lon));
        }
    }

    group.throughput(Throughput::Elements(stations.len() as u64));
    group.bench_function("build_index", |b| {
        b.iter(|| GeoIndex::new(black_box(units.clone()), black_box(stations.clone())))
    });

    group.finish();
}

criterion_group!(benches, bench_aggregate, bench_partition, bench_spatial_join);
criterion_main!(benches);
