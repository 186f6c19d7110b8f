//! Regional statistics results

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::index::UnitLevel;
use crate::query::aggregate::Statistic;
use crate::solar::Period;
use crate::storage::{AggregationKind, ParameterCode};

/// Day and night statistics of one parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterStatistics {
    pub parameter: ParameterCode,
    pub unit: String,
    pub aggregation: AggregationKind,
    /// `None` when no valid readings fell into the day period
    pub day: Option<Statistic>,
    /// `None` when no valid readings fell into the night period
    pub night: Option<Statistic>,
}

impl ParameterStatistics {
    pub fn get(&self, period: Period) -> Option<&Statistic> {
        match period {
            Period::Day => self.day.as_ref(),
            Period::Night => self.night.as_ref(),
        }
    }

    pub fn is_absent(&self) -> bool {
        self.day.is_none() && self.night.is_none()
    }
}

/// Statistics of one region on one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub region_id: String,
    pub region_name: String,
    pub level: UnitLevel,
    pub date: NaiveDate,
    /// Stations inside the region
    pub station_count: usize,
    /// One entry per configured parameter, in configuration order
    pub parameters: Vec<ParameterStatistics>,
}

impl AggregationResult {
    pub fn get(&self, parameter: ParameterCode) -> Option<&ParameterStatistics> {
        self.parameters.iter().find(|p| p.parameter == parameter)
    }

    /// True when every parameter is absent in both periods
    pub fn is_empty(&self) -> bool {
        self.parameters.iter().all(ParameterStatistics::is_absent)
    }
}

/// Change of a parameter's headline value between two dates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterChange {
    pub parameter: ParameterCode,
    pub unit: String,
    /// `to - from` for the day period, absent when either side is absent
    pub day: Option<f64>,
    /// `to - from` for the night period, absent when either side is absent
    pub night: Option<f64>,
}

/// Period-over-period comparison of a region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub region_id: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub changes: Vec<ParameterChange>,
}

impl Comparison {
    /// Difference the headline values of two results of the same region
    pub fn between(from: &AggregationResult, to: &AggregationResult) -> Self {
        let delta = |a: Option<&Statistic>, b: Option<&Statistic>| match (a, b) {
            (Some(a), Some(b)) => Some(b.value() - a.value()),
            _ => None,
        };

        let changes = to
            .parameters
            .iter()
            .map(|after| {
                let before = from.get(after.parameter);
                ParameterChange {
                    parameter: after.parameter,
                    unit: after.unit.clone(),
                    day: delta(before.and_then(|b| b.day.as_ref()), after.day.as_ref()),
                    night: delta(before.and_then(|b| b.night.as_ref()), after.night.as_ref()),
                }
            })
            .collect();

        Self {
            region_id: to.region_id.clone(),
            from: from.date,
            to: to.date,
            changes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(date: NaiveDate, day_mean: Option<f64>) -> AggregationResult {
        AggregationResult {
            region_id: "1465".to_string(),
            region_name: "Warszawa".to_string(),
            level: UnitLevel::County,
            date,
            station_count: 1,
            parameters: vec![ParameterStatistics {
                parameter: ParameterCode::AirTemperature,
                unit: "°C".to_string(),
                aggregation: AggregationKind::MeanMedian,
                day: day_mean.map(|mean| Statistic::MeanMedian {
                    mean,
                    median: None,
                    trimmed_mean: mean,
                    count: 1,
                }),
                night: None,
            }],
        }
    }

    #[test]
    fn test_comparison_deltas() {
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();

        let cmp = Comparison::between(&result(d1, Some(-3.0)), &result(d2, Some(21.0)));
        assert_eq!(cmp.changes.len(), 1);
        assert_eq!(cmp.changes[0].day, Some(24.0));
        assert_eq!(cmp.changes[0].night, None);
    }

    #[test]
    fn test_absent_side_gives_absent_delta() {
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        let cmp = Comparison::between(&result(d1, None), &result(d2, Some(5.0)));
        assert_eq!(cmp.changes[0].day, None);
    }

    #[test]
    fn test_result_json_shape() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let json = serde_json::to_value(result(d, Some(1.5))).unwrap();

        assert_eq!(json["date"], "2024-01-01");
        assert_eq!(json["level"], "county");
        assert_eq!(json["parameters"][0]["parameter"], "B00300S");
        assert_eq!(json["parameters"][0]["day"]["kind"], "mean_median");
        assert_eq!(json["parameters"][0]["day"]["mean"], 1.5);
        assert!(json["parameters"][0]["night"].is_null());
    }
}
