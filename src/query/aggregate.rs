//! Aggregator
//!
//! Reduces the samples of one parameter and one period to a [`Statistic`]
//! according to the parameter's aggregation kind. An empty input (after
//! dropping missing readings) yields `None`, which callers report as an
//! absent statistic and never as zero.
//!
//! Values keep the unit of the stored readings.
//!
//! Floating-point sums depend on summation order. Callers that pool samples
//! from several stations sort them first so repeated runs agree bit for bit.

use serde::{Deserialize, Serialize};

use crate::storage::{AggregationKind, ParameterDefinition, Sample};

/// Summary of one parameter over one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Statistic {
    MeanMedian {
        mean: f64,
        /// Absent for fewer than two values
        median: Option<f64>,
        trimmed_mean: f64,
        count: usize,
    },
    Sum {
        total: f64,
        count: usize,
    },
    Max {
        max: f64,
        count: usize,
    },
}

impl Statistic {
    /// Number of values the statistic was computed from
    pub fn count(&self) -> usize {
        match self {
            Statistic::MeanMedian { count, .. }
            | Statistic::Sum { count, .. }
            | Statistic::Max { count, .. } => *count,
        }
    }

    /// Headline value: mean, total or maximum
    pub fn value(&self) -> f64 {
        match self {
            Statistic::MeanMedian { mean, .. } => *mean,
            Statistic::Sum { total, .. } => *total,
            Statistic::Max { max, .. } => *max,
        }
    }

    pub fn kind(&self) -> AggregationKind {
        match self {
            Statistic::MeanMedian { .. } => AggregationKind::MeanMedian,
            Statistic::Sum { .. } => AggregationKind::Sum,
            Statistic::Max { .. } => AggregationKind::Max,
        }
    }
}

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Middle value, or the average of the two middle values for even lengths
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Mean after dropping `floor(n * proportion)` values at each end
///
/// Falls back to the plain mean when trimming would leave nothing.
pub fn trimmed_mean(values: &[f64], proportion: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let n = values.len();
    let k = (n as f64 * proportion.clamp(0.0, 0.5)).floor() as usize;
    if 2 * k >= n {
        return mean(values);
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    mean(&sorted[k..n - k])
}

/// Reduces samples per the parameter's aggregation kind
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    trim_proportion: f64,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self {
            trim_proportion: Self::DEFAULT_TRIM,
        }
    }
}

impl Aggregator {
    /// Share trimmed from each end for the trimmed mean
    pub const DEFAULT_TRIM: f64 = 0.1;

    pub fn new(trim_proportion: f64) -> Self {
        Self { trim_proportion }
    }

    pub fn trim_proportion(&self) -> f64 {
        self.trim_proportion
    }

    /// Aggregate the valid samples, `None` when there are none
    pub fn aggregate(&self, parameter: &ParameterDefinition, samples: &[Sample]) -> Option<Statistic> {
        let values: Vec<f64> = samples
            .iter()
            .filter(|s| !s.is_missing())
            .map(|s| s.value)
            .collect();

        self.aggregate_values(parameter.aggregation, &values)
    }

    /// Aggregate raw values; the caller has already dropped missing readings
    pub fn aggregate_values(&self, kind: AggregationKind, values: &[f64]) -> Option<Statistic> {
        if values.is_empty() {
            return None;
        }
        let count = values.len();

        Some(match kind {
            AggregationKind::MeanMedian => Statistic::MeanMedian {
                mean: mean(values)?,
                median: if count >= 2 { median(values) } else { None },
                trimmed_mean: trimmed_mean(values, self.trim_proportion)?,
                count,
            },
            AggregationKind::Sum => Statistic::Sum {
                total: values.iter().sum(),
                count,
            },
            AggregationKind::Max => Statistic::Max {
                max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                count,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ParameterCode;

    fn samples(code: ParameterCode, values: &[f64]) -> Vec<Sample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| Sample::new("S", code, i as i64 * 600_000, v))
            .collect()
    }

    #[test]
    fn test_mean_is_sum_over_count() {
        let values = [3.5, -1.0, 7.25, 0.0, 12.0];
        let stat = Aggregator::default()
            .aggregate_values(AggregationKind::MeanMedian, &values)
            .unwrap();

        let expected = values.iter().sum::<f64>() / values.len() as f64;
        assert_eq!(stat.value(), expected);
        assert_eq!(stat.count(), 5);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), Some(2.5));
        assert_eq!(median(&[1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_empty_is_absent() {
        let aggregator = Aggregator::default();
        for code in ParameterCode::all() {
            let def = code.standard_definition();
            assert_eq!(aggregator.aggregate(&def, &[]), None);
        }
    }

    #[test]
    fn test_only_missing_is_absent() {
        let def = ParameterCode::AirTemperature.standard_definition();
        let input = vec![
            Sample::missing("S", ParameterCode::AirTemperature, 0),
            Sample::new("S", ParameterCode::AirTemperature, 1, f64::NAN),
        ];
        assert_eq!(Aggregator::default().aggregate(&def, &input), None);
    }

    #[test]
    fn test_zero_is_not_absent() {
        let def = ParameterCode::DailyPrecipitation.standard_definition();
        let stat = Aggregator::default()
            .aggregate(&def, &samples(ParameterCode::DailyPrecipitation, &[0.0, 0.0]))
            .unwrap();
        assert_eq!(stat, Statistic::Sum { total: 0.0, count: 2 });
    }

    #[test]
    fn test_single_value_has_no_median() {
        let def = ParameterCode::AirTemperature.standard_definition();
        let stat = Aggregator::default()
            .aggregate(&def, &samples(ParameterCode::AirTemperature, &[2.0]))
            .unwrap();

        assert_eq!(
            stat,
            Statistic::MeanMedian {
                mean: 2.0,
                median: None,
                trimmed_mean: 2.0,
                count: 1,
            }
        );
    }

    #[test]
    fn test_sum_and_max_kinds() {
        let aggregator = Aggregator::default();

        let rain = ParameterCode::HourlyPrecipitation.standard_definition();
        let stat = aggregator
            .aggregate(&rain, &samples(ParameterCode::HourlyPrecipitation, &[0.5, 1.5, 2.0]))
            .unwrap();
        assert_eq!(stat, Statistic::Sum { total: 4.0, count: 3 });

        let gust = ParameterCode::MaxGust.standard_definition();
        let stat = aggregator
            .aggregate(&gust, &samples(ParameterCode::MaxGust, &[7.0, 21.5, 3.0]))
            .unwrap();
        assert_eq!(stat, Statistic::Max { max: 21.5, count: 3 });
    }

    #[test]
    fn test_sentinels_are_ignored() {
        let def = ParameterCode::AirTemperature.standard_definition();
        let mut input = samples(ParameterCode::AirTemperature, &[10.0, 20.0]);
        input.push(Sample::missing("S", ParameterCode::AirTemperature, 99));

        let stat = Aggregator::default().aggregate(&def, &input).unwrap();
        assert_eq!(stat.value(), 15.0);
        assert_eq!(stat.count(), 2);
    }

    #[test]
    fn test_trimmed_mean() {
        // 10 values, trim 1 from each end: outlier 1000 and the minimum 1 drop out
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 1000.0];
        assert_eq!(trimmed_mean(&values, 0.1), Some(5.5));

        // Too few values to trim anything
        assert_eq!(trimmed_mean(&[1.0, 100.0], 0.1), Some(50.5));
        // Proportion is capped at one half
        assert_eq!(trimmed_mean(&[1.0, 2.0, 3.0], 0.9), Some(2.0));
    }
}
