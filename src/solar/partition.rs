//! Day/night partitioning of samples
//!
//! A sample is **day** when `sunrise <= timestamp < sunset`, otherwise
//! **night**. Under polar day every sample of the date is day; under polar
//! night every sample is night.
//!
//! Daylight intervals of the previous and next date are also consulted, so
//! a sample of the UTC day that falls in a neighbouring day's daylight (far
//! from Greenwich) is still classified correctly. Polar neighbours
//! contribute no interval.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::index::Station;
use crate::solar::sun::{NoaaCalculator, SolarCalculator, SunEvents};
use crate::storage::Sample;

/// Sub-period of a day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Night,
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Period::Day => write!(f, "day"),
            Period::Night => write!(f, "night"),
        }
    }
}

/// Samples split by period, each in input order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub day: Vec<Sample>,
    pub night: Vec<Sample>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.day.len() + self.night.len()
    }

    pub fn is_empty(&self) -> bool {
        self.day.is_empty() && self.night.is_empty()
    }
}

/// Daylight of one station around one date
#[derive(Debug, Clone, PartialEq)]
enum Daylight {
    Always,
    Never,
    Intervals(Vec<(i64, i64)>),
}

impl Daylight {
    fn period_of(&self, timestamp: i64) -> Period {
        let is_day = match self {
            Daylight::Always => true,
            Daylight::Never => false,
            Daylight::Intervals(intervals) => intervals
                .iter()
                .any(|&(rise, set)| rise <= timestamp && timestamp < set),
        };
        if is_day {
            Period::Day
        } else {
            Period::Night
        }
    }
}

/// Stateless splitter of samples into day and night
#[derive(Clone)]
pub struct DayNightPartitioner {
    calculator: Arc<dyn SolarCalculator>,
}

impl Default for DayNightPartitioner {
    fn default() -> Self {
        Self::new(Arc::new(NoaaCalculator::default()))
    }
}

impl DayNightPartitioner {
    pub fn new(calculator: Arc<dyn SolarCalculator>) -> Self {
        Self { calculator }
    }

    /// Sun events for a station on a date
    pub fn sun_events(&self, station: &Station, date: NaiveDate) -> SunEvents {
        self.calculator
            .sun_events(station.latitude, station.longitude, date)
    }

    fn daylight(&self, station: &Station, date: NaiveDate) -> Daylight {
        match self.sun_events(station, date) {
            SunEvents::PolarDay => Daylight::Always,
            SunEvents::PolarNight => Daylight::Never,
            regular => {
                let neighbours = [date.pred_opt(), date.succ_opt()];
                let mut intervals: Vec<(i64, i64)> = regular.daylight_millis().into_iter().collect();
                intervals.extend(
                    neighbours
                        .into_iter()
                        .flatten()
                        .filter_map(|d| self.sun_events(station, d).daylight_millis()),
                );
                Daylight::Intervals(intervals)
            }
        }
    }

    /// Period of a single timestamp
    pub fn classify(&self, station: &Station, date: NaiveDate, timestamp: i64) -> Period {
        self.daylight(station, date).period_of(timestamp)
    }

    /// Split samples of `station` on `date` into day and night
    ///
    /// Every input sample lands in exactly one of the two outputs.
    pub fn partition(
        &self,
        station: &Station,
        date: NaiveDate,
        samples: impl IntoIterator<Item = Sample>,
    ) -> Partition {
        let daylight = self.daylight(station, date);
        let mut partition = Partition::default();

        for sample in samples {
            match daylight.period_of(sample.timestamp) {
                Period::Day => partition.day.push(sample),
                Period::Night => partition.night.push(sample),
            }
        }

        partition
    }
}
