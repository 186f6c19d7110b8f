//! Sunrise and sunset
//!
//! [`NoaaCalculator`] takes rise and set instants from the `sunrise` crate
//! (the sunrise equation at −0.833° apparent altitude, one or two minutes of
//! accuracy at mid latitudes). The crate has no notion of a day without a
//! sunrise, so the declination is checked first and such days are reported
//! as [`SunEvents::PolarDay`] or [`SunEvents::PolarNight`]. The result
//! depends only on the inputs, so repeated calls give identical instants.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::Serialize;
use sunrise::{Coordinates, SolarDay, SolarEvent};

/// `num_days_from_ce` of 2000-01-01
const J2000_DAYS_FROM_CE: i32 = 730_120;
/// Obliquity of the ecliptic, degrees
const OBLIQUITY: f64 = 23.4397;
/// Apparent altitude of the solar centre at sunrise (refraction + semi-diameter)
const STANDARD_ALTITUDE: f64 = -0.833;

/// Sun events of one day at one place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SunEvents {
    /// The sun rises and sets
    Regular {
        sunrise: DateTime<Utc>,
        sunset: DateTime<Utc>,
    },
    /// The sun stays above the horizon all day
    PolarDay,
    /// The sun stays below the horizon all day
    PolarNight,
}

impl SunEvents {
    /// Daylight interval as Unix milliseconds, for regular days
    pub fn daylight_millis(&self) -> Option<(i64, i64)> {
        match self {
            SunEvents::Regular { sunrise, sunset } => {
                Some((sunrise.timestamp_millis(), sunset.timestamp_millis()))
            }
            _ => None,
        }
    }
}

/// Source of sunrise/sunset instants
pub trait SolarCalculator: Send + Sync {
    /// Sun events for the UTC calendar day `date` at the given coordinates
    fn sun_events(&self, latitude: f64, longitude: f64, date: NaiveDate) -> SunEvents;
}

/// Astronomical sunrise and sunset
#[derive(Debug, Clone, Copy, Default)]
pub struct NoaaCalculator;

impl NoaaCalculator {
    pub fn new() -> Self {
        Self
    }
}

impl SolarCalculator for NoaaCalculator {
    fn sun_events(&self, latitude: f64, longitude: f64, date: NaiveDate) -> SunEvents {
        let latitude = latitude.clamp(-90.0, 90.0);
        let longitude = (longitude + 180.0).rem_euclid(360.0) - 180.0;

        if let Some(polar) = polar_events(latitude, longitude, date) {
            return polar;
        }

        let Some(coords) = Coordinates::new(latitude, longitude) else {
            tracing::warn!(latitude, longitude, "Coordinates outside the WGS84 range");
            return SunEvents::PolarNight;
        };

        let day = SolarDay::new(coords, date);
        let sunrise = day.event_time(SolarEvent::Sunrise);
        let sunset = day.event_time(SolarEvent::Sunset);

        // Rise and set lie within a day of the requested date
        let window = chrono::Duration::days(2);
        let midnight = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
        let plausible = |t: DateTime<Utc>| t > midnight - window && t < midnight + window;
        if sunrise < sunset && plausible(sunrise) && plausible(sunset) {
            SunEvents::Regular { sunrise, sunset }
        } else {
            tracing::warn!(%date, latitude, longitude, "No usable sun events, treating the day as night");
            SunEvents::PolarNight
        }
    }
}

/// `Some` when the sun never crosses the rise/set altitude on `date`
fn polar_events(latitude: f64, longitude: f64, date: NaiveDate) -> Option<SunEvents> {
    // Mean solar time, days since J2000
    let n = (date.num_days_from_ce() - J2000_DAYS_FROM_CE) as f64 - longitude / 360.0;

    let m = (357.5291 + 0.985_600_28 * n).rem_euclid(360.0);
    let m_rad = m.to_radians();
    let c = 1.9148 * m_rad.sin() + 0.0200 * (2.0 * m_rad).sin() + 0.0003 * (3.0 * m_rad).sin();
    let lambda = (m + c + 180.0 + 102.9372).rem_euclid(360.0).to_radians();

    let sin_d = lambda.sin() * OBLIQUITY.to_radians().sin();
    let cos_d = (1.0 - sin_d * sin_d).max(0.0).sqrt();

    let lat = latitude.to_radians();
    let sin_h0 = STANDARD_ALTITUDE.to_radians().sin();
    let denom = lat.cos() * cos_d;

    // At the poles the sun circles at constant altitude
    if denom.abs() < 1e-12 {
        return Some(if lat.sin() * sin_d > sin_h0 {
            SunEvents::PolarDay
        } else {
            SunEvents::PolarNight
        });
    }

    let cos_w = (sin_h0 - lat.sin() * sin_d) / denom;
    if cos_w < -1.0 {
        Some(SunEvents::PolarDay)
    } else if cos_w > 1.0 {
        Some(SunEvents::PolarNight)
    } else {
        None
    }
}

/// Fixed sunrise and sunset clock times (UTC), independent of place and season
///
/// Used when astronomical boundaries are not wanted and for reproducible tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSchedule {
    sunrise_secs: u32,
    sunset_secs: u32,
}

impl FixedSchedule {
    /// `None` unless sunrise is strictly before sunset
    pub fn new(sunrise: NaiveTime, sunset: NaiveTime) -> Option<Self> {
        if sunrise < sunset {
            Some(Self {
                sunrise_secs: sunrise.num_seconds_from_midnight(),
                sunset_secs: sunset.num_seconds_from_midnight(),
            })
        } else {
            None
        }
    }

    pub fn sunrise(&self) -> Option<NaiveTime> {
        NaiveTime::from_num_seconds_from_midnight_opt(self.sunrise_secs, 0)
    }

    pub fn sunset(&self) -> Option<NaiveTime> {
        NaiveTime::from_num_seconds_from_midnight_opt(self.sunset_secs, 0)
    }
}

impl Default for FixedSchedule {
    /// 06:00 to 18:00
    fn default() -> Self {
        Self {
            sunrise_secs: 6 * 3600,
            sunset_secs: 18 * 3600,
        }
    }
}

impl SolarCalculator for FixedSchedule {
    fn sun_events(&self, _latitude: f64, _longitude: f64, date: NaiveDate) -> SunEvents {
        let midnight = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
        SunEvents::Regular {
            sunrise: midnight + chrono::Duration::seconds(self.sunrise_secs as i64),
            sunset: midnight + chrono::Duration::seconds(self.sunset_secs as i64),
        }
    }
}
