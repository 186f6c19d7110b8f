//! Day/Night Partitioner
//!
//! - **sun**: `SolarCalculator` trait, astronomical sun times via `sunrise`, and a fixed schedule
//! - **partition**: splitting a station's samples into day and night
//!
//! ```text
//! (station lat/lon, date) → SolarCalculator → SunEvents
//!                                               ↓
//! samples ──────────────────────────→ DayNightPartitioner → Partition { day, night }
//! ```

mod partition;
mod sun;

pub use partition::{DayNightPartitioner, Partition, Period};
pub use sun::{FixedSchedule, NoaaCalculator, SolarCalculator, SunEvents};
