//! Regional statistics
//!
//! - **aggregate**: Mean/median/trimmed mean, sum and max reductions
//! - **result**: Result and comparison types returned to callers
//! - **service**: `StatisticsService`, the request pipeline behind the cache
//! - **error**: Error types
//!
//! # Example
//!
//! ```rust,no_run
//! use meteo_region::config::Config;
//! use meteo_region::query::StatisticsService;
//! use meteo_region::storage::ParameterCode;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = StatisticsService::open(&Config::default())?;
//!     let date = chrono::NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
//!
//!     let result = service.compute_statistics("małopolskie", date).await?;
//!     if let Some(temp) = result.get(ParameterCode::AirTemperature) {
//!         println!("day: {:?}, night: {:?}", temp.day, temp.night);
//!     }
//!     Ok(())
//! }
//! ```

mod aggregate;
mod error;
mod result;
mod service;

pub use aggregate::{mean, median, trimmed_mean, Aggregator, Statistic};
pub use error::{StatsError, StatsResult};
pub use result::{AggregationResult, Comparison, ParameterChange, ParameterStatistics};
pub use service::{StatisticsService, DEFAULT_MAX_CONCURRENCY};
