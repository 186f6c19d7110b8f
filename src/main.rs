//! meteo-region CLI
//!
//! Command-line interface for regional weather statistics:
//! - Day/night statistics of a province or county
//! - Comparison of two dates
//! - Region and station listings
//! - HTTP API server

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meteo_region::api::{serve, AppState};
use meteo_region::config::{generate_default_config, Config, LoggingConfig};
use meteo_region::index::UnitLevel;
use meteo_region::query::{AggregationResult, Comparison, StatisticsService, Statistic};
use meteo_region::storage::ParameterCode;

#[derive(Parser)]
#[command(name = "meteo-region")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Day/night weather statistics for Polish provinces and counties")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: standard locations, then built-in defaults)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Day/night statistics of a region on one date
    Stats {
        /// Region id (TERYT) or name
        region: String,
        /// Date (YYYY-MM-DD, UTC)
        #[arg(short, long)]
        date: NaiveDate,
        /// Parameter codes (comma-separated or repeated), default all configured
        #[arg(short, long, value_delimiter = ',')]
        parameters: Vec<ParameterCode>,
    },

    /// Change of each parameter between two dates
    Compare {
        /// Region id (TERYT) or name
        region: String,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },

    /// List provinces and counties
    Regions {
        /// province / county (wojewodztwo / powiat)
        #[arg(short, long)]
        level: Option<UnitLevel>,
        /// Only units inside this region
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// List the stations inside a region
    Stations {
        /// Region id (TERYT) or name
        region: String,
    },

    /// Drop every cached result
    ClearCache,

    /// Run the HTTP API server
    Serve {
        /// Override the configured host
        #[arg(long)]
        host: Option<String>,
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        return write_default_config(output.as_deref());
    }

    let (mut config, report) =
        Config::load_default(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.logging);
    report.log();

    let json = match cli.format.as_str() {
        "json" => true,
        "table" => false,
        other => bail!("Unknown output format '{}', expected table or json", other),
    };

    if let Commands::Serve { host, port } = &cli.command {
        if let Some(host) = host {
            config.api.host = host.clone();
        }
        if let Some(port) = port {
            config.api.port = *port;
        }
    }

    let service = Arc::new(StatisticsService::open(&config).context("Failed to open data stores")?);

    let outcome = run(cli.command, &service, &config, json).await;

    if let Err(e) = service.shutdown().await {
        tracing::warn!(error = %e, "Failed to close measurement store");
    }
    outcome
}

async fn run(command: Commands, service: &Arc<StatisticsService>, config: &Config, json: bool) -> Result<()> {
    match command {
        Commands::Stats {
            region,
            date,
            parameters,
        } => {
            let result = service
                .compute_for(&region, date, &parameters)
                .await
                .with_context(|| format!("Failed to compute statistics for '{}'", region))?;

            if json {
                println!("{}", serde_json::to_string_pretty(result.as_ref())?);
            } else {
                print_statistics(&result);
            }
        }

        Commands::Compare { region, from, to } => {
            let comparison = service
                .compare(&region, from, to)
                .await
                .with_context(|| format!("Failed to compare '{}'", region))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&comparison)?);
            } else {
                print_comparison(&comparison);
            }
        }

        Commands::Regions { level, parent } => {
            let mut units = match parent {
                Some(parent) => service.subregions(&parent)?,
                None => service.regions(level),
            };
            if let Some(level) = level {
                units.retain(|u| u.level == level);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&units)?);
            } else {
                println!("{:<8} {:<10} {:<8} NAME", "ID", "LEVEL", "PARENT");
                for unit in &units {
                    println!(
                        "{:<8} {:<10} {:<8} {}",
                        unit.id,
                        unit.level.as_str(),
                        unit.parent_id.as_deref().unwrap_or("-"),
                        unit.name
                    );
                }
                println!("\n{} regions", units.len());
            }
        }

        Commands::Stations { region } => {
            let stations = service.stations(&region)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&stations)?);
            } else {
                println!("{:<10} {:>9} {:>9}  NAME", "ID", "LAT", "LON");
                for s in &stations {
                    println!("{:<10} {:>9.4} {:>9.4}  {}", s.id, s.latitude, s.longitude, s.name);
                }
                println!("\n{} stations", stations.len());
            }
        }

        Commands::ClearCache => {
            let cleared = service.clear_cache().await;
            if json {
                println!("{}", serde_json::json!({ "status": "ok", "cleared": cleared }));
            } else {
                println!("Cache cleared");
            }
        }

        Commands::Serve { .. } => {
            tracing::info!("Starting meteo-region API server v{}", env!("CARGO_PKG_VERSION"));
            let state = AppState::new(Arc::clone(service), config.api.clone());
            serve(state, &config.api).await.context("API server failed")?;
        }

        Commands::Config { output } => write_default_config(output.as_deref())?,
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("meteo_region={},tower_http=info", logging.level).into()
    });

    // Logs go to stderr so table and JSON output stay clean on stdout
    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn write_default_config(output: Option<&std::path::Path>) -> Result<()> {
    let content = generate_default_config();
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write config to {:?}", path))?;
            println!("Wrote default config to {:?}", path);
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn format_statistic(stat: Option<&Statistic>) -> String {
    match stat {
        None => "-".to_string(),
        Some(Statistic::MeanMedian {
            mean,
            median,
            trimmed_mean,
            count,
        }) => {
            let median = median.map(|m| format!("{:.2}", m)).unwrap_or_else(|| "-".to_string());
            format!(
                "mean {:.2} med {} trim {:.2} (n={})",
                mean, median, trimmed_mean, count
            )
        }
        Some(Statistic::Sum { total, count }) => format!("sum {:.2} (n={})", total, count),
        Some(Statistic::Max { max, count }) => format!("max {:.2} (n={})", max, count),
    }
}

fn print_statistics(result: &AggregationResult) {
    println!(
        "{} {} ({}) on {}, {} stations",
        result.level, result.region_name, result.region_id, result.date, result.station_count
    );
    println!();
    println!("{:<9} {:<6} {:<42} NIGHT", "PARAM", "UNIT", "DAY");
    for p in &result.parameters {
        println!(
            "{:<9} {:<6} {:<42} {}",
            p.parameter.code(),
            p.unit,
            format_statistic(p.day.as_ref()),
            format_statistic(p.night.as_ref())
        );
    }
}

fn print_comparison(comparison: &Comparison) {
    println!(
        "Region {}: {} -> {}",
        comparison.region_id, comparison.from, comparison.to
    );
    println!();

    let delta = |d: Option<f64>| d.map(|v| format!("{:+.2}", v)).unwrap_or_else(|| "-".to_string());

    println!("{:<9} {:<6} {:>10} {:>10}", "PARAM", "UNIT", "DAY", "NIGHT");
    for c in &comparison.changes {
        println!(
            "{:<9} {:<6} {:>10} {:>10}",
            c.parameter.code(),
            c.unit,
            delta(c.day),
            delta(c.night)
        );
    }
}
