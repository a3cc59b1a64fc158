//! Process configuration.
//!
//! Every setting can be given on the command line or through a `CAFE_*` environment variable.

use std::path::PathBuf;
use std::time::Duration;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use time::{Date, OffsetDateTime};
use crate::backend::column_type::parse_iso_date;
use crate::backend::db::StorageMode;
use crate::generator::{GeneratorSettings, Selection};
use crate::util::error;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Cafe visit generator and average visits service
#[derive(Parser, Debug, Clone)]
#[command(name = "cafe-visits", version, about = "Generates cafe visits on a schedule and serves the average visits per cafe")]
pub struct Args {
    /// Host address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "CAFE_HOST")]
    pub host: String,

    /// Port to listen on
    #[arg(short = 'p', long, default_value_t = 4567, env = "CAFE_PORT")]
    pub port: u16,

    /// Keep the database in a file or in memory
    #[arg(long, value_enum, default_value_t = StorageMode::Memory, env = "CAFE_STORAGE")]
    pub storage: StorageMode,

    /// Database file used with file storage
    #[arg(long, value_name = "FILE", default_value = "cafedb.sqlite3", env = "CAFE_DB_PATH")]
    pub db_path: PathBuf,

    /// Milliseconds between generated visits
    #[arg(long, default_value_t = 1000, env = "CAFE_INTERVAL_MS")]
    pub interval_ms: u64,

    /// Milliseconds to wait before the first generated visit
    #[arg(long, default_value_t = 5000, env = "CAFE_INITIAL_DELAY_MS")]
    pub initial_delay_ms: u64,

    /// Generated visits per simulated day
    #[arg(long, default_value_t = 20, env = "CAFE_GENERATIONS_PER_DAY")]
    pub generations_per_day: u64,

    /// Exclusive upper bound of the visit count of one generated visit
    #[arg(long, default_value_t = 11, env = "CAFE_VISIT_LIMIT")]
    pub visit_limit: u32,

    /// Number of cafes
    #[arg(long, default_value_t = 5, env = "CAFE_COUNT")]
    pub cafe_count: u32,

    /// Prefix of the generated cafe names
    #[arg(long, default_value = "Cafe_", env = "CAFE_NAME_PREFIX")]
    pub cafe_prefix: String,

    /// How the cafe of each visit is chosen
    #[arg(long, value_enum, default_value_t = Selection::RoundRobin, env = "CAFE_SELECTION")]
    pub selection: Selection,

    /// First simulated date (yyyy-MM-dd), today if omitted
    #[arg(long, value_parser = parse_date_arg, env = "CAFE_START_DATE")]
    pub start_date: Option<Date>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", env = "CAFE_LOG_LEVEL")]
    pub log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "CAFE_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Print configuration and exit
    #[arg(long)]
    pub print_config: bool,
}

fn parse_date_arg(s: &str) -> Result<Date, String> {
    return parse_iso_date(s).map_err(|e| format!("expected a date like 2024-01-31: {e}"));
}

/// Validated configuration.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub bind_addr: String,
    pub storage: StorageMode,
    pub db_path: PathBuf,
    #[serde(serialize_with = "serialize_millis")]
    pub interval: Duration,
    #[serde(serialize_with = "serialize_millis")]
    pub initial_delay: Duration,
    pub generator: GeneratorSettings,
    pub cafe_count: u32,
    pub cafe_prefix: String,
    #[serde(serialize_with = "serialize_date")]
    pub start_date: Date,
}

impl Config {
    /// Checks the arguments and fills in defaults that depend on the current time.
    pub fn from_args(args: &Args) -> Result<Config, error::Error> {
        if args.interval_ms == 0 {
            return Err(error::Error::InvalidConfig(String::from("interval must be at least 1 ms")));
        }
        if args.cafe_count == 0 {
            return Err(error::Error::InvalidConfig(String::from("cafe count must be at least 1")));
        }
        let generator = GeneratorSettings::new(args.generations_per_day, args.visit_limit, args.selection)?;

        return Ok(Config {
            bind_addr: format!("{}:{}", args.host, args.port),
            storage: args.storage,
            db_path: args.db_path.clone(),
            interval: Duration::from_millis(args.interval_ms),
            initial_delay: Duration::from_millis(args.initial_delay_ms),
            generator,
            cafe_count: args.cafe_count,
            cafe_prefix: args.cafe_prefix.clone(),
            start_date: args.start_date.unwrap_or_else(|| OffsetDateTime::now_utc().date()),
        });
    }

    pub fn to_json(&self) -> Result<String, error::Error> {
        return Ok(serde_json::to_string_pretty(self)?);
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    return serializer.serialize_u64(d.as_millis() as u64);
}

fn serialize_date<S: serde::Serializer>(d: &Date, serializer: S) -> Result<S::Ok, S::Error> {
    return serializer.collect_str(d);
}
