pub mod models {
    pub mod open_meteo;
}

pub mod client;
pub mod config;
pub mod db {
    #[cfg(test)]
    pub mod memory;
    pub mod models;
    pub mod store;
}
pub mod envfile;
pub mod error;
pub mod schema;
pub mod units;
pub mod utils;
pub mod services {
    pub mod backfill;
    pub mod checks;
    pub mod ingest;
    pub mod refs;
}
#[cfg(test)]
pub mod testing;

use crate::client::WeatherClient;
use crate::config::Config;
use crate::db::store::PgStore;
use crate::services::{backfill, checks, ingest, refs};
use crate::utils::{parse_ymd, today_in, yesterday_in};
use chrono::{NaiveDate, Utc};
use clap::{ArgAction, Parser, Subcommand};
use diesel::PgConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use log::{error, info};
use serde_json::{Value, json};
use std::path::PathBuf;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(Debug, Parser)]
#[command(name = "daily-checks", version, about = "Daily weather ingestion and check roster")]
struct Cli {
    /// Load variables from this .env file instead of ./.env
    #[arg(long, global = true, value_name = "PATH")]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ingest one day for every location (default: yesterday)
    Fetch {
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<String>,
    },
    /// Ingest every day in [start, end] for every location
    Backfill {
        #[arg(long, value_name = "YYYY-MM-DD")]
        start: String,
        #[arg(long, value_name = "YYYY-MM-DD")]
        end: String,
    },
    /// Roster with completion state for a day (default: today)
    Checks {
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<String>,
    },
    /// Mark a person's check for a day as completed or not
    SetCheck {
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: String,
        #[arg(long)]
        person_id: i64,
        #[arg(long, action = ArgAction::Set)]
        completed: bool,
    },
    /// Recorded weather for a day (default: today)
    Weather {
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<String>,
    },
    /// Upsert the configured locations without fetching weather
    SyncLocations,
}

fn apply_database_migrations(conn: &mut PgConnection) -> Result<(), String> {
    match conn.run_pending_migrations(MIGRATIONS) {
        Ok(applied) => {
            if applied.is_empty() {
                info!("Database schema is up to date; no migrations were applied");
            } else {
                let names = applied.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
                info!("Applied {} database migration(s): {}", applied.len(), names);
            }
            Ok(())
        }
        Err(e) => Err(format!("Applying database migrations failed: {}", e)),
    }
}

fn open_store(cfg: &Config) -> Result<PgStore, String> {
    let mut store = PgStore::connect(&cfg.database_url)?;
    info!("Connected to database");
    apply_database_migrations(store.conn_mut())?;
    Ok(store)
}

fn date_or(arg: Option<&str>, default: impl FnOnce() -> NaiveDate) -> Result<NaiveDate, String> {
    match arg {
        Some(s) => parse_ymd(s),
        None => Ok(default()),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| format!("serializing response failed: {}", e))
}

/// Run one command and produce its JSON payload. Errors become `{error}` payloads.
fn execute(command: Command, cfg: &Config) -> Result<Value, String> {
    let now = Utc::now();
    match command {
        Command::Fetch { date } => {
            let date = date_or(date.as_deref(), || yesterday_in(cfg.timezone, now))?;
            let mut store = open_store(cfg)?;
            let client = WeatherClient::from_config(cfg);
            let date = ingest::ingest_day(&mut store, &client, cfg, date).map_err(|e| e.to_string())?;
            Ok(json!({ "ok": true, "date": date }))
        }
        Command::Backfill { start, end } => {
            let (start, end) = backfill::parse_range(&start, &end).map_err(|e| e.to_string())?;
            let mut store = open_store(cfg)?;
            let client = WeatherClient::from_config(cfg);
            to_json(&backfill::run_range(&mut store, &client, cfg, start, end))
        }
        Command::Checks { date } => {
            let date = date_or(date.as_deref(), || today_in(cfg.timezone, now))?;
            let mut store = open_store(cfg)?;
            to_json(&checks::checks_for_date(&mut store, date).map_err(|e| e.to_string())?)
        }
        Command::SetCheck {
            date,
            person_id,
            completed,
        } => {
            let date = parse_ymd(&date)?;
            let mut store = open_store(cfg)?;
            checks::set_check(&mut store, date, person_id, completed, now).map_err(|e| e.to_string())?;
            info!("Check for person {} on {} set to {}", person_id, date, completed);
            Ok(json!({ "ok": true }))
        }
        Command::Weather { date } => {
            let date = date_or(date.as_deref(), || today_in(cfg.timezone, now))?;
            let mut store = open_store(cfg)?;
            to_json(&checks::weather_for_date(&mut store, date).map_err(|e| e.to_string())?)
        }
        Command::SyncLocations => {
            let mut store = open_store(cfg)?;
            let locations = refs::sync_locations(&mut store, cfg).map_err(|e| e.to_string())?;
            Ok(json!({ "ok": true, "locations": locations }))
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let loaded_env = match envfile::load(cli.env_file.as_deref()) {
        Ok(info) => info,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        info!("Environment loaded from {} .env file: {}", origin, info.path.display());
    }

    info!(
        "daily-checks {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );

    let outcome = Config::from_env().and_then(|cfg| {
        info!(
            "Config loaded (locations={}, timezone={}, precip_threshold_in={}, source_timeout={}s, backfill_rps={})",
            cfg.locations.len(),
            cfg.timezone.name(),
            cfg.precip_threshold_in,
            cfg.source_timeout.as_secs(),
            cfg.backfill_requests_per_second
                .map(|v| v.get().to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
        execute(cli.command, &cfg)
    });

    match outcome {
        Ok(payload) => println!("{}", payload),
        Err(e) => {
            error!("{}", e);
            println!("{}", json!({ "error": e }));
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_set_check() {
        let cli = Cli::try_parse_from([
            "daily-checks",
            "set-check",
            "--date",
            "2025-01-02",
            "--person-id",
            "7",
            "--completed",
            "false",
        ])
        .unwrap();
        match cli.command {
            Command::SetCheck {
                date,
                person_id,
                completed,
            } => {
                assert_eq!(date, "2025-01-02");
                assert_eq!(person_id, 7);
                assert!(!completed);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn backfill_requires_both_bounds() {
        assert!(Cli::try_parse_from(["daily-checks", "backfill", "--start", "2025-01-01"]).is_err());
        assert!(Cli::try_parse_from(["daily-checks", "--env-file", "x.env", "sync-locations"]).is_ok());
    }

    #[test]
    fn date_defaults_only_when_absent() {
        let fallback = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(date_or(None, || fallback), Ok(fallback));
        assert_eq!(
            date_or(Some("2025-02-03"), || fallback),
            Ok(NaiveDate::from_ymd_opt(2025, 2, 3).unwrap())
        );
        assert!(date_or(Some("02/03/2025"), || fallback).is_err());
    }
}
