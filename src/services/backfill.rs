use crate::client::{Transport, WeatherClient};
use crate::config::{Config, LocationSeed};
use crate::db::store::Store;
use crate::error::{PipelineError, ReconcileError};
use crate::services::ingest::{ReconcileSummary, reconcile};
use crate::utils::{dates_inclusive, parse_ymd};
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::Serialize;
use std::num::NonZeroU32;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitFailure {
    pub date: NaiveDate,
    pub location: String,
    pub error: String,
}

impl From<ReconcileError> for UnitFailure {
    fn from(value: ReconcileError) -> Self {
        UnitFailure {
            date: value.date,
            location: value.location,
            error: value.error.to_string(),
        }
    }
}

/// Outcome of one (date, location) reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitResult {
    Done {
        date: NaiveDate,
        location: String,
        summary: ReconcileSummary,
    },
    Failed(UnitFailure),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    pub ok: bool,
    pub total_days: usize,
    pub total_ops: usize,
    pub failures: Vec<UnitFailure>,
}

impl BackfillReport {
    pub fn aggregate(total_days: usize, location_count: usize, results: Vec<UnitResult>) -> Self {
        let failures: Vec<UnitFailure> = results
            .into_iter()
            .filter_map(|r| match r {
                UnitResult::Failed(f) => Some(f),
                UnitResult::Done {
                    date,
                    location,
                    summary,
                } => {
                    debug!(
                        "Backfill: {} @ {} done via {:?} (location id {}, {} check(s) seeded)",
                        location, date, summary.source, summary.location_id, summary.seeded
                    );
                    None
                }
            })
            .collect();
        BackfillReport {
            ok: failures.is_empty(),
            total_days,
            total_ops: total_days * location_count,
            failures,
        }
    }
}

/// Validate raw `start`/`end` inputs. A reversed range is allowed and simply
/// yields no units.
pub fn parse_range(start: &str, end: &str) -> Result<(NaiveDate, NaiveDate), PipelineError> {
    let start = parse_ymd(start).map_err(|e| PipelineError::InvalidRange(format!("start: {}", e)))?;
    let end = parse_ymd(end).map_err(|e| PipelineError::InvalidRange(format!("end: {}", e)))?;
    Ok((start, end))
}

/// Every (date, location) pair in the range, date-major.
pub fn plan_units(dates: &[NaiveDate], locations: &[LocationSeed]) -> Vec<(NaiveDate, usize)> {
    dates
        .iter()
        .flat_map(|d| (0..locations.len()).map(move |i| (*d, i)))
        .collect()
}

/// Run every unit in `[start, end]` independently; a failed unit is
/// recorded and the rest carry on.
pub fn run_range<S: Store, T: Transport>(
    store: &mut S,
    client: &WeatherClient<T>,
    cfg: &Config,
    start: NaiveDate,
    end: NaiveDate,
) -> BackfillReport {
    let dates = dates_inclusive(start, end);
    let units = plan_units(&dates, &cfg.locations);
    let spacing = request_spacing(cfg.backfill_requests_per_second);

    info!(
        "Backfill: {} day(s) x {} location(s) from {} to {}",
        dates.len(),
        cfg.locations.len(),
        start,
        end
    );

    let results: Vec<UnitResult> = units
        .into_iter()
        .map(|(date, idx)| {
            let location = &cfg.locations[idx];
            let started = Instant::now();
            let result = match reconcile(&mut *store, client, cfg, date, location) {
                Ok(summary) => UnitResult::Done {
                    date,
                    location: location.name.clone(),
                    summary,
                },
                Err(e) => {
                    warn!("Backfill: {}", e);
                    UnitResult::Failed(e.into())
                }
            };
            pace(started, spacing);
            result
        })
        .collect();

    let report = BackfillReport::aggregate(dates.len(), cfg.locations.len(), results);
    info!(
        "Backfill complete: {} unit(s), {} failed",
        report.total_ops,
        report.failures.len()
    );
    report
}

/// Parse inputs then run; malformed input rejects the whole request.
pub fn run<S: Store, T: Transport>(
    store: &mut S,
    client: &WeatherClient<T>,
    cfg: &Config,
    start: &str,
    end: &str,
) -> Result<BackfillReport, PipelineError> {
    let (start, end) = parse_range(start, end)?;
    Ok(run_range(store, client, cfg, start, end))
}

fn request_spacing(limit: Option<NonZeroU32>) -> Option<Duration> {
    limit.map(|l| Duration::from_secs_f64(1.0 / l.get() as f64))
}

fn pace(started: Instant, spacing: Option<Duration>) {
    if let Some(required) = spacing {
        let elapsed = started.elapsed();
        if elapsed < required {
            thread::sleep(required - elapsed);
        }
    }
}
