use crate::client::{SourceKind, Transport, WeatherClient};
use crate::config::{Config, LocationSeed};
use crate::db::models::NewDailyWeather;
use crate::db::store::Store;
use crate::error::{PipelineError, ReconcileError};
use crate::units::classify;
use chrono::NaiveDate;
use log::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileSummary {
    pub location_id: i64,
    pub source: SourceKind,
    pub people: usize,
    pub seeded: usize,
}

/// Fetch, classify and persist one (date, location), then make sure every
/// active person there has a check row for the date.
///
/// Safe to repeat: the weather row is replaced in place and existing checks
/// are never touched. All writes share one transaction.
pub fn reconcile<S: Store, T: Transport>(
    store: &mut S,
    client: &WeatherClient<T>,
    cfg: &Config,
    date: NaiveDate,
    location: &LocationSeed,
) -> Result<ReconcileSummary, ReconcileError> {
    let tag = |error: PipelineError| ReconcileError {
        date,
        location: location.name.clone(),
        error,
    };

    let reading = client
        .fetch_daily(location.lat, location.lon, date)
        .map_err(|e| tag(e.into()))?;

    let classified = classify(&reading.measurement, cfg.precip_threshold_in).ok_or_else(|| {
        tag(PipelineError::MissingMeasurement {
            location: location.name.clone(),
            date,
        })
    })?;

    let summary = store
        .atomically(|s| -> Result<ReconcileSummary, PipelineError> {
            let location_id = s.upsert_location(location)?;
            s.upsert_weather(&NewDailyWeather {
                d: date,
                location_id,
                high_temp_f: classified.high_temp_f,
                precip_in: classified.precip_in,
                snowfall_cm: classified.snowfall_cm,
                rained: classified.rained,
                snowed: classified.snowed,
                raw: reading.raw.clone(),
            })?;
            let people = s.active_people_at(location_id)?;
            let seeded = s.seed_checks(date, &people)?;
            Ok(ReconcileSummary {
                location_id,
                source: reading.source,
                people: people.len(),
                seeded,
            })
        })
        .map_err(tag)?;

    debug!(
        "Reconciled {} on {} via {:?}: high={:.1}F rained={} snowed={} (checks seeded {}/{})",
        location.name,
        date,
        reading.source,
        classified.high_temp_f,
        classified.rained,
        classified.snowed,
        summary.seeded,
        summary.people
    );
    Ok(summary)
}

/// Reconcile every configured location for `date`, stopping at the first failure.
pub fn ingest_day<S: Store, T: Transport>(
    store: &mut S,
    client: &WeatherClient<T>,
    cfg: &Config,
    date: NaiveDate,
) -> Result<NaiveDate, ReconcileError> {
    for location in &cfg.locations {
        reconcile(store, client, cfg, date, location)?;
    }
    info!("Ingested {} location(s) for {}", cfg.locations.len(), date);
    Ok(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HttpReply;
    use crate::db::memory::MemoryStore;
    use crate::db::models::PersonCheck;
    use crate::testing::{ScriptedTransport, daily_body, quincy, test_config, windham};
    use chrono::{TimeZone, Utc};
    use http::StatusCode;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    fn client(cfg: &Config, max_temp_c: f64, precip_mm: f64, snow_cm: f64) -> WeatherClient<ScriptedTransport> {
        let transport = ScriptedTransport::new(move |_, _| Ok(daily_body(max_temp_c, precip_mm, snow_cm)));
        WeatherClient::with_transport(transport, cfg)
    }

    #[test]
    fn reconcile_twice_keeps_one_identical_record() {
        let cfg = test_config();
        let client = client(&cfg, 5.0, 6.0, 0.0);
        let mut store = MemoryStore::new();

        reconcile(&mut store, &client, &cfg, day(), &windham()).unwrap();
        let first = store.weather_rows();
        reconcile(&mut store, &client, &cfg, day(), &windham()).unwrap();
        let second = store.weather_rows();

        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
        assert_eq!(second[0].high_temp_f, 41.0);
        assert!(second[0].rained);
        assert_eq!(second[0].raw["daily"]["precipitation_sum"][0], 6.0);
        assert_eq!(store.location_count(), 1);
    }

    #[test]
    fn seeds_pending_checks_for_everyone_at_the_location() {
        let cfg = test_config();
        let client = client(&cfg, 5.0, 0.0, 0.0);
        let mut store = MemoryStore::new();
        let ana = store.add_person("Ana", &windham());
        let ben = store.add_person("Ben", &windham());
        let cy = store.add_person("Cy", &quincy());

        let summary = reconcile(&mut store, &client, &cfg, day(), &windham()).unwrap();

        assert_eq!(summary.people, 2);
        assert_eq!(summary.seeded, 2);
        assert_eq!(store.check(day(), ana), Some(&PersonCheck::pending(day(), ana)));
        assert_eq!(store.check(day(), ben), Some(&PersonCheck::pending(day(), ben)));
        assert_eq!(store.check(day(), cy), None);
    }

    #[test]
    fn seeding_never_overwrites_a_completed_check() {
        let cfg = test_config();
        let client = client(&cfg, 5.0, 0.0, 0.0);
        let mut store = MemoryStore::new();
        let ana = store.add_person("Ana", &windham());
        let at = Utc.with_ymd_and_hms(2025, 1, 15, 18, 0, 0).unwrap();

        reconcile(&mut store, &client, &cfg, day(), &windham()).unwrap();
        store.put_check(&PersonCheck::toggled(day(), ana, true, at)).unwrap();
        let summary = reconcile(&mut store, &client, &cfg, day(), &windham()).unwrap();

        assert_eq!(summary.seeded, 0);
        let check = store.check(day(), ana).unwrap();
        assert!(check.completed);
        assert_eq!(check.completed_at, Some(at));
    }

    #[test]
    fn inactive_people_get_no_checks() {
        let cfg = test_config();
        let client = client(&cfg, 5.0, 0.0, 0.0);
        let mut store = MemoryStore::new();
        let gone = store.add_person("Gone", &windham());
        store.deactivate(gone);

        reconcile(&mut store, &client, &cfg, day(), &windham()).unwrap();
        assert_eq!(store.check(day(), gone), None);
    }

    #[test]
    fn missing_temperature_fails_without_writing() {
        let cfg = test_config();
        let transport = ScriptedTransport::new(|_, _| {
            Ok(HttpReply {
                status: StatusCode::OK,
                body: r#"{"daily":{"time":["2025-01-15"],"temperature_2m_max":[null]}}"#.into(),
            })
        });
        let client = WeatherClient::with_transport(transport, &cfg);
        let mut store = MemoryStore::new();

        let err = reconcile(&mut store, &client, &cfg, day(), &windham()).unwrap_err();
        assert_eq!(
            err.error,
            PipelineError::MissingMeasurement {
                location: "Windham".into(),
                date: day()
            }
        );
        assert_eq!(err.location, "Windham");
        assert!(store.weather_rows().is_empty());
    }

    #[test]
    fn failed_weather_write_rolls_back_and_skips_seeding() {
        let cfg = test_config();
        let client = client(&cfg, 5.0, 0.0, 0.0);
        let mut store = MemoryStore::new();
        store.add_person("Ana", &windham());
        store.fail_weather_for.insert("Windham".to_string());

        let err = reconcile(&mut store, &client, &cfg, day(), &windham()).unwrap_err();
        assert!(matches!(err.error, PipelineError::StorageFailure { ref operation, .. } if operation == "upsert weather"));
        assert_eq!(store.check_count(), 0);
    }

    #[test]
    fn source_failure_is_tagged_with_the_unit() {
        let cfg = test_config();
        let transport = ScriptedTransport::new(|_, _| {
            Ok(HttpReply {
                status: StatusCode::BAD_GATEWAY,
                body: "upstream down".into(),
            })
        });
        let client = WeatherClient::with_transport(transport, &cfg);
        let mut store = MemoryStore::new();

        let err = reconcile(&mut store, &client, &cfg, day(), &quincy()).unwrap_err();
        assert_eq!(err.date, day());
        assert_eq!(err.location, "Quincy");
        assert_eq!(
            err.error,
            PipelineError::SourceUnavailable {
                status: Some(502),
                message: "upstream down".into()
            }
        );
    }

    #[test]
    fn ingest_day_stops_at_first_failure() {
        let cfg = test_config();
        let transport = ScriptedTransport::new(|_, call| {
            if call.param("latitude") == Some("42.809") {
                Ok(HttpReply {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: String::new(),
                })
            } else {
                Ok(daily_body(1.0, 0.0, 0.0))
            }
        });
        let client = WeatherClient::with_transport(transport, &cfg);
        let mut store = MemoryStore::new();

        let err = ingest_day(&mut store, &client, &cfg, day()).unwrap_err();
        assert_eq!(err.location, "Windham");
        // Quincy comes after Windham and is never attempted
        assert_eq!(client.transport().calls().len(), 1);
        assert!(store.weather_rows().is_empty());
    }

    #[test]
    fn ingest_day_covers_every_location() {
        let cfg = test_config();
        let client = client(&cfg, -3.0, 4.0, 2.5);
        let mut store = MemoryStore::new();

        assert_eq!(ingest_day(&mut store, &client, &cfg, day()), Ok(day()));
        let rows = store.weather_rows();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.snowed && !r.rained));
    }
}
