//! Blocking HTTP client for the Open-Meteo daily endpoints.
//!
//! - Blocking client using `ureq` (no async).
//! - The forecast endpoint is asked first; it only serves a short window
//!   around today and answers `400 Bad Request` for anything older, in which
//!   case the identical query is replayed once against the archive endpoint.
//! - HTTP goes through the [`Transport`] trait so the fallback strategy can be
//!   exercised without a network.

use chrono::NaiveDate;
use chrono_tz::Tz;
use http::StatusCode;
use log::debug;
use serde::Serialize;
use std::time::Duration;

use crate::config::Config;
use crate::models::open_meteo::{DAILY_FIELDS, DailyResponse, ErrorBody};
use crate::units::RawMeasurement;

#[derive(Debug, Clone, PartialEq)]
pub enum SourceError {
    Transport(String),
    Timeout(String),
    Http { status: u16, message: String },
    Decode(String),
}

impl core::fmt::Display for SourceError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SourceError::Transport(s) => write!(f, "transport error: {}", s),
            SourceError::Timeout(s) => write!(f, "timed out: {}", s),
            SourceError::Http { status, message } => write!(f, "http {}: {}", status, message),
            SourceError::Decode(s) => write!(f, "invalid payload: {}", s),
        }
    }
}

impl std::error::Error for SourceError {}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: StatusCode,
    pub body: String,
}

pub trait Transport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpReply, SourceError>;
}

pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        UreqTransport {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpReply, SourceError> {
        let mut req = self.agent.get(url).header("Accept", "application/json");
        for (k, v) in query {
            req = req.query(*k, v);
        }
        let mut res = req.call().map_err(map_ureq_error)?;
        let status = res.status();
        let body = res.body_mut().read_to_string().map_err(map_ureq_error)?;
        Ok(HttpReply { status, body })
    }
}

fn map_ureq_error(e: ureq::Error) -> SourceError {
    match e {
        ureq::Error::Timeout(t) => SourceError::Timeout(format!("{:?}", t)),
        other => SourceError::Transport(other.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Forecast,
    Archive,
}

/// One decoded day from either endpoint, with the original payload kept for auditing.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyReading {
    pub source: SourceKind,
    pub measurement: RawMeasurement,
    pub raw: serde_json::Value,
}

/// Result of the forecast-then-archive strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    PrimaryOk(DailyReading),
    FallbackOk(DailyReading),
    /// Forecast failed with something other than a bad request; archive not tried.
    PrimaryFailed(SourceError),
    BothFailed { primary: SourceError, fallback: SourceError },
}

impl FetchOutcome {
    pub fn into_result(self) -> Result<DailyReading, SourceError> {
        match self {
            FetchOutcome::PrimaryOk(r) | FetchOutcome::FallbackOk(r) => Ok(r),
            FetchOutcome::PrimaryFailed(e) => Err(e),
            FetchOutcome::BothFailed { primary, fallback } => {
                debug!("archive fallback failed after forecast error ({})", primary);
                Err(fallback)
            }
        }
    }
}

pub struct WeatherClient<T: Transport> {
    transport: T,
    forecast_url: String,
    archive_url: String,
    timezone: Tz,
}

impl WeatherClient<UreqTransport> {
    pub fn from_config(cfg: &Config) -> Self {
        WeatherClient::with_transport(UreqTransport::new(cfg.source_timeout), cfg)
    }
}

impl<T: Transport> WeatherClient<T> {
    pub fn with_transport(transport: T, cfg: &Config) -> Self {
        WeatherClient {
            transport,
            forecast_url: cfg.forecast_url.clone(),
            archive_url: cfg.archive_url.clone(),
            timezone: cfg.timezone,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn daily_query(&self, lat: f64, lon: f64, date: NaiveDate) -> Vec<(&'static str, String)> {
        let day = date.format("%Y-%m-%d").to_string();
        vec![
            ("latitude", lat.to_string()),
            ("longitude", lon.to_string()),
            ("daily", DAILY_FIELDS.to_string()),
            ("timezone", self.timezone.name().to_string()),
            ("start_date", day.clone()),
            ("end_date", day),
        ]
    }

    fn get_daily(&self, url: &str, query: &[(&str, String)], source: SourceKind) -> Result<DailyReading, SourceError> {
        let reply = self.transport.get(url, query)?;
        if !reply.status.is_success() {
            return Err(SourceError::Http {
                status: reply.status.as_u16(),
                message: error_message(&reply.body),
            });
        }
        decode_daily(&reply.body, source)
    }

    /// Forecast first; on `400` replay the identical query against the archive.
    pub fn fetch_outcome(&self, lat: f64, lon: f64, date: NaiveDate) -> FetchOutcome {
        let query = self.daily_query(lat, lon, date);
        match self.get_daily(&self.forecast_url, &query, SourceKind::Forecast) {
            Ok(reading) => FetchOutcome::PrimaryOk(reading),
            Err(SourceError::Http { status: 400, message }) => {
                debug!("forecast rejected {} ({}), falling back to archive", date, message);
                let primary = SourceError::Http { status: 400, message };
                match self.get_daily(&self.archive_url, &query, SourceKind::Archive) {
                    Ok(reading) => FetchOutcome::FallbackOk(reading),
                    Err(fallback) => FetchOutcome::BothFailed { primary, fallback },
                }
            }
            Err(e) => FetchOutcome::PrimaryFailed(e),
        }
    }

    pub fn fetch_daily(&self, lat: f64, lon: f64, date: NaiveDate) -> Result<DailyReading, SourceError> {
        self.fetch_outcome(lat, lon, date).into_result()
    }
}

fn decode_daily(body: &str, source: SourceKind) -> Result<DailyReading, SourceError> {
    let raw: serde_json::Value = serde_json::from_str(body).map_err(|e| SourceError::Decode(e.to_string()))?;
    let parsed: DailyResponse =
        serde_path_to_error::deserialize(&raw).map_err(|e| SourceError::Decode(e.to_string()))?;
    Ok(DailyReading {
        source,
        measurement: parsed.first_day(),
        raw,
    })
}

fn error_message(body: &str) -> String {
    if let Ok(ErrorBody { reason: Some(reason) }) = serde_json::from_str::<ErrorBody>(body) {
        return reason;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "request failed".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedTransport, daily_body, test_config};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 10).unwrap()
    }

    #[test]
    fn forecast_success_makes_one_call() {
        let cfg = test_config();
        let transport = ScriptedTransport::new(|_, _| Ok(daily_body(4.0, 0.0, 0.0)));
        let client = WeatherClient::with_transport(transport, &cfg);

        let outcome = client.fetch_outcome(42.8, -71.3, day());
        assert!(matches!(outcome, FetchOutcome::PrimaryOk(ref r) if r.source == SourceKind::Forecast));
        let calls = client.transport().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, cfg.forecast_url);
        assert_eq!(calls[0].param("start_date"), Some("2024-02-10"));
        assert_eq!(calls[0].param("end_date"), Some("2024-02-10"));
        assert_eq!(calls[0].param("timezone"), Some("America/New_York"));
    }

    #[test]
    fn bad_request_falls_back_once_with_identical_query() {
        let cfg = test_config();
        let forecast = cfg.forecast_url.clone();
        let transport = ScriptedTransport::new(move |url, _| {
            if url == forecast {
                Ok(HttpReply {
                    status: StatusCode::BAD_REQUEST,
                    body: r#"{"error":true,"reason":"start_date is out of allowed range"}"#.into(),
                })
            } else {
                Ok(daily_body(-2.0, 3.0, 1.5))
            }
        });
        let client = WeatherClient::with_transport(transport, &cfg);

        let outcome = client.fetch_outcome(42.8, -71.3, day());
        let FetchOutcome::FallbackOk(reading) = outcome else {
            panic!("expected archive fallback");
        };
        assert_eq!(reading.source, SourceKind::Archive);
        assert_eq!(reading.measurement.snow_cm, Some(1.5));

        let calls = client.transport().calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].url, cfg.archive_url);
        assert_eq!(calls[0].query, calls[1].query);
    }

    #[test]
    fn server_error_does_not_fall_back() {
        let cfg = test_config();
        let transport = ScriptedTransport::new(|_, _| {
            Ok(HttpReply {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "maintenance".into(),
            })
        });
        let client = WeatherClient::with_transport(transport, &cfg);

        let outcome = client.fetch_outcome(42.8, -71.3, day());
        assert_eq!(
            outcome,
            FetchOutcome::PrimaryFailed(SourceError::Http {
                status: 503,
                message: "maintenance".into()
            })
        );
        assert_eq!(client.transport().calls().len(), 1);
    }

    #[test]
    fn archive_failure_reports_both() {
        let cfg = test_config();
        let forecast = cfg.forecast_url.clone();
        let transport = ScriptedTransport::new(move |url, _| {
            let status = if url == forecast {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            Ok(HttpReply {
                status,
                body: String::new(),
            })
        });
        let client = WeatherClient::with_transport(transport, &cfg);

        let err = client.fetch_daily(42.8, -71.3, day()).unwrap_err();
        assert_eq!(
            err,
            SourceError::Http {
                status: 500,
                message: "request failed".into()
            }
        );
        assert_eq!(client.transport().calls().len(), 2);
    }

    #[test]
    fn transport_timeout_is_not_a_fallback_trigger() {
        let cfg = test_config();
        let transport = ScriptedTransport::new(|_, _| Err(SourceError::Timeout("global".into())));
        let client = WeatherClient::with_transport(transport, &cfg);

        assert!(matches!(
            client.fetch_outcome(42.8, -71.3, day()),
            FetchOutcome::PrimaryFailed(SourceError::Timeout(_))
        ));
        assert_eq!(client.transport().calls().len(), 1);
    }

    #[test]
    fn malformed_payload_is_a_decode_error() {
        let cfg = test_config();
        let transport = ScriptedTransport::new(|_, _| {
            Ok(HttpReply {
                status: StatusCode::OK,
                body: r#"{"daily": {"temperature_2m_max": "warm"}}"#.into(),
            })
        });
        let client = WeatherClient::with_transport(transport, &cfg);

        let err = client.fetch_daily(42.8, -71.3, day()).unwrap_err();
        let SourceError::Decode(msg) = err else {
            panic!("expected decode error");
        };
        assert!(msg.contains("daily.temperature_2m_max"), "{}", msg);
    }
}
