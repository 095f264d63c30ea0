//! Shared fixtures for unit tests: a scripted HTTP transport and canned payloads.

use http::StatusCode;
use std::cell::RefCell;

use crate::client::{HttpReply, SourceError, Transport};
use crate::config::{Config, LocationSeed};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl RecordedCall {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

type Responder = Box<dyn Fn(&str, &RecordedCall) -> Result<HttpReply, SourceError>>;

/// Answers every request through a closure and records what was asked.
pub struct ScriptedTransport {
    respond: Responder,
    calls: RefCell<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new(respond: impl Fn(&str, &RecordedCall) -> Result<HttpReply, SourceError> + 'static) -> Self {
        ScriptedTransport {
            respond: Box::new(respond),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpReply, SourceError> {
        let call = RecordedCall {
            url: url.to_string(),
            query: query.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        };
        self.calls.borrow_mut().push(call.clone());
        (self.respond)(url, &call)
    }
}

pub fn daily_body(max_temp_c: f64, precip_mm: f64, snow_cm: f64) -> HttpReply {
    let body = serde_json::json!({
        "latitude": 42.8,
        "longitude": -71.3,
        "timezone": "America/New_York",
        "daily": {
            "time": ["2024-01-01"],
            "temperature_2m_max": [max_temp_c],
            "precipitation_sum": [precip_mm],
            "snowfall_sum": [snow_cm],
        }
    });
    HttpReply {
        status: StatusCode::OK,
        body: body.to_string(),
    }
}

pub fn windham() -> LocationSeed {
    LocationSeed::new("Windham", "NH", 42.809, -71.304)
}

pub fn quincy() -> LocationSeed {
    LocationSeed::new("Quincy", "MA", 42.253, -71.002)
}

pub fn test_config() -> Config {
    Config {
        forecast_url: "http://forecast.test/v1/forecast".to_string(),
        archive_url: "http://archive.test/v1/archive".to_string(),
        locations: vec![windham(), quincy()],
        ..Config::default()
    }
}
