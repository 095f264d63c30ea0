//! Subset of the Open-Meteo daily response used for ingestion.
//!
//! Forecast and archive endpoints share this shape. Every daily series is an
//! array aligned with `time`; single-day requests carry one element.

use crate::units::RawMeasurement;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DAILY_FIELDS: &str = "temperature_2m_max,precipitation_sum,snowfall_sum";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyResponse {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub daily_units: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub daily: Option<DailySeries>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailySeries {
    #[serde(default)]
    pub time: Vec<NaiveDate>,
    #[serde(default)]
    pub temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    pub snowfall_sum: Vec<Option<f64>>,
}

/// Body returned alongside 4xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub reason: Option<String>,
}

impl DailyResponse {
    /// Measurement at index 0. Absent series or null entries come back as `None`.
    pub fn first_day(&self) -> RawMeasurement {
        let Some(daily) = self.daily.as_ref() else {
            return RawMeasurement::default();
        };
        let first = |series: &[Option<f64>]| series.first().copied().flatten();
        RawMeasurement {
            max_temp_c: first(&daily.temperature_2m_max),
            precip_mm: first(&daily.precipitation_sum),
            snow_cm: first(&daily.snowfall_sum),
        }
    }
}
