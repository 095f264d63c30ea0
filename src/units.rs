//! Conversion of raw metric measurements into canonical units and the daily
//! rain/snow flags.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PRECIP_THRESHOLD_IN: f64 = 0.05;
pub const MM_PER_INCH: f64 = 25.4;

/// One day of measurements as delivered by the source (metric units).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMeasurement {
    pub max_temp_c: Option<f64>,
    pub precip_mm: Option<f64>,
    pub snow_cm: Option<f64>,
}

/// Canonical values persisted for a (date, location).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classified {
    pub high_temp_f: f64,
    pub precip_in: f64,
    pub snowfall_cm: f64,
    pub rained: bool,
    pub snowed: bool,
}

pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

pub fn mm_to_inches(mm: f64) -> f64 {
    mm / MM_PER_INCH
}

fn amount_or_zero(v: Option<f64>) -> f64 {
    v.filter(|x| x.is_finite()).unwrap_or(0.0)
}

/// Returns `None` when the high temperature is absent or not finite; the
/// caller decides how to report that. Missing precipitation and snowfall
/// count as zero.
///
/// Snow dominates: a day with any snowfall never reports `rained`.
pub fn classify(raw: &RawMeasurement, precip_threshold_in: f64) -> Option<Classified> {
    let max_temp_c = raw.max_temp_c.filter(|t| t.is_finite())?;
    let precip_in = mm_to_inches(amount_or_zero(raw.precip_mm));
    let snowfall_cm = amount_or_zero(raw.snow_cm);

    let snowed = snowfall_cm > 0.0;
    let rained = precip_in > precip_threshold_in && !snowed;

    Some(Classified {
        high_temp_f: celsius_to_fahrenheit(max_temp_c),
        precip_in,
        snowfall_cm,
        rained,
        snowed,
    })
}
