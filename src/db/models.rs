//! Diesel model structs for locations, the person roster, daily weather and
//! per-person daily checks, plus the normalised rows the store hands back.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema;

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::locations)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub state: String,
    pub lat: f64,
    pub lon: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::locations)]
pub struct NewLocation {
    pub name: String,
    pub state: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::people)]
#[diesel(belongs_to(Location))]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub location_id: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::daily_weather)]
pub struct DailyWeather {
    pub d: NaiveDate,
    pub location_id: i64,
    pub high_temp_f: f64,
    pub precip_in: f64,
    pub snowfall_cm: f64,
    pub rained: bool,
    pub snowed: bool,
    pub raw: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::daily_weather)]
pub struct NewDailyWeather {
    pub d: NaiveDate,
    pub location_id: i64,
    pub high_temp_f: f64,
    pub precip_in: f64,
    pub snowfall_cm: f64,
    pub rained: bool,
    pub snowed: bool,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::person_checks)]
pub struct PersonCheck {
    pub d: NaiveDate,
    pub person_id: i64,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PersonCheck {
    /// Default row written during ingestion.
    pub fn pending(d: NaiveDate, person_id: i64) -> Self {
        PersonCheck {
            d,
            person_id,
            completed: false,
            completed_at: None,
        }
    }

    /// Row written by a user toggle; `completed_at` only survives when completed.
    pub fn toggled(d: NaiveDate, person_id: i64, completed: bool, at: DateTime<Utc>) -> Self {
        PersonCheck {
            d,
            person_id,
            completed,
            completed_at: completed.then_some(at),
        }
    }
}

/// Active person joined with the name of their location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub person_id: i64,
    pub name: String,
    pub location: String,
}

/// Weather row joined with its location, as served to readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherView {
    pub location: String,
    pub state: String,
    pub high_temp_f: f64,
    pub rained: bool,
    pub snowed: bool,
}
