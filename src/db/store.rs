//! Storage boundary used by the pipeline and the read/write services.
//!
//! Rows leave the store already normalised into strict records
//! ([`RosterEntry`], [`PersonCheck`], [`WeatherView`]); nothing above this
//! layer sees joins or optional columns it has to guess at.

use chrono::{NaiveDate, Utc};
use diesel::PgConnection;
use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::prelude::*;
use log::warn;
use std::collections::BTreeSet;

use crate::config::LocationSeed;
use crate::db::models as dbm;
use crate::db::models::{NewDailyWeather, PersonCheck, RosterEntry, WeatherView};
use crate::schema;

#[derive(Debug, Clone, PartialEq)]
pub struct StorageError {
    pub operation: &'static str,
    pub message: String,
}

impl StorageError {
    pub fn new(operation: &'static str, err: impl core::fmt::Display) -> Self {
        StorageError {
            operation,
            message: err.to_string(),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} failed: {}", self.operation, self.message)
    }
}

impl std::error::Error for StorageError {}

pub trait Store {
    /// Runs `f` so that either every write it performs lands or none does.
    fn atomically<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<StorageError>,
        F: FnOnce(&mut Self) -> Result<T, E>;

    /// Insert or refresh the location keyed by name; returns its id.
    fn upsert_location(&mut self, seed: &LocationSeed) -> Result<i64, StorageError>;

    /// Insert or replace the weather row keyed by (date, location).
    fn upsert_weather(&mut self, row: &NewDailyWeather) -> Result<(), StorageError>;

    fn active_people_at(&mut self, location_id: i64) -> Result<Vec<i64>, StorageError>;

    /// Insert a pending check for each person that has none on `date`.
    /// Existing rows are left untouched. Returns how many rows were created.
    fn seed_checks(&mut self, date: NaiveDate, person_ids: &[i64]) -> Result<usize, StorageError>;

    /// Overwrite the check keyed by (date, person).
    fn put_check(&mut self, check: &PersonCheck) -> Result<(), StorageError>;

    fn roster(&mut self) -> Result<Vec<RosterEntry>, StorageError>;

    fn checks_on(&mut self, date: NaiveDate) -> Result<Vec<PersonCheck>, StorageError>;

    fn weather_on(&mut self, date: NaiveDate) -> Result<Vec<WeatherView>, StorageError>;
}

pub struct PgStore {
    conn: PgConnection,
}

impl PgStore {
    pub fn connect(database_url: &str) -> Result<Self, String> {
        let conn = PgConnection::establish(database_url).map_err(|e| format!("DB connection failed: {}", e))?;
        Ok(PgStore { conn })
    }

    pub fn conn_mut(&mut self) -> &mut PgConnection {
        &mut self.conn
    }
}

impl Store for PgStore {
    fn atomically<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        E: From<StorageError>,
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        AnsiTransactionManager::begin_transaction(&mut self.conn)
            .map_err(|e| StorageError::new("begin transaction", e))?;
        match f(self) {
            Ok(value) => {
                AnsiTransactionManager::commit_transaction(&mut self.conn)
                    .map_err(|e| StorageError::new("commit transaction", e))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(e) = AnsiTransactionManager::rollback_transaction(&mut self.conn) {
                    warn!("rollback failed: {}", e);
                }
                Err(err)
            }
        }
    }

    fn upsert_location(&mut self, seed: &LocationSeed) -> Result<i64, StorageError> {
        use schema::locations::dsl as L;

        let new_row = dbm::NewLocation {
            name: seed.name.clone(),
            state: seed.state.clone(),
            lat: seed.lat,
            lon: seed.lon,
        };
        diesel::insert_into(L::locations)
            .values(&new_row)
            .on_conflict(L::name)
            .do_update()
            .set((
                L::state.eq(new_row.state.clone()),
                L::lat.eq(new_row.lat),
                L::lon.eq(new_row.lon),
                L::updated_at.eq(Utc::now()),
            ))
            .execute(&mut self.conn)
            .map_err(|e| StorageError::new("upsert location", e))?;

        L::locations
            .filter(L::name.eq(new_row.name))
            .select(L::id)
            .first(&mut self.conn)
            .map_err(|e| StorageError::new("fetch location", e))
    }

    fn upsert_weather(&mut self, row: &NewDailyWeather) -> Result<(), StorageError> {
        use schema::daily_weather::dsl as W;

        diesel::insert_into(W::daily_weather)
            .values(row)
            .on_conflict((W::d, W::location_id))
            .do_update()
            .set((
                W::high_temp_f.eq(row.high_temp_f),
                W::precip_in.eq(row.precip_in),
                W::snowfall_cm.eq(row.snowfall_cm),
                W::rained.eq(row.rained),
                W::snowed.eq(row.snowed),
                W::raw.eq(row.raw.clone()),
                W::fetched_at.eq(Utc::now()),
            ))
            .execute(&mut self.conn)
            .map(|_| ())
            .map_err(|e| StorageError::new("upsert weather", e))
    }

    fn active_people_at(&mut self, location_id: i64) -> Result<Vec<i64>, StorageError> {
        use schema::people::dsl as P;

        P::people
            .filter(P::location_id.eq(location_id).and(P::active.eq(true)))
            .select(P::id)
            .order(P::id.asc())
            .load(&mut self.conn)
            .map_err(|e| StorageError::new("list people", e))
    }

    fn seed_checks(&mut self, date: NaiveDate, person_ids: &[i64]) -> Result<usize, StorageError> {
        if person_ids.is_empty() {
            return Ok(0);
        }

        use schema::person_checks::dsl as C;

        let rows: Vec<PersonCheck> = person_ids.iter().map(|id| PersonCheck::pending(date, *id)).collect();
        diesel::insert_into(C::person_checks)
            .values(&rows)
            .on_conflict((C::d, C::person_id))
            .do_nothing()
            .execute(&mut self.conn)
            .map_err(|e| StorageError::new("seed checks", e))
    }

    fn put_check(&mut self, check: &PersonCheck) -> Result<(), StorageError> {
        use schema::person_checks::dsl as C;

        diesel::insert_into(C::person_checks)
            .values(check)
            .on_conflict((C::d, C::person_id))
            .do_update()
            .set((C::completed.eq(check.completed), C::completed_at.eq(check.completed_at)))
            .execute(&mut self.conn)
            .map(|_| ())
            .map_err(|e| StorageError::new("upsert check", e))
    }

    fn roster(&mut self) -> Result<Vec<RosterEntry>, StorageError> {
        use schema::locations::dsl as L;
        use schema::people::dsl as P;

        let rows: Vec<(dbm::Person, dbm::Location)> = P::people
            .inner_join(L::locations)
            .filter(P::active.eq(true))
            .select((dbm::Person::as_select(), dbm::Location::as_select()))
            .load(&mut self.conn)
            .map_err(|e| StorageError::new("list roster", e))?;

        let mut seen = BTreeSet::new();
        Ok(rows
            .into_iter()
            .filter(|(person, _)| seen.insert(person.id))
            .map(|(person, location)| RosterEntry {
                person_id: person.id,
                name: person.name,
                location: location.name,
            })
            .collect())
    }

    fn checks_on(&mut self, date: NaiveDate) -> Result<Vec<PersonCheck>, StorageError> {
        use schema::person_checks::dsl as C;

        C::person_checks
            .filter(C::d.eq(date))
            .select(PersonCheck::as_select())
            .load(&mut self.conn)
            .map_err(|e| StorageError::new("list checks", e))
    }

    fn weather_on(&mut self, date: NaiveDate) -> Result<Vec<WeatherView>, StorageError> {
        use schema::daily_weather::dsl as W;
        use schema::locations::dsl as L;

        let rows: Vec<(dbm::DailyWeather, dbm::Location)> = W::daily_weather
            .inner_join(L::locations)
            .filter(W::d.eq(date))
            .order(L::name.asc())
            .select((dbm::DailyWeather::as_select(), dbm::Location::as_select()))
            .load(&mut self.conn)
            .map_err(|e| StorageError::new("list weather", e))?;

        Ok(rows
            .into_iter()
            .map(|(weather, location)| WeatherView {
                location: location.name,
                state: location.state,
                high_temp_f: weather.high_temp_f,
                rained: weather.rained,
                snowed: weather.snowed,
            })
            .collect())
    }
}
