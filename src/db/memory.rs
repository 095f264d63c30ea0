//! In-memory [`Store`] used by the pipeline tests. Keys and conflict rules
//! mirror the Postgres tables.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::LocationSeed;
use crate::db::models::{NewDailyWeather, PersonCheck, RosterEntry, WeatherView};
use crate::db::store::{StorageError, Store};

#[derive(Debug, Clone, Default)]
struct Tables {
    // name -> (id, seed)
    locations: BTreeMap<String, (i64, LocationSeed)>,
    // id -> (name, location_id, active)
    people: BTreeMap<i64, (String, i64, bool)>,
    weather: BTreeMap<(NaiveDate, i64), NewDailyWeather>,
    checks: BTreeMap<(NaiveDate, i64), PersonCheck>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Tables,
    next_id: i64,
    /// Locations whose weather upserts fail.
    pub fail_weather_for: BTreeSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn add_person(&mut self, name: &str, location: &LocationSeed) -> i64 {
        let location_id = match self.tables.locations.get(&location.name) {
            Some((id, _)) => *id,
            None => {
                let id = self.next_id();
                self.tables.locations.insert(location.name.clone(), (id, location.clone()));
                id
            }
        };
        let id = self.next_id();
        self.tables.people.insert(id, (name.to_string(), location_id, true));
        id
    }

    pub fn deactivate(&mut self, person_id: i64) {
        if let Some(p) = self.tables.people.get_mut(&person_id) {
            p.2 = false;
        }
    }

    pub fn location_id(&self, name: &str) -> Option<i64> {
        self.tables.locations.get(name).map(|(id, _)| *id)
    }

    pub fn location_count(&self) -> usize {
        self.tables.locations.len()
    }

    pub fn weather_rows(&self) -> Vec<NewDailyWeather> {
        self.tables.weather.values().cloned().collect()
    }

    pub fn check(&self, date: NaiveDate, person_id: i64) -> Option<&PersonCheck> {
        self.tables.checks.get(&(date, person_id))
    }

    pub fn check_count(&self) -> usize {
        self.tables.checks.len()
    }
}

impl Store for MemoryStore {
    fn atomically<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        E: From<StorageError>,
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        let snapshot = self.tables.clone();
        let result = f(self);
        if result.is_err() {
            self.tables = snapshot;
        }
        result
    }

    fn upsert_location(&mut self, seed: &LocationSeed) -> Result<i64, StorageError> {
        if let Some((id, existing)) = self.tables.locations.get_mut(&seed.name) {
            *existing = seed.clone();
            return Ok(*id);
        }
        let id = self.next_id();
        self.tables.locations.insert(seed.name.clone(), (id, seed.clone()));
        Ok(id)
    }

    fn upsert_weather(&mut self, row: &NewDailyWeather) -> Result<(), StorageError> {
        let failing = self
            .tables
            .locations
            .iter()
            .any(|(name, (id, _))| *id == row.location_id && self.fail_weather_for.contains(name));
        if failing {
            return Err(StorageError::new("upsert weather", "injected failure"));
        }
        self.tables.weather.insert((row.d, row.location_id), row.clone());
        Ok(())
    }

    fn active_people_at(&mut self, location_id: i64) -> Result<Vec<i64>, StorageError> {
        Ok(self
            .tables
            .people
            .iter()
            .filter(|(_, (_, loc, active))| *loc == location_id && *active)
            .map(|(id, _)| *id)
            .collect())
    }

    fn seed_checks(&mut self, date: NaiveDate, person_ids: &[i64]) -> Result<usize, StorageError> {
        let mut created = 0;
        for id in person_ids {
            if !self.tables.people.contains_key(id) {
                return Err(StorageError::new("seed checks", format!("unknown person {}", id)));
            }
            if let std::collections::btree_map::Entry::Vacant(slot) = self.tables.checks.entry((date, *id)) {
                slot.insert(PersonCheck::pending(date, *id));
                created += 1;
            }
        }
        Ok(created)
    }

    fn put_check(&mut self, check: &PersonCheck) -> Result<(), StorageError> {
        if !self.tables.people.contains_key(&check.person_id) {
            return Err(StorageError::new(
                "upsert check",
                format!("person {} does not exist", check.person_id),
            ));
        }
        self.tables.checks.insert((check.d, check.person_id), check.clone());
        Ok(())
    }

    fn roster(&mut self) -> Result<Vec<RosterEntry>, StorageError> {
        let names: BTreeMap<i64, &str> = self
            .tables
            .locations
            .iter()
            .map(|(name, (id, _))| (*id, name.as_str()))
            .collect();
        Ok(self
            .tables
            .people
            .iter()
            .filter(|(_, (_, _, active))| *active)
            .map(|(id, (name, loc, _))| RosterEntry {
                person_id: *id,
                name: name.clone(),
                location: names.get(loc).copied().unwrap_or_default().to_string(),
            })
            .collect())
    }

    fn checks_on(&mut self, date: NaiveDate) -> Result<Vec<PersonCheck>, StorageError> {
        Ok(self
            .tables
            .checks
            .values()
            .filter(|c| c.d == date)
            .cloned()
            .collect())
    }

    fn weather_on(&mut self, date: NaiveDate) -> Result<Vec<WeatherView>, StorageError> {
        Ok(self
            .tables
            .locations
            .iter()
            .filter_map(|(name, (id, seed))| {
                self.tables.weather.get(&(date, *id)).map(|w| WeatherView {
                    location: name.clone(),
                    state: seed.state.clone(),
                    high_temp_f: w.high_temp_f,
                    rained: w.rained,
                    snowed: w.snowed,
                })
            })
            .collect())
    }
}
