//! Read model for the daily roster and the user-driven check toggle.

use crate::db::models::{PersonCheck, RosterEntry, WeatherView};
use crate::db::store::Store;
use crate::error::PipelineError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonView {
    pub id: i64,
    pub name: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckView {
    pub person: PersonView,
    pub completed: bool,
}

/// One row per roster entry, `completed` defaulting to false when the
/// person has no check for the day. Sorted by name, then id.
pub fn merge_roster(roster: Vec<RosterEntry>, checks: &[PersonCheck]) -> Vec<CheckView> {
    let completed: BTreeMap<i64, bool> = checks.iter().map(|c| (c.person_id, c.completed)).collect();
    let mut seen = BTreeSet::new();

    let mut rows: Vec<CheckView> = roster
        .into_iter()
        .filter(|p| seen.insert(p.person_id))
        .map(|p| CheckView {
            completed: completed.get(&p.person_id).copied().unwrap_or(false),
            person: PersonView {
                id: p.person_id,
                name: p.name,
                location: p.location,
            },
        })
        .collect();
    rows.sort_by(|a, b| {
        a.person
            .name
            .cmp(&b.person.name)
            .then(a.person.id.cmp(&b.person.id))
    });
    rows
}

pub fn checks_for_date<S: Store>(store: &mut S, date: NaiveDate) -> Result<Vec<CheckView>, PipelineError> {
    let roster = store.roster()?;
    let checks = store.checks_on(date)?;
    Ok(merge_roster(roster, &checks))
}

/// Overwrites whatever check exists for (date, person).
pub fn set_check<S: Store>(
    store: &mut S,
    date: NaiveDate,
    person_id: i64,
    completed: bool,
    now: DateTime<Utc>,
) -> Result<(), PipelineError> {
    store.put_check(&PersonCheck::toggled(date, person_id, completed, now))?;
    Ok(())
}

/// Only locations with an ingested record for `date`; nothing is synthesised.
pub fn weather_for_date<S: Store>(store: &mut S, date: NaiveDate) -> Result<Vec<WeatherView>, PipelineError> {
    Ok(store.weather_on(date)?)
}
