use crate::config::Config;
use crate::db::store::Store;
use crate::error::PipelineError;
use log::{debug, info};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncedLocation {
    pub id: i64,
    pub name: String,
    pub state: String,
}

/// Upsert every configured location by name, without touching weather.
pub fn sync_locations<S: Store>(store: &mut S, cfg: &Config) -> Result<Vec<SyncedLocation>, PipelineError> {
    info!("Syncing {} location(s)", cfg.locations.len());
    store.atomically(|s| {
        cfg.locations
            .iter()
            .map(|loc| -> Result<SyncedLocation, PipelineError> {
                let id = s.upsert_location(loc)?;
                debug!("Refs: {} ({}) -> id {}", loc.name, loc.state, id);
                Ok(SyncedLocation {
                    id,
                    name: loc.name.clone(),
                    state: loc.state.clone(),
                })
            })
            .collect::<Result<Vec<_>, PipelineError>>()
    })
}
