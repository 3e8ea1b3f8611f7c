use std::path::PathBuf;

use crate::derived::DerivedCache;
use crate::schedule::Schedule;
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Everything the sidecar owns for one session. `schedule` is only ever
/// replaced wholesale with the result of `Schedule::apply`.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub schedule: Schedule,
    pub derived: DerivedCache,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
            schedule: Schedule::default(),
            derived: DerivedCache::default(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
