use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub owned: f64,
    /// Storage cap; absent when the game reports the resource as uncapped.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max: Option<f64>,
}

/// Progress snapshot extracted from a savefile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub version: Option<f64>,
    pub world: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cell: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub highest_zone: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub portals: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub helium_earned: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub run_started: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_online: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub trimps_employed: Option<f64>,
    #[serde(default)]
    pub resources: BTreeMap<String, Resource>,
    #[serde(default)]
    pub jobs: BTreeMap<String, f64>,
    #[serde(default)]
    pub buildings: BTreeMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct ArchivedSave {
    pub archive_id: Option<i64>,
    pub archived_at: Option<DateTime<Utc>>,
    pub world: u64,
    pub portals: Option<u64>,
    pub stats: Stats,
    pub raw: String,
}
