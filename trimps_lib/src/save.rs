use std::{collections::BTreeMap, path::Path};

use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    collector_error::CollectorError,
    lz_string,
    model::{Resource, Stats},
};

/// A decoded Trimps savefile.
#[derive(Debug, Clone)]
pub struct Save {
    pub raw: String,
    pub game: Map<String, Value>,
}

impl Save {
    /// Accepts both the exported LZ-String text and plain JSON.
    pub fn parse(raw: &str) -> anyhow::Result<Save> {
        let raw = raw.trim();
        let json = if raw.starts_with('{') {
            raw.to_string()
        } else {
            lz_string::decompress_from_base64(raw)?
        };

        let game = match serde_json::from_str::<Value>(&json) {
            Ok(Value::Object(game)) => game,
            Ok(_) => anyhow::bail!(CollectorError::NotATrimpsSave {
                reason: "the decoded save is not a JSON object".to_string()
            }),
            Err(err) => anyhow::bail!(CollectorError::NotATrimpsSave {
                reason: err.to_string()
            }),
        };

        Ok(Save {
            raw: raw.to_string(),
            game,
        })
    }

    pub async fn load(path: &Path) -> anyhow::Result<Save> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading savefile {}", path.display()))?;
        debug!(path = %path.display(), bytes = content.len(), "loaded savefile");
        Save::parse(&content)
    }

    pub fn stats(&self) -> anyhow::Result<Stats> {
        let global = self
            .game
            .get("global")
            .and_then(Value::as_object)
            .ok_or_else(|| CollectorError::NotATrimpsSave {
                reason: "missing the global section".to_string(),
            })?;
        let world = global
            .get("world")
            .and_then(as_count)
            .ok_or_else(|| CollectorError::NotATrimpsSave {
                reason: "missing global.world".to_string(),
            })?;

        let resources = self.section("resources");

        Ok(Stats {
            version: global.get("version").and_then(Value::as_f64),
            world,
            cell: global
                .get("lastClearedCell")
                .and_then(Value::as_f64)
                .and_then(|cell| count(cell + 1.0)),
            highest_zone: global
                .get("highestLevelCleared")
                .and_then(Value::as_f64)
                .and_then(|zone| count(zone + 1.0)),
            portals: global.get("totalPortals").and_then(as_count),
            helium_earned: global.get("totalHeliumEarned").and_then(Value::as_f64),
            run_started: global.get("portalTime").and_then(as_timestamp),
            last_online: global.get("lastOnline").and_then(as_timestamp),
            trimps_employed: resources
                .and_then(|resources| resources.get("trimps"))
                .and_then(|trimps| trimps.get("employed"))
                .and_then(Value::as_f64),
            resources: resources
                .map(|resources| {
                    resources
                        .iter()
                        .filter_map(|(name, resource)| {
                            let owned = resource.get("owned")?.as_f64()?;
                            let max = resource
                                .get("max")
                                .and_then(Value::as_f64)
                                .filter(|max| *max > 0.0);
                            Some((name.clone(), Resource { owned, max }))
                        })
                        .collect()
                })
                .unwrap_or_default(),
            jobs: self.owned_counts("jobs"),
            buildings: self.owned_counts("buildings"),
        })
    }

    fn section(&self, name: &str) -> Option<&Map<String, Value>> {
        self.game.get(name).and_then(Value::as_object)
    }

    fn owned_counts(&self, section: &str) -> BTreeMap<String, f64> {
        self.section(section)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|(name, entry)| {
                        Some((name.clone(), entry.get("owned")?.as_f64()?))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn count(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0).then_some(value as u64)
}

fn as_count(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| count(value.as_f64()?))
}

fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let millis = value.as_f64()?;
    Utc.timestamp_millis_opt(millis as i64).single()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAVE_JSON: &str = r#"{
        "global": {
            "version": 5.9,
            "world": 57,
            "lastClearedCell": 41,
            "highestLevelCleared": 63,
            "totalPortals": 12,
            "totalHeliumEarned": 18234.5,
            "portalTime": 1700000000000,
            "lastOnline": 1700003600000
        },
        "resources": {
            "food": { "owned": 1.5e9, "max": 2e9 },
            "science": { "owned": 4321, "max": -1 },
            "trimps": { "owned": 880, "max": 1000, "employed": 600 },
            "helium": { "owned": 250 },
            "notes": "not a resource"
        },
        "jobs": {
            "Farmer": { "owned": 200, "locked": 0 },
            "Miner": { "owned": 150, "locked": 0 },
            "Geneticist": { "locked": 1 }
        },
        "buildings": {
            "Hut": { "owned": 20 },
            "Warpstation": { "owned": 0 }
        }
    }"#;

    #[test]
    fn extracts_stats_from_plain_json() {
        let stats = Save::parse(SAVE_JSON).unwrap().stats().unwrap();
        assert_eq!(stats.version, Some(5.9));
        assert_eq!(stats.world, 57);
        assert_eq!(stats.cell, Some(42));
        assert_eq!(stats.highest_zone, Some(64));
        assert_eq!(stats.portals, Some(12));
        assert_eq!(stats.helium_earned, Some(18234.5));
        assert_eq!(stats.trimps_employed, Some(600.0));
        assert_eq!(
            stats.run_started,
            Utc.timestamp_opt(1_700_000_000, 0).single()
        );
        assert_eq!(
            stats.resources.get("food"),
            Some(&Resource {
                owned: 1.5e9,
                max: Some(2e9)
            })
        );
        assert_eq!(stats.resources["science"].max, None);
        assert!(!stats.resources.contains_key("notes"));
        assert_eq!(stats.jobs.len(), 2);
        assert_eq!(stats.jobs["Farmer"], 200.0);
        assert_eq!(stats.buildings["Warpstation"], 0.0);
    }

    #[test]
    fn parses_the_exported_format() {
        let exported = lz_string::compress_to_base64(SAVE_JSON);
        let save = Save::parse(&exported).unwrap();
        assert_eq!(save.raw, exported);
        assert_eq!(save.stats().unwrap().world, 57);
    }

    #[test]
    fn optional_fields_stay_absent() {
        let stats = Save::parse(r#"{"global":{"world":1}}"#)
            .unwrap()
            .stats()
            .unwrap();
        assert_eq!(stats.world, 1);
        assert_eq!(stats.portals, None);
        assert_eq!(stats.cell, None);
        assert!(stats.resources.is_empty());
        assert!(stats.jobs.is_empty());
    }

    #[test]
    fn rejects_saves_without_a_world() {
        let err = Save::parse(r#"{"global":{"version":5.9}}"#)
            .unwrap()
            .stats()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CollectorError>(),
            Some(CollectorError::NotATrimpsSave { .. })
        ));
    }

    #[test]
    fn rejects_json_that_is_not_an_object() {
        let exported = lz_string::compress_to_base64("[1, 2, 3]");
        let err = Save::parse(&exported).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CollectorError>(),
            Some(CollectorError::NotATrimpsSave { .. })
        ));
    }

    #[tokio::test]
    async fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("save.txt");
        std::fs::write(&path, format!("{}\n", lz_string::compress_to_base64(SAVE_JSON))).unwrap();
        let save = Save::load(&path).await.unwrap();
        assert_eq!(save.stats().unwrap().portals, Some(12));
    }

    #[tokio::test]
    async fn missing_savefile_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Save::load(&dir.path().join("absent.txt")).await.is_err());
    }
}
