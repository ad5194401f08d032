use std::{fs, io::ErrorKind, path::PathBuf, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{collector_error::CollectorError, data_interface::DataInterfaceType};

/// Writes to stdout when used as the json export target.
pub const STDOUT: &str = "-";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CollectorFile {
    pub savefile: PathBuf,
    pub poll_interval_secs: u64,
    pub export: ExportSection,
    pub archive: ArchiveSection,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ExportSection {
    pub prometheus: Option<PathBuf>,
    pub json: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ArchiveSection {
    pub data_interface: DataInterfaceType,
    pub url: String,
}

impl Default for CollectorFile {
    fn default() -> Self {
        CollectorFile {
            savefile: PathBuf::from("save.txt"),
            poll_interval_secs: 30,
            export: ExportSection::default(),
            archive: ArchiveSection::default(),
        }
    }
}

impl Default for ArchiveSection {
    fn default() -> Self {
        ArchiveSection {
            data_interface: DataInterfaceType::Sqlite,
            url: "sqlite://trimps-archive.db?mode=rwc".to_string(),
        }
    }
}

impl CollectorFile {
    /// A missing file is not an error; every key has a default. The result
    /// is not validated, callers apply their overrides first.
    pub fn load_file(path: PathBuf) -> anyhow::Result<CollectorFile> {
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(CollectorFile::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading config {}", path.display()))
            }
        };
        let file: CollectorFile = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(file)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!(CollectorError::InvalidConfig {
                reason: "poll_interval_secs must be at least 1".to_string()
            });
        }
        if self.archive.url.trim().is_empty() {
            anyhow::bail!(CollectorError::InvalidConfig {
                reason: "archive.url must not be empty".to_string()
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
