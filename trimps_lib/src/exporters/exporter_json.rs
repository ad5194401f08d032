use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use tracing::debug;

use crate::{exporter::Exporter, model::Stats};

#[derive(Debug, Clone, PartialEq)]
pub enum JsonTarget {
    Stdout,
    File(PathBuf),
}

pub struct JsonExporter {
    target: JsonTarget,
}

impl JsonExporter {
    pub fn new(target: JsonTarget) -> Self {
        JsonExporter { target }
    }
}

#[async_trait]
impl Exporter for JsonExporter {
    fn name(&self) -> &str {
        "json"
    }

    async fn export(&self, stats: &Stats) -> anyhow::Result<()> {
        let rendered = serde_json::to_string_pretty(stats)?;
        match &self.target {
            JsonTarget::Stdout => println!("{}", rendered),
            JsonTarget::File(path) => {
                tokio::fs::write(path, rendered + "\n")
                    .await
                    .with_context(|| format!("writing {}", path.display()))?;
                debug!(path = %path.display(), "wrote json stats");
            }
        }
        Ok(())
    }
}
