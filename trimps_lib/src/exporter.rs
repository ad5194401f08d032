use std::path::PathBuf;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::error;

use crate::{
    collector_file::{ExportSection, STDOUT},
    exporters::{
        exporter_json::{JsonExporter, JsonTarget},
        exporter_prometheus::PrometheusTextfileExporter,
    },
    model::Stats,
};

#[async_trait]
pub trait Exporter: Send + Sync {
    fn name(&self) -> &str;

    async fn export(&self, stats: &Stats) -> anyhow::Result<()>;
}

/// Builds the configured exporters, falling back to JSON on stdout when
/// nothing is configured.
pub fn from_config(export: &ExportSection) -> Vec<Box<dyn Exporter>> {
    let mut exporters: Vec<Box<dyn Exporter>> = Vec::new();
    if let Some(path) = &export.prometheus {
        exporters.push(Box::new(PrometheusTextfileExporter::new(path.clone())));
    }
    if let Some(target) = &export.json {
        exporters.push(Box::new(JsonExporter::new(if target == STDOUT {
            JsonTarget::Stdout
        } else {
            JsonTarget::File(PathBuf::from(target))
        })));
    }
    if exporters.is_empty() {
        exporters.push(Box::new(JsonExporter::new(JsonTarget::Stdout)));
    }
    exporters
}

/// Runs every exporter; one failing does not stop the others. Returns the
/// first error.
pub async fn export_all(exporters: &[Box<dyn Exporter>], stats: &Stats) -> anyhow::Result<()> {
    let results = join_all(exporters.iter().map(|exporter| exporter.export(stats))).await;
    let mut first_error = None;
    for (exporter, result) in exporters.iter().zip(results) {
        if let Err(err) = result {
            error!(exporter = exporter.name(), "export failed: {:#}", err);
            first_error.get_or_insert(err);
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    struct Counting {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Exporter for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn export(&self, _stats: &Stats) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("exporter down");
            }
            Ok(())
        }
    }

    fn stats() -> Stats {
        crate::save::Save::parse(r#"{"global":{"world":9}}"#)
            .unwrap()
            .stats()
            .unwrap()
    }

    #[test]
    fn empty_config_falls_back_to_stdout() {
        let exporters = from_config(&ExportSection::default());
        assert_eq!(exporters.len(), 1);
        assert_eq!(exporters[0].name(), "json");
    }

    #[test]
    fn configured_exporters_are_all_built() {
        let exporters = from_config(&ExportSection {
            prometheus: Some(PathBuf::from("trimps.prom")),
            json: Some("stats.json".to_string()),
        });
        let names: Vec<&str> = exporters.iter().map(|exporter| exporter.name()).collect();
        assert_eq!(names, vec!["prometheus", "json"]);
    }

    #[tokio::test]
    async fn failure_does_not_skip_other_exporters() {
        let calls = Arc::new(AtomicUsize::new(0));
        let exporters: Vec<Box<dyn Exporter>> = vec![
            Box::new(Counting {
                calls: calls.clone(),
                fail: true,
            }),
            Box::new(Counting {
                calls: calls.clone(),
                fail: false,
            }),
        ];
        let err = export_all(&exporters, &stats()).await.unwrap_err();
        assert_eq!(err.to_string(), "exporter down");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn all_succeeding_is_ok() {
        let calls = Arc::new(AtomicUsize::new(0));
        let exporters: Vec<Box<dyn Exporter>> = vec![Box::new(Counting {
            calls: calls.clone(),
            fail: false,
        })];
        export_all(&exporters, &stats()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
