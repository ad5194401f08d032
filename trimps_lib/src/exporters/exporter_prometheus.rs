//! Prometheus text exposition for the node exporter textfile collector.
//!
//! The file is written next to its destination and renamed into place so the
//! collector never scrapes a half-written file.

use std::{fmt::Write as _, path::PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use tracing::debug;

use crate::{exporter::Exporter, model::Stats};

const PREFIX: &str = "trimps_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetricType {
    Gauge,
    Counter,
}

impl MetricType {
    fn as_str(self) -> &'static str {
        match self {
            MetricType::Gauge => "gauge",
            MetricType::Counter => "counter",
        }
    }
}

/// One metric family: a header and its samples.
struct Family<'a> {
    name: &'a str,
    help: &'a str,
    metric_type: MetricType,
    samples: Vec<(Option<&'a str>, f64)>,
}

impl<'a> Family<'a> {
    fn new(name: &'a str, help: &'a str, metric_type: MetricType) -> Self {
        Family {
            name,
            help,
            metric_type,
            samples: Vec::new(),
        }
    }

    fn single(name: &'a str, help: &'a str, metric_type: MetricType, value: Option<f64>) -> Self {
        let mut family = Family::new(name, help, metric_type);
        if let Some(value) = value {
            family.samples.push((None, value));
        }
        family
    }

    fn render(&self, output: &mut String) {
        if self.samples.is_empty() {
            return;
        }
        let name = format!("{}{}", PREFIX, self.name);
        // Writing to a String cannot fail.
        let _ = writeln!(output, "# HELP {} {}", name, self.help);
        let _ = writeln!(output, "# TYPE {} {}", name, self.metric_type.as_str());
        for (label, value) in &self.samples {
            match label {
                Some(label) => {
                    let _ = writeln!(
                        output,
                        "{}{{name=\"{}\"}} {}",
                        name,
                        escape_label_value(label),
                        format_value(*value)
                    );
                }
                None => {
                    let _ = writeln!(output, "{} {}", name, format_value(*value));
                }
            }
        }
    }
}

fn escape_label_value(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

pub fn render(stats: &Stats) -> String {
    use MetricType::{Counter, Gauge};

    let mut families = vec![
        Family::single("world", "Current zone", Gauge, Some(stats.world as f64)),
        Family::single(
            "cell",
            "Cell being fought in the current zone",
            Gauge,
            stats.cell.map(|cell| cell as f64),
        ),
        Family::single(
            "highest_zone",
            "Highest zone reached",
            Gauge,
            stats.highest_zone.map(|zone| zone as f64),
        ),
        Family::single(
            "portals_total",
            "Portals taken",
            Counter,
            stats.portals.map(|portals| portals as f64),
        ),
        Family::single(
            "helium_earned_total",
            "Helium earned across all runs",
            Counter,
            stats.helium_earned,
        ),
        Family::single("game_version", "Game version of the save", Gauge, stats.version),
        Family::single(
            "run_started_timestamp_seconds",
            "Start of the current run",
            Gauge,
            stats
                .run_started
                .map(|started| started.timestamp_millis() as f64 / 1000.0),
        ),
        Family::single(
            "last_online_timestamp_seconds",
            "Last time the game was saved while running",
            Gauge,
            stats
                .last_online
                .map(|online| online.timestamp_millis() as f64 / 1000.0),
        ),
        Family::single(
            "trimps_employed",
            "Trimps assigned to jobs",
            Gauge,
            stats.trimps_employed,
        ),
    ];

    let mut owned = Family::new("resource_owned", "Resource amount owned", Gauge);
    let mut max = Family::new("resource_max", "Resource storage cap", Gauge);
    for (name, resource) in &stats.resources {
        owned.samples.push((Some(name.as_str()), resource.owned));
        if let Some(cap) = resource.max {
            max.samples.push((Some(name.as_str()), cap));
        }
    }
    families.push(owned);
    families.push(max);

    let mut jobs = Family::new("job_owned", "Workers per job", Gauge);
    jobs.samples
        .extend(stats.jobs.iter().map(|(name, count)| (Some(name.as_str()), *count)));
    families.push(jobs);

    let mut buildings = Family::new("building_owned", "Buildings owned", Gauge);
    buildings
        .samples
        .extend(stats.buildings.iter().map(|(name, count)| (Some(name.as_str()), *count)));
    families.push(buildings);

    let mut output = String::new();
    for family in &families {
        family.render(&mut output);
    }
    output
}

pub struct PrometheusTextfileExporter {
    path: PathBuf,
}

impl PrometheusTextfileExporter {
    pub fn new(path: PathBuf) -> Self {
        PrometheusTextfileExporter { path }
    }
}

#[async_trait]
impl Exporter for PrometheusTextfileExporter {
    fn name(&self) -> &str {
        "prometheus"
    }

    async fn export(&self, stats: &Stats) -> anyhow::Result<()> {
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);

        tokio::fs::write(&staging, render(stats))
            .await
            .with_context(|| format!("writing {}", staging.display()))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .with_context(|| format!("moving metrics into {}", self.path.display()))?;
        debug!(path = %self.path.display(), world = stats.world, "wrote prometheus textfile");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::save::{tests::SAVE_JSON, Save};

    fn stats() -> Stats {
        Save::parse(SAVE_JSON).unwrap().stats().unwrap()
    }

    #[test]
    fn renders_headers_and_samples() {
        let output = render(&stats());
        assert!(output.contains("# HELP trimps_world Current zone\n# TYPE trimps_world gauge\ntrimps_world 57\n"));
        assert!(output.contains("# TYPE trimps_portals_total counter\ntrimps_portals_total 12\n"));
        assert!(output.contains("trimps_helium_earned_total 18234.5\n"));
        assert!(output.contains("trimps_run_started_timestamp_seconds 1700000000\n"));
        assert!(output.contains("trimps_resource_owned{name=\"food\"} 1500000000\n"));
        assert!(output.contains("trimps_resource_max{name=\"trimps\"} 1000\n"));
        assert!(!output.contains("trimps_resource_max{name=\"science\"}"));
        assert!(output.contains("trimps_job_owned{name=\"Farmer\"} 200\n"));
        assert!(output.contains("trimps_building_owned{name=\"Hut\"} 20\n"));
    }

    #[test]
    fn absent_stats_have_no_family() {
        let stats = Save::parse(r#"{"global":{"world":1}}"#)
            .unwrap()
            .stats()
            .unwrap();
        let output = render(&stats);
        assert!(output.contains("trimps_world 1\n"));
        assert!(!output.contains("trimps_portals_total"));
        assert!(!output.contains("trimps_resource_owned"));
    }

    #[test]
    fn label_values_are_escaped() {
        let mut stats = stats();
        stats.buildings.insert("Odd \"Hut\"\\\n".to_string(), 1.0);
        let output = render(&stats);
        assert!(output.contains("trimps_building_owned{name=\"Odd \\\"Hut\\\"\\\\\\n\"} 1\n"));
    }

    #[test]
    fn special_values_use_exposition_spelling() {
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(0.25), "0.25");
    }

    #[tokio::test]
    async fn replaces_the_textfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trimps.prom");
        std::fs::write(&path, "stale\n").unwrap();

        PrometheusTextfileExporter::new(path.clone())
            .export(&stats())
            .await
            .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, render(&stats()));
        assert!(!dir.path().join("trimps.prom.tmp").exists());
    }
}
