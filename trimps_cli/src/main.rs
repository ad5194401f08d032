mod command_macros;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use trimps_lib::{
    collector::Collector,
    collector_file::CollectorFile,
    data_interface::DataInterfaceType,
    poller::{PollMode, Poller},
};

#[derive(Parser)] // requires `derive` feature
#[command(name = "trimps-collector", version)]
#[command(about = "A poller that loads a Trimps savefile and exports stats from it", long_about = None)]
struct Cli {
    #[arg(long, global = true, env = "TRIMPS_CONFIG", default_value = "trimps.toml")]
    config: PathBuf,
    #[arg(long, global = true, env = "TRIMPS_SAVEFILE")]
    savefile: Option<PathBuf>,
    /// Seconds between savefile checks.
    #[arg(long, global = true, env = "TRIMPS_POLL_INTERVAL")]
    interval: Option<u64>,
    #[arg(long, global = true, value_enum)]
    data_interface: Option<DataInterfaceType>,
    #[arg(long, global = true, env = "TRIMPS_ARCHIVE_URL")]
    archive_url: Option<String>,
    /// Path of the node exporter textfile to write.
    #[arg(long, global = true, env = "TRIMPS_PROMETHEUS_TEXTFILE")]
    prometheus: Option<PathBuf>,
    /// Path of the JSON stats file, `-` for stdout.
    #[arg(long, global = true, env = "TRIMPS_JSON")]
    json: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export stats from the savefile once.
    Poll,
    /// Export stats every time the savefile changes.
    Entrypoint,
    /// Archive every distinct savefile.
    #[command(name = "entrypoint-archiver", alias = "entrypoint.archiver")]
    EntrypointArchiver {
        #[command(subcommand)]
        command: Option<ArchiverSubcommands>,
    },
}

#[derive(Subcommand)]
enum ArchiverSubcommands {
    /// List archived saves.
    History,
    /// Print an archived save for import into the game.
    Restore {
        #[arg(short, long)]
        id: Option<i64>,
    },
}

impl Cli {
    fn collector_file(&self) -> anyhow::Result<CollectorFile> {
        let mut collector_file = CollectorFile::load_file(self.config.clone())?;
        if let Some(savefile) = &self.savefile {
            collector_file.savefile = savefile.clone();
        }
        if let Some(interval) = self.interval {
            collector_file.poll_interval_secs = interval;
        }
        if let Some(data_interface) = self.data_interface {
            collector_file.archive.data_interface = data_interface;
        }
        if let Some(archive_url) = &self.archive_url {
            collector_file.archive.url = archive_url.clone();
        }
        if let Some(prometheus) = &self.prometheus {
            collector_file.export.prometheus = Some(prometheus.clone());
        }
        if let Some(json) = &self.json {
            collector_file.export.json = Some(json.clone());
        }
        collector_file.validate()?;
        Ok(collector_file)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut collector = Collector::new(cli.collector_file()?)?;

    match &cli.command {
        Commands::Poll => {
            collector.poll_once().await?;
        }
        Commands::Entrypoint => {
            Poller::for_collector(&collector)
                .run(&mut collector, PollMode::Export)
                .await?;
        }
        Commands::EntrypointArchiver { command } => match command {
            None => {
                Poller::for_collector(&collector)
                    .run(&mut collector, PollMode::Archive)
                    .await?;
            }
            Some(ArchiverSubcommands::History) => {
                for archived_save in collector.history().await? {
                    println!(
                        "{}\t{}\tzone {}\tportals {}",
                        archived_save.archive_id.unwrap_or_default(),
                        archived_save
                            .archived_at
                            .map(|archived_at| archived_at.to_rfc3339())
                            .unwrap_or_default(),
                        archived_save.world,
                        archived_save
                            .portals
                            .map(|portals| portals.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                    );
                }
            }
            Some(ArchiverSubcommands::Restore { id }) => {
                let id = arg_input!(
                    id,
                    "Which archived save should be restored? (empty for the latest):"
                );
                let raw = if id.trim().is_empty() {
                    collector.restore_latest().await?
                } else {
                    let archive_id = id
                        .trim()
                        .parse::<i64>()
                        .with_context(|| format!("{:?} is not an archive id", id))?;
                    collector.restore(archive_id).await?
                };
                println!("{}", raw);
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use clap::CommandFactory;

    use super::*;

    /// The scripts the package installs, each one a subcommand.
    const SCRIPTS: [&str; 3] = ["entrypoint", "entrypoint.archiver", "poll"];

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn manifest_metadata() {
        assert_eq!(env!("CARGO_PKG_NAME"), "trimps-collector");
        assert_eq!(env!("CARGO_PKG_VERSION"), "0.0.1");
        assert_eq!(env!("CARGO_PKG_AUTHORS"), "Mike Cronce");
    }

    #[test]
    fn every_script_is_a_subcommand() {
        for script in SCRIPTS {
            assert!(
                Cli::try_parse_from(["trimps-collector", script]).is_ok(),
                "{} is not accepted",
                script
            );
        }
    }

    #[test]
    fn only_the_scripts_are_installed() {
        let command = Cli::command();
        let names: BTreeSet<String> = command
            .get_subcommands()
            .filter(|subcommand| subcommand.get_name() != "help")
            .map(|subcommand| subcommand.get_name().replace('-', "."))
            .collect();
        let scripts: BTreeSet<String> = SCRIPTS.iter().map(|script| script.to_string()).collect();
        assert_eq!(names, scripts);
    }

    #[test]
    fn flags_override_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("trimps.toml");
        std::fs::write(&config, "savefile = \"file.txt\"\npoll_interval_secs = 60\n").unwrap();

        let cli = Cli::try_parse_from([
            "trimps-collector",
            "--config",
            config.to_str().unwrap(),
            "poll",
            "--interval",
            "5",
            "--json",
            "-",
            "--data-interface",
            "sqlite",
        ])
        .unwrap();
        let collector_file = cli.collector_file().unwrap();
        assert_eq!(collector_file.savefile, PathBuf::from("file.txt"));
        assert_eq!(collector_file.poll_interval_secs, 5);
        assert_eq!(collector_file.export.json.as_deref(), Some("-"));
        assert_eq!(
            collector_file.archive.data_interface,
            DataInterfaceType::Sqlite
        );
    }

    #[test]
    fn zero_interval_flag_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from([
            "trimps-collector",
            "--config",
            dir.path().join("absent.toml").to_str().unwrap(),
            "--interval",
            "0",
            "entrypoint",
        ])
        .unwrap();
        assert!(cli.collector_file().is_err());
    }

    #[test]
    fn interval_flag_replaces_a_zero_interval_in_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("trimps.toml");
        std::fs::write(&config, "poll_interval_secs = 0\n").unwrap();

        let cli = Cli::try_parse_from([
            "trimps-collector",
            "--config",
            config.to_str().unwrap(),
            "--interval",
            "5",
            "entrypoint",
        ])
        .unwrap();
        assert_eq!(cli.collector_file().unwrap().poll_interval_secs, 5);
    }

    #[test]
    fn environment_fills_in_missing_flags() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("trimps.toml");
        std::fs::write(&config, "[archive]\nurl = \"sqlite://from-file.db\"\n").unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("from-env.db").display());
        std::env::set_var("TRIMPS_ARCHIVE_URL", &url);

        let cli = Cli::try_parse_from([
            "trimps-collector",
            "--config",
            config.to_str().unwrap(),
            "entrypoint.archiver",
        ]);
        std::env::remove_var("TRIMPS_ARCHIVE_URL");

        let collector_file = cli.unwrap().collector_file().unwrap();
        assert_eq!(collector_file.archive.url, url);
    }

    #[test]
    fn archiver_subcommands_parse() {
        let cli = Cli::try_parse_from(["trimps-collector", "entrypoint.archiver", "restore", "--id", "3"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::EntrypointArchiver {
                command: Some(ArchiverSubcommands::Restore { id: Some(3) })
            }
        ));
    }
}
