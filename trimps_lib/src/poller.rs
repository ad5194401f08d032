use std::{future::Future, path::PathBuf, time::{Duration, SystemTime}};

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::collector::Collector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// Export stats each time the savefile changes.
    Export,
    /// Archive the savefile each time it changes.
    Archive,
}

pub struct Poller {
    interval: Duration,
    savefile: PathBuf,
    last_modified: Option<SystemTime>,
}

impl Poller {
    pub fn new(interval: Duration, savefile: PathBuf) -> Self {
        Poller {
            interval,
            savefile,
            last_modified: None,
        }
    }

    pub fn for_collector(collector: &Collector) -> Self {
        Poller::new(
            collector.collector_file.poll_interval(),
            collector.collector_file.savefile.clone(),
        )
    }

    /// Modification time of the savefile when it differs from the last
    /// successfully processed one.
    pub async fn changed(&self) -> anyhow::Result<Option<SystemTime>> {
        let modified = tokio::fs::metadata(&self.savefile).await?.modified()?;
        Ok((self.last_modified != Some(modified)).then_some(modified))
    }

    pub async fn tick(&mut self, collector: &mut Collector, mode: PollMode) -> anyhow::Result<bool> {
        let Some(modified) = self.changed().await? else {
            debug!(savefile = %self.savefile.display(), "savefile unchanged");
            return Ok(false);
        };
        match mode {
            PollMode::Export => {
                collector.poll_once().await?;
            }
            PollMode::Archive => {
                collector.archive_once().await?;
            }
        }
        self.last_modified = Some(modified);
        Ok(true)
    }

    /// Ticks until `shutdown` resolves. Tick errors are logged, not returned.
    pub async fn run_until<F>(
        &mut self,
        collector: &mut Collector,
        mode: PollMode,
        shutdown: F,
    ) -> anyhow::Result<()>
    where
        F: Future,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            savefile = %self.savefile.display(),
            interval_secs = self.interval.as_secs(),
            ?mode,
            "polling savefile"
        );
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutting down");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.tick(collector, mode).await {
                        error!(?mode, "poll failed: {:#}", err);
                    }
                }
            }
        }
    }

    pub async fn run(&mut self, collector: &mut Collector, mode: PollMode) -> anyhow::Result<()> {
        self.run_until(collector, mode, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("cannot listen for ctrl-c: {}", err);
                std::future::pending::<()>().await;
            }
        })
        .await
    }
}
