use tracing::info;

use crate::{
    collector_error::CollectorError,
    collector_file::CollectorFile,
    data_interface::{DataInterface, DataInterfaceType},
    data_interfaces::data_interface_sqlite::DataInterfaceSQLite,
    exporter::{self, Exporter},
    model::{ArchivedSave, Stats},
    save::Save,
};

const CHANGE_SOURCE: &str = "trimps-collector";

pub struct Collector {
    pub collector_file: CollectorFile,
    exporters: Vec<Box<dyn Exporter>>,
    data_interface: Option<Box<dyn DataInterface>>,
}

impl Collector {
    pub fn new(collector_file: CollectorFile) -> anyhow::Result<Collector> {
        collector_file.validate()?;
        let exporters = exporter::from_config(&collector_file.export);
        Ok(Collector {
            collector_file,
            exporters,
            data_interface: None,
        })
    }

    pub fn with_exporters(mut self, exporters: Vec<Box<dyn Exporter>>) -> Self {
        self.exporters = exporters;
        self
    }

    /// Connects to the archive on first use; polling alone never touches it.
    async fn archive(&mut self) -> anyhow::Result<&dyn DataInterface> {
        if self.data_interface.is_none() {
            let mut data_interface: Box<dyn DataInterface> =
                match &self.collector_file.archive.data_interface {
                    DataInterfaceType::Sqlite => Box::new(DataInterfaceSQLite::new(
                        self.collector_file.archive.url.clone(),
                    )),
                };
            data_interface.init().await?;
            self.data_interface = Some(data_interface);
        }
        Ok(self
            .data_interface
            .as_deref()
            .ok_or(CollectorError::NotConnected)?)
    }

    pub async fn load_save(&self) -> anyhow::Result<Save> {
        Save::load(&self.collector_file.savefile).await
    }

    pub async fn poll_once(&mut self) -> anyhow::Result<Stats> {
        let stats = self.load_save().await?.stats()?;
        exporter::export_all(&self.exporters, &stats).await?;
        info!(
            world = stats.world,
            cell = stats.cell,
            portals = stats.portals,
            "exported stats"
        );
        Ok(stats)
    }

    /// Stores the savefile unless it is identical to the latest archived one.
    pub async fn archive_once(&mut self) -> anyhow::Result<Option<ArchivedSave>> {
        let save = self.load_save().await?;
        let stats = save.stats()?;

        let transaction = self
            .archive()
            .await?
            .create_transaction(CHANGE_SOURCE.to_owned())
            .await?;

        if let Some(latest) = transaction.find_archived_save_latest().await? {
            if latest.raw == save.raw {
                transaction.rollback().await?;
                info!(archive_id = latest.archive_id, "savefile unchanged, not archiving");
                return Ok(None);
            }
        }

        let archived = transaction
            .new_archived_save(ArchivedSave {
                archive_id: None,
                archived_at: None,
                world: stats.world,
                portals: stats.portals,
                stats,
                raw: save.raw,
            })
            .await?;
        transaction.commit().await?;
        info!(
            archive_id = archived.archive_id,
            world = archived.world,
            "archived savefile"
        );
        Ok(Some(archived))
    }

    pub async fn history(&mut self) -> anyhow::Result<Vec<ArchivedSave>> {
        let transaction = self
            .archive()
            .await?
            .create_transaction(CHANGE_SOURCE.to_owned())
            .await?;
        let archived_saves = transaction.find_archived_save_by_all().await?;
        transaction.rollback().await?;
        Ok(archived_saves)
    }

    /// Raw text of an archived save, ready to import into the game.
    pub async fn restore(&mut self, archive_id: i64) -> anyhow::Result<String> {
        let transaction = self
            .archive()
            .await?
            .create_transaction(CHANGE_SOURCE.to_owned())
            .await?;
        let possible_archived_save = transaction.find_archived_save_by_id(archive_id).await?;
        transaction.rollback().await?;
        match possible_archived_save {
            Some(archived_save) => Ok(archived_save.raw),
            None => anyhow::bail!(CollectorError::ArchivedSaveNotFound { archive_id }),
        }
    }

    pub async fn restore_latest(&mut self) -> anyhow::Result<String> {
        let transaction = self
            .archive()
            .await?
            .create_transaction(CHANGE_SOURCE.to_owned())
            .await?;
        let possible_archived_save = transaction.find_archived_save_latest().await?;
        transaction.rollback().await?;
        Ok(possible_archived_save
            .ok_or(CollectorError::ArchiveEmpty)?
            .raw)
    }
}
