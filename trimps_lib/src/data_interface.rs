use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::model::ArchivedSave;

#[async_trait]
pub trait DataInterface: Send + Sync {
    async fn init(&mut self) -> anyhow::Result<()>;

    async fn create_transaction(
        &self,
        change_source: String,
    ) -> anyhow::Result<Box<dyn DataInterfaceAccessTransaction>>;
}

#[async_trait]
pub trait DataInterfaceAccessTransaction: Send + Sync {
    async fn commit(&self) -> anyhow::Result<()>;
    async fn rollback(&self) -> anyhow::Result<()>;

    async fn new_archived_save(&self, archived_save: ArchivedSave)
        -> anyhow::Result<ArchivedSave>;

    async fn find_archived_save_latest(&self) -> anyhow::Result<Option<ArchivedSave>>;

    async fn find_archived_save_by_id(&self, id: i64) -> anyhow::Result<Option<ArchivedSave>>;

    async fn find_archived_save_by_all(&self) -> anyhow::Result<Vec<ArchivedSave>>;
}

#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum DataInterfaceType {
    Sqlite,
}
