use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sqlx::{Pool, Sqlite, SqlitePool, Transaction};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    collector_error::CollectorError,
    data_interface::{DataInterface, DataInterfaceAccessTransaction},
    model::ArchivedSave,
};

const SCHEMA: [&str; 2] = [
    include_str!("../../sqlite_sqls/schema/change_set.sql"),
    include_str!("../../sqlite_sqls/schema/archived_save.sql"),
];

pub struct DataInterfaceSQLite {
    url: String,
    connection: Option<Pool<Sqlite>>,
}

impl DataInterfaceSQLite {
    pub fn new(url: String) -> Self {
        DataInterfaceSQLite {
            url,
            connection: None,
        }
    }
}

#[async_trait]
impl DataInterface for DataInterfaceSQLite {
    async fn init(&mut self) -> anyhow::Result<()> {
        let pool = SqlitePool::connect(&self.url).await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        info!(url = %self.url, "connected to archive");
        self.connection = Some(pool);
        Ok(())
    }

    async fn create_transaction(
        &self,
        change_source: String,
    ) -> anyhow::Result<Box<dyn DataInterfaceAccessTransaction>> {
        let mut transaction = self
            .connection
            .clone()
            .ok_or(CollectorError::NotConnected)?
            .begin()
            .await?;
        let change_set_id = sqlx::query(include_str!("../../sqlite_sqls/change_set/new.sql"))
            .bind(Utc::now().timestamp())
            .bind(&change_source)
            .execute(&mut transaction)
            .await?
            .last_insert_rowid();
        debug!(change_set_id, change_source = %change_source, "opened change set");

        Ok(Box::new(Arc::new(Mutex::new(
            DataInterfaceTransactionSQLite {
                transaction: Some(transaction),
                change_set_id,
            },
        ))))
    }
}

struct DataInterfaceTransactionSQLite {
    transaction: Option<Transaction<'static, Sqlite>>,
    change_set_id: i64,
}

#[derive(sqlx::FromRow)]
struct ArchivedSaveRecord {
    archive_id: i64,
    change_date: i64,
    world: i64,
    portals: Option<i64>,
    stats: Vec<u8>,
    raw: String,
}

impl ArchivedSaveRecord {
    fn into_archived_save(self) -> anyhow::Result<ArchivedSave> {
        Ok(ArchivedSave {
            archive_id: Some(self.archive_id),
            archived_at: Some(
                Utc.timestamp_opt(self.change_date, 0)
                    .single()
                    .ok_or_else(|| anyhow::anyhow!("invalid change date {}", self.change_date))?,
            ),
            world: u64::try_from(self.world)?,
            portals: self.portals.map(u64::try_from).transpose()?,
            stats: rmp_serde::from_slice(&self.stats)?,
            raw: self.raw,
        })
    }
}

macro_rules! data_transaction {
    ($dit:ident) => {
        $dit.transaction
            .as_mut()
            .ok_or(CollectorError::TransactionTaken)?
    };
}

#[async_trait]
impl DataInterfaceAccessTransaction for Arc<Mutex<DataInterfaceTransactionSQLite>> {
    async fn commit(&self) -> anyhow::Result<()> {
        self.lock()
            .await
            .transaction
            .take()
            .ok_or(CollectorError::TransactionTaken)?
            .commit()
            .await?;
        Ok(())
    }

    async fn rollback(&self) -> anyhow::Result<()> {
        self.lock()
            .await
            .transaction
            .take()
            .ok_or(CollectorError::TransactionTaken)?
            .rollback()
            .await?;
        Ok(())
    }

    async fn new_archived_save(
        &self,
        archived_save: ArchivedSave,
    ) -> anyhow::Result<ArchivedSave> {
        let mut data_interface_transaction = self.lock().await;
        let change_set_id = data_interface_transaction.change_set_id;
        let id = sqlx::query(include_str!("../../sqlite_sqls/archived_save/new.sql"))
            .bind(change_set_id)
            .bind(i64::try_from(archived_save.world)?)
            .bind(archived_save.portals.map(i64::try_from).transpose()?)
            .bind(rmp_serde::to_vec_named(&archived_save.stats)?)
            .bind(&archived_save.raw)
            .execute(data_transaction!(data_interface_transaction))
            .await?
            .last_insert_rowid();

        let record = sqlx::query_as::<_, ArchivedSaveRecord>(include_str!(
            "../../sqlite_sqls/archived_save/find/by_id.sql"
        ))
        .bind(id)
        .fetch_one(data_transaction!(data_interface_transaction))
        .await?;
        record.into_archived_save()
    }

    async fn find_archived_save_latest(&self) -> anyhow::Result<Option<ArchivedSave>> {
        let mut data_interface_transaction = self.lock().await;
        let possible_record = sqlx::query_as::<_, ArchivedSaveRecord>(include_str!(
            "../../sqlite_sqls/archived_save/find/latest.sql"
        ))
        .fetch_optional(data_transaction!(data_interface_transaction))
        .await?;
        possible_record
            .map(ArchivedSaveRecord::into_archived_save)
            .transpose()
    }

    async fn find_archived_save_by_id(&self, id: i64) -> anyhow::Result<Option<ArchivedSave>> {
        let mut data_interface_transaction = self.lock().await;
        let possible_record = sqlx::query_as::<_, ArchivedSaveRecord>(include_str!(
            "../../sqlite_sqls/archived_save/find/by_id.sql"
        ))
        .bind(id)
        .fetch_optional(data_transaction!(data_interface_transaction))
        .await?;
        possible_record
            .map(ArchivedSaveRecord::into_archived_save)
            .transpose()
    }

    async fn find_archived_save_by_all(&self) -> anyhow::Result<Vec<ArchivedSave>> {
        let mut data_interface_transaction = self.lock().await;
        let records = sqlx::query_as::<_, ArchivedSaveRecord>(include_str!(
            "../../sqlite_sqls/archived_save/find/by_all.sql"
        ))
        .fetch_all(data_transaction!(data_interface_transaction))
        .await?;
        records
            .into_iter()
            .map(ArchivedSaveRecord::into_archived_save)
            .collect()
    }
}
