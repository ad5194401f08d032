use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("the savefile is not a Trimps save: {reason}")]
    NotATrimpsSave { reason: String },
    #[error("the savefile is not valid LZ-String base64: {reason}")]
    InvalidLzString { reason: String },
    #[error("the archived save {archive_id} could not be found")]
    ArchivedSaveNotFound { archive_id: i64 },
    #[error("the archive has no saves yet")]
    ArchiveEmpty,
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
    #[error("not connected to an archive")]
    NotConnected,
    #[error("the transaction has already been committed or rolled back")]
    TransactionTaken,
}
