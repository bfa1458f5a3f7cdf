use thiserror::Error;

#[derive(Debug, Error)]
pub enum StackError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("type error: {0}")]
    Type(#[from] histsync_types::TypeError),

    #[error("history log error: {0}")]
    Log(#[from] histsync_log::LogError),

    #[error("watermark error: {0}")]
    Watermark(#[from] histsync_watermark::WatermarkError),

    #[error("sync error: {0}")]
    Sync(#[from] histsync_processor::SyncError),

    #[error("watcher task failed: {0}")]
    Watcher(String),
}

pub type Result<T> = std::result::Result<T, StackError>;
