use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store's structure does not match what its recorded version promises.
    #[error("schema mismatch at version {version}: {detail}")]
    SchemaMismatch { version: u32, detail: String },

    #[error("no contiguous migration chain covers versions {from} to {to}")]
    MigrationChainIncomplete { from: u32, to: u32 },

    #[error("migration step {from} -> {to} failed, store remains at version {from}: {source}")]
    StepApplicationFailed {
        from: u32,
        to: u32,
        #[source]
        source: Box<StoreError>,
    },

    #[error("schema produced by step {from} -> {to} failed validation, store remains at version {from}: {detail}")]
    SchemaValidationFailed { from: u32, to: u32, detail: String },

    #[error("invalid feed url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// True for failures of the migration pipeline itself, where the host
    /// may offer to discard and recreate the store instead of hard-failing.
    pub fn is_migration_failure(&self) -> bool {
        matches!(
            self,
            StoreError::SchemaMismatch { .. }
                | StoreError::MigrationChainIncomplete { .. }
                | StoreError::StepApplicationFailed { .. }
                | StoreError::SchemaValidationFailed { .. }
                | StoreError::InvalidUrl { .. }
        )
    }
}
