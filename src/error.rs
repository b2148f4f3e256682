use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum PersistenceError {
    #[error("No configuration supplied and no connection set on the context options")]
    MissingConfiguration,

    #[error("Connection string '{name}' is not configured")]
    MissingConnectionString { name: String },

    #[error("Invalid connection string: {reason}")]
    InvalidConnectionString { reason: String },

    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] Box<figment::Error>),

    #[error("Invalid entity model: {0}")]
    Schema(String),

    #[error("Failed to connect to database: {0}")]
    Connect(#[source] SqlxError),

    #[error("Duplicate key {key} in table '{table}'")]
    DuplicateKey { table: String, key: String },

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),
}

impl PersistenceError {
    /// True for failures raised before any database access was attempted.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            PersistenceError::MissingConfiguration
                | PersistenceError::MissingConnectionString { .. }
                | PersistenceError::InvalidConnectionString { .. }
                | PersistenceError::ConfigLoad(_)
        )
    }
}

impl From<figment::Error> for PersistenceError {
    fn from(e: figment::Error) -> Self {
        PersistenceError::ConfigLoad(Box::new(e))
    }
}
