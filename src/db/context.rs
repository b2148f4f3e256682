use crate::config::Config;
use crate::db::mapping::SchemaBuilder;
use crate::db::models::Brand;
use crate::error::PersistenceError;

/// Name of the connection string the rental context reads from configuration.
pub const RENTACAR_CONNECTION: &str = "RentACarDb";

/// Connection settings handed to a context before it is opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextOptions {
    connection_string: Option<String>,
}

impl ContextOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that already point at a SQLite database.
    pub fn sqlite(connection_string: impl Into<String>) -> Self {
        let mut options = Self::new();
        options.use_sqlite(connection_string);
        options
    }

    pub fn use_sqlite(&mut self, connection_string: impl Into<String>) -> &mut Self {
        self.connection_string = Some(connection_string.into());
        self
    }

    pub fn is_configured(&self) -> bool {
        self.connection_string.is_some()
    }

    pub fn connection_string(&self) -> Option<&str> {
        self.connection_string.as_deref()
    }
}

/// Lifecycle hooks a persistence context implements; driven by
/// [`Database::open`](crate::db::Database::open).
pub trait DbContext: Send + Sync {
    /// Supplies the connection. Only called when the caller's options are
    /// not already configured.
    fn configure(&self, options: &mut ContextOptions) -> Result<(), PersistenceError>;

    /// Declares entity mappings and seed data.
    fn define_schema(&self, schema: &mut SchemaBuilder);
}

/// The car rental persistence context: one `Brand` entity stored in `Brands`.
#[derive(Debug, Clone, Default)]
pub struct RentACarContext {
    configuration: Option<Config>,
}

impl RentACarContext {
    pub fn new(configuration: Config) -> Self {
        Self {
            configuration: Some(configuration),
        }
    }

    pub fn brand_seeds() -> [Brand; 2] {
        [Brand::new(1, "BMW"), Brand::new(2, "Mercedes")]
    }
}

impl DbContext for RentACarContext {
    fn configure(&self, options: &mut ContextOptions) -> Result<(), PersistenceError> {
        let config = self
            .configuration
            .as_ref()
            .ok_or(PersistenceError::MissingConfiguration)?;
        let connection = config.connection_string(RENTACAR_CONNECTION).ok_or_else(|| {
            PersistenceError::MissingConnectionString {
                name: RENTACAR_CONNECTION.to_string(),
            }
        })?;
        options.use_sqlite(connection);
        Ok(())
    }

    fn define_schema(&self, schema: &mut SchemaBuilder) {
        schema
            .entity::<Brand>()
            .to_table("Brands")
            .has_key("id")
            .has_column_name("id", "Id")
            .has_column_name("name", "Name")
            .has_data(Self::brand_seeds());
    }
}
