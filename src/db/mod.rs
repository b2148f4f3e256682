//! Persistence layer: entity catalog, SQL generation and the SQLite driver.
//!
//! Layout:
//! - `mapping.rs`: entity trait, mapping builder and validated schema model
//! - `schema.rs`: SQL (DDL, seed inserts, CRUD) generated from mappings
//! - `models.rs`: Rust structs mirroring DB rows
//! - `context.rs`: context lifecycle trait and the rental context
//! - `sqlite.rs`: opening, initializing and querying the database

pub mod context;
pub mod mapping;
pub mod models;
pub mod schema;
pub mod sqlite;

pub use context::{ContextOptions, DbContext, RENTACAR_CONNECTION, RentACarContext};
pub use mapping::{ColumnValue, Entity, Property, Schema, SchemaBuilder, SqlType};
pub use models::Brand;
pub use sqlite::{Database, EntitySet, SeedReport, SqlitePool};
