pub mod config;
pub mod db;
pub mod error;

pub use config::Config;
pub use db::{Brand, Database, DbContext, RentACarContext};
pub use error::PersistenceError;
