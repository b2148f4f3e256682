use crate::db::context::{ContextOptions, DbContext};
use crate::db::mapping::{ColumnValue, Entity, EntityModel, Schema, SchemaBuilder};
use crate::db::schema;
use crate::error::PersistenceError;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Arguments, FromRow, Pool, Sqlite};
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

pub type SqlitePool = Pool<Sqlite>;

/// Outcome of initializing one mapped table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub table: String,
    /// The table did not exist before this initialization.
    pub created: bool,
    pub inserted: u64,
    /// Seed rows not inserted, because the table already existed.
    pub skipped: u64,
}

/// An opened persistence context: connection pool plus validated mappings.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    schema: Arc<Schema>,
}

impl Database {
    /// Resolve the connection, build the entity model and connect.
    ///
    /// Configuration and model errors are reported before any connection
    /// attempt; a failed connection surfaces as [`PersistenceError::Connect`].
    pub async fn open<C>(context: &C, mut options: ContextOptions) -> Result<Self, PersistenceError>
    where
        C: DbContext + ?Sized,
    {
        if !options.is_configured() {
            context.configure(&mut options)?;
        }
        let connection = options
            .connection_string()
            .ok_or(PersistenceError::MissingConfiguration)?;
        let connect_options = parse_connection_string(connection)?;

        let mut builder = SchemaBuilder::new();
        context.define_schema(&mut builder);
        let schema = builder.build()?;

        info!(
            database = %connect_options.get_filename().display(),
            entities = schema.entities().len(),
            "opening database"
        );
        let pool = SqlitePoolOptions::new()
            .connect_with(connect_options)
            .await
            .map_err(PersistenceError::Connect)?;

        Ok(Self {
            pool,
            schema: Arc::new(schema),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Create missing tables, all in one transaction. Seed rows are applied
    /// only to tables created by this call; an existing table is left as is.
    pub async fn ensure_created(&self) -> Result<Vec<SeedReport>, PersistenceError> {
        let mut tx = self.pool.begin().await?;
        let mut reports = Vec::with_capacity(self.schema.entities().len());

        for model in self.schema.entities() {
            let existed: i64 = sqlx::query_scalar(schema::SQLITE_TABLE_EXISTS)
                .bind(model.table())
                .fetch_one(&mut *tx)
                .await?;
            let created = existed == 0;

            let mut inserted = 0;
            if created {
                sqlx::query(&schema::create_table_sql(model))
                    .execute(&mut *tx)
                    .await?;
                info!(table = %model.table(), "created table");

                let sql = schema::insert_seed_sql(model);
                for row in model.seeds() {
                    inserted += sqlx::query_with(&sql, arguments(row)?)
                        .execute(&mut *tx)
                        .await?
                        .rows_affected();
                }
            }
            let report = SeedReport {
                table: model.table().to_string(),
                created,
                inserted,
                skipped: model.seeds().len() as u64 - inserted,
            };
            debug!(
                table = %report.table,
                inserted = report.inserted,
                skipped = report.skipped,
                "seed rows applied"
            );
            reports.push(report);
        }

        tx.commit().await?;
        Ok(reports)
    }

    /// CRUD surface for a mapped entity type.
    pub fn set<E: Entity>(&self) -> Result<EntitySet<E>, PersistenceError> {
        let model = self.schema.entity::<E>().ok_or_else(|| {
            PersistenceError::Schema(format!(
                "{} is not mapped by this context",
                std::any::type_name::<E>()
            ))
        })?;
        Ok(EntitySet {
            pool: self.pool.clone(),
            model: model.clone(),
            _entity: PhantomData,
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn parse_connection_string(connection: &str) -> Result<SqliteConnectOptions, PersistenceError> {
    let connection = connection.trim();
    let invalid = |reason: String| PersistenceError::InvalidConnectionString { reason };

    let Some(rest) = connection
        .strip_prefix("sqlite://")
        .or_else(|| connection.strip_prefix("sqlite:"))
    else {
        return Err(invalid(format!(
            "expected a 'sqlite:' connection string, got '{connection}'"
        )));
    };
    let database = rest.split('?').next().unwrap_or_default();
    if database.is_empty() {
        return Err(invalid("no database file given".to_string()));
    }
    let options =
        SqliteConnectOptions::from_str(connection).map_err(|e| invalid(e.to_string()))?;
    Ok(options.create_if_missing(true))
}

fn arguments<'q, 'v>(
    values: impl IntoIterator<Item = &'v ColumnValue>,
) -> Result<SqliteArguments<'q>, PersistenceError> {
    let mut args = SqliteArguments::default();
    for value in values {
        match value {
            ColumnValue::Integer(i) => args.add(*i),
            ColumnValue::Text(s) => args.add(s.clone()),
            ColumnValue::Null => args.add(Option::<String>::None),
        }
        .map_err(sqlx::Error::Encode)?;
    }
    Ok(args)
}

/// Table access for one mapped entity type.
#[derive(Clone)]
pub struct EntitySet<E> {
    pool: SqlitePool,
    model: EntityModel,
    _entity: PhantomData<fn() -> E>,
}

impl<E> EntitySet<E>
where
    E: Entity + for<'r> FromRow<'r, SqliteRow>,
{
    pub fn model(&self) -> &EntityModel {
        &self.model
    }

    /// All rows, ordered by key.
    pub async fn all(&self) -> Result<Vec<E>, PersistenceError> {
        let rows = sqlx::query_as::<_, E>(&schema::select_all_sql(&self.model))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn find(&self, key: impl Into<ColumnValue>) -> Result<Option<E>, PersistenceError> {
        let key = key.into();
        let sql = schema::select_by_key_sql(&self.model);
        let row = sqlx::query_as_with::<_, E, _>(&sql, arguments([&key])?)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Insert a new row. An existing key yields [`PersistenceError::DuplicateKey`].
    pub async fn add(&self, entity: &E) -> Result<(), PersistenceError> {
        let values = entity.values();
        let sql = schema::insert_sql(&self.model);
        sqlx::query_with(&sql, arguments(&values)?)
            .execute(&self.pool)
            .await
            .map_err(|e| self.map_insert_error(e, &values))?;
        debug!(table = %self.model.table(), "row inserted");
        Ok(())
    }

    /// Overwrite the non-key columns of the row with the entity's key.
    /// Returns false when no such row exists.
    pub async fn update(&self, entity: &E) -> Result<bool, PersistenceError> {
        let values = entity.values();
        let key_idx = self.key_index()?;
        let Some(sql) = schema::update_sql(&self.model) else {
            return Ok(self.find(values[key_idx].clone()).await?.is_some());
        };
        let ordered = values
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != key_idx)
            .map(|(_, v)| v)
            .chain([&values[key_idx]]);
        let result = sqlx::query_with(&sql, arguments(ordered)?)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete by key. Returns false when no such row exists.
    pub async fn remove(&self, key: impl Into<ColumnValue>) -> Result<bool, PersistenceError> {
        let key = key.into();
        let sql = schema::delete_sql(&self.model);
        let result = sqlx::query_with(&sql, arguments([&key])?)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<i64, PersistenceError> {
        let n: i64 = sqlx::query_scalar(&schema::count_sql(&self.model))
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    fn key_index(&self) -> Result<usize, PersistenceError> {
        self.model.key_index().ok_or_else(|| {
            PersistenceError::Schema(format!("{} has no key column", self.model.type_name()))
        })
    }

    fn map_insert_error(&self, e: sqlx::Error, values: &[ColumnValue]) -> PersistenceError {
        let unique = e
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation());
        match (unique, self.model.key_index()) {
            (true, Some(idx)) => PersistenceError::DuplicateKey {
                table: self.model.table().to_string(),
                key: values[idx].to_string(),
            },
            _ => PersistenceError::DatabaseError(e),
        }
    }
}
