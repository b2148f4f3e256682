//! Entity catalog: which record types map to which tables, under which
//! column names, and which rows must exist once the schema is initialized.

use crate::error::PersistenceError;
use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Text,
}

impl SqlType {
    pub fn as_sql(self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Text => "TEXT",
        }
    }
}

/// A mapped attribute of an entity, as declared by the entity type itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Property {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub nullable: bool,
}

impl Property {
    pub const fn required(name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            sql_type,
            nullable: false,
        }
    }

    pub const fn optional(name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            sql_type,
            nullable: true,
        }
    }
}

/// Owned column value used for seed rows, keys and parameter binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnValue {
    Integer(i64),
    Text(String),
    Null,
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Integer(i) => write!(f, "{i}"),
            ColumnValue::Text(s) => f.write_str(s),
            ColumnValue::Null => f.write_str("NULL"),
        }
    }
}

impl From<i64> for ColumnValue {
    fn from(v: i64) -> Self {
        ColumnValue::Integer(v)
    }
}

impl From<i32> for ColumnValue {
    fn from(v: i32) -> Self {
        ColumnValue::Integer(v.into())
    }
}

impl From<String> for ColumnValue {
    fn from(v: String) -> Self {
        ColumnValue::Text(v)
    }
}

impl From<&str> for ColumnValue {
    fn from(v: &str) -> Self {
        ColumnValue::Text(v.to_string())
    }
}

impl<T: Into<ColumnValue>> From<Option<T>> for ColumnValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ColumnValue::Null)
    }
}

/// A record type that can be mapped to a table.
///
/// `properties()` and `values()` must list attributes in the same order.
pub trait Entity: Send + Sync + Unpin + 'static {
    /// Table used when the mapping does not rename it.
    fn default_table() -> &'static str;
    /// Attribute holding the primary key unless the mapping overrides it.
    fn key() -> &'static str;
    fn properties() -> &'static [Property];
    fn values(&self) -> Vec<ColumnValue>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnModel {
    pub attribute: &'static str,
    pub column: String,
    pub sql_type: SqlType,
    pub nullable: bool,
}

/// Resolved mapping of one entity type.
#[derive(Debug, Clone)]
pub struct EntityModel {
    type_id: TypeId,
    type_name: &'static str,
    table: String,
    key: &'static str,
    columns: Vec<ColumnModel>,
    seeds: Vec<Vec<ColumnValue>>,
    errors: Vec<String>,
}

impl EntityModel {
    fn new<E: Entity>() -> Self {
        let columns = E::properties()
            .iter()
            .map(|p| ColumnModel {
                attribute: p.name,
                column: p.name.to_string(),
                sql_type: p.sql_type,
                nullable: p.nullable,
            })
            .collect();
        Self {
            type_id: TypeId::of::<E>(),
            type_name: std::any::type_name::<E>(),
            table: E::default_table().to_string(),
            key: E::key(),
            columns,
            seeds: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn is_for<E: Entity>(&self) -> bool {
        self.type_id == TypeId::of::<E>()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnModel] {
        &self.columns
    }

    pub fn seeds(&self) -> &[Vec<ColumnValue>] {
        &self.seeds
    }

    pub fn key_index(&self) -> Option<usize> {
        self.columns.iter().position(|c| c.attribute == self.key)
    }

    pub fn key_column(&self) -> Option<&ColumnModel> {
        self.key_index().map(|i| &self.columns[i])
    }

    fn attribute(&self, attribute: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.attribute == attribute)
    }

    fn validate(&self) -> Result<(), PersistenceError> {
        let fail = |msg: String| {
            Err(PersistenceError::Schema(format!("{}: {msg}", self.type_name)))
        };

        if let Some(first) = self.errors.first() {
            return fail(first.clone());
        }
        if self.table.trim().is_empty() {
            return fail("table name is empty".to_string());
        }
        let Some(key_idx) = self.key_index() else {
            return fail(format!("key attribute '{}' is not mapped", self.key));
        };

        let mut names = HashSet::new();
        for c in &self.columns {
            if c.column.trim().is_empty() {
                return fail(format!("attribute '{}' has an empty column name", c.attribute));
            }
            // SQLite identifiers are case-insensitive.
            if !names.insert(c.column.to_ascii_lowercase()) {
                return fail(format!("column '{}' is mapped twice", c.column));
            }
        }

        let mut keys = HashSet::new();
        for row in &self.seeds {
            if row.len() != self.columns.len() {
                return fail(format!(
                    "seed row has {} values, expected {}",
                    row.len(),
                    self.columns.len()
                ));
            }
            let key = &row[key_idx];
            if key.is_null() {
                return fail("seed row has a null key".to_string());
            }
            if !keys.insert(key.clone()) {
                return fail(format!("seed key {key} appears more than once"));
            }
            if let Some(c) = self
                .columns
                .iter()
                .zip(row)
                .find_map(|(c, v)| (!c.nullable && v.is_null()).then_some(c))
            {
                return fail(format!(
                    "seed row {key} has null in required column '{}'",
                    c.column
                ));
            }
        }
        Ok(())
    }
}

/// Collects entity mappings declared by a context.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    entities: Vec<EntityModel>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mapping builder for `E`; repeated calls configure the same mapping.
    pub fn entity<E: Entity>(&mut self) -> EntityTypeBuilder<'_, E> {
        let idx = match self.entities.iter().position(|m| m.is_for::<E>()) {
            Some(idx) => idx,
            None => {
                self.entities.push(EntityModel::new::<E>());
                self.entities.len() - 1
            }
        };
        EntityTypeBuilder {
            model: &mut self.entities[idx],
            _entity: PhantomData,
        }
    }

    pub fn build(self) -> Result<Schema, PersistenceError> {
        let mut tables = HashSet::new();
        for model in &self.entities {
            model.validate()?;
            if !tables.insert(model.table.to_ascii_lowercase()) {
                return Err(PersistenceError::Schema(format!(
                    "table '{}' is mapped by more than one entity",
                    model.table
                )));
            }
        }
        Ok(Schema {
            entities: self.entities,
        })
    }
}

pub struct EntityTypeBuilder<'a, E: Entity> {
    model: &'a mut EntityModel,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> EntityTypeBuilder<'_, E> {
    pub fn to_table(self, table: impl Into<String>) -> Self {
        self.model.table = table.into();
        self
    }

    pub fn has_key(self, attribute: &str) -> Self {
        match self.model.attribute(attribute) {
            Some(idx) => self.model.key = self.model.columns[idx].attribute,
            None => self
                .model
                .errors
                .push(format!("key attribute '{attribute}' does not exist")),
        }
        self
    }

    pub fn has_column_name(self, attribute: &str, column: impl Into<String>) -> Self {
        match self.model.attribute(attribute) {
            Some(idx) => self.model.columns[idx].column = column.into(),
            None => self
                .model
                .errors
                .push(format!("attribute '{attribute}' does not exist")),
        }
        self
    }

    /// Rows that must exist after schema initialization, matched by key.
    pub fn has_data(self, rows: impl IntoIterator<Item = E>) -> Self {
        self.model
            .seeds
            .extend(rows.into_iter().map(|row| row.values()));
        self
    }
}

/// Validated set of entity mappings.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: Vec<EntityModel>,
}

impl Schema {
    pub fn entities(&self) -> &[EntityModel] {
        &self.entities
    }

    pub fn entity<E: Entity>(&self) -> Option<&EntityModel> {
        self.entities.iter().find(|m| m.is_for::<E>())
    }
}
