use crate::db::mapping::{ColumnValue, Entity, Property, SqlType};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, FromRow)]
pub struct Brand {
    pub id: i64,
    pub name: String,
}

impl Brand {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl Entity for Brand {
    fn default_table() -> &'static str {
        "Brand"
    }

    fn key() -> &'static str {
        "id"
    }

    fn properties() -> &'static [Property] {
        const PROPERTIES: &[Property] = &[
            Property::required("id", SqlType::Integer),
            Property::required("name", SqlType::Text),
        ];
        PROPERTIES
    }

    fn values(&self) -> Vec<ColumnValue> {
        vec![self.id.into(), self.name.clone().into()]
    }
}
