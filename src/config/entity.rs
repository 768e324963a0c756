//! Entity descriptor: the static description of a table the controller serves.

use crate::controller::BeforeDeleteHook;
use crate::error::AppError;
use serde_json::Value;
use std::fmt;

/// Primary key type for parsing path/body ids.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PkType {
    Uuid,
    #[default]
    BigInt,
    Int,
    Text,
}

impl PkType {
    pub fn parse_id(&self, id_str: &str) -> Result<Value, AppError> {
        Ok(match self {
            PkType::Uuid => {
                let u = uuid::Uuid::parse_str(id_str).map_err(|_| AppError::BadRequest("invalid uuid".into()))?;
                Value::String(u.to_string())
            }
            PkType::BigInt | PkType::Int => {
                let n: i64 = id_str.trim().parse().map_err(|_| AppError::BadRequest("invalid id".into()))?;
                Value::Number(n.into())
            }
            PkType::Text => Value::String(id_str.to_string()),
        })
    }
}

#[derive(Clone)]
pub struct EntityDescriptor {
    /// Table name, optionally schema-qualified (`app.users`).
    pub table: String,
    pub primary_key: String,
    pub pk_type: PkType,
    /// Columns accepted on writes. Empty accepts every payload key.
    pub attributes: Vec<String>,
    /// Entity-specific step run after the configured before-delete hook.
    pub pre_delete: Option<BeforeDeleteHook>,
}

impl EntityDescriptor {
    pub fn new(table: impl Into<String>, primary_key: impl Into<String>) -> Self {
        EntityDescriptor {
            table: table.into(),
            primary_key: primary_key.into(),
            pk_type: PkType::default(),
            attributes: Vec::new(),
            pre_delete: None,
        }
    }

    pub fn pk_type(mut self, pk_type: PkType) -> Self {
        self.pk_type = pk_type;
        self
    }

    pub fn attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    pub fn pre_delete(mut self, hook: BeforeDeleteHook) -> Self {
        self.pre_delete = Some(hook);
        self
    }

    pub fn accepts(&self, field: &str) -> bool {
        self.attributes.is_empty() || self.attributes.iter().any(|a| a == field)
    }
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("pk_type", &self.pk_type)
            .field("attributes", &self.attributes)
            .field("pre_delete", &self.pre_delete.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_by_type() {
        assert_eq!(PkType::Int.parse_id("42").unwrap(), Value::from(42));
        assert!(matches!(PkType::BigInt.parse_id("x"), Err(AppError::BadRequest(_))));
        assert_eq!(PkType::Text.parse_id("abc").unwrap(), Value::from("abc"));
        assert!(PkType::Uuid.parse_id("not-a-uuid").is_err());
    }

    #[test]
    fn empty_attribute_list_accepts_everything() {
        let e = EntityDescriptor::new("users", "id");
        assert!(e.accepts("anything"));
        let e = e.attributes(["username", "email"]);
        assert!(e.accepts("email"));
        assert!(!e.accepts("level"));
    }
}
