//! Builds parameterized record-level statements (by primary key) for an entity.
//! Identifiers come from the entity descriptor and are quoted; values are always parameters.

use crate::config::EntityDescriptor;
use crate::store::Record;
use serde_json::Value;
use std::collections::HashMap;

/// Column name to PostgreSQL type name, used to cast bound values server-side.
pub type ColumnTypes = HashMap<String, String>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    pub fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    pub fn with_sql(sql: impl Into<String>) -> Self {
        QueryBuf {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Adds a parameter and returns its 1-based placeholder number.
    pub fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }
}

/// Quote identifier for PostgreSQL (safe: only from config).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Quote a possibly schema-qualified name segment by segment.
pub fn quoted_path(s: &str) -> String {
    s.split('.').map(quoted).collect::<Vec<_>>().join(".")
}

fn placeholder(n: u32, column: &str, types: &ColumnTypes) -> String {
    types
        .get(column)
        .filter(|t| !t.starts_with('_'))
        .map(|t| format!("${}::{}", n, t))
        .unwrap_or_else(|| format!("${}", n))
}

/// Keep only fields the entity accepts for writes, never the primary key on update.
fn writable<'a>(entity: &'a EntityDescriptor, data: &'a Record, skip_pk: bool) -> impl Iterator<Item = (&'a String, &'a Value)> {
    data.iter()
        .filter(move |(k, _)| entity.accepts(k))
        .filter(move |(k, _)| !(skip_pk && **k == entity.primary_key))
}

/// SELECT by primary key. Caller adds id as sole param.
pub fn select_by_id(entity: &EntityDescriptor, id: &Value, types: &ColumnTypes) -> QueryBuf {
    select_by_field(entity, &entity.primary_key, id, types)
}

/// SELECT the first row where `field` equals the value.
pub fn select_by_field(entity: &EntityDescriptor, field: &str, value: &Value, types: &ColumnTypes) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(value.clone());
    q.sql = format!(
        "SELECT * FROM {} WHERE {} = {} LIMIT 1",
        quoted_path(&entity.table),
        quoted(field),
        placeholder(n, field, types)
    );
    q
}

/// INSERT the accepted fields of `data`; columns left out get their database defaults.
pub fn insert(entity: &EntityDescriptor, data: &Record, types: &ColumnTypes) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = quoted_path(&entity.table);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for (name, val) in writable(entity, data, false) {
        let n = q.push_param(val.clone());
        cols.push(quoted(name));
        placeholders.push(placeholder(n, name, types));
    }
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING *", table)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            table,
            cols.join(", "),
            placeholders.join(", ")
        )
    };
    q
}

/// UPDATE by id: SET only accepted fields present in `data`. `extra_sets` are trusted SQL assignments.
fn update_with(entity: &EntityDescriptor, id: &Value, data: &Record, extra_sets: &[&str], types: &ColumnTypes) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = quoted_path(&entity.table);
    let pk = &entity.primary_key;
    let mut sets = Vec::new();
    for (name, val) in writable(entity, data, true) {
        let n = q.push_param(val.clone());
        sets.push(format!("{} = {}", quoted(name), placeholder(n, name, types)));
    }
    sets.extend(extra_sets.iter().map(|s| s.to_string()));
    if sets.is_empty() {
        return select_by_id(entity, id, types);
    }
    let id_param = q.push_param(id.clone());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING *",
        table,
        sets.join(", "),
        quoted(pk),
        placeholder(id_param, pk, types)
    );
    q
}

pub fn update(entity: &EntityDescriptor, id: &Value, data: &Record, types: &ColumnTypes) -> QueryBuf {
    update_with(entity, id, data, &[], types)
}

/// Mark a row deleted, persisting any last-minute field changes alongside.
pub fn soft_delete(entity: &EntityDescriptor, id: &Value, changes: &Record, types: &ColumnTypes) -> QueryBuf {
    let mut changes = changes.clone();
    changes.remove("deleted_at");
    update_with(entity, id, &changes, &["\"deleted_at\" = NOW()"], types)
}

/// DELETE by id.
pub fn delete(entity: &EntityDescriptor, id: &Value, types: &ColumnTypes) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(id.clone());
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        quoted_path(&entity.table),
        quoted(&entity.primary_key),
        placeholder(n, &entity.primary_key, types)
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users() -> EntityDescriptor {
        EntityDescriptor::new("app.users", "id").attributes(["id", "username", "email", "level"])
    }

    fn record(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn quoting_escapes_and_splits_schema() {
        assert_eq!(quoted("a\"b"), "\"a\"\"b\"");
        assert_eq!(quoted_path("app.users"), "\"app\".\"users\"");
    }

    #[test]
    fn insert_skips_unknown_fields_and_casts_known_types() {
        let mut types = ColumnTypes::new();
        types.insert("level".into(), "int4".into());
        let q = insert(&users(), &record(json!({"username": "ann", "level": 3, "hacker": true})), &types);
        assert_eq!(
            q.sql,
            "INSERT INTO \"app\".\"users\" (\"level\", \"username\") VALUES ($1::int4, $2) RETURNING *"
        );
        assert_eq!(q.params, vec![json!(3), json!("ann")]);
    }

    #[test]
    fn empty_insert_uses_defaults() {
        let q = insert(&users(), &Record::new(), &ColumnTypes::new());
        assert_eq!(q.sql, "INSERT INTO \"app\".\"users\" DEFAULT VALUES RETURNING *");
    }

    #[test]
    fn update_never_sets_primary_key() {
        let q = update(&users(), &json!(5), &record(json!({"id": 9, "email": "a@b"})), &ColumnTypes::new());
        assert_eq!(q.sql, "UPDATE \"app\".\"users\" SET \"email\" = $1 WHERE \"id\" = $2 RETURNING *");
        assert_eq!(q.params, vec![json!("a@b"), json!(5)]);
    }

    #[test]
    fn empty_update_reads_the_row_back() {
        let q = update(&users(), &json!(5), &Record::new(), &ColumnTypes::new());
        assert!(q.sql.starts_with("SELECT * FROM"));
        assert_eq!(q.params, vec![json!(5)]);
    }

    #[test]
    fn soft_delete_sets_timestamp_and_changes() {
        let entity = EntityDescriptor::new("users", "id");
        let q = soft_delete(&entity, &json!(1), &record(json!({"email": ".x.a@b", "deleted_at": "bogus"})), &ColumnTypes::new());
        assert_eq!(
            q.sql,
            "UPDATE \"users\" SET \"email\" = $1, \"deleted_at\" = NOW() WHERE \"id\" = $2 RETURNING *"
        );
    }

    #[test]
    fn array_types_are_not_cast() {
        let mut types = ColumnTypes::new();
        types.insert("tags".into(), "_text".into());
        let q = select_by_field(&EntityDescriptor::new("t", "id"), "tags", &json!(["a"]), &types);
        assert!(q.sql.ends_with("\"tags\" = $1 LIMIT 1"));
    }
}
