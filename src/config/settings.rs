//! Per-entity controller settings. Everything here is authored by the application, not by clients:
//! filter, alias, order and data-source strings are spliced into SQL as-is.

use crate::controller::Hooks;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const DEFAULT_ROWS: u64 = 10;
pub const DEFAULT_PARENT_FIELD: &str = "parent";
pub const DEFAULT_CHILDREN_COUNT_FIELD: &str = "children_count";
pub const DEFAULT_POSITION_COLUMN: &str = "pos";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Anything other than a case-insensitive "desc" sorts ascending.
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Columns selected by `index`: every column, or an explicit list of SQL expressions.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub enum FieldList {
    #[default]
    All,
    Columns(Vec<String>),
}

impl FieldList {
    pub fn to_sql(&self) -> String {
        match self {
            FieldList::All => "*".to_string(),
            FieldList::Columns(cols) if cols.is_empty() => "*".to_string(),
            FieldList::Columns(cols) => cols.join(", "),
        }
    }
}

impl<'de> Deserialize<'de> for FieldList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        match v {
            serde_json::Value::Null => Ok(FieldList::All),
            serde_json::Value::String(s) => {
                let cols: Vec<String> = s
                    .split(',')
                    .map(|c| c.trim())
                    .filter(|c| !c.is_empty() && *c != "*")
                    .map(String::from)
                    .collect();
                if cols.is_empty() {
                    Ok(FieldList::All)
                } else {
                    Ok(FieldList::Columns(cols))
                }
            }
            serde_json::Value::Array(items) => {
                let mut cols = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        serde_json::Value::String(s) => cols.push(s),
                        other => {
                            return Err(serde::de::Error::custom(format!(
                                "field_list entries must be strings; got {}",
                                other
                            )))
                        }
                    }
                }
                Ok(FieldList::Columns(cols))
            }
            other => Err(serde::de::Error::custom(format!(
                "field_list must be a string or an array of strings; got {}",
                other
            ))),
        }
    }
}

/// Soft-delete mode. `ByTableName` scopes `deleted_at` with the table name, `ByAlias` with the given alias
/// (for data sources that alias the table in a join).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub enum SoftDelete {
    #[default]
    Off,
    ByTableName,
    ByAlias(String),
}

impl SoftDelete {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, SoftDelete::Off)
    }
}

impl<'de> Deserialize<'de> for SoftDelete {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        match v {
            serde_json::Value::Null | serde_json::Value::Bool(false) => Ok(SoftDelete::Off),
            serde_json::Value::Bool(true) => Ok(SoftDelete::ByTableName),
            serde_json::Value::String(s) if s.trim().is_empty() => Ok(SoftDelete::Off),
            serde_json::Value::String(s) => Ok(SoftDelete::ByAlias(s.trim().to_string())),
            other => Err(serde::de::Error::custom(format!(
                "soft_deletes must be a boolean or a table alias; got {}",
                other
            ))),
        }
    }
}

/// How matched search text is marked in `index` results.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Highlight {
    /// `<span class="...">`
    Class(String),
    /// `<span color="...">`
    Color(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeSettings {
    /// Parent reference column; also the name of the request parameter that selects one level.
    #[serde(default = "default_parent_field")]
    pub parent: String,
    /// When set, trees are always listed by this column, whatever the client asks for.
    #[serde(default)]
    pub order_column: Option<String>,
    /// Fallback ordering used when the client's sort field is not sortable.
    #[serde(default)]
    pub position_key: Option<String>,
    #[serde(default = "default_children_count_field")]
    pub children_count: String,
    /// Reordering also sets `updated_at = NOW()`.
    #[serde(default = "default_true")]
    pub touch_updated_at: bool,
}

impl Default for TreeSettings {
    fn default() -> Self {
        TreeSettings {
            parent: default_parent_field(),
            order_column: None,
            position_key: None,
            children_count: default_children_count_field(),
            touch_updated_at: true,
        }
    }
}

impl TreeSettings {
    /// Column written by reorder and read by last-position lookups.
    pub fn position_column(&self) -> &str {
        self.order_column
            .as_deref()
            .or(self.position_key.as_deref())
            .unwrap_or(DEFAULT_POSITION_COLUMN)
    }
}

fn default_parent_field() -> String {
    DEFAULT_PARENT_FIELD.to_string()
}

fn default_children_count_field() -> String {
    DEFAULT_CHILDREN_COUNT_FIELD.to_string()
}

fn default_true() -> bool {
    true
}

fn default_rows() -> u64 {
    DEFAULT_ROWS
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControllerSettings {
    #[serde(default)]
    pub field_list: FieldList,
    /// Table name or join expression; defaults to the entity table.
    #[serde(default)]
    pub data_source: Option<String>,
    #[serde(default)]
    pub sortable: Vec<String>,
    #[serde(default)]
    pub searchable: Vec<String>,
    /// Raw SQL conditions, AND-joined. Never fed from client input.
    #[serde(default)]
    pub filter: Vec<String>,
    /// Logical field name to SQL expression, e.g. `client` -> `cl.name`.
    #[serde(default)]
    pub column_aliases: HashMap<String, String>,
    #[serde(default)]
    pub default_sort_by: Option<String>,
    #[serde(default)]
    pub default_sort_order: SortOrder,
    #[serde(default)]
    pub soft_deletes: SoftDelete,
    #[serde(default = "default_rows")]
    pub rows: u64,
    #[serde(default)]
    pub highlight: Option<Highlight>,
    #[serde(default)]
    pub tree: Option<TreeSettings>,
    #[serde(default)]
    pub created_message: Option<String>,
    #[serde(default)]
    pub updated_message: Option<String>,
    #[serde(default)]
    pub deleted_message: Option<String>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        ControllerSettings {
            field_list: FieldList::All,
            data_source: None,
            sortable: Vec::new(),
            searchable: Vec::new(),
            filter: Vec::new(),
            column_aliases: HashMap::new(),
            default_sort_by: None,
            default_sort_order: SortOrder::Asc,
            soft_deletes: SoftDelete::Off,
            rows: DEFAULT_ROWS,
            highlight: None,
            tree: None,
            created_message: None,
            updated_message: None,
            deleted_message: None,
        }
    }
}

impl ControllerSettings {
    /// Logical field name to SQL expression.
    pub fn translate<'a>(&'a self, field: &'a str) -> &'a str {
        self.column_aliases.get(field).map(String::as_str).unwrap_or(field)
    }

    /// Tree mode always caches children counts.
    pub fn uses_cache(&self) -> bool {
        self.tree.is_some()
    }

    pub fn created_message(&self) -> String {
        self.created_message.clone().unwrap_or_else(|| "Record created".into())
    }

    pub fn updated_message(&self) -> String {
        self.updated_message.clone().unwrap_or_else(|| "Record updated".into())
    }

    pub fn deleted_message(&self) -> String {
        self.deleted_message.clone().unwrap_or_else(|| "Record deleted".into())
    }
}

/// Settings plus lifecycle hooks; one per entity, read-only once the controller is built.
#[derive(Clone, Default)]
pub struct ControllerConfig {
    pub settings: ControllerSettings,
    pub hooks: Hooks,
}

impl ControllerConfig {
    pub fn new(settings: ControllerSettings) -> Self {
        ControllerConfig {
            settings,
            hooks: Hooks::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }
}

impl fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("settings", &self.settings)
            .field("hooks", &self.hooks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_polymorphic_fields() {
        let s: ControllerSettings = serde_json::from_value(json!({
            "field_list": "id, username ,email",
            "soft_deletes": true,
            "sortable": ["username"]
        }))
        .unwrap();
        assert_eq!(
            s.field_list,
            FieldList::Columns(vec!["id".into(), "username".into(), "email".into()])
        );
        assert_eq!(s.soft_deletes, SoftDelete::ByTableName);
        assert_eq!(s.rows, DEFAULT_ROWS);

        let s: ControllerSettings = serde_json::from_value(json!({
            "field_list": ["e.id", "cl.name AS client"],
            "soft_deletes": "e",
            "highlight": { "class": "primary" },
            "tree": { "order_column": "pos" }
        }))
        .unwrap();
        assert_eq!(s.soft_deletes, SoftDelete::ByAlias("e".into()));
        assert_eq!(s.highlight, Some(Highlight::Class("primary".into())));
        let tree = s.tree.unwrap();
        assert_eq!(tree.parent, "parent");
        assert_eq!(tree.children_count, "children_count");
        assert!(tree.touch_updated_at);
    }

    #[test]
    fn star_field_list_means_all() {
        let s: ControllerSettings = serde_json::from_value(json!({ "field_list": "*" })).unwrap();
        assert_eq!(s.field_list, FieldList::All);
        assert_eq!(s.field_list.to_sql(), "*");
    }

    #[test]
    fn rejects_numeric_soft_delete() {
        let r: Result<ControllerSettings, _> = serde_json::from_value(json!({ "soft_deletes": 1 }));
        assert!(r.is_err());
    }

    #[test]
    fn translate_falls_back_to_logical_name() {
        let mut s = ControllerSettings::default();
        s.column_aliases.insert("client".into(), "cl.name".into());
        assert_eq!(s.translate("client"), "cl.name");
        assert_eq!(s.translate("id"), "id");
    }

    #[test]
    fn position_column_precedence() {
        let mut t = TreeSettings::default();
        assert_eq!(t.position_column(), "pos");
        t.position_key = Some("rank".into());
        assert_eq!(t.position_column(), "rank");
        t.order_column = Some("sort_no".into());
        assert_eq!(t.position_column(), "sort_no");
    }

    #[test]
    fn sort_order_parse() {
        assert_eq!(SortOrder::parse("DESC"), SortOrder::Desc);
        assert_eq!(SortOrder::parse("desc; drop table x"), SortOrder::Asc);
        assert_eq!(SortOrder::parse(""), SortOrder::Asc);
    }
}
