//! Index query assembly: WHERE / ORDER BY / LIMIT from settings plus request parameters.
//!
//! Client-supplied values (search text, parent id) are bound as parameters. Filter expressions, aliases,
//! field lists and the data source come from settings and are spliced verbatim.

use crate::config::{ControllerSettings, EntityDescriptor, SoftDelete, SortOrder, DEFAULT_PARENT_FIELD};
use crate::controller::pager::Window;
use crate::sql::QueryBuf;
use serde_json::Value;
use std::collections::HashMap;

/// Parameters of one `index` request.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexParams {
    /// 1-based.
    pub page: u64,
    /// Page size; falls back to the configured default.
    pub rows: Option<u64>,
    pub search: Option<String>,
    /// Primary key of a record whose page should be returned instead of `page`.
    pub find: Option<String>,
    pub sort: Option<String>,
    pub order: SortOrder,
    /// Tree mode: list only direct children of this id.
    pub parent: Option<String>,
    /// Replaces the configured filter for this request only (e.g. a visibility scope).
    pub filter: Option<Vec<String>>,
}

impl Default for IndexParams {
    fn default() -> Self {
        IndexParams {
            page: 1,
            rows: None,
            search: None,
            find: None,
            sort: None,
            order: SortOrder::Asc,
            parent: None,
            filter: None,
        }
    }
}

fn non_empty(s: Option<&String>) -> Option<String> {
    s.map(|v| v.trim()).filter(|v| !v.is_empty()).map(String::from)
}

impl IndexParams {
    /// Read `page`, `rows`, `search`, `find`, `sort`, `order` and the tree parent parameter from a query string map.
    pub fn from_query(query: &HashMap<String, String>, parent_param: &str) -> Self {
        IndexParams {
            page: query.get("page").and_then(|v| v.trim().parse().ok()).unwrap_or(1),
            rows: query.get("rows").and_then(|v| v.trim().parse().ok()).filter(|n| *n > 0),
            search: query.get("search").filter(|v| !v.trim().is_empty()).cloned(),
            find: non_empty(query.get("find")),
            sort: non_empty(query.get("sort")),
            order: query.get("order").map(|v| SortOrder::parse(v)).unwrap_or_default(),
            parent: non_empty(query.get(parent_param)),
            filter: None,
        }
    }

    pub fn page(mut self, page: u64) -> Self {
        self.page = page;
        self
    }

    pub fn rows(mut self, rows: u64) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn find(mut self, id: impl Into<String>) -> Self {
        self.find = Some(id.into());
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(field.into());
        self.order = order;
        self
    }

    pub fn parent(mut self, id: impl Into<String>) -> Self {
        self.parent = Some(id.into());
        self
    }

    pub fn filter<I, S>(mut self, conditions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter = Some(conditions.into_iter().map(Into::into).collect());
        self
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.is_empty())
    }

    pub fn find_id(&self) -> Option<&str> {
        self.find.as_deref().filter(|s| !s.is_empty())
    }

    /// Parent id as a bindable value: integer when it parses as one.
    pub fn parent_id(&self) -> Option<Value> {
        let raw = self.parent.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some(match raw.parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::String(raw.to_string()),
        })
    }
}

/// Both statements of an index request share everything up to ORDER BY.
#[derive(Clone, Debug, PartialEq)]
pub struct ListQuery {
    pub fields: String,
    pub source: String,
    pub where_clause: Option<String>,
    pub params: Vec<Value>,
    pub order_by: String,
}

impl ListQuery {
    fn where_sql(&self) -> String {
        self.where_clause
            .as_deref()
            .map(|w| format!(" WHERE {}", w))
            .unwrap_or_default()
    }

    pub fn count_query(&self) -> QueryBuf {
        QueryBuf {
            sql: format!("SELECT COUNT(*) AS total FROM {}{}", self.source, self.where_sql()),
            params: self.params.clone(),
        }
    }

    /// `None` fetches the whole filtered, sorted set.
    pub fn select_query(&self, window: Option<Window>) -> QueryBuf {
        let limit = window
            .map(|w| format!(" LIMIT {} OFFSET {}", w.limit, w.offset))
            .unwrap_or_default();
        QueryBuf {
            sql: format!(
                "SELECT {} FROM {}{} ORDER BY {}{}",
                self.fields,
                self.source,
                self.where_sql(),
                self.order_by,
                limit
            ),
            params: self.params.clone(),
        }
    }
}

pub fn build(entity: &EntityDescriptor, settings: &ControllerSettings, params: &IndexParams) -> ListQuery {
    let mut binds = QueryBuf::new();
    let mut parts: Vec<String> = Vec::new();

    if let Some(term) = params.search_term() {
        if let Some(clause) = search_clause(settings, term, &mut binds) {
            parts.push(clause);
        }
    }
    let filter = params.filter.as_ref().unwrap_or(&settings.filter);
    if let Some(clause) = filter_clause(filter) {
        parts.push(clause);
    }
    if let Some(clause) = soft_delete_clause(entity, &settings.soft_deletes) {
        parts.push(clause);
    }
    if let (Some(tree), Some(parent_id)) = (&settings.tree, params.parent_id()) {
        parts.push(key_match(settings.translate(&tree.parent), parent_id, &mut binds));
    }

    ListQuery {
        fields: settings.field_list.to_sql(),
        source: settings.data_source.clone().unwrap_or_else(|| entity.table.clone()),
        where_clause: if parts.is_empty() { None } else { Some(parts.join(" AND ")) },
        params: binds.params,
        order_by: order_by(entity, settings, params),
    }
}

/// First applicable rule wins: tree order column, requested sortable field, tree position key,
/// configured default, primary key.
pub fn order_by(entity: &EntityDescriptor, settings: &ControllerSettings, params: &IndexParams) -> String {
    let tree = settings.tree.as_ref();
    if let Some(col) = tree.and_then(|t| t.order_column.as_deref()) {
        return format!("{} ASC", settings.translate(col));
    }
    if let Some(sort) = params.sort.as_deref().filter(|s| settings.sortable.iter().any(|f| f == s)) {
        let order = if tree.is_some() { SortOrder::Asc } else { params.order };
        return format!("{} {}", settings.translate(sort), order);
    }
    if let Some(key) = tree.and_then(|t| t.position_key.as_deref()) {
        return format!("{} ASC", settings.translate(key));
    }
    if let Some(field) = settings.default_sort_by.as_deref() {
        return format!("{} {}", settings.translate(field), settings.default_sort_order);
    }
    format!("{} ASC", entity.primary_key)
}

/// LIKE pattern matching `term` anywhere, with LIKE metacharacters in the term taken literally.
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn search_clause(settings: &ControllerSettings, term: &str, binds: &mut QueryBuf) -> Option<String> {
    if settings.searchable.is_empty() {
        return None;
    }
    let n = binds.push_param(Value::String(like_pattern(term)));
    let ors: Vec<String> = settings
        .searchable
        .iter()
        .map(|field| format!("CAST({} AS TEXT) ILIKE ${}", settings.translate(field), n))
        .collect();
    Some(format!("({})", ors.join(" OR ")))
}

fn filter_clause(filter: &[String]) -> Option<String> {
    let conds: Vec<&str> = filter.iter().map(|c| c.trim()).filter(|c| !c.is_empty()).collect();
    if conds.is_empty() {
        None
    } else {
        Some(format!("({})", conds.join(" AND ")))
    }
}

fn soft_delete_clause(entity: &EntityDescriptor, mode: &SoftDelete) -> Option<String> {
    let scope = match mode {
        SoftDelete::Off => return None,
        SoftDelete::ByTableName => entity.table.as_str(),
        SoftDelete::ByAlias(alias) => alias.as_str(),
    };
    Some(format!("({}.deleted_at IS NULL)", scope))
}

/// `expr = $n`. String keys are compared as text on both sides, so one rendering serves uuid and text columns.
pub(crate) fn key_match(expr: &str, key: Value, binds: &mut QueryBuf) -> String {
    let is_text = key.is_string();
    let n = binds.push_param(key);
    if is_text {
        format!("CAST({} AS TEXT) = ${}::text", expr, n)
    } else {
        format!("{} = ${}", expr, n)
    }
}

/// Request parameter naming the parent in tree mode.
pub fn parent_param(settings: &ControllerSettings) -> &str {
    settings
        .tree
        .as_ref()
        .map(|t| t.parent.as_str())
        .unwrap_or(DEFAULT_PARENT_FIELD)
}
