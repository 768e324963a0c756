//! In-memory record store that understands the statement shapes the controller emits.
#![allow(dead_code)]

use async_trait::async_trait;
use regex::Regex;
use rest_controller::sql::QueryBuf;
use rest_controller::store::key_string;
use rest_controller::{
    AppError, ControllerConfig, ControllerSettings, EntityDescriptor, Hooks, MemoryCache, Record, RecordStore,
    RestController,
};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

pub const DELETED_AT: &str = "2026-01-01T00:00:00Z";
pub const TOUCHED_AT: &str = "2026-01-02T00:00:00Z";

pub fn rec(v: Value) -> Record {
    v.as_object().cloned().expect("record literal must be an object")
}

pub fn people() -> Vec<Value> {
    vec![
        json!({"id": 1, "name": "Ann", "email": "ann@example.com", "level": 1, "deleted_at": null}),
        json!({"id": 2, "name": "Bob", "email": "bob@example.com", "level": 5, "deleted_at": null}),
        json!({"id": 3, "name": "Carl", "email": "carl@example.com", "level": 7, "deleted_at": null}),
    ]
}

/// 1 is the root; 2 and 3 are its children; 4 sits under 2.
pub fn folders() -> Vec<Value> {
    vec![
        json!({"id": 1, "name": "root", "parent": null, "pos": 0, "deleted_at": null}),
        json!({"id": 2, "name": "docs", "parent": 1, "pos": 0, "deleted_at": null}),
        json!({"id": 3, "name": "media", "parent": 1, "pos": 1, "deleted_at": null}),
        json!({"id": 4, "name": "drafts", "parent": 2, "pos": 0, "deleted_at": null}),
    ]
}

pub fn controller(store: Arc<MemoryStore>, settings: ControllerSettings, hooks: Hooks) -> RestController {
    controller_for(EntityDescriptor::new("people", "id"), store, settings, hooks)
}

pub fn controller_for(
    entity: EntityDescriptor,
    store: Arc<MemoryStore>,
    settings: ControllerSettings,
    hooks: Hooks,
) -> RestController {
    RestController::new(
        entity,
        ControllerConfig::new(settings).with_hooks(hooks),
        store,
        Arc::new(MemoryCache::new()),
    )
    .expect("valid controller configuration")
}

pub struct MemoryStore {
    rows: Mutex<Vec<Record>>,
    next_id: AtomicI64,
    statements: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new(rows: Vec<Value>) -> Arc<Self> {
        let rows: Vec<Record> = rows.into_iter().map(rec).collect();
        let max_id = rows
            .iter()
            .filter_map(|r| r.get("id").and_then(Value::as_i64))
            .max()
            .unwrap_or(0);
        Arc::new(MemoryStore {
            rows: Mutex::new(rows),
            next_id: AtomicI64::new(max_id + 1),
            statements: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        })
    }

    pub fn rows(&self) -> Vec<Record> {
        self.rows.lock().unwrap().clone()
    }

    pub fn row(&self, id: i64) -> Option<Record> {
        self.rows().into_iter().find(|r| r.get("id") == Some(&json!(id)))
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    pub fn count_statements(&self, needle: &str) -> usize {
        self.statements().iter().filter(|s| s.contains(needle)).count()
    }

    pub fn set_failing(&self, on: bool) {
        self.failing.store(on, AtomicOrdering::SeqCst);
    }

    fn check(&self) -> Result<(), AppError> {
        if self.failing.load(AtomicOrdering::SeqCst) {
            Err(AppError::Store("connection refused".into()))
        } else {
            Ok(())
        }
    }

    fn log(&self, sql: &str) {
        self.statements.lock().unwrap().push(sql.to_string());
    }

    fn run_select(&self, q: &QueryBuf) -> Vec<Record> {
        let sql = q.sql.as_str();
        let params = q.params.as_slice();
        let rows = self.rows();
        let filtered = |cond: Option<regex::Match<'_>>| -> Vec<Record> {
            let cond = cond.map(|c| c.as_str());
            rows.iter()
                .filter(|r| cond.map(|c| eval(c, r, params)).unwrap_or(true))
                .cloned()
                .collect()
        };

        let stats = re(r"^SELECT (\S+) AS parent, COUNT\(\*\) AS total FROM \S+(?: WHERE (.+))? GROUP BY \S+$");
        if let Some(c) = stats.captures(sql) {
            let col = column(&c[1]);
            let mut groups: Vec<(Value, u64)> = Vec::new();
            for r in filtered(c.get(2)) {
                let key = r.get(&col).cloned().unwrap_or(Value::Null);
                match groups.iter_mut().find(|(k, _)| key_string(k) == key_string(&key)) {
                    Some((_, n)) => *n += 1,
                    None => groups.push((key, 1)),
                }
            }
            return groups
                .into_iter()
                .map(|(parent, total)| rec(json!({"parent": parent, "total": total})))
                .collect();
        }

        let max = re(r"^SELECT MAX\((\S+)\) AS position FROM \S+ WHERE (.+)$");
        if let Some(c) = max.captures(sql) {
            let col = column(&c[1]);
            let position = filtered(c.get(2))
                .iter()
                .filter_map(|r| r.get(&col).and_then(Value::as_i64))
                .max();
            return vec![rec(json!({ "position": position }))];
        }

        let count = re(r"^SELECT COUNT\(\*\) AS total FROM \S+(?: WHERE (.+))?$");
        if let Some(c) = count.captures(sql) {
            return vec![rec(json!({ "total": filtered(c.get(1)).len() }))];
        }

        let select = re(r"^SELECT (.+?) FROM \S+(?: WHERE (.+?))? ORDER BY (\S+) (ASC|DESC)(?: LIMIT (\d+) OFFSET (\d+))?$");
        let c = select
            .captures(sql)
            .unwrap_or_else(|| panic!("unsupported select: {}", sql));
        let mut out = filtered(c.get(2));
        let order_col = column(&c[3]);
        out.sort_by(|a, b| {
            let ord = cmp_values(
                a.get(&order_col).unwrap_or(&Value::Null),
                b.get(&order_col).unwrap_or(&Value::Null),
            );
            if &c[4] == "DESC" {
                ord.reverse()
            } else {
                ord
            }
        });
        if let (Some(limit), Some(offset)) = (c.get(5), c.get(6)) {
            let limit: usize = limit.as_str().parse().unwrap();
            let offset: usize = offset.as_str().parse().unwrap();
            out = out.into_iter().skip(offset).take(limit).collect();
        }
        let fields = c[1].to_string();
        if fields == "*" {
            return out;
        }
        out.into_iter()
            .map(|r| {
                fields
                    .split(", ")
                    .map(|f| {
                        let (expr, name) = match f.split_once(" AS ") {
                            Some((e, n)) => (column(e), n.trim().to_string()),
                            None => (column(f), column(f)),
                        };
                        (name, r.get(&expr).cloned().unwrap_or(Value::Null))
                    })
                    .collect()
            })
            .collect()
    }

    fn run_execute(&self, q: &QueryBuf) -> u64 {
        let update = re(r#"^UPDATE \S+ SET (\S+) = \$(\d+)(, "updated_at" = NOW\(\))? WHERE (.+)$"#);
        let c = update
            .captures(&q.sql)
            .unwrap_or_else(|| panic!("unsupported statement: {}", q.sql));
        let col = column(&c[1]);
        let value = param(&q.params, &c[2]);
        let mut changed = 0;
        for row in self.rows.lock().unwrap().iter_mut() {
            if eval(&c[4], row, &q.params) {
                row.insert(col.clone(), value.clone());
                if c.get(3).is_some() {
                    row.insert("updated_at".into(), json!(TOUCHED_AT));
                }
                changed += 1;
            }
        }
        changed
    }

    fn position(&self, field: &str, value: &Value) -> Option<usize> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .position(|r| r.get(field).map(key_string) == Some(key_string(value)))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn select(&self, q: &QueryBuf) -> Result<Vec<Record>, AppError> {
        self.check()?;
        self.log(&q.sql);
        Ok(self.run_select(q))
    }

    async fn execute(&self, q: &QueryBuf) -> Result<u64, AppError> {
        self.check()?;
        self.log(&q.sql);
        Ok(self.run_execute(q))
    }

    async fn find(&self, entity: &EntityDescriptor, id: &Value) -> Result<Option<Record>, AppError> {
        self.find_by(entity, &entity.primary_key, id).await
    }

    async fn find_by(&self, _entity: &EntityDescriptor, field: &str, value: &Value) -> Result<Option<Record>, AppError> {
        self.check()?;
        let found = self.position(field, value);
        Ok(found.and_then(|i| self.rows.lock().unwrap().get(i).cloned()))
    }

    async fn insert(&self, entity: &EntityDescriptor, data: &Record) -> Result<Record, AppError> {
        self.check()?;
        let mut row = data.clone();
        if row.get(&entity.primary_key).map(Value::is_null).unwrap_or(true) {
            let id = self.next_id.fetch_add(1, AtomicOrdering::SeqCst);
            row.insert(entity.primary_key.clone(), json!(id));
        }
        row.entry("deleted_at").or_insert(Value::Null);
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn update(&self, entity: &EntityDescriptor, id: &Value, data: &Record) -> Result<Option<Record>, AppError> {
        self.check()?;
        let Some(i) = self.position(&entity.primary_key, id) else {
            return Ok(None);
        };
        let mut rows = self.rows.lock().unwrap();
        for (k, v) in data {
            if *k != entity.primary_key {
                rows[i].insert(k.clone(), v.clone());
            }
        }
        Ok(Some(rows[i].clone()))
    }

    async fn soft_delete(&self, entity: &EntityDescriptor, id: &Value, changes: &Record) -> Result<(), AppError> {
        self.check()?;
        let Some(i) = self.position(&entity.primary_key, id) else {
            return Ok(());
        };
        let mut rows = self.rows.lock().unwrap();
        for (k, v) in changes {
            rows[i].insert(k.clone(), v.clone());
        }
        rows[i].insert("deleted_at".into(), json!(DELETED_AT));
        Ok(())
    }

    async fn delete(&self, entity: &EntityDescriptor, id: &Value) -> Result<(), AppError> {
        self.check()?;
        let pk = entity.primary_key.clone();
        self.rows
            .lock()
            .unwrap()
            .retain(|r| r.get(&pk).map(key_string) != Some(key_string(id)));
        Ok(())
    }
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

/// `"t"."col"`, `t.col` and `col` all name `col`.
fn column(raw: &str) -> String {
    let raw = raw.trim();
    let raw = raw
        .strip_prefix("CAST(")
        .and_then(|r| r.strip_suffix(" AS TEXT)"))
        .unwrap_or(raw);
    raw.rsplit('.').next().unwrap_or(raw).trim_matches('"').to_string()
}

fn param<'a>(params: &'a [Value], n: &str) -> &'a Value {
    let n: usize = n.parse().unwrap();
    &params[n - 1]
}

fn text(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or(0.0)
            .partial_cmp(&y.as_f64().unwrap_or(0.0))
            .unwrap_or(Ordering::Equal),
        _ => key_string(a).cmp(&key_string(b)),
    }
}

/// Undo `%term%` wrapping and backslash escaping of a LIKE pattern.
fn unlike(pattern: &str) -> String {
    let inner = pattern.strip_prefix('%').unwrap_or(pattern);
    let inner = inner.strip_suffix('%').unwrap_or(inner);
    let mut out = String::new();
    let mut escaped = false;
    for c in inner.chars() {
        if c == '\\' && !escaped {
            escaped = true;
            continue;
        }
        escaped = false;
        out.push(c);
    }
    out
}

fn strip_parens(expr: &str) -> Option<&str> {
    if !expr.starts_with('(') || !expr.ends_with(')') {
        return None;
    }
    let mut depth = 0;
    for (i, c) in expr.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 && i != expr.len() - 1 {
                    return None;
                }
            }
            _ => {}
        }
    }
    Some(&expr[1..expr.len() - 1])
}

fn split_top<'a>(expr: &'a str, sep: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quoted = false;
    let mut start = 0;
    let bytes = expr.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => quoted = !quoted,
            b'(' if !quoted => depth += 1,
            b')' if !quoted => depth -= 1,
            _ => {}
        }
        if depth == 0 && !quoted && expr[i..].starts_with(sep) {
            parts.push(&expr[start..i]);
            i += sep.len();
            start = i;
            continue;
        }
        i += 1;
    }
    parts.push(&expr[start..]);
    parts
}

fn eval(expr: &str, row: &Record, params: &[Value]) -> bool {
    let expr = expr.trim();
    if let Some(inner) = strip_parens(expr) {
        return eval(inner, row, params);
    }
    let ors = split_top(expr, " OR ");
    if ors.len() > 1 {
        return ors.iter().any(|e| eval(e, row, params));
    }
    let ands = split_top(expr, " AND ");
    if ands.len() > 1 {
        return ands.iter().all(|e| eval(e, row, params));
    }
    atom(expr, row, params)
}

fn atom(expr: &str, row: &Record, params: &[Value]) -> bool {
    if let Some(c) = re(r"^(.+) ILIKE \$(\d+)$").captures(expr) {
        let needle = unlike(&text(Some(param(params, &c[2])))).to_lowercase();
        return text(row.get(&column(&c[1]))).to_lowercase().contains(&needle);
    }
    if let Some(c) = re(r"^(\S+) IS NULL$").captures(expr) {
        return row.get(&column(&c[1])).map(Value::is_null).unwrap_or(true);
    }
    if let Some(c) = re(r"^(\S+) IS DISTINCT FROM \$(\d+)$").captures(expr) {
        let current = row.get(&column(&c[1])).cloned().unwrap_or(Value::Null);
        return key_string(&current) != key_string(param(params, &c[2]));
    }
    if let Some(c) = re(r"^(.+) = \$(\d+)(?:::text)?$").captures(expr) {
        let current = row.get(&column(&c[1])).cloned().unwrap_or(Value::Null);
        return key_string(&current) == key_string(param(params, &c[2]));
    }
    if let Some(c) = re(r"^(\S+) (<=|>=|<>|=|<|>) (.+)$").captures(expr) {
        let current = row.get(&column(&c[1])).cloned().unwrap_or(Value::Null);
        let literal = c[3].trim();
        let ord = match literal.strip_prefix('\'').and_then(|l| l.strip_suffix('\'')) {
            Some(s) => text(Some(&current)).as_str().cmp(s),
            None => cmp_values(&current, &json!(literal.parse::<f64>().unwrap())),
        };
        return match &c[2] {
            "<" => ord == Ordering::Less,
            "<=" => ord != Ordering::Greater,
            ">" => ord == Ordering::Greater,
            ">=" => ord != Ordering::Less,
            "<>" => ord != Ordering::Equal,
            _ => ord == Ordering::Equal,
        };
    }
    panic!("unsupported condition: {}", expr)
}
