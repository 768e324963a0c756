//! Parent/child semantics over a flat table: cached children counts, ancestor paths and ordering.

use crate::config::TreeSettings;
use crate::controller::pipeline::Outcome;
use crate::controller::query::key_match;
use crate::controller::RestController;
use crate::error::AppError;
use crate::sql::{quoted, quoted_path, QueryBuf};
use crate::store::{key_string, Record};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::Ordering;

/// Direct-child count per parent id (keyed by the id's string form).
pub type TreeStats = HashMap<String, u64>;

/// Upper bound on parent hops when resolving a path; guards against cycles.
pub const MAX_PATH_DEPTH: usize = 20;

pub fn stats_key(table: &str) -> String {
    format!("{}-tree-stats", table)
}

/// Null, missing, zero and empty parents all mark a root.
fn is_root(parent: Option<&Value>) -> bool {
    match parent {
        None | Some(Value::Null) => true,
        Some(Value::Number(n)) => n.as_i64() == Some(0),
        Some(Value::String(s)) => s.is_empty() || s == "0",
        Some(_) => false,
    }
}

fn as_count(v: Option<&Value>) -> u64 {
    match v {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

impl RestController {
    fn tree(&self) -> Result<&TreeSettings, AppError> {
        self.settings()
            .tree
            .as_ref()
            .ok_or_else(|| AppError::BadRequest(format!("{} is not a tree", self.entity().table)))
    }

    fn live_only(&self) -> &'static str {
        if self.settings().soft_deletes.is_enabled() {
            "\"deleted_at\" IS NULL"
        } else {
            ""
        }
    }

    /// Children counts for the whole table, computed once and then served from the cache.
    pub async fn children_counts(&self) -> Result<TreeStats, AppError> {
        let tree = self.tree()?;
        let key = stats_key(&self.entity().table);
        if let Some(cached) = self.cache().get(&key).await {
            if let Ok(stats) = serde_json::from_value::<TreeStats>(cached) {
                return Ok(stats);
            }
        }

        let generation = self.cache_generation().load(Ordering::SeqCst);
        if let Some(hook) = &self.hooks().on_build_cache {
            hook(self.clone()).await?;
        }
        let parent = quoted(&tree.parent);
        let live = self.live_only();
        let sql = format!(
            "SELECT {p} AS parent, COUNT(*) AS total FROM {t}{w} GROUP BY {p}",
            p = parent,
            t = quoted_path(&self.entity().table),
            w = if live.is_empty() { String::new() } else { format!(" WHERE {}", live) },
        );
        let rows = self.run_select(&QueryBuf::with_sql(sql)).await?;
        let stats: TreeStats = rows
            .iter()
            .filter_map(|r| {
                let parent = r.get("parent").filter(|p| !p.is_null())?;
                Some((key_string(parent), as_count(r.get("total"))))
            })
            .collect();
        tracing::info!(table = %self.entity().table, parents = stats.len(), "tree stats rebuilt");

        // A clear during the rebuild means these counts may predate a write.
        if self.cache_generation().load(Ordering::SeqCst) == generation {
            let entry: Map<String, Value> = stats.iter().map(|(k, v)| (k.clone(), Value::from(*v))).collect();
            self.cache().put(&key, Value::Object(entry)).await;
        } else {
            tracing::debug!(table = %self.entity().table, "cache cleared during rebuild, stats not stored");
        }
        Ok(stats)
    }

    /// Run `on-clear-cache`, then drop the stats entry so the next read rebuilds it.
    pub async fn clear_cache(&self) -> Result<(), AppError> {
        self.cache_generation().fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = &self.hooks().on_clear_cache {
            hook(self.clone()).await?;
        }
        self.cache().pull(&stats_key(&self.entity().table)).await;
        Ok(())
    }

    /// Set the children-count field on every row; parents without an entry count 0.
    pub async fn annotate(&self, rows: &mut [Record]) -> Result<(), AppError> {
        if rows.is_empty() {
            return Ok(());
        }
        let stats = self.children_counts().await?;
        let tree = self.tree()?;
        let pk = &self.entity().primary_key;
        for row in rows.iter_mut() {
            let count = row
                .get(pk)
                .and_then(|id| stats.get(&key_string(id)))
                .copied()
                .unwrap_or(0);
            row.insert(tree.children_count.clone(), Value::from(count));
        }
        Ok(())
    }

    /// Ancestors of `id`, root first, ending with the record itself.
    pub async fn parents(&self, id: &Value) -> Result<Vec<Record>, AppError> {
        let tree = self.tree()?;
        let start = self.find_live(id).await?.ok_or_else(|| self.not_found(id))?;
        let mut chain = vec![start];
        for _ in 0..MAX_PATH_DEPTH {
            let parent = match chain.last().map(|r| r.get(&tree.parent)) {
                Some(p) if !is_root(p) => p.cloned().unwrap_or(Value::Null),
                _ => break,
            };
            match self.find_live(&parent).await? {
                Some(record) => chain.push(record),
                None => break,
            }
        }
        chain.reverse();
        Ok(chain)
    }

    /// Primary keys along the path from the root to `id`.
    pub async fn path(&self, id: &Value) -> Result<Vec<Value>, AppError> {
        let pk = &self.entity().primary_key;
        Ok(self
            .parents(id)
            .await?
            .into_iter()
            .map(|mut r| r.remove(pk).unwrap_or(Value::Null))
            .collect())
    }

    /// Give each id its index as position. Rows already in place are not touched.
    /// Statements run one by one outside a transaction; the cache is cleared afterwards.
    pub async fn reorder(&self, ids: &[Value]) -> Result<Outcome<u64>, AppError> {
        let tree = self.tree()?;
        let pos = quoted(tree.position_column());
        let pk = quoted(&self.entity().primary_key);
        let table = quoted_path(&self.entity().table);
        let touch = if tree.touch_updated_at { ", \"updated_at\" = NOW()" } else { "" };
        let live = self.live_only();

        let mut changed = 0;
        for (i, id) in ids.iter().enumerate() {
            let mut q = QueryBuf::new();
            let n = q.push_param(Value::from(i as i64));
            let id_match = key_match(&pk, id.clone(), &mut q);
            let mut sql = format!(
                "UPDATE {} SET {} = ${}{} WHERE {} AND {} IS DISTINCT FROM ${}",
                table, pos, n, touch, id_match, pos, n
            );
            if !live.is_empty() {
                sql.push_str(" AND ");
                sql.push_str(live);
            }
            q.sql = sql;
            changed += self.run_execute(&q).await?;
        }
        tracing::debug!(table = %self.entity().table, ids = ids.len(), changed, "reordered");

        let warnings = self.invalidate().await;
        Ok(Outcome::with_warnings(changed, warnings))
    }

    /// Next free position under `parent` (`None` for roots): highest live position plus one, 0 when empty.
    pub async fn last_position(&self, parent: Option<&Value>) -> Result<i64, AppError> {
        let tree = self.tree()?;
        let parent_col = quoted(&tree.parent);
        let mut q = QueryBuf::new();
        let mut conds = vec![match parent.filter(|p| !is_root(Some(*p))) {
            Some(p) => key_match(&parent_col, p.clone(), &mut q),
            None => format!("{} IS NULL", parent_col),
        }];
        let live = self.live_only();
        if !live.is_empty() {
            conds.push(live.to_string());
        }
        q.sql = format!(
            "SELECT MAX({}) AS position FROM {} WHERE {}",
            quoted(tree.position_column()),
            quoted_path(&self.entity().table),
            conds.join(" AND ")
        );
        let rows = self.run_select(&q).await?;
        let max = rows.first().and_then(|r| r.get("position")).and_then(|v| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        });
        Ok(max.map(|m| m + 1).unwrap_or(0))
    }
}
