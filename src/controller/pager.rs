//! Page arithmetic and find-mode positioning.

use crate::config::ControllerSettings;
use crate::controller::query::IndexParams;
use crate::store::{key_string, Record};
use serde::Serialize;
use serde_json::Value;

/// Tree listings return every child of one parent on a single page.
pub const TREE_PAGE_SIZE: u64 = 1000;

/// Ceiling for a client- or config-supplied page size.
pub const MAX_PAGE_SIZE: u64 = TREE_PAGE_SIZE;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub per_page: u64,
    pub current_page: u64,
    pub total: u64,
    pub last_page: u64,
    pub from: u64,
    pub to: u64,
}

/// LIMIT/OFFSET of one page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub limit: u64,
    pub offset: u64,
}

impl PageMeta {
    /// Clamps `requested` into `[1, last_page]`. An empty set has exactly one (empty) page.
    pub fn new(total: u64, per_page: u64, requested: u64) -> Self {
        let per_page = per_page.max(1);
        let last_page = if total == 0 { 1 } else { total.div_ceil(per_page) };
        let mut meta = PageMeta {
            per_page,
            current_page: 1,
            total,
            last_page,
            from: 1,
            to: 0,
        };
        meta.set_page(requested);
        meta
    }

    fn set_page(&mut self, page: u64) {
        self.current_page = page.clamp(1, self.last_page);
        self.from = self.per_page * (self.current_page - 1) + 1;
        self.to = (self.per_page * self.current_page).min(self.total);
    }

    /// Move to the page holding the row at 0-based `index` of the full result set.
    pub fn move_to_index(&mut self, index: usize) {
        self.set_page(index as u64 / self.per_page + 1);
    }

    pub fn window(&self) -> Window {
        Window {
            limit: self.per_page,
            offset: self.offset(),
        }
    }

    pub fn offset(&self) -> u64 {
        self.from - 1
    }
}

pub fn page_size(settings: &ControllerSettings, params: &IndexParams) -> u64 {
    if settings.tree.is_some() {
        return TREE_PAGE_SIZE;
    }
    params
        .rows
        .filter(|n| *n > 0)
        .unwrap_or(settings.rows)
        .clamp(1, MAX_PAGE_SIZE)
}

/// `total` column of a `COUNT(*) AS total` result.
pub fn read_total(rows: &[Record]) -> u64 {
    match rows.first().and_then(|r| r.get("total")) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Position of the row whose primary key equals `id`, compared as strings.
pub fn locate(rows: &[Record], primary_key: &str, id: &str) -> Option<usize> {
    rows.iter()
        .position(|r| r.get(primary_key).map(|v| key_string(v) == id).unwrap_or(false))
}

/// Rows `from..=to` (1-based) of an already fetched full set.
pub fn slice(rows: Vec<Record>, meta: &PageMeta) -> Vec<Record> {
    rows.into_iter()
        .skip(meta.offset() as usize)
        .take(meta.per_page as usize)
        .collect()
}
