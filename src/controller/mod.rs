//! The REST controller: listing, lookup and the write pipeline for one entity.

pub mod hooks;
pub mod pager;
pub mod query;
pub mod shaper;
pub mod tree;

mod pipeline;

pub use hooks::{
    before_delete_hook, AfterDeleteHook, AfterSaveHook, BeforeDeleteHook, BeforeSaveHook, BoxFuture, CacheHook,
    DeleteEvent, HookResult, HookStage, Hooks, PageHook, RowHook, RowOutcome, SaveEvent, SavedEvent, ShowHook,
};
pub use pager::{PageMeta, Window};
pub use pipeline::Outcome;
pub use query::{IndexParams, ListQuery};
pub use tree::TreeStats;

use crate::cache::Cache;
use crate::config::{validate_entity, validate_settings, ControllerConfig, ControllerSettings, EntityDescriptor};
use crate::error::{AppError, ConfigError};
use crate::sql::QueryBuf;
use crate::store::{is_soft_deleted, key_string, Record, RecordStore};
use serde_json::Value;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

/// One page of `index` output.
#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    pub data: Vec<Record>,
    pub meta: PageMeta,
}

/// Cheap to clone; every clone shares the same configuration, store and cache.
#[derive(Clone)]
pub struct RestController {
    entity: Arc<EntityDescriptor>,
    config: Arc<ControllerConfig>,
    store: Arc<dyn RecordStore>,
    cache: Arc<dyn Cache>,
    cache_generation: Arc<AtomicU64>,
}

impl RestController {
    /// Validates the descriptor and settings; misconfiguration never reaches request time.
    pub fn new(
        entity: EntityDescriptor,
        config: ControllerConfig,
        store: Arc<dyn RecordStore>,
        cache: Arc<dyn Cache>,
    ) -> Result<Self, ConfigError> {
        validate_entity(&entity)?;
        validate_settings(&config.settings)?;
        tracing::debug!(table = %entity.table, hooks = ?config.hooks, "controller ready");
        Ok(RestController {
            entity: Arc::new(entity),
            config: Arc::new(config),
            store,
            cache,
            cache_generation: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn entity(&self) -> &EntityDescriptor {
        &self.entity
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.config.settings
    }

    pub fn hooks(&self) -> &Hooks {
        &self.config.hooks
    }

    pub fn record_store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    /// Bumped by every cache clear.
    pub(crate) fn cache_generation(&self) -> &AtomicU64 {
        &self.cache_generation
    }

    /// Name of the request parameter selecting a tree level.
    pub fn parent_param(&self) -> &str {
        query::parent_param(self.settings())
    }

    /// First live row whose `field` equals `value`. Meant for hooks (uniqueness checks and the like).
    pub async fn find_by(&self, field: &str, value: &Value) -> Result<Option<Record>, AppError> {
        let found = self.store.find_by(&self.entity, field, value).await?;
        Ok(found.filter(|r| !self.hidden(r)))
    }

    /// Row by primary key, treating soft-deleted rows as absent.
    pub async fn find_live(&self, id: &Value) -> Result<Option<Record>, AppError> {
        let found = self.store.find(&self.entity, id).await?;
        Ok(found.filter(|r| !self.hidden(r)))
    }

    fn hidden(&self, record: &Record) -> bool {
        self.settings().soft_deletes.is_enabled() && is_soft_deleted(record)
    }

    pub(crate) fn not_found(&self, id: &Value) -> AppError {
        AppError::NotFound(format!("{} {}", self.entity.table, key_string(id)))
    }

    pub(crate) async fn run_select(&self, q: &QueryBuf) -> Result<Vec<Record>, AppError> {
        self.store.select(q).await.map_err(|e| {
            tracing::error!(sql = %q.sql, params = ?q.params, error = %e, "select failed");
            e
        })
    }

    pub(crate) async fn run_execute(&self, q: &QueryBuf) -> Result<u64, AppError> {
        self.store.execute(q).await.map_err(|e| {
            tracing::error!(sql = %q.sql, params = ?q.params, error = %e, "statement failed");
            e
        })
    }

    /// Filtered, searched, sorted and paginated listing.
    pub async fn index(&self, params: &IndexParams) -> Result<Page, AppError> {
        let settings = self.settings();
        let list = query::build(&self.entity, settings, params);
        let per_page = pager::page_size(settings, params);

        let total = pager::read_total(&self.run_select(&list.count_query()).await?);
        let mut meta = PageMeta::new(total, per_page, params.page);

        let mut rows = if total == 0 {
            Vec::new()
        } else if let Some(find) = params.find_id() {
            let all = self.run_select(&list.select_query(None)).await?;
            if let Some(index) = pager::locate(&all, &self.entity.primary_key, find) {
                meta.move_to_index(index);
            }
            pager::slice(all, &meta)
        } else {
            self.run_select(&list.select_query(Some(meta.window()))).await?
        };

        if settings.tree.is_some() {
            self.annotate(&mut rows).await?;
        }
        let data = shaper::shape(self, rows, params.search_term()).await?;
        Ok(Page { data, meta })
    }

    /// Single live row, with its children count in tree mode, passed through `on-show`.
    pub async fn show(&self, id: &Value) -> Result<Record, AppError> {
        let mut record = self.find_live(id).await?.ok_or_else(|| self.not_found(id))?;
        if self.settings().tree.is_some() {
            self.annotate(std::slice::from_mut(&mut record)).await?;
        }
        if let Some(hook) = &self.hooks().on_show {
            if let Some(replaced) = hook(record.clone(), self.clone()).await? {
                record = replaced;
            }
        }
        Ok(record)
    }
}
