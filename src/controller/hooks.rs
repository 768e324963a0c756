//! Lifecycle hooks: optional callbacks the controller invokes around reads and writes.
//!
//! Every async hook receives owned data plus a clone of the controller, so closures can call back into it
//! (e.g. `find_by` for uniqueness checks) without borrowing across await points. A hook that returns
//! `Some(record)` replaces the payload for every later stage; `None` leaves it alone.

use crate::controller::RestController;
use crate::error::AppError;
use crate::store::Record;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type HookResult<T> = Result<T, AppError>;

/// Input of `before-store`, `before-update` and `before-any-save`.
pub struct SaveEvent {
    pub data: Record,
    /// Pre-change values of every payload field; all null on create.
    pub original: Record,
    pub controller: RestController,
}

/// Input of `after-store`, `after-update` and `after-any-save`.
pub struct SavedEvent {
    pub data: Record,
    pub original: Record,
    /// Row as persisted.
    pub record: Record,
    pub controller: RestController,
}

pub struct DeleteEvent {
    pub record: Record,
    pub controller: RestController,
}

/// What `on-transform-row` wants done with a row.
#[derive(Clone, Debug, PartialEq)]
pub enum RowOutcome {
    Keep,
    Replace(Record),
    /// Drop the row from the page. Page metadata is not adjusted.
    Omit,
}

pub type BeforeSaveHook = Arc<dyn Fn(SaveEvent) -> BoxFuture<'static, HookResult<Option<Record>>> + Send + Sync>;
pub type AfterSaveHook = Arc<dyn Fn(SavedEvent) -> BoxFuture<'static, HookResult<()>> + Send + Sync>;
pub type BeforeDeleteHook = Arc<dyn Fn(DeleteEvent) -> BoxFuture<'static, HookResult<Option<Record>>> + Send + Sync>;
pub type AfterDeleteHook = Arc<dyn Fn(DeleteEvent) -> BoxFuture<'static, HookResult<()>> + Send + Sync>;
pub type ShowHook = Arc<dyn Fn(Record, RestController) -> BoxFuture<'static, HookResult<Option<Record>>> + Send + Sync>;
pub type PageHook = Arc<dyn Fn(Vec<Record>, RestController) -> BoxFuture<'static, HookResult<Vec<Record>>> + Send + Sync>;
pub type RowHook = Arc<dyn Fn(&Record, &RestController) -> RowOutcome + Send + Sync>;
pub type CacheHook = Arc<dyn Fn(RestController) -> BoxFuture<'static, HookResult<()>> + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookStage {
    BeforeStore,
    BeforeUpdate,
    BeforeAnySave,
    AfterStore,
    AfterUpdate,
    AfterAnySave,
    BeforeDelete,
    AfterDelete,
    OnTransformRow,
    OnShow,
    OnTransformPage,
    OnBuildCache,
    OnClearCache,
}

impl HookStage {
    pub const ALL: [HookStage; 13] = [
        HookStage::BeforeStore,
        HookStage::BeforeUpdate,
        HookStage::BeforeAnySave,
        HookStage::AfterStore,
        HookStage::AfterUpdate,
        HookStage::AfterAnySave,
        HookStage::BeforeDelete,
        HookStage::AfterDelete,
        HookStage::OnTransformRow,
        HookStage::OnShow,
        HookStage::OnTransformPage,
        HookStage::OnBuildCache,
        HookStage::OnClearCache,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HookStage::BeforeStore => "before-store",
            HookStage::BeforeUpdate => "before-update",
            HookStage::BeforeAnySave => "before-any-save",
            HookStage::AfterStore => "after-store",
            HookStage::AfterUpdate => "after-update",
            HookStage::AfterAnySave => "after-any-save",
            HookStage::BeforeDelete => "before-delete",
            HookStage::AfterDelete => "after-delete",
            HookStage::OnTransformRow => "on-transform-row",
            HookStage::OnShow => "on-show",
            HookStage::OnTransformPage => "on-transform-page",
            HookStage::OnBuildCache => "on-build-cache",
            HookStage::OnClearCache => "on-clear-cache",
        }
    }
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Default)]
pub struct Hooks {
    pub before_store: Option<BeforeSaveHook>,
    pub before_update: Option<BeforeSaveHook>,
    pub before_any_save: Option<BeforeSaveHook>,
    pub after_store: Option<AfterSaveHook>,
    pub after_update: Option<AfterSaveHook>,
    pub after_any_save: Option<AfterSaveHook>,
    pub before_delete: Option<BeforeDeleteHook>,
    pub after_delete: Option<AfterDeleteHook>,
    pub on_transform_row: Option<RowHook>,
    pub on_show: Option<ShowHook>,
    pub on_transform_page: Option<PageHook>,
    pub on_build_cache: Option<CacheHook>,
    pub on_clear_cache: Option<CacheHook>,
}

/// Builder setter taking any async closure and boxing its future.
macro_rules! async_hook_setter {
    ($name:ident, ($($arg:ident: $ty:ty),+) -> $out:ty) => {
        pub fn $name<F, Fut>(mut self, f: F) -> Self
        where
            F: Fn($($ty),+) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = HookResult<$out>> + Send + 'static,
        {
            self.$name = Some(Arc::new(move |$($arg: $ty),+| -> BoxFuture<'static, HookResult<$out>> {
                Box::pin(f($($arg),+))
            }));
            self
        }
    };
}

impl Hooks {
    async_hook_setter!(before_store, (ev: SaveEvent) -> Option<Record>);
    async_hook_setter!(before_update, (ev: SaveEvent) -> Option<Record>);
    async_hook_setter!(before_any_save, (ev: SaveEvent) -> Option<Record>);
    async_hook_setter!(after_store, (ev: SavedEvent) -> ());
    async_hook_setter!(after_update, (ev: SavedEvent) -> ());
    async_hook_setter!(after_any_save, (ev: SavedEvent) -> ());
    async_hook_setter!(before_delete, (ev: DeleteEvent) -> Option<Record>);
    async_hook_setter!(after_delete, (ev: DeleteEvent) -> ());
    async_hook_setter!(on_show, (record: Record, ctl: RestController) -> Option<Record>);
    async_hook_setter!(on_transform_page, (rows: Vec<Record>, ctl: RestController) -> Vec<Record>);
    async_hook_setter!(on_build_cache, (ctl: RestController) -> ());
    async_hook_setter!(on_clear_cache, (ctl: RestController) -> ());

    pub fn on_transform_row<F>(mut self, f: F) -> Self
    where
        F: Fn(&Record, &RestController) -> RowOutcome + Send + Sync + 'static,
    {
        self.on_transform_row = Some(Arc::new(f));
        self
    }

    pub fn is_set(&self, stage: HookStage) -> bool {
        match stage {
            HookStage::BeforeStore => self.before_store.is_some(),
            HookStage::BeforeUpdate => self.before_update.is_some(),
            HookStage::BeforeAnySave => self.before_any_save.is_some(),
            HookStage::AfterStore => self.after_store.is_some(),
            HookStage::AfterUpdate => self.after_update.is_some(),
            HookStage::AfterAnySave => self.after_any_save.is_some(),
            HookStage::BeforeDelete => self.before_delete.is_some(),
            HookStage::AfterDelete => self.after_delete.is_some(),
            HookStage::OnTransformRow => self.on_transform_row.is_some(),
            HookStage::OnShow => self.on_show.is_some(),
            HookStage::OnTransformPage => self.on_transform_page.is_some(),
            HookStage::OnBuildCache => self.on_build_cache.is_some(),
            HookStage::OnClearCache => self.on_clear_cache.is_some(),
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(HookStage::ALL.iter().filter(|s| self.is_set(**s)).map(|s| s.name()))
            .finish()
    }
}

/// Wrap an async closure as an entity pre-delete step (see `EntityDescriptor::pre_delete`).
pub fn before_delete_hook<F, Fut>(f: F) -> BeforeDeleteHook
where
    F: Fn(DeleteEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HookResult<Option<Record>>> + Send + 'static,
{
    Arc::new(move |ev: DeleteEvent| -> BoxFuture<'static, HookResult<Option<Record>>> { Box::pin(f(ev)) })
}
