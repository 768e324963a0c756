//! Configuration-driven REST controllers: paginated, searchable, sortable listings with soft deletes,
//! lifecycle hooks and an optional tree mode, over a pluggable record store.

pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod sql;
pub mod store;

pub use cache::{Cache, MemoryCache};
pub use config::{
    load_settings, settings_from_json, ControllerConfig, ControllerSettings, EntityDescriptor, FieldList, Highlight,
    PkType, SoftDelete, SortOrder, TreeSettings,
};
pub use controller::{
    before_delete_hook, DeleteEvent, HookStage, Hooks, IndexParams, Outcome, Page, PageMeta, RestController,
    RowOutcome, SaveEvent, SavedEvent,
};
pub use error::{AppError, ConfigError, FieldError};
pub use routes::rest_routes;
pub use store::{PgStore, Record, RecordStore};
