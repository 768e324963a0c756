//! Write pipeline: before hooks, persistence, after hooks, cache invalidation.
//!
//! A failing before hook aborts the write and its error reaches the client unchanged. After hooks run once
//! the row is persisted, so their failures only add warnings to an otherwise successful response.

use crate::controller::hooks::{
    AfterDeleteHook, AfterSaveHook, BeforeDeleteHook, BeforeSaveHook, DeleteEvent, HookStage, SaveEvent, SavedEvent,
};
use crate::controller::RestController;
use crate::error::AppError;
use crate::store::Record;
use serde_json::Value;

/// Result of a write plus the non-fatal problems met after it was persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<String>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Outcome {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(value: T, warnings: Vec<String>) -> Self {
        Outcome { value, warnings }
    }
}

fn warn(stage: HookStage, e: &AppError, warnings: &mut Vec<String>) {
    tracing::warn!(stage = %stage, error = %e, "hook failed after write");
    warnings.push(format!("{}: {}", stage, e));
}

impl RestController {
    /// Create a record from `data`.
    pub async fn store(&self, data: Record) -> Result<Outcome<Record>, AppError> {
        let data = self.accepted(data);
        let original: Record = data.keys().map(|k| (k.clone(), Value::Null)).collect();

        let hooks = self.hooks();
        let data = self
            .run_before_save(hooks.before_store.as_ref(), data, &original)
            .await?;
        let data = self
            .run_before_save(hooks.before_any_save.as_ref(), data, &original)
            .await?;

        let record = self.record_store().insert(self.entity(), &data).await?;
        tracing::debug!(table = %self.entity().table, "record created");

        let mut warnings = Vec::new();
        self.run_after_save(HookStage::AfterStore, hooks.after_store.as_ref(), &data, &original, &record, &mut warnings)
            .await;
        self.run_after_save(HookStage::AfterAnySave, hooks.after_any_save.as_ref(), &data, &original, &record, &mut warnings)
            .await;
        warnings.extend(self.invalidate().await);
        Ok(Outcome::with_warnings(record, warnings))
    }

    /// Merge `data` into the live record `id`.
    pub async fn update(&self, id: &Value, data: Record) -> Result<Outcome<Record>, AppError> {
        let current = self.find_live(id).await?.ok_or_else(|| self.not_found(id))?;
        let data = self.accepted(data);
        let original: Record = data
            .keys()
            .map(|k| (k.clone(), current.get(k).cloned().unwrap_or(Value::Null)))
            .collect();

        let hooks = self.hooks();
        let data = self
            .run_before_save(hooks.before_update.as_ref(), data, &original)
            .await?;
        let data = self
            .run_before_save(hooks.before_any_save.as_ref(), data, &original)
            .await?;

        let record = self
            .record_store()
            .update(self.entity(), id, &data)
            .await?
            .ok_or_else(|| self.not_found(id))?;
        tracing::debug!(table = %self.entity().table, "record updated");

        let mut warnings = Vec::new();
        self.run_after_save(HookStage::AfterUpdate, hooks.after_update.as_ref(), &data, &original, &record, &mut warnings)
            .await;
        self.run_after_save(HookStage::AfterAnySave, hooks.after_any_save.as_ref(), &data, &original, &record, &mut warnings)
            .await;
        warnings.extend(self.invalidate().await);
        Ok(Outcome::with_warnings(record, warnings))
    }

    /// Soft or hard delete of the live record `id`, depending on the soft-delete mode.
    pub async fn destroy(&self, id: &Value) -> Result<Outcome<()>, AppError> {
        let mut record = self.find_live(id).await?.ok_or_else(|| self.not_found(id))?;
        let mut changes = Record::new();
        self.run_before_delete(self.hooks().before_delete.as_ref(), &mut record, &mut changes)
            .await?;
        self.run_before_delete(self.entity().pre_delete.as_ref(), &mut record, &mut changes)
            .await?;

        if self.settings().soft_deletes.is_enabled() {
            self.record_store().soft_delete(self.entity(), id, &changes).await?;
        } else {
            self.record_store().delete(self.entity(), id).await?;
        }
        tracing::debug!(table = %self.entity().table, soft = self.settings().soft_deletes.is_enabled(), "record deleted");

        let mut warnings = Vec::new();
        if let Some(hook) = self.hooks().after_delete.as_ref() {
            self.run_after_delete(hook, record, &mut warnings).await;
        }
        warnings.extend(self.invalidate().await);
        Ok(Outcome::with_warnings((), warnings))
    }

    /// Clear the tree cache after a write. Failure is reported, never raised.
    pub(crate) async fn invalidate(&self) -> Vec<String> {
        if !self.settings().uses_cache() {
            return Vec::new();
        }
        match self.clear_cache().await {
            Ok(()) => Vec::new(),
            Err(e) => {
                tracing::warn!(table = %self.entity().table, error = %e, "cache invalidation failed");
                vec![format!("cache invalidation: {}", e)]
            }
        }
    }

    fn accepted(&self, data: Record) -> Record {
        data.into_iter().filter(|(k, _)| self.entity().accepts(k)).collect()
    }

    async fn run_before_save(
        &self,
        hook: Option<&BeforeSaveHook>,
        data: Record,
        original: &Record,
    ) -> Result<Record, AppError> {
        let Some(hook) = hook else {
            return Ok(data);
        };
        let event = SaveEvent {
            data: data.clone(),
            original: original.clone(),
            controller: self.clone(),
        };
        Ok(hook(event).await?.unwrap_or(data))
    }

    async fn run_after_save(
        &self,
        stage: HookStage,
        hook: Option<&AfterSaveHook>,
        data: &Record,
        original: &Record,
        record: &Record,
        warnings: &mut Vec<String>,
    ) {
        let Some(hook) = hook else {
            return;
        };
        let event = SavedEvent {
            data: data.clone(),
            original: original.clone(),
            record: record.clone(),
            controller: self.clone(),
        };
        if let Err(e) = hook(event).await {
            warn(stage, &e, warnings);
        }
    }

    /// Replacement fields are merged into `record`; those that changed are collected for the delete statement.
    async fn run_before_delete(
        &self,
        hook: Option<&BeforeDeleteHook>,
        record: &mut Record,
        changes: &mut Record,
    ) -> Result<(), AppError> {
        let Some(hook) = hook else {
            return Ok(());
        };
        let event = DeleteEvent {
            record: record.clone(),
            controller: self.clone(),
        };
        if let Some(replaced) = hook(event).await? {
            let pk = &self.entity().primary_key;
            for (k, v) in replaced {
                if k == *pk || k == "deleted_at" || record.get(&k) == Some(&v) {
                    continue;
                }
                changes.insert(k.clone(), v.clone());
                record.insert(k, v);
            }
        }
        Ok(())
    }

    async fn run_after_delete(&self, hook: &AfterDeleteHook, record: Record, warnings: &mut Vec<String>) {
        let event = DeleteEvent {
            record,
            controller: self.clone(),
        };
        if let Err(e) = hook(event).await {
            warn(HookStage::AfterDelete, &e, warnings);
        }
    }
}
