//! PostgreSQL record store.

use crate::config::EntityDescriptor;
use crate::error::{AppError, FieldError};
use crate::sql::{self, ColumnTypes, PgBindValue, QueryBuf};
use crate::store::{Record, RecordStore};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::error::ErrorKind;
use sqlx::postgres::{PgArguments, PgDatabaseError, PgPool, PgRow, Postgres};
use sqlx::query::Query;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub struct PgStore {
    pool: PgPool,
    /// Column types per table, loaded on first write and kept for the life of the store.
    column_types: RwLock<HashMap<String, Arc<ColumnTypes>>>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore {
            pool,
            column_types: RwLock::new(HashMap::new()),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn types_for(&self, entity: &EntityDescriptor) -> Result<Arc<ColumnTypes>, AppError> {
        let cached = self
            .column_types
            .read()
            .ok()
            .and_then(|m| m.get(&entity.table).cloned());
        if let Some(types) = cached {
            return Ok(types);
        }
        let (schema, table) = match entity.table.rsplit_once('.') {
            Some((s, t)) => (Some(s), t),
            None => (None, entity.table.as_str()),
        };
        let sql = r#"
            SELECT column_name::text,
                   CASE WHEN udt_schema = 'pg_catalog' THEN udt_name::text
                        ELSE udt_schema::text || '.' || udt_name::text END
            FROM information_schema.columns
            WHERE table_name = $1 AND table_schema = COALESCE($2, current_schema())
        "#;
        tracing::debug!(table = %entity.table, "loading column types");
        let rows: Vec<(String, String)> = sqlx::query_as(sql)
            .bind(table)
            .bind(schema)
            .fetch_all(&self.pool)
            .await?;
        let types = Arc::new(rows.into_iter().collect::<ColumnTypes>());
        if let Ok(mut guard) = self.column_types.write() {
            guard.insert(entity.table.clone(), types.clone());
        }
        Ok(types)
    }

    async fn query_many(&self, q: &QueryBuf) -> Result<Vec<Record>, sqlx::Error> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(&q.sql, &q.params).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn query_optional(&self, q: &QueryBuf) -> Result<Option<Record>, sqlx::Error> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(&q.sql, &q.params).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn execute_raw(&self, q: &QueryBuf) -> Result<u64, sqlx::Error> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
        let result = bind_all(&q.sql, &q.params).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn select(&self, q: &QueryBuf) -> Result<Vec<Record>, AppError> {
        Ok(self.query_many(q).await?)
    }

    async fn execute(&self, q: &QueryBuf) -> Result<u64, AppError> {
        Ok(self.execute_raw(q).await?)
    }

    async fn find(&self, entity: &EntityDescriptor, id: &Value) -> Result<Option<Record>, AppError> {
        let types = self.types_for(entity).await?;
        let q = sql::select_by_id(entity, id, &types);
        Ok(self.query_optional(&q).await.map_err(|e| failed(&q, e))?)
    }

    async fn find_by(&self, entity: &EntityDescriptor, field: &str, value: &Value) -> Result<Option<Record>, AppError> {
        let types = self.types_for(entity).await?;
        let q = sql::select_by_field(entity, field, value, &types);
        Ok(self.query_optional(&q).await.map_err(|e| failed(&q, e))?)
    }

    async fn insert(&self, entity: &EntityDescriptor, data: &Record) -> Result<Record, AppError> {
        let types = self.types_for(entity).await?;
        let q = sql::insert(entity, data, &types);
        self.query_optional(&q)
            .await
            .map_err(|e| classify_write_error(failed(&q, e)))?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))
    }

    async fn update(&self, entity: &EntityDescriptor, id: &Value, data: &Record) -> Result<Option<Record>, AppError> {
        let types = self.types_for(entity).await?;
        let q = sql::update(entity, id, data, &types);
        self.query_optional(&q)
            .await
            .map_err(|e| classify_write_error(failed(&q, e)))
    }

    async fn soft_delete(&self, entity: &EntityDescriptor, id: &Value, changes: &Record) -> Result<(), AppError> {
        let types = self.types_for(entity).await?;
        let q = sql::soft_delete(entity, id, changes, &types);
        self.query_optional(&q)
            .await
            .map_err(|e| classify_write_error(failed(&q, e)))?;
        Ok(())
    }

    async fn delete(&self, entity: &EntityDescriptor, id: &Value) -> Result<(), AppError> {
        let types = self.types_for(entity).await?;
        let q = sql::delete(entity, id, &types);
        self.execute_raw(&q)
            .await
            .map_err(|e| classify_write_error(failed(&q, e)))?;
        Ok(())
    }
}

/// Record-level statements are logged here; `select`/`execute` callers log their own.
fn failed(q: &QueryBuf, e: sqlx::Error) -> sqlx::Error {
    tracing::error!(sql = %q.sql, params = ?q.params, error = %e, "statement failed");
    e
}

fn bind_all<'q>(sql: &'q str, params: &'q [Value]) -> Query<'q, Postgres, PgArguments> {
    let mut query = sqlx::query(sql);
    for p in params {
        query = query.bind(PgBindValue::from_json(p));
    }
    query
}

/// Integrity violations (SQLSTATE class 23) are the client's fault: report them as validation failures.
fn classify_write_error(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().map(|c| c.starts_with("23")).unwrap_or(false) {
            let validation = match db.kind() {
                ErrorKind::UniqueViolation => "unique",
                ErrorKind::ForeignKeyViolation => "foreign_key",
                ErrorKind::NotNullViolation => "required",
                ErrorKind::CheckViolation => "check",
                _ => "integrity",
            };
            let field = db
                .try_downcast_ref::<PgDatabaseError>()
                .and_then(|pg| pg.column())
                .or_else(|| db.constraint())
                .unwrap_or("record")
                .to_string();
            let message = db.message().to_string();
            return AppError::validation(message.clone(), vec![FieldError::new(field, message, validation)]);
        }
    }
    AppError::Db(e)
}

fn row_to_record(row: &PgRow) -> Record {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Record::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(name) {
        return j;
    }
    Value::Null
}
