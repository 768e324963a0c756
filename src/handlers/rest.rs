//! REST handlers over a [`RestController`]: index, show, store, update, destroy, sort, path.

use crate::controller::{IndexParams, RestController};
use crate::error::AppError;
use crate::response;
use crate::store::{key_string, Record};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

fn body_to_record(value: Value) -> Result<Record, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

/// Ids from a JSON body may arrive as numbers or strings; normalize them through the key type.
fn body_id(ctl: &RestController, v: &Value) -> Result<Value, AppError> {
    ctl.entity().pk_type.parse_id(&key_string(v))
}

pub async fn index(
    State(ctl): State<RestController>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let params = IndexParams::from_query(&query, ctl.parent_param());
    let page = ctl.index(&params).await?;
    Ok(response::list(page.data, page.meta))
}

pub async fn show(
    State(ctl): State<RestController>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = ctl.entity().pk_type.parse_id(&id_str)?;
    let record = ctl.show(&id).await?;
    Ok(response::show(record))
}

pub async fn store(
    State(ctl): State<RestController>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let data = body_to_record(body)?;
    let outcome = ctl.store(data).await?;
    Ok(response::created(outcome.value, ctl.settings().created_message(), outcome.warnings))
}

pub async fn update(
    State(ctl): State<RestController>,
    Path(id_str): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let id = ctl.entity().pk_type.parse_id(&id_str)?;
    let data = body_to_record(body)?;
    let outcome = ctl.update(&id, data).await?;
    Ok(response::updated(outcome.value, ctl.settings().updated_message(), outcome.warnings))
}

pub async fn destroy(
    State(ctl): State<RestController>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = ctl.entity().pk_type.parse_id(&id_str)?;
    let outcome = ctl.destroy(&id).await?;
    Ok(response::deleted(ctl.settings().deleted_message(), outcome.warnings))
}

/// Body: `{"order": [id, ...]}`, listed in their new order.
pub async fn sort(
    State(ctl): State<RestController>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let order = body
        .get("order")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::BadRequest("order must be an array of ids".into()))?;
    let ids = order
        .iter()
        .map(|v| body_id(&ctl, v))
        .collect::<Result<Vec<_>, _>>()?;
    let outcome = ctl.reorder(&ids).await?;
    Ok(response::generic_message("Order saved".into(), outcome.warnings))
}

pub async fn path(
    State(ctl): State<RestController>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = ctl.entity().pk_type.parse_id(&id_str)?;
    let ids = ctl.path(&id).await?;
    Ok(response::show(ids))
}
