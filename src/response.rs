//! Standard response envelope helpers.

use crate::controller::PageMeta;
use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct ListBody<T> {
    pub status: &'static str,
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[derive(Serialize)]
pub struct DataBody<T> {
    pub status: &'static str,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Best-effort failures that happened after the write committed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Serialize)]
pub struct MessageBody {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

pub fn generic_data<T: Serialize>(
    status: StatusCode,
    data: T,
    message: Option<String>,
    warnings: Vec<String>,
) -> (StatusCode, Json<DataBody<T>>) {
    (
        status,
        Json(DataBody {
            status: "success",
            data,
            message,
            warnings,
        }),
    )
}

pub fn generic_message(message: String, warnings: Vec<String>) -> (StatusCode, Json<MessageBody>) {
    (
        StatusCode::OK,
        Json(MessageBody {
            status: "success",
            message,
            warnings,
        }),
    )
}

pub fn list<T: Serialize>(data: Vec<T>, meta: PageMeta) -> (StatusCode, Json<ListBody<T>>) {
    (
        StatusCode::OK,
        Json(ListBody {
            status: "success",
            data,
            meta,
        }),
    )
}

pub fn show<T: Serialize>(data: T) -> (StatusCode, Json<DataBody<T>>) {
    generic_data(StatusCode::OK, data, None, Vec::new())
}

pub fn created<T: Serialize>(data: T, message: String, warnings: Vec<String>) -> (StatusCode, Json<DataBody<T>>) {
    generic_data(StatusCode::CREATED, data, Some(message), warnings)
}

pub fn updated<T: Serialize>(data: T, message: String, warnings: Vec<String>) -> (StatusCode, Json<DataBody<T>>) {
    generic_data(StatusCode::ACCEPTED, data, Some(message), warnings)
}

pub fn deleted(message: String, warnings: Vec<String>) -> (StatusCode, Json<MessageBody>) {
    generic_message(message, warnings)
}
