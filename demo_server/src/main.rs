//! Demo server: a `users` resource backed by PostgreSQL.
//!
//! Run from repo root: `cargo run -p demo-server`
//! Expects a `users` table with `id`, `username`, `email`, `about`, `level`, `status` and `deleted_at` columns.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use rest_controller::{
    load_settings, response, rest_routes, AppError, ControllerConfig, ControllerSettings, EntityDescriptor, FieldList,
    Highlight, Hooks, IndexParams, MemoryCache, PgStore, RestController, SoftDelete, SortOrder,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;

fn users_settings() -> ControllerSettings {
    ControllerSettings {
        field_list: FieldList::Columns(
            ["id", "username", "email", "about", "level", "status"]
                .into_iter()
                .map(String::from)
                .collect(),
        ),
        sortable: vec!["username".into(), "email".into(), "level".into()],
        searchable: vec!["username".into(), "email".into(), "about".into()],
        default_sort_by: Some("username".into()),
        default_sort_order: SortOrder::Asc,
        soft_deletes: SoftDelete::ByTableName,
        rows: 20,
        highlight: Some(Highlight::Class("primary".into())),
        ..Default::default()
    }
}

fn users_hooks() -> Hooks {
    Hooks::default()
        .after_any_save(|ev| async move {
            if ev.record.get("status").and_then(Value::as_str) != Some("new") {
                return Ok(());
            }
            let ctl = ev.controller;
            let Some(id) = ev.record.get(&ctl.entity().primary_key).cloned() else {
                return Ok(());
            };
            let mut change = rest_controller::Record::new();
            change.insert("status".into(), Value::from("active"));
            ctl.record_store().update(ctl.entity(), &id, &change).await?;
            Ok::<_, AppError>(())
        })
        // Frees the address for a new account; the soft-deleted row keeps a unique placeholder.
        .before_delete(|ev| async move {
            let Some(email) = ev.record.get("email").and_then(Value::as_str) else {
                return Ok(None);
            };
            let mut replaced = ev.record.clone();
            replaced.insert(
                "email".into(),
                Value::from(format!("deleted-{}-{}", uuid::Uuid::new_v4().simple(), email)),
            );
            Ok(Some(replaced))
        })
}

/// Scope name to the filter that replaces the configured one.
fn scope_filter(scope: &str) -> Option<Vec<String>> {
    match scope {
        "public" => Some(vec!["status = 'active'".into(), "level < 5".into()]),
        "staff" => Some(vec!["level >= 5".into()]),
        _ => None,
    }
}

/// `GET /directory?filter=public|staff` plus the usual listing parameters.
async fn directory(
    State(ctl): State<RestController>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let mut params = IndexParams::from_query(&query, ctl.parent_param());
    if let Some(scope) = query.get("filter") {
        params.filter =
            Some(scope_filter(scope).ok_or_else(|| AppError::BadRequest(format!("unknown filter {}", scope)))?);
    }
    let page = ctl.index(&params).await?;
    Ok(response::list(page.data, page.meta))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rest_controller=info,demo_server=info")),
        )
        .init();

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/rest_demo".into());
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let settings = match std::env::var("SETTINGS_PATH") {
        Ok(path) => load_settings(path).await?,
        Err(_) => users_settings(),
    };
    let entity = EntityDescriptor::new("users", "id").attributes(["username", "email", "about", "level", "status"]);
    let users = RestController::new(
        entity,
        ControllerConfig::new(settings).with_hooks(users_hooks()),
        Arc::new(PgStore::new(pool)),
        Arc::new(MemoryCache::new()),
    )?;

    let app = Router::new()
        .route("/directory", get(directory))
        .with_state(users.clone())
        .nest("/users", rest_routes(users));

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("demo server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
