//! Resource routes for one controller. Nest the router under the resource path, e.g. `/users`.

use crate::controller::RestController;
use crate::handlers::rest::{destroy, index, path, show, sort, store, update};
use axum::{routing::get, routing::post, Router};

pub fn rest_routes(controller: RestController) -> Router {
    Router::new()
        .route("/", get(index).post(store))
        .route("/sort", post(sort))
        .route("/:id", get(show).patch(update).put(update).delete(destroy))
        .route("/:id/path", get(path))
        .with_state(controller)
}
