//! Management console served by the registry

mod assets;
pub mod pages;

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::registry::{Action, ActionError, Registry};

/// Path the proxy sends unroutable requests to
pub const NOT_FOUND_PATH: &str = "/not-found";

pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/api/apps", get(handle_api_apps))
        .route("/apps/:name", get(handle_detail))
        .route("/apps/:name/:action", get(handle_action))
        .route(NOT_FOUND_PATH, get(handle_not_found))
        .route("/assets/*path", get(handle_asset))
        .with_state(registry)
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Html(pages::error(status, message))).into_response()
}

fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn action_status(error: &ActionError) -> StatusCode {
    match error {
        ActionError::NotFound(_) | ActionError::UnknownAction(_) => StatusCode::NOT_FOUND,
        ActionError::App(e) if e.is_user_error() => StatusCode::CONFLICT,
        ActionError::App(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn handle_index(State(registry): State<Arc<Registry>>) -> Html<String> {
    Html(pages::index(&registry.infos(), registry.tld()))
}

async fn handle_api_apps(State(registry): State<Arc<Registry>>) -> impl IntoResponse {
    Json(registry.infos())
}

async fn handle_detail(
    Path(name): Path<String>,
    State(registry): State<Arc<Registry>>,
) -> Response {
    match registry.lookup(&name) {
        Some(app) => Html(pages::detail(&app.info(), registry.tld())).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            &ActionError::NotFound(name).to_string(),
        ),
    }
}

async fn handle_action(
    Path((name, action)): Path<(String, String)>,
    State(registry): State<Arc<Registry>>,
) -> Response {
    let result = match action.parse::<Action>() {
        Ok(action) => registry.dispatch(&name, action).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => redirect("/"),
        Err(e) => error_response(action_status(&e), &e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct NotFoundQuery {
    #[serde(default)]
    app: String,
}

async fn handle_not_found(
    Query(query): Query<NotFoundQuery>,
    State(registry): State<Arc<Registry>>,
) -> Response {
    match registry.lookup(&query.app) {
        Some(app) if app.running() => {
            redirect(&format!("http://{}.{}/", app.name(), registry.tld()))
        }
        Some(app) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Html(pages::not_running(app.name())),
        )
            .into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            &format!("Application doesn't exist: {}", query.app),
        ),
    }
}

async fn handle_asset(Path(path): Path<String>) -> Response {
    match assets::get(&path) {
        Some((content_type, body)) => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
        None => error_response(StatusCode::NOT_FOUND, &format!("Asset not found: {}", path)),
    }
}
