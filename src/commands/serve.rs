use std::net::SocketAddr;

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::controllers::paste;
use crate::error::ApiError;
use crate::language::language_or_plaintext;
use crate::models::{Paste, PasteMetadata};
use crate::types::api::{CreatePaste, CreatedPaste, UploadedDocument};
use crate::App;

/// Usage notes served at the root.
const USAGE: &str = include_str!("../../assets/usage.txt");

pub async fn run(app: App) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], app.config.port));
    info!("listening on {addr}");

    axum::Server::bind(&addr)
        .serve(router(app).into_make_service())
        .await?;

    Ok(())
}

pub fn router(app: App) -> Router {
    let max_upload_size = app.config.limits.max_upload_size;

    Router::new()
        .route("/", get(index))
        .route("/api/documents", post(upload_document))
        .route("/api/pastes", get(list_pastes).post(create_paste))
        .route("/api/pastes/:id", get(get_paste).delete(delete_paste))
        .route("/raw/:id", get(get_raw))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_size))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

async fn index() -> &'static str {
    USAGE
}

/// Store a raw request body, guessing its language.
async fn upload_document(
    State(app): State<App>,
    data: String,
) -> crate::ApiResult<Json<UploadedDocument>> {
    let language_id = language_or_plaintext(app.detector.as_ref(), &data);
    let paste = paste::create(&app, data, language_id).await?;
    Ok(Json(UploadedDocument { key: paste.id }))
}

async fn create_paste(
    State(app): State<App>,
    Json(request): Json<CreatePaste>,
) -> crate::ApiResult<impl IntoResponse> {
    let paste = paste::create(&app, request.data, request.language_id).await?;
    let path = format!("/api/pastes/{}", paste.id);
    let url = format!(
        "{base_url}/raw/{id}",
        base_url = app.config.base_url.trim_end_matches('/'),
        id = paste.id
    );

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, path)],
        Json(CreatedPaste { id: paste.id, url }),
    ))
}

async fn get_paste(
    State(app): State<App>,
    Path(id): Path<String>,
) -> crate::ApiResult<Json<Paste>> {
    let paste = paste::fetch(&app, &id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(paste))
}

/// Metadata of every live paste.
async fn list_pastes(State(app): State<App>) -> crate::ApiResult<Json<Vec<PasteMetadata>>> {
    Ok(Json(paste::list(&app).await?))
}

async fn delete_paste(
    State(app): State<App>,
    Path(id): Path<String>,
) -> crate::ApiResult<StatusCode> {
    paste::delete(&app, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Serve a paste as plain text. `/raw/<id>.<ext>` is accepted so links can
/// carry a file extension.
async fn get_raw(
    State(app): State<App>,
    Path(full_id): Path<String>,
) -> crate::ApiResult<impl IntoResponse> {
    let id = full_id.split('.').next().unwrap_or_default();
    let paste = paste::fetch(&app, id).await?.ok_or(ApiError::NotFound)?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        paste.data,
    ))
}
