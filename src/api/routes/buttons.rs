//! Button handlers: form submission, file creation, completion, artifacts.

use super::{CsrfQuery, session_from_headers};
use crate::api::AppState;
use crate::error::Result;
use crate::pipeline::FormResponse;
use crate::types::ButtonId;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use std::convert::Infallible;
use tokio_stream::{Stream, StreamExt};

/// POST /download-btn/form/:id/:cls - Run the form-handling steps
#[utoipa::path(
    post,
    path = "/download-btn/form/{id}/{cls}",
    tag = "buttons",
    params(
        ("id" = i64, Path, description = "Button ID"),
        ("cls" = String, Path, description = "Button class name"),
        CsrfQuery
    ),
    request_body(content = String, description = "Submitted form fields", content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Form handled and button committed"),
        (status = 403, description = "Missing session or invalid CSRF token", body = crate::error::ApiError),
        (status = 404, description = "Unknown button", body = crate::error::ApiError),
        (status = 409, description = "A file-creation run is in progress", body = crate::error::ApiError),
        (status = 500, description = "A form-handling step failed", body = crate::error::ApiError)
    )
)]
pub async fn submit_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, cls)): Path<(i64, String)>,
    Query(query): Query<CsrfQuery>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Response> {
    let session = session_from_headers(&state, &headers)?;
    let form = FormResponse::new(fields);

    state
        .manager
        .handle_form(
            &session,
            ButtonId(id),
            &cls,
            query.csrf_token.as_deref(),
            &form,
        )
        .await?;

    Ok((StatusCode::OK, [(header::CACHE_CONTROL, "no-store")]).into_response())
}

/// GET /download-btn/create_files/:id/:cls - Run the file-creation steps
///
/// Streams `reset`, `progress_report` and `transition_speed` events while the
/// steps run, then a single `download_ready` event carrying the manifest. A
/// failing step closes the stream without `download_ready`.
#[utoipa::path(
    get,
    path = "/download-btn/create_files/{id}/{cls}",
    tag = "buttons",
    params(
        ("id" = i64, Path, description = "Button ID"),
        ("cls" = String, Path, description = "Button class name"),
        CsrfQuery
    ),
    responses(
        (status = 200, description = "Progress event stream (text/event-stream)", content_type = "text/event-stream"),
        (status = 403, description = "Missing session or invalid CSRF token", body = crate::error::ApiError),
        (status = 404, description = "Unknown button", body = crate::error::ApiError),
        (status = 409, description = "A run for this button is already in progress", body = crate::error::ApiError),
        (status = 422, description = "A persisted download entry is malformed", body = crate::error::ApiError)
    )
)]
pub async fn create_files(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, cls)): Path<(i64, String)>,
    Query(query): Query<CsrfQuery>,
) -> Result<Sse<impl Stream<Item = std::result::Result<SseEvent, Infallible>>>> {
    let session = session_from_headers(&state, &headers)?;

    let run = state
        .manager
        .create_files(&session, ButtonId(id), &cls, query.csrf_token.as_deref())
        .await?;

    let events = run.filter_map(move |event| match event.to_sse() {
        Ok(sse) => Some(Ok(sse)),
        Err(e) => {
            tracing::warn!(button_id = id, event = event.name(), error = %e, "dropping unserializable event");
            None
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// POST /download-btn/downloaded/:id/:cls - Client saved the downloads
#[utoipa::path(
    post,
    path = "/download-btn/downloaded/{id}/{cls}",
    tag = "buttons",
    params(
        ("id" = i64, Path, description = "Button ID"),
        ("cls" = String, Path, description = "Button class name"),
        CsrfQuery
    ),
    responses(
        (status = 204, description = "Button marked as downloaded"),
        (status = 403, description = "Missing session or invalid CSRF token", body = crate::error::ApiError),
        (status = 404, description = "Unknown button", body = crate::error::ApiError)
    )
)]
pub async fn mark_downloaded(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, cls)): Path<(i64, String)>,
    Query(query): Query<CsrfQuery>,
) -> Result<StatusCode> {
    let session = session_from_headers(&state, &headers)?;

    state
        .manager
        .mark_downloaded(&session, ButtonId(id), &cls, query.csrf_token.as_deref())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /download-btn/artifact/:id/:cls - Zip archive produced by the last run
#[utoipa::path(
    get,
    path = "/download-btn/artifact/{id}/{cls}",
    tag = "buttons",
    params(
        ("id" = i64, Path, description = "Button ID"),
        ("cls" = String, Path, description = "Button class name"),
        CsrfQuery
    ),
    responses(
        (status = 200, description = "Zip archive", content_type = "application/zip", body = Vec<u8>),
        (status = 403, description = "Missing session or invalid CSRF token", body = crate::error::ApiError),
        (status = 404, description = "Unknown button or no archive for this session", body = crate::error::ApiError)
    )
)]
pub async fn download_artifact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, cls)): Path<(i64, String)>,
    Query(query): Query<CsrfQuery>,
) -> Result<Response> {
    let session = session_from_headers(&state, &headers)?;

    let artifact = state
        .manager
        .artifact(&session, ButtonId(id), &cls, query.csrf_token.as_deref())
        .await?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        artifact.filename.replace('"', "")
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (
                header::CACHE_CONTROL,
                artifact.cache.cache_control().to_string(),
            ),
        ],
        artifact.bytes,
    )
        .into_response())
}
