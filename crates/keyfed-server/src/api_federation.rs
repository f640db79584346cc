use crate::AppState;
use axum::{extract::Extension, Json};
use keyfed_db::iterate_infections;
use keyfed_federation::{fetch, truncate_window, FetchError, RequestContext};
use keyfed_types::{FetchRequest, FetchResponse};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("Fetch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Handler for `POST /api/federation/fetch`.
///
/// Returns the local diagnosis keys created before the current window
/// closed. When the time budget runs out the response is partial and
/// carries a `nextFetchToken` to resume from.
pub async fn fetch_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<FetchRequest>,
) -> Result<Json<FetchResponse>, ApiError> {
    let token = CancellationToken::new();
    // Dropped with this future, so a client that goes away stops the scan.
    let _guard = token.clone().drop_guard();
    let ctx = RequestContext::with_timeout(token, state.federation.fetch_timeout());

    let fetch_until = truncate_window(chrono::Utc::now().timestamp(), state.federation.window_secs);

    let result = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get()?;
        let page_size = state.federation.page_size;
        let resp = fetch(
            &ctx,
            req,
            |criteria| iterate_infections(&conn, criteria, page_size),
            fetch_until,
        )?;
        Ok::<_, ApiError>(resp)
    })
    .await
    .map_err(ApiError::from)
    .and_then(|r| r);

    match result {
        Ok(resp) => Ok(Json(resp)),
        Err(e) => {
            tracing::error!(error = %e, "federation fetch failed");
            Err(e)
        }
    }
}
