//! Request routing: batch endpoints are answered here, everything else goes
//! to the static asset directory.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use http_body_util::LengthLimitError;
use tokio::net::TcpListener;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::batch::LFS_MEDIA_TYPE;
use crate::endpoint::{self, StoreOptions};
use crate::{handler, Config, Credentials, Error, Result};

/// Path suffix identifying an LFS batch endpoint.
pub const BATCH_SUFFIX: &str = "/objects/batch";

struct AppState {
    config: Config,
    assets: Option<ServeDir>,
}

/// Build the proxy application.
pub fn app(config: Config) -> Router {
    let assets = config.assets.as_ref().map(ServeDir::new);
    let state = Arc::new(AppState { config, assets });
    Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn serve(config: Config) -> Result<()> {
    let listener = TcpListener::bind(config.listen).await?;
    run(listener, config).await
}

/// Serve on an already bound listener until Ctrl-C.
pub async fn run(listener: TcpListener, config: Config) -> Result<()> {
    info!(addr = %listener.local_addr()?, "git-lfs-s3-proxy listening");
    axum::serve(listener, app(config))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
}

/// Whether a raw request path addresses a batch endpoint.
pub fn is_batch_path(path: &str) -> bool {
    path.ends_with(BATCH_SUFFIX)
}

async fn dispatch(State(state): State<Arc<AppState>>, request: Request) -> Response {
    if !is_batch_path(request.uri().path()) {
        return serve_asset(&state, request).await;
    }
    batch(&state, request)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn serve_asset(state: &AppState, request: Request) -> Response {
    debug!(path = %request.uri().path(), "not a batch endpoint, serving asset");
    let Some(assets) = &state.assets else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match assets.clone().oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

async fn batch(state: &AppState, request: Request) -> Result<Response> {
    if request.method() != Method::POST {
        return Err(Error::MethodNotAllowed);
    }
    if state.config.strict_media_type && !negotiates_lfs_json(request.headers()) {
        return Err(Error::NotAcceptable);
    }

    let credentials = Credentials::from_header(request.headers().get(header::AUTHORIZATION))?;
    let mut options = StoreOptions::new(&credentials);
    let bucket = endpoint::parse_path(&mut options, request.uri().path())?;

    let body = to_bytes(request.into_body(), state.config.max_body_bytes)
        .await
        .map_err(|e| match e.into_inner().downcast::<LengthLimitError>() {
            Ok(_) => Error::PayloadTooLarge(state.config.max_body_bytes),
            Err(e) => Error::InvalidBody(e.to_string()),
        })?;

    let response = handler::handle(&body, &options, &bucket, state.config.expiry).await?;
    info!(
        objects = response.objects.len(),
        bucket = %bucket,
        "batch signed"
    );

    let json = serde_json::to_vec(&response)?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(LFS_MEDIA_TYPE)),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
        json,
    )
        .into_response())
}

/// Both `Accept` and `Content-Type` name the LFS media type.
fn negotiates_lfs_json(headers: &HeaderMap) -> bool {
    let starts_with_lfs = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map_or(false, |value| value.starts_with(LFS_MEDIA_TYPE))
    };
    starts_with_lfs(header::ACCEPT) && starts_with_lfs(header::CONTENT_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_batch_path() {
        assert!(is_batch_path("/objects/batch"));
        assert!(is_batch_path("/region=auto/host/bucket/objects/batch"));
        assert!(!is_batch_path("/"));
        assert!(!is_batch_path("/index.html"));
        assert!(!is_batch_path("/host/objects/batch/"));
        assert!(!is_batch_path("/host/objects/batches"));
    }

    #[test]
    fn test_negotiates_lfs_json() {
        let mut headers = HeaderMap::new();
        assert!(!negotiates_lfs_json(&headers));

        headers.insert(header::ACCEPT, HeaderValue::from_static(LFS_MEDIA_TYPE));
        assert!(!negotiates_lfs_json(&headers));

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/vnd.git-lfs+json; charset=utf-8"),
        );
        assert!(negotiates_lfs_json(&headers));

        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        assert!(!negotiates_lfs_json(&headers));
    }
}
