// src/handlers/output.rs
use crate::handlers::AppState;
use axum::{
    extract::{Extension, Path},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

pub fn output_routes() -> Router {
    Router::new().route("/artifacts/*path", get(stream_artifact))
}

/// Stream any artifact under the storage root (final videos and run
/// intermediates alike).
pub async fn stream_artifact(
    Path(path): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Response, StatusCode> {
    let file_path = state.workspace.resolve(&path).ok_or(StatusCode::NOT_FOUND)?;

    let metadata = match tokio::fs::metadata(&file_path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Err(StatusCode::NOT_FOUND),
    };

    match tokio::fs::File::open(&file_path).await {
        Ok(file) => {
            let stream = ReaderStream::new(file);
            let content_type = get_content_type_from_path(&file_path);

            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, metadata.len())
                .header(header::ACCEPT_RANGES, "bytes")
                .header(header::CACHE_CONTROL, "public, max-age=3600")
                .body(axum::body::Body::from_stream(stream))
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
        }
        Err(e) => {
            tracing::error!("Failed to open artifact for streaming: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn get_content_type(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        "mp4" => "video/mp4",
        "wav" => "audio/wav",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

fn get_content_type_from_path(path: &std::path::Path) -> &'static str {
    path.extension()
        .map(|extension| get_content_type(&extension.to_string_lossy()))
        .unwrap_or("application/octet-stream")
}
