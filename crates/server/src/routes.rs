use crate::ingest::{self, IngestError};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Multipart, State},
    http::{Response as HttpResponse, StatusCode},
    response::Response,
    routing::{get, post},
    Form, Router,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use visage_vector_store::{FaceMatch, VectorStoreError};

/// Minimum similarity applied when a search request carries no threshold.
pub const DEFAULT_THRESHOLD: f32 = 0.6;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/search", post(search))
        .route("/upload", post(upload))
        .route("/remove-image", post(remove_image))
        .route("/create-db", post(create_db))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Serialize)]
struct SimilarFace {
    id: String,
    img_path: String,
    similarity: f32,
}

impl From<FaceMatch> for SimilarFace {
    fn from(hit: FaceMatch) -> Self {
        Self {
            id: hit.id,
            img_path: hit.source_ref,
            similarity: hit.similarity,
        }
    }
}

#[derive(Deserialize)]
struct RemoveRequest {
    id: String,
}

async fn search(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, StatusCode> {
    let mut image: Option<Vec<u8>> = None;
    let mut threshold = DEFAULT_THRESHOLD;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        match field.name() {
            Some("image") => {
                if !is_image_content_type(field.content_type()) {
                    return error_response(
                        StatusCode::UNSUPPORTED_MEDIA_TYPE,
                        "The uploaded file is not an image",
                    );
                }
                let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                image = Some(bytes.to_vec());
            }
            Some("threshold") => {
                let text = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                match text.trim().parse::<f32>() {
                    Ok(value) => threshold = value,
                    Err(_) => {
                        return error_response(
                            StatusCode::BAD_REQUEST,
                            &format!("Invalid threshold '{text}'"),
                        )
                    }
                }
            }
            _ => {}
        }
    }

    let Some(image) = image else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'image' field");
    };

    let embedding = match state.embedder.embed(&image).await {
        Ok(Some(embedding)) => embedding,
        Ok(None) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "No face detected in the uploaded image",
            )
        }
        Err(err) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    };

    match state.store.query(&embedding, threshold).await {
        Ok(hits) => {
            let similar_faces: Vec<SimilarFace> = hits.into_iter().map(Into::into).collect();
            json_response(
                StatusCode::OK,
                &serde_json::json!({ "similar_faces": similar_faces }),
            )
        }
        Err(err) => store_error_response(&err),
    }
}

async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, StatusCode> {
    let mut image: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        if field.name() != Some("image") {
            continue;
        }
        if !is_image_content_type(field.content_type()) {
            return error_response(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "The uploaded file is not an image",
            );
        }
        file_name = field.file_name().and_then(sanitize_file_name);
        let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        image = Some(bytes.to_vec());
    }

    let Some(image) = image else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'image' field");
    };
    let Some(file_name) = file_name else {
        return error_response(StatusCode::BAD_REQUEST, "Missing upload filename");
    };

    let embedding = match state.embedder.embed(&image).await {
        Ok(Some(embedding)) => embedding,
        Ok(None) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "No face detected in the uploaded image",
            )
        }
        Err(err) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    };

    let path = state.image_dir.join(&file_name);
    if let Err(err) = tokio::fs::write(&path, &image).await {
        log::error!("Failed to save image {}: {err}", path.display());
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save image");
    }
    let source_ref = path.to_string_lossy().to_string();

    match state.store.insert(embedding, source_ref.clone()).await {
        Ok(id) => json_response(
            StatusCode::OK,
            &serde_json::json!({ "id": id, "img_path": source_ref }),
        ),
        Err(err) => {
            // The entry never became visible; the saved file must not outlive it.
            if let Err(rm_err) = tokio::fs::remove_file(&path).await {
                log::warn!("Failed to clean up {}: {rm_err}", path.display());
            }
            store_error_response(&err)
        }
    }
}

async fn remove_image(
    State(state): State<Arc<AppState>>,
    Form(request): Form<RemoveRequest>,
) -> Result<Response, StatusCode> {
    match state.store.delete(&request.id).await {
        Ok(source_ref) => {
            match tokio::fs::remove_file(&source_ref).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => log::warn!("Failed to remove backing file {source_ref}: {err}"),
            }
            json_response(
                StatusCode::OK,
                &serde_json::json!({ "id": request.id, "img_path": source_ref }),
            )
        }
        Err(err) => store_error_response(&err),
    }
}

async fn create_db(State(state): State<Arc<AppState>>) -> Result<Response, StatusCode> {
    match ingest::ingest_directory(&state.store, state.embedder.as_ref(), &state.image_dir).await {
        Ok(report) => json_response(
            StatusCode::OK,
            &serde_json::json!({ "ingested": report.ingested, "skipped": report.skipped }),
        ),
        Err(IngestError::Store(err)) => store_error_response(&err),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Result<Response, StatusCode> {
    json_response(
        StatusCode::OK,
        &serde_json::json!({ "status": "ok", "entries": state.store.len().await }),
    )
}

fn is_image_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.starts_with("image/"))
}

/// Keeps only the final path component of a client-supplied filename.
fn sanitize_file_name(raw: &str) -> Option<String> {
    let name = Path::new(raw).file_name()?.to_string_lossy().to_string();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name)
}

fn status_for(err: &VectorStoreError) -> StatusCode {
    match err {
        VectorStoreError::DimensionMismatch { .. }
        | VectorStoreError::InvalidThreshold(_)
        | VectorStoreError::ZeroNormVector => StatusCode::BAD_REQUEST,
        VectorStoreError::NotFound(_) => StatusCode::NOT_FOUND,
        VectorStoreError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn store_error_response(err: &VectorStoreError) -> Result<Response, StatusCode> {
    error_response(status_for(err), &err.to_string())
}

fn error_response(status: StatusCode, message: &str) -> Result<Response, StatusCode> {
    json_response(status, &serde_json::json!({ "error": message }))
}

fn json_response(
    status: StatusCode,
    value: &impl serde::Serialize,
) -> Result<Response, StatusCode> {
    let bytes = serde_json::to_vec(value).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(HttpResponse::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(bytes))
        .expect("valid HTTP response"))
}
