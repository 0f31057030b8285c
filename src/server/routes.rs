//! Upload, retrieval and status handlers.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::{AppContext, AppError};
use crate::codec;
use crate::error::Error;
use crate::store::QualityLevel;

/// Query parameters for the variant retrieval endpoint.
#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    /// Desired quality level (100, 75, 50 or 25). Defaults to 100.
    #[serde(default = "default_quality")]
    pub quality: String,
}

fn default_quality() -> String {
    QualityLevel::Full.as_str().to_string()
}

/// Accept a multipart image upload and queue it for compression.
///
/// The payload is validated by magic bytes before publishing; only JPEG and
/// PNG are accepted. A successful response means the image was published,
/// not that any variant exists yet — callers poll the retrieval endpoint.
pub async fn upload_image(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut payload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Validation(format!("invalid multipart request: {e}")))?
    {
        if field.name() == Some("image") {
            let data = field
                .bytes()
                .await
                .map_err(|e| Error::Validation(format!("failed to read image field: {e}")))?;
            payload = Some(data);
            break;
        }
    }

    let payload =
        payload.ok_or_else(|| Error::Validation("missing multipart field 'image'".into()))?;
    if payload.is_empty() {
        return Err(Error::Validation("empty image payload".into()).into());
    }

    let content_type = codec::sniff_content_type(&payload);
    if !codec::is_supported(content_type) {
        warn!(content_type, "rejecting upload of unsupported type");
        return Err(Error::unsupported(content_type).into());
    }

    let image_id = uuid::Uuid::new_v4().to_string();
    ctx.publisher
        .publish(payload, &image_id, content_type)
        .await
        .map_err(AppError::from)?;

    info!(image_id = %image_id, content_type, "image queued for compression");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "id": image_id,
            "message": "image queued for compression",
        })),
    ))
}

/// Serve one stored variant.
pub async fn get_image(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Query(query): Query<ImageQuery>,
) -> Result<impl IntoResponse, AppError> {
    if id.parse::<uuid::Uuid>().is_err() {
        return Err(Error::Validation("invalid image id: expected a UUID".into()).into());
    }

    // 404 is reserved for a valid level with no stored variant; a quality
    // outside the closed set is a malformed request.
    let level = query.quality.as_str();
    if QualityLevel::parse(level).is_none() {
        return Err(Error::Validation(format!("invalid quality level: {level}")).into());
    }

    let data = ctx.store.get_image(&id, level).map_err(AppError::from)?;
    let content_type = codec::sniff_content_type(&data);

    Ok(([(header::CONTENT_TYPE, content_type)], data))
}

/// Liveness endpoint.
pub async fn status() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "pixeldrop",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
