use axum::{
    Extension, Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use bytes::Bytes;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};
use uuid::Uuid;

use huddle_db::models::StorageObjectRow;
use huddle_types::api::{Claims, UploadResponse, UploadUrlResponse};

use crate::auth::AppState;
use crate::error::ApiError;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const UPLOAD_AUDIENCE: &str = "upload";
const UPLOAD_URL_TTL_MINUTES: i64 = 10;

/// Claims of the token embedded in an upload URL. The audience keeps it
/// from being usable as a session token and vice versa.
#[derive(Debug, Serialize, Deserialize)]
struct UploadClaims {
    sub: Uuid,
    aud: String,
    exp: usize,
}

fn create_upload_token(secret: &str, user_id: Uuid, exp: i64) -> anyhow::Result<String> {
    let claims = UploadClaims {
        sub: user_id,
        aud: UPLOAD_AUDIENCE.into(),
        exp: exp as usize,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

fn decode_upload_token(secret: &str, token: &str) -> Result<Uuid, ApiError> {
    let mut validation = Validation::default();
    validation.set_audience(&[UPLOAD_AUDIENCE]);

    decode::<UploadClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims.sub)
        .map_err(|_| ApiError::Unauthorized)
}

/// `image/png; charset=binary` -> `image/png`, provided it is an image type.
fn image_content_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let mime = value.split(';').next()?.trim().to_ascii_lowercase();
    let subtype = mime.strip_prefix("image/")?;
    if subtype.is_empty() {
        return None;
    }
    Some(mime)
}

/// A short-lived URL the client posts raw image bytes to.
pub async fn generate_upload_url(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let expires_at = Utc::now() + chrono::Duration::minutes(UPLOAD_URL_TTL_MINUTES);
    let token = create_upload_token(&state.jwt_secret, claims.sub, expires_at.timestamp())?;

    Ok(Json(UploadUrlResponse {
        url: format!("{}/upload/{}", state.public_url.trim_end_matches('/'), token),
        expires_at,
    }))
}

/// Target of an upload URL. Authenticated by the token in the path.
pub async fn receive_upload(
    State(state): State<AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let uploader_id = decode_upload_token(&state.jwt_secret, &token)?;

    let content_type = image_content_type(&headers)
        .ok_or_else(|| ApiError::bad_request("Only image uploads are accepted"))?;
    if body.is_empty() {
        return Err(ApiError::bad_request("Upload is empty"));
    }
    if body.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::PayloadTooLarge);
    }

    let id = Uuid::new_v4();
    let sha256 = state.storage.write(id, &body).await?;

    let object = StorageObjectRow {
        id,
        uploader_id,
        content_type,
        size: body.len() as i64,
        sha256,
        created_at: huddle_db::now(),
    };
    let size = object.size;
    if let Err(e) = state.run_db(move |db| Ok(db.insert_storage_object(&object)?)).await {
        // Don't leave bytes behind without a row pointing at them
        if let Err(cleanup) = state.storage.delete_file(id).await {
            warn!("Failed to remove unrecorded upload {}: {}", id, cleanup);
        }
        return Err(e);
    }

    info!("Stored upload {} ({} bytes) for {}", id, size, uploader_id);
    Ok((StatusCode::CREATED, Json(UploadResponse { storage_id: id })))
}

/// Serve a stored object. Ids are unguessable, so no session is required;
/// image URLs end up in `<img>` tags.
pub async fn serve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let object = state
        .run_db(move |db| Ok(db.get_storage_object(id)?))
        .await?
        .ok_or(ApiError::NotFound("File"))?;

    let Some(file) = state.storage.open(id).await? else {
        warn!("Storage object {} has a row but no file", id);
        return Err(ApiError::NotFound("File"));
    };

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&object.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(object.size));
    response_headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("private, max-age=31536000, immutable"),
    );

    Ok((response_headers, Body::from_stream(ReaderStream::new(file))))
}
