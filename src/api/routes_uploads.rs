use super::*;

use axum::body::Bytes;
use axum::extract::Multipart;

use crate::records::SPRITE_EXTENSIONS;

pub(super) const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub(super) const MAX_BATCH_FILES: usize = 20;
// Whole-request ceiling for the multipart batch, with headroom for the
// part framing.
pub(super) const MAX_BATCH_BODY_BYTES: usize = MAX_BATCH_FILES * MAX_UPLOAD_BYTES + 1024 * 1024;

#[derive(serde::Deserialize)]
pub(super) struct UploadQuery {
    pub filename: String,
}

/// Accepts raw image bytes; the final name is the sanitized stem plus a
/// millisecond suffix so repeated uploads never collide.
pub(super) async fn upload_sprite(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let asset = store_sprite(&state.config.upload_dir, &query.filename, &body)?;
    Ok(Json(ApiResponse::success(asset)))
}

/// Batch upload: one multipart part per image, at most 20 per request.
/// Each file passes the same size, extension and decode checks as the
/// single-file endpoint; a bad file is removed and reported without
/// failing the rest of the batch.
pub(super) async fn upload_sprites(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut uploaded = Vec::new();
    let mut failed = Vec::new();
    let mut files = 0usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::ValidationMessage(format!("Malformed multipart body: {err}")))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            // Non-file form fields are ignored.
            continue;
        };
        files += 1;
        if files > MAX_BATCH_FILES {
            return Err(ApiError::ValidationMessage(format!(
                "Batch exceeds {MAX_BATCH_FILES} files"
            )));
        }
        let bytes = field.bytes().await.map_err(|err| {
            ApiError::ValidationMessage(format!("Failed to read '{filename}': {err}"))
        })?;
        match store_sprite(&state.config.upload_dir, &filename, &bytes) {
            Ok(asset) => uploaded.push(asset),
            Err(err) => failed.push(serde_json::json!({
                "filename": filename,
                "message": err.message(),
            })),
        }
    }

    if files == 0 {
        return Err(ApiError::ValidationMessage(
            "Batch contains no files".to_string(),
        ));
    }
    log::info!("sprite batch: {} uploaded, {} rejected", uploaded.len(), failed.len());
    Ok(Json(ApiResponse::success(serde_json::json!({
        "uploaded": uploaded,
        "failed": failed,
    }))))
}

/// Validate and persist one sprite payload. The stored file is removed
/// again if the bytes do not decode as an image.
fn store_sprite(
    upload_dir: &std::path::Path,
    filename: &str,
    body: &[u8],
) -> Result<UploadedAsset, ApiError> {
    if body.is_empty() {
        return Err(ApiError::ValidationMessage("Upload body is empty".to_string()));
    }
    if body.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::ValidationMessage(format!(
            "Upload exceeds {MAX_UPLOAD_BYTES} bytes"
        )));
    }

    let (stem, extension) = split_sprite_filename(filename)?;
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);

    std::fs::create_dir_all(upload_dir)
        .map_err(|err| ApiError::write(format!("Failed to create upload dir: {err}")))?;

    // Batch uploads can land several files in the same millisecond.
    let mut name = format!("{stem}_{millis}{extension}");
    let mut bump = 0u32;
    while upload_dir.join(&name).exists() {
        bump += 1;
        name = format!("{stem}_{millis}_{bump}{extension}");
    }
    let path = upload_dir.join(&name);
    std::fs::write(&path, body)
        .map_err(|err| ApiError::write(format!("Failed to store upload: {err}")))?;

    // Decode to prove the bytes really are an image of the claimed type.
    let dimensions = match image::open(&path) {
        Ok(img) => (img.width(), img.height()),
        Err(err) => {
            if let Err(remove_err) = std::fs::remove_file(&path) {
                log::error!("failed to remove rejected upload {name}: {remove_err}");
            }
            return Err(ApiError::ValidationMessage(format!(
                "Upload is not a valid image: {err}"
            )));
        }
    };

    log::info!("sprite uploaded: {name} ({}x{})", dimensions.0, dimensions.1);
    Ok(UploadedAsset {
        name,
        size_bytes: body.len() as u64,
        width: Some(dimensions.0),
        height: Some(dimensions.1),
    })
}

pub(super) async fn list_uploads(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let mut assets = Vec::new();
    let entries = match std::fs::read_dir(&state.config.upload_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Json(ApiResponse::success(assets)))
        }
        Err(err) => return Err(ApiError::read(format!("Failed to list uploads: {err}"))),
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if !crate::records::has_sprite_extension(&name) {
            continue;
        }
        let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let dimensions = image::image_dimensions(entry.path()).ok();
        assets.push(UploadedAsset {
            name,
            size_bytes,
            width: dimensions.map(|d| d.0),
            height: dimensions.map(|d| d.1),
        });
    }
    assets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(ApiResponse::success(assets)))
}

pub(super) async fn delete_upload(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(ApiError::ValidationMessage("Invalid upload name".to_string()));
    }
    match std::fs::remove_file(state.config.upload_dir.join(&name)) {
        Ok(()) => Ok(Json(ApiResponse::message_only(format!(
            "Upload '{name}' deleted"
        )))),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ApiError::NotFound {
            resource: "Upload",
            id: name,
        }),
        Err(err) => Err(ApiError::write(format!("Failed to delete upload: {err}"))),
    }
}

fn split_sprite_filename(filename: &str) -> Result<(String, &'static str), ApiError> {
    let lower = filename.to_ascii_lowercase();
    let Some(extension) = SPRITE_EXTENSIONS.iter().find(|ext| lower.ends_with(**ext)) else {
        return Err(ApiError::ValidationMessage(format!(
            "Filename must end in one of: {}",
            SPRITE_EXTENSIONS.join(", ")
        )));
    };
    let stem: String = lower[..lower.len() - extension.len()]
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-')
        .collect();
    if stem.is_empty() {
        return Err(ApiError::ValidationMessage(
            "Filename must contain at least one letter, digit, underscore or dash".to_string(),
        ));
    }
    Ok((stem, extension))
}
