//! Endpoints backing the post editor: link previews and uploads.

use axum::{
    Json,
    extract::{Multipart, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::AppError,
    services::link_meta,
    state::SharedObjectStore,
    utils::jwt::AuthUser,
};

/// A single file pulled out of a multipart body.
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"))
    }
}

/// Reads the multipart field called `field`, skipping any others.
pub async fn read_upload(multipart: &mut Multipart, field: &str) -> Result<Upload, AppError> {
    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if part.name() != Some(field) {
            continue;
        }
        let file_name = part.file_name().unwrap_or("upload").to_string();
        let content_type = part.content_type().map(str::to_string);
        let bytes = part
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        if bytes.is_empty() {
            return Err(AppError::BadRequest(format!("'{field}' is empty")));
        }
        return Ok(Upload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Err(AppError::BadRequest(format!("Missing '{field}' file")))
}

#[derive(Debug, Deserialize)]
pub struct LinkParams {
    pub url: Option<String>,
}

/// Preview metadata for a URL. Fetch failures answer `success: 0` rather than an error.
pub async fn fetch_url_metadata(
    State(client): State<reqwest::Client>,
    Query(params): Query<LinkParams>,
) -> Result<impl IntoResponse, AppError> {
    let raw = params
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Invalid URL".to_string()))?;
    let target = link_meta::parse_target(raw.trim())?;

    match link_meta::fetch(&client, target).await {
        Ok(meta) => Ok(Json(json!({ "success": 1, "meta": meta }))),
        Err(e) => {
            tracing::warn!(url = %raw, "link preview failed: {}", e);
            Ok(Json(json!({ "success": 0, "meta": {} })))
        }
    }
}

pub async fn upload_image(
    State(objects): State<SharedObjectStore>,
    AuthUser(_user): AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let upload = read_upload(&mut multipart, "image").await?;
    if !upload.is_image() {
        return Err(AppError::BadRequest("Only image uploads are accepted".to_string()));
    }

    let stored = objects.put(&upload.file_name, upload.bytes).await?;
    Ok(Json(json!({ "success": 1, "file": { "url": stored.url } })))
}

pub async fn upload_file(
    State(objects): State<SharedObjectStore>,
    AuthUser(_user): AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let upload = read_upload(&mut multipart, "file").await?;
    let name = upload.file_name.clone();

    let stored = objects.put(&upload.file_name, upload.bytes).await?;
    Ok(Json(json!({
        "success": 1,
        "file": { "url": stored.url, "name": name, "size": stored.size },
    })))
}
