use std::path::Path;

use axum::{body::Bytes, extract::Multipart};
use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use crate::{
    error::{AppError, ErrorKind},
    guard::{ErrorMap, Fallback, Rule, guard_caller},
    provider::{ImageObject, ProviderError},
    state::AppState,
    utils::present,
};

pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

pub const ALLOWED_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];

pub const UPLOAD_ERRORS: ErrorMap = ErrorMap {
    rules: &[
        Rule::message(
            &["Bucket not found"],
            ErrorKind::ServiceMisconfigured,
            "Storage bucket not configured. Please run database setup",
        ),
        Rule::message(
            &["The resource already exists"],
            ErrorKind::Conflict,
            "File already exists",
        ),
        Rule::message(
            &["File size limit"],
            ErrorKind::PayloadTooLarge,
            "File too large",
        ),
        Rule::message(
            &["permission denied"],
            ErrorKind::Forbidden,
            "Upload permission denied",
        ),
    ],
    unreachable: ErrorKind::InternalError,
    fallback: Fallback::Fixed(ErrorKind::InvalidInput, "Failed to upload file"),
};

#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<ImageFile>,
    pub category: Option<String>,
    pub item_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub image_url: String,
    pub file_name: String,
}

/// A file that passed every check, ready to be keyed under the caller.
#[derive(Debug)]
pub struct ValidImage {
    pub extension: String,
    pub content_type: String,
    pub bytes: Bytes,
}

pub async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;

                form.file = Some(ImageFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            "category" => form.category = Some(field.text().await?),
            "itemName" => form.item_name = Some(field.text().await?),
            other => debug!("Ignoring multipart field {other:?}"),
        }
    }

    Ok(form)
}

fn extension_for(file: &ImageFile, content_type: &str) -> String {
    let from_name = file
        .file_name
        .as_deref()
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty());

    match from_name {
        Some(ext) => ext.to_string(),
        None => match content_type {
            "image/png" => "png",
            "image/webp" => "webp",
            _ => "jpg",
        }
        .to_string(),
    }
}

pub fn validate_upload(form: UploadForm) -> Result<ValidImage, AppError> {
    let Some(file) = form.file else {
        return Err(AppError::InvalidInput("No file provided".to_string()));
    };

    if present(form.category).is_none() || present(form.item_name).is_none() {
        return Err(AppError::InvalidInput(
            "Category and item name are required".to_string(),
        ));
    }

    let content_type = file
        .content_type
        .as_deref()
        .filter(|content_type| ALLOWED_TYPES.contains(content_type))
        .ok_or_else(|| {
            AppError::InvalidInput("Only JPEG, PNG, and WebP images are allowed".to_string())
        })?
        .to_string();

    if file.bytes.len() > MAX_FILE_SIZE {
        return Err(AppError::InvalidInput(
            "File size must be less than 10MB".to_string(),
        ));
    }

    Ok(ValidImage {
        extension: extension_for(&file, &content_type),
        content_type,
        bytes: file.bytes,
    })
}

pub async fn upload_image(
    state: &AppState,
    access_token: Option<&str>,
    form: UploadForm,
) -> Result<UploadResponse, AppError> {
    let (file_name, image_url) = guard_caller(
        "upload.image",
        state,
        access_token,
        || validate_upload(form),
        |provider, caller, image: ValidImage| async move {
            let key = format!(
                "{}/{}.{}",
                caller.id(),
                Utc::now().timestamp_millis(),
                image.extension
            );

            let object = ImageObject {
                key: key.clone(),
                content_type: image.content_type,
                bytes: image.bytes,
            };

            provider.upload(&caller, object).await?;
            let image_url = provider.public_url(&key);

            Ok::<_, ProviderError>((key, image_url))
        },
        &UPLOAD_ERRORS,
    )
    .await?;

    let image_url = image_url
        .ok_or_else(|| AppError::InternalError("Failed to generate file URL".to_string()))?;

    Ok(UploadResponse {
        image_url,
        file_name,
    })
}
