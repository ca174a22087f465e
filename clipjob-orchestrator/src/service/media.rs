//! Media helpers: source image encoding and artifact naming

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clipjob_core::domain::job::SpecError;
use std::path::Path;

use crate::repository::DEFAULT_ARTIFACT_NAME;

/// MIME type of an image, judged by its extension
pub fn image_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// Encodes image bytes as a `data:` URL
pub fn image_data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Reads an image file and encodes it as a `data:` URL
pub async fn read_image_data_url(path: &Path) -> Result<String, SpecError> {
    let mime = image_mime(path).ok_or_else(|| {
        SpecError::InvalidImage(format!("{}: unsupported image type", path.display()))
    })?;
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| SpecError::InvalidImage(format!("{}: {}", path.display(), e)))?;
    if bytes.is_empty() {
        return Err(SpecError::InvalidImage(format!("{}: file is empty", path.display())));
    }
    Ok(image_data_url(&bytes, mime))
}

/// Artifact file extension implied by a result URL
pub fn artifact_extension(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    if path.ends_with(".webm") {
        "webm"
    } else if path.ends_with(".gif") {
        "gif"
    } else {
        "mp4"
    }
}

/// File name for a downloaded artifact
///
/// A caller-given name is kept; without an extension it gets the one the
/// result URL implies.
pub fn artifact_name(url: &str, filename: Option<&str>) -> String {
    let base = filename
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_ARTIFACT_NAME);
    if Path::new(base).extension().is_some() {
        base.to_string()
    } else {
        format!("{}.{}", base, artifact_extension(url))
    }
}
