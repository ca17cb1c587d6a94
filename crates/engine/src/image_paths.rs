use std::path::Path;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImagePathError {
    #[error("image path must not be empty")]
    Empty,
    #[error("image path must be relative to the file that references it")]
    Absolute,
    #[error("image path must not contain '\\\\'")]
    Backslash,
    #[error("image path has unsupported extension '{extension}'; only .png is decoded")]
    UnsupportedExtension { extension: String },
}

pub fn validate_image_path(raw: &str) -> Result<(), ImagePathError> {
    if raw.trim().is_empty() {
        return Err(ImagePathError::Empty);
    }
    if raw.contains('\\') {
        return Err(ImagePathError::Backslash);
    }
    let path = Path::new(raw);
    if path.is_absolute() || raw.starts_with('/') {
        return Err(ImagePathError::Absolute);
    }
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    if !extension.eq_ignore_ascii_case("png") {
        return Err(ImagePathError::UnsupportedExtension {
            extension: extension.to_string(),
        });
    }
    Ok(())
}
