//! Attachment type checks, run before any store is contacted.

use thiserror::Error;

const ALLOWED_EXTENSIONS: [&str; 4] = ["jpeg", "jpg", "png", "gif"];
const ALLOWED_MEDIA_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/gif"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaTypeError {
    #[error("file extension of `{0}` is not an accepted image type")]
    Extension(String),
    #[error("content type `{0}` is not an accepted image type")]
    ContentType(String),
}

/// Accept only image uploads whose extension and declared content type are
/// both one of jpeg/jpg/png/gif. Comparisons are case-insensitive and any
/// content-type parameters (`; charset=...`) are ignored.
pub fn validate(filename: &str, content_type: &str) -> Result<(), MediaTypeError> {
    let extension_ok = filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false);
    if !extension_ok {
        return Err(MediaTypeError::Extension(filename.to_string()));
    }

    let essence = content_type.split(';').next().unwrap_or("").trim();
    if !ALLOWED_MEDIA_TYPES
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(essence))
    {
        return Err(MediaTypeError::ContentType(content_type.to_string()));
    }

    Ok(())
}
