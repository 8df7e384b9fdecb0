//! Stateless HTTP helpers shared by the route handlers.

use crate::api::error::ApiError;

/// Accepts `image/*` content types; rejects anything else, including a
/// missing or malformed media type.
pub fn parse_image_content_type(content_type: &str) -> Result<mime::Mime, ApiError> {
    let media_type: mime::Mime = content_type
        .parse()
        .map_err(|_| ApiError::Validation(format!("invalid Content-Type: {}", content_type)))?;

    if media_type.type_() != mime::IMAGE {
        return Err(ApiError::Validation(format!(
            "Content-Type must be image/*, got: {}/{}",
            media_type.type_(),
            media_type.subtype()
        )));
    }

    Ok(media_type)
}

pub fn validate_body_size(data: &[u8], max_size: usize) -> Result<(), ApiError> {
    if data.len() > max_size {
        return Err(ApiError::PayloadTooLarge(data.len()));
    }
    Ok(())
}
