//! Multipart encoding of a conversation snapshot plus an image.
//!
//! The server reads the conversation from a `messages` form field
//! (JSON array of `{role, content}`) and the image from exactly one of
//! `image_file` (binary upload) or `image_url` (text). The snapshot
//! passed in must be the store's state at submit time, including the
//! just-appended user turn — the caller takes it under its lock.

use artlens_core::{ChatError, ImageRef, Turn};
use reqwest::multipart::{Form, Part};

/// Form field carrying the JSON-encoded conversation.
pub const MESSAGES_FIELD: &str = "messages";
/// Form field carrying raw image bytes.
pub const IMAGE_FILE_FIELD: &str = "image_file";
/// Form field carrying an image URL.
pub const IMAGE_URL_FIELD: &str = "image_url";

// The server rejects file parts whose filename is empty.
const IMAGE_FILE_NAME: &str = "capture.png";

/// Build the outbound multipart form for one generate request.
pub fn to_multipart_form(turns: &[Turn], image: &ImageRef) -> Result<Form, ChatError> {
    let messages = serde_json::to_string(turns)
        .map_err(|e| ChatError::Validation(format!("could not encode messages: {e}")))?;

    let form = Form::new().text(MESSAGES_FIELD, messages);
    let form = match image {
        ImageRef::File { bytes } => form.part(
            IMAGE_FILE_FIELD,
            Part::stream(reqwest::Body::from(bytes.clone())).file_name(IMAGE_FILE_NAME),
        ),
        ImageRef::Url { location } => form.text(IMAGE_URL_FIELD, location.clone()),
    };
    Ok(form)
}
