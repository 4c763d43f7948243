//! Captured images and the image-acquisition collaborator boundary.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ChatError;

/// A captured image, immutable once taken.
///
/// Replacing the image resets the conversation — the chat is grounded
/// in exactly one image at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// Raw image bytes from a local file or device capture.
    File {
        /// The image payload.
        bytes: Bytes,
    },
    /// A remote image the server fetches itself.
    Url {
        /// The image URL.
        location: String,
    },
}

impl ImageRef {
    /// Wrap raw image bytes.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        ImageRef::File {
            bytes: bytes.into(),
        }
    }

    /// Reference a remote image by URL.
    pub fn from_url(location: impl Into<String>) -> Self {
        ImageRef::Url {
            location: location.into(),
        }
    }
}

/// Image acquisition adapter — file picker, URL paste, camera.
///
/// This is an external collaborator: implementations live in the
/// embedding application, not here. The controller only consumes the
/// produced [`ImageRef`]; every successful capture should be handed to
/// `ChatController::attach_image`, which resets the conversation.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Capture from a local file picker.
    async fn capture_from_file(&self) -> Result<ImageRef, ChatError>;

    /// Capture from a pasted URL.
    async fn capture_from_url(&self, location: &str) -> Result<ImageRef, ChatError>;

    /// Capture from a camera or other device.
    async fn capture_from_device(&self) -> Result<ImageRef, ChatError>;
}
