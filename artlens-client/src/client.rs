//! HTTP client for the generate endpoint.

use artlens_core::{ChatError, ImageRef, Turn};

use crate::error::{map_send_error, rejection_message};
use crate::request::to_multipart_form;
use crate::streaming::{parse_event_stream, EventStream};

/// Default server base URL.
const DEFAULT_BASE_URL: &str = "http://localhost:5001";

/// Fixed endpoint path for streamed generation.
const GENERATE_PATH: &str = "/api/generate";

/// Client for the artlens generate endpoint.
///
/// # Example
///
/// ```no_run
/// use artlens_client::VlmClient;
///
/// let client = VlmClient::new().base_url("http://vlm.internal:5001");
/// ```
pub struct VlmClient {
    /// Server base URL (override for testing or proxies).
    base_url: String,
    /// Shared HTTP client.
    client: reqwest::Client,
}

impl VlmClient {
    /// Create a client pointed at the default local server.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the server base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Build the generate endpoint URL.
    pub(crate) fn generate_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), GENERATE_PATH)
    }

    /// Send one generate request and open its event stream.
    ///
    /// `turns` is the conversation snapshot taken at submit time,
    /// including the just-appended user turn. A non-success status maps
    /// to [`ChatError::ServerRejected`] with the server's `error` body
    /// field when present; send failures map to
    /// [`ChatError::Transport`].
    pub async fn generate(
        &self,
        turns: &[Turn],
        image: &ImageRef,
    ) -> Result<EventStream, ChatError> {
        let url = self.generate_url();
        let form = to_multipart_form(turns, image)?;

        tracing::debug!(url = %url, turns = turns.len(), "sending generate request");

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::ServerRejected {
                status: status.as_u16(),
                message: rejection_message(status, &body),
            });
        }

        Ok(parse_event_stream(response.bytes_stream()))
    }
}

impl Default for VlmClient {
    fn default() -> Self {
        Self::new()
    }
}
