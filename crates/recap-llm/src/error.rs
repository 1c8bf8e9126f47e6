//! Text generation errors

use thiserror::Error;

/// Errors from the text generation backend
#[derive(Error, Debug)]
pub enum LlmError {
    /// Transport failure or timeout
    #[error("request failed: {0}")]
    Request(String),

    /// The API answered with an error status
    #[error("api error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the response body, if any
        message: String,
    },

    /// The response could not be decoded
    #[error("invalid response: {0}")]
    Decode(String),

    /// The response carried no generated text
    #[error("no text generated")]
    EmptyResponse,
}

impl LlmError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Decode(_) | Self::EmptyResponse => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}
