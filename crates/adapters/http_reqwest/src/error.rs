//! HTTP adapter error types.

use lens_domain::error::BackendError;

/// Errors specific to the HTTP adapter.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The reqwest client could not be built.
    #[error("failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    /// The request never produced a response.
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A 2xx response carried a body that does not decode.
    #[error("failed to decode response from {url}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A create was acknowledged without the id the backend assigned.
    #[error("response from {url} carries no action id")]
    MissingId { url: String },

    /// The backend answered with a non-2xx status.
    #[error("backend answered {status}: {message}")]
    Status { status: u16, message: String },
}

impl HttpError {
    /// Convert into a [`BackendError`] for propagation across the port.
    pub fn into_backend(self) -> BackendError {
        match self {
            Self::Status { status, message } => BackendError::Rejected { status, message },
            Self::Decode { .. } | Self::MissingId { .. } => {
                BackendError::InvalidBody(Box::new(self))
            }
            Self::ClientBuild(_) | Self::Transport { .. } => {
                BackendError::Unreachable(Box::new(self))
            }
        }
    }
}

impl From<HttpError> for BackendError {
    fn from(err: HttpError) -> Self {
        err.into_backend()
    }
}
