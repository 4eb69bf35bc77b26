use reqwest::StatusCode;

/// Everything that can go wrong between a facade call and the backend.
///
/// `Status` and `Unauthorized` display exactly the message the backend sent,
/// so callers can show it to the user as-is.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Non-success status with whatever message the backend gave us.
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    /// A 401. The stored session has already been cleared when this is returned.
    #[error("{message}")]
    Unauthorized { message: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid request URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Request cancelled")]
    Cancelled,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Could not read attachment: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }
}

/// Failures of the persistent session store.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Session file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not write session file: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Convenience alias used across the facade.
pub type ApiResult<T> = Result<T, ApiError>;
