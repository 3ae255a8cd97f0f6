use thiserror::Error;

#[derive(Error, Debug)]
pub enum CircleError {
    #[error("No CircleCI token configured")]
    NoCredential,

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Unauthorized (HTTP 401)")]
    Unauthorized,

    #[error("Rate limited (HTTP 429)")]
    RateLimited,

    #[error("HTTP error {0}")]
    HttpError(u16),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Secret store error: {0}")]
    Secrets(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CircleError {
    /// Message shown to the user when a poll cycle fails with this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::NoCredential => {
                "No API token found. Add your CircleCI token with `circlewatch token set`.".into()
            }
            Self::InvalidEndpoint(_) => "The CircleCI URL is invalid, check your base-url.".into(),
            Self::InvalidResponse(_) => "CircleCI returned a response that could not be read.".into(),
            Self::Unauthorized => "Unauthorized, check your token in Settings.".into(),
            Self::RateLimited => "CircleCI is rate limiting requests, try again shortly.".into(),
            Self::HttpError(code) => format!("CircleCI request failed with HTTP {code}."),
            Self::Config(msg) => format!("Configuration problem: {msg}"),
            Self::Secrets(msg) => format!("Could not access the token store: {msg}"),
            Self::Network(_) => "Could not reach CircleCI, check your connection.".into(),
            Self::Json(_) => "CircleCI returned data in an unexpected format.".into(),
            Self::Io(e) => format!("Local I/O failed: {e}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, CircleError>;
