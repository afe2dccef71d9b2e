use thiserror::Error;

/// Failures talking to the station directory.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid directory url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("directory url cannot take path segments: {0}")]
    NotABase(String),
    #[error("radio browser returned {0}")]
    Status(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Failures while working out where the listener is.
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("location access denied")]
    Denied,
    #[error("location lookup timed out")]
    Timeout,
    #[error("invalid geocoder url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("reverse geocoder returned {0}")]
    Status(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Message(String),
}
