use thiserror::Error;

/// Quay-specific error types for better error handling
#[derive(Error, Debug)]
pub enum QuayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Push channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Engine unavailable: {reason}")]
    EngineGone { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization error: {0}")]
    Serialization(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Generic error: {0}")]
    Other(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found at path: {path}")]
    FileNotFound { path: String },

    #[error("Invalid config format: {reason}")]
    InvalidFormat { reason: String },

    #[error("Invalid API endpoint: {url}")]
    InvalidEndpoint { url: String },
}

/// Failures talking to the remote orchestration API.
///
/// `Network` covers calls that could not complete at all; `Validation` is a
/// rejected create payload; `Api` carries any other non-success response
/// with the server's reason.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Network failure: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Validation rejected: {reason}")]
    Validation { reason: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("API error ({status}): {reason}")]
    Api { status: u16, reason: String },

    #[error("Malformed response payload: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Push channel connect failed: {reason}")]
    Connect { reason: String },

    #[error("Push channel closed by remote")]
    Closed,
}

/// Convenience type alias for Quay results
pub type Result<T, E = QuayError> = std::result::Result<T, E>;
