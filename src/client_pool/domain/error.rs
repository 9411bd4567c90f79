//! Error types for backend descriptor validation.

use thiserror::Error;

/// Errors returned while constructing client pool domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientPoolDomainError {
    /// The server name is empty after trimming.
    #[error("server name must not be empty")]
    EmptyServerName,

    /// The server name contains characters outside `[a-z0-9._-]`.
    #[error(
        "server name '{0}' contains invalid characters (only lowercase alphanumeric, '.', '_' and '-' allowed)"
    )]
    InvalidServerName(String),

    /// The server name exceeds the 100-character limit.
    #[error("server name exceeds 100 character limit: {0}")]
    ServerNameTooLong(String),

    /// A container-backed server names no image.
    #[error("container image must not be empty")]
    EmptyImage,

    /// A remote server names no URL.
    #[error("remote URL must not be empty")]
    EmptyRemoteUrl,

    /// A remote URL does not use `http://` or `https://`.
    #[error("remote URL must start with http:// or https://: {0}")]
    InvalidRemoteUrl(String),

    /// The remote transport token is not recognised.
    #[error("unsupported remote transport: {0}")]
    UnsupportedTransport(String),
}
