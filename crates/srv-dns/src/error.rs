//! Error types for SRV resolution.

/// Errors from SRV resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("resolver initialization failed: {0}")]
    Init(String),

    #[error("SRV lookup failed: {0}")]
    Lookup(String),
}

/// Result alias for resolution operations.
pub type Result<T> = std::result::Result<T, ResolveError>;
