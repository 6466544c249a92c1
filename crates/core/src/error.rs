use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("invalid identity '{identity}': {reason}")]
    InvalidIdentity { identity: String, reason: String },
}

impl NormalizeError {
    pub(crate) fn invalid(identity: &str, reason: impl Into<String>) -> Self {
        Self::InvalidIdentity {
            identity: identity.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failures reported by the remote collaborators (listing and per-id fetch).
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    #[error("remote object not found: {0}")]
    NotFound(String),

    #[error("remote decode error: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown kind: {0}")]
pub struct UnknownKind(pub String);
