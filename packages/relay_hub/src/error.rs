/// Errors returned by [`crate::HubHandle`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    /// The hub loop has stopped; no further events will be processed.
    #[error("hub is no longer running")]
    Closed,
}

/// Errors surfaced by a connection adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,

    #[error("read failed: {0}")]
    Read(String),

    #[error("write failed: {0}")]
    Write(String),
}

/// Reasons an inbound frame could not be decoded as an envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed json: {0}")]
    Json(String),

    #[error("envelope is not a json object")]
    NotAnObject,

    #[error("unsupported envelope type: {0}")]
    UnsupportedType(String),

    #[error("setname envelope without a nickname")]
    MissingNickname,
}
