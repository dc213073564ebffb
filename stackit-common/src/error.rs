use std::time::Duration;

/// Error kinds shared by the CCM and CSI daemons (§7).
///
/// `Retry` and `ImmutableChange` are modeled as data, not exceptions: callers
/// match on the variant rather than unwinding, per the "diff as data, not
/// control flow" design note.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Annotation conflict or malformed value. Non-retryable until the user
    /// edits the `Service`.
    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    /// Diff engine found an unchangeable field. Names the offending field.
    #[error("immutable field changed: {0}")]
    ImmutableChange(String),

    /// Recoverable "not ready yet" status. The harness should re-enqueue at
    /// exactly this fixed delay, never with exponential backoff.
    #[error("not ready yet, retry in {0:?}")]
    Retry(Duration),

    /// A 404 from the IaaS or LB API.
    #[error("not found: {0}")]
    NotFound(String),

    /// CSI create path: a resource already exists with a different source.
    #[error("already exists: {0}")]
    Conflict(String),

    /// Everything else. Not specially retried; relies on harness re-enqueue.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("http request failed: {source}")]
    Reqwest {
        #[from]
        source: reqwest::Error,
    },

    #[error("failed to load config: {source}")]
    Yaml {
        #[from]
        source: serde_yaml::Error,
    },

    #[error("invalid address: {source}")]
    AddrParse {
        #[from]
        source: std::net::AddrParseError,
    },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Wrap this error with additional context, the way `anyhow::Context`
    /// is used across the teacher's client adapters, while keeping the
    /// original variant classification for callers that match on it.
    pub fn context(self, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        match self {
            Error::InvalidSpec(s) => Error::InvalidSpec(format!("{msg}: {s}")),
            Error::ImmutableChange(s) => Error::ImmutableChange(format!("{msg}: {s}")),
            Error::NotFound(s) => Error::NotFound(format!("{msg}: {s}")),
            Error::Conflict(s) => Error::Conflict(format!("{msg}: {s}")),
            Error::Internal(s) => Error::Internal(format!("{msg}: {s}")),
            other => Error::Internal(format!("{msg}: {other}")),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
