//! Relay error type and grepable error codes.

/// Stable, grepable code for an error. Logged next to the message so
/// operators can search for a failure class without parsing prose.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("invalid value for {key}: {value:?}")]
    Config { key: &'static str, value: String },
    #[error("{0} messages originate from the relay and cannot be sent by clients")]
    MediumOnly(&'static str),
    #[error("undecodable envelope: {0}")]
    Codec(#[from] frames::CodecError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorCode for RelayError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "E_CONFIG",
            Self::MediumOnly(_) => "E_MEDIUM_ONLY",
            Self::Codec(_) => "E_CODEC",
            Self::Io(_) => "E_IO",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
