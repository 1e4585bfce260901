use serde::Serialize;

/// Shared error type used across all Resonance crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("network: {0}")]
    Network(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("provider {provider}: HTTP {status} - {message}")]
    Provider {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("invalid model output: {0}")]
    ModelOutput(String),

    #[error("TTS: {0}")]
    Tts(String),

    #[error("wave: {0}")]
    Wave(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The closed error taxonomy that crosses component boundaries.
///
/// Provider- and transport-specific failures are mapped to one of these at
/// the edge where they occur; SSE events, push messages, and logs only ever
/// carry taxonomy values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Network,
    Timeout,
    RateLimit,
    ServerError,
    TtsError,
    WaveError,
    Unknown,
}

impl ErrorClass {
    /// Transient classes that the LLM gateway retries with backoff.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorClass::Network | ErrorClass::Timeout | ErrorClass::RateLimit
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Network => "network",
            ErrorClass::Timeout => "timeout",
            ErrorClass::RateLimit => "rate_limit",
            ErrorClass::ServerError => "server_error",
            ErrorClass::TtsError => "tts_error",
            ErrorClass::WaveError => "wave_error",
            ErrorClass::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Map this error to the closed taxonomy.
    ///
    /// HTTP status codes from providers: 429 is `rate_limit`, 408 is
    /// `timeout`, any 5xx is `server_error`; other statuses are `unknown`.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Network(_) => ErrorClass::Network,
            Error::Timeout(_) => ErrorClass::Timeout,
            Error::RateLimited(_) => ErrorClass::RateLimit,
            Error::Provider { status, .. } => match status {
                429 => ErrorClass::RateLimit,
                408 => ErrorClass::Timeout,
                s if *s >= 500 => ErrorClass::ServerError,
                _ => ErrorClass::Unknown,
            },
            Error::Tts(_) => ErrorClass::TtsError,
            Error::Wave(_) => ErrorClass::WaveError,
            _ => ErrorClass::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_status_classing() {
        let e = Error::Provider {
            provider: "p".into(),
            status: 429,
            message: "slow down".into(),
        };
        assert_eq!(e.class(), ErrorClass::RateLimit);

        let e = Error::Provider {
            provider: "p".into(),
            status: 503,
            message: "overloaded".into(),
        };
        assert_eq!(e.class(), ErrorClass::ServerError);

        let e = Error::Provider {
            provider: "p".into(),
            status: 400,
            message: "bad request".into(),
        };
        assert_eq!(e.class(), ErrorClass::Unknown);
    }

    #[test]
    fn retryable_classes() {
        assert!(ErrorClass::Network.is_retryable());
        assert!(ErrorClass::Timeout.is_retryable());
        assert!(ErrorClass::RateLimit.is_retryable());
        assert!(!ErrorClass::ServerError.is_retryable());
        assert!(!ErrorClass::TtsError.is_retryable());
        assert!(!ErrorClass::Unknown.is_retryable());
    }

    #[test]
    fn class_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorClass::RateLimit).unwrap();
        assert_eq!(json, r#""rate_limit""#);
        let json = serde_json::to_string(&ErrorClass::TtsError).unwrap();
        assert_eq!(json, r#""tts_error""#);
    }
}
