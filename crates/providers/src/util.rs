//! Shared utility functions for provider adapters.

use rr_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeouts map to [`Error::Timeout`]; connection-level failures map to
/// [`Error::Network`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Network(e.to_string())
    }
}

/// Build a provider error from an unsuccessful HTTP response.
///
/// The status code carries the taxonomy mapping (429 → rate_limit,
/// 5xx → server_error); see [`rr_domain::error::Error::class`].
pub(crate) fn provider_error(provider: &str, status: u16, body: &str) -> Error {
    if status == 429 {
        return Error::RateLimited(format!("{provider}: {body}"));
    }
    Error::Provider {
        provider: provider.to_owned(),
        status,
        message: truncate(body, 600),
    }
}

/// Read the API key for a provider from its configured environment
/// variable. Secrets only ever travel via the environment.
pub(crate) fn resolve_api_key(key_env: &str) -> Result<String> {
    std::env::var(key_env).map_err(|_| {
        Error::Config(format!(
            "environment variable '{key_env}' not set or not valid UTF-8"
        ))
    })
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_owned()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_domain::error::ErrorClass;

    #[test]
    fn status_429_becomes_rate_limit() {
        let e = provider_error("main", 429, "slow down");
        assert_eq!(e.class(), ErrorClass::RateLimit);
    }

    #[test]
    fn status_500_becomes_server_error() {
        let e = provider_error("main", 500, "boom");
        assert_eq!(e.class(), ErrorClass::ServerError);
    }

    #[test]
    fn resolve_api_key_env_var() {
        let var_name = "RR_TEST_RESOLVE_ENV_KEY_1234";
        std::env::set_var(var_name, "env-secret-value");
        assert_eq!(resolve_api_key(var_name).unwrap(), "env-secret-value");
        std::env::remove_var(var_name);
    }

    #[test]
    fn resolve_api_key_missing() {
        let err = resolve_api_key("RR_TEST_NONEXISTENT_VAR_8888").unwrap_err();
        assert!(err.to_string().contains("RR_TEST_NONEXISTENT_VAR_8888"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "héllo wörld";
        let t = truncate(s, 3);
        assert!(t.starts_with("hé") || t.starts_with('h'));
    }
}
