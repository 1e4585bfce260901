mod events;
mod llm;
mod server;
mod speech;
mod waves;

pub use events::*;
pub use llm::*;
pub use server::*;
pub use speech::*;
pub use waves::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub stt: SttConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub waves: WavesConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Logging & artifacts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default tracing filter, overridable via `RUST_LOG`.
    #[serde(default = "d_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: d_log_level(),
        }
    }
}

fn d_log_level() -> String {
    "info,rr_gateway=debug".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Root directory for TTS clips, wave tracks, STT sessions, manifests.
    #[serde(default = "d_artifacts_root")]
    pub root: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            root: d_artifacts_root(),
        }
    }
}

fn d_artifacts_root() -> PathBuf {
    PathBuf::from("artifacts")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.llm.providers.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.providers".into(),
                message: "no LLM providers configured".into(),
            });
        }

        let mut seen_ids: HashSet<&str> = HashSet::new();
        for (i, provider) in self.llm.providers.iter().enumerate() {
            if provider.id.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].id"),
                    message: "provider id must not be empty".into(),
                });
            }
            if provider.base_url.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].base_url"),
                    message: "provider base_url must not be empty".into(),
                });
            } else if !provider.base_url.starts_with("http://")
                && !provider.base_url.starts_with("https://")
            {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].base_url"),
                    message: format!(
                        "base_url must start with http:// or https:// (got \"{}\")",
                        provider.base_url
                    ),
                });
            }
            if !seen_ids.insert(provider.id.as_str()) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].id"),
                    message: format!("duplicate provider id \"{}\"", provider.id),
                });
            }
        }

        if self.llm.timeout_s == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.timeout_s".into(),
                message: "timeout must be greater than 0".into(),
            });
        }

        if self.waves.enabled && self.waves.max_workers == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "waves.max_workers".into(),
                message: "at least one worker is required when waves are enabled".into(),
            });
        }

        if self.waves.processing_sr < 4_000 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "waves.processing_sr".into(),
                message: "processing sample rates below 4 kHz lose the pitch range".into(),
            });
        }

        if self.artifacts.root.as_os_str().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "artifacts.root".into(),
                message: "artifacts root must not be empty".into(),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        let issues = config.validate();
        // Only the "no providers" warning.
        assert!(issues
            .iter()
            .all(|i| i.severity == ConfigSeverity::Warning));
    }

    #[test]
    fn rejects_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config
            .validate()
            .iter()
            .any(|i| i.field == "server.port" && i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn rejects_duplicate_provider_ids() {
        let toml = r#"
            [[llm.providers]]
            id = "main"
            kind = "anthropic"
            base_url = "https://api.anthropic.com"
            key_env = "ANTHROPIC_API_KEY"

            [[llm.providers]]
            id = "main"
            kind = "openai_compat"
            base_url = "https://api.openai.com"
            key_env = "OPENAI_API_KEY"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config
            .validate()
            .iter()
            .any(|i| i.message.contains("duplicate provider id")));
    }

    #[test]
    fn rejects_disabled_worker_pool_when_enabled() {
        let mut config = Config::default();
        config.waves.max_workers = 0;
        assert!(config
            .validate()
            .iter()
            .any(|i| i.field == "waves.max_workers"));
    }

    #[test]
    fn parses_full_toml() {
        let toml = r#"
            [server]
            host = "0.0.0.0"
            port = 8321
            cors_origins = ["http://localhost:*"]

            [llm]
            temperature = 0.9
            max_tokens = 800
            timeout_s = 45
            retries = 2

            [waves]
            enabled = true
            max_workers = 3
            queue_max_size = 24
            job_timeout_s = 90
            processing_sr = 8000

            [events]
            ws_enabled = true
            turn1_timeout_s = 10.0
            dialogue_timeout_s = 20.0
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8321);
        assert_eq!(config.llm.retries, 2);
        assert_eq!(config.waves.max_workers, 3);
        assert!((config.events.turn1_timeout_s - 10.0).abs() < f64::EPSILON);
    }
}
