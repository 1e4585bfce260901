//! Command-line interface and config loading.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use rr_domain::config::Config;

#[derive(Debug, Parser)]
#[command(name = "resonance", about = "Backend for the water-basin dialogue installation")]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the gateway server (default).
    Serve,
    /// Inspect or validate the configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print the version.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    Show,
    Validate,
}

/// Load the config from the given path, from `config.toml` in the working
/// directory, or fall back to defaults.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<(Config, Option<PathBuf>)> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => {
            let default = PathBuf::from("config.toml");
            default.exists().then_some(default)
        }
    };

    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config: Config = toml::from_str(&raw)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok((config, Some(path)))
        }
        None => Ok((Config::default(), None)),
    }
}

pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => eprintln!("cannot render config: {e}"),
    }
}

/// Print validation issues; returns false when any error-severity issue
/// exists.
pub fn validate(config: &Config, path: Option<&Path>) -> bool {
    use rr_domain::config::ConfigSeverity;

    match path {
        Some(p) => println!("validating {}", p.display()),
        None => println!("validating built-in defaults"),
    }
    let issues = config.validate();
    if issues.is_empty() {
        println!("config OK");
        return true;
    }
    for issue in &issues {
        println!("{issue}");
    }
    !issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let (config, path) = load_config(None).unwrap();
        assert!(path.is_none() || path.unwrap().exists());
        assert_eq!(config.server.port, 8321);
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 9999\n").unwrap();
        let (config, loaded) = load_config(Some(&path)).unwrap();
        assert_eq!(config.server.port, 9999);
        assert_eq!(loaded.unwrap(), path);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = oops").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
