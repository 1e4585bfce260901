use rr_domain::config::Config;

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8321);
}

#[test]
fn explicit_zero_host_parses() {
    let toml_str = r#"
[server]
host = "0.0.0.0"
port = 8321
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
}

#[test]
fn spec_defaults_hold() {
    let config = Config::default();
    assert_eq!(config.waves.processing_sr, 8_000);
    assert_eq!(config.waves.job_timeout_s, 60);
    assert_eq!(config.llm.timeout_s, 60);
    assert_eq!(config.llm.retries, 3);
    assert!((config.events.turn1_timeout_s - 15.0).abs() < f64::EPSILON);
    assert!(config.events.ws_enabled);
    assert!(config.waves.enabled);
}

#[test]
fn unknown_sections_are_tolerated() {
    // Operators carry config files across versions; stale sections must
    // not break startup.
    let toml_str = r#"
[server]
port = 9000

[retired_section]
key = "value"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.port, 9000);
}
