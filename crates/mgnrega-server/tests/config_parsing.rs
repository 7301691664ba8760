use std::{collections::HashMap, env, fs};

use mgnrega_server::AppConfig;
use mgnrega_server::config::loader::{apply_legacy_env, load_config};

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("mgnrega.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8081

[logging]
level = "debug"

[upstream]
base_url = "https://api.data.gov.in"
resource_id = "ee03643a-ee4c-48c2-ac30-9f2ff26ab722"
timeout_ms = 5000

[cache]
ttl_secs = 3600
remote_timeout_ms = 750

[cache.redis]
host = "redis.internal"
port = 6380

[query]
default_region = "Jharkhand"
default_limit = 100
max_limit = 500

[reconcile.weights]
expenditure = 500.0
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.logging.level.to_ascii_lowercase(), "debug");
    assert_eq!(cfg.upstream.timeout_ms, 5000);
    assert_eq!(cfg.cache.ttl_secs, 3600);
    assert_eq!(cfg.cache.remote_timeout_ms, 750);
    assert_eq!(cfg.cache.redis.port, 6380);
    assert_eq!(cfg.query.default_limit, 100);
    assert_eq!(cfg.query.max_limit, 500);
    assert_eq!(cfg.reconcile.weights.expenditure, 500.0);
    // Unset weights keep their defaults
    assert_eq!(cfg.reconcile.weights.individuals, 10.0);

    // 2) Env override should win over file
    unsafe {
        env::set_var("MGNREGA__QUERY__DEFAULT_LIMIT", "9");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.query.default_limit, 9);
    unsafe {
        env::remove_var("MGNREGA__QUERY__DEFAULT_LIMIT");
    }

    // 3) Invalid config (default > max) should error
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[query]
default_limit = 800
max_limit = 100
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("default_limit must be <="));
}

#[test]
fn missing_file_uses_defaults() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("absent.toml");
    let cfg = load_config(path.to_str()).expect("defaults are valid");
    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.cache.ttl_secs, 86_400);
    assert_eq!(cfg.query.max_pages, 50);
}

#[test]
fn invalid_values_are_rejected() {
    let mut cfg = AppConfig::default();
    cfg.cache.ttl_secs = 0;
    assert!(cfg.validate().unwrap_err().contains("ttl_secs"));

    let mut cfg = AppConfig::default();
    cfg.logging.level = "loud".into();
    assert!(cfg.validate().is_err());

    let mut cfg = AppConfig::default();
    cfg.reconcile.weights.households = -1.0;
    assert!(cfg.validate().unwrap_err().contains("weights"));
}

#[test]
fn missing_credentials_are_not_a_validation_error() {
    let cfg = AppConfig::default();
    assert!(cfg.upstream.resource_id.is_none());
    assert!(cfg.upstream.api_key.is_none());
    assert!(cfg.validate().is_ok());
}

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

#[test]
fn legacy_variables_fill_every_section() {
    let mut cfg = AppConfig::default();
    apply_legacy_env(
        &mut cfg,
        lookup(&[
            ("MGNREGA_RESOURCE_ID", "res-1"),
            ("DATA_GOV_API_KEY", "key-1"),
            ("REDIS_HOST", "cache.local"),
            ("REDIS_PORT", "6390"),
            ("REDIS_PASSWORD", "hunter2"),
            ("UPSTASH_REDIS_REST_URL", "https://eu1.upstash.io"),
            ("UPSTASH_REDIS_REST_TOKEN", "tok"),
            ("DEFAULT_STATE", "Odisha"),
        ]),
    );

    assert_eq!(cfg.upstream.resource_id.as_deref(), Some("res-1"));
    assert_eq!(cfg.upstream.api_key.as_deref(), Some("key-1"));
    assert_eq!(
        cfg.cache.redis.connection_url().as_deref(),
        Some("redis://:hunter2@cache.local:6390")
    );
    assert_eq!(
        cfg.cache.upstash.credentials(),
        Some(("https://eu1.upstash.io", "tok"))
    );
    assert_eq!(cfg.query.default_region, "Odisha");
}

#[test]
fn legacy_variables_use_fallback_names_and_skip_blanks() {
    let mut cfg = AppConfig::default();
    cfg.upstream.api_key = Some("from-file".into());
    apply_legacy_env(
        &mut cfg,
        lookup(&[
            ("MGNREGA_RESOURCE_ID", "  "),
            ("RESOURCE_ID", "res-2"),
            ("DATA_API_KEY", "key-2"),
            ("NEXT_PUBLIC_DEFAULT_STATE", "Kerala"),
            ("REDIS_PORT", "not-a-port"),
        ]),
    );

    assert_eq!(cfg.upstream.resource_id.as_deref(), Some("res-2"));
    // Legacy values win over file values
    assert_eq!(cfg.upstream.api_key.as_deref(), Some("key-2"));
    assert_eq!(cfg.query.default_region, "Kerala");
    assert_eq!(cfg.cache.redis.port, 6379);
}
