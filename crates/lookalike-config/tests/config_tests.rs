// SPDX-FileCopyrightText: 2026 Lookalike Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the lookalike configuration system.

use lookalike_config::diagnostic::ConfigError;
use lookalike_config::model::LookalikeConfig;
use lookalike_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_config() {
    let toml = r#"
[storage]
database_path = "/tmp/images.db"
wal_mode = false
blocking_mode = false
cache_size_kib = 4096
busy_timeout_ms = 250
backup_on_open = true

[log]
level = "debug"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.storage.database_path, "/tmp/images.db");
    assert!(!config.storage.wal_mode);
    assert!(!config.storage.blocking_mode);
    assert_eq!(config.storage.cache_size_kib, 4096);
    assert_eq!(config.storage.busy_timeout_ms, 250);
    assert!(config.storage.backup_on_open);
    assert_eq!(config.log.level, "debug");
}

/// Missing sections use defaults without error.
#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.storage.database_path, "lookalike.db");
    assert!(config.storage.wal_mode);
    assert!(config.storage.blocking_mode);
    assert_eq!(config.storage.cache_size_kib, 150_000);
    assert_eq!(config.storage.busy_timeout_ms, 5_000);
    assert!(!config.storage.backup_on_open);
    assert_eq!(config.log.level, "info");
}

#[test]
fn unknown_field_in_storage_is_rejected() {
    let toml = r#"
[storage]
databse_path = "x.db"
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("databse_path"),
        "error should mention the unknown field, got: {err_str}"
    );
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let toml = r#"
[agent]
name = "x"
"#;

    assert!(load_config_from_str(toml).is_err());
}

/// Unknown keys come back as diagnostics carrying a suggestion and a span.
#[test]
fn unknown_key_diagnostic_suggests_and_points_at_key() {
    let toml = "[storage]\nblocking_mod = false\n";

    let errors = load_and_validate_str(toml).expect_err("should fail");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key,
            suggestion,
            span,
            ..
        } => {
            assert_eq!(key, "blocking_mod");
            assert_eq!(suggestion.as_deref(), Some("blocking_mode"));
            let span = span.expect("inline source should be located");
            assert_eq!(span.offset(), toml.find("blocking_mod").unwrap());
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn wrong_type_produces_invalid_value_diagnostic() {
    let toml = "[storage]\ncache_size_kib = \"lots\"\n";

    let errors = load_and_validate_str(toml).expect_err("should fail");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::InvalidValue { key, .. } if key.contains("cache_size_kib"))));
}

#[test]
fn validation_runs_after_successful_parse() {
    let toml = "[log]\nlevel = \"chatty\"\n";

    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("log.level"))));
}

/// Dotted overrides (what the env provider produces) land in the right section.
#[test]
fn dotted_override_sets_storage_field() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let config: LookalikeConfig = Figment::new()
        .merge(Serialized::defaults(LookalikeConfig::default()))
        .merge(Toml::string("[storage]\ndatabase_path = \"from-toml.db\"\n"))
        .merge(("storage.database_path", "from-env.db"))
        .extract()
        .expect("should merge override");

    assert_eq!(config.storage.database_path, "from-env.db");
}

/// Missing config files are silently skipped (Figment's Toml::file() behavior).
#[test]
fn missing_config_files_silently_skipped() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let config: LookalikeConfig = Figment::new()
        .merge(Serialized::defaults(LookalikeConfig::default()))
        .merge(Toml::file("/nonexistent/path/lookalike.toml"))
        .extract()
        .expect("missing file should be silently skipped");

    assert_eq!(config.storage.database_path, "lookalike.db");
}
