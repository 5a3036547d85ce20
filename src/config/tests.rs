use super::*;

fn overrides() -> GlobalOverrides {
    GlobalOverrides::default()
}

#[test]
fn defaults_resolve_without_any_source() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert!(settings.logging.scopes.is_empty());
    assert_eq!(settings.runtime.mode, RuntimeMode::Production);
    assert!(settings.runtime.signing_key.is_none());
    assert_eq!(settings.runtime.token_timeout, Duration::from_millis(10_000));
    assert!(settings.runtime.build_config_id.starts_with("frugal-"));
    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.response_limit, 1000);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("info".to_string());
    raw.runtime.mode = Some("production".to_string());

    raw.apply_global_overrides(&GlobalOverrides {
        log_level: Some("debug".to_string()),
        log_json: Some(true),
        mode: Some("watch".to_string()),
    });
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert!(matches!(settings.logging.format, LogFormat::Json));
    assert_eq!(settings.runtime.mode, RuntimeMode::Watch);
}

#[test]
fn absent_overrides_leave_file_values() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("warn".to_string());
    raw.apply_global_overrides(&overrides());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.logging.level, LevelFilter::WARN);
}

#[test]
fn invalid_values_name_their_key() {
    let cases: Vec<(RawSettings, &str)> = vec![
        (
            RawSettings {
                runtime: RawRuntimeSettings {
                    mode: Some("staging".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
            "runtime.mode",
        ),
        (
            RawSettings {
                runtime: RawRuntimeSettings {
                    signing_key: Some("short".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
            "runtime.signing_key",
        ),
        (
            RawSettings {
                runtime: RawRuntimeSettings {
                    token_timeout_ms: Some(0),
                    ..Default::default()
                },
                ..Default::default()
            },
            "runtime.token_timeout_ms",
        ),
        (
            RawSettings {
                cache: RawCacheSettings {
                    response_limit: Some(0),
                    ..Default::default()
                },
                ..Default::default()
            },
            "cache.response_limit",
        ),
        (
            RawSettings {
                logging: RawLoggingSettings {
                    level: Some("loud".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
            "logging.level",
        ),
    ];

    for (raw, expected) in cases {
        match Settings::from_raw(raw) {
            Err(LoadError::Invalid { key, .. }) => assert_eq!(key, expected),
            other => panic!("expected invalid `{expected}`, got {other:?}"),
        }
    }
}

#[test]
fn signing_key_and_scopes_are_parsed() {
    let key = SigningKey::generate().export();
    let raw = RawSettings {
        logging: RawLoggingSettings {
            scopes: vec!["frugal::cache=debug".to_string()],
            ..Default::default()
        },
        runtime: RawRuntimeSettings {
            signing_key: Some(key.clone()),
            build_config_id: Some("  site-v2 ".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.logging.scopes.len(), 1);
    assert_eq!(
        settings.runtime.signing_key.map(|key| key.export()),
        Some(key)
    );
    assert_eq!(settings.runtime.build_config_id, "site-v2");
}

#[test]
fn parse_token_command() {
    let args = CliArgs::parse_from(["frugal", "token", "force-generate", "--key", "abc"]);
    match args.command {
        Command::Token(token) => {
            assert_eq!(token.kind, TokenKind::ForceGenerate);
            assert_eq!(token.key.as_deref(), Some("abc"));
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn parse_cache_inspect_with_global_flags() {
    let args = CliArgs::parse_from([
        "frugal",
        "cache",
        "inspect",
        "target/cache.json",
        "--log-level",
        "debug",
    ]);
    assert_eq!(args.overrides.log_level.as_deref(), Some("debug"));
    match args.command {
        Command::Cache(CacheCommand::Inspect(inspect)) => {
            assert_eq!(inspect.file, Some(PathBuf::from("target/cache.json")));
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn cache_inspect_file_is_optional() {
    let args = CliArgs::parse_from(["frugal", "cache", "inspect"]);
    match args.command {
        Command::Cache(CacheCommand::Inspect(inspect)) => assert!(inspect.file.is_none()),
        other => panic!("unexpected command {other:?}"),
    }
}
