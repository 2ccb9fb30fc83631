//! Tests for config file discovery and layered loading

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use bale_config::{
    BuildOverrides, ConfigError, ConfigLoader, ConfigSource, CoverageOverrides, Format, Overrides,
    Reporter, TestOverrides,
};
use serial_test::serial;
use tempfile::TempDir;

const VITE_LIKE: &str = r#"
[build]
entry = "src/index.ts"
name = "PelilautaSchemas"
formats = ["es", "cjs"]
external = ["zod"]
sourcemap = true
empty_out_dir = true

[build.globals]
zod = "Zod"

[test]
globals = true
environment = "node"

[test.coverage]
provider = "v8"
reporters = ["text", "json", "html", "lcov"]
reports_dir = "./coverage"
all = true
include = ["src/**/*.ts"]
exclude = ["src/index.ts", "src/vite-env.d.ts", "**/*.test.ts", "**/types.ts", "dist/**"]
"#;

#[test]
#[serial]
fn discovers_bale_toml() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bale.toml"), VITE_LIKE).unwrap();

    let loader = ConfigLoader::new(dir.path()).without_env();
    let found = loader.find().unwrap().unwrap();
    assert!(matches!(found, ConfigSource::Toml(_)));

    let config = loader.load().unwrap();
    assert_eq!(config.build.entry, PathBuf::from("src/index.ts"));
    assert_eq!(config.build.name.as_deref(), Some("PelilautaSchemas"));
    assert_eq!(config.build.formats, vec![Format::Es, Format::Cjs]);
    assert_eq!(config.build.globals.get("zod").map(String::as_str), Some("Zod"));
    assert_eq!(config.test.coverage.include, vec!["src/**/*.ts".to_string()]);
    assert_eq!(config.test.coverage.exclude.len(), 5);
    assert!(config.test.coverage.all);
    // untouched keys keep their defaults
    assert_eq!(config.build.out_dir, PathBuf::from("dist"));
    assert_eq!(config.test.test_timeout_ms, 5_000);
}

#[test]
#[serial]
fn discovers_package_json_field() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{
  "name": "schemas",
  "bale": {
    "build": { "external": ["zod"], "formats": ["es"] }
  }
}"#,
    )
    .unwrap();

    let loader = ConfigLoader::new(dir.path()).without_env();
    assert!(matches!(
        loader.find().unwrap(),
        Some(ConfigSource::PackageJson(_))
    ));

    let config = loader.load().unwrap();
    assert_eq!(config.build.formats, vec![Format::Es]);
    assert_eq!(config.build.external, vec!["zod".to_string()]);
}

#[test]
#[serial]
fn package_json_without_field_is_ignored() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("package.json"), r#"{ "name": "plain" }"#).unwrap();

    let loader = ConfigLoader::new(dir.path()).without_env();
    assert!(loader.find().unwrap().is_none());
    assert_eq!(loader.load().unwrap(), Default::default());
}

#[test]
#[serial]
fn bale_toml_wins_over_package_json() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bale.toml"), "[build]\nout_dir = \"lib\"\n").unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{ "bale": { "build": { "out_dir": "pkg" } } }"#,
    )
    .unwrap();

    let config = ConfigLoader::new(dir.path()).without_env().load().unwrap();
    assert_eq!(config.build.out_dir, PathBuf::from("lib"));
}

#[test]
#[serial]
fn explicit_file_must_exist() {
    let dir = TempDir::new().unwrap();
    let err = ConfigLoader::new(dir.path())
        .with_file("custom.toml")
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(_)));
}

#[test]
#[serial]
fn explicit_json_file_is_loaded() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("bale.config.json"),
        r#"{ "build": { "dts": false } }"#,
    )
    .unwrap();

    let config = ConfigLoader::new(dir.path())
        .with_file("bale.config.json")
        .without_env()
        .load()
        .unwrap();
    assert!(!config.build.dts);
}

#[test]
#[serial]
fn unsupported_extension_is_rejected() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bale.yaml"), "build: {}").unwrap();
    let err = ConfigLoader::new(dir.path())
        .with_file("bale.yaml")
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
}

#[test]
#[serial]
fn schema_errors_are_reported_before_extraction() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("bale.toml"),
        "[build]\nformats = [\"iife\"]\nminify = true\n",
    )
    .unwrap();

    let err = ConfigLoader::new(dir.path()).without_env().load().unwrap_err();
    match err {
        ConfigError::SchemaValidation(errors) => assert!(errors.len() >= 2, "{errors:?}"),
        other => panic!("expected schema validation error, got {other}"),
    }
}

#[test]
#[serial]
fn invalid_toml_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bale.toml"), "[build\nentry = ").unwrap();
    let err = ConfigLoader::new(dir.path()).without_env().load().unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
#[serial]
fn environment_overrides_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bale.toml"), "[build]\nout_dir = \"lib\"\n").unwrap();

    // SAFETY: serialized test, no other thread reads the environment
    unsafe {
        std::env::set_var("BALE_BUILD__OUT_DIR", "from-env");
        std::env::set_var("BALE_TEST__COVERAGE__ENABLED", "true");
        std::env::set_var("BALE_UNRELATED", "ignored");
    }

    let result = ConfigLoader::new(dir.path()).load();

    unsafe {
        std::env::remove_var("BALE_BUILD__OUT_DIR");
        std::env::remove_var("BALE_TEST__COVERAGE__ENABLED");
        std::env::remove_var("BALE_UNRELATED");
    }

    let config = result.unwrap();
    assert_eq!(config.build.out_dir, PathBuf::from("from-env"));
    assert!(config.test.coverage.enabled);
}

#[test]
#[serial]
fn overrides_win_over_every_layer() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bale.toml"), VITE_LIKE).unwrap();

    let overrides = Overrides {
        build: BuildOverrides {
            formats: Some(vec![Format::Umd]),
            globals: Some(BTreeMap::from([(
                "react".to_string(),
                "React".to_string(),
            )])),
            sourcemap: Some(false),
            ..Default::default()
        },
        test: TestOverrides {
            max_workers: Some(2),
            coverage: CoverageOverrides {
                enabled: Some(true),
                reporters: Some(vec![Reporter::Lcov]),
                ..Default::default()
            },
            ..Default::default()
        },
    };

    let config = ConfigLoader::new(dir.path())
        .without_env()
        .load_with(&overrides)
        .unwrap();

    assert_eq!(config.build.formats, vec![Format::Umd]);
    assert!(!config.build.sourcemap);
    // maps merge key by key
    assert_eq!(config.build.globals.len(), 2);
    assert_eq!(config.test.max_workers, Some(2));
    assert!(config.test.coverage.enabled);
    assert_eq!(config.test.coverage.reporters, vec![Reporter::Lcov]);
    // values not overridden survive
    assert_eq!(config.build.external, vec!["zod".to_string()]);
}
