use std::fs;
use std::path::PathBuf;

use bale_config::{
    ConfigError, Format, LibraryConfig, TestEnvironment, validate_fs, validate_schema,
};
use tempfile::TempDir;

fn library() -> LibraryConfig {
    let mut config = LibraryConfig::default();
    config.build.external = vec!["zod".into()];
    config.build.globals.insert("zod".into(), "Zod".into());
    config.build.name = Some("PelilautaSchemas".into());
    config
}

#[test]
fn default_config_is_valid() {
    validate_schema(&LibraryConfig::default()).unwrap();
}

#[test]
fn zero_formats_is_a_configuration_error() {
    let mut config = library();
    config.build.formats.clear();
    assert!(matches!(
        validate_schema(&config).unwrap_err(),
        ConfigError::NoFormats
    ));
}

#[test]
fn duplicate_formats_are_rejected() {
    let mut config = library();
    config.build.formats = vec![Format::Es, Format::Es];
    let err = validate_schema(&config).unwrap_err();
    assert!(err.to_string().contains("more than once"), "{err}");
}

#[test]
fn umd_requires_a_global_for_every_external() {
    let mut config = library();
    config.build.formats = vec![Format::Es, Format::Umd];
    config.build.external.push("react".into());

    match validate_schema(&config).unwrap_err() {
        ConfigError::MissingGlobal { external } => assert_eq!(external, "react"),
        other => panic!("expected MissingGlobal, got {other}"),
    }
}

#[test]
fn umd_requires_a_library_name() {
    let mut config = library();
    config.build.formats = vec![Format::Umd];
    config.build.name = None;
    assert!(matches!(
        validate_schema(&config).unwrap_err(),
        ConfigError::MissingLibraryName
    ));
}

#[test]
fn umd_with_complete_globals_is_valid() {
    let mut config = library();
    config.build.formats = vec![Format::Es, Format::Cjs, Format::Umd];
    validate_schema(&config).unwrap();
}

#[test]
fn globals_are_not_required_without_umd() {
    let mut config = library();
    config.build.globals.clear();
    validate_schema(&config).unwrap();
}

#[test]
fn invalid_global_name_is_rejected() {
    let mut config = library();
    config.build.globals.insert("zod".into(), "not-valid".into());
    let err = validate_schema(&config).unwrap_err();
    assert!(err.to_string().contains("build.globals.zod"), "{err}");
}

#[test]
fn browser_environments_are_rejected() {
    let mut config = library();
    config.test.environment = TestEnvironment::Jsdom;
    let err = validate_schema(&config).unwrap_err();
    assert!(err.to_string().contains("jsdom"), "{err}");
}

#[test]
fn thresholds_must_be_percentages() {
    let mut config = library();
    config.test.coverage.thresholds.lines = Some(120.0);
    let err = validate_schema(&config).unwrap_err();
    assert!(err.to_string().contains("thresholds.lines"), "{err}");
}

#[test]
fn zero_timeouts_are_rejected() {
    let mut config = library();
    config.test.file_timeout_ms = 0;
    assert!(validate_schema(&config).is_err());
}

#[test]
fn fs_validation_checks_entry_and_setup_files() {
    let dir = TempDir::new().unwrap();
    let config = library();

    assert!(matches!(
        validate_fs(&config, dir.path()).unwrap_err(),
        ConfigError::EntryNotFound(_)
    ));

    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/index.ts"), "export const Foo = 1;\n").unwrap();
    validate_fs(&config, dir.path()).unwrap();

    let mut with_setup = config.clone();
    with_setup.test.setup_files = vec![PathBuf::from("tests/setup.ts")];
    assert!(matches!(
        validate_fs(&with_setup, dir.path()).unwrap_err(),
        ConfigError::SetupFileNotFound(_)
    ));
}

#[test]
fn fs_validation_refuses_to_empty_the_source_tree() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/index.ts"), "export {};\n").unwrap();

    let mut config = library();
    config.build.out_dir = PathBuf::from("src");
    assert!(matches!(
        validate_fs(&config, dir.path()).unwrap_err(),
        ConfigError::UnsafeOutDir { .. }
    ));

    config.build.out_dir = PathBuf::from(".");
    assert!(validate_fs(&config, dir.path()).is_err());

    // not cleared, so not dangerous
    config.build.empty_out_dir = false;
    validate_fs(&config, dir.path()).unwrap();
}
