#![cfg(test)]

use clap::Parser;

use super::*;
use bale_config::{Format, Reporter};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("bale").chain(args.iter().copied())).unwrap()
}

#[test]
fn build_flags_become_overrides() {
    let cli = parse(&[
        "build",
        "src/lib.ts",
        "-f",
        "es,umd",
        "--external",
        "zod",
        "--global",
        "zod=Zod",
        "--name",
        "MyLib",
        "--no-sourcemap",
        "--no-dts",
    ]);
    let Command::Build(args) = cli.command else {
        panic!("expected build");
    };
    let overrides = args.overrides();
    assert_eq!(overrides.entry.unwrap().to_str(), Some("src/lib.ts"));
    assert_eq!(overrides.formats, Some(vec![Format::Es, Format::Umd]));
    assert_eq!(overrides.external, Some(vec!["zod".to_string()]));
    assert_eq!(overrides.globals.unwrap()["zod"], "Zod");
    assert_eq!(overrides.name.as_deref(), Some("MyLib"));
    assert_eq!(overrides.sourcemap, Some(false));
    assert_eq!(overrides.dts, Some(false));
    assert_eq!(overrides.empty_out_dir, None);
}

#[test]
fn unset_build_flags_leave_config_alone() {
    let Command::Build(args) = parse(&["build"]).command else {
        panic!("expected build");
    };
    let overrides = args.overrides();
    assert!(overrides.formats.is_none());
    assert!(overrides.sourcemap.is_none());
    assert!(overrides.globals.is_none());
}

#[test]
fn last_of_paired_flags_wins() {
    let Command::Test(args) = parse(&["test", "--all", "--no-all"]).command else {
        panic!("expected test");
    };
    assert_eq!(args.overrides().coverage.all, Some(false));

    let Command::Build(args) = parse(&["build", "--no-sourcemap", "--sourcemap"]).command else {
        panic!("expected build");
    };
    assert_eq!(args.overrides().sourcemap, Some(true));
}

#[test]
fn test_flags_become_overrides() {
    let cli = parse(&[
        "test",
        "tests/**/*.test.ts",
        "--coverage",
        "-r",
        "text",
        "-r",
        "lcov",
        "--max-workers",
        "2",
        "--timeout",
        "1000",
    ]);
    let Command::Test(args) = cli.command else {
        panic!("expected test");
    };
    let overrides = args.overrides();
    assert_eq!(overrides.include, Some(vec!["tests/**/*.test.ts".to_string()]));
    assert_eq!(overrides.coverage.enabled, Some(true));
    assert_eq!(
        overrides.coverage.reporters,
        Some(vec![Reporter::Text, Reporter::Lcov])
    );
    assert_eq!(overrides.max_workers, Some(2));
    assert_eq!(overrides.test_timeout_ms, Some(1000));
}

#[test]
fn global_flags_apply_after_the_subcommand() {
    let cli = parse(&["config", "show", "--cwd", "/tmp/lib", "-q"]);
    let global = cli.global();
    assert!(global.quiet);
    assert_eq!(global.cwd.unwrap().to_str(), Some("/tmp/lib"));
}

#[test]
fn verbose_and_quiet_conflict() {
    assert!(Cli::try_parse_from(["bale", "-v", "-q", "build"]).is_err());
}

#[test]
fn bad_values_are_rejected() {
    assert!(Cli::try_parse_from(["bale", "build", "-f", "iife"]).is_err());
    assert!(Cli::try_parse_from(["bale", "build", "--global", "zod"]).is_err());
    assert!(Cli::try_parse_from(["bale", "build", "--global", "zod=my-lib"]).is_err());
    assert!(Cli::try_parse_from(["bale", "test", "--reporter", "cobertura"]).is_err());
}

#[test]
fn global_pairs_are_validated() {
    assert_eq!(
        parse_global_pair("@scope/pkg=Scope.Pkg").unwrap(),
        ("@scope/pkg".to_string(), "Scope.Pkg".to_string())
    );
    assert!(parse_global_pair("=Zod").is_err());
    assert!(parse_global_pair("zod=class").is_err());
}
