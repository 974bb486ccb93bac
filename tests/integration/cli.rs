use super::test_config;
use clap::{CommandFactory, Parser};
use marksmith::tooling::cli::{Cli, CliContext};
use marksmith::StoreError;
use tempfile::TempDir;

fn context(dir: &TempDir) -> CliContext {
    CliContext::with_config(dir.path().to_path_buf(), test_config(dir))
        .unwrap()
        .with_owner(Some("cli-tester".to_string()))
}

fn run(ctx: &CliContext, args: &[&str]) -> Result<String, StoreError> {
    let mut argv = vec!["marksmith"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    ctx.execute(&cli.command)
}

fn create(ctx: &CliContext) {
    run(
        ctx,
        &[
            "create",
            "a.md",
            "--meta",
            "title=Report",
            "--meta",
            "author=Ada",
            "--meta",
            "date=2024-01-01",
        ],
    )
    .unwrap();
}

#[test]
fn test_cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn test_parse_valid_command_matrix() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["marksmith", "list"],
        vec!["marksmith", "list", "--format", "json"],
        vec!["marksmith", "get", "a.md", "Intro"],
        vec!["marksmith", "sections", "a.md", "--format", "json"],
        vec!["marksmith", "replace", "a.md", "x", "y", "--regex", "--ignore-case"],
        vec!["marksmith", "lock", "a.md", "Intro", "--ttl-secs", "60"],
        vec!["marksmith", "meta", "merge", "a.md", "--meta", "status=done"],
        vec!["marksmith", "version", "list", "a.md"],
        vec!["marksmith", "finalize", "a.md", "--to", "html"],
        vec!["marksmith", "stream", "a.md", "Intro", "--errors", "replace"],
        vec!["marksmith", "--owner", "bot", "reclaim"],
    ];

    for args in cases {
        let parsed = Cli::try_parse_from(args.clone());
        assert!(parsed.is_ok(), "expected valid parse for args: {args:?}");
    }
}

#[test]
fn test_cli_document_workflow() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    create(&ctx);

    run(&ctx, &["append", "a.md", "Intro", "--content", "hello"]).unwrap();
    assert_eq!(run(&ctx, &["get", "a.md", "Intro"]).unwrap(), "hello");

    run(&ctx, &["edit", "a.md", "Intro", "--content", "changed"]).unwrap();
    assert_eq!(run(&ctx, &["get", "a.md", "Intro"]).unwrap(), "changed");

    let out = run(&ctx, &["replace", "a.md", "changed", "final"]).unwrap();
    assert_eq!(out, "Replaced 1 occurrence(s)");

    assert_eq!(run(&ctx, &["exists", "a.md", "Intro"]).unwrap(), "yes");
    assert!(run(&ctx, &["exists", "a.md", "Missing"]).is_err());
}

#[test]
fn test_cli_json_listings() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    create(&ctx);
    run(&ctx, &["append", "a.md", "Intro", "--content", "hello"]).unwrap();

    let listing: serde_json::Value =
        serde_json::from_str(&run(&ctx, &["list", "--format", "json"]).unwrap()).unwrap();
    assert_eq!(listing[0]["name"], "a.md");

    let sections: serde_json::Value =
        serde_json::from_str(&run(&ctx, &["sections", "a.md", "--format", "json"]).unwrap())
            .unwrap();
    assert_eq!(sections[0]["title"], "Intro");
    assert_eq!(sections[0]["level"], 1);

    let report: serde_json::Value =
        serde_json::from_str(&run(&ctx, &["validate", "a.md", "--format", "json"]).unwrap())
            .unwrap();
    assert_eq!(report["valid"], true);
}

#[test]
fn test_cli_lock_and_unlock() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    create(&ctx);
    run(&ctx, &["append", "a.md", "Intro", "--content", "hello"]).unwrap();

    run(&ctx, &["lock", "a.md", "Intro"]).unwrap();
    let holder = run(&ctx, &["holder", "a.md", "Intro"]).unwrap();
    assert!(holder.contains("cli-tester"));

    let out = run(&ctx, &["unlock", "a.md", "Intro"]).unwrap();
    assert_eq!(out, "Unlocked section 'Intro'");
    let holder = run(&ctx, &["holder", "a.md", "Intro"]).unwrap();
    assert!(holder.contains("is not locked"));
}

#[test]
fn test_cli_meta_and_versions() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    create(&ctx);

    run(&ctx, &["meta", "merge", "a.md", "--meta", "version=1"]).unwrap();
    let meta: serde_json::Value =
        serde_json::from_str(&run(&ctx, &["meta", "get", "a.md", "--format", "json"]).unwrap())
            .unwrap();
    assert_eq!(meta["version"], 1);
    assert_eq!(meta["title"], "Report");

    let saved = run(&ctx, &["version", "save", "a.md"]).unwrap();
    assert!(saved.ends_with("a_v2.md"));
    let versions = run(&ctx, &["version", "list", "a.md", "--format", "json"]).unwrap();
    let versions: serde_json::Value = serde_json::from_str(&versions).unwrap();
    assert_eq!(versions[0]["number"], 2);
}

#[test]
fn test_cli_finalize_markdown() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    create(&ctx);
    run(&ctx, &["append", "a.md", "Intro", "--content", "hello"]).unwrap();

    let out = run(&ctx, &["finalize", "a.md"]).unwrap();
    let finalized = ctx.store().dirs().finalized.join("a.md");
    assert!(out.contains("a.md"));
    assert!(finalized.exists());

    let err = run(&ctx, &["finalize", "a.md"]).unwrap_err();
    assert!(matches!(err, StoreError::Access { .. }));

    assert!(run(&ctx, &["finalize", "a.md", "--to", "odt"]).is_err());
}

#[test]
fn test_cli_config_prints_toml() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);

    let out = run(&ctx, &["config"]).unwrap();
    assert!(out.contains("[locking]"));
    assert!(out.contains("ttl_secs = 300"));
}
