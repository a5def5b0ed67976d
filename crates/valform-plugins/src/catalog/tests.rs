//! Unit tests for catalog scanning and lookup.

use std::fs;
use std::path::{Path, PathBuf};

use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;
use crate::process::ProcessOutput;
use crate::protocol::Verb;
use crate::tests::{RecordingErrors, ScriptedExecutor};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

#[fixture]
fn formatters() -> TempDir {
    TempDir::new().expect("temp dir")
}

fn install(root: &Path, name: &str, manifest: &str) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).expect("create formatter dir");
    fs::write(dir.join(MANIFEST), manifest).expect("write manifest");
    dir
}

const MANIFEST: &str = crate::manifest::MANIFEST_FILE;

const JSONPP_INFO: &str = r#"{"version":"1.0","description":"Pretty JSON"}"#;

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

#[rstest]
fn scan_registers_formatters_that_answer_info(formatters: TempDir) {
    install(formatters.path(), "jsonpp", r#"["python3","jsonpp.py"]"#);
    let executor = ScriptedExecutor::new().reply("jsonpp", Verb::Info, JSONPP_INFO);
    let errors = RecordingErrors::default();

    let catalog = Catalog::scan(formatters.path(), &executor, &errors);

    let meta = catalog.lookup("jsonpp").expect("jsonpp registered");
    assert_eq!(meta.version(), "1.0");
    assert_eq!(meta.description(), "Pretty JSON");
    assert_eq!(meta.command_line(), "python3 jsonpp.py");
    assert_eq!(meta.working_directory(), formatters.path().join("jsonpp"));
    assert!(errors.messages().is_empty(), "{:?}", errors.messages());
}

#[rstest]
fn scan_sends_bare_info_request(formatters: TempDir) {
    install(formatters.path(), "jsonpp", r#"["python3","jsonpp.py"]"#);
    let executor = ScriptedExecutor::new().reply("jsonpp", Verb::Info, JSONPP_INFO);

    let _ = Catalog::scan(formatters.path(), &executor, &RecordingErrors::default());

    let requests = executor.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].argv(), &["python3", "jsonpp.py", "info"]);
    assert!(requests[0].stdin_payload().is_empty());
}

#[rstest]
fn directories_without_manifest_are_skipped_silently(formatters: TempDir) {
    fs::create_dir_all(formatters.path().join("notes")).expect("create dir");
    fs::write(formatters.path().join("README"), "not a formatter").expect("write file");
    let executor = ScriptedExecutor::new();
    let errors = RecordingErrors::default();

    let catalog = Catalog::scan(formatters.path(), &executor, &errors);

    assert!(catalog.is_empty());
    assert!(executor.requests().is_empty());
    assert!(errors.messages().is_empty());
}

#[rstest]
fn invalid_manifest_is_reported_and_skipped(formatters: TempDir) {
    install(formatters.path(), "broken", r#"{"cmd":"x"}"#);
    install(formatters.path(), "jsonpp", r#"["python3","jsonpp.py"]"#);
    let executor = ScriptedExecutor::new().reply("jsonpp", Verb::Info, JSONPP_INFO);
    let errors = RecordingErrors::default();

    let catalog = Catalog::scan(formatters.path(), &executor, &errors);

    assert_eq!(catalog.plain_list(), vec!["jsonpp".to_owned()]);
    let messages = errors.messages();
    assert_eq!(messages.len(), 1, "{messages:?}");
    assert!(messages[0].contains("invalid usage.json"), "{messages:?}");
}

#[rstest]
#[case::no_output("")]
#[case::not_json("Traceback (most recent call last)")]
#[case::empty_object("{}")]
fn failed_info_is_reported_and_skipped(formatters: TempDir, #[case] stdout: &str) {
    install(formatters.path(), "flaky", r#"["./flaky"]"#);
    let executor = ScriptedExecutor::new().reply("flaky", Verb::Info, stdout);
    let errors = RecordingErrors::default();

    let catalog = Catalog::scan(formatters.path(), &executor, &errors);

    assert!(!catalog.contains("flaky"));
    let messages = errors.messages();
    assert_eq!(messages.len(), 1, "{messages:?}");
    assert!(
        messages[0].contains("empty output for info command"),
        "{messages:?}"
    );
}

#[rstest]
fn info_timeout_is_reported_and_skipped(formatters: TempDir) {
    install(formatters.path(), "slow", r#"["./slow"]"#);
    let executor = ScriptedExecutor::new().reply_with(
        "slow",
        Verb::Info,
        Err(FormatterError::RunTimeout {
            command: "./slow info".into(),
            timeout_ms: 3000,
        }),
    );
    let errors = RecordingErrors::default();

    let catalog = Catalog::scan(formatters.path(), &executor, &errors);

    assert!(catalog.is_empty());
    assert!(errors.messages()[0].contains("killed by timeout"));
}

#[rstest]
fn stderr_during_info_is_a_diagnostic_only(formatters: TempDir) {
    install(formatters.path(), "chatty", r#"["./chatty"]"#);
    let executor = ScriptedExecutor::new().reply_with(
        "chatty",
        Verb::Info,
        Ok(ProcessOutput::new(
            br#"{"version":"2"}"#.to_vec(),
            b"deprecated flag\n".to_vec(),
        )),
    );
    let errors = RecordingErrors::default();

    let catalog = Catalog::scan(formatters.path(), &executor, &errors);

    assert_eq!(catalog.lookup("chatty").map(PluginMetadata::version), Some("2"));
    let messages = errors.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].ends_with("chatty: deprecated flag"), "{messages:?}");
}

#[rstest]
fn missing_directory_is_created(formatters: TempDir) {
    let root = formatters.path().join("nested").join("formatters");
    let errors = RecordingErrors::default();

    let catalog = Catalog::scan(&root, &ScriptedExecutor::new(), &errors);

    assert!(catalog.is_empty());
    assert!(root.is_dir());
    assert!(errors.messages().is_empty());
}

#[rstest]
fn unreadable_entry_is_reported_and_skipped(formatters: TempDir) {
    let first = install(formatters.path(), "alpha", "[]");
    let second = install(formatters.path(), "beta", "[]");
    let errors = RecordingErrors::default();
    let listed = vec![
        Ok(second.clone()),
        Err(std::io::Error::other("stale entry")),
        Ok(formatters.path().join("alpha").join(MANIFEST)),
        Ok(first.clone()),
    ];

    let candidates = keep_directories(formatters.path(), listed, &errors);

    assert_eq!(candidates, vec![first, second]);
    let messages = errors.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("stale entry"), "{messages:?}");
}

#[rstest]
fn unusable_directory_yields_empty_catalog(formatters: TempDir) {
    let file = formatters.path().join("plain-file");
    fs::write(&file, "x").expect("write file");
    let errors = RecordingErrors::default();

    let catalog = Catalog::scan(&file, &ScriptedExecutor::new(), &errors);

    assert!(catalog.is_empty());
    assert_eq!(errors.messages().len(), 1);
}

#[rstest]
fn rescanning_is_idempotent(formatters: TempDir) {
    install(formatters.path(), "jsonpp", r#"["python3","jsonpp.py"]"#);
    install(formatters.path(), "hex", r#"["./hex"]"#);
    let executor = ScriptedExecutor::new()
        .reply("jsonpp", Verb::Info, JSONPP_INFO)
        .reply("hex", Verb::Info, r#"{"version":"0.1"}"#);
    let errors = RecordingErrors::default();

    let first = Catalog::scan(formatters.path(), &executor, &errors);
    let second = Catalog::scan(formatters.path(), &executor, &errors);

    assert_eq!(first, second);
    assert_eq!(first.names(), vec!["hex", "jsonpp"]);
}

// ---------------------------------------------------------------------------
// Lookup and listing
// ---------------------------------------------------------------------------

fn entry(name: &str, version: &str) -> PluginMetadata {
    let manifest = PluginManifest::new(vec!["./fmt".into()], PathBuf::from("/f").join(name));
    PluginMetadata::new(name, version, format!("{name} formatter"), &manifest)
}

#[test]
fn duplicate_names_resolve_to_last_entry() {
    let catalog = Catalog::from_entries(vec![
        entry("a", "1"),
        entry("b", "1"),
        entry("a", "2"),
    ]);

    assert_eq!(catalog.len(), 3);
    assert_eq!(catalog.names(), vec!["a", "b", "a"]);
    assert_eq!(catalog.plain_list(), vec!["b".to_owned(), "a".to_owned()]);
    assert_eq!(catalog.lookup("a").map(PluginMetadata::version), Some("2"));
}

#[rstest]
#[case::case_variant("JSONPP")]
#[case::prefix("json")]
#[case::empty("")]
fn lookup_requires_exact_name(#[case] name: &str) {
    let catalog = Catalog::from_entries(vec![entry("jsonpp", "1.0")]);
    assert!(catalog.lookup(name).is_none());
    assert!(!catalog.contains(name));
}

#[test]
fn rows_expose_every_role() {
    let catalog = Catalog::from_entries(vec![entry("hex", "0.3")]);
    let rows = catalog.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].field(CatalogRole::Name), "hex");
    assert_eq!(rows[0].field(CatalogRole::Version), "0.3");
    assert_eq!(rows[0].field(CatalogRole::Description), "hex formatter");
    assert_eq!(rows[0].field(CatalogRole::Cmd), "./fmt");
    assert_eq!(catalog.field(0, CatalogRole::Cmd).as_deref(), Some("./fmt"));
    assert_eq!(catalog.field(1, CatalogRole::Name), None);
}

#[rstest]
#[case("name", CatalogRole::Name)]
#[case("version", CatalogRole::Version)]
#[case("description", CatalogRole::Description)]
#[case("cmd", CatalogRole::Cmd)]
fn roles_parse_from_keys(#[case] key: &str, #[case] role: CatalogRole) {
    assert_eq!(key.parse::<CatalogRole>(), Ok(role));
    assert_eq!(role.to_string(), key);
}

#[test]
fn unknown_role_is_rejected() {
    assert!("cmdline".parse::<CatalogRole>().is_err());
}
