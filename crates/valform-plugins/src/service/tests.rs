//! Unit tests for the formatter service.

use std::cell::RefCell;
use std::fs;
use std::path::Path;

use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;
use crate::manifest::MANIFEST_FILE;
use crate::process::{MockCommandExecutor, ProcessOutput};
use crate::sink::SinkValue;
use crate::tests::{RecordingErrors, ScriptedExecutor};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

#[fixture]
fn formatters() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    install(dir.path(), "jsonpp");
    dir
}

fn install(root: &Path, name: &str) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).expect("create formatter dir");
    fs::write(dir.join(MANIFEST_FILE), r#"["python3","fmt.py"]"#).expect("write manifest");
}

fn stdout(text: &str) -> Result<ProcessOutput, FormatterError> {
    Ok(ProcessOutput::new(text.as_bytes().to_vec(), Vec::new()))
}

fn loaded(
    root: &Path,
    executor: ScriptedExecutor,
) -> (FormatterService<ScriptedExecutor>, Arc<RecordingErrors>) {
    let errors = Arc::new(RecordingErrors::default());
    let service = FormatterService::new(root, executor)
        .with_error_channel(Arc::clone(&errors) as Arc<dyn ErrorChannel>);
    service.load();
    (service, errors)
}

fn jsonpp() -> ScriptedExecutor {
    ScriptedExecutor::new().reply("jsonpp", Verb::Info, r#"{"version":"1.0"}"#)
}

fn collect(completions: &RefCell<Vec<Completion>>) -> impl Fn(Completion) + '_ {
    move |completion| completions.borrow_mut().push(completion)
}

// ---------------------------------------------------------------------------
// Catalog access
// ---------------------------------------------------------------------------

#[rstest]
fn load_populates_catalog(formatters: TempDir) {
    let (service, errors) = loaded(formatters.path(), jsonpp());
    assert_eq!(service.plain_list(), vec!["jsonpp".to_owned()]);
    assert!(service.is_installed("jsonpp"));
    assert!(!service.is_installed("missing"));
    assert_eq!(service.lookup("jsonpp").expect("lookup").version(), "1.0");
    assert_eq!(service.rows()[0].cmd, "python3 fmt.py");
    assert!(errors.messages().is_empty());
}

#[test]
fn catalog_is_empty_before_load() {
    let service = FormatterService::new("/nonexistent", MockCommandExecutor::new());
    assert!(service.catalog().is_empty());
    assert!(matches!(
        service.lookup("jsonpp"),
        Err(FormatterError::UnknownFormatter { .. })
    ));
}

#[rstest]
fn reload_replaces_catalog_without_touching_snapshots(formatters: TempDir) {
    let executor = jsonpp().reply("hex", Verb::Info, r#"{"version":"0.2"}"#);
    let (service, _errors) = loaded(formatters.path(), executor);
    let before = service.catalog();

    install(formatters.path(), "hex");
    let after = service.load();

    assert_eq!(before.names(), vec!["jsonpp"]);
    assert_eq!(after.names(), vec!["hex", "jsonpp"]);
    assert!(service.is_installed("hex"));
}

#[rstest]
fn set_directory_applies_on_next_load(formatters: TempDir) {
    let other = TempDir::new().expect("temp dir");
    let (mut service, _errors) = loaded(formatters.path(), jsonpp());

    service.set_directory(other.path());
    assert_eq!(service.directory(), other.path());
    assert!(service.is_installed("jsonpp"));

    service.load();
    assert!(!service.is_installed("jsonpp"));
}

// ---------------------------------------------------------------------------
// Result API
// ---------------------------------------------------------------------------

#[rstest]
#[case::validate(Verb::Validate, r#"{"valid":true}"#, CommandResponse::Validate(ValidateResponse { valid: true }))]
#[case::encode(
    Verb::Encode,
    r#"{"output":"e30="}"#,
    CommandResponse::Encode(EncodeResponse { output: "e30=".into() })
)]
fn respond_dispatches_by_verb(
    formatters: TempDir,
    #[case] verb: Verb,
    #[case] answer: &str,
    #[case] expected: CommandResponse,
) {
    let executor = jsonpp().reply("jsonpp", verb, answer);
    let (service, _errors) = loaded(formatters.path(), executor);

    let response = service.respond("jsonpp", verb, b"{}").expect("respond");

    assert_eq!(response, expected);
    assert_eq!(response.verb(), verb);
}

#[rstest]
fn respond_to_info_queries_without_payload(formatters: TempDir) {
    let (service, _errors) = loaded(formatters.path(), jsonpp());

    let response = service.respond("jsonpp", Verb::Info, b"ignored").expect("info");

    assert!(matches!(&response, CommandResponse::Info(info) if info.version == "1.0"));
    let request = service.executor().requests().pop().expect("info request");
    assert_eq!(request.argv(), &["python3", "fmt.py", "info"]);
    assert!(request.stdin_payload().is_empty());
    let json = serde_json::to_value(&response).expect("serialise");
    assert_eq!(json["version"], "1.0");
}

#[rstest]
fn decode_returns_typed_response(formatters: TempDir) {
    let executor = jsonpp().reply(
        "jsonpp",
        Verb::Decode,
        r#"{"output":"{\n  \"a\": 1\n}","read-only":false,"format":"json"}"#,
    );
    let (service, _errors) = loaded(formatters.path(), executor);

    let decoded = service.decode("jsonpp", br#"{"a":1}"#).expect("decode");

    assert_eq!(decoded.format, "json");
    assert!(!decoded.read_only);
    assert!(decoded.error.is_empty());
    let request = service.executor().requests().pop().expect("decode request");
    assert_eq!(request.argv(), &["python3", "fmt.py", "decode"]);
    assert_eq!(request.stdin_payload(), b"eyJhIjoxfQ==");
}

#[rstest]
fn unknown_name_never_spawns(formatters: TempDir) {
    let (service, _errors) = loaded(formatters.path(), jsonpp());
    let before = service.executor().requests().len();

    let err = service.encode("JSONPP", b"x").expect_err("unknown");

    assert!(matches!(err, FormatterError::UnknownFormatter { .. }));
    assert_eq!(service.executor().requests().len(), before);
}

#[rstest]
fn failures_name_formatter_and_operation(formatters: TempDir) {
    let executor = jsonpp().reply("jsonpp", Verb::Validate, "not json");
    let (service, _errors) = loaded(formatters.path(), executor);

    let err = service.validate("jsonpp", b"x").expect_err("invalid output");

    let message = err.to_string();
    assert!(message.contains("cannot validate value using jsonpp formatter"), "{message}");
    assert!(matches!(err.root_cause(), FormatterError::InvalidOutput { output } if output == "not json"));
}

// ---------------------------------------------------------------------------
// Sink API
// ---------------------------------------------------------------------------

#[rstest]
fn decode_with_delivers_four_values(formatters: TempDir) {
    let executor = jsonpp().reply(
        "jsonpp",
        Verb::Decode,
        r#"{"output":"X","read-only":true,"format":"json"}"#,
    );
    let (service, errors) = loaded(formatters.path(), executor);
    let completions = RefCell::new(Vec::new());

    service.decode_with("jsonpp", b"X", Some(&collect(&completions)));

    let delivered = completions.into_inner();
    assert_eq!(delivered.len(), 1);
    assert_eq!(
        delivered.into_iter().next().map(Completion::into_values),
        Some(vec![
            SinkValue::Text(String::new()),
            SinkValue::Text("X".into()),
            SinkValue::Bool(true),
            SinkValue::Text("json".into()),
        ])
    );
    assert!(errors.messages().is_empty());
}

#[rstest]
fn decode_with_failure_reports_once_and_delivers_message(formatters: TempDir) {
    let executor = jsonpp().reply("jsonpp", Verb::Decode, "Segmentation fault");
    let (service, errors) = loaded(formatters.path(), executor);
    let completions = RefCell::new(Vec::new());

    service.decode_with("jsonpp", b"X", Some(&collect(&completions)));

    assert_eq!(
        completions.into_inner(),
        vec![Completion::DecodeFailed(
            "Cannot decode value using jsonpp formatter.".into()
        )]
    );
    let messages = errors.messages();
    assert_eq!(messages.len(), 1, "{messages:?}");
    assert!(messages[0].contains("Segmentation fault"), "{messages:?}");
}

#[rstest]
fn decode_with_unknown_name_reports_without_running(formatters: TempDir) {
    let (service, errors) = loaded(formatters.path(), jsonpp());
    let completions = RefCell::new(Vec::new());
    let before = service.executor().requests().len();

    service.decode_with("jsonp", b"X", Some(&collect(&completions)));

    assert!(completions.into_inner().is_empty());
    assert_eq!(service.executor().requests().len(), before);
    assert_eq!(
        errors.messages(),
        vec!["can't find formatter with name: jsonp".to_owned()]
    );
}

#[rstest]
fn decode_with_requires_a_sink(formatters: TempDir) {
    let (service, errors) = loaded(formatters.path(), jsonpp());
    let before = service.executor().requests().len();

    service.decode_with("jsonpp", b"X", None);

    assert_eq!(service.executor().requests().len(), before);
    assert_eq!(errors.messages(), vec!["invalid callback".to_owned()]);
}

#[rstest]
fn encode_with_delivers_output(formatters: TempDir) {
    let executor = jsonpp().reply("jsonpp", Verb::Encode, r#"{"output":"{\"a\":1}"}"#);
    let (service, errors) = loaded(formatters.path(), executor);
    let completions = RefCell::new(Vec::new());

    service.encode_with("jsonpp", b"{ \"a\": 1 }", Some(&collect(&completions)));

    assert_eq!(
        completions.into_inner(),
        vec![Completion::Encoded(r#"{"a":1}"#.into())]
    );
    assert!(errors.messages().is_empty());
}

#[rstest]
fn encode_with_failure_delivers_nothing(formatters: TempDir) {
    let executor = jsonpp().reply_with(
        "jsonpp",
        Verb::Encode,
        Err(FormatterError::RunTimeout {
            command: "python3 fmt.py encode".into(),
            timeout_ms: 3000,
        }),
    );
    let (service, errors) = loaded(formatters.path(), executor);
    let completions = RefCell::new(Vec::new());

    service.encode_with("jsonpp", b"x", Some(&collect(&completions)));

    assert!(completions.into_inner().is_empty());
    let messages = errors.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("cannot encode value using jsonpp formatter"));
    assert!(messages[0].contains("killed by timeout"));
}

#[rstest]
#[case::valid(r#"{"valid":true}"#, true)]
#[case::invalid(r#"{"valid":false}"#, false)]
#[case::mistyped(r#"{"valid":"yes"}"#, false)]
fn is_valid_with_delivers_verdict(
    formatters: TempDir,
    #[case] reply: &str,
    #[case] expected: bool,
) {
    let executor = jsonpp().reply("jsonpp", Verb::Validate, reply);
    let (service, _errors) = loaded(formatters.path(), executor);
    let completions = RefCell::new(Vec::new());

    service.is_valid_with("jsonpp", b"x", Some(&collect(&completions)));

    assert_eq!(completions.into_inner(), vec![Completion::Validated(expected)]);
}

#[rstest]
fn sinkless_validate_still_runs(formatters: TempDir) {
    let executor = jsonpp().reply("jsonpp", Verb::Validate, r#"{"valid":true}"#);
    let (service, errors) = loaded(formatters.path(), executor);
    let before = service.executor().requests().len();

    service.is_valid_with("jsonpp", b"x", None);

    assert_eq!(service.executor().requests().len(), before + 1);
    assert!(errors.messages().is_empty());
}

#[rstest]
fn stderr_is_forwarded_alongside_success(formatters: TempDir) {
    let executor = jsonpp().reply_with(
        "jsonpp",
        Verb::Encode,
        Ok(ProcessOutput::new(
            br#"{"output":"AQ=="}"#.to_vec(),
            b"warning: lossy\n".to_vec(),
        )),
    );
    let (service, errors) = loaded(formatters.path(), executor);

    let encoded = service.encode("jsonpp", b"x").expect("encode");

    assert_eq!(encoded.output, "AQ==");
    let messages = errors.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].ends_with("jsonpp: warning: lossy"), "{messages:?}");
}

// ---------------------------------------------------------------------------
// Mocked executor
// ---------------------------------------------------------------------------

#[rstest]
fn mocked_executor_sees_info_then_decode(formatters: TempDir) {
    let mut executor = MockCommandExecutor::new();
    executor
        .expect_run()
        .withf(|request| request.argv().last().map(String::as_str) == Some("info"))
        .times(1)
        .returning(|_| stdout(r#"{"version":"3"}"#));
    executor
        .expect_run()
        .withf(|request| {
            request.argv().last().map(String::as_str) == Some("decode")
                && request.stdin_payload() == b"AQID"
        })
        .times(1)
        .returning(|_| stdout(r#"{"output":"01 02 03","read-only":true,"format":"plain_text"}"#));

    let service = FormatterService::new(formatters.path(), executor);
    service.load();
    let decoded = service.decode("jsonpp", &[1, 2, 3]).expect("decode");

    assert_eq!(decoded.output, "01 02 03");
    assert_eq!(decoded.format, "plain_text");
}
