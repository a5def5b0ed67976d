//! Formatter invocation protocol.
//!
//! A formatter is invoked as `<usage.json prefix...> <verb>`. For `decode`,
//! `encode` and `validate` the raw value is base64-encoded and written to the
//! formatter's stdin, which is then closed; `info` receives no input. The
//! formatter answers with a single JSON object on stdout. Stderr is a
//! diagnostic side channel and the exit code is ignored.
//!
//! Responses are decoded into one typed struct per verb ([`VerbResponse`]) at
//! this boundary. Absent or mistyped fields fall back to empty strings and
//! `false`, so a loosely written formatter still yields a usable answer.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::FormatterError;
use crate::manifest::PluginManifest;
use crate::process::CommandExecutor;
use crate::sink::ErrorChannel;

/// Tracing target for protocol exchanges.
const PROTOCOL_TARGET: &str = "valform_plugins::protocol";

/// Operation selected by the trailing argument of a formatter invocation.
///
/// # Example
///
/// ```
/// use valform_plugins::Verb;
///
/// assert_eq!(Verb::Validate.as_str(), "validate");
/// assert!(!Verb::Info.takes_payload());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Report version and description.
    Info,
    /// Turn a raw value into displayable text.
    Decode,
    /// Turn edited text back into a raw value.
    Encode,
    /// Check whether a raw value is acceptable.
    Validate,
}

impl Verb {
    /// Returns the argument appended to the command prefix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Decode => "decode",
            Self::Encode => "encode",
            Self::Validate => "validate",
        }
    }

    /// Returns `true` when the verb carries the value on stdin.
    #[must_use]
    pub const fn takes_payload(self) -> bool {
        !matches!(self, Self::Info)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single formatter invocation: argv, stdin bytes and working directory.
///
/// # Example
///
/// ```
/// use valform_plugins::{CommandRequest, PluginManifest, Verb};
/// use std::path::PathBuf;
///
/// let manifest = PluginManifest::new(vec!["./fmt".into()], PathBuf::from("/f/hex"));
/// let request = CommandRequest::new(&manifest, Verb::Decode, b"hi");
/// assert_eq!(request.argv(), &["./fmt", "decode"]);
/// assert_eq!(request.stdin_payload(), b"aGk=");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    argv: Vec<String>,
    stdin_payload: Vec<u8>,
    working_directory: PathBuf,
}

impl CommandRequest {
    /// Builds the invocation of `verb` for the formatter described by
    /// `manifest`. The payload is ignored for [`Verb::Info`].
    #[must_use]
    pub fn new(manifest: &PluginManifest, verb: Verb, payload: &[u8]) -> Self {
        let mut argv = manifest.invocation_prefix().to_vec();
        argv.push(verb.as_str().to_owned());
        let stdin_payload = if verb.takes_payload() {
            STANDARD.encode(payload).into_bytes()
        } else {
            Vec::new()
        };
        Self {
            argv,
            stdin_payload,
            working_directory: manifest.working_directory().to_path_buf(),
        }
    }

    /// Creates a request from raw parts, bypassing verb handling.
    #[must_use]
    pub const fn from_parts(
        argv: Vec<String>,
        stdin_payload: Vec<u8>,
        working_directory: PathBuf,
    ) -> Self {
        Self {
            argv,
            stdin_payload,
            working_directory,
        }
    }

    /// Returns the full argument vector, executable first.
    #[must_use]
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Returns the bytes written to the process's stdin.
    #[must_use]
    pub fn stdin_payload(&self) -> &[u8] {
        &self.stdin_payload
    }

    /// Returns the directory the process is started in.
    #[must_use]
    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    /// Returns the argv joined with spaces, for messages.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}

/// Answer to `info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InfoResponse {
    /// Formatter-supplied version string.
    pub version: String,
    /// Formatter-supplied description.
    pub description: String,
}

/// Answer to `decode`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecodeResponse {
    /// Error text reported by the formatter, empty on success.
    pub error: String,
    /// Decoded, displayable representation of the value.
    pub output: String,
    /// Whether the decoded text may be edited and encoded back.
    #[serde(rename = "read-only")]
    pub read_only: bool,
    /// Label describing the output format (e.g. `json`, `plain_text`).
    pub format: String,
}

/// Answer to `encode`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EncodeResponse {
    /// Encoded value as produced by the formatter.
    pub output: String,
}

/// Answer to `validate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValidateResponse {
    /// Whether the formatter accepts the value.
    pub valid: bool,
}

/// Typed answer to one verb, decoded from the formatter's JSON object.
pub trait VerbResponse: Sized {
    /// Verb this response answers.
    const VERB: Verb;

    /// Extracts the verb's fields, defaulting absent or mistyped ones.
    fn from_object(object: &Map<String, Value>) -> Self;

    /// Parses raw stdout from an invocation of [`Self::VERB`].
    ///
    /// # Errors
    ///
    /// Returns [`FormatterError::NoOutput`] for empty stdout,
    /// [`FormatterError::InvalidOutput`] (carrying the raw text) when stdout
    /// is not a single JSON object, and [`FormatterError::EmptyResponse`]
    /// when the object has no fields.
    fn parse(stdout: &[u8]) -> Result<Self, FormatterError> {
        parse_object(Self::VERB, stdout).map(|object| Self::from_object(&object))
    }
}

impl VerbResponse for InfoResponse {
    const VERB: Verb = Verb::Info;

    fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            version: string_field(object, "version"),
            description: string_field(object, "description"),
        }
    }
}

impl VerbResponse for DecodeResponse {
    const VERB: Verb = Verb::Decode;

    fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            error: string_field(object, "error"),
            output: string_field(object, "output"),
            read_only: bool_field(object, "read-only"),
            format: string_field(object, "format"),
        }
    }
}

impl VerbResponse for EncodeResponse {
    const VERB: Verb = Verb::Encode;

    fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            output: string_field(object, "output"),
        }
    }
}

impl VerbResponse for ValidateResponse {
    const VERB: Verb = Verb::Validate;

    fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            valid: bool_field(object, "valid"),
        }
    }
}

/// Parsed formatter answer, one case per verb.
///
/// Serialises as the bare response object of its case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CommandResponse {
    /// Answer to [`Verb::Info`].
    Info(InfoResponse),
    /// Answer to [`Verb::Decode`].
    Decode(DecodeResponse),
    /// Answer to [`Verb::Encode`].
    Encode(EncodeResponse),
    /// Answer to [`Verb::Validate`].
    Validate(ValidateResponse),
}

impl CommandResponse {
    /// Parses raw stdout from a `verb` invocation.
    ///
    /// # Errors
    ///
    /// See [`VerbResponse::parse`].
    pub fn parse(verb: Verb, stdout: &[u8]) -> Result<Self, FormatterError> {
        match verb {
            Verb::Info => InfoResponse::parse(stdout).map(Self::Info),
            Verb::Decode => DecodeResponse::parse(stdout).map(Self::Decode),
            Verb::Encode => EncodeResponse::parse(stdout).map(Self::Encode),
            Verb::Validate => ValidateResponse::parse(stdout).map(Self::Validate),
        }
    }

    /// Returns the verb this response answers.
    #[must_use]
    pub const fn verb(&self) -> Verb {
        match self {
            Self::Info(_) => Verb::Info,
            Self::Decode(_) => Verb::Decode,
            Self::Encode(_) => Verb::Encode,
            Self::Validate(_) => Verb::Validate,
        }
    }
}

/// Runs `R::VERB` against a formatter and decodes its answer.
///
/// Anything the formatter writes to stderr is forwarded to `errors` as a
/// diagnostic, prefixed with the formatter's working directory; it does not
/// fail the call. Success is decided by stdout alone.
///
/// # Errors
///
/// Returns the executor's error when the process fails, or a protocol error
/// from [`VerbResponse::parse`].
pub fn invoke<R, E>(
    executor: &E,
    manifest: &PluginManifest,
    payload: &[u8],
    errors: &dyn ErrorChannel,
) -> Result<R, FormatterError>
where
    R: VerbResponse,
    E: CommandExecutor + ?Sized,
{
    let request = CommandRequest::new(manifest, R::VERB, payload);
    let output = executor.run(&request)?;

    if !output.stderr().is_empty() {
        let diagnostic = format!(
            "{}: {}",
            request.working_directory().display(),
            String::from_utf8_lossy(output.stderr()).trim_end()
        );
        warn!(
            target: PROTOCOL_TARGET,
            command = %request.command_line(),
            stderr = %diagnostic,
            "formatter wrote to stderr"
        );
        errors.error(&diagnostic);
    }

    R::parse(output.stdout())
}

/// Parses stdout strictly as one non-empty JSON object.
///
/// # Errors
///
/// See [`CommandResponse::parse`].
pub fn parse_object(verb: Verb, stdout: &[u8]) -> Result<Map<String, Value>, FormatterError> {
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return Err(FormatterError::NoOutput {
            verb: verb.as_str().to_owned(),
        });
    }

    let invalid = || FormatterError::InvalidOutput {
        output: String::from_utf8_lossy(stdout).into_owned(),
    };

    let Value::Object(object) = serde_json::from_slice::<Value>(stdout).map_err(|_| invalid())?
    else {
        return Err(invalid());
    };

    if object.is_empty() {
        return Err(FormatterError::EmptyResponse {
            verb: verb.as_str().to_owned(),
        });
    }
    Ok(object)
}

fn string_field(object: &Map<String, Value>, key: &str) -> String {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_default()
}

fn bool_field(object: &Map<String, Value>, key: &str) -> bool {
    object.get(key).and_then(Value::as_bool).unwrap_or_default()
}
