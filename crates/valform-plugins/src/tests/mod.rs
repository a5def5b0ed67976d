//! Crate-level integration and BDD tests, plus shared test doubles.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::FormatterError;
use crate::process::{CommandExecutor, ProcessOutput};
use crate::protocol::{CommandRequest, Verb};
use crate::sink::ErrorChannel;


type ReplyKey = (String, Verb);

/// Executor answering from a table keyed by formatter directory name and
/// verb. Unscripted requests produce empty stdout.
#[derive(Default)]
pub(crate) struct ScriptedExecutor {
    replies: HashMap<ReplyKey, Result<ProcessOutput, FormatterError>>,
    requests: Mutex<Vec<CommandRequest>>,
}

impl ScriptedExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Scripts `stdout` as the answer of `formatter` to `verb`.
    pub(crate) fn reply(self, formatter: &str, verb: Verb, stdout: &str) -> Self {
        self.reply_with(
            formatter,
            verb,
            Ok(ProcessOutput::new(stdout.as_bytes().to_vec(), Vec::new())),
        )
    }

    /// Scripts an arbitrary outcome for `formatter` and `verb`.
    pub(crate) fn reply_with(
        mut self,
        formatter: &str,
        verb: Verb,
        outcome: Result<ProcessOutput, FormatterError>,
    ) -> Self {
        self.replies.insert((formatter.to_owned(), verb), outcome);
        self
    }

    /// Returns every request seen so far.
    pub(crate) fn requests(&self) -> Vec<CommandRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn run(&self, request: &CommandRequest) -> Result<ProcessOutput, FormatterError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());

        let formatter = request
            .working_directory()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let verb = match request.argv().last().map(String::as_str) {
            Some("decode") => Verb::Decode,
            Some("encode") => Verb::Encode,
            Some("validate") => Verb::Validate,
            _ => Verb::Info,
        };

        self.replies
            .get(&(formatter, verb))
            .cloned()
            .unwrap_or_else(|| Ok(ProcessOutput::default()))
    }
}

/// Error channel that keeps every message.
#[derive(Default)]
pub(crate) struct RecordingErrors {
    messages: Mutex<Vec<String>>,
}

impl RecordingErrors {
    pub(crate) fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("messages lock").clone()
    }
}

impl ErrorChannel for RecordingErrors {
    fn error(&self, message: &str) {
        self.messages
            .lock()
            .expect("messages lock")
            .push(message.to_owned());
    }
}

#[test]
fn scripted_executor_defaults_to_empty_output() {
    let executor = ScriptedExecutor::new();
    let request = CommandRequest::from_parts(
        vec!["fmt".into(), "info".into()],
        Vec::new(),
        "/formatters/none".into(),
    );
    let output = executor.run(&request).expect("run");
    assert!(output.stdout().is_empty());
    assert_eq!(executor.requests(), vec![request]);
}
