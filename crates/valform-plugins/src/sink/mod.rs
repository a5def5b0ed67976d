//! Delivery capabilities used by the formatter service.
//!
//! Two outbound channels exist. An [`ErrorChannel`] receives one
//! human-readable message per failed operation, plus non-fatal diagnostics
//! such as formatter stderr. A [`CompletionSink`] receives the ordered result
//! values of a successful operation, at most once per call. Hosts adapt these
//! to whatever calling convention they use: callbacks, promises or channels.

use tracing::error;

use crate::protocol::DecodeResponse;

/// Receiver of error notifications and diagnostics.
pub trait ErrorChannel: Send + Sync {
    /// Publishes one message.
    fn error(&self, message: &str);
}

impl<F> ErrorChannel for F
where
    F: Fn(&str) + Send + Sync,
{
    fn error(&self, message: &str) {
        self(message);
    }
}

/// Error channel that forwards every message to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorChannel;

impl ErrorChannel for TracingErrorChannel {
    fn error(&self, message: &str) {
        error!(target: "valform_plugins::errors", "{message}");
    }
}

/// A single positional value handed to a completion sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkValue {
    /// Text value.
    Text(String),
    /// Boolean value.
    Bool(bool),
}

/// Result of a finished formatter operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Successful decode: error text, output, read-only flag, format label.
    Decoded(DecodeResponse),
    /// Failed decode, carrying a single message.
    DecodeFailed(String),
    /// Successful encode output.
    Encoded(String),
    /// Validation verdict.
    Validated(bool),
}

impl Completion {
    /// Flattens the completion into its ordered positional values.
    ///
    /// # Example
    ///
    /// ```
    /// use valform_plugins::{Completion, SinkValue};
    ///
    /// assert_eq!(Completion::Validated(true).into_values(), vec![SinkValue::Bool(true)]);
    /// ```
    #[must_use]
    pub fn into_values(self) -> Vec<SinkValue> {
        match self {
            Self::Decoded(decoded) => vec![
                SinkValue::Text(decoded.error),
                SinkValue::Text(decoded.output),
                SinkValue::Bool(decoded.read_only),
                SinkValue::Text(decoded.format),
            ],
            Self::DecodeFailed(message) | Self::Encoded(message) => vec![SinkValue::Text(message)],
            Self::Validated(valid) => vec![SinkValue::Bool(valid)],
        }
    }
}

/// Receiver of successful results.
///
/// Closures implement this directly, which also covers channel adapters:
///
/// ```
/// use std::sync::mpsc;
/// use valform_plugins::{Completion, CompletionSink};
///
/// let (sender, receiver) = mpsc::channel();
/// let sink = move |completion: Completion| drop(sender.send(completion));
/// sink.complete(Completion::Encoded("AQID".into()));
/// assert_eq!(receiver.recv().ok(), Some(Completion::Encoded("AQID".into())));
/// ```
pub trait CompletionSink {
    /// Delivers one completion.
    fn complete(&self, completion: Completion);
}

impl<F> CompletionSink for F
where
    F: Fn(Completion),
{
    fn complete(&self, completion: Completion) {
        self(completion);
    }
}
