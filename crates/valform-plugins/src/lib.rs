//! Pluggable value formatters run as external processes.
//!
//! A formatter is a directory under the formatters root holding a
//! `usage.json` manifest: a JSON array naming the command prefix used to
//! launch it. The engine appends a verb (`info`, `decode`, `encode` or
//! `validate`), writes the base64-encoded value to the formatter's stdin and
//! reads one JSON object from its stdout. Anything on stderr is surfaced as a
//! diagnostic and never changes the outcome.
//!
//! # Architecture
//!
//! - [`PluginManifest`] reads `usage.json`.
//! - [`CommandRequest`] and the response types in [`protocol`] define the
//!   wire format.
//! - [`ProcessRunner`] implements [`CommandExecutor`] with start and run
//!   timeouts; tests substitute their own executor.
//! - [`Catalog`] is the immutable result of scanning the formatters root.
//! - [`FormatterService`] owns the current catalog and runs verbs by
//!   formatter name, reporting through an [`ErrorChannel`] and a
//!   [`CompletionSink`].
//!
//! # Example
//!
//! ```rust,no_run
//! use valform_plugins::{FormatterService, ProcessRunner, ProcessTimeouts};
//!
//! let runner = ProcessRunner::new(ProcessTimeouts::from_millis(3000, 3000));
//! let service = FormatterService::new("/home/me/.config/valform/formatters", runner);
//! service.load();
//! for name in service.plain_list() {
//!     let decoded = service.decode(&name, b"\x82\xa1a\x01");
//!     println!("{name}: {decoded:?}");
//! }
//! ```

pub mod catalog;
pub mod error;
pub mod manifest;
pub mod process;
pub mod protocol;
pub mod service;
pub mod sink;

#[cfg(test)]
mod tests;

pub use self::catalog::{Catalog, CatalogRole, CatalogRow, PluginMetadata};
pub use self::error::FormatterError;
pub use self::manifest::{MANIFEST_FILE, PluginManifest};
pub use self::process::{
    CommandExecutor, DEFAULT_TIMEOUT, ProcessOutput, ProcessRunner, ProcessState, ProcessTimeouts,
};
pub use self::protocol::{
    CommandRequest, CommandResponse, DecodeResponse, EncodeResponse, InfoResponse,
    ValidateResponse, Verb, VerbResponse, invoke,
};
pub use self::service::FormatterService;
pub use self::sink::{Completion, CompletionSink, ErrorChannel, SinkValue, TracingErrorChannel};
