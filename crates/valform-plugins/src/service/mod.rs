//! Formatter service: the public entry point hosts call.
//!
//! [`FormatterService`] owns the formatters directory, the current
//! [`Catalog`] and the [`CommandExecutor`] used to run formatters. Each call
//! resolves the formatter by name from a snapshot of the catalog, so a
//! concurrent [`FormatterService::load`] never disturbs an operation that is
//! already running.
//!
//! Two calling styles are offered. The `Result` methods ([`decode`],
//! [`encode`], [`validate`]) return the typed response or error. The
//! sink methods ([`decode_with`], [`encode_with`], [`is_valid_with`]) report
//! each failure once on the service's [`ErrorChannel`] and deliver successes
//! to a [`CompletionSink`].
//!
//! [`decode`]: FormatterService::decode
//! [`encode`]: FormatterService::encode
//! [`validate`]: FormatterService::validate
//! [`decode_with`]: FormatterService::decode_with
//! [`encode_with`]: FormatterService::encode_with
//! [`is_valid_with`]: FormatterService::is_valid_with

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::catalog::{Catalog, CatalogRow, PluginMetadata};
use crate::error::FormatterError;
use crate::process::CommandExecutor;
use crate::protocol::{
    CommandResponse, DecodeResponse, EncodeResponse, InfoResponse, ValidateResponse, Verb,
    VerbResponse, invoke,
};
use crate::sink::{Completion, CompletionSink, ErrorChannel, TracingErrorChannel};

/// Tracing target for service operations.
const SERVICE_TARGET: &str = "valform_plugins::service";

/// Resolves formatters by name and runs their verbs.
///
/// # Example
///
/// ```
/// use valform_plugins::{
///     CommandExecutor, CommandRequest, FormatterError, FormatterService, ProcessOutput,
/// };
///
/// struct Silent;
/// impl CommandExecutor for Silent {
///     fn run(&self, _request: &CommandRequest) -> Result<ProcessOutput, FormatterError> {
///         Ok(ProcessOutput::default())
///     }
/// }
///
/// let root = tempfile::tempdir().expect("temp dir");
/// let service = FormatterService::new(root.path(), Silent);
/// service.load();
/// assert!(service.plain_list().is_empty());
/// assert!(!service.is_installed("jsonpp"));
/// ```
pub struct FormatterService<E> {
    directory: PathBuf,
    executor: E,
    errors: Arc<dyn ErrorChannel>,
    catalog: RwLock<Arc<Catalog>>,
}

impl<E> FormatterService<E> {
    /// Creates a service over `directory` with an empty catalog. Errors go
    /// to [`TracingErrorChannel`] until replaced.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>, executor: E) -> Self {
        Self {
            directory: directory.into(),
            executor,
            errors: Arc::new(TracingErrorChannel),
            catalog: RwLock::new(Arc::new(Catalog::new())),
        }
    }

    /// Replaces the error channel.
    #[must_use]
    pub fn with_error_channel(mut self, errors: Arc<dyn ErrorChannel>) -> Self {
        self.errors = errors;
        self
    }

    /// Changes the formatters directory. Takes effect on the next
    /// [`load`](Self::load); the current catalog is kept until then.
    pub fn set_directory(&mut self, directory: impl Into<PathBuf>) {
        self.directory = directory.into();
    }

    /// Returns the formatters directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Returns the executor.
    #[must_use]
    pub const fn executor(&self) -> &E {
        &self.executor
    }

    /// Returns a snapshot of the current catalog.
    #[must_use]
    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Returns a copy of the metadata `name` resolves to.
    ///
    /// # Errors
    ///
    /// Returns [`FormatterError::UnknownFormatter`] when no formatter has
    /// exactly that name.
    pub fn lookup(&self, name: &str) -> Result<PluginMetadata, FormatterError> {
        self.catalog()
            .lookup(name)
            .cloned()
            .ok_or_else(|| unknown(name))
    }

    /// Returns `true` when `name` resolves to an installed formatter.
    #[must_use]
    pub fn is_installed(&self, name: &str) -> bool {
        self.catalog().contains(name)
    }

    /// Returns each installed formatter name once, in catalog order.
    #[must_use]
    pub fn plain_list(&self) -> Vec<String> {
        self.catalog().plain_list()
    }

    /// Returns every catalog entry as a display row.
    #[must_use]
    pub fn rows(&self) -> Vec<CatalogRow> {
        self.catalog().rows()
    }
}

impl<E: CommandExecutor> FormatterService<E> {
    /// Rescans the formatters directory and swaps the result in.
    ///
    /// The new catalog is fully built before it replaces the old one, so
    /// readers see either the previous catalog or the new one. Scan failures
    /// are reported on the error channel. Returns the catalog now in use.
    pub fn load(&self) -> Arc<Catalog> {
        let fresh = Arc::new(Catalog::scan(
            &self.directory,
            &self.executor,
            self.errors.as_ref(),
        ));
        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&fresh);
        fresh
    }

    /// Decodes `data` with the named formatter.
    ///
    /// # Errors
    ///
    /// Returns [`FormatterError::UnknownFormatter`] for an unknown name, and
    /// [`FormatterError::Operation`] wrapping the process or protocol failure
    /// otherwise.
    pub fn decode(&self, name: &str, data: &[u8]) -> Result<DecodeResponse, FormatterError> {
        self.call(name, data)
    }

    /// Encodes `data` with the named formatter.
    ///
    /// # Errors
    ///
    /// As for [`decode`](Self::decode).
    pub fn encode(&self, name: &str, data: &[u8]) -> Result<EncodeResponse, FormatterError> {
        self.call(name, data)
    }

    /// Asks the named formatter whether `data` is valid.
    ///
    /// # Errors
    ///
    /// As for [`decode`](Self::decode).
    pub fn validate(&self, name: &str, data: &[u8]) -> Result<ValidateResponse, FormatterError> {
        self.call(name, data)
    }

    /// Runs `verb` against the named formatter and returns the answer as a
    /// [`CommandResponse`]. `data` is ignored for [`Verb::Info`], which asks
    /// the formatter afresh rather than reading the catalog.
    ///
    /// # Errors
    ///
    /// As for [`decode`](Self::decode).
    pub fn respond(
        &self,
        name: &str,
        verb: Verb,
        data: &[u8],
    ) -> Result<CommandResponse, FormatterError> {
        match verb {
            Verb::Info => self.call::<InfoResponse>(name, &[]).map(CommandResponse::Info),
            Verb::Decode => self.decode(name, data).map(CommandResponse::Decode),
            Verb::Encode => self.encode(name, data).map(CommandResponse::Encode),
            Verb::Validate => self.validate(name, data).map(CommandResponse::Validate),
        }
    }

    /// Decodes `data` and delivers the outcome to `sink`.
    ///
    /// An unknown name or a missing sink is reported on the error channel
    /// and nothing is run. A failed decode is reported once on the error
    /// channel and the sink receives [`Completion::DecodeFailed`].
    pub fn decode_with(&self, name: &str, data: &[u8], sink: Option<&dyn CompletionSink>) {
        let catalog = self.catalog();
        if !catalog.contains(name) {
            self.report(&unknown(name));
            return;
        }
        let Some(target) = sink else {
            self.report(&FormatterError::InvalidCompletionSink);
            return;
        };

        match self.call::<DecodeResponse>(name, data) {
            Ok(decoded) => target.complete(Completion::Decoded(decoded)),
            Err(err) => {
                self.report(&err);
                target.complete(Completion::DecodeFailed(format!(
                    "Cannot decode value using {name} formatter."
                )));
            }
        }
    }

    /// Encodes `data` and delivers the encoded text to `sink`, when given.
    ///
    /// Failures are reported once on the error channel and nothing is
    /// delivered.
    pub fn encode_with(&self, name: &str, data: &[u8], sink: Option<&dyn CompletionSink>) {
        match self.call::<EncodeResponse>(name, data) {
            Ok(encoded) => deliver(sink, Completion::Encoded(encoded.output)),
            Err(err) => self.report(&err),
        }
    }

    /// Validates `data` and delivers the verdict to `sink`, when given.
    ///
    /// Failures are reported once on the error channel and nothing is
    /// delivered.
    pub fn is_valid_with(&self, name: &str, data: &[u8], sink: Option<&dyn CompletionSink>) {
        match self.call::<ValidateResponse>(name, data) {
            Ok(verdict) => deliver(sink, Completion::Validated(verdict.valid)),
            Err(err) => self.report(&err),
        }
    }

    fn call<R: VerbResponse>(&self, name: &str, data: &[u8]) -> Result<R, FormatterError> {
        let catalog = self.catalog();
        let meta = catalog.lookup(name).ok_or_else(|| unknown(name))?;
        debug!(
            target: SERVICE_TARGET,
            formatter = name,
            verb = %R::VERB,
            bytes = data.len(),
            "running formatter"
        );

        invoke::<R, E>(&self.executor, meta.manifest(), data, self.errors.as_ref()).map_err(
            |reason| FormatterError::Operation {
                name: name.to_owned(),
                verb: operation_label(R::VERB).to_owned(),
                reason: Box::new(reason),
            },
        )
    }

    fn report(&self, err: &FormatterError) {
        warn!(target: SERVICE_TARGET, error = %err, "formatter operation failed");
        self.errors.error(&err.to_string());
    }
}

fn unknown(name: &str) -> FormatterError {
    FormatterError::UnknownFormatter {
        name: name.to_owned(),
    }
}

fn deliver(sink: Option<&dyn CompletionSink>, completion: Completion) {
    if let Some(sink) = sink {
        sink.complete(completion);
    }
}

const fn operation_label(verb: Verb) -> &'static str {
    match verb {
        Verb::Info => "query",
        Verb::Decode => "decode",
        Verb::Encode => "encode",
        Verb::Validate => "validate",
    }
}

#[cfg(test)]
mod tests;
