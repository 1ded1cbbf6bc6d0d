//! Span-per-operation wrapper for database calls.
//!
//! Every store call made by a handler runs inside [`in_span`]:
//!
//! ```text
//! start span (kind = Client, pre-execution attributes)
//!     → await operation body
//!     → Ok:  post-execution attributes, status Ok
//!     → Err: exception event, status Error(message), error returned unchanged
//!     → span ended by the OperationSpan guard on every exit path
//! ```
//!
//! The guard ends the span in `Drop`, so a cancelled future or a panicking
//! body still closes it, and it is never ended twice.

use futures::FutureExt;
use opentelemetry::trace::{Span, SpanKind, Status, Tracer};
use opentelemetry::{Context, KeyValue};
use std::borrow::Cow;
use std::error::Error;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::storage::ITEMS_TABLE;

/// Static description of one database operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbOperation {
    /// Span name, e.g. `db.items.list`.
    pub name: &'static str,
    /// SQL verb recorded as `db.operation`.
    pub operation: &'static str,
    /// Table recorded as `db.sql.table`.
    pub table: &'static str,
}

pub const LIST_ITEMS: DbOperation = DbOperation {
    name: "db.items.list",
    operation: "SELECT",
    table: ITEMS_TABLE,
};

pub const CREATE_ITEM: DbOperation = DbOperation {
    name: "db.items.create",
    operation: "INSERT",
    table: ITEMS_TABLE,
};

pub const DELETE_ITEM: DbOperation = DbOperation {
    name: "db.items.delete",
    operation: "DELETE",
    table: ITEMS_TABLE,
};

/// OpenTelemetry context of the current `tracing` span (the HTTP request span
/// when called from a handler), used as the parent of operation spans.
pub fn current_context() -> Context {
    tracing::Span::current().context()
}

/// Scoped owner of one span. Ends the span exactly once, at the latest on drop.
pub struct OperationSpan<S: Span> {
    span: S,
    ended: bool,
}

impl<S: Span> OperationSpan<S> {
    /// Start a client span for `op` with `attributes` attached at creation.
    pub fn start<T>(tracer: &T, op: &DbOperation, attributes: Vec<KeyValue>, parent: &Context) -> Self
    where
        T: Tracer<Span = S>,
    {
        let span = tracer
            .span_builder(op.name)
            .with_kind(SpanKind::Client)
            .with_attributes(attributes)
            .start_with_context(tracer, parent);
        Self { span, ended: false }
    }

    pub fn set_attributes(&mut self, attributes: impl IntoIterator<Item = KeyValue>) {
        self.span.set_attributes(attributes);
    }

    /// Mark the operation successful.
    pub fn succeed(&mut self) {
        self.span.set_status(Status::Ok);
    }

    /// Record `err` as an exception and mark the span failed with its message.
    pub fn fail(&mut self, err: &dyn Error) {
        self.span.record_error(err);
        self.span.set_status(Status::error(err.to_string()));
    }

    /// Mark the span failed with a bare message (no error value available).
    pub fn fail_with_message(&mut self, message: impl Into<Cow<'static, str>>) {
        self.span.set_status(Status::error(message));
    }

    /// End the span now. Later calls and the eventual drop are no-ops.
    pub fn end(&mut self) {
        if !self.ended {
            self.ended = true;
            self.span.end();
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl<S: Span> Drop for OperationSpan<S> {
    fn drop(&mut self) {
        self.end();
    }
}

/// Run `body` inside a span for `op`.
///
/// `attributes` are attached at span creation; `on_success` projects the
/// successful result into post-execution attributes. Errors are returned to
/// the caller unchanged and panics are resumed after the span is marked failed.
pub async fn in_span<T, R, E, Fut, A>(
    tracer: &T,
    op: DbOperation,
    attributes: Vec<KeyValue>,
    parent: Context,
    body: Fut,
    on_success: A,
) -> Result<R, E>
where
    T: Tracer,
    E: Error,
    Fut: Future<Output = Result<R, E>>,
    A: FnOnce(&R) -> Vec<KeyValue>,
{
    let mut span = OperationSpan::start(tracer, &op, attributes, &parent);

    match AssertUnwindSafe(body).catch_unwind().await {
        Ok(Ok(value)) => {
            span.set_attributes(on_success(&value));
            span.succeed();
            Ok(value)
        }
        Ok(Err(err)) => {
            span.fail(&err);
            Err(err)
        }
        Err(panic) => {
            span.fail_with_message(format!("{} panicked", op.name));
            span.end();
            std::panic::resume_unwind(panic)
        }
    }
}
