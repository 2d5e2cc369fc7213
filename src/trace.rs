//! Span lifecycle used around every manipulator operation.
//!
//! Spans go to whatever `tracing` subscriber the application installed;
//! without one every call here is a no-op. Nothing in this module can fail
//! or change the result of the traced operation.

use std::fmt::Display;
use tracing::field::{Empty, display};
use tracing::{Level, Span, event, info_span};

/// An open span for one operation or one object of an operation.
#[derive(Debug)]
pub struct Trace {
    span: Span,
}

impl Trace {
    /// Starts a span named `name`, child of `parent` when one is given.
    pub fn start(parent: Option<&Span>, name: impl Display) -> Self {
        let span = info_span!(
            parent: parent.and_then(|p| p.id()),
            "manipulate",
            otel.name = %name,
            object_id = Empty,
            transaction_id = Empty,
            error = Empty,
            error_kind = Empty,
        );
        Self { span }
    }

    /// Starts a child span of this one.
    pub fn child(&self, name: impl Display) -> Self {
        Self::start(Some(&self.span), name)
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn tag_object(&self, id: &str) {
        self.span.record("object_id", id);
    }

    pub fn tag_transaction(&self, id: impl Display) {
        self.span.record("transaction_id", display(id));
    }

    pub fn finish(self) {}

    pub fn finish_with_error(self, err: &crate::core::ManipError) {
        self.span.record("error", display(err));
        self.span.record("error_kind", err.kind());
        let _enter = self.span.enter();
        event!(Level::ERROR, error = %err, "manipulate operation failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManipError;

    #[test]
    fn test_trace_without_subscriber_is_noop() {
        let root = Trace::start(None, "manipulate.create.tasks");
        let child = root.child("manipulate.create.object.task");
        child.tag_object("abc");
        child.tag_transaction("t-1");
        child.finish_with_error(&ManipError::CannotCommit("boom".into()));
        root.finish();
    }
}
