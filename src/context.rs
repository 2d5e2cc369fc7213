use crate::core::{Identifiable, Result};
use crate::filter::Filter;
use crate::transaction::TransactionId;
use std::fmt;
use std::sync::Arc;
use tracing::Span;

/// Callback run on every object right before it is staged for insertion.
/// An error aborts the create call and is returned as is.
pub type CreateFinalizer = Arc<dyn Fn(&mut dyn Identifiable) -> Result<()> + Send + Sync>;

/// How a write call relates to transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TransactionMode {
    /// A fresh transaction is created and committed within the call.
    #[default]
    AutoCommit,
    /// Stage into the transaction with this id, created on first use. The
    /// caller must eventually commit or abort it.
    Managed(TransactionId),
}

/// Per-call parameters of a manipulator operation.
#[derive(Clone, Default)]
pub struct Context {
    pub filter: Option<Filter>,
    pub page: i64,
    pub page_size: i64,
    /// Sort fields, `-field` for descending.
    pub order: Vec<String>,
    pub mode: TransactionMode,
    pub create_finalizer: Option<CreateFinalizer>,
    pub parent_span: Option<Span>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_page(mut self, page: i64, page_size: i64) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    pub fn with_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order = order.into_iter().map(Into::into).collect();
        self
    }

    pub fn managed(mut self, id: impl Into<TransactionId>) -> Self {
        self.mode = TransactionMode::Managed(id.into());
        self
    }

    pub fn with_finalizer<F>(mut self, finalizer: F) -> Self
    where
        F: Fn(&mut dyn Identifiable) -> Result<()> + Send + Sync + 'static,
    {
        self.create_finalizer = Some(Arc::new(finalizer));
        self
    }

    pub fn with_parent_span(mut self, span: Span) -> Self {
        self.parent_span = Some(span);
        self
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("filter", &self.filter)
            .field("page", &self.page)
            .field("page_size", &self.page_size)
            .field("order", &self.order)
            .field("mode", &self.mode)
            .field("create_finalizer", &self.create_finalizer.is_some())
            .finish()
    }
}
