// ============================================================================
// Manipulator Contract
// ============================================================================
//
// One capability set shared by every storage backend. Application code
// holds a `dyn Manipulator` (or `dyn TransactionalManipulator`) and never
// learns which store sits behind it.
//
// ============================================================================

pub mod document;

pub use document::DocumentManipulator;

use crate::context::Context;
use crate::core::{ContentIdentifiable, Identifiable, Identity, Result};
use crate::transaction::TransactionId;
use async_trait::async_trait;
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignationMode {
    Set,
    Add,
    Remove,
}

/// Relationship change between one parent and a set of children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignation {
    pub identity: Identity,
    pub parent_id: String,
    pub ids: Vec<String>,
    pub mode: AssignationMode,
}

#[async_trait]
pub trait Manipulator: Send + Sync {
    /// Fills `dest` with every object of its category matching the
    /// context's filter and page.
    async fn retrieve_many(
        &self,
        ctx: Option<&Context>,
        dest: &mut dyn ContentIdentifiable,
    ) -> Result<()>;

    /// Reloads each object by identifier.
    async fn retrieve(
        &self,
        ctx: Option<&Context>,
        objects: &mut [&mut dyn Identifiable],
    ) -> Result<()>;

    /// Assigns fresh identifiers and stages an insert per object.
    async fn create(
        &self,
        ctx: Option<&Context>,
        objects: &mut [&mut dyn Identifiable],
    ) -> Result<()>;

    async fn update(
        &self,
        ctx: Option<&Context>,
        objects: &mut [&mut dyn Identifiable],
    ) -> Result<()>;

    async fn delete(
        &self,
        ctx: Option<&Context>,
        objects: &mut [&mut dyn Identifiable],
    ) -> Result<()>;

    /// Removes every object of `identity` matching the context's filter.
    async fn delete_many(&self, ctx: Option<&Context>, identity: Identity) -> Result<()>;

    async fn count(&self, ctx: Option<&Context>, identity: Identity) -> Result<usize>;

    async fn assign(&self, ctx: Option<&Context>, assignation: &Assignation) -> Result<()>;

    /// Adds `delta` to `counter` on every object matching the context's filter.
    async fn increment(
        &self,
        ctx: Option<&Context>,
        identity: Identity,
        counter: &str,
        delta: i64,
    ) -> Result<()>;
}

/// A manipulator whose writes can be grouped into managed transactions.
#[async_trait]
pub trait TransactionalManipulator: Manipulator {
    /// Executes every operation staged under `id`.
    async fn commit(&self, id: &TransactionId) -> Result<()>;

    /// Discards every operation staged under `id`. False when `id` is unknown.
    async fn abort(&self, id: &TransactionId) -> bool;
}

/// Context used when a caller passes none.
pub(crate) fn context_or_default(ctx: Option<&Context>) -> Cow<'_, Context> {
    match ctx {
        Some(ctx) => Cow::Borrowed(ctx),
        None => Cow::Owned(Context::default()),
    }
}
