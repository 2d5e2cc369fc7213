// ============================================================================
// Manipulate Library
// ============================================================================
//
// Storage abstraction layer: application objects go in and out of a store
// through one `Manipulator` contract, writes are staged per category into
// transactions, filters compile into the backend's native query and pages
// can be counted from either end of a result set.
//
// ============================================================================

pub mod connection;
pub mod context;
pub mod core;
pub mod filter;
pub mod manipulator;
pub mod pagination;
pub mod redact;
pub mod storage;
pub mod trace;
pub mod transaction;

// Re-export main types for convenience
pub use connection::{BackendError, Session, SessionFactory, StoreConfig};
pub use context::{Context, CreateFinalizer, TransactionMode};
pub use crate::core::{
    AttributeSpec, ContentIdentifiable, Document, Identifiable, Identity, ManipError, Model,
    Result, Value,
};
pub use filter::{Comparator, Filter};
pub use manipulator::{
    Assignation, AssignationMode, DocumentManipulator, Manipulator, TransactionalManipulator,
};
pub use storage::MemoryStore;
pub use transaction::{TransactionId, TransactionRegistry};

/// Dials `config` through `factory`, ready to serve every operation.
///
/// # Examples
///
/// ```
/// use manipulate::{Context, Filter, Identity, Manipulator, MemoryStore, Model, StoreConfig};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Default, Serialize, Deserialize)]
/// struct Task {
///     #[serde(skip)]
///     id: String,
///     name: String,
/// }
///
/// impl Model for Task {
///     const IDENTITY: Identity = Identity::new("task", "tasks");
///     fn id(&self) -> &str { &self.id }
///     fn set_id(&mut self, id: String) { self.id = id; }
/// }
///
/// # fn main() -> manipulate::Result<()> {
/// # tokio_test::block_on(async {
/// let store = MemoryStore::new();
/// let m = manipulate::connect(StoreConfig::new("app"), &store).await?;
///
/// let mut task = Task { name: "write docs".into(), ..Default::default() };
/// m.create(None, &mut [&mut task]).await?;
///
/// let ctx = Context::new().with_filter(Filter::key("name").equals("write docs"));
/// assert_eq!(m.count(Some(&ctx), Task::IDENTITY).await?, 1);
/// # Ok(())
/// # })
/// # }
/// ```
pub async fn connect(
    config: StoreConfig,
    factory: &dyn SessionFactory,
) -> Result<DocumentManipulator> {
    DocumentManipulator::connect(config, factory).await
}
