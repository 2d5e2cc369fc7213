/// Manipulator tests
///
/// End-to-end behavior of the document manipulator over the memory store:
/// staging, commit, abort, retrieval and paging.
/// Run with: cargo test --test manipulator_tests

use manipulate::{
    AttributeSpec, Context, DocumentManipulator, Filter, Identifiable, Identity, ManipError,
    Manipulator, MemoryStore, Model, StoreConfig, TransactionId, TransactionRegistry,
    TransactionalManipulator,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Task {
    #[serde(skip)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    rank: i64,
    #[serde(skip)]
    local_handle: String,
}

impl Model for Task {
    const IDENTITY: Identity = Identity::new("task", "tasks");

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn defaults() -> Vec<AttributeSpec> {
        vec![AttributeSpec::new("status", "todo")]
    }

    fn apply_default(&mut self, name: &str, value: serde_json::Value) -> manipulate::Result<()> {
        if name == "status" {
            self.status = serde_json::from_value(value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Project {
    #[serde(skip)]
    id: String,
    name: String,
}

impl Model for Project {
    const IDENTITY: Identity = Identity::new("project", "projects");

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

fn task(name: &str, rank: i64) -> Task {
    Task {
        name: name.to_string(),
        status: "doing".to_string(),
        rank,
        ..Default::default()
    }
}

fn project(name: &str) -> Project {
    Project {
        name: name.to_string(),
        ..Default::default()
    }
}

async fn setup() -> (MemoryStore, DocumentManipulator) {
    let store = MemoryStore::new();
    let m = DocumentManipulator::connect(StoreConfig::new("test"), &store)
        .await
        .unwrap();
    (store, m)
}

async fn seed_ranks(m: &DocumentManipulator, count: i64) {
    for rank in 0..count {
        let mut t = task(&format!("task-{}", rank), rank);
        m.create(None, &mut [&mut t]).await.unwrap();
    }
}

#[tokio::test]
async fn test_implicit_create_uses_one_short_lived_transaction() {
    let (store, m) = setup().await;

    let mut a = task("a", 1);
    let mut b = task("b", 2);
    m.create(None, &mut [&mut a, &mut b]).await.unwrap();

    assert!(!a.id.is_empty());
    assert!(!b.id.is_empty());
    assert_ne!(a.id, b.id);

    let stats = m.registry().stats().await;
    assert_eq!(stats.registered, 1);
    assert_eq!(stats.unregistered, 1);
    assert_eq!(stats.live, 0);

    assert_eq!(store.documents("test", "tasks").await.len(), 2);
}

#[tokio::test]
async fn test_delete_backports_defaults() {
    let (store, m) = setup().await;

    let mut t = task("a", 1);
    m.create(None, &mut [&mut t]).await.unwrap();

    t.status = String::new();
    m.delete(None, &mut [&mut t]).await.unwrap();

    assert_eq!(t.status, "todo");
    assert!(store.documents("test", "tasks").await.is_empty());
}

#[tokio::test]
async fn test_delete_keeps_non_serialized_fields() {
    let (_store, m) = setup().await;

    let mut t = task("a", 1);
    t.local_handle = "keep-me".into();
    m.create(None, &mut [&mut t]).await.unwrap();

    t.status = String::new();
    m.delete(None, &mut [&mut t]).await.unwrap();

    assert_eq!(t.status, "todo");
    assert_eq!(t.local_handle, "keep-me");
    assert_eq!(t.name, "a");
}

#[tokio::test]
async fn test_commit_unknown_transaction_does_no_io() {
    let (store, m) = setup().await;
    let before = store.operation_count();

    let err = m.commit(&TransactionId::from("ghost")).await.unwrap_err();

    assert!(matches!(err, ManipError::TransactionNotFound(_)));
    assert_eq!(store.operation_count(), before);
}

#[tokio::test]
async fn test_duplicate_key_is_constraint_violation() {
    let (store, m) = setup().await;
    store.ensure_unique_index("tasks", "name").await;
    let ctx = Context::new().managed("dup");

    let mut a = task("same", 1);
    let mut b = task("same", 2);
    m.create(Some(&ctx), &mut [&mut a]).await.unwrap();
    m.create(Some(&ctx), &mut [&mut b]).await.unwrap();

    let err = m.commit(&"dup".into()).await.unwrap_err();
    assert_eq!(err, ManipError::ConstraintViolation("duplicate key.".into()));
    assert!(m.registry().is_empty().await);
}

#[tokio::test]
async fn test_update_of_missing_object_cannot_commit() {
    let (_store, m) = setup().await;

    let mut ghost = task("ghost", 0);
    ghost.id = "missing".into();
    let err = m.update(None, &mut [&mut ghost]).await.unwrap_err();

    assert!(matches!(err, ManipError::CannotCommit(_)));
    assert!(m.registry().is_empty().await);
}

#[tokio::test]
async fn test_update_replaces_stored_document() {
    let (_store, m) = setup().await;

    let mut t = task("before", 1);
    m.create(None, &mut [&mut t]).await.unwrap();

    t.name = "after".into();
    m.update(None, &mut [&mut t]).await.unwrap();

    let mut fetched = Task {
        id: t.id.clone(),
        ..Default::default()
    };
    m.retrieve(None, &mut [&mut fetched]).await.unwrap();
    assert_eq!(fetched.name, "after");
    assert_eq!(fetched.rank, 1);
}

#[tokio::test]
async fn test_failed_batch_keeps_earlier_batches_applied() {
    let (store, m) = setup().await;
    store.ensure_unique_index("projects", "name").await;
    let ctx = Context::new().managed("partial");

    let mut t = task("kept", 1);
    m.create(Some(&ctx), &mut [&mut t]).await.unwrap();

    let mut p1 = project("clash");
    let mut p2 = project("clash");
    m.create(Some(&ctx), &mut [&mut p1, &mut p2]).await.unwrap();

    let err = m.commit(&"partial".into()).await.unwrap_err();
    assert!(matches!(err, ManipError::ConstraintViolation(_)));

    assert_eq!(store.documents("test", "tasks").await.len(), 1);
    assert_eq!(store.documents("test", "projects").await.len(), 1);
}

#[tokio::test]
async fn test_second_commit_finds_nothing() {
    let (store, m) = setup().await;
    let ctx = Context::new().managed("once");

    let mut t = task("a", 1);
    m.create(Some(&ctx), &mut [&mut t]).await.unwrap();

    m.commit(&"once".into()).await.unwrap();
    let err = m.commit(&"once".into()).await.unwrap_err();

    assert!(matches!(err, ManipError::TransactionNotFound(_)));
    assert_eq!(store.documents("test", "tasks").await.len(), 1);
}

#[tokio::test]
async fn test_abort_discards_staged_writes() {
    let (store, m) = setup().await;
    let ctx = Context::new().managed("t-abort");

    let mut t = task("a", 1);
    m.create(Some(&ctx), &mut [&mut t]).await.unwrap();
    m.delete_many(Some(&ctx), Task::IDENTITY).await.unwrap();

    assert!(m.abort(&"t-abort".into()).await);
    assert!(!m.abort(&"t-abort".into()).await);

    let err = m.commit(&"t-abort".into()).await.unwrap_err();
    assert!(matches!(err, ManipError::TransactionNotFound(_)));
    assert!(store.documents("test", "tasks").await.is_empty());
}

#[tokio::test]
async fn test_finalizer_failure_in_auto_commit_persists_nothing() {
    let (store, m) = setup().await;
    let ctx = Context::new().with_finalizer(reject_forbidden);

    let mut ok = task("fine", 1);
    let mut bad = task("forbidden", 2);
    let err = m
        .create(Some(&ctx), &mut [&mut ok, &mut bad])
        .await
        .unwrap_err();

    assert_eq!(err, ManipError::ConstraintViolation("forbidden name".into()));
    assert!(store.documents("test", "tasks").await.is_empty());
    assert!(m.registry().is_empty().await);
}

#[tokio::test]
async fn test_finalizer_failure_in_managed_mode_keeps_earlier_objects() {
    let (store, m) = setup().await;
    let ctx = Context::new()
        .managed("t-final")
        .with_finalizer(reject_forbidden);

    let mut ok = task("fine", 1);
    let mut bad = task("forbidden", 2);
    assert!(
        m.create(Some(&ctx), &mut [&mut ok, &mut bad])
            .await
            .is_err()
    );

    m.commit(&"t-final".into()).await.unwrap();
    let docs = store.documents("test", "tasks").await;
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].get("name"), Some(&json!("fine")));
}

fn reject_forbidden(object: &mut dyn Identifiable) -> manipulate::Result<()> {
    let doc = object.to_document()?;
    if doc.get("name") == Some(&json!("forbidden")) {
        return Err(ManipError::ConstraintViolation("forbidden name".into()));
    }
    Ok(())
}

#[tokio::test]
async fn test_retrieve_many_pages_from_both_ends() {
    let (_store, m) = setup().await;
    seed_ranks(&m, 10).await;

    let ranks = |tasks: &[Task]| tasks.iter().map(|t| t.rank).collect::<Vec<_>>();
    let page = |p: i64| Context::new().with_order(["rank"]).with_page(p, 3);

    let mut tasks: Vec<Task> = Vec::new();

    m.retrieve_many(Some(&page(1)), &mut tasks).await.unwrap();
    assert_eq!(ranks(&tasks), vec![0, 1, 2]);

    m.retrieve_many(Some(&page(-1)), &mut tasks).await.unwrap();
    assert_eq!(ranks(&tasks), vec![7, 8, 9]);

    m.retrieve_many(Some(&page(-4)), &mut tasks).await.unwrap();
    assert_eq!(ranks(&tasks), vec![0]);

    m.retrieve_many(Some(&page(-5)), &mut tasks).await.unwrap();
    assert!(tasks.is_empty());

    m.retrieve_many(Some(&page(5)), &mut tasks).await.unwrap();
    assert!(tasks.is_empty());

    m.retrieve_many(None, &mut tasks).await.unwrap();
    assert_eq!(tasks.len(), 10);
    assert!(tasks.iter().all(|t| !t.id.is_empty()));
}

#[tokio::test]
async fn test_retrieve_many_far_forward_page_is_empty() {
    let (_store, m) = setup().await;
    seed_ranks(&m, 3).await;

    let mut tasks: Vec<Task> = vec![task("stale", 0)];
    let ctx = Context::new().with_page(i64::MAX, 10);
    m.retrieve_many(Some(&ctx), &mut tasks).await.unwrap();
    assert!(tasks.is_empty());
}

#[tokio::test]
async fn test_retrieve_many_filters_and_sorts_descending() {
    let (_store, m) = setup().await;
    seed_ranks(&m, 6).await;

    let ctx = Context::new()
        .with_filter(Filter::key("rank").greater_or_equal_than(3))
        .with_order(["-rank"]);
    let mut tasks: Vec<Task> = Vec::new();
    m.retrieve_many(Some(&ctx), &mut tasks).await.unwrap();

    assert_eq!(
        tasks.iter().map(|t| t.rank).collect::<Vec<_>>(),
        vec![5, 4, 3]
    );
}

#[tokio::test]
async fn test_retrieve_many_backports_defaults() {
    let (_store, m) = setup().await;

    let mut t = task("blank", 1);
    t.status = String::new();
    m.create(None, &mut [&mut t]).await.unwrap();

    let mut tasks: Vec<Task> = Vec::new();
    m.retrieve_many(None, &mut tasks).await.unwrap();
    assert_eq!(tasks[0].status, "todo");
    assert_eq!(tasks[0].id, t.id);
}

#[tokio::test]
async fn test_retrieve_respects_filter() {
    let (_store, m) = setup().await;

    let mut t = task("a", 1);
    m.create(None, &mut [&mut t]).await.unwrap();

    let ctx = Context::new().with_filter(Filter::key("rank").equals(99));
    let mut fetched = Task {
        id: t.id.clone(),
        ..Default::default()
    };
    let err = m.retrieve(Some(&ctx), &mut [&mut fetched]).await.unwrap_err();
    assert!(matches!(err, ManipError::ObjectNotFound(_)));
}

#[tokio::test]
async fn test_delete_many_removes_matching_objects() {
    let (store, m) = setup().await;
    seed_ranks(&m, 5).await;

    let ctx = Context::new().with_filter(Filter::key("rank").lesser_than(2));
    m.delete_many(Some(&ctx), Task::IDENTITY).await.unwrap();

    assert_eq!(store.documents("test", "tasks").await.len(), 3);
    assert_eq!(m.count(None, Task::IDENTITY).await.unwrap(), 3);
}

#[tokio::test]
async fn test_invalid_filter_cannot_build_query() {
    let (_store, m) = setup().await;
    let ctx = Context::new().with_filter(Filter::key("name").matches("(unclosed"));

    let mut tasks: Vec<Task> = Vec::new();
    let err = m.retrieve_many(Some(&ctx), &mut tasks).await.unwrap_err();
    assert!(matches!(err, ManipError::CannotBuildQuery(_)));

    let err = m.delete_many(Some(&ctx), Task::IDENTITY).await.unwrap_err();
    assert!(matches!(err, ManipError::CannotBuildQuery(_)));
    assert!(m.registry().is_empty().await);
}

#[tokio::test]
async fn test_managed_transaction_spans_categories() {
    let (store, m) = setup().await;
    let ctx = Context::new().managed("multi");

    let mut t = task("a", 1);
    let mut p = project("p");
    m.create(Some(&ctx), &mut [&mut t]).await.unwrap();
    m.create(Some(&ctx), &mut [&mut p]).await.unwrap();
    m.increment(Some(&ctx), Task::IDENTITY, "rank", 10)
        .await
        .unwrap();

    let info = m.transaction_info(&"multi".into()).await.unwrap();
    assert_eq!(info.categories, vec!["tasks", "projects"]);
    assert_eq!(info.staged_operations, 3);

    m.commit(&"multi".into()).await.unwrap();
    let docs = store.documents("test", "tasks").await;
    assert_eq!(docs[0].get("rank"), Some(&json!(11)));
    assert_eq!(store.documents("test", "projects").await.len(), 1);
}

#[tokio::test]
async fn test_shared_registry_between_manipulators() {
    let store = MemoryStore::new();
    let registry = Arc::new(TransactionRegistry::new());
    let first =
        DocumentManipulator::connect_with_registry(StoreConfig::new("test"), &store, registry.clone())
            .await
            .unwrap();
    let second =
        DocumentManipulator::connect_with_registry(StoreConfig::new("test"), &store, registry)
            .await
            .unwrap();
    let isolated = DocumentManipulator::connect(StoreConfig::new("test"), &store)
        .await
        .unwrap();

    let ctx = Context::new().managed("handoff");
    let mut t = task("a", 1);
    first.create(Some(&ctx), &mut [&mut t]).await.unwrap();

    assert!(isolated.commit(&"handoff".into()).await.is_err());
    second.commit(&"handoff".into()).await.unwrap();
    assert_eq!(store.documents("test", "tasks").await.len(), 1);
}

#[tokio::test]
async fn test_unreachable_store_is_configuration_error() {
    let store = MemoryStore::new();
    store.set_unreachable(true);

    let err = DocumentManipulator::connect(StoreConfig::new("test"), &store)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ManipError::Configuration(_)));
}

#[tokio::test]
async fn test_operations_use_configured_database() {
    let store = MemoryStore::new();
    let m = DocumentManipulator::connect(StoreConfig::new("other"), &store)
        .await
        .unwrap();
    assert_eq!(m.database_name(), "other");

    let mut t = task("a", 1);
    m.create(None, &mut [&mut t]).await.unwrap();
    assert!(store.documents("test", "tasks").await.is_empty());
    assert_eq!(store.documents("other", "tasks").await.len(), 1);
}

async fn setup_with_credentials() -> (MemoryStore, DocumentManipulator) {
    let store = MemoryStore::with_credentials("admin", "s3cret");
    let config = StoreConfig::new("test").credentials("admin", "s3cret");
    let m = DocumentManipulator::connect(config, &store).await.unwrap();
    (store, m)
}

fn assert_snipped(message: &str) {
    assert!(message.contains("[snip]"), "message: {}", message);
    assert!(!message.contains("s3cret"), "message: {}", message);
}

#[tokio::test]
async fn test_backend_read_failures_cannot_execute_query() {
    let (store, m) = setup_with_credentials().await;
    seed_ranks(&m, 2).await;
    store.set_failure(Some("connection reset by admin:s3cret@db1"));

    let mut one = Task {
        id: "missing".to_string(),
        ..Default::default()
    };
    match m.retrieve(None, &mut [&mut one]).await {
        Err(ManipError::CannotExecuteQuery(message)) => assert_snipped(&message),
        other => panic!("unexpected retrieve outcome: {:?}", other),
    }

    let mut tasks: Vec<Task> = Vec::new();
    match m.retrieve_many(None, &mut tasks).await {
        Err(ManipError::CannotExecuteQuery(message)) => assert_snipped(&message),
        other => panic!("unexpected retrieve_many outcome: {:?}", other),
    }

    match m.count(None, Task::IDENTITY).await {
        Err(ManipError::CannotExecuteQuery(message)) => assert_snipped(&message),
        other => panic!("unexpected count outcome: {:?}", other),
    }

    store.set_failure(None);
    assert_eq!(m.count(None, Task::IDENTITY).await.unwrap(), 2);
}

#[tokio::test]
async fn test_backend_write_failure_cannot_commit() {
    let (store, m) = setup_with_credentials().await;
    store.set_failure(Some("connection reset by admin:s3cret@db1"));

    let mut t = task("a", 1);
    match m.create(None, &mut [&mut t]).await {
        Err(ManipError::CannotCommit(message)) => assert_snipped(&message),
        other => panic!("unexpected create outcome: {:?}", other),
    }
    assert_eq!(m.registry().stats().await.live, 0);

    store.set_failure(None);
    assert!(store.documents("test", "tasks").await.is_empty());
}
