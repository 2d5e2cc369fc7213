// ============================================================================
// Document Store Manipulator
// ============================================================================
//
// Manipulator over any `SessionFactory` speaking the document query dialect.
//
// Reads run immediately on a copy of the root session. Writes are staged
// into the bulk batch of their category inside a transaction taken from the
// registry; in auto-commit mode that transaction is created and committed
// within the same call.
//
// ============================================================================

use super::{Assignation, Manipulator, TransactionalManipulator, context_or_default};
use crate::connection::{BackendError, FindOptions, Session, SessionFactory, StoreConfig};
use crate::context::{Context, CreateFinalizer, TransactionMode};
use crate::core::{
    ContentIdentifiable, Document, ID_FIELD, Identifiable, Identity, ManipError, Result,
    reset_default_for_zero_values,
};
use crate::filter::{Query, compile_filter};
use crate::pagination::{Window, compute_window, requires_total};
use crate::redact::snip;
use crate::trace::Trace;
use crate::transaction::{
    SharedTransaction, Transaction, TransactionId, TransactionInfo, TransactionRegistry,
};
use async_trait::async_trait;
use serde_json::Value as Json;
use std::sync::Arc;
use tracing::{Level, event};
use uuid::Uuid;

pub struct DocumentManipulator {
    root_session: Box<dyn Session>,
    config: StoreConfig,
    transactions: Arc<TransactionRegistry>,
}

impl DocumentManipulator {
    /// Dials the store described by `config` with a private registry.
    ///
    /// # Errors
    /// `Configuration` when the configuration is invalid or the store cannot
    /// be reached within `connect_timeout`. The password never appears in
    /// the message.
    pub async fn connect(config: StoreConfig, factory: &dyn SessionFactory) -> Result<Self> {
        Self::connect_with_registry(config, factory, Arc::new(TransactionRegistry::new())).await
    }

    /// Like [`connect`](Self::connect), staging into a caller-provided
    /// registry.
    pub async fn connect_with_registry(
        config: StoreConfig,
        factory: &dyn SessionFactory,
        transactions: Arc<TransactionRegistry>,
    ) -> Result<Self> {
        config.validate()?;

        let dialed = tokio::time::timeout(config.connect_timeout, factory.dial(&config)).await;
        let root_session = match dialed {
            Ok(Ok(session)) => session,
            Ok(Err(err)) => {
                let message = snip(&err.to_string(), &config.password);
                event!(
                    Level::ERROR,
                    url = %config.to_url(),
                    error = %message,
                    "Cannot connect to the document store"
                );
                return Err(ManipError::Configuration(format!(
                    "cannot connect to {}: {}",
                    config.to_url(),
                    message
                )));
            }
            Err(_) => {
                event!(
                    Level::ERROR,
                    url = %config.to_url(),
                    timeout = ?config.connect_timeout,
                    "Timed out connecting to the document store"
                );
                return Err(ManipError::Configuration(format!(
                    "cannot connect to {}: no reachable servers after {:?}",
                    config.to_url(),
                    config.connect_timeout
                )));
            }
        };

        event!(
            Level::INFO,
            url = %config.to_url(),
            pool_limit = config.pool_limit,
            "Connected to the document store"
        );

        Ok(Self {
            root_session,
            config,
            transactions,
        })
    }

    pub fn database_name(&self) -> &str {
        &self.config.database
    }

    pub fn endpoints(&self) -> &[String] {
        &self.config.endpoints
    }

    pub fn registry(&self) -> &Arc<TransactionRegistry> {
        &self.transactions
    }

    /// Snapshot of a live transaction, `None` once committed or aborted.
    pub async fn transaction_info(&self, id: &TransactionId) -> Option<TransactionInfo> {
        let shared = self.transactions.transaction_with_id(id).await?;
        let info = shared.lock().await.info();
        Some(info)
    }

    /// The transaction a write call stages into, and whether the call owns
    /// it (auto-commit).
    async fn retrieve_transaction(&self, ctx: &Context) -> (SharedTransaction, TransactionId, bool) {
        let (id, auto_commit) = match &ctx.mode {
            TransactionMode::AutoCommit => (TransactionId::new(), true),
            TransactionMode::Managed(id) => (id.clone(), false),
        };

        let shared = self
            .transactions
            .get_or_register(&id, || {
                Transaction::new(id.clone(), self.root_session.copy(), ctx.parent_span.as_ref())
            })
            .await;

        (shared, id, auto_commit)
    }

    /// Common path of every write: stage under the transaction lock, then
    /// commit right away in auto-commit mode.
    ///
    /// A staging failure discards an auto-commit transaction. A managed one
    /// keeps whatever was staged before the failure.
    async fn stage<F>(&self, ctx: &Context, name: String, staging: F) -> Result<()>
    where
        F: FnOnce(&mut Transaction, &Trace) -> Result<()> + Send,
    {
        let trace = Trace::start(ctx.parent_span.as_ref(), name);
        let (shared, id, auto_commit) = self.retrieve_transaction(ctx).await;
        trace.tag_transaction(&id);

        let staged = {
            let mut transaction = shared.lock().await;
            staging(&mut *transaction, &trace)
        };

        if let Err(err) = staged {
            if auto_commit {
                self.abort(&id).await;
            }
            trace.finish_with_error(&err);
            return Err(err);
        }

        if !auto_commit {
            trace.finish();
            return Ok(());
        }

        settle(trace, self.commit(&id).await)
    }

    fn execution_error(&self, err: &BackendError) -> ManipError {
        ManipError::CannotExecuteQuery(self.snip(err))
    }

    fn snip(&self, err: &BackendError) -> String {
        snip(&err.to_string(), &self.config.password)
    }

    async fn retrieve_objects(
        &self,
        session: &dyn Session,
        trace: &Trace,
        mut query: Query,
        objects: &mut [&mut dyn Identifiable],
    ) -> Result<()> {
        for object in objects.iter_mut() {
            let object: &mut dyn Identifiable = &mut **object;
            let sub = trace.child(format!("manipulate.retrieve.object.{}", object.identity().name));
            sub.tag_object(object.identifier());

            query.insert(ID_FIELD.to_string(), Json::from(object.identifier()));

            let loaded = match session.find_one(object.identity().category, &query).await {
                Ok(doc) => load_into(object, doc),
                Err(BackendError::NotFound) => Err(ManipError::ObjectNotFound(
                    "cannot find the object for the given ID".to_string(),
                )),
                Err(err) => Err(self.execution_error(&err)),
            };
            settle(sub, loaded)?;
        }
        Ok(())
    }

    async fn retrieve_page(
        &self,
        session: &dyn Session,
        ctx: &Context,
        query: &Query,
        dest: &mut dyn ContentIdentifiable,
    ) -> Result<()> {
        let category = dest.content_identity().category;

        let total = if requires_total(ctx.page, ctx.page_size) {
            session
                .count(category, query)
                .await
                .map_err(|err| self.execution_error(&err))?
        } else {
            0
        };

        let options = FindOptions::default().with_order(&ctx.order);
        let options = match compute_window(total, ctx.page, ctx.page_size)? {
            Window::All => options,
            Window::Range { skip, limit } => options.with_window(skip, limit),
            Window::Empty => return Ok(()),
        };

        let documents = session
            .find(category, query, &options)
            .await
            .map_err(|err| self.execution_error(&err))?;

        for mut doc in documents {
            let id = take_identifier(&mut doc);
            dest.push_document(id, doc)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Manipulator for DocumentManipulator {
    async fn retrieve_many(
        &self,
        ctx: Option<&Context>,
        dest: &mut dyn ContentIdentifiable,
    ) -> Result<()> {
        let ctx = context_or_default(ctx);
        let trace = Trace::start(
            ctx.parent_span.as_ref(),
            format!("manipulate.retrieve_many.{}", dest.content_identity().category),
        );

        let query = match compile_filter(ctx.filter.as_ref()) {
            Ok(query) => query,
            Err(err) => return settle(trace, Err(err)),
        };

        dest.clear();
        let mut session = self.root_session.copy();
        let result = self.retrieve_page(session.as_ref(), &ctx, &query, dest).await;
        session.close();

        settle(trace, result)
    }

    async fn retrieve(
        &self,
        ctx: Option<&Context>,
        objects: &mut [&mut dyn Identifiable],
    ) -> Result<()> {
        let Some(first) = objects.first() else {
            return Ok(());
        };
        let ctx = context_or_default(ctx);
        let trace = Trace::start(
            ctx.parent_span.as_ref(),
            format!("manipulate.retrieve.{}", first.identity().category),
        );

        let query = match compile_filter(ctx.filter.as_ref()) {
            Ok(query) => query,
            Err(err) => return settle(trace, Err(err)),
        };

        let mut session = self.root_session.copy();
        let result = self
            .retrieve_objects(session.as_ref(), &trace, query, objects)
            .await;
        session.close();

        settle(trace, result)
    }

    async fn create(
        &self,
        ctx: Option<&Context>,
        objects: &mut [&mut dyn Identifiable],
    ) -> Result<()> {
        let Some(first) = objects.first() else {
            return Ok(());
        };
        let ctx = context_or_default(ctx);
        let name = format!("manipulate.create.{}", first.identity().category);
        let finalizer = ctx.create_finalizer.clone();

        self.stage(&ctx, name, move |transaction, trace| {
            for object in objects.iter_mut() {
                let object: &mut dyn Identifiable = &mut **object;
                object.set_identifier(new_object_id());

                let sub = trace.child(format!("manipulate.create.object.{}", object.identity().name));
                sub.tag_object(object.identifier());

                let staged = stage_insert(transaction, object, finalizer.as_ref());
                settle(sub, staged)?;
            }
            Ok(())
        })
        .await
    }

    async fn update(
        &self,
        ctx: Option<&Context>,
        objects: &mut [&mut dyn Identifiable],
    ) -> Result<()> {
        let Some(first) = objects.first() else {
            return Ok(());
        };
        let ctx = context_or_default(ctx);
        let name = format!("manipulate.update.{}", first.identity().category);

        self.stage(&ctx, name, move |transaction, trace| {
            for object in objects.iter() {
                let sub = trace.child(format!("manipulate.update.object.{}", object.identity().name));
                sub.tag_object(object.identifier());

                let staged = document_for(&**object).and_then(|doc| {
                    transaction
                        .bulk_for_identity(object.identity())?
                        .update(id_selector(object.identifier()), doc);
                    Ok(())
                });
                settle(sub, staged)?;
            }
            Ok(())
        })
        .await
    }

    async fn delete(
        &self,
        ctx: Option<&Context>,
        objects: &mut [&mut dyn Identifiable],
    ) -> Result<()> {
        let Some(first) = objects.first() else {
            return Ok(());
        };
        let ctx = context_or_default(ctx);
        let name = format!("manipulate.delete.{}", first.identity().category);

        self.stage(&ctx, name, move |transaction, trace| {
            for object in objects.iter_mut() {
                let object: &mut dyn Identifiable = &mut **object;
                let sub = trace.child(format!("manipulate.delete.object.{}", object.identity().name));
                sub.tag_object(object.identifier());

                let staged = transaction.bulk_for_identity(object.identity()).and_then(|bulk| {
                    bulk.remove(id_selector(object.identifier()));
                    reset_default_for_zero_values(object)
                });
                settle(sub, staged)?;
            }
            Ok(())
        })
        .await
    }

    async fn delete_many(&self, ctx: Option<&Context>, identity: Identity) -> Result<()> {
        let ctx = context_or_default(ctx);
        let name = format!("manipulate.delete_many.{}", identity.category);
        let filter = ctx.filter.clone();

        self.stage(&ctx, name, move |transaction, _| {
            let selector = compile_filter(filter.as_ref())?;
            transaction.bulk_for_identity(identity)?.remove_all(selector);
            Ok(())
        })
        .await
    }

    async fn count(&self, ctx: Option<&Context>, identity: Identity) -> Result<usize> {
        let ctx = context_or_default(ctx);
        let trace = Trace::start(
            ctx.parent_span.as_ref(),
            format!("manipulate.count.{}", identity.category),
        );

        let query = match compile_filter(ctx.filter.as_ref()) {
            Ok(query) => query,
            Err(err) => return settle(trace, Err(err)),
        };

        let mut session = self.root_session.copy();
        let result = session
            .count(identity.category, &query)
            .await
            .map_err(|err| self.execution_error(&err));
        session.close();

        settle(trace, result)
    }

    async fn assign(&self, _ctx: Option<&Context>, assignation: &Assignation) -> Result<()> {
        Err(ManipError::NotImplemented(format!(
            "assign is not supported by the document store ({})",
            assignation.identity.category
        )))
    }

    async fn increment(
        &self,
        ctx: Option<&Context>,
        identity: Identity,
        counter: &str,
        delta: i64,
    ) -> Result<()> {
        let ctx = context_or_default(ctx);
        let name = format!("manipulate.increment.{}", identity.category);
        let filter = ctx.filter.clone();

        self.stage(&ctx, name, move |transaction, _| {
            if counter.is_empty() || counter.starts_with('$') {
                return Err(ManipError::CannotBuildQuery(format!(
                    "invalid counter name '{}'",
                    counter
                )));
            }
            let selector = compile_filter(filter.as_ref())?;
            transaction
                .bulk_for_identity(identity)?
                .increment_all(selector, counter, delta);
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl TransactionalManipulator for DocumentManipulator {
    async fn commit(&self, id: &TransactionId) -> Result<()> {
        let Some(shared) = self.transactions.unregister_transaction(id).await else {
            event!(
                Level::ERROR,
                transaction_id = %id,
                database = %self.config.database,
                "No batch found for the given transaction."
            );
            return Err(ManipError::TransactionNotFound(format!(
                "no batch found for transaction {}",
                id
            )));
        };

        let mut transaction = shared.lock().await;
        let trace = Trace::start(Some(transaction.root_span()), "manipulate.commit");
        trace.tag_transaction(id);

        let outcome = transaction.run().await;
        transaction.close_session();

        let result = outcome.map_err(|err| {
            if err.is_dup() {
                ManipError::ConstraintViolation("duplicate key.".to_string())
            } else {
                ManipError::CannotCommit(self.snip(&err))
            }
        });
        settle(trace, result)
    }

    async fn abort(&self, id: &TransactionId) -> bool {
        let Some(shared) = self.transactions.unregister_transaction(id).await else {
            return false;
        };

        let mut transaction = shared.lock().await;
        transaction.abort();
        transaction.close_session();
        event!(Level::DEBUG, transaction_id = %id, "Transaction aborted");
        true
    }
}

/// Closes `trace` according to `result` and passes the result through.
fn settle<T>(trace: Trace, result: Result<T>) -> Result<T> {
    match &result {
        Ok(_) => trace.finish(),
        Err(err) => trace.finish_with_error(err),
    }
    result
}

fn stage_insert(
    transaction: &mut Transaction,
    object: &mut dyn Identifiable,
    finalizer: Option<&CreateFinalizer>,
) -> Result<()> {
    if let Some(finalizer) = finalizer {
        finalizer(&mut *object)?;
    }
    let doc = document_for(object)?;
    transaction.bulk_for_identity(object.identity())?.insert(doc);
    Ok(())
}

fn new_object_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn id_selector(id: &str) -> Query {
    let mut selector = Query::new();
    selector.insert(ID_FIELD.to_string(), Json::from(id));
    selector
}

/// The stored form of an object: its document plus `_id`.
fn document_for(object: &dyn Identifiable) -> Result<Document> {
    let mut doc = object.to_document()?;
    doc.insert(ID_FIELD.to_string(), Json::from(object.identifier()));
    Ok(doc)
}

/// Removes `_id` from a stored document and returns it as a string.
fn take_identifier(doc: &mut Document) -> String {
    match doc.remove(ID_FIELD) {
        Some(Json::String(id)) => id,
        Some(Json::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn load_into(object: &mut dyn Identifiable, mut doc: Document) -> Result<()> {
    let id = take_identifier(&mut doc);
    object.load_document(doc)?;
    if !id.is_empty() {
        object.set_identifier(id);
    }
    reset_default_for_zero_values(object)
}
