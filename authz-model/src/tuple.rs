//! Tuple store interface and an in-memory reference implementation.
//!
//! A small object-safe trait: `read` returns a boxed stream rather than a
//! boxed future of a collected `Vec`, so a store backed by a paginated or
//! cursor-driven source can yield tuples as they arrive instead of
//! buffering an entire scan before the engine sees the first row.

use crate::error::AuthzError;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

/// A durable authorization fact: `user` has `relation` to `object`.
///
/// `user` is either a literal `identity:<url>` or a userset
/// `group:<name>#member`. `object` is always `<type>:<url>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tuple {
    pub user: String,
    pub relation: String,
    pub object: String,
}

impl Tuple {
    pub fn new(user: impl Into<String>, relation: impl Into<String>, object: impl Into<String>) -> Self {
        Self { user: user.into(), relation: relation.into(), object: object.into() }
    }
}

/// Optional filter for [`TupleStore::read`]. `None` fields are wildcards.
#[derive(Debug, Clone, Default)]
pub struct TupleFilter {
    pub user: Option<String>,
    pub relation: Option<String>,
    pub object: Option<String>,
}

impl TupleFilter {
    pub fn matches(&self, t: &Tuple) -> bool {
        self.user.as_deref().map_or(true, |u| u == t.user)
            && self.relation.as_deref().map_or(true, |r| r == t.relation)
            && self.object.as_deref().map_or(true, |o| o == t.object)
    }
}

/// A conflict raised by [`TupleStore::write`], kept out of
/// [`AuthzError`] since it's a store-internal write signal, not part of
/// the driver-visible error taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    Conflict(String),
    Store(AuthzError),
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteError::Conflict(msg) => write!(f, "tuple write conflict: {msg}"),
            WriteError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for WriteError {}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Durable storage of `{user, relation, object}` triples.
///
/// Only `read`/`write`/`write_authorization_model` are required: this
/// is the narrow surface the relationship engine needs; the embedding
/// daemon owns the actual schema and persistence.
pub trait TupleStore: Send + Sync + 'static {
    /// Stream every stored tuple matching `filter`. Items are fallible so
    /// a store whose scan can fail mid-stream (a paginated backend
    /// hitting a transient error between pages) can surface it per item
    /// rather than only at the start.
    fn read(&self, filter: TupleFilter) -> BoxStream<'_, Result<Tuple, AuthzError>>;

    /// Atomically add and remove tuples.
    fn write(
        &self,
        adds: Vec<Tuple>,
        deletes: Vec<Tuple>,
    ) -> BoxFuture<'_, Result<(), WriteError>>;

    /// Persist the static authorization model under `store_id` (called
    /// once by the registry's `load` when bootstrapping a driver).
    fn write_authorization_model(
        &self,
        store_id: &str,
        schema_version: &str,
    ) -> BoxFuture<'_, Result<(), AuthzError>>;
}

/// In-memory [`TupleStore`], the default backing store for tests and
/// for daemons that haven't wired a persistent one yet.
#[derive(Default)]
pub struct InMemoryTupleStore {
    tuples: Mutex<Vec<Tuple>>,
    model_store_id: Mutex<Option<(String, String)>>,
}

impl InMemoryTupleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous convenience constructor for tests that want tuples
    /// present before the store is ever awaited.
    pub fn seeded(tuples: impl IntoIterator<Item = Tuple>) -> Self {
        Self { tuples: Mutex::new(tuples.into_iter().collect()), model_store_id: Mutex::new(None) }
    }

    pub fn add_tuple(&self, user: &str, relation: &str, object: &str) {
        self.tuples.lock().unwrap().push(Tuple::new(user, relation, object));
    }
}

impl TupleStore for InMemoryTupleStore {
    fn read(&self, filter: TupleFilter) -> BoxStream<'_, Result<Tuple, AuthzError>> {
        let tuples = self.tuples.lock().unwrap();
        let matched: Vec<Result<Tuple, AuthzError>> =
            tuples.iter().filter(|t| filter.matches(t)).cloned().map(Ok).collect();
        Box::pin(tokio_stream::iter(matched))
    }

    fn write(&self, adds: Vec<Tuple>, deletes: Vec<Tuple>) -> BoxFuture<'_, Result<(), WriteError>> {
        Box::pin(async move {
            let mut tuples = self.tuples.lock().unwrap();
            for d in &deletes {
                tuples.retain(|t| t != d);
            }
            for a in adds {
                if !tuples.contains(&a) {
                    tuples.push(a);
                }
            }
            Ok(())
        })
    }

    fn write_authorization_model(
        &self,
        store_id: &str,
        schema_version: &str,
    ) -> BoxFuture<'_, Result<(), AuthzError>> {
        let store_id = store_id.to_string();
        let schema_version = schema_version.to_string();
        Box::pin(async move {
            *self.model_store_id.lock().unwrap() = Some((store_id, schema_version));
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    async fn collect(store: &InMemoryTupleStore, filter: TupleFilter) -> Vec<Tuple> {
        store.read(filter).collect::<Vec<_>>().await.into_iter().collect::<Result<Vec<_>, _>>().unwrap()
    }

    #[tokio::test]
    async fn read_filters_by_each_field_independently() {
        let store = InMemoryTupleStore::seeded([
            Tuple::new("identity:/1.0/a", "can_view", "instance:/1.0/instances/c1"),
            Tuple::new("identity:/1.0/b", "can_view", "instance:/1.0/instances/c2"),
        ]);

        let by_user = collect(&store, TupleFilter { user: Some("identity:/1.0/a".into()), ..Default::default() }).await;
        assert_eq!(by_user.len(), 1);

        let by_object =
            collect(&store, TupleFilter { object: Some("instance:/1.0/instances/c2".into()), ..Default::default() }).await;
        assert_eq!(by_object.len(), 1);
    }

    #[tokio::test]
    async fn write_adds_and_deletes_without_duplicates() {
        let store = InMemoryTupleStore::new();
        let t = Tuple::new("identity:/1.0/a", "can_view", "instance:/1.0/instances/c1");
        store.write(vec![t.clone(), t.clone()], vec![]).await.unwrap();

        let all = collect(&store, TupleFilter::default()).await;
        assert_eq!(all.len(), 1);

        store.write(vec![], vec![t]).await.unwrap();
        let all = collect(&store, TupleFilter::default()).await;
        assert!(all.is_empty());
    }
}
