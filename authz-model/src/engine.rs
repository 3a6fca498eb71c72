//! Relationship engine: evaluates `check` and `list_objects` against a
//! [`Model`] and a [`TupleStore`].
//!
//! A struct wrapping a backing store behind an `Arc`, exposing async
//! methods that return the crate's own error type, evaluating relation
//! rewrites locally against `Model` instead of delegating to a remote
//! service.

use crate::error::AuthzError;
use crate::model::{Model, RelationDef};
use crate::tuple::{Tuple, TupleFilter, TupleStore};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A `(user, relation, object)` triple visited during one evaluation, used
/// to break cycles in user-authored tuple data. A tuple cycle must fail
/// closed, not loop forever.
type Visited = HashSet<(String, String, String)>;

/// Serializes store reads within one top-level `check`/`list_objects`
/// call. Built fresh per call and threaded down through the recursive
/// evaluation, never stored on the engine, so concurrent independent
/// calls against a shared engine never wait on each other's reads.
type ReadGate = AsyncMutex<()>;

/// Extra tuples supplied only for the duration of one call, layered over
/// the backing store without being persisted. Used by callers that want
/// to check a hypothetical grant before writing it.
#[derive(Debug, Clone, Default)]
pub struct ContextualTuples {
    pub tuples: Vec<Tuple>,
}

impl ContextualTuples {
    pub fn new(tuples: Vec<Tuple>) -> Self {
        Self { tuples }
    }

    fn matching(&self, filter: &TupleFilter) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter().filter(move |t| filter.matches(t))
    }
}

/// Evaluates authorization decisions against a [`Model`] and a backing
/// [`TupleStore`].
pub struct RelationshipEngine<S: TupleStore> {
    store: Arc<S>,
    model: Arc<Model>,
    timeout: Duration,
}

impl<S: TupleStore> RelationshipEngine<S> {
    pub fn new(store: Arc<S>, model: Arc<Model>) -> Self {
        Self { store, model, timeout: DEFAULT_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn read(&self, filter: TupleFilter, gate: &ReadGate) -> Result<Vec<Tuple>, AuthzError> {
        let _permit = gate.lock().await;
        self.store.read(filter).collect::<Vec<_>>().await.into_iter().collect()
    }

    /// Does `user` satisfy `relation` on `object`? `cancel` aborts the
    /// evaluation early, racing it against the same future as the
    /// timeout.
    #[instrument(skip(self, contextual, cancel), fields(user = %user, relation = %relation, object = %object))]
    pub async fn check(
        &self,
        user: &str,
        relation: &str,
        object: &str,
        contextual: &ContextualTuples,
        cancel: &CancellationToken,
    ) -> Result<bool, AuthzError> {
        let gate = ReadGate::new(());
        let fut = self.check_inner(user, relation, object, contextual, &mut HashSet::new(), &gate);
        tokio::select! {
            result = tokio::time::timeout(self.timeout, fut) => match result {
                Ok(result) => result,
                Err(_) => {
                    warn!("authorization check timed out");
                    Err(AuthzError::Internal("check timed out".to_string()))
                }
            },
            () = cancel.cancelled() => {
                debug!("authorization check cancelled");
                Err(AuthzError::Internal("check cancelled".to_string()))
            }
        }
    }

    fn check_inner<'a>(
        &'a self,
        user: &'a str,
        relation: &'a str,
        object: &'a str,
        contextual: &'a ContextualTuples,
        visited: &'a mut Visited,
        gate: &'a ReadGate,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<bool, AuthzError>> + Send + 'a>> {
        Box::pin(async move {
            let key = (user.to_string(), relation.to_string(), object.to_string());
            if !visited.insert(key) {
                debug!("cycle detected, failing closed");
                return Ok(false);
            }

            let entity_type = object.split(':').next().unwrap_or_default();
            let Some(def) = self.model.relation(entity_type, relation) else {
                return Ok(false);
            };
            self.eval(user, relation, object, def, contextual, visited, gate).await
        })
    }

    fn eval<'a>(
        &'a self,
        user: &'a str,
        relation: &'a str,
        object: &'a str,
        def: &'a RelationDef,
        contextual: &'a ContextualTuples,
        visited: &'a mut Visited,
        gate: &'a ReadGate,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<bool, AuthzError>> + Send + 'a>> {
        Box::pin(async move {
            match def {
                RelationDef::This => self.has_direct_grant(user, relation, object, contextual, gate).await,
                RelationDef::ComputedUserset(rel) => self.check_inner(user, rel, object, contextual, visited, gate).await,
                RelationDef::TupleToUserset { parent_relation, parent_type, child_relation } => {
                    self.eval_tuple_to_userset(user, object, parent_relation, parent_type, child_relation, contextual, visited, gate)
                        .await
                }
                RelationDef::Union(defs) => {
                    for d in defs {
                        if self.eval(user, relation, object, d, contextual, visited, gate).await? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                RelationDef::Intersection(defs) => {
                    for d in defs {
                        if !self.eval(user, relation, object, d, contextual, visited, gate).await? {
                            return Ok(false);
                        }
                    }
                    Ok(!defs.is_empty())
                }
                RelationDef::Difference { base, subtract } => {
                    let in_base = self.eval(user, relation, object, base, contextual, visited, gate).await?;
                    if !in_base {
                        return Ok(false);
                    }
                    Ok(!self.eval(user, relation, object, subtract, contextual, visited, gate).await?)
                }
            }
        })
    }

    /// A direct `(user, relation, object)` tuple match, or membership in a
    /// `<group-object>#member` userset that itself holds a direct tuple
    /// for `relation` on `object`.
    async fn has_direct_grant(
        &self,
        user: &str,
        relation: &str,
        object: &str,
        contextual: &ContextualTuples,
        gate: &ReadGate,
    ) -> Result<bool, AuthzError> {
        let filter = TupleFilter { relation: Some(relation.to_string()), user: None, object: Some(object.to_string()) };
        let mut candidates = self.read(filter.clone(), gate).await?;
        candidates.extend(contextual.matching(&filter).cloned());

        for t in &candidates {
            if t.user == user {
                return Ok(true);
            }
            if let Some(group_key) = t.user.strip_suffix("#member") {
                let member_filter = TupleFilter {
                    user: Some(user.to_string()),
                    relation: Some("member".to_string()),
                    object: Some(group_key.to_string()),
                };
                let mut members = self.read(member_filter.clone(), gate).await?;
                members.extend(contextual.matching(&member_filter).cloned());
                if members.iter().any(|m| m.user == user) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    #[allow(clippy::too_many_arguments)]
    async fn eval_tuple_to_userset(
        &self,
        user: &str,
        object: &str,
        parent_relation: &str,
        parent_type: &str,
        child_relation: &str,
        contextual: &ContextualTuples,
        visited: &mut Visited,
        gate: &ReadGate,
    ) -> Result<bool, AuthzError> {
        let filter = TupleFilter { relation: Some(parent_relation.to_string()), user: None, object: Some(object.to_string()) };
        let mut edges = self.read(filter.clone(), gate).await?;
        edges.extend(contextual.matching(&filter).cloned());

        for edge in edges {
            if !edge.user.starts_with(&format!("{parent_type}:")) {
                continue;
            }
            if self.check_inner(user, child_relation, &edge.user, contextual, visited, gate).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// All objects of `entity_type` on which `user` satisfies `relation`.
    ///
    /// Gathers candidates from direct tuples, group membership, and
    /// tuple-to-userset containment edges, then verifies each with
    /// `check`, guaranteeing the result set is exactly what `check`
    /// would accept, never a superset produced by a cheaper shortcut.
    /// `cancel` is checked between candidate batches and before each
    /// per-candidate `check`, in addition to gating the whole call's
    /// overall timeout.
    #[instrument(skip(self, contextual, cancel), fields(user = %user, relation = %relation, entity_type = %entity_type))]
    pub async fn list_objects(
        &self,
        user: &str,
        relation: &str,
        entity_type: &str,
        contextual: &ContextualTuples,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, AuthzError> {
        let gate = ReadGate::new(());
        let fut = self.list_objects_inner(user, relation, entity_type, contextual, &gate, cancel);
        tokio::select! {
            result = tokio::time::timeout(self.timeout, fut) => match result {
                Ok(result) => result,
                Err(_) => {
                    warn!("list_objects timed out");
                    Err(AuthzError::Internal("list_objects timed out".to_string()))
                }
            },
            () = cancel.cancelled() => {
                debug!("list_objects cancelled");
                Err(AuthzError::Internal("list_objects cancelled".to_string()))
            }
        }
    }

    async fn list_objects_inner(
        &self,
        user: &str,
        relation: &str,
        entity_type: &str,
        contextual: &ContextualTuples,
        gate: &ReadGate,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, AuthzError> {
        let mut candidates: HashSet<String> = HashSet::new();

        let prefix = format!("{entity_type}:");
        let direct_filter = TupleFilter { user: Some(user.to_string()), relation: None, object: None };
        let mut direct = self.read(direct_filter.clone(), gate).await?;
        direct.extend(contextual.matching(&direct_filter).cloned());
        candidates.extend(direct.into_iter().filter(|t| t.object.starts_with(&prefix)).map(|t| t.object));

        let group_filter = TupleFilter { user: Some(user.to_string()), relation: Some("member".to_string()), object: None };
        let mut groups = self.read(group_filter.clone(), gate).await?;
        groups.extend(contextual.matching(&group_filter).cloned());
        for g in groups {
            let userset = format!("{}#member", g.object);
            let via_group_filter = TupleFilter { user: Some(userset), relation: None, object: None };
            let mut via_group = self.read(via_group_filter.clone(), gate).await?;
            via_group.extend(contextual.matching(&via_group_filter).cloned());
            candidates.extend(via_group.into_iter().filter(|t| t.object.starts_with(&prefix)).map(|t| t.object));
        }

        // Containment: anything reachable by walking every relation's
        // tuple-to-userset edges for this type, recursively.
        if let Some(type_def) = self.model.types.get(entity_type) {
            for def in type_def.relations.values() {
                self.collect_containment_candidates(def, user, entity_type, contextual, gate, cancel, &mut candidates).await?;
            }
        }

        let mut results = Vec::new();
        for object in candidates {
            if cancel.is_cancelled() {
                debug!("list_objects cancelled");
                return Err(AuthzError::Internal("list_objects cancelled".to_string()));
            }
            if self.check(user, relation, &object, contextual, cancel).await? {
                results.push(object);
            }
        }
        results.sort();
        Ok(results)
    }

    #[allow(clippy::too_many_arguments)]
    fn collect_containment_candidates<'a>(
        &'a self,
        def: &'a RelationDef,
        user: &'a str,
        entity_type: &'a str,
        contextual: &'a ContextualTuples,
        gate: &'a ReadGate,
        cancel: &'a CancellationToken,
        candidates: &'a mut HashSet<String>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), AuthzError>> + Send + 'a>> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(AuthzError::Internal("list_objects cancelled".to_string()));
            }
            match def {
                RelationDef::TupleToUserset { parent_relation, parent_type, child_relation } => {
                    let parents = self.list_objects_inner(user, child_relation, parent_type, contextual, gate, cancel).await?;
                    for parent in parents {
                        let filter = TupleFilter {
                            user: Some(parent),
                            relation: Some(parent_relation.to_string()),
                            object: None,
                        };
                        let mut edges = self.read(filter.clone(), gate).await?;
                        edges.extend(contextual.matching(&filter).cloned());
                        let prefix = format!("{entity_type}:");
                        candidates.extend(edges.into_iter().map(|t| t.object).filter(|o| o.starts_with(&prefix)));
                    }
                }
                RelationDef::Union(defs) | RelationDef::Intersection(defs) => {
                    for d in defs {
                        self.collect_containment_candidates(d, user, entity_type, contextual, gate, cancel, candidates).await?;
                    }
                }
                RelationDef::Difference { base, subtract } => {
                    self.collect_containment_candidates(base, user, entity_type, contextual, gate, cancel, candidates).await?;
                    self.collect_containment_candidates(subtract, user, entity_type, contextual, gate, cancel, candidates).await?;
                }
                RelationDef::This | RelationDef::ComputedUserset(_) => {}
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::InMemoryTupleStore;

    fn engine(store: InMemoryTupleStore) -> RelationshipEngine<InMemoryTupleStore> {
        RelationshipEngine::new(Arc::new(store), Arc::new(Model::standard()))
    }

    #[tokio::test]
    async fn direct_grant_passes_check() {
        let store = InMemoryTupleStore::seeded([Tuple::new(
            "identity:/1.0/auth/identities/alice",
            "admin",
            "server:/1.0",
        )]);
        let eng = engine(store);
        let ok = eng
            .check(
                "identity:/1.0/auth/identities/alice",
                "can_view",
                "server:/1.0",
                &ContextualTuples::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn unrelated_user_fails_check() {
        let store = InMemoryTupleStore::seeded([Tuple::new(
            "identity:/1.0/auth/identities/alice",
            "admin",
            "server:/1.0",
        )]);
        let eng = engine(store);
        let ok = eng
            .check(
                "identity:/1.0/auth/identities/bob",
                "can_view",
                "server:/1.0",
                &ContextualTuples::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn group_membership_grants_via_userset() {
        let store = InMemoryTupleStore::seeded([
            Tuple::new("identity:/1.0/auth/identities/alice", "member", "auth_group:/1.0/auth/groups/devs"),
            Tuple::new("auth_group:/1.0/auth/groups/devs#member", "operator", "project:/1.0/projects/default"),
        ]);
        let eng = engine(store);
        let ok = eng
            .check(
                "identity:/1.0/auth/identities/alice",
                "can_edit",
                "project:/1.0/projects/default",
                &ContextualTuples::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn server_admin_implies_project_admin_via_containment() {
        let store = InMemoryTupleStore::seeded([Tuple::new(
            "identity:/1.0/auth/identities/alice",
            "admin",
            "server:/1.0",
        )]);
        let eng = engine(store);
        let ok = eng
            .check(
                "identity:/1.0/auth/identities/alice",
                "can_view",
                "project:/1.0/projects/default",
                &ContextualTuples::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn project_operator_can_exec_on_contained_instance() {
        let store = InMemoryTupleStore::seeded([
            Tuple::new("identity:/1.0/auth/identities/alice", "operator", "project:/1.0/projects/default"),
            Tuple::new(
                "project:/1.0/projects/default",
                "project",
                "instance:/1.0/instances/vm1?project=default",
            ),
        ]);
        let eng = engine(store);
        let ok = eng
            .check(
                "identity:/1.0/auth/identities/alice",
                "can_exec",
                "instance:/1.0/instances/vm1?project=default",
                &ContextualTuples::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn contextual_tuples_are_considered_without_being_persisted() {
        let store = InMemoryTupleStore::new();
        let eng = engine(store);
        let contextual = ContextualTuples::new(vec![Tuple::new(
            "identity:/1.0/auth/identities/alice",
            "admin",
            "server:/1.0",
        )]);
        assert!(eng
            .check(
                "identity:/1.0/auth/identities/alice",
                "can_view",
                "server:/1.0",
                &contextual,
                &CancellationToken::new(),
            )
            .await
            .unwrap());

        let persisted: Vec<_> = eng.store.read(TupleFilter::default()).collect::<Vec<_>>().await;
        assert!(persisted.is_empty());
    }

    #[tokio::test]
    async fn list_objects_returns_exactly_what_check_would_accept() {
        let store = InMemoryTupleStore::seeded([
            Tuple::new("identity:/1.0/auth/identities/alice", "admin", "project:/1.0/projects/p1"),
            Tuple::new("identity:/1.0/auth/identities/alice", "viewer", "project:/1.0/projects/p2"),
            Tuple::new("identity:/1.0/auth/identities/bob", "admin", "project:/1.0/projects/p3"),
        ]);
        let eng = engine(store);
        let mut objs = eng
            .list_objects(
                "identity:/1.0/auth/identities/alice",
                "can_view",
                "project",
                &ContextualTuples::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        objs.sort();
        assert_eq!(objs, vec!["project:/1.0/projects/p1".to_string(), "project:/1.0/projects/p2".to_string()]);
    }

    #[tokio::test]
    async fn cyclic_tuples_fail_closed_instead_of_hanging() {
        let store = InMemoryTupleStore::seeded([
            Tuple::new("project:/1.0/projects/a#member", "operator", "project:/1.0/projects/b"),
            Tuple::new("project:/1.0/projects/b#member", "operator", "project:/1.0/projects/a"),
        ]);
        let eng = engine(store);
        let ok = eng
            .check(
                "identity:/1.0/auth/identities/alice",
                "can_view",
                "project:/1.0/projects/a",
                &ContextualTuples::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn cancelled_token_aborts_check_before_it_completes() {
        let store = InMemoryTupleStore::seeded([Tuple::new(
            "identity:/1.0/auth/identities/alice",
            "admin",
            "server:/1.0",
        )]);
        let eng = engine(store);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = eng
            .check(
                "identity:/1.0/auth/identities/alice",
                "can_view",
                "server:/1.0",
                &ContextualTuples::default(),
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::Internal(_)));
    }

    #[tokio::test]
    async fn concurrent_checks_on_a_shared_engine_do_not_block_each_other() {
        let store = InMemoryTupleStore::seeded([
            Tuple::new("identity:/1.0/auth/identities/alice", "admin", "server:/1.0"),
            Tuple::new("identity:/1.0/auth/identities/bob", "admin", "server:/1.0"),
        ]);
        let eng = Arc::new(engine(store));

        let a = {
            let eng = eng.clone();
            tokio::spawn(async move {
                eng.check(
                    "identity:/1.0/auth/identities/alice",
                    "can_view",
                    "server:/1.0",
                    &ContextualTuples::default(),
                    &CancellationToken::new(),
                )
                .await
            })
        };
        let b = {
            let eng = eng.clone();
            tokio::spawn(async move {
                eng.check(
                    "identity:/1.0/auth/identities/bob",
                    "can_view",
                    "server:/1.0",
                    &ContextualTuples::default(),
                    &CancellationToken::new(),
                )
                .await
            })
        };
        assert!(a.await.unwrap().unwrap());
        assert!(b.await.unwrap().unwrap());
    }
}
