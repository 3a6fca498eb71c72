//! Identity record and the read-through cache interface backing it.
//!
//! The core never authenticates and never writes identities; it only
//! reads them through [`IdentityCache`]. [`InMemoryIdentityCache`] is the
//! reference implementation for tests, mirroring the shape of a real
//! cluster-database-backed cache without depending on one.

use authz_model::AuthzError;
use dashmap::DashMap;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// How the caller authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthenticationMethod {
    Tls,
    Oidc,
    Unix,
    Cluster,
    Pki,
}

impl AuthenticationMethod {
    pub fn tag(&self) -> &'static str {
        match self {
            AuthenticationMethod::Tls => "tls",
            AuthenticationMethod::Oidc => "oidc",
            AuthenticationMethod::Unix => "unix",
            AuthenticationMethod::Cluster => "cluster",
            AuthenticationMethod::Pki => "pki",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "tls" => Some(AuthenticationMethod::Tls),
            "oidc" => Some(AuthenticationMethod::Oidc),
            "unix" => Some(AuthenticationMethod::Unix),
            "cluster" => Some(AuthenticationMethod::Cluster),
            "pki" => Some(AuthenticationMethod::Pki),
            _ => None,
        }
    }
}

impl fmt::Display for AuthenticationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// What kind of privileges an identity variant carries, independent of
/// any per-project restriction list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityType {
    Admin,
    Restricted,
    MetricsUnrestricted,
    ServerCluster,
}

/// A read-only identity record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub identifier: String,
    pub authentication_method: AuthenticationMethod,
    pub identity_type: IdentityType,
    /// Meaningful only for restricted TLS identities.
    pub projects: HashSet<String>,
    pub groups: HashSet<String>,
}

impl Identity {
    pub fn is_restricted(&self) -> bool {
        matches!(self.identity_type, IdentityType::Restricted)
    }

    /// The canonical `identity:<url>` user object for tuple evaluation.
    pub fn user_object(&self) -> String {
        format!(
            "identity:/1.0/auth/identities/{}/{}",
            self.authentication_method.tag(),
            self.identifier
        )
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Read-through lookup from `(authentication_method, identifier)` to an
/// [`Identity`], and from an identity-provider group name to the local
/// groups it maps to. Safe for concurrent readers; the core never writes.
pub trait IdentityCache: Send + Sync + 'static {
    fn get(&self, method: AuthenticationMethod, identifier: &str) -> BoxFuture<'_, Result<Identity, AuthzError>>;

    fn get_identity_provider_group_mapping(&self, idp_group: &str) -> BoxFuture<'_, Result<Vec<String>, AuthzError>>;
}

/// In-memory [`IdentityCache`] for tests and small deployments. Concurrent
/// reads never block each other; the core never writes, so no mutation
/// API beyond the test-fixture constructors is exposed.
#[derive(Default)]
pub struct InMemoryIdentityCache {
    identities: DashMap<(AuthenticationMethod, String), Identity>,
    idp_group_mappings: DashMap<String, Vec<String>>,
}

impl InMemoryIdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(self, identity: Identity) -> Self {
        self.identities
            .insert((identity.authentication_method, identity.identifier.clone()), identity);
        self
    }

    pub fn with_group_mapping(self, idp_group: impl Into<String>, groups: Vec<String>) -> Self {
        self.idp_group_mappings.insert(idp_group.into(), groups);
        self
    }
}

impl IdentityCache for InMemoryIdentityCache {
    fn get(&self, method: AuthenticationMethod, identifier: &str) -> BoxFuture<'_, Result<Identity, AuthzError>> {
        let key = (method, identifier.to_string());
        Box::pin(async move {
            self.identities
                .get(&key)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| AuthzError::NotFound(format!("identity {}/{}", key.0, key.1)))
        })
    }

    fn get_identity_provider_group_mapping(&self, idp_group: &str) -> BoxFuture<'_, Result<Vec<String>, AuthzError>> {
        let idp_group = idp_group.to_string();
        Box::pin(async move {
            self.idp_group_mappings
                .get(&idp_group)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| AuthzError::NotFound(format!("idp group mapping {idp_group}")))
        })
    }
}

/// Test helper wrapping an [`InMemoryIdentityCache`] in an `Arc` so it can
/// be shared between a driver and the test that set it up.
pub fn shared_cache(cache: InMemoryIdentityCache) -> Arc<InMemoryIdentityCache> {
    Arc::new(cache)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity {
            identifier: "alice".to_string(),
            authentication_method: AuthenticationMethod::Tls,
            identity_type: IdentityType::Restricted,
            projects: ["foo".to_string()].into_iter().collect(),
            groups: HashSet::new(),
        }
    }

    #[tokio::test]
    async fn lookup_hits_return_the_stored_identity() {
        let cache = InMemoryIdentityCache::new().with_identity(alice());
        let found = cache.get(AuthenticationMethod::Tls, "alice").await.unwrap();
        assert!(found.is_restricted());
        assert!(found.projects.contains("foo"));
    }

    #[tokio::test]
    async fn lookup_miss_is_not_found() {
        let cache = InMemoryIdentityCache::new();
        let err = cache.get(AuthenticationMethod::Tls, "ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn unmapped_idp_group_is_not_found_and_skippable() {
        let cache = InMemoryIdentityCache::new().with_group_mapping("engineering", vec!["devs".to_string()]);
        assert_eq!(
            cache.get_identity_provider_group_mapping("engineering").await.unwrap(),
            vec!["devs".to_string()]
        );
        assert!(cache.get_identity_provider_group_mapping("ghost-team").await.is_err());
    }

    #[test]
    fn user_object_uses_the_canonical_identity_url_shape() {
        assert_eq!(alice().user_object(), "identity:/1.0/auth/identities/tls/alice");
    }
}
