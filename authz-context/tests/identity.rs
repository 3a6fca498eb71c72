use authz_context::identity::{AuthenticationMethod, Identity, IdentityCache, IdentityType, InMemoryIdentityCache};
use authz_model::AuthzError;
use std::collections::HashSet;

fn alice() -> Identity {
    Identity {
        identifier: "alice".to_string(),
        authentication_method: AuthenticationMethod::Oidc,
        identity_type: IdentityType::Restricted,
        projects: HashSet::new(),
        groups: ["devs".to_string()].into_iter().collect(),
    }
}

#[tokio::test]
async fn lookup_hits_return_the_stored_identity() {
    let cache = InMemoryIdentityCache::new().with_identity(alice());
    let found = cache.get(AuthenticationMethod::Oidc, "alice").await.unwrap();
    assert_eq!(found.identifier, "alice");
    assert!(found.groups.contains("devs"));
}

#[tokio::test]
async fn lookup_miss_is_not_found() {
    let cache = InMemoryIdentityCache::new();
    let err = cache.get(AuthenticationMethod::Oidc, "nobody").await.unwrap_err();
    assert!(matches!(err, AuthzError::NotFound(_)));
}

#[tokio::test]
async fn idp_group_mapping_resolves_to_local_groups() {
    let cache = InMemoryIdentityCache::new().with_group_mapping("idp-devs", vec!["devs".to_string(), "qa".to_string()]);
    let groups = cache.get_identity_provider_group_mapping("idp-devs").await.unwrap();
    assert_eq!(groups, vec!["devs".to_string(), "qa".to_string()]);
}

#[tokio::test]
async fn unmapped_idp_group_is_not_found() {
    let cache = InMemoryIdentityCache::new();
    let err = cache.get_identity_provider_group_mapping("idp-ghost").await.unwrap_err();
    assert!(matches!(err, AuthzError::NotFound(_)));
}

#[test]
fn user_object_is_the_canonical_identity_url() {
    let identity = alice();
    assert_eq!(identity.user_object(), "identity:/1.0/auth/identities/oidc/alice");
}
