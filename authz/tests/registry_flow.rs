use authz::{registry::DriverRegistry, Authorizer};
use authz_context::identity::{AuthenticationMethod, Identity, IdentityCache, IdentityType, InMemoryIdentityCache};
use authz_context::requestor::{RequestValues, Requestor};
use authz_model::InMemoryTupleStore;
use std::collections::HashSet;
use std::sync::Arc;

fn oidc_identity() -> Identity {
    Identity {
        identifier: "alice@x".to_string(),
        authentication_method: AuthenticationMethod::Oidc,
        identity_type: IdentityType::Restricted,
        projects: HashSet::new(),
        groups: ["devs".to_string()].into_iter().collect(),
    }
}

fn oidc_ctx() -> Requestor {
    Requestor::from_values(&RequestValues { trusted: true, protocol: "oidc".to_string(), username: "alice@x".to_string(), ..Default::default() })
        .unwrap()
}

#[tokio::test]
async fn tls_driver_loaded_via_registry_enforces_the_project_allow_list() {
    let identities: Arc<dyn IdentityCache> = Arc::new(InMemoryIdentityCache::new().with_identity(Identity {
        identifier: "alice".to_string(),
        authentication_method: AuthenticationMethod::Tls,
        identity_type: IdentityType::Restricted,
        projects: ["foo".to_string()].into_iter().collect(),
        groups: HashSet::new(),
    }));
    let registry = DriverRegistry::new();
    let driver = registry.load::<InMemoryTupleStore>("tls", identities, None).await.unwrap();
    assert_eq!(driver.driver(), "tls");

    let ctx =
        Requestor::from_values(&RequestValues { trusted: true, protocol: "tls".to_string(), username: "alice".to_string(), ..Default::default() })
            .unwrap();

    assert!(driver.check_permission(&ctx, "/1.0/networks/n1?project=foo", "can_view").await.is_ok());
    assert!(driver.check_permission(&ctx, "/1.0/networks/n1?project=bar", "can_view").await.is_err());
}

#[tokio::test]
async fn embedded_openfga_driver_loaded_via_registry_evaluates_group_grants() {
    let store = Arc::new(InMemoryTupleStore::seeded([
        authz_model::Tuple::new("auth_group:/1.0/auth/groups/devs#member", "operator", "project:/1.0/projects/default"),
        authz_model::Tuple::new("project:/1.0/projects/default", "project", "instance:/1.0/instances/c1?project=default"),
    ]));
    let identities: Arc<dyn IdentityCache> = Arc::new(InMemoryIdentityCache::new().with_identity(oidc_identity()));
    let driver = DriverRegistry::new().load("embedded-openfga", identities, Some(store)).await.unwrap();
    assert_eq!(driver.driver(), "embedded-openfga");

    let ok = driver.check_permission(&oidc_ctx(), "/1.0/instances/c1?project=default", "can_exec").await;
    assert!(ok.is_ok());
}

#[tokio::test]
async fn unrelated_caller_gets_not_found_through_the_full_registry_flow() {
    let store = Arc::new(InMemoryTupleStore::new());
    let identities: Arc<dyn IdentityCache> = Arc::new(InMemoryIdentityCache::new().with_identity(oidc_identity()));
    let driver = DriverRegistry::new().load("embedded-openfga", identities, Some(store)).await.unwrap();

    let err = driver.check_permission(&oidc_ctx(), "/1.0/instances/c1?project=default", "can_exec").await.unwrap_err();
    assert!(matches!(err, authz::AuthzError::NotFound(_)));
}

#[tokio::test]
async fn get_permission_checker_matches_check_permission_on_the_same_driver() {
    let store = Arc::new(InMemoryTupleStore::seeded([
        authz_model::Tuple::new("auth_group:/1.0/auth/groups/devs#member", "operator", "project:/1.0/projects/default"),
        authz_model::Tuple::new("project:/1.0/projects/default", "project", "instance:/1.0/instances/c1?project=default"),
    ]));
    let identities: Arc<dyn IdentityCache> = Arc::new(InMemoryIdentityCache::new().with_identity(oidc_identity()));
    let driver = DriverRegistry::new().load("embedded-openfga", identities, Some(store)).await.unwrap();

    let checker = driver.get_permission_checker(&oidc_ctx(), "can_view", authz_model::EntityType::Instance).await.unwrap();
    assert!(checker("/1.0/instances/c1?project=default"));
    assert!(!checker("/1.0/instances/c2?project=other"));

    let direct = driver.check_permission(&oidc_ctx(), "/1.0/instances/c1?project=default", "can_view").await;
    assert!(direct.is_ok());
}
