//! Fine-grained driver: the relationship-engine-backed decision
//! procedure, composing the certificate driver as a strategy for TLS
//! callers rather than by inheritance.

use crate::cert_driver::CertificateDriver;
use authz_context::identity::{AuthenticationMethod, IdentityCache};
use authz_context::requestor::Requestor;
use authz_model::{
    entitlements_of, parse_resource, resource_url, validate_entitlement, AuthzError, ContextualTuples, EntityType, RelationshipEngine, Tuple,
    TupleStore,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Decision procedure for every identity except TLS (the
/// `embedded-openfga` driver), which it hands off to an owned
/// [`CertificateDriver`].
pub struct FineGrainedDriver<S: TupleStore> {
    identities: Arc<dyn IdentityCache>,
    engine: Arc<RelationshipEngine<S>>,
    cert_driver: CertificateDriver,
}

impl<S: TupleStore> FineGrainedDriver<S> {
    pub fn new(identities: Arc<dyn IdentityCache>, engine: Arc<RelationshipEngine<S>>) -> Self {
        let cert_driver = CertificateDriver::new(identities.clone());
        Self { identities, engine, cert_driver }
    }

    pub fn driver_name(&self) -> &'static str {
        "embedded-openfga"
    }

    /// Build the user object, the rewritten target URL (applying the
    /// effective-project substitution unless suppressed), and the
    /// request-scoped contextual tuple set.
    async fn build_context(
        &self,
        ctx: &Requestor,
        entity_url: &str,
        apply_effective_project: bool,
    ) -> Result<(String, String, ContextualTuples), AuthzError> {
        let identity = self
            .identities
            .get(method_for(&ctx.protocol), &ctx.username)
            .await
            .map_err(|e| AuthzError::IdentityLookup(e.to_string()))?;

        let mut groups: Vec<String> = identity.groups.iter().cloned().collect();
        for idp_group in &ctx.identity_provider_groups {
            if let Ok(mapped) = self.identities.get_identity_provider_group_mapping(idp_group).await {
                groups.extend(mapped);
            }
        }
        groups.sort();
        groups.dedup();

        let target_url = if apply_effective_project {
            rewrite_project(entity_url, &ctx.project)?
        } else {
            entity_url.to_string()
        };

        let parsed = parse_resource(&target_url)?;
        let target_object = format!("{}:{}", parsed.entity_type, target_url);
        let user_object = identity.user_object();

        let mut tuples = vec![
            Tuple::new(user_object.clone(), "can_view", user_object.clone()),
            Tuple::new(user_object.clone(), "can_delete", user_object.clone()),
        ];
        for group in groups {
            tuples.push(Tuple::new(user_object.clone(), "member", format!("auth_group:/1.0/auth/groups/{group}")));
        }

        Ok((user_object, target_object, ContextualTuples::new(tuples)))
    }

    async fn check_inner(&self, ctx: &Requestor, entity_url: &str, entitlement: &str, apply_effective_project: bool) -> Result<(), AuthzError> {
        let entity_type = parse_resource(entity_url)?.entity_type;
        validate_entitlement(entity_type, entitlement)?;

        if !ctx.trusted {
            return Err(AuthzError::Forbidden("request is not trusted".to_string()));
        }
        if ctx.protocol == "tls" {
            return self.cert_driver.check_permission(ctx, entity_url, entitlement).await;
        }
        if ctx.is_internal_or_unix || ctx.is_pki {
            return Ok(());
        }

        let (user_object, target_object, contextual) = self.build_context(ctx, entity_url, apply_effective_project).await?;

        let allowed = self.engine.check(&user_object, entitlement, &target_object, &contextual, &CancellationToken::new()).await?;
        if allowed {
            return Ok(());
        }

        if entitlement == "can_view" {
            return Err(AuthzError::NotFound(target_object));
        }
        if entitlements_of(entity_type).contains(&"can_view") {
            let can_view = self.engine.check(&user_object, "can_view", &target_object, &contextual, &CancellationToken::new()).await?;
            if !can_view {
                return Err(AuthzError::NotFound(target_object));
            }
        }
        Err(AuthzError::Forbidden(target_object))
    }

    pub async fn check_permission(&self, ctx: &Requestor, entity_url: &str, entitlement: &str) -> Result<(), AuthzError> {
        self.check_inner(ctx, entity_url, entitlement, true).await
    }

    pub async fn check_permission_without_effective_project(&self, ctx: &Requestor, entity_url: &str, entitlement: &str) -> Result<(), AuthzError> {
        self.check_inner(ctx, entity_url, entitlement, false).await
    }

    async fn permission_checker_inner(
        &self,
        ctx: &Requestor,
        entitlement: &str,
        entity_type: EntityType,
        apply_effective_project: bool,
    ) -> Result<Box<dyn Fn(&str) -> bool + Send + Sync>, AuthzError> {
        validate_entitlement(entity_type, entitlement)?;

        if !ctx.trusted {
            return Ok(Box::new(|_| false));
        }
        if ctx.protocol == "tls" {
            return self.cert_driver.permission_checker(ctx, entitlement, entity_type).await;
        }
        if ctx.is_internal_or_unix || ctx.is_pki {
            return Ok(Box::new(|_| true));
        }

        if entity_type == EntityType::Server {
            let allowed = self.check_inner(ctx, "/1.0", entitlement, apply_effective_project).await.is_ok();
            return Ok(Box::new(move |_| allowed));
        }

        // Build contextual tuples once against a representative URL of
        // the target type so list_objects can reuse the same user object.
        let identity = self
            .identities
            .get(method_for(&ctx.protocol), &ctx.username)
            .await
            .map_err(|e| AuthzError::IdentityLookup(e.to_string()))?;
        let mut groups: Vec<String> = identity.groups.iter().cloned().collect();
        for idp_group in &ctx.identity_provider_groups {
            if let Ok(mapped) = self.identities.get_identity_provider_group_mapping(idp_group).await {
                groups.extend(mapped);
            }
        }
        groups.sort();
        groups.dedup();
        let user_object = identity.user_object();
        let mut tuples = vec![
            Tuple::new(user_object.clone(), "can_view", user_object.clone()),
            Tuple::new(user_object.clone(), "can_delete", user_object.clone()),
        ];
        for group in groups {
            tuples.push(Tuple::new(user_object.clone(), "member", format!("auth_group:/1.0/auth/groups/{group}")));
        }
        let contextual = ContextualTuples::new(tuples);

        let allowed_objects: std::collections::HashSet<String> = self
            .engine
            .list_objects(&user_object, entitlement, entity_type.tag(), &contextual, &CancellationToken::new())
            .await?
            .into_iter()
            .collect();

        let project = ctx.project.clone();
        Ok(Box::new(move |candidate_url| {
            let Ok(parsed) = parse_resource(candidate_url) else { return false };
            let rewritten = if apply_effective_project { rewrite_project(candidate_url, &project) } else { Ok(candidate_url.to_string()) };
            let Ok(rewritten) = rewritten else { return false };
            let canonical = format!("{}:{}", parsed.entity_type, rewritten);
            allowed_objects.contains(&canonical)
        }))
    }

    pub async fn permission_checker(
        &self,
        ctx: &Requestor,
        entitlement: &str,
        entity_type: EntityType,
    ) -> Result<Box<dyn Fn(&str) -> bool + Send + Sync>, AuthzError> {
        self.permission_checker_inner(ctx, entitlement, entity_type, true).await
    }

    pub async fn permission_checker_without_effective_project(
        &self,
        ctx: &Requestor,
        entitlement: &str,
        entity_type: EntityType,
    ) -> Result<Box<dyn Fn(&str) -> bool + Send + Sync>, AuthzError> {
        self.permission_checker_inner(ctx, entitlement, entity_type, false).await
    }
}

fn method_for(protocol: &str) -> AuthenticationMethod {
    AuthenticationMethod::from_tag(protocol).unwrap_or(AuthenticationMethod::Oidc)
}

/// Rewrite a project-scoped URL's `project` query parameter to
/// `effective_project`, recomposing the canonical URL through the
/// resource object model. Left intact for types that aren't project
/// scoped.
fn rewrite_project(entity_url: &str, effective_project: &str) -> Result<String, AuthzError> {
    let parsed = parse_resource(entity_url)?;
    if !parsed.entity_type.is_project_scoped() {
        return Ok(entity_url.to_string());
    }
    if parsed.entity_type == EntityType::Project {
        return Ok(entity_url.to_string());
    }
    let path_args: Vec<&str> = parsed.path_args.iter().map(|s| s.as_str()).collect();
    resource_url(parsed.entity_type, Some(effective_project), parsed.location.as_deref(), &path_args)
}
