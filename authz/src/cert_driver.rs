//! Certificate driver: the lightweight decision procedure for TLS
//! identities restricted to an enumerated project list.
//!
//! Does not touch the relationship engine at all. Project restriction
//! for TLS identities is expressed as a literal allow-list, not as tuple
//! data, because a restricted certificate's reach is an attribute of the
//! identity record itself.

use authz_context::identity::{AuthenticationMethod, IdentityCache, IdentityType};
use authz_context::requestor::Requestor;
use authz_model::{parse_resource, validate_entitlement, AuthzError, EntityType};
use std::sync::Arc;
use tracing::warn;

/// Decision procedure for TLS-certificate identities (the `tls` driver).
pub struct CertificateDriver {
    identities: Arc<dyn IdentityCache>,
}

impl CertificateDriver {
    pub fn new(identities: Arc<dyn IdentityCache>) -> Self {
        Self { identities }
    }

    pub fn driver_name(&self) -> &'static str {
        "tls"
    }

    pub async fn check_permission(&self, ctx: &Requestor, entity_url: &str, entitlement: &str) -> Result<(), AuthzError> {
        let parsed = parse_resource(entity_url)?;
        validate_entitlement(parsed.entity_type, entitlement)?;

        if !ctx.trusted {
            return Err(AuthzError::Forbidden("request is not trusted".to_string()));
        }
        if ctx.is_internal_or_unix || ctx.is_pki {
            return Ok(());
        }
        if ctx.protocol != "tls" {
            warn!(protocol = %ctx.protocol, "non-tls protocol reached the certificate driver; allowing as a misconfiguration fallback");
            return Ok(());
        }

        let identity = self
            .identities
            .get(AuthenticationMethod::Tls, &ctx.username)
            .await
            .map_err(|e| AuthzError::IdentityLookup(e.to_string()))?;

        if !identity.is_restricted() {
            return Ok(());
        }
        if identity.identity_type == IdentityType::MetricsUnrestricted && entitlement == "can_view_metrics" {
            return Ok(());
        }
        if ctx.all_projects {
            return Err(AuthzError::Forbidden("restricted identity may not request all_projects".to_string()));
        }

        if parsed.entity_type == EntityType::Identity {
            return if entitlement == "can_view" && is_self_identity_view(entity_url, &identity.identifier)? {
                Ok(())
            } else {
                Err(AuthzError::Forbidden(format!("identity {entity_url:?} is not the caller's own")))
            };
        }
        decide(&parsed.entity_type, &parsed.project, entitlement, &identity.projects)
    }

    /// Identical premises to [`Self::check_permission`]; returns a closure
    /// applying the allow-list to each candidate URL instead of failing on
    /// the first mismatch.
    pub async fn permission_checker(
        &self,
        ctx: &Requestor,
        entitlement: &str,
        entity_type: EntityType,
    ) -> Result<Box<dyn Fn(&str) -> bool + Send + Sync>, AuthzError> {
        validate_entitlement(entity_type, entitlement)?;

        if !ctx.trusted {
            return Ok(Box::new(|_| false));
        }
        if ctx.is_internal_or_unix || ctx.is_pki {
            return Ok(Box::new(|_| true));
        }
        if ctx.protocol != "tls" {
            return Ok(Box::new(|_| true));
        }

        let identity = self
            .identities
            .get(AuthenticationMethod::Tls, &ctx.username)
            .await
            .map_err(|e| AuthzError::IdentityLookup(e.to_string()))?;

        if !identity.is_restricted() {
            return Ok(Box::new(|_| true));
        }
        if identity.identity_type == IdentityType::MetricsUnrestricted && entitlement == "can_view_metrics" {
            return Ok(Box::new(|_| true));
        }
        if ctx.all_projects {
            return Ok(Box::new(|_| false));
        }

        if entity_type == EntityType::Identity {
            let own_identifier = identity.identifier.clone();
            let is_can_view = entitlement == "can_view";
            return Ok(Box::new(move |url| {
                if !is_can_view {
                    return false;
                }
                let Ok(parsed) = parse_resource(url) else { return false };
                parsed.entity_type == EntityType::Identity && is_self_identity_view(url, &own_identifier).unwrap_or(false)
            }));
        }

        let entitlement = entitlement.to_string();
        let projects = identity.projects.clone();
        Ok(Box::new(move |url| {
            let Ok(parsed) = parse_resource(url) else { return false };
            if parsed.entity_type != entity_type {
                return false;
            }
            decide(&parsed.entity_type, &parsed.project, &entitlement, &projects).is_ok()
        }))
    }
}

/// Steps 9–10 of the decision procedure: the project-unspecific allow-list
/// followed by the plain project-membership check for every other
/// project-scoped type.
fn decide(entity_type: &EntityType, project: &str, entitlement: &str, projects: &std::collections::HashSet<String>) -> Result<(), AuthzError> {
    match entity_type {
        EntityType::Server => {
            if matches!(entitlement, "can_view" | "can_view_resources" | "can_view_metrics") {
                Ok(())
            } else {
                Err(AuthzError::Forbidden(format!("server entitlement {entitlement} not in tls allow-list")))
            }
        }
        EntityType::StoragePool | EntityType::Certificate => {
            if entitlement == "can_view" {
                Ok(())
            } else {
                Err(AuthzError::Forbidden(format!("{entity_type} entitlement {entitlement} not in tls allow-list")))
            }
        }
        EntityType::Project => {
            let allowed_entitlement = entitlement == "can_view"
                || entitlement.starts_with("can_create_")
                || matches!(entitlement, "can_view_events" | "can_view_operations" | "can_view_metrics");
            if projects.contains(project) && allowed_entitlement {
                Ok(())
            } else {
                Err(AuthzError::Forbidden(format!("project {project:?} not reachable with entitlement {entitlement}")))
            }
        }
        other if other.is_project_scoped() => {
            if projects.contains(project) {
                Ok(())
            } else {
                Err(AuthzError::Forbidden(format!("project {project:?} not in restricted identity's allow-list")))
            }
        }
        other => Err(AuthzError::Forbidden(format!("{other} is not reachable by a restricted tls identity"))),
    }
}

/// Resolve the caller's own identifier against the URL's embedded
/// identifier for the `identity` self-view rule.
pub fn is_self_identity_view(entity_url: &str, caller_identifier: &str) -> Result<bool, AuthzError> {
    let parsed = parse_resource(entity_url)?;
    if parsed.entity_type != EntityType::Identity {
        return Ok(false);
    }
    Ok(parsed.path_args.last().map(|s| s.as_str()) == Some(caller_identifier))
}
