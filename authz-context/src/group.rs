//! Group and permission data model.
//!
//! Groups, their attached identities, identity-provider mappings, and
//! permissions are owned by the enclosing daemon's database; this module
//! only describes their shape as the core observes it through reads.

use authz_model::{self as model, AuthzError};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

/// A named collection of identities, IdP group mappings, and permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub description: String,
    pub identities: HashSet<(String, String)>,
    pub identity_provider_groups: HashSet<String>,
    pub permissions: Vec<Permission>,
}

impl Group {
    /// Validate the name invariant: non-empty, no `/` or `:`.
    pub fn validate_name(name: &str) -> Result<(), AuthzError> {
        if name.is_empty() || name.contains('/') || name.contains(':') {
            return Err(AuthzError::UrlShape(format!("invalid group name: {name:?}")));
        }
        Ok(())
    }

    pub fn url(&self) -> String {
        format!("/1.0/auth/groups/{}", model::resource::encode_path_segment(&self.name))
    }
}

/// `(entitlement, entity_type, entity_id)` resolved from an ingress
/// `(entitlement, entity_type, entity_url)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    pub entitlement: String,
    pub entity_type: model::EntityType,
    pub entity_id: String,
}

impl Permission {
    /// Resolve an ingress permission, validating the entitlement against
    /// the catalog and the URL against the resource object model, into
    /// its internal form.
    pub fn from_ingress(entitlement: &str, entity_type: model::EntityType, entity_url: &str) -> Result<Self, AuthzError> {
        model::validate_entitlement(entity_type, entitlement)?;
        let parsed = model::parse_resource(entity_url)?;
        if parsed.entity_type != entity_type {
            return Err(AuthzError::UrlShape(format!(
                "url {entity_url:?} names a {} but permission targets {}",
                parsed.entity_type, entity_type
            )));
        }
        Ok(Self { entitlement: entitlement.to_string(), entity_type, entity_id: entity_url.to_string() })
    }
}

/// A group rename or delete committed by the enclosing daemon's database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupChangeEvent {
    Renamed { old_name: String, new_name: String },
    Deleted { name: String },
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The local callback a group rename/delete must invoke after its DB
/// commit (and, in a real deployment, after broadcasting a refresh
/// signal to every live cluster member). This core only defines the
/// trait; the broadcast and the callback's own implementation are the
/// daemon's responsibility.
pub trait GroupManagementHooks: Send + Sync {
    fn update_identity_cache(&self, event: &GroupChangeEvent) -> BoxFuture<'_, Result<(), AuthzError>>;
}
