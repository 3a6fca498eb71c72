//! Entitlement catalog.
//!
//! A closed enumeration of entitlement names, and which of them are
//! valid against which [`EntityType`]. This table is static; extending
//! it means updating both this file and the model in `model.rs`
//! coherently.

use crate::error::AuthzError;
use crate::resource::EntityType;

/// The default triple most resource types carry.
const DEFAULT: &[&str] = &["can_view", "can_edit", "can_delete"];

/// No meaningful permissions: snapshots, backups, cluster members,
/// warnings, operations, and cluster groups are read through their
/// parent and never targeted directly.
const NONE: &[&str] = &[];

const SERVER: &[&str] = &[
    "can_view",
    "can_edit",
    "can_delete",
    "admin",
    "can_view_resources",
    "can_view_metrics",
    "can_create_projects",
    "can_create_storage_pools",
    "can_create_certificates",
    "can_override_cluster_target_restriction",
    "can_view_privileged_events",
];

const PROJECT: &[&str] = &[
    "can_view",
    "can_edit",
    "can_delete",
    "admin",
    "operator",
    "viewer",
    "can_view_events",
    "can_view_operations",
    "can_view_metrics",
    "can_create_images",
    "can_create_image_aliases",
    "can_create_instances",
    "can_create_networks",
    "can_create_network_acls",
    "can_create_network_zones",
    "can_create_profiles",
    "can_create_storage_volumes",
    "can_create_storage_buckets",
];

const INSTANCE: &[&str] = &[
    "can_view",
    "can_edit",
    "can_delete",
    "user",
    "operator",
    "can_update_state",
    "can_manage_snapshots",
    "can_manage_backups",
    "can_operate_instances",
    "can_exec",
    "can_view_console",
    "can_view_events",
];

const STORAGE_VOLUME: &[&str] = &["can_view", "can_edit", "can_delete", "can_manage_snapshots", "can_manage_backups"];

/// Return the set of entitlements valid for `entity_type`.
pub fn entitlements_of(entity_type: EntityType) -> &'static [&'static str] {
    match entity_type {
        EntityType::Server => SERVER,
        EntityType::Project => PROJECT,
        EntityType::Instance => INSTANCE,
        EntityType::StorageVolume => STORAGE_VOLUME,
        EntityType::Snapshot
        | EntityType::Backup
        | EntityType::ClusterMember
        | EntityType::ClusterGroup
        | EntityType::Warning
        | EntityType::Operation => NONE,
        EntityType::Identity
        | EntityType::AuthGroup
        | EntityType::StoragePool
        | EntityType::StorageBucket
        | EntityType::Image
        | EntityType::ImageAlias
        | EntityType::Network
        | EntityType::NetworkAcl
        | EntityType::NetworkZone
        | EntityType::Profile
        | EntityType::Certificate => DEFAULT,
    }
}

/// Validate that `entitlement` is defined for `entity_type`.
pub fn validate(entity_type: EntityType, entitlement: &str) -> Result<(), AuthzError> {
    if entitlements_of(entity_type).contains(&entitlement) {
        Ok(())
    } else {
        Err(AuthzError::BadEntitlement {
            entity_type: entity_type.tag().to_string(),
            entitlement: entitlement.to_string(),
        })
    }
}
