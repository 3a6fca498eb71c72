//! Resource URL object model.
//!
//! Maps every API resource to a canonical typed object name and back.
//! Percent-encoding is narrow by design: only a literal `/` inside a
//! single path component is escaped, as `%2F`; nothing else is touched.

use crate::error::AuthzError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Every resource type the authorization core knows how to name.
///
/// Types with no meaningful entitlements (see `entitlement.rs`) still
/// need a canonical URL shape, since they can appear as `object` in a
/// tuple or as a `list_objects` target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Server,
    Identity,
    AuthGroup,
    Project,
    StoragePool,
    StorageVolume,
    StorageBucket,
    Image,
    ImageAlias,
    Instance,
    Network,
    NetworkAcl,
    NetworkZone,
    Profile,
    Certificate,
    Snapshot,
    Backup,
    ClusterMember,
    ClusterGroup,
    Warning,
    Operation,
}

impl EntityType {
    /// All known entity types, in a stable order. Used by catalog/model
    /// construction and by tests that want to iterate exhaustively.
    pub const ALL: &'static [EntityType] = &[
        EntityType::Server,
        EntityType::Identity,
        EntityType::AuthGroup,
        EntityType::Project,
        EntityType::StoragePool,
        EntityType::StorageVolume,
        EntityType::StorageBucket,
        EntityType::Image,
        EntityType::ImageAlias,
        EntityType::Instance,
        EntityType::Network,
        EntityType::NetworkAcl,
        EntityType::NetworkZone,
        EntityType::Profile,
        EntityType::Certificate,
        EntityType::Snapshot,
        EntityType::Backup,
        EntityType::ClusterMember,
        EntityType::ClusterGroup,
        EntityType::Warning,
        EntityType::Operation,
    ];

    /// The canonical tuple-object type tag, e.g. `"instance"`.
    pub fn tag(&self) -> &'static str {
        match self {
            EntityType::Server => "server",
            EntityType::Identity => "identity",
            EntityType::AuthGroup => "auth_group",
            EntityType::Project => "project",
            EntityType::StoragePool => "storage_pool",
            EntityType::StorageVolume => "storage_volume",
            EntityType::StorageBucket => "storage_bucket",
            EntityType::Image => "image",
            EntityType::ImageAlias => "image_alias",
            EntityType::Instance => "instance",
            EntityType::Network => "network",
            EntityType::NetworkAcl => "network_acl",
            EntityType::NetworkZone => "network_zone",
            EntityType::Profile => "profile",
            EntityType::Certificate => "certificate",
            EntityType::Snapshot => "snapshot",
            EntityType::Backup => "backup",
            EntityType::ClusterMember => "cluster_member",
            EntityType::ClusterGroup => "cluster_group",
            EntityType::Warning => "warning",
            EntityType::Operation => "operation",
        }
    }

    pub fn from_tag(tag: &str) -> Option<EntityType> {
        EntityType::ALL.iter().copied().find(|t| t.tag() == tag)
    }

    /// Whether the canonical URL for this type must carry a `project`
    /// query parameter.
    pub fn is_project_scoped(&self) -> bool {
        matches!(
            self,
            EntityType::Image
                | EntityType::ImageAlias
                | EntityType::Instance
                | EntityType::Network
                | EntityType::NetworkAcl
                | EntityType::NetworkZone
                | EntityType::Profile
                | EntityType::StorageVolume
                | EntityType::StorageBucket
                | EntityType::Snapshot
                | EntityType::Backup
        )
    }

    /// Number of positional path arguments `url()`/`parse()` expect,
    /// beyond the fixed collection prefix.
    fn path_arity(&self) -> usize {
        match self {
            EntityType::Server => 0,
            EntityType::Project
            | EntityType::StoragePool
            | EntityType::AuthGroup
            | EntityType::Certificate
            | EntityType::ClusterMember
            | EntityType::ClusterGroup
            | EntityType::Warning
            | EntityType::Operation
            | EntityType::Image
            | EntityType::Network
            | EntityType::NetworkAcl
            | EntityType::NetworkZone
            | EntityType::Profile
            | EntityType::ImageAlias => 1,
            EntityType::Identity | EntityType::StorageBucket | EntityType::Snapshot | EntityType::Backup => 2,
            EntityType::StorageVolume => 3,
        }
    }

    /// The fixed path segments identifying this type's collection,
    /// inserted between `/1.0` and the positional path arguments.
    fn collection_segments(&self) -> &'static [&'static str] {
        match self {
            EntityType::Server => &[],
            EntityType::Identity => &["auth", "identities"],
            EntityType::AuthGroup => &["auth", "groups"],
            EntityType::Project => &["projects"],
            EntityType::StoragePool => &["storage-pools"],
            EntityType::StorageVolume => &["storage-pools"],
            EntityType::StorageBucket => &["storage-pools"],
            EntityType::Image => &["images"],
            EntityType::ImageAlias => &["images", "aliases"],
            EntityType::Instance => &["instances"],
            EntityType::Network => &["networks"],
            EntityType::NetworkAcl => &["network-acls"],
            EntityType::NetworkZone => &["network-zones"],
            EntityType::Profile => &["profiles"],
            EntityType::Certificate => &["certificates"],
            EntityType::Snapshot => &["instances"],
            EntityType::Backup => &["instances"],
            EntityType::ClusterMember => &["cluster", "members"],
            EntityType::ClusterGroup => &["cluster", "groups"],
            EntityType::Warning => &["warnings"],
            EntityType::Operation => &["operations"],
        }
    }

    /// For `storage_pool`-rooted and `instances`-rooted compound
    /// collections, the literal segment inserted between the parent
    /// path argument and the final name (e.g. `volumes`, `<type>`,
    /// `snapshots`, `backups`). `None` for flat collections.
    fn inner_segment(&self) -> Option<&'static str> {
        match self {
            EntityType::StorageVolume => Some("volumes"),
            EntityType::StorageBucket => Some("buckets"),
            EntityType::Snapshot => Some("snapshots"),
            EntityType::Backup => Some("backups"),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Percent-encode a single path component: only `/` is escaped.
pub fn encode_path_segment(segment: &str) -> String {
    segment.replace('/', "%2F")
}

/// Inverse of [`encode_path_segment`]: only unescapes `%2F`/`%2f`.
pub fn decode_path_segment(segment: &str) -> String {
    segment.replace("%2F", "/").replace("%2f", "/")
}

/// A fully-parsed resource reference, the inverse of a canonical URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResource {
    pub entity_type: EntityType,
    pub project: String,
    pub location: Option<String>,
    pub path_args: Vec<String>,
}

/// Construct the canonical URL for `entity_type`.
///
/// `project` must be non-empty for project-scoped types; `location`, if
/// given, is carried as a `target` query parameter (the cluster member
/// hosting the resource). Fails with [`AuthzError::UrlShape`] if
/// `path_args` doesn't match the type's arity or a required project is
/// missing.
pub fn url(
    entity_type: EntityType,
    project: &str,
    location: Option<&str>,
    path_args: &[&str],
) -> Result<String, AuthzError> {
    if path_args.len() != entity_type.path_arity() {
        return Err(AuthzError::UrlShape(format!(
            "{} expects {} path argument(s), got {}",
            entity_type,
            entity_type.path_arity(),
            path_args.len()
        )));
    }
    if entity_type.is_project_scoped() && project.is_empty() {
        return Err(AuthzError::UrlShape(format!(
            "{entity_type} is project-scoped but no project was given"
        )));
    }

    let mut segments: Vec<String> = vec!["1.0".to_string()];
    segments.extend(entity_type.collection_segments().iter().map(|s| s.to_string()));

    match entity_type {
        EntityType::Project => {
            // Tie-break: the project name lives in the path, not the query.
            segments.push(encode_path_segment(path_args[0]));
        }
        EntityType::StorageVolume => {
            segments.push(encode_path_segment(path_args[0])); // pool
            segments.push("volumes".to_string());
            segments.push(encode_path_segment(path_args[1])); // volume type
            segments.push(encode_path_segment(path_args[2])); // name
        }
        EntityType::StorageBucket | EntityType::Snapshot | EntityType::Backup => {
            segments.push(encode_path_segment(path_args[0])); // pool / instance
            segments.push(entity_type.inner_segment().unwrap().to_string());
            segments.push(encode_path_segment(path_args[1])); // name
        }
        EntityType::Identity => {
            segments.push(encode_path_segment(path_args[0])); // method
            segments.push(encode_path_segment(path_args[1])); // identifier
        }
        _ => {
            for arg in path_args {
                segments.push(encode_path_segment(arg));
            }
        }
    }

    let mut out = format!("/{}", segments.join("/"));

    let mut query = url::form_urlencoded::Serializer::new(String::new());
    let mut has_query = false;
    if entity_type.is_project_scoped() {
        query.append_pair("project", project);
        has_query = true;
    }
    if let Some(loc) = location {
        query.append_pair("target", loc);
        has_query = true;
    }
    if has_query {
        out.push('?');
        out.push_str(&query.finish());
    }

    Ok(out)
}

/// Parse a canonical resource URL into its structured form. Fails with
/// [`AuthzError::UrlParse`] if the path doesn't match any known
/// collection/arity.
pub fn parse(resource_url: &str) -> Result<ParsedResource, AuthzError> {
    let (path, query) = match resource_url.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (resource_url, None),
    };

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.first() != Some(&"1.0") {
        return Err(AuthzError::UrlParse(format!("not a /1.0 resource url: {resource_url}")));
    }
    let rest = &segments[1..];

    let mut query_params: HashMap<String, String> = HashMap::new();
    if let Some(q) = query {
        for (k, v) in url::form_urlencoded::parse(q.as_bytes()) {
            query_params.insert(k.into_owned(), v.into_owned());
        }
    }
    let location = query_params.remove("target");
    let query_project = query_params.remove("project");

    let (entity_type, path_args) = match_collection(rest)
        .ok_or_else(|| AuthzError::UrlParse(format!("unrecognized resource url: {resource_url}")))?;

    let project = if entity_type == EntityType::Project {
        path_args.first().cloned().ok_or_else(|| {
            AuthzError::UrlParse("project url missing name path argument".to_string())
        })?
    } else if entity_type.is_project_scoped() {
        query_project.ok_or_else(|| {
            AuthzError::UrlParse(format!("{entity_type} url is missing required ?project="))
        })?
    } else {
        String::new()
    };

    if path_args.len() != entity_type.path_arity() {
        return Err(AuthzError::UrlParse(format!(
            "{entity_type} url has {} path argument(s), expected {}",
            path_args.len(),
            entity_type.path_arity()
        )));
    }

    Ok(ParsedResource { entity_type, project, location, path_args })
}

/// Try each known entity type's collection shape against `segments`
/// (already split, percent-decoded is deferred to the caller of each
/// positional argument). Longest/most-specific collections are tried
/// first so `instances/<n>/snapshots/<s>` doesn't get mis-parsed as an
/// instance with a stray trailing segment.
fn match_collection(segments: &[&str]) -> Option<(EntityType, Vec<String>)> {
    if segments.is_empty() {
        return Some((EntityType::Server, vec![]));
    }

    let decoded = |s: &str| decode_path_segment(s);

    // Compound collections, checked before their flat siblings.
    if segments.first() == Some(&"storage-pools") {
        match segments.len() {
            2 => return Some((EntityType::StoragePool, vec![decoded(segments[1])])),
            5 if segments[2] == "volumes" => {
                return Some((
                    EntityType::StorageVolume,
                    vec![decoded(segments[1]), decoded(segments[3]), decoded(segments[4])],
                ));
            }
            4 if segments[2] == "buckets" => {
                return Some((EntityType::StorageBucket, vec![decoded(segments[1]), decoded(segments[3])]));
            }
            _ => {}
        }
    }
    if segments.first() == Some(&"instances") {
        match segments.len() {
            2 => return Some((EntityType::Instance, vec![decoded(segments[1])])),
            4 if segments[2] == "snapshots" => {
                return Some((EntityType::Snapshot, vec![decoded(segments[1]), decoded(segments[3])]));
            }
            4 if segments[2] == "backups" => {
                return Some((EntityType::Backup, vec![decoded(segments[1]), decoded(segments[3])]));
            }
            _ => {}
        }
    }
    if segments.first() == Some(&"images") {
        match segments {
            [_, "aliases", name] => return Some((EntityType::ImageAlias, vec![decoded(name)])),
            [_, name] => return Some((EntityType::Image, vec![decoded(name)])),
            _ => {}
        }
    }
    if segments.first() == Some(&"auth") {
        match segments {
            [_, "identities", method, identifier] => {
                return Some((EntityType::Identity, vec![decoded(method), decoded(identifier)]));
            }
            [_, "groups", name] => return Some((EntityType::AuthGroup, vec![decoded(name)])),
            _ => {}
        }
    }
    if segments.first() == Some(&"cluster") {
        match segments {
            [_, "members", name] => return Some((EntityType::ClusterMember, vec![decoded(name)])),
            [_, "groups", name] => return Some((EntityType::ClusterGroup, vec![decoded(name)])),
            _ => {}
        }
    }

    // Flat single-name collections.
    let flat: &[(&str, EntityType)] = &[
        ("projects", EntityType::Project),
        ("networks", EntityType::Network),
        ("network-acls", EntityType::NetworkAcl),
        ("network-zones", EntityType::NetworkZone),
        ("profiles", EntityType::Profile),
        ("certificates", EntityType::Certificate),
        ("warnings", EntityType::Warning),
        ("operations", EntityType::Operation),
    ];
    if segments.len() == 2 {
        for (prefix, ty) in flat {
            if segments[0] == *prefix {
                return Some((*ty, vec![decoded(segments[1])]));
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_url_has_no_path_args_or_query() {
        let u = url(EntityType::Server, "", None, &[]).unwrap();
        assert_eq!(u, "/1.0");
        let parsed = parse(&u).unwrap();
        assert_eq!(parsed.entity_type, EntityType::Server);
        assert!(parsed.path_args.is_empty());
    }

    #[test]
    fn project_name_lives_in_path_not_query() {
        let u = url(EntityType::Project, "default", None, &["default"]).unwrap();
        assert_eq!(u, "/1.0/projects/default");
        let parsed = parse(&u).unwrap();
        assert_eq!(parsed.project, "default");
        assert_eq!(parsed.path_args, vec!["default".to_string()]);
    }

    #[test]
    fn project_scoped_roundtrip() {
        let u = url(EntityType::Instance, "default", None, &["c1"]).unwrap();
        assert_eq!(u, "/1.0/instances/c1?project=default");
        let parsed = parse(&u).unwrap();
        assert_eq!(parsed.entity_type, EntityType::Instance);
        assert_eq!(parsed.project, "default");
        assert_eq!(parsed.path_args, vec!["c1".to_string()]);
    }

    #[test]
    fn project_scoped_missing_project_is_url_shape_error() {
        let err = url(EntityType::Instance, "", None, &["c1"]).unwrap_err();
        assert!(matches!(err, AuthzError::UrlShape(_)));
    }

    #[test]
    fn storage_volume_has_three_path_args() {
        let u = url(EntityType::StorageVolume, "default", None, &["pool1", "custom", "vol1"]).unwrap();
        assert_eq!(u, "/1.0/storage-pools/pool1/volumes/custom/vol1?project=default");
        let parsed = parse(&u).unwrap();
        assert_eq!(parsed.path_args, vec!["pool1".to_string(), "custom".to_string(), "vol1".to_string()]);
    }

    #[test]
    fn storage_bucket_roundtrip() {
        let u = url(EntityType::StorageBucket, "default", None, &["pool1", "bucket1"]).unwrap();
        assert_eq!(u, "/1.0/storage-pools/pool1/buckets/bucket1?project=default");
        let parsed = parse(&u).unwrap();
        assert_eq!(parsed.entity_type, EntityType::StorageBucket);
        assert_eq!(parsed.path_args, vec!["pool1".to_string(), "bucket1".to_string()]);
    }

    #[test]
    fn identity_url_roundtrip() {
        let u = url(EntityType::Identity, "", None, &["tls", "abc123"]).unwrap();
        assert_eq!(u, "/1.0/auth/identities/tls/abc123");
        let parsed = parse(&u).unwrap();
        assert_eq!(parsed.path_args, vec!["tls".to_string(), "abc123".to_string()]);
    }

    #[test]
    fn location_becomes_target_query_param() {
        let u = url(EntityType::Instance, "default", Some("node2"), &["c1"]).unwrap();
        let parsed = parse(&u).unwrap();
        assert_eq!(parsed.location, Some("node2".to_string()));
    }

    #[test]
    fn percent_encodes_only_slash_in_path_component() {
        let u = url(EntityType::AuthGroup, "", None, &["team/ops"]).unwrap();
        assert_eq!(u, "/1.0/auth/groups/team%2Fops");
        let parsed = parse(&u).unwrap();
        assert_eq!(parsed.path_args, vec!["team/ops".to_string()]);
    }

    #[test]
    fn wrong_arity_is_url_shape_error() {
        let err = url(EntityType::Instance, "default", None, &[]).unwrap_err();
        assert!(matches!(err, AuthzError::UrlShape(_)));
    }

    #[test]
    fn garbage_path_is_url_parse_error() {
        let err = parse("/1.0/not-a-real-collection/thing").unwrap_err();
        assert!(matches!(err, AuthzError::UrlParse(_)));
    }

    #[test]
    fn project_scoped_missing_query_project_is_parse_error() {
        let err = parse("/1.0/instances/c1").unwrap_err();
        assert!(matches!(err, AuthzError::UrlParse(_)));
    }
}
