//! Authorization model: a declarative document associating each
//! object type with a set of relations and their rewrite rules.
//!
//! Expressed as data (a `HashMap` built once by [`Model::standard`])
//! rather than as inlined dispatch or reflection. Drivers/tests can swap
//! in a different [`Model`] without recompiling the engine.

use std::collections::HashMap;

/// A relation's rewrite rule.
#[derive(Debug, Clone)]
pub enum RelationDef {
    /// Satisfied directly by a stored tuple `(user, relation, object)`.
    This,
    /// Satisfied iff the user satisfies `rel` on the *same* object.
    ComputedUserset(&'static str),
    /// For each stored tuple `(X, parent_relation, object)`, a
    /// containment tuple whose `user` field names the parent `X` of
    /// `parent_type`, satisfied iff the user satisfies `child_relation`
    /// on `X`. Used to propagate permissions from a project to its
    /// contained resources, and from the server to its projects.
    TupleToUserset { parent_relation: &'static str, parent_type: &'static str, child_relation: &'static str },
    Union(Vec<RelationDef>),
    Intersection(Vec<RelationDef>),
    Difference { base: Box<RelationDef>, subtract: Box<RelationDef> },
}

impl RelationDef {
    pub fn union(defs: impl IntoIterator<Item = RelationDef>) -> RelationDef {
        RelationDef::Union(defs.into_iter().collect())
    }

    fn computed(rel: &'static str) -> RelationDef {
        RelationDef::ComputedUserset(rel)
    }

    fn from_project(child_relation: &'static str) -> RelationDef {
        RelationDef::TupleToUserset { parent_relation: "project", parent_type: "project", child_relation }
    }

    fn from_server(child_relation: &'static str) -> RelationDef {
        RelationDef::TupleToUserset { parent_relation: "server", parent_type: "server", child_relation }
    }
}

/// A type's full set of relation definitions.
#[derive(Debug, Clone, Default)]
pub struct TypeDef {
    pub relations: HashMap<&'static str, RelationDef>,
}

impl TypeDef {
    fn new(relations: impl IntoIterator<Item = (&'static str, RelationDef)>) -> Self {
        Self { relations: relations.into_iter().collect() }
    }
}

/// The full declarative authorization model.
#[derive(Debug, Clone)]
pub struct Model {
    pub schema_version: &'static str,
    pub types: HashMap<&'static str, TypeDef>,
}

impl Model {
    pub fn relation(&self, entity_type: &str, relation: &str) -> Option<&RelationDef> {
        self.types.get(entity_type)?.relations.get(relation)
    }

    /// The concrete model: `auth_group#member`; the project/server role
    /// hierarchy; per-resource-type propagation from `project`; and the
    /// instance `user`/`operator` verb family.
    pub fn standard() -> Self {
        let mut types: HashMap<&'static str, TypeDef> = HashMap::new();

        types.insert("auth_group", TypeDef::new([("member", RelationDef::This)]));

        types.insert(
            "server",
            TypeDef::new([
                ("admin", RelationDef::This),
                ("can_view", RelationDef::union([RelationDef::This, RelationDef::computed("admin")])),
                ("can_edit", RelationDef::union([RelationDef::This, RelationDef::computed("admin")])),
                ("can_delete", RelationDef::union([RelationDef::This, RelationDef::computed("admin")])),
                ("can_view_resources", RelationDef::union([RelationDef::This, RelationDef::computed("admin")])),
                ("can_view_metrics", RelationDef::union([RelationDef::This, RelationDef::computed("admin")])),
                ("can_create_projects", RelationDef::union([RelationDef::This, RelationDef::computed("admin")])),
                ("can_create_storage_pools", RelationDef::union([RelationDef::This, RelationDef::computed("admin")])),
                ("can_create_certificates", RelationDef::union([RelationDef::This, RelationDef::computed("admin")])),
                (
                    "can_override_cluster_target_restriction",
                    RelationDef::union([RelationDef::This, RelationDef::computed("admin")]),
                ),
                (
                    "can_view_privileged_events",
                    RelationDef::union([RelationDef::This, RelationDef::computed("admin")]),
                ),
            ]),
        );

        // project#<role> is a union of a direct grant and "admin on the
        // containing server" (propagated via the `server` tuple-to-userset).
        let mut project_relations: Vec<(&'static str, RelationDef)> = vec![
            ("operator", RelationDef::union([RelationDef::This, RelationDef::from_server("admin")])),
            ("viewer", RelationDef::union([RelationDef::This, RelationDef::from_server("admin")])),
            (
                "admin",
                RelationDef::union([RelationDef::This, RelationDef::from_server("admin")]),
            ),
            (
                "can_view",
                RelationDef::union([
                    RelationDef::This,
                    RelationDef::computed("viewer"),
                    RelationDef::computed("operator"),
                    RelationDef::computed("admin"),
                    RelationDef::from_server("admin"),
                ]),
            ),
            (
                "can_edit",
                RelationDef::union([RelationDef::This, RelationDef::computed("admin"), RelationDef::from_server("admin")]),
            ),
            (
                "can_delete",
                RelationDef::union([RelationDef::This, RelationDef::computed("admin"), RelationDef::from_server("admin")]),
            ),
            (
                "can_view_events",
                RelationDef::union([RelationDef::This, RelationDef::computed("operator"), RelationDef::computed("admin")]),
            ),
            (
                "can_view_operations",
                RelationDef::union([RelationDef::This, RelationDef::computed("operator"), RelationDef::computed("admin")]),
            ),
            (
                "can_view_metrics",
                RelationDef::union([RelationDef::This, RelationDef::computed("operator"), RelationDef::computed("admin")]),
            ),
        ];
        for create_ent in [
            "can_create_images",
            "can_create_image_aliases",
            "can_create_instances",
            "can_create_networks",
            "can_create_network_acls",
            "can_create_network_zones",
            "can_create_profiles",
            "can_create_storage_volumes",
            "can_create_storage_buckets",
        ] {
            project_relations.push((
                create_ent,
                RelationDef::union([RelationDef::This, RelationDef::computed("operator"), RelationDef::computed("admin")]),
            ));
        }
        types.insert("project", TypeDef::new(project_relations));

        // Resource-contained types: default triple propagated from their
        // containing project, plus (for instance/storage_volume) the
        // domain-specific verbs.
        for contained in [
            "image",
            "image_alias",
            "network",
            "network_acl",
            "network_zone",
            "profile",
            "storage_bucket",
        ] {
            types.insert(
                contained,
                TypeDef::new([
                    ("can_view", RelationDef::union([RelationDef::This, RelationDef::from_project("can_view")])),
                    ("can_edit", RelationDef::union([RelationDef::This, RelationDef::from_project("can_edit")])),
                    ("can_delete", RelationDef::union([RelationDef::This, RelationDef::from_project("can_delete")])),
                ]),
            );
        }

        types.insert(
            "storage_volume",
            TypeDef::new([
                ("can_view", RelationDef::union([RelationDef::This, RelationDef::from_project("can_view")])),
                ("can_edit", RelationDef::union([RelationDef::This, RelationDef::from_project("can_edit")])),
                ("can_delete", RelationDef::union([RelationDef::This, RelationDef::from_project("can_delete")])),
                (
                    "can_manage_snapshots",
                    RelationDef::union([RelationDef::This, RelationDef::computed("can_edit")]),
                ),
                (
                    "can_manage_backups",
                    RelationDef::union([RelationDef::This, RelationDef::computed("can_edit")]),
                ),
            ]),
        );

        types.insert(
            "instance",
            TypeDef::new([
                ("user", RelationDef::union([RelationDef::This, RelationDef::from_project("operator")])),
                ("operator", RelationDef::union([RelationDef::This, RelationDef::from_project("operator")])),
                (
                    "can_view",
                    RelationDef::union([RelationDef::This, RelationDef::computed("user"), RelationDef::from_project("can_view")]),
                ),
                (
                    "can_edit",
                    RelationDef::union([RelationDef::This, RelationDef::computed("operator"), RelationDef::from_project("can_edit")]),
                ),
                (
                    "can_delete",
                    RelationDef::union([RelationDef::This, RelationDef::computed("operator"), RelationDef::from_project("can_delete")]),
                ),
                (
                    "can_update_state",
                    RelationDef::union([RelationDef::This, RelationDef::computed("operator")]),
                ),
                ("can_exec", RelationDef::union([RelationDef::This, RelationDef::computed("operator")])),
                (
                    "can_manage_snapshots",
                    RelationDef::union([RelationDef::This, RelationDef::computed("operator")]),
                ),
                (
                    "can_manage_backups",
                    RelationDef::union([RelationDef::This, RelationDef::computed("operator")]),
                ),
                (
                    "can_operate_instances",
                    RelationDef::union([RelationDef::This, RelationDef::computed("operator")]),
                ),
                (
                    "can_view_console",
                    RelationDef::union([RelationDef::This, RelationDef::computed("operator")]),
                ),
                (
                    "can_view_events",
                    RelationDef::union([RelationDef::This, RelationDef::computed("user"), RelationDef::from_project("can_view_events")]),
                ),
            ]),
        );

        Self { schema_version: "1", types }
    }
}
