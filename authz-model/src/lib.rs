//! Declarative relationship-based authorization model and evaluation engine.
//!
//! This crate provides Zanzibar-style relationship-based access control
//! (ReBAC) for a clustered container/VM management daemon:
//!
//! - **Objects** are named by canonical resource URLs (`server:/1.0`,
//!   `project:/1.0/projects/default`, `instance:/1.0/instances/vm1?project=default`).
//! - **Users** have **relations** to **objects**, either directly or via a
//!   `group:<name>#member` userset.
//! - A fixed [`Model`] describes how each relation rewrites to a boolean
//!   combination of direct tuples, computed usersets, and containment
//!   edges (tuple-to-userset), and [`RelationshipEngine`] evaluates it.
//!
//! # Setup
//!
//! ```ignore
//! use authz_model::{InMemoryTupleStore, Model, RelationshipEngine};
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryTupleStore::new());
//! let engine = RelationshipEngine::new(store, Arc::new(Model::standard()));
//!
//! let allowed = engine
//!     .check("identity:/1.0/auth/identities/alice", "can_view", "server:/1.0", &Default::default())
//!     .await?;
//! ```
//!
//! # Resource URLs
//!
//! [`resource::url`] and [`resource::parse`] convert between an
//! [`EntityType`] plus its path/query arguments and the canonical URL
//! string stored as a tuple's `object`:
//!
//! ```ignore
//! use authz_model::{EntityType, resource};
//!
//! let url = resource::url(EntityType::Instance, Some("default"), None, &["vm1"])?;
//! assert_eq!(url, "/1.0/instances/vm1?project=default");
//! ```
//!
//! # Testing
//!
//! Use [`InMemoryTupleStore::seeded`] to build a store with fixture tuples
//! without ever awaiting a write:
//!
//! ```ignore
//! use authz_model::{InMemoryTupleStore, Tuple};
//!
//! let store = InMemoryTupleStore::seeded([
//!     Tuple::new("identity:/1.0/auth/identities/alice", "admin", "server:/1.0"),
//! ]);
//! ```

pub mod engine;
pub mod entitlement;
pub mod error;
pub mod model;
pub mod resource;
pub mod tuple;

pub use engine::{ContextualTuples, RelationshipEngine};
pub use entitlement::{entitlements_of, validate as validate_entitlement};
pub use error::AuthzError;
pub use model::{Model, RelationDef, TypeDef};
pub use resource::{parse as parse_resource, url as resource_url, EntityType, ParsedResource};
pub use tuple::{InMemoryTupleStore, Tuple, TupleFilter, TupleStore, WriteError};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::engine::{ContextualTuples, RelationshipEngine};
    pub use crate::error::AuthzError;
    pub use crate::model::Model;
    pub use crate::resource::EntityType;
    pub use crate::tuple::{InMemoryTupleStore, Tuple, TupleStore};
}
