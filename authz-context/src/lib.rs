//! Request-context extraction, identity cache interface, and the
//! group/permission data model for a relationship-based authorization
//! core.
//!
//! This crate deliberately does not depend on any HTTP framework: the
//! host builds a [`RequestValues`] from its own request representation
//! (headers, query string, TLS state) and passes it to
//! [`Requestor::from_values`].
//!
//! ```ignore
//! use authz_context::{RequestValues, Requestor};
//!
//! let values = RequestValues {
//!     trusted: true,
//!     protocol: "unix".to_string(),
//!     username: "root".to_string(),
//!     ..Default::default()
//! };
//! let requestor = Requestor::from_values(&values)?;
//! assert!(requestor.is_internal_or_unix);
//! ```

pub mod group;
pub mod identity;
pub mod requestor;

pub use group::{Group, GroupChangeEvent, GroupManagementHooks, Permission};
pub use identity::{AuthenticationMethod, Identity, IdentityCache, IdentityType, InMemoryIdentityCache};
pub use requestor::{RequestValues, Requestor};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::group::{Group, GroupChangeEvent, GroupManagementHooks, Permission};
    pub use crate::identity::{AuthenticationMethod, Identity, IdentityCache, IdentityType, InMemoryIdentityCache};
    pub use crate::requestor::{RequestValues, Requestor};
}
