//! Driver abstraction over the relationship engine: decides, for every
//! inbound request, whether the caller may perform a specific action on
//! a specific resource, and produces list-filter closures for endpoints
//! that return many resources at once.
//!
//! Two interchangeable drivers are provided:
//!
//! - [`CertificateDriver`] (`tls`): a lightweight allow-list decision
//!   procedure for TLS-certificate identities restricted to an
//!   enumerated project list.
//! - [`FineGrainedDriver`] (`embedded-openfga`): evaluates the
//!   relationship engine, delegating TLS callers back to the
//!   certificate driver (composition, not inheritance) since certificate
//!   project restriction doesn't fit the relational model.
//!
//! ```ignore
//! use authz::{registry::DriverRegistry, Authorizer};
//! use std::sync::Arc;
//!
//! let registry = DriverRegistry::new();
//! let driver = registry.load("embedded-openfga", identities, Some(store)).await?;
//! driver.check_permission(&ctx, "/1.0/instances/c1?project=default", "can_exec").await?;
//! ```

pub mod cert_driver;
pub mod finegrained_driver;
pub mod registry;

pub use authz_model::AuthzError;
pub use cert_driver::CertificateDriver;
pub use finegrained_driver::FineGrainedDriver;
pub use registry::{Driver, DriverRegistry};

use authz_context::requestor::Requestor;
use authz_model::{EntityType, TupleStore};
use std::future::Future;

/// The external interface every driver offers.
///
/// `check_permission_without_effective_project` and its list-filter
/// counterpart skip the effective-project URL rewrite the fine-grained
/// driver otherwise applies. The certificate driver never performs that
/// rewrite in the first place, so for it the two variants coincide.
/// This asymmetry is intentional, not an oversight.
pub trait Authorizer: Send + Sync {
    fn driver(&self) -> &'static str;

    fn check_permission(&self, ctx: &Requestor, entity_url: &str, entitlement: &str) -> impl Future<Output = Result<(), AuthzError>> + Send;

    fn check_permission_without_effective_project(
        &self,
        ctx: &Requestor,
        entity_url: &str,
        entitlement: &str,
    ) -> impl Future<Output = Result<(), AuthzError>> + Send;

    fn get_permission_checker(
        &self,
        ctx: &Requestor,
        entitlement: &str,
        entity_type: EntityType,
    ) -> impl Future<Output = Result<Box<dyn Fn(&str) -> bool + Send + Sync>, AuthzError>> + Send;

    fn get_permission_checker_without_effective_project(
        &self,
        ctx: &Requestor,
        entitlement: &str,
        entity_type: EntityType,
    ) -> impl Future<Output = Result<Box<dyn Fn(&str) -> bool + Send + Sync>, AuthzError>> + Send;
}

impl<S: TupleStore> Authorizer for Driver<S> {
    fn driver(&self) -> &'static str {
        self.name()
    }

    async fn check_permission(&self, ctx: &Requestor, entity_url: &str, entitlement: &str) -> Result<(), AuthzError> {
        match self {
            Driver::Certificate(d) => d.check_permission(ctx, entity_url, entitlement).await,
            Driver::FineGrained(d) => d.check_permission(ctx, entity_url, entitlement).await,
        }
    }

    async fn check_permission_without_effective_project(&self, ctx: &Requestor, entity_url: &str, entitlement: &str) -> Result<(), AuthzError> {
        match self {
            Driver::Certificate(d) => d.check_permission(ctx, entity_url, entitlement).await,
            Driver::FineGrained(d) => d.check_permission_without_effective_project(ctx, entity_url, entitlement).await,
        }
    }

    async fn get_permission_checker(
        &self,
        ctx: &Requestor,
        entitlement: &str,
        entity_type: EntityType,
    ) -> Result<Box<dyn Fn(&str) -> bool + Send + Sync>, AuthzError> {
        match self {
            Driver::Certificate(d) => d.permission_checker(ctx, entitlement, entity_type).await,
            Driver::FineGrained(d) => d.permission_checker(ctx, entitlement, entity_type).await,
        }
    }

    async fn get_permission_checker_without_effective_project(
        &self,
        ctx: &Requestor,
        entitlement: &str,
        entity_type: EntityType,
    ) -> Result<Box<dyn Fn(&str) -> bool + Send + Sync>, AuthzError> {
        match self {
            Driver::Certificate(d) => d.permission_checker(ctx, entitlement, entity_type).await,
            Driver::FineGrained(d) => d.permission_checker_without_effective_project(ctx, entitlement, entity_type).await,
        }
    }
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::registry;
    pub use crate::{Authorizer, CertificateDriver, Driver, DriverRegistry, FineGrainedDriver};
    pub use authz_model::AuthzError;
}
