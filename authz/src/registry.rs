//! Driver registry: a process-wide map from driver name to factory.
//!
//! Two factories are always registered, `tls` and `embedded-openfga`,
//! held behind one enum rather than a single trait object, since their
//! `load` steps differ (the fine-grained driver additionally seeds the
//! tuple store with the static authorization model). Each registry
//! instance tracks, per name, whether that driver has already been
//! loaded from it; loading the same name twice from one instance is
//! rejected rather than silently handed a second live driver.

use crate::cert_driver::CertificateDriver;
use crate::finegrained_driver::FineGrainedDriver;
use authz_context::identity::IdentityCache;
use authz_model::{AuthzError, Model, RelationshipEngine, TupleStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

const MODEL_STORE_ID: &str = "authz-core";
const SCHEMA_VERSION: &str = "1";

/// The two interchangeable decision backends.
pub enum Driver<S: TupleStore> {
    Certificate(CertificateDriver),
    FineGrained(FineGrainedDriver<S>),
}

impl<S: TupleStore> Driver<S> {
    pub fn name(&self) -> &'static str {
        match self {
            Driver::Certificate(d) => d.driver_name(),
            Driver::FineGrained(d) => d.driver_name(),
        }
    }
}

enum DriverFactory {
    Certificate,
    FineGrained,
}

struct Slot {
    factory: DriverFactory,
    loaded: OnceCell<()>,
}

/// A process-wide map from driver name to factory, seeded once at
/// construction with the two names this core ships.
pub struct DriverRegistry {
    slots: HashMap<&'static str, Slot>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        let mut slots = HashMap::new();
        slots.insert("tls", Slot { factory: DriverFactory::Certificate, loaded: OnceCell::new() });
        slots.insert("embedded-openfga", Slot { factory: DriverFactory::FineGrained, loaded: OnceCell::new() });
        Self { slots }
    }

    /// Load a named driver. `tls` never touches the tuple store; loading
    /// `embedded-openfga` requires `store` and persists the static model
    /// to it before returning, per the contract that a fine-grained
    /// driver's `load` step always seeds its backing store.
    ///
    /// Re-loading the same name from this registry instance is not
    /// supported; construct a new `DriverRegistry` for each driver the
    /// daemon wants live.
    pub async fn load<S: TupleStore>(
        &self,
        name: &str,
        identities: Arc<dyn IdentityCache>,
        store: Option<Arc<S>>,
    ) -> Result<Driver<S>, AuthzError> {
        let slot = self.slots.get(name).ok_or_else(|| AuthzError::Internal(format!("unknown driver {name:?}")))?;
        if slot.loaded.initialized() {
            return Err(AuthzError::Internal(format!("driver {name:?} was already loaded from this registry")));
        }

        let driver = match slot.factory {
            DriverFactory::Certificate => Driver::Certificate(CertificateDriver::new(identities)),
            DriverFactory::FineGrained => {
                let store = store.ok_or_else(|| AuthzError::Internal("embedded-openfga driver requires a tuple store".to_string()))?;
                store.write_authorization_model(MODEL_STORE_ID, SCHEMA_VERSION).await?;
                let engine = Arc::new(RelationshipEngine::new(store, Arc::new(Model::standard())));
                Driver::FineGrained(FineGrainedDriver::new(identities, engine))
            }
        };
        let _ = slot.loaded.set(());
        Ok(driver)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
