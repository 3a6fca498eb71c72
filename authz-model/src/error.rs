//! Error taxonomy for the authorization core.
//!
//! One enum covers every failure mode any component can surface. Drivers
//! translate it to a caller-visible status at their boundary; this crate
//! never depends on an HTTP types crate to do so.

use std::fmt;

/// Errors that can occur while evaluating or constructing authorization
/// decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// Authenticated, not permitted, but may view the resource.
    Forbidden(String),
    /// Either the resource doesn't exist, or the caller lacks `can_view`.
    /// These are indistinguishable to the caller by design.
    NotFound(String),
    /// The entitlement is not defined for the target entity type.
    BadEntitlement { entity_type: String, entitlement: String },
    /// A resource URL could not be parsed into a canonical object.
    UrlParse(String),
    /// A resource URL cannot be constructed for the given arguments.
    UrlShape(String),
    /// The identity was absent from the identity cache when required.
    IdentityLookup(String),
    /// A trusted request was missing a required context key.
    MissingContext(String),
    /// Tuple-store failure, model-write failure, or evaluation timeout.
    Internal(String),
}

impl AuthzError {
    /// The HTTP-status-shaped hint a consuming HTTP layer should map this
    /// error to. Kept as a plain `(u16, &str)` pair rather than an
    /// `http::StatusCode` since HTTP is out of scope for this core.
    pub fn status_hint(&self) -> (u16, &'static str) {
        match self {
            AuthzError::BadEntitlement { .. } => (400, "bad entitlement"),
            AuthzError::UrlParse(_) => (400, "url parse"),
            AuthzError::UrlShape(_) => (400, "url shape"),
            AuthzError::Forbidden(_) => (403, "forbidden"),
            AuthzError::NotFound(_) => (404, "not found"),
            AuthzError::IdentityLookup(_) => (500, "identity lookup"),
            AuthzError::MissingContext(_) => (500, "missing context"),
            AuthzError::Internal(_) => (500, "internal"),
        }
    }

    /// `true` for errors that must never be confused with a 500. The
    /// resource-masking rule relies on this to decide whether to
    /// propagate a tuple-store `NotFound` unconditionally.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AuthzError::NotFound(_))
    }
}

impl fmt::Display for AuthzError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthzError::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            AuthzError::NotFound(msg) => write!(f, "not found: {msg}"),
            AuthzError::BadEntitlement { entity_type, entitlement } => {
                write!(f, "entitlement {entitlement:?} is not valid for type {entity_type:?}")
            }
            AuthzError::UrlParse(msg) => write!(f, "could not parse resource url: {msg}"),
            AuthzError::UrlShape(msg) => write!(f, "could not construct resource url: {msg}"),
            AuthzError::IdentityLookup(msg) => write!(f, "identity lookup failed: {msg}"),
            AuthzError::MissingContext(msg) => write!(f, "missing request context: {msg}"),
            AuthzError::Internal(msg) => write!(f, "internal authorization error: {msg}"),
        }
    }
}

impl std::error::Error for AuthzError {}
