//! Request-scoped context extraction.
//!
//! [`RequestValues`] is a small typed struct the host builds from its own
//! request representation, never a generic string map, so extraction
//! is infallible except for the one case the contract names:
//! [`AuthzError::MissingContext`] on a trusted request missing `protocol`
//! or `username`.

use authz_model::AuthzError;

/// The raw values a trusted (or untrusted) request carries, before
/// [`Requestor::from_values`] applies the forwarding and PKI rules.
#[derive(Debug, Clone, Default)]
pub struct RequestValues {
    pub trusted: bool,
    pub protocol: String,
    pub username: String,
    pub forwarded_protocol: Option<String>,
    pub forwarded_username: Option<String>,
    pub identity_provider_groups: Option<Vec<String>>,
    pub forwarded_identity_provider_groups: Option<Vec<String>>,
    pub all_projects: bool,
    pub project: Option<String>,
    /// `true` when the server was started with a CA file present: the
    /// deployment-wide PKI-mode bit, not something derived per-request.
    pub server_ca_file_present: bool,
}

/// The normalized view the drivers consume.
#[derive(Debug, Clone)]
pub struct Requestor {
    pub trusted: bool,
    pub protocol: String,
    pub username: String,
    pub identity_provider_groups: Vec<String>,
    pub all_projects: bool,
    pub project: String,
    pub is_pki: bool,
    pub is_internal_or_unix: bool,
}

const DEFAULT_PROJECT: &str = "default";

impl Requestor {
    /// Apply the extraction rules verbatim: an untrusted request carries
    /// only the `trusted` bit; everything else is forwarding-aware.
    pub fn from_values(values: &RequestValues) -> Result<Self, AuthzError> {
        if !values.trusted {
            return Ok(Self {
                trusted: false,
                protocol: String::new(),
                username: String::new(),
                identity_provider_groups: Vec::new(),
                all_projects: false,
                project: DEFAULT_PROJECT.to_string(),
                is_pki: false,
                is_internal_or_unix: false,
            });
        }

        if values.protocol.is_empty() {
            return Err(AuthzError::MissingContext("protocol".to_string()));
        }
        if values.username.is_empty() {
            return Err(AuthzError::MissingContext("username".to_string()));
        }

        let effective_protocol = if values.protocol == "cluster" {
            values.forwarded_protocol.as_deref().filter(|p| !p.is_empty()).unwrap_or(&values.protocol)
        } else {
            values.protocol.as_str()
        };

        let effective_username = if values.protocol == "cluster" {
            values.forwarded_username.as_deref().filter(|u| !u.is_empty()).unwrap_or(&values.username)
        } else {
            values.username.as_str()
        };

        let effective_groups = if values.protocol == "cluster" {
            values
                .forwarded_identity_provider_groups
                .clone()
                .filter(|g| !g.is_empty())
                .or_else(|| values.identity_provider_groups.clone())
                .unwrap_or_default()
        } else {
            values.identity_provider_groups.clone().unwrap_or_default()
        };

        let is_pki = effective_protocol == "tls" && values.server_ca_file_present;

        let is_internal_or_unix = effective_protocol == "unix"
            || (values.protocol == "cluster"
                && matches!(values.forwarded_protocol.as_deref(), Some("unix") | Some("cluster") | Some("") | None));

        Ok(Self {
            trusted: true,
            protocol: effective_protocol.to_string(),
            username: effective_username.to_string(),
            identity_provider_groups: effective_groups,
            all_projects: values.all_projects,
            project: values.project.clone().unwrap_or_else(|| DEFAULT_PROJECT.to_string()),
            is_pki,
            is_internal_or_unix,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trusted(protocol: &str, username: &str) -> RequestValues {
        RequestValues { trusted: true, protocol: protocol.to_string(), username: username.to_string(), ..Default::default() }
    }

    #[test]
    fn untrusted_request_ignores_every_other_field() {
        let values = RequestValues { trusted: false, protocol: "tls".to_string(), ..Default::default() };
        let req = Requestor::from_values(&values).unwrap();
        assert!(!req.trusted);
        assert!(req.protocol.is_empty());
    }

    #[test]
    fn trusted_request_without_protocol_is_missing_context() {
        let values = RequestValues { trusted: true, ..Default::default() };
        let err = Requestor::from_values(&values).unwrap_err();
        assert!(matches!(err, AuthzError::MissingContext(_)));
    }

    #[test]
    fn unix_socket_caller_is_internal() {
        let req = Requestor::from_values(&trusted("unix", "root")).unwrap();
        assert!(req.is_internal_or_unix);
        assert!(!req.is_pki);
    }

    #[test]
    fn cluster_forwarding_uses_forwarded_fields_when_present() {
        let mut values = trusted("cluster", "node-2");
        values.forwarded_protocol = Some("oidc".to_string());
        values.forwarded_username = Some("alice@example.com".to_string());
        let req = Requestor::from_values(&values).unwrap();
        assert_eq!(req.protocol, "oidc");
        assert_eq!(req.username, "alice@example.com");
        assert!(!req.is_internal_or_unix);
    }

    #[test]
    fn cluster_forwarding_empty_forwarded_protocol_falls_back_to_cluster() {
        let mut values = trusted("cluster", "node-2");
        values.forwarded_protocol = Some(String::new());
        let req = Requestor::from_values(&values).unwrap();
        assert_eq!(req.protocol, "cluster");
        assert!(req.is_internal_or_unix);
    }

    #[test]
    fn tls_with_ca_file_present_is_pki() {
        let mut values = trusted("tls", "alice");
        values.server_ca_file_present = true;
        let req = Requestor::from_values(&values).unwrap();
        assert!(req.is_pki);
    }

    #[test]
    fn project_defaults_when_absent() {
        let req = Requestor::from_values(&trusted("unix", "root")).unwrap();
        assert_eq!(req.project, "default");
    }
}
