//! Schema references, secondary index targets and the duplicate entity policy.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{ConfigError, HTTP_REDIRECT_BINDING};

/// Which structural schema an aggregate is validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaRef {
    /// SAML 2.0 metadata (also accepted as `ws-federation`, which includes it).
    #[default]
    SamlMetadata,
    /// SAML 2.0 protocol messages.
    SamlProtocol,
}

impl SchemaRef {
    /// Canonical name of the schema.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SamlMetadata => "saml-metadata",
            Self::SamlProtocol => "saml-protocol",
        }
    }
}

impl std::fmt::Display for SchemaRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaRef {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "saml-metadata" | "metadata" | "ws-federation" => Ok(Self::SamlMetadata),
            "saml-protocol" | "protocol" => Ok(Self::SamlProtocol),
            _ => Err(ConfigError::UnknownSchema(s.to_string())),
        }
    }
}

/// A secondary lookup key source: the `Location` of every `endpoint` element
/// under a `role` descriptor of an entity, optionally restricted to one
/// `Binding`.
///
/// Written as `Role/Endpoint` or `Role/Endpoint[binding-uri]`, e.g.
/// `IDPSSODescriptor/SingleSignOnService[urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexTarget {
    /// Local name of the role descriptor element (metadata namespace).
    pub role: String,
    /// Local name of the endpoint element inside the role (metadata namespace).
    pub endpoint: String,
    /// Required `Binding` attribute value, if any.
    pub binding: Option<String>,
}

impl IndexTarget {
    /// Identity-provider single sign-on endpoints using the HTTP-Redirect binding.
    pub fn idp_sso_redirect() -> Self {
        Self {
            role: "IDPSSODescriptor".to_string(),
            endpoint: "SingleSignOnService".to_string(),
            binding: Some(HTTP_REDIRECT_BINDING.to_string()),
        }
    }

    /// The targets used when none are configured.
    pub fn defaults() -> Vec<Self> {
        vec![Self::idp_sso_redirect()]
    }
}

impl Default for IndexTarget {
    fn default() -> Self {
        Self::idp_sso_redirect()
    }
}

impl std::fmt::Display for IndexTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.role, self.endpoint)?;
        if let Some(binding) = &self.binding {
            write!(f, "[{binding}]")?;
        }
        Ok(())
    }
}

impl FromStr for IndexTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidIndexTarget(s.to_string());
        let s = s.trim();

        let (path, binding) = match s.split_once('[') {
            Some((path, rest)) => {
                let binding = rest.strip_suffix(']').ok_or_else(invalid)?;
                if binding.is_empty() || binding.contains(['[', ']']) {
                    return Err(invalid());
                }
                (path, Some(binding.to_string()))
            }
            None => (s, None),
        };

        let (role, endpoint) = path.split_once('/').ok_or_else(invalid)?;
        let is_name = |n: &str| {
            !n.is_empty() && n.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        };
        if !is_name(role) || !is_name(endpoint) {
            return Err(invalid());
        }

        Ok(Self {
            role: role.to_string(),
            endpoint: endpoint.to_string(),
            binding,
        })
    }
}

/// What to do when an `entityID` appears more than once within one feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Last occurrence wins, silently.
    #[default]
    Overwrite,
    /// Last occurrence wins, with a warning.
    Warn,
    /// The feed fails to index.
    Reject,
}

impl std::fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Overwrite => "overwrite",
            Self::Warn => "warn",
            Self::Reject => "reject",
        })
    }
}

impl FromStr for DuplicatePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "warn" => Ok(Self::Warn),
            "reject" | "error" => Ok(Self::Reject),
            _ => Err(ConfigError::UnknownDuplicatePolicy(s.to_string())),
        }
    }
}
