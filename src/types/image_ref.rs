// ABOUTME: Container image reference parsing and rendering.
// ABOUTME: Handles nginx, org/repo:tag, registry/org/repo@digest and registry:port forms.

use std::fmt;
use thiserror::Error;

/// Registry host used when a reference carries no explicit registry.
pub const DEFAULT_REGISTRY: &str = "docker.io";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0}")]
    InvalidChar(char),

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),
}

/// Parsed identity of a container image.
///
/// Immutable once parsed; `full_name` is a pure function of the fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    registry: Option<String>,
    organization: Option<String>,
    name: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageReference {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        for c in input.chars() {
            if !c.is_ascii_alphanumeric()
                && c != '/'
                && c != ':'
                && c != '.'
                && c != '-'
                && c != '_'
                && c != '@'
            {
                return Err(ParseImageRefError::InvalidChar(c));
            }
        }

        let (without_digest, digest) = match input.rsplit_once('@') {
            Some((before, after)) if !after.is_empty() => (before, Some(after.to_string())),
            Some(_) => return Err(ParseImageRefError::InvalidFormat(input.to_string())),
            None => (input, None),
        };

        // A colon is a tag separator only when it follows the last slash,
        // otherwise it belongs to a registry port.
        let (without_tag, tag) = match without_digest.rsplit_once(':') {
            Some((before, after)) if !after.contains('/') => {
                if after.is_empty() {
                    return Err(ParseImageRefError::InvalidFormat(input.to_string()));
                }
                (before, Some(after.to_string()))
            }
            _ => (without_digest, None),
        };

        let parts: Vec<&str> = without_tag.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(ParseImageRefError::InvalidFormat(input.to_string()));
        }

        let (registry, organization, name) = match parts.as_slice() {
            [name] => (None, None, (*name).to_string()),
            [first, name] if looks_like_registry(first) => {
                (Some((*first).to_string()), None, (*name).to_string())
            }
            [org, name] => (None, Some((*org).to_string()), (*name).to_string()),
            [first, org, rest @ ..] if looks_like_registry(first) => (
                Some((*first).to_string()),
                Some((*org).to_string()),
                rest.join("/"),
            ),
            [org, rest @ ..] => (None, Some((*org).to_string()), rest.join("/")),
            [] => return Err(ParseImageRefError::InvalidFormat(input.to_string())),
        };

        Ok(Self {
            registry,
            organization,
            name: name.to_lowercase(),
            tag,
            digest,
        })
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    /// Registry host, falling back to Docker Hub.
    pub fn registry_or_default(&self) -> &str {
        self.registry.as_deref().unwrap_or(DEFAULT_REGISTRY)
    }

    pub fn organization(&self) -> Option<&str> {
        self.organization.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// `registry/org/name`, without tag or digest.
    pub fn repository(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(3);
        if let Some(ref registry) = self.registry {
            parts.push(registry);
        }
        if let Some(ref org) = self.organization {
            parts.push(org);
        }
        parts.push(&self.name);
        parts.join("/")
    }

    /// Repository with the registry and Docker Hub's `library` namespace made explicit.
    pub fn qualified_repository(&self) -> String {
        let registry = self.registry_or_default();
        let org = match (&self.organization, &self.registry) {
            (Some(org), _) => Some(org.as_str()),
            (None, None) => Some("library"),
            (None, Some(r)) if r == DEFAULT_REGISTRY => Some("library"),
            (None, Some(_)) => None,
        };
        match org {
            Some(org) => format!("{registry}/{org}/{}", self.name),
            None => format!("{registry}/{}", self.name),
        }
    }

    /// Full reference. A digest wins over a tag when both are present.
    pub fn full_name(&self) -> String {
        let repository = self.repository();
        match (&self.digest, &self.tag) {
            (Some(digest), _) => format!("{repository}@{digest}"),
            (None, Some(tag)) => format!("{repository}:{tag}"),
            (None, None) => repository,
        }
    }

    /// Whether the image lives on Docker Hub, explicitly or implicitly.
    pub fn is_default_registry(&self, aliases: &[String]) -> bool {
        match self.registry.as_deref() {
            None => true,
            Some(registry) => aliases.iter().any(|alias| alias == registry),
        }
    }

    pub fn with_tag(&self, tag: &str) -> Self {
        Self {
            tag: Some(tag.to_string()),
            digest: None,
            ..self.clone()
        }
    }

    pub fn with_registry(&self, registry: &str, organization: Option<&str>) -> Self {
        Self {
            registry: Some(registry.to_string()),
            organization: organization.map(str::to_string),
            ..self.clone()
        }
    }

    pub fn is_vendor(&self, vendor_domain: &str) -> bool {
        self.registry.as_deref() == Some(vendor_domain)
    }

    /// Customer organization of a vendor image, `None` for the vendor's own
    /// public and private namespaces.
    pub fn vendor_org(&self, vendor_domain: &str, reserved: &[&str]) -> Option<&str> {
        if !self.is_vendor(vendor_domain) {
            return None;
        }
        self.organization
            .as_deref()
            .filter(|org| !reserved.contains(org))
    }

    /// Rewrites `vendor/<org>/<name>` into the vendor's private namespace.
    pub fn to_private(&self, vendor_domain: &str, private_org: &str, public_org: &str) -> Option<Self> {
        self.vendor_org(vendor_domain, &[private_org, public_org])?;
        Some(self.with_registry(vendor_domain, Some(private_org)))
    }
}

fn looks_like_registry(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

impl std::str::FromStr for ImageReference {
    type Err = ParseImageRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
