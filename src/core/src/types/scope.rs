//! Tenant / container scope
//!
//! Permission names and grants are namespaced by scope. Two scopes are equal
//! only when both the kind and the identifier match, so `tenant:acme` and
//! `container:acme` never share permissions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Namespace boundary for permissions, roles and grants
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Scope {
    /// Tenant-wide scope
    Tenant(String),
    /// Container scope nested in a tenant
    Container(String),
}

impl Scope {
    /// Create a tenant scope
    pub fn tenant(id: impl Into<String>) -> Self {
        Scope::Tenant(id.into())
    }

    /// Create a container scope
    pub fn container(id: impl Into<String>) -> Self {
        Scope::Container(id.into())
    }

    /// Scope kind as stored by persistence backends
    pub fn kind(&self) -> &'static str {
        match self {
            Scope::Tenant(_) => "tenant",
            Scope::Container(_) => "container",
        }
    }

    /// Scope identifier
    pub fn id(&self) -> &str {
        match self {
            Scope::Tenant(id) | Scope::Container(id) => id,
        }
    }

    /// Rebuild a scope from its stored `(kind, id)` pair
    pub fn from_parts(kind: &str, id: impl Into<String>) -> Option<Self> {
        match kind {
            "tenant" => Some(Scope::Tenant(id.into())),
            "container" => Some(Scope::Container(id.into())),
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| format!("scope '{}' must be '<kind>:<id>'", s))?;

        if id.is_empty() {
            return Err(format!("scope '{}' has an empty identifier", s));
        }

        Scope::from_parts(kind, id).ok_or_else(|| format!("unknown scope kind '{}'", kind))
    }
}
