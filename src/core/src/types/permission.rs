//! Permission catalog types and permission patterns

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::scope::Scope;

/// Catalog entry: a named permission living in exactly one scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    /// Unique permission identifier
    pub id: String,

    /// Scope the permission belongs to
    pub scope: Scope,

    /// Permission name (e.g., "user:read")
    pub name: String,

    /// Human readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Permission {
    /// Create a new permission
    pub fn new(id: impl Into<String>, scope: Scope, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scope,
            name: name.into(),
            description: None,
        }
    }

    /// Add a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Role definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role {
    /// Unique role identifier
    pub id: String,

    /// Scope the role belongs to
    pub scope: Scope,

    /// Role name, unique within its scope (e.g., "admin")
    pub name: String,
}

impl Role {
    /// Create a new role
    pub fn new(id: impl Into<String>, scope: Scope, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scope,
            name: name.into(),
        }
    }
}

/// Result of an idempotent grant write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    /// A new (role, permission) row was written
    Created,
    /// The grant already existed; nothing was written
    AlreadyGranted,
}

/// Errors produced while parsing a permission pattern
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatternError {
    /// Empty pattern string
    #[error("Permission pattern cannot be empty")]
    Empty,
}

/// Permission pattern used by role assignment tables
///
/// - `*` matches every permission in the scope
/// - `<prefix>*` matches names starting with `<prefix>` (byte prefix, case-sensitive)
/// - anything else is an exact name; a `*` that is not the last character is literal
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PermissionPattern {
    /// Every permission in scope
    All,
    /// Name prefix (without the trailing `*`)
    Prefix(String),
    /// Exact name
    Exact(String),
}

impl PermissionPattern {
    /// Parse a pattern string
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }

        if pattern == "*" {
            return Ok(PermissionPattern::All);
        }

        if let Some(prefix) = pattern.strip_suffix('*') {
            return Ok(PermissionPattern::Prefix(prefix.to_string()));
        }

        Ok(PermissionPattern::Exact(pattern.to_string()))
    }

    /// Check whether a permission name matches this pattern
    pub fn matches(&self, name: &str) -> bool {
        match self {
            PermissionPattern::All => true,
            PermissionPattern::Prefix(prefix) => name.as_bytes().starts_with(prefix.as_bytes()),
            PermissionPattern::Exact(exact) => name == exact,
        }
    }

    /// Whether this pattern can match more than one permission
    pub fn is_wildcard(&self) -> bool {
        !matches!(self, PermissionPattern::Exact(_))
    }
}

impl fmt::Display for PermissionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionPattern::All => write!(f, "*"),
            PermissionPattern::Prefix(prefix) => write!(f, "{}*", prefix),
            PermissionPattern::Exact(exact) => write!(f, "{}", exact),
        }
    }
}

impl FromStr for PermissionPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PermissionPattern {
    type Error = PatternError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PermissionPattern> for String {
    fn from(pattern: PermissionPattern) -> Self {
        pattern.to_string()
    }
}
