use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use warden_core::PermissionPattern;

use crate::error::Result;

/// Static role-assignment table: role name to permission patterns
///
/// Deserializes from a TOML/JSON map of role name to pattern strings; an
/// empty pattern fails deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleAssignments {
    roles: BTreeMap<String, Vec<PermissionPattern>>,
}

impl RoleAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a role, parsing each pattern
    pub fn with_role<S: AsRef<str>>(
        mut self,
        role: impl Into<String>,
        patterns: &[S],
    ) -> Result<Self> {
        let parsed = patterns
            .iter()
            .map(|p| PermissionPattern::parse(p.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.roles.insert(role.into(), parsed);
        Ok(self)
    }

    /// Patterns declared for a role
    pub fn get(&self, role: &str) -> Option<&[PermissionPattern]> {
        self.roles.get(role).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<PermissionPattern>)> {
        self.roles.iter()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
