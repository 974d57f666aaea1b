use serde::{Deserialize, Serialize};

use super::{AuthorityKey, TypeLevel};

/// A registered identifier authority: the namespace an identifier value is
/// minted in, plus the rules governance enforces for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    pub key: AuthorityKey,
    pub code: String,
    pub name: String,
    /// No two unrelated records may hold the same (authority, value) pair.
    pub globally_unique: bool,
    /// Validation pattern the identifier value must match, if declared.
    pub format_pattern: Option<String>,
    /// Hierarchy levels this authority may be attached to. None = any.
    pub allowed_levels: Option<Vec<TypeLevel>>,
    /// Only this application may mint identifiers under the authority.
    pub assigning_application: Option<String>,
}

impl Authority {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: AuthorityKey::generate(),
            code: code.into(),
            name: name.into(),
            globally_unique: false,
            format_pattern: None,
            allowed_levels: None,
            assigning_application: None,
        }
    }

    pub fn unique(mut self) -> Self {
        self.globally_unique = true;
        self
    }

    pub fn with_format(mut self, pattern: impl Into<String>) -> Self {
        self.format_pattern = Some(pattern.into());
        self
    }

    pub fn scoped_to(mut self, levels: Vec<TypeLevel>) -> Self {
        self.allowed_levels = Some(levels);
        self
    }

    pub fn assigned_by(mut self, application_key: impl Into<String>) -> Self {
        self.assigning_application = Some(application_key.into());
        self
    }
}
