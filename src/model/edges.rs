use serde::{Deserialize, Serialize};

use super::RecordKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NameUse {
    Legal,
    Alias,
    Maiden,
    Anonymous,
}

impl NameUse {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legal => "legal",
            Self::Alias => "alias",
            Self::Maiden => "maiden",
            Self::Anonymous => "anonymous",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "legal" => Some(Self::Legal),
            "alias" => Some(Self::Alias),
            "maiden" => Some(Self::Maiden),
            "anonymous" => Some(Self::Anonymous),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NameComponentKind {
    Family,
    Given,
    Prefix,
    Suffix,
}

impl NameComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Family => "family",
            Self::Given => "given",
            Self::Prefix => "prefix",
            Self::Suffix => "suffix",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "family" => Some(Self::Family),
            "given" => Some(Self::Given),
            "prefix" => Some(Self::Prefix),
            "suffix" => Some(Self::Suffix),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameComponent {
    pub kind: NameComponentKind,
    pub value: String,
}

impl NameComponent {
    pub fn new(kind: NameComponentKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// A structured name: a use code plus an ordered set of components. Stored
/// as one `record_name` row per name and one `name_component` row per
/// component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanName {
    pub name_use: NameUse,
    pub components: Vec<NameComponent>,
}

impl HumanName {
    pub fn new(name_use: NameUse) -> Self {
        Self {
            name_use,
            components: Vec::new(),
        }
    }

    pub fn with_component(mut self, kind: NameComponentKind, value: impl Into<String>) -> Self {
        self.components.push(NameComponent::new(kind, value));
        self
    }
}

/// A (value, authority) identifier asserted on a record. The authority is
/// referenced by its registered code; the dispatcher resolves it to an
/// authority row at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierAssertion {
    pub authority_code: String,
    pub value: String,
}

impl IdentifierAssertion {
    pub fn new(authority_code: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            authority_code: authority_code.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipKind {
    Guardian,
    Employer,
    Affiliate,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guardian => "guardian",
            Self::Employer => "employer",
            Self::Affiliate => "affiliate",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "guardian" => Some(Self::Guardian),
            "employer" => Some(Self::Employer),
            "affiliate" => Some(Self::Affiliate),
            _ => None,
        }
    }
}

/// A typed link to another record, held by key only. The target may link
/// back; cycles are fine because neither side owns the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub kind: RelationshipKind,
    pub target: RecordKey,
}

impl Relationship {
    pub fn new(kind: RelationshipKind, target: RecordKey) -> Self {
        Self { kind, target }
    }
}

/// Free-form tag. Tied to the record directly, not to any version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub code: String,
    pub label: Option<String>,
}

impl Tag {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
