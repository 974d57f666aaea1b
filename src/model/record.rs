use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    DetectedIssue, HumanName, IdentifierAssertion, RecordKey, Relationship, Tag, VersionMeta,
};

/// Concrete record subtypes. The discriminator stored on the base relation
/// maps one-to-one onto these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    Person,
    Organization,
    Observation,
}

impl RecordType {
    pub const ALL: [RecordType; 3] = [
        RecordType::Person,
        RecordType::Organization,
        RecordType::Observation,
    ];

    /// Discriminator value stored in the base relation.
    pub fn discriminator(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Organization => "organization",
            Self::Observation => "observation",
        }
    }

    pub fn from_discriminator(value: &str) -> Option<Self> {
        match value {
            "person" => Some(Self::Person),
            "organization" => Some(Self::Organization),
            "observation" => Some(Self::Observation),
            _ => None,
        }
    }

    /// The hierarchy level this concrete type hangs off.
    pub fn level(&self) -> TypeLevel {
        match self {
            Self::Person => TypeLevel::Person,
            Self::Organization => TypeLevel::Organization,
            Self::Observation => TypeLevel::Observation,
        }
    }
}

/// Levels of the class-table-inheritance hierarchy, abstract ones included.
/// `Party` groups Person and Organization and owns the shared `party`
/// satellite relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeLevel {
    Record,
    Party,
    Person,
    Organization,
    Observation,
}

impl TypeLevel {
    pub fn parent(&self) -> Option<TypeLevel> {
        match self {
            Self::Record => None,
            Self::Party => Some(Self::Record),
            Self::Person | Self::Organization => Some(Self::Party),
            Self::Observation => Some(Self::Record),
        }
    }

    /// Whether `descendant` is this level or below it.
    pub fn contains(&self, descendant: RecordType) -> bool {
        let mut level = Some(descendant.level());
        while let Some(l) = level {
            if l == *self {
                return true;
            }
            level = l.parent();
        }
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    Active,
    Inactive,
    /// Soft delete. A retired record is a normal current version carrying
    /// this status; it keeps read and as-of logic uniform.
    Retired,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Retired => "retired",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "retired" => Some(Self::Retired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonFields {
    pub display_name: Option<String>,
    pub birth_date: Option<DateTime<Utc>>,
    pub gender: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationFields {
    pub display_name: Option<String>,
    pub industry: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationFields {
    /// Weak reference to the subject record; no ownership implied.
    pub subject: Option<RecordKey>,
    pub effective_at: Option<DateTime<Utc>>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
}

/// Subtype-specific mutable state. One variant per concrete type; the
/// composer registry dispatches on the matching discriminator value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordBody {
    Person(PersonFields),
    Organization(OrganizationFields),
    Observation(ObservationFields),
}

impl RecordBody {
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::Person(_) => RecordType::Person,
            Self::Organization(_) => RecordType::Organization,
            Self::Observation(_) => RecordType::Observation,
        }
    }
}

/// A domain record as submitted by callers: subtype state plus association
/// collections. `key` is None for a record the engine has not assigned an
/// identity yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: Option<RecordKey>,
    pub status: RecordStatus,
    pub body: RecordBody,
    pub names: Vec<HumanName>,
    pub identifiers: Vec<IdentifierAssertion>,
    pub relationships: Vec<Relationship>,
    pub tags: Vec<Tag>,
}

impl Record {
    fn new(body: RecordBody) -> Self {
        Self {
            key: None,
            status: RecordStatus::Active,
            body,
            names: Vec::new(),
            identifiers: Vec::new(),
            relationships: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn person() -> Self {
        Self::new(RecordBody::Person(PersonFields {
            display_name: None,
            birth_date: None,
            gender: None,
        }))
    }

    pub fn organization() -> Self {
        Self::new(RecordBody::Organization(OrganizationFields {
            display_name: None,
            industry: None,
        }))
    }

    pub fn observation() -> Self {
        Self::new(RecordBody::Observation(ObservationFields {
            subject: None,
            effective_at: None,
            quantity: None,
            unit: None,
        }))
    }

    pub fn record_type(&self) -> RecordType {
        self.body.record_type()
    }

    pub fn with_key(mut self, key: RecordKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_name(mut self, name: HumanName) -> Self {
        self.names.push(name);
        self
    }

    pub fn with_identifier(mut self, identifier: IdentifierAssertion) -> Self {
        self.identifiers.push(identifier);
        self
    }

    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }
}

/// A record as returned by the engine: the record itself, the version
/// metadata it was composed under, and any advisory annotations attached by
/// governance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub record: Record,
    pub version: VersionMeta,
    pub annotations: Vec<DetectedIssue>,
}

impl PersistedRecord {
    pub fn key(&self) -> RecordKey {
        self.version.record_key
    }

    pub fn sequence(&self) -> u64 {
        self.version.version_sequence
    }
}
