mod authority;
mod edges;
mod issue;
mod principal;
mod record;
mod version;

pub use authority::Authority;
pub use edges::{
    HumanName, IdentifierAssertion, NameComponent, NameComponentKind, NameUse, Relationship,
    RelationshipKind, Tag,
};
pub use issue::{DetectedIssue, IssueCategory, IssueCode, Severity};
pub use principal::{FixedPrincipal, Principal, PrincipalProvider};
pub use record::{
    ObservationFields, OrganizationFields, PersistedRecord, PersonFields, Record, RecordBody,
    RecordStatus, RecordType, TypeLevel,
};
pub use version::VersionMeta;

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! key_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(u: Uuid) -> Self {
                Self(u)
            }
        }
    };
}

key_newtype!(
    /// Stable identity of a record; never changes across versions.
    RecordKey
);
key_newtype!(
    /// Identity of one immutable version snapshot.
    VersionKey
);
key_newtype!(
    /// Identity of a registered identifier authority.
    AuthorityKey
);
