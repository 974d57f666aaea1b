// ============================================================================
// ChartStore Library
// ============================================================================

pub mod compiler;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod governance;
pub mod mapping;
pub mod model;
pub mod pattern;
pub mod predicate;
pub mod store;
pub mod version;

// Re-export main types for convenience
pub use config::{EngineConfig, GovernanceConfig, TotalCountMode};
pub use core::{EngineError, Result, Value};
pub use dispatch::{PersistenceDispatcher, QueryPage};
pub use model::{
    Authority, DetectedIssue, HumanName, IdentifierAssertion, NameComponentKind, NameUse,
    PersistedRecord, Principal, Record, RecordKey, RecordStatus, RecordType, Relationship,
    RelationshipKind, Severity, Tag, TypeLevel,
};
pub use predicate::{CollectionPath, OrderSpec, Predicate};

use std::sync::Arc;

use compiler::{HackRegistry, QueryPlan};
use model::{FixedPrincipal, PrincipalProvider};

// ============================================================================
// High-level Engine API
// ============================================================================

/// Versioned record engine.
///
/// This is the recommended entry point. It owns the table store, the
/// predicate compiler, and the governance validator, and exposes the
/// record-level operations.
///
/// # Examples
///
/// ```
/// use chartstore::{Engine, EngineConfig, Record, RecordType, Predicate};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = Engine::new(EngineConfig::default());
///
/// let saved = engine.insert(&Record::person())?;
/// let page = engine.query(
///     RecordType::Person,
///     &Predicate::eq("record_key", saved.key().0),
///     &[],
///     0,
///     10,
/// )?;
/// assert_eq!(page.total, 1);
/// # Ok(())
/// # }
/// ```
pub struct Engine {
    dispatcher: PersistenceDispatcher,
}

impl Engine {
    /// Build an engine with the given configuration and an anonymous fixed
    /// principal.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chartstore::{Engine, EngineConfig};
    /// let engine = Engine::new(EngineConfig::default());
    /// ```
    pub fn new(config: EngineConfig) -> Self {
        Self::with_principals(config, Arc::new(FixedPrincipal::application("chartstore")))
    }

    /// Build an engine with a caller-supplied principal provider. The
    /// provider stamps provenance on every version and feeds the
    /// assigning-application governance rule.
    pub fn with_principals(config: EngineConfig, principals: Arc<dyn PrincipalProvider>) -> Self {
        Self {
            dispatcher: PersistenceDispatcher::new(config, principals),
        }
    }

    /// Build an engine with a custom query hack registry. Hacks rewrite
    /// recognized predicate shapes into hand-tuned plans; unrecognized
    /// shapes fall through to the generic compiler.
    pub fn with_hacks(
        config: EngineConfig,
        principals: Arc<dyn PrincipalProvider>,
        hacks: HackRegistry,
    ) -> Self {
        Self {
            dispatcher: PersistenceDispatcher::with_hacks(config, principals, hacks),
        }
    }

    /// Register (or re-register) an identifier authority.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chartstore::{Engine, EngineConfig, Authority, TypeLevel};
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let engine = Engine::new(EngineConfig::default());
    /// engine.register_authority(
    ///     &Authority::new("MRN", "Medical Record Number")
    ///         .unique()
    ///         .scoped_to(vec![TypeLevel::Person]),
    /// )?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn register_authority(&self, authority: &Authority) -> Result<Authority> {
        self.dispatcher.register_authority(authority)
    }

    /// Persist a new record and return it with its opening version.
    pub fn insert(&self, record: &Record) -> Result<PersistedRecord> {
        self.dispatcher.insert(record)
    }

    /// Write a new version of an existing record. `expected_sequence` names
    /// the version the caller read; a stale expectation fails with
    /// [`EngineError::Concurrency`] and changes nothing.
    pub fn update(&self, record: &Record, expected_sequence: u64) -> Result<PersistedRecord> {
        self.dispatcher.update(record, expected_sequence)
    }

    /// Soft-delete a record by writing a `Retired` version. History stays
    /// readable.
    pub fn retire(&self, key: RecordKey, expected_sequence: u64) -> Result<PersistedRecord> {
        self.dispatcher.retire(key, expected_sequence)
    }

    /// Read the current version of a record, or (`as_of`) the version that
    /// was current as of a past sequence number.
    pub fn read(&self, key: RecordKey, as_of: Option<u64>) -> Result<PersistedRecord> {
        self.dispatcher.read(key, as_of)
    }

    /// Run a typed query over current versions.
    ///
    /// # Examples
    ///
    /// ```
    /// use chartstore::{
    ///     CollectionPath, Engine, EngineConfig, HumanName, NameComponentKind, NameUse,
    ///     Predicate, Record, RecordType,
    /// };
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let engine = Engine::new(EngineConfig::default());
    /// engine.insert(&Record::person().with_name(
    ///     HumanName::new(NameUse::Legal)
    ///         .with_component(NameComponentKind::Family, "Smith"),
    /// ))?;
    ///
    /// // Records with a legal name whose family component is Smith.
    /// let predicate = Predicate::any_where(
    ///     CollectionPath::Names,
    ///     Predicate::eq("use", "legal"),
    ///     Predicate::any(
    ///         CollectionPath::Components,
    ///         Predicate::and(vec![
    ///             Predicate::eq("kind", "family"),
    ///             Predicate::eq("value", "Smith"),
    ///         ]),
    ///     ),
    /// );
    /// let page = engine.query(RecordType::Person, &predicate, &[], 0, 10)?;
    /// assert_eq!(page.total, 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn query(
        &self,
        rtype: RecordType,
        predicate: &Predicate,
        order_by: &[OrderSpec],
        offset: usize,
        limit: usize,
    ) -> Result<QueryPage> {
        self.dispatcher.query(rtype, predicate, order_by, offset, limit)
    }

    /// Compile a predicate into its query plan without executing it.
    pub fn compile(
        &self,
        rtype: RecordType,
        predicate: &Predicate,
        order_by: &[OrderSpec],
    ) -> Result<QueryPlan> {
        self.dispatcher.compile(rtype, predicate, order_by)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_insert_and_read_round_trip() {
        let engine = Engine::new(EngineConfig::default());
        let saved = engine
            .insert(&Record::person().with_tag(Tag::new("vip")))
            .unwrap();

        let read = engine.read(saved.key(), None).unwrap();
        assert_eq!(read.sequence(), 1);
        assert_eq!(read.record.tags, vec![Tag::new("vip")]);
    }

    #[test]
    fn test_engine_read_missing_record() {
        let engine = Engine::new(EngineConfig::default());
        assert!(matches!(
            engine.read(RecordKey::generate(), None),
            Err(EngineError::NotFound(_))
        ));
    }
}
