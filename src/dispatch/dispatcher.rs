use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::compiler::{HackRegistry, PredicateCompiler, QueryPlan};
use crate::config::{EngineConfig, TotalCountMode};
use crate::core::{EngineError, Result, Row, Value};
use crate::governance::{self, IdentifierGovernance};
use crate::mapping::{MappingRegistry, TableId};
use crate::model::{
    Authority, AuthorityKey, DetectedIssue, HumanName, IdentifierAssertion, PersistedRecord,
    Principal, PrincipalProvider, Record, RecordKey, RecordStatus, RecordType, Severity,
    VersionMeta,
};
use crate::predicate::{OrderSpec, Predicate};
use crate::store::{execute_plan, Store, Tables, WriteSet};
use crate::version::{parse_version_row, VersionChain, VersionChainManager, VersionRow};

use super::cache::{LruRecordCache, NoCache, RecordCache};
use super::composer::ComposerRegistry;
use super::edges::{
    self, annotation_row_values, component_row_values, identifier_col, identifier_row_values,
    name_col, name_row_values, obsoleted_copy, relationship_col, relationship_row_values,
    tag_row_values,
};

/// One page of query results plus the total match count (exact or a lower
/// bound, per the configured counting mode).
#[derive(Debug)]
pub struct QueryPage {
    pub records: Vec<PersistedRecord>,
    pub total: usize,
}

/// An identifier assertion resolved to a concrete authority row. When the
/// authority is unregistered but the existence rule is off, a stub row is
/// staged alongside the edge (ensure-exists).
struct ResolvedIdentifier {
    assertion: IdentifierAssertion,
    authority_key: AuthorityKey,
    stub: Option<Row>,
}

/// The write/read front of the engine. Every operation resolves the record
/// type once at the boundary and dispatches through closed registries from
/// there; nothing downstream re-inspects discriminators.
pub struct PersistenceDispatcher {
    mapping: MappingRegistry,
    compiler: PredicateCompiler,
    store: Store,
    governance: IdentifierGovernance,
    composers: ComposerRegistry,
    cache: Box<dyn RecordCache>,
    principals: Arc<dyn PrincipalProvider>,
    total_count: TotalCountMode,
}

impl PersistenceDispatcher {
    pub fn new(config: EngineConfig, principals: Arc<dyn PrincipalProvider>) -> Self {
        Self::with_hacks(config, principals, HackRegistry::standard())
    }

    pub fn with_hacks(
        config: EngineConfig,
        principals: Arc<dyn PrincipalProvider>,
        hacks: HackRegistry,
    ) -> Self {
        let mapping = MappingRegistry::build();
        let cache: Box<dyn RecordCache> = if config.cache_capacity == 0 {
            Box::new(NoCache)
        } else {
            Box::new(LruRecordCache::new(config.cache_capacity))
        };
        Self {
            compiler: PredicateCompiler::new(mapping.clone(), hacks),
            store: Store::bootstrap(&mapping),
            governance: IdentifierGovernance::new(config.governance),
            composers: ComposerRegistry::standard(),
            cache,
            principals,
            total_count: config.total_count,
            mapping,
        }
    }

    /// Register (or re-register) an identifier authority. Re-registering an
    /// existing code updates its rules but keeps its key, so identifier rows
    /// referencing it stay valid.
    pub fn register_authority(&self, authority: &Authority) -> Result<Authority> {
        let existing = {
            let tables = self.store.read()?;
            let table = tables.table(TableId::Authority.table_name())?;
            let code_idx = table.column_index("code")?;
            let found = table
                .rows()
                .find(|(_, row)| row[code_idx].as_str() == Some(authority.code.as_str()))
                .map(|(row_id, row)| {
                    governance::parse_authority_row(row).map(|current| (row_id, current))
                })
                .transpose()?;
            found
        };

        let mut ws = WriteSet::new();
        let effective = match existing {
            Some((row_id, current)) => {
                let mut merged = authority.clone();
                merged.key = current.key;
                ws.update(
                    TableId::Authority.table_name(),
                    row_id,
                    governance::authority_row_values(&merged)?,
                );
                merged
            }
            None => {
                // Ensure-exists: a registration racing this one must not
                // leave a second row for the code.
                ws.upsert(
                    TableId::Authority.table_name(),
                    "code",
                    Value::from(authority.code.clone()),
                    governance::authority_row_values(authority)?,
                );
                authority.clone()
            }
        };
        self.store.commit(ws)?;
        log::info!("registered authority '{}'", effective.code);
        Ok(effective)
    }

    /// Persist a new record. Fails if the key is already taken, or if
    /// governance finds any Error-severity issue.
    pub fn insert(&self, record: &Record) -> Result<PersistedRecord> {
        let principal = self.principals.current();
        let now = Utc::now();
        let key = record.key.unwrap_or_else(RecordKey::generate);
        let rtype = record.record_type();

        let mut ws = WriteSet::guarded(key.0, None);
        let (meta, warnings) = {
            let tables = self.store.read()?;
            if !VersionChain::load(&tables, key)?.is_empty() {
                return Err(EngineError::ConstraintViolation(format!(
                    "record '{}' already exists",
                    key.0
                )));
            }

            let warnings = self.run_governance(record, key, &principal, &tables)?;
            for claim in self.governance.uniqueness_claims(record, key, &tables)? {
                ws.claim(claim);
            }
            let resolved = self.resolve_identifiers(record, &tables)?;

            let meta = VersionChainManager::next_version(key, None, &principal, now);
            VersionChainManager::stage_transition(
                &mut ws,
                &meta,
                rtype,
                record.status,
                None,
                &principal,
                now,
            );
            self.stage_satellites(&mut ws, &meta, record)?;
            self.stage_new_identifiers(&mut ws, key, meta.version_sequence, resolved);
            for name in &record.names {
                stage_name(&mut ws, key, name, meta.version_sequence);
            }
            for relationship in &record.relationships {
                ws.insert(
                    TableId::RecordRelationship.table_name(),
                    relationship_row_values(key, relationship, meta.version_sequence),
                );
            }
            for tag in &record.tags {
                ws.insert(TableId::RecordTag.table_name(), tag_row_values(key, tag));
            }
            for warning in &warnings {
                ws.insert(
                    TableId::RecordAnnotation.table_name(),
                    annotation_row_values(key, warning),
                );
            }
            (meta, warnings)
        };

        self.store.commit(ws)?;
        log::debug!("inserted record {} (type {})", key.0, rtype.discriminator());

        let persisted = PersistedRecord {
            record: record.clone().with_key(key),
            version: meta,
            annotations: warnings,
        };
        self.cache.put(&persisted);
        Ok(persisted)
    }

    /// Write a new version of an existing record. `expected_sequence` must
    /// name the current version; a stale expectation fails with a
    /// concurrency error and changes nothing.
    pub fn update(&self, record: &Record, expected_sequence: u64) -> Result<PersistedRecord> {
        let key = record.key.ok_or_else(|| {
            EngineError::ConstraintViolation("update requires a record key".into())
        })?;
        let principal = self.principals.current();
        let now = Utc::now();
        let rtype = record.record_type();

        let mut ws = WriteSet::guarded(key.0, Some(expected_sequence));
        let (meta, warnings) = {
            let tables = self.store.read()?;
            let chain = VersionChain::load(&tables, key)?;
            let current = chain.current().ok_or(EngineError::NotFound(key.0))?;
            if current.meta.version_sequence != expected_sequence {
                return Err(EngineError::Concurrency {
                    record_key: key.0,
                    expected: expected_sequence,
                    current: current.meta.version_sequence,
                });
            }
            if current.record_type != rtype {
                return Err(EngineError::ConstraintViolation(format!(
                    "record '{}' is a {}, not a {}",
                    key.0,
                    current.record_type.discriminator(),
                    rtype.discriminator()
                )));
            }

            let warnings = self.run_governance(record, key, &principal, &tables)?;
            for claim in self.governance.uniqueness_claims(record, key, &tables)? {
                ws.claim(claim);
            }
            let resolved = self.resolve_identifiers(record, &tables)?;

            let meta =
                VersionChainManager::next_version(key, Some(current), &principal, now);
            VersionChainManager::stage_transition(
                &mut ws,
                &meta,
                rtype,
                record.status,
                Some(current),
                &principal,
                now,
            );
            self.stage_satellites(&mut ws, &meta, record)?;
            self.sync_identifiers(
                &mut ws,
                key,
                expected_sequence,
                meta.version_sequence,
                resolved,
                &tables,
            )?;
            self.sync_names(&mut ws, key, expected_sequence, meta.version_sequence, record, &tables)?;
            self.sync_relationships(
                &mut ws,
                key,
                expected_sequence,
                meta.version_sequence,
                record,
                &tables,
            )?;

            // Non-versioned collections are replaced wholesale.
            ws.delete_where(
                TableId::RecordTag.table_name(),
                "record_key",
                Value::from(key.0),
            );
            for tag in &record.tags {
                ws.insert(TableId::RecordTag.table_name(), tag_row_values(key, tag));
            }
            ws.delete_where(
                TableId::RecordAnnotation.table_name(),
                "record_key",
                Value::from(key.0),
            );
            for warning in &warnings {
                ws.insert(
                    TableId::RecordAnnotation.table_name(),
                    annotation_row_values(key, warning),
                );
            }
            (meta, warnings)
        };

        // Drop the stale entry before the new version becomes visible, so a
        // read racing the commit repopulates from the store.
        self.cache.invalidate(key);
        self.store.commit(ws)?;
        log::debug!(
            "updated record {} to sequence {}",
            key.0,
            meta.version_sequence
        );

        let persisted = PersistedRecord {
            record: record.clone(),
            version: meta,
            annotations: warnings,
        };
        self.cache.put(&persisted);
        Ok(persisted)
    }

    /// Soft-delete: writes a new version with `Retired` status. The chain
    /// stays readable, current and as-of alike.
    pub fn retire(&self, key: RecordKey, expected_sequence: u64) -> Result<PersistedRecord> {
        let current = self.read(key, None)?;
        let record = current.record.with_status(RecordStatus::Retired);
        self.update(&record, expected_sequence)
    }

    /// Read one record: the current version, or the version visible as of
    /// a past sequence number.
    pub fn read(&self, key: RecordKey, as_of: Option<u64>) -> Result<PersistedRecord> {
        if as_of.is_none() {
            if let Some(hit) = self.cache.get(key) {
                return Ok(hit);
            }
        }

        let tables = self.store.read()?;
        let chain = VersionChain::load(&tables, key)?;
        let version = match as_of {
            Some(sequence) => chain.as_of(sequence),
            None => chain.current(),
        }
        .ok_or(EngineError::NotFound(key.0))?;

        let persisted = self.compose(&tables, version)?;
        if as_of.is_none() {
            self.cache.put(&persisted);
        }
        Ok(persisted)
    }

    /// Run a typed query over current versions of one record type.
    pub fn query(
        &self,
        rtype: RecordType,
        predicate: &Predicate,
        order_by: &[OrderSpec],
        offset: usize,
        limit: usize,
    ) -> Result<QueryPage> {
        let mut plan = self.compiler.compile(rtype, predicate, order_by)?;
        plan.current_only();

        let tables = self.store.read()?;
        let outcome = execute_plan(&tables, &plan, offset, limit, self.total_count)?;

        let mut records = Vec::with_capacity(outcome.rows.len());
        for row in &outcome.rows {
            let version = parse_version_row(0, row)?;
            records.push(self.compose(&tables, &version)?);
        }
        Ok(QueryPage {
            records,
            total: outcome.total,
        })
    }

    /// Compile a predicate without executing it. Exposed for plan inspection.
    pub fn compile(
        &self,
        rtype: RecordType,
        predicate: &Predicate,
        order_by: &[OrderSpec],
    ) -> Result<QueryPlan> {
        self.compiler.compile(rtype, predicate, order_by)
    }

    // ---- composition -----------------------------------------------------

    /// Rebuild a full record under one version row.
    fn compose(&self, tables: &Tables, version: &VersionRow) -> Result<PersistedRecord> {
        let rtype = version.record_type;
        let key = version.meta.record_key;
        let sequence = version.meta.version_sequence;

        let mut satellites = HashMap::new();
        for table_id in self.mapping.satellite_chain(rtype) {
            let table = tables.table(table_id.table_name())?;
            let found = table
                .rows()
                .find(|(_, row)| row[0].as_uuid() == Some(version.meta.version_key.0));
            match found {
                Some((_, row)) => {
                    satellites.insert(*table_id, row.clone());
                }
                None => log::warn!(
                    "record {}: satellite '{}' missing for version {}, composing ancestor fields",
                    key.0,
                    table_id.table_name(),
                    version.meta.version_key.0
                ),
            }
        }
        let body = self.composers.for_type(rtype).compose(&satellites);

        let names = edges::load_visible_names(tables, key, sequence)?
            .into_iter()
            .map(|(_, name)| name)
            .collect();
        let identifiers = edges::load_visible_identifiers(tables, key, sequence)?
            .into_iter()
            .map(|(_, assertion)| assertion)
            .collect();
        let relationships = edges::load_visible_relationships(tables, key, sequence)?
            .into_iter()
            .map(|(_, relationship)| relationship)
            .collect();

        Ok(PersistedRecord {
            record: Record {
                key: Some(key),
                status: version.status,
                body,
                names,
                identifiers,
                relationships,
                tags: edges::load_tags(tables, key)?,
            },
            version: version.meta.clone(),
            annotations: edges::load_annotations(tables, key)?,
        })
    }

    // ---- write staging ---------------------------------------------------

    fn run_governance(
        &self,
        record: &Record,
        key: RecordKey,
        principal: &Principal,
        tables: &Tables,
    ) -> Result<Vec<DetectedIssue>> {
        let issues = self.governance.validate(record, key, principal, tables)?;
        if issues.iter().any(|i| i.severity.blocks_write()) {
            return Err(EngineError::DetectedIssue(issues));
        }
        Ok(issues
            .into_iter()
            .filter(|i| i.severity >= Severity::Warning)
            .collect())
    }

    fn stage_satellites(&self, ws: &mut WriteSet, meta: &VersionMeta, record: &Record) -> Result<()> {
        let composer = self.composers.for_type(record.record_type());
        for (table_id, row) in composer.decompose(meta.version_key, &record.body)? {
            ws.insert(table_id.table_name(), row);
        }
        Ok(())
    }

    fn resolve_identifiers(
        &self,
        record: &Record,
        tables: &Tables,
    ) -> Result<Vec<ResolvedIdentifier>> {
        let mut resolved = Vec::with_capacity(record.identifiers.len());
        for assertion in &record.identifiers {
            match governance::find_authority(tables, &assertion.authority_code)? {
                Some(authority) => resolved.push(ResolvedIdentifier {
                    assertion: assertion.clone(),
                    authority_key: authority.key,
                    stub: None,
                }),
                None => {
                    // Governance already vetoed unknown authorities if the
                    // existence rule is on; reaching here means the rule is
                    // off and a stub row keeps the reference resolvable.
                    let stub =
                        Authority::new(assertion.authority_code.clone(), assertion.authority_code.clone());
                    resolved.push(ResolvedIdentifier {
                        assertion: assertion.clone(),
                        authority_key: stub.key,
                        stub: Some(governance::authority_row_values(&stub)?),
                    });
                }
            }
        }
        Ok(resolved)
    }

    fn stage_new_identifiers(
        &self,
        ws: &mut WriteSet,
        key: RecordKey,
        effective_seq: u64,
        resolved: Vec<ResolvedIdentifier>,
    ) {
        for identifier in resolved {
            if let Some(stub) = identifier.stub {
                ws.upsert(
                    TableId::Authority.table_name(),
                    "code",
                    Value::from(identifier.assertion.authority_code.clone()),
                    stub,
                );
            }
            ws.insert(
                TableId::RecordIdentifier.table_name(),
                identifier_row_values(key, identifier.authority_key, &identifier.assertion, effective_seq),
            );
        }
    }

    /// Diff incoming identifiers against the currently visible edges:
    /// surviving edges keep their effectivity, removed edges are obsoleted
    /// at the new sequence, added edges become effective at it.
    fn sync_identifiers(
        &self,
        ws: &mut WriteSet,
        key: RecordKey,
        current_seq: u64,
        new_seq: u64,
        resolved: Vec<ResolvedIdentifier>,
        tables: &Tables,
    ) -> Result<()> {
        let existing = edges::load_visible_identifiers(tables, key, current_seq)?;

        // Edges the caller dropped are obsoleted at the new sequence.
        for (edge, assertion) in &existing {
            if !resolved.iter().any(|r| r.assertion == *assertion) {
                ws.update(
                    TableId::RecordIdentifier.table_name(),
                    edge.row_id,
                    obsoleted_copy(&edge.row, identifier_col::OBSOLETE, new_seq),
                );
            }
        }

        // Surviving edges keep their original effectivity; only genuinely
        // new assertions get rows.
        let additions: Vec<ResolvedIdentifier> = resolved
            .into_iter()
            .filter(|r| !existing.iter().any(|(_, a)| *a == r.assertion))
            .collect();
        self.stage_new_identifiers(ws, key, new_seq, additions);
        Ok(())
    }

    fn sync_names(
        &self,
        ws: &mut WriteSet,
        key: RecordKey,
        current_seq: u64,
        new_seq: u64,
        record: &Record,
        tables: &Tables,
    ) -> Result<()> {
        let existing = edges::load_visible_names(tables, key, current_seq)?;

        for (edge, name) in &existing {
            if !record.names.contains(name) {
                ws.update(
                    TableId::RecordName.table_name(),
                    edge.row_id,
                    obsoleted_copy(&edge.row, name_col::OBSOLETE, new_seq),
                );
            }
        }
        for name in &record.names {
            if !existing.iter().any(|(_, n)| n == name) {
                stage_name(ws, key, name, new_seq);
            }
        }
        Ok(())
    }

    fn sync_relationships(
        &self,
        ws: &mut WriteSet,
        key: RecordKey,
        current_seq: u64,
        new_seq: u64,
        record: &Record,
        tables: &Tables,
    ) -> Result<()> {
        let existing = edges::load_visible_relationships(tables, key, current_seq)?;

        for (edge, relationship) in &existing {
            if !record.relationships.contains(relationship) {
                ws.update(
                    TableId::RecordRelationship.table_name(),
                    edge.row_id,
                    obsoleted_copy(&edge.row, relationship_col::OBSOLETE, new_seq),
                );
            }
        }
        for relationship in &record.relationships {
            if !existing.iter().any(|(_, r)| r == relationship) {
                ws.insert(
                    TableId::RecordRelationship.table_name(),
                    relationship_row_values(key, relationship, new_seq),
                );
            }
        }
        Ok(())
    }
}

/// Stage one name with its components. The component rows hang off the name
/// row's key and carry display order.
fn stage_name(ws: &mut WriteSet, key: RecordKey, name: &HumanName, effective_seq: u64) {
    let name_key = Uuid::new_v4();
    ws.insert(
        TableId::RecordName.table_name(),
        name_row_values(name_key, key, name.name_use, effective_seq),
    );
    for (position, component) in name.components.iter().enumerate() {
        ws.insert(
            TableId::NameComponent.table_name(),
            component_row_values(name_key, component, position),
        );
    }
}
