use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard};

use uuid::Uuid;

use crate::core::{EngineError, Result, Row, Value};
use crate::mapping::{MappingRegistry, TableId};
use crate::model::DetectedIssue;

use super::table::{Table, TableSchema};

/// The full set of physical relations. Wrapped in a lock by `Store`; read
/// scopes see a consistent snapshot because writers apply whole write sets
/// under the exclusive lock.
pub struct Tables {
    map: HashMap<String, Table>,
}

impl Tables {
    pub fn table(&self, name: &str) -> Result<&Table> {
        self.map
            .get(name)
            .ok_or_else(|| EngineError::TableNotFound(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.map
            .get_mut(name)
            .ok_or_else(|| EngineError::TableNotFound(name.to_string()))
    }

    /// Current (non-obsoleted) version sequence for a record, if the record
    /// exists at all.
    pub fn current_sequence(&self, record_key: Uuid) -> Result<Option<u64>> {
        let base = self.table(TableId::RecordVersion.table_name())?;
        let key_idx = base.column_index("record_key")?;
        let seq_idx = base.column_index("version_sequence")?;
        let obsoleted_idx = base.column_index("obsoleted_at")?;

        let mut current = None;
        for (_, row) in base.rows() {
            if row[key_idx].as_uuid() == Some(record_key) && row[obsoleted_idx].is_null() {
                current = row[seq_idx].as_u64();
            }
        }
        Ok(current)
    }

    /// Records currently holding the (authority, value) identifier pair.
    /// An edge counts only while it is visible under the owning record's
    /// current version sequence.
    pub fn identifier_owners(&self, authority_code: &str, value: &str) -> Result<Vec<Uuid>> {
        let table = self.table(TableId::RecordIdentifier.table_name())?;
        let code_idx = table.column_index("authority_code")?;
        let value_idx = table.column_index("id_value")?;
        let key_idx = table.column_index("record_key")?;
        let effective_idx = table.column_index("effective_seq")?;
        let obsolete_idx = table.column_index("obsolete_seq")?;

        let mut owners = Vec::new();
        for (_, row) in table.rows() {
            if row[code_idx].as_str() != Some(authority_code)
                || row[value_idx].as_str() != Some(value)
            {
                continue;
            }
            let Some(owner) = row[key_idx].as_uuid() else {
                continue;
            };
            let Some(current) = self.current_sequence(owner)? else {
                continue;
            };
            let Some(effective) = row[effective_idx].as_u64() else {
                continue;
            };
            let visible = effective <= current
                && row[obsolete_idx].as_u64().map_or(true, |obs| obs > current);
            if visible && !owners.contains(&owner) {
                owners.push(owner);
            }
        }
        Ok(owners)
    }
}

/// One staged mutation. Write sets are validated in full against the
/// locked state before any of them is applied, so a failing set leaves the
/// store untouched.
#[derive(Debug, Clone)]
pub enum Mutation {
    Insert {
        table: String,
        row: Row,
    },
    Update {
        table: String,
        row_id: u64,
        row: Row,
    },
    /// Ensure-exists: insert unless a row already matches on the column.
    Upsert {
        table: String,
        match_column: String,
        match_value: Value,
        row: Row,
    },
    /// Remove all rows matching on the column. Only used for non-versioned
    /// edges; versioned edges are obsoleted, never deleted.
    DeleteWhere {
        table: String,
        column: String,
        value: Value,
    },
}

/// Optimistic check evaluated at commit time, inside the critical section.
#[derive(Debug, Clone)]
pub struct VersionGuard {
    pub record_key: Uuid,
    /// Expected current version sequence; None asserts the record does not
    /// exist yet (insert).
    pub expected: Option<u64>,
}

/// A cross-record uniqueness assertion. The write set's governance check
/// runs under a read scope that another writer can race, so claims are
/// re-verified inside the commit critical section: no record outside
/// `allowed_owners` may currently hold the pair.
#[derive(Debug, Clone)]
pub struct IdentifierClaim {
    pub authority_code: String,
    pub value: String,
    pub allowed_owners: Vec<Uuid>,
    /// Issue surfaced when the claim fails at commit time.
    pub on_conflict: DetectedIssue,
}

/// Staged mutations plus the optimistic checks protecting them.
#[derive(Debug, Clone, Default)]
pub struct WriteSet {
    pub mutations: Vec<Mutation>,
    pub guard: Option<VersionGuard>,
    pub claims: Vec<IdentifierClaim>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guarded(record_key: Uuid, expected: Option<u64>) -> Self {
        Self {
            guard: Some(VersionGuard {
                record_key,
                expected,
            }),
            ..Self::default()
        }
    }

    pub fn claim(&mut self, claim: IdentifierClaim) {
        self.claims.push(claim);
    }

    pub fn insert(&mut self, table: &str, row: Row) {
        self.mutations.push(Mutation::Insert {
            table: table.to_string(),
            row,
        });
    }

    pub fn update(&mut self, table: &str, row_id: u64, row: Row) {
        self.mutations.push(Mutation::Update {
            table: table.to_string(),
            row_id,
            row,
        });
    }

    pub fn upsert(&mut self, table: &str, match_column: &str, match_value: Value, row: Row) {
        self.mutations.push(Mutation::Upsert {
            table: table.to_string(),
            match_column: match_column.to_string(),
            match_value,
            row,
        });
    }

    pub fn delete_where(&mut self, table: &str, column: &str, value: Value) {
        self.mutations.push(Mutation::DeleteWhere {
            table: table.to_string(),
            column: column.to_string(),
            value,
        });
    }
}

/// The backing store. Read scopes take the shared lock; commits take the
/// exclusive lock, re-check the optimistic guard, validate every staged
/// mutation, then apply them all. Partial application is never observable.
pub struct Store {
    inner: RwLock<Tables>,
}

impl Store {
    /// Create every relation the mapping registry describes.
    pub fn bootstrap(mapping: &MappingRegistry) -> Self {
        let mut map = HashMap::new();
        for descriptor in mapping.tables() {
            map.insert(
                descriptor.name.to_string(),
                Table::new(TableSchema::from_descriptor(descriptor)),
            );
        }
        Self {
            inner: RwLock::new(Tables { map }),
        }
    }

    /// A read scope. Held for the duration of one logical read operation;
    /// never shared across operations.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.inner.read().map_err(EngineError::from)
    }

    /// Apply a write set atomically. The guard (when present) is evaluated
    /// under the exclusive lock, so of two writers racing from the same
    /// expected sequence exactly one commits.
    pub fn commit(&self, write_set: WriteSet) -> Result<()> {
        let mut tables = self
            .inner
            .write()
            .map_err(EngineError::from)?;

        if let Some(guard) = &write_set.guard {
            let current = tables.current_sequence(guard.record_key)?;
            if current != guard.expected {
                return match guard.expected {
                    Some(expected) => Err(EngineError::Concurrency {
                        record_key: guard.record_key,
                        expected,
                        current: current.unwrap_or(0),
                    }),
                    None => Err(EngineError::ConstraintViolation(format!(
                        "record '{}' already exists",
                        guard.record_key
                    ))),
                };
            }
        }

        for claim in &write_set.claims {
            let owners = tables.identifier_owners(&claim.authority_code, &claim.value)?;
            if owners
                .iter()
                .any(|owner| !claim.allowed_owners.contains(owner))
            {
                return Err(EngineError::DetectedIssue(vec![claim.on_conflict.clone()]));
            }
        }

        // Validate everything before touching anything.
        for mutation in &write_set.mutations {
            match mutation {
                Mutation::Insert { table, row } | Mutation::Upsert { table, row, .. } => {
                    tables.table(table)?.validate_row(row)?;
                }
                Mutation::Update { table, row_id, row } => {
                    let t = tables.table(table)?;
                    t.validate_row(row)?;
                    if t.get(*row_id).is_none() {
                        return Err(EngineError::Execution(format!(
                            "Table '{}': staged update targets missing row {}",
                            table, row_id
                        )));
                    }
                }
                Mutation::DeleteWhere { table, column, .. } => {
                    tables.table(table)?.column_index(column)?;
                }
            }
        }

        for mutation in write_set.mutations {
            match mutation {
                Mutation::Insert { table, row } => {
                    tables.table_mut(&table)?.insert(row)?;
                }
                Mutation::Update { table, row_id, row } => {
                    tables.table_mut(&table)?.update(row_id, row)?;
                }
                Mutation::Upsert {
                    table,
                    match_column,
                    match_value,
                    row,
                } => {
                    let t = tables.table_mut(&table)?;
                    let idx = t.column_index(&match_column)?;
                    let exists = t.rows().any(|(_, r)| r[idx] == match_value);
                    if !exists {
                        t.insert(row)?;
                    }
                }
                Mutation::DeleteWhere {
                    table,
                    column,
                    value,
                } => {
                    let t = tables.table_mut(&table)?;
                    let idx = t.column_index(&column)?;
                    let ids: Vec<u64> = t
                        .rows()
                        .filter(|(_, r)| r[idx] == value)
                        .map(|(id, _)| id)
                        .collect();
                    for id in ids {
                        t.delete(id);
                    }
                }
            }
        }

        Ok(())
    }
}
