use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::{EngineError, Result, Row, Value};
use crate::mapping::TableId;
use crate::model::{
    Principal, RecordKey, RecordStatus, RecordType, VersionKey, VersionMeta,
};
use crate::store::{Tables, WriteSet};

// Column positions in the record_version relation, in descriptor order.
pub(crate) mod col {
    pub const VERSION_KEY: usize = 0;
    pub const RECORD_KEY: usize = 1;
    pub const RECORD_TYPE: usize = 2;
    pub const VERSION_SEQUENCE: usize = 3;
    pub const REPLACES_VERSION_KEY: usize = 4;
    pub const STATUS: usize = 5;
    pub const CREATED_BY: usize = 6;
    pub const CREATED_AT: usize = 7;
    pub const OBSOLETED_BY: usize = 8;
    pub const OBSOLETED_AT: usize = 9;
}

/// One parsed row of the base relation.
#[derive(Debug, Clone)]
pub struct VersionRow {
    pub row_id: u64,
    pub record_type: RecordType,
    pub status: RecordStatus,
    pub meta: VersionMeta,
}

pub fn parse_version_row(row_id: u64, row: &Row) -> Result<VersionRow> {
    let field = |idx: usize, name: &str| -> Result<&Value> {
        row.get(idx).ok_or_else(|| {
            EngineError::Execution(format!("record_version row missing column '{}'", name))
        })
    };

    let record_type = field(col::RECORD_TYPE, "record_type")?
        .as_str()
        .and_then(RecordType::from_discriminator)
        .ok_or_else(|| {
            EngineError::Execution("record_version row carries an unknown discriminator".into())
        })?;
    let status = field(col::STATUS, "status")?
        .as_str()
        .and_then(RecordStatus::from_str)
        .ok_or_else(|| EngineError::Execution("record_version row carries an unknown status".into()))?;

    let required_uuid = |idx: usize, name: &str| -> Result<Uuid> {
        field(idx, name)?
            .as_uuid()
            .ok_or_else(|| EngineError::Execution(format!("column '{}' is not a UUID", name)))
    };

    Ok(VersionRow {
        row_id,
        record_type,
        status,
        meta: VersionMeta {
            version_key: VersionKey(required_uuid(col::VERSION_KEY, "version_key")?),
            record_key: RecordKey(required_uuid(col::RECORD_KEY, "record_key")?),
            version_sequence: field(col::VERSION_SEQUENCE, "version_sequence")?
                .as_u64()
                .ok_or_else(|| {
                    EngineError::Execution("version_sequence is not a non-negative integer".into())
                })?,
            replaces_version_key: field(col::REPLACES_VERSION_KEY, "replaces_version_key")?
                .as_uuid()
                .map(VersionKey),
            created_by: required_uuid(col::CREATED_BY, "created_by")?,
            created_at: field(col::CREATED_AT, "created_at")?
                .as_timestamp()
                .ok_or_else(|| EngineError::Execution("created_at is not a timestamp".into()))?,
            obsoleted_by: field(col::OBSOLETED_BY, "obsoleted_by")?.as_uuid(),
            obsoleted_at: field(col::OBSOLETED_AT, "obsoleted_at")?.as_timestamp(),
        },
    })
}

pub fn version_row_values(meta: &VersionMeta, rtype: RecordType, status: RecordStatus) -> Row {
    vec![
        Value::from(meta.version_key.0),
        Value::from(meta.record_key.0),
        Value::from(rtype.discriminator()),
        Value::from(meta.version_sequence),
        Value::from(meta.replaces_version_key.map(|k| k.0)),
        Value::from(status.as_str()),
        Value::from(meta.created_by),
        Value::from(meta.created_at),
        Value::from(meta.obsoleted_by),
        Value::from(meta.obsoleted_at),
    ]
}

/// A versioned association edge is visible under sequence V iff it became
/// effective at or before V and was not obsoleted at or before V.
pub fn edge_visible(effective_seq: u64, obsolete_seq: Option<u64>, viewed_seq: u64) -> bool {
    effective_seq <= viewed_seq && obsolete_seq.map_or(true, |o| o > viewed_seq)
}

/// All version rows of one record, ordered by sequence.
#[derive(Debug)]
pub struct VersionChain {
    rows: Vec<VersionRow>,
}

impl VersionChain {
    pub fn load(tables: &Tables, record_key: RecordKey) -> Result<Self> {
        let base = tables.table(TableId::RecordVersion.table_name())?;
        let mut rows = Vec::new();
        for (row_id, row) in base.rows() {
            if row[col::RECORD_KEY].as_uuid() == Some(record_key.0) {
                rows.push(parse_version_row(row_id, row)?);
            }
        }
        rows.sort_by_key(|v| v.meta.version_sequence);
        Ok(Self { rows })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn current(&self) -> Option<&VersionRow> {
        self.rows.iter().find(|v| v.meta.is_current())
    }

    /// The version visible as of sequence N: the greatest sequence <= N.
    pub fn as_of(&self, sequence: u64) -> Option<&VersionRow> {
        self.rows
            .iter()
            .filter(|v| v.meta.version_sequence <= sequence)
            .max_by_key(|v| v.meta.version_sequence)
    }

    pub fn max_sequence(&self) -> u64 {
        self.rows
            .iter()
            .map(|v| v.meta.version_sequence)
            .max()
            .unwrap_or(0)
    }
}

/// Builds the atomic `Uncommitted -> Current` transition: the new version
/// row is staged alongside the obsoletion of the prior current row, and the
/// store applies both (or neither) at commit.
pub struct VersionChainManager;

impl VersionChainManager {
    /// Metadata for a new version extending `prior` (or opening a chain).
    pub fn next_version(
        record_key: RecordKey,
        prior: Option<&VersionRow>,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> VersionMeta {
        VersionMeta {
            version_key: VersionKey::generate(),
            record_key,
            version_sequence: prior.map_or(1, |p| p.meta.version_sequence + 1),
            replaces_version_key: prior.map(|p| p.meta.version_key),
            created_by: principal.identity_key,
            created_at: now,
            obsoleted_by: None,
            obsoleted_at: None,
        }
    }

    /// Stage the transition into `write_set`.
    pub fn stage_transition(
        write_set: &mut WriteSet,
        new_meta: &VersionMeta,
        rtype: RecordType,
        status: RecordStatus,
        prior: Option<&VersionRow>,
        principal: &Principal,
        now: DateTime<Utc>,
    ) {
        let base = TableId::RecordVersion.table_name();
        write_set.insert(base, version_row_values(new_meta, rtype, status));

        if let Some(prior) = prior {
            let mut obsoleted = prior.meta.clone();
            obsoleted.obsoleted_by = Some(principal.identity_key);
            obsoleted.obsoleted_at = Some(now);
            write_set.update(
                base,
                prior.row_id,
                version_row_values(&obsoleted, prior.record_type, prior.status),
            );
        }
    }
}
