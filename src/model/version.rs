use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{RecordKey, VersionKey};

/// Metadata of one immutable version snapshot. Exactly one version per
/// record has `obsoleted_at == None` at any instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMeta {
    pub version_key: VersionKey,
    pub record_key: RecordKey,
    /// Monotonically increasing per record, assigned at commit.
    pub version_sequence: u64,
    pub replaces_version_key: Option<VersionKey>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub obsoleted_by: Option<Uuid>,
    pub obsoleted_at: Option<DateTime<Utc>>,
}

impl VersionMeta {
    pub fn is_current(&self) -> bool {
        self.obsoleted_at.is_none()
    }
}
