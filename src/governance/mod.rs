//! Identifier governance: validation of identifier assertions against the
//! registered authorities. Runs before every write; Error findings abort the
//! write, Warning findings become advisory annotations on the record.

use std::collections::HashSet;

use uuid::Uuid;

use crate::config::GovernanceConfig;
use crate::core::{EngineError, Result, Row, Value};
use crate::mapping::TableId;
use crate::model::{
    Authority, AuthorityKey, DetectedIssue, IssueCode, Principal, Record, RecordKey, Severity,
    TypeLevel,
};
use crate::pattern;
use crate::store::{IdentifierClaim, Tables};
use crate::version::edge_visible;

mod col {
    // authority relation
    pub const AUTH_KEY: usize = 0;
    pub const AUTH_CODE: usize = 1;
    pub const AUTH_NAME: usize = 2;
    pub const AUTH_UNIQUE: usize = 3;
    pub const AUTH_FORMAT: usize = 4;
    pub const AUTH_LEVELS: usize = 5;
    pub const AUTH_ASSIGNER: usize = 6;

    // record_relationship relation
    pub const REL_RECORD_KEY: usize = 1;
    pub const REL_TARGET_KEY: usize = 2;
    pub const REL_EFFECTIVE: usize = 4;
    pub const REL_OBSOLETE: usize = 5;
}

pub fn authority_row_values(authority: &Authority) -> Result<Row> {
    let levels = match &authority.allowed_levels {
        Some(levels) => Value::from(
            serde_json::to_string(levels)
                .map_err(|e| EngineError::Execution(format!("serializing allowed levels: {}", e)))?,
        ),
        None => Value::Null,
    };
    Ok(vec![
        Value::from(authority.key.0),
        Value::from(authority.code.clone()),
        Value::from(authority.name.clone()),
        Value::from(authority.globally_unique),
        Value::from(authority.format_pattern.clone()),
        levels,
        Value::from(authority.assigning_application.clone()),
    ])
}

pub fn parse_authority_row(row: &Row) -> Result<Authority> {
    let bad = |what: &str| EngineError::Execution(format!("authority row: malformed {}", what));
    let allowed_levels = match row[col::AUTH_LEVELS].as_str() {
        Some(json) => Some(
            serde_json::from_str::<Vec<TypeLevel>>(json).map_err(|_| bad("allowed levels"))?,
        ),
        None => None,
    };
    Ok(Authority {
        key: AuthorityKey(row[col::AUTH_KEY].as_uuid().ok_or_else(|| bad("key"))?),
        code: row[col::AUTH_CODE]
            .as_str()
            .ok_or_else(|| bad("code"))?
            .to_string(),
        name: row[col::AUTH_NAME]
            .as_str()
            .ok_or_else(|| bad("name"))?
            .to_string(),
        globally_unique: matches!(row[col::AUTH_UNIQUE], Value::Boolean(true)),
        format_pattern: row[col::AUTH_FORMAT].as_str().map(str::to_string),
        allowed_levels,
        assigning_application: row[col::AUTH_ASSIGNER].as_str().map(str::to_string),
    })
}

/// Look up a registered authority by code.
pub fn find_authority(tables: &Tables, code: &str) -> Result<Option<Authority>> {
    let table = tables.table(TableId::Authority.table_name())?;
    for (_, row) in table.rows() {
        if row[col::AUTH_CODE].as_str() == Some(code) {
            return Ok(Some(parse_authority_row(row)?));
        }
    }
    Ok(None)
}

/// The identifier governance validator. Stateless; every rule reads the
/// locked table snapshot it is handed.
pub struct IdentifierGovernance {
    config: GovernanceConfig,
}

impl IdentifierGovernance {
    pub fn new(config: GovernanceConfig) -> Self {
        Self { config }
    }

    /// Validate every identifier asserted on `record`. `record_key` is the
    /// key the record is being written under (already assigned for inserts).
    pub fn validate(
        &self,
        record: &Record,
        record_key: RecordKey,
        principal: &Principal,
        tables: &Tables,
    ) -> Result<Vec<DetectedIssue>> {
        let mut issues = Vec::new();
        let related = self.related_keys(tables, record, record_key)?;

        for assertion in &record.identifiers {
            let authority = match find_authority(tables, &assertion.authority_code)? {
                Some(authority) => authority,
                None => {
                    if self.config.authority_existence {
                        issues.push(DetectedIssue::governance(
                            Severity::Error,
                            IssueCode::UnknownAuthority,
                            format!("authority '{}' is not registered", assertion.authority_code),
                        ));
                    }
                    continue;
                }
            };

            let owners = tables.identifier_owners(&authority.code, &assertion.value)?;
            let already_owned = owners
                .iter()
                .any(|owner| *owner == record_key.0 || related.contains(owner));

            if self.config.scope && !already_owned {
                self.check_scope(record, &authority, &assertion.value, &mut issues);
            }

            if let Some(severity) = self.config.uniqueness {
                if authority.globally_unique {
                    let stranger = owners
                        .iter()
                        .any(|owner| *owner != record_key.0 && !related.contains(owner));
                    if stranger {
                        issues.push(DetectedIssue::governance(
                            severity,
                            IssueCode::DuplicateIdentifier,
                            format!(
                                "identifier '{}' under authority '{}' is already held by an unrelated record",
                                assertion.value, authority.code
                            ),
                        ));
                    }
                }
            }

            if self.config.assigning_application && !already_owned {
                if let Some(assigner) = &authority.assigning_application {
                    if *assigner != principal.application_key {
                        issues.push(DetectedIssue::governance(
                            Severity::Error,
                            IssueCode::AssignerMismatch,
                            format!(
                                "authority '{}' only accepts identifiers from application '{}'",
                                authority.code, assigner
                            ),
                        ));
                    }
                }
            }

            if let Some(severity) = self.config.format {
                if let Some(format_pattern) = &authority.format_pattern {
                    if !pattern::matches_format(&assertion.value, format_pattern)? {
                        issues.push(DetectedIssue::governance(
                            severity,
                            IssueCode::FormatMismatch,
                            format!(
                                "identifier '{}' does not match the '{}' format",
                                assertion.value, authority.code
                            ),
                        ));
                    }
                }
            }
        }

        Ok(issues)
    }

    fn check_scope(
        &self,
        record: &Record,
        authority: &Authority,
        value: &str,
        issues: &mut Vec<DetectedIssue>,
    ) {
        let Some(levels) = &authority.allowed_levels else {
            return;
        };
        let rtype = record.record_type();
        if levels.iter().any(|level| level.contains(rtype)) {
            return;
        }
        issues.push(DetectedIssue::governance(
            Severity::Error,
            IssueCode::AuthorityScope,
            format!(
                "authority '{}' may not be attached to a {} record (identifier '{}')",
                authority.code,
                rtype.discriminator(),
                value
            ),
        ));
    }

    /// Commit-time claims re-asserting global uniqueness. The validation
    /// pass above runs under a read scope another writer can race; the
    /// store verifies these under the exclusive commit lock, closing that
    /// window. Only Error-severity uniqueness blocks, so only that setting
    /// produces claims.
    pub fn uniqueness_claims(
        &self,
        record: &Record,
        record_key: RecordKey,
        tables: &Tables,
    ) -> Result<Vec<IdentifierClaim>> {
        if self.config.uniqueness != Some(Severity::Error) {
            return Ok(Vec::new());
        }
        let related = self.related_keys(tables, record, record_key)?;
        let mut claims = Vec::new();
        for assertion in &record.identifiers {
            let Some(authority) = find_authority(tables, &assertion.authority_code)? else {
                continue;
            };
            if !authority.globally_unique {
                continue;
            }
            let mut allowed: Vec<Uuid> = related.iter().copied().collect();
            allowed.push(record_key.0);
            claims.push(IdentifierClaim {
                authority_code: authority.code.clone(),
                value: assertion.value.clone(),
                allowed_owners: allowed,
                on_conflict: DetectedIssue::governance(
                    Severity::Error,
                    IssueCode::DuplicateIdentifier,
                    format!(
                        "identifier '{}' under authority '{}' is already held by an unrelated record",
                        assertion.value, authority.code
                    ),
                ),
            });
        }
        Ok(claims)
    }

    /// Keys related to the record in either direction: the targets it names
    /// plus records whose currently visible relationships point at it.
    fn related_keys(
        &self,
        tables: &Tables,
        record: &Record,
        record_key: RecordKey,
    ) -> Result<HashSet<Uuid>> {
        let mut related: HashSet<Uuid> =
            record.relationships.iter().map(|r| r.target.0).collect();

        let table = tables.table(TableId::RecordRelationship.table_name())?;
        for (_, row) in table.rows() {
            let Some(holder) = row[col::REL_RECORD_KEY].as_uuid() else {
                continue;
            };
            let Some(target) = row[col::REL_TARGET_KEY].as_uuid() else {
                continue;
            };
            if holder != record_key.0 && target != record_key.0 {
                continue;
            }
            let Some(current) = tables.current_sequence(holder)? else {
                continue;
            };
            let Some(effective) = row[col::REL_EFFECTIVE].as_u64() else {
                continue;
            };
            if edge_visible(effective, row[col::REL_OBSOLETE].as_u64(), current) {
                related.insert(if holder == record_key.0 { target } else { holder });
            }
        }
        related.remove(&record_key.0);
        Ok(related)
    }
}
