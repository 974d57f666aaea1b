//! Row-level translation for association edges. Versioned edges carry an
//! effectivity window in version-sequence space; non-versioned edges
//! (tags, annotations, name components) are replaced wholesale.

use uuid::Uuid;

use crate::core::{EngineError, Result, Row, Value};
use crate::mapping::TableId;
use crate::model::{
    AuthorityKey, DetectedIssue, HumanName, IdentifierAssertion, IssueCategory, IssueCode,
    NameComponent, NameComponentKind, NameUse, RecordKey, Relationship, RelationshipKind, Severity,
    Tag,
};
use crate::store::Tables;
use crate::version::edge_visible;

pub(crate) mod identifier_col {
    pub const RECORD_KEY: usize = 1;
    pub const AUTHORITY_CODE: usize = 3;
    pub const VALUE: usize = 4;
    pub const EFFECTIVE: usize = 5;
    pub const OBSOLETE: usize = 6;
}

pub(crate) mod name_col {
    pub const NAME_KEY: usize = 0;
    pub const RECORD_KEY: usize = 1;
    pub const NAME_USE: usize = 2;
    pub const EFFECTIVE: usize = 3;
    pub const OBSOLETE: usize = 4;
}

pub(crate) mod component_col {
    pub const NAME_KEY: usize = 1;
    pub const KIND: usize = 2;
    pub const VALUE: usize = 3;
    pub const POSITION: usize = 4;
}

pub(crate) mod relationship_col {
    pub const RECORD_KEY: usize = 1;
    pub const TARGET_KEY: usize = 2;
    pub const KIND: usize = 3;
    pub const EFFECTIVE: usize = 4;
    pub const OBSOLETE: usize = 5;
}

pub(crate) mod tag_col {
    pub const RECORD_KEY: usize = 1;
    pub const CODE: usize = 2;
    pub const LABEL: usize = 3;
}

pub(crate) mod annotation_col {
    pub const RECORD_KEY: usize = 1;
    pub const CODE: usize = 2;
    pub const SEVERITY: usize = 3;
    pub const MESSAGE: usize = 4;
    pub const CATEGORY: usize = 5;
}

/// A versioned edge as found in the store, carried with its row id so an
/// update can obsolete it in place.
#[derive(Debug, Clone)]
pub(crate) struct VisibleEdge {
    pub row_id: u64,
    pub row: Row,
}

pub(crate) fn identifier_row_values(
    record_key: RecordKey,
    authority_key: AuthorityKey,
    assertion: &IdentifierAssertion,
    effective_seq: u64,
) -> Row {
    vec![
        Value::from(Uuid::new_v4()),
        Value::from(record_key.0),
        Value::from(authority_key.0),
        Value::from(assertion.authority_code.clone()),
        Value::from(assertion.value.clone()),
        Value::from(effective_seq),
        Value::Null,
    ]
}

pub(crate) fn name_row_values(
    name_key: Uuid,
    record_key: RecordKey,
    name_use: NameUse,
    effective_seq: u64,
) -> Row {
    vec![
        Value::from(name_key),
        Value::from(record_key.0),
        Value::from(name_use.as_str()),
        Value::from(effective_seq),
        Value::Null,
    ]
}

pub(crate) fn component_row_values(
    name_key: Uuid,
    component: &NameComponent,
    position: usize,
) -> Row {
    vec![
        Value::from(Uuid::new_v4()),
        Value::from(name_key),
        Value::from(component.kind.as_str()),
        Value::from(component.value.clone()),
        Value::from(position as i64),
    ]
}

pub(crate) fn relationship_row_values(
    record_key: RecordKey,
    relationship: &Relationship,
    effective_seq: u64,
) -> Row {
    vec![
        Value::from(Uuid::new_v4()),
        Value::from(record_key.0),
        Value::from(relationship.target.0),
        Value::from(relationship.kind.as_str()),
        Value::from(effective_seq),
        Value::Null,
    ]
}

pub(crate) fn tag_row_values(record_key: RecordKey, tag: &Tag) -> Row {
    vec![
        Value::from(Uuid::new_v4()),
        Value::from(record_key.0),
        Value::from(tag.code.clone()),
        Value::from(tag.label.clone()),
    ]
}

pub(crate) fn annotation_row_values(record_key: RecordKey, issue: &DetectedIssue) -> Row {
    vec![
        Value::from(Uuid::new_v4()),
        Value::from(record_key.0),
        Value::from(issue.code.as_str()),
        Value::from(issue.severity.as_str()),
        Value::from(issue.message.clone()),
        Value::from(issue.category.as_str()),
        Value::Null,
    ]
}

fn malformed(table: &str, what: &str) -> EngineError {
    EngineError::Execution(format!("{} row: malformed {}", table, what))
}

pub(crate) fn parse_annotation_row(row: &Row) -> Result<DetectedIssue> {
    let table = TableId::RecordAnnotation.table_name();
    Ok(DetectedIssue::new(
        row[annotation_col::SEVERITY]
            .as_str()
            .and_then(Severity::from_str)
            .ok_or_else(|| malformed(table, "severity"))?,
        row[annotation_col::CODE]
            .as_str()
            .and_then(IssueCode::from_str)
            .ok_or_else(|| malformed(table, "code"))?,
        row[annotation_col::MESSAGE]
            .as_str()
            .ok_or_else(|| malformed(table, "message"))?,
        row[annotation_col::CATEGORY]
            .as_str()
            .and_then(IssueCategory::from_str)
            .ok_or_else(|| malformed(table, "category"))?,
    ))
}

/// Copy of a versioned edge row with its obsoletion sequence set.
pub(crate) fn obsoleted_copy(row: &Row, obsolete_idx: usize, obsolete_seq: u64) -> Row {
    let mut copy = row.clone();
    copy[obsolete_idx] = Value::from(obsolete_seq);
    copy
}

fn visible(row: &Row, effective_idx: usize, obsolete_idx: usize, viewed_seq: u64) -> bool {
    match row[effective_idx].as_u64() {
        Some(effective) => edge_visible(effective, row[obsolete_idx].as_u64(), viewed_seq),
        None => false,
    }
}

pub(crate) fn load_visible_identifiers(
    tables: &Tables,
    record_key: RecordKey,
    viewed_seq: u64,
) -> Result<Vec<(VisibleEdge, IdentifierAssertion)>> {
    let table = tables.table(TableId::RecordIdentifier.table_name())?;
    let mut edges = Vec::new();
    for (row_id, row) in table.rows() {
        if row[identifier_col::RECORD_KEY].as_uuid() != Some(record_key.0)
            || !visible(row, identifier_col::EFFECTIVE, identifier_col::OBSOLETE, viewed_seq)
        {
            continue;
        }
        let assertion = IdentifierAssertion::new(
            row[identifier_col::AUTHORITY_CODE]
                .as_str()
                .ok_or_else(|| malformed("record_identifier", "authority code"))?,
            row[identifier_col::VALUE]
                .as_str()
                .ok_or_else(|| malformed("record_identifier", "value"))?,
        );
        edges.push((
            VisibleEdge {
                row_id,
                row: row.clone(),
            },
            assertion,
        ));
    }
    Ok(edges)
}

pub(crate) fn load_visible_names(
    tables: &Tables,
    record_key: RecordKey,
    viewed_seq: u64,
) -> Result<Vec<(VisibleEdge, HumanName)>> {
    let names = tables.table(TableId::RecordName.table_name())?;
    let components = tables.table(TableId::NameComponent.table_name())?;

    let mut edges = Vec::new();
    for (row_id, row) in names.rows() {
        if row[name_col::RECORD_KEY].as_uuid() != Some(record_key.0)
            || !visible(row, name_col::EFFECTIVE, name_col::OBSOLETE, viewed_seq)
        {
            continue;
        }
        let name_use = row[name_col::NAME_USE]
            .as_str()
            .and_then(NameUse::from_str)
            .ok_or_else(|| malformed("record_name", "use code"))?;
        let name_key = row[name_col::NAME_KEY]
            .as_uuid()
            .ok_or_else(|| malformed("record_name", "key"))?;

        let mut parts: Vec<(i64, NameComponent)> = Vec::new();
        for (_, comp) in components.rows() {
            if comp[component_col::NAME_KEY].as_uuid() != Some(name_key) {
                continue;
            }
            let kind = comp[component_col::KIND]
                .as_str()
                .and_then(NameComponentKind::from_str)
                .ok_or_else(|| malformed("name_component", "kind"))?;
            let value = comp[component_col::VALUE]
                .as_str()
                .ok_or_else(|| malformed("name_component", "value"))?;
            parts.push((
                comp[component_col::POSITION].as_i64().unwrap_or(0),
                NameComponent::new(kind, value),
            ));
        }
        parts.sort_by_key(|(position, _)| *position);

        let mut name = HumanName::new(name_use);
        name.components = parts.into_iter().map(|(_, c)| c).collect();
        edges.push((
            VisibleEdge {
                row_id,
                row: row.clone(),
            },
            name,
        ));
    }
    Ok(edges)
}

pub(crate) fn load_visible_relationships(
    tables: &Tables,
    record_key: RecordKey,
    viewed_seq: u64,
) -> Result<Vec<(VisibleEdge, Relationship)>> {
    let table = tables.table(TableId::RecordRelationship.table_name())?;
    let mut edges = Vec::new();
    for (row_id, row) in table.rows() {
        if row[relationship_col::RECORD_KEY].as_uuid() != Some(record_key.0)
            || !visible(
                row,
                relationship_col::EFFECTIVE,
                relationship_col::OBSOLETE,
                viewed_seq,
            )
        {
            continue;
        }
        let relationship = Relationship::new(
            row[relationship_col::KIND]
                .as_str()
                .and_then(RelationshipKind::from_str)
                .ok_or_else(|| malformed("record_relationship", "kind"))?,
            RecordKey(
                row[relationship_col::TARGET_KEY]
                    .as_uuid()
                    .ok_or_else(|| malformed("record_relationship", "target"))?,
            ),
        );
        edges.push((
            VisibleEdge {
                row_id,
                row: row.clone(),
            },
            relationship,
        ));
    }
    Ok(edges)
}

pub(crate) fn load_tags(tables: &Tables, record_key: RecordKey) -> Result<Vec<Tag>> {
    let table = tables.table(TableId::RecordTag.table_name())?;
    let mut tags = Vec::new();
    for (_, row) in table.rows() {
        if row[tag_col::RECORD_KEY].as_uuid() != Some(record_key.0) {
            continue;
        }
        let mut tag = Tag::new(
            row[tag_col::CODE]
                .as_str()
                .ok_or_else(|| malformed("record_tag", "code"))?,
        );
        if let Some(label) = row[tag_col::LABEL].as_str() {
            tag = tag.with_label(label);
        }
        tags.push(tag);
    }
    Ok(tags)
}

pub(crate) fn load_annotations(tables: &Tables, record_key: RecordKey) -> Result<Vec<DetectedIssue>> {
    let table = tables.table(TableId::RecordAnnotation.table_name())?;
    let mut annotations = Vec::new();
    for (_, row) in table.rows() {
        if row[annotation_col::RECORD_KEY].as_uuid() == Some(record_key.0) {
            annotations.push(parse_annotation_row(row)?);
        }
    }
    Ok(annotations)
}
