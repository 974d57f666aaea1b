use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::{DataType, EngineError, Result, Value};

/// Physical relations the engine maps onto. A closed set: every table the
/// registry can describe exists here, so lookups are total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableId {
    RecordVersion,
    Party,
    Person,
    Organization,
    Observation,
    RecordIdentifier,
    RecordName,
    NameComponent,
    RecordRelationship,
    RecordTag,
    RecordAnnotation,
    Authority,
}

impl TableId {
    pub const ALL: [TableId; 12] = [
        TableId::RecordVersion,
        TableId::Party,
        TableId::Person,
        TableId::Organization,
        TableId::Observation,
        TableId::RecordIdentifier,
        TableId::RecordName,
        TableId::NameComponent,
        TableId::RecordRelationship,
        TableId::RecordTag,
        TableId::RecordAnnotation,
        TableId::Authority,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            Self::RecordVersion => "record_version",
            Self::Party => "party",
            Self::Person => "person",
            Self::Organization => "organization",
            Self::Observation => "observation",
            Self::RecordIdentifier => "record_identifier",
            Self::RecordName => "record_name",
            Self::NameComponent => "name_component",
            Self::RecordRelationship => "record_relationship",
            Self::RecordTag => "record_tag",
            Self::RecordAnnotation => "record_annotation",
            Self::Authority => "authority",
        }
    }
}

/// One column of a mapped relation. The mapping layer is the only place
/// that knows what shape each relation takes, so per-value validation
/// lives here rather than in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn validate(&self, value: &Value) -> Result<()> {
        if value.is_null() {
            if !self.nullable {
                return Err(EngineError::ConstraintViolation(format!(
                    "column '{}' is not nullable",
                    self.name
                )));
            }
            return Ok(());
        }
        if !self.data_type.is_compatible(value) {
            return Err(EngineError::TypeMismatch(format!(
                "column '{}' holds {}, got {}",
                self.name,
                self.data_type,
                value.type_name()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub column: &'static str,
    pub references_table: TableId,
    pub references_column: &'static str,
}

/// Static description of one physical relation.
#[derive(Debug, Clone)]
pub struct TableDescriptor {
    pub id: TableId,
    pub name: &'static str,
    pub key_column: &'static str,
    pub columns: Vec<Column>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableDescriptor {
    pub fn new(id: TableId, key_column: &'static str, columns: Vec<Column>) -> Self {
        Self {
            id,
            name: id.table_name(),
            key_column,
            columns,
            foreign_keys: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|col| col.name == name)
    }

    pub fn with_foreign_key(
        mut self,
        column: &'static str,
        references_table: TableId,
        references_column: &'static str,
    ) -> Self {
        self.foreign_keys.push(ForeignKey {
            column,
            references_table,
            references_column,
        });
        self
    }
}

/// Discriminator column of the base relation.
#[derive(Debug, Clone)]
pub struct DiscriminatorMap {
    pub column: &'static str,
}

impl DiscriminatorMap {
    pub fn build(column: &'static str) -> Self {
        Self { column }
    }
}

/// One navigable child collection: where its rows live, how they correlate
/// with the parent, and whether visibility is version-scoped.
#[derive(Debug, Clone)]
pub struct AssociationDescriptor {
    pub table: TableId,
    /// Column on the child table holding the parent's key.
    pub child_column: &'static str,
    /// Column on the parent alias the child correlates with.
    pub parent_column: &'static str,
    /// Versioned edges carry effective/obsolete sequence bounds.
    pub versioned: bool,
    /// Predicate field name → physical column, for the child context.
    pub fields: &'static [(&'static str, &'static str)],
}

pub(crate) fn build_descriptors() -> HashMap<TableId, TableDescriptor> {
    use DataType::*;

    let mut tables = HashMap::new();
    let mut add = |d: TableDescriptor| {
        tables.insert(d.id, d);
    };

    add(TableDescriptor::new(
        TableId::RecordVersion,
        "version_key",
        vec![
            Column::new("version_key", Uuid).not_null(),
            Column::new("record_key", Uuid).not_null(),
            Column::new("record_type", Text).not_null(),
            Column::new("version_sequence", Integer).not_null(),
            Column::new("replaces_version_key", Uuid),
            Column::new("status", Text).not_null(),
            Column::new("created_by", Uuid).not_null(),
            Column::new("created_at", Timestamp).not_null(),
            Column::new("obsoleted_by", Uuid),
            Column::new("obsoleted_at", Timestamp),
        ],
    ));

    add(
        TableDescriptor::new(
            TableId::Party,
            "version_key",
            vec![
                Column::new("version_key", Uuid).not_null(),
                Column::new("display_name", Text),
            ],
        )
        .with_foreign_key("version_key", TableId::RecordVersion, "version_key"),
    );

    add(
        TableDescriptor::new(
            TableId::Person,
            "version_key",
            vec![
                Column::new("version_key", Uuid).not_null(),
                Column::new("birth_date", Timestamp),
                Column::new("gender", Text),
            ],
        )
        .with_foreign_key("version_key", TableId::RecordVersion, "version_key"),
    );

    add(
        TableDescriptor::new(
            TableId::Organization,
            "version_key",
            vec![
                Column::new("version_key", Uuid).not_null(),
                Column::new("industry", Text),
            ],
        )
        .with_foreign_key("version_key", TableId::RecordVersion, "version_key"),
    );

    add(
        TableDescriptor::new(
            TableId::Observation,
            "version_key",
            vec![
                Column::new("version_key", Uuid).not_null(),
                Column::new("subject_key", Uuid),
                Column::new("effective_at", Timestamp),
                Column::new("quantity", Float),
                Column::new("unit", Text),
            ],
        )
        .with_foreign_key("version_key", TableId::RecordVersion, "version_key"),
    );

    add(
        TableDescriptor::new(
            TableId::RecordIdentifier,
            "edge_key",
            vec![
                Column::new("edge_key", Uuid).not_null(),
                Column::new("record_key", Uuid).not_null(),
                Column::new("authority_key", Uuid).not_null(),
                // Authority code is denormalized onto the edge so identifier
                // predicates scope by authority without an extra join.
                Column::new("authority_code", Text).not_null(),
                Column::new("id_value", Text).not_null(),
                Column::new("effective_seq", Integer).not_null(),
                Column::new("obsolete_seq", Integer),
            ],
        )
        .with_foreign_key("authority_key", TableId::Authority, "authority_key"),
    );

    add(TableDescriptor::new(
        TableId::RecordName,
        "name_key",
        vec![
            Column::new("name_key", Uuid).not_null(),
            Column::new("record_key", Uuid).not_null(),
            Column::new("name_use", Text).not_null(),
            Column::new("effective_seq", Integer).not_null(),
            Column::new("obsolete_seq", Integer),
        ],
    ));

    add(
        TableDescriptor::new(
            TableId::NameComponent,
            "component_key",
            vec![
                Column::new("component_key", Uuid).not_null(),
                Column::new("name_key", Uuid).not_null(),
                Column::new("kind", Text).not_null(),
                Column::new("comp_value", Text).not_null(),
                Column::new("position", Integer).not_null(),
            ],
        )
        .with_foreign_key("name_key", TableId::RecordName, "name_key"),
    );

    add(TableDescriptor::new(
        TableId::RecordRelationship,
        "edge_key",
        vec![
            Column::new("edge_key", Uuid).not_null(),
            Column::new("record_key", Uuid).not_null(),
            Column::new("target_key", Uuid).not_null(),
            Column::new("kind", Text).not_null(),
            Column::new("effective_seq", Integer).not_null(),
            Column::new("obsolete_seq", Integer),
        ],
    ));

    add(TableDescriptor::new(
        TableId::RecordTag,
        "tag_key",
        vec![
            Column::new("tag_key", Uuid).not_null(),
            Column::new("record_key", Uuid).not_null(),
            Column::new("code", Text).not_null(),
            Column::new("label", Text),
        ],
    ));

    add(TableDescriptor::new(
        TableId::RecordAnnotation,
        "annotation_key",
        vec![
            Column::new("annotation_key", Uuid).not_null(),
            Column::new("record_key", Uuid).not_null(),
            Column::new("code", Text).not_null(),
            Column::new("severity", Text).not_null(),
            Column::new("message", Text).not_null(),
            Column::new("category", Text).not_null(),
            Column::new("detail", Text),
        ],
    ));

    add(TableDescriptor::new(
        TableId::Authority,
        "authority_key",
        vec![
            Column::new("authority_key", Uuid).not_null(),
            Column::new("code", Text).not_null(),
            Column::new("name", Text).not_null(),
            Column::new("globally_unique", Boolean).not_null(),
            Column::new("format_pattern", Text),
            Column::new("allowed_levels", Text),
            Column::new("assigning_application", Text),
        ],
    ));

    tables
}
