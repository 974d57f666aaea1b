mod descriptor;

pub use descriptor::{
    AssociationDescriptor, Column, DiscriminatorMap, ForeignKey, TableDescriptor, TableId,
};

use crate::model::RecordType;
use crate::predicate::CollectionPath;
use std::collections::HashMap;
use std::sync::Arc;

const IDENTIFIER_FIELDS: &[(&str, &str)] = &[("value", "id_value"), ("authority", "authority_code")];
const NAME_FIELDS: &[(&str, &str)] = &[("use", "name_use")];
const COMPONENT_FIELDS: &[(&str, &str)] = &[("kind", "kind"), ("value", "comp_value")];
const RELATIONSHIP_FIELDS: &[(&str, &str)] = &[("kind", "kind"), ("target", "target_key")];
const TAG_FIELDS: &[(&str, &str)] = &[("code", "code"), ("label", "label")];

/// Static knowledge of how the domain model maps onto physical relations.
/// Built once at startup, shared via `Arc`, and read without locks after
/// that (no interior mutability).
#[derive(Debug, Clone)]
pub struct MappingRegistry {
    tables: Arc<HashMap<TableId, TableDescriptor>>,
    discriminator: Arc<DiscriminatorMap>,
    satellite_chains: Arc<HashMap<RecordType, Vec<TableId>>>,
    root_fields: Arc<HashMap<RecordType, HashMap<&'static str, (TableId, &'static str)>>>,
    associations: Arc<HashMap<CollectionPath, AssociationDescriptor>>,
}

impl MappingRegistry {
    pub fn build() -> Self {
        let tables = descriptor::build_descriptors();

        let mut satellite_chains = HashMap::new();
        // Most-derived first; the base relation is appended by callers that
        // need the full hydration order.
        satellite_chains.insert(RecordType::Person, vec![TableId::Person, TableId::Party]);
        satellite_chains.insert(
            RecordType::Organization,
            vec![TableId::Organization, TableId::Party],
        );
        satellite_chains.insert(RecordType::Observation, vec![TableId::Observation]);

        let mut root_fields = HashMap::new();
        for rt in RecordType::ALL {
            let mut fields: HashMap<&'static str, (TableId, &'static str)> = HashMap::new();
            for col in [
                "record_key",
                "record_type",
                "version_sequence",
                "status",
                "created_at",
                "obsoleted_at",
            ] {
                fields.insert(col, (TableId::RecordVersion, col));
            }
            match rt {
                RecordType::Person => {
                    fields.insert("display_name", (TableId::Party, "display_name"));
                    fields.insert("birth_date", (TableId::Person, "birth_date"));
                    fields.insert("gender", (TableId::Person, "gender"));
                }
                RecordType::Organization => {
                    fields.insert("display_name", (TableId::Party, "display_name"));
                    fields.insert("industry", (TableId::Organization, "industry"));
                }
                RecordType::Observation => {
                    fields.insert("subject", (TableId::Observation, "subject_key"));
                    fields.insert("effective_at", (TableId::Observation, "effective_at"));
                    fields.insert("quantity", (TableId::Observation, "quantity"));
                    fields.insert("unit", (TableId::Observation, "unit"));
                }
            }
            root_fields.insert(rt, fields);
        }

        let mut associations = HashMap::new();
        associations.insert(
            CollectionPath::Identifiers,
            AssociationDescriptor {
                table: TableId::RecordIdentifier,
                child_column: "record_key",
                parent_column: "record_key",
                versioned: true,
                fields: IDENTIFIER_FIELDS,
            },
        );
        associations.insert(
            CollectionPath::Names,
            AssociationDescriptor {
                table: TableId::RecordName,
                child_column: "record_key",
                parent_column: "record_key",
                versioned: true,
                fields: NAME_FIELDS,
            },
        );
        associations.insert(
            CollectionPath::Components,
            AssociationDescriptor {
                table: TableId::NameComponent,
                child_column: "name_key",
                parent_column: "name_key",
                versioned: false,
                fields: COMPONENT_FIELDS,
            },
        );
        associations.insert(
            CollectionPath::Relationships,
            AssociationDescriptor {
                table: TableId::RecordRelationship,
                child_column: "record_key",
                parent_column: "record_key",
                versioned: true,
                fields: RELATIONSHIP_FIELDS,
            },
        );
        associations.insert(
            CollectionPath::Tags,
            AssociationDescriptor {
                table: TableId::RecordTag,
                child_column: "record_key",
                parent_column: "record_key",
                versioned: false,
                fields: TAG_FIELDS,
            },
        );

        Self {
            tables: Arc::new(tables),
            discriminator: Arc::new(DiscriminatorMap::build("record_type")),
            satellite_chains: Arc::new(satellite_chains),
            root_fields: Arc::new(root_fields),
            associations: Arc::new(associations),
        }
    }

    pub fn table(&self, id: TableId) -> &TableDescriptor {
        // The descriptor map covers TableId::ALL; closed enum keeps this total.
        &self.tables[&id]
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableDescriptor> {
        self.tables.values()
    }

    pub fn discriminator(&self) -> &DiscriminatorMap {
        &self.discriminator
    }

    /// Satellite relations for a concrete type, most-derived first. The base
    /// relation is not included.
    pub fn satellite_chain(&self, rtype: RecordType) -> &[TableId] {
        &self.satellite_chains[&rtype]
    }

    /// Resolve a root-context predicate field to its physical column.
    pub fn root_field(&self, rtype: RecordType, field: &str) -> Option<(TableId, &'static str)> {
        self.root_fields[&rtype].get(field).copied()
    }

    pub fn association(&self, path: CollectionPath) -> &AssociationDescriptor {
        &self.associations[&path]
    }

    /// Resolve a predicate field within a collection context.
    pub fn collection_field(&self, path: CollectionPath, field: &str) -> Option<&'static str> {
        self.association(path)
            .fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, col)| *col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_all_tables() {
        let registry = MappingRegistry::build();
        for id in TableId::ALL {
            assert_eq!(registry.table(id).id, id);
        }
    }

    #[test]
    fn test_satellite_chains() {
        let registry = MappingRegistry::build();
        assert_eq!(
            registry.satellite_chain(RecordType::Person),
            &[TableId::Person, TableId::Party]
        );
        assert_eq!(
            registry.satellite_chain(RecordType::Observation),
            &[TableId::Observation]
        );
    }

    #[test]
    fn test_field_resolution() {
        let registry = MappingRegistry::build();
        assert_eq!(
            registry.root_field(RecordType::Person, "gender"),
            Some((TableId::Person, "gender"))
        );
        assert_eq!(
            registry.root_field(RecordType::Organization, "display_name"),
            Some((TableId::Party, "display_name"))
        );
        assert_eq!(registry.root_field(RecordType::Observation, "gender"), None);
        assert_eq!(
            registry.collection_field(CollectionPath::Identifiers, "authority"),
            Some("authority_code")
        );
    }
}
