use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::{EngineError, Result, Row};
use crate::mapping::{Column, TableDescriptor};

/// Column layout plus identity of one physical relation, taken from its
/// mapping descriptor at bootstrap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    name: String,
    columns: Vec<Column>,
}

impl TableSchema {
    pub fn from_descriptor(descriptor: &TableDescriptor) -> Self {
        Self {
            name: descriptor.name.to_string(),
            columns: descriptor.columns.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

/// One physical relation: schema-validated rows keyed by an internal row
/// id. Version history is modeled by the engine's version chains, not by
/// per-row multiversioning, so rows here are plain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<u64, Row>,
    next_row_id: u64,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            next_row_id: 0,
        }
    }

    pub fn validate_row(&self, row: &Row) -> Result<()> {
        let columns = self.schema.columns();
        if row.len() != columns.len() {
            return Err(EngineError::Execution(format!(
                "Table '{}': expected {} columns, got {}",
                self.schema.name(),
                columns.len(),
                row.len()
            )));
        }
        for (column, value) in columns.iter().zip(row.iter()) {
            column.validate(value)?;
        }
        Ok(())
    }

    pub fn insert(&mut self, row: Row) -> Result<u64> {
        self.validate_row(&row)?;
        let id = self.next_row_id;
        self.next_row_id += 1;
        self.rows.insert(id, row);
        Ok(id)
    }

    pub fn update(&mut self, id: u64, row: Row) -> Result<()> {
        self.validate_row(&row)?;
        match self.rows.get_mut(&id) {
            Some(slot) => {
                *slot = row;
                Ok(())
            }
            None => Err(EngineError::Execution(format!(
                "Table '{}': row {} does not exist",
                self.schema.name(),
                id
            ))),
        }
    }

    pub fn delete(&mut self, id: u64) -> bool {
        self.rows.remove(&id).is_some()
    }

    pub fn get(&self, id: u64) -> Option<&Row> {
        self.rows.get(&id)
    }

    pub fn rows(&self) -> impl Iterator<Item = (u64, &Row)> {
        self.rows.iter().map(|(id, row)| (*id, row))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Index of a column in this table's schema, by name.
    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.schema
            .columns()
            .iter()
            .position(|col| col.name == column)
            .ok_or_else(|| {
                EngineError::ColumnNotFound(column.to_string(), self.schema.name().to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, Value};
    use crate::mapping::TableId;

    fn table() -> Table {
        let descriptor = crate::mapping::TableDescriptor::new(
            TableId::RecordTag,
            "tag_key",
            vec![
                Column::new("tag_key", DataType::Uuid).not_null(),
                Column::new("record_key", DataType::Uuid).not_null(),
                Column::new("code", DataType::Text).not_null(),
                Column::new("label", DataType::Text),
            ],
        );
        Table::new(TableSchema::from_descriptor(&descriptor))
    }

    #[test]
    fn test_insert_validates_arity_and_types() {
        let mut t = table();
        let short = vec![Value::from("x")];
        assert!(t.insert(short).is_err());

        let wrong_type = vec![
            Value::from("not-a-uuid"),
            Value::from("also-not"),
            Value::from("code"),
            Value::Null,
        ];
        assert!(t.insert(wrong_type).is_err());
    }

    #[test]
    fn test_insert_update_delete() {
        let mut t = table();
        let key = uuid::Uuid::new_v4();
        let record = uuid::Uuid::new_v4();
        let row = vec![
            Value::from(key),
            Value::from(record),
            Value::from("vip"),
            Value::Null,
        ];
        let id = t.insert(row.clone()).unwrap();
        assert_eq!(t.row_count(), 1);

        let mut updated = row.clone();
        updated[3] = Value::from("Very Important");
        t.update(id, updated).unwrap();
        assert_eq!(t.get(id).unwrap()[3], Value::from("Very Important"));

        assert!(t.delete(id));
        assert_eq!(t.row_count(), 0);
    }
}
