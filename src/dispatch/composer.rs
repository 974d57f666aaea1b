use std::collections::HashMap;

use crate::core::{Result, Row, Value};
use crate::mapping::TableId;
use crate::model::{
    ObservationFields, OrganizationFields, PersonFields, RecordBody, RecordKey, RecordType,
    VersionKey,
};

/// Composes satellite rows into a subtype body and decomposes a body back
/// into satellite rows. One implementation per concrete type, registered
/// under its discriminator value.
pub trait SubtypeComposer: Send + Sync {
    fn record_type(&self) -> RecordType;

    /// Satellite rows for a new version, keyed by target relation. Rows are
    /// emitted in satellite-chain order.
    fn decompose(&self, version_key: VersionKey, body: &RecordBody) -> Result<Vec<(TableId, Row)>>;

    /// Rebuild the body from whatever satellite rows were found. Missing
    /// satellites yield the fields of the nearest ancestor that was found;
    /// the dispatcher logs the anomaly.
    fn compose(&self, satellites: &HashMap<TableId, Row>) -> RecordBody;
}

fn party_row(version_key: VersionKey, display_name: &Option<String>) -> (TableId, Row) {
    (
        TableId::Party,
        vec![
            Value::from(version_key.0),
            Value::from(display_name.clone()),
        ],
    )
}

fn party_display_name(satellites: &HashMap<TableId, Row>) -> Option<String> {
    satellites
        .get(&TableId::Party)
        .and_then(|row| row[1].as_str().map(str::to_string))
}

pub struct PersonComposer;

impl SubtypeComposer for PersonComposer {
    fn record_type(&self) -> RecordType {
        RecordType::Person
    }

    fn decompose(&self, version_key: VersionKey, body: &RecordBody) -> Result<Vec<(TableId, Row)>> {
        let RecordBody::Person(fields) = body else {
            return Err(crate::core::EngineError::Execution(
                "person composer handed a non-person body".into(),
            ));
        };
        Ok(vec![
            (
                TableId::Person,
                vec![
                    Value::from(version_key.0),
                    Value::from(fields.birth_date),
                    Value::from(fields.gender.clone()),
                ],
            ),
            party_row(version_key, &fields.display_name),
        ])
    }

    fn compose(&self, satellites: &HashMap<TableId, Row>) -> RecordBody {
        let (birth_date, gender) = match satellites.get(&TableId::Person) {
            Some(row) => (
                row[1].as_timestamp(),
                row[2].as_str().map(str::to_string),
            ),
            None => (None, None),
        };
        RecordBody::Person(PersonFields {
            display_name: party_display_name(satellites),
            birth_date,
            gender,
        })
    }
}

pub struct OrganizationComposer;

impl SubtypeComposer for OrganizationComposer {
    fn record_type(&self) -> RecordType {
        RecordType::Organization
    }

    fn decompose(&self, version_key: VersionKey, body: &RecordBody) -> Result<Vec<(TableId, Row)>> {
        let RecordBody::Organization(fields) = body else {
            return Err(crate::core::EngineError::Execution(
                "organization composer handed a non-organization body".into(),
            ));
        };
        Ok(vec![
            (
                TableId::Organization,
                vec![
                    Value::from(version_key.0),
                    Value::from(fields.industry.clone()),
                ],
            ),
            party_row(version_key, &fields.display_name),
        ])
    }

    fn compose(&self, satellites: &HashMap<TableId, Row>) -> RecordBody {
        let industry = satellites
            .get(&TableId::Organization)
            .and_then(|row| row[1].as_str().map(str::to_string));
        RecordBody::Organization(OrganizationFields {
            display_name: party_display_name(satellites),
            industry,
        })
    }
}

pub struct ObservationComposer;

impl SubtypeComposer for ObservationComposer {
    fn record_type(&self) -> RecordType {
        RecordType::Observation
    }

    fn decompose(&self, version_key: VersionKey, body: &RecordBody) -> Result<Vec<(TableId, Row)>> {
        let RecordBody::Observation(fields) = body else {
            return Err(crate::core::EngineError::Execution(
                "observation composer handed a non-observation body".into(),
            ));
        };
        Ok(vec![(
            TableId::Observation,
            vec![
                Value::from(version_key.0),
                Value::from(fields.subject.map(|k| k.0)),
                Value::from(fields.effective_at),
                Value::from(fields.quantity),
                Value::from(fields.unit.clone()),
            ],
        )])
    }

    fn compose(&self, satellites: &HashMap<TableId, Row>) -> RecordBody {
        let fields = match satellites.get(&TableId::Observation) {
            Some(row) => ObservationFields {
                subject: row[1].as_uuid().map(RecordKey),
                effective_at: row[2].as_timestamp(),
                quantity: row[3].as_f64(),
                unit: row[4].as_str().map(str::to_string),
            },
            None => ObservationFields {
                subject: None,
                effective_at: None,
                quantity: None,
                unit: None,
            },
        };
        RecordBody::Observation(fields)
    }
}

/// Discriminator value → composer, built once at startup. Replaces
/// reflective subtype dispatch with a closed registry.
pub struct ComposerRegistry {
    composers: HashMap<&'static str, Box<dyn SubtypeComposer>>,
}

impl ComposerRegistry {
    pub fn standard() -> Self {
        let mut composers: HashMap<&'static str, Box<dyn SubtypeComposer>> = HashMap::new();
        for composer in [
            Box::new(PersonComposer) as Box<dyn SubtypeComposer>,
            Box::new(OrganizationComposer),
            Box::new(ObservationComposer),
        ] {
            composers.insert(composer.record_type().discriminator(), composer);
        }
        Self { composers }
    }

    pub fn for_type(&self, rtype: RecordType) -> &dyn SubtypeComposer {
        // Standard registry covers every RecordType variant.
        self.composers[rtype.discriminator()].as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;

    #[test]
    fn test_person_decompose_compose_round_trip() {
        let registry = ComposerRegistry::standard();
        let composer = registry.for_type(RecordType::Person);

        let mut record = Record::person();
        if let RecordBody::Person(fields) = &mut record.body {
            fields.display_name = Some("Ada".into());
            fields.gender = Some("female".into());
        }

        let version_key = VersionKey::generate();
        let rows = composer.decompose(version_key, &record.body).unwrap();
        let satellites: HashMap<TableId, Row> = rows.into_iter().collect();
        assert_eq!(composer.compose(&satellites), record.body);
    }

    #[test]
    fn test_missing_satellite_degrades_to_ancestor_fields() {
        let registry = ComposerRegistry::standard();
        let composer = registry.for_type(RecordType::Person);

        let version_key = VersionKey::generate();
        let mut satellites = HashMap::new();
        satellites.insert(
            TableId::Party,
            vec![Value::from(version_key.0), Value::from("Ada")],
        );

        // The person satellite is gone; party-level fields survive.
        let body = composer.compose(&satellites);
        let RecordBody::Person(fields) = body else {
            panic!("wrong body type");
        };
        assert_eq!(fields.display_name.as_deref(), Some("Ada"));
        assert_eq!(fields.birth_date, None);
        assert_eq!(fields.gender, None);
    }
}
