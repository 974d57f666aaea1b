/// Engine tests
///
/// Full write/read lifecycle: insert, update, as-of reads, retire.
/// Run with: cargo test --test engine_tests

use chartstore::{
    Engine, EngineConfig, EngineError, HumanName, NameComponentKind, NameUse, Record, RecordKey,
    RecordStatus, Relationship, RelationshipKind, Tag,
};
use chartstore::model::RecordBody;

fn engine() -> Engine {
    Engine::new(EngineConfig::default())
}

fn named_person(family: &str) -> Record {
    Record::person()
        .with_name(HumanName::new(NameUse::Legal).with_component(NameComponentKind::Family, family))
}

#[test]
fn test_insert_assigns_key_and_opens_chain() {
    let engine = engine();
    let saved = engine.insert(&named_person("Smith")).unwrap();

    assert_eq!(saved.sequence(), 1);
    assert!(saved.version.replaces_version_key.is_none());
    assert!(saved.version.is_current());

    let read = engine.read(saved.key(), None).unwrap();
    assert_eq!(read.record.names, saved.record.names);
    assert_eq!(read.sequence(), 1);
}

#[test]
fn test_insert_with_explicit_key_twice_fails() {
    let engine = engine();
    let key = RecordKey::generate();

    engine.insert(&Record::person().with_key(key)).unwrap();
    let err = engine.insert(&Record::person().with_key(key)).unwrap_err();
    assert!(matches!(err, EngineError::ConstraintViolation(_)));
}

#[test]
fn test_update_appends_a_version() {
    let engine = engine();
    let saved = engine.insert(&named_person("Smith")).unwrap();

    let mut changed = saved.record.clone();
    if let RecordBody::Person(fields) = &mut changed.body {
        fields.gender = Some("female".into());
    }
    let updated = engine.update(&changed, saved.sequence()).unwrap();

    assert_eq!(updated.sequence(), 2);
    assert_eq!(
        updated.version.replaces_version_key,
        Some(saved.version.version_key)
    );

    let read = engine.read(saved.key(), None).unwrap();
    assert_eq!(read.sequence(), 2);
    let RecordBody::Person(fields) = &read.record.body else {
        panic!("wrong body type");
    };
    assert_eq!(fields.gender.as_deref(), Some("female"));
}

#[test]
fn test_as_of_read_sees_history() {
    let engine = engine();
    let saved = engine.insert(&named_person("Smith")).unwrap();

    let renamed = Record::person()
        .with_key(saved.key())
        .with_name(HumanName::new(NameUse::Legal).with_component(NameComponentKind::Family, "Jones"));
    engine.update(&renamed, 1).unwrap();

    let v1 = engine.read(saved.key(), Some(1)).unwrap();
    assert_eq!(v1.sequence(), 1);
    assert_eq!(v1.record.names[0].components[0].value, "Smith");

    let v2 = engine.read(saved.key(), Some(2)).unwrap();
    assert_eq!(v2.record.names[0].components[0].value, "Jones");

    // A sequence beyond the chain resolves to the latest version.
    let later = engine.read(saved.key(), Some(99)).unwrap();
    assert_eq!(later.sequence(), 2);
}

#[test]
fn test_as_of_before_first_version_is_not_found() {
    let engine = engine();
    let saved = engine.insert(&Record::person()).unwrap();
    assert!(matches!(
        engine.read(saved.key(), Some(0)),
        Err(EngineError::NotFound(_))
    ));
}

#[test]
fn test_stale_update_fails_without_side_effects() {
    let engine = engine();
    let saved = engine.insert(&named_person("Smith")).unwrap();

    let change = saved.record.clone().with_tag(Tag::new("first"));
    engine.update(&change, 1).unwrap();

    // A second writer still holding sequence 1 must lose.
    let stale = saved.record.clone().with_tag(Tag::new("second"));
    let err = engine.update(&stale, 1).unwrap_err();
    assert!(matches!(err, EngineError::Concurrency { expected: 1, .. }));

    let read = engine.read(saved.key(), None).unwrap();
    assert_eq!(read.sequence(), 2);
    assert_eq!(read.record.tags, vec![Tag::new("first")]);
}

#[test]
fn test_update_cannot_change_record_type() {
    let engine = engine();
    let saved = engine.insert(&Record::person()).unwrap();

    let wrong = Record::organization().with_key(saved.key());
    assert!(matches!(
        engine.update(&wrong, 1),
        Err(EngineError::ConstraintViolation(_))
    ));
}

#[test]
fn test_retire_is_a_soft_delete() {
    let engine = engine();
    let saved = engine.insert(&named_person("Smith")).unwrap();

    let retired = engine.retire(saved.key(), 1).unwrap();
    assert_eq!(retired.sequence(), 2);
    assert_eq!(retired.record.status, RecordStatus::Retired);

    // Both the retired version and the pre-retirement history stay readable.
    let current = engine.read(saved.key(), None).unwrap();
    assert_eq!(current.record.status, RecordStatus::Retired);
    let before = engine.read(saved.key(), Some(1)).unwrap();
    assert_eq!(before.record.status, RecordStatus::Active);
}

#[test]
fn test_relationship_edges_survive_versions() {
    let engine = engine();
    let guardian = engine.insert(&named_person("Smith")).unwrap();
    let ward = engine
        .insert(
            &named_person("Smith")
                .with_relationship(Relationship::new(RelationshipKind::Guardian, guardian.key())),
        )
        .unwrap();

    // An unrelated update keeps the edge visible.
    let change = ward.record.clone().with_tag(Tag::new("pediatric"));
    engine.update(&change, 1).unwrap();

    let read = engine.read(ward.key(), None).unwrap();
    assert_eq!(
        read.record.relationships,
        vec![Relationship::new(RelationshipKind::Guardian, guardian.key())]
    );
}

#[test]
fn test_dropped_edge_invisible_now_visible_in_history() {
    let engine = engine();
    let saved = engine
        .insert(&named_person("Smith").with_tag(Tag::new("vip")))
        .unwrap();

    let alias = HumanName::new(NameUse::Alias).with_component(NameComponentKind::Given, "Smitty");
    let with_alias = saved.record.clone().with_name(alias.clone());
    engine.update(&with_alias, 1).unwrap();

    // Drop the alias again.
    let mut without_alias = with_alias.clone();
    without_alias.names.retain(|n| n.name_use != NameUse::Alias);
    engine.update(&without_alias, 2).unwrap();

    let current = engine.read(saved.key(), None).unwrap();
    assert_eq!(current.record.names.len(), 1);

    let middle = engine.read(saved.key(), Some(2)).unwrap();
    assert_eq!(middle.record.names.len(), 2);
    assert!(middle.record.names.contains(&alias));
}
