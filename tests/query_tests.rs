/// Query tests
///
/// End-to-end predicate execution: existentials over edges, the counting
/// rewrite against the generic path, ordering, and pagination.
/// Run with: cargo test --test query_tests

use std::sync::Arc;

use chartstore::compiler::HackRegistry;
use chartstore::model::FixedPrincipal;
use chartstore::{
    Authority, CollectionPath, Engine, EngineConfig, HumanName, IdentifierAssertion,
    NameComponentKind, NameUse, OrderSpec, Predicate, Record, RecordType, TotalCountMode,
};

fn engine() -> Engine {
    Engine::new(EngineConfig::default())
}

fn person(family: &str, given: &str) -> Record {
    Record::person().with_name(
        HumanName::new(NameUse::Legal)
            .with_component(NameComponentKind::Family, family)
            .with_component(NameComponentKind::Given, given),
    )
}

fn family_given(family: &str, given: &str) -> Predicate {
    Predicate::any_where(
        CollectionPath::Names,
        Predicate::eq("use", "legal"),
        Predicate::and(vec![
            Predicate::any(
                CollectionPath::Components,
                Predicate::and(vec![
                    Predicate::eq("kind", "family"),
                    Predicate::eq("value", family.to_string()),
                ]),
            ),
            Predicate::any(
                CollectionPath::Components,
                Predicate::and(vec![
                    Predicate::eq("kind", "given"),
                    Predicate::eq("value", given.to_string()),
                ]),
            ),
        ]),
    )
}

#[test]
fn test_name_pair_search_matches_one_name_not_across_names() {
    let engine = engine();

    engine.insert(&person("Smith", "Jane")).unwrap();
    // Family Smith and given Jane, but spread across two different names.
    engine
        .insert(
            &Record::person()
                .with_name(
                    HumanName::new(NameUse::Legal)
                        .with_component(NameComponentKind::Family, "Smith")
                        .with_component(NameComponentKind::Given, "Robert"),
                )
                .with_name(
                    HumanName::new(NameUse::Legal)
                        .with_component(NameComponentKind::Family, "Jones")
                        .with_component(NameComponentKind::Given, "Jane"),
                ),
        )
        .unwrap();

    let page = engine
        .query(RecordType::Person, &family_given("Smith", "Jane"), &[], 0, 10)
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.records[0].record.names[0].components[0].value, "Smith");
}

#[test]
fn test_hack_and_generic_paths_agree() {
    let seed = |engine: &Engine| {
        engine.insert(&person("Smith", "Jane")).unwrap();
        engine.insert(&person("Smith", "Robert")).unwrap();
        engine.insert(&person("Jones", "Jane")).unwrap();
    };

    let hacked = engine();
    seed(&hacked);

    let generic = Engine::with_hacks(
        EngineConfig::default(),
        Arc::new(FixedPrincipal::application("chartstore")),
        HackRegistry::new(),
    );
    seed(&generic);

    let predicate = family_given("Smith", "Jane");
    let from_hack = hacked
        .query(RecordType::Person, &predicate, &[], 0, 10)
        .unwrap();
    let from_generic = generic
        .query(RecordType::Person, &predicate, &[], 0, 10)
        .unwrap();

    assert_eq!(from_hack.total, 1);
    assert_eq!(from_generic.total, 1);
    assert_eq!(
        from_hack.records[0].record.names,
        from_generic.records[0].record.names
    );
}

#[test]
fn test_guard_differs_from_conjunction_inside_existential() {
    let engine = engine();

    // Only an alias name carries the Smith family component.
    engine
        .insert(&Record::person().with_name(
            HumanName::new(NameUse::Alias).with_component(NameComponentKind::Family, "Smith"),
        ))
        .unwrap();

    let component_is_smith = Predicate::any(
        CollectionPath::Components,
        Predicate::and(vec![
            Predicate::eq("kind", "family"),
            Predicate::eq("value", "Smith"),
        ]),
    );

    // Guarded to legal names: no match.
    let guarded = Predicate::any_where(
        CollectionPath::Names,
        Predicate::eq("use", "legal"),
        component_is_smith.clone(),
    );
    let page = engine
        .query(RecordType::Person, &guarded, &[], 0, 10)
        .unwrap();
    assert_eq!(page.total, 0);

    // Unguarded: the alias satisfies the existential.
    let unguarded = Predicate::any(CollectionPath::Names, component_is_smith);
    let page = engine
        .query(RecordType::Person, &unguarded, &[], 0, 10)
        .unwrap();
    assert_eq!(page.total, 1);
}

#[test]
fn test_query_sees_only_current_versions() {
    let engine = engine();
    let saved = engine.insert(&person("Smith", "Jane")).unwrap();

    // Rename to Jones; the Smith version is history.
    let renamed = Record::person().with_key(saved.key()).with_name(
        HumanName::new(NameUse::Legal)
            .with_component(NameComponentKind::Family, "Jones")
            .with_component(NameComponentKind::Given, "Jane"),
    );
    engine.update(&renamed, 1).unwrap();

    let smith = engine
        .query(RecordType::Person, &family_given("Smith", "Jane"), &[], 0, 10)
        .unwrap();
    assert_eq!(smith.total, 0);

    let jones = engine
        .query(RecordType::Person, &family_given("Jones", "Jane"), &[], 0, 10)
        .unwrap();
    assert_eq!(jones.total, 1);
}

#[test]
fn test_query_is_type_scoped() {
    let engine = engine();
    engine
        .register_authority(&Authority::new("ACC", "Account Number"))
        .unwrap();
    engine
        .insert(&Record::person().with_identifier(IdentifierAssertion::new("ACC", "7")))
        .unwrap();
    engine
        .insert(&Record::organization().with_identifier(IdentifierAssertion::new("ACC", "7")))
        .unwrap();

    let by_identifier = Predicate::any(
        CollectionPath::Identifiers,
        Predicate::eq("value", "7"),
    );
    let people = engine
        .query(RecordType::Person, &by_identifier, &[], 0, 10)
        .unwrap();
    assert_eq!(people.total, 1);
    assert_eq!(people.records[0].record.record_type(), RecordType::Person);
}

#[test]
fn test_identifier_scoped_by_authority() {
    let engine = engine();
    engine
        .register_authority(&Authority::new("ACC", "Account Number"))
        .unwrap();
    engine
        .register_authority(&Authority::new("MRN", "Medical Record Number"))
        .unwrap();
    engine
        .insert(&Record::person().with_identifier(IdentifierAssertion::new("ACC", "7")))
        .unwrap();

    let as_mrn = Predicate::any(
        CollectionPath::Identifiers,
        Predicate::and(vec![
            Predicate::eq("authority", "MRN"),
            Predicate::eq("value", "7"),
        ]),
    );
    assert_eq!(
        engine
            .query(RecordType::Person, &as_mrn, &[], 0, 10)
            .unwrap()
            .total,
        0
    );
}

#[test]
fn test_ordering_and_pagination() {
    let engine = engine();
    for family in ["Adams", "Baker", "Clark", "Davis", "Evans"] {
        engine.insert(&person(family, "Pat")).unwrap();
    }

    let all = Predicate::eq("status", "active");
    let order = [OrderSpec::asc("display_name"), OrderSpec::asc("record_key")];

    let first = engine
        .query(RecordType::Person, &all, &order, 0, 2)
        .unwrap();
    assert_eq!(first.total, 5);
    assert_eq!(first.records.len(), 2);

    let second = engine
        .query(RecordType::Person, &all, &order, 2, 2)
        .unwrap();
    assert_eq!(second.records.len(), 2);

    let last = engine.query(RecordType::Person, &all, &order, 4, 2).unwrap();
    assert_eq!(last.records.len(), 1);

    // Pages never overlap.
    let mut seen: Vec<_> = first
        .records
        .iter()
        .chain(&second.records)
        .chain(&last.records)
        .map(|r| r.key())
        .collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 5);
}

#[test]
fn test_fuzzy_count_is_a_lower_bound() {
    let engine = Engine::new(EngineConfig::default().total_count(TotalCountMode::Fuzzy));
    for i in 0..10 {
        engine.insert(&person("Smith", &format!("P{}", i))).unwrap();
    }

    let all = Predicate::eq("status", "active");
    let page = engine.query(RecordType::Person, &all, &[], 0, 3).unwrap();
    assert_eq!(page.records.len(), 3);
    // Scanning stops one row past the page: 0 + 3 + 1.
    assert_eq!(page.total, 4);

    let exact = Engine::new(EngineConfig::default());
    for i in 0..10 {
        exact.insert(&person("Smith", &format!("P{}", i))).unwrap();
    }
    let page = exact.query(RecordType::Person, &all, &[], 0, 3).unwrap();
    assert_eq!(page.total, 10);
}

#[test]
fn test_contains_on_display_name() {
    let engine = engine();
    let mut acme = Record::organization();
    if let chartstore::model::RecordBody::Organization(fields) = &mut acme.body {
        fields.display_name = Some("Acme Corporation".into());
    }
    engine.insert(&acme).unwrap();

    let page = engine
        .query(
            RecordType::Organization,
            &Predicate::contains("display_name", "me Corp"),
            &[],
            0,
            10,
        )
        .unwrap();
    assert_eq!(page.total, 1);
}
