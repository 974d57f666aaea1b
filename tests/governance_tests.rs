/// Governance tests
///
/// Authority registration and the identifier rules: existence, scope,
/// global uniqueness, assigning application, and format advisories.
/// Run with: cargo test --test governance_tests

use std::sync::Arc;

use chartstore::model::{FixedPrincipal, IssueCode};
use chartstore::{
    Authority, Engine, EngineConfig, EngineError, GovernanceConfig, IdentifierAssertion, Record,
    Relationship, RelationshipKind, Severity, TypeLevel,
};

fn engine() -> Engine {
    Engine::new(EngineConfig::default())
}

#[test]
fn test_unknown_authority_blocks_write() {
    let engine = engine();
    let err = engine
        .insert(&Record::person().with_identifier(IdentifierAssertion::new("MRN", "123456")))
        .unwrap_err();

    let issues = err.issues().expect("governance rejection");
    assert_eq!(issues[0].code, IssueCode::UnknownAuthority);
}

#[test]
fn test_unknown_authority_tolerated_when_rule_off() {
    let config = EngineConfig::default().governance(GovernanceConfig::disabled());
    let engine = Engine::new(config);

    // The write succeeds and a stub authority backs the edge.
    let saved = engine
        .insert(&Record::person().with_identifier(IdentifierAssertion::new("MRN", "123456")))
        .unwrap();
    let read = engine.read(saved.key(), None).unwrap();
    assert_eq!(
        read.record.identifiers,
        vec![IdentifierAssertion::new("MRN", "123456")]
    );
}

#[test]
fn test_globally_unique_identifier_rejected_across_strangers() {
    let engine = engine();
    engine
        .register_authority(&Authority::new("GTIN", "Global Trade Item Number").unique())
        .unwrap();

    engine
        .insert(&Record::organization().with_identifier(IdentifierAssertion::new("GTIN", "0001")))
        .unwrap();

    let err = engine
        .insert(&Record::organization().with_identifier(IdentifierAssertion::new("GTIN", "0001")))
        .unwrap_err();
    let issues = err.issues().expect("governance rejection");
    assert_eq!(issues[0].code, IssueCode::DuplicateIdentifier);

    // A different value under the same authority is fine.
    engine
        .insert(&Record::organization().with_identifier(IdentifierAssertion::new("GTIN", "0002")))
        .unwrap();
}

#[test]
fn test_related_record_may_share_unique_identifier() {
    let engine = engine();
    engine
        .register_authority(&Authority::new("GTIN", "Global Trade Item Number").unique())
        .unwrap();

    let parent = engine
        .insert(&Record::organization().with_identifier(IdentifierAssertion::new("GTIN", "0001")))
        .unwrap();

    // A record related to the current holder may share the identifier.
    engine
        .insert(
            &Record::organization()
                .with_identifier(IdentifierAssertion::new("GTIN", "0001"))
                .with_relationship(Relationship::new(RelationshipKind::Affiliate, parent.key())),
        )
        .unwrap();
}

#[test]
fn test_record_keeps_its_own_unique_identifier_across_updates() {
    let engine = engine();
    engine
        .register_authority(&Authority::new("GTIN", "Global Trade Item Number").unique())
        .unwrap();

    let saved = engine
        .insert(&Record::organization().with_identifier(IdentifierAssertion::new("GTIN", "0001")))
        .unwrap();

    // Re-asserting its own identifier on update is not a duplicate.
    let updated = engine.update(&saved.record, 1).unwrap();
    assert_eq!(updated.sequence(), 2);
}

#[test]
fn test_scope_rule_checks_hierarchy_level() {
    let engine = engine();
    engine
        .register_authority(
            &Authority::new("NPI", "National Provider Identifier").scoped_to(vec![TypeLevel::Party]),
        )
        .unwrap();

    // Party covers both Person and Organization.
    engine
        .insert(&Record::person().with_identifier(IdentifierAssertion::new("NPI", "1")))
        .unwrap();
    engine
        .insert(&Record::organization().with_identifier(IdentifierAssertion::new("NPI", "2")))
        .unwrap();

    let err = engine
        .insert(&Record::observation().with_identifier(IdentifierAssertion::new("NPI", "3")))
        .unwrap_err();
    let issues = err.issues().expect("governance rejection");
    assert_eq!(issues[0].code, IssueCode::AuthorityScope);
}

#[test]
fn test_assigning_application_rule() {
    let registration = Engine::with_principals(
        EngineConfig::default(),
        Arc::new(FixedPrincipal::application("registration")),
    );
    registration
        .register_authority(
            &Authority::new("MRN", "Medical Record Number").assigned_by("registration"),
        )
        .unwrap();

    registration
        .insert(&Record::person().with_identifier(IdentifierAssertion::new("MRN", "100")))
        .unwrap();

    let intruder = Engine::with_principals(
        EngineConfig::default(),
        Arc::new(FixedPrincipal::application("billing")),
    );
    intruder
        .register_authority(
            &Authority::new("MRN", "Medical Record Number").assigned_by("registration"),
        )
        .unwrap();
    let err = intruder
        .insert(&Record::person().with_identifier(IdentifierAssertion::new("MRN", "100")))
        .unwrap_err();
    let issues = err.issues().expect("governance rejection");
    assert_eq!(issues[0].code, IssueCode::AssignerMismatch);
}

#[test]
fn test_format_mismatch_becomes_annotation() {
    let engine = engine();
    engine
        .register_authority(&Authority::new("MRN", "Medical Record Number").with_format(r"\d{6}"))
        .unwrap();

    let saved = engine
        .insert(&Record::person().with_identifier(IdentifierAssertion::new("MRN", "abc")))
        .unwrap();

    assert_eq!(saved.annotations.len(), 1);
    assert_eq!(saved.annotations[0].code, IssueCode::FormatMismatch);
    assert_eq!(saved.annotations[0].severity, Severity::Warning);

    // The annotation persists and comes back on read.
    let read = engine.read(saved.key(), None).unwrap();
    assert_eq!(read.annotations, saved.annotations);
}

#[test]
fn test_format_rule_escalated_to_error() {
    let config = EngineConfig::default().governance(
        GovernanceConfig::default().format_severity(Some(Severity::Error)),
    );
    let engine = Engine::new(config);
    engine
        .register_authority(&Authority::new("MRN", "Medical Record Number").with_format(r"\d{6}"))
        .unwrap();

    let err = engine
        .insert(&Record::person().with_identifier(IdentifierAssertion::new("MRN", "abc")))
        .unwrap_err();
    assert!(matches!(err, EngineError::DetectedIssue(_)));
}

#[test]
fn test_reregistering_authority_updates_rules() {
    let engine = engine();
    let first = engine
        .register_authority(&Authority::new("MRN", "Medical Record Number"))
        .unwrap();

    let second = engine
        .register_authority(&Authority::new("MRN", "Medical Record Number").with_format(r"\d{6}"))
        .unwrap();
    // Key is stable across re-registration.
    assert_eq!(second.key, first.key);

    let saved = engine
        .insert(&Record::person().with_identifier(IdentifierAssertion::new("MRN", "abc")))
        .unwrap();
    assert_eq!(saved.annotations[0].code, IssueCode::FormatMismatch);
}

#[test]
fn test_blocked_write_leaves_no_trace() {
    let engine = engine();
    engine
        .register_authority(&Authority::new("GTIN", "Global Trade Item Number").unique())
        .unwrap();
    let holder = engine
        .insert(&Record::organization().with_identifier(IdentifierAssertion::new("GTIN", "0001")))
        .unwrap();

    let rejected = Record::organization()
        .with_identifier(IdentifierAssertion::new("GTIN", "0001"));
    let key_before = rejected.key;
    assert!(engine.insert(&rejected).is_err());
    assert!(key_before.is_none());

    // The holder's identifier is untouched.
    let read = engine.read(holder.key(), None).unwrap();
    assert_eq!(read.record.identifiers.len(), 1);
}
