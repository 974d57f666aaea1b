/// Concurrency tests
///
/// Optimistic version guards under real thread contention.
/// Run with: cargo test --test concurrency_tests

use std::sync::{Arc, Barrier};
use std::thread;

use chartstore::model::IssueCode;
use chartstore::{
    Authority, Engine, EngineConfig, EngineError, IdentifierAssertion, Record, Tag,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_racing_updates_have_exactly_one_winner() {
    init_logging();
    let engine = Arc::new(Engine::new(EngineConfig::default()));
    let saved = engine.insert(&Record::person()).unwrap();
    let key = saved.key();

    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = Arc::clone(&engine);
        let base = saved.record.clone();
        handles.push(thread::spawn(move || {
            let change = base.with_tag(Tag::new(format!("writer-{}", i)));
            engine.update(&change, 1)
        }));
    }

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one writer may advance from sequence 1");

    for result in &results {
        if let Err(err) = result {
            assert!(matches!(err, EngineError::Concurrency { expected: 1, .. }));
        }
    }

    // The chain advanced exactly once.
    let read = engine.read(key, None).unwrap();
    assert_eq!(read.sequence(), 2);
    assert_eq!(read.record.tags.len(), 1);
}

#[test]
fn test_racing_inserts_on_same_key_have_one_winner() {
    init_logging();
    let engine = Arc::new(Engine::new(EngineConfig::default()));
    let key = chartstore::RecordKey::generate();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            engine.insert(&Record::person().with_key(key))
        }));
    }

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);

    let read = engine.read(key, None).unwrap();
    assert_eq!(read.sequence(), 1);
}

#[test]
fn test_sequential_writers_interleave_cleanly() {
    init_logging();
    let engine = Arc::new(Engine::new(EngineConfig::default()));
    let saved = engine.insert(&Record::person()).unwrap();
    let key = saved.key();

    // Each writer re-reads before writing, so every attempt succeeds.
    let mut handles = Vec::new();
    for i in 0..4 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            loop {
                let current = engine.read(key, None).unwrap();
                let change = current.record.clone().with_tag(Tag::new(format!("w{}", i)));
                match engine.update(&change, current.sequence()) {
                    Ok(_) => break,
                    Err(EngineError::Concurrency { .. }) => continue,
                    Err(other) => panic!("unexpected error: {}", other),
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let read = engine.read(key, None).unwrap();
    assert_eq!(read.sequence(), 5);
    assert_eq!(read.record.tags.len(), 4);
}

#[test]
fn test_racing_unique_identifier_inserts_have_one_winner() {
    init_logging();
    let engine = Arc::new(Engine::new(EngineConfig::default()));
    engine
        .register_authority(&Authority::new("GTIN", "Global Trade Item Number").unique())
        .unwrap();

    // Both writers pass validation against the pre-insert state; the
    // commit-time re-check must still reject all but one.
    let barrier = Arc::new(Barrier::new(4));
    let mut handles = Vec::new();
    for _ in 0..4 {
        let engine = Arc::clone(&engine);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            let record = Record::organization()
                .with_identifier(IdentifierAssertion::new("GTIN", "00012345"));
            barrier.wait();
            engine.insert(&record)
        }));
    }

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(
        results.iter().filter(|r| r.is_ok()).count(),
        1,
        "only one record may hold a globally unique identifier"
    );
    for result in &results {
        if let Err(err) = result {
            let issues = err.issues().expect("governance rejection");
            assert_eq!(issues[0].code, IssueCode::DuplicateIdentifier);
        }
    }
}

#[test]
fn test_racing_authority_registrations_converge() {
    init_logging();
    let engine = Arc::new(Engine::new(EngineConfig::default()));

    let barrier = Arc::new(Barrier::new(8));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            engine.register_authority(&Authority::new("MRN", "Medical Record Number"))
        }));
    }
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    // One row survives, so a later re-registration keeps a stable key.
    let first = engine
        .register_authority(&Authority::new("MRN", "Medical Record Number").unique())
        .unwrap();
    let second = engine
        .register_authority(&Authority::new("MRN", "Medical Record Number"))
        .unwrap();
    assert_eq!(first.key, second.key);
}
