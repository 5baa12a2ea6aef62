//! Id generator lifecycle: creation, persistence, stale-state fallback,
//! frozen migration factories, and batched allocation.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use proptest::prelude::*;
use tempfile::tempdir;

use tenebra::{
    BatchingIdSequence, DefaultIdGeneratorFactory, IdGenerator, IdGeneratorFactory, IdType,
    ScanOnOpenIdGeneratorFactory, StoreError,
};

#[test]
fn create_then_allocate_yields_contiguous_distinct_ids() {
    let dir = tempdir().expect("temp dir");
    let factory = DefaultIdGeneratorFactory::new();
    let generator = factory
        .create(dir.path(), IdType::Node, 100, true, 1000)
        .expect("create");
    let ids: Vec<u64> = (0..10).map(|_| generator.next_id().unwrap()).collect();
    let expected: Vec<u64> = (100..110).collect();
    assert_eq!(ids, expected);
}

#[test]
fn state_survives_checkpoint_and_reopen() {
    let dir = tempdir().expect("temp dir");
    {
        let factory = DefaultIdGeneratorFactory::new();
        let generator = factory
            .create(dir.path(), IdType::Relationship, 0, true, 10_000)
            .expect("create");
        for _ in 0..20 {
            generator.next_id().unwrap();
        }
        generator.free_id(3).unwrap();
        generator.free_id(11).unwrap();
        generator.close().expect("close");
    }
    let factory = DefaultIdGeneratorFactory::new();
    let generator = factory
        .open(dir.path(), IdType::Relationship, &|| panic!("state should be valid"), 10_000)
        .expect("open");
    assert_eq!(generator.high_id(), 20);
    // Freed ids come back before the high id moves.
    assert_eq!(generator.next_id().unwrap(), 3);
    assert_eq!(generator.next_id().unwrap(), 11);
    assert_eq!(generator.next_id().unwrap(), 20);
}

#[test]
fn corrupted_state_falls_back_to_scanner() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join(IdType::Node.file_name());
    {
        let factory = DefaultIdGeneratorFactory::new();
        let generator = factory
            .create(dir.path(), IdType::Node, 0, true, 1000)
            .expect("create");
        for _ in 0..7 {
            generator.next_id().unwrap();
        }
        generator.checkpoint().expect("checkpoint");
    }
    // Flip one byte inside the persisted state; the checksum catches it.
    let mut bytes = fs::read(&path).expect("read id file");
    bytes[10] ^= 0x40;
    fs::write(&path, &bytes).expect("write corrupted id file");

    let factory = DefaultIdGeneratorFactory::new();
    let generator = factory
        .open(dir.path(), IdType::Node, &|| 42, 1000)
        .expect("open");
    assert_eq!(generator.high_id(), 42);
}

#[test]
fn absent_state_falls_back_to_scanner() {
    let dir = tempdir().expect("temp dir");
    let factory = DefaultIdGeneratorFactory::new();
    let generator = factory
        .open(dir.path(), IdType::Dynamic, &|| 17, 1000)
        .expect("open");
    assert_eq!(generator.high_id(), 17);
}

#[test]
fn create_with_throw_if_exists_rejects_prior_state() {
    let dir = tempdir().expect("temp dir");
    {
        let factory = DefaultIdGeneratorFactory::new();
        let generator = factory
            .create(dir.path(), IdType::LabelToken, 0, true, 100)
            .expect("create");
        generator.checkpoint().expect("checkpoint");
    }
    let factory = DefaultIdGeneratorFactory::new();
    let err = factory
        .create(dir.path(), IdType::LabelToken, 0, true, 100)
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));
    // Without the flag the prior state is discarded.
    let generator = factory
        .create(dir.path(), IdType::LabelToken, 5, false, 100)
        .expect("recreate");
    assert_eq!(generator.high_id(), 5);
}

#[test]
fn factory_get_returns_the_opened_generator() {
    let dir = tempdir().expect("temp dir");
    let factory = DefaultIdGeneratorFactory::new();
    let opened = factory
        .create(dir.path(), IdType::Node, 0, true, 1000)
        .expect("create");
    assert!(Arc::ptr_eq(&opened, &factory.get(IdType::Node)));
}

#[test]
#[should_panic(expected = "not opened")]
fn factory_get_before_open_is_a_programming_error() {
    let factory = DefaultIdGeneratorFactory::new();
    factory.get(IdType::Property);
}

#[test]
fn frozen_factory_memoizes_first_scan() {
    let factory = ScanOnOpenIdGeneratorFactory::new();
    let dir = Path::new("ignored");
    let first = factory
        .open(dir, IdType::Node, &|| 123, u64::MAX)
        .expect("first open");
    let second = factory
        .open(dir, IdType::Node, &|| 999, u64::MAX)
        .expect("second open");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.high_id(), 123);
    assert!(Arc::ptr_eq(&first, &factory.get(IdType::Node)));
}

#[test]
fn frozen_generator_rejects_all_mutation() {
    let factory = ScanOnOpenIdGeneratorFactory::new();
    let generator = factory
        .open(Path::new("ignored"), IdType::Relationship, &|| 9, u64::MAX)
        .expect("open");
    assert!(generator.is_frozen());
    assert!(matches!(
        generator.next_id().unwrap_err(),
        StoreError::ReadOnlyIdSpace(IdType::Relationship)
    ));
    assert!(matches!(
        generator.free_id(1).unwrap_err(),
        StoreError::ReadOnlyIdSpace(IdType::Relationship)
    ));
    assert_eq!(generator.high_id(), 9);
}

#[test]
fn exhaustion_is_reported_per_type() {
    let generator = IdGenerator::new(IdType::PropertyKeyToken, 0, 2);
    for _ in 0..3 {
        generator.next_id().unwrap();
    }
    match generator.next_id().unwrap_err() {
        StoreError::IdSpaceExhausted { id_type, max_id } => {
            assert_eq!(id_type, IdType::PropertyKeyToken);
            assert_eq!(max_id, 2);
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

proptest! {
    #[test]
    fn batching_reset_replays_identically(
        batch_size in 1u64..64,
        consumed in 1usize..128,
        high_id in 0u64..1 << 30,
    ) {
        let generator = Arc::new(IdGenerator::new(IdType::Node, high_id, u64::MAX - 1));
        let mut sequence = BatchingIdSequence::new(generator, batch_size);
        let first: Vec<u64> = (0..consumed).map(|_| sequence.next().unwrap()).collect();
        // Replay covers the tail of the last batch only.
        let batch_len = {
            let into_batch = consumed as u64 % batch_size;
            if into_batch == 0 { batch_size } else { into_batch }
        };
        sequence.reset();
        let replay: Vec<u64> = (0..batch_len).map(|_| sequence.next().unwrap()).collect();
        prop_assert_eq!(&first[consumed - batch_len as usize..], replay.as_slice());
    }
}
