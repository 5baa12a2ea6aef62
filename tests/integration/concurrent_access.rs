//! Concurrency behavior: torn-read absorption under racing writers and
//! allocation uniqueness across threads.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use tenebra::{
    DefaultIdGeneratorFactory, EphemeralPageFile, IdGenerator, IdGeneratorFactory, IdType,
    NodeRecord, Record, RecordFormat, RecordLoad, RecordPayload, RecordStore, RecordType,
    StoreHeader,
};

fn node_payload(tag: u64) -> NodeRecord {
    // Every field carries the tag so a torn mix of two writes is visible.
    NodeRecord {
        next_rel: tag,
        next_prop: tag,
        labels: tag,
        dense: false,
    }
}

#[test]
fn readers_only_ever_see_complete_writes() {
    let ids = Arc::new(IdGenerator::new(IdType::Node, 0, 1000));
    let store = RecordStore::open(
        EphemeralPageFile::new(4096),
        RecordType::Node,
        StoreHeader::default(),
        ids,
    )
    .expect("open");

    let id = store.allocate_id().unwrap();
    let initial = node_payload(0x1111_1111);
    let mut record = Record::new(id, RecordPayload::Node(initial.clone()));
    store.put(&mut record).expect("seed");

    let payload_a = node_payload(0xAAAA_AAAA);
    let payload_b = node_payload(0xBBBB_BBBB);
    let writers_running = AtomicUsize::new(2);
    let store = &store;
    let writers_running = &writers_running;

    thread::scope(|scope| {
        for payload in [&payload_a, &payload_b] {
            scope.spawn(move || {
                for _ in 0..2000 {
                    let mut record = Record::new(id, RecordPayload::Node(payload.clone()));
                    store.put(&mut record).expect("put");
                }
                writers_running.fetch_sub(1, Ordering::Release);
            });
        }
        scope.spawn(|| {
            while writers_running.load(Ordering::Acquire) > 0 {
                let read = store.get(id, RecordLoad::Normal).expect("get");
                assert!(read.in_use);
                match &read.payload {
                    RecordPayload::Node(node) => {
                        assert!(
                            node == &initial || node == &payload_a || node == &payload_b,
                            "torn read: {node:?}"
                        );
                    }
                    other => panic!("expected node payload, got {other:?}"),
                }
            }
        });
    });
}

#[test]
fn two_unit_readers_see_one_whole_write() {
    // Every reference carries the tag in both halves, so a read that mixes
    // the lo words of one write with the hi words of another is visible.
    fn wide(tag: u32) -> u64 {
        ((tag as u64) << 32) | tag as u64
    }
    fn wide_payload(tag: u32) -> NodeRecord {
        NodeRecord {
            next_rel: wide(tag),
            next_prop: wide(tag),
            labels: wide(tag),
            dense: false,
        }
    }

    let format_size = RecordFormat::new(RecordType::Node).record_size(&StoreHeader::default());
    // One record per page puts the continuation unit on its own page.
    let ids = Arc::new(IdGenerator::new(IdType::Node, 0, 1 << 45));
    let store = RecordStore::open(
        EphemeralPageFile::new(format_size),
        RecordType::Node,
        StoreHeader::default(),
        ids,
    )
    .expect("open");

    let id = store.allocate_id().unwrap();
    let initial = wide_payload(0x1111_1111);
    let mut seed = Record::new(id, RecordPayload::Node(initial.clone()));
    store.put(&mut seed).expect("seed");
    let secondary = seed.secondary_unit_id.expect("seed spans two units");

    let tag_a = wide_payload(0xAAAA_AAAA);
    let tag_b = wide_payload(0xBBBB_BBBB);
    let writer_running = AtomicUsize::new(1);
    let store = &store;
    let writer_running = &writer_running;

    thread::scope(|scope| {
        let tags = [&tag_a, &tag_b];
        scope.spawn(move || {
            for round in 0..4000 {
                let payload = tags[round % 2];
                let mut record = Record::new(id, RecordPayload::Node(payload.clone()));
                // Pin the same continuation slot for every write.
                record.secondary_unit_id = Some(secondary);
                store.put(&mut record).expect("put");
            }
            writer_running.fetch_sub(1, Ordering::Release);
        });
        scope.spawn(|| {
            while writer_running.load(Ordering::Acquire) > 0 {
                let read = store.get(id, RecordLoad::Normal).expect("get");
                assert!(read.in_use);
                assert_eq!(read.secondary_unit_id, Some(secondary));
                match &read.payload {
                    RecordPayload::Node(node) => {
                        assert!(
                            node == &initial || node == &tag_a || node == &tag_b,
                            "torn two-unit read: {node:?}"
                        );
                    }
                    other => panic!("expected node payload, got {other:?}"),
                }
            }
        });
    });
}

#[test]
fn concurrent_allocation_yields_distinct_ids() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 500;

    let generator = Arc::new(IdGenerator::new(IdType::Relationship, 50, u64::MAX - 1));
    let mut all_ids = Vec::with_capacity(THREADS * PER_THREAD);
    thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let generator = generator.clone();
                scope.spawn(move || {
                    (0..PER_THREAD)
                        .map(|_| generator.next_id().unwrap())
                        .collect::<Vec<u64>>()
                })
            })
            .collect();
        for handle in handles {
            all_ids.extend(handle.join().unwrap());
        }
    });

    let distinct: HashSet<u64> = all_ids.iter().copied().collect();
    assert_eq!(distinct.len(), THREADS * PER_THREAD);
    let low = 50;
    let high = 50 + (THREADS * PER_THREAD) as u64;
    assert!(all_ids.iter().all(|id| (low..high).contains(id)));
    assert_eq!(generator.high_id(), high);
}

#[test]
fn id_spaces_allocate_independently() {
    let dir = tempfile::tempdir().expect("temp dir");
    let factory = DefaultIdGeneratorFactory::new();
    factory
        .create(dir.path(), IdType::Node, 1000, true, u64::MAX - 1)
        .expect("create node space");
    factory
        .create(dir.path(), IdType::Relationship, 5000, true, u64::MAX - 1)
        .expect("create relationship space");

    thread::scope(|scope| {
        let nodes = factory.get(IdType::Node);
        let rels = factory.get(IdType::Relationship);
        let node_handle = scope.spawn(move || {
            (0..300)
                .map(|_| nodes.next_id().unwrap())
                .collect::<Vec<u64>>()
        });
        let rel_handle = scope.spawn(move || {
            (0..300)
                .map(|_| rels.next_id().unwrap())
                .collect::<Vec<u64>>()
        });
        let node_ids = node_handle.join().unwrap();
        let rel_ids = rel_handle.join().unwrap();
        // Each space hands out its own contiguous run, unperturbed by the
        // other's traffic.
        assert_eq!(node_ids, (1000..1300).collect::<Vec<u64>>());
        assert_eq!(rel_ids, (5000..5300).collect::<Vec<u64>>());
    });

    assert_eq!(factory.get(IdType::Node).high_id(), 1300);
    assert_eq!(factory.get(IdType::Relationship).high_id(), 5300);
}
