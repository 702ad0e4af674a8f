use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use write_behind::store::memory::MemoryStore;
use write_behind::{AsyncCacheWriter, HookContext, HookResult, WriterState};

#[test]
fn test_saves_applied_in_order() {
    let saved = Arc::new(Mutex::new(Vec::new()));
    let keeper = {
        let saved = saved.clone();
        move |_: &HookContext, key: &'static str, value: i32, _: Duration| -> HookResult {
            saved.lock().push((key, value));
            Ok(())
        }
    };
    let remover = |_: &HookContext, _: &'static str| -> HookResult { Ok(()) };

    let writer = AsyncCacheWriter::new(keeper, remover, 10);
    writer.to_save("a", 1, Duration::ZERO).unwrap();
    writer.to_save("b", 2, Duration::ZERO).unwrap();
    writer.watch().unwrap();
    writer.wait().unwrap();

    assert_eq!(*saved.lock(), vec![("a", 1), ("b", 2)]);
}

#[test]
fn test_discards_applied_in_order() {
    let removed = Arc::new(Mutex::new(Vec::new()));
    let keeper = |_: &HookContext, _: &'static str, _: i32, _: Duration| -> HookResult { Ok(()) };
    let remover = {
        let removed = removed.clone();
        move |_: &HookContext, key: &'static str| -> HookResult {
            removed.lock().push(key);
            Ok(())
        }
    };

    let writer = AsyncCacheWriter::new(keeper, remover, 10);
    writer.to_discard(["x", "y", "z"]).unwrap();
    writer.watch().unwrap();
    writer.wait().unwrap();

    assert_eq!(*removed.lock(), vec!["x", "y", "z"]);
}

#[test]
fn test_failing_keeper_attempts_every_intent() {
    let attempts = Arc::new(Mutex::new(0));
    let keeper = {
        let attempts = attempts.clone();
        move |_: &HookContext, key: &'static str, _: i32, _: Duration| -> HookResult {
            *attempts.lock() += 1;
            Err(format!("store unavailable for {key}").into())
        }
    };
    let remover = |_: &HookContext, _: &'static str| -> HookResult { Ok(()) };

    let writer = AsyncCacheWriter::new(keeper, remover, 10);
    for (value, key) in ["a", "b", "c"].into_iter().enumerate() {
        writer.to_save(key, value as i32, Duration::ZERO).unwrap();
    }
    writer.watch().unwrap();
    let summary = writer.wait().unwrap();

    assert_eq!(*attempts.lock(), 3);
    assert_eq!(summary.saves.attempted, 3);
    assert_eq!(summary.saves.failed, 3);
    assert_eq!(writer.state(), WriterState::Stopped);
}

#[test]
fn test_concurrent_producers_lose_nothing() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 250;

    let store = MemoryStore::new();
    let writer = AsyncCacheWriter::new(store.clone(), store.clone(), 8);
    writer.watch().unwrap();

    thread::scope(|scope| {
        for producer in 0..PRODUCERS {
            let writer = &writer;
            scope.spawn(move || {
                for n in 0..PER_PRODUCER {
                    let key = format!("{producer}:{n}");
                    writer
                        .to_save(key, n, Duration::from_secs(30))
                        .unwrap();
                }
            });
        }
    });

    let summary = writer.wait().unwrap();
    assert_eq!(summary.saves.attempted, (PRODUCERS * PER_PRODUCER) as u64);
    assert_eq!(store.len(), PRODUCERS * PER_PRODUCER);
    assert_eq!(store.get("3:249"), Some(249));
}

#[test]
fn test_save_then_discard_within_one_pipeline_each() {
    let store = MemoryStore::new();
    let writer = AsyncCacheWriter::new(store.clone(), store.clone(), 4);

    writer.to_save("kept", "v1", Duration::from_secs(5)).unwrap();
    writer.to_save("kept", "v2", Duration::from_secs(10)).unwrap();
    writer.watch().unwrap();
    writer.wait().unwrap();

    let entry = store.entry("kept").unwrap();
    assert_eq!(entry.value, "v2");
    assert_eq!(entry.expiration, Duration::from_secs(10));

    let writer = AsyncCacheWriter::new(store.clone(), store.clone(), 4);
    writer.to_discard(["kept", "never-saved"]).unwrap();
    writer.watch().unwrap();
    let summary = writer.wait().unwrap();

    assert!(store.is_empty());
    assert_eq!(summary.discards.attempted, 2);
    assert_eq!(summary.discards.failed, 0);
}

#[test]
fn test_discards_keep_order_across_calls() {
    let removed = Arc::new(Mutex::new(Vec::new()));
    let keeper = |_: &HookContext, _: String, _: i32, _: Duration| -> HookResult { Ok(()) };
    let remover = {
        let removed = removed.clone();
        move |_: &HookContext, key: String| -> HookResult {
            removed.lock().push(key);
            Ok(())
        }
    };

    let writer = AsyncCacheWriter::new(keeper, remover, 2);
    writer.to_discard(["a", "b"].map(String::from)).unwrap();
    writer.watch().unwrap();

    let mut expected: Vec<String> = vec!["a".to_string(), "b".to_string()];
    for batch in 0..20 {
        let keys: Vec<String> = (0..3).map(|n| format!("{batch}:{n}")).collect();
        expected.extend(keys.iter().cloned());
        writer.to_discard(keys).unwrap();
    }
    writer.to_discard(Vec::<String>::new()).unwrap();
    let summary = writer.wait().unwrap();

    assert_eq!(*removed.lock(), expected);
    assert_eq!(summary.discards.attempted, expected.len() as u64);
}

#[test]
fn test_concurrent_discards_keep_per_producer_order() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 200;

    let removed = Arc::new(Mutex::new(Vec::new()));
    let keeper = |_: &HookContext, _: (usize, usize), _: (), _: Duration| -> HookResult { Ok(()) };
    let remover = {
        let removed = removed.clone();
        move |_: &HookContext, key: (usize, usize)| -> HookResult {
            removed.lock().push(key);
            Ok(())
        }
    };

    let writer = AsyncCacheWriter::new(keeper, remover, 4);
    writer.watch().unwrap();

    thread::scope(|scope| {
        for producer in 0..PRODUCERS {
            let writer = &writer;
            scope.spawn(move || {
                for n in (0..PER_PRODUCER).step_by(2) {
                    writer.to_discard([(producer, n), (producer, n + 1)]).unwrap();
                }
            });
        }
    });

    let summary = writer.wait().unwrap();
    let removed = removed.lock();
    assert_eq!(removed.len(), PRODUCERS * PER_PRODUCER);
    assert_eq!(summary.discards.attempted, (PRODUCERS * PER_PRODUCER) as u64);

    for producer in 0..PRODUCERS {
        let seen: Vec<usize> = removed
            .iter()
            .filter(|(from, _)| *from == producer)
            .map(|(_, n)| *n)
            .collect();
        assert_eq!(seen, (0..PER_PRODUCER).collect::<Vec<_>>());
    }
}
