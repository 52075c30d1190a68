//! Distributed semaphore specs
//!
//! Several semaphore instances share one coordination store, standing in for separate
//! processes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use keel_core::{Clock, OwnerIdGen, SemaphoreConfig, SemaphoreKeys, SystemClock};
use keel_engine::{SemaphoreError, SemaphoreFactory};
use keel_storage::{CoordinationStore, MemoryCoordinationStore};

fn factory(store: &Arc<MemoryCoordinationStore>) -> SemaphoreFactory<MemoryCoordinationStore, SystemClock> {
    factory_polling_every(store, Duration::from_millis(50))
}

fn factory_polling_every(
    store: &Arc<MemoryCoordinationStore>,
    poll_interval: Duration,
) -> SemaphoreFactory<MemoryCoordinationStore, SystemClock> {
    let defaults = SemaphoreConfig {
        slot_timeout: Duration::from_millis(600),
        acquire_timeout: Duration::from_secs(10),
        heartbeat_interval: Duration::from_millis(100),
        poll_interval,
        ..SemaphoreConfig::new("defaults", 1)
    };
    SemaphoreFactory::new(
        Arc::clone(store),
        SystemClock,
        OwnerIdGen::new("spec-host"),
        defaults,
    )
}

#[tokio::test]
async fn concurrent_holders_never_exceed_capacity() {
    let store = Arc::new(MemoryCoordinationStore::new());
    let factory = Arc::new(factory(&store));
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..12)
        .map(|_| {
            let factory = Arc::clone(&factory);
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                let mut semaphore = factory.create_and_wait("exports", 3, None).await.unwrap();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                semaphore.release().await.unwrap();
            })
        })
        .collect();

    for worker in workers {
        worker.await.unwrap();
    }
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(peak.load(Ordering::SeqCst), 3);
    assert_eq!(
        factory.create("exports", 3).unwrap().current_count().await.unwrap(),
        0
    );
}

#[tokio::test]
async fn full_semaphore_rejects_after_timeout() {
    let store = Arc::new(MemoryCoordinationStore::new());
    let factory = factory(&store);

    let _holder = factory.create_and_wait("reports", 1, None).await.unwrap();
    let rejected = factory
        .create_and_wait("reports", 1, Some(Duration::from_millis(150)))
        .await;

    match rejected {
        Err(e @ SemaphoreError::AcquireTimeout { .. }) => assert!(e.is_admission_rejection()),
        Err(e) => panic!("expected AcquireTimeout, got {e}"),
        Ok(_) => panic!("expected AcquireTimeout, got a slot"),
    }
}

#[tokio::test]
async fn release_admits_a_waiter_before_its_poll() {
    let store = Arc::new(MemoryCoordinationStore::new());
    let factory = Arc::new(factory_polling_every(&store, Duration::from_secs(5)));

    let mut holder = factory.create_and_wait("reports", 1, None).await.unwrap();
    let waiter = {
        let factory = Arc::clone(&factory);
        tokio::spawn(async move { factory.create_and_wait("reports", 1, None).await })
    };
    tokio::time::sleep(Duration::from_millis(80)).await;

    holder.release().await.unwrap();
    let admitted = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(admitted.is_held());
}

#[tokio::test]
async fn another_party_reclaiming_a_slot_wakes_a_waiter() {
    let store = Arc::new(MemoryCoordinationStore::new());
    let factory = Arc::new(factory_polling_every(&store, Duration::from_secs(5)));

    // A holder that crashes right after taking the only slot
    let keys = SemaphoreKeys::for_name("reports");
    assert!(store
        .insert_if_below(&keys.owners, "dead-owner", SystemClock.epoch_millis(), 1, Duration::from_secs(60))
        .await
        .unwrap());

    let waiter = {
        let factory = Arc::clone(&factory);
        tokio::spawn(async move { factory.create_and_wait("reports", 1, None).await })
    };

    // Past the slot timeout, an unrelated status check sweeps the dead slot
    tokio::time::sleep(Duration::from_millis(700)).await;
    let observed = factory.create("reports", 1).unwrap().current_count().await.unwrap();
    assert!(observed <= 1);

    let admitted = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(admitted.is_held());
}

#[tokio::test]
async fn crashed_holder_slot_is_reclaimed() {
    let store = Arc::new(MemoryCoordinationStore::new());
    let factory = factory(&store);

    // A holder that stopped heartbeating long ago
    let keys = SemaphoreKeys::for_name("reports");
    let stale = SystemClock.epoch_millis() - 10_000;
    assert!(store
        .insert_if_below(&keys.owners, "dead-owner", stale, 1, Duration::from_secs(60))
        .await
        .unwrap());

    let semaphore = factory
        .create_and_wait("reports", 1, Some(Duration::from_secs(1)))
        .await
        .unwrap();
    assert!(semaphore.is_held());
    let members: Vec<String> = store.members(&keys.owners).into_iter().map(|(m, _)| m).collect();
    assert_eq!(members, vec![semaphore.owner().to_string()]);
}

#[tokio::test]
async fn heartbeat_keeps_long_holds_alive() {
    let store = Arc::new(MemoryCoordinationStore::new());
    let factory = factory(&store);

    let mut holder = factory.create_and_wait("reports", 1, None).await.unwrap();
    // Well past the slot timeout
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert!(!holder.lease_lost());
    let contender = factory
        .create_and_wait("reports", 1, Some(Duration::from_millis(100)))
        .await;
    assert!(contender.is_err());
    holder.release().await.unwrap();
}

#[tokio::test]
async fn store_outage_is_not_an_admission_rejection() {
    let store = Arc::new(MemoryCoordinationStore::new());
    let factory = factory(&store);
    store.set_available(false);

    let err = factory
        .create_and_wait("reports", 1, Some(Duration::from_millis(100)))
        .await
        .err()
        .unwrap();
    assert!(!err.is_admission_rejection());
}
