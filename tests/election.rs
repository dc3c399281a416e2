//! Election and liveness behaviour over real loopback sockets.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::net::TcpListener;

use standby_pair::election::{ElectionError, ElectionState, Role};
use standby_pair::lifecycle::Shutdown;
use standby_pair::registry::MemoryRegistry;

mod common;
use common::{eventually, instance, within, RecordingAnnouncer};

#[tokio::test]
async fn standalone_instance_is_active_immediately() {
    let registry = Arc::new(MemoryRegistry::new());
    let announcer = RecordingAnnouncer::new();
    let shutdown = Shutdown::new();

    let handle = instance(registry.clone(), announcer.clone())
        .initialize(None, &shutdown)
        .await
        .unwrap();

    assert_eq!(handle.state(), ElectionState::Active);
    assert_eq!(handle.role(), Role::Active);
    assert!(eventually(Duration::from_secs(1), || announcer.roles() == vec![Role::Active]).await);
    assert_eq!(registry.peek(), None);

    shutdown.trigger();
    within(Duration::from_secs(1), handle.join()).await.unwrap();
}

#[tokio::test]
async fn single_claimant_takes_over_empty_registry() {
    let registry = Arc::new(MemoryRegistry::new());
    let announcer = RecordingAnnouncer::new();
    let shutdown = Shutdown::new();

    let handle = instance(registry.clone(), announcer.clone())
        .initialize(Some(0), &shutdown)
        .await
        .unwrap();
    let address = handle.address().unwrap().to_string();

    let reached = within(
        Duration::from_secs(2),
        handle.wait_for_state(|s| *s == ElectionState::Active),
    )
    .await;
    assert_eq!(reached, Some(ElectionState::Active));
    assert_eq!(registry.peek(), Some(address));
    assert!(
        eventually(Duration::from_secs(1), || {
            announcer.roles() == vec![Role::StandBy, Role::Active]
        })
        .await
    );

    shutdown.trigger();
}

#[tokio::test]
async fn activation_callback_fires_once() {
    let registry = Arc::new(MemoryRegistry::new());
    let shutdown = Shutdown::new();
    let handle = instance(registry, RecordingAnnouncer::new())
        .initialize(Some(0), &shutdown)
        .await
        .unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let early = tx.clone();
    handle.on_active(move || {
        let _ = early.send("early");
    });
    within(Duration::from_secs(2), handle.activation().wait()).await;
    handle.on_active(move || {
        let _ = tx.send("late");
    });

    let first = within(Duration::from_secs(1), rx.recv()).await;
    let second = within(Duration::from_secs(1), rx.recv()).await;
    let mut seen = vec![first.unwrap(), second.unwrap()];
    seen.sort();
    assert_eq!(seen, vec!["early", "late"]);
    assert!(rx.try_recv().is_err());

    shutdown.trigger();
}

#[tokio::test]
async fn racing_claimants_converge_on_one_active() {
    for trial in 0..24 {
        let registry = Arc::new(MemoryRegistry::new());
        let shutdown = Shutdown::new();

        let first = instance(registry.clone(), RecordingAnnouncer::new())
            .initialize(Some(0), &shutdown)
            .await
            .unwrap();
        let offset = rand::thread_rng().gen_range(0..=100);
        tokio::time::sleep(Duration::from_millis(offset)).await;
        let second = instance(registry.clone(), RecordingAnnouncer::new())
            .initialize(Some(0), &shutdown)
            .await
            .unwrap();

        let settled = |a: ElectionState, b: ElectionState| {
            matches!(
                (a, b),
                (ElectionState::Active, ElectionState::Connected)
                    | (ElectionState::Connected, ElectionState::Active)
            )
        };
        let converged = eventually(Duration::from_secs(5), || settled(first.state(), second.state())).await;
        assert!(
            converged,
            "trial {} (offset {} ms) ended in {:?} / {:?}",
            trial,
            offset,
            first.state(),
            second.state()
        );

        let winner = if first.state() == ElectionState::Active {
            &first
        } else {
            &second
        };
        assert_eq!(registry.peek(), winner.address().map(ToString::to_string));

        // Still exactly one active after several broadcast intervals.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(settled(first.state(), second.state()), "trial {} diverged", trial);

        shutdown.trigger();
    }
}

/// Accepts connections and holds them open, never writing a marker.
/// Returns the address and the number of connections accepted so far.
async fn silent_listener() -> (String, Arc<AtomicUsize>) {
    let silent = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = silent.local_addr().unwrap().to_string();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = silent.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            held.push(socket);
        }
    });
    (address, accepted)
}

#[tokio::test]
async fn silent_recorded_process_is_replaced() {
    let (silent_addr, _accepted) = silent_listener().await;
    let registry = Arc::new(MemoryRegistry::with_active(silent_addr));
    let shutdown = Shutdown::new();
    let handle = instance(registry.clone(), RecordingAnnouncer::new())
        .initialize(Some(0), &shutdown)
        .await
        .unwrap();

    let mut states = handle.subscribe_state();
    within(
        Duration::from_secs(2),
        states.wait_for(|s| *s == ElectionState::Connected),
    )
    .await
    .unwrap();

    // Read timeout is 400 ms; the record is unchanged, so the instance claims.
    let started = tokio::time::Instant::now();
    let reached = within(
        Duration::from_secs(3),
        handle.wait_for_state(|s| *s == ElectionState::Active),
    )
    .await;
    assert_eq!(reached, Some(ElectionState::Active));
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(registry.peek(), handle.address().map(ToString::to_string));

    shutdown.trigger();
}

#[tokio::test]
async fn silent_link_rereads_the_registry() {
    let shutdown = Shutdown::new();

    // A real active on its own registry, so it never sees the shared record.
    let real = instance(Arc::new(MemoryRegistry::new()), RecordingAnnouncer::new())
        .initialize(Some(0), &shutdown)
        .await
        .unwrap();
    within(Duration::from_secs(2), real.activation().wait()).await;
    let real_addr = real.address().unwrap().to_string();

    let (silent_addr, accepted) = silent_listener().await;
    let registry = Arc::new(MemoryRegistry::with_active(silent_addr));
    let follower = instance(registry.clone(), RecordingAnnouncer::new())
        .initialize(Some(0), &shutdown)
        .await
        .unwrap();
    within(
        Duration::from_secs(2),
        follower.wait_for_state(|s| *s == ElectionState::Connected),
    )
    .await;
    registry.force(Some(real_addr.clone()));

    // One read timeout, a check, and a reassign delay later the follower
    // is linked to the real active and has stopped dialing the silent one.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let settled = accepted.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), settled);
    assert!(settled >= 1);
    assert_eq!(follower.state(), ElectionState::Connected);
    assert_eq!(registry.peek(), Some(real_addr));

    shutdown.trigger();
}

#[tokio::test]
async fn stand_by_takes_over_when_active_departs() {
    let registry = Arc::new(MemoryRegistry::new());
    let active_shutdown = Shutdown::new();
    let standby_shutdown = Shutdown::new();

    let active = instance(registry.clone(), RecordingAnnouncer::new())
        .initialize(Some(0), &active_shutdown)
        .await
        .unwrap();
    within(Duration::from_secs(2), active.activation().wait()).await;

    let standby_announcer = RecordingAnnouncer::new();
    let standby = instance(registry.clone(), standby_announcer.clone())
        .initialize(Some(0), &standby_shutdown)
        .await
        .unwrap();
    within(
        Duration::from_secs(2),
        standby.wait_for_state(|s| *s == ElectionState::Connected),
    )
    .await;

    // Markers keep the stand-by connected past its read timeout.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(standby.state(), ElectionState::Connected);

    active_shutdown.trigger();
    within(Duration::from_secs(2), active.join()).await.unwrap();

    let reached = within(
        Duration::from_secs(5),
        standby.wait_for_state(|s| *s == ElectionState::Active),
    )
    .await;
    assert_eq!(reached, Some(ElectionState::Active));
    assert_eq!(registry.peek(), standby.address().map(ToString::to_string));
    assert!(
        eventually(Duration::from_secs(1), || {
            standby_announcer.roles() == vec![Role::StandBy, Role::Active]
        })
        .await
    );

    standby_shutdown.trigger();
}

#[tokio::test]
async fn stand_by_follows_reassigned_active() {
    let registry = Arc::new(MemoryRegistry::new());
    let old_shutdown = Shutdown::new();
    let shutdown = Shutdown::new();

    let old = instance(registry.clone(), RecordingAnnouncer::new())
        .initialize(Some(0), &old_shutdown)
        .await
        .unwrap();
    within(Duration::from_secs(2), old.activation().wait()).await;

    let follower = instance(registry.clone(), RecordingAnnouncer::new())
        .initialize(Some(0), &shutdown)
        .await
        .unwrap();
    within(
        Duration::from_secs(2),
        follower.wait_for_state(|s| *s == ElectionState::Connected),
    )
    .await;

    let replacement = instance(registry.clone(), RecordingAnnouncer::new())
        .initialize(Some(0), &shutdown)
        .await
        .unwrap();
    let replacement_addr = replacement.address().unwrap().to_string();
    within(
        Duration::from_secs(2),
        replacement.wait_for_state(|s| *s == ElectionState::Connected),
    )
    .await;
    // Record the replacement while the old active's stand-bys are redialing.
    old_shutdown.trigger();
    within(Duration::from_secs(2), old.join()).await.unwrap();
    registry.force(Some(replacement_addr.clone()));

    // The replacement re-reads the registry, finds itself, and activates;
    // the follower's redial to the old address fails and it moves over.
    within(
        Duration::from_secs(5),
        replacement.wait_for_state(|s| *s == ElectionState::Active),
    )
    .await;
    let moved = eventually(Duration::from_secs(5), || {
        follower.state() == ElectionState::Connected
            && registry.peek().as_deref() == Some(replacement_addr.as_str())
    })
    .await;
    assert!(moved);
    assert_ne!(follower.state(), ElectionState::Active);

    shutdown.trigger();
}

#[tokio::test]
async fn transient_registry_failures_are_retried() {
    let registry = Arc::new(MemoryRegistry::new());
    registry.fail_next(2);
    let shutdown = Shutdown::new();

    let handle = instance(registry.clone(), RecordingAnnouncer::new())
        .initialize(Some(0), &shutdown)
        .await
        .unwrap();

    let reached = within(
        Duration::from_secs(2),
        handle.wait_for_state(|s| *s == ElectionState::Active),
    )
    .await;
    assert_eq!(reached, Some(ElectionState::Active));
    shutdown.trigger();
}

#[tokio::test]
async fn unreachable_registry_ends_the_election() {
    let registry = Arc::new(MemoryRegistry::new());
    registry.fail_next(u32::MAX);
    let shutdown = Shutdown::new();

    let handle = instance(registry, RecordingAnnouncer::new())
        .initialize(Some(0), &shutdown)
        .await
        .unwrap();

    let result = within(Duration::from_secs(2), handle.join()).await;
    match result {
        Err(ElectionError::RegistryUnavailable {
            operation, attempts, ..
        }) => {
            assert_eq!(operation, "get");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected registry failure, got {:?}", other),
    }
}
