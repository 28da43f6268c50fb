//! Key resource and key data sources against the memory store.

use std::time::Duration;

use etcd_reconcile::store::StoreError;
use etcd_reconcile::{
    key_lock_name, KeyDesired, Provider, ReconcileError, Resource, Settings, StoreCall,
};
use etcd_reconcile_testkit::{init_tracing, Op, TestFixture};

fn provider(fixture: &TestFixture) -> Provider {
    Provider::new(fixture.store_handle(), fixture.lock_handle(), Settings::default())
}

#[tokio::test]
async fn create_then_read_round_trip() {
    init_tracing();
    let fixture = TestFixture::new();
    let keys = provider(&fixture).keys();

    let created = keys.create(&KeyDesired::new("/app/mode", "on")).await.unwrap();
    assert_eq!(created.value, "on");
    assert_eq!(created.version, 1);
    assert!(created.id.is_minted());

    let read = keys.read("/app/mode").await.unwrap();
    assert_eq!(read.key, "/app/mode");
    assert_eq!(read.value, "on");
    assert_eq!(read.create_revision, created.create_revision);
}

#[tokio::test]
async fn read_is_idempotent() {
    let fixture = TestFixture::new();
    fixture.seed_key("/a", "1").await.unwrap();
    let keys = provider(&fixture).keys();

    let first = keys.read("/a").await.unwrap();
    let second = keys.read("/a").await.unwrap();
    assert_eq!(first.value, second.value);
    assert_eq!(first.mod_revision, second.mod_revision);
    // Ids are generation markers, not content hashes.
    assert_ne!(first.id, second.id);
    assert_eq!(fixture.faulty.count(Op::Put), 0);
}

#[tokio::test]
async fn delete_then_read_is_not_found() {
    let fixture = TestFixture::new();
    let keys = provider(&fixture).keys();

    let state = keys.create(&KeyDesired::new("/a", "1")).await.unwrap();
    keys.delete(&state).await.unwrap();

    let err = keys.read("/a").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.summary(), "Failed reading resource key");

    // Deleting again is fine.
    keys.delete(&state).await.unwrap();
}

#[tokio::test]
async fn import_reads_by_key_path() {
    let fixture = TestFixture::new();
    fixture.seed_key("/legacy", "x").await.unwrap();
    let keys = provider(&fixture).keys();

    let state = keys.import("/legacy").await.unwrap();
    assert_eq!(state.value, "x");

    let err = keys.import("/missing").await.unwrap_err();
    assert_eq!(err.summary(), "Failed importing resource key");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_updates_never_overlap() {
    let fixture = TestFixture::new();
    fixture.faulty.delay(Op::Put, Duration::from_millis(40));

    let first = provider(&fixture).keys();
    let second = provider(&fixture).keys();
    let prior = first.create(&KeyDesired::new("/shared", "0")).await.unwrap();

    let desired_a = KeyDesired::new("/shared", "a");
    let desired_b = KeyDesired::new("/shared", "b");
    let (a, b) = tokio::join!(
        first.update(&prior, &desired_a),
        second.update(&prior, &desired_b),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(fixture.faulty.max_in_flight(Op::Put), 1);
    assert_eq!(fixture.faulty.count(Op::Put), 3);
    let last = fixture.value_of("/shared").await.unwrap();
    assert!(last == "a" || last == "b", "unexpected value {last}");
    assert!(!fixture.locks.is_locked(&key_lock_name("/shared")).await);
}

#[tokio::test]
async fn update_writes_under_lock_then_reads_back() {
    let fixture = TestFixture::new();
    let keys = provider(&fixture).keys();

    let prior = keys.create(&KeyDesired::new("/a", "1")).await.unwrap();
    let acquisitions = fixture.locks.acquisitions();

    let updated = keys.update(&prior, &KeyDesired::new("/a", "2")).await.unwrap();
    assert_eq!(updated.value, "2");
    assert_eq!(updated.version, 2);
    // One lock for the write, one for the read-back.
    assert_eq!(fixture.locks.acquisitions(), acquisitions + 2);
}

#[tokio::test]
async fn slow_store_call_times_out_and_releases_lock() {
    let fixture = TestFixture::new();
    fixture.seed_key("/slow", "v").await.unwrap();
    fixture.faulty.delay(Op::Get, Duration::from_millis(300));

    let settings = Settings {
        request_timeout: Duration::from_millis(50),
        ..Settings::default()
    };
    let keys = Provider::new(fixture.store_handle(), fixture.lock_handle(), settings).keys();

    let err = keys.read("/slow").await.unwrap_err();
    assert!(matches!(
        err.error,
        ReconcileError::Timeout {
            call: StoreCall::Get,
            ..
        }
    ));
    assert!(!fixture.locks.is_locked(&key_lock_name("/slow")).await);
}

#[tokio::test]
async fn transport_errors_hide_raw_text() {
    let fixture = TestFixture::new();
    fixture.faulty.fail_always(
        Op::Get,
        StoreError::Unavailable("dial tcp 10.1.2.3:2379: connection refused".into()),
    );
    let keys = provider(&fixture).keys();

    let err = keys.read("/a").await.unwrap_err();
    assert_eq!(err.error.call(), Some(StoreCall::Get));
    assert!(!err.to_string().contains("10.1.2.3"), "{err}");
    assert!(matches!(err.error, ReconcileError::StoreUnavailable { .. }));
}

#[tokio::test]
async fn create_existing_key_is_rejected_without_write() {
    let fixture = TestFixture::new();
    fixture.seed_key("/taken", "theirs").await.unwrap();
    let keys = provider(&fixture).keys();

    let err = keys.create(&KeyDesired::new("/taken", "ours")).await.unwrap_err();
    assert!(matches!(err.error, ReconcileError::AlreadyExists { .. }));
    assert_eq!(fixture.faulty.count(Op::Put), 0);
    assert_eq!(fixture.value_of("/taken").await.as_deref(), Some("theirs"));
}

#[tokio::test]
async fn key_data_reports_revisions() {
    let fixture = TestFixture::new();
    fixture.seed_key("/app/a", "1").await.unwrap();
    fixture.seed_key("/app/a", "2").await.unwrap();
    let data = provider(&fixture).key_data();

    let state = data.read("/app/a").await.unwrap();
    assert_eq!(state.value, "2");
    assert_eq!(state.version, 2);
    assert!(state.mod_revision > state.create_revision);

    let err = data.read("/app/none").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.summary(), "Failed reading data source key");
}

#[tokio::test]
async fn key_prefix_data_lists_entries_in_order() {
    let fixture = TestFixture::new();
    for (key, value) in [("/app/b", "2"), ("/app/a", "1"), ("/app0", "x"), ("/other", "y")] {
        fixture.seed_key(key, value).await.unwrap();
    }
    let data = provider(&fixture).key_prefix_data();

    let state = data.read("/app/").await.unwrap();
    let keys: Vec<&str> = state.entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, ["/app/a", "/app/b"]);
    assert_eq!(state.entries[0].value, "1");

    let err = data.read("/nothing/").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn failed_lock_makes_no_store_call() {
    let fixture = TestFixture::new();
    fixture
        .faulty_locks
        .fail_always(Op::Lock, StoreError::Unavailable("lease expired".into()));
    let keys = provider(&fixture).keys();

    let err = keys.create(&KeyDesired::new("/a", "1")).await.unwrap_err();
    match &err.error {
        ReconcileError::LockFailure { call, name, .. } => {
            assert_eq!(*call, StoreCall::Lock);
            assert_eq!(name, &key_lock_name("/a"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(fixture.faulty.journal().is_empty());
    // The session opened for the lock is closed again.
    assert_eq!(fixture.faulty_locks.count(Op::CloseSession), 1);
}

#[tokio::test]
async fn failed_unlock_after_write_is_reported() {
    let fixture = TestFixture::new();
    fixture
        .faulty_locks
        .fail_on(Op::Unlock, 1, StoreError::Unavailable("lease lost".into()));
    let keys = provider(&fixture).keys();

    let err = keys.create(&KeyDesired::new("/a", "1")).await.unwrap_err();
    assert!(matches!(
        err.error,
        ReconcileError::LockFailure {
            call: StoreCall::Unlock,
            ..
        }
    ));
    assert_eq!(err.summary(), "Failed creating resource key");

    // The write landed and closing the session still freed the lock.
    assert_eq!(fixture.faulty.count(Op::Put), 1);
    assert_eq!(fixture.value_of("/a").await.as_deref(), Some("1"));
    assert!(!fixture.locks.is_locked(&key_lock_name("/a")).await);
}

#[tokio::test]
async fn failed_operation_and_release_are_both_reported() {
    let fixture = TestFixture::new();
    fixture
        .faulty
        .fail_always(Op::Get, StoreError::Unavailable("reset".into()));
    fixture
        .faulty_locks
        .fail_always(Op::Unlock, StoreError::Unavailable("lease lost".into()));
    let keys = provider(&fixture).keys();

    let err = keys.read("/a").await.unwrap_err();
    match &err.error {
        ReconcileError::ReleaseAfterFailure { operation, release } => {
            assert!(matches!(
                **operation,
                ReconcileError::StoreUnavailable {
                    call: StoreCall::Get,
                    ..
                }
            ));
            assert!(matches!(
                **release,
                ReconcileError::LockFailure {
                    call: StoreCall::Unlock,
                    ..
                }
            ));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.error.call(), Some(StoreCall::Get));
}
