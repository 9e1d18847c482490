//! Shard teardown tests against recording fakes.

use shardkv_shard::{CancelToken, CycleCallbacks, Shard, ShardConfig, ShardError, ShardStatus};
use shardkv_testkit::{CallLog, FakeSubsystem};
use std::sync::Arc;
use std::time::Duration;

fn fast_config() -> ShardConfig {
    ShardConfig::new()
        .shutdown_check_interval(Duration::from_millis(5))
        .shutdown_timeout(Duration::from_millis(100))
        .callback_unregister_timeout(Duration::from_millis(200))
}

fn full_shard(log: &CallLog) -> Shard {
    let callbacks = CycleCallbacks {
        compaction: Some(FakeSubsystem::new("compaction", log).into_arc()),
        flush: Some(FakeSubsystem::new("flush-cycle", log).into_arc()),
        vector_combined: Some(FakeSubsystem::new("vector-cycle", log).into_arc()),
        ..Default::default()
    };

    Shard::builder("products_a1b2")
        .config(fast_config())
        .reindexer(FakeSubsystem::new("reindexer", log).into_arc())
        .prop_length_tracker(FakeSubsystem::new("tracker", log).into_arc())
        .cycle_callbacks(callbacks)
        .async_replication(FakeSubsystem::new("replication", log).running(true).into_arc())
        .vector_queue("title", FakeSubsystem::new("queue-title", log).into_arc())
        .vector_index("title", FakeSubsystem::new("index-title", log).into_arc())
        .store(FakeSubsystem::new("store", log).into_arc())
        .dynamic_vector_index_db(FakeSubsystem::new("dyndb", log).into_arc())
        .build()
}

#[tokio::test]
async fn teardown_closes_everything_in_order() {
    let log = CallLog::new();
    let shard = full_shard(&log);

    shard.shutdown(&CancelToken::new()).await.unwrap();

    assert_eq!(shard.status(), ShardStatus::Shutdown);
    assert_eq!(shard.stats().shutdowns_completed(), 1);
    assert!(shard.stats().last_shutdown_duration().is_some());

    let order = [
        "reindexer.stop",
        "tracker.close",
        "compaction.unregister",
        "replication.stop",
        "queue-title.flush",
        "queue-title.close",
        "index-title.flush",
        "index-title.shutdown",
        "store.shutdown",
        "dyndb.close",
    ];
    let positions: Vec<_> = order
        .iter()
        .map(|call| log.position(call).unwrap_or_else(|| panic!("{call} not called")))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", log.calls());

    // every callback is unregistered before any vector work starts
    let queue_flush = log.position("queue-title.flush").unwrap();
    for cb in ["compaction.unregister", "flush-cycle.unregister", "vector-cycle.unregister"] {
        assert!(log.position(cb).unwrap() < queue_flush);
    }
}

#[tokio::test]
async fn teardown_twice_without_store() {
    let log = CallLog::new();
    let shard = Shard::builder("half_initialized")
        .config(fast_config())
        .vector_index("default", FakeSubsystem::new("index", &log).into_arc())
        .build();
    assert!(!shard.has_store());

    shard.shutdown(&CancelToken::new()).await.unwrap();
    shard.shutdown(&CancelToken::new()).await.unwrap();

    assert_eq!(shard.status(), ShardStatus::Shutdown);
    assert!(!log.touched("store"));
    assert_eq!(log.count("index.shutdown"), 1);
}

#[tokio::test]
async fn failing_vector_flush_does_not_stop_store_shutdown() {
    let log = CallLog::new();
    let shard = Shard::builder("s1")
        .config(fast_config())
        .vector_index("a", FakeSubsystem::new("index-a", &log).failing("flush").into_arc())
        .vector_index("b", FakeSubsystem::new("index-b", &log).into_arc())
        .store(FakeSubsystem::new("store", &log).into_arc())
        .build();

    let err = shard.shutdown(&CancelToken::new()).await.unwrap_err();

    let failures = err.teardown_failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].subsystem, "flush vector index commitlog of vector \"a\"");
    assert!(err.to_string().contains("injected flush failure"));

    // the rest still ran
    assert_eq!(log.count("index-a.shutdown"), 1);
    assert_eq!(log.count("index-b.flush"), 1);
    assert_eq!(log.count("store.shutdown"), 1);

    assert_ne!(shard.status(), ShardStatus::Shutdown);
    assert_eq!(shard.stats().shutdowns_failed(), 1);
}

#[tokio::test]
async fn every_failure_is_reported() {
    let log = CallLog::new();
    let shard = Shard::builder("s1")
        .config(fast_config())
        .prop_length_tracker(FakeSubsystem::new("tracker", &log).failing("close").into_arc())
        .vector_queue("v", FakeSubsystem::new("queue", &log).failing("flush").failing("close").into_arc())
        .store(FakeSubsystem::new("store", &log).failing("shutdown").into_arc())
        .build();

    let err = shard.shutdown(&CancelToken::new()).await.unwrap_err();
    let ShardError::Teardown(errors) = &err else {
        panic!("expected teardown error, got {err}");
    };

    let subsystems: Vec<_> = errors.failures().iter().map(|f| f.subsystem.as_str()).collect();
    assert_eq!(
        subsystems,
        vec![
            "close prop length tracker",
            "flush vector index queue of vector \"v\"",
            "shut down vector index queue of vector \"v\"",
            "stop lsmkv store",
        ]
    );
    assert!(errors.contains("stop lsmkv store"));
}

#[tokio::test]
async fn retry_after_partial_failure() {
    let log = CallLog::new();
    let store = FakeSubsystem::new("store", &log).failing("shutdown").into_arc();
    let shard = Shard::builder("s1")
        .config(fast_config())
        .store(store.clone())
        .build();

    assert!(shard.shutdown(&CancelToken::new()).await.is_err());
    assert_eq!(shard.status(), ShardStatus::Ready);
    assert!(matches!(shard.enter(), Err(ShardError::AlreadyShuttingDown)));

    store.heal("shutdown");
    shard.shutdown(&CancelToken::new()).await.unwrap();

    assert_eq!(shard.status(), ShardStatus::Shutdown);
    assert_eq!(log.count("store.shutdown"), 2);
    assert_eq!(shard.stats().shutdowns_failed(), 1);
    assert_eq!(shard.stats().shutdowns_completed(), 1);
}

#[tokio::test]
async fn timeout_aborts_before_any_subsystem_is_closed() {
    let log = CallLog::new();
    let shard = full_shard(&log);
    let _op = shard.enter().unwrap();

    let err = shard.shutdown(&CancelToken::new()).await.unwrap_err();

    assert!(matches!(err, ShardError::ShutdownTimeout { in_use: 1, .. }));
    assert_eq!(shard.status(), ShardStatus::Ready);
    // only the fire-and-forget reindexer stop happened
    assert_eq!(log.calls(), vec!["reindexer.stop"]);
    assert!(shard.enter().is_ok());
}

#[tokio::test]
async fn cancellation_aborts_the_wait() {
    let log = CallLog::new();
    let shard = Shard::builder("s1")
        .config(fast_config().shutdown_timeout(Duration::from_secs(10)))
        .store(FakeSubsystem::new("store", &log).into_arc())
        .build();
    let _op = shard.enter().unwrap();

    let cancel = CancelToken::new();
    cancel.cancel();

    let err = shard.shutdown(&cancel).await.unwrap_err();
    assert!(matches!(err, ShardError::Cancelled));
    assert!(!log.touched("store"));
}

#[tokio::test]
async fn waits_for_in_flight_operations() {
    let log = CallLog::new();
    let shard = Arc::new(
        Shard::builder("s1")
            .config(fast_config().shutdown_timeout(Duration::from_secs(5)))
            .store(FakeSubsystem::new("store", &log).into_arc())
            .build(),
    );

    let op = shard.enter().unwrap();
    let releaser = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        drop(op);
    });

    shard.shutdown(&CancelToken::new()).await.unwrap();
    releaser.await.unwrap();
    assert_eq!(log.count("store.shutdown"), 1);
}

#[tokio::test]
async fn shutdown_cancels_transfer_and_dimension_tracking() {
    let tracking = CancelToken::new();
    let shard = Shard::builder("s1")
        .config(fast_config())
        .dimension_tracking(tracking.clone())
        .build();

    let transfer = shard.begin_halt_for_transfer().unwrap();
    shard.shutdown(&CancelToken::new()).await.unwrap();

    assert!(transfer.is_cancelled());
    assert!(tracking.is_cancelled());
    assert!(shard.begin_halt_for_transfer().is_err());
}

#[tokio::test]
async fn stopped_replication_is_not_stopped_again() {
    let log = CallLog::new();
    let shard = Shard::builder("s1")
        .config(fast_config())
        .async_replication(FakeSubsystem::new("replication", &log).into_arc())
        .build();

    shard.shutdown(&CancelToken::new()).await.unwrap();
    assert!(!log.touched("replication"));
}

#[tokio::test]
async fn slow_callback_is_reported_and_teardown_continues() {
    let log = CallLog::new();
    let callbacks = CycleCallbacks {
        geo_props_combined: Some(
            FakeSubsystem::new("geo", &log)
                .with_unregister_delay(Duration::from_millis(500))
                .into_arc(),
        ),
        ..Default::default()
    };
    let shard = Shard::builder("s1")
        .config(fast_config().callback_unregister_timeout(Duration::from_millis(20)))
        .cycle_callbacks(callbacks)
        .store(FakeSubsystem::new("store", &log).into_arc())
        .build();

    let err = shard.shutdown(&CancelToken::new()).await.unwrap_err();
    assert_eq!(
        err.teardown_failures()[0].subsystem,
        "unregister geo props combined callbacks"
    );
    assert_eq!(log.count("store.shutdown"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_shutdown_is_rejected() {
    let log = CallLog::new();
    let callbacks = CycleCallbacks {
        flush: Some(
            FakeSubsystem::new("flush-cycle", &log)
                .with_unregister_delay(Duration::from_millis(200))
                .into_arc(),
        ),
        ..Default::default()
    };
    let shard = Arc::new(
        Shard::builder("s1")
            .config(fast_config().callback_unregister_timeout(Duration::from_secs(2)))
            .cycle_callbacks(callbacks)
            .store(FakeSubsystem::new("store", &log).into_arc())
            .build(),
    );

    let first = {
        let shard = Arc::clone(&shard);
        tokio::spawn(async move { shard.shutdown(&CancelToken::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = shard.shutdown(&CancelToken::new()).await;
    assert!(matches!(second, Err(ShardError::AlreadyShuttingDown)));

    first.await.unwrap().unwrap();
    assert_eq!(shard.status(), ShardStatus::Shutdown);
    assert_eq!(log.count("flush-cycle.unregister"), 1);
    assert_eq!(log.count("store.shutdown"), 1);
    assert_eq!(shard.stats().shutdowns_completed(), 1);
    assert_eq!(shard.stats().shutdowns_failed(), 0);

    // once finished, later calls are no-ops again
    shard.shutdown(&CancelToken::new()).await.unwrap();
    assert_eq!(log.count("store.shutdown"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn transfer_registered_during_shutdown_is_cancelled() {
    let log = CallLog::new();
    let shard = Arc::new(full_shard(&log));

    let registrar = {
        let shard = Arc::clone(&shard);
        std::thread::spawn(move || {
            let mut last = None;
            while let Ok(token) = shard.begin_halt_for_transfer() {
                last = Some(token);
            }
            last
        })
    };

    shard.shutdown(&CancelToken::new()).await.unwrap();

    if let Some(token) = registrar.join().unwrap() {
        assert!(token.is_cancelled());
    }
    assert!(shard.begin_halt_for_transfer().is_err());
}
