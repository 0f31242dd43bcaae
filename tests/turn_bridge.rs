//! Synchronous submissions through the turn bridge

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use webpilot::session::{FailureKind, TurnBridge, TurnResult};

use common::{manager_with, test_config, user_contents, MockConnector, Reply, ScriptedProvider};

fn start(connector: Arc<MockConnector>, provider: Arc<ScriptedProvider>) -> TurnBridge {
    let manager = manager_with(test_config(), connector, provider, Arc::new(AtomicUsize::new(0)));
    TurnBridge::start(manager).expect("bridge should start")
}

#[test]
fn test_submit_returns_answer() {
    let bridge = start(Arc::new(MockConnector::new()), Arc::new(ScriptedProvider::echo()));

    let result = bridge.submit("Go to example.com");

    assert_eq!(result, TurnResult::success("echo: Go to example.com"));
    assert!(!bridge.is_busy());
}

#[test]
fn test_overlapping_submit_is_rejected() {
    let (provider, entered) = ScriptedProvider::gated();
    let provider = Arc::new(provider);
    let bridge = start(Arc::new(MockConnector::new()), provider.clone());

    thread::scope(|s| {
        let first = s.spawn(|| bridge.submit("first"));

        entered
            .recv_timeout(Duration::from_secs(10))
            .expect("first turn should reach the model");
        assert!(bridge.is_busy());

        let second = bridge.submit("second");
        assert_eq!(second.failure_kind(), Some(FailureKind::Busy));
        assert!(second.to_string().starts_with("Error: "));

        provider.release(1);
        let first = first.join().unwrap();
        assert_eq!(first.to_string(), "echo: first");
    });

    assert_eq!(provider.request_count(), 1);
    assert_eq!(provider.max_active.load(Ordering::SeqCst), 1);
    // The rejected submission never replaces the stored result
    assert_eq!(bridge.last_result(), Some(TurnResult::success("echo: first")));
}

#[test]
fn test_turns_never_overlap() {
    let provider = Arc::new(ScriptedProvider::echo());
    let bridge = start(Arc::new(MockConnector::new()), provider.clone());

    thread::scope(|s| {
        for worker in 0..4 {
            let bridge = &bridge;
            s.spawn(move || {
                for i in 0..5 {
                    let result = bridge.submit(&format!("task {}-{}", worker, i));
                    assert!(
                        result.is_success() || result.failure_kind() == Some(FailureKind::Busy),
                        "unexpected result: {}",
                        result
                    );
                }
            });
        }
    });

    assert_eq!(provider.max_active.load(Ordering::SeqCst), 1);
    assert!(provider.request_count() >= 1);
}

#[test]
fn test_history_order_across_submissions() {
    let provider = Arc::new(ScriptedProvider::echo());
    let bridge = start(Arc::new(MockConnector::new()), provider.clone());

    bridge.submit("A");
    bridge.submit("B");

    assert_eq!(user_contents(&provider.last_request()), vec!["A", "B"]);
}

#[test]
fn test_error_prefixes() {
    let connector = Arc::new(MockConnector::failing(1));
    let provider = Arc::new(ScriptedProvider::new(vec![Reply::Fail(
        "model unavailable".to_string(),
    )]));
    let bridge = start(connector.clone(), provider);

    let init = bridge.submit("hello");
    assert!(
        init.to_string().starts_with("Error during initialization: "),
        "unexpected text: {}",
        init
    );

    let generation = bridge.submit("hello");
    assert!(generation.to_string().starts_with("Error: "));
    assert!(generation.to_string().contains("model unavailable"));

    let recovered = bridge.submit("hello");
    assert_eq!(recovered.to_string(), "echo: hello");
    assert_eq!(connector.log.connects.load(Ordering::SeqCst), 2);
}

#[test]
fn test_last_result_persists() {
    let provider = Arc::new(ScriptedProvider::new(vec![Reply::Fail(
        "quota exceeded".to_string(),
    )]));
    let bridge = start(Arc::new(MockConnector::new()), provider);

    assert_eq!(bridge.last_result(), None);

    let failed = bridge.submit("first");
    assert_eq!(bridge.last_result(), Some(failed.clone()));
    assert_eq!(bridge.last_result(), Some(failed));

    let ok = bridge.submit("second");
    assert_eq!(bridge.last_result(), Some(ok));
}

#[test]
fn test_shutdown_closes_connections() {
    let connector = Arc::new(MockConnector::new());
    let mut bridge = start(connector.clone(), Arc::new(ScriptedProvider::echo()));

    assert!(bridge.submit("hello").is_success());
    bridge.shutdown();

    assert_eq!(connector.log.closes.load(Ordering::SeqCst), 1);

    let after = bridge.submit("hello again");
    assert_eq!(after.failure_kind(), Some(FailureKind::Generation));
}

#[test]
fn test_drop_closes_connections() {
    let connector = Arc::new(MockConnector::new());
    let bridge = start(connector.clone(), Arc::new(ScriptedProvider::echo()));

    bridge.submit("hello");
    drop(bridge);

    assert_eq!(connector.log.closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_shutdown_without_turns_opens_nothing() {
    let connector = Arc::new(MockConnector::new());
    let mut bridge = start(connector.clone(), Arc::new(ScriptedProvider::echo()));

    bridge.shutdown();

    assert_eq!(connector.log.connects.load(Ordering::SeqCst), 0);
    assert_eq!(connector.log.closes.load(Ordering::SeqCst), 0);
}
