//! Statistics stay exact when many tasks share one dispatcher, and `reset`
//! never observes a half-applied call.

use serde_json::json;
use std::sync::Arc;
use tier_dispatch::{BuiltinStrategy, Dispatcher, Tier};

fn shared_dispatcher() -> Arc<Dispatcher> {
    Arc::new(
        Dispatcher::builder()
            .tier(Tier::new("primary", BuiltinStrategy::sum()).with_min_length(3))
            .tier(Tier::new("terminal", BuiltinStrategy::Count))
            .build()
            .expect("valid config"),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_counts_add_up() {
    let dispatcher = shared_dispatcher();
    let tasks = 8;
    let calls_per_task = 50;

    let mut handles = Vec::new();
    for task in 0..tasks {
        let dispatcher = Arc::clone(&dispatcher);
        handles.push(tokio::task::spawn_blocking(move || {
            for i in 0..calls_per_task {
                // Even calls hit primary, odd calls fall through to terminal.
                let sample = if (task + i) % 2 == 0 {
                    json!([1, 2, 3])
                } else {
                    json!([1])
                };
                dispatcher.infer(&sample, None).expect("non-forced infer");
            }
        }));
    }
    for handle in handles {
        handle.await.expect("task panicked");
    }

    let stats = dispatcher.statistics();
    let total = (tasks * calls_per_task) as u64;
    assert_eq!(stats.total_calls, total);
    assert_eq!(stats.successful_predictions, total);
    assert_eq!(stats.invocations("primary") + stats.invocations("terminal"), total);
    assert_eq!(stats.invocations("primary"), total / 2);
    assert_eq!(stats.history_len as u64, total);
    assert_eq!(dispatcher.history().len() as u64, total);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reset_interleaved_with_infer_stays_consistent() {
    let dispatcher = shared_dispatcher();

    let worker = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::task::spawn_blocking(move || {
            for _ in 0..500 {
                dispatcher.infer(&json!([1, 2, 3, 4]), None).expect("infer");
            }
        })
    };
    let resetter = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::task::spawn_blocking(move || {
            for _ in 0..50 {
                dispatcher.reset();
                let stats = dispatcher.statistics();
                // Every applied call bumps all three together.
                assert_eq!(stats.total_calls, stats.successful_predictions);
                assert_eq!(stats.total_calls, stats.invocations("primary"));
                assert_eq!(stats.total_calls as usize, stats.history_len);
            }
        })
    };

    worker.await.expect("worker panicked");
    resetter.await.expect("resetter panicked");

    let stats = dispatcher.statistics();
    assert_eq!(stats.total_calls, stats.invocations("primary"));
    assert!(stats.total_calls <= 500);
}
