// runloop-dispatch/tests/concurrent_workers.rs
// ============================================================================
// Module: Concurrent Worker Dispatch
// Description: Drives several real OS threads, each running its own worker,
//              against one shared queue and one shared tool registry.
// Purpose: Exercise the lock-mediated mutual exclusion the single-threaded
//          unit tests in worker.rs cannot observe.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use runloop_core::model::identifiers::HolderId;
use runloop_core::model::identifiers::RunId;
use runloop_core::model::identifiers::TaskId;
use runloop_core::model::identifiers::ToolName;
use runloop_core::model::tool::Tool;
use runloop_core::model::tool::ToolAnnotations;
use runloop_core::model::tool::ToolRegistry;
use runloop_dispatch::InMemoryLock;
use runloop_dispatch::InMemoryQueue;
use runloop_dispatch::Queue;
use runloop_dispatch::Task;
use runloop_dispatch::Worker;
use runloop_dispatch::WorkerConfig;

fn counting_tool(calls: Arc<AtomicU64>) -> Tool {
    Tool {
        name: ToolName::new("increment"),
        description: "Increments a shared counter once per call.".to_string(),
        annotations: ToolAnnotations::side_effecting(),
        input_schema: None,
        custom_budgets: BTreeMap::new(),
        handler: Arc::new(move |_context, input| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(input.clone())
        }),
    }
}

#[test]
fn four_workers_drain_fifty_tasks_exactly_once_each() {
    let queue = Arc::new(InMemoryQueue::new());
    let calls = Arc::new(AtomicU64::new(0));

    let mut registry = ToolRegistry::new();
    registry.register(counting_tool(Arc::clone(&calls))).expect("register tool");
    let registry = Arc::new(registry);

    const TASK_COUNT: u64 = 50;
    for index in 0..TASK_COUNT {
        queue
            .enqueue(Task {
                task_id: TaskId::new(format!("task-{index}")),
                run_id: RunId::new("run-concurrent"),
                task_type: "tool_call".to_string(),
                input: serde_json::json!({"tool_name": "increment", "input": {"index": index}}),
                priority: 0,
                created_at_ms: index,
                attempt: 0,
            })
            .expect("enqueue");
    }

    let handles: Vec<_> = (0..4)
        .map(|worker_index| {
            let queue = Arc::clone(&queue) as Arc<dyn Queue>;
            let lock = Arc::new(InMemoryLock::new());
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                let mut worker = Worker::new(
                    queue,
                    lock,
                    HolderId::new(format!("worker-{worker_index}")),
                    WorkerConfig {
                        poll_timeout: Duration::from_millis(50),
                        lock_ttl: Duration::from_secs(5),
                    },
                );
                worker.register_tool_registry(registry);
                let mut processed = 0u64;
                while worker.poll_once().expect("poll succeeds") {
                    processed += 1;
                }
                processed
            })
        })
        .collect();

    let total_processed: u64 = handles.into_iter().map(|handle| handle.join().expect("worker thread panicked")).sum();

    assert_eq!(total_processed, TASK_COUNT, "every enqueued task must be drained exactly once");
    assert_eq!(calls.load(Ordering::SeqCst), TASK_COUNT, "the handler must run exactly once per task");
    assert_eq!(queue.size(), 0);
}

#[test]
fn reject_without_requeue_surfaces_a_terminal_failure_to_the_queue() {
    let queue = Arc::new(InMemoryQueue::new());
    let lock = Arc::new(InMemoryLock::new());
    let mut worker = Worker::new(Arc::clone(&queue) as Arc<dyn Queue>, lock, HolderId::new("solo"), WorkerConfig::default());
    worker.register_handler("always_fails", Arc::new(|_task| Err("handler refuses".to_string())));

    queue
        .enqueue(Task {
            task_id: TaskId::new("doomed"),
            run_id: RunId::new("run-1"),
            task_type: "always_fails".to_string(),
            input: serde_json::Value::Null,
            priority: 0,
            created_at_ms: 0,
            attempt: 0,
        })
        .expect("enqueue");

    assert!(worker.poll_once().expect("poll"));
    let result = queue.result_for(&TaskId::new("doomed")).expect("terminal result recorded");
    assert!(!result.succeeded);
    assert_eq!(queue.size(), 0);
}
