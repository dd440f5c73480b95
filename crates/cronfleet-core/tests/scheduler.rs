use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use cronfleet_core::{
    CoreError, Handler, HandlerRouter, LOG_CLEANUP_TRIGGER, LogStore, MemoryStore, MetricsBackend,
    Notifier, RunError, RunOutcome, Scheduler, SchedulerConfig, StoreError,
};
use cronfleet_model::{
    DependencyMode, LogCompletion, LogPage, LogQuery, NewTaskLog, Notification, NotifyChannels,
    NotifyPolicy, Protocol, RunId, RunStatus, Task, TaskLevel, TaskLog,
};
use cronfleet_rpc::RpcError;

/// Handler whose behaviour is scripted per task id.
#[derive(Default)]
struct Scripted {
    calls: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
    /// Task ids that always fail.
    failing: Vec<i64>,
    /// Task ids that report a manual stop.
    stopped: Vec<i64>,
    seen_specs: Mutex<Vec<(i64, String)>>,
}

impl Scripted {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Handler for Scripted {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn supports(&self, _task: &Task) -> bool {
        true
    }

    async fn run(&self, task: &Task, _run_id: RunId) -> RunOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.seen_specs
            .lock()
            .unwrap()
            .push((task.id, task.spec.clone()));

        tokio::time::sleep(self.delay).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&task.id) {
            RunOutcome::failed("went wrong", RunError::Failed("boom".into()))
        } else if self.stopped.contains(&task.id) {
            RunOutcome::failed("partial", RunError::Remote(RpcError::ManualStop))
        } else {
            RunOutcome::ok(format!("done {}", task.id))
        }
    }
}

#[derive(Default)]
struct Recorder {
    pushed: Mutex<Vec<Notification>>,
}

#[async_trait]
impl Notifier for Recorder {
    async fn push(&self, n: Notification) {
        self.pushed.lock().unwrap().push(n);
    }
}

/// Notifier that never returns.
struct Hung;

#[async_trait]
impl Notifier for Hung {
    async fn push(&self, _n: Notification) {
        std::future::pending::<()>().await;
    }
}

#[derive(Default)]
struct Counters {
    started: AtomicUsize,
    completed: AtomicUsize,
    denied: AtomicUsize,
}

impl MetricsBackend for Counters {
    fn record_run_started(&self, _protocol: Protocol) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
    fn record_run_completed(&self, _protocol: Protocol, _status: RunStatus, _d: Duration) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn record_admission_denied(&self, _protocol: Protocol) {
        self.denied.fetch_add(1, Ordering::SeqCst);
    }
}

fn scheduler(store: &MemoryStore, handler: Arc<dyn Handler>) -> Scheduler {
    scheduler_with(store, handler, SchedulerConfig::default())
}

fn scheduler_with(store: &MemoryStore, handler: Arc<dyn Handler>, cfg: SchedulerConfig) -> Scheduler {
    let store = Arc::new(store.clone());
    Scheduler::builder(store.clone(), store.clone(), store)
        .config(cfg)
        .router(HandlerRouter::new().with(handler))
        .build()
        .unwrap()
}

fn task(id: i64) -> Task {
    let mut t = Task::new(id, format!("task-{id}"), Protocol::Http, "http://example.invalid");
    t.spec = "0 0 3 * * *".into();
    t
}

fn count(logs: &[TaskLog], status: RunStatus) -> usize {
    logs.iter().filter(|l| l.status == status).count()
}

/// Polls `check` until it holds or two seconds pass.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_instance_admits_one_of_many_concurrent_fires() {
    let store = MemoryStore::new();
    let handler = Arc::new(Scripted::with_delay(Duration::from_millis(500)));
    let metrics = Arc::new(Counters::default());
    let store_arc = Arc::new(store.clone());
    let sched = Scheduler::builder(store_arc.clone(), store_arc.clone(), store_arc)
        .router(HandlerRouter::new().with(handler.clone()))
        .metrics(metrics.clone())
        .build()
        .unwrap();

    let mut t = task(1);
    t.multi = false;

    let handles: Vec<_> = (0..100).map(|_| sched.run(t.clone())).collect();
    for h in handles {
        h.await.unwrap();
    }

    let logs = store.logs_for(1);
    assert_eq!(logs.len(), 100);
    assert_eq!(count(&logs, RunStatus::Finish), 1);
    assert_eq!(count(&logs, RunStatus::Cancel), 99);
    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    assert_eq!(metrics.denied.load(Ordering::SeqCst), 99);
    assert_eq!(metrics.completed.load(Ordering::SeqCst), 1);
    assert!(!sched.presence().has(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn presence_is_held_only_while_running() {
    let store = MemoryStore::new();
    let sched = scheduler(&store, Arc::new(Scripted::with_delay(Duration::from_millis(400))));

    let mut t = task(6);
    t.multi = false;
    assert!(!sched.presence().has(6));

    let run = sched.run(t);
    assert!(eventually(|| store.logs_for(6).len() == 1).await);
    assert!(sched.presence().has(6));
    assert_eq!(store.logs_for(6)[0].status, RunStatus::Running);

    run.await.unwrap();
    assert!(!sched.presence().has(6));
    assert_eq!(store.logs_for(6)[0].status, RunStatus::Finish);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_cap_bounds_running_bodies() {
    let store = MemoryStore::new();
    let handler = Arc::new(Scripted::with_delay(Duration::from_millis(100)));
    let cfg = SchedulerConfig {
        concurrency: 3,
        ..SchedulerConfig::default()
    };
    let sched = scheduler_with(&store, handler.clone(), cfg);

    let handles: Vec<_> = (0..12).map(|_| sched.run(task(2))).collect();
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(handler.calls.load(Ordering::SeqCst), 12);
    assert!(handler.peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(count(&store.logs_for(2), RunStatus::Finish), 12);
    assert_eq!(sched.status().concurrency_used, 0);
}

#[tokio::test(start_paused = true)]
async fn retries_are_recorded_on_the_log_row() {
    let store = MemoryStore::new();
    let handler = Arc::new(Scripted {
        failing: vec![3],
        ..Scripted::default()
    });
    let sched = scheduler(&store, handler.clone());

    let mut t = task(3);
    t.retry_times = 2;
    t.retry_interval = 5;
    sched.run(t).await.unwrap();

    let logs = store.logs_for(3);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, RunStatus::Failure);
    assert_eq!(logs[0].retry_times, 2);
    assert_eq!(logs[0].result, "went wrong");
    assert!(logs[0].end_time.is_some());
    assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn manual_stop_is_recorded_as_cancel() {
    let store = MemoryStore::new();
    let handler = Arc::new(Scripted {
        stopped: vec![4],
        ..Scripted::default()
    });
    let sched = scheduler(&store, handler);

    let mut t = task(4);
    t.retry_times = 3;
    sched.run(t).await.unwrap();

    let logs = store.logs_for(4);
    assert_eq!(logs[0].status, RunStatus::Cancel);
    assert_eq!(logs[0].result, "partial");
    assert_eq!(logs[0].retry_times, 0);
}

fn family(mode: DependencyMode) -> MemoryStore {
    let mut parent = task(10);
    parent.dependency_task_ids = vec![11, 12, 13];
    parent.dependency_mode = mode;

    let mut c1 = task(11);
    c1.level = TaskLevel::Child;
    let mut c2 = task(12);
    c2.level = TaskLevel::Child;
    let mut disabled = task(13);
    disabled.level = TaskLevel::Child;
    disabled.enabled = false;

    MemoryStore::with_tasks([parent, c1, c2, disabled])
}

#[tokio::test]
async fn strong_dependency_skips_children_after_failure() {
    let store = family(DependencyMode::Strong);
    let handler = Arc::new(Scripted {
        failing: vec![10],
        ..Scripted::default()
    });
    let sched = scheduler(&store, handler.clone());

    sched.run_by_id(10).await.unwrap().await.unwrap();
    sched.wait_and_exit().await;

    assert_eq!(count(&store.logs_for(10), RunStatus::Failure), 1);
    assert!(store.logs_for(11).is_empty());
    assert!(store.logs_for(12).is_empty());
    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn weak_dependency_runs_enabled_children_after_failure() {
    let store = family(DependencyMode::Weak);
    let handler = Arc::new(Scripted {
        failing: vec![10],
        ..Scripted::default()
    });
    let sched = scheduler(&store, handler.clone());

    sched.run_by_id(10).await.unwrap().await.unwrap();
    assert!(
        eventually(|| store.logs_for(11).len() == 1 && store.logs_for(12).len() == 1).await
    );
    sched.wait_and_exit().await;

    assert!(store.logs_for(13).is_empty());
    let child = &store.logs_for(11)[0];
    assert_eq!(child.status, RunStatus::Finish);
    assert_eq!(child.spec, "dependency of task 10");

    let specs = handler.seen_specs.lock().unwrap().clone();
    assert!(specs.contains(&(12, "dependency of task 10".to_string())));
}

#[tokio::test]
async fn strong_dependency_runs_children_after_success() {
    let store = family(DependencyMode::Strong);
    let sched = scheduler(&store, Arc::new(Scripted::default()));

    sched.run_by_id(10).await.unwrap().await.unwrap();
    sched.wait_and_exit().await;

    assert_eq!(count(&store.logs_for(11), RunStatus::Finish), 1);
    assert_eq!(count(&store.logs_for(12), RunStatus::Finish), 1);
}

#[tokio::test]
async fn wait_and_exit_drains_in_flight_runs() {
    let store = MemoryStore::new();
    let sched = scheduler(&store, Arc::new(Scripted::with_delay(Duration::from_millis(300))));

    let _detached = sched.run(task(5));
    assert!(eventually(|| store.logs_for(5).len() == 1).await);
    assert_eq!(store.logs_for(5)[0].status, RunStatus::Running);

    sched.wait_and_exit().await;

    assert_eq!(store.logs_for(5)[0].status, RunStatus::Finish);
    assert_eq!(sched.status().in_flight, 0);
    assert!(!sched.status().running);
}

#[tokio::test]
async fn initialize_registers_parents_and_cleanup() {
    let mut child = task(21);
    child.level = TaskLevel::Child;
    let mut disabled = task(22);
    disabled.enabled = false;
    let store = MemoryStore::with_tasks([task(20), child, disabled]);
    let sched = scheduler(&store, Arc::new(Scripted::default()));

    let added = sched.initialize().await.unwrap();
    assert_eq!(added, 1);

    let status = sched.status();
    assert!(status.running);
    assert_eq!(status.triggers, vec!["20".to_string(), LOG_CLEANUP_TRIGGER.to_string()]);
    assert!(sched.next_run_time(&task(20)).is_some());
    assert!(sched.next_run_time(&store.tasks()[1]).is_none());

    sched.wait_and_exit().await;
}

#[tokio::test]
async fn child_tasks_never_get_a_trigger() {
    let store = MemoryStore::new();
    let sched = scheduler(&store, Arc::new(Scripted::default()));

    let mut child = task(30);
    child.level = TaskLevel::Child;
    assert!(matches!(sched.add(child), Err(CoreError::ChildTask(30))));

    let mut bad = task(31);
    bad.spec = "not a cron".into();
    assert!(matches!(sched.add(bad), Err(CoreError::Cron(_))));

    sched.add(task(32)).unwrap();
    let mut moved = task(32);
    moved.spec = "0 30 4 * * *".into();
    sched.remove_and_add(moved).unwrap();
    assert_eq!(sched.batch_add([task(33), task(34)]), 2);

    sched.remove(33);
    assert_eq!(sched.status().triggers, vec!["32".to_string(), "34".to_string()]);
}

#[tokio::test]
async fn no_handler_for_protocol_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let sched = Scheduler::builder(store.clone(), store.clone(), store)
        .build()
        .unwrap();
    assert!(matches!(sched.add(task(40)), Err(CoreError::NoHandler("http"))));
    assert!(matches!(sched.run_by_id(99).await, Err(CoreError::TaskNotFound(99))));
}

#[tokio::test]
async fn unhandled_run_leaves_one_failure_row() {
    let store = MemoryStore::new();
    let shared = Arc::new(store.clone());
    let sched = Scheduler::builder(shared.clone(), shared.clone(), shared)
        .build()
        .unwrap();

    sched.run(task(41)).await.unwrap();

    let logs = store.logs_for(41);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, RunStatus::Failure);
    assert_eq!(logs[0].result, "no handler for protocol http");
    assert!(logs[0].end_time.is_some());
}

#[tokio::test]
async fn cleanup_respects_retention_and_reload() {
    let store = MemoryStore::new();
    let sched = scheduler(&store, Arc::new(Scripted::default()));

    let mut old = NewTaskLog::for_task(&task(50), RunStatus::Finish);
    old.start_time = SystemTime::now() - Duration::from_secs(3 * 86_400);
    store.create_log(old).await.unwrap();
    store
        .create_log(NewTaskLog::for_task(&task(50), RunStatus::Finish))
        .await
        .unwrap();

    // retention 0 keeps everything
    assert_eq!(sched.cleanup_logs().await.unwrap(), 0);
    assert_eq!(store.logs().len(), 2);

    store.set_log_retention_days(1);
    assert_eq!(sched.cleanup_logs().await.unwrap(), 1);
    assert_eq!(store.logs().len(), 1);

    store.set_log_cleanup_time("bogus");
    sched.initialize().await.unwrap();
    store.set_log_cleanup_time("04:15");
    sched.reload_log_cleanup().await.unwrap();
    assert!(sched.status().triggers.contains(&LOG_CLEANUP_TRIGGER.to_string()));

    sched.wait_and_exit().await;
}

#[tokio::test]
async fn notifications_follow_policy() {
    let store = MemoryStore::new();
    let notifier = Arc::new(Recorder::default());
    let store_arc = Arc::new(store.clone());
    let sched = Scheduler::builder(store_arc.clone(), store_arc.clone(), store_arc)
        .router(HandlerRouter::new().with(Arc::new(Scripted {
            failing: vec![61],
            ..Scripted::default()
        })))
        .notifier(notifier.clone())
        .build()
        .unwrap();

    let mut ok = task(60);
    ok.notify.policy = NotifyPolicy::OnFailure;
    ok.notify.channels = NotifyChannels::WEBHOOK;
    let mut failed = task(61);
    failed.notify.policy = NotifyPolicy::OnFailure;
    failed.notify.channels = NotifyChannels::WEBHOOK | NotifyChannels::MAIL;
    failed.notify.receiver_id = "ops@example.com".into();

    sched.run(ok).await.unwrap();
    sched.run(failed).await.unwrap();
    sched.wait_and_exit().await;

    assert!(eventually(|| notifier.pushed.lock().unwrap().len() == 2).await);
    let pushed = notifier.pushed.lock().unwrap().clone();
    assert_eq!(pushed.len(), 2);
    assert!(pushed.iter().all(|n| n.summary().task_id == 61));
    assert!(pushed.iter().all(|n| !n.summary().success));
}

/// Log store whose first `create_log` fails.
struct FlakyLogs {
    inner: MemoryStore,
    fail_next: AtomicBool,
}

#[async_trait]
impl LogStore for FlakyLogs {
    async fn create_log(&self, log: NewTaskLog) -> Result<RunId, StoreError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("disk full".into()));
        }
        self.inner.create_log(log).await
    }
    async fn complete_log(&self, id: RunId, done: LogCompletion) -> Result<(), StoreError> {
        self.inner.complete_log(id, done).await
    }
    async fn get_log(&self, id: RunId) -> Result<Option<TaskLog>, StoreError> {
        self.inner.get_log(id).await
    }
    async fn query_logs(&self, q: &LogQuery) -> Result<LogPage<TaskLog>, StoreError> {
        self.inner.query_logs(q).await
    }
    async fn remove_logs_older_than(&self, days: u32) -> Result<usize, StoreError> {
        self.inner.remove_logs_older_than(days).await
    }
}

#[tokio::test]
async fn failed_log_write_releases_presence() {
    let store = MemoryStore::new();
    let logs = Arc::new(FlakyLogs {
        inner: store.clone(),
        fail_next: AtomicBool::new(true),
    });
    let handler = Arc::new(Scripted::default());
    let shared = Arc::new(store.clone());
    let sched = Scheduler::builder(shared.clone(), logs, shared)
        .router(HandlerRouter::new().with(handler.clone()))
        .build()
        .unwrap();

    let mut t = task(70);
    t.multi = false;

    sched.run(t.clone()).await.unwrap();
    assert!(store.logs_for(70).is_empty());
    assert!(!sched.presence().has(70));
    assert_eq!(handler.calls.load(Ordering::SeqCst), 0);

    sched.run(t).await.unwrap();
    assert_eq!(count(&store.logs_for(70), RunStatus::Finish), 1);
}

#[tokio::test]
async fn hung_notifier_does_not_block_shutdown() {
    let store = MemoryStore::new();
    let shared = Arc::new(store.clone());
    let sched = Scheduler::builder(shared.clone(), shared.clone(), shared)
        .router(HandlerRouter::new().with(Arc::new(Scripted {
            failing: vec![80],
            ..Scripted::default()
        })))
        .notifier(Arc::new(Hung))
        .build()
        .unwrap();

    let mut t = task(80);
    t.notify.policy = NotifyPolicy::OnFailure;
    t.notify.channels = NotifyChannels::WEBHOOK;
    sched.run(t).await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), sched.wait_and_exit())
        .await
        .expect("shutdown waited on the notifier");
    assert_eq!(count(&store.logs_for(80), RunStatus::Failure), 1);
}
