//! Job dispatcher
//!
//! Accepts `(job name, args)` pairs, queues them on a bounded channel and runs
//! them on a pool of worker tasks. Callers never wait on the worker; they get
//! a [`JobHandle`] they may watch or drop.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::registry::{Job, JobClass, JobContext, JobRegistry};
use super::{JobError, JobOutput};
use crate::config::JobsConfig;

/// Lifecycle of a single job run
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Queued,
    Running,
    Succeeded(JobOutput),
    Failed(String),
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Succeeded(_) | JobState::Failed(_))
    }

    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Queued => JobStatus::Queued,
            JobState::Running => JobStatus::Running,
            JobState::Succeeded(_) => JobStatus::Succeeded,
            JobState::Failed(_) => JobStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

/// Status record kept for lookups after the handle is gone
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub job: String,
    pub status: JobStatus,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl JobRecord {
    fn queued(id: Uuid, job: &str) -> Self {
        Self {
            id,
            job: job.to_string(),
            status: JobStatus::Queued,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
        }
    }
}

/// Returned by [`Dispatcher::enqueue`]
#[derive(Debug)]
pub struct JobHandle {
    pub id: Uuid,
    pub job: String,
    state: watch::Receiver<JobState>,
}

impl JobHandle {
    /// Current state without waiting
    pub fn state(&self) -> JobState {
        self.state.borrow().clone()
    }

    /// Wait until the job succeeds or fails
    pub async fn wait(mut self) -> JobState {
        let finished = self
            .state
            .wait_for(JobState::is_finished)
            .await
            .map(|state| state.clone());
        match finished {
            Ok(state) => state,
            Err(_) => self.state.borrow().clone(),
        }
    }
}

struct QueuedJob {
    id: Uuid,
    job: Arc<dyn Job>,
    args: Value,
    state: watch::Sender<JobState>,
}

struct Shared {
    registry: JobRegistry,
    ctx: JobContext,
    records: DashMap<Uuid, JobRecord>,
    max_records: usize,
}

/// Handle to the job queue. Cheap to clone; workers stop once every clone is dropped.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
    tx: mpsc::Sender<QueuedJob>,
}

impl Dispatcher {
    /// Create the queue and spawn the worker pool. Must run inside a tokio runtime.
    pub fn start(registry: JobRegistry, ctx: JobContext, config: &JobsConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let shared = Arc::new(Shared {
            registry,
            ctx,
            records: DashMap::new(),
            max_records: config.max_records.max(1),
        });

        let workers = config.workers.max(1);
        for worker in 0..workers {
            tokio::spawn(worker_loop(worker, Arc::clone(&shared), Arc::clone(&rx)));
        }
        info!(workers, capacity = config.queue_capacity, "Job dispatcher started");

        Self { shared, tx }
    }

    /// Queue a job for background execution. Never blocks.
    pub fn enqueue(&self, name: &str, args: Value) -> Result<JobHandle, JobError> {
        let job = self
            .shared
            .registry
            .get(name)
            .ok_or_else(|| JobError::UnknownJob(name.to_string()))?;

        let id = Uuid::new_v4();
        let (state_tx, state_rx) = watch::channel(JobState::Queued);
        self.shared.records.insert(id, JobRecord::queued(id, name));

        let queued = QueuedJob {
            id,
            job,
            args,
            state: state_tx,
        };
        match self.tx.try_send(queued) {
            Ok(()) => {
                debug!(job = name, %id, "Job queued");
                Ok(JobHandle {
                    id,
                    job: name.to_string(),
                    state: state_rx,
                })
            }
            Err(TrySendError::Full(_)) => {
                self.shared.records.remove(&id);
                warn!(job = name, "Job queue is full, job dropped");
                Err(JobError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => {
                self.shared.records.remove(&id);
                Err(JobError::QueueClosed)
            }
        }
    }

    /// Run a job without queueing it and wait for its output
    pub async fn call(&self, name: &str, args: Value) -> Result<JobOutput, JobError> {
        let job = self
            .shared
            .registry
            .get(name)
            .ok_or_else(|| JobError::UnknownJob(name.to_string()))?;
        debug!(job = name, "Running job inline");
        self.shared.run_isolated(job, args).await
    }

    /// Status record of a queued, running or recently finished job
    pub fn record(&self, id: &Uuid) -> Option<JobRecord> {
        self.shared.records.get(id).map(|r| r.value().clone())
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.shared.registry
    }
}

async fn worker_loop(worker: usize, shared: Arc<Shared>, rx: Arc<Mutex<mpsc::Receiver<QueuedJob>>>) {
    loop {
        let next = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        match next {
            Some(queued) => shared.execute(queued).await,
            None => {
                debug!(worker, "Job queue closed, worker stopping");
                break;
            }
        }
    }
}

impl Shared {
    async fn prepare(&self, class: JobClass) -> Result<(), JobError> {
        if class == JobClass::PersistenceBound {
            self.ctx.db.ping().await?;
        }
        Ok(())
    }

    /// Run on a separate task so a panic only takes down this job
    async fn run_isolated(self: &Arc<Self>, job: Arc<dyn Job>, args: Value) -> Result<JobOutput, JobError> {
        let name = job.name();
        let shared = Arc::clone(self);
        let outcome = tokio::spawn(async move {
            shared.prepare(job.class()).await?;
            job.run(&shared.ctx, args).await
        })
        .await;
        outcome.unwrap_or_else(|join_err| {
            error!(job = name, error = %join_err, "Job panicked");
            Err(JobError::Panicked(join_err.to_string()))
        })
    }

    async fn execute(self: &Arc<Self>, queued: QueuedJob) {
        let QueuedJob { id, job, args, state } = queued;
        let name = job.name();

        if let Some(mut record) = self.records.get_mut(&id) {
            record.status = JobStatus::Running;
            record.started_at = Some(Utc::now());
        }
        state.send_replace(JobState::Running);
        info!(job = name, %id, "Job started");

        let final_state = match self.run_isolated(job, args).await {
            Ok(output) => {
                info!(job = name, %id, result = %output.summary(), "Job finished");
                JobState::Succeeded(output)
            }
            Err(err) => {
                error!(job = name, %id, error = %err, "Job failed");
                JobState::Failed(err.to_string())
            }
        };

        self.finish_record(id, &final_state);
        state.send_replace(final_state);
    }

    fn finish_record(&self, id: Uuid, final_state: &JobState) {
        if let Some(mut record) = self.records.get_mut(&id) {
            record.status = final_state.status();
            record.finished_at = Some(Utc::now());
            match final_state {
                JobState::Succeeded(output) => record.result = Some(output.summary()),
                JobState::Failed(err) => record.error = Some(err.clone()),
                _ => {}
            }
        }
        self.evict_finished();
    }

    /// Drop the oldest finished records beyond `max_records`
    fn evict_finished(&self) {
        let excess = self.records.len().saturating_sub(self.max_records);
        if excess == 0 {
            return;
        }
        let mut finished: Vec<(DateTime<Utc>, Uuid)> = self
            .records
            .iter()
            .filter_map(|r| r.finished_at.map(|at| (at, r.id)))
            .collect();
        finished.sort_unstable();
        for (_, id) in finished.into_iter().take(excess) {
            self.records.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Echo;

    #[async_trait]
    impl Job for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn run(&self, _ctx: &JobContext, args: Value) -> Result<JobOutput, JobError> {
            Ok(JobOutput::Message(format!("echo {}", args)))
        }
    }

    struct Boom;

    #[async_trait]
    impl Job for Boom {
        fn name(&self) -> &'static str {
            "boom"
        }

        async fn run(&self, _ctx: &JobContext, _args: Value) -> Result<JobOutput, JobError> {
            panic!("exploded");
        }
    }

    struct Broken;

    #[async_trait]
    impl Job for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn class(&self) -> JobClass {
            JobClass::PersistenceBound
        }

        async fn run(&self, _ctx: &JobContext, _args: Value) -> Result<JobOutput, JobError> {
            Err(JobError::InvalidArgs("missing employee_id".to_string()))
        }
    }

    /// Blocks until released so the queue can be filled
    struct Gate(Arc<tokio::sync::Notify>, Arc<AtomicUsize>);

    #[async_trait]
    impl Job for Gate {
        fn name(&self) -> &'static str {
            "gate"
        }

        async fn run(&self, _ctx: &JobContext, _args: Value) -> Result<JobOutput, JobError> {
            self.1.fetch_add(1, Ordering::SeqCst);
            self.0.notified().await;
            Ok(JobOutput::Message("released".to_string()))
        }
    }

    async fn dispatcher_with(registry: JobRegistry, config: JobsConfig) -> Dispatcher {
        let ctx = JobContext { db: test_db().await };
        Dispatcher::start(registry, ctx, &config)
    }

    fn registry() -> JobRegistry {
        let mut registry = JobRegistry::new();
        registry.register(Echo).register(Boom).register(Broken);
        registry
    }

    #[tokio::test]
    async fn test_enqueue_runs_in_background() {
        let dispatcher = dispatcher_with(registry(), JobsConfig::default()).await;
        let handle = dispatcher.enqueue("echo", serde_json::json!({"x": 1})).unwrap();
        let id = handle.id;
        let state = handle.wait().await;
        assert_eq!(state, JobState::Succeeded(JobOutput::Message("echo {\"x\":1}".to_string())));

        let record = dispatcher.record(&id).unwrap();
        assert_eq!(record.status, JobStatus::Succeeded);
        assert_eq!(record.result.as_deref(), Some("echo {\"x\":1}"));
        assert!(record.started_at.is_some());
        assert!(record.finished_at >= record.started_at);
    }

    #[tokio::test]
    async fn test_unknown_job_is_rejected() {
        let dispatcher = dispatcher_with(registry(), JobsConfig::default()).await;
        let err = dispatcher.enqueue("nope", Value::Null).unwrap_err();
        assert!(matches!(err, JobError::UnknownJob(name) if name == "nope"));
        let err = dispatcher.call("nope", Value::Null).await.unwrap_err();
        assert!(matches!(err, JobError::UnknownJob(_)));
    }

    #[tokio::test]
    async fn test_panicking_job_is_contained() {
        let dispatcher = dispatcher_with(registry(), JobsConfig::default()).await;
        let handle = dispatcher.enqueue("boom", Value::Null).unwrap();
        let id = handle.id;
        match handle.wait().await {
            JobState::Failed(msg) => assert!(msg.starts_with("job panicked")),
            other => panic!("unexpected state: {:?}", other),
        }
        assert_eq!(dispatcher.record(&id).unwrap().status, JobStatus::Failed);

        // workers survive the panic
        let handle = dispatcher.enqueue("echo", Value::Null).unwrap();
        assert!(matches!(handle.wait().await, JobState::Succeeded(_)));
    }

    #[tokio::test]
    async fn test_call_contains_panic() {
        let dispatcher = dispatcher_with(registry(), JobsConfig::default()).await;
        let err = dispatcher.call("boom", Value::Null).await.unwrap_err();
        assert!(matches!(err, JobError::Panicked(_)));
        assert!(err.to_string().starts_with("job panicked"));

        // the dispatcher stays usable afterwards
        let output = dispatcher.call("echo", Value::Null).await.unwrap();
        assert_eq!(output, JobOutput::Message("echo null".to_string()));
    }

    #[tokio::test]
    async fn test_failed_job_records_error() {
        let dispatcher = dispatcher_with(registry(), JobsConfig::default()).await;
        let handle = dispatcher.enqueue("broken", Value::Null).unwrap();
        let id = handle.id;
        assert!(matches!(handle.wait().await, JobState::Failed(_)));
        let record = dispatcher.record(&id).unwrap();
        assert_eq!(
            record.error.as_deref(),
            Some("invalid job arguments: missing employee_id")
        );
    }

    #[tokio::test]
    async fn test_call_runs_inline() {
        let dispatcher = dispatcher_with(registry(), JobsConfig::default()).await;
        let output = dispatcher.call("echo", Value::Null).await.unwrap();
        assert_eq!(output, JobOutput::Message("echo null".to_string()));
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_blocking() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let started = Arc::new(AtomicUsize::new(0));
        let mut registry = JobRegistry::new();
        registry.register(Gate(Arc::clone(&gate), Arc::clone(&started)));
        let config = JobsConfig {
            workers: 1,
            queue_capacity: 1,
            ..JobsConfig::default()
        };
        let dispatcher = dispatcher_with(registry, config).await;

        let first = dispatcher.enqueue("gate", Value::Null).unwrap();
        // wait for the worker to pick up the first job so the queue is empty again
        while started.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let second = dispatcher.enqueue("gate", Value::Null).unwrap();
        let err = dispatcher.enqueue("gate", Value::Null).unwrap_err();
        assert!(matches!(err, JobError::QueueFull));
        assert_eq!(second.state(), JobState::Queued);

        gate.notify_one();
        assert!(matches!(first.wait().await, JobState::Succeeded(_)));
        gate.notify_one();
        assert!(matches!(second.wait().await, JobState::Succeeded(_)));
    }

    #[tokio::test]
    async fn test_old_records_are_evicted() {
        let config = JobsConfig {
            workers: 1,
            max_records: 2,
            ..JobsConfig::default()
        };
        let dispatcher = dispatcher_with(registry(), config).await;
        let mut ids = Vec::new();
        for _ in 0..4 {
            let handle = dispatcher.enqueue("echo", Value::Null).unwrap();
            ids.push(handle.id);
            handle.wait().await;
        }
        assert!(dispatcher.record(&ids[0]).is_none());
        assert!(dispatcher.record(&ids[1]).is_none());
        assert!(dispatcher.record(&ids[3]).is_some());
    }
}
