use std::sync::Arc;
use std::time::Duration;

use crate::core::Config;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::printing::{JobStore, PrintService, PrintWorker, StaleSweeper, TransportDispatcher};

/// Server state - shared handles to every service
///
/// Cheap to clone: the store and dispatcher are reference-counted. The job
/// store is the single source of truth for job state; nothing here caches
/// "the current job" in memory, since the process holding it is not
/// guaranteed to stay alive.
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Config,
    /// Durable job store
    pub store: JobStore,
    /// Intake / relay / query service
    pub service: PrintService,
    /// Transport dispatcher
    pub dispatcher: Arc<TransportDispatcher>,
}

impl ServerState {
    /// Initialize against the configured working directory
    pub fn initialize(config: &Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.work_dir)?;
        let store = JobStore::open(config.db_path())?;
        tracing::info!(path = %config.db_path().display(), "Job store opened");

        Ok(Self::with_store(config.clone(), store))
    }

    /// Initialize with an in-memory store (tests)
    pub fn in_memory(config: Config) -> anyhow::Result<Self> {
        let store = JobStore::open_in_memory()?;
        Ok(Self::with_store(config, store))
    }

    fn with_store(config: Config, store: JobStore) -> Self {
        let dispatcher = Arc::new(TransportDispatcher::new(
            store.clone(),
            Duration::from_millis(config.connect_timeout_ms),
            Duration::from_millis(config.write_timeout_ms),
        ));
        let service = PrintService::new(store.clone(), config.retry_policy());

        Self {
            config,
            store,
            service,
            dispatcher,
        }
    }

    /// Spawn the worker pool and the stale sweeper
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        for _ in 0..self.config.worker_count.max(1) {
            let worker = PrintWorker::new(
                self.store.clone(),
                self.dispatcher.clone(),
                self.config.retry_policy(),
                Duration::from_millis(self.config.poll_interval_ms),
            );
            tasks.spawn(
                "print_worker",
                TaskKind::Worker,
                worker.run(tasks.shutdown_token()),
            );
        }

        let sweeper = StaleSweeper::new(
            self.store.clone(),
            self.config.retry_policy(),
            Duration::from_millis(self.config.stale_after_ms),
            Duration::from_millis(self.config.relay_grace_ms),
            Duration::from_millis(self.config.sweep_interval_ms),
        );
        tasks.spawn(
            "stale_sweeper",
            TaskKind::Periodic,
            sweeper.run(tasks.shutdown_token()),
        );

        tasks.log_summary();
        tasks
    }
}
