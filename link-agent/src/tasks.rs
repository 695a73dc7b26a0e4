//! Background task management
//!
//! Every long-running piece of the agent runs as a registered task:
//!
//! - [`TaskKind::Supervisor`] - the cloud connection supervisor
//! - [`TaskKind::Worker`] - queue consumers
//! - [`TaskKind::Periodic`] - timer-driven producers
//!
//! A task spawned with [`BackgroundTasks::spawn_fallible`] stops the agent when
//! it returns an error: the error is kept as a [`TaskFailure`] and the shared
//! token is cancelled, which every other task watches.

use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Supervisor,
    Worker,
    Periodic,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Supervisor => write!(f, "Supervisor"),
            TaskKind::Worker => write!(f, "Worker"),
            TaskKind::Periodic => write!(f, "Periodic"),
        }
    }
}

/// First error returned by a fallible task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: &'static str,
    pub error: String,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.task, self.error)
    }
}

struct RegisteredTask {
    name: &'static str,
    kind: TaskKind,
    handle: JoinHandle<()>,
}

/// Owns the agent's tasks and their shared cancellation token
///
/// ```ignore
/// let mut tasks = BackgroundTasks::new();
/// let token = tasks.shutdown_token();
///
/// tasks.spawn_fallible("supervisor", TaskKind::Supervisor, supervisor.run(token.clone()));
/// tasks.spawn("heartbeat", TaskKind::Periodic, run_heartbeat(link, interval, token));
///
/// tasks.stopped().await;
/// tasks.shutdown().await;
/// ```
pub struct BackgroundTasks {
    tasks: Vec<RegisteredTask>,
    shutdown: CancellationToken,
    failure: Arc<Mutex<Option<TaskFailure>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            shutdown: CancellationToken::new(),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Token the tasks watch for shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Start `future` as a named task that cannot fail
    pub fn spawn<F>(&mut self, name: &'static str, kind: TaskKind, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn_fallible(name, kind, async move {
            future.await;
            Ok::<(), Infallible>(())
        });
    }

    /// Start `future` as a named task whose error stops the agent
    ///
    /// Panics are caught and logged. Returning `Ok` before shutdown is logged
    /// as unexpected.
    pub fn spawn_fallible<F, E>(&mut self, name: &'static str, kind: TaskKind, future: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        let failure = self.failure.clone();

        let handle = tokio::spawn(async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(Ok(())) if shutdown.is_cancelled() => {}
                Ok(Ok(())) => {
                    tracing::warn!(task = %name, kind = %kind, "Background task completed unexpectedly");
                }
                Ok(Err(e)) => {
                    tracing::error!(task = %name, kind = %kind, error = %e, "Background task failed, stopping agent");
                    failure.lock().get_or_insert_with(|| TaskFailure {
                        task: name,
                        error: e.to_string(),
                    });
                    shutdown.cancel();
                }
                Err(panic) => {
                    tracing::error!(
                        task = %name,
                        kind = %kind,
                        panic = %panic_message(panic.as_ref()),
                        "Background task panicked"
                    );
                }
            }
        });

        tracing::debug!(task = %name, kind = %kind, "Registered background task");
        self.tasks.push(RegisteredTask { name, kind, handle });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// First task error, if any task failed
    pub fn failure(&self) -> Option<TaskFailure> {
        self.failure.lock().clone()
    }

    /// Resolves once a task fails or shutdown starts
    pub async fn stopped(&self) {
        self.shutdown.cancelled().await;
    }

    pub fn log_summary(&self) {
        let count = |kind| self.tasks.iter().filter(|t| t.kind == kind).count();
        tracing::info!(
            total = self.tasks.len(),
            supervisor = count(TaskKind::Supervisor),
            worker = count(TaskKind::Worker),
            periodic = count(TaskKind::Periodic),
            "Background tasks registered"
        );
    }

    /// Number of tasks that have stopped; each one is logged
    pub fn check_health(&self) -> usize {
        let stopped: Vec<&RegisteredTask> =
            self.tasks.iter().filter(|t| t.handle.is_finished()).collect();

        for task in &stopped {
            tracing::error!(task = %task.name, kind = %task.kind, "Background task unexpectedly finished");
        }
        if !stopped.is_empty() {
            tracing::error!(
                failed = stopped.len(),
                total = self.tasks.len(),
                "Background task health check failed"
            );
        }
        stopped.len()
    }

    /// Cancel every task and wait for them to finish
    pub async fn shutdown(self) {
        tracing::info!(count = self.tasks.len(), "Stopping background tasks");
        self.shutdown.cancel();

        for task in self.tasks {
            match task.handle.await {
                Ok(()) => tracing::debug!(task = %task.name, "Task stopped"),
                Err(e) if e.is_cancelled() => tracing::debug!(task = %task.name, "Task cancelled"),
                Err(e) => tracing::error!(task = %task.name, error = ?e, "Task join failed"),
            }
        }

        tracing::info!("All background tasks stopped");
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
