//! # Task Scheduler
//!
//! Runs the configured `[[tasks]]` on a timer, independently of ingestion.
//! Typical tasks export the stored series and render plots.
//!
//! The scheduler wakes once a second. A task runs when more than its interval
//! has passed since it last ran; a task that never ran is due on the first
//! tick. Commands of a task run one after another through `sh -c`, and the
//! first command that fails ends the task for that round.

use crate::config::ScheduledTask;
use crate::measure::ShutdownHandle;
use log::{debug, error, info};
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct TaskState {
    task: ScheduledTask,
    last_executed: Option<Instant>,
}

/// Whether a task last run at `last` is due at `now`.
pub fn is_due(last: Option<Instant>, now: Instant, interval: Duration) -> bool {
    match last {
        None => true,
        Some(last) => now.saturating_duration_since(last) > interval,
    }
}

#[derive(Debug)]
pub struct TaskScheduler {
    tasks: Vec<TaskState>,
}

impl TaskScheduler {
    pub fn new(tasks: Vec<ScheduledTask>) -> Self {
        TaskScheduler {
            tasks: tasks
                .into_iter()
                .map(|task| TaskState {
                    task,
                    last_executed: None,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Runs every task that is due at `now`. Returns the number of tasks run.
    pub async fn run_due(&mut self, now: Instant) -> usize {
        let mut executed = 0;

        for state in &mut self.tasks {
            if !is_due(state.last_executed, now, state.task.interval) {
                continue;
            }

            debug!("Executing task '{}'", state.task.description);
            run_commands(&state.task.commands).await;
            state.last_executed = Some(now);
            executed += 1;
        }

        executed
    }

    /// Spawns the scheduler. Returns `None` when there is nothing to schedule.
    pub fn start(self) -> Option<SchedulerHandle> {
        if self.is_empty() {
            info!("No tasks scheduled, skipping start of task scheduler");
            return None;
        }

        info!("There are {} tasks scheduled, launching task scheduler", self.len());

        let shutdown = ShutdownHandle::new();
        let stop = shutdown.clone();
        let join = tokio::spawn(self.run(stop));

        Some(SchedulerHandle { shutdown, join })
    }

    async fn run(mut self, shutdown: ShutdownHandle) {
        info!("Entering task scheduler");

        let mut ticker = tokio::time::interval(TICK);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_due(Instant::now()).await;
                }
                _ = shutdown.interrupted() => break,
            }
        }

        info!("Leaving task scheduler");
    }
}

/// Runs `commands` in order, stopping at the first failure.
///
/// Returns `true` when every command succeeded.
pub async fn run_commands(commands: &[String]) -> bool {
    for command in commands {
        debug!("Running '{command}'");

        match Command::new("sh").arg("-c").arg(command).status().await {
            Ok(status) if status.success() => {}
            Ok(status) => {
                error!("Execution of command '{command}' returned non-zero exit status ({status})");
                return false;
            }
            Err(e) => {
                error!("Failed to execute command '{command}': {e}");
                return false;
            }
        }
    }

    true
}

/// Handle to a running scheduler.
pub struct SchedulerHandle {
    shutdown: ShutdownHandle,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops the scheduler. A command that is already running is not killed.
    pub async fn stop(self) {
        self.shutdown.interrupt();
        if let Err(e) = self.join.await {
            error!("Task scheduler terminated abnormally: {e}");
        }
    }
}
