// src/tasks/scheduler.rs

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// A periodic unit of background work.
#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    /// Wait before the first run.
    fn delay(&self) -> Duration;

    /// Time between the starts of consecutive runs.
    fn period(&self) -> Duration;

    /// One tick. Long runs should check `cancel` between work items.
    async fn run(&self, cancel: &CancellationToken);
}

/// Owns one timer loop per registered job and a shared cancellation signal.
///
/// Constructed by the process entry point; `stop()` returns only after every
/// job loop has exited.
pub struct Scheduler {
    cancel: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Start `job` on its own task.
    pub async fn register(&self, job: Arc<dyn Job>) {
        let handle = spawn_job_loop(job, self.cancel.clone());
        self.handles.lock().await.push(handle);
    }

    /// Signal every loop to stop and wait for all of them.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handles: Vec<JoinHandle<()>> = self.handles.lock().await.drain(..).collect();
        info!("Scheduler stopping {} job(s)...", handles.len());
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Job loop ended abnormally: {}", e);
            }
        }
        info!("Scheduler stopped.");
    }
}

fn spawn_job_loop(job: Arc<dyn Job>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = job.name().to_string();
        let period = job.period().max(Duration::from_millis(1));
        info!("Job '{}' scheduled: delay={:?}, period={:?}", name, job.delay(), period);

        let mut ticker = interval_at(Instant::now() + job.delay(), period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if cancel.is_cancelled() {
                break;
            }
            job.run(&cancel).await;
        }
        info!("Job '{}' exited.", name);
    })
}
