use crate::domain::model::AssignmentJob;
use crate::utils::error::{PortalError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

pub const DEFAULT_WORKERS: usize = 3;
pub const DEFAULT_JOB_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    /// 每份作業模擬處理所需時間
    pub latency: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_JOB_QUEUE_CAPACITY,
            latency: DEFAULT_LATENCY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerReport {
    pub submitted: usize,
    pub completed: usize,
    pub workers: usize,
    pub elapsed: Duration,
}

/// 作業提交排程器：固定數量的 worker 消化有界工作佇列
#[derive(Debug, Default)]
pub struct AssignmentScheduler {
    config: SchedulerConfig,
}

impl AssignmentScheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        if config.workers == 0 {
            return Err(PortalError::InvalidConfigValueError {
                field: "assignments.workers".to_string(),
                value: "0".to_string(),
                reason: "at least one worker is required".to_string(),
            });
        }
        if config.queue_capacity == 0 {
            return Err(PortalError::InvalidConfigValueError {
                field: "assignments.queue_capacity".to_string(),
                value: "0".to_string(),
                reason: "queue capacity must be at least 1".to_string(),
            });
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// 提交 `n` 份作業並等待全部處理完成
    pub async fn run(&self, n: usize) -> Result<SchedulerReport> {
        self.run_with(n, |_, _| {}).await
    }

    /// 同 [`run`](Self::run)，每份作業完成時以 (worker, job) 呼叫 `on_complete`
    pub async fn run_with<F>(&self, n: usize, on_complete: F) -> Result<SchedulerReport>
    where
        F: Fn(usize, AssignmentJob) + Send + Sync + 'static,
    {
        let start = Instant::now();
        let workers = self.config.workers;

        if n == 0 {
            debug!("No assignments to submit");
            return Ok(SchedulerReport {
                submitted: 0,
                completed: 0,
                workers,
                elapsed: start.elapsed(),
            });
        }

        info!(assignments = n, workers, "📝 Submitting assignments");

        let (tx, rx) = mpsc::channel::<AssignmentJob>(self.config.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));
        let completed = Arc::new(AtomicUsize::new(0));
        let on_complete = Arc::new(on_complete);

        let feeder = tokio::spawn(async move {
            for index in 0..n {
                if tx.send(AssignmentJob(index)).await.is_err() {
                    break;
                }
            }
        });

        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let completed = Arc::clone(&completed);
                let on_complete = Arc::clone(&on_complete);
                let latency = self.config.latency;
                tokio::spawn(async move {
                    loop {
                        let next = { rx.lock().await.recv().await };
                        let Some(job) = next else {
                            break;
                        };
                        tokio::time::sleep(latency).await;
                        completed.fetch_add(1, Ordering::SeqCst);
                        on_complete(worker, job);
                        debug!(worker, assignment = job.0, "Assignment submitted");
                    }
                })
            })
            .collect();
        drop(rx);

        feeder.await?;
        for handle in handles {
            handle.await?;
        }

        let report = SchedulerReport {
            submitted: n,
            completed: completed.load(Ordering::SeqCst),
            workers,
            elapsed: start.elapsed(),
        };

        info!(
            completed = report.completed,
            elapsed = ?report.elapsed,
            "✅ All assignments submitted"
        );

        Ok(report)
    }
}
