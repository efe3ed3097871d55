//! Parallel execution of build tasks
//!
//! A fixed number of workers drain one shared queue of tasks. Every worker
//! runs one task at a time with its share of the make job budget; a task
//! that errors or panics is turned into a failed report and the worker moves
//! on to the next task.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use crate::matrix::{Abbreviations, BuildTask};
use crate::{Error, Result};

use super::command_logger::LogCallback;
use super::progress::BuildProgress;
use super::report::TaskReport;

/// How the total job budget is split across workers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobPartition {
    /// Number of concurrently running tasks
    pub workers: usize,
    /// `make -j` value handed to each task
    pub jobs_per_worker: usize,
}

/// Split `total_jobs` across up to `threads` workers.
///
/// When the budget is too small to give each of `threads` workers at least
/// `threads` jobs, fewer workers run with one job each.
pub fn partition_jobs(total_jobs: usize, threads: usize) -> JobPartition {
    let threads = threads.max(1);
    let per_worker = (total_jobs / threads).max(1);
    if per_worker < threads {
        JobPartition {
            workers: per_worker,
            jobs_per_worker: 1,
        }
    } else {
        JobPartition {
            workers: threads,
            jobs_per_worker: per_worker,
        }
    }
}

/// Runs tasks on a pool of workers
pub struct ParallelExecutor {
    partition: JobPartition,
    abbrevs: Arc<Abbreviations>,
}

impl ParallelExecutor {
    pub fn new(partition: JobPartition, abbrevs: Arc<Abbreviations>) -> Self {
        Self { partition, abbrevs }
    }

    /// Run every task with `run` and return one report per task.
    ///
    /// `run` receives the task, its job budget and a callback for output
    /// lines. Returns once every worker has drained the queue.
    pub fn execute<F, Fut>(&self, tasks: Vec<BuildTask>, progress: &BuildProgress, run: F) -> Result<Vec<TaskReport>>
    where
        F: Fn(BuildTask, usize, LogCallback) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TaskReport>> + Send + 'static,
    {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.partition.workers)
            .enable_all()
            .build()
            .map_err(|e| Error::build(format!("Failed to create async runtime: {}", e), ""))?;

        rt.block_on(self.execute_async(tasks, progress, run))
    }

    async fn execute_async<F, Fut>(
        &self,
        tasks: Vec<BuildTask>,
        progress: &BuildProgress,
        run: F,
    ) -> Result<Vec<TaskReport>>
    where
        F: Fn(BuildTask, usize, LogCallback) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TaskReport>> + Send + 'static,
    {
        let total = tasks.len();

        // The queue is filled and closed before any worker starts
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        for task in tasks {
            queue_tx
                .send(task)
                .map_err(|_| Error::build("Task queue closed unexpectedly", "This is likely a bug in llvmbuild"))?;
        }
        drop(queue_tx);
        let queue = Arc::new(Mutex::new(queue_rx));

        let (result_tx, mut result_rx) = mpsc::unbounded_channel();
        let worker = Arc::new(Worker {
            run,
            abbrevs: self.abbrevs.clone(),
            progress: progress.clone(),
            jobs: self.partition.jobs_per_worker,
        });

        tracing::debug!(
            "Starting {} workers with -j{} each for {} tasks",
            self.partition.workers,
            self.partition.jobs_per_worker,
            total
        );

        let handles: Vec<_> = (0..self.partition.workers)
            .map(|id| {
                let worker = worker.clone();
                let queue = queue.clone();
                let results = result_tx.clone();
                tokio::spawn(async move { worker.drain(id, queue, results).await })
            })
            .collect();
        drop(result_tx);

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Worker stopped unexpectedly: {}", e);
            }
        }

        let mut reports = Vec::with_capacity(total);
        while let Some(report) = result_rx.recv().await {
            reports.push(report);
        }
        Ok(reports)
    }
}

struct Worker<F> {
    run: F,
    abbrevs: Arc<Abbreviations>,
    progress: BuildProgress,
    jobs: usize,
}

impl<F, Fut> Worker<F>
where
    F: Fn(BuildTask, usize, LogCallback) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<TaskReport>> + Send + 'static,
{
    async fn drain(
        &self,
        id: usize,
        queue: Arc<Mutex<mpsc::UnboundedReceiver<BuildTask>>>,
        results: mpsc::UnboundedSender<TaskReport>,
    ) {
        loop {
            let next = queue.lock().await.recv().await;
            let Some(task) = next else {
                tracing::debug!("Worker {} finished", id);
                break;
            };

            let report = self.run_one(task).await;
            if results.send(report).is_err() {
                break;
            }
        }
    }

    async fn run_one(&self, task: BuildTask) -> TaskReport {
        let label = match self.abbrevs.task_label(&task) {
            Ok(label) => label,
            Err(e) => {
                let label = task.source.to_string();
                tracing::error!("[{}] Build aborted: {}", label, e);
                self.progress.fail_task(&label, &e.to_string());
                return TaskReport::aborted(&task, label, e.to_string());
            }
        };
        self.progress.start_task(&label);

        let log_callback: LogCallback = {
            let progress = self.progress.clone();
            let label = label.clone();
            Arc::new(move |line: &str| progress.update_task_log(&label, line))
        };

        // A separate task so a panic surfaces as a JoinError
        let report = match tokio::spawn((self.run)(task.clone(), self.jobs, log_callback)).await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                tracing::error!("[{}] Build aborted: {}", label, e);
                TaskReport::aborted(&task, &label, e.to_string())
            }
            Err(e) => {
                tracing::error!("[{}] Build panicked: {}", label, e);
                TaskReport::aborted(&task, &label, format!("Task panicked: {}", e))
            }
        };

        match report.failure_summary() {
            None => self.progress.finish_task(&label),
            Some(cause) => self.progress.fail_task(&label, &cause),
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Flavor;
    use crate::matrix::{enumerate_tasks, tests::configuration};
    use chrono::Utc;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_partition_splits_budget() {
        assert_eq!(
            partition_jobs(8, 2),
            JobPartition {
                workers: 2,
                jobs_per_worker: 4
            }
        );
        assert_eq!(
            partition_jobs(16, 4),
            JobPartition {
                workers: 4,
                jobs_per_worker: 4
            }
        );
    }

    #[test]
    fn test_partition_small_budget_reduces_workers() {
        assert_eq!(
            partition_jobs(8, 4),
            JobPartition {
                workers: 2,
                jobs_per_worker: 1
            }
        );
        assert_eq!(
            partition_jobs(1, 8),
            JobPartition {
                workers: 1,
                jobs_per_worker: 1
            }
        );
    }

    #[test]
    fn test_partition_zero_threads() {
        assert_eq!(partition_jobs(4, 0).workers, 1);
    }

    fn executor(sources: &[&str], workers: usize) -> (ParallelExecutor, Vec<BuildTask>) {
        let config = configuration(sources, &[], &[Flavor::Debug, Flavor::Release]);
        let abbrevs = Abbreviations::resolve(&config).unwrap();
        let tasks = enumerate_tasks(&config);
        let partition = JobPartition {
            workers,
            jobs_per_worker: 3,
        };
        (ParallelExecutor::new(partition, Arc::new(abbrevs)), tasks)
    }

    fn ok_report(task: &BuildTask, label: String) -> TaskReport {
        let now = Utc::now();
        TaskReport {
            label,
            source: task.source.clone(),
            branch: task.branch.clone(),
            flavor: task.flavor,
            install_dir: None,
            components: Vec::new(),
            error: None,
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn test_every_task_reported_once() {
        let (executor, tasks) = executor(&["/s/alpha", "/s/beta", "/s/gamma"], 2);
        let progress = BuildProgress::hidden(tasks.len());

        let reports = executor
            .execute(tasks.clone(), &progress, |task, jobs, _log| async move {
                assert_eq!(jobs, 3);
                let label = format!("{}:{}", task.source, task.flavor);
                Ok(ok_report(&task, label))
            })
            .unwrap();

        assert_eq!(reports.len(), tasks.len());
        let labels: HashSet<_> = reports.iter().map(|r| r.label.clone()).collect();
        assert_eq!(labels.len(), tasks.len());
        assert_eq!(progress.completed(), tasks.len() as u64);
    }

    #[test]
    fn test_failures_are_isolated() {
        let (executor, tasks) = executor(&["/s/alpha", "/s/beta"], 1);
        let progress = BuildProgress::hidden(tasks.len());

        let reports = executor
            .execute(tasks.clone(), &progress, |task, _jobs, _log| async move {
                if task.source.as_str() == "/s/alpha" && task.flavor == Flavor::Debug {
                    return Err(Error::tool_missing("make", "install make"));
                }
                if task.source.as_str() == "/s/beta" && task.flavor == Flavor::Debug {
                    panic!("boom");
                }
                Ok(ok_report(&task, "ok".to_string()))
            })
            .unwrap();

        assert_eq!(reports.len(), 4);
        let failed: Vec<_> = reports.iter().filter(|r| !r.succeeded()).collect();
        assert_eq!(failed.len(), 2);
        assert!(failed.iter().any(|r| r.label == "alp/dbg"));
        assert!(
            failed
                .iter()
                .any(|r| r.label == "bet/dbg" && r.error.as_deref().unwrap_or("").contains("panicked"))
        );
    }

    fn max_in_flight(workers: usize) -> usize {
        let (executor, tasks) = executor(&["/s/alpha", "/s/beta", "/s/gamma", "/s/delta"], workers);
        let progress = BuildProgress::hidden(tasks.len());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let reports = executor
            .execute(tasks, &progress, {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                move |task: BuildTask, _jobs: usize, _log: LogCallback| {
                    let in_flight = in_flight.clone();
                    let peak = peak.clone();
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok(ok_report(&task, "ok".to_string()))
                    }
                }
            })
            .unwrap();

        assert_eq!(reports.len(), 8);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
        peak.load(Ordering::SeqCst)
    }

    #[test]
    fn test_running_tasks_bounded_by_workers() {
        assert_eq!(max_in_flight(1), 1);

        let peak = max_in_flight(3);
        assert!((1..=3).contains(&peak), "{} tasks ran at once with 3 workers", peak);
    }
}
