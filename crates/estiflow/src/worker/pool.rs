//! Worker pool: bounded queue, one job per worker at a time. Parallelism is
//! across distinct job ids; the lease set guarantees a single job id is never
//! run twice concurrently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info};

use crate::error::WorkerError;
use crate::job::spec::JobSpec;
use crate::pipeline::{Pipeline, PipelineResult};
use crate::worker::job::{DispatchHandle, QueuedJob};
use crate::worker::lease::JobLeases;

pub struct WorkerPool {
    job_sender: Sender<QueuedJob>,
    result_receiver: Receiver<PipelineResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    leases: Arc<JobLeases>,
}

impl WorkerPool {
    /// Starts `worker_count` workers over a shared pipeline.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn new(pipeline: Arc<Pipeline>, worker_count: usize) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (job_sender, job_receiver) = bounded::<QueuedJob>(worker_count * 2);
        let (result_sender, result_receiver) = bounded::<PipelineResult>(worker_count * 2);
        let shutdown = Arc::new(AtomicBool::new(false));
        let leases = JobLeases::new();

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_pipeline = Arc::clone(&pipeline);
            let worker_leases = Arc::clone(&leases);

            let handle = thread::spawn(move || {
                run_worker(
                    worker_id,
                    job_rx,
                    result_tx,
                    shutdown_flag,
                    worker_pipeline,
                    worker_leases,
                );
            });
            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Self {
            job_sender,
            result_receiver,
            workers,
            shutdown,
            leases,
        }
    }

    /// Enqueues a job. Rejects immediately when the same job id is already
    /// live, the queue is full, or the pool is shutting down.
    pub fn submit(&self, job: JobSpec) -> Result<DispatchHandle, WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }
        // Early rejection for live job ids; the worker re-checks under the
        // lease, so a race here only costs one queue slot.
        if self.leases.is_held(&job.job_id) {
            return Err(WorkerError::JobAlreadyRunning(job.job_id));
        }

        let handle = DispatchHandle::new(&job.job_id);
        let queued = QueuedJob {
            job,
            dispatch_id: handle.dispatch_id.clone(),
        };
        self.job_sender.try_send(queued).map_err(|e| match e {
            crossbeam_channel::TrySendError::Full(_) => WorkerError::QueueFull,
            crossbeam_channel::TrySendError::Disconnected(_) => WorkerError::ChannelClosed,
        })?;
        Ok(handle)
    }

    pub fn try_recv_result(&self) -> Option<PipelineResult> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_result(&self) -> Option<PipelineResult> {
        self.result_receiver.recv().ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<QueuedJob>,
    result_sender: Sender<PipelineResult>,
    shutdown: Arc<AtomicBool>,
    pipeline: Arc<Pipeline>,
    leases: Arc<JobLeases>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(queued) => {
                debug!(
                    "Worker {} picked up job {} (dispatch {})",
                    worker_id, queued.job.job_id, queued.dispatch_id
                );

                let result = match leases.try_acquire(&queued.job.job_id) {
                    Some(_lease) => pipeline.run(&queued.job),
                    None => PipelineResult::rejected(
                        &queued.job.job_id,
                        WorkerError::JobAlreadyRunning(queued.job.job_id.clone()).to_string(),
                    ),
                };

                if let Err(e) = result_sender.send(result) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::FakeCrm;
    use crate::job::spec::{Customer, LineItem, Project, ProjectSource};
    use crate::notify::Notifier;
    use crate::portal::StubPortal;
    use tempfile::TempDir;

    fn sample_job(job_id: &str) -> JobSpec {
        JobSpec {
            job_id: job_id.to_string(),
            customer: Customer {
                name: "Acme".to_string(),
                email: None,
                phone: None,
                address: None,
                crm_key: None,
                metadata: None,
            },
            project: Project {
                site: "Site".to_string(),
                due_date: None,
                source: ProjectSource::Manual,
            },
            line_items: vec![LineItem {
                room: "Warehouse".to_string(),
                opening: "dock".to_string(),
                size: "10x10".to_string(),
                qty: 1,
                spec: "PVC liner".to_string(),
                price: None,
            }],
            attachments: None,
            tags: None,
        }
    }

    fn test_pipeline(tmp: &TempDir) -> Arc<Pipeline> {
        Arc::new(Pipeline::new(
            tmp.path().join("runs"),
            tmp.path().join("filestore"),
            Arc::new(FakeCrm::new()),
            Arc::new(StubPortal::new()),
            Notifier::disabled(),
        ))
    }

    #[test]
    fn test_pool_processes_submitted_jobs() {
        let tmp = TempDir::new().unwrap();
        let pool = WorkerPool::new(test_pipeline(&tmp), 2);

        let handle = pool.submit(sample_job("J-20260805-010")).unwrap();
        assert_eq!(handle.job_id, "J-20260805-010");

        let result = pool.recv_result().expect("worker result");
        assert!(result.ok, "pipeline failed: {:?}", result.error);
        assert_eq!(result.job_id, "J-20260805-010");

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_pool_runs_distinct_jobs_in_parallel() {
        let tmp = TempDir::new().unwrap();
        let pool = WorkerPool::new(test_pipeline(&tmp), 2);

        pool.submit(sample_job("J-20260805-011")).unwrap();
        pool.submit(sample_job("J-20260805-012")).unwrap();

        let first = pool.recv_result().unwrap();
        let second = pool.recv_result().unwrap();
        assert!(first.ok && second.ok);
        assert_ne!(first.job_id, second.job_id);

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_submit_after_shutdown_rejected() {
        let tmp = TempDir::new().unwrap();
        let pool = WorkerPool::new(test_pipeline(&tmp), 1);
        pool.shutdown();

        let err = pool.submit(sample_job("J-20260805-013")).unwrap_err();
        assert!(matches!(err, WorkerError::ChannelClosed));
        pool.wait();
    }
}
