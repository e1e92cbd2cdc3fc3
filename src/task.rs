use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait Spawner: Send + Sync {
    fn spawn(&self, job: Job);
}

/// Runs every job immediately on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineSpawner;

impl Spawner for InlineSpawner {
    fn spawn(&self, job: Job) {
        job();
    }
}

/// Fixed set of worker threads fed through a shared job queue.
pub struct WorkerPool {
    jobs: Sender<Job>,
    stop: Sender<()>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self> {
        let workers = if workers == 0 { 2 } else { workers };
        let (job_tx, job_rx) = unbounded::<Job>();
        let (stop_tx, stop_rx) = unbounded::<()>();

        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let rx_jobs = job_rx.clone();
            let rx_stop = stop_rx.clone();
            let handle = thread::Builder::new()
                .name(format!("comment-section-worker-{index}"))
                .spawn(move || worker(rx_jobs, rx_stop))
                .context("task: spawn worker thread")?;
            handles.push(handle);
        }
        log::info!("task: started {workers} worker threads");

        Ok(Self {
            jobs: job_tx,
            stop: stop_tx,
            handles,
        })
    }

    fn shutdown(&mut self) {
        for _ in &self.handles {
            let _ = self.stop.send(());
        }
        while let Some(handle) = self.handles.pop() {
            let _ = handle.join();
        }
    }
}

impl Spawner for WorkerPool {
    fn spawn(&self, job: Job) {
        if self.jobs.send(job).is_err() {
            log::warn!("task: worker pool is shut down, dropping job");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker(jobs: Receiver<Job>, stop: Receiver<()>) {
    loop {
        crossbeam_channel::select! {
            recv(stop) -> _ => break,
            recv(jobs) -> msg => {
                match msg {
                    Ok(job) => job(),
                    Err(_) => break,
                }
            }
        }
    }
}

/// A cancellable delayed value, re-armed on every `schedule`.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Yields the scheduled value once its quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, due)) if now >= *due => self.pending.take().map(|(value, _)| value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn debouncer_fires_after_quiet_period() {
        let start = Instant::now();
        let mut debounce = Debouncer::new(Duration::from_millis(500));
        debounce.schedule("cat", start);
        assert_eq!(debounce.poll(start + Duration::from_millis(499)), None);
        assert_eq!(debounce.poll(start + Duration::from_millis(500)), Some("cat"));
        assert_eq!(debounce.poll(start + Duration::from_secs(5)), None);
    }

    #[test]
    fn debouncer_rearm_keeps_latest_value() {
        let start = Instant::now();
        let mut debounce = Debouncer::new(Duration::from_millis(500));
        debounce.schedule("cat", start);
        debounce.schedule("cats", start + Duration::from_millis(300));
        assert_eq!(debounce.poll(start + Duration::from_millis(600)), None);
        assert_eq!(
            debounce.poll(start + Duration::from_millis(800)),
            Some("cats")
        );
    }

    #[test]
    fn debouncer_cancel_drops_value() {
        let start = Instant::now();
        let mut debounce = Debouncer::new(Duration::from_millis(10));
        debounce.schedule(1, start);
        debounce.cancel();
        assert!(!debounce.is_pending());
        assert_eq!(debounce.poll(start + Duration::from_secs(1)), None);
    }

    #[test]
    fn worker_pool_runs_jobs() {
        let pool = WorkerPool::new(2).unwrap();
        let (tx, rx) = unbounded();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let counter = counter.clone();
            let tx = tx.clone();
            pool.spawn(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(());
            }));
        }
        for _ in 0..4 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }
}
