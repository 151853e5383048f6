use anyhow::{bail, Context, Result};
use log::trace;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc, Mutex,
    },
    thread,
};

static ACTIVE_JOBS: AtomicUsize = AtomicUsize::new(0);

/// Number of jobs currently executing across all pools.
pub fn active_jobs() -> usize {
    ACTIVE_JOBS.load(Ordering::Relaxed)
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size worker pool fed by an unbounded submission queue: once every
/// worker is busy, jobs wait in the channel with no depth limit and no
/// rejection.
pub struct ThreadPool {
    workers: Vec<Worker>,
    sender: Option<mpsc::Sender<Job>>,
}

impl ThreadPool {
    pub fn new(size: usize) -> Result<ThreadPool> {
        if size == 0 {
            bail!("worker pool size must be greater than zero");
        }

        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            workers.push(Worker::new(id, Arc::clone(&receiver))?);
        }

        Ok(ThreadPool {
            workers,
            sender: Some(sender),
        })
    }

    pub fn execute<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .context("worker pool has been shut down")?;

        if sender.send(Box::new(f)).is_err() {
            bail!("all workers have exited, job dropped");
        }

        Ok(())
    }
}

impl Drop for ThreadPool {
    /// Closes the queue and joins every worker, so jobs already submitted
    /// run to completion before the pool goes away.
    fn drop(&mut self) {
        drop(self.sender.take());

        for worker in self.workers.drain(..) {
            trace!("shutting down worker {}", worker.id);
            if worker.thread.join().is_err() {
                trace!("worker {} panicked before shutdown", worker.id);
            }
        }
    }
}

struct Worker {
    id: usize,
    thread: thread::JoinHandle<()>,
}

impl Worker {
    fn new(id: usize, receiver: Arc<Mutex<mpsc::Receiver<Job>>>) -> Result<Worker> {
        let builder = thread::Builder::new();
        let thread = builder.spawn(move || loop {
            let job = receiver
                .lock()
                .expect("failed to acquire lock on receiver")
                .recv();

            // recv errors once the pool drops the sender
            let Ok(job) = job else {
                break;
            };

            trace!("worker {id} got a job; executing.");
            ACTIVE_JOBS.fetch_add(1, Ordering::Relaxed);
            job();
            ACTIVE_JOBS.fetch_sub(1, Ordering::Relaxed);
        })?;

        Ok(Worker { id, thread })
    }
}
