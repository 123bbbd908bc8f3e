//! Worker pool scheduler.
//!
//! The pool starts with `min_threads` workers and grows by one worker per
//! submission while the backlog exceeds the idle workers, up to
//! `max_threads`. A worker that waits `idle_timeout` without finding work
//! exits if the pool is above its minimum.
//!
//! Lock order is queue, then workers. Every path that holds both takes them
//! in that order.

use std::collections::{HashSet, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, error};

use crate::config::PoolConfig;
use crate::error::PoolError;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    shared: Arc<Shared>,
}

struct Shared {
    min_threads: usize,
    max_threads: usize,
    idle_timeout: Duration,
    queue: Mutex<Queue>,
    workers: Mutex<Workers>,
    /// Paired with `queue`.
    available: Condvar,
}

#[derive(Default)]
struct Queue {
    tasks: VecDeque<Task>,
    shutdown: bool,
}

#[derive(Default)]
struct Workers {
    live: HashSet<usize>,
    idle: usize,
    next_id: usize,
}

impl WorkerPool {
    /// Starts `min_threads` idle workers.
    pub fn new(
        min_threads: usize,
        max_threads: usize,
        idle_timeout: Duration,
    ) -> Result<Self, PoolError> {
        if max_threads == 0 || min_threads > max_threads {
            return Err(PoolError::InvalidBounds {
                min: min_threads,
                max: max_threads,
            });
        }

        let shared = Arc::new(Shared {
            min_threads,
            max_threads,
            idle_timeout,
            queue: Mutex::new(Queue::default()),
            workers: Mutex::new(Workers::default()),
            available: Condvar::new(),
        });

        {
            let mut workers = shared.lock_workers();
            for _ in 0..min_threads {
                spawn_worker(&shared, &mut workers)?;
            }
        }
        debug!(min_threads, max_threads, ?idle_timeout, "worker pool started");

        Ok(Self { shared })
    }

    pub fn from_config(config: &PoolConfig) -> Result<Self, PoolError> {
        Self::new(config.min_threads, config.max_threads, config.idle_timeout())
    }

    /// Queues a task and grows the pool if the backlog outruns idle workers.
    /// Never blocks on task execution.
    pub fn submit<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut queue = self.shared.lock_queue();
            if queue.shutdown {
                return Err(PoolError::ShutDown);
            }
            queue.tasks.push_back(Box::new(task));

            let mut workers = self.shared.lock_workers();
            if workers.idle < queue.tasks.len() && workers.live.len() < self.shared.max_threads {
                spawn_worker(&self.shared, &mut workers)?;
            }
        }

        self.shared.available.notify_one();
        Ok(())
    }

    pub fn live_workers(&self) -> usize {
        self.shared.lock_workers().live.len()
    }

    pub fn idle_workers(&self) -> usize {
        self.shared.lock_workers().idle
    }

    pub fn queued(&self) -> usize {
        self.shared.lock_queue().tasks.len()
    }

    pub fn min_threads(&self) -> usize {
        self.shared.min_threads
    }

    pub fn max_threads(&self) -> usize {
        self.shared.max_threads
    }

    /// Drops queued tasks and tells every worker to exit. Running tasks are
    /// not interrupted; whatever is still running when the process exits is
    /// abandoned.
    pub fn shutdown(&self) {
        let dropped = {
            let mut queue = self.shared.lock_queue();
            queue.shutdown = true;
            std::mem::take(&mut queue.tasks).len()
        };
        self.shared.available.notify_all();
        debug!(dropped, "worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    fn lock_queue(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_workers(&self) -> MutexGuard<'_, Workers> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Spawns a detached worker that starts out idle. The caller holds the
/// workers lock.
fn spawn_worker(shared: &Arc<Shared>, workers: &mut Workers) -> Result<(), PoolError> {
    let id = workers.next_id;
    let worker_shared = Arc::clone(shared);

    thread::Builder::new()
        .name(format!("worker-{id}"))
        .spawn(move || worker_loop(worker_shared, id))
        .map_err(|e| {
            error!(error = %e, "failed to create worker thread");
            PoolError::ResourceExhaustion(e)
        })?;

    workers.next_id += 1;
    workers.live.insert(id);
    workers.idle += 1;
    debug!(worker = id, live = workers.live.len(), "worker added");
    Ok(())
}

fn worker_loop(shared: Arc<Shared>, id: usize) {
    let mut queue = shared.lock_queue();

    loop {
        if let Some(task) = queue.tasks.pop_front() {
            shared.lock_workers().idle -= 1;
            drop(queue);

            run_task(id, task);

            shared.lock_workers().idle += 1;
            queue = shared.lock_queue();
            continue;
        }

        if queue.shutdown {
            retire(&shared, id);
            return;
        }

        let (guard, wait) = shared
            .available
            .wait_timeout(queue, shared.idle_timeout)
            .unwrap_or_else(PoisonError::into_inner);
        queue = guard;

        // A wake-up without a task just loops back to the queue check.
        if wait.timed_out() && queue.tasks.is_empty() && !queue.shutdown {
            let mut workers = shared.lock_workers();
            if workers.live.len() > shared.min_threads {
                workers.live.remove(&id);
                workers.idle -= 1;
                debug!(worker = id, live = workers.live.len(), "idle worker exited");
                return;
            }
        }
    }
}

fn retire(shared: &Shared, id: usize) {
    let mut workers = shared.lock_workers();
    if workers.live.remove(&id) {
        workers.idle -= 1;
    }
    debug!(worker = id, "worker stopped");
}

fn run_task(id: usize, task: Task) {
    if catch_unwind(AssertUnwindSafe(task)).is_err() {
        error!(worker = id, "task panicked");
    }
}
