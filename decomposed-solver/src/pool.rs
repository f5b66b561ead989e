//! A fixed-size pool of worker threads with two priority tiers.
//!
//! Submissions go through one unbounded crossbeam channel per tier.
//! Workers always drain the high-priority channel before looking at
//! the low-priority one.  Closing the pool drops both senders: workers
//! finish whatever is queued, then exit.  `shutdown_now` also purges
//! queued tasks and hands them back to the caller, but never
//! interrupts a task that is already running.
use crate::Priority;
use crate::SchedulerError;
use crossbeam_channel::select;
use crossbeam_channel::unbounded;
use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::thread;
use std::thread::JoinHandle;
use tracing::debug;
use tracing::warn;

struct Senders<T> {
    high: Sender<T>,
    low: Sender<T>,
}

pub struct WorkerPool<T: Send + 'static> {
    senders: Mutex<Option<Senders<T>>>,
    high: Receiver<T>,
    low: Receiver<T>,
    closed: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Spawns `threads` workers that call `handler` on every task.
    ///
    /// # Panics
    ///
    /// Panics if `threads` is 0, or if the OS refuses to spawn a
    /// thread.
    pub fn new<H>(threads: usize, handler: H) -> Self
    where
        H: Fn(T) + Send + Sync + 'static,
    {
        assert!(threads > 0, "worker pools need at least one thread");

        let (high_tx, high_rx) = unbounded();
        let (low_tx, low_rx) = unbounded();
        let handler = Arc::new(handler);

        let workers = (0..threads)
            .map(|index| {
                let high = high_rx.clone();
                let low = low_rx.clone();
                let handler = handler.clone();

                thread::Builder::new()
                    .name(format!("dsolver-worker-{}", index))
                    .spawn(move || work(&high, &low, &*handler))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self {
            senders: Mutex::new(Some(Senders {
                high: high_tx,
                low: low_tx,
            })),
            high: high_rx,
            low: low_rx,
            closed: AtomicBool::new(false),
            workers: Mutex::new(workers),
        }
    }

    /// Queues `task` in the `priority` tier.
    ///
    /// # Errors
    ///
    /// Returns `Err` once the pool is closed.
    pub fn execute(&self, task: T, priority: Priority) -> Result<(), SchedulerError> {
        let senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        let senders = senders.as_ref().ok_or(SchedulerError::PoolClosed)?;
        let sender = match priority {
            Priority::High => &senders.high,
            Priority::Low => &senders.low,
        };

        // Workers hold the receivers until they exit, which only
        // happens after the senders are gone.
        sender.send(task).map_err(|_| SchedulerError::PoolClosed)
    }

    /// Stops accepting tasks.  Queued and running tasks still
    /// complete.
    pub fn shutdown(&self) {
        let senders = self
            .senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.closed.store(true, Ordering::SeqCst);
        drop(senders);
    }

    /// Stops accepting tasks, and returns every task that was still
    /// queued.  Running tasks are left alone.
    pub fn shutdown_now(&self) -> Vec<T> {
        self.shutdown();

        let mut purged: Vec<T> = self.high.try_iter().collect();
        purged.extend(self.low.try_iter());
        if !purged.is_empty() {
            debug!(count = purged.len(), "purged queued tasks");
        }

        purged
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Waits for every worker to exit.  Only returns once the pool is
    /// shut down and drained, and must not be called from a worker.
    pub fn join(&self) {
        let workers: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        for worker in workers {
            if worker.join().is_err() {
                warn!("worker thread panicked");
            }
        }
    }
}

fn work<T>(high: &Receiver<T>, low: &Receiver<T>, handler: &dyn Fn(T)) {
    loop {
        if let Ok(task) = high.try_recv() {
            handler(task);
            continue;
        }

        let task = select! {
            recv(high) -> task => task,
            recv(low) -> task => task,
        };

        match task {
            Ok(task) => handler(task),
            Err(_) => break,
        }
    }

    // Both senders are dropped together, so once either channel
    // reports disconnection nothing new can arrive.  Finish what is
    // left, most urgent first.
    for task in high.iter().chain(low.iter()) {
        handler(task);
    }
}

#[test]
fn test_runs_everything() {
    use std::sync::atomic::AtomicUsize;

    let count = Arc::new(AtomicUsize::new(0));
    let pool = {
        let count = count.clone();
        WorkerPool::new(3, move |x: usize| {
            count.fetch_add(x, Ordering::SeqCst);
        })
    };

    for i in 1..=100 {
        let priority = if i % 2 == 0 { Priority::High } else { Priority::Low };
        pool.execute(i, priority).expect("ok");
    }

    pool.shutdown();
    assert!(pool.is_shutdown());
    assert!(pool.execute(0, Priority::High).is_err());
    pool.join();
    assert_eq!(count.load(Ordering::SeqCst), 5050);
}

#[test]
fn test_high_priority_first() {
    use crossbeam_channel::bounded;

    // One worker, blocked on a gate while we queue more tasks.
    let (gate_tx, gate_rx) = bounded::<()>(0);
    let (order_tx, order_rx) = unbounded();
    let pool = WorkerPool::new(1, move |name: &'static str| {
        if name == "gate" {
            gate_rx.recv().expect("ok");
        }
        order_tx.send(name).expect("ok");
    });

    pool.execute("gate", Priority::Low).expect("ok");
    // Make sure the worker is stuck on the gate.
    while !pool.low.is_empty() {
        thread::yield_now();
    }

    pool.execute("low", Priority::Low).expect("ok");
    pool.execute("high", Priority::High).expect("ok");
    gate_tx.send(()).expect("ok");

    pool.shutdown();
    pool.join();
    let order: Vec<_> = order_rx.try_iter().collect();
    assert_eq!(order, ["gate", "high", "low"]);
}

#[test]
fn test_shutdown_now_purges() {
    use crossbeam_channel::bounded;

    let (gate_tx, gate_rx) = bounded::<()>(0);
    let (done_tx, done_rx) = unbounded();
    let pool = WorkerPool::new(1, move |x: u32| {
        if x == 0 {
            gate_rx.recv().expect("ok");
        }
        done_tx.send(x).expect("ok");
    });

    pool.execute(0, Priority::Low).expect("ok");
    while !pool.low.is_empty() {
        thread::yield_now();
    }

    for x in 1..=5 {
        pool.execute(x, Priority::Low).expect("ok");
    }
    pool.execute(6, Priority::High).expect("ok");

    let mut purged = pool.shutdown_now();
    purged.sort_unstable();
    assert_eq!(purged, [1, 2, 3, 4, 5, 6]);

    // The running task still completes.
    gate_tx.send(()).expect("ok");
    pool.join();
    assert_eq!(done_rx.try_iter().collect::<Vec<_>>(), [0]);
}
