//! Thread-pool task queue.
//!
//! Workers pull unit envelopes off a shared channel and send the
//! outcome back on a per-batch reply channel, so concurrent dispatches
//! from different jobs never see each other's results.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info};

use crate::error::WorkerError;
use crate::pipeline::{Unit, UnitExecutor, UnitOutcome};

use super::TaskQueue;

struct Envelope {
    unit: Unit,
    reply: Sender<(Unit, UnitOutcome)>,
}

pub struct WorkerPool {
    task_sender: Mutex<Option<Sender<Envelope>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts `worker_count` threads sharing one executor.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn new(executor: Arc<UnitExecutor>, worker_count: usize) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");

        let (task_sender, task_receiver) = bounded::<Envelope>(worker_count * 2);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let task_rx = task_receiver.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_executor = Arc::clone(&executor);

            workers.push(thread::spawn(move || {
                run_worker(worker_id, task_rx, shutdown_flag, worker_executor);
            }));
        }

        info!("Started {} workers", worker_count);

        Self {
            task_sender: Mutex::new(Some(task_sender)),
            workers: Mutex::new(workers),
            shutdown,
        }
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Drops the task channel and joins all workers. Safe to call more
    /// than once.
    pub fn wait(&self) {
        if let Ok(mut sender) = self.task_sender.lock() {
            sender.take();
        }

        let workers = match self.workers.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => return,
        };
        for (i, worker) in workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

impl TaskQueue for WorkerPool {
    fn dispatch(&self, units: Vec<Unit>) -> Result<Vec<(Unit, UnitOutcome)>, WorkerError> {
        if units.is_empty() {
            return Ok(Vec::new());
        }
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        let sender = self
            .task_sender
            .lock()
            .map_err(|_| WorkerError::ChannelClosed)?
            .as_ref()
            .cloned()
            .ok_or(WorkerError::ChannelClosed)?;

        let expected = units.len();
        let (reply_tx, reply_rx) = bounded::<(Unit, UnitOutcome)>(expected);

        for unit in units {
            sender
                .send(Envelope {
                    unit,
                    reply: reply_tx.clone(),
                })
                .map_err(|_| WorkerError::ChannelClosed)?;
        }
        drop(reply_tx);

        let mut results = Vec::with_capacity(expected);
        for _ in 0..expected {
            results.push(reply_rx.recv().map_err(|_| WorkerError::ChannelClosed)?);
        }
        Ok(results)
    }
}

fn run_worker(
    worker_id: usize,
    task_receiver: Receiver<Envelope>,
    shutdown: Arc<AtomicBool>,
    executor: Arc<UnitExecutor>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match task_receiver.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(envelope) => {
                debug!("Worker {} executing {}", worker_id, envelope.unit.label());
                let outcome = executor.execute(&envelope.unit);
                if envelope.reply.send((envelope.unit, outcome)).is_err() {
                    // The dispatcher gave up on this batch; nothing to do.
                    debug!("Worker {} reply channel closed", worker_id);
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} task channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
