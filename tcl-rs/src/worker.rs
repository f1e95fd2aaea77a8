//! An interpreter on its own OS thread, driven from async code.
//!
//! The worker thread builds the [`Interpreter`] itself, so thread-affine
//! engines never leave the thread that created them. Requests travel over a
//! bounded channel and each reply comes back on a `oneshot`.
//!
//! ```text
//!  async caller ──Job──▶ [queue] ──▶ worker thread (owns Interpreter<E>)
//!       ▲                                   │
//!       └────────── oneshot reply ──────────┘
//! ```
//!
//! A deadline only bounds how long the caller waits. The engine cannot be
//! interrupted, so a timed-out script keeps running and later requests queue
//! behind it.

use std::marker::PhantomData;
use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::coerce::FromObj;
use crate::config::InterpreterConfig;
use crate::engine::builtin::BuiltinEngine;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::format::Args;
use crate::interp::Interpreter;

const QUEUE_DEPTH: usize = 64;

type Job<E> = Box<dyn FnOnce(&Interpreter<E>) + Send>;

pub struct Worker<E: Engine + 'static = BuiltinEngine> {
    jobs: mpsc::Sender<Job<E>>,
    thread: JoinHandle<()>,
    _engine: PhantomData<fn() -> E>,
}

impl<E: Engine + 'static> Worker<E> {
    /// Start the worker thread and wait until its interpreter is ready.
    ///
    /// Construction errors (init script, rc file, engine init) are returned
    /// here and the thread exits.
    pub fn spawn(config: InterpreterConfig) -> Result<Self> {
        let (jobs, mut queue) = mpsc::channel::<Job<E>>(QUEUE_DEPTH);
        let (ready_tx, ready_rx) = std_mpsc::sync_channel::<Result<()>>(1);

        let thread = thread::Builder::new()
            .name("tclbind-worker".to_owned())
            .spawn(move || {
                let interp = match Interpreter::<E>::with_config(&config) {
                    Ok(interp) => {
                        let _ = ready_tx.send(Ok(()));
                        interp
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                debug!("worker started");
                while let Some(job) = queue.blocking_recv() {
                    job(&interp);
                }
                debug!("worker stopped");
            })
            .map_err(|e| Error::Init(format!("cannot start worker thread: {e}")))?;

        ready_rx.recv().map_err(|_| Error::WorkerGone)??;
        Ok(Worker {
            jobs,
            thread,
            _engine: PhantomData,
        })
    }

    /// Run `f` on the worker thread and wait for its result.
    async fn call<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Interpreter<E>) -> Result<T> + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let job: Job<E> = Box::new(move |interp| {
            // The caller may have stopped waiting.
            let _ = reply.send(f(interp));
        });
        self.jobs.send(job).await.map_err(|_| Error::WorkerGone)?;
        rx.await.map_err(|_| Error::WorkerGone)?
    }

    pub async fn eval(&self, template: &str, args: impl Into<Args>) -> Result<()> {
        let template = template.to_owned();
        let args = args.into();
        self.call(move |interp| interp.eval(&template, args)).await
    }

    pub async fn eval_bytes(&self, script: impl Into<Vec<u8>>) -> Result<()> {
        let script = script.into();
        self.call(move |interp| interp.eval_bytes(&script)).await
    }

    pub async fn eval_as<T>(&self, template: &str, args: impl Into<Args>) -> Result<T>
    where
        T: FromObj + Send + 'static,
    {
        let template = template.to_owned();
        let args = args.into();
        self.call(move |interp| interp.eval_as(&template, args)).await
    }

    /// As [`eval`](Self::eval), but give up waiting after `deadline`.
    pub async fn eval_with_deadline(
        &self,
        template: &str,
        args: impl Into<Args>,
        deadline: Duration,
    ) -> Result<()> {
        match tokio::time::timeout(deadline, self.eval(template, args)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(?deadline, "worker evaluation missed its deadline");
                Err(Error::Timeout(deadline))
            }
        }
    }

    /// Stop accepting requests, let queued jobs finish and join the thread.
    ///
    /// Blocks the calling thread until the worker exits.
    pub fn shutdown(self) -> Result<()> {
        let Worker { jobs, thread, .. } = self;
        drop(jobs);
        thread.join().map_err(|_| Error::WorkerGone)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
