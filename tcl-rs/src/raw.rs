//! Unlocked handle around one engine instance.
//!
//! [`RawInterp`] owns the engine, remembers the thread that created it and
//! keeps a reusable script buffer for template expansion. It does no locking
//! of its own; [`crate::Interpreter`] wraps it in a mutex.

use std::mem;
use std::thread::{self, ThreadId};

use tracing::{debug, trace};

use crate::coerce::{self, FromObj};
use crate::engine::builtin::BuiltinEngine;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::format::{format_into, Args};

pub struct RawInterp<E: Engine = BuiltinEngine> {
    engine: E,
    thread: ThreadId,
    buf: Vec<u8>,
}

impl<E: Engine> RawInterp<E> {
    /// Create an engine bound to the current thread and run its baseline
    /// initialisation.
    pub fn new() -> Result<Self> {
        let mut engine = E::create();
        if !engine.init().is_ok() {
            return Err(Error::Init(engine.string_result()));
        }
        debug!(thread_affine = E::THREAD_AFFINE, "interpreter created");
        Ok(RawInterp {
            engine,
            thread: thread::current().id(),
            buf: Vec::new(),
        })
    }

    fn check_thread(&self) -> Result<()> {
        if E::THREAD_AFFINE && thread::current().id() != self.thread {
            return Err(Error::WrongThread);
        }
        Ok(())
    }

    /// Evaluate `script` as one unit. Empty input succeeds without touching
    /// the engine.
    pub fn eval(&mut self, script: &[u8]) -> Result<()> {
        self.check_thread()?;
        if script.is_empty() {
            return Ok(());
        }
        trace!(bytes = script.len(), "eval");
        if self.engine.eval(script).is_ok() {
            Ok(())
        } else {
            Err(Error::Eval(self.engine.string_result()))
        }
    }

    /// Evaluate `script`, then read the result as `T`.
    pub fn eval_as<T: FromObj>(&mut self, script: &[u8]) -> Result<T> {
        self.eval(script)?;
        let obj = self.engine.obj_result();
        coerce::extract(&mut self.engine, &obj)
    }

    /// Expand `template` into the script buffer and evaluate it.
    pub fn eval_template(&mut self, template: &str, args: &Args) -> Result<()> {
        let buf = self.expand(template, args)?;
        let result = self.eval(&buf);
        self.buf = buf;
        result
    }

    /// Expand `template`, evaluate it, and read the result as `T`.
    pub fn eval_template_as<T: FromObj>(&mut self, template: &str, args: &Args) -> Result<T> {
        let buf = self.expand(template, args)?;
        let result = self.eval_as(&buf);
        self.buf = buf;
        result
    }

    /// Take the buffer out of `self` and fill it; the caller puts it back.
    fn expand(&mut self, template: &str, args: &Args) -> Result<Vec<u8>> {
        self.check_thread()?;
        let mut buf = mem::take(&mut self.buf);
        buf.clear();
        match format_into(&mut buf, template, args) {
            Ok(()) => Ok(buf),
            Err(e) => {
                self.buf = buf;
                Err(e)
            }
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
