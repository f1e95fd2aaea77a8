//! Lock-guarded interpreter facade.
//!
//! [`Interpreter`] serialises every public call through one mutex, so a
//! facade over a non-affine engine can be shared between threads behind an
//! `Arc`. Each call formats its template into the handle's reusable buffer,
//! evaluates it and optionally reads the result back as a host value.
//!
//! ```rust
//! use tclbind::{args, Interpreter};
//!
//! let interp: Interpreter = Interpreter::new("proc add {a b} { expr {$a + $b} }").unwrap();
//! let sum = interp.eval_as_int("add %{} %{}", args![2, 40]).unwrap();
//! assert_eq!(sum, 42);
//! ```

use std::fmt;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::coerce::FromObj;
use crate::config::InterpreterConfig;
use crate::engine::builtin::BuiltinEngine;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::format::Args;
use crate::raw::RawInterp;

/// Host hook applied to every error the facade returns.
pub type ErrorFilter = Box<dyn Fn(Error) -> Error + Send + Sync>;

pub struct Interpreter<E: Engine = BuiltinEngine> {
    inner: Mutex<Option<RawInterp<E>>>,
    filter: Option<ErrorFilter>,
}

impl<E: Engine> fmt::Debug for Interpreter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("released", &self.is_released())
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

impl<E: Engine> Interpreter<E> {
    /// Create an interpreter and run `init_script` in it (skipped when empty).
    pub fn new(init_script: &str) -> Result<Self> {
        Self::with_config(&InterpreterConfig::new(init_script))
    }

    /// Create an interpreter, source the configured rc file, then run the
    /// init script.
    pub fn with_config(config: &InterpreterConfig) -> Result<Self> {
        let mut raw = RawInterp::new()?;
        if let Some(rc) = config.load_rc()? {
            raw.eval(rc.as_bytes())?;
        }
        raw.eval(config.init_script.as_bytes())?;
        debug!(
            rc_file = config.rc_file.is_some(),
            init_bytes = config.init_script.len(),
            "interpreter ready"
        );
        Ok(Interpreter {
            inner: Mutex::new(Some(raw)),
            filter: None,
        })
    }

    /// Install a hook that sees every error before it reaches the caller.
    pub fn set_error_filter<F>(&mut self, filter: F)
    where
        F: Fn(Error) -> Error + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(filter));
    }

    /// Run `f` against the live handle while holding the lock.
    fn with_raw<T>(&self, f: impl FnOnce(&mut RawInterp<E>) -> Result<T>) -> Result<T> {
        let result = {
            // A panic inside the engine leaves the handle usable.
            let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            match guard.as_mut() {
                Some(raw) => f(raw),
                None => Err(Error::Released),
            }
        };
        // The filter runs unlocked and may call back into this facade.
        result.map_err(|e| match &self.filter {
            Some(filter) => filter(e),
            None => e,
        })
    }

    /// Expand `template` with `args` and evaluate it.
    ///
    /// With no positional arguments the template is evaluated as-is.
    pub fn eval(&self, template: &str, args: impl Into<Args>) -> Result<()> {
        let args = args.into();
        self.with_raw(|raw| {
            if is_bare(&args) {
                raw.eval(template.as_bytes())
            } else {
                raw.eval_template(template, &args)
            }
        })
    }

    /// Evaluate `script` without formatting.
    pub fn eval_bytes(&self, script: &[u8]) -> Result<()> {
        self.with_raw(|raw| raw.eval(script))
    }

    /// As [`eval`](Self::eval), then read the result as `T`.
    pub fn eval_as<T: FromObj>(&self, template: &str, args: impl Into<Args>) -> Result<T> {
        let args = args.into();
        self.with_raw(|raw| {
            if is_bare(&args) {
                raw.eval_as(template.as_bytes())
            } else {
                raw.eval_template_as(template, &args)
            }
        })
    }

    pub fn eval_as_int(&self, template: &str, args: impl Into<Args>) -> Result<i64> {
        self.eval_as(template, args)
    }

    pub fn eval_as_uint(&self, template: &str, args: impl Into<Args>) -> Result<u64> {
        self.eval_as(template, args)
    }

    pub fn eval_as_string(&self, template: &str, args: impl Into<Args>) -> Result<String> {
        self.eval_as(template, args)
    }

    pub fn eval_as_float(&self, template: &str, args: impl Into<Args>) -> Result<f64> {
        self.eval_as(template, args)
    }

    pub fn eval_as_bool(&self, template: &str, args: impl Into<Args>) -> Result<bool> {
        self.eval_as(template, args)
    }

    /// Dispose of the engine. Later calls fail with [`Error::Released`];
    /// releasing twice is a no-op.
    pub fn release(&self) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.take().is_some() {
            debug!("interpreter released");
        }
    }

    pub fn is_released(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

fn is_bare(args: &Args) -> bool {
    matches!(args, Args::Positional(v) if v.is_empty())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{arg_map, args};

    #[test]
    fn init_script_runs_once() {
        let interp: Interpreter = Interpreter::new("set counter 10").unwrap();
        assert_eq!(interp.eval_as_int("incr counter", ()).unwrap(), 11);
    }

    #[test]
    fn failing_init_script_fails_construction() {
        match Interpreter::<BuiltinEngine>::new("nosuchcommand") {
            Err(Error::Eval(msg)) => assert_eq!(msg, "invalid command name \"nosuchcommand\""),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn no_args_means_as_is() {
        let interp: Interpreter = Interpreter::new("").unwrap();
        // `%{}` would be a format error if the template were expanded.
        assert_eq!(interp.eval_as_string("string length {%{}}", ()).unwrap(), "3");
        assert!(matches!(
            interp.eval("set a %{1}", args![1]),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn named_arguments() {
        let interp: Interpreter = Interpreter::new("").unwrap();
        let n = interp
            .eval_as_int("expr {%{a} * %{b}}", arg_map! {"a" => 6, "b" => 7})
            .unwrap();
        assert_eq!(n, 42);
    }

    #[test]
    fn release_is_idempotent() {
        let interp: Interpreter = Interpreter::new("").unwrap();
        assert!(!interp.is_released());
        interp.release();
        interp.release();
        assert!(interp.is_released());
        assert!(matches!(interp.eval_bytes(b"set a 1"), Err(Error::Released)));
        assert!(matches!(interp.eval_as_bool("expr 1", ()), Err(Error::Released)));
    }

    #[test]
    fn filter_sees_every_error() {
        let mut interp: Interpreter = Interpreter::new("").unwrap();
        interp.set_error_filter(|e| Error::Eval(format!("filtered: {e}")));
        match interp.eval("set a %{", args![1]) {
            Err(Error::Eval(msg)) => assert!(msg.starts_with("filtered: format error")),
            other => panic!("unexpected {other:?}"),
        }
        match interp.eval_as_int("set s abc", ()) {
            Err(Error::Eval(msg)) => {
                assert_eq!(msg, "filtered: expected integer but got \"abc\"")
            }
            other => panic!("unexpected {other:?}"),
        }
        interp.release();
        match interp.eval_bytes(b"") {
            Err(Error::Eval(msg)) => assert_eq!(msg, "filtered: interpreter has been released"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn filter_may_reenter_the_facade() {
        use std::sync::{mpsc, Arc, OnceLock, Weak};
        use std::time::Duration;

        let slot: Arc<OnceLock<Weak<Interpreter>>> = Arc::new(OnceLock::new());
        let mut interp: Interpreter = Interpreter::new("set level 3").unwrap();
        let seen = Arc::clone(&slot);
        interp.set_error_filter(move |e| {
            let level = seen
                .get()
                .and_then(Weak::upgrade)
                .and_then(|i| i.eval_as_string("set level", ()).ok())
                .unwrap_or_default();
            Error::Eval(format!("[level {level}] {e}"))
        });
        let interp = Arc::new(interp);
        slot.set(Arc::downgrade(&interp)).unwrap();

        let (tx, rx) = mpsc::channel();
        let worker = Arc::clone(&interp);
        std::thread::spawn(move || {
            let _ = tx.send(worker.eval_bytes(b"nosuchcommand"));
        });
        match rx.recv_timeout(Duration::from_secs(10)) {
            Ok(Err(Error::Eval(msg))) => {
                assert_eq!(msg, "[level 3] invalid command name \"nosuchcommand\"")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn facade_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Interpreter>();
    }
}
