//! Lock-guarded Tcl interpreter binding.
//!
//! ```text
//!  host ──template + Args──▶ format ──bytes──▶ RawInterp ──▶ Engine
//!       ◀──T: FromObj──────── coerce ◀──────── result object ◀┘
//! ```
//!
//! | Module      | Role                                                   |
//! |-------------|--------------------------------------------------------|
//! | [`format`]  | `%{...}` script templates and Tcl quoting              |
//! | [`raw`]     | unlocked handle: one engine, its thread, a buffer      |
//! | [`coerce`]  | result object → `i64`/`u64`/`String`/`f64`/`bool`      |
//! | [`interp`]  | the mutex-guarded [`Interpreter`] facade               |
//! | [`worker`]  | an interpreter on a dedicated thread, async API        |
//! | [`config`]  | init script and rc-file discovery                      |
//! | [`engine`]  | the [`Engine`] boundary and the shipped engines        |
//!
//! ```rust
//! use tclbind::{args, Interpreter};
//!
//! let interp: Interpreter = Interpreter::new("").unwrap();
//! interp.eval("set greeting %{%q}", args!["hello [world]"]).unwrap();
//! assert_eq!(interp.eval_as_string("set greeting", ()).unwrap(), "hello [world]");
//! ```

pub mod coerce;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod interp;
pub mod raw;
pub mod worker;

pub use coerce::{FromObj, Kind, Typed};
pub use config::InterpreterConfig;
pub use engine::builtin::BuiltinEngine;
pub use engine::{Engine, Status};
pub use error::{Error, Result};
pub use format::{Arg, ArgMap, Args};
pub use interp::{ErrorFilter, Interpreter};
pub use raw::RawInterp;
pub use worker::Worker;

#[cfg(feature = "libtcl")]
pub use engine::tcl::TclEngine;
