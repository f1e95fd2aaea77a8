//! Error type shared by every layer of the binding.
//!
//! Engine-originated variants (`Init`, `Eval`, `Coerce`) carry the engine's
//! own diagnostic text verbatim and display nothing else, so a host can show
//! them exactly as `tclsh` would.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Everything that can go wrong while creating or driving an interpreter.
#[derive(Debug, Error)]
pub enum Error {
    /// Engine creation or baseline initialisation did not return `TCL_OK`.
    #[error("{0}")]
    Init(String),

    /// A script finished with a non-OK completion code.
    #[error("{0}")]
    Eval(String),

    /// The result object could not be read as the requested kind.
    #[error("{0}")]
    Coerce(String),

    /// The requested host type is not one the coercion layer can fill.
    #[error("cannot convert Tcl object to {type_name}")]
    CannotConvert { type_name: &'static str },

    /// Template parsing or argument resolution failed.
    #[error("format error: {0}")]
    Format(String),

    /// The interpreter was released and can no longer be used.
    #[error("interpreter has been released")]
    Released,

    /// A thread-affine engine was driven from a thread other than its creator.
    #[error("interpreter used from a thread other than the one that created it")]
    WrongThread,

    /// A worker evaluation missed its deadline.
    #[error("evaluation did not finish within {0:?}")]
    Timeout(Duration),

    /// The worker thread has exited and cannot take more requests.
    #[error("interpreter worker has stopped")]
    WorkerGone,

    /// The configured rc file could not be read.
    #[error("cannot read rc file {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_text_is_displayed_verbatim() {
        let err = Error::Eval("can't read \"x\": no such variable".into());
        assert_eq!(err.to_string(), "can't read \"x\": no such variable");
    }

    #[test]
    fn cannot_convert_names_the_type() {
        let err = Error::CannotConvert { type_name: "char" };
        assert_eq!(err.to_string(), "cannot convert Tcl object to char");
    }
}
