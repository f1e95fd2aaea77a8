//! Interpreter start-up configuration.
//!
//! A fresh interpreter runs two optional pieces of script before it is handed
//! to the caller:
//!
//! | Source        | Where it comes from                                   |
//! |---------------|-------------------------------------------------------|
//! | rc file       | `TCLBIND_RC`, else `~/.tclshrc`, else `<config>/tclbind/init.tcl` |
//! | init script   | [`InterpreterConfig::init_script`] or `TCLBIND_INIT`  |
//!
//! The rc file is sourced first so the init script can build on it.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use tracing::debug;

use crate::error::{Error, Result};

/// Environment variable holding an init script.
pub const INIT_ENV: &str = "TCLBIND_INIT";
/// Environment variable naming an rc file.
pub const RC_ENV: &str = "TCLBIND_RC";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Script run after the rc file; empty means none.
    pub init_script: String,
    /// File sourced before the init script.
    pub rc_file: Option<PathBuf>,
}

impl InterpreterConfig {
    pub fn new(init_script: impl Into<String>) -> Self {
        InterpreterConfig {
            init_script: init_script.into(),
            rc_file: None,
        }
    }

    pub fn with_rc_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.rc_file = Some(path.into());
        self
    }

    /// Build a configuration from the process environment.
    ///
    /// `TCLBIND_RC` wins over the per-user search; an empty value disables
    /// the rc file altogether.
    pub fn from_env() -> Self {
        let init_script = env::var(INIT_ENV).unwrap_or_default();
        let rc_file = match env::var_os(RC_ENV) {
            Some(p) if p.is_empty() => None,
            Some(p) => Some(PathBuf::from(p)),
            None => find_user_rc(),
        };
        InterpreterConfig {
            init_script,
            rc_file,
        }
    }

    /// Read the configured rc file, if any.
    pub fn load_rc(&self) -> Result<Option<String>> {
        match &self.rc_file {
            Some(path) => read_rc(path).map(Some),
            None => Ok(None),
        }
    }
}

fn read_rc(path: &Path) -> Result<String> {
    debug!(path = %path.display(), "reading rc file");
    fs::read_to_string(path).map_err(|source| Error::Config {
        path: path.to_owned(),
        source,
    })
}

/// The first existing per-user rc file.
pub fn find_user_rc() -> Option<PathBuf> {
    let dirs = BaseDirs::new()?;
    rc_candidates(dirs.home_dir(), dirs.config_dir())
        .into_iter()
        .find(|p| p.is_file())
}

fn rc_candidates(home: &Path, config: &Path) -> [PathBuf; 2] {
    [
        home.join(".tclshrc"),
        config.join("tclbind").join("init.tcl"),
    ]
}

// ── Tests ─────────────────────────────────────────────────────────────────────
