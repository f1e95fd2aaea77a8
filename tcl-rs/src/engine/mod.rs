//! The boundary to the interpreter engine.
//!
//! The binding never parses or evaluates script text itself; it drives an
//! [`Engine`], modelled on the handful of Tcl C API calls the wrapper needs:
//!
//! | Trait method     | Tcl C API                  |
//! |------------------|----------------------------|
//! | `create`         | `Tcl_CreateInterp`         |
//! | `init`           | `Tcl_Init`                 |
//! | `eval`           | `Tcl_EvalEx`               |
//! | `obj_result`     | `Tcl_GetObjResult`         |
//! | `string_result`  | `Tcl_GetStringResult`      |
//! | `get_wide_int`   | `Tcl_GetWideIntFromObj`    |
//! | `get_string`     | `Tcl_GetStringFromObj`     |
//! | `get_double`     | `Tcl_GetDoubleFromObj`     |
//! | `get_boolean`    | `Tcl_GetBooleanFromObj`    |
//!
//! Two engines ship with the crate: [`builtin::BuiltinEngine`], a compact
//! in-process interpreter for the core command language, and
//! `tcl::TclEngine` (Cargo feature `libtcl`) which links the system Tcl 8.6.

pub mod builtin;
pub mod tcl;

/// Completion code of an engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
    Return,
    Break,
    Continue,
}

impl Status {
    /// Map a Tcl completion code (`TCL_OK` = 0 … `TCL_CONTINUE` = 4).
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Status::Ok,
            2 => Status::Return,
            3 => Status::Break,
            4 => Status::Continue,
            _ => Status::Error,
        }
    }

    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

/// One interpreter engine instance.
///
/// Failing extraction calls (`get_wide_int`, `get_double`, `get_boolean`)
/// return `None` and leave their diagnostic in the interpreter result, where
/// [`Engine::string_result`] picks it up, just as the C API does.
pub trait Engine: Sized {
    /// The engine's native result object.
    type Obj;

    /// Whether the engine must only be driven from the thread that created it.
    const THREAD_AFFINE: bool;

    /// Create a fresh engine instance.
    fn create() -> Self;

    /// Run the engine's baseline initialisation.
    fn init(&mut self) -> Status;

    /// Evaluate `script` as one unit.
    fn eval(&mut self, script: &[u8]) -> Status;

    /// The object left behind by the last evaluation.
    fn obj_result(&self) -> Self::Obj;

    /// The last result (or error message) as a string.
    fn string_result(&self) -> String;

    fn get_wide_int(&mut self, obj: &Self::Obj) -> Option<i64>;

    /// The object's string representation, embedded NULs included.
    fn get_string(&self, obj: &Self::Obj) -> String;

    fn get_double(&mut self, obj: &Self::Obj) -> Option<f64>;

    fn get_boolean(&mut self, obj: &Self::Obj) -> Option<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(Status::from_code(0), Status::Ok);
        assert_eq!(Status::from_code(1), Status::Error);
        assert_eq!(Status::from_code(2), Status::Return);
        assert_eq!(Status::from_code(3), Status::Break);
        assert_eq!(Status::from_code(4), Status::Continue);
        assert_eq!(Status::from_code(99), Status::Error);
        assert!(Status::Ok.is_ok());
        assert!(!Status::Return.is_ok());
    }
}
