//! In-process engine for the core Tcl command language.
//!
//! Values are plain strings; numbers and booleans are parsed on demand with
//! the same rules the C library applies. See [`commands::COMMANDS`] for the
//! supported command set.

pub mod commands;
pub mod expr;
pub mod interp;
pub mod list;
pub mod value;

use self::interp::{Exception, Interp};
use super::{Engine, Status};

/// Pure-Rust engine. Not thread-affine: an instance may move between threads.
#[derive(Debug, Default)]
pub struct BuiltinEngine {
    interp: Interp,
    result: String,
}

impl BuiltinEngine {
    fn fail(&mut self, msg: String) -> Status {
        self.result = msg;
        Status::Error
    }
}

impl Engine for BuiltinEngine {
    type Obj = String;

    const THREAD_AFFINE: bool = false;

    fn create() -> Self {
        BuiltinEngine::default()
    }

    fn init(&mut self) -> Status {
        self.interp.set_var("tcl_version", "8.6".to_owned());
        self.interp.set_var("tcl_interactive", "0".to_owned());
        self.interp.set_var("auto_path", String::new());
        self.result.clear();
        Status::Ok
    }

    fn eval(&mut self, script: &[u8]) -> Status {
        let script = match std::str::from_utf8(script) {
            Ok(s) => s,
            Err(e) => {
                return self.fail(format!(
                    "invalid UTF-8 in script at byte {}",
                    e.valid_up_to()
                ))
            }
        };
        match self.interp.eval(script) {
            // A `return` at top level completes the script normally.
            Ok(value) | Err(Exception::Return(value)) => {
                self.result = value;
                Status::Ok
            }
            Err(Exception::Error(msg)) => self.fail(msg),
            Err(Exception::Break) => self.fail("invoked \"break\" outside of a loop".to_owned()),
            Err(Exception::Continue) => {
                self.fail("invoked \"continue\" outside of a loop".to_owned())
            }
        }
    }

    fn obj_result(&self) -> String {
        self.result.clone()
    }

    fn string_result(&self) -> String {
        self.result.clone()
    }

    fn get_wide_int(&mut self, obj: &String) -> Option<i64> {
        value::parse_wide_int(obj).map_err(|e| self.result = e).ok()
    }

    fn get_string(&self, obj: &String) -> String {
        obj.clone()
    }

    fn get_double(&mut self, obj: &String) -> Option<f64> {
        value::parse_double(obj).map_err(|e| self.result = e).ok()
    }

    fn get_boolean(&mut self, obj: &String) -> Option<bool> {
        value::parse_boolean(obj).map_err(|e| self.result = e).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> BuiltinEngine {
        let mut e = BuiltinEngine::create();
        assert_eq!(e.init(), Status::Ok);
        e
    }

    #[test]
    fn eval_sets_result() {
        let mut e = engine();
        assert_eq!(e.eval(b"set a [expr 1 + 2]"), Status::Ok);
        assert_eq!(e.string_result(), "3");
        let obj = e.obj_result();
        assert_eq!(e.get_wide_int(&obj), Some(3));
    }

    #[test]
    fn failures_leave_message_in_result() {
        let mut e = engine();
        assert_eq!(e.eval(b"set x $undefined"), Status::Error);
        assert_eq!(e.string_result(), "can't read \"undefined\": no such variable");
        assert_eq!(e.eval(b"break"), Status::Error);
        assert_eq!(e.string_result(), "invoked \"break\" outside of a loop");
        assert_eq!(e.eval(b"\xff"), Status::Error);
    }

    #[test]
    fn top_level_return_is_ok() {
        let mut e = engine();
        assert_eq!(e.eval(b"return 7; set never 1"), Status::Ok);
        assert_eq!(e.string_result(), "7");
    }

    #[test]
    fn extraction_failure_sets_result() {
        let mut e = engine();
        assert_eq!(e.get_wide_int(&"abc".to_owned()), None);
        assert_eq!(e.string_result(), "expected integer but got \"abc\"");
        assert_eq!(e.get_double(&"x".to_owned()), None);
        assert_eq!(e.string_result(), "expected floating-point number but got \"x\"");
        assert_eq!(e.get_boolean(&"maybe".to_owned()), None);
        assert_eq!(e.string_result(), "expected boolean value but got \"maybe\"");
    }

    #[test]
    fn state_persists_between_evals() {
        let mut e = engine();
        e.eval(b"proc double {x} { expr {$x * 2} }");
        assert_eq!(e.eval(b"double [set tcl_version]"), Status::Ok);
        assert_eq!(e.string_result(), "17.2");
    }

    #[test]
    fn nul_bytes_survive() {
        let mut e = engine();
        assert_eq!(e.eval(b"set s a\\x00b"), Status::Ok);
        let obj = e.obj_result();
        assert_eq!(e.get_string(&obj), "a\0b");
    }
}
