//! Engine backed by the system Tcl 8.6 library.
//!
//! Enabled with the `libtcl` Cargo feature:
//! ```text
//! cargo build --features libtcl
//! cargo test  --features libtcl
//! ```
//!
//! Links `libtcl8.6`. The C interpreter may only be used from the thread
//! that created it, so [`TclEngine`] is `!Send` and declares itself
//! thread-affine.

#[cfg(feature = "libtcl")]
pub use tcl_impl::{TclEngine, TclObj};

#[cfg(feature = "libtcl")]
mod tcl_impl {
    use std::ffi::CStr;
    use std::ptr;
    use std::sync::Once;

    use libc::{c_char, c_int, c_longlong};

    use crate::engine::{Engine, Status};

    // ── FFI ───────────────────────────────────────────────────────────────

    #[repr(C)]
    struct RawInterp {
        _private: [u8; 0],
    }

    #[repr(C)]
    struct RawObj {
        _private: [u8; 0],
    }

    const TCL_OK: c_int = 0;

    #[link(name = "tcl8.6")]
    extern "C" {
        fn Tcl_FindExecutable(argv0: *const c_char);
        fn Tcl_CreateInterp() -> *mut RawInterp;
        fn Tcl_DeleteInterp(interp: *mut RawInterp);
        fn Tcl_Init(interp: *mut RawInterp) -> c_int;
        fn Tcl_EvalEx(
            interp: *mut RawInterp,
            script: *const c_char,
            num_bytes: c_int,
            flags: c_int,
        ) -> c_int;
        fn Tcl_GetObjResult(interp: *mut RawInterp) -> *mut RawObj;
        fn Tcl_GetStringResult(interp: *mut RawInterp) -> *const c_char;
        fn Tcl_GetWideIntFromObj(
            interp: *mut RawInterp,
            obj: *mut RawObj,
            out: *mut c_longlong,
        ) -> c_int;
        fn Tcl_GetStringFromObj(obj: *mut RawObj, len: *mut c_int) -> *const c_char;
        fn Tcl_GetDoubleFromObj(interp: *mut RawInterp, obj: *mut RawObj, out: *mut f64) -> c_int;
        fn Tcl_GetBooleanFromObj(interp: *mut RawInterp, obj: *mut RawObj, out: *mut c_int) -> c_int;
        fn Tcl_DbIncrRefCount(obj: *mut RawObj, file: *const c_char, line: c_int);
        fn Tcl_DbDecrRefCount(obj: *mut RawObj, file: *const c_char, line: c_int);
    }

    static FIND_EXECUTABLE: Once = Once::new();

    fn file_name() -> *const c_char {
        concat!(file!(), "\0").as_ptr().cast()
    }

    // ── TclObj ────────────────────────────────────────────────────────────

    /// A counted reference to a `Tcl_Obj`.
    pub struct TclObj {
        raw: *mut RawObj,
    }

    impl TclObj {
        fn retain(raw: *mut RawObj) -> Self {
            // SAFETY: `raw` is a live object returned by the interpreter.
            unsafe { Tcl_DbIncrRefCount(raw, file_name(), line!() as c_int) };
            TclObj { raw }
        }
    }

    impl Drop for TclObj {
        fn drop(&mut self) {
            // SAFETY: balances the increment in `retain`.
            unsafe { Tcl_DbDecrRefCount(self.raw, file_name(), line!() as c_int) };
        }
    }

    // ── TclEngine ─────────────────────────────────────────────────────────

    /// One `Tcl_Interp`. Deleted on drop.
    pub struct TclEngine {
        raw: *mut RawInterp,
    }

    impl Drop for TclEngine {
        fn drop(&mut self) {
            // SAFETY: `raw` came from Tcl_CreateInterp and is deleted once.
            unsafe { Tcl_DeleteInterp(self.raw) };
        }
    }

    /// Decode Tcl's internal string form: standard UTF-8 except that NUL is
    /// stored as the two bytes `C0 80`.
    fn decode(bytes: &[u8]) -> String {
        if !bytes.windows(2).any(|w| w == [0xC0, 0x80]) {
            return String::from_utf8_lossy(bytes).into_owned();
        }
        let mut plain = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == 0xC0 && bytes.get(i + 1) == Some(&0x80) {
                plain.push(0);
                i += 2;
            } else {
                plain.push(bytes[i]);
                i += 1;
            }
        }
        String::from_utf8_lossy(&plain).into_owned()
    }

    impl Engine for TclEngine {
        type Obj = TclObj;

        const THREAD_AFFINE: bool = true;

        /// `Tcl_CreateInterp` never returns null; it panics inside the C
        /// library on allocation failure.
        fn create() -> Self {
            FIND_EXECUTABLE.call_once(|| {
                // SAFETY: a null argv0 is accepted and only initialises the
                // library's search paths.
                unsafe { Tcl_FindExecutable(ptr::null()) }
            });
            // SAFETY: plain constructor call.
            let raw = unsafe { Tcl_CreateInterp() };
            TclEngine { raw }
        }

        fn init(&mut self) -> Status {
            // SAFETY: `self.raw` is live for the lifetime of `self`.
            Status::from_code(unsafe { Tcl_Init(self.raw) })
        }

        fn eval(&mut self, script: &[u8]) -> Status {
            let Ok(len) = c_int::try_from(script.len()) else {
                return Status::Error;
            };
            // SAFETY: the pointer/length pair describes `script`; Tcl does not
            // require NUL termination when a length is given.
            let code = unsafe { Tcl_EvalEx(self.raw, script.as_ptr().cast(), len, 0) };
            Status::from_code(code)
        }

        fn obj_result(&self) -> TclObj {
            // SAFETY: the result object is owned by the interpreter; `retain`
            // keeps it alive past the next evaluation.
            TclObj::retain(unsafe { Tcl_GetObjResult(self.raw) })
        }

        fn string_result(&self) -> String {
            // SAFETY: Tcl returns a NUL-terminated string owned by the
            // interpreter, valid until the next call that changes the result.
            let text = unsafe { CStr::from_ptr(Tcl_GetStringResult(self.raw)) };
            decode(text.to_bytes())
        }

        fn get_wide_int(&mut self, obj: &TclObj) -> Option<i64> {
            let mut out: c_longlong = 0;
            // SAFETY: both handles are live; `out` is a valid destination.
            let code = unsafe { Tcl_GetWideIntFromObj(self.raw, obj.raw, &mut out) };
            (code == TCL_OK).then_some(out)
        }

        fn get_string(&self, obj: &TclObj) -> String {
            let mut len: c_int = 0;
            // SAFETY: Tcl returns `len` bytes owned by the object, which
            // `obj` keeps alive.
            let bytes = unsafe {
                let data = Tcl_GetStringFromObj(obj.raw, &mut len);
                std::slice::from_raw_parts(data.cast::<u8>(), usize::try_from(len).unwrap_or(0))
            };
            decode(bytes)
        }

        fn get_double(&mut self, obj: &TclObj) -> Option<f64> {
            let mut out = 0.0;
            // SAFETY: as in `get_wide_int`.
            let code = unsafe { Tcl_GetDoubleFromObj(self.raw, obj.raw, &mut out) };
            (code == TCL_OK).then_some(out)
        }

        fn get_boolean(&mut self, obj: &TclObj) -> Option<bool> {
            let mut out: c_int = 0;
            // SAFETY: as in `get_wide_int`.
            let code = unsafe { Tcl_GetBooleanFromObj(self.raw, obj.raw, &mut out) };
            (code == TCL_OK).then_some(out != 0)
        }
    }

}
