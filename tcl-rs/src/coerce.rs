//! Conversion of engine result objects into host values.
//!
//! The set of host kinds is closed: [`Kind`] names what to extract and
//! [`Typed`] carries the extracted value. Host types opt in through
//! [`FromObj`], so asking for a type the binding cannot fill is a compile
//! error rather than a runtime failure.
//!
//! Integer destinations are filled from the engine's 64-bit wide integer and
//! converted with `as`: no range check, `-1` read as `u64` gives `u64::MAX`
//! and `300` read as `u8` gives `44`.

use crate::engine::Engine;
use crate::error::{Error, Result};

/// What to extract from a result object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Int,
    Uint,
    Str,
    Float,
    Bool,
}

/// An extracted value.
#[derive(Debug, Clone, PartialEq)]
pub enum Typed {
    Int(i64),
    Uint(u64),
    Str(String),
    Float(f64),
    Bool(bool),
}

/// Extract `obj` as `kind`.
///
/// Failures carry the engine's diagnostic text.
pub fn coerce<E: Engine>(engine: &mut E, obj: &E::Obj, kind: Kind) -> Result<Typed> {
    match kind {
        Kind::Int => to_int(engine, obj).map(Typed::Int),
        Kind::Uint => to_uint(engine, obj).map(Typed::Uint),
        Kind::Str => Ok(Typed::Str(to_string(engine, obj))),
        Kind::Float => to_float(engine, obj).map(Typed::Float),
        Kind::Bool => to_bool(engine, obj).map(Typed::Bool),
    }
}

pub fn to_int<E: Engine>(engine: &mut E, obj: &E::Obj) -> Result<i64> {
    engine
        .get_wide_int(obj)
        .ok_or_else(|| Error::Coerce(engine.string_result()))
}

pub fn to_uint<E: Engine>(engine: &mut E, obj: &E::Obj) -> Result<u64> {
    to_int(engine, obj).map(|n| n as u64)
}

/// The object's string form, embedded NULs included. Never fails.
pub fn to_string<E: Engine>(engine: &E, obj: &E::Obj) -> String {
    engine.get_string(obj)
}

pub fn to_float<E: Engine>(engine: &mut E, obj: &E::Obj) -> Result<f64> {
    engine
        .get_double(obj)
        .ok_or_else(|| Error::Coerce(engine.string_result()))
}

pub fn to_bool<E: Engine>(engine: &mut E, obj: &E::Obj) -> Result<bool> {
    engine
        .get_boolean(obj)
        .ok_or_else(|| Error::Coerce(engine.string_result()))
}

/// Extract `obj` straight into a host type.
pub fn extract<E: Engine, T: FromObj>(engine: &mut E, obj: &E::Obj) -> Result<T> {
    T::from_typed(coerce(engine, obj, T::KIND)?)
}

// ── FromObj ───────────────────────────────────────────────────────────────────

/// A host type that can receive an extracted value.
pub trait FromObj: Sized {
    /// The kind to extract for this type.
    const KIND: Kind;

    /// Convert an extracted value. A value of another kind fails with
    /// [`Error::CannotConvert`].
    fn from_typed(value: Typed) -> Result<Self>;
}

macro_rules! from_obj_numeric {
    ($variant:ident: $($t:ty),+) => {$(
        impl FromObj for $t {
            const KIND: Kind = Kind::$variant;

            fn from_typed(value: Typed) -> Result<Self> {
                match value {
                    Typed::$variant(n) => Ok(n as $t),
                    _ => Err(Error::CannotConvert { type_name: stringify!($t) }),
                }
            }
        }
    )+};
}

from_obj_numeric!(Int: i8, i16, i32, i64, isize);
from_obj_numeric!(Uint: u8, u16, u32, u64, usize);
from_obj_numeric!(Float: f32, f64);

impl FromObj for String {
    const KIND: Kind = Kind::Str;

    fn from_typed(value: Typed) -> Result<Self> {
        match value {
            Typed::Str(s) => Ok(s),
            _ => Err(Error::CannotConvert { type_name: "String" }),
        }
    }
}

impl FromObj for bool {
    const KIND: Kind = Kind::Bool;

    fn from_typed(value: Typed) -> Result<Self> {
        match value {
            Typed::Bool(b) => Ok(b),
            _ => Err(Error::CannotConvert { type_name: "bool" }),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::builtin::BuiltinEngine;

    fn engine() -> BuiltinEngine {
        let mut e = BuiltinEngine::create();
        e.init();
        e
    }

    fn obj(s: &str) -> String {
        s.to_owned()
    }

    #[test]
    fn integers_narrow_with_as_semantics() {
        let mut e = engine();
        assert_eq!(extract::<_, i64>(&mut e, &obj("42")).unwrap(), 42);
        assert_eq!(extract::<_, u8>(&mut e, &obj("300")).unwrap(), 44);
        assert_eq!(extract::<_, i8>(&mut e, &obj("200")).unwrap(), -56);
        assert_eq!(extract::<_, u64>(&mut e, &obj("-1")).unwrap(), u64::MAX);
        assert_eq!(extract::<_, usize>(&mut e, &obj("0x10")).unwrap(), 16);
    }

    #[test]
    fn integer_failure_carries_engine_text() {
        let mut e = engine();
        match extract::<_, i32>(&mut e, &obj("abc")) {
            Err(Error::Coerce(msg)) => assert_eq!(msg, "expected integer but got \"abc\""),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn strings_keep_nul_bytes() {
        let mut e = engine();
        assert_eq!(extract::<_, String>(&mut e, &obj("a\0b")).unwrap(), "a\0b");
    }

    #[test]
    fn floats_and_bools() {
        let mut e = engine();
        assert_eq!(extract::<_, f64>(&mut e, &obj("2.5")).unwrap(), 2.5);
        assert_eq!(extract::<_, f32>(&mut e, &obj("7")).unwrap(), 7.0);
        assert!(extract::<_, bool>(&mut e, &obj("yes")).unwrap());
        assert!(!extract::<_, bool>(&mut e, &obj("off")).unwrap());
        assert!(matches!(extract::<_, bool>(&mut e, &obj("maybe")), Err(Error::Coerce(_))));
        assert!(matches!(extract::<_, f64>(&mut e, &obj("x")), Err(Error::Coerce(_))));
    }

    #[test]
    fn coerce_by_kind() {
        let mut e = engine();
        assert_eq!(coerce(&mut e, &obj("5"), Kind::Int).unwrap(), Typed::Int(5));
        assert_eq!(coerce(&mut e, &obj("5"), Kind::Uint).unwrap(), Typed::Uint(5));
        assert_eq!(coerce(&mut e, &obj("5"), Kind::Str).unwrap(), Typed::Str("5".into()));
        assert_eq!(coerce(&mut e, &obj("5"), Kind::Float).unwrap(), Typed::Float(5.0));
        assert_eq!(coerce(&mut e, &obj("5"), Kind::Bool).unwrap(), Typed::Bool(true));
    }

    #[test]
    fn mismatched_kind_cannot_convert() {
        match u16::from_typed(Typed::Str("1".into())) {
            Err(Error::CannotConvert { type_name }) => assert_eq!(type_name, "u16"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            String::from_typed(Typed::Int(1)),
            Err(Error::CannotConvert { type_name: "String" })
        ));
        assert!(matches!(
            bool::from_typed(Typed::Float(1.0)),
            Err(Error::CannotConvert { type_name: "bool" })
        ));
    }
}
