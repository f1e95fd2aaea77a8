//! `%{...}` script templates.
//!
//! Tcl claims `%` for its own substitutions (`bind`, `clock format`, …), so
//! formatting tags are enclosed in `%{}` instead:
//!
//! ```text
//! %{[<abbrev>][<verb>]}
//! ```
//!
//! | `abbrev`       | Argument used                                       |
//! |----------------|-----------------------------------------------------|
//! | empty          | next value of an implicit counter (starts at 0)     |
//! | digits         | that positional argument; the counter is untouched  |
//! | identifier     | that key of an [`Args::Named`] map                  |
//!
//! `verb` is a printf directive starting with `%` (see [`verb`]).  `%q`
//! produces a double-quoted Tcl word that evaluates back to the original
//! text.  A missing verb means `%v`.
//!
//! A template without any `%{` is copied verbatim and its arguments are
//! ignored.  Every misuse (index out of range, unknown key, verb that does not
//! fit the argument) is an [`Error::Format`], never a marker in the output.
//!
//! ```rust
//! use tclbind::format::format_into;
//! use tclbind::args;
//!
//! let mut buf = Vec::new();
//! format_into(&mut buf, "%{} = %{%d} + %{1}", &args![20, 10]).unwrap();
//! assert_eq!(buf, b"20 = 10 + 10");
//! ```

pub mod verb;

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

// ── Arguments ─────────────────────────────────────────────────────────────────

/// One template argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Bool(bool),
}

/// Named arguments for identifier placeholders.
pub type ArgMap = HashMap<String, Arg>;

/// The argument source of one template expansion.
///
/// Named lookups are only possible against [`Args::Named`]; the "exactly one
/// map argument" rule is carried by the variant itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Args {
    Positional(Vec<Arg>),
    Named(ArgMap),
}

impl Args {
    /// Number of positional arguments (`0` for a named source).
    pub fn len(&self) -> usize {
        match self {
            Args::Positional(v) => v.len(),
            Args::Named(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Args::Positional(v) => v.is_empty(),
            Args::Named(m) => m.is_empty(),
        }
    }
}

impl Default for Args {
    fn default() -> Self {
        Args::Positional(Vec::new())
    }
}

impl From<()> for Args {
    fn from(_: ()) -> Self {
        Args::default()
    }
}

impl From<Vec<Arg>> for Args {
    fn from(v: Vec<Arg>) -> Self {
        Args::Positional(v)
    }
}

impl From<ArgMap> for Args {
    fn from(m: ArgMap) -> Self {
        Args::Named(m)
    }
}

impl<T: Into<Arg>, const N: usize> From<[T; N]> for Args {
    fn from(a: [T; N]) -> Self {
        Args::Positional(a.into_iter().map(Into::into).collect())
    }
}

/// Build positional [`Args`] from values of mixed types.
///
/// ```rust
/// let a = tclbind::args![1, "two", 3.0];
/// assert_eq!(a.len(), 3);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::format::Args::Positional(::std::vec::Vec::new())
    };
    ($($a:expr),+ $(,)?) => {
        $crate::format::Args::Positional(::std::vec![$($crate::format::Arg::from($a)),+])
    };
}

/// Build named [`Args`]: `arg_map!{"name" => value, …}`.
#[macro_export]
macro_rules! arg_map {
    ($($k:expr => $v:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut m = $crate::format::ArgMap::new();
        $( m.insert(::std::string::String::from($k), $crate::format::Arg::from($v)); )*
        $crate::format::Args::Named(m)
    }};
}

macro_rules! arg_from {
    ($variant:ident as $wide:ty: $($t:ty),+) => {
        $(impl From<$t> for Arg {
            fn from(v: $t) -> Self {
                Arg::$variant(v as $wide)
            }
        })+
    };
}

arg_from!(Int as i64: i8, i16, i32, i64, isize);
arg_from!(Uint as u64: u8, u16, u32, u64, usize);
arg_from!(Float as f64: f32, f64);

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Bool(b)
    }
}

impl From<char> for Arg {
    fn from(c: char) -> Self {
        Arg::Str(c.to_string())
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Str(s.to_owned())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Str(s)
    }
}

impl From<&String> for Arg {
    fn from(s: &String) -> Self {
        Arg::Str(s.clone())
    }
}

impl Arg {
    /// Type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Arg::Int(_) => "int",
            Arg::Uint(_) => "uint",
            Arg::Float(_) => "float",
            Arg::Str(_) => "string",
            Arg::Bool(_) => "bool",
        }
    }
}

/// Default stringification (`%v`).
impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Int(n) => write!(f, "{n}"),
            Arg::Uint(n) => write!(f, "{n}"),
            Arg::Float(x) => f.write_str(&verb::fmt_g(*x, None, false)),
            Arg::Str(s) => f.write_str(s),
            Arg::Bool(b) => write!(f, "{b}"),
        }
    }
}

// ── Expansion ─────────────────────────────────────────────────────────────────

/// Expand `template` with `args`, appending the script text to `buf`.
///
/// On error `buf` may hold a partial expansion; callers reset it before reuse.
pub fn format_into(buf: &mut Vec<u8>, template: &str, args: &Args) -> Result<()> {
    let mut rest = template;
    let mut counter = 0usize;

    while let Some(open) = rest.find("%{") {
        buf.extend_from_slice(rest[..open].as_bytes());
        let body_start = open + 2;
        let close = rest[body_start..].find('}').ok_or_else(|| {
            Error::Format(format!(
                "unterminated placeholder starting at \"{}\"",
                &rest[open..]
            ))
        })?;
        let body = &rest[body_start..body_start + close];
        let (abbrev, directive) = match body.find('%') {
            Some(i) => (&body[..i], Some(&body[i..])),
            None => (body, None),
        };

        let arg = resolve(abbrev, args, &mut counter)?;
        match directive {
            None | Some("%v") => buf.extend_from_slice(arg.to_string().as_bytes()),
            Some("%q") => buf.extend_from_slice(quote(&arg.to_string()).as_bytes()),
            Some(d) => {
                let text = verb::apply(d, arg).map_err(Error::Format)?;
                buf.extend_from_slice(text.as_bytes());
            }
        }

        rest = &rest[body_start + close + 1..];
    }

    buf.extend_from_slice(rest.as_bytes());
    Ok(())
}

/// Convenience wrapper returning the expansion as a `String`.
pub fn format(template: &str, args: &Args) -> Result<String> {
    let mut buf = Vec::with_capacity(template.len());
    format_into(&mut buf, template, args)?;
    // Only `&str` pieces were appended.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn resolve<'a>(abbrev: &str, args: &'a Args, counter: &mut usize) -> Result<&'a Arg> {
    if abbrev.is_empty() {
        let Args::Positional(list) = args else {
            return Err(Error::Format(
                "implicit placeholder %{} cannot be used with named arguments".into(),
            ));
        };
        let idx = *counter;
        *counter += 1;
        return list.get(idx).ok_or_else(|| {
            Error::Format(format!(
                "implicit placeholder #{idx} has no argument ({} given)",
                list.len()
            ))
        });
    }

    if abbrev.bytes().all(|b| b.is_ascii_digit()) {
        let Args::Positional(list) = args else {
            return Err(Error::Format(format!(
                "positional placeholder %{{{abbrev}}} cannot be used with named arguments"
            )));
        };
        let idx: usize = abbrev
            .parse()
            .map_err(|_| Error::Format(format!("argument index {abbrev} is too large")))?;
        return list.get(idx).ok_or_else(|| {
            Error::Format(format!(
                "argument index {idx} out of range ({} given)",
                list.len()
            ))
        });
    }

    match args {
        Args::Named(map) => map
            .get(abbrev)
            .ok_or_else(|| Error::Format(format!("missing named argument \"{abbrev}\""))),
        Args::Positional(list) => Err(Error::Format(format!(
            "named placeholder %{{{abbrev}}} requires a single ArgMap argument, got {} positional",
            list.len()
        ))),
    }
}

// ── Tcl quoting ───────────────────────────────────────────────────────────────

/// Quote `s` as one double-quoted Tcl word.
///
/// Evaluating the result as a word yields `s` unchanged: every character
/// that means something inside quotes is backslash-escaped, and control
/// characters are written as escape sequences.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' | '"' | '$' | '[' | ']' | '{' | '}' | ';' => {
                out.push('\\');
                out.push(ch);
            }
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
