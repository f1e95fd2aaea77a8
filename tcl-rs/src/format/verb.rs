//! printf directives inside `%{…}` placeholders.
//!
//! Syntax: `%[flags][width][.precision]verb`
//!
//! | Verb          | Accepts          | Output                                   |
//! |---------------|------------------|------------------------------------------|
//! | `v`           | any              | default form                             |
//! | `d`           | int, uint        | decimal                                  |
//! | `b` `o`       | int, uint        | binary, octal (`#` adds `0b` / `0`)      |
//! | `x` `X`       | int, uint, string| hex (`#` adds `0x`); strings hex-encode  |
//! | `c`           | int, uint        | the character with that code point       |
//! | `e` `E`       | float            | scientific, `1.500000e+00`               |
//! | `f` `F`       | float            | fixed point                              |
//! | `g` `G`       | float            | shortest of `e`/`f`                      |
//! | `s`           | string           | the string, precision truncates          |
//! | `t`           | bool             | `true` / `false`                         |
//! | `q`           | any              | Tcl-quoted word                          |
//!
//! Flags: `-` left-justify, `+` always sign, space for a blank sign, `0`
//! zero-pad numbers, `#` alternate form.
//!
//! A verb applied to an argument of the wrong type is an error.

use std::sync::OnceLock;

use regex::Regex;

use super::{quote, Arg};

/// A parsed printf directive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Directive {
    pub minus: bool,
    pub plus: bool,
    pub space: bool,
    pub zero: bool,
    pub sharp: bool,
    pub width: Option<usize>,
    pub precision: Option<usize>,
    pub verb: char,
}

fn directive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^%([-+# 0]*)(\d+)?(?:\.(\d*))?([A-Za-z])$").expect("directive regex is valid")
    })
}

impl Directive {
    /// Parse a directive such as `%-8.3f`.
    pub fn parse(src: &str) -> Result<Self, String> {
        let caps = directive_re()
            .captures(src)
            .ok_or_else(|| format!("malformed format directive \"{src}\""))?;

        let mut d = Directive::default();
        for flag in caps.get(1).map_or("", |m| m.as_str()).chars() {
            match flag {
                '-' => d.minus = true,
                '+' => d.plus = true,
                ' ' => d.space = true,
                '0' => d.zero = true,
                '#' => d.sharp = true,
                _ => unreachable!("regex only admits flag characters"),
            }
        }
        d.width = match caps.get(2) {
            Some(m) => Some(parse_count(m.as_str(), src)?),
            None => None,
        };
        d.precision = match caps.get(3) {
            Some(m) if m.as_str().is_empty() => Some(0),
            Some(m) => Some(parse_count(m.as_str(), src)?),
            None => None,
        };
        d.verb = caps
            .get(4)
            .and_then(|m| m.as_str().chars().next())
            .unwrap_or('v');
        Ok(d)
    }
}

/// Largest accepted width or precision.
const MAX_COUNT: usize = 1_000_000;

fn parse_count(digits: &str, src: &str) -> Result<usize, String> {
    digits
        .parse()
        .ok()
        .filter(|&n| n <= MAX_COUNT)
        .ok_or_else(|| format!("width or precision too large in \"{src}\""))
}

/// Apply directive `src` to `arg`.
pub fn apply(src: &str, arg: &Arg) -> Result<String, String> {
    let d = Directive::parse(src)?;
    let mismatch = || format!("verb %{} cannot format {} value {arg}", d.verb, arg.type_name());

    let body = match (d.verb, arg) {
        ('v', Arg::Float(x)) => signed_float(&d, *x, fmt_g(x.abs(), d.precision, false)),
        ('v', Arg::Int(n)) | ('d', Arg::Int(n)) => signed_int(&d, *n < 0, n.unsigned_abs(), 10, ""),
        ('v', Arg::Uint(n)) | ('d', Arg::Uint(n)) => signed_int(&d, false, *n, 10, ""),
        ('v', other) => truncate(&d, other.to_string()),

        ('b', Arg::Int(n)) => signed_int(&d, *n < 0, n.unsigned_abs(), 2, "0b"),
        ('b', Arg::Uint(n)) => signed_int(&d, false, *n, 2, "0b"),
        ('o', Arg::Int(n)) => signed_int(&d, *n < 0, n.unsigned_abs(), 8, "0"),
        ('o', Arg::Uint(n)) => signed_int(&d, false, *n, 8, "0"),
        ('x', Arg::Int(n)) => signed_int(&d, *n < 0, n.unsigned_abs(), 16, "0x"),
        ('x', Arg::Uint(n)) => signed_int(&d, false, *n, 16, "0x"),
        ('X', Arg::Int(n)) => signed_int(&d, *n < 0, n.unsigned_abs(), 16, "0X").to_uppercase(),
        ('X', Arg::Uint(n)) => signed_int(&d, false, *n, 16, "0X").to_uppercase(),
        ('x', Arg::Str(s)) => hex_bytes(s, false),
        ('X', Arg::Str(s)) => hex_bytes(s, true),

        ('c', Arg::Int(n)) => code_point(*n as u64)?,
        ('c', Arg::Uint(n)) => code_point(*n)?,

        ('e' | 'E' | 'f' | 'F' | 'g' | 'G', Arg::Float(x)) => {
            let upper = d.verb.is_ascii_uppercase();
            let text = match d.verb.to_ascii_lowercase() {
                'e' => fmt_e(x.abs(), d.precision.unwrap_or(6), upper),
                'f' => fmt_f(x.abs(), d.precision.unwrap_or(6)),
                _ => fmt_g(x.abs(), d.precision, upper),
            };
            signed_float(&d, *x, text)
        }

        ('s', Arg::Str(s)) => truncate(&d, s.clone()),
        ('t', Arg::Bool(b)) => b.to_string(),
        ('q', other) => quote(&other.to_string()),

        (
            'd' | 'b' | 'o' | 'x' | 'X' | 'c' | 'e' | 'E' | 'f' | 'F' | 'g' | 'G' | 's' | 't',
            _,
        ) => return Err(mismatch()),
        (verb, _) => return Err(format!("unknown verb %{verb} in \"{src}\"")),
    };

    Ok(pad(&d, body, arg))
}

// ── Integers ──────────────────────────────────────────────────────────────────

fn signed_int(d: &Directive, negative: bool, magnitude: u64, radix: u32, prefix: &str) -> String {
    let mut digits = match radix {
        2 => format!("{magnitude:b}"),
        8 => format!("{magnitude:o}"),
        16 => format!("{magnitude:x}"),
        _ => magnitude.to_string(),
    };
    if let Some(p) = d.precision {
        if digits.len() < p {
            digits = "0".repeat(p - digits.len()) + &digits;
        }
    }
    let mut out = sign(d, negative).to_owned();
    if d.sharp {
        out.push_str(prefix);
    }
    out.push_str(&digits);
    out
}

fn sign(d: &Directive, negative: bool) -> &'static str {
    if negative {
        "-"
    } else if d.plus {
        "+"
    } else if d.space {
        " "
    } else {
        ""
    }
}

fn code_point(n: u64) -> Result<String, String> {
    u32::try_from(n)
        .ok()
        .and_then(char::from_u32)
        .map(String::from)
        .ok_or_else(|| format!("%c: {n} is not a valid code point"))
}

fn hex_bytes(s: &str, upper: bool) -> String {
    s.bytes()
        .map(|b| if upper { format!("{b:02X}") } else { format!("{b:02x}") })
        .collect()
}

// ── Floats ────────────────────────────────────────────────────────────────────

fn signed_float(d: &Directive, x: f64, magnitude: String) -> String {
    if x.is_nan() {
        return "NaN".to_owned();
    }
    let negative = x.is_sign_negative() && x != 0.0;
    let s = sign(d, negative);
    if x.is_infinite() {
        return format!("{}Inf", if negative { "-" } else { "+" });
    }
    format!("{s}{magnitude}")
}

/// `%f` on a non-negative value.
fn fmt_f(x: f64, prec: usize) -> String {
    format!("{x:.prec$}")
}

/// `%e` on a non-negative value: mantissa, then a signed exponent of at least
/// two digits.
fn fmt_e(x: f64, prec: usize, upper: bool) -> String {
    let raw = format!("{x:.prec$e}");
    let (mantissa, exp) = split_exp(&raw);
    exp_form(mantissa, exp, upper)
}

fn split_exp(raw: &str) -> (&str, i32) {
    match raw.split_once('e') {
        Some((m, e)) => (m, e.parse().unwrap_or(0)),
        None => (raw, 0),
    }
}

fn exp_form(mantissa: &str, exp: i32, upper: bool) -> String {
    let e = if upper { 'E' } else { 'e' };
    let s = if exp < 0 { '-' } else { '+' };
    format!("{mantissa}{e}{s}{:02}", exp.unsigned_abs())
}

/// `%g` (and `%v` for floats) on a non-negative value.
///
/// Without a precision the shortest round-tripping digits are used and the
/// exponent form kicks in from `1e+06` upward; with one, the value is rounded
/// to that many significant digits and trailing zeros are dropped.
pub(crate) fn fmt_g(x: f64, prec: Option<usize>, upper: bool) -> String {
    if x.is_nan() {
        return "NaN".to_owned();
    }
    if x.is_infinite() {
        return if x > 0.0 { "+Inf" } else { "-Inf" }.to_owned();
    }
    if x == 0.0 {
        return "0".to_owned();
    }

    let raw = match prec {
        Some(p) => format!("{:.*e}", p.max(1) - 1, x),
        None => format!("{x:e}"),
    };
    let (mantissa, exp) = split_exp(&raw);
    let negative = mantissa.starts_with('-');
    let digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = digits.trim_end_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };
    let nd = digits.len() as i32;

    let eprec = match prec {
        None => 6,
        Some(p) => {
            let p = p.max(1) as i32;
            if p > nd && nd >= exp + 1 { nd } else { p }
        }
    };

    let body = if exp < -4 || exp >= eprec {
        let mut m = digits[..1].to_owned();
        if nd > 1 {
            m.push('.');
            m.push_str(&digits[1..]);
        }
        exp_form(&m, exp, upper)
    } else {
        let decimals = (nd - 1 - exp).max(0) as usize;
        format!("{:.*}", decimals, x.abs())
    };
    if negative { format!("-{body}") } else { body }
}

// ── Strings & padding ─────────────────────────────────────────────────────────

fn truncate(d: &Directive, s: String) -> String {
    match d.precision {
        Some(p) => s.chars().take(p).collect(),
        None => s,
    }
}

fn pad(d: &Directive, body: String, arg: &Arg) -> String {
    let Some(width) = d.width else { return body };
    let len = body.chars().count();
    if len >= width {
        return body;
    }
    let fill = width - len;
    if d.minus {
        return body + &" ".repeat(fill);
    }
    let numeric = matches!(arg, Arg::Int(_) | Arg::Uint(_) | Arg::Float(_))
        && !matches!(d.verb, 'c' | 'q');
    let int_with_precision = matches!(arg, Arg::Int(_) | Arg::Uint(_)) && d.precision.is_some();
    if d.zero && numeric && !int_with_precision && !body.ends_with("Inf") && body != "NaN" {
        // Zeros go between the sign/prefix and the digits.
        let split = sign_and_prefix_len(&body, d);
        let (head, tail) = body.split_at(split);
        return format!("{head}{}{tail}", "0".repeat(fill));
    }
    " ".repeat(fill) + &body
}

fn sign_and_prefix_len(body: &str, d: &Directive) -> usize {
    let mut n = usize::from(body.starts_with(['-', '+', ' ']));
    if d.sharp {
        let rest = &body[n..];
        for prefix in ["0x", "0X", "0b"] {
            if rest.starts_with(prefix) {
                return n + prefix.len();
            }
        }
        if d.verb == 'o' && rest.starts_with('0') {
            n += 1;
        }
    }
    n
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ap(d: &str, a: impl Into<Arg>) -> String {
        apply(d, &a.into()).unwrap()
    }

    #[test]
    fn parse_directive() {
        let d = Directive::parse("%-08.3f").unwrap();
        assert!(d.minus && d.zero);
        assert_eq!(d.width, Some(8));
        assert_eq!(d.precision, Some(3));
        assert_eq!(d.verb, 'f');
        assert_eq!(Directive::parse("%.f").unwrap().precision, Some(0));
    }

    #[test]
    fn malformed_directive() {
        assert!(Directive::parse("%").is_err());
        assert!(Directive::parse("%5").is_err());
        assert!(Directive::parse("%ld").is_err());
        assert!(Directive::parse("d").is_err());
    }

    #[test]
    fn oversized_width_or_precision() {
        assert_eq!(ap("%1000000d", 1).len(), 1_000_000);
        assert_eq!(
            apply("%2000000000d", &Arg::Int(1)).unwrap_err(),
            "width or precision too large in \"%2000000000d\""
        );
        assert!(apply("%.2000000000f", &Arg::Float(1.0)).is_err());
        assert!(apply("%.1000001s", &Arg::from("abc")).is_err());
        assert!(apply("%99999999999999999999999d", &Arg::Int(1)).is_err());
    }

    #[test]
    fn integers() {
        assert_eq!(ap("%d", 42), "42");
        assert_eq!(ap("%+d", 42), "+42");
        assert_eq!(ap("%5d", -42), "  -42");
        assert_eq!(ap("%-5d", 7) + "|", "7    |");
        assert_eq!(ap("%05d", -42), "-0042");
        assert_eq!(ap("%.3d", 5), "005");
        assert_eq!(ap("%x", 255), "ff");
        assert_eq!(ap("%#X", 255), "0XFF");
        assert_eq!(ap("%#o", 8), "010");
        assert_eq!(ap("%b", 5u8), "101");
        assert_eq!(ap("%#08x", 255), "0x0000ff");
        assert_eq!(ap("%d", u64::MAX), "18446744073709551615");
        assert_eq!(ap("%d", i64::MIN), "-9223372036854775808");
    }

    #[test]
    fn floats() {
        assert_eq!(ap("%.2f", 3.1415), "3.14");
        assert_eq!(ap("%f", 1.5), "1.500000");
        assert_eq!(ap("%8.3f", -2.0), "  -2.000");
        assert_eq!(ap("%08.3f", -2.0), "-002.000");
        assert_eq!(ap("%e", 1500.0), "1.500000e+03");
        assert_eq!(ap("%.2E", 0.000123), "1.23E-04");
        assert_eq!(ap("%g", 100000.0), "100000");
        assert_eq!(ap("%g", 1000000.0), "1e+06");
        assert_eq!(ap("%g", 0.0001), "0.0001");
        assert_eq!(ap("%g", 0.00001), "1e-05");
        assert_eq!(ap("%.3g", 3.14159), "3.14");
        assert_eq!(ap("%.3g", 100.0), "100");
        assert_eq!(ap("%.2g", 1234.0), "1.2e+03");
        assert_eq!(ap("%v", 3.1415), "3.1415");
        assert_eq!(ap("%v", 2.0), "2");
        assert_eq!(ap("%f", f64::INFINITY), "+Inf");
    }

    #[test]
    fn strings_and_bools() {
        assert_eq!(ap("%s", "abc"), "abc");
        assert_eq!(ap("%.2s", "abc"), "ab");
        assert_eq!(ap("%5s", "ab"), "   ab");
        assert_eq!(ap("%-5s", "ab") + "|", "ab   |");
        assert_eq!(ap("%x", "hi"), "6869");
        assert_eq!(ap("%t", true), "true");
        assert_eq!(ap("%c", 65), "A");
        assert_eq!(ap("%q", "a b"), "\"a b\"");
        assert_eq!(ap("%v", false), "false");
    }

    #[test]
    fn type_mismatch_is_an_error() {
        assert!(apply("%d", &Arg::from("x")).is_err());
        assert!(apply("%f", &Arg::from(5)).is_err());
        assert!(apply("%s", &Arg::from(5)).is_err());
        assert!(apply("%t", &Arg::from(1)).is_err());
        assert!(apply("%c", &Arg::from(-1)).is_err());
    }

    #[test]
    fn unknown_verb_is_an_error() {
        let err = apply("%z", &Arg::from(1)).unwrap_err();
        assert!(err.contains("unknown verb"), "{err}");
    }
}
