//! Operand values for `expr`, and the string-to-number rules shared with the
//! typed-extraction calls.
//!
//! Every Tcl value is a string; `expr` looks at each operand and treats it as
//! an integer, a double, or plain text.

use std::cmp::Ordering;
use std::fmt;

/// An `expr` operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
}

/// A numeric operand after classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    Int(i64),
    Float(f64),
}

impl Default for Value {
    fn default() -> Self {
        Value::Str(String::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => f.write_str(&format_double(*x)),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl Value {
    /// Classify a string operand.
    pub fn from_operand(s: String) -> Value {
        if let Ok(n) = parse_wide_int(&s) {
            Value::Int(n)
        } else if let Ok(x) = parse_double(&s) {
            Value::Float(x)
        } else {
            Value::Str(s)
        }
    }

    /// Numeric view of the operand, for operator `op`.
    pub fn num(&self, op: &str) -> Result<Num, String> {
        match self {
            Value::Int(n) => Ok(Num::Int(*n)),
            Value::Float(x) => Ok(Num::Float(*x)),
            Value::Str(s) => match Value::from_operand(s.clone()) {
                Value::Int(n) => Ok(Num::Int(n)),
                Value::Float(x) => Ok(Num::Float(x)),
                Value::Str(_) => Err(non_numeric(s, op)),
            },
        }
    }

    /// Integer view of the operand, for operators that reject doubles.
    pub fn int(&self, op: &str) -> Result<i64, String> {
        match self.num(op)? {
            Num::Int(n) => Ok(n),
            Num::Float(_) => Err(format!(
                "can't use floating-point value \"{self}\" as operand of \"{op}\""
            )),
        }
    }

    /// Truth value: numbers are true when non-zero, strings follow the
    /// boolean literal rules.
    pub fn truth(&self) -> Result<bool, String> {
        match self {
            Value::Int(n) => Ok(*n != 0),
            Value::Float(x) => Ok(*x != 0.0),
            Value::Str(s) => parse_boolean(s),
        }
    }

    /// Compare two operands numerically when both are numbers, otherwise as
    /// strings.
    pub fn compare(&self, rhs: &Value) -> Ordering {
        match (self.num(""), rhs.num("")) {
            (Ok(Num::Int(a)), Ok(Num::Int(b))) => a.cmp(&b),
            (Ok(a), Ok(b)) => a.as_f64().partial_cmp(&b.as_f64()).unwrap_or(Ordering::Equal),
            _ => self.to_string().cmp(&rhs.to_string()),
        }
    }
}

impl Num {
    pub fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(x) => x,
        }
    }
}

impl From<Num> for Value {
    fn from(n: Num) -> Self {
        match n {
            Num::Int(n) => Value::Int(n),
            Num::Float(x) => Value::Float(x),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Int(i64::from(b))
    }
}

fn non_numeric(s: &str, op: &str) -> String {
    if s.is_empty() {
        format!("can't use empty string as operand of \"{op}\"")
    } else {
        format!("can't use non-numeric string \"{s}\" as operand of \"{op}\"")
    }
}

// ── String → number rules ─────────────────────────────────────────────────────

/// Parse a Tcl integer: optional surrounding whitespace, optional sign, and
/// a decimal, `0x`, `0o` or `0b` literal. A leading `0` before more digits
/// means octal, as in Tcl 8.6.
///
/// Magnitudes up to `u64::MAX` are accepted and wrap into `i64`, as
/// `Tcl_GetWideIntFromObj` does.
pub fn parse_wide_int(s: &str) -> Result<i64, String> {
    let err = || format!("expected integer but got \"{s}\"");
    let t = s.trim();
    let (negative, digits) = match t.as_bytes().first() {
        Some(b'-') => (true, &t[1..]),
        Some(b'+') => (false, &t[1..]),
        _ => (false, t),
    };
    let (radix, digits) = match digits.get(..2) {
        Some("0x" | "0X") => (16, &digits[2..]),
        Some("0o" | "0O") => (8, &digits[2..]),
        Some("0b" | "0B") => (2, &digits[2..]),
        _ if is_legacy_octal(digits) => (8, &digits[1..]),
        _ => (10, digits),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        if radix == 8 && digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("{} (looks like invalid octal number)", err()));
        }
        return Err(err());
    }
    let magnitude = u64::from_str_radix(digits, radix).map_err(|_| err())?;
    let n = magnitude as i64;
    Ok(if negative { n.wrapping_neg() } else { n })
}

/// `0` followed only by decimal digits.
pub fn is_legacy_octal(digits: &str) -> bool {
    digits.len() > 1 && digits.starts_with('0') && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a Tcl double (integers included).
pub fn parse_double(s: &str) -> Result<f64, String> {
    let err = || format!("expected floating-point number but got \"{s}\"");
    let t = s.trim();
    if t.is_empty() {
        return Err(err());
    }
    match parse_wide_int(t) {
        Ok(n) => return Ok(n as f64),
        Err(_) if is_legacy_octal(t.trim_start_matches(['+', '-'])) => return Err(err()),
        Err(_) => {}
    }
    t.parse::<f64>().map_err(|_| err())
}

/// Parse a Tcl boolean: any number, or a unique prefix of `true`, `false`,
/// `yes`, `no`, and the words `on` / `off`, case-insensitively.
pub fn parse_boolean(s: &str) -> Result<bool, String> {
    if let Ok(x) = parse_double(s) {
        return Ok(x != 0.0);
    }
    let t = s.trim().to_ascii_lowercase();
    let prefix_of = |word: &str| !t.is_empty() && word.starts_with(t.as_str());
    if t == "on" {
        Ok(true)
    } else if t.len() >= 2 && "off".starts_with(t.as_str()) {
        Ok(false)
    } else if prefix_of("true") || prefix_of("yes") {
        Ok(true)
    } else if prefix_of("false") || prefix_of("no") {
        Ok(false)
    } else {
        Err(format!("expected boolean value but got \"{s}\""))
    }
}

/// Tcl's string form of a double: shortest round-trip digits, `.0` on
/// integral values, exponent form outside `1e-4 ..= 1e17`.
pub fn format_double(x: f64) -> String {
    if x.is_nan() {
        return "NaN".to_owned();
    }
    if x.is_infinite() {
        return if x > 0.0 { "Inf" } else { "-Inf" }.to_owned();
    }
    if x == 0.0 {
        return if x.is_sign_negative() { "-0.0" } else { "0.0" }.to_owned();
    }
    let sci = format!("{x:e}");
    let (mantissa, exp) = sci.split_once('e').unwrap_or((&sci, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    if !(-4..17).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exp.unsigned_abs());
    }
    let plain = x.to_string();
    if plain.contains('.') {
        plain
    } else {
        plain + ".0"
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_int_forms() {
        assert_eq!(parse_wide_int("42"), Ok(42));
        assert_eq!(parse_wide_int(" -7 "), Ok(-7));
        assert_eq!(parse_wide_int("+3"), Ok(3));
        assert_eq!(parse_wide_int("0x1f"), Ok(31));
        assert_eq!(parse_wide_int("0b101"), Ok(5));
        assert_eq!(parse_wide_int("0o17"), Ok(15));
        assert_eq!(parse_wide_int("-9223372036854775808"), Ok(i64::MIN));
        assert_eq!(parse_wide_int("18446744073709551615"), Ok(-1));
    }

    #[test]
    fn leading_zero_means_octal() {
        assert_eq!(parse_wide_int("010"), Ok(8));
        assert_eq!(parse_wide_int("-010"), Ok(-8));
        assert_eq!(parse_wide_int("00"), Ok(0));
        assert_eq!(parse_wide_int("0"), Ok(0));
        assert_eq!(
            parse_wide_int("08"),
            Err("expected integer but got \"08\" (looks like invalid octal number)".to_owned())
        );
        assert!(parse_double("09").is_err());
        assert_eq!(parse_double("010"), Ok(8.0));
        assert_eq!(parse_double("09.5"), Ok(9.5));
    }

    #[test]
    fn wide_int_rejects() {
        assert_eq!(
            parse_wide_int("abc"),
            Err("expected integer but got \"abc\"".to_owned())
        );
        assert!(parse_wide_int("1.5").is_err());
        assert!(parse_wide_int("").is_err());
        assert!(parse_wide_int("-").is_err());
        assert!(parse_wide_int("18446744073709551616").is_err());
    }

    #[test]
    fn doubles() {
        assert_eq!(parse_double("2.5"), Ok(2.5));
        assert_eq!(parse_double("3"), Ok(3.0));
        assert_eq!(parse_double("1e3"), Ok(1000.0));
        assert!(parse_double("x").is_err());
        assert!(parse_double(".").is_err());
    }

    #[test]
    fn booleans() {
        for t in ["1", "true", "TRUE", "t", "yes", "y", "on", "2.5"] {
            assert_eq!(parse_boolean(t), Ok(true), "{t}");
        }
        for f in ["0", "false", "f", "no", "n", "off", "of", "0.0"] {
            assert_eq!(parse_boolean(f), Ok(false), "{f}");
        }
        assert!(parse_boolean("o").is_err());
        assert!(parse_boolean("maybe").is_err());
        assert!(parse_boolean("").is_err());
    }

    #[test]
    fn double_formatting() {
        assert_eq!(format_double(3.0), "3.0");
        assert_eq!(format_double(0.1), "0.1");
        assert_eq!(format_double(-2.5), "-2.5");
        assert_eq!(format_double(1e20), "1e+20");
        assert_eq!(format_double(1.5e-7), "1.5e-07");
        assert_eq!(format_double(0.0001), "0.0001");
    }

    #[test]
    fn operand_classification() {
        assert_eq!(Value::from_operand("12".into()), Value::Int(12));
        assert_eq!(Value::from_operand("1.5".into()), Value::Float(1.5));
        assert_eq!(Value::from_operand("abc".into()), Value::Str("abc".into()));
    }

    #[test]
    fn truthiness() {
        assert_eq!(Value::Int(0).truth(), Ok(false));
        assert_eq!(Value::Float(0.5).truth(), Ok(true));
        assert_eq!(Value::Str("yes".into()).truth(), Ok(true));
        assert!(Value::Str("xyz".into()).truth().is_err());
    }

    #[test]
    fn comparisons() {
        assert_eq!(Value::Int(2).compare(&Value::Str("10".into())), Ordering::Less);
        assert_eq!(Value::Str("b".into()).compare(&Value::Str("a".into())), Ordering::Greater);
        assert_eq!(Value::Float(2.0).compare(&Value::Int(2)), Ordering::Equal);
    }

    #[test]
    fn non_numeric_operand_message() {
        let err = Value::Str("abc".into()).num("+").unwrap_err();
        assert_eq!(err, "can't use non-numeric string \"abc\" as operand of \"+\"");
    }
}
