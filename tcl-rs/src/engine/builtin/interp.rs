//! Word parsing, substitution, variables and procedure calls for the builtin
//! engine.
//!
//! A script is evaluated straight from its text: each command is split into
//! words, `$`, `[...]` and backslash substitutions are applied while the
//! words are collected, and the first word selects a procedure or a builtin
//! command.

use std::collections::HashMap;
use std::sync::Arc;

use super::commands;
use super::expr::EvalContext;
use super::list::{self, backslash};

/// Nesting limit for script evaluation (procedure bodies, `[...]`, loop
/// bodies).
const MAX_NESTING: usize = 256;

/// Non-normal completion of a script.
#[derive(Debug, Clone, PartialEq)]
pub enum Exception {
    Error(String),
    Return(String),
    Break,
    Continue,
}

impl From<String> for Exception {
    fn from(msg: String) -> Self {
        Exception::Error(msg)
    }
}

impl From<&str> for Exception {
    fn from(msg: &str) -> Self {
        Exception::Error(msg.to_owned())
    }
}

/// Result of evaluating a command or script.
pub type Outcome = Result<String, Exception>;

/// A user-defined procedure.
#[derive(Debug)]
pub struct Proc {
    /// Parameter names with optional default values.
    pub params: Vec<(String, Option<String>)>,
    pub body: String,
}

#[derive(Debug, Default)]
struct Frame {
    vars: HashMap<String, String>,
    /// Local names bound to global variables by `global`.
    links: HashMap<String, String>,
}

/// Where a substitution run stops.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Stop {
    /// At the closing `"` of a quoted word.
    Quote,
    /// At the end of a bare word.
    Bare { nested: bool },
    /// At the `)` closing an array index.
    Index,
    /// At the end of the text.
    End,
}

#[derive(Debug)]
pub struct Interp {
    /// Call frames; `frames[0]` is the global frame and is never popped.
    frames: Vec<Frame>,
    procs: HashMap<String, Arc<Proc>>,
    level: usize,
}

impl Default for Interp {
    fn default() -> Self {
        Interp {
            frames: vec![Frame::default()],
            procs: HashMap::new(),
            level: 0,
        }
    }
}

impl Interp {
    /// Evaluate `script` in the current frame.
    pub fn eval(&mut self, script: &str) -> Outcome {
        self.nest(|interp| interp.run(script, 0, false).map(|(result, _)| result))
    }

    /// Apply `$`, `[...]` and backslash substitution to all of `text`.
    pub fn subst_text(&mut self, text: &str) -> Result<String, Exception> {
        self.subst(text, 0, Stop::End).map(|(out, _)| out)
    }

    /// Invoke one already-substituted command.
    pub fn invoke(&mut self, words: &[String]) -> Outcome {
        let Some(name) = words.first() else {
            return Ok(String::new());
        };
        if let Some(proc) = self.procs.get(name).cloned() {
            return self.call_proc(name, &proc, &words[1..]);
        }
        commands::dispatch(self, words)
            .unwrap_or_else(|| Err(format!("invalid command name \"{name}\"").into()))
    }

    fn nest<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, Exception>,
    ) -> Result<T, Exception> {
        if self.level >= MAX_NESTING {
            return Err("too many nested evaluations (infinite loop?)".into());
        }
        self.level += 1;
        let result = f(self);
        self.level -= 1;
        result
    }

    // ── Parsing ───────────────────────────────────────────────────────────────

    /// Run commands from `pos`. When `nested`, the run is the body of a
    /// `[...]` substitution and ends after the matching `]`.
    fn run(&mut self, src: &str, mut pos: usize, nested: bool) -> Result<(String, usize), Exception> {
        let bytes = src.as_bytes();
        let mut result = String::new();
        loop {
            pos = skip_separators(bytes, pos);
            let Some(&b) = bytes.get(pos) else {
                if nested {
                    return Err("missing close-bracket".into());
                }
                return Ok((result, pos));
            };
            if nested && b == b']' {
                return Ok((result, pos + 1));
            }
            if b == b'#' {
                pos = skip_comment(bytes, pos);
                continue;
            }
            let (words, next) = self.parse_command(src, pos, nested)?;
            pos = next;
            if !words.is_empty() {
                result = self.invoke(&words)?;
            }
        }
    }

    fn parse_command(
        &mut self,
        src: &str,
        mut pos: usize,
        nested: bool,
    ) -> Result<(Vec<String>, usize), Exception> {
        let bytes = src.as_bytes();
        let mut words = Vec::new();
        loop {
            while pos < bytes.len() {
                match bytes[pos] {
                    b' ' | b'\t' | b'\r' => pos += 1,
                    b'\\' if bytes.get(pos + 1) == Some(&b'\n') => pos += 2,
                    _ => break,
                }
            }
            match bytes.get(pos) {
                None => return Ok((words, pos)),
                Some(b'\n' | b';') => return Ok((words, pos + 1)),
                Some(b']') if nested => return Ok((words, pos)),
                _ => {}
            }

            let expand = src[pos..].starts_with("{*}")
                && bytes.get(pos + 3).is_some_and(|&b| !is_word_end(b, nested));
            if expand {
                pos += 3;
            }
            let (word, next) = self.parse_word(src, pos, nested)?;
            pos = next;
            if expand {
                words.extend(list::parse_list(&word)?);
            } else {
                words.push(word);
            }
        }
    }

    fn parse_word(&mut self, src: &str, pos: usize, nested: bool) -> Result<(String, usize), Exception> {
        let bytes = src.as_bytes();
        match bytes[pos] {
            b'{' => {
                let close = matching_brace(bytes, pos).ok_or("missing close-brace")?;
                check_word_end(bytes, close + 1, nested, "close-brace")?;
                Ok((src[pos + 1..close].to_owned(), close + 1))
            }
            b'"' => {
                let (word, close) = self.subst(src, pos + 1, Stop::Quote)?;
                check_word_end(bytes, close + 1, nested, "close-quote")?;
                Ok((word, close + 1))
            }
            _ => self.subst(src, pos, Stop::Bare { nested }),
        }
    }

    /// Substitute from `pos` until `stop`; returns the text and the index of
    /// the stopping character.
    fn subst(&mut self, src: &str, mut pos: usize, stop: Stop) -> Result<(String, usize), Exception> {
        let bytes = src.as_bytes();
        let mut out = String::new();
        let mut lit = pos;
        loop {
            let Some(&b) = bytes.get(pos) else {
                return match stop {
                    Stop::Quote => Err("missing \"".into()),
                    Stop::Index => Err("missing )".into()),
                    Stop::Bare { .. } | Stop::End => {
                        out.push_str(&src[lit..pos]);
                        Ok((out, pos))
                    }
                };
            };
            let at_stop = match stop {
                Stop::Quote => b == b'"',
                Stop::Index => b == b')',
                Stop::Bare { nested } => {
                    is_word_end(b, nested) || (b == b'\\' && bytes.get(pos + 1) == Some(&b'\n'))
                }
                Stop::End => false,
            };
            if at_stop {
                out.push_str(&src[lit..pos]);
                return Ok((out, pos));
            }
            match b {
                b'$' => {
                    out.push_str(&src[lit..pos]);
                    let (value, next) = self.subst_var(src, pos)?;
                    out.push_str(&value);
                    pos = next;
                    lit = pos;
                }
                b'[' => {
                    out.push_str(&src[lit..pos]);
                    let (value, next) = self.nest(|interp| interp.run(src, pos + 1, true))?;
                    out.push_str(&value);
                    pos = next;
                    lit = pos;
                }
                b'\\' => {
                    out.push_str(&src[lit..pos]);
                    let (text, next) = backslash(src, pos);
                    out.push_str(&text);
                    pos = next;
                    lit = pos;
                }
                _ => pos += 1,
            }
        }
    }

    /// Substitute the variable reference starting at the `$` at `pos`.
    fn subst_var(&mut self, src: &str, pos: usize) -> Result<(String, usize), Exception> {
        let bytes = src.as_bytes();
        let start = pos + 1;
        if bytes.get(start) == Some(&b'{') {
            let close = src[start..]
                .find('}')
                .map(|i| start + i)
                .ok_or("missing close-brace for variable name")?;
            let value = self.get_var(&src[start + 1..close])?;
            return Ok((value, close + 1));
        }

        let end = scan_var_name(bytes, start);
        if end == start {
            return Ok(("$".to_owned(), start));
        }
        let name = &src[start..end];
        if bytes.get(end) == Some(&b'(') {
            let (index, close) = self.subst(src, end + 1, Stop::Index)?;
            let value = self.get_var(&format!("{name}({index})"))?;
            return Ok((value, close + 1));
        }
        Ok((self.get_var(name)?, end))
    }

    // ── Variables ─────────────────────────────────────────────────────────────

    /// Resolve `name` to the frame that holds it and the key inside that
    /// frame, following `global` links and `::` qualification.
    fn locate(&self, name: &str) -> (usize, String) {
        if let Some(global) = name.strip_prefix("::") {
            return (0, global.to_owned());
        }
        let top = self.frames.len() - 1;
        let (base, index) = split_array(name);
        match self.frames[top].links.get(base) {
            Some(target) => (0, format!("{target}{index}")),
            None => (top, name.to_owned()),
        }
    }

    pub fn get_var(&self, name: &str) -> Result<String, String> {
        let (frame, key) = self.locate(name);
        self.frames[frame]
            .vars
            .get(&key)
            .cloned()
            .ok_or_else(|| format!("can't read \"{name}\": no such variable"))
    }

    pub fn set_var(&mut self, name: &str, value: String) -> String {
        let (frame, key) = self.locate(name);
        self.frames[frame].vars.insert(key, value.clone());
        value
    }

    pub fn var_exists(&self, name: &str) -> bool {
        let (frame, key) = self.locate(name);
        self.frames[frame].vars.contains_key(&key)
    }

    /// Remove a variable; unsetting an array name removes all its elements.
    pub fn unset_var(&mut self, name: &str) -> Result<(), String> {
        let (frame, key) = self.locate(name);
        let vars = &mut self.frames[frame].vars;
        let mut found = vars.remove(&key).is_some();
        let prefix = format!("{key}(");
        let before = vars.len();
        vars.retain(|k, _| !(k.starts_with(&prefix) && k.ends_with(')')));
        found |= vars.len() != before;
        if found {
            Ok(())
        } else {
            Err(format!("can't unset \"{name}\": no such variable"))
        }
    }

    /// Bind a local name to the global variable of the same name. A no-op at
    /// global level.
    pub fn link_global(&mut self, name: &str) {
        let top = self.frames.len() - 1;
        if top > 0 {
            let name = name.strip_prefix("::").unwrap_or(name);
            self.frames[top].links.insert(name.to_owned(), name.to_owned());
        }
    }

    // ── Procedures ────────────────────────────────────────────────────────────

    pub fn define_proc(&mut self, name: &str, params: &str, body: &str) -> Result<(), String> {
        let mut parsed = Vec::new();
        for spec in list::parse_list(params)? {
            let fields = list::parse_list(&spec)?;
            match fields.as_slice() {
                [] => return Err("argument with no name".into()),
                [param] => parsed.push((param.clone(), None)),
                [param, default] => parsed.push((param.clone(), Some(default.clone()))),
                _ => return Err(format!("too many fields in argument specifier \"{spec}\"")),
            }
        }
        self.procs.insert(
            name.to_owned(),
            Arc::new(Proc {
                params: parsed,
                body: body.to_owned(),
            }),
        );
        Ok(())
    }

    pub fn proc(&self, name: &str) -> Option<&Proc> {
        self.procs.get(name).map(|p| p.as_ref())
    }

    pub fn proc_names(&self) -> impl Iterator<Item = &str> {
        self.procs.keys().map(String::as_str)
    }

    fn call_proc(&mut self, name: &str, proc: &Proc, args: &[String]) -> Outcome {
        let variadic = proc.params.last().is_some_and(|(p, _)| p == "args");
        let fixed = if variadic {
            &proc.params[..proc.params.len() - 1]
        } else {
            &proc.params[..]
        };
        if !variadic && args.len() > fixed.len() {
            return Err(proc_usage(name, proc).into());
        }

        let mut frame = Frame::default();
        for (i, (param, default)) in fixed.iter().enumerate() {
            let Some(value) = args.get(i).or(default.as_ref()) else {
                return Err(proc_usage(name, proc).into());
            };
            frame.vars.insert(param.clone(), value.clone());
        }
        if variadic {
            let rest = args.get(fixed.len()..).unwrap_or(&[]);
            frame.vars.insert("args".to_owned(), list::format_list(rest));
        }

        self.frames.push(frame);
        let result = self.eval(&proc.body);
        self.frames.pop();
        match result {
            Ok(value) | Err(Exception::Return(value)) => Ok(value),
            Err(Exception::Break) => Err("invoked \"break\" outside of a loop".into()),
            Err(Exception::Continue) => Err("invoked \"continue\" outside of a loop".into()),
            Err(e) => Err(e),
        }
    }
}

impl EvalContext for Interp {
    fn subst(&mut self, text: &str) -> Result<String, Exception> {
        self.subst_text(text)
    }

    fn eval_script(&mut self, script: &str) -> Outcome {
        self.eval(script)
    }
}

fn proc_usage(name: &str, proc: &Proc) -> String {
    let mut usage = name.to_owned();
    let last = proc.params.len().saturating_sub(1);
    for (i, (param, default)) in proc.params.iter().enumerate() {
        usage.push(' ');
        if param == "args" && i == last {
            usage.push_str("?arg ...?");
        } else if default.is_some() {
            usage.push_str(&format!("?{param}?"));
        } else {
            usage.push_str(param);
        }
    }
    format!("wrong # args: should be \"{usage}\"")
}

// ── Scanning helpers ──────────────────────────────────────────────────────────

fn is_word_end(b: u8, nested: bool) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b';') || (nested && b == b']')
}

fn check_word_end(bytes: &[u8], pos: usize, nested: bool, what: &str) -> Result<(), String> {
    match bytes.get(pos) {
        Some(&b) if !is_word_end(b, nested) && b != b'\\' => {
            Err(format!("extra characters after {what}"))
        }
        _ => Ok(()),
    }
}

fn skip_separators(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() {
        match bytes[pos] {
            b' ' | b'\t' | b'\r' | b'\n' | b';' => pos += 1,
            b'\\' if bytes.get(pos + 1) == Some(&b'\n') => pos += 2,
            _ => break,
        }
    }
    pos
}

fn skip_comment(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'\n' => return pos + 1,
            _ => pos += 1,
        }
    }
    bytes.len()
}

/// Index of the brace closing the one at `open`, honouring nesting and
/// backslash escapes.
pub(crate) fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// End of the variable name starting at `start`: letters, digits, `_` and
/// `::` separators.
pub(crate) fn scan_var_name(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() {
        match bytes[end] {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' => end += 1,
            b':' if bytes.get(end + 1) == Some(&b':') => end += 2,
            _ => break,
        }
    }
    end
}

/// Split `a(idx)` into `("a", "(idx)")`; scalars give an empty index.
fn split_array(name: &str) -> (&str, &str) {
    if name.ends_with(')') {
        if let Some(open) = name.find('(') {
            return name.split_at(open);
        }
    }
    (name, "")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(script: &str) -> Outcome {
        Interp::default().eval(script)
    }

    #[test]
    fn words_and_substitution() {
        let mut interp = Interp::default();
        interp.eval("set x 5").unwrap();
        assert_eq!(interp.eval("set y \"x is $x\"").unwrap(), "x is 5");
        assert_eq!(interp.eval("set y {x is $x}").unwrap(), "x is $x");
        assert_eq!(interp.eval("set y ${x}0").unwrap(), "50");
        assert_eq!(interp.eval("set y [set x]").unwrap(), "5");
        assert_eq!(interp.eval("set y a\\tb").unwrap(), "a\tb");
    }

    #[test]
    fn separators_and_comments() {
        let script = "# leading comment\nset a 1; set b 2\n  # indented \\\n continued\nset c 3";
        let mut interp = Interp::default();
        assert_eq!(interp.eval(script).unwrap(), "3");
        assert_eq!(interp.get_var("b").unwrap(), "2");
    }

    #[test]
    fn nested_command_substitution() {
        assert_eq!(eval("set x [set y [set z 7]]").unwrap(), "7");
        assert_eq!(eval("set x a[set y b]c").unwrap(), "abc");
        assert_eq!(eval("set x [set y 1; set z 2]").unwrap(), "2");
    }

    #[test]
    fn array_elements() {
        let mut interp = Interp::default();
        interp.eval("set i 2; set a(2) two").unwrap();
        assert_eq!(interp.eval("set a($i)").unwrap(), "two");
        assert_eq!(interp.eval("set r $a($i)").unwrap(), "two");
        interp.eval("unset a").unwrap();
        assert!(!interp.var_exists("a(2)"));
    }

    #[test]
    fn argument_expansion() {
        assert_eq!(eval("list {*}{a b} c").unwrap(), "a b c");
        assert_eq!(eval("llength [list {*}{} x]").unwrap(), "1");
    }

    #[test]
    fn parse_errors() {
        assert_eq!(eval("set x {a}b"), Err(Exception::Error("extra characters after close-brace".into())));
        assert_eq!(eval("set x \"a\"b"), Err(Exception::Error("extra characters after close-quote".into())));
        assert_eq!(eval("set x [set y 1"), Err(Exception::Error("missing close-bracket".into())));
        assert_eq!(eval("set x \"abc"), Err(Exception::Error("missing \"".into())));
        assert_eq!(eval("set x {abc"), Err(Exception::Error("missing close-brace".into())));
    }

    #[test]
    fn unknown_variable_and_command() {
        assert_eq!(
            eval("set x $nope"),
            Err(Exception::Error("can't read \"nope\": no such variable".into()))
        );
        assert_eq!(
            eval("frobnicate 1"),
            Err(Exception::Error("invalid command name \"frobnicate\"".into()))
        );
    }

    #[test]
    fn lone_dollar_is_literal() {
        assert_eq!(eval("set x $").unwrap(), "$");
        assert_eq!(eval("set x a$ b").unwrap_err(), Exception::Error("wrong # args: should be \"set varName ?newValue?\"".into()));
    }

    #[test]
    fn procedures_with_defaults_and_args() {
        let mut interp = Interp::default();
        interp
            .eval("proc greet {name {greeting hello} args} { return \"$greeting $name [llength $args]\" }")
            .unwrap();
        assert_eq!(interp.eval("greet bob").unwrap(), "hello bob 0");
        assert_eq!(interp.eval("greet bob hi 1 2").unwrap(), "hi bob 2");
        assert_eq!(
            interp.eval("greet"),
            Err(Exception::Error(
                "wrong # args: should be \"greet name ?greeting? ?arg ...?\"".into()
            ))
        );
    }

    #[test]
    fn procedure_scopes_and_globals() {
        let mut interp = Interp::default();
        interp.eval("set counter 10").unwrap();
        interp.eval("proc bump {} { global counter; incr counter }").unwrap();
        interp.eval("proc local {} { set counter 1 }").unwrap();
        assert_eq!(interp.eval("bump").unwrap(), "11");
        assert_eq!(interp.eval("local").unwrap(), "1");
        assert_eq!(interp.get_var("counter").unwrap(), "11");
        interp.eval("proc qualified {} { set ::other 3 }").unwrap();
        interp.eval("qualified").unwrap();
        assert_eq!(interp.get_var("other").unwrap(), "3");
    }

    #[test]
    fn recursion_and_nesting_limit() {
        let mut interp = Interp::default();
        interp
            .eval("proc fact {n} { if {$n <= 1} { return 1 }; expr {$n * [fact [expr {$n - 1}]]} }")
            .unwrap();
        assert_eq!(interp.eval("fact 10").unwrap(), "3628800");

        interp.eval("proc forever {} { forever }").unwrap();
        let err = interp.eval("forever").unwrap_err();
        assert_eq!(err, Exception::Error("too many nested evaluations (infinite loop?)".into()));
    }

    #[test]
    fn break_outside_loop_in_proc() {
        let mut interp = Interp::default();
        interp.eval("proc p {} { break }").unwrap();
        assert_eq!(
            interp.eval("p"),
            Err(Exception::Error("invoked \"break\" outside of a loop".into()))
        );
    }
}
