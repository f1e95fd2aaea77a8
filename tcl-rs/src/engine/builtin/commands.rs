//! Builtin commands.
//!
//! Each command receives its already-substituted arguments (the command name
//! excluded) and returns an [`Outcome`].

use std::cmp::Ordering;
use std::io::Write;
use std::time::Duration;

use super::expr;
use super::interp::{Exception, Interp, Outcome};
use super::list::{format_list, parse_list};
use super::value::parse_wide_int;

/// Names of every builtin command, for `info commands`.
pub const COMMANDS: &[&str] = &[
    "after", "append", "break", "catch", "concat", "continue", "error", "eval", "expr", "for",
    "foreach", "global", "if", "incr", "info", "join", "lappend", "lindex", "list", "llength",
    "lrange", "proc", "puts", "return", "set", "split", "string", "unset", "while",
];

/// Dispatch a builtin command.
///
/// Returns `None` if `words[0]` is not a builtin.
pub fn dispatch(interp: &mut Interp, words: &[String]) -> Option<Outcome> {
    let args = &words[1..];
    Some(match words[0].as_str() {
        "after" => cmd_after(args),
        "append" => cmd_append(interp, args),
        "break" => arity(args, 0, 0, "break").and(Err(Exception::Break)),
        "catch" => cmd_catch(interp, args),
        "concat" => Ok(concat(args)),
        "continue" => arity(args, 0, 0, "continue").and(Err(Exception::Continue)),
        "error" => cmd_error(args),
        "eval" => cmd_eval(interp, args),
        "expr" => cmd_expr(interp, args),
        "for" => cmd_for(interp, args),
        "foreach" => cmd_foreach(interp, args),
        "global" => {
            for name in args {
                interp.link_global(name);
            }
            Ok(String::new())
        }
        "if" => cmd_if(interp, args),
        "incr" => cmd_incr(interp, args),
        "info" => cmd_info(interp, args),
        "join" => cmd_join(args),
        "lappend" => cmd_lappend(interp, args),
        "lindex" => cmd_lindex(args),
        "list" => Ok(format_list(args)),
        "llength" => cmd_llength(args),
        "lrange" => cmd_lrange(args),
        "proc" => cmd_proc(interp, args),
        "puts" => cmd_puts(args),
        "return" => cmd_return(args),
        "set" => cmd_set(interp, args),
        "split" => cmd_split(args),
        "string" => cmd_string(args),
        "unset" => cmd_unset(interp, args),
        "while" => cmd_while(interp, args),
        _ => return None,
    })
}

fn arity(args: &[String], min: usize, max: usize, usage: &str) -> Result<(), Exception> {
    if args.len() < min || args.len() > max {
        Err(format!("wrong # args: should be \"{usage}\"").into())
    } else {
        Ok(())
    }
}

fn truth(interp: &mut Interp, cond: &str) -> Result<bool, Exception> {
    Ok(expr::eval_str(cond, interp)?.truth()?)
}

/// Run a loop body; `Ok(false)` means the loop should stop.
fn run_body(interp: &mut Interp, body: &str) -> Result<bool, Exception> {
    match interp.eval(body) {
        Ok(_) | Err(Exception::Continue) => Ok(true),
        Err(Exception::Break) => Ok(false),
        Err(e) => Err(e),
    }
}

// ── Variables ─────────────────────────────────────────────────────────────────

fn cmd_set(interp: &mut Interp, args: &[String]) -> Outcome {
    arity(args, 1, 2, "set varName ?newValue?")?;
    match args.get(1) {
        Some(value) => Ok(interp.set_var(&args[0], value.clone())),
        None => Ok(interp.get_var(&args[0])?),
    }
}

fn cmd_unset(interp: &mut Interp, args: &[String]) -> Outcome {
    let (nocomplain, names) = match args.first().map(String::as_str) {
        Some("-nocomplain") => (true, &args[1..]),
        _ => (false, args),
    };
    for name in names {
        match interp.unset_var(name) {
            Err(e) if !nocomplain => return Err(e.into()),
            _ => {}
        }
    }
    Ok(String::new())
}

fn cmd_incr(interp: &mut Interp, args: &[String]) -> Outcome {
    arity(args, 1, 2, "incr varName ?increment?")?;
    let amount = match args.get(1) {
        Some(a) => parse_wide_int(a)?,
        None => 1,
    };
    let current = match interp.get_var(&args[0]) {
        Ok(v) => parse_wide_int(&v)?,
        Err(_) => 0,
    };
    Ok(interp.set_var(&args[0], current.wrapping_add(amount).to_string()))
}

fn cmd_append(interp: &mut Interp, args: &[String]) -> Outcome {
    arity(args, 1, usize::MAX, "append varName ?value ...?")?;
    let mut value = interp.get_var(&args[0]).unwrap_or_default();
    for piece in &args[1..] {
        value.push_str(piece);
    }
    Ok(interp.set_var(&args[0], value))
}

// ── Control flow ──────────────────────────────────────────────────────────────

fn cmd_if(interp: &mut Interp, args: &[String]) -> Outcome {
    let mut i = 0;
    loop {
        let cond = args
            .get(i)
            .ok_or("wrong # args: no expression after \"if\" argument")?;
        i += 1;
        if args.get(i).map(String::as_str) == Some("then") {
            i += 1;
        }
        let body = args
            .get(i)
            .ok_or_else(|| format!("wrong # args: no script following \"{cond}\" argument"))?;
        i += 1;
        let chosen = truth(interp, cond)?;
        if chosen {
            return interp.eval(body);
        }
        match args.get(i).map(String::as_str) {
            None => return Ok(String::new()),
            Some("elseif") => i += 1,
            Some("else") => {
                let body = args
                    .get(i + 1)
                    .ok_or("wrong # args: no script following \"else\" argument")?;
                if i + 2 != args.len() {
                    return Err("wrong # args: extra words after \"else\" clause in \"if\" command".into());
                }
                return interp.eval(body);
            }
            Some(body) if i + 1 == args.len() => return interp.eval(body),
            Some(_) => {
                return Err("wrong # args: extra words after \"else\" clause in \"if\" command".into())
            }
        }
    }
}

fn cmd_while(interp: &mut Interp, args: &[String]) -> Outcome {
    arity(args, 2, 2, "while test command")?;
    while truth(interp, &args[0])? {
        if !run_body(interp, &args[1])? {
            break;
        }
    }
    Ok(String::new())
}

fn cmd_for(interp: &mut Interp, args: &[String]) -> Outcome {
    arity(args, 4, 4, "for start test next command")?;
    interp.eval(&args[0])?;
    while truth(interp, &args[1])? {
        if !run_body(interp, &args[3])? {
            break;
        }
        match interp.eval(&args[2]) {
            Ok(_) => {}
            Err(Exception::Break) => break,
            Err(e) => return Err(e),
        }
    }
    Ok(String::new())
}

fn cmd_foreach(interp: &mut Interp, args: &[String]) -> Outcome {
    if args.len() < 3 || args.len() % 2 == 0 {
        return Err("wrong # args: should be \"foreach varList list ?varList list ...? command\"".into());
    }
    let body = &args[args.len() - 1];
    let mut pairs = Vec::new();
    for pair in args[..args.len() - 1].chunks(2) {
        let vars = parse_list(&pair[0])?;
        if vars.is_empty() {
            return Err("foreach varlist is empty".into());
        }
        pairs.push((vars, parse_list(&pair[1])?));
    }
    let rounds = pairs
        .iter()
        .map(|(vars, items)| items.len().div_ceil(vars.len()))
        .max()
        .unwrap_or(0);

    for round in 0..rounds {
        for (vars, items) in &pairs {
            for (j, var) in vars.iter().enumerate() {
                let item = items.get(round * vars.len() + j).cloned().unwrap_or_default();
                interp.set_var(var, item);
            }
        }
        if !run_body(interp, body)? {
            break;
        }
    }
    Ok(String::new())
}

fn cmd_proc(interp: &mut Interp, args: &[String]) -> Outcome {
    arity(args, 3, 3, "proc name args body")?;
    interp.define_proc(&args[0], &args[1], &args[2])?;
    Ok(String::new())
}

fn cmd_return(args: &[String]) -> Outcome {
    arity(args, 0, 1, "return ?value?")?;
    Err(Exception::Return(args.first().cloned().unwrap_or_default()))
}

fn cmd_error(args: &[String]) -> Outcome {
    arity(args, 1, 3, "error message ?errorInfo? ?errorCode?")?;
    Err(Exception::Error(args[0].clone()))
}

fn cmd_catch(interp: &mut Interp, args: &[String]) -> Outcome {
    arity(args, 1, 2, "catch script ?resultVarName?")?;
    let (code, value) = match interp.eval(&args[0]) {
        Ok(v) => (0, v),
        Err(Exception::Error(msg)) => (1, msg),
        Err(Exception::Return(v)) => (2, v),
        Err(Exception::Break) => (3, String::new()),
        Err(Exception::Continue) => (4, String::new()),
    };
    if let Some(var) = args.get(1) {
        interp.set_var(var, value);
    }
    Ok(code.to_string())
}

fn cmd_eval(interp: &mut Interp, args: &[String]) -> Outcome {
    arity(args, 1, usize::MAX, "eval arg ?arg ...?")?;
    interp.eval(&concat(args))
}

fn cmd_expr(interp: &mut Interp, args: &[String]) -> Outcome {
    arity(args, 1, usize::MAX, "expr arg ?arg ...?")?;
    Ok(expr::eval_str(&args.join(" "), interp)?.to_string())
}

fn cmd_after(args: &[String]) -> Outcome {
    arity(args, 1, 1, "after ms")?;
    let ms = parse_wide_int(&args[0])?;
    std::thread::sleep(Duration::from_millis(u64::try_from(ms).unwrap_or(0)));
    Ok(String::new())
}

fn cmd_puts(args: &[String]) -> Outcome {
    arity(args, 1, 3, "puts ?-nonewline? ?channelId? string")?;
    let (newline, rest) = match args[0].as_str() {
        "-nonewline" if args.len() > 1 => (false, &args[1..]),
        _ => (true, args),
    };
    let (channel, text) = match rest {
        [text] => ("stdout", text),
        [channel, text] => (channel.as_str(), text),
        _ => return Err("wrong # args: should be \"puts ?-nonewline? ?channelId? string\"".into()),
    };
    let end = if newline { "\n" } else { "" };
    let written = match channel {
        "stdout" => write!(std::io::stdout().lock(), "{text}{end}"),
        "stderr" => write!(std::io::stderr().lock(), "{text}{end}"),
        other => return Err(format!("can not find channel named \"{other}\"").into()),
    };
    written.map_err(|e| format!("error writing \"{channel}\": {e}"))?;
    Ok(String::new())
}

// ── Info ──────────────────────────────────────────────────────────────────────

fn cmd_info(interp: &mut Interp, args: &[String]) -> Outcome {
    let sub = args.first().map(String::as_str).unwrap_or("");
    let rest = args.get(1..).unwrap_or(&[]);
    match sub {
        "exists" => {
            arity(rest, 1, 1, "info exists varName")?;
            Ok(u8::from(interp.var_exists(&rest[0])).to_string())
        }
        "procs" | "commands" => {
            arity(rest, 0, 1, &format!("info {sub} ?pattern?"))?;
            let pattern = rest.first().map(String::as_str).unwrap_or("*");
            let mut names: Vec<&str> = interp.proc_names().collect();
            if sub == "commands" {
                names.extend(COMMANDS);
            }
            names.retain(|n| glob_match(pattern, n, false));
            names.sort_unstable();
            names.dedup();
            Ok(format_list(&names))
        }
        "body" | "args" => {
            arity(rest, 1, 1, &format!("info {sub} procname"))?;
            let proc = interp
                .proc(&rest[0])
                .ok_or_else(|| format!("\"{}\" isn't a procedure", rest[0]))?;
            Ok(if sub == "body" {
                proc.body.clone()
            } else {
                let names: Vec<&str> = proc.params.iter().map(|(p, _)| p.as_str()).collect();
                format_list(&names)
            })
        }
        _ => Err(format!(
            "unknown or ambiguous subcommand \"{sub}\": must be args, body, commands, exists, or procs"
        )
        .into()),
    }
}

// ── Lists ─────────────────────────────────────────────────────────────────────

/// Resolve an index spec (`N`, `end`, `end-N`, `N+M`, `N-M`) against a
/// sequence of `len` items. The result may lie outside `0..len`.
fn index_value(spec: &str, len: usize) -> Result<i64, String> {
    let bad = || format!("bad index \"{spec}\": must be integer?[+-]integer? or end?[+-]integer?");
    let len = i64::try_from(len).map_err(|_| bad())?;
    let (base, offset) = match spec.strip_prefix("end") {
        Some(rest) => (len - 1, rest),
        None => {
            let split = spec
                .char_indices()
                .skip(1)
                .find(|&(_, c)| c == '+' || c == '-')
                .map(|(i, _)| i)
                .unwrap_or(spec.len());
            let base = parse_wide_int(&spec[..split]).map_err(|_| bad())?;
            (base, &spec[split..])
        }
    };
    let offset = match offset.chars().next() {
        None => 0,
        Some('+' | '-') => parse_wide_int(offset).map_err(|_| bad())?,
        Some(_) => return Err(bad()),
    };
    Ok(base.wrapping_add(offset))
}

/// Resolve an index spec to an in-range position, `None` when outside.
fn resolve_index(spec: &str, len: usize) -> Result<Option<usize>, String> {
    let index = index_value(spec, len)?;
    Ok(usize::try_from(index).ok().filter(|&i| i < len))
}

fn cmd_llength(args: &[String]) -> Outcome {
    arity(args, 1, 1, "llength list")?;
    Ok(parse_list(&args[0])?.len().to_string())
}

fn cmd_lindex(args: &[String]) -> Outcome {
    arity(args, 1, usize::MAX, "lindex list ?index ...?")?;
    let mut current = args[0].clone();
    for spec in &args[1..] {
        let items = parse_list(&current)?;
        match resolve_index(spec, items.len())? {
            Some(i) => current = items[i].clone(),
            None => return Ok(String::new()),
        }
    }
    Ok(current)
}

fn cmd_lrange(args: &[String]) -> Outcome {
    arity(args, 3, 3, "lrange list first last")?;
    let items = parse_list(&args[0])?;
    let (first, last) = range_bounds(&args[1], &args[2], items.len())?;
    Ok(format_list(&items[first..last]))
}

/// Half-open range for `first`/`last` index specs, empty when reversed.
fn range_bounds(first: &str, last: &str, len: usize) -> Result<(usize, usize), String> {
    let first = index_value(first, len)?.max(0);
    let last = index_value(last, len)?.min(len as i64 - 1);
    if last < first {
        return Ok((0, 0));
    }
    Ok((first as usize, last as usize + 1))
}

fn cmd_lappend(interp: &mut Interp, args: &[String]) -> Outcome {
    arity(args, 1, usize::MAX, "lappend varName ?value ...?")?;
    let mut items = match interp.get_var(&args[0]) {
        Ok(current) => parse_list(&current)?,
        Err(_) => Vec::new(),
    };
    items.extend(args[1..].iter().cloned());
    Ok(interp.set_var(&args[0], format_list(&items)))
}

fn concat(args: &[String]) -> String {
    args.iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn cmd_join(args: &[String]) -> Outcome {
    arity(args, 1, 2, "join list ?joinString?")?;
    let sep = args.get(1).map(String::as_str).unwrap_or(" ");
    Ok(parse_list(&args[0])?.join(sep))
}

fn cmd_split(args: &[String]) -> Outcome {
    arity(args, 1, 2, "split string ?splitChars?")?;
    let text = &args[0];
    if text.is_empty() {
        return Ok(String::new());
    }
    let chars = args.get(1).map(String::as_str).unwrap_or(" \t\n\r");
    let parts: Vec<String> = if chars.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(|c| chars.contains(c)).map(str::to_owned).collect()
    };
    Ok(format_list(&parts))
}

// ── Strings ───────────────────────────────────────────────────────────────────

/// Largest string value the engine will build.
const MAX_VALUE_BYTES: usize = i32::MAX as usize;

fn repeat(text: &str, count: usize) -> Result<String, String> {
    if text.is_empty() || count == 0 {
        return Ok(String::new());
    }
    let len = text
        .len()
        .checked_mul(count)
        .filter(|&n| n <= MAX_VALUE_BYTES)
        .ok_or_else(|| format!("max size for a Tcl value ({MAX_VALUE_BYTES} bytes) exceeded"))?;
    let mut out = String::new();
    out.try_reserve_exact(len)
        .map_err(|_| format!("unable to alloc {len} bytes"))?;
    for _ in 0..count {
        out.push_str(text);
    }
    Ok(out)
}

const STRING_SUBCOMMANDS: &str = "compare, equal, first, index, length, match, range, repeat, \
     reverse, tolower, toupper, trim, trimleft, or trimright";

fn cmd_string(args: &[String]) -> Outcome {
    let Some(sub) = args.first() else {
        return Err("wrong # args: should be \"string subcommand ?arg ...?\"".into());
    };
    let rest = &args[1..];
    let (nocase, operands) = match rest.first().map(String::as_str) {
        Some("-nocase") if matches!(sub.as_str(), "equal" | "compare" | "match") => (true, &rest[1..]),
        _ => (false, rest),
    };
    let fold = |s: &str| if nocase { s.to_lowercase() } else { s.to_owned() };

    match sub.as_str() {
        "length" => {
            arity(rest, 1, 1, "string length string")?;
            Ok(rest[0].chars().count().to_string())
        }
        "toupper" => {
            arity(rest, 1, 1, "string toupper string")?;
            Ok(rest[0].to_uppercase())
        }
        "tolower" => {
            arity(rest, 1, 1, "string tolower string")?;
            Ok(rest[0].to_lowercase())
        }
        "trim" | "trimleft" | "trimright" => {
            arity(rest, 1, 2, &format!("string {sub} string ?chars?"))?;
            let set = rest.get(1).map(String::as_str).unwrap_or(" \t\n\r\x0b\x0c\0");
            let strip = |c: char| set.contains(c);
            Ok(match sub.as_str() {
                "trim" => rest[0].trim_matches(strip),
                "trimleft" => rest[0].trim_start_matches(strip),
                _ => rest[0].trim_end_matches(strip),
            }
            .to_owned())
        }
        "equal" => {
            arity(operands, 2, 2, "string equal ?-nocase? string1 string2")?;
            Ok(u8::from(fold(&operands[0]) == fold(&operands[1])).to_string())
        }
        "compare" => {
            arity(operands, 2, 2, "string compare ?-nocase? string1 string2")?;
            Ok(match fold(&operands[0]).cmp(&fold(&operands[1])) {
                Ordering::Less => "-1",
                Ordering::Equal => "0",
                Ordering::Greater => "1",
            }
            .to_owned())
        }
        "match" => {
            arity(operands, 2, 2, "string match ?-nocase? pattern string")?;
            Ok(u8::from(glob_match(&operands[0], &operands[1], nocase)).to_string())
        }
        "index" => {
            arity(rest, 2, 2, "string index string charIndex")?;
            let chars: Vec<char> = rest[0].chars().collect();
            Ok(resolve_index(&rest[1], chars.len())?
                .map(|i| chars[i].to_string())
                .unwrap_or_default())
        }
        "range" => {
            arity(rest, 3, 3, "string range string first last")?;
            let chars: Vec<char> = rest[0].chars().collect();
            let (first, last) = range_bounds(&rest[1], &rest[2], chars.len())?;
            Ok(chars[first..last].iter().collect())
        }
        "repeat" => {
            arity(rest, 2, 2, "string repeat string count")?;
            let count = parse_wide_int(&rest[1])?;
            Ok(repeat(&rest[0], usize::try_from(count).unwrap_or(0))?)
        }
        "first" => {
            arity(rest, 2, 2, "string first needleString haystackString")?;
            let Some(byte) = rest[1].find(rest[0].as_str()) else {
                return Ok("-1".to_owned());
            };
            Ok(rest[1][..byte].chars().count().to_string())
        }
        "reverse" => {
            arity(rest, 1, 1, "string reverse string")?;
            Ok(rest[0].chars().rev().collect())
        }
        other => Err(format!(
            "unknown or ambiguous subcommand \"{other}\": must be {STRING_SUBCOMMANDS}"
        )
        .into()),
    }
}

// ── Glob matcher ──────────────────────────────────────────────────────────────

/// Tcl `string match` glob: `*`, `?`, `[chars]` / `[a-z]` classes and
/// backslash escapes.
pub fn glob_match(pattern: &str, text: &str, nocase: bool) -> bool {
    let fold = |s: &str| -> Vec<char> {
        if nocase {
            s.to_lowercase().chars().collect()
        } else {
            s.chars().collect()
        }
    };
    glob_match_inner(&fold(pattern), &fold(text))
}

fn glob_match_inner(p: &[char], t: &[char]) -> bool {
    match (p.first(), t.first()) {
        (None, None) => true,
        (Some('*'), _) => {
            // Skip consecutive stars
            let rest_p = p
                .iter()
                .position(|&c| c != '*')
                .map(|i| &p[i..])
                .unwrap_or(&[]);
            (0..=t.len()).any(|i| glob_match_inner(rest_p, &t[i..]))
        }
        (Some('?'), Some(_)) => glob_match_inner(&p[1..], &t[1..]),
        (Some('['), Some(&tc)) => {
            let Some(close) = p.iter().position(|&c| c == ']') else {
                return false;
            };
            let class = &p[1..close];
            let mut i = 0;
            let mut hit = false;
            while i < class.len() {
                if i + 2 < class.len() && class[i + 1] == '-' {
                    let (lo, hi) = if class[i] <= class[i + 2] {
                        (class[i], class[i + 2])
                    } else {
                        (class[i + 2], class[i])
                    };
                    hit |= (lo..=hi).contains(&tc);
                    i += 3;
                } else {
                    hit |= class[i] == tc;
                    i += 1;
                }
            }
            hit && glob_match_inner(&p[close + 1..], &t[1..])
        }
        (Some('\\'), Some(tc)) if p.len() > 1 => p[1] == *tc && glob_match_inner(&p[2..], &t[1..]),
        (Some(pc), Some(tc)) if pc == tc => glob_match_inner(&p[1..], &t[1..]),
        _ => false,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
