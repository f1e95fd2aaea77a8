/// End-to-end tests of the public facade against the builtin engine.
use std::sync::Arc;
use std::thread;

use tclbind::engine::{Engine, Status};
use tclbind::{arg_map, args, BuiltinEngine, Error, Interpreter, InterpreterConfig};

fn interp() -> Interpreter {
    Interpreter::new("").unwrap()
}

// ── Evaluation ────────────────────────────────────────────────────────────────

#[test]
fn expr_result_as_int() {
    let i = interp();
    assert_eq!(i.eval_as_int("set a [expr 1 + 2]", ()).unwrap(), 3);
}

#[test]
fn undefined_variable_is_an_error() {
    let i = interp();
    match i.eval_as_int("set b $nope", ()) {
        Err(Error::Eval(msg)) => assert_eq!(msg, "can't read \"nope\": no such variable"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn state_survives_a_failed_call() {
    let i = interp();
    i.eval("set keep %{}", args![5]).unwrap();
    assert!(i.eval("error {deliberate}", ()).is_err());
    assert!(i.eval("set x %{9}", args![1]).is_err());
    assert_eq!(i.eval_as_int("set keep", ()).unwrap(), 5);
}

#[test]
fn eval_bytes_skips_formatting() {
    let i = interp();
    i.eval_bytes(b"set t {%{not a placeholder}}").unwrap();
    assert_eq!(
        i.eval_as_string("set t", ()).unwrap(),
        "%{not a placeholder}"
    );
}

#[test]
fn procs_persist_between_calls() {
    let i = Interpreter::<BuiltinEngine>::new(
        "proc fact {n} { if {$n <= 1} { return 1 }; expr {$n * [fact [expr {$n - 1}]]} }",
    )
    .unwrap();
    assert_eq!(i.eval_as_int("fact %{}", args![10]).unwrap(), 3_628_800);
}

// ── Coercion ──────────────────────────────────────────────────────────────────

#[test]
fn typed_results() {
    let i = interp();
    assert!(i.eval_as_bool("expr {2 > 1}", ()).unwrap());
    assert!(!i.eval_as_bool("set b off", ()).unwrap());
    assert_eq!(i.eval_as_float("expr {1 / 4.0}", ()).unwrap(), 0.25);
    assert_eq!(i.eval_as_string("string toupper abc", ()).unwrap(), "ABC");
}

#[test]
fn integer_width_follows_as_semantics() {
    let i = interp();
    assert_eq!(i.eval_as::<u8>("set n 300", ()).unwrap(), 44);
    assert_eq!(i.eval_as_uint("set n -1", ()).unwrap(), u64::MAX);
    assert_eq!(i.eval_as::<i16>("expr {1 << 16}", ()).unwrap(), 0);
}

#[test]
fn coercion_failure_carries_engine_text() {
    let i = interp();
    match i.eval_as_float("set f abc", ()) {
        Err(Error::Coerce(msg)) => {
            assert_eq!(msg, "expected floating-point number but got \"abc\"")
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn nul_bytes_survive_round_trip() {
    let i = interp();
    i.eval("set s %{%q}", args!["a\0b"]).unwrap();
    assert_eq!(i.eval_as_string("set s", ()).unwrap(), "a\0b");
    assert_eq!(i.eval_as_string("string length $s", ()).unwrap(), "3");
}

// ── Templates ─────────────────────────────────────────────────────────────────

#[test]
fn quoted_argument_is_not_substituted() {
    let i = interp();
    let nasty = "[error boom] $undefined {unbalanced \\";
    i.eval("set q %{%q}", args![nasty]).unwrap();
    assert_eq!(i.eval_as_string("set q", ()).unwrap(), nasty);
}

#[test]
fn named_placeholders_need_a_map() {
    let i = interp();
    assert_eq!(
        i.eval_as_string("list %{first} %{second}", arg_map! {"first" => 5, "second" => 10})
            .unwrap(),
        "5 10"
    );
    assert!(matches!(
        i.eval("list %{first}", args![1, 2]),
        Err(Error::Format(_))
    ));
    assert!(matches!(
        i.eval("list %{first}", arg_map! {"other" => 1}),
        Err(Error::Format(_))
    ));
}

#[test]
fn malformed_templates_fail() {
    let i = interp();
    assert!(matches!(i.eval("set a %{", args![1]), Err(Error::Format(_))));
    assert!(matches!(i.eval("set a %{%d}", args!["x"]), Err(Error::Format(_))));
    assert!(matches!(i.eval("set a %{} %{}", args![1]), Err(Error::Format(_))));
    assert!(matches!(
        i.eval("set a %{%2000000000d}", args![1]),
        Err(Error::Format(_))
    ));
    assert!(matches!(
        i.eval("set a %{%.2000000000f}", args![1.5]),
        Err(Error::Format(_))
    ));
}

#[test]
fn deeply_nested_expr_is_an_error() {
    // Runs on a default-sized spawned thread.
    let outcome = thread::spawn(|| {
        let i = interp();
        let parens = format!("expr {{{}1{}}}", "(".repeat(10_000), ")".repeat(10_000));
        let negations = format!("expr {{{}1}}", "-".repeat(10_000));
        let results = [
            i.eval_as_int(&parens, ()),
            i.eval_as_int(&negations, ()),
        ];
        let after = i.eval_as_int("expr {(1 + 2) * 3}", ());
        (results, after)
    })
    .join()
    .unwrap();

    let (results, after) = outcome;
    for result in results {
        match result {
            Err(Error::Eval(msg)) => assert!(msg.ends_with("expression nested too deeply"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(after.unwrap(), 9);
}

#[test]
fn oversized_string_is_an_error() {
    let i = interp();
    match i.eval_as_string("string repeat abcd 4611686018427387904", ()) {
        Err(Error::Eval(msg)) => {
            assert_eq!(msg, "max size for a Tcl value (2147483647 bytes) exceeded")
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(i.eval_as_string("string repeat ab 2", ()).unwrap(), "abab");
}

#[test]
fn verbs_format_like_printf() {
    let i = interp();
    assert_eq!(
        i.eval_as_string("list %{0%.2f} %{1%05d} %{2%x}", args![3.14159, 42, 255])
            .unwrap(),
        "3.14 00042 ff"
    );
    // Explicit indices leave the implicit counter alone.
    assert_eq!(
        i.eval_as_string("list %{1} %{} %{}", args!["a", "b"]).unwrap(),
        "b a b"
    );
}

// ── Lifecycle ─────────────────────────────────────────────────────────────────

/// Builtin engine whose baseline initialisation always fails.
#[derive(Default)]
struct BrokenInit(BuiltinEngine);

impl Engine for BrokenInit {
    type Obj = String;
    const THREAD_AFFINE: bool = false;

    fn create() -> Self {
        BrokenInit::default()
    }
    fn init(&mut self) -> Status {
        self.0.eval(b"error {application-specific initialization failed}")
    }
    fn eval(&mut self, script: &[u8]) -> Status {
        self.0.eval(script)
    }
    fn obj_result(&self) -> String {
        self.0.obj_result()
    }
    fn string_result(&self) -> String {
        self.0.string_result()
    }
    fn get_wide_int(&mut self, obj: &String) -> Option<i64> {
        self.0.get_wide_int(obj)
    }
    fn get_string(&self, obj: &String) -> String {
        self.0.get_string(obj)
    }
    fn get_double(&mut self, obj: &String) -> Option<f64> {
        self.0.get_double(obj)
    }
    fn get_boolean(&mut self, obj: &String) -> Option<bool> {
        self.0.get_boolean(obj)
    }
}

#[test]
fn init_failure_is_reported() {
    match Interpreter::<BrokenInit>::new("set never 1") {
        Err(Error::Init(msg)) => assert_eq!(msg, "application-specific initialization failed"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn use_after_release_fails_fast() {
    let i = interp();
    i.release();
    assert!(matches!(i.eval("set a 1", ()), Err(Error::Released)));
    assert!(matches!(i.eval_as_string("set a", ()), Err(Error::Released)));
    i.release();
}

#[test]
fn error_filter_rewrites_errors() {
    let mut i = interp();
    i.set_error_filter(|e| match e {
        Error::Eval(msg) => Error::Eval(format!("[tcl] {msg}")),
        other => other,
    });
    match i.eval("error oops", ()) {
        Err(Error::Eval(msg)) => assert_eq!(msg, "[tcl] oops"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(i.eval("%{", args![1]), Err(Error::Format(_))));
}

#[test]
fn config_sources_rc_before_init() {
    let dir = tempfile::tempdir().unwrap();
    let rc = dir.path().join("init.tcl");
    std::fs::write(&rc, "set base 100\n").unwrap();
    let config = InterpreterConfig::new("incr base").with_rc_file(&rc);
    let i: Interpreter = Interpreter::with_config(&config).unwrap();
    assert_eq!(i.eval_as_int("set base", ()).unwrap(), 101);
}

#[test]
fn missing_rc_file_fails_construction() {
    let dir = tempfile::tempdir().unwrap();
    let config = InterpreterConfig::new("").with_rc_file(dir.path().join("absent"));
    assert!(matches!(
        Interpreter::<BuiltinEngine>::with_config(&config),
        Err(Error::Config { .. })
    ));
}

// ── Concurrency ───────────────────────────────────────────────────────────────

#[test]
fn concurrent_calls_never_interleave() {
    let shared = Arc::new(interp());
    shared.eval("set total 0", ()).unwrap();

    let handles: Vec<_> = (0..8i64)
        .map(|id| {
            let interp = Arc::clone(&shared);
            thread::spawn(move || {
                for _ in 0..50 {
                    // Write then read back inside one call; another thread's
                    // write must never land in between.
                    let seen = interp
                        .eval_as_int("set owner %{}; incr total; set owner", args![id])
                        .unwrap();
                    assert_eq!(seen, id);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(shared.eval_as_int("set total", ()).unwrap(), 400);
}
