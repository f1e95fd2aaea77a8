use proptest::prelude::*;
use tclbind::format::{format, quote};
use tclbind::{args, Interpreter};

proptest! {
    /// A template without `%{` is copied verbatim whatever the arguments.
    #[test]
    fn placeholder_free_template_is_verbatim(
        t in "[^%]*",
        n in any::<i64>(),
        s in "\\PC*",
    ) {
        prop_assert_eq!(format(&t, &args![n, s.as_str()]).unwrap(), t);
    }
}

proptest! {
    /// Formatting never panics, whatever the template looks like.
    #[test]
    fn formatter_does_not_panic(t in "\\PC*", n in any::<i64>()) {
        let _ = format(&t, &args![n, "x", 1.5, true]);
    }
}

proptest! {
    /// `%q` produces a word that evaluates back to the original text.
    #[test]
    fn quoted_text_round_trips(s in "\\PC*") {
        let interp: Interpreter = Interpreter::new("").unwrap();
        interp.eval("set x %{%q}", args![s.as_str()]).unwrap();
        prop_assert_eq!(interp.eval_as_string("set x", ()).unwrap(), s.clone());
        prop_assert!(quote(&s).starts_with('"'));
    }
}

proptest! {
    /// Integers survive a trip through the interpreter unchanged.
    #[test]
    fn integers_round_trip(n in any::<i64>()) {
        let interp: Interpreter = Interpreter::new("").unwrap();
        prop_assert_eq!(interp.eval_as_int("set n %{}", args![n]).unwrap(), n);
        prop_assert_eq!(interp.eval_as_uint("set n", ()).unwrap(), n as u64);
    }
}
