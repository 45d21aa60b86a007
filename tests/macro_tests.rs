// ABOUTME: Tests for the macro protocol: resolution, expansion, tags, and utilities

use std::rc::Rc;

use lissp::env::Environment;
use lissp::eval::{eval_form, NativeDef, Object};
use lissp::form::Form;
use lissp::reader::Lissp;
use lissp::{macroexpand, macroexpand1, macroexpand_all};

fn sym(s: &str) -> Form {
    Form::Str(s.to_string())
}

/// A macro rewriting (when-ish cond body) into an if-else lambda call
/// shape; enough structure to exercise nesting.
static WRAP: NativeDef = NativeDef {
    name: "wrap",
    f: |call| {
        let args = call.no_kwargs("wrap")?;
        let mut items = vec![sym("print")];
        for arg in args {
            items.push(arg.into_form()?);
        }
        Ok(Object::Form(Form::Tuple(items)))
    },
};

/// A recursive macro: (countdown n) => (print n (countdown n-1)), so
/// expansion must reach a fixed point through repeated heads.
static COUNTDOWN: NativeDef = NativeDef {
    name: "countdown",
    f: |call| {
        let args = call.no_kwargs("countdown")?;
        match args.as_slice() {
            [Object::Form(Form::Int(0))] => Ok(Object::Form(Form::Int(0))),
            [Object::Form(Form::Int(n))] => Ok(Object::Form(Form::Tuple(vec![
                sym("countdown"),
                Form::Int(n - 1),
            ]))),
            _ => Ok(Object::Form(Form::Nil)),
        }
    },
};

static EXCLAIM: NativeDef = NativeDef {
    name: "exclaim",
    f: |call| {
        let args = call.no_kwargs("exclaim")?;
        match args.first() {
            Some(Object::Form(Form::Str(s))) => {
                let inner = lissp::pyrepr::parse_string_literal(s)
                    .unwrap_or_else(|| s.clone());
                Ok(Object::Form(Form::Str(format!(
                    "({})",
                    lissp::pyrepr::repr_str(&format!("{inner}!"))
                ))))
            }
            Some(Object::Comment(token)) => {
                Ok(Object::Form(Form::Str(format!("comment:{}", token.trim_end()))))
            }
            _ => Ok(Object::Form(Form::Nil)),
        }
    },
};

fn env_with_macros() -> Rc<Environment> {
    let env = Environment::new("__main__");
    env.define_macro("wrap", Object::Native(&WRAP));
    env.define_macro("countdown", Object::Native(&COUNTDOWN));
    env
}

#[test]
fn test_unqualified_macro_expands_in_compilation() {
    let env = env_with_macros();
    let mut lissp = Lissp::new("__main__", Some(env), false, "<test>");
    let python = lissp.compile("(wrap 1)").expect("compiles");
    assert_eq!(python, "# wrap\nprint(\n  (1))");
}

#[test]
fn test_qualified_macro_same_module() {
    let env = env_with_macros();
    let mut lissp = Lissp::new("__main__", Some(env), false, "<test>");
    let python = lissp.compile("(__main__.._macro_.wrap 2)").expect("compiles");
    assert!(python.ends_with("print(\n  (2))"), "{python}");
}

#[test]
fn test_cross_module_macro_via_registry() {
    let module = Environment::new_module("mylib.macros");
    module.define_macro("wrap", Object::Native(&WRAP));
    let mut lissp = Lissp::new("__main__", None, false, "<test>");
    let python = lissp
        .compile("(mylib.macros.._macro_.wrap 3)")
        .expect("compiles");
    assert!(python.ends_with("print(\n  (3))"), "{python}");
}

#[test]
fn test_maybe_resolves_macro_or_falls_back() {
    let env = env_with_macros();
    let mut lissp = Lissp::new("__main__", Some(env), false, "<test>");
    let expanded = lissp
        .compile("(__main__..QzMaybe_.wrap 4)")
        .expect("compiles");
    assert!(expanded.contains("print"), "{expanded}");
    let fallback = lissp
        .compile("(__main__..QzMaybe_.nomacro 5)")
        .expect("compiles");
    assert!(
        fallback.contains("__import__('builtins').globals()['nomacro']"),
        "{fallback}"
    );
}

#[test]
fn test_recursive_macro_collapses_comments() {
    let env = env_with_macros();
    let mut lissp = Lissp::new("__main__", Some(env), false, "<test>");
    let python = lissp.compile("(countdown 3)").expect("compiles");
    // Direct recursion abbreviates to a run of #s, one per expansion.
    assert!(python.starts_with("### countdown\n"), "{python}");
    assert!(python.ends_with("(0)"), "{python}");
}

#[test]
fn test_macroexpand1_one_step() {
    let env = env_with_macros();
    let form = Form::Tuple(vec![sym("countdown"), Form::Int(2)]);
    let once = macroexpand1(&form, Some(&env)).expect("expands");
    assert_eq!(once, Form::Tuple(vec![sym("countdown"), Form::Int(1)]));
}

#[test]
fn test_macroexpand_fixed_point_property() {
    let env = env_with_macros();
    let form = Form::Tuple(vec![sym("countdown"), Form::Int(3)]);
    let expanded = macroexpand(&form, &env).expect("expands");
    assert_eq!(expanded, Form::Int(0));
    assert_eq!(macroexpand(&expanded, &env).expect("expands"), expanded);
}

#[test]
fn test_macroexpand_all_nested() {
    let env = env_with_macros();
    let form = Form::Tuple(vec![
        sym("tuple"),
        Form::Tuple(vec![sym("wrap"), Form::Int(1)]),
    ]);
    let expanded = macroexpand_all(&form, &env).expect("expands");
    assert_eq!(
        expanded,
        Form::Tuple(vec![
            sym("tuple"),
            Form::Tuple(vec![sym("print"), Form::Int(1)]),
        ])
    );
}

#[test]
fn test_lissp_defined_macro_via_lambda() {
    // A macro defined as a Lissp lambda: (lambda (x) `(print ,x)),
    // written readerless-style.
    let env = Environment::new("__main__");
    let lambda_form = Form::Tuple(vec![
        sym("lambda"),
        Form::Tuple(vec![sym("x")]),
        Form::Tuple(vec![
            sym(""),
            sym(":"),
            sym(":?"),
            Form::Tuple(vec![sym("quote"), sym("builtins..print")]),
            sym(":?"),
            sym("x"),
            sym(":?"),
            sym(""),
        ]),
    ]);
    let macro_fn = eval_form(&lambda_form, &env).expect("lambda evaluates");
    env.define_macro("say", macro_fn);

    let mut lissp = Lissp::new("__main__", Some(env), false, "<test>");
    let python = lissp.compile("(say 42)").expect("compiles");
    assert!(python.starts_with("# say\n"), "{python}");
    assert!(python.contains("__import__('builtins').print"), "{python}");
    assert!(python.contains("(42)"), "{python}");
}

#[test]
fn test_reader_tag_local() {
    let env = Environment::new("__main__");
    env.define_tag("exclaim", Object::Native(&EXCLAIM));
    let mut lissp = Lissp::new("__main__", Some(env), false, "<test>");
    let python = lissp.compile("exclaim#\"hi\"").expect("compiles");
    // The tag rewrote the string at read time.
    assert_eq!(python, "('hi!')");
}

#[test]
fn test_reader_tag_consumes_comment() {
    let env = Environment::new("__main__");
    env.define_tag("exclaim", Object::Native(&EXCLAIM));
    let mut lissp = Lissp::new("__main__", Some(env), false, "<test>");
    let python = lissp.compile("exclaim#; note\n").expect("compiles");
    assert!(python.contains("comment"), "{python}");
}

#[test]
fn test_reader_tag_kwargs_and_arity() {
    static KW: NativeDef = NativeDef {
        name: "kw",
        f: |call| {
            let mut parts: Vec<String> = call
                .kwargs
                .iter()
                .map(|(k, v)| format!("{k}={}", lissp::eval::py_repr(v)))
                .collect();
            for arg in &call.args {
                parts.push(lissp::eval::py_repr(arg));
            }
            Ok(Object::Form(Form::Str(format!("({:?})", parts.join(" ")))))
        },
    };
    let env = Environment::new("__main__");
    env.define_tag("kw", Object::Native(&KW));
    let mut lissp = Lissp::new("__main__", Some(env), false, "<test>");
    let python = lissp.compile("kw## name=1 2").expect("compiles");
    assert!(python.contains("name=1"), "{python}");
    assert!(python.contains('2'), "{python}");
}

#[test]
fn test_unknown_tag_is_hard_error() {
    let mut lissp = Lissp::new("__main__", None, false, "<test>");
    let e = lissp.compile("nope#1").expect_err("unknown tag");
    assert!(!e.is_soft());
}

#[test]
fn test_macro_error_becomes_compile_error() {
    static BOOM: NativeDef = NativeDef {
        name: "boom",
        f: |_| {
            Err(lissp::EvalError::runtime_error(
                "boom",
                "deliberate failure",
            ))
        },
    };
    let env = Environment::new("__main__");
    env.define_macro("boom", Object::Native(&BOOM));
    let mut lissp = Lissp::new("__main__", Some(env), false, "<test>");
    let e = lissp.compile("(boom)").expect_err("macro raised");
    let text = e.to_string();
    assert!(text.contains("deliberate failure"), "{text}");
    assert!(text.contains("Compiler."), "{text}");
}
