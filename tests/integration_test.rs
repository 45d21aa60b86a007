// ABOUTME: End-to-end tests through the reader and compiler pipeline

use lissp::env::Environment;
use lissp::eval::{eval_form, Object};
use lissp::form::Form;
use lissp::reader::Lissp;
use lissp::{demunge, LisspError};

fn reads(code: &str) -> Vec<Form> {
    Lissp::new("__main__", None, false, "<test>")
        .reads(code)
        .expect("reads")
}

fn compiled(code: &str) -> String {
    Lissp::new("__main__", None, false, "<test>")
        .compile(code)
        .expect("compiles")
}

#[test]
fn test_hello_world_pipeline() {
    let forms = reads(r#"(print "Hello, World!")"#);
    assert_eq!(
        forms,
        vec![Form::Tuple(vec![
            Form::Str("print".to_string()),
            Form::Str("('Hello, World!')".to_string()),
        ])]
    );
    assert_eq!(
        compiled(r#"(print "Hello, World!")"#),
        "print(\n  ('Hello, World!'))"
    );
}

#[test]
fn test_float_tag_pickles_to_inf() {
    let python = compiled("builtins..float#inf");
    assert!(python.starts_with("__import__('pickle').loads("), "{python}");
    assert!(python.contains("# inf"));
    assert!(python.contains("b'Finf\\n'"));
}

#[test]
fn test_quoted_operator_munges() {
    assert_eq!(compiled("'+"), "'QzPLUS_'");
    assert_eq!(demunge("QzPLUS_"), "+");
}

#[test]
fn test_lambda_golden() {
    assert_eq!(
        compiled("(lambda (a :/ b : :* :?  :** kwargs) a)"),
        "(lambda a,/,b,*,**kwargs:a)"
    );
}

#[test]
fn test_template_compiles_to_entuple() {
    // `(,a ,@b c) compiles to a tuple display with a splice.
    let python = compiled("`(,a ,@b c)");
    assert!(python.starts_with("(\n"), "{python}");
    assert!(python.contains("  a,"), "{python}");
    assert!(python.contains("  *b,"), "{python}");
    assert!(python.contains("'__main__..c'"), "{python}");
    assert!(python.trim_end().ends_with(')'), "{python}");
}

#[test]
fn test_multiple_top_level_forms() {
    let python = compiled("1 2");
    assert_eq!(python, "(1)\n\n(2)");
}

#[test]
fn test_empty_input_compiles_to_empty_output() {
    assert_eq!(compiled(""), "");
}

#[test]
fn test_evaluated_lambda_call() {
    let forms = reads("((lambda (a) a) 42)");
    let env = Environment::new("__main__");
    match eval_form(&forms[0], &env).expect("evaluates") {
        Object::Form(Form::Int(42)) => {}
        other => panic!("expected 42, got {other:?}"),
    }
}

#[test]
fn test_inject_evaluates_at_read_time() {
    let forms = reads(".#(float : )");
    assert_eq!(forms, vec![Form::Float(0.0)]);
}

#[test]
fn test_abort_in_main() {
    let mut lissp = Lissp::new("__main__", None, true, "<test>");
    let e = lissp.compile("(frobnicate)").expect_err("undefined name");
    match e {
        LisspError::Abort(traceback) => {
            assert!(traceback.contains("frobnicate"), "{traceback}");
            assert!(traceback.contains("<Compiled Hissp #1 of __main__"), "{traceback}");
        }
        other => panic!("expected abort, got {other}"),
    }
}

#[test]
fn test_post_compile_warning_outside_main() {
    let env = Environment::new("spam.eggs");
    let mut lissp = Lissp::new("spam.eggs", Some(env), true, "<test>");
    let python = lissp
        .compile("(frobnicate)\n42")
        .expect("continues after warning");
    assert!(python.contains("# Traceback"), "{python}");
    assert!(python.contains("(42)"), "{python}");
}

#[test]
fn test_execution_mutates_shared_environment() {
    // Reader-visible state: a macro defined in the environment changes
    // how later forms in the same unit compile.
    let env = Environment::new("__main__");
    let mut lissp = Lissp::new("__main__", Some(env.clone()), false, "<test>");
    let before = lissp.compile("(frob 1)").expect("plain call");
    assert_eq!(before, "frob(\n  (1))");

    static FROB: lissp::eval::NativeDef = lissp::eval::NativeDef {
        name: "frob",
        f: |call| {
            let args = call.no_kwargs("frob")?;
            let mut items = vec![Form::Str("print".to_string())];
            for arg in args {
                items.push(arg.into_form()?);
            }
            Ok(Object::Form(Form::Tuple(items)))
        },
    };
    env.define_macro("frob", Object::Native(&FROB));
    let after = lissp.compile("(frob 1)").expect("macro call");
    assert_eq!(after, "# frob\nprint(\n  (1))");
}

#[test]
fn test_soft_error_flag_for_repl() {
    let mut lissp = Lissp::new("__main__", None, false, "<test>");
    let incomplete = lissp.compile("(print 1").expect_err("incomplete");
    assert!(incomplete.is_soft());
    let extra = lissp.compile(")").expect_err("extra close");
    assert!(!extra.is_soft());
}

#[test]
fn test_fragment_emits_verbatim() {
    assert_eq!(compiled("|1 + 1|"), "1 + 1");
}

#[test]
fn test_qualified_identifier_emission() {
    assert_eq!(compiled("math..inf"), "__import__('math').inf");
    assert_eq!(compiled("math."), "__import__('math')");
}

#[test]
fn test_control_word_is_never_rewritten() {
    assert_eq!(compiled(":foo"), "':foo'");
    assert_eq!(compiled("(print :foo)"), "print(\n  ':foo')");
}

#[test]
fn test_reread_of_emitted_atom_is_equal() {
    // Round-trippable atoms survive emit -> re-read.
    for source in ["42", "-4.2", "True", "None", "..."] {
        let original = reads(source).remove(0);
        let emitted = compiled(source);
        let trimmed = emitted.trim_matches(['(', ')']);
        let back = reads(trimmed).remove(0);
        assert_eq!(original, back, "{source} -> {emitted}");
    }
}
