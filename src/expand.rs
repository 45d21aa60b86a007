// ABOUTME: Expansion-environment context and the macroexpand utilities

use std::cell::RefCell;
use std::rc::Rc;

use crate::compiler;
use crate::env::Environment;
use crate::error::EvalError;
use crate::eval::{call_object, CallArgs, Object};
use crate::form::{is_node, Form};

thread_local! {
    /// Sometimes a macro needs the current namespace when expanding,
    /// instead of its defining namespace. Rather than pass an implicit
    /// argument to all macros, it's available here while an expansion
    /// is in progress. `readerless` uses this automatically.
    static EXPANSION_ENV: RefCell<Vec<Rc<Environment>>> = const { RefCell::new(Vec::new()) };
}

/// RAII guard for the expansion environment; the slot resets when the
/// guard drops, on every exit path.
pub struct MacroContext(());

impl Drop for MacroContext {
    fn drop(&mut self) {
        EXPANSION_ENV.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Sets the expansion environment for the duration of the returned
/// guard.
#[must_use]
pub fn macro_context(env: Rc<Environment>) -> MacroContext {
    EXPANSION_ENV.with(|stack| stack.borrow_mut().push(env));
    MacroContext(())
}

/// The environment of the innermost active expansion, if any.
pub fn expansion_env() -> Option<Rc<Environment>> {
    EXPANSION_ENV.with(|stack| stack.borrow().last().cloned())
}

fn require_env(env: Option<&Rc<Environment>>) -> Result<Rc<Environment>, EvalError> {
    env.cloned().or_else(expansion_env).ok_or_else(|| {
        EvalError::runtime_error(
            "macroexpand",
            "no expansion in progress; pass an environment explicitly",
        )
    })
}

/// Expand `form` once if it's a macro invocation; `Ok(None)` when it
/// isn't one.
pub(crate) fn try_expand1(
    form: &Form,
    env: &Rc<Environment>,
) -> Result<Option<Form>, EvalError> {
    let items = match form {
        Form::Tuple(items) if !items.is_empty() => items,
        _ => return Ok(None),
    };
    let head = match &items[0] {
        Form::Str(head) if head != "quote" && head != "lambda" => head,
        _ => return Ok(None),
    };
    let macro_obj = match compiler::resolve_macro(head, env)? {
        Some(obj) => obj,
        None => return Ok(None),
    };
    let _guard = macro_context(env.clone());
    let args = items[1..].iter().cloned().map(Object::Form).collect();
    let result = call_object(&macro_obj, CallArgs::positional(args))?;
    Ok(Some(result.into_form()?))
}

/// If form is a macro invocation, return its expansion, else the form
/// unchanged. Outside an active expansion, the environment must be
/// supplied explicitly.
pub fn macroexpand1(form: &Form, env: Option<&Rc<Environment>>) -> Result<Form, EvalError> {
    let env = require_env(env)?;
    Ok(try_expand1(form, &env)?.unwrap_or_else(|| form.clone()))
}

/// Repeatedly macroexpand until a fixed point.
pub fn macroexpand(form: &Form, env: &Rc<Environment>) -> Result<Form, EvalError> {
    let mut current = form.clone();
    while let Some(next) = try_expand1(&current, env)? {
        current = next;
    }
    Ok(current)
}

/// Pre/post hooks threaded through `macroexpand_all`, for debugging
/// tooling. Each hook sees every node the recursion visits.
#[derive(Default)]
pub struct Hooks<'a> {
    pub pre: Option<&'a dyn Fn(&Form) -> Form>,
    pub post: Option<&'a dyn Fn(&Form) -> Form>,
}

/// Recursively macroexpand, outside-in: expand fully at the current
/// node, then recurse into sub-forms of the result. Quoted data is
/// left alone. Lambda parameter names aren't expandable, but their
/// default-value expressions and the body forms are.
pub fn macroexpand_all(form: &Form, env: &Rc<Environment>) -> Result<Form, EvalError> {
    macroexpand_all_with(form, env, &Hooks::default())
}

pub fn macroexpand_all_with(
    form: &Form,
    env: &Rc<Environment>,
    hooks: &Hooks<'_>,
) -> Result<Form, EvalError> {
    let form = match hooks.pre {
        Some(pre) => pre(form),
        None => form.clone(),
    };
    let expanded = macroexpand(&form, env)?;
    let result = match &expanded {
        Form::Tuple(items) if is_node(&expanded) => match &items[0] {
            Form::Str(head) if head == "quote" => expanded.clone(),
            Form::Str(head) if head == "lambda" => expand_lambda(items, env, hooks)?,
            _ => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(macroexpand_all_with(item, env, hooks)?);
                }
                Form::Tuple(out)
            }
        },
        _ => expanded.clone(),
    };
    Ok(match hooks.post {
        Some(post) => post(&result),
        None => result,
    })
}

/// Expand inside a lambda form, preserving the single/pair partition
/// of the parameter tuple.
fn expand_lambda(
    items: &[Form],
    env: &Rc<Environment>,
    hooks: &Hooks<'_>,
) -> Result<Form, EvalError> {
    let mut out = vec![items[0].clone()];
    if let Some(Form::Tuple(params)) = items.get(1) {
        let mut new_params = Vec::with_capacity(params.len());
        let mut it = params.iter();
        for param in it.by_ref() {
            new_params.push(param.clone());
            if matches!(param, Form::Str(s) if s == ":") {
                break;
            }
        }
        while let Some(k) = it.next() {
            new_params.push(k.clone());
            if let Some(v) = it.next() {
                if matches!(v, Form::Str(s) if s == ":?") {
                    new_params.push(v.clone());
                } else {
                    new_params.push(macroexpand_all_with(v, env, hooks)?);
                }
            }
        }
        out.push(Form::Tuple(new_params));
    } else if let Some(other) = items.get(1) {
        out.push(other.clone());
    }
    for body in items.iter().skip(2) {
        out.push(macroexpand_all_with(body, env, hooks)?);
    }
    Ok(Form::Tuple(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::NativeDef;

    fn env_with_macro() -> Rc<Environment> {
        static SWAP: NativeDef = NativeDef {
            name: "swap",
            f: |call| {
                let mut args = call.no_kwargs("swap")?;
                args.reverse();
                let mut items = vec![Form::sym("swapped")];
                for arg in args {
                    items.push(arg.into_form()?);
                }
                Ok(Object::Form(Form::Tuple(items)))
            },
        };
        let env = Environment::new("__main__");
        env.define_macro("swap", Object::Native(&SWAP));
        env
    }

    #[test]
    fn test_macroexpand1_non_macro_unchanged() {
        let env = env_with_macro();
        let form = Form::tuple(vec![Form::sym("print"), Form::Int(1)]);
        assert_eq!(macroexpand1(&form, Some(&env)).expect("expands"), form);
    }

    #[test]
    fn test_macroexpand1_expands_once() {
        let env = env_with_macro();
        let form = Form::tuple(vec![Form::sym("swap"), Form::Int(1), Form::Int(2)]);
        let expanded = macroexpand1(&form, Some(&env)).expect("expands");
        assert_eq!(
            expanded,
            Form::tuple(vec![Form::sym("swapped"), Form::Int(2), Form::Int(1)])
        );
    }

    #[test]
    fn test_macroexpand_fixed_point() {
        let env = env_with_macro();
        let form = Form::tuple(vec![Form::sym("swap"), Form::Int(1), Form::Int(2)]);
        let once = macroexpand(&form, &env).expect("expands");
        let twice = macroexpand(&once, &env).expect("expands");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_macroexpand1_requires_env() {
        let form = Form::sym("x");
        assert!(macroexpand1(&form, None).is_err());
    }

    #[test]
    fn test_macroexpand_all_skips_quote() {
        let env = env_with_macro();
        let quoted = Form::tuple(vec![
            Form::sym("quote"),
            Form::tuple(vec![Form::sym("swap"), Form::Int(1), Form::Int(2)]),
        ]);
        assert_eq!(macroexpand_all(&quoted, &env).expect("expands"), quoted);
    }

    #[test]
    fn test_macroexpand_all_recurses_into_subforms() {
        let env = env_with_macro();
        let form = Form::tuple(vec![
            Form::sym("print"),
            Form::tuple(vec![Form::sym("swap"), Form::Int(1), Form::Int(2)]),
        ]);
        let expanded = macroexpand_all(&form, &env).expect("expands");
        assert_eq!(
            expanded,
            Form::tuple(vec![
                Form::sym("print"),
                Form::tuple(vec![Form::sym("swapped"), Form::Int(2), Form::Int(1)]),
            ])
        );
    }

    #[test]
    fn test_macroexpand_all_lambda_params_preserved() {
        let env = env_with_macro();
        // (lambda (a : b (swap 1 2)) (swap a b))
        let form = Form::tuple(vec![
            Form::sym("lambda"),
            Form::tuple(vec![
                Form::sym("a"),
                Form::sym(":"),
                Form::sym("b"),
                Form::tuple(vec![Form::sym("swap"), Form::Int(1), Form::Int(2)]),
            ]),
            Form::tuple(vec![Form::sym("swap"), Form::sym("a"), Form::sym("b")]),
        ]);
        let expanded = macroexpand_all(&form, &env).expect("expands");
        match &expanded {
            Form::Tuple(items) => {
                // Parameter names survive; the default and body expanded.
                match &items[1] {
                    Form::Tuple(params) => {
                        assert_eq!(params[0], Form::sym("a"));
                        assert_eq!(params[2], Form::sym("b"));
                        assert!(
                            matches!(&params[3], Form::Tuple(t) if t[0] == Form::sym("swapped"))
                        );
                    }
                    other => panic!("expected params tuple, got {other}"),
                }
                assert!(matches!(&items[2], Form::Tuple(t) if t[0] == Form::sym("swapped")));
            }
            other => panic!("expected lambda form, got {other}"),
        }
    }

    #[test]
    fn test_context_guard_resets() {
        assert!(expansion_env().is_none());
        {
            let _guard = macro_context(Environment::new("__main__"));
            assert!(expansion_env().is_some());
        }
        assert!(expansion_env().is_none());
    }

    #[test]
    fn test_hooks_thread_through() {
        let env = env_with_macro();
        let count = std::cell::Cell::new(0usize);
        let pre = |form: &Form| {
            count.set(count.get() + 1);
            form.clone()
        };
        let hooks = Hooks {
            pre: Some(&pre),
            post: None,
        };
        let form = Form::tuple(vec![Form::sym("print"), Form::Int(1)]);
        macroexpand_all_with(&form, &env, &hooks).expect("expands");
        assert!(count.get() >= 3); // the call, its head, its argument
    }
}
