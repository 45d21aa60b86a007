// ABOUTME: Native evaluator for Hissp forms: inject, tags, macro bodies, evaluate mode

use std::fmt;
use std::rc::Rc;

use crate::env::{self, Environment, MACROS};
use crate::error::EvalError;
use crate::expand;
use crate::form::Form;
use crate::munger::is_identifier;
use crate::pyrepr;

/// A compile-time value: what the environment maps names to.
///
/// Forms represent themselves. Macros and tags are callables: either
/// native functions or Lissp lambdas closed over an environment.
/// Comment objects only appear as reader-tag arguments.
#[derive(Debug, Clone)]
pub enum Object {
    Form(Form),
    Comment(String),
    Native(&'static NativeDef),
    Lambda(Rc<Lambda>),
}

/// A named native function. The statics live in `builtins`.
#[derive(Debug)]
pub struct NativeDef {
    pub name: &'static str,
    pub f: NativeFn,
}

pub type NativeFn = fn(CallArgs) -> Result<Object, EvalError>;

/// Arguments to a callable: positionals plus keyword pairs, the way
/// calls and reader tags deliver them.
#[derive(Debug, Default)]
pub struct CallArgs {
    pub args: Vec<Object>,
    pub kwargs: Vec<(String, Object)>,
}

impl CallArgs {
    pub fn positional(args: Vec<Object>) -> Self {
        CallArgs {
            args,
            kwargs: Vec::new(),
        }
    }

    /// Reject keyword arguments, for functions that take none.
    pub fn no_kwargs(self, function: &str) -> Result<Vec<Object>, EvalError> {
        match self.kwargs.first() {
            Some((k, _)) => Err(EvalError::runtime_error(
                function,
                format!("unexpected keyword argument {k:?}"),
            )),
            None => Ok(self.args),
        }
    }
}

/// A Lissp lambda closure.
pub struct Lambda {
    pub params: ParamSpec,
    pub body: Vec<Form>,
    pub env: Rc<Environment>,
}

impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function <lambda>>")
    }
}

/// A lambda's parameter tuple, parsed: required singles, defaults
/// (evaluated at closure creation, like the host), a `:*` rest name,
/// and a `:**` kwargs name.
#[derive(Debug, Default)]
pub struct ParamSpec {
    pub singles: Vec<String>,
    pub defaults: Vec<(String, Object)>,
    pub star: Option<String>,
    pub double_star: Option<String>,
}

impl Object {
    /// The host type name, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Form(Form::Tuple(_)) => "tuple",
            Object::Form(Form::Str(_)) => "str",
            Object::Form(Form::Int(_)) => "int",
            Object::Form(Form::Float(_)) => "float",
            Object::Form(Form::Bool(_)) => "bool",
            Object::Form(Form::Bytes(_)) => "bytes",
            Object::Form(Form::Nil) => "NoneType",
            Object::Form(Form::Ellipsis) => "ellipsis",
            Object::Form(Form::List(_)) => "list",
            Object::Form(Form::Set(_)) => "set",
            Object::Form(Form::Map(_)) => "dict",
            Object::Native(_) => "builtin_function_or_method",
            Object::Lambda(_) => "function",
            Object::Comment(_) => "Comment",
        }
    }

    /// Convert back to a Hissp form, for macro/tag/inject results.
    pub fn into_form(self) -> Result<Form, EvalError> {
        match self {
            Object::Form(form) => Ok(form),
            Object::Comment(_) => Err(EvalError::NotEvaluable(
                "a comment object as a form".to_string(),
            )),
            other => Err(EvalError::NotEvaluable(format!(
                "the function object {}",
                py_repr(&other)
            ))),
        }
    }
}

/// Python-style `repr` of a compile-time value.
pub fn py_repr(obj: &Object) -> String {
    match obj {
        Object::Form(form) => format!("{form}"),
        Object::Comment(token) => format!("Comment({})", pyrepr::repr_str(token)),
        Object::Native(def) => format!("<built-in function {}>", def.name),
        Object::Lambda(_) => "<function <lambda>>".to_string(),
    }
}

/// Python-style `str` of a compile-time value.
pub fn py_str(obj: &Object) -> String {
    match obj {
        Object::Form(Form::Str(s)) => s.clone(),
        other => py_repr(other),
    }
}

/// Python-style truthiness.
pub fn truthy(obj: &Object) -> bool {
    match obj {
        Object::Form(Form::Nil) => false,
        Object::Form(Form::Bool(b)) => *b,
        Object::Form(Form::Int(n)) => *n != 0,
        Object::Form(Form::Float(x)) => *x != 0.0,
        Object::Form(Form::Str(s)) => !s.is_empty(),
        Object::Form(Form::Bytes(b)) => !b.is_empty(),
        Object::Form(Form::Tuple(items)) => !items.is_empty(),
        Object::Form(Form::List(items)) => !items.is_empty(),
        Object::Form(Form::Set(items)) => !items.is_empty(),
        Object::Form(Form::Map(pairs)) => !pairs.is_empty(),
        _ => true,
    }
}

/// Evaluate a Hissp form against an environment.
///
/// Macro invocations expand first, so evaluation observes the same
/// rewrites the emitter performs. Atoms represent themselves; string
/// atoms follow their use-site partition (control words and string
/// literals are data, symbols are looked up, raw fragments have no
/// compile-time value).
pub fn eval_form(form: &Form, env: &Rc<Environment>) -> Result<Object, EvalError> {
    let mut form = form.clone();
    let mut env = env.clone();
    loop {
        match &form {
            Form::Str(s) => return eval_str(s, &env),
            Form::Tuple(items) if items.is_empty() => return Ok(Object::Form(form.clone())),
            Form::Tuple(shared) => {
                let items = shared.clone();
                if let Form::Str(head) = &items[0] {
                    if head == "quote" {
                        if items.len() != 2 {
                            return Err(EvalError::runtime_error(
                                "quote",
                                format!("expected one argument, got {}", items.len() - 1),
                            ));
                        }
                        return Ok(Object::Form(items[1].clone()));
                    }
                    if head == "lambda" {
                        return make_lambda(&items, &env);
                    }
                    if head.is_empty() {
                        return entuple(&items[1..], &env);
                    }
                    if let Some(expansion) = expand::try_expand1(&Form::Tuple(items.clone()), &env)? {
                        form = expansion;
                        continue;
                    }
                    if head.starts_with('.') {
                        return Err(EvalError::NotEvaluable(format!(
                            "the method call {head:?}"
                        )));
                    }
                }
                let f = eval_form(&items[0], &env)?;
                let call = eval_args(&items[1..], &env)?;
                match f {
                    Object::Lambda(lambda) => {
                        // Tail position loops instead of recursing.
                        let child = bind_lambda(&lambda, call)?;
                        match lambda.body.split_last() {
                            None => return Ok(Object::Form(Form::Tuple(Vec::new()))),
                            Some((last, init)) => {
                                for expr in init {
                                    eval_form(expr, &child)?;
                                }
                                form = last.clone();
                                env = child;
                            }
                        }
                    }
                    other => return call_object(&other, call),
                }
            }
            _ => return Ok(Object::Form(form.clone())),
        }
    }
}

/// The template engine's entuple spine: an empty-string head builds a
/// tuple from its argument pairs. The emitter renders it as a tuple
/// display; here it evaluates directly. A trailing `:?` with an empty
/// string is the spine's trailing-comma filler and contributes nothing.
fn entuple(rest: &[Form], env: &Rc<Environment>) -> Result<Object, EvalError> {
    let rest = match rest {
        [init @ .., k, v]
            if matches!(k, Form::Str(s) if s == ":?")
                && matches!(v, Form::Str(s) if s.is_empty()) =>
        {
            init
        }
        _ => rest,
    };
    let call = eval_args(rest, env)?;
    if let Some((k, _)) = call.kwargs.first() {
        return Err(EvalError::runtime_error(
            "entuple",
            format!("unexpected keyword argument {k:?}"),
        ));
    }
    let mut items = Vec::with_capacity(call.args.len());
    for arg in call.args {
        items.push(arg.into_form()?);
    }
    Ok(Object::Form(Form::Tuple(items)))
}

fn eval_str(s: &str, env: &Rc<Environment>) -> Result<Object, EvalError> {
    if s.starts_with(':') {
        return Ok(Object::Form(Form::sym(s))); // control words are data
    }
    if is_identifier(s) {
        return env
            .get(s)
            .ok_or_else(|| EvalError::UndefinedSymbol(s.to_string()));
    }
    if s.contains("..") {
        return resolve_qualified(s);
    }
    if s.ends_with('.') {
        return Err(EvalError::NotEvaluable(format!(
            "the module handle {s:?}"
        )));
    }
    if let Some(value) = pyrepr::parse_string_literal(s) {
        return Ok(Object::Form(Form::Str(value)));
    }
    if let Some(number) = parenthesized_number(s) {
        return Ok(Object::Form(number));
    }
    if s.starts_with('.') {
        return Err(EvalError::NotEvaluable(format!("the method call {s:?}")));
    }
    Err(EvalError::NotEvaluable(format!(
        "the Python fragment {s:?}"
    )))
}

/// Number atoms emit parenthesized; recognize them coming back.
fn parenthesized_number(s: &str) -> Option<Form> {
    let inner = s.trim().strip_prefix('(')?.strip_suffix(')')?.trim();
    if let Ok(n) = inner.parse::<i64>() {
        return Some(Form::Int(n));
    }
    if inner
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '.' || c == '-')
    {
        if let Ok(x) = inner.parse::<f64>() {
            return Some(Form::Float(x));
        }
    }
    None
}

/// Resolve a qualified identifier (`module..name`, or
/// `module.._macro_.name`) through the module registry.
pub fn resolve_qualified(symbol: &str) -> Result<Object, EvalError> {
    let (module, rest) = match symbol.split_once("..") {
        Some(parts) => parts,
        None => return Err(EvalError::UndefinedSymbol(symbol.to_string())),
    };
    let menv =
        env::lookup_module(module).ok_or_else(|| EvalError::UnknownModule(module.to_string()))?;
    let mut parts = rest.split('.');
    let first = match parts.next() {
        Some(first) if !first.is_empty() => first,
        _ => return Err(EvalError::UndefinedSymbol(symbol.to_string())),
    };
    if first == MACROS {
        let name = parts
            .next()
            .ok_or_else(|| EvalError::UndefinedSymbol(symbol.to_string()))?;
        if parts.next().is_some() {
            return Err(EvalError::NotEvaluable(format!(
                "the attribute chain {symbol:?}"
            )));
        }
        return menv
            .get_macro(name)
            .ok_or_else(|| EvalError::UndefinedSymbol(symbol.to_string()));
    }
    let object = menv
        .get(first)
        .ok_or_else(|| EvalError::UndefinedSymbol(symbol.to_string()))?;
    if parts.next().is_some() {
        return Err(EvalError::NotEvaluable(format!(
            "the attribute chain {symbol:?}"
        )));
    }
    Ok(object)
}

/// Evaluate call arguments: singles, then `:`-delimited pairs with
/// `:*`/`:**` unpacking and named keywords.
fn eval_args(rest: &[Form], env: &Rc<Environment>) -> Result<CallArgs, EvalError> {
    let mut call = CallArgs::default();
    let mut it = rest.iter();
    for item in it.by_ref() {
        if matches!(item, Form::Str(s) if s == ":") {
            break;
        }
        call.args.push(eval_form(item, env)?);
    }
    while let Some(k) = it.next() {
        let v = it
            .next()
            .ok_or_else(|| EvalError::runtime_error("call", "Incomplete pair."))?;
        let key = match k {
            Form::Str(s) => s.as_str(),
            other => {
                return Err(EvalError::type_error("call", "str", format!("{other}"), 0));
            }
        };
        match key {
            ":*" => match eval_form(v, env)? {
                Object::Form(Form::Tuple(items)) | Object::Form(Form::List(items)) => {
                    call.args.extend(items.into_iter().map(Object::Form));
                }
                other => {
                    return Err(EvalError::type_error("call", "iterable", other.type_name(), 0));
                }
            },
            ":**" => match eval_form(v, env)? {
                Object::Form(Form::Map(pairs)) => {
                    for (k, v) in pairs {
                        match k {
                            Form::Str(name) => call.kwargs.push((name, Object::Form(v))),
                            other => {
                                return Err(EvalError::type_error(
                                    "call",
                                    "str",
                                    format!("{other}"),
                                    0,
                                ));
                            }
                        }
                    }
                }
                other => {
                    return Err(EvalError::type_error("call", "mapping", other.type_name(), 0));
                }
            },
            ":?" => call.args.push(eval_form(v, env)?),
            name => call.kwargs.push((name.to_string(), eval_form(v, env)?)),
        }
    }
    Ok(call)
}

fn make_lambda(items: &[Form], env: &Rc<Environment>) -> Result<Object, EvalError> {
    let params = match items.get(1) {
        Some(Form::Tuple(params)) => parse_params(params, env)?,
        Some(other) => {
            return Err(EvalError::type_error(
                "lambda",
                "a parameter tuple",
                format!("{other}"),
                1,
            ));
        }
        None => {
            return Err(EvalError::arity_error("lambda", "at least 1", 0));
        }
    };
    Ok(Object::Lambda(Rc::new(Lambda {
        params,
        body: items[2..].to_vec(),
        env: env.clone(),
    })))
}

fn parse_params(params: &[Form], env: &Rc<Environment>) -> Result<ParamSpec, EvalError> {
    let mut spec = ParamSpec::default();
    let mut it = params.iter();
    for item in it.by_ref() {
        match item {
            Form::Str(s) if s == ":" => break,
            // `:/` and `:*` are positional-only and keyword-only
            // markers; binding is by name natively.
            Form::Str(s) if s == ":/" || s == ":*" => continue,
            Form::Str(s) => spec.singles.push(s.clone()),
            other => {
                return Err(EvalError::type_error(
                    "lambda",
                    "a parameter name",
                    format!("{other}"),
                    0,
                ));
            }
        }
    }
    while let Some(k) = it.next() {
        let v = it
            .next()
            .ok_or_else(|| EvalError::runtime_error("lambda", "Incomplete pair."))?;
        match (k, v) {
            (Form::Str(k), Form::Str(v)) if k == ":*" && v == ":?" => {}
            (Form::Str(k), _) if k == ":/" => {}
            (Form::Str(k), Form::Str(name)) if k == ":*" => spec.star = Some(name.clone()),
            (Form::Str(k), Form::Str(name)) if k == ":**" => {
                spec.double_star = Some(name.clone());
            }
            (Form::Str(name), Form::Str(v)) if v == ":?" => spec.singles.push(name.clone()),
            (Form::Str(name), default) => {
                spec.defaults
                    .push((name.clone(), eval_form(default, env)?));
            }
            (other, _) => {
                return Err(EvalError::type_error(
                    "lambda",
                    "a parameter name",
                    format!("{other}"),
                    0,
                ));
            }
        }
    }
    Ok(spec)
}

/// Call any compile-time callable with the given arguments.
pub fn call_object(f: &Object, call: CallArgs) -> Result<Object, EvalError> {
    match f {
        Object::Native(def) => (def.f)(call),
        Object::Lambda(lambda) => {
            let child = bind_lambda(lambda, call)?;
            let mut result = Object::Form(Form::Tuple(Vec::new()));
            for expr in &lambda.body {
                result = eval_form(expr, &child)?;
            }
            Ok(result)
        }
        other => Err(EvalError::NotCallable(py_repr(other))),
    }
}

fn bind_lambda(lambda: &Lambda, call: CallArgs) -> Result<Rc<Environment>, EvalError> {
    let child = Environment::with_parent(lambda.env.clone());
    let spec = &lambda.params;
    let slot_count = spec.singles.len() + spec.defaults.len();
    let given = call.args.len();
    let mut bound_names: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut args = call.args.into_iter();

    for name in &spec.singles {
        match args.next() {
            Some(value) => {
                child.define(name, value);
                bound_names.insert(name.clone());
            }
            None => break,
        }
    }
    if bound_names.len() == spec.singles.len() {
        for (name, _) in &spec.defaults {
            match args.next() {
                Some(value) => {
                    child.define(name, value);
                    bound_names.insert(name.clone());
                }
                None => break,
            }
        }
    }
    let rest: Vec<Object> = args.collect();
    if !rest.is_empty() {
        match &spec.star {
            Some(name) => {
                let mut items = Vec::with_capacity(rest.len());
                for value in rest {
                    items.push(value.into_form()?);
                }
                child.define(name, Object::Form(Form::Tuple(items)));
            }
            None => {
                return Err(EvalError::arity_error(
                    "<lambda>",
                    format!("at most {slot_count}"),
                    given,
                ));
            }
        }
    } else if let Some(name) = &spec.star {
        child.define(name, Object::Form(Form::Tuple(Vec::new())));
    }

    let mut extra = Vec::new();
    for (k, v) in call.kwargs {
        let is_slot = spec.singles.contains(&k)
            || spec.defaults.iter().any(|(name, _)| *name == k);
        if is_slot && !bound_names.contains(&k) {
            child.define(&k, v);
            bound_names.insert(k);
        } else if spec.double_star.is_some() {
            extra.push((Form::Str(k), v.into_form()?));
        } else {
            return Err(EvalError::runtime_error(
                "<lambda>",
                format!("unexpected keyword argument {k:?}"),
            ));
        }
    }
    if let Some(name) = &spec.double_star {
        child.define(name, Object::Form(Form::Map(extra)));
    }

    let missing = spec
        .singles
        .iter()
        .filter(|name| !bound_names.contains(*name))
        .count();
    if missing > 0 {
        return Err(EvalError::arity_error(
            "<lambda>",
            format!("at least {}", spec.singles.len()),
            spec.singles.len() - missing,
        ));
    }
    for (name, default) in &spec.defaults {
        if !bound_names.contains(name) {
            child.define(name, default.clone());
        }
    }
    Ok(child)
}
