// ABOUTME: The native builtins module and the static Python name tables

use std::rc::Rc;

use crate::env::Environment;
use crate::error::EvalError;
use crate::eval::{py_repr, py_str, truthy, CallArgs, NativeDef, Object};
use crate::form::Form;

// ============================================================================
// Static name tables
// ============================================================================

/// The host's reserved words. Symbols matching these never qualify.
pub const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

pub fn is_python_keyword(s: &str) -> bool {
    PYTHON_KEYWORDS.contains(&s)
}

/// `dir(builtins)` on the host: the names the qualifier resolves to
/// `builtins..` when not shadowed.
pub const BUILTIN_NAMES: &[&str] = &[
    "ArithmeticError", "AssertionError", "AttributeError", "BaseException",
    "BaseExceptionGroup", "BlockingIOError", "BrokenPipeError", "BufferError", "BytesWarning",
    "ChildProcessError", "ConnectionAbortedError", "ConnectionError", "ConnectionRefusedError",
    "ConnectionResetError", "DeprecationWarning", "EOFError", "Ellipsis", "EncodingWarning",
    "EnvironmentError", "Exception", "ExceptionGroup", "FileExistsError", "FileNotFoundError",
    "FloatingPointError", "FutureWarning", "GeneratorExit", "IOError", "ImportError",
    "ImportWarning", "IndentationError", "IndexError", "InterruptedError", "IsADirectoryError",
    "KeyError", "KeyboardInterrupt", "LookupError", "MemoryError", "ModuleNotFoundError",
    "NameError", "NotADirectoryError", "NotImplemented", "NotImplementedError", "OSError",
    "OverflowError", "PendingDeprecationWarning", "PermissionError", "ProcessLookupError",
    "RecursionError", "ReferenceError", "ResourceWarning", "RuntimeError", "RuntimeWarning",
    "StopAsyncIteration", "StopIteration", "SyntaxError", "SyntaxWarning", "SystemError",
    "SystemExit", "TabError", "TimeoutError", "TypeError", "UnboundLocalError",
    "UnicodeDecodeError", "UnicodeEncodeError", "UnicodeError", "UnicodeTranslateError",
    "UnicodeWarning", "UserWarning", "ValueError", "Warning", "ZeroDivisionError",
    "__build_class__", "__debug__", "__doc__", "__import__", "__loader__", "__name__",
    "__package__", "__spec__", "abs", "aiter", "all", "anext", "any", "ascii", "bin", "bool",
    "breakpoint", "bytearray", "bytes", "callable", "chr", "classmethod", "compile", "complex",
    "copyright", "credits", "delattr", "dict", "dir", "divmod", "enumerate", "eval", "exec",
    "exit", "filter", "float", "format", "frozenset", "getattr", "globals", "hasattr", "hash",
    "help", "hex", "id", "input", "int", "isinstance", "issubclass", "iter", "len", "license",
    "list", "locals", "map", "max", "memoryview", "min", "next", "object", "oct", "open",
    "ord", "pow", "print", "property", "quit", "range", "repr", "reversed", "round", "set",
    "setattr", "slice", "sorted", "staticmethod", "str", "sum", "super", "tuple", "type",
    "vars", "zip",
];

// ============================================================================
// Native functions
// ============================================================================

static PRINT: NativeDef = NativeDef {
    name: "print",
    f: builtin_print,
};
static REPR: NativeDef = NativeDef {
    name: "repr",
    f: builtin_repr,
};
static STR: NativeDef = NativeDef {
    name: "str",
    f: builtin_str,
};
static INT: NativeDef = NativeDef {
    name: "int",
    f: builtin_int,
};
static FLOAT: NativeDef = NativeDef {
    name: "float",
    f: builtin_float,
};
static BOOL: NativeDef = NativeDef {
    name: "bool",
    f: builtin_bool,
};
static ABS: NativeDef = NativeDef {
    name: "abs",
    f: builtin_abs,
};
static LEN: NativeDef = NativeDef {
    name: "len",
    f: builtin_len,
};

/// Builds the native `builtins` module environment. The subset here is
/// what compile-time code (tags, injects, macro bodies) actually
/// reaches for; everything else in `BUILTIN_NAMES` exists only as an
/// emission target.
pub fn builtins_env() -> Rc<Environment> {
    let env = Environment::new("builtins");
    for def in [&PRINT, &REPR, &STR, &INT, &FLOAT, &BOOL, &ABS, &LEN] {
        env.define(def.name, Object::Native(def));
    }
    env
}

/// Prints arguments separated by `sep` (default space), followed by
/// `end` (default newline), to stdout.
fn builtin_print(call: CallArgs) -> Result<Object, EvalError> {
    let mut sep = " ".to_string();
    let mut end = "\n".to_string();
    for (k, v) in &call.kwargs {
        let value = match v {
            Object::Form(Form::Str(s)) => s.clone(),
            other => {
                return Err(EvalError::type_error("print", "str", other.type_name(), 0));
            }
        };
        match k.as_str() {
            "sep" => sep = value,
            "end" => end = value,
            other => {
                return Err(EvalError::runtime_error(
                    "print",
                    format!("unexpected keyword argument {other:?}"),
                ));
            }
        }
    }
    let text: Vec<String> = call.args.iter().map(py_str).collect();
    print!("{}{}", text.join(&sep), end);
    Ok(Object::Form(Form::Nil))
}

fn builtin_repr(call: CallArgs) -> Result<Object, EvalError> {
    let args = call.no_kwargs("repr")?;
    match args.as_slice() {
        [x] => Ok(Object::Form(Form::Str(py_repr(x)))),
        _ => Err(EvalError::arity_error("repr", "1", args.len())),
    }
}

fn builtin_str(call: CallArgs) -> Result<Object, EvalError> {
    let args = call.no_kwargs("str")?;
    match args.as_slice() {
        [] => Ok(Object::Form(Form::Str(String::new()))),
        [x] => Ok(Object::Form(Form::Str(py_str(x)))),
        _ => Err(EvalError::arity_error("str", "0-1", args.len())),
    }
}

fn builtin_int(call: CallArgs) -> Result<Object, EvalError> {
    let args = call.no_kwargs("int")?;
    match args.as_slice() {
        [] => Ok(Object::Form(Form::Int(0))),
        [Object::Form(Form::Int(n))] => Ok(Object::Form(Form::Int(*n))),
        [Object::Form(Form::Bool(b))] => Ok(Object::Form(Form::Int(i64::from(*b)))),
        [Object::Form(Form::Float(x))] => Ok(Object::Form(Form::Int(x.trunc() as i64))),
        [Object::Form(Form::Str(s))] => {
            let t = s.trim().replace('_', "");
            t.parse::<i64>()
                .map(|n| Object::Form(Form::Int(n)))
                .map_err(|_| {
                    EvalError::runtime_error(
                        "int",
                        format!("invalid literal for int() with base 10: {s:?}"),
                    )
                })
        }
        [other] => Err(EvalError::type_error(
            "int",
            "str or number",
            other.type_name(),
            1,
        )),
        _ => Err(EvalError::arity_error("int", "0-1", args.len())),
    }
}

/// Converts to float, accepting the host's string spellings including
/// `inf`, `infinity`, and `nan` with optional sign.
fn builtin_float(call: CallArgs) -> Result<Object, EvalError> {
    let args = call.no_kwargs("float")?;
    match args.as_slice() {
        [] => Ok(Object::Form(Form::Float(0.0))),
        [Object::Form(Form::Float(x))] => Ok(Object::Form(Form::Float(*x))),
        [Object::Form(Form::Int(n))] => Ok(Object::Form(Form::Float(*n as f64))),
        [Object::Form(Form::Bool(b))] => {
            Ok(Object::Form(Form::Float(if *b { 1.0 } else { 0.0 })))
        }
        [Object::Form(Form::Str(s))] => parse_py_float(s)
            .map(|x| Object::Form(Form::Float(x)))
            .ok_or_else(|| {
                EvalError::runtime_error(
                    "float",
                    format!("could not convert string to float: {s:?}"),
                )
            }),
        [other] => Err(EvalError::type_error(
            "float",
            "str or number",
            other.type_name(),
            1,
        )),
        _ => Err(EvalError::arity_error("float", "0-1", args.len())),
    }
}

fn parse_py_float(s: &str) -> Option<f64> {
    let t = s.trim().replace('_', "");
    let (sign, body) = match t.strip_prefix('-') {
        Some(rest) => (-1.0, rest.to_string()),
        None => (1.0, t.strip_prefix('+').unwrap_or(&t).to_string()),
    };
    match body.to_ascii_lowercase().as_str() {
        "inf" | "infinity" => return Some(sign * f64::INFINITY),
        "nan" => return Some(sign * f64::NAN),
        _ => {}
    }
    body.parse::<f64>().ok().map(|x| sign * x)
}

fn builtin_bool(call: CallArgs) -> Result<Object, EvalError> {
    let args = call.no_kwargs("bool")?;
    match args.as_slice() {
        [] => Ok(Object::Form(Form::Bool(false))),
        [x] => Ok(Object::Form(Form::Bool(truthy(x)))),
        _ => Err(EvalError::arity_error("bool", "0-1", args.len())),
    }
}

fn builtin_abs(call: CallArgs) -> Result<Object, EvalError> {
    let args = call.no_kwargs("abs")?;
    match args.as_slice() {
        [Object::Form(Form::Int(n))] => n
            .checked_abs()
            .map(|n| Object::Form(Form::Int(n)))
            .ok_or_else(|| EvalError::runtime_error("abs", "integer overflow")),
        [Object::Form(Form::Float(x))] => Ok(Object::Form(Form::Float(x.abs()))),
        [other] => Err(EvalError::type_error("abs", "number", other.type_name(), 1)),
        _ => Err(EvalError::arity_error("abs", "1", args.len())),
    }
}

fn builtin_len(call: CallArgs) -> Result<Object, EvalError> {
    let args = call.no_kwargs("len")?;
    match args.as_slice() {
        [Object::Form(Form::Str(s))] => Ok(Object::Form(Form::Int(s.chars().count() as i64))),
        [Object::Form(Form::Bytes(b))] => Ok(Object::Form(Form::Int(b.len() as i64))),
        [Object::Form(Form::Tuple(items))]
        | [Object::Form(Form::List(items))]
        | [Object::Form(Form::Set(items))] => Ok(Object::Form(Form::Int(items.len() as i64))),
        [Object::Form(Form::Map(pairs))] => Ok(Object::Form(Form::Int(pairs.len() as i64))),
        [other] => Err(EvalError::type_error(
            "len",
            "a sized value",
            other.type_name(),
            1,
        )),
        _ => Err(EvalError::arity_error("len", "1", args.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(x: Object) -> CallArgs {
        CallArgs::positional(vec![x])
    }

    #[test]
    fn test_builtin_names_table() {
        assert!(BUILTIN_NAMES.contains(&"float"));
        assert!(BUILTIN_NAMES.contains(&"print"));
        assert!(!BUILTIN_NAMES.contains(&"spam"));
    }

    #[test]
    fn test_keywords() {
        assert!(is_python_keyword("lambda"));
        assert!(is_python_keyword("False"));
        assert!(!is_python_keyword("match")); // soft keyword
        assert!(!is_python_keyword("foo"));
    }

    #[test]
    fn test_float_of_inf_string() {
        match builtin_float(one(Object::Form(Form::sym("inf")))) {
            Ok(Object::Form(Form::Float(x))) => assert!(x.is_infinite() && x > 0.0),
            other => panic!("expected inf, got {other:?}"),
        }
        match builtin_float(one(Object::Form(Form::sym("-Infinity")))) {
            Ok(Object::Form(Form::Float(x))) => assert!(x.is_infinite() && x < 0.0),
            other => panic!("expected -inf, got {other:?}"),
        }
        match builtin_float(one(Object::Form(Form::sym("nan")))) {
            Ok(Object::Form(Form::Float(x))) => assert!(x.is_nan()),
            other => panic!("expected nan, got {other:?}"),
        }
    }

    #[test]
    fn test_float_rejects_garbage() {
        assert!(builtin_float(one(Object::Form(Form::sym("spam")))).is_err());
    }

    #[test]
    fn test_int_parses() {
        match builtin_int(one(Object::Form(Form::sym("42")))) {
            Ok(Object::Form(Form::Int(42))) => {}
            other => panic!("expected 42, got {other:?}"),
        }
        match builtin_int(one(Object::Form(Form::Float(-2.7)))) {
            Ok(Object::Form(Form::Int(-2))) => {}
            other => panic!("expected -2, got {other:?}"),
        }
    }

    #[test]
    fn test_repr_str_round() {
        match builtin_repr(one(Object::Form(Form::sym("a'b")))) {
            Ok(Object::Form(Form::Str(s))) => assert_eq!(s, "\"a'b\""),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_len_errors() {
        assert!(builtin_len(one(Object::Form(Form::Int(1)))).is_err());
        assert!(builtin_len(CallArgs::positional(vec![])).is_err());
    }
}
