// ABOUTME: The Hissp data model: non-empty tuples are nodes, everything else is an atom

use std::fmt;

use crate::munger::is_identifier;
use crate::pyrepr;

/// A Hissp value.
///
/// A non-empty `Tuple` is a node (a form); every other value is an
/// atom, including the empty tuple. String atoms are partitioned at
/// use-site: strings starting with `:` are control words, the rest are
/// code fragments (symbols, qualified identifiers, module handles, raw
/// Python, string literals).
#[derive(Debug, Clone, PartialEq)]
pub enum Form {
    Tuple(Vec<Form>),
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    Nil,
    Ellipsis,
    List(Vec<Form>),
    Set(Vec<Form>),
    Map(Vec<(Form, Form)>),
}

impl Form {
    /// Shorthand for a string atom.
    pub fn sym(s: &str) -> Form {
        Form::Str(s.to_string())
    }

    pub fn tuple(items: impl Into<Vec<Form>>) -> Form {
        Form::Tuple(items.into())
    }
}

impl fmt::Display for Form {
    /// Renders the form the way Python's `repr` would.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Form::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Form::Str(s) => write!(f, "{}", pyrepr::repr_str(s)),
            Form::Int(n) => write!(f, "{}", n),
            Form::Float(x) => write!(f, "{}", pyrepr::repr_float(*x)),
            Form::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Form::Bytes(b) => write!(f, "{}", pyrepr::repr_bytes(b)),
            Form::Nil => write!(f, "None"),
            Form::Ellipsis => write!(f, "Ellipsis"),
            Form::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Form::Set(items) => {
                if items.is_empty() {
                    return write!(f, "set()");
                }
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
            Form::Map(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Determines if form is a node: a non-empty tuple.
pub fn is_node(form: &Form) -> bool {
    matches!(form, Form::Tuple(items) if !items.is_empty())
}

/// Determines if form is a `str` atom.
pub fn is_str(form: &Form) -> bool {
    matches!(form, Form::Str(_))
}

/// Determines if form is a control word: a str atom starting with `:`.
pub fn is_control(form: &Form) -> bool {
    matches!(form, Form::Str(s) if s.starts_with(':'))
}

/// Determines if form is a symbol: a str atom whose dot-separated
/// segments are each empty or a valid identifier (which admits
/// qualified identifiers, module handles, and method syntax), with at
/// least one non-empty segment.
pub fn is_symbol(form: &Form) -> bool {
    match form {
        Form::Str(s) => {
            let mut any = false;
            for part in s.split('.') {
                if part.is_empty() {
                    continue;
                }
                if !is_identifier(part) {
                    return false;
                }
                any = true;
            }
            any
        }
        _ => false,
    }
}

/// Determines if form is an import: a qualified identifier or a module
/// handle, which the emitter rewrites into an `__import__` expression.
pub fn is_import(form: &Form) -> bool {
    match form {
        Form::Str(s) => is_symbol(form) && (s.contains("..") || s.ends_with('.')),
        _ => false,
    }
}

/// Determines if form would directly represent a string in Hissp.
///
/// Allows readerless-mode-style strings `('quote', 'foo')` and any
/// string literal fragment `"'foo'"` (including the `"('foo')"` form
/// produced by the Lissp reader). Macros often produce strings in one
/// of these forms, via quote or repr on a string object.
pub fn is_hissp_string(form: &Form) -> bool {
    if let Form::Tuple(items) = form {
        if let [Form::Str(head), Form::Str(_)] = items.as_slice() {
            if head == "quote" {
                return true;
            }
        }
    }
    is_string_literal(form)
}

/// Determines if form could have been read from a Lissp Unicode token.
///
/// It's not enough to check if the form has a string type. Several
/// token types such as a control token, symbol token, or fragment
/// token, read in as a str atom. Macros may need to distinguish these
/// cases.
pub fn is_lissp_unicode(form: &Form) -> bool {
    matches!(form, Form::Str(s) if s.starts_with('(')) && is_string_literal(form)
}

/// Determines if evaluating form as a literal produces a string.
pub fn is_string_literal(form: &Form) -> bool {
    matches!(form, Form::Str(s) if pyrepr::parse_string_literal(s).is_some())
}
