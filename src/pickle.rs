// ABOUTME: Pickle fallback for atoms that have no round-trippable literal

use serde_pickle::{HashableValue, SerOptions, Value};

use crate::error::CompileError;
use crate::form::Form;
use crate::pyrepr;

/// Compile a form to a `pickle.loads` expression: the final fallback
/// for atom emission. Emits the readable protocol-0 text pickle or the
/// binary pickle, whichever is shorter, with the object's repr on a
/// comment line.
pub fn pickle_expr(form: &Form) -> Result<String, CompileError> {
    let binary = binary_pickle(form);
    let dumps = match (protocol0(form), binary) {
        (Some(text), Ok(binary)) if text.len() <= binary.len() => text,
        (Some(text), Err(_)) => text,
        (_, Ok(binary)) => binary,
        (None, Err(e)) => {
            return Err(CompileError::new(format!("can't pickle {form}: {e}")));
        }
    };
    let lines: Vec<String> = split_keepends(&dumps)
        .into_iter()
        .map(|chunk| pyrepr::repr_bytes(chunk))
        .collect();
    let r = format!("{form}").replace('\n', "\n  # ");
    let nl = if r.contains('\n') { "\n" } else { "" };
    Ok(format!(
        "__import__('pickle').loads({nl}  # {r}\n    {}\n)",
        lines.join("\n    ")
    ))
}

/// The human-readable backwards-compatible text protocol, for the
/// scalar atoms it can express compactly.
fn protocol0(form: &Form) -> Option<Vec<u8>> {
    let mut out: Vec<u8> = Vec::new();
    match form {
        Form::Nil => out.push(b'N'),
        Form::Bool(true) => out.extend_from_slice(b"I01\n"),
        Form::Bool(false) => out.extend_from_slice(b"I00\n"),
        Form::Int(n) => out.extend_from_slice(format!("I{n}\n").as_bytes()),
        Form::Float(x) => {
            out.extend_from_slice(format!("F{}\n", pyrepr::repr_float(*x)).as_bytes());
        }
        Form::Str(s) => {
            out.push(b'V');
            out.extend_from_slice(&raw_unicode_escape(s));
            out.push(b'\n');
        }
        _ => return None,
    }
    out.push(b'.');
    Some(out)
}

/// The `raw-unicode-escape` codec as the text pickle protocol uses it:
/// latin-1 bytes pass through, larger code points and the protocol's
/// delimiter characters escape to `\uXXXX`/`\UXXXXXXXX`.
fn raw_unicode_escape(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.extend_from_slice(b"\\u005c"),
            '\0' => out.extend_from_slice(b"\\u0000"),
            '\n' => out.extend_from_slice(b"\\u000a"),
            '\r' => out.extend_from_slice(b"\\u000d"),
            '\x1a' => out.extend_from_slice(b"\\u001a"),
            c if (c as u32) < 0x100 => out.push(c as u32 as u8),
            c if (c as u32) <= 0xffff => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => out.extend_from_slice(format!("\\U{:08x}", c as u32).as_bytes()),
        }
    }
    out
}

fn binary_pickle(form: &Form) -> Result<Vec<u8>, String> {
    let value = to_value(form)?;
    serde_pickle::value_to_vec(&value, SerOptions::new()).map_err(|e| e.to_string())
}

fn to_value(form: &Form) -> Result<Value, String> {
    Ok(match form {
        Form::Nil => Value::None,
        Form::Bool(b) => Value::Bool(*b),
        Form::Int(n) => Value::I64(*n),
        Form::Float(x) => Value::F64(*x),
        Form::Str(s) => Value::String(s.clone()),
        Form::Bytes(b) => Value::Bytes(b.clone()),
        Form::Tuple(items) => Value::Tuple(to_values(items)?),
        Form::List(items) => Value::List(to_values(items)?),
        Form::Set(items) => Value::Set(
            items
                .iter()
                .map(to_hashable)
                .collect::<Result<_, String>>()?,
        ),
        Form::Map(pairs) => Value::Dict(
            pairs
                .iter()
                .map(|(k, v)| Ok((to_hashable(k)?, to_value(v)?)))
                .collect::<Result<_, String>>()?,
        ),
        Form::Ellipsis => return Err("Ellipsis has a literal form".to_string()),
    })
}

fn to_values(items: &[Form]) -> Result<Vec<Value>, String> {
    items.iter().map(to_value).collect()
}

fn to_hashable(form: &Form) -> Result<HashableValue, String> {
    Ok(match form {
        Form::Nil => HashableValue::None,
        Form::Bool(b) => HashableValue::Bool(*b),
        Form::Int(n) => HashableValue::I64(*n),
        Form::Float(x) => HashableValue::F64(*x),
        Form::Str(s) => HashableValue::String(s.clone()),
        Form::Bytes(b) => HashableValue::Bytes(b.clone()),
        Form::Tuple(items) => HashableValue::Tuple(
            items
                .iter()
                .map(to_hashable)
                .collect::<Result<_, String>>()?,
        ),
        other => return Err(format!("unhashable type: {}", other)),
    })
}

/// `bytes.splitlines(keepends=True)`, as the pickle formatter uses it.
fn split_keepends(bytes: &[u8]) -> Vec<&[u8]> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\n' || b == b'\r' {
            chunks.push(&bytes[start..=i]);
            start = i + 1;
        }
    }
    if start < bytes.len() {
        chunks.push(&bytes[start..]);
    }
    chunks
}
