// ABOUTME: Whole-file transpilation from .lissp sources to .py siblings

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::eval::Object;
use crate::form::Form;
use crate::reader::Lissp;

static SHEBANG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#!.*\n").expect("shebang"));

/// Transpiles the named modules from Lissp.
///
/// A `.lissp` file of the same name must be present in the package's
/// directory (the current working directory when the package is empty
/// or `None`). The Python files are overwritten; missing ones are
/// created.
pub fn transpile(package: Option<&str>, modules: &[&str]) -> Result<(), Box<dyn Error>> {
    for module in modules {
        let mut path = PathBuf::new();
        if let Some(package) = package.filter(|p| !p.is_empty()) {
            for part in package.split('.') {
                path.push(part);
            }
        }
        path.push(format!("{module}.lissp"));
        transpile_file(&path, package)?;
    }
    Ok(())
}

/// Transpiles a single `.lissp` file to `.py` in the same location.
///
/// Code in `.lissp` files is executed upon compilation, because macro
/// definitions can alter the compilation of subsequent top-level
/// forms. A packaged Lissp file must know its package at compile time
/// to handle templates and macros correctly.
///
/// After the `.py` file is written, `__file__` is set to it, if it
/// isn't already.
pub fn transpile_file(
    path: impl AsRef<Path>,
    package: Option<&str>,
) -> Result<PathBuf, Box<dyn Error>> {
    let path = fs::canonicalize(path.as_ref())?;
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let qualname = match package.filter(|p| !p.is_empty()) {
        Some(package) => format!("{package}.{stem}"),
        None => stem,
    };
    let code = fs::read_to_string(&path)?; // UTF-8
    let code = SHEBANG.replace(&code, "");
    let mut lissp = Lissp::new(&qualname, None, true, &path.display().to_string());
    let python = lissp.compile(&code)?;
    let py = path.with_extension("py");
    fs::write(&py, &python)?;
    let env = lissp.env();
    if env.get("__file__").is_none() {
        env.define(
            "__file__",
            Object::Form(Form::Str(py.display().to_string())),
        );
    }
    Ok(py)
}
