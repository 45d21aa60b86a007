// ABOUTME: The Hissp recursive-descent compiler: emits Python expressions from forms

use std::rc::Rc;

use crate::env::Environment;
use crate::error::{CompileError, EvalError, LisspError};
use crate::eval::{self, py_repr, Object};
use crate::expand;
use crate::form::Form;
use crate::munger::is_identifier;
use crate::pickle;
use crate::pyrepr;

/// Macro from a foreign module: `foo.bar.._macro_.baz`.
pub const MACRO_SEP: &str = ".._macro_.";

/// A tentative macro reference; resolved at compile time, falling back
/// to a run-time call on lookup failure.
pub const MAYBE_SEP: &str = "..QzMaybe_.";

/// The Hissp recursive-descent compiler.
///
/// Translates the Hissp data-structure language into a functional
/// subset of Python.
pub struct Compiler {
    pub qualname: String,
    pub env: Rc<Environment>,
    pub evaluate: bool,
    /// Print non-None top-level results, the way a REPL displayhook
    /// would.
    pub interactive: bool,
    abort: Option<String>,
}

impl Compiler {
    pub fn new(qualname: &str, env: Option<Rc<Environment>>, evaluate: bool) -> Self {
        let env = env.unwrap_or_else(|| Environment::new_module(qualname));
        Compiler {
            qualname: qualname.to_string(),
            env,
            evaluate,
            interactive: false,
            abort: None,
        }
    }

    /// Compile multiple forms, executing each against the environment
    /// if evaluate mode is enabled.
    pub fn compile(&mut self, forms: &[Form]) -> Result<String, LisspError> {
        let mut result: Vec<String> = Vec::new();
        for (number, form) in forms.iter().enumerate() {
            let python = self.form(form)?;
            result.extend(self.execute(form, &python, number + 1));
            if let Some(traceback) = self.abort.take() {
                return Err(LisspError::Abort(traceback));
            }
        }
        Ok(result.join("\n\n"))
    }

    /// Compile a Hissp form to the equivalent Python code in a string.
    /// Tuples and strings have special evaluation rules, otherwise it's
    /// an atom that represents itself.
    pub fn form(&mut self, form: &Form) -> Result<String, CompileError> {
        let result = match form {
            Form::Tuple(items) if !items.is_empty() => self.tuple(form, items),
            Form::Str(code) if !code.starts_with(':') => Ok(self.str_(code)),
            _ => self.atom(form),
        };
        result.map_err(|e| e.trace("form", form))
    }

    /// Compile call, macro, or special forms.
    fn tuple(&mut self, form: &Form, items: &[Form]) -> Result<String, CompileError> {
        let result = match &items[0] {
            Form::Str(_) => self.special(form, items),
            _ => self.call(form, items),
        };
        result.map_err(|e| e.trace("tuple", form))
    }

    /// Try to compile as a special form, else invocation.
    ///
    /// The two special forms are `quote` and `lambda`. A quote form
    /// evaluates to its argument, treated as literal data.
    fn special(&mut self, form: &Form, items: &[Form]) -> Result<String, CompileError> {
        let result = (|| match &items[0] {
            Form::Str(s) if s == "quote" => match items {
                [_, payload] => self.atom(payload),
                _ => Err(CompileError::new(format!(
                    "quote expects one argument, got {}",
                    items.len() - 1
                ))),
            },
            Form::Str(s) if s == "lambda" => self.function(form, items),
            _ => self.invocation(form, items),
        })();
        result.map_err(|e| e.trace("special", form))
    }

    /// Compile the anonymous function special form:
    ///
    /// ```lissp
    /// (lambda (<parameters>)
    ///   <body>)
    /// ```
    ///
    /// The parameters tuple is divided into (<singles> : <pairs>).
    /// Parameter types are the same as Python's: the control words `:*`
    /// and `:**` designate the remainder of the positional and keyword
    /// parameters respectively, `:/` ends positional-only parameters,
    /// and `:?` stands for a missing pair element.
    fn function(&mut self, form: &Form, items: &[Form]) -> Result<String, CompileError> {
        let result = (|| {
            let parameters = match items.get(1) {
                Some(Form::Tuple(parameters)) => self.parameters(parameters)?,
                Some(other) => {
                    return Err(CompileError::new(format!(
                        "lambda parameters must be a tuple, got {other}"
                    )));
                }
                None => return Err(CompileError::new("lambda missing parameters")),
            };
            let body = self.body(&items[2..])?;
            Ok(format!("(lambda {parameters}:{body})"))
        })();
        result.map_err(|e| e.trace("function", form))
    }

    /// Process the parameters tuple to compile a function.
    fn parameters(&mut self, parameters: &[Form]) -> Result<String, CompileError> {
        let mut out: Vec<String> = Vec::new();
        let mut it = parameters.iter();
        for parameter in it.by_ref() {
            match parameter {
                Form::Str(s) if s == ":" => break,
                Form::Str(s) if s == ":/" => out.push("/".to_string()),
                Form::Str(s) if s == ":*" => out.push("*".to_string()),
                Form::Str(s) => out.push(s.clone()),
                other => {
                    return Err(CompileError::new(format!(
                        "parameter must be a symbol, got {other}"
                    )));
                }
            }
        }
        while let Some(k) = it.next() {
            let v = it
                .next()
                .ok_or_else(|| CompileError::new("Incomplete pair."))?;
            let k = match k {
                Form::Str(s) => s.as_str(),
                other => {
                    return Err(CompileError::new(format!(
                        "parameter must be a symbol, got {other}"
                    )));
                }
            };
            match (k, v) {
                (":*", Form::Str(s)) if s == ":?" => out.push("*".to_string()),
                (":*", Form::Str(name)) => out.push(format!("*{name}")),
                (":/", _) => out.push("/".to_string()),
                (":**", Form::Str(name)) => out.push(format!("**{name}")),
                (_, Form::Str(s)) if s == ":?" => out.push(k.to_string()),
                (_, default) => out.push(format!("{k}={}", self.form(default)?)),
            }
        }
        Ok(out.join(","))
    }

    /// Compile the body of a function. Multiple expressions evaluate in
    /// sequence for side effects; the last is the value.
    fn body(&mut self, body: &[Form]) -> Result<String, CompileError> {
        let mut flat: Vec<&Form> = Vec::with_capacity(body.len());
        for form in body {
            // Progn peephole: an immediately-applied empty-parameter
            // lambda flattens into the enclosing sequence.
            match progn_body(form) {
                Some(inner) => flat.extend(inner),
                None => flat.push(form),
            }
        }
        if flat.len() > 1 {
            let parts = flat
                .iter()
                .map(|form| self.form(form))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(format!("({})[-1]", join_args(&parts)));
        }
        match flat.first() {
            None => Ok("()".to_string()),
            Some(form) => {
                let result = self.form(form)?;
                let prefix = if result.contains('\n') { "\n" } else { "" };
                Ok(format!("{prefix}{result}").replace('\n', "\n  "))
            }
        }
    }

    /// Try to compile as a macro, else a normal call. Expansions get a
    /// comment line naming the macro; direct recursion collapses the
    /// repeated comments to one.
    fn invocation(&mut self, form: &Form, items: &[Form]) -> Result<String, CompileError> {
        let result = (|| {
            let head = match &items[0] {
                Form::Str(head) => head.clone(),
                _ => return self.call(form, items),
            };
            if let Some(res) = self.macro_(form, &head, &items[1..])? {
                if res.starts_with('#')
                    && res
                        .trim_start_matches('#')
                        .starts_with(&format!(" {head}\n"))
                {
                    return Ok(format!("#{res}")); // Abbreviate direct recursion.
                }
                return Ok(format!("# {head}\n{res}"));
            }
            let mut called = items.to_vec();
            called[0] = Form::Str(head.replacen(MAYBE_SEP, "..", 1));
            let called_form = Form::Tuple(called.clone());
            self.call(&called_form, &called)
        })();
        result.map_err(|e| e.trace("invocation", form))
    }

    /// Macroexpand and start over with the expansion, if the head names
    /// a macro.
    fn macro_(
        &mut self,
        form: &Form,
        head: &str,
        tail: &[Form],
    ) -> Result<Option<String>, CompileError> {
        let macro_obj = resolve_macro(head, &self.env).map_err(|e| {
            CompileError::from(e).trace("macro", form)
        })?;
        let macro_obj = match macro_obj {
            Some(obj) => obj,
            None => return Ok(None),
        };
        let expansion = {
            let _context = expand::macro_context(self.env.clone());
            let args = tail.iter().cloned().map(Object::Form).collect();
            eval::call_object(&macro_obj, eval::CallArgs::positional(args))
                .and_then(Object::into_form)
                .map_err(|e| CompileError::from(e).trace("macro", form))?
        };
        Ok(Some(self.form(&expansion)?))
    }

    /// Compile a call form: `(<callable> <args> : <kwargs>)`.
    ///
    /// Singles before the `:` emit positionally; pairs after it emit as
    /// keywords, with the control words `:*`/`:**` for iterable and
    /// mapping unpacking and `:?` for a positional in the pairs
    /// section. A head starting with `.` emits a method call on the
    /// first argument.
    fn call(&mut self, form: &Form, items: &[Form]) -> Result<String, CompileError> {
        let result = (|| {
            let head = &items[0];
            let mut it = items[1..].iter();
            let mut args: Vec<String> = Vec::new();
            let mut singles = 0usize;
            let mut first_pair_positional = false;
            for item in it.by_ref() {
                if matches!(item, Form::Str(s) if s == ":") {
                    break;
                }
                args.push(self.form(item)?);
                singles += 1;
            }
            let mut first_pair = true;
            while let Some(k) = it.next() {
                let v = it
                    .next()
                    .ok_or_else(|| CompileError::new("Incomplete pair."))?;
                if first_pair {
                    first_pair_positional = matches!(k, Form::Str(s) if s == ":?");
                    first_pair = false;
                }
                args.push(self.pair_arg(k, v)?);
            }
            if let Form::Str(name) = head {
                if let Some(method) = name.strip_prefix('.') {
                    if singles == 0 && !first_pair_positional {
                        return Err(CompileError::new("self must be paired with :?"));
                    }
                    let self_arg = args.remove(0);
                    return Ok(format!("{}.{}({})", self_arg, method, join_args(&args)));
                }
            }
            Ok(format!("{}({})", self.form(head)?, join_args(&args)))
        })();
        result.map_err(|e| e.trace("call", form))
    }

    fn pair_arg(&mut self, k: &Form, v: &Form) -> Result<String, CompileError> {
        let k = match k {
            Form::Str(s) => s.as_str(),
            other => {
                return Err(CompileError::new(format!(
                    "keyword must be a symbol, got {other}"
                )));
            }
        };
        let mut k = match k {
            ":*" => "*".to_string(),
            ":**" => "**".to_string(),
            ":?" => String::new(),
            name => format!("{name}="),
        };
        if k.contains("..") {
            // Qualified keyword names keep only their last component.
            if let Some(last) = k.rsplit('.').next() {
                k = last.to_string();
            }
        }
        let indent = " ".repeat(k.len());
        Ok(format!(
            "{k}{}",
            self.form(v)?.replace('\n', &format!("\n{indent}"))
        ))
    }

    /// Compile code strings. Expands qualified identifiers and module
    /// handles into imports. Otherwise, injects as raw Python directly
    /// into the output.
    fn str_(&mut self, code: &str) -> String {
        if code.contains("...") {
            return code.to_string();
        }
        if !code
            .split('.')
            .filter(|part| !part.is_empty())
            .all(is_identifier)
        {
            return code.to_string();
        }
        if code.contains("..") {
            return self.qualified_identifier(code);
        }
        if code.ends_with('.') {
            return module_identifier(code);
        }
        code.to_string()
    }

    /// Compile a qualified identifier into an import and attribute
    /// chain. When the module is the current qualname, the import is
    /// replaced with a globals lookup so module-local redefinitions are
    /// honored.
    fn qualified_identifier(&mut self, code: &str) -> String {
        let (module, rest) = match code.split_once("..") {
            Some(parts) => parts,
            None => return code.to_string(),
        };
        if module == self.qualname {
            let (name, attrs) = match rest.split_once('.') {
                Some((name, attrs)) => (name, Some(attrs)),
                None => (rest, None),
            };
            let lookup = format!(
                "__import__('builtins').globals()[{}]",
                pyrepr::repr_str(name)
            );
            return match attrs {
                Some(attrs) => format!("{lookup}.{attrs}"),
                None => lookup,
            };
        }
        format!(
            "__import__('{module}'{}).{rest}",
            if module.contains('.') {
                ",fromlist='*'"
            } else {
                ""
            }
        )
    }

    /// Compile forms that evaluate to themselves. Emits a literal if
    /// possible, otherwise falls back to pickle.
    fn atom(&mut self, form: &Form) -> Result<String, CompileError> {
        let result = (|| match form {
            Form::Ellipsis => Ok("...".to_string()),
            Form::Tuple(items) if !items.is_empty() => self.lisp_normal_form(items),
            Form::Tuple(_) => Ok("()".to_string()),
            Form::List(_) | Form::Set(_) | Form::Map(_) => self.collection(form),
            Form::Nil => Ok("None".to_string()),
            Form::Bool(true) => Ok("True".to_string()),
            Form::Bool(false) => Ok("False".to_string()),
            // Number literals may need (). E.g. (1).real
            Form::Int(n) => Ok(format!("({n})")),
            Form::Float(x) if x.is_finite() => Ok(format!("({})", pyrepr::repr_float(*x))),
            Form::Float(_) => pickle::pickle_expr(form),
            Form::Str(s) => Ok(pyrepr::repr_str(s)),
            Form::Bytes(b) => Ok(pyrepr::repr_bytes(b)),
        })();
        result.map_err(|e| e.trace("atom", form))
    }

    /// Nested tuples serialize as Lisp-normal form with a trailing
    /// comma.
    fn lisp_normal_form(&mut self, items: &[Form]) -> Result<String, CompileError> {
        let parts = items
            .iter()
            .map(|item| self.atom(item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!("({},)", parts.join(",\n").replace('\n', "\n ")))
    }

    /// Use the literal if it reproduces the object graph, else pickle.
    fn collection(&mut self, form: &Form) -> Result<String, CompileError> {
        if let Form::Set(items) = form {
            if items.is_empty() {
                // `set` could be shadowed; an empty display can't.
                return Ok("{*''}".to_string());
            }
        }
        if literal_ok(form) {
            return Ok(format!("{form}"));
        }
        pickle::pickle_expr(form)
    }

    /// Execute a compiled form, but only if evaluate mode is enabled.
    ///
    /// Errors are classified: in `__main__` the compiler aborts;
    /// elsewhere it warns and annotates the output with the traceback
    /// as comments, continuing with subsequent forms.
    fn execute(&mut self, form: &Form, python: &str, number: usize) -> Vec<String> {
        if !self.evaluate {
            return vec![python.to_string()];
        }
        let filename = format!(
            "<Compiled Hissp #{number} of {}:\n{}\n>",
            self.qualname,
            linenos(python)
        );
        match eval::eval_form(form, &self.env) {
            Ok(result) => {
                if self.interactive && !matches!(result, Object::Form(Form::Nil)) {
                    println!("{}", py_repr(&result));
                }
                vec![python.to_string()]
            }
            Err(e) => {
                let traceback =
                    format!("Traceback (most recent call last):\n  File {filename}\n{e}");
                if self.env.name() == "__main__" {
                    self.abort = Some(traceback);
                    vec![python.to_string()]
                } else {
                    eprintln!(
                        "PostCompileWarning: {e} when evaluating form:\n{python}\n\n{traceback}"
                    );
                    vec![
                        python.to_string(),
                        format!("# {}", traceback.replace('\n', "\n# ")),
                    ]
                }
            }
        }
    }
}

/// Number the lines of emitted code, for synthetic filenames that point
/// runtime tracebacks back to the Hissp.
fn linenos(form: &str) -> String {
    let lines: Vec<&str> = form.split('\n').collect();
    let digits = lines.len().to_string().len();
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:0digits$} {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

fn join_args(args: &[String]) -> String {
    let prefix = if args.is_empty() { "" } else { "\n" };
    format!("{prefix}{}", args.join(",\n")).replace('\n', "\n  ")
}

/// Whether the whole form is expressible as a round-trippable literal.
fn literal_ok(form: &Form) -> bool {
    match form {
        Form::Float(x) => x.is_finite(),
        Form::Set(items) => !items.is_empty() && items.iter().all(literal_ok),
        Form::Tuple(items) | Form::List(items) => items.iter().all(literal_ok),
        Form::Map(pairs) => pairs.iter().all(|(k, v)| literal_ok(k) && literal_ok(v)),
        _ => true,
    }
}

/// Detect `((lambda () body…))`: an immediately-applied empty-parameter
/// lambda, which may flatten into an enclosing sequence.
fn progn_body(form: &Form) -> Option<&[Form]> {
    let items = match form {
        Form::Tuple(items) if items.len() == 1 => items,
        _ => return None,
    };
    let inner = match &items[0] {
        Form::Tuple(inner) if inner.len() >= 2 => inner,
        _ => return None,
    };
    if !matches!(&inner[0], Form::Str(s) if s == "lambda") {
        return None;
    }
    match &inner[1] {
        Form::Tuple(params)
            if params.is_empty()
                || (params.len() == 1 && matches!(&params[0], Form::Str(s) if s == ":")) =>
        {
            Some(&inner[2..])
        }
        _ => None,
    }
}

/// Resolve the macro a head designates, if any.
///
/// The precedence mirrors the qualifier: a head qualified with the
/// macro separator resolves in the current module's `_macro_` (when the
/// qualname matches) or through the module registry; a `QzMaybe_` head
/// falls back to `None` on lookup failure; a bare head resolves in the
/// current `_macro_` namespace.
pub(crate) fn resolve_macro(
    head: &str,
    env: &Rc<Environment>,
) -> Result<Option<Object>, EvalError> {
    let macro_at = head.find(MACRO_SEP);
    let maybe_at = head.find(MAYBE_SEP);
    let (at, sep) = match (macro_at, maybe_at) {
        (Some(m), Some(q)) if m < q => (m, MACRO_SEP),
        (Some(m), None) => (m, MACRO_SEP),
        (Some(_), Some(q)) => (q, MAYBE_SEP),
        (None, Some(q)) => (q, MAYBE_SEP),
        (None, None) => return Ok(env.get_macro(head)),
    };
    let module = &head[..at];
    let name = &head[at + sep.len()..];
    let maybe = sep == MAYBE_SEP;
    if module == env.name() {
        return match env.get_macro(name) {
            Some(obj) => Ok(Some(obj)),
            None if maybe => Ok(None),
            None => Err(EvalError::UndefinedSymbol(head.to_string())),
        };
    }
    let target = head.replacen(MAYBE_SEP, MACRO_SEP, 1);
    match eval::resolve_qualified(&target) {
        Ok(obj) => Ok(Some(obj)),
        Err(_) if maybe => Ok(None),
        Err(e) => Err(e),
    }
}

/// Compile a Hissp form to Python without evaluating it. Uses the
/// current expansion environment for context, unless an alternative is
/// provided. (Creates a temporary namespace if neither is available.)
pub fn readerless(form: &Form, env: Option<&Rc<Environment>>) -> Result<String, CompileError> {
    let env = env
        .cloned()
        .or_else(expand::expansion_env)
        .unwrap_or_else(|| Environment::new("__main__"));
    let qualname = env.name();
    let mut compiler = Compiler::new(&qualname, Some(env), false);
    match compiler.compile(std::slice::from_ref(form)) {
        Ok(python) => Ok(python),
        Err(LisspError::Compile(e)) => Err(e),
        Err(other) => Err(CompileError::new(other.to_string())),
    }
}

fn module_identifier(code: &str) -> String {
    let module = &code[..code.len() - 1];
    format!(
        "__import__('{module}'{})",
        if module.contains('.') {
            ",fromlist='*'"
        } else {
            ""
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(form: Form) -> String {
        readerless(&form, None).expect("compiles")
    }

    #[test]
    fn test_call_emission() {
        let form = Form::tuple(vec![Form::sym("print"), Form::sym("('Hello, World!')")]);
        assert_eq!(compiled(form), "print(\n  ('Hello, World!'))");
    }

    #[test]
    fn test_call_with_kwargs() {
        let form = Form::tuple(vec![
            Form::sym("print"),
            Form::Int(1),
            Form::Int(2),
            Form::sym(":"),
            Form::sym("sep"),
            Form::tuple(vec![Form::sym("quote"), Form::sym(":")]),
        ]);
        assert_eq!(compiled(form), "print(\n  (1),\n  (2),\n  sep=':')");
    }

    #[test]
    fn test_star_unpacking() {
        let form = Form::tuple(vec![
            Form::sym("print"),
            Form::sym(":"),
            Form::sym(":*"),
            Form::List(vec![Form::Int(1), Form::Int(2)]),
            Form::sym(":**"),
            Form::Map(vec![(Form::sym("sep"), Form::sym(":"))]),
        ]);
        assert_eq!(
            compiled(form),
            "print(\n  *[1, 2],\n  **{'sep': ':'})"
        );
    }

    #[test]
    fn test_empty_call() {
        assert_eq!(compiled(Form::tuple(vec![Form::sym("foo")])), "foo()");
        assert_eq!(
            compiled(Form::tuple(vec![Form::sym("foo"), Form::sym(":")])),
            "foo()"
        );
    }

    #[test]
    fn test_method_call() {
        let form = Form::tuple(vec![Form::sym(".conjugate"), Form::Int(1)]);
        assert_eq!(compiled(form), "(1).conjugate()");
    }

    #[test]
    fn test_method_call_requires_self() {
        let form = Form::tuple(vec![Form::sym(".conjugate")]);
        assert!(readerless(&form, None).is_err());
    }

    #[test]
    fn test_quote_data() {
        let form = Form::tuple(vec![
            Form::sym("quote"),
            Form::tuple(vec![Form::sym("print"), Form::Int(42)]),
        ]);
        assert_eq!(compiled(form), "('print',\n (42),)");
    }

    #[test]
    fn test_lambda_spec_scenario() {
        // (lambda (a :/ b : :* :? :** kwargs) a)
        let form = Form::tuple(vec![
            Form::sym("lambda"),
            Form::tuple(vec![
                Form::sym("a"),
                Form::sym(":/"),
                Form::sym("b"),
                Form::sym(":"),
                Form::sym(":*"),
                Form::sym(":?"),
                Form::sym(":**"),
                Form::sym("kwargs"),
            ]),
            Form::sym("a"),
        ]);
        assert_eq!(compiled(form), "(lambda a,/,b,*,**kwargs:a)");
    }

    #[test]
    fn test_lambda_defaults_and_variants() {
        let form = Form::tuple(vec![
            Form::sym("lambda"),
            Form::tuple(vec![
                Form::sym(":"),
                Form::sym("a"),
                Form::Int(1),
                Form::sym(":/"),
                Form::sym(":?"),
                Form::sym(":*"),
                Form::sym(":?"),
                Form::sym("b"),
                Form::sym(":?"),
                Form::sym("c"),
                Form::Int(2),
            ]),
        ]);
        assert_eq!(compiled(form), "(lambda a=(1),/,*,b,c=(2):())");
    }

    #[test]
    fn test_lambda_empty_variants() {
        let empty_tuple = Form::tuple(vec![Form::sym("lambda"), Form::Tuple(vec![])]);
        assert_eq!(compiled(empty_tuple), "(lambda :())");
        let only_colon = Form::tuple(vec![
            Form::sym("lambda"),
            Form::tuple(vec![Form::sym(":")]),
        ]);
        assert_eq!(compiled(only_colon), "(lambda :())");
    }

    #[test]
    fn test_lambda_body_sequence() {
        let form = Form::tuple(vec![
            Form::sym("lambda"),
            Form::Tuple(vec![]),
            Form::tuple(vec![Form::sym("print"), Form::sym("args")]),
            Form::tuple(vec![Form::sym("print"), Form::sym("more")]),
        ]);
        assert_eq!(
            compiled(form),
            "(lambda :(\n  print(\n    args),\n  print(\n    more))[-1])"
        );
    }

    #[test]
    fn test_progn_peephole() {
        // (lambda () ((lambda () a b)) c) flattens the inner progn.
        let inner = Form::tuple(vec![Form::tuple(vec![
            Form::sym("lambda"),
            Form::Tuple(vec![]),
            Form::sym("a"),
            Form::sym("b"),
        ])]);
        let form = Form::tuple(vec![
            Form::sym("lambda"),
            Form::Tuple(vec![]),
            inner,
            Form::sym("c"),
        ]);
        assert_eq!(compiled(form), "(lambda :(\n  a,\n  b,\n  c)[-1])");
    }

    #[test]
    fn test_atom_emission() {
        assert_eq!(compiled(Form::Int(42)), "(42)");
        assert_eq!(compiled(Form::Float(-4.2)), "(-4.2)");
        assert_eq!(compiled(Form::Nil), "None");
        assert_eq!(compiled(Form::Ellipsis), "...");
        assert_eq!(compiled(Form::Tuple(vec![])), "()");
        assert_eq!(compiled(Form::sym(":control")), "':control'");
        assert_eq!(compiled(Form::Bytes(b"\xfffoo".to_vec())), "b'\\xfffoo'");
    }

    #[test]
    fn test_empty_set_emission() {
        assert_eq!(compiled(Form::Set(vec![])), "{*''}");
    }

    #[test]
    fn test_collection_emission() {
        let form = Form::List(vec![
        Form::Map(vec![(Form::sym("foo"), Form::Int(2))]),
            Form::Tuple(vec![]),
            Form::Float(2.0),
            Form::Set(vec![Form::Int(3)]),
        ]);
        assert_eq!(compiled(form), "[{'foo': 2}, (), 2.0, {3}]");
    }

    #[test]
    fn test_nonfinite_float_pickles() {
        let python = compiled(Form::Float(f64::NAN));
        assert!(python.starts_with("__import__('pickle').loads("));
        assert!(python.contains("# nan"));
    }

    #[test]
    fn test_collection_with_nonfinite_pickles() {
        let python = compiled(Form::List(vec![Form::Float(f64::INFINITY)]));
        assert!(python.starts_with("__import__('pickle').loads("));
    }

    #[test]
    fn test_fragment_rewriting() {
        assert_eq!(
            compiled(Form::sym("math..inf")),
            "__import__('math').inf"
        );
        assert_eq!(
            compiled(Form::sym("collections.abc..Mapping")),
            "__import__('collections.abc',fromlist='*').Mapping"
        );
        assert_eq!(compiled(Form::sym("math.")), "__import__('math')");
        assert_eq!(
            compiled(Form::sym("collections.abc.")),
            "__import__('collections.abc',fromlist='*')"
        );
        assert_eq!(compiled(Form::sym("1+1")), "1+1");
        assert_eq!(compiled(Form::sym("foo")), "foo");
    }

    #[test]
    fn test_self_module_globals_lookup() {
        let env = Environment::new("spam");
        let mut compiler = Compiler::new("spam", Some(env), false);
        let python = compiler.form(&Form::sym("spam..eggs.attr")).expect("compiles");
        assert_eq!(
            python,
            "__import__('builtins').globals()['eggs'].attr"
        );
    }

    #[test]
    fn test_incomplete_pair_is_compile_error() {
        let form = Form::tuple(vec![
            Form::sym("foo"),
            Form::sym(":"),
            Form::sym("bar"),
        ]);
        let e = readerless(&form, None).expect_err("odd pairing");
        assert!(e.to_string().contains("Incomplete pair."));
        assert!(e.to_string().contains("Compiler.call()"));
    }

    #[test]
    fn test_macro_expansion_comment() {
        let env = Environment::new("__main__");
        static X2: eval::NativeDef = eval::NativeDef {
            name: "x2",
            f: |call| {
                let args = call.no_kwargs("x2")?;
                let arg = args
                    .into_iter()
                    .next()
                    .ok_or_else(|| crate::error::EvalError::arity_error("x2", "1", 0))?
                    .into_form()?;
                Ok(Object::Form(Form::tuple(vec![
                    Form::sym("print"),
                    arg,
                ])))
            },
        };
        env.define_macro("x2", Object::Native(&X2));
        let mut compiler = Compiler::new("__main__", Some(env), false);
        let python = compiler
            .form(&Form::tuple(vec![Form::sym("x2"), Form::Int(7)]))
            .expect("compiles");
        assert_eq!(python, "# x2\nprint(\n  (7))");
    }

    #[test]
    fn test_maybe_falls_back_to_call() {
        let form = Form::tuple(vec![
            Form::sym("__main__..QzMaybe_.foo"),
            Form::Int(1),
        ]);
        assert_eq!(
            compiled(form),
            "__import__('builtins').globals()['foo'](\n  (1))"
        );
    }

    #[test]
    fn test_linenos() {
        assert_eq!(linenos("a\nb"), "1 a\n2 b");
        let ten = vec!["x"; 10].join("\n");
        assert!(linenos(&ten).starts_with("01 x"));
    }
}
