// ABOUTME: Error types for reading, compiling, and evaluating Hissp

use thiserror::Error;

use crate::lexer::Position;

/// A syntax error from the reader, shaped like the host's: message plus
/// `(filename, line, column, source_line)`.
///
/// A *soft* syntax error is one that could be corrected with more lines
/// of input (incomplete string, unclosed paren, tag at end of input).
/// When the REPL encounters one it asks for more lines rather than
/// aborting; a non-interactive front end escalates it to a hard error.
#[derive(Debug, Clone)]
pub struct SyntaxErr {
    pub msg: String,
    pub position: Position,
    pub soft: bool,
}

impl std::error::Error for SyntaxErr {}

impl std::fmt::Display for SyntaxErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}\n  {}",
            self.position.filename, self.position.lineno, self.position.offset, self.msg,
            self.position.text
        )
    }
}

impl SyntaxErr {
    pub fn new(msg: impl Into<String>, position: Position) -> Self {
        SyntaxErr {
            msg: msg.into(),
            position,
            soft: false,
        }
    }

    pub fn soft(msg: impl Into<String>, position: Position) -> Self {
        SyntaxErr {
            msg: msg.into(),
            position,
            soft: true,
        }
    }
}

/// Catch-all error for compilation failures.
///
/// Emitter methods decorate it on the way out, so the user sees a chain
/// of contexts from the innermost failure outward.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub message: String,
    pub trail: Vec<String>,
}

impl std::error::Error for CompileError {}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        CompileError {
            message: message.into(),
            trail: Vec::new(),
        }
    }

    /// Add a context frame naming the emitter method and the offending
    /// form.
    pub fn trace(mut self, method: &str, form: &dyn std::fmt::Display) -> Self {
        self.trail
            .push(format!("Compiler.{method}() (>   >  > >>{form}<< <  <   <)"));
        self
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        for frame in &self.trail {
            write!(f, "\n# in {}", frame)?;
        }
        Ok(())
    }
}

impl From<EvalError> for CompileError {
    fn from(e: EvalError) -> Self {
        CompileError::new(e.to_string())
    }
}

/// Errors from the native evaluator (macros, tags, inject, evaluate
/// mode).
#[derive(Error, Debug, Clone)]
pub enum EvalError {
    /// Type mismatch with function name, expected type, actual type,
    /// and argument position.
    #[error("{function}: expected {expected}, got {actual} at argument {position}")]
    TypeMismatch {
        function: String,
        expected: String,
        actual: String,
        position: usize,
    },

    /// Arity error with function name, expected count/range, and
    /// actual count.
    #[error("{function}: expected {expected} argument{}, got {actual}", if *.expected == "1" { "" } else { "s" })]
    ArityError {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Runtime error with function context.
    #[error("{function}: {message}")]
    RuntimeError { function: String, message: String },

    #[error("name {0:?} is not defined")]
    UndefinedSymbol(String),

    #[error("module {0:?} is not registered")]
    UnknownModule(String),

    #[error("{0} is not callable")]
    NotCallable(String),

    /// Raw Python fragments, method calls, and module handles compile
    /// fine but have no compile-time value.
    #[error("can't evaluate {0} at compile time")]
    NotEvaluable(String),
}

impl EvalError {
    /// Create a type mismatch error with full context.
    pub fn type_error(
        function: &str,
        expected: &str,
        actual: impl Into<String>,
        position: usize,
    ) -> Self {
        EvalError::TypeMismatch {
            function: function.to_string(),
            expected: expected.to_string(),
            actual: actual.into(),
            position,
        }
    }

    /// Create an arity error with expected and actual counts.
    pub fn arity_error(function: &str, expected: impl Into<String>, actual: usize) -> Self {
        EvalError::ArityError {
            function: function.to_string(),
            expected: expected.into(),
            actual,
        }
    }

    /// Create a runtime error with function context.
    pub fn runtime_error(function: &str, message: impl Into<String>) -> Self {
        EvalError::RuntimeError {
            function: function.to_string(),
            message: message.into(),
        }
    }
}

/// Top-level error for the compile pipeline.
#[derive(Error, Debug)]
pub enum LisspError {
    #[error(transparent)]
    Syntax(#[from] SyntaxErr),

    #[error(transparent)]
    Compile(#[from] CompileError),

    /// A `__main__` top-level form raised during execution; the
    /// compiler aborts with status 1.
    #[error("Hissp abort!\n{0}")]
    Abort(String),
}

impl LisspError {
    /// Whether more input lines could fix this error.
    pub fn is_soft(&self) -> bool {
        matches!(self, LisspError::Syntax(e) if e.soft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position() -> Position {
        Position {
            filename: "<test>".to_string(),
            lineno: 2,
            offset: 3,
            text: "(foo".to_string(),
        }
    }

    #[test]
    fn test_syntax_error_display() {
        let e = SyntaxErr::new("too many `)`s", position());
        assert_eq!(format!("{}", e), "<test>:2:3: too many `)`s\n  (foo");
        assert!(!e.soft);
        assert!(SyntaxErr::soft("form missing a `)`", position()).soft);
    }

    #[test]
    fn test_compile_error_trail() {
        let e = CompileError::new("Incomplete pair.")
            .trace("call", &"('foo', ':', ':x')")
            .trace("form", &"('foo', ':', ':x')");
        let text = format!("{}", e);
        assert!(text.starts_with("Incomplete pair."));
        assert!(text.contains("Compiler.call()"));
        assert!(text.contains("Compiler.form()"));
    }

    #[test]
    fn test_arity_error_pluralization() {
        let one = EvalError::arity_error("car", "1", 2);
        assert_eq!(format!("{}", one), "car: expected 1 argument, got 2");
        let two = EvalError::arity_error("cons", "2", 1);
        assert_eq!(format!("{}", two), "cons: expected 2 arguments, got 1");
    }

    #[test]
    fn test_soft_flag_via_lissp_error() {
        let e: LisspError = SyntaxErr::soft("incomplete", position()).into();
        assert!(e.is_soft());
        let e: LisspError = SyntaxErr::new("hard", position()).into();
        assert!(!e.is_soft());
    }
}
