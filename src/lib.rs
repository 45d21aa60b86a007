// ABOUTME: Library root for the Lissp -> Hissp -> Python transpiler pipeline

pub mod builtins;
pub mod compiler;
pub mod config;
pub mod env;
pub mod error;
pub mod eval;
pub mod expand;
pub mod form;
pub mod lexer;
pub mod munger;
pub mod pickle;
pub mod pyrepr;
pub mod reader;
pub mod repl;
pub mod transpile;

pub use compiler::{readerless, Compiler};
pub use env::Environment;
pub use error::{CompileError, EvalError, LisspError, SyntaxErr};
pub use expand::{macroexpand, macroexpand1, macroexpand_all, macroexpand_all_with};
pub use form::{
    is_control, is_hissp_string, is_import, is_lissp_unicode, is_node, is_str,
    is_string_literal, is_symbol, Form,
};
pub use munger::{demunge, munge};
pub use reader::{Comment, Lissp};
pub use repl::interact;
pub use transpile::{transpile, transpile_file};
