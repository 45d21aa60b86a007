// ABOUTME: The Lissp Read-Evaluate-Print Loop built on rustyline

use std::rc::Rc;

use rustyline::error::ReadlineError;
use rustyline::highlight::MatchingBracketHighlighter;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Highlighter, Hinter, Validator};

use crate::config::{PS1, PS2};
use crate::env::Environment;
use crate::error::LisspError;
use crate::reader::Lissp;

const HISTORY_FILE: &str = ".lissp_history";

/// Line helper: bracket-match highlighting only. Continuation is
/// driven by soft syntax errors from the reader, not by the editor.
#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct LisspHelper {
    #[rustyline(Highlighter)]
    highlighter: MatchingBracketHighlighter,
}

impl LisspHelper {
    fn new() -> Self {
        LisspHelper {
            highlighter: MatchingBracketHighlighter::new(),
        }
    }
}

/// Run the interactive REPL against the given environment (a fresh
/// `__main__` if none).
///
/// Prompts and echoed Python go to stderr; program output goes to
/// stdout. A soft syntax error requests a continuation line instead of
/// reporting. End-of-file ends the REPL.
pub fn interact(env: Option<Rc<Environment>>) -> Result<(), ReadlineError> {
    let env = env.unwrap_or_else(|| Environment::new("__main__"));
    let mut lissp = Lissp::new("__main__", Some(env), true, "<console>");
    lissp.compiler.interactive = true;

    let mut editor: Editor<LisspHelper, DefaultHistory> = Editor::new()?;
    editor.set_helper(Some(LisspHelper::new()));
    let _ = editor.load_history(HISTORY_FILE);

    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() { PS1 } else { PS2 };
        match editor.readline(prompt) {
            Ok(line) => {
                buffer.push_str(&line);
                buffer.push('\n');
                if buffer.trim().is_empty() {
                    buffer.clear();
                    continue;
                }
                match lissp.compile(&buffer) {
                    Ok(python) => {
                        if !python.is_empty() {
                            eprintln!("{PS1}{}", python.replace('\n', &format!("\n{PS2}")));
                        }
                        let _ = editor.add_history_entry(buffer.trim_end());
                        buffer.clear();
                    }
                    Err(e) if e.is_soft() => continue, // ask for another line
                    Err(LisspError::Abort(traceback)) => {
                        eprintln!("Hissp abort!\n{traceback}");
                        let _ = editor.add_history_entry(buffer.trim_end());
                        buffer.clear();
                    }
                    Err(LisspError::Compile(e)) => {
                        eprintln!("{PS1}# CompileError");
                        eprintln!("{e}");
                        buffer.clear();
                    }
                    Err(LisspError::Syntax(e)) => {
                        eprintln!("{e}");
                        buffer.clear();
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                buffer.clear();
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {e}");
                break;
            }
        }
    }
    let _ = editor.save_history(HISTORY_FILE);
    Ok(())
}
