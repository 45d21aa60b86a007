// ABOUTME: Command-line interface for the Lissp transpiler

use std::io::Read;
use std::rc::Rc;

use clap::Parser;

use lissp::env::{register_module, Environment};
use lissp::error::LisspError;
use lissp::eval::Object;
use lissp::form::Form;
use lissp::reader::Lissp;
use lissp::{config, repl};

/// The Lissp transpiler. Starts a REPL if there are no arguments.
#[derive(Parser, Debug)]
#[command(name = "lissp")]
#[command(version = config::VERSION)]
#[command(about = "The Lissp transpiler. Starts a REPL if there are no arguments.")]
struct CliArgs {
    /// Drop into a REPL after the script.
    #[arg(short = 'i')]
    interact: bool,

    /// Run this string as the main script.
    #[arg(short = 'c', value_name = "cmd")]
    command: Option<String>,

    /// Run this file as the main script. (- for stdin.)
    file: Option<String>,

    /// Arguments for the script.
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let env = Environment::new("__main__");

    let (code, filename) = if let Some(code) = args.command.clone() {
        // With -c, the file positional is the first script argument.
        let mut script_args = Vec::new();
        script_args.extend(args.file.iter().cloned());
        script_args.extend(args.args.iter().cloned());
        register_sys_argv("-c", &script_args);
        (Some(code), "<string>".to_string())
    } else if let Some(file) = args.file.clone() {
        register_sys_argv(&file, &args.args);
        let code = if file == "-" {
            let mut code = String::new();
            std::io::stdin().read_to_string(&mut code)?;
            code
        } else {
            std::fs::read_to_string(&file)?
        };
        (Some(strip_shebang(&code)), file)
    } else {
        repl::interact(None)?;
        return Ok(());
    };

    if let Some(code) = code {
        let failed = run(&code, &env, &filename);
        if args.interact {
            repl::interact(Some(env))?;
        } else if failed {
            std::process::exit(1);
        }
    }
    Ok(())
}

/// Compile and run the main program. Returns whether it failed.
fn run(code: &str, env: &Rc<Environment>, filename: &str) -> bool {
    let mut lissp = Lissp::new("__main__", Some(env.clone()), true, filename);
    match lissp.compile(code) {
        Ok(_) => false,
        Err(LisspError::Abort(traceback)) => {
            eprintln!("Hissp abort!\n{traceback}");
            true
        }
        Err(e) => {
            eprintln!("{e}");
            true
        }
    }
}

fn strip_shebang(code: &str) -> String {
    match code.strip_prefix("#!") {
        Some(rest) => match rest.split_once('\n') {
            Some((_, body)) => body.to_string(),
            None => String::new(),
        },
        None => code.to_string(),
    }
}

/// Register a native `sys` module so scripts can read `sys..argv`.
fn register_sys_argv(program: &str, args: &[String]) {
    let sys = Environment::new("sys");
    let mut argv = vec![Form::sym(program)];
    argv.extend(args.iter().map(|arg| Form::Str(arg.clone())));
    sys.define("argv", Object::Form(Form::List(argv)));
    register_module(&sys);
}
