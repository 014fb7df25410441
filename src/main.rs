//! `bc`: the POSIX arbitrary-precision calculator, built on `bc_rs`.
//!
//! A thin driver per §6 of the spec this crate implements: argument
//! parsing, file/stdin slurping and exit-code mapping live here; every
//! actual behavior (parsing, compiling, interpreting) is `bc_rs`'s.
//! Richer CLI behavior (interactive history/line-editing, a real
//! line-at-a-time REPL loop) is an explicit Non-goal, so `-i` is
//! accepted but otherwise just falls through to reading stdin whole.

use bc_rs::cli;
use bc_rs::compiler::Compiler;
use bc_rs::program::Program;
use bc_rs::vm::Vm;
use bc_rs::{CalcError, MATHLIB_PRELUDE};
use std::io::{self, Read, Write};
use std::process;

struct Config {
    interactive: bool,
    mathlib: bool,
    warn: bool,
    standard: bool,
    quiet: bool,
    sources: Vec<Source>,
}

enum Source {
    File(String),
    Expr(String),
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [options] [file ...]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -i, --interactive   force interactive mode");
    eprintln!("  -l, --mathlib       preload the math library, set scale to 20");
    eprintln!("  -w, --warn          warn on POSIX-nonconforming constructs");
    eprintln!("  -s, --standard      error on POSIX-nonconforming constructs");
    eprintln!("  -q, --quiet         suppress the startup banner");
    eprintln!("  -e EXPR             evaluate EXPR before reading any files");
    eprintln!("  -f FILE             evaluate FILE before reading any other files");
    eprintln!("  -v, --version       print version information and exit");
    eprintln!("  -h, --help          print this help and exit");
}

fn print_version() {
    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
}

/// Parses argv (with `BC_ENV_ARGS` prepended, per §6) into a `Config`.
/// Returns `Err(exit_code)` for `-h`/`-v` and usage errors, which the
/// caller should propagate straight to `process::exit`.
fn parse_args(args: Vec<String>) -> Result<Config, i32> {
    let mut cfg = Config {
        interactive: false,
        mathlib: false,
        warn: false,
        standard: cli::posixly_correct(),
        quiet: false,
        sources: Vec::new(),
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-i" | "--interactive" => cfg.interactive = true,
            "-l" | "--mathlib" => cfg.mathlib = true,
            "-w" | "--warn" => cfg.warn = true,
            "-s" | "--standard" => cfg.standard = true,
            "-q" | "--quiet" => cfg.quiet = true,
            "-v" | "--version" => {
                print_version();
                return Err(0);
            }
            "-h" | "--help" => {
                print_usage("bc");
                return Err(0);
            }
            "-e" => {
                i += 1;
                match args.get(i) {
                    Some(expr) => cfg.sources.push(Source::Expr(expr.clone())),
                    None => {
                        eprintln!("bc: -e requires an argument");
                        return Err(2);
                    }
                }
            }
            "-f" => {
                i += 1;
                match args.get(i) {
                    Some(file) => cfg.sources.push(Source::File(file.clone())),
                    None => {
                        eprintln!("bc: -f requires an argument");
                        return Err(2);
                    }
                }
            }
            arg if arg.starts_with('-') && arg.len() > 1 => {
                eprintln!("bc: unknown option: {}", arg);
                return Err(2);
            }
            file => cfg.sources.push(Source::File(file.to_string())),
        }
        i += 1;
    }

    Ok(cfg)
}

fn read_source(src: &Source) -> io::Result<String> {
    match src {
        Source::File(path) => std::fs::read_to_string(path),
        Source::Expr(expr) => Ok(format!("{}\n", expr)),
    }
}

fn describe_source(src: &Source, err: &io::Error) -> String {
    match src {
        Source::File(path) => format!("{}: {}", path, err),
        Source::Expr(_) => format!("<expression>: {}", err),
    }
}

fn main() {
    cli::init_logging();

    let mut argv: Vec<String> = cli::env_args();
    argv.extend(std::env::args().skip(1));

    let cfg = match parse_args(argv) {
        Ok(cfg) => cfg,
        Err(code) => process::exit(code),
    };

    if !cfg.quiet && cfg.interactive {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    }

    let mut text = String::new();
    if cfg.mathlib {
        text.push_str(MATHLIB_PRELUDE);
    }
    for src in &cfg.sources {
        match read_source(src) {
            Ok(s) => {
                text.push_str(&s);
                if !text.ends_with('\n') {
                    text.push('\n');
                }
            }
            Err(e) => {
                let msg = describe_source(src, &e);
                eprintln!("bc: could not open {}", msg);
                process::exit(CalcError::ExecFileErr(msg).exit_code());
            }
        }
    }

    // With no `-e`/`-f` at all, or when forced interactive, the
    // remaining program text comes from stdin.
    if cfg.sources.is_empty() || cfg.interactive {
        let mut stdin_text = String::new();
        if io::stdin().lock().read_to_string(&mut stdin_text).is_ok() {
            text.push_str(&stdin_text);
        }
    }

    let module = match Compiler::compile(&text) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("bc: {}", e);
            process::exit(e.exit_code());
        }
    };

    for warning in &module.warnings {
        if cfg.standard {
            eprintln!("bc: {}", warning);
            process::exit(warning.exit_code());
        } else if cfg.warn {
            eprintln!("bc: warning: {}", warning);
        }
    }

    let mut program = Program::new();
    program.posix_strict = cfg.standard;
    program.posix_warn = cfg.warn;

    let mut vm = Vm::new(&module, program);
    vm.set_line_length(cli::env_line_length());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let stdin = io::stdin();
    let mut input = stdin.lock();

    match vm.run(&mut out, &mut input) {
        Ok(()) => {
            let _ = out.flush();
        }
        Err(e) => {
            let _ = out.flush();
            eprintln!("bc: {}", e);
            process::exit(e.exit_code());
        }
    }
}
