//! `dc`: the stack-based companion to `bc`, built on `bc_rs`.
//!
//! Same driver shape as `bc` (§6): slurp sources, compile with
//! `bc_rs::dc::compile`, run on the shared `Vm`. `-x` (extended
//! registers) is accepted but is a no-op here: this crate's register
//! slots are keyed by a single `char` (matching real `dc`'s default,
//! one-letter register names), so multi-character register names have
//! no representation to extend into.

use bc_rs::cli;
use bc_rs::program::Program;
use bc_rs::vm::Vm;
use std::io::{self, Read, Write};
use std::process;

struct Config {
    extended_registers: bool,
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
    eprintln!("  -e EXPR        evaluate EXPR before reading any files");
    eprintln!("  -f FILE        evaluate FILE before reading any other files");
    eprintln!("  -x             extended register set (accepted, no-op)");
    eprintln!("  -v, --version  print version information and exit");
    eprintln!("  -h, --help     print this help and exit");
}

fn parse_args(args: Vec<String>) -> Result<Config, i32> {
    let mut cfg = Config { extended_registers: false, sources: Vec::new() };
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-x" => cfg.extended_registers = true,
            "-v" | "--version" => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                return Err(0);
            }
            "-h" | "--help" => {
                print_usage("dc");
                return Err(0);
            }
            "-e" => {
                i += 1;
                match args.get(i) {
                    Some(expr) => cfg.sources.push(Source::Expr(expr.clone())),
                    None => {
                        eprintln!("dc: -e requires an argument");
                        return Err(2);
                    }
                }
            }
            "-f" => {
                i += 1;
                match args.get(i) {
                    Some(file) => cfg.sources.push(Source::File(file.clone())),
                    None => {
                        eprintln!("dc: -f requires an argument");
                        return Err(2);
                    }
                }
            }
            arg if arg.starts_with('-') && arg.len() > 1 => {
                eprintln!("dc: unknown option: {}", arg);
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

fn main() {
    cli::init_logging();

    let mut argv: Vec<String> = cli::env_args();
    argv.extend(std::env::args().skip(1));

    let cfg = match parse_args(argv) {
        Ok(cfg) => cfg,
        Err(code) => process::exit(code),
    };
    let _ = cfg.extended_registers;

    let mut text = String::new();
    for src in &cfg.sources {
        match read_source(src) {
            Ok(s) => text.push_str(&s),
            Err(e) => {
                match src {
                    Source::File(path) => eprintln!("dc: could not open {}: {}", path, e),
                    Source::Expr(_) => eprintln!("dc: could not read expression: {}", e),
                }
                process::exit(3);
            }
        }
    }

    if cfg.sources.is_empty() {
        let mut stdin_text = String::new();
        if io::stdin().lock().read_to_string(&mut stdin_text).is_ok() {
            text.push_str(&stdin_text);
        }
    }

    let module = match bc_rs::dc::compile(&text) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("dc: {}", e);
            process::exit(e.exit_code());
        }
    };

    let mut vm = Vm::new(&module, Program::new());
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
            eprintln!("dc: {}", e);
            process::exit(e.exit_code());
        }
    }
}
