//! `bc_rs`: an arbitrary-precision decimal calculator engine, the bytecode
//! compiler/VM that drives the `bc` and `dc` languages over it, and a
//! handle-based library façade (`library`) for embedding the arithmetic
//! engine in a host program without going through either language.

pub mod ast;
pub mod bytecode;
pub mod cli;
pub mod collections;
pub mod compiler;
pub mod dc;
pub mod error;
pub mod lexer;
pub mod library;
pub mod num;
pub mod parser;
pub mod program;
pub mod rng;
pub mod token;
pub mod vm;

pub use error::{CalcError, CalcResult};
pub use num::Number;
pub use program::Program;
pub use vm::Vm;

/// Stand-in for the real `bc -l` preload (`lib.bc`): the transcendental
/// functions it normally defines (`s`, `c`, `e`, `l`, `a`, `j`) are
/// outside this crate's scope (arbitrary-precision arithmetic and the
/// language that drives it, not a shipped math library written *in*
/// that language) and are deliberately left out rather than
/// hand-expanded into Taylor-series bodies. Loading this under `-l`
/// still reproduces real `bc`'s other observable effect of that flag:
/// a default scale of 20.
pub const MATHLIB_PRELUDE: &str = "scale = 20\n";

/// Compiles and runs a complete `bc` source string against a fresh
/// `Program`, writing output to `out`. Convenience wrapper used by the
/// `bc` CLI and by tests; library consumers that want `bc`-language
/// execution with persistent state across calls should drive
/// `compiler::Compiler`/`vm::Vm` directly instead.
pub fn run_bc(source: &str, out: &mut dyn std::io::Write, input: &mut dyn std::io::BufRead) -> CalcResult<()> {
    let module = compiler::Compiler::compile(source)?;
    let mut vm = vm::Vm::new(&module, program::Program::new());
    vm.run(out, input)
}

/// Compiles and runs a complete `dc` source string against a fresh
/// `Program`. See `run_bc` for the equivalent `bc` entry point.
pub fn run_dc(source: &str, out: &mut dyn std::io::Write, input: &mut dyn std::io::BufRead) -> CalcResult<()> {
    let module = dc::compile(source)?;
    let mut vm = vm::Vm::new(&module, program::Program::new());
    vm.run(out, input)
}
