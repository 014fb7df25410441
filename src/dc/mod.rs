//! `dc`: the stack-based companion to `bc`. Single-character commands
//! compile almost one-to-one onto the same `Op` bytecode `bc` targets, so
//! `dc` gets its own lexer but reuses `bytecode.rs`/`vm.rs` wholesale.
//!
//! There is no separate AST stage: `dc`'s grammar is already a sequence of
//! stack operations, so the lexer's tokens are translated straight into
//! bytecode in one pass, the way the real tool's `bc_parse_Code`/`dc_parse`
//! loop operates directly off the char stream.

mod lexer;

use crate::bytecode::{CompiledModule, Op};
use crate::error::{CalcError, CalcResult};
use lexer::{Lexer, Token};

pub fn compile(source: &str) -> CalcResult<CompiledModule> {
    let mut module = CompiledModule::new();
    let mut lexer = Lexer::new(source);

    loop {
        let tok = lexer.next_token();
        match tok {
            Token::Eof => break,
            Token::Error(msg) => return Err(CalcError::Syntax(msg)),

            Token::Number(s) => {
                let idx = module.add_number(&s);
                module.emit(Op::LoadNum);
                module.emit_uvarint(idx as u64);
            }
            Token::String(s) => {
                let idx = module.add_string(s);
                module.emit(Op::LoadStr);
                module.emit_uvarint(idx as u64);
            }

            Token::Store(reg) => {
                let slot = module.var_names.get_or_insert(&reg.to_string());
                module.emit(Op::StoreVar);
                module.emit_uvarint(slot as u64);
            }
            Token::Load(reg) => {
                let slot = module.var_names.get_or_insert(&reg.to_string());
                module.emit(Op::LoadVar);
                module.emit_uvarint(slot as u64);
            }
            Token::StorePush(reg) => {
                let slot = module.var_names.get_or_insert(&reg.to_string());
                module.emit(Op::RegPush);
                module.emit_uvarint(slot as u64);
            }
            Token::LoadPop(reg) => {
                let slot = module.var_names.get_or_insert(&reg.to_string());
                module.emit(Op::RegPop);
                module.emit_uvarint(slot as u64);
            }

            Token::Op(c) => emit_op(&mut module, c)?,
        }
    }

    module.emit(Op::Halt);
    Ok(module)
}

fn emit_op(module: &mut CompiledModule, c: char) -> CalcResult<()> {
    match c {
        '+' => module.emit(Op::Add),
        '-' => module.emit(Op::Sub),
        '*' => module.emit(Op::Mul),
        '/' => module.emit(Op::Div),
        '%' => module.emit(Op::Mod),
        '^' => module.emit(Op::Pow),
        '|' => module.emit(Op::Modexp),
        'v' => module.emit(Op::Sqrt),

        'p' => module.emit(Op::PrintPeek),
        'n' => module.emit(Op::Print),
        'f' => module.emit(Op::PrintStack),
        'c' => module.emit(Op::ClearStack),
        'd' => module.emit(Op::Dup),
        'r' => module.emit(Op::Swap),
        'z' => module.emit(Op::StackDepth),

        'i' => module.emit(Op::StoreIbase),
        'I' => module.emit(Op::LoadIbase),
        'o' => module.emit(Op::StoreObase),
        'O' => module.emit(Op::LoadObase),
        'k' => module.emit(Op::StoreScale),
        'K' => module.emit(Op::LoadScale),

        'x' => module.emit(Op::Exec),
        '?' => module.emit(Op::Read),
        'q' => module.emit(Op::Halt),

        _ => return Err(CalcError::Syntax(format!("bad character: {}", c))),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::Program;
    use crate::vm::Vm;

    fn run(src: &str) -> String {
        let module = compile(src).unwrap();
        let mut vm = Vm::new(&module, Program::new());
        let mut out = Vec::new();
        let mut input: &[u8] = &[];
        vm.run(&mut out, &mut input).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn adds_two_numbers() {
        assert_eq!(run("3 4+p"), "7\n");
    }

    #[test]
    fn register_store_and_load() {
        assert_eq!(run("5sa la la*p"), "25\n");
    }

    #[test]
    fn register_stack_push_pop() {
        assert_eq!(run("1Sa2Sa LaLaf"), "1\n2\n");
    }

    #[test]
    fn executes_macro_string() {
        assert_eq!(run("[1 2+p]x"), "3\n");
    }

    #[test]
    fn clears_stack() {
        assert_eq!(run("1 2 3cz p"), "0\n");
    }

    #[test]
    fn modular_exponentiation() {
        assert_eq!(run("2 3 5|p"), "3\n");
    }
}
