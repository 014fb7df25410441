//! AST -> bytecode compiler for the bc front end.
//!
//! Variable and array names are registered in one global `NamedTable`
//! per kind (`CompiledModule::var_names`/`array_names`): a function's
//! `auto x` does not get a private slot number, it gets the *same*
//! slot a global `x` would use, shadowed for the duration of the call
//! via `Program::push_frame`/`pop_frame`. This mirrors the single
//! flat variable namespace real `bc` uses (`BcProgram`'s vectors
//! indexed by a name that resolves to the same slot everywhere).

use crate::ast::*;
use crate::bytecode::*;
use crate::error::{CalcError, CalcResult};
use crate::parser::Parser;

pub struct Compiler {
    module: CompiledModule,
    loop_stack: Vec<LoopContext>,
}

struct LoopContext {
    break_patches: Vec<usize>,
    continue_patches: Vec<usize>,
}

impl Compiler {
    pub fn new() -> Self {
        Compiler {
            module: CompiledModule::new(),
            loop_stack: Vec::new(),
        }
    }

    pub fn compile(source: &str) -> CalcResult<CompiledModule> {
        let mut parser = Parser::new(source);
        let warnings = parser.take_warnings();
        let program = parser.parse()?;
        let mut compiler = Compiler::new();
        compiler.compile_program(&program)?;
        compiler.module.warnings = warnings;
        Ok(compiler.module)
    }

    /// Compiles a single expression (used by the VM's `read()` builtin
    /// to run a line pulled from the input stream in the current
    /// frame). The result is left on the operand stack, uncomitted to
    /// `print`.
    pub fn compile_expr(source: &str) -> CalcResult<CompiledModule> {
        let mut parser = Parser::new(source);
        let expr = parser.parse_single_expr()?;
        let mut compiler = Compiler::new();
        compiler.compile_expr_node(&expr)?;
        compiler.module.emit(Op::Halt);
        Ok(compiler.module)
    }

    fn compile_program(&mut self, program: &Program) -> CalcResult<()> {
        // Pass 1: register every function's name up front, in
        // declaration order, so forward calls (including recursion
        // and mutual recursion) resolve to the slot the function will
        // eventually occupy in `module.functions`.
        for func in &program.functions {
            self.module.func_names.get_or_insert(&func.name);
        }

        for stmt in &program.statements {
            self.compile_stmt(stmt)?;
        }
        self.module.emit(Op::Halt);

        for func in &program.functions {
            self.compile_function(func)?;
        }

        Ok(())
    }

    fn compile_function(&mut self, func: &Function) -> CalcResult<()> {
        let offset = self.module.current_offset();

        let mut params = Vec::with_capacity(func.params.len());
        for p in &func.params {
            params.push(if p.is_array {
                ParamKind::Array(self.module.array_names.get_or_insert(&p.name))
            } else {
                ParamKind::Scalar(self.module.var_names.get_or_insert(&p.name))
            });
        }

        let mut auto_vars = Vec::new();
        let mut auto_arrays = Vec::new();
        for a in &func.auto_vars {
            if a.is_array {
                auto_arrays.push(self.module.array_names.get_or_insert(&a.name));
            } else {
                auto_vars.push(self.module.var_names.get_or_insert(&a.name));
            }
        }

        for stmt in &func.body {
            self.compile_stmt(stmt)?;
        }

        // Functions that fall off the end without an explicit `return`
        // return 0, matching POSIX bc.
        self.module.emit(Op::LoadZero);
        self.module.emit(Op::ReturnValue);

        let slot = self.module.func_names.get_or_insert(&func.name);
        debug_assert_eq!(slot, self.module.functions.len());
        self.module.functions.push(CompiledFunction {
            name: func.name.clone(),
            params,
            auto_vars,
            auto_arrays,
            bytecode_offset: offset,
        });

        Ok(())
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> CalcResult<()> {
        match stmt {
            Stmt::Expr(expr) => {
                self.compile_expr_node(expr)?;
                if Self::is_assignment(expr) {
                    self.module.emit(Op::Pop);
                } else {
                    self.module.emit(Op::Print);
                    self.module.emit(Op::PrintNewline);
                }
            }

            Stmt::Print(items) => {
                for item in items {
                    match item {
                        PrintItem::Expr(expr) => {
                            self.compile_expr_node(expr)?;
                            self.module.emit(Op::Print);
                        }
                        PrintItem::String(s) => {
                            let idx = self.module.add_string(s.clone());
                            self.module.emit(Op::PrintStr);
                            self.module.emit_uvarint(idx as u64);
                        }
                    }
                }
            }

            Stmt::Block(stmts) => {
                for s in stmts {
                    self.compile_stmt(s)?;
                }
            }

            Stmt::If { cond, then_branch, else_branch } => {
                self.compile_expr_node(cond)?;
                let else_jump = self.module.emit_jump_placeholder(Op::JumpIfZero);

                self.compile_stmt(then_branch)?;

                if let Some(else_branch) = else_branch {
                    let end_jump = self.module.emit_jump_placeholder(Op::Jump);
                    let else_addr = self.module.current_offset();
                    self.module.patch_jump(else_jump, else_addr);

                    self.compile_stmt(else_branch)?;

                    let end_addr = self.module.current_offset();
                    self.module.patch_jump(end_jump, end_addr);
                } else {
                    let end_addr = self.module.current_offset();
                    self.module.patch_jump(else_jump, end_addr);
                }
            }

            Stmt::While { cond, body } => {
                let loop_start = self.module.current_offset();
                self.loop_stack.push(LoopContext { break_patches: Vec::new(), continue_patches: Vec::new() });

                self.compile_expr_node(cond)?;
                let exit_jump = self.module.emit_jump_placeholder(Op::JumpIfZero);

                self.compile_stmt(body)?;

                let back = self.module.emit_jump_placeholder(Op::Jump);
                self.module.patch_jump(back, loop_start);

                let end_addr = self.module.current_offset();
                self.module.patch_jump(exit_jump, end_addr);

                let ctx = self.loop_stack.pop().unwrap();
                for at in ctx.break_patches {
                    self.module.patch_jump(at, end_addr);
                }
                for at in ctx.continue_patches {
                    self.module.patch_jump(at, loop_start);
                }
            }

            Stmt::For { init, cond, update, body } => {
                if let Some(init_expr) = init {
                    self.compile_expr_node(init_expr)?;
                    self.module.emit(Op::Pop);
                }

                let cond_start = self.module.current_offset();
                self.loop_stack.push(LoopContext { break_patches: Vec::new(), continue_patches: Vec::new() });

                let exit_jump = if let Some(cond_expr) = cond {
                    self.compile_expr_node(cond_expr)?;
                    Some(self.module.emit_jump_placeholder(Op::JumpIfZero))
                } else {
                    None
                };

                self.compile_stmt(body)?;

                let update_start = self.module.current_offset();
                if let Some(update_expr) = update {
                    self.compile_expr_node(update_expr)?;
                    self.module.emit(Op::Pop);
                }

                let back = self.module.emit_jump_placeholder(Op::Jump);
                self.module.patch_jump(back, cond_start);

                let end_addr = self.module.current_offset();
                if let Some(jump) = exit_jump {
                    self.module.patch_jump(jump, end_addr);
                }

                let ctx = self.loop_stack.pop().unwrap();
                for at in ctx.break_patches {
                    self.module.patch_jump(at, end_addr);
                }
                for at in ctx.continue_patches {
                    self.module.patch_jump(at, update_start);
                }
            }

            Stmt::Break => {
                let at = self.module.emit_jump_placeholder(Op::Jump);
                self.loop_stack
                    .last_mut()
                    .ok_or_else(|| CalcError::Syntax("break outside loop".to_string()))?
                    .break_patches
                    .push(at);
            }

            Stmt::Continue => {
                let at = self.module.emit_jump_placeholder(Op::Jump);
                self.loop_stack
                    .last_mut()
                    .ok_or_else(|| CalcError::Syntax("continue outside loop".to_string()))?
                    .continue_patches
                    .push(at);
            }

            Stmt::Return(expr) => {
                if let Some(e) = expr {
                    self.compile_expr_node(e)?;
                    self.module.emit(Op::ReturnValue);
                } else {
                    self.module.emit(Op::Return);
                }
            }

            Stmt::Quit | Stmt::Halt => {
                self.module.emit(Op::Halt);
            }

            Stmt::Limits => {
                for line in [
                    format!("BC_BASE_MAX = {}\n", crate::program::BASE_MAX),
                    format!("BC_SCALE_MAX = {}\n", crate::program::SCALE_MAX),
                    format!("BC_DIM_MAX = {}\n", crate::program::DIM_MAX),
                    format!("BC_STRING_MAX = {}\n", crate::program::STRING_MAX),
                ] {
                    let idx = self.module.add_string(line);
                    self.module.emit(Op::PrintStr);
                    self.module.emit_uvarint(idx as u64);
                }
            }

            Stmt::Auto(_) => {
                // Handled up front by `compile_function`: auto locals
                // get their storage from the function's auto list, not
                // from compiling this statement in place.
            }

            Stmt::Empty => {}
        }

        Ok(())
    }

    fn compile_expr_node(&mut self, expr: &Expr) -> CalcResult<()> {
        match expr {
            Expr::Number(s) => {
                if s == "0" {
                    self.module.emit(Op::LoadZero);
                } else if s == "1" {
                    self.module.emit(Op::LoadOne);
                } else {
                    let idx = self.module.add_number(s);
                    self.module.emit(Op::LoadNum);
                    self.module.emit_uvarint(idx as u64);
                }
            }

            Expr::String(s) => {
                let idx = self.module.add_string(s.clone());
                self.module.emit(Op::LoadStr);
                self.module.emit_uvarint(idx as u64);
            }

            Expr::Var(name) => {
                let slot = self.module.var_names.get_or_insert(name);
                self.module.emit(Op::LoadVar);
                self.module.emit_uvarint(slot as u64);
            }

            Expr::ArrayElement(name, index) => {
                let slot = self.module.array_names.get_or_insert(name);
                self.compile_expr_node(index)?;
                self.module.emit(Op::LoadArray);
                self.module.emit_uvarint(slot as u64);
            }

            Expr::ArrayRef(name) => {
                let slot = self.module.array_names.get_or_insert(name);
                self.module.emit(Op::LoadArrayWhole);
                self.module.emit_uvarint(slot as u64);
            }

            Expr::Scale => self.module.emit(Op::LoadScale),
            Expr::Ibase => self.module.emit(Op::LoadIbase),
            Expr::Obase => self.module.emit(Op::LoadObase),
            Expr::Last => self.module.emit(Op::LoadLast),

            Expr::Add(a, b) => self.binary(a, b, Op::Add)?,
            Expr::Sub(a, b) => self.binary(a, b, Op::Sub)?,
            Expr::Mul(a, b) => self.binary(a, b, Op::Mul)?,
            Expr::Div(a, b) => self.binary(a, b, Op::Div)?,
            Expr::Mod(a, b) => self.binary(a, b, Op::Mod)?,
            Expr::Pow(a, b) => self.binary(a, b, Op::Pow)?,

            Expr::Neg(a) => {
                self.compile_expr_node(a)?;
                self.module.emit(Op::Neg);
            }

            Expr::Eq(a, b) => self.binary(a, b, Op::Eq)?,
            Expr::Ne(a, b) => self.binary(a, b, Op::Ne)?,
            Expr::Lt(a, b) => self.binary(a, b, Op::Lt)?,
            Expr::Le(a, b) => self.binary(a, b, Op::Le)?,
            Expr::Gt(a, b) => self.binary(a, b, Op::Gt)?,
            Expr::Ge(a, b) => self.binary(a, b, Op::Ge)?,

            Expr::And(a, b) => self.binary(a, b, Op::And)?,
            Expr::Or(a, b) => self.binary(a, b, Op::Or)?,
            Expr::Not(a) => {
                self.compile_expr_node(a)?;
                self.module.emit(Op::Not);
            }

            Expr::Ternary(cond, then_e, else_e) => {
                self.compile_expr_node(cond)?;
                let else_jump = self.module.emit_jump_placeholder(Op::JumpIfZero);
                self.compile_expr_node(then_e)?;
                let end_jump = self.module.emit_jump_placeholder(Op::Jump);
                let else_addr = self.module.current_offset();
                self.module.patch_jump(else_jump, else_addr);
                self.compile_expr_node(else_e)?;
                let end_addr = self.module.current_offset();
                self.module.patch_jump(end_jump, end_addr);
            }

            Expr::PreInc(a) => {
                self.compile_expr_node(a)?;
                self.module.emit(Op::Inc);
                self.module.emit(Op::Dup);
                self.compile_store(a)?;
            }
            Expr::PreDec(a) => {
                self.compile_expr_node(a)?;
                self.module.emit(Op::Dec);
                self.module.emit(Op::Dup);
                self.compile_store(a)?;
            }
            Expr::PostInc(a) => {
                self.compile_expr_node(a)?;
                self.module.emit(Op::Dup);
                self.module.emit(Op::Inc);
                self.compile_store(a)?;
            }
            Expr::PostDec(a) => {
                self.compile_expr_node(a)?;
                self.module.emit(Op::Dup);
                self.module.emit(Op::Dec);
                self.compile_store(a)?;
            }

            Expr::Assign(target, value) => {
                self.compile_expr_node(value)?;
                self.module.emit(Op::Dup);
                self.compile_store(target)?;
            }
            Expr::AddAssign(target, value) => self.compound_assign(target, value, Op::Add)?,
            Expr::SubAssign(target, value) => self.compound_assign(target, value, Op::Sub)?,
            Expr::MulAssign(target, value) => self.compound_assign(target, value, Op::Mul)?,
            Expr::DivAssign(target, value) => self.compound_assign(target, value, Op::Div)?,
            Expr::ModAssign(target, value) => self.compound_assign(target, value, Op::Mod)?,
            Expr::PowAssign(target, value) => self.compound_assign(target, value, Op::Pow)?,

            Expr::Call(name, args) => {
                for arg in args {
                    self.compile_expr_node(arg)?;
                }
                let idx = self
                    .module
                    .func_names
                    .get(name)
                    .ok_or_else(|| CalcError::ExecUndefinedFunc(name.clone()))?;
                self.module.emit(Op::Call);
                self.module.emit_uvarint(idx as u64);
                self.module.emit_uvarint(args.len() as u64);
            }

            Expr::Length(a) => {
                self.compile_expr_node(a)?;
                self.module.emit(Op::Length);
            }
            Expr::ScaleFunc(a) => {
                self.compile_expr_node(a)?;
                self.module.emit(Op::ScaleOf);
            }
            Expr::Sqrt(a) => {
                self.compile_expr_node(a)?;
                self.module.emit(Op::Sqrt);
            }
            Expr::Read => {
                self.module.emit(Op::Read);
            }

            Expr::Irand(a) => {
                self.compile_expr_node(a)?;
                self.module.emit(Op::Rand);
            }
            Expr::Places(a, b) => self.binary(a, b, Op::Places)?,
            Expr::Lshift(a, b) => self.binary(a, b, Op::Lshift)?,
            Expr::Rshift(a, b) => self.binary(a, b, Op::Rshift)?,
        }

        Ok(())
    }

    fn binary(&mut self, a: &Expr, b: &Expr, op: Op) -> CalcResult<()> {
        self.compile_expr_node(a)?;
        self.compile_expr_node(b)?;
        self.module.emit(op);
        Ok(())
    }

    /// Compound assignment (`+=` and friends): evaluate target, then
    /// value, apply `op`, leave a copy on the stack as the expression's
    /// result, and store the other copy back into target.
    fn compound_assign(&mut self, target: &Expr, value: &Expr, op: Op) -> CalcResult<()> {
        self.compile_expr_node(target)?;
        self.compile_expr_node(value)?;
        self.module.emit(op);
        self.module.emit(Op::Dup);
        self.compile_store(target)
    }

    fn compile_store(&mut self, target: &Expr) -> CalcResult<()> {
        match target {
            Expr::Var(name) => {
                let slot = self.module.var_names.get_or_insert(name);
                self.module.emit(Op::StoreVar);
                self.module.emit_uvarint(slot as u64);
            }
            Expr::ArrayElement(name, index) => {
                let slot = self.module.array_names.get_or_insert(name);
                self.compile_expr_node(index)?;
                self.module.emit(Op::StoreArray);
                self.module.emit_uvarint(slot as u64);
            }
            Expr::Scale => self.module.emit(Op::StoreScale),
            Expr::Ibase => self.module.emit(Op::StoreIbase),
            Expr::Obase => self.module.emit(Op::StoreObase),
            _ => return Err(CalcError::ParseInvalidAssign),
        }
        Ok(())
    }

    fn is_assignment(expr: &Expr) -> bool {
        matches!(
            expr,
            Expr::Assign(_, _)
                | Expr::AddAssign(_, _)
                | Expr::SubAssign(_, _)
                | Expr::MulAssign(_, _)
                | Expr::DivAssign(_, _)
                | Expr::ModAssign(_, _)
                | Expr::PowAssign(_, _)
                | Expr::PreInc(_)
                | Expr::PreDec(_)
                | Expr::PostInc(_)
                | Expr::PostDec(_)
        )
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_number_literal() {
        let module = Compiler::compile("42").unwrap();
        assert!(!module.bytecode.is_empty());
    }

    #[test]
    fn compiles_addition() {
        let module = Compiler::compile("1 + 2").unwrap();
        assert!(module.bytecode.contains(&(Op::Add as u8)));
    }

    #[test]
    fn compiles_assignment() {
        let module = Compiler::compile("a = 5").unwrap();
        assert!(module.bytecode.contains(&(Op::StoreVar as u8)));
    }

    #[test]
    fn recursive_function_resolves_forward_call() {
        let module = Compiler::compile("define f(n) { if (n < 2) return n; return f(n - 1) + f(n - 2) }").unwrap();
        assert_eq!(module.functions.len(), 1);
        assert!(module.bytecode.contains(&(Op::Call as u8)));
    }
}
