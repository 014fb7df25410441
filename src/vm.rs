//! Stack-based bytecode interpreter.
//!
//! Executes a `CompiledModule` against a `Program`: an operand stack of
//! `Value`s, a call stack of frames recording which var/array slots a
//! function shadowed (so they can be un-shadowed on return), and an
//! instruction pointer stepped by `Op::from_u8` plus however many
//! varint bytes that opcode's operand needs. Numeric literals are
//! parsed with the *current* `ibase` at the moment they're loaded, not
//! at compile time, since `ibase` can change between when a literal is
//! compiled and when it runs.

use crate::bytecode::{read_svarint, read_uvarint, CompiledModule, Op, ParamKind};
use crate::compiler::Compiler;
use crate::error::{CalcError, CalcResult};
use crate::num::Number;
use crate::program::{Program, Value};
use log::{debug, trace, warn};
use std::cmp::Ordering;
use std::io::{BufRead, Write};

struct Frame {
    return_ip: usize,
    var_slots: Vec<usize>,
    array_slots: Vec<usize>,
}

pub struct Vm<'a> {
    module: &'a CompiledModule,
    pub program: Program,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    ip: usize,
    reading: bool,
    /// Output column, tracked for `BC_LINE_LENGTH` wrapping (§6): printed
    /// numbers/strings insert a `\<newline>` continuation before the
    /// column this many characters wide would be exceeded. 0 disables
    /// wrapping, matching `BC_LINE_LENGTH=0`.
    line_length: usize,
    nchars: usize,
}

/// Default output width bc wraps at (`BC_LINE_LENGTH`'s default), before
/// any environment override is applied.
pub const DEFAULT_LINE_LENGTH: usize = 70;

impl<'a> Vm<'a> {
    pub fn new(module: &'a CompiledModule, program: Program) -> Self {
        Vm {
            module,
            program,
            stack: Vec::new(),
            frames: Vec::new(),
            ip: 0,
            reading: false,
            line_length: DEFAULT_LINE_LENGTH,
            nchars: 0,
        }
    }

    /// Sets the column at which printed output wraps with a backslash
    /// continuation; 0 disables wrapping entirely.
    pub fn set_line_length(&mut self, line_length: usize) {
        self.line_length = line_length;
    }

    fn pop(&mut self) -> CalcResult<Value> {
        self.stack.pop().ok_or(CalcError::ExecInvalidStack)
    }

    fn pop_num(&mut self) -> CalcResult<Number> {
        self.pop()?.into_num()
    }

    fn push(&mut self, v: Value) {
        self.stack.push(v);
    }

    fn push_num(&mut self, n: Number) {
        self.stack.push(Value::Num(n));
    }

    /// Runs from the current instruction pointer until `Halt` or the end
    /// of the module's main bytecode. `out` receives `print`/auto-print
    /// output; `input` backs the `read()` builtin.
    pub fn run(&mut self, out: &mut dyn Write, input: &mut dyn BufRead) -> CalcResult<()> {
        loop {
            if self.ip >= self.module.bytecode.len() {
                return Ok(());
            }
            match self.step(out, input)? {
                StepResult::Continue => {}
                StepResult::Halt => return Ok(()),
            }
        }
    }

    fn step(&mut self, out: &mut dyn Write, input: &mut dyn BufRead) -> CalcResult<StepResult> {
        let op_byte = self.module.bytecode[self.ip];
        let op = Op::from_u8(op_byte).ok_or(CalcError::ExecInvalidStmt)?;
        let mut pos = self.ip + 1;
        trace!("ip={:04x} op={:?} stack_depth={}", self.ip, op, self.stack.len());

        macro_rules! uvarint {
            () => {{
                let v = read_uvarint(&self.module.bytecode, &mut pos) as usize;
                v
            }};
        }

        let mut next_ip = None;

        match op {
            Op::Halt => return Ok(StepResult::Halt),
            Op::Nop => {}
            Op::Pop => {
                self.pop()?;
            }
            Op::Dup => {
                let v = self.stack.last().ok_or(CalcError::ExecInvalidStack)?.clone();
                self.stack.push(v);
            }
            Op::Swap => {
                let len = self.stack.len();
                if len < 2 {
                    return Err(CalcError::ExecInvalidStack);
                }
                self.stack.swap(len - 1, len - 2);
            }

            Op::LoadZero => self.push_num(Number::zero()),
            Op::LoadOne => self.push_num(Number::one()),
            Op::LoadNum => {
                let idx = uvarint!();
                let literal = self.module.numbers.get(idx).ok_or(CalcError::ExecInvalidConstant)?;
                let n = Number::parse(literal, self.program.ibase)?;
                self.push_num(n);
            }
            Op::LoadStr => {
                let idx = uvarint!();
                let s = self.module.strings.get(idx).ok_or(CalcError::ExecInvalidConstant)?.clone();
                self.push(Value::Str(s));
            }

            Op::LoadVar => {
                let slot = uvarint!();
                self.push_num(self.program.get_var(slot));
            }
            Op::StoreVar => {
                let slot = uvarint!();
                let v = self.pop_num()?;
                self.program.set_var(slot, v);
            }
            Op::LoadArray => {
                let slot = uvarint!();
                let idx_num = self.pop_num()?;
                let idx = idx_num.to_usize().ok_or(CalcError::ExecInvalidExpr)?;
                self.push_num(self.program.get_array_elem(slot, idx));
            }
            Op::StoreArray => {
                let slot = uvarint!();
                let value = self.pop_num()?;
                let idx_num = self.pop_num()?;
                let idx = idx_num.to_usize().ok_or(CalcError::ExecInvalidExpr)?;
                self.program.set_array_elem(slot, idx, value)?;
            }
            Op::LoadArrayWhole => {
                let slot = uvarint!();
                self.push(Value::Array(self.program.array_contents(slot)));
            }

            Op::LoadScale => self.push_num(Number::from_i64(self.program.scale as i64)),
            Op::StoreScale => {
                let v = self.pop_num()?;
                self.program.set_scale(v)?;
                debug!("scale <- {}", self.program.scale);
            }
            Op::LoadIbase => self.push_num(Number::from_i64(self.program.ibase as i64)),
            Op::StoreIbase => {
                let v = self.pop_num()?;
                self.program.set_ibase(v)?;
                debug!("ibase <- {}", self.program.ibase);
            }
            Op::LoadObase => self.push_num(Number::from_i64(self.program.obase as i64)),
            Op::StoreObase => {
                let v = self.pop_num()?;
                self.program.set_obase(v)?;
                debug!("obase <- {}", self.program.obase);
            }
            Op::LoadLast => self.push_num(self.program.last.clone()),

            Op::Add => self.binary_num(|a, b| Ok(a.add(b)))?,
            Op::Sub => self.binary_num(|a, b| Ok(a.sub(b)))?,
            Op::Mul => {
                let scale = self.program.scale;
                self.binary_num(|a, b| Ok(a.mul_scaled(b, scale)))?
            }
            Op::Div => {
                let scale = self.program.scale;
                self.binary_num(|a, b| a.div(b, scale))?
            }
            Op::Mod => {
                let scale = self.program.scale;
                self.binary_num(|a, b| a.rem(b, scale))?
            }
            Op::Pow => {
                let scale = self.program.scale;
                self.binary_num(|a, b| a.pow(b, scale))?
            }
            Op::Neg => {
                let a = self.pop_num()?;
                self.push_num(a.neg());
            }
            Op::Divmod => {
                let scale = self.program.scale;
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                let (q, r) = a.divmod(&b, scale)?;
                self.push_num(q);
                self.push_num(r);
            }

            Op::Eq => self.compare(|o| o == Ordering::Equal)?,
            Op::Ne => self.compare(|o| o != Ordering::Equal)?,
            Op::Lt => self.compare(|o| o == Ordering::Less)?,
            Op::Le => self.compare(|o| o != Ordering::Greater)?,
            Op::Gt => self.compare(|o| o == Ordering::Greater)?,
            Op::Ge => self.compare(|o| o != Ordering::Less)?,

            Op::And => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_bool(!a.is_zero() && !b.is_zero());
            }
            Op::Or => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_bool(!a.is_zero() || !b.is_zero());
            }
            Op::Not => {
                let a = self.pop_num()?;
                self.push_bool(a.is_zero());
            }

            Op::Inc => {
                let a = self.pop_num()?;
                self.push_num(a.add(&Number::one()));
            }
            Op::Dec => {
                let a = self.pop_num()?;
                self.push_num(a.sub(&Number::one()));
            }

            Op::Jump => {
                let delta = read_svarint(&self.module.bytecode, &mut pos);
                next_ip = Some((pos as i64 + delta) as usize);
            }
            Op::JumpIfZero => {
                let delta = read_svarint(&self.module.bytecode, &mut pos);
                let cond = self.pop_num()?;
                if cond.is_zero() {
                    next_ip = Some((pos as i64 + delta) as usize);
                }
            }
            Op::JumpIfNotZero => {
                let delta = read_svarint(&self.module.bytecode, &mut pos);
                let cond = self.pop_num()?;
                if !cond.is_zero() {
                    next_ip = Some((pos as i64 + delta) as usize);
                }
            }

            Op::Call => {
                let func_idx = uvarint!();
                let argc = uvarint!();
                self.call(func_idx, argc, pos)?;
                return Ok(StepResult::Continue);
            }
            Op::Return => {
                self.do_return(Value::Num(Number::zero()))?;
                return Ok(StepResult::Continue);
            }
            Op::ReturnValue => {
                let v = self.pop()?;
                self.do_return(v)?;
                return Ok(StepResult::Continue);
            }

            Op::Length => {
                let a = self.pop()?;
                let len = match a {
                    Value::Num(n) => n.length(),
                    Value::Str(s) => s.chars().count(),
                    Value::Array(v) => v.len(),
                };
                self.push_num(Number::from_i64(len as i64));
            }
            Op::ScaleOf => {
                let a = self.pop_num()?;
                self.push_num(Number::from_i64(a.scale_of() as i64));
            }
            Op::Sqrt => {
                let scale = self.program.scale;
                let a = self.pop_num()?;
                self.push_num(a.sqrt(scale)?);
            }
            Op::Modexp => {
                let m = self.pop_num()?;
                let e = self.pop_num()?;
                let b = self.pop_num()?;
                self.push_num(b.modpow(&e, &m)?);
            }
            Op::Places => {
                let places = self.pop_num()?;
                let a = self.pop_num()?;
                let p = places.to_i64().filter(|p| *p >= 0).ok_or(CalcError::MathNonInteger)?;
                self.push_num(a.with_scale(p as usize));
            }
            Op::Lshift => {
                let places = self.pop_num()?;
                let a = self.pop_num()?;
                let p = places.to_i64().ok_or(CalcError::MathNonInteger)?;
                self.push_num(a.shift(p));
            }
            Op::Rshift => {
                let places = self.pop_num()?;
                let a = self.pop_num()?;
                let p = places.to_i64().ok_or(CalcError::MathNonInteger)?;
                self.push_num(a.shift(-p));
            }
            Op::Rand => {
                let bound = self.pop_num()?;
                debug!("irand bound={}", bound);
                let v = self.program.irand(&bound);
                self.push_num(v);
            }

            Op::Print => {
                let v = self.pop()?;
                match &v {
                    Value::Num(n) => {
                        let last = n.clone();
                        self.print_value(out, &Value::Num(n.clone()))?;
                        self.program.last = last;
                    }
                    Value::Str(_) => {
                        self.print_value(out, &v)?;
                    }
                    Value::Array(_) => return Err(CalcError::ExecInvalidType),
                }
            }
            Op::PrintStr => {
                let idx = uvarint!();
                let s = self.module.strings.get(idx).ok_or(CalcError::ExecInvalidConstant)?.clone();
                self.write_wrapped(out, &s)?;
            }
            Op::PrintNewline => {
                self.write_wrapped(out, "\n")?;
            }
            Op::Read => {
                if self.reading {
                    return Err(CalcError::ExecRecursiveRead);
                }
                let mut line = String::new();
                input.read_line(&mut line).map_err(|_| CalcError::ExecFileErr("stdin".to_string()))?;
                self.reading = true;
                let result = Compiler::compile_expr(&line).and_then(|module| {
                    let mut sub = Vm::new(&module, std::mem::replace(&mut self.program, Program::new()));
                    let mut sink = Vec::new();
                    sub.run(&mut sink, input)?;
                    let v = sub.stack.pop().map(|v| v.into_num()).transpose()?.unwrap_or_default();
                    self.program = sub.program;
                    Ok(v)
                });
                self.reading = false;
                self.push_num(result.map_err(|_: CalcError| CalcError::ExecInvalidReadExpr)?);
            }

            Op::ClearStack => self.stack.clear(),
            Op::StackDepth => {
                let depth = self.stack.len();
                self.push_num(Number::from_i64(depth as i64));
            }
            Op::PrintPeek => {
                let v = self.stack.last().ok_or(CalcError::ExecInvalidStack)?.clone();
                self.print_value(out, &v)?;
                self.write_wrapped(out, "\n")?;
            }
            Op::PrintStack => {
                let values: Vec<Value> = self.stack.iter().rev().cloned().collect();
                for v in values {
                    self.print_value(out, &v)?;
                    self.write_wrapped(out, "\n")?;
                }
            }
            Op::RegPush => {
                let slot = uvarint!();
                let v = self.pop_num()?;
                self.program.push_reg(slot, v);
            }
            Op::RegPop => {
                let slot = uvarint!();
                let v = self.program.pop_reg(slot);
                self.push_num(v);
            }
            Op::Exec => {
                let v = self.pop()?;
                let s = match v {
                    Value::Str(s) => s,
                    _ => return Err(CalcError::ExecInvalidType),
                };
                let module = crate::dc::compile(&s)?;
                self.exec_module(&module, out, input)?;
            }
        }

        if let Some(target) = next_ip {
            self.ip = target;
        } else {
            self.ip = pos;
        }
        Ok(StepResult::Continue)
    }

    fn binary_num(&mut self, f: impl FnOnce(&Number, &Number) -> CalcResult<Number>) -> CalcResult<()> {
        let b = self.pop_num()?;
        let a = self.pop_num()?;
        self.push_num(f(&a, &b)?);
        Ok(())
    }

    fn compare(&mut self, f: impl FnOnce(Ordering) -> bool) -> CalcResult<()> {
        let b = self.pop_num()?;
        let a = self.pop_num()?;
        self.push_bool(f(a.cmp(&b)));
        Ok(())
    }

    fn push_bool(&mut self, b: bool) {
        self.push_num(if b { Number::one() } else { Number::zero() });
    }

    fn print_value(&mut self, out: &mut dyn Write, v: &Value) -> CalcResult<()> {
        match v {
            Value::Num(n) => {
                let s = n.to_base_string(self.program.obase);
                self.write_wrapped(out, &s)
            }
            Value::Str(s) => self.write_wrapped(out, s),
            Value::Array(_) => Err(CalcError::ExecInvalidType),
        }
    }

    /// Writes `text`, inserting a `\<newline>` continuation whenever the
    /// next character would land past `line_length` columns. An embedded
    /// newline in `text` resets the column counter, same as a real
    /// newline written by `print`/auto-print.
    fn write_wrapped(&mut self, out: &mut dyn Write, text: &str) -> CalcResult<()> {
        for ch in text.chars() {
            if self.line_length > 0 && ch != '\n' && self.nchars >= self.line_length - 1 {
                write!(out, "\\\n").map_err(|_| CalcError::ExecPrintErr)?;
                self.nchars = 0;
            }
            write!(out, "{}", ch).map_err(|_| CalcError::ExecPrintErr)?;
            if ch == '\n' {
                self.nchars = 0;
            } else {
                self.nchars += 1;
            }
        }
        Ok(())
    }

    /// Runs `module` to completion sharing this VM's operand stack and
    /// program state (`dc`'s `x`: a macro string runs inline against the
    /// same data stack, not in a nested sandbox). The callee gets its own
    /// call-frame stack and starts at its own instruction 0.
    fn exec_module(&mut self, module: &CompiledModule, out: &mut dyn Write, input: &mut dyn BufRead) -> CalcResult<()> {
        let mut sub = Vm {
            module,
            program: std::mem::replace(&mut self.program, Program::new()),
            stack: std::mem::take(&mut self.stack),
            frames: Vec::new(),
            ip: 0,
            reading: self.reading,
            line_length: self.line_length,
            nchars: self.nchars,
        };
        let result = sub.run(out, input);
        self.program = sub.program;
        self.stack = sub.stack;
        self.nchars = sub.nchars;
        result
    }

    fn call(&mut self, func_idx: usize, argc: usize, return_ip: usize) -> CalcResult<()> {
        let func = self
            .module
            .functions
            .get(func_idx)
            .ok_or_else(|| CalcError::ExecUndefinedFunc(format!("#{}", func_idx)))?
            .clone();
        if argc != func.params.len() {
            return Err(CalcError::ExecMismatchedParams);
        }

        let mut args = Vec::with_capacity(argc);
        for _ in 0..argc {
            args.push(self.pop()?);
        }
        args.reverse();

        let mut var_slots = Vec::new();
        let mut array_slots = Vec::new();

        for (param, arg) in func.params.iter().zip(args.into_iter()) {
            match (*param, arg) {
                (ParamKind::Scalar(slot), Value::Num(n)) => {
                    var_slots.push(slot);
                    self.program.push_frame(&[slot], &[]);
                    self.program.set_var(slot, n);
                }
                (ParamKind::Array(slot), Value::Array(values)) => {
                    array_slots.push(slot);
                    self.program.push_frame(&[], &[slot]);
                    self.program.set_array_contents(slot, values);
                }
                _ => return Err(CalcError::ExecMismatchedParams),
            }
        }

        for &slot in &func.auto_vars {
            var_slots.push(slot);
            self.program.push_frame(&[slot], &[]);
        }
        for &slot in &func.auto_arrays {
            array_slots.push(slot);
            self.program.push_frame(&[], &[slot]);
        }

        self.frames.push(Frame {
            return_ip,
            var_slots,
            array_slots,
        });
        debug!("call #{} depth={}", func_idx, self.frames.len());
        self.ip = func.bytecode_offset;
        Ok(())
    }

    fn do_return(&mut self, value: Value) -> CalcResult<()> {
        let frame = self.frames.pop().ok_or(CalcError::ExecInvalidReturn)?;
        self.program.pop_frame(&frame.var_slots, &frame.array_slots);
        debug!("return depth={}", self.frames.len());
        self.push(value);
        self.ip = frame.return_ip;
        Ok(())
    }
}

enum StepResult {
    Continue,
    Halt,
}
