//! Global interpreter state shared by the bc and dc front ends: bases,
//! scale, the `last` value, variable/array storage with function-local
//! shadowing, and the function table. Mirrors the layout of `BcProgram`
//! in `examples/original_source/include/program.h`, adapted from C's
//! parallel name/value vectors to a `NamedTable` + `ScopedSlots` pair.

use crate::collections::ScopedSlots;
use crate::error::CalcError;
use crate::num::Number;
use crate::rng::Rng;

pub const BASE_MAX: u32 = 99;
pub const SCALE_MAX: usize = 99;
pub const DIM_MAX: usize = 2048;
pub const STRING_MAX: usize = 1024;

/// A value on the VM's operand stack: most values are numbers, but
/// string literals and (for dc) register contents can carry text too.
#[derive(Debug, Clone)]
pub enum Value {
    Num(Number),
    Str(String),
    /// An array's full contents, pushed by `LoadArrayWhole` so it can be
    /// passed as a call argument. Array parameters are bound by value: a
    /// callee gets its own copy, not an alias onto the caller's slot.
    Array(Vec<Number>),
}

impl Value {
    pub fn into_num(self) -> Result<Number, CalcError> {
        match self {
            Value::Num(n) => Ok(n),
            _ => Err(CalcError::ExecInvalidType),
        }
    }

    pub fn into_array(self) -> Result<Vec<Number>, CalcError> {
        match self {
            Value::Array(a) => Ok(a),
            _ => Err(CalcError::ExecInvalidType),
        }
    }
}

/// A sparse array: bc arrays are indexed by non-negative integers and
/// grow on demand rather than being pre-sized, so a `Vec` with
/// on-write growth (bounded by `DIM_MAX`) matches real usage better
/// than a dense allocation up front.
#[derive(Debug, Clone, Default)]
pub struct Array {
    slots: Vec<Number>,
}

impl Array {
    pub fn get(&self, index: usize) -> Number {
        self.slots.get(index).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, index: usize, value: Number) -> Result<(), CalcError> {
        if index >= DIM_MAX {
            return Err(CalcError::ExecArrayLength { limit: DIM_MAX as u32 });
        }
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, Number::zero);
        }
        self.slots[index] = value;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

pub struct Program {
    pub ibase: u32,
    pub obase: u32,
    pub scale: usize,
    pub last: Number,

    vars: ScopedSlots<Number>,
    arrays: ScopedSlots<Array>,

    pub posix_strict: bool,
    pub posix_warn: bool,

    /// Backs `irand`/`Op::Rand`: seeded once per program so repeated
    /// draws within a run don't repeat the same value, the way
    /// `Library::rng` is seeded once per library context.
    rng: Rng,
}

impl Program {
    pub fn new() -> Self {
        Program {
            ibase: 10,
            obase: 10,
            scale: 0,
            last: Number::zero(),
            vars: ScopedSlots::new(),
            arrays: ScopedSlots::new(),
            posix_strict: false,
            posix_warn: false,
            rng: Rng::default(),
        }
    }

    /// Draws a uniform integer in `[0, bound)` from this program's
    /// persistent RNG (`Op::Rand`/bc's `irand`).
    pub fn irand(&mut self, bound: &Number) -> Number {
        self.rng.irand(bound)
    }

    pub fn set_scale(&mut self, scale: Number) -> Result<(), CalcError> {
        let v = scale
            .to_i64()
            .filter(|v| *v >= 0 && *v as usize <= SCALE_MAX)
            .ok_or(CalcError::ExecInvalidScale { limit: SCALE_MAX as u32 })?;
        self.scale = v as usize;
        Ok(())
    }

    pub fn set_ibase(&mut self, base: Number) -> Result<(), CalcError> {
        let v = base
            .to_i64()
            .filter(|v| *v >= 2 && *v <= 16)
            .ok_or(CalcError::ExecInvalidIbase { limit: 16 })?;
        self.ibase = v as u32;
        Ok(())
    }

    pub fn set_obase(&mut self, base: Number) -> Result<(), CalcError> {
        let v = base
            .to_i64()
            .filter(|v| *v >= 2 && *v as u32 <= BASE_MAX)
            .ok_or(CalcError::ExecInvalidObase { limit: BASE_MAX })?;
        self.obase = v as u32;
        Ok(())
    }

    pub fn get_var(&mut self, slot: usize) -> Number {
        self.vars.get(slot).clone()
    }

    pub fn set_var(&mut self, slot: usize, value: Number) {
        self.vars.set(slot, value);
    }

    pub fn get_array_elem(&mut self, slot: usize, index: usize) -> Number {
        self.arrays.get_mut(slot).get(index)
    }

    pub fn set_array_elem(&mut self, slot: usize, index: usize, value: Number) -> Result<(), CalcError> {
        self.arrays.get_mut(slot).set(index, value)
    }

    pub fn array_len(&mut self, slot: usize) -> usize {
        self.arrays.get_mut(slot).len()
    }

    pub fn array_contents(&mut self, slot: usize) -> Vec<Number> {
        self.arrays.get_mut(slot).slots.clone()
    }

    pub fn set_array_contents(&mut self, slot: usize, values: Vec<Number>) {
        self.arrays.set(slot, Array { slots: values });
    }

    /// Pushes fresh local storage for the given var/array slots (a
    /// function's parameters plus its `auto` list), shadowing whatever
    /// was visible there before.
    pub fn push_frame(&mut self, var_slots: &[usize], array_slots: &[usize]) {
        for &s in var_slots {
            self.vars.push_local(s);
        }
        for &s in array_slots {
            self.arrays.push_local(s);
        }
    }

    pub fn pop_frame(&mut self, var_slots: &[usize], array_slots: &[usize]) {
        for &s in var_slots {
            self.vars.pop_local(s);
        }
        for &s in array_slots {
            self.arrays.pop_local(s);
        }
    }

    /// `dc`'s `S<reg>`: push a value onto a register's own value stack,
    /// shadowing whatever was there (same mechanism a function's `auto`
    /// uses to shadow a global, just with a caller-supplied value instead
    /// of a zeroed default).
    pub fn push_reg(&mut self, slot: usize, value: Number) {
        self.vars.push_local(slot);
        self.vars.set(slot, value);
    }

    /// `dc`'s `L<reg>`: pop a register's value stack, returning the value
    /// that was on top. Popping an empty register stack yields zero,
    /// matching `s`/`l`'s read-of-unset-variable behaviour.
    pub fn pop_reg(&mut self, slot: usize) -> Number {
        let v = self.vars.get(slot).clone();
        self.vars.pop_local(slot);
        v
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}
