//! Library façade: a handle-indexed arena of `Number`s behind a C-style
//! value interface, so a host program can do arbitrary-precision decimal
//! math without going through the `bc`/`dc` language at all.
//!
//! Grounded in `examples/original_source/src/library.c`'s `bcl_*`
//! functions and `include/bc.h`'s `BcError`. The consuming-vs-`_err`
//! pairing, the free-list arena, and the context *stack* (`vm.ctxts`
//! there, `Library::stack` here) all follow that source directly; what
//! changes is the representation, not the shape of the API.

use crate::error::CalcError;
use crate::num::Number;
use crate::rng::Rng;
use std::sync::{Mutex, OnceLock};

pub type Handle = usize;
pub type Ctx = usize;

/// Stable ordinal error enumeration for ABI consumers, mapped from the
/// richer internal `CalcError`. Ordinals are part of the contract (`§6`:
/// "the handle enumeration begins at 0 and handles are stable"), so this
/// enum's discriminants must never be reordered, only appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BcError {
    Success = 0,
    InvalidContext = 1,
    InvalidNum = 2,
    Negative = 3,
    NonInteger = 4,
    Overflow = 5,
    DivideByZero = 6,
    NegativeSqrt = 7,
    InvalidString = 8,
    InvalidTruncate = 9,
    SignalReceived = 10,
    Fatal = 11,
}

impl From<CalcError> for BcError {
    fn from(e: CalcError) -> Self {
        match e {
            CalcError::InvalidContext => BcError::InvalidContext,
            CalcError::InvalidNum => BcError::InvalidNum,
            CalcError::MathNegative => BcError::Negative,
            CalcError::MathNonInteger => BcError::NonInteger,
            CalcError::MathOverflow => BcError::Overflow,
            CalcError::MathDivideByZero => BcError::DivideByZero,
            CalcError::MathNegSqrt => BcError::NegativeSqrt,
            CalcError::MathInvalidString => BcError::InvalidString,
            CalcError::MathInvalidTruncate => BcError::InvalidTruncate,
            CalcError::SignalReceived => BcError::SignalReceived,
            _ => BcError::Fatal,
        }
    }
}

pub type BcResult<T> = Result<T, BcError>;

#[derive(Default)]
struct NumArena {
    slots: Vec<Option<Number>>,
    free: Vec<usize>,
}

impl NumArena {
    fn insert(&mut self, n: Number) -> Handle {
        if let Some(h) = self.free.pop() {
            self.slots[h] = Some(n);
            h
        } else {
            self.slots.push(Some(n));
            self.slots.len() - 1
        }
    }

    fn get(&self, h: Handle) -> BcResult<&Number> {
        self.slots.get(h).and_then(|s| s.as_ref()).ok_or(BcError::InvalidNum)
    }

    /// Removes and returns the number at `h`, recycling the slot. Used by
    /// consuming operations to take ownership of their inputs.
    fn take(&mut self, h: Handle) -> BcResult<Number> {
        let slot = self.slots.get_mut(h).ok_or(BcError::InvalidNum)?;
        let n = slot.take().ok_or(BcError::InvalidNum)?;
        self.free.push(h);
        Ok(n)
    }

    fn free(&mut self, h: Handle) {
        if let Some(slot) = self.slots.get_mut(h) {
            if slot.take().is_some() {
                self.free.push(h);
            }
        }
    }

    fn replace(&mut self, h: Handle, n: Number) -> BcResult<()> {
        let slot = self.slots.get_mut(h).ok_or(BcError::InvalidNum)?;
        *slot = Some(n);
        Ok(())
    }
}

struct Context {
    arena: NumArena,
    ibase: u32,
    obase: u32,
    scale: usize,
}

impl Context {
    fn new() -> Self {
        Context { arena: NumArena::default(), ibase: 10, obase: 10, scale: 0 }
    }
}

struct Library {
    contexts: Vec<Option<Context>>,
    ctxt_free: Vec<Ctx>,
    stack: Vec<Ctx>,
    refs: usize,
    rng: Rng,
    sig_pending: bool,
}

impl Library {
    fn new() -> Self {
        Library {
            contexts: Vec::new(),
            ctxt_free: Vec::new(),
            stack: Vec::new(),
            refs: 0,
            rng: Rng::default(),
            sig_pending: false,
        }
    }

    fn current(&mut self) -> BcResult<&mut Context> {
        if self.sig_pending {
            self.sig_pending = false;
            return Err(BcError::SignalReceived);
        }
        let ctx = *self.stack.last().ok_or(BcError::InvalidContext)?;
        self.contexts.get_mut(ctx).and_then(|c| c.as_mut()).ok_or(BcError::InvalidContext)
    }
}

fn lib() -> &'static Mutex<Library> {
    static LIB: OnceLock<Mutex<Library>> = OnceLock::new();
    LIB.get_or_init(|| Mutex::new(Library::new()))
}

/// Signal-deferred region: the abstract contract of spec §5. There is no
/// real signal registration here (explicitly out of scope); `handleSignal`
/// just latches a flag that the next operation observes and turns into a
/// `SignalReceived` error, the Rust analogue of the deferred longjmp.
pub fn handle_signal() {
    lib().lock().unwrap().sig_pending = true;
}

pub fn init() -> BcResult<()> {
    let mut l = lib().lock().unwrap();
    l.refs += 1;
    Ok(())
}

pub fn free() {
    let mut l = lib().lock().unwrap();
    if l.refs > 0 {
        l.refs -= 1;
    }
    if l.refs == 0 {
        l.contexts.clear();
        l.ctxt_free.clear();
        l.stack.clear();
    }
}

pub fn ctxt_create() -> Ctx {
    let mut l = lib().lock().unwrap();
    if let Some(h) = l.ctxt_free.pop() {
        l.contexts[h] = Some(Context::new());
        h
    } else {
        l.contexts.push(Some(Context::new()));
        l.contexts.len() - 1
    }
}

pub fn ctxt_free(ctx: Ctx) {
    let mut l = lib().lock().unwrap();
    l.stack.retain(|&c| c != ctx);
    if let Some(slot) = l.contexts.get_mut(ctx) {
        if slot.take().is_some() {
            l.ctxt_free.push(ctx);
        }
    }
}

pub fn push_context(ctx: Ctx) -> BcResult<()> {
    let mut l = lib().lock().unwrap();
    if l.contexts.get(ctx).map_or(false, |c| c.is_some()) {
        l.stack.push(ctx);
        Ok(())
    } else {
        Err(BcError::InvalidContext)
    }
}

pub fn pop_context() {
    let mut l = lib().lock().unwrap();
    l.stack.pop();
}

pub fn context() -> BcResult<Ctx> {
    let l = lib().lock().unwrap();
    l.stack.last().copied().ok_or(BcError::InvalidContext)
}

pub fn scale() -> BcResult<usize> {
    Ok(lib().lock().unwrap().current()?.scale)
}

pub fn set_scale(s: usize) -> BcResult<()> {
    lib().lock().unwrap().current()?.scale = s;
    Ok(())
}

pub fn ibase() -> BcResult<u32> {
    Ok(lib().lock().unwrap().current()?.ibase)
}

pub fn set_ibase(b: u32) -> BcResult<()> {
    lib().lock().unwrap().current()?.ibase = b;
    Ok(())
}

pub fn obase() -> BcResult<u32> {
    Ok(lib().lock().unwrap().current()?.obase)
}

pub fn set_obase(b: u32) -> BcResult<()> {
    lib().lock().unwrap().current()?.obase = b;
    Ok(())
}

// --- number handles ---

pub fn num_init() -> BcResult<Handle> {
    let mut l = lib().lock().unwrap();
    Ok(l.current()?.arena.insert(Number::zero()))
}

/// `sz` is a capacity hint in the original C arena; `Number`'s `Vec`-backed
/// limbs grow on demand, so there is nothing to pre-reserve. Kept for ABI
/// parity with `num_init`.
pub fn num_init_req(_sz: usize) -> BcResult<Handle> {
    num_init()
}

pub fn num_free(h: Handle) {
    if let Ok(mut l) = lib().lock() {
        if let Ok(ctx) = l.current() {
            ctx.arena.free(h);
        }
    }
}

pub fn num_copy(dst: Handle, src: Handle) -> BcResult<()> {
    let mut l = lib().lock().unwrap();
    let ctx = l.current()?;
    let n = ctx.arena.get(src)?.clone();
    ctx.arena.replace(dst, n)
}

pub fn num_dup(src: Handle) -> BcResult<Handle> {
    let mut l = lib().lock().unwrap();
    let ctx = l.current()?;
    let n = ctx.arena.get(src)?.clone();
    Ok(ctx.arena.insert(n))
}

pub fn num_neg(h: Handle) -> BcResult<bool> {
    let mut l = lib().lock().unwrap();
    Ok(l.current()?.arena.get(h)?.is_negative())
}

pub fn num_scale(h: Handle) -> BcResult<usize> {
    let mut l = lib().lock().unwrap();
    Ok(l.current()?.arena.get(h)?.scale_of())
}

pub fn num_len(h: Handle) -> BcResult<usize> {
    let mut l = lib().lock().unwrap();
    Ok(l.current()?.arena.get(h)?.length())
}

pub fn num_bigdig(h: Handle) -> BcResult<i64> {
    let mut l = lib().lock().unwrap();
    l.current()?.arena.get(h)?.to_i64().ok_or(BcError::Overflow)
}

pub fn num_bigdig2num(val: i64) -> BcResult<Handle> {
    let mut l = lib().lock().unwrap();
    Ok(l.current()?.arena.insert(Number::from_i64(val)))
}

// --- text I/O ---

pub fn num_parse(s: &str, base: u32) -> BcResult<Handle> {
    let mut l = lib().lock().unwrap();
    let ctx = l.current()?;
    let n = Number::parse(s, base).map_err(BcError::from)?;
    Ok(ctx.arena.insert(n))
}

pub fn num_parse_err(dst: Handle, s: &str, base: u32) -> BcResult<()> {
    let mut l = lib().lock().unwrap();
    let ctx = l.current()?;
    let n = Number::parse(s, base).map_err(BcError::from)?;
    ctx.arena.replace(dst, n)
}

pub fn num_string(h: Handle, base: u32) -> BcResult<String> {
    let mut l = lib().lock().unwrap();
    Ok(l.current()?.arena.get(h)?.to_base_string(base))
}

// --- arithmetic: consuming pair ---

macro_rules! consuming_binop {
    ($name:ident, $errname:ident, $op:expr) => {
        pub fn $name(a: Handle, b: Handle) -> BcResult<Handle> {
            let mut l = lib().lock().unwrap();
            let ctx = l.current()?;
            let scale = ctx.scale;
            let x = ctx.arena.take(a)?;
            let y = ctx.arena.take(b)?;
            let r: Number = ($op)(&x, &y, scale).map_err(BcError::from)?;
            Ok(ctx.arena.insert(r))
        }

        /// Non-consuming variant: writes into caller-supplied `dst`,
        /// leaves `a`/`b` untouched.
        pub fn $errname(dst: Handle, a: Handle, b: Handle) -> BcResult<()> {
            let mut l = lib().lock().unwrap();
            let ctx = l.current()?;
            let scale = ctx.scale;
            let x = ctx.arena.get(a)?.clone();
            let y = ctx.arena.get(b)?.clone();
            let r: Number = ($op)(&x, &y, scale).map_err(BcError::from)?;
            ctx.arena.replace(dst, r)
        }
    };
}

consuming_binop!(add, add_err, |a: &Number, b: &Number, _s: usize| -> Result<Number, CalcError> { Ok(a.add(b)) });
consuming_binop!(sub, sub_err, |a: &Number, b: &Number, _s: usize| -> Result<Number, CalcError> { Ok(a.sub(b)) });
consuming_binop!(mul, mul_err, |a: &Number, b: &Number, s: usize| -> Result<Number, CalcError> { Ok(a.mul_scaled(b, s)) });
consuming_binop!(div, div_err, |a: &Number, b: &Number, s: usize| a.div(b, s));
consuming_binop!(modulo, mod_err, |a: &Number, b: &Number, s: usize| a.rem(b, s));
consuming_binop!(pow, pow_err, |a: &Number, b: &Number, s: usize| a.pow(b, s));
consuming_binop!(places, places_err, |a: &Number, b: &Number, _s: usize| -> Result<Number, CalcError> {
    let p = b.to_i64().filter(|p| *p >= 0).ok_or(CalcError::MathNonInteger)?;
    Ok(a.with_scale(p as usize))
});
consuming_binop!(lshift, lshift_err, |a: &Number, b: &Number, _s: usize| -> Result<Number, CalcError> {
    let p = b.to_i64().ok_or(CalcError::MathNonInteger)?;
    Ok(a.shift(p))
});
consuming_binop!(rshift, rshift_err, |a: &Number, b: &Number, _s: usize| -> Result<Number, CalcError> {
    let p = b.to_i64().ok_or(CalcError::MathNonInteger)?;
    Ok(a.shift(-p))
});

pub fn sqrt(a: Handle) -> BcResult<Handle> {
    let mut l = lib().lock().unwrap();
    let ctx = l.current()?;
    let scale = ctx.scale;
    let x = ctx.arena.take(a)?;
    let r = x.sqrt(scale).map_err(BcError::from)?;
    Ok(ctx.arena.insert(r))
}

pub fn sqrt_err(dst: Handle, a: Handle) -> BcResult<()> {
    let mut l = lib().lock().unwrap();
    let ctx = l.current()?;
    let scale = ctx.scale;
    let x = ctx.arena.get(a)?.clone();
    let r = x.sqrt(scale).map_err(BcError::from)?;
    ctx.arena.replace(dst, r)
}

/// `divmod(a, b, *q, *r)`: the explicit-destination pair must not alias
/// (Open Question (b) in spec.md §9, resolved by following the C source's
/// `assert(cptr != dptr)` literally as a checked error instead of a panic).
pub fn divmod(a: Handle, b: Handle) -> BcResult<(Handle, Handle)> {
    let mut l = lib().lock().unwrap();
    let ctx = l.current()?;
    let scale = ctx.scale;
    let x = ctx.arena.take(a)?;
    let y = ctx.arena.take(b)?;
    let (q, r) = x.divmod(&y, scale).map_err(BcError::from)?;
    Ok((ctx.arena.insert(q), ctx.arena.insert(r)))
}

pub fn divmod_err(dst_q: Handle, dst_r: Handle, a: Handle, b: Handle) -> BcResult<()> {
    if dst_q == dst_r {
        return Err(BcError::InvalidContext);
    }
    let mut l = lib().lock().unwrap();
    let ctx = l.current()?;
    let scale = ctx.scale;
    let x = ctx.arena.get(a)?.clone();
    let y = ctx.arena.get(b)?.clone();
    let (q, r) = x.divmod(&y, scale).map_err(BcError::from)?;
    ctx.arena.replace(dst_q, q)?;
    ctx.arena.replace(dst_r, r)
}

pub fn modexp(a: Handle, b: Handle, c: Handle) -> BcResult<Handle> {
    let mut l = lib().lock().unwrap();
    let ctx = l.current()?;
    let x = ctx.arena.take(a)?;
    let y = ctx.arena.take(b)?;
    let m = ctx.arena.take(c)?;
    let r = x.modpow(&y, &m).map_err(BcError::from)?;
    Ok(ctx.arena.insert(r))
}

pub fn modexp_err(dst: Handle, a: Handle, b: Handle, c: Handle) -> BcResult<()> {
    let mut l = lib().lock().unwrap();
    let ctx = l.current()?;
    let x = ctx.arena.get(a)?.clone();
    let y = ctx.arena.get(b)?.clone();
    let m = ctx.arena.get(c)?.clone();
    let r = x.modpow(&y, &m).map_err(BcError::from)?;
    ctx.arena.replace(dst, r)
}

// --- sizing helpers ---
//
// The original arena pre-sizes a result's limb buffer from the operands'
// lengths before running the operation; `Number`'s `Vec<u32>` grows on
// demand, so these don't gate correctness here. Kept so a caller written
// against the C ABI's capacity-planning idiom still has something to call.

pub fn num_add_req(a: Handle, b: Handle) -> BcResult<usize> {
    let mut l = lib().lock().unwrap();
    let ctx = l.current()?;
    Ok(ctx.arena.get(a)?.length().max(ctx.arena.get(b)?.length()) + 1)
}

pub fn num_mul_req(a: Handle, b: Handle) -> BcResult<usize> {
    let mut l = lib().lock().unwrap();
    let ctx = l.current()?;
    Ok(ctx.arena.get(a)?.length() + ctx.arena.get(b)?.length())
}

pub fn num_div_req(a: Handle, _b: Handle, scale: usize) -> BcResult<usize> {
    let mut l = lib().lock().unwrap();
    let ctx = l.current()?;
    Ok(ctx.arena.get(a)?.length() + scale)
}

pub fn num_pow_req(a: Handle, b: Handle) -> BcResult<usize> {
    let mut l = lib().lock().unwrap();
    let ctx = l.current()?;
    let exp = ctx.arena.get(b)?.to_i64().unwrap_or(1).unsigned_abs() as usize;
    Ok(ctx.arena.get(a)?.length() * exp.max(1))
}

pub fn num_places_req(_a: Handle, p: usize) -> BcResult<usize> {
    Ok(p)
}

// --- RNG ---

pub fn num_seed(seed: &[u8]) -> BcResult<()> {
    let mut l = lib().lock().unwrap();
    l.current()?;
    l.rng = Rng::from_words(Rng::seed_bytes(seed));
    Ok(())
}

pub fn num_seed_with_num(h: Handle) -> BcResult<()> {
    let mut l = lib().lock().unwrap();
    let ctx = l.current()?;
    let words = Rng::seed_with_num(ctx.arena.get(h)?);
    l.rng = Rng::from_words(words);
    Ok(())
}

pub fn num_reseed() {
    let mut l = lib().lock().unwrap();
    l.rng = Rng::default();
}

pub fn num_seed2num() -> BcResult<Handle> {
    let mut l = lib().lock().unwrap();
    let bytes = l.rng.next_u64().to_le_bytes();
    let ctx = l.current()?;
    Ok(ctx.arena.insert(Number::from_i64(i64::from_le_bytes(bytes))))
}

pub fn rand_int() -> u64 {
    lib().lock().unwrap().rng.next_u64()
}

pub fn rand_bounded(bound: u64) -> u64 {
    lib().lock().unwrap().rng.bounded_u64(bound)
}

pub fn irand(bound: Handle) -> BcResult<Handle> {
    let mut l = lib().lock().unwrap();
    let bound_num = l.current()?.arena.take(bound)?;
    let n = l.rng.irand(&bound_num);
    let ctx = l.current()?;
    Ok(ctx.arena.insert(n))
}

pub fn frand(places: usize) -> BcResult<Handle> {
    let mut l = lib().lock().unwrap();
    let n = l.rng.frand(places);
    let ctx = l.current()?;
    Ok(ctx.arena.insert(n))
}

pub fn ifrand(x: Handle, places: usize) -> BcResult<Handle> {
    let mut l = lib().lock().unwrap();
    let bound_num = l.current()?.arena.take(x)?;
    let n = l.rng.ifrand(&bound_num, places);
    let ctx = l.current()?;
    Ok(ctx.arena.insert(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_context<T>(f: impl FnOnce() -> T) -> T {
        init().unwrap();
        let ctx = ctxt_create();
        push_context(ctx).unwrap();
        let result = f();
        pop_context();
        ctxt_free(ctx);
        free();
        result
    }

    #[test]
    fn arithmetic_round_trip() {
        with_context(|| {
            set_scale(0).unwrap();
            let a = num_parse("100", 10).unwrap();
            let b = num_parse("7", 10).unwrap();
            let q = div(a, b).unwrap();
            assert_eq!(num_string(q, 10).unwrap(), "14");
        });
    }

    #[test]
    fn scaled_division() {
        with_context(|| {
            set_scale(5).unwrap();
            let a = num_parse("100", 10).unwrap();
            let b = num_parse("7", 10).unwrap();
            let q = div(a, b).unwrap();
            assert_eq!(num_string(q, 10).unwrap(), "14.28571");
        });
    }

    #[test]
    fn handle_stability_after_err_variant() {
        with_context(|| {
            let a = num_parse("3", 10).unwrap();
            let b = num_parse("4", 10).unwrap();
            let dst = num_init().unwrap();
            add_err(dst, a, b).unwrap();
            // a and b were not consumed.
            assert_eq!(num_string(a, 10).unwrap(), "3");
            assert_eq!(num_string(b, 10).unwrap(), "4");
            assert_eq!(num_string(dst, 10).unwrap(), "7");
        });
    }

    #[test]
    fn no_active_context_is_an_error() {
        assert_eq!(num_parse("1", 10), Err(BcError::InvalidContext));
    }

    #[test]
    fn divmod_rejects_aliased_destinations() {
        with_context(|| {
            let a = num_parse("10", 10).unwrap();
            let b = num_parse("3", 10).unwrap();
            let dst = num_init().unwrap();
            assert_eq!(divmod_err(dst, dst, a, b), Err(BcError::InvalidContext));
        });
    }
}
