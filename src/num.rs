//! Arbitrary-precision decimal numbers.
//!
//! Numbers are stored as a sign plus an unsigned magnitude in base
//! `LIMB_BASE` (10^9) limbs, little-endian, together with a `scale`: the
//! count of decimal digits below the point that are folded into the low
//! end of the magnitude. A value with `scale == 3` and magnitude `12345`
//! represents `12.345`. Using a power-of-ten limb base keeps limb-to-digit
//! conversion for parsing and printing O(1) per limb while still letting
//! add/sub/mul/div work limb-at-a-time like a normal bignum.

use crate::error::CalcError;
use std::cmp::Ordering;
use std::fmt;

pub const LIMB_BASE: u64 = 1_000_000_000;
pub const LIMB_DIGITS: usize = 9;
/// Above this many limbs in the smaller operand, multiply switches from
/// schoolbook to Karatsuba.
const KARATSUBA_THRESHOLD: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Number {
    pub negative: bool,
    /// Base-`LIMB_BASE` magnitude, little-endian, no trailing (high) zero
    /// limbs except the single limb `[0]` representing zero.
    mag: Vec<u32>,
    /// Decimal digits folded into the low end of `mag`.
    pub scale: usize,
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base_string(10))
    }
}

impl Default for Number {
    fn default() -> Self {
        Number::zero()
    }
}

impl Number {
    pub fn zero() -> Self {
        Number {
            negative: false,
            mag: vec![0],
            scale: 0,
        }
    }

    pub fn one() -> Self {
        Number {
            negative: false,
            mag: vec![1],
            scale: 0,
        }
    }

    pub fn from_i64(v: i64) -> Self {
        let negative = v < 0;
        let mut u = v.unsigned_abs();
        let mut mag = Vec::new();
        if u == 0 {
            mag.push(0);
        }
        while u > 0 {
            mag.push((u % LIMB_BASE) as u32);
            u /= LIMB_BASE;
        }
        Number {
            negative,
            mag,
            scale: 0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.mag.len() == 1 && self.mag[0] == 0
    }

    pub fn is_integer(&self) -> bool {
        self.scale == 0
    }

    /// Total count of significant decimal digits (bc's `length()`).
    pub fn length(&self) -> usize {
        if self.is_zero() {
            return if self.scale == 0 { 1 } else { self.scale };
        }
        digit_count(&self.mag).max(self.scale)
    }

    pub fn scale_of(&self) -> usize {
        self.scale
    }

    // ---- parsing ----

    /// Parses a literal in the given input base. The wider language
    /// spec allows `ibase` up to 36 with `A`-`Z` standing for 10-35;
    /// this lexer/parser pair caps `ibase` at 16 with digits `A`-`F`
    /// (valid regardless of case), matching real `bc`'s own limit
    /// rather than the full range.
    pub fn parse(s: &str, ibase: u32) -> Result<Number, CalcError> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Number::zero());
        }
        let (negative, s) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let mut parts = s.splitn(2, '.');
        let int_part = parts.next().unwrap_or("");
        let frac_part = parts.next().unwrap_or("");

        let digit_val = |c: char| -> Result<u32, CalcError> {
            let v = match c {
                '0'..='9' => c as u32 - '0' as u32,
                'A'..='F' => c as u32 - 'A' as u32 + 10,
                'a'..='f' => c as u32 - 'a' as u32 + 10,
                _ => return Err(CalcError::MathInvalidString),
            };
            if v >= ibase {
                // real bc clamps out-of-range digits to ibase-1 rather
                // than erroring, matching bc_num_parseChar.
                Ok(ibase - 1)
            } else {
                Ok(v)
            }
        };

        if ibase == 10 {
            // Fast path: base 10 input maps straight onto the limb base.
            let mut mag = parse_decimal_digits(int_part)?;
            let scale = frac_part.len();
            if scale > 0 {
                let frac_digits = parse_decimal_digits(frac_part)?;
                mag = shift_left_decimal(&mag, scale);
                mag = add_mag(&mag, &frac_digits);
            }
            let mag = trim_mag(mag);
            let is_zero = mag.len() == 1 && mag[0] == 0;
            return Ok(Number {
                negative: negative && !is_zero,
                mag,
                scale,
            });
        }

        let mut mag = vec![0u32];
        for c in int_part.chars() {
            if c == '_' {
                continue;
            }
            let d = digit_val(c)?;
            mag = mul_small(&mag, ibase);
            mag = add_mag(&mag, &[d]);
        }

        let mut frac_mag = vec![0u32];
        let mut frac_base_pow = Number::one();
        let ibase_num = Number::from_i64(ibase as i64);
        for c in frac_part.chars() {
            if c == '_' {
                continue;
            }
            let d = digit_val(c)?;
            frac_mag = mul_small(&frac_mag, ibase);
            frac_mag = add_mag(&frac_mag, &[d]);
            frac_base_pow = frac_base_pow.mul(&ibase_num);
        }

        // int part exactly, frac part is frac_mag / ibase^len, rendered
        // to a generous fixed scale since bases other than 10 rarely
        // divide evenly into decimal.
        let scale = 2 * frac_part.len().max(1).min(99);
        let int_num = Number {
            negative: false,
            mag: trim_mag(mag),
            scale: 0,
        };
        let frac_num = Number {
            negative: false,
            mag: trim_mag(frac_mag),
            scale: 0,
        };
        let frac_value = if frac_part.is_empty() {
            Number::zero()
        } else {
            frac_num.div(&frac_base_pow, scale)?
        };
        let mut result = int_num.add(&frac_value);
        result.negative = negative && !result.is_zero();
        Ok(result)
    }

    // ---- printing ----

    /// Renders in the given output base. Bases `2..=16` use the classic
    /// single run of `0-9A-F` characters; higher bases print
    /// space-separated base-10 "digit" groups, matching `dc`/`bc` for
    /// `obase` beyond hex.
    pub fn to_base_string(&self, obase: u32) -> String {
        if obase == 10 {
            return self.to_decimal_string();
        }

        let sign = if self.negative && !self.is_zero() {
            "-"
        } else {
            ""
        };

        let scale_pow = pow10_mag(self.scale as u64);
        let (int_mag, frac_mag) = divmod_mag(&self.mag, &scale_pow);

        let int_digits = to_base_digits(&int_mag, obase);
        let int_str = format_base_digits(&int_digits, obase);

        if self.scale == 0 {
            return format!("{}{}", sign, int_str);
        }

        // Fractional digits: repeatedly multiply the remainder by obase
        // and take the integer part, for `scale` output positions (an
        // upper bound good enough for any obase we support).
        let mut frac_digits = Vec::new();
        let mut rem = frac_mag;
        let denom = scale_pow;
        let out_places = self.scale;
        for _ in 0..out_places {
            rem = mul_small(&rem, obase);
            let (q, r) = divmod_mag(&rem, &denom);
            frac_digits.push(*q.last().unwrap_or(&0));
            rem = r;
        }
        while frac_digits.last() == Some(&0) {
            frac_digits.pop();
        }
        if frac_digits.is_empty() {
            return format!("{}{}", sign, int_str);
        }
        let frac_str = format_base_digits(&frac_digits, obase);
        format!("{}{}.{}", sign, int_str, frac_str)
    }

    fn to_decimal_string(&self) -> String {
        let sign = if self.negative && !self.is_zero() {
            "-"
        } else {
            ""
        };
        let digits = mag_to_decimal_digits(&self.mag);
        if self.scale == 0 {
            return format!("{}{}", sign, digits_to_string(&digits));
        }
        let total = digits.len();
        if total <= self.scale {
            let mut frac = vec![0u8; self.scale - total];
            frac.extend_from_slice(&digits);
            format!("{}.{}{}", sign, "0", digits_to_string(&frac))
        } else {
            let split = total - self.scale;
            format!(
                "{}{}.{}",
                sign,
                digits_to_string(&digits[..split]),
                digits_to_string(&digits[split..])
            )
        }
    }

    // ---- comparison ----

    pub fn cmp_abs(&self, other: &Number) -> Ordering {
        let (a, b) = align_scale(self, other);
        cmp_mag(&a, &b)
    }

    pub fn cmp(&self, other: &Number) -> Ordering {
        if self.is_zero() && other.is_zero() {
            return Ordering::Equal;
        }
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => self.cmp_abs(other),
            (true, true) => other.cmp_abs(self),
        }
    }

    pub fn is_negative(&self) -> bool {
        self.negative && !self.is_zero()
    }

    // ---- arithmetic ----

    pub fn neg(&self) -> Number {
        if self.is_zero() {
            return self.clone();
        }
        Number {
            negative: !self.negative,
            mag: self.mag.clone(),
            scale: self.scale,
        }
    }

    pub fn abs(&self) -> Number {
        Number {
            negative: false,
            mag: self.mag.clone(),
            scale: self.scale,
        }
    }

    pub fn add(&self, other: &Number) -> Number {
        let (a, b) = align_scale(self, other);
        let scale = self.scale.max(other.scale);
        if self.negative == other.negative {
            Number::from_mag(self.negative, add_mag(&a, &b), scale)
        } else {
            match cmp_mag(&a, &b) {
                Ordering::Equal => Number::zero_scaled(scale),
                Ordering::Greater => Number::from_mag(self.negative, sub_mag(&a, &b), scale),
                Ordering::Less => Number::from_mag(other.negative, sub_mag(&b, &a), scale),
            }
        }
    }

    pub fn sub(&self, other: &Number) -> Number {
        self.add(&other.neg())
    }

    pub fn mul(&self, other: &Number) -> Number {
        let mag = mul_mag(&self.mag, &other.mag);
        let raw_scale = self.scale + other.scale;
        Number::from_mag(self.negative != other.negative, mag, raw_scale)
    }

    /// Multiplies then truncates to `scale(a*b) = min(a.scale + b.scale,
    /// max(a.scale, b.scale, scale))`, the rule POSIX `bc` uses for `*`.
    pub fn mul_scaled(&self, other: &Number, scale: usize) -> Number {
        let raw = self.mul(other);
        let target = raw.scale.min(self.scale.max(other.scale).max(scale));
        raw.truncated_to_scale(target)
    }

    pub fn div(&self, other: &Number, scale: usize) -> Result<Number, CalcError> {
        if other.is_zero() {
            return Err(CalcError::MathDivideByZero);
        }
        // Scale the dividend so the integer quotient carries `scale`
        // fractional digits: (a * 10^(scale + b.scale - a.scale)) / b_mag.
        let shift = scale as i64 + other.scale as i64 - self.scale as i64;
        let a_mag = if shift >= 0 {
            shift_left_decimal(&self.mag, shift as usize)
        } else {
            let (q, _) = divmod_mag(&self.mag, &pow10_mag((-shift) as u64));
            q
        };
        let (q, _) = divmod_mag(&a_mag, &other.mag);
        Ok(Number::from_mag(self.negative != other.negative, q, scale))
    }

    /// `a - (a/b)*b` computed at `scale` digits of precision, matching
    /// bc's `%` operator (which truncates the quotient before
    /// multiplying back, so the remainder can have up to `scale` digits).
    pub fn rem(&self, other: &Number, scale: usize) -> Result<Number, CalcError> {
        if other.is_zero() {
            return Err(CalcError::MathDivideByZero);
        }
        let q = self.div(other, scale)?;
        Ok(self.sub(&q.mul(other)))
    }

    pub fn divmod(&self, other: &Number, scale: usize) -> Result<(Number, Number), CalcError> {
        let q = self.div(other, scale)?;
        let r = self.sub(&q.mul(other));
        Ok((q, r))
    }

    /// Integer power (bc's `^`). `exponent` must be an integer; a
    /// negative exponent computes `1 / (self^|exponent|)` at `scale`
    /// digits.
    pub fn pow(&self, exponent: &Number, scale: usize) -> Result<Number, CalcError> {
        if !exponent.is_integer() {
            return Err(CalcError::MathNonInteger);
        }
        let neg_exp = exponent.is_negative();
        let mut e = exponent.abs();
        let mut result = Number::one();
        let mut base = self.clone();
        while !e.is_zero() {
            let (q, r) = e.divmod_small(2);
            if r == 1 {
                result = result.mul(&base);
            }
            base = base.mul(&base);
            e = q;
        }
        if neg_exp {
            Number::one().div(&result, scale)
        } else {
            // Same capping rule as `mul_scaled`: the exact product of
            // per-squaring scales, capped to whichever is larger of the
            // base's own scale and the declared scale.
            let target = result.scale.min(self.scale.max(scale));
            Ok(result.truncated_to_scale(target))
        }
    }

    /// `self^exponent mod modulus`, all three integers, via
    /// square-and-multiply scanning the exponent from the top, per
    /// `bcl_num_modexp`/`bc_num_modexp`. Does not allocate proportionally
    /// to the exponent's magnitude, only to the modulus.
    pub fn modpow(&self, exponent: &Number, modulus: &Number) -> Result<Number, CalcError> {
        if !self.is_integer() || !exponent.is_integer() || !modulus.is_integer() {
            return Err(CalcError::MathNonInteger);
        }
        if modulus.is_zero() {
            return Err(CalcError::MathDivideByZero);
        }
        if exponent.is_negative() {
            return Err(CalcError::MathNegative);
        }
        let base0 = self.rem(modulus, 0)?;
        let mut result = Number::one().rem(modulus, 0)?;
        let mut base = base0;
        let mut e = exponent.clone();
        while !e.is_zero() {
            let (q, r) = e.divmod_small(2);
            if r == 1 {
                result = result.mul(&base).rem(modulus, 0)?;
            }
            base = base.mul(&base).rem(modulus, 0)?;
            e = q;
        }
        Ok(result)
    }

    /// Newton's method square root to `scale` fractional digits,
    /// truncated (not rounded), matching `bc_num_sr`.
    pub fn sqrt(&self, scale: usize) -> Result<Number, CalcError> {
        if self.is_negative() {
            return Err(CalcError::MathNegSqrt);
        }
        if self.is_zero() {
            return Ok(Number::zero_scaled(scale));
        }
        if self.cmp(&Number::one()) == Ordering::Equal {
            return Ok(Number::one());
        }

        let work_scale = scale + 4;
        // Initial guess: 10^(ceil(digits/2)) is always >= sqrt for
        // digits >= 1, giving monotone convergence from above.
        let int_digits = digit_count(&self.mag).max(1);
        let guess_exp = (int_digits as i64 + 1) / 2 + 1;
        let mut x = pow10_number(guess_exp.max(1) as u64);
        let two = Number::from_i64(2);

        for _ in 0..200 {
            let next = x
                .add(&self.div(&x, work_scale + 4)?)
                .div(&two, work_scale + 4)?;
            if next.cmp(&x) == Ordering::Equal {
                x = next;
                break;
            }
            x = next;
        }
        Ok(x.truncated_to_scale(scale))
    }

    // ---- extra math (library façade extras) ----

    /// Shifts the decimal point right by `places` (multiplying by
    /// `10^places`); negative `places` shifts left.
    pub fn shift(&self, places: i64) -> Number {
        if places == 0 {
            return self.clone();
        }
        if places > 0 {
            let places = places as usize;
            if places <= self.scale {
                Number::from_mag(self.negative, self.mag.clone(), self.scale - places)
            } else {
                let mag = shift_left_decimal(&self.mag, places - self.scale);
                Number::from_mag(self.negative, mag, 0)
            }
        } else {
            Number::from_mag(self.negative, self.mag.clone(), self.scale + (-places) as usize)
        }
    }

    /// Sets the number of fractional digits, extending with zeros or
    /// truncating, per `bcl_num_setScale`.
    pub fn with_scale(&self, new_scale: usize) -> Number {
        if new_scale >= self.scale {
            let mag = shift_left_decimal(&self.mag, new_scale - self.scale);
            Number::from_mag(self.negative, mag, new_scale)
        } else {
            self.truncated_to_scale(new_scale)
        }
    }

    fn truncated_to_scale(&self, new_scale: usize) -> Number {
        if new_scale >= self.scale {
            return self.with_scale(new_scale);
        }
        let drop = self.scale - new_scale;
        let (q, _) = divmod_mag(&self.mag, &pow10_mag(drop as u64));
        Number::from_mag(self.negative, q, new_scale)
    }

    /// Divides by a small integer, returning (quotient, remainder) as
    /// plain u32; used internally by `pow`/`modpow` to scan bits of an
    /// integer exponent.
    fn divmod_small(&self, d: u32) -> (Number, u32) {
        let (q, r) = divmod_mag_small(&self.mag, d as u64);
        (Number::from_mag(self.negative, q, self.scale), r as u32)
    }

    // ---- conversions ----

    pub fn to_i64(&self) -> Option<i64> {
        if self.scale != 0 {
            return None;
        }
        let mut v: i128 = 0;
        for &limb in self.mag.iter().rev() {
            v = v * LIMB_BASE as i128 + limb as i128;
            if v > i64::MAX as i128 {
                return None;
            }
        }
        Some(if self.negative { -v as i64 } else { v as i64 })
    }

    pub fn to_usize(&self) -> Option<usize> {
        self.to_i64().and_then(|v| usize::try_from(v).ok())
    }

    /// Raw big-endian bytes of the integer magnitude, used to seed the
    /// RNG from a `Number` (`bcl_num_seed`/`bcl_num_seedWithNum`).
    pub fn to_seed_bytes(&self) -> Vec<u8> {
        let int_part = self.truncated_to_scale(0);
        let mut digits = mag_to_decimal_digits(&int_part.mag);
        if digits.is_empty() {
            digits.push(0);
        }
        let mut bytes = Vec::with_capacity((digits.len() + 1) / 2);
        let mut iter = digits.chunks(2);
        for chunk in &mut iter {
            let hi = chunk[0];
            let lo = chunk.get(1).copied().unwrap_or(0);
            bytes.push(hi * 10 + lo);
        }
        bytes
    }

    fn from_mag(negative: bool, mag: Vec<u32>, scale: usize) -> Number {
        let mag = trim_mag(mag);
        let is_zero = mag.len() == 1 && mag[0] == 0;
        Number {
            negative: negative && !is_zero,
            mag,
            scale,
        }
    }

    fn zero_scaled(scale: usize) -> Number {
        Number {
            negative: false,
            mag: vec![0],
            scale,
        }
    }
}

fn pow10_number(exp: u64) -> Number {
    Number {
        negative: false,
        mag: pow10_mag(exp),
        scale: 0,
    }
}

fn align_scale(a: &Number, b: &Number) -> (Vec<u32>, Vec<u32>) {
    match a.scale.cmp(&b.scale) {
        Ordering::Equal => (a.mag.clone(), b.mag.clone()),
        Ordering::Less => (shift_left_decimal(&a.mag, b.scale - a.scale), b.mag.clone()),
        Ordering::Greater => (a.mag.clone(), shift_left_decimal(&b.mag, a.scale - b.scale)),
    }
}

fn trim_mag(mut mag: Vec<u32>) -> Vec<u32> {
    while mag.len() > 1 && *mag.last().unwrap() == 0 {
        mag.pop();
    }
    if mag.is_empty() {
        mag.push(0);
    }
    mag
}

fn cmp_mag(a: &[u32], b: &[u32]) -> Ordering {
    let a = trim_ref(a);
    let b = trim_ref(b);
    if a.len() != b.len() {
        return a.len().cmp(&b.len());
    }
    for i in (0..a.len()).rev() {
        if a[i] != b[i] {
            return a[i].cmp(&b[i]);
        }
    }
    Ordering::Equal
}

fn trim_ref(a: &[u32]) -> &[u32] {
    let mut len = a.len();
    while len > 1 && a[len - 1] == 0 {
        len -= 1;
    }
    &a[..len]
}

fn add_mag(a: &[u32], b: &[u32]) -> Vec<u32> {
    let len = a.len().max(b.len());
    let mut out = Vec::with_capacity(len + 1);
    let mut carry: u64 = 0;
    for i in 0..len {
        let av = *a.get(i).unwrap_or(&0) as u64;
        let bv = *b.get(i).unwrap_or(&0) as u64;
        let sum = av + bv + carry;
        out.push((sum % LIMB_BASE) as u32);
        carry = sum / LIMB_BASE;
    }
    if carry > 0 {
        out.push(carry as u32);
    }
    trim_mag(out)
}

/// `a - b`, requires `a >= b`.
fn sub_mag(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(a.len());
    let mut borrow: i64 = 0;
    for i in 0..a.len() {
        let av = a[i] as i64;
        let bv = *b.get(i).unwrap_or(&0) as i64;
        let mut d = av - bv - borrow;
        if d < 0 {
            d += LIMB_BASE as i64;
            borrow = 1;
        } else {
            borrow = 0;
        }
        out.push(d as u32);
    }
    trim_mag(out)
}

fn mul_small(a: &[u32], m: u32) -> Vec<u32> {
    if m == 0 {
        return vec![0];
    }
    let mut out = Vec::with_capacity(a.len() + 1);
    let mut carry: u64 = 0;
    for &limb in a {
        let p = limb as u64 * m as u64 + carry;
        out.push((p % LIMB_BASE) as u32);
        carry = p / LIMB_BASE;
    }
    while carry > 0 {
        out.push((carry % LIMB_BASE) as u32);
        carry /= LIMB_BASE;
    }
    trim_mag(out)
}

fn mul_mag(a: &[u32], b: &[u32]) -> Vec<u32> {
    let a = trim_ref(a);
    let b = trim_ref(b);
    if a.len().min(b.len()) >= KARATSUBA_THRESHOLD {
        karatsuba(a, b)
    } else {
        schoolbook(a, b)
    }
}

fn schoolbook(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = vec![0u64; a.len() + b.len()];
    for (i, &av) in a.iter().enumerate() {
        if av == 0 {
            continue;
        }
        let mut carry: u64 = 0;
        for (j, &bv) in b.iter().enumerate() {
            let p = av as u64 * bv as u64 + out[i + j] + carry;
            out[i + j] = p % LIMB_BASE;
            carry = p / LIMB_BASE;
        }
        let mut k = i + b.len();
        while carry > 0 {
            let p = out[k] + carry;
            out[k] = p % LIMB_BASE;
            carry = p / LIMB_BASE;
            k += 1;
        }
    }
    trim_mag(out.into_iter().map(|v| v as u32).collect())
}

fn karatsuba(a: &[u32], b: &[u32]) -> Vec<u32> {
    let n = a.len().max(b.len());
    let half = n / 2;
    if half == 0 || a.len().min(b.len()) < KARATSUBA_THRESHOLD {
        return schoolbook(a, b);
    }

    let (a_lo, a_hi) = split_at(a, half);
    let (b_lo, b_hi) = split_at(b, half);

    let z0 = mul_mag(a_lo, b_lo);
    let z2 = mul_mag(a_hi, b_hi);
    let a_sum = add_mag(a_lo, a_hi);
    let b_sum = add_mag(b_lo, b_hi);
    let z1_full = mul_mag(&a_sum, &b_sum);
    let z1 = sub_mag(&sub_mag(&z1_full, &z0), &z2);

    let mut result = shift_limbs(&z2, 2 * half);
    result = add_mag(&result, &shift_limbs(&z1, half));
    result = add_mag(&result, &z0);
    result
}

fn split_at(a: &[u32], half: usize) -> (&[u32], &[u32]) {
    if a.len() <= half {
        (a, &[])
    } else {
        (&a[..half], &a[half..])
    }
}

fn shift_limbs(a: &[u32], n: usize) -> Vec<u32> {
    if a.len() == 1 && a[0] == 0 {
        return vec![0];
    }
    let mut out = vec![0u32; n];
    out.extend_from_slice(a);
    trim_mag(out)
}

/// Long division of magnitudes: `a = q*b + r`, `0 <= r < b`. Normalizes
/// the divisor so its top limb is at least `LIMB_BASE/2` before
/// estimating quotient limbs two-at-a-time (Knuth algorithm D), then
/// corrects with a subtract-and-fix loop.
fn divmod_mag(a: &[u32], b: &[u32]) -> (Vec<u32>, Vec<u32>) {
    let b = trim_ref(b);
    if b.len() == 1 {
        return divmod_mag_small(a, b[0] as u64);
    }
    let a = trim_ref(a);
    if cmp_mag(a, b) == Ordering::Less {
        return (vec![0], a.to_vec());
    }

    let shift = (LIMB_BASE / (b[b.len() - 1] as u64 + 1)).max(1);
    let a_n = mul_small(a, shift as u32);
    let b_n = mul_small(b, shift as u32);
    let b_n = trim_mag(b_n);

    let n = b_n.len();
    let mut a_n = a_n;
    while a_n.len() < n {
        a_n.push(0);
    }
    let m = a_n.len() - n;
    a_n.push(0);

    let mut quotient = vec![0u32; m + 1];
    let b_top = b_n[n - 1] as u64;
    let b_second = if n >= 2 { b_n[n - 2] as u64 } else { 0 };

    for j in (0..=m).rev() {
        let top2 = a_n[j + n] as u64 * LIMB_BASE + a_n[j + n - 1] as u64;
        let mut qhat = top2 / b_top;
        let mut rhat = top2 % b_top;
        if qhat >= LIMB_BASE {
            qhat = LIMB_BASE - 1;
            rhat = top2 - qhat * b_top;
        }
        while n >= 2 && qhat * b_second > rhat * LIMB_BASE + a_n[j + n - 2] as u64 {
            qhat -= 1;
            rhat += b_top;
            if rhat >= LIMB_BASE {
                break;
            }
        }

        // Subtract qhat * b_n from a_n[j..j+n+1], correcting if we
        // overshot (qhat off by one due to the estimate above).
        loop {
            let trial = mul_small(&b_n, qhat as u32);
            let window = &a_n[j..j + n + 1];
            if cmp_mag(window, &trial) >= Ordering::Equal {
                let diff = sub_mag(window, &trial);
                for (k, &d) in diff.iter().enumerate() {
                    a_n[j + k] = d;
                }
                for k in diff.len()..=n {
                    a_n[j + k] = 0;
                }
                break;
            } else {
                qhat -= 1;
            }
        }
        quotient[j] = qhat as u32;
    }

    let remainder_scaled = trim_mag(a_n[..n].to_vec());
    let (remainder, _) = divmod_mag_small(&remainder_scaled, shift);
    (trim_mag(quotient), remainder)
}

fn divmod_mag_small(a: &[u32], d: u64) -> (Vec<u32>, Vec<u32>) {
    if d == 0 {
        return (vec![0], vec![0]);
    }
    let mut out = vec![0u32; a.len()];
    let mut rem: u64 = 0;
    for i in (0..a.len()).rev() {
        let cur = rem * LIMB_BASE + a[i] as u64;
        out[i] = (cur / d) as u32;
        rem = cur % d;
    }
    (trim_mag(out), vec![rem as u32])
}

fn digit_count(mag: &[u32]) -> usize {
    let mag = trim_ref(mag);
    if mag.len() == 1 && mag[0] == 0 {
        return 1;
    }
    let top = mag[mag.len() - 1];
    (mag.len() - 1) * LIMB_DIGITS + decimal_len(top)
}

fn decimal_len(mut v: u32) -> usize {
    if v == 0 {
        return 1;
    }
    let mut n = 0;
    while v > 0 {
        n += 1;
        v /= 10;
    }
    n
}

fn pow10_mag(exp: u64) -> Vec<u32> {
    let full_limbs = (exp / LIMB_DIGITS as u64) as usize;
    let rem = (exp % LIMB_DIGITS as u64) as u32;
    let mut mag = vec![0u32; full_limbs];
    mag.push(10u32.pow(rem));
    trim_mag(mag)
}

fn shift_left_decimal(mag: &[u32], places: usize) -> Vec<u32> {
    if places == 0 {
        return mag.to_vec();
    }
    let full_limbs = places / LIMB_DIGITS;
    let rem = places % LIMB_DIGITS;
    let mut out = vec![0u32; full_limbs];
    out.extend_from_slice(mag);
    if rem > 0 {
        out = mul_small(&out, 10u32.pow(rem as u32));
    }
    trim_mag(out)
}

/// Expands limbs into individual decimal digits, most significant first,
/// with no leading zero digit unless the value is zero.
fn mag_to_decimal_digits(mag: &[u32]) -> Vec<u8> {
    let mag = trim_ref(mag);
    let mut digits = Vec::with_capacity(mag.len() * LIMB_DIGITS);
    for (i, &limb) in mag.iter().enumerate().rev() {
        if i == mag.len() - 1 {
            let s = limb.to_string();
            digits.extend(s.bytes().map(|b| b - b'0'));
        } else {
            let s = format!("{:09}", limb);
            digits.extend(s.bytes().map(|b| b - b'0'));
        }
    }
    if digits.is_empty() {
        digits.push(0);
    }
    digits
}

fn parse_decimal_digits(s: &str) -> Result<Vec<u32>, CalcError> {
    let cleaned: String = s.chars().filter(|&c| c != '_').collect();
    if cleaned.is_empty() {
        return Ok(vec![0]);
    }
    let mut mag = vec![0u32];
    for c in cleaned.chars() {
        if !c.is_ascii_digit() {
            return Err(CalcError::MathInvalidString);
        }
        mag = mul_small(&mag, 10);
        mag = add_mag(&mag, &[c as u32 - '0' as u32]);
    }
    Ok(trim_mag(mag))
}

fn digits_to_string(digits: &[u8]) -> String {
    if digits.is_empty() {
        return "0".to_string();
    }
    digits.iter().map(|d| (d + b'0') as char).collect()
}

fn to_base_digits(mag: &[u32], base: u32) -> Vec<u32> {
    let mut digits = Vec::new();
    let mut cur = mag.to_vec();
    loop {
        let (q, r) = divmod_mag_small(&cur, base as u64);
        digits.push(*r.first().unwrap_or(&0));
        if q.len() == 1 && q[0] == 0 {
            break;
        }
        cur = q;
    }
    digits.reverse();
    digits
}

fn format_base_digits(digits: &[u32], base: u32) -> String {
    if base <= 16 {
        digits
            .iter()
            .map(|&d| std::char::from_digit(d, base).unwrap_or('?').to_ascii_uppercase())
            .collect()
    } else {
        digits
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(s: &str) -> Number {
        Number::parse(s, 10).unwrap()
    }

    #[test]
    fn parse_and_print_roundtrip() {
        assert_eq!(n("123.456").to_string(), "123.456");
        assert_eq!(n("-0.5").to_string(), "-.5");
        assert_eq!(n("0").to_string(), "0");
    }

    #[test]
    fn add_sub() {
        assert_eq!(n("1.5").add(&n("2.25")).to_string(), "3.75");
        assert_eq!(n("1").sub(&n("1.5")).to_string(), "-.5");
        assert_eq!(n("5").sub(&n("5")).to_string(), "0");
    }

    #[test]
    fn multiply_matches_schoolbook_reference() {
        assert_eq!(n("12").mul(&n("13")).to_string(), "156");
        assert_eq!(n("1.5").mul(&n("2")).to_string(), "3.0");
    }

    #[test]
    fn karatsuba_matches_schoolbook_for_large_operands() {
        let big_a: String = std::iter::repeat('7').take(300).collect();
        let big_b: String = std::iter::repeat('3').take(300).collect();
        let a = n(&big_a);
        let b = n(&big_b);
        let got = a.mul(&b);
        let expect = schoolbook(&a_mag(&a), &a_mag(&b));
        assert_eq!(got.to_string(), digits_to_string(&mag_to_decimal_digits(&trim_mag(expect))));
    }

    fn a_mag(n: &Number) -> Vec<u32> {
        n.mag.clone()
    }

    #[test]
    fn division_and_remainder() {
        assert_eq!(n("10").div(&n("4"), 2).unwrap().to_string(), "2.50");
        assert_eq!(n("10").rem(&n("3"), 0).unwrap().to_string(), "1");
        assert!(n("1").div(&n("0"), 2).is_err());
    }

    #[test]
    fn integer_power() {
        assert_eq!(n("2").pow(&n("10"), 0).unwrap().to_string(), "1024");
        assert_eq!(n("2").pow(&n("-1"), 4).unwrap().to_string(), ".5000");
    }

    #[test]
    fn modular_exponentiation() {
        assert_eq!(n("4").modpow(&n("13"), &n("497")).unwrap().to_string(), "445");
    }

    #[test]
    fn square_root_truncates() {
        assert_eq!(n("2").sqrt(5).unwrap().to_string(), "1.41421");
        assert_eq!(n("4").sqrt(0).unwrap().to_string(), "2");
        assert!(n("-1").sqrt(0).is_err());
    }

    #[test]
    fn hex_parse_and_print() {
        assert_eq!(Number::parse("FF", 16).unwrap().to_base_string(2), "11111111");
    }
}
