//! Convenience functions for arithmetics
//!
//! [`ModInt`] pairs a fixed-width integer with the modulus it lives under. A modulus of zero
//! marks a plain integer: arithmetic is then non-modular and overflow panics the same way it
//! does for the primitive integer types.
use crate::{
    error::{Error, Result},
    BigInt,
};
use crypto_bigint::{
    modular::runtime_mod::{DynResidue, DynResidueParams},
    rand_core::CryptoRngCore,
    CheckedAdd, CheckedMul, CheckedSub, Integer, Limb, NonZero, Random,
};
use log::debug;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

/// Decimal conversion works in chunks of nine digits so that each chunk fits a single limb on
/// every target
const DECIMAL_CHUNK: u32 = 1_000_000_000;
const DECIMAL_CHUNK_DIGITS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModInt {
    /// Always strictly less than the modulus when the modulus is non-zero
    value: BigInt,

    /// Zero for plain integers
    modulus: BigInt,
}

impl ModInt {
    pub const ZERO: Self = Self::plain(BigInt::ZERO);
    pub const ONE: Self = Self::plain(BigInt::ONE);

    /// Reduce the value under the modulus. A zero modulus yields a plain integer.
    pub fn new(value: BigInt, modulus: BigInt) -> Self {
        return Self {
            value: reduce(&value, &modulus),
            modulus,
        };
    }

    pub const fn plain(value: BigInt) -> Self {
        return Self {
            value,
            modulus: BigInt::ZERO,
        };
    }

    pub const fn from_u64(value: u64) -> Self {
        return Self::plain(BigInt::from_u64(value));
    }

    /// The additive identity under the given modulus
    pub fn zero(modulus: &BigInt) -> Self {
        return Self::new(BigInt::ZERO, *modulus);
    }

    /// The multiplicative identity under the given modulus
    pub fn one(modulus: &BigInt) -> Self {
        return Self::new(BigInt::ONE, *modulus);
    }

    /// Parse a decimal string and reduce it under the modulus
    pub fn parse(text: &str, modulus: &BigInt) -> Result<Self> {
        let value = parse_decimal(text)
            .ok_or_else(|| Error::parse("integer", format!("`{text}` is not a decimal integer")))?;
        return Ok(Self::new(value, *modulus));
    }

    /// Interpret big-endian bytes as a plain integer
    pub fn from_be_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > BigInt::BYTES {
            return Err(Error::parse(
                "integer",
                format!("{} bytes do not fit {} bits", bytes.len(), BigInt::BITS),
            ));
        }
        let mut padded = [0u8; BigInt::BYTES];
        padded[BigInt::BYTES - bytes.len()..].copy_from_slice(bytes);
        return Ok(Self::plain(BigInt::from_be_slice(&padded)));
    }

    pub fn get_value(&self) -> &BigInt {
        return &self.value;
    }

    pub fn get_modulus(&self) -> &BigInt {
        return &self.modulus;
    }

    pub fn is_plain(&self) -> bool {
        return self.modulus == BigInt::ZERO;
    }

    pub fn is_zero(&self) -> bool {
        return self.value == BigInt::ZERO;
    }

    /// Return the value if it fits a machine word
    pub fn to_u64(&self) -> Option<u64> {
        if self.value.bits_vartime() > u64::BITS as usize {
            return None;
        }
        let mut word = 0u64;
        for (i, limb) in self.value.as_limbs().iter().enumerate() {
            let shift = i * Limb::BITS;
            if shift >= u64::BITS as usize {
                break;
            }
            word |= u64::from(limb.0) << shift;
        }
        return Some(word);
    }

    /// Re-interpret the value under another modulus. A zero modulus drops the modulus and keeps
    /// the representative.
    pub fn modulo(&self, modulus: &BigInt) -> Self {
        return Self::new(self.value, *modulus);
    }

    /// The value of `other` as seen under this modulus
    fn align(&self, other: &Self) -> BigInt {
        if self.is_plain() || other.modulus == self.modulus {
            return other.value;
        }
        return reduce(&other.value, &self.modulus);
    }

    /// Additive inverse. Only zero can be negated without a modulus.
    pub fn negate(&self) -> Self {
        if self.is_zero() {
            return *self;
        }
        if self.is_plain() {
            panic!("attempt to negate a non-zero plain integer");
        }
        return Self {
            value: self.modulus.wrapping_sub(&self.value),
            modulus: self.modulus,
        };
    }

    /// Multiplicative inverse under the modulus
    pub fn invert(&self) -> Result<Self> {
        if self.is_plain() || self.is_zero() {
            return Err(Error::NotInvertible);
        }
        let (inverse, invertible) = self.value.inv_mod(&self.modulus);
        let invertible: bool = invertible.into();
        if !invertible {
            return Err(Error::NotInvertible);
        }
        return Ok(Self::new(inverse, self.modulus));
    }

    /// Modular division through the inverse of `other`, or integer division for plain values
    pub fn divide(&self, other: &Self) -> Result<Self> {
        if self.is_plain() {
            let divisor: Option<NonZero<BigInt>> = NonZero::new(other.value).into();
            let divisor = divisor.ok_or(Error::DivisionByZero)?;
            let (quotient, _) = self.value.div_rem(&divisor);
            return Ok(Self::plain(quotient));
        }
        let inverse = Self::new(self.align(other), self.modulus).invert()?;
        return Ok(*self * inverse);
    }

    /// Raise to the power of the exponent's value. The exponent's own modulus is ignored.
    ///
    /// Plain integers require the exponent to fit a machine word and panic on overflow.
    pub fn pow(&self, exponent: &Self) -> Self {
        if self.is_plain() {
            let exponent = exponent
                .to_u64()
                .unwrap_or_else(|| panic!("plain exponent {exponent} does not fit a machine word"));
            return Self::plain(plain_pow(&self.value, exponent));
        }
        if exponent.is_zero() {
            return Self::one(&self.modulus);
        }
        if bool::from(self.modulus.is_odd()) {
            let params = DynResidueParams::new(&self.modulus);
            let power = DynResidue::new(&self.value, params)
                .pow_bounded_exp(&exponent.value, exponent.value.bits_vartime())
                .retrieve();
            return Self::new(power, self.modulus);
        }
        let mut power = reduce(&BigInt::ONE, &self.modulus);
        for bit in (0..exponent.value.bits_vartime()).rev() {
            power = mul_mod(&power, &power, &self.modulus);
            if exponent.value.bit_vartime(bit) {
                power = mul_mod(&power, &self.value, &self.modulus);
            }
        }
        return Self::new(power, self.modulus);
    }

    /// Sample uniformly from `[0, bound)`. The result carries `bound` as its modulus.
    ///
    /// Candidates are drawn with the bit length of the bound and rejected when they exceed it,
    /// so the distribution carries no modulo bias. Panics if the bound is zero.
    pub fn random(rng: &mut impl CryptoRngCore, bound: &BigInt) -> Self {
        if *bound == BigInt::ZERO {
            panic!("random bound must be non-zero");
        }
        let shift = BigInt::BITS - bound.bits_vartime();
        loop {
            let candidate = BigInt::random(rng).shr_vartime(shift);
            if candidate < *bound {
                return Self {
                    value: candidate,
                    modulus: *bound,
                };
            }
        }
    }

    /// Generate a probable safe prime `p` with exactly `bits` bits, so that `(p - 1) / 2` is
    /// also a probable prime.
    ///
    /// This loops until a candidate passes. Termination is probabilistic and there is no upper
    /// bound on the number of attempts; callers that need a deadline must enforce it themselves.
    /// Panics if `bits` is below 3 or above the width of [`BigInt`].
    pub fn safe_prime(rng: &mut impl CryptoRngCore, bits: usize) -> Self {
        let mut attempts: u64 = 0;
        loop {
            attempts += 1;
            let p: BigInt = crypto_primes::generate_prime_with_rng(rng, Some(bits));
            let q = p.shr_vartime(1);
            if crypto_primes::is_prime_with_rng(rng, &q) {
                debug!("found a {bits}-bit safe prime after {attempts} attempts");
                return Self::plain(p);
            }
        }
    }
}

impl Add for ModInt {
    type Output = ModInt;

    fn add(self, rhs: ModInt) -> ModInt {
        let rhs = self.align(&rhs);
        if self.is_plain() {
            let sum: Option<BigInt> = self.value.checked_add(&rhs).into();
            return Self::plain(sum.unwrap_or_else(|| panic!("attempt to add with overflow")));
        }
        return Self {
            value: self.value.add_mod(&rhs, &self.modulus),
            modulus: self.modulus,
        };
    }
}

impl Sub for ModInt {
    type Output = ModInt;

    fn sub(self, rhs: ModInt) -> ModInt {
        let rhs = self.align(&rhs);
        if self.is_plain() {
            let difference: Option<BigInt> = self.value.checked_sub(&rhs).into();
            return Self::plain(
                difference.unwrap_or_else(|| panic!("attempt to subtract with overflow")),
            );
        }
        return Self {
            value: self.value.sub_mod(&rhs, &self.modulus),
            modulus: self.modulus,
        };
    }
}

impl Mul for ModInt {
    type Output = ModInt;

    fn mul(self, rhs: ModInt) -> ModInt {
        let rhs = self.align(&rhs);
        if self.is_plain() {
            let product: Option<BigInt> = self.value.checked_mul(&rhs).into();
            return Self::plain(product.unwrap_or_else(|| panic!("attempt to multiply with overflow")));
        }
        return Self {
            value: mul_mod(&self.value, &rhs, &self.modulus),
            modulus: self.modulus,
        };
    }
}

impl Neg for ModInt {
    type Output = ModInt;

    fn neg(self) -> ModInt {
        return self.negate();
    }
}

impl fmt::Display for ModInt {
    /// The decimal representation of the value; the modulus is not printed
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(&to_decimal(&self.value));
    }
}

impl FromStr for ModInt {
    type Err = Error;

    /// Parse a plain decimal integer
    fn from_str(s: &str) -> Result<Self> {
        return Self::parse(s, &BigInt::ZERO);
    }
}

/// Brute-force discrete log for exponents bounded by a small count: return the first
/// `k` in `0..=bound` with `base^k == target` under the base's modulus, or None.
pub fn bounded_discrete_log(base: &ModInt, target: &ModInt, bound: u64) -> Option<u64> {
    let target = base.align(target);
    let mut power = ModInt::one(base.get_modulus());
    for exp in 0..=bound {
        if power.value == target {
            return Some(exp);
        }
        power = power * *base;
    }
    return None;
}

fn reduce(value: &BigInt, modulus: &BigInt) -> BigInt {
    if *modulus == BigInt::ZERO {
        return *value;
    }
    let (remainder, _) = value.const_rem(modulus);
    return remainder;
}

fn mul_mod(lhs: &BigInt, rhs: &BigInt, modulus: &BigInt) -> BigInt {
    let wide = lhs.mul_wide(rhs);
    let (remainder, _) = BigInt::const_rem_wide(wide, modulus);
    return remainder;
}

fn plain_pow(base: &BigInt, exponent: u64) -> BigInt {
    let mut power = BigInt::ONE;
    for bit in (0..u64::BITS - exponent.leading_zeros()).rev() {
        let square: Option<BigInt> = power.checked_mul(&power).into();
        power = square.unwrap_or_else(|| panic!("attempt to multiply with overflow"));
        if (exponent >> bit) & 1 == 1 {
            let product: Option<BigInt> = power.checked_mul(base).into();
            power = product.unwrap_or_else(|| panic!("attempt to multiply with overflow"));
        }
    }
    return power;
}

fn to_decimal(value: &BigInt) -> String {
    if *value == BigInt::ZERO {
        return "0".to_string();
    }
    let (chunk, _) = NonZero::<Limb>::const_new(Limb::from_u32(DECIMAL_CHUNK));
    let mut chunks = vec![];
    let mut rest = *value;
    while rest != BigInt::ZERO {
        let (quotient, remainder) = rest.div_rem_limb(chunk);
        chunks.push(remainder.0);
        rest = quotient;
    }
    let mut digits = String::with_capacity(chunks.len() * DECIMAL_CHUNK_DIGITS);
    for (i, chunk) in chunks.iter().rev().enumerate() {
        if i == 0 {
            digits.push_str(&chunk.to_string());
        } else {
            digits.push_str(&format!("{:0width$}", chunk, width = DECIMAL_CHUNK_DIGITS));
        }
    }
    return digits;
}

fn parse_decimal(text: &str) -> Option<BigInt> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let head = match text.len() % DECIMAL_CHUNK_DIGITS {
        0 => DECIMAL_CHUNK_DIGITS,
        n => n,
    };
    let mut value = BigInt::ZERO;
    let mut start = 0;
    let mut end = head;
    while start < text.len() {
        let digits = &text[start..end];
        let scale = BigInt::from_u32(10u32.pow(digits.len() as u32));
        let chunk = BigInt::from_u32(digits.parse::<u32>().ok()?);
        let scaled: Option<BigInt> = value.checked_mul(&scale).into();
        let sum: Option<BigInt> = scaled?.checked_add(&chunk).into();
        value = sum?;
        start = end;
        end += DECIMAL_CHUNK_DIGITS;
    }
    return Some(value);
}
