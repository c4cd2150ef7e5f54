//! Fixed-point helpers for reward and share accounting.
//!
//! Products such as `elapsed × rate × SCALE` or `balance × index_delta`
//! routinely exceed `u128` for 18-decimal assets, so every `a × b / c` in the
//! engine goes through a full 256-bit intermediate and only fails when the
//! *quotient* does not fit.
//!
//! The reward index itself is a [`U256`]: `emitted × SCALE / supply` over a
//! tiny supply outgrows `u128` long before any account balance does.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scaling factor of the reward-per-share index (1e18).
pub const SCALE: u128 = 1_000_000_000_000_000_000;

/// Full 256-bit product of two `u128`s as `(high, low)` words.
fn widening_mul(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = u64::MAX as u128;

    let a_lo = a & MASK;
    let a_hi = a >> 64;
    let b_lo = b & MASK;
    let b_hi = b >> 64;

    let p0 = a_lo * b_lo;
    let p1 = a_lo * b_hi;
    let p2 = a_hi * b_lo;
    let p3 = a_hi * b_hi;

    let (mid, carry1) = p1.overflowing_add(p2);
    let (mid, carry2) = mid.overflowing_add(p0 >> 64);
    let carries = (carry1 as u128) + (carry2 as u128);

    let low = (mid << 64) | (p0 & MASK);
    let high = p3 + (mid >> 64) + (carries << 64);
    (high, low)
}

/// Divide the 256-bit value `(high, low)` by `d`.
///
/// Returns `(quotient, remainder)`, or `None` if `d == 0` or the quotient
/// does not fit in `u128`.
fn div_wide(high: u128, low: u128, d: u128) -> Option<(u128, u128)> {
    if d == 0 {
        return None;
    }
    if high == 0 {
        return Some((low / d, low % d));
    }
    if high >= d {
        return None;
    }

    // Restoring long division, one bit of `low` at a time. `rem < d` holds on
    // entry to every iteration.
    let mut rem = high;
    let mut quot = 0u128;
    for i in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((low >> i) & 1);
        quot <<= 1;
        if carry == 1 || rem >= d {
            rem = rem.wrapping_sub(d);
            quot |= 1;
        }
    }
    Some((quot, rem))
}

/// `floor(a × b / c)` with a 256-bit intermediate.
///
/// `None` when `c == 0` or the result overflows `u128`.
pub fn mul_div_floor(a: u128, b: u128, c: u128) -> Option<u128> {
    let (high, low) = widening_mul(a, b);
    div_wide(high, low, c).map(|(q, _)| q)
}

/// `ceil(a × b / c)` with a 256-bit intermediate.
pub fn mul_div_ceil(a: u128, b: u128, c: u128) -> Option<u128> {
    let (high, low) = widening_mul(a, b);
    let (q, r) = div_wide(high, low, c)?;
    if r == 0 {
        Some(q)
    } else {
        q.checked_add(1)
    }
}

/// Unsigned 256-bit integer, two `u128` words. Carries just the arithmetic
/// the reward index needs; everything saturates or reports overflow.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct U256 {
    // field order drives the derived `Ord`
    high: u128,
    low: u128,
}

impl U256 {
    pub const ZERO: Self = Self { high: 0, low: 0 };
    pub const MAX: Self = Self {
        high: u128::MAX,
        low: u128::MAX,
    };

    pub const fn from_words(high: u128, low: u128) -> Self {
        Self { high, low }
    }

    pub const fn from_u128(value: u128) -> Self {
        Self {
            high: 0,
            low: value,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.high == 0 && self.low == 0
    }

    /// The value as `u128`, if it fits.
    pub fn to_u128(self) -> Option<u128> {
        (self.high == 0).then_some(self.low)
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        let (low, carry) = self.low.overflowing_add(rhs.low);
        let high = self.high.checked_add(rhs.high)?.checked_add(carry as u128)?;
        Some(Self { high, low })
    }

    pub fn saturating_add(self, rhs: Self) -> Self {
        self.checked_add(rhs).unwrap_or(Self::MAX)
    }

    pub fn saturating_sub(self, rhs: Self) -> Self {
        if self <= rhs {
            return Self::ZERO;
        }
        let (low, borrow) = self.low.overflowing_sub(rhs.low);
        let high = self.high - rhs.high - borrow as u128;
        Self { high, low }
    }

    /// `floor(a × b / c)` kept at full width. `None` only when `c == 0`.
    pub fn mul_div(a: u128, b: u128, c: u128) -> Option<Self> {
        let (high, low) = widening_mul(a, b);
        Self { high, low }.div_rem(c).map(|(q, _)| q)
    }

    /// `floor(self × m / d)` narrowed to `u128`.
    ///
    /// `None` when `d == 0` or the quotient does not fit.
    pub fn mul_div_floor(self, m: u128, d: u128) -> Option<u128> {
        if d == 0 {
            return None;
        }
        // self × m = top·2^256 + mid·2^128 + bottom
        let (lo_carry, bottom) = widening_mul(self.low, m);
        let (top, hi_low) = widening_mul(self.high, m);
        let (mid, carry) = hi_low.overflowing_add(lo_carry);
        if top != 0 || carry {
            // at least 2^256 / d, which never fits a u128 for d < 2^128
            return None;
        }
        div_wide(mid, bottom, d).map(|(q, _)| q)
    }

    fn div_rem(self, d: u128) -> Option<(Self, u128)> {
        if d == 0 {
            return None;
        }
        let high = self.high / d;
        let (low, rem) = div_wide(self.high % d, self.low, d)?;
        Some((Self { high, low }, rem))
    }
}

impl From<u128> for U256 {
    fn from(value: u128) -> Self {
        Self::from_u128(value)
    }
}

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const CHUNK: u128 = 10_000_000_000_000_000_000; // 1e19

        if let Some(value) = self.to_u128() {
            return write!(f, "{value}");
        }
        let mut chunks = Vec::new();
        let mut rest = *self;
        while !rest.is_zero() {
            let Some((q, r)) = rest.div_rem(CHUNK) else {
                return Err(fmt::Error);
            };
            chunks.push(r);
            rest = q;
        }
        let mut digits = chunks.iter().rev();
        if let Some(first) = digits.next() {
            write!(f, "{first}")?;
        }
        for chunk in digits {
            write!(f, "{chunk:019}")?;
        }
        Ok(())
    }
}
