// m_fixed.rs — 16.16 fixed-point arithmetic
//
// All resampling in the texture cache steps through source pixels with these
// values; results must match integer-exact output, so no floats here.

use std::ops::{Add, AddAssign, Neg, Sub};

pub const FRACBITS: u32 = 16;
pub const FRACUNIT: i32 = 1 << FRACBITS;
pub const FRACHALF: i32 = FRACUNIT / 2;

/// A signed 16.16 fixed-point number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(pub i32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(FRACUNIT);

    #[inline]
    pub const fn from_int(i: i32) -> Fixed {
        Fixed(i << FRACBITS)
    }

    /// `(num << FRACBITS) / den`. Panics on a zero denominator like any
    /// integer division; callers guard against empty dimensions first.
    #[inline]
    pub const fn ratio(num: i32, den: i32) -> Fixed {
        Fixed((num << FRACBITS) / den)
    }

    /// Integer part, rounding toward negative infinity (arithmetic shift).
    #[inline]
    pub const fn to_int(self) -> i32 {
        self.0 >> FRACBITS
    }

    /// Integer part rounded half-up: `(x + FRACUNIT/2) >> FRACBITS`.
    #[inline]
    pub const fn round(self) -> i32 {
        (self.0 + FRACHALF) >> FRACBITS
    }

    /// `i * self`, still in fixed point, with i32 wrap-around like the
    /// 32-bit products it replaces.
    #[inline]
    pub const fn scale_int(self, i: i32) -> Fixed {
        Fixed(i.wrapping_mul(self.0))
    }
}

impl Add for Fixed {
    type Output = Fixed;
    #[inline]
    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.wrapping_add(rhs.0))
    }
}

impl AddAssign for Fixed {
    #[inline]
    fn add_assign(&mut self, rhs: Fixed) {
        self.0 = self.0.wrapping_add(rhs.0);
    }
}

impl Sub for Fixed {
    type Output = Fixed;
    #[inline]
    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.wrapping_sub(rhs.0))
    }
}

impl Neg for Fixed {
    type Output = Fixed;
    #[inline]
    fn neg(self) -> Fixed {
        Fixed(-self.0)
    }
}
