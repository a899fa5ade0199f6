//! Fixed-point 17.14 — арифметика для статистики MLFQS
//! Fixed-point 17.14 — arithmetic for MLFQS statistics
//!
//!   31 30 ........... 14 13 .......... 0
//!   ┌─┬────────────────┬───────────────┐
//!   │S│ целое / integer│ дробь/fraction│
//!   └─┴────────────────┴───────────────┘
//!
//! Произведение и частное двух дробных чисел считаются в i64.
//! Products and quotients of two fixed values go through i64.

use core::fmt;
use core::ops::{Add, AddAssign, Div, Mul, Sub};

const F: i32 = 1 << 14;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct Fixed(i32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(F);

    pub const fn from_int(n: i32) -> Self {
        Self(n * F)
    }

    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Отбросить дробную часть (к нулю) / Truncate toward zero
    pub const fn trunc(self) -> i32 {
        self.0 / F
    }

    /// Округлить к ближайшему / Round to nearest, halves away from zero
    pub const fn round(self) -> i32 {
        if self.0 >= 0 {
            (self.0 + F / 2) / F
        } else {
            (self.0 - F / 2) / F
        }
    }
}

impl Add for Fixed {
    type Output = Fixed;
    fn add(self, rhs: Fixed) -> Fixed { Fixed(self.0 + rhs.0) }
}

impl Add<i32> for Fixed {
    type Output = Fixed;
    fn add(self, n: i32) -> Fixed { Fixed(self.0 + n * F) }
}

impl AddAssign<i32> for Fixed {
    fn add_assign(&mut self, n: i32) { *self = *self + n; }
}

impl Sub for Fixed {
    type Output = Fixed;
    fn sub(self, rhs: Fixed) -> Fixed { Fixed(self.0 - rhs.0) }
}

impl Sub<i32> for Fixed {
    type Output = Fixed;
    fn sub(self, n: i32) -> Fixed { Fixed(self.0 - n * F) }
}

impl Mul for Fixed {
    type Output = Fixed;
    fn mul(self, rhs: Fixed) -> Fixed {
        Fixed((self.0 as i64 * rhs.0 as i64 / F as i64) as i32)
    }
}

impl Mul<i32> for Fixed {
    type Output = Fixed;
    fn mul(self, n: i32) -> Fixed { Fixed(self.0 * n) }
}

impl Div for Fixed {
    type Output = Fixed;
    fn div(self, rhs: Fixed) -> Fixed {
        Fixed((self.0 as i64 * F as i64 / rhs.0 as i64) as i32)
    }
}

impl Div<i32> for Fixed {
    type Output = Fixed;
    fn div(self, n: i32) -> Fixed { Fixed(self.0 / n) }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixed({}/{})", self.0, F)
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // два знака после запятой, как в отчётах MLFQS
        let hundredths = (*self * 100).round();
        let sign = if hundredths < 0 { "-" } else { "" };
        let abs = hundredths.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}
