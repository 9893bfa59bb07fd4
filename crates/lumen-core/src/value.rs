//! Runtime value representation.
//!
//! Only double-precision numbers exist for now. The type stays opaque so that
//! tagged variants can be added without touching the chunk or the compiler.

use core::{
    fmt,
    ops::{Add, Div, Mul, Neg, Sub},
};

#[cfg(feature = "serde")]
use serde::Serialize;

/// A runtime value.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(transparent))]
pub struct Value(f64);

impl Value {
    /// Wrap a number.
    pub const fn number(n: f64) -> Self { Self(n) }

    /// Underlying number.
    pub const fn as_f64(self) -> f64 { self.0 }

    /// Bitwise identity (distinguishes `0.0` from `-0.0`, treats equal NaNs as equal).
    pub fn same_bits(self, other: Self) -> bool { self.0.to_bits() == other.0.to_bits() }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self { Self(n) }
}

impl Add for Value {
    type Output = Self;
    fn add(self, rhs: Self) -> Self { Self(self.0 + rhs.0) }
}

impl Sub for Value {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self { Self(self.0 - rhs.0) }
}

impl Mul for Value {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self { Self(self.0 * rhs.0) }
}

impl Div for Value {
    type Output = Self;
    fn div(self, rhs: Self) -> Self { Self(self.0 / rhs.0) }
}

impl Neg for Value {
    type Output = Self;
    fn neg(self) -> Self { Self(-self.0) }
}

/// Formats like C's `%g`: six significant digits, trailing zeros trimmed,
/// scientific notation when the exponent is below -4 or at least 6.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        if v.is_nan() {
            return f.write_str("nan");
        }
        if v.is_infinite() {
            return f.write_str(if v > 0.0 { "inf" } else { "-inf" });
        }
        if v == 0.0 {
            return f.write_str(if v.is_sign_negative() { "-0" } else { "0" });
        }

        // L'exposant retenu est celui de l'écriture scientifique arrondie
        // (999999.7 s'affiche 1e+06, pas 1000000).
        let sci = format!("{v:.5e}");
        let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
        let exp: i32 = exponent.parse().unwrap_or(0);
        if (-4..6).contains(&exp) {
            #[allow(clippy::cast_sign_loss)]
            let decimals = (5 - exp) as usize;
            let fixed = format!("{v:.decimals$}");
            f.write_str(trim_fraction(&fixed))
        } else {
            // Rust rend `1.23457e6` : on normalise en `1.23457e+06`.
            let sign = if exp < 0 { '-' } else { '+' };
            write!(f, "{}e{sign}{:02}", trim_fraction(mantissa), exp.unsigned_abs())
        }
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
