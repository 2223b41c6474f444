//! Integer reciprocal and arc-cosine approximations.
//!
//! Each routine has a portable reference path and a cheaper variant for
//! small cores. Variants satisfy the same contract as their reference and are
//! tested against it.

use core::f32::consts::{FRAC_PI_2, PI};

use libm::acosf;
use serde::Deserialize;

/// Fixed-point one used by [`integer_reciprocal`] (2^24).
pub const RECIPROCAL_ONE: u32 = 1 << 24;

/// `floor(2^24 / d)`, saturating to 2^24 when `d == 0`.
///
/// 16-bit targets without a hardware divider use the table-seeded
/// Newton-Raphson path; everything else divides.
#[inline]
pub fn integer_reciprocal(d: u32) -> u32 {
    #[cfg(target_pointer_width = "16")]
    {
        reciprocal_table(d)
    }
    #[cfg(not(target_pointer_width = "16"))]
    {
        reciprocal_div(d)
    }
}

/// Reference reciprocal using hardware division.
#[inline]
pub const fn reciprocal_div(d: u32) -> u32 {
    if d == 0 {
        RECIPROCAL_ONE
    } else {
        RECIPROCAL_ONE / d
    }
}

/// Top-8-bit inverse estimates for divisors normalized to `[2^23, 2^24)`.
const INV_TAB: [u8; 256] = [
    255, 253, 252, 250, 248, 246, 244, 242, 240, 238, 236, 234, 233, 231, 229, 227,
    225, 224, 222, 220, 218, 217, 215, 213, 212, 210, 208, 207, 205, 203, 202, 200,
    199, 197, 195, 194, 192, 191, 189, 188, 186, 185, 183, 182, 180, 179, 178, 176,
    175, 173, 172, 170, 169, 168, 166, 165, 164, 162, 161, 160, 158, 157, 156, 154,
    153, 152, 151, 149, 148, 147, 146, 144, 143, 142, 141, 139, 138, 137, 136, 135,
    134, 132, 131, 130, 129, 128, 127, 126, 125, 123, 122, 121, 120, 119, 118, 117,
    116, 115, 114, 113, 112, 111, 110, 109, 108, 107, 106, 105, 104, 103, 102, 101,
    100, 99, 98, 97, 96, 95, 94, 93, 92, 91, 90, 89, 88, 88, 87, 86,
    85, 84, 83, 82, 81, 80, 80, 79, 78, 77, 76, 75, 74, 74, 73, 72,
    71, 70, 70, 69, 68, 67, 66, 66, 65, 64, 63, 62, 62, 61, 60, 59,
    59, 58, 57, 56, 56, 55, 54, 53, 53, 52, 51, 50, 50, 49, 48, 48,
    47, 46, 46, 45, 44, 43, 43, 42, 41, 41, 40, 39, 39, 38, 37, 37,
    36, 35, 35, 34, 33, 33, 32, 32, 31, 30, 30, 29, 28, 28, 27, 27,
    26, 25, 25, 24, 24, 23, 22, 22, 21, 21, 20, 19, 19, 18, 18, 17,
    17, 16, 15, 15, 14, 14, 13, 13, 12, 12, 11, 10, 10, 9, 9, 8,
    8, 7, 7, 6, 6, 5, 5, 4, 4, 3, 3, 2, 2, 1, 0, 0,
];

/// Divisors up to this value are answered from [`SMALL_INV`]; they would
/// need a second Newton-Raphson step.
const SMALL_DIVISOR_MAX: u32 = 110;

const SMALL_INV: [u32; SMALL_DIVISOR_MAX as usize + 1] = small_inverse_table();

const fn small_inverse_table() -> [u32; SMALL_DIVISOR_MAX as usize + 1] {
    let mut table = [0u32; SMALL_DIVISOR_MAX as usize + 1];
    table[0] = RECIPROCAL_ONE;
    let mut i = 1;
    while i < table.len() {
        table[i] = RECIPROCAL_ONE / i as u32;
        i += 1;
    }
    table
}

/// Division-free reciprocal: table seed plus one Newton-Raphson step.
///
/// Exactly equal to [`reciprocal_div`] for every input.
pub fn reciprocal_table(d: u32) -> u32 {
    if d <= SMALL_DIVISOR_MAX {
        return SMALL_INV[d as usize];
    }
    if d >= RECIPROCAL_ONE {
        return u32::from(d == RECIPROCAL_ONE);
    }

    // Normalize so bit 23 is set, remembering the shift.
    let mut shift = 0u32;
    let mut nr = d;
    if nr & 0xFF_0000 == 0 {
        nr <<= 8;
        shift += 8;
        if nr & 0xFF_0000 == 0 {
            nr <<= 8;
            shift += 8;
        }
    }
    if nr & 0xF0_0000 == 0 {
        nr <<= 4;
        shift += 4;
    }
    if nr & 0xC0_0000 == 0 {
        nr <<= 2;
        shift += 2;
    }
    if nr & 0x80_0000 == 0 {
        nr <<= 1;
        shift += 1;
    }

    // Nine significant bits seed the estimate; bit 8 of the seed is implicit.
    let seed = u32::from(INV_TAB[((nr >> 15) & 0xFF) as usize]) + 256;
    let mut x = if shift <= 8 {
        seed >> (8 - shift)
    } else {
        seed << (shift - 8)
    };

    let two_minus = (1u32 << 25).wrapping_sub(x.wrapping_mul(d));
    x = ((u64::from(x) * u64::from(two_minus)) >> 24) as u32;

    let remainder = RECIPROCAL_ONE.wrapping_sub(x.wrapping_mul(d));
    if remainder >= d {
        x += 1;
    }
    x
}

/// Arc-cosine evaluation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcosMethod {
    /// libm `acosf`.
    Exact,
    /// Seventh-order MinMax polynomial for `asin` on `[0, 1]`.
    #[default]
    Polynomial,
    /// 15-segment piecewise-linear table, finer toward `|x| = 1`.
    Table,
}

impl AcosMethod {
    /// Maximum absolute error in radians over `[-1, 1]`.
    pub const fn error_bound(self) -> f32 {
        match self {
            AcosMethod::Exact => 1.0e-6,
            AcosMethod::Polynomial => 0.033,
            AcosMethod::Table => 0.011,
        }
    }
}

/// `acos(x)` for `x` in `[-1, 1]` using the given method.
#[inline]
pub fn acos_approx(method: AcosMethod, x: f32) -> f32 {
    match method {
        AcosMethod::Exact => acosf(x.clamp(-1.0, 1.0)),
        AcosMethod::Polynomial => acos_polynomial(x),
        AcosMethod::Table => acos_table(x),
    }
}

/// Polynomial arc-cosine, error at most 0.033 rad.
#[allow(clippy::excessive_precision)]
pub fn acos_polynomial(x: f32) -> f32 {
    let (sign, t) = if x < 0.0 { (-1.0, -x) } else { (1.0, x) };
    let t = t.min(1.0);
    let asin = 0.032843707
        + t * (-1.451838349
            + t * (29.66153956
                + t * (-131.1123477 + t * (262.8130562 + t * (-242.7199627 + t * 84.31466202)))));
    FRAC_PI_2 - sign * asin
}

#[allow(clippy::excessive_precision)]
const ACOS_LUT_K: [f32; 15] = [
    -1.03146219, -1.30760407, -1.75205469, -2.41705418, -3.37768555, -4.74888229, -6.69648552,
    -9.45659828, -13.3640289, -18.8927879, -26.7136307, -37.7754059, -53.4200745, -75.5457306,
    0.0,
];

#[allow(clippy::excessive_precision)]
const ACOS_LUT_B: [f32; 15] = [
    1.57079637, 1.70886743, 2.04220533, 2.62408018, 3.52467203, 4.85301876, 6.77019119,
    9.50873947, 13.4009094, 18.9188652, 26.7320709, 37.7884521, 53.4292908, 75.5522461, 0.0,
];

/// Table arc-cosine, error at most 0.011 rad.
///
/// Segment `i` covers `1 - t` in `[2^-(i+1), 2^-i)`, picked with one
/// leading-zero count.
pub fn acos_table(x: f32) -> f32 {
    let t = x.abs().min(1.0);
    let idx = if t == 0.0 {
        0
    } else {
        let scaled = ((1.0 - t) * 32768.0) as u32;
        (scaled.leading_zeros() as usize)
            .saturating_sub(17)
            .min(ACOS_LUT_K.len() - 1)
    };
    let theta = t * ACOS_LUT_K[idx] + ACOS_LUT_B[idx];
    if x < 0.0 {
        PI - theta
    } else {
        theta
    }
}
