// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The escape-time kernel.
//!
//! A Julia set fixes the constant `c` and varies the starting point
//! `z`; each pixel is iterated under `z = z * z + c` until its squared
//! modulus exceeds 4.0 or the iteration cap is reached.  The number
//! of iterations survived is the value stored in the raster.

use num::Complex;

/// The value stored in place of an iteration count to mark the first
/// row of each chunk in a reference raster.  No real count can reach
/// it, since iteration caps are bounded well below `u32::MAX`.
pub const BOUNDARY: u32 = u32::MAX;

/// Iterate `z` under `z * z + c` at most `max_iter` times.  Returns
/// the index of the first iteration whose result has a squared
/// modulus strictly greater than 4.0, or `max_iter` if the orbit
/// never leaves the circle.
///
/// Pure and allocation free; the same inputs always yield the same
/// count.
#[inline]
pub fn escape(z: Complex<f64>, c: Complex<f64>, max_iter: u32) -> u32 {
    let mut z = z;
    for i in 0..max_iter {
        z = z * z + c;
        if z.norm_sqr() > 4.0 {
            return i;
        }
    }
    max_iter
}

#[cfg(test)]
mod tests {
    use super::*;

    const C: Complex<f64> = Complex {
        re: -0.7,
        im: 0.27015,
    };

    #[test]
    fn origin_is_deterministic_and_bounded() {
        let z = Complex::new(0.0, 0.0);
        let first = escape(z, C, 10_000);
        assert!(first <= 10_000);
        for _ in 0..5 {
            assert_eq!(escape(z, C, 10_000), first);
        }
    }

    #[test]
    fn fixed_point_hits_the_cap() {
        let zero = Complex::new(0.0, 0.0);
        assert_eq!(escape(zero, zero, 10_000), 10_000);
    }

    #[test]
    fn far_point_escapes_on_first_iteration() {
        assert_eq!(escape(Complex::new(3.0, 0.0), Complex::new(0.0, 0.0), 100), 0);
    }

    #[test]
    fn modulus_of_exactly_two_is_not_escaped() {
        // z = 2 with c = -2 maps to 2 forever: |z|^2 == 4.0 never
        // exceeds the threshold.
        let z = Complex::new(2.0, 0.0);
        let c = Complex::new(-2.0, 0.0);
        assert_eq!(escape(z, c, 50), 50);
        // Nudging c pushes the orbit over the edge after one step.
        assert_eq!(escape(z, Complex::new(-1.5, 0.0), 50), 0);
    }

    #[test]
    fn zero_cap_returns_zero() {
        assert_eq!(escape(Complex::new(0.0, 0.0), C, 0), 0);
    }

    #[test]
    fn matches_the_expanded_recurrence() {
        // Hand-rolled x/y form of the same recurrence.
        fn by_parts(mut x: f64, mut y: f64, cx: f64, cy: f64, max_iter: u32) -> u32 {
            for i in 0..max_iter {
                let xtemp = x * x - y * y + cx;
                y = 2.0 * x * y + cy;
                x = xtemp;
                if x * x + y * y > 4.0 {
                    return i;
                }
            }
            max_iter
        }
        for &(x, y) in &[(0.1, 0.2), (-0.9, 0.3), (1.2, -0.4), (0.0, 0.0), (-0.35, 0.61)] {
            assert_eq!(
                escape(Complex::new(x, y), C, 1000),
                by_parts(x, y, C.re, C.im, 1000)
            );
        }
    }
}
