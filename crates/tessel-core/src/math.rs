//! Mathematical helpers for the voice engine.
//!
//! All functions are allocation-free and `no_std` compatible (`libm` only).
//!
//! # Pitch
//!
//! - [`detune`] - Shift a frequency by cents
//! - [`midi_note_frequency`] - 12-TET frequency of a MIDI note
//!
//! # Randomness
//!
//! - [`randomize`] - Deterministic hash of a number into `[0, level)`
//!
//! # Shaping
//!
//! - [`fold`] - Triangle wavefolder
//! - [`lagrange_weights`] - 3-point Lagrange coefficients

use libm::{exp2, fabs, floor};

use crate::signal::{Frequency, Number};

/// Cents per octave.
pub const CENTS_PER_OCTAVE: Number = 1200.0;

/// Values below this are treated as silence or "no change".
pub const INSIGNIFICANT: Number = 0.000_001;

/// Shift `frequency` by `cents` (`f * 2^(cents / 1200)`).
///
/// # Example
/// ```rust
/// use tessel_core::detune;
///
/// assert!((detune(440.0, 1200.0) - 880.0).abs() < 1e-9);
/// assert!((detune(440.0, -1200.0) - 220.0).abs() < 1e-9);
/// ```
#[inline]
pub fn detune(frequency: Frequency, cents: Number) -> Frequency {
    frequency * exp2(cents / CENTS_PER_OCTAVE)
}

/// 12-TET frequency of `note` with A4 (note 69) tuned to `reference`.
#[inline]
pub fn midi_note_frequency(note: u8, reference: Frequency) -> Frequency {
    reference * exp2((Number::from(note) - 69.0) / 12.0)
}

/// Whether `a` and `b` differ by less than `threshold`.
#[inline]
pub fn is_close(a: Number, b: Number, threshold: Number) -> bool {
    fabs(a - b) < threshold
}

/// Whether `|x|` is below `threshold`.
#[inline]
pub fn is_abs_small(x: Number, threshold: Number) -> bool {
    fabs(x) < threshold
}

/// Clamps `x` into `[min, max]`.
#[inline]
pub fn clamp(x: Number, min: Number, max: Number) -> Number {
    if x < min {
        min
    } else if x > max {
        max
    } else {
        x
    }
}

/// Linear interpolation between `a` and `b`.
#[inline]
pub fn lerp(a: Number, b: Number, t: Number) -> Number {
    a + (b - a) * t
}

/// Deterministic pseudo-random value in `[0, level)` keyed by `number`.
///
/// Hashes the bit pattern of `number` with the SplitMix64 finalizer, so the
/// same input always yields the same output, and feeding the output back in
/// produces a reproducible sequence.
///
/// # Example
/// ```rust
/// use tessel_core::randomize;
///
/// let a = randomize(1.0, 0.25);
/// assert_eq!(a, randomize(1.0, 0.25));
/// assert!((0.0..1.0).contains(&a));
/// ```
pub fn randomize(level: Number, number: Number) -> Number {
    const SALT: u64 = 0x9e37_79b9_7f4a_7c15;
    const UNIT: Number = 1.0 / (1_u64 << 53) as Number;

    let mut x = number.to_bits().wrapping_add(SALT);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^= x >> 31;

    level * ((x >> 11) as Number * UNIT)
}

/// Triangle wavefolder mapping any input into `[-1, 1]`.
///
/// Identity on `[-1, 1]`; beyond that the signal is reflected back, with a
/// period of 4.
#[inline]
pub fn fold(x: f32) -> f32 {
    let shifted = x + 1.0;
    let wrapped = shifted - 4.0 * libm::floorf(shifted * 0.25);

    1.0 - libm::fabsf(wrapped - 2.0)
}

/// Fractional part, always in `[0, 1)` for finite input.
#[inline]
pub fn fract(x: Number) -> Number {
    x - floor(x)
}

/// Weights of 3-point Lagrange interpolation over nodes at `-1, 0, 1`,
/// evaluated at `t`.
#[inline]
pub fn lagrange_weights(t: Number) -> (Number, Number, Number) {
    let t_sqr = t * t;

    (0.5 * (t_sqr - t), 1.0 - t_sqr, 0.5 * (t_sqr + t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detune_octaves() {
        assert!((detune(100.0, 0.0) - 100.0).abs() < 1e-12);
        assert!((detune(100.0, 2400.0) - 400.0).abs() < 1e-9);
        assert!((detune(100.0, 100.0) - 105.946_309_435_929_5).abs() < 1e-6);
    }

    #[test]
    fn test_midi_note_frequency() {
        assert!((midi_note_frequency(69, 440.0) - 440.0).abs() < 1e-9);
        assert!((midi_note_frequency(81, 440.0) - 880.0).abs() < 1e-9);
        assert!((midi_note_frequency(69, 432.0) - 432.0).abs() < 1e-9);
        assert!((midi_note_frequency(60, 440.0) - 261.625_565).abs() < 1e-5);
    }

    #[test]
    fn test_randomize_is_deterministic_and_bounded() {
        let mut x = 0.5;

        for _ in 0..1000 {
            let next = randomize(1.0, x);
            assert_eq!(next, randomize(1.0, x));
            assert!((0.0..1.0).contains(&next), "out of range: {next}");
            x = next;
        }
    }

    #[test]
    fn test_randomize_scales_with_level() {
        let r = randomize(1.0, 0.123);
        assert!((randomize(3.0, 0.123) - 3.0 * r).abs() < 1e-12);
    }

    #[test]
    fn test_fold_identity_inside_unit_range() {
        for x in [-1.0_f32, -0.5, 0.0, 0.25, 0.99] {
            assert!((fold(x) - x).abs() < 1e-6, "fold({x}) = {}", fold(x));
        }
    }

    #[test]
    fn test_fold_reflects() {
        assert!((fold(1.5) - 0.5).abs() < 1e-6);
        assert!((fold(-1.5) + 0.5).abs() < 1e-6);
        assert!((fold(3.0) + 1.0).abs() < 1e-6);
        assert!((fold(5.0) - 1.0).abs() < 1e-6);

        for i in -100..100 {
            let y = fold(i as f32 * 0.37);
            assert!((-1.0..=1.0).contains(&y));
        }
    }

    #[test]
    fn test_lagrange_weights_sum_to_one() {
        for t in [0.0, 0.1, 0.5, 0.9] {
            let (a, b, c) = lagrange_weights(t);
            assert!((a + b + c - 1.0).abs() < 1e-12);
        }

        assert_eq!(lagrange_weights(0.0), (0.0, 1.0, 0.0));
    }

    #[test]
    fn test_clamp_and_closeness() {
        assert_eq!(clamp(2.0, -1.0, 1.0), 1.0);
        assert_eq!(clamp(-2.0, -1.0, 1.0), -1.0);
        assert_eq!(clamp(0.3, -1.0, 1.0), 0.3);
        assert!(is_close(1.0, 1.000_000_1, INSIGNIFICANT));
        assert!(!is_close(1.0, 1.1, INSIGNIFICANT));
        assert!(is_abs_small(-1e-8, 1e-7));
    }
}
