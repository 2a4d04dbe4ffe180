//! Band-limited wavetables.
//!
//! A [`Wavetable`] holds `partials` single-period tables of [`SIZE`] samples
//! each. Table `k` is the sum of harmonics `1..=k + 1`, so playing a note
//! only needs to pick the table with as many harmonics as fit below the
//! Nyquist frequency.
//!
//! # Lookup
//!
//! [`Wavetable::lookup`] turns a running phase ([`WavetableState`]) and an
//! instantaneous frequency into one sample:
//!
//! 1. `|f| < 1e-7` yields `1.0`, `|f| > nyquist` yields silence.
//! 2. `max_partials = nyquist / |f|` selects two neighbouring tables, which
//!    are crossfaded by the fractional part of `max_partials` so sweeps never
//!    jump between tables.
//! 3. At or above the interpolation limit (`nyquist / (2 * SIZE)`) samples
//!    are read with linear interpolation; below it, where a period spans many
//!    output samples, with 3-point Lagrange interpolation.
//!
//! ```rust
//! use tessel_core::RenderConfig;
//! use tessel_synth::{StandardWaveforms, Waveform, WavetableState};
//!
//! let config = RenderConfig::new(44100.0, 128);
//! let waveforms = StandardWaveforms::new();
//! let mut state = WavetableState::new(&config);
//!
//! let sine = waveforms.get(Waveform::Sine).unwrap();
//! state.reset(config.sampling_period(), config.nyquist_frequency(), 441.0, 0.0);
//!
//! let first = sine.lookup(&mut state, 441.0);
//! assert!(first.abs() < 1e-6);
//! assert_eq!(sine.lookup(&mut state, 30000.0), 0.0);
//! ```

use alloc::vec;
use alloc::vec::Vec;
use core::f64::consts::{PI, TAU};

use libm::{fabs, floor, sin};
use tessel_core::{Frequency, Number, RenderConfig, Sample, Seconds, fract, lagrange_weights};

/// Samples per table. Must be a power of two.
pub const SIZE: usize = 2048;

/// Wraps table indices.
pub const MASK: usize = SIZE - 1;

/// Harmonics of the standard non-sine waveforms.
pub const PARTIALS: usize = 384;

/// Harmonics of the custom waveform.
pub const CUSTOM_PARTIALS: usize = 10;

const SIZE_FLOAT: Number = SIZE as Number;
const SIZE_INV: Number = 1.0 / SIZE_FLOAT;

/// Frequencies closer to zero than this produce a constant `1.0`.
const ALMOST_ZERO: Frequency = 0.000_000_1;

/// Maps any table position into `[0, SIZE)`, wrapping negative positions
/// around from the end.
///
/// ```rust
/// use tessel_synth::wavetable::{SIZE, wrap_around};
///
/// assert_eq!(wrap_around(10.5), 10.5);
/// assert_eq!(wrap_around(-1.0), SIZE as f64 - 1.0);
/// assert_eq!(wrap_around(SIZE as f64 + 3.0), 3.0);
/// ```
#[inline]
pub fn wrap_around(index: Number) -> Number {
    let wrapped = index - floor(index * SIZE_INV) * SIZE_FLOAT;

    // Rounding can land exactly on SIZE for tiny negative indices.
    if (0.0..SIZE_FLOAT).contains(&wrapped) {
        wrapped
    } else {
        0.0
    }
}

/// Running phase of one oscillator reading a wavetable.
#[derive(Debug, Clone, PartialEq)]
pub struct WavetableState {
    sample_index: Number,
    scale: Number,
    sampling_period: Seconds,
    nyquist_frequency: Frequency,
    interpolation_limit: Frequency,
    subharmonic_phase: Number,
}

impl WavetableState {
    /// Creates a state at phase zero for `config`'s sample rate.
    pub fn new(config: &RenderConfig) -> Self {
        let mut state = Self {
            sample_index: 0.0,
            scale: 0.0,
            sampling_period: 0.0,
            nyquist_frequency: 0.0,
            interpolation_limit: 0.0,
            subharmonic_phase: 0.0,
        };
        state.reset(config.sampling_period(), config.nyquist_frequency(), 0.0, 0.0);
        state
    }

    /// Restarts the phase.
    ///
    /// `start_time_offset` is how late the first rendered sample is relative
    /// to the exact start time; the phase is advanced accordingly.
    pub fn reset(
        &mut self,
        sampling_period: Seconds,
        nyquist_frequency: Frequency,
        frequency: Frequency,
        start_time_offset: Seconds,
    ) {
        self.sample_index = wrap_around(SIZE_FLOAT * start_time_offset * frequency);
        self.scale = SIZE_FLOAT * sampling_period;
        self.sampling_period = sampling_period;
        self.nyquist_frequency = nyquist_frequency;
        self.interpolation_limit = nyquist_frequency / (2.0 * SIZE_FLOAT);
        self.subharmonic_phase = fract(0.5 * start_time_offset * frequency);
    }

    /// Current table position.
    #[inline]
    pub fn sample_index(&self) -> Number {
        self.sample_index
    }

    /// Frequency below which Lagrange interpolation is used.
    #[inline]
    pub fn interpolation_limit(&self) -> Frequency {
        self.interpolation_limit
    }

    /// Nyquist frequency the state was reset with.
    #[inline]
    pub fn nyquist_frequency(&self) -> Frequency {
        self.nyquist_frequency
    }

    /// One sample of a sine one octave below `frequency`, advancing its own
    /// phase.
    #[inline]
    pub fn subharmonic(&mut self, frequency: Frequency) -> Sample {
        let sample = sin(TAU * self.subharmonic_phase) as Sample;
        self.subharmonic_phase = fract(self.subharmonic_phase + 0.5 * frequency * self.sampling_period);

        sample
    }
}

/// Interpolation used for one lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interpolation {
    Linear,
    Lagrange,
}

/// A set of progressively summed harmonic tables.
#[derive(Debug, Clone)]
pub struct Wavetable {
    partials: usize,
    /// `partials` tables of `SIZE` samples, back to back.
    samples: Vec<Sample>,
}

impl Wavetable {
    /// Builds `coefficients.len()` tables and normalizes them by their common
    /// peak. `coefficients[i]` is the amplitude of harmonic `i + 1`.
    ///
    /// # Panics
    ///
    /// Panics if `coefficients` is empty.
    pub fn new(coefficients: &[Number]) -> Self {
        assert!(!coefficients.is_empty(), "a wavetable needs at least one partial");

        let mut wavetable = Self {
            partials: coefficients.len(),
            samples: vec![0.0; coefficients.len() * SIZE],
        };
        wavetable.update_coefficients(coefficients, true);

        wavetable
    }

    /// Rebuilds the tables from new coefficients. Extra coefficients are
    /// ignored, missing ones count as zero.
    pub fn update_coefficients(&mut self, coefficients: &[Number], normalize: bool) {
        let sines: Vec<Number> = (0..SIZE)
            .map(|j| sin(TAU * j as Number * SIZE_INV))
            .collect();
        let mut sum = vec![0.0_f64; SIZE];
        let mut peak: Number = 0.0;

        for (partial, table) in self.samples.chunks_exact_mut(SIZE).enumerate() {
            let coefficient = coefficients.get(partial).copied().unwrap_or(0.0);
            let harmonic = partial + 1;

            if coefficient != 0.0 {
                for (j, value) in sum.iter_mut().enumerate() {
                    *value += coefficient * sines[(j * harmonic) & MASK];
                }
            }

            for (sample, &value) in table.iter_mut().zip(sum.iter()) {
                *sample = value as Sample;
                peak = peak.max(fabs(value));
            }
        }

        if normalize && peak > 0.0 {
            let scale = (1.0 / peak) as Sample;

            for sample in &mut self.samples {
                *sample *= scale;
            }
        }
    }

    /// Number of tables (and harmonics of the richest one).
    #[inline]
    pub fn partials(&self) -> usize {
        self.partials
    }

    /// The table containing harmonics `1..=index + 1`.
    #[inline]
    pub fn table(&self, index: usize) -> &[Sample] {
        let start = index.min(self.partials - 1) * SIZE;

        &self.samples[start..start + SIZE]
    }

    /// Largest absolute sample over all tables.
    pub fn peak(&self) -> Sample {
        self.samples.iter().fold(0.0, |peak, s| peak.max(s.abs()))
    }

    /// Produces one sample at `frequency` and advances the phase.
    #[inline]
    pub fn lookup(&self, state: &mut WavetableState, frequency: Frequency) -> Sample {
        self.lookup_with_phase(state, frequency, 0.0)
    }

    /// Like [`lookup`](Self::lookup), reading `phase_offset` periods ahead of
    /// the running phase.
    pub fn lookup_with_phase(
        &self,
        state: &mut WavetableState,
        frequency: Frequency,
        phase_offset: Number,
    ) -> Sample {
        let abs_frequency = fabs(frequency);

        if abs_frequency < ALMOST_ZERO {
            return 1.0;
        }

        if abs_frequency > state.nyquist_frequency {
            return 0.0;
        }

        let sample_index = if phase_offset == 0.0 {
            state.sample_index
        } else {
            wrap_around(state.sample_index + phase_offset * SIZE_FLOAT)
        };
        state.sample_index = wrap_around(state.sample_index + state.scale * frequency);

        let interpolation = if abs_frequency >= state.interpolation_limit {
            Interpolation::Linear
        } else {
            Interpolation::Lagrange
        };

        let (fewer, more, more_weight) =
            self.select_tables(state.nyquist_frequency / abs_frequency);
        let fewer_sample = self.interpolate(fewer, sample_index, interpolation);

        if fewer == more {
            return fewer_sample as Sample;
        }

        let more_sample = self.interpolate(more, sample_index, interpolation);

        (fewer_sample + more_weight * (more_sample - fewer_sample)) as Sample
    }

    /// Picks the two tables to blend and the weight of the richer one.
    ///
    /// With `max_partials = k + frac`, the tables with `k - 1` and `k`
    /// harmonics are blended, the latter weighted by `frac`. The blend is
    /// continuous in `max_partials` and never includes a harmonic above the
    /// Nyquist frequency.
    fn select_tables(&self, max_partials: Number) -> (usize, usize, Number) {
        let last = self.partials - 1;

        if max_partials >= (self.partials + 1) as Number {
            return (last, last, 0.0);
        }

        let whole = max_partials as usize;

        if whole < 2 {
            return (0, 0, 0.0);
        }

        (whole - 2, whole - 1, max_partials - whole as Number)
    }

    #[inline]
    fn interpolate(&self, table: usize, sample_index: Number, interpolation: Interpolation) -> Number {
        let table = self.table(table);
        let whole = sample_index as usize;
        let t = sample_index - whole as Number;
        let i = whole & MASK;
        let next = table[(i + 1) & MASK] as Number;
        let current = table[i] as Number;

        match interpolation {
            Interpolation::Linear => current + t * (next - current),
            Interpolation::Lagrange => {
                let previous = table[(i + MASK) & MASK] as Number;
                let (a1, a2, a3) = lagrange_weights(t);

                a1 * previous + a2 * current + a3 * next
            }
        }
    }
}

/// Waveform selector for oscillators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Waveform {
    /// Pure sine.
    #[default]
    Sine,
    /// Rising sawtooth.
    Sawtooth,
    /// Falling sawtooth.
    InverseSawtooth,
    /// Triangle.
    Triangle,
    /// Square.
    Square,
    /// Ten user-controlled harmonics.
    Custom,
}

impl Waveform {
    /// Every waveform.
    pub const ALL: [Self; 6] = [
        Self::Sine,
        Self::Sawtooth,
        Self::InverseSawtooth,
        Self::Triangle,
        Self::Square,
        Self::Custom,
    ];
}

/// Harmonic amplitudes of a sawtooth.
pub fn sawtooth_coefficients(partials: usize) -> Vec<Number> {
    (0..partials)
        .map(|i| {
            let amplitude = 2.0 / ((i + 1) as Number * PI);
            if i % 2 == 0 { amplitude } else { -amplitude }
        })
        .collect()
}

/// Harmonic amplitudes of a falling sawtooth.
pub fn inverse_sawtooth_coefficients(partials: usize) -> Vec<Number> {
    sawtooth_coefficients(partials).into_iter().map(|c| -c).collect()
}

/// Harmonic amplitudes of a triangle.
pub fn triangle_coefficients(partials: usize) -> Vec<Number> {
    (0..partials)
        .map(|i| {
            let i_pi = (i + 1) as Number * PI;
            8.0 * sin(i_pi / 2.0) / (i_pi * i_pi)
        })
        .collect()
}

/// Harmonic amplitudes of a square.
pub fn square_coefficients(partials: usize) -> Vec<Number> {
    (0..partials)
        .map(|i| {
            let plus_minus_one = if i % 2 == 0 { 1.0 } else { -1.0 };
            (1.0 + plus_minus_one) * 2.0 / ((i + 1) as Number * PI)
        })
        .collect()
}

/// The immutable tables shared by every oscillator of an engine.
#[derive(Debug, Clone)]
pub struct StandardWaveforms {
    sine: Wavetable,
    sawtooth: Wavetable,
    inverse_sawtooth: Wavetable,
    triangle: Wavetable,
    square: Wavetable,
}

impl StandardWaveforms {
    /// Builds every standard table.
    pub fn new() -> Self {
        let waveforms = Self {
            sine: Wavetable::new(&[1.0]),
            sawtooth: Wavetable::new(&sawtooth_coefficients(PARTIALS)),
            inverse_sawtooth: Wavetable::new(&inverse_sawtooth_coefficients(PARTIALS)),
            triangle: Wavetable::new(&triangle_coefficients(PARTIALS)),
            square: Wavetable::new(&square_coefficients(PARTIALS)),
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(size = SIZE, partials = PARTIALS, "standard wavetables built");

        waveforms
    }

    /// Table for `waveform`, or `None` for [`Waveform::Custom`] which every
    /// oscillator owns itself.
    pub fn get(&self, waveform: Waveform) -> Option<&Wavetable> {
        match waveform {
            Waveform::Sine => Some(&self.sine),
            Waveform::Sawtooth => Some(&self.sawtooth),
            Waveform::InverseSawtooth => Some(&self.inverse_sawtooth),
            Waveform::Triangle => Some(&self.triangle),
            Waveform::Square => Some(&self.square),
            Waveform::Custom => None,
        }
    }
}

impl Default for StandardWaveforms {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 44100.0;

    fn state(frequency: Frequency) -> WavetableState {
        let config = RenderConfig::new(SR, 128);
        let mut state = WavetableState::new(&config);
        state.reset(config.sampling_period(), config.nyquist_frequency(), frequency, 0.0);
        state
    }

    #[test]
    fn test_sine_table_matches_sine() {
        let sine = Wavetable::new(&[1.0]);

        for j in [0, 1, 512, 1000, 2047] {
            let expected = sin(TAU * j as f64 / SIZE as f64) as f32;
            assert!((sine.table(0)[j] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_tables_are_progressive_sums() {
        let wavetable = Wavetable::new(&[1.0, 0.5]);

        // Peak of sin(x) + 0.5 sin(2x) is about 1.299.
        let scale = 1.0 / 1.299_038;
        let j = 100;
        let x = TAU * j as f64 / SIZE as f64;

        assert!((f64::from(wavetable.table(0)[j]) - scale * sin(x)).abs() < 1e-4);
        assert!(
            (f64::from(wavetable.table(1)[j]) - scale * (sin(x) + 0.5 * sin(2.0 * x))).abs() < 1e-4
        );
    }

    #[test]
    fn test_standard_tables_are_normalized() {
        let waveforms = StandardWaveforms::new();

        for waveform in Waveform::ALL {
            if let Some(wavetable) = waveforms.get(waveform) {
                let peak = wavetable.peak();
                assert!(peak <= 1.0 + 1e-6, "{waveform:?} peak {peak}");
                assert!(peak > 0.99, "{waveform:?} peak {peak}");
            }
        }
    }

    #[test]
    fn test_zero_coefficients_stay_silent() {
        let custom = Wavetable::new(&[0.0; CUSTOM_PARTIALS]);

        assert_eq!(custom.peak(), 0.0);
    }

    #[test]
    fn test_update_coefficients_without_normalization() {
        let mut custom = Wavetable::new(&[0.0; CUSTOM_PARTIALS]);
        custom.update_coefficients(&[0.5], false);

        assert!((custom.peak() - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_wrap_around() {
        assert_eq!(wrap_around(0.0), 0.0);
        assert_eq!(wrap_around(-0.5), SIZE_FLOAT - 0.5);
        assert_eq!(wrap_around(3.0 * SIZE_FLOAT + 1.25), 1.25);
        assert_eq!(wrap_around(-1e-20), 0.0);
    }

    #[test]
    fn test_lookup_edge_frequencies() {
        let sine = Wavetable::new(&[1.0]);
        let mut state = state(100.0);

        assert_eq!(sine.lookup(&mut state, 0.0), 1.0);
        assert_eq!(sine.lookup(&mut state, -5e-8), 1.0);
        assert_eq!(sine.lookup(&mut state, SR / 2.0 + 1.0), 0.0);
        assert_eq!(sine.lookup(&mut state, -SR), 0.0);
    }

    #[test]
    fn test_lookup_follows_sine() {
        let sine = Wavetable::new(&[1.0]);
        let frequency = 441.0;
        let mut state = state(frequency);

        for n in 0..200 {
            let expected = sin(TAU * frequency * n as f64 / SR) as f32;
            let actual = sine.lookup(&mut state, frequency);
            assert!((actual - expected).abs() < 1e-4, "sample {n}: {actual} vs {expected}");
        }
    }

    #[test]
    fn test_negative_frequency_runs_backwards() {
        let sine = Wavetable::new(&[1.0]);
        let mut state = state(441.0);

        sine.lookup(&mut state, -441.0);
        let second = sine.lookup(&mut state, -441.0);

        assert!(second < 0.0);
        assert!(state.sample_index() > SIZE_FLOAT / 2.0);
    }

    #[test]
    fn test_phase_offset_reads_ahead() {
        let sine = Wavetable::new(&[1.0]);
        let mut state = state(441.0);

        let quarter = sine.lookup_with_phase(&mut state, 441.0, 0.25);

        assert!((quarter - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_select_tables_is_continuous() {
        let wavetable = Wavetable::new(&sawtooth_coefficients(8));

        assert_eq!(wavetable.select_tables(1.5), (0, 0, 0.0));
        assert_eq!(wavetable.select_tables(20.0), (7, 7, 0.0));

        let (fewer, more, weight) = wavetable.select_tables(3.25);
        assert_eq!((fewer, more), (1, 2));
        assert!((weight - 0.25).abs() < 1e-12);

        // Just below and at an integer the effective mix is the same table.
        let (_, below_more, below_weight) = wavetable.select_tables(4.0 - 1e-9);
        let (at_fewer, _, at_weight) = wavetable.select_tables(4.0);
        assert_eq!(below_more, at_fewer);
        assert!(below_weight > 0.999_999);
        assert_eq!(at_weight, 0.0);
    }

    #[test]
    fn test_sawtooth_has_no_aliasing_partials() {
        let waveforms = StandardWaveforms::new();
        let saw = waveforms.get(Waveform::Sawtooth).unwrap();
        let frequency = 5000.0;
        let (_, more, _) = saw.select_tables(SR / 2.0 / frequency);

        // 4.41 representable harmonics: richest table used has 4.
        assert_eq!(more + 1, 4);
    }

    #[test]
    fn test_subharmonic_runs_an_octave_below() {
        let mut state = state(100.0);
        let mut crossings = 0;
        let mut previous = state.subharmonic(100.0);

        for _ in 0..44100 {
            let sample = state.subharmonic(100.0);
            if previous < 0.0 && sample >= 0.0 {
                crossings += 1;
            }
            previous = sample;
        }

        assert!((49..=51).contains(&crossings), "crossings: {crossings}");
    }
}
