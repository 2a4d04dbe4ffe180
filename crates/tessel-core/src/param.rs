//! Shared parameter definitions.
//!
//! A [`ParamLeader`] is the canonical state of one knob: its range, current
//! value and optional [`Envelope`]. Leaders are owned by whoever owns the
//! voices and mutated only from outside the render path; voices read them by
//! reference and keep their own [`FloatParam`](crate::FloatParam) copies for
//! per-note trajectories.
//!
//! [`DiscreteParam`] holds enumerated settings (waveform, filter type,
//! tuning) that have no trajectory at all.

use libm::{exp2, log2, round};

use crate::envelope::Envelope;
use crate::math::clamp;
use crate::signal::Number;

/// The canonical, shared state of a continuous parameter.
///
/// # Example
///
/// ```rust
/// use tessel_core::{Envelope, ParamLeader};
///
/// let mut cutoff = ParamLeader::new(1.0, 24000.0, 1000.0);
/// cutoff.set_logarithmic(true);
/// cutoff.set_envelope(Some(Envelope::new()));
///
/// assert!(cutoff.has_envelope());
/// assert!((cutoff.ratio_to_value(0.0) - 1.0).abs() < 1e-9);
/// assert!((cutoff.ratio_to_value(1.0) - 24000.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ParamLeader {
    min: Number,
    max: Number,
    default: Number,
    value: Number,
    round_to: Number,
    envelope: Option<Envelope>,
    logarithmic: bool,
    change_index: u32,
}

impl ParamLeader {
    /// Creates a leader with a linear range and no envelope.
    pub fn new(min: Number, max: Number, default: Number) -> Self {
        let default = clamp(default, min, max);

        Self {
            min,
            max,
            default,
            value: default,
            round_to: 0.0,
            envelope: None,
            logarithmic: false,
            change_index: 0,
        }
    }

    /// Makes every assigned value snap to a multiple of `step`.
    pub fn with_rounding(mut self, step: Number) -> Self {
        self.round_to = step.max(0.0);
        self.value = self.rounded(self.value);
        self.default = self.rounded(self.default);
        self
    }

    /// Attaches `envelope` from the start.
    pub fn with_envelope(mut self, envelope: Envelope) -> Self {
        self.envelope = Some(envelope);
        self
    }

    /// Lowest value.
    #[inline]
    pub fn min(&self) -> Number {
        self.min
    }

    /// Highest value.
    #[inline]
    pub fn max(&self) -> Number {
        self.max
    }

    /// Value after construction or [`reset`](Self::reset).
    #[inline]
    pub fn default_value(&self) -> Number {
        self.default
    }

    /// Current value.
    #[inline]
    pub fn value(&self) -> Number {
        self.value
    }

    /// Sets the value, clamped into range and rounded.
    pub fn set_value(&mut self, value: Number) {
        self.value = self.rounded(clamp(value, self.min, self.max));
        self.touch();
    }

    /// Current value as a ratio of the range.
    pub fn ratio(&self) -> Number {
        self.value_to_ratio(self.value)
    }

    /// Sets the value from a ratio of the range.
    pub fn set_ratio(&mut self, ratio: Number) {
        self.set_value(self.ratio_to_value(ratio));
    }

    /// Maps a ratio in `[0, 1]` to a value, linearly or logarithmically.
    pub fn ratio_to_value(&self, ratio: Number) -> Number {
        let ratio = clamp(ratio, 0.0, 1.0);

        if self.logarithmic {
            self.min * exp2(log2(self.max / self.min) * ratio)
        } else {
            self.min + (self.max - self.min) * ratio
        }
    }

    /// Maps a value to its ratio of the range.
    pub fn value_to_ratio(&self, value: Number) -> Number {
        let value = clamp(value, self.min, self.max);

        if self.logarithmic {
            log2(value / self.min) / log2(self.max / self.min)
        } else if self.max > self.min {
            (value - self.min) / (self.max - self.min)
        } else {
            0.0
        }
    }

    /// Envelope attached to the parameter, if any.
    #[inline]
    pub fn envelope(&self) -> Option<&Envelope> {
        self.envelope.as_ref()
    }

    /// Whether an envelope is attached.
    #[inline]
    pub fn has_envelope(&self) -> bool {
        self.envelope.is_some()
    }

    /// Attaches or detaches an envelope.
    pub fn set_envelope(&mut self, envelope: Option<Envelope>) {
        self.envelope = envelope.map(Envelope::clamped);
        self.touch();
    }

    /// Whether ratios and ramps use a logarithmic scale.
    #[inline]
    pub fn is_logarithmic(&self) -> bool {
        self.logarithmic
    }

    /// Switches between linear and logarithmic scaling. Only ranges with a
    /// positive minimum can be logarithmic.
    pub fn set_logarithmic(&mut self, logarithmic: bool) {
        self.logarithmic = logarithmic && self.min > 0.0;
        self.touch();
    }

    /// Incremented on every change.
    #[inline]
    pub fn change_index(&self) -> u32 {
        self.change_index
    }

    /// Restores the default value and detaches the envelope.
    pub fn reset(&mut self) {
        self.value = self.default;
        self.envelope = None;
        self.touch();
    }

    fn rounded(&self, value: Number) -> Number {
        if self.round_to > 0.0 {
            round(value / self.round_to) * self.round_to
        } else {
            value
        }
    }

    fn touch(&mut self) {
        self.change_index = self.change_index.wrapping_add(1);
    }
}

/// An enumerated setting shared by voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscreteParam<T: Copy> {
    default: T,
    value: T,
    change_index: u32,
}

impl<T: Copy + PartialEq> DiscreteParam<T> {
    /// Creates a parameter holding `default`.
    pub const fn new(default: T) -> Self {
        Self {
            default,
            value: default,
            change_index: 0,
        }
    }

    /// Current value.
    #[inline]
    pub fn value(&self) -> T {
        self.value
    }

    /// Sets the value.
    pub fn set_value(&mut self, value: T) {
        if self.value != value {
            self.value = value;
            self.change_index = self.change_index.wrapping_add(1);
        }
    }

    /// Incremented on every change.
    #[inline]
    pub fn change_index(&self) -> u32 {
        self.change_index
    }

    /// Restores the default value.
    pub fn reset(&mut self) {
        self.set_value(self.default);
    }
}

/// How a parameter resolved for one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamBlock {
    /// The value does not change during the block.
    Constant(Number),
    /// The value changes; read the rendered buffer.
    Varying,
}

impl ParamBlock {
    /// The constant value, if any.
    #[inline]
    pub fn constant(self) -> Option<Number> {
        match self {
            Self::Constant(value) => Some(value),
            Self::Varying => None,
        }
    }
}
