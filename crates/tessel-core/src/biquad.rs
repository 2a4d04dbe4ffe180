//! Biquad (bi-quadratic) filter kernel.
//!
//! Seven response types computed with the RBJ Audio EQ Cookbook formulas,
//! run through a Direct Form I second-order section.

use core::f32::consts::PI;
use libm::{cosf, powf, sinf, sqrtf};

/// Response type of a biquad filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterType {
    /// Passes frequencies below the cutoff.
    #[default]
    LowPass,
    /// Passes frequencies above the cutoff.
    HighPass,
    /// Passes a band around the center frequency.
    BandPass,
    /// Rejects a band around the center frequency.
    Notch,
    /// Boosts or cuts a band around the center frequency.
    Peaking,
    /// Boosts or cuts below the corner frequency.
    LowShelf,
    /// Boosts or cuts above the corner frequency.
    HighShelf,
}

impl FilterType {
    /// Every filter type.
    pub const ALL: [Self; 7] = [
        Self::LowPass,
        Self::HighPass,
        Self::BandPass,
        Self::Notch,
        Self::Peaking,
        Self::LowShelf,
        Self::HighShelf,
    ];

    /// Whether the gain parameter affects this response.
    pub fn uses_gain(self) -> bool {
        matches!(self, Self::Peaking | Self::LowShelf | Self::HighShelf)
    }
}

/// Biquad coefficients, normalized so that `a0 == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    /// Feedforward coefficients.
    pub b0: f32,
    /// Feedforward coefficient for `x[n-1]`.
    pub b1: f32,
    /// Feedforward coefficient for `x[n-2]`.
    pub b2: f32,
    /// Feedback coefficient for `y[n-1]`.
    pub a1: f32,
    /// Feedback coefficient for `y[n-2]`.
    pub a2: f32,
}

impl Coefficients {
    /// Coefficients of a filter that passes its input unchanged.
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Computes coefficients for `filter_type`.
    ///
    /// # Arguments
    ///
    /// * `frequency` - Cutoff, center or corner frequency in Hz
    /// * `q` - Q factor (must be positive)
    /// * `gain_db` - Gain in decibels, only used by peaking and shelving types
    /// * `sample_rate` - Sample rate in Hz
    pub fn new(filter_type: FilterType, frequency: f32, q: f32, gain_db: f32, sample_rate: f32) -> Self {
        let omega = 2.0 * PI * frequency / sample_rate;
        let cos_omega = cosf(omega);
        let alpha = sinf(omega) / (2.0 * q);

        match filter_type {
            FilterType::LowPass => Self::normalized(
                (1.0 - cos_omega) / 2.0,
                1.0 - cos_omega,
                (1.0 - cos_omega) / 2.0,
                1.0 + alpha,
                -2.0 * cos_omega,
                1.0 - alpha,
            ),
            FilterType::HighPass => Self::normalized(
                (1.0 + cos_omega) / 2.0,
                -(1.0 + cos_omega),
                (1.0 + cos_omega) / 2.0,
                1.0 + alpha,
                -2.0 * cos_omega,
                1.0 - alpha,
            ),
            FilterType::BandPass => Self::normalized(
                alpha,
                0.0,
                -alpha,
                1.0 + alpha,
                -2.0 * cos_omega,
                1.0 - alpha,
            ),
            FilterType::Notch => Self::normalized(
                1.0,
                -2.0 * cos_omega,
                1.0,
                1.0 + alpha,
                -2.0 * cos_omega,
                1.0 - alpha,
            ),
            FilterType::Peaking => {
                let a = powf(10.0, gain_db / 40.0);

                Self::normalized(
                    1.0 + alpha * a,
                    -2.0 * cos_omega,
                    1.0 - alpha * a,
                    1.0 + alpha / a,
                    -2.0 * cos_omega,
                    1.0 - alpha / a,
                )
            }
            FilterType::LowShelf => {
                let a = powf(10.0, gain_db / 40.0);
                let shelf = 2.0 * sqrtf(a) * alpha;

                Self::normalized(
                    a * ((a + 1.0) - (a - 1.0) * cos_omega + shelf),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_omega),
                    a * ((a + 1.0) - (a - 1.0) * cos_omega - shelf),
                    (a + 1.0) + (a - 1.0) * cos_omega + shelf,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_omega),
                    (a + 1.0) + (a - 1.0) * cos_omega - shelf,
                )
            }
            FilterType::HighShelf => {
                let a = powf(10.0, gain_db / 40.0);
                let shelf = 2.0 * sqrtf(a) * alpha;

                Self::normalized(
                    a * ((a + 1.0) + (a - 1.0) * cos_omega + shelf),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_omega),
                    a * ((a + 1.0) + (a - 1.0) * cos_omega - shelf),
                    (a + 1.0) - (a - 1.0) * cos_omega + shelf,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_omega),
                    (a + 1.0) - (a - 1.0) * cos_omega - shelf,
                )
            }
        }
    }

    fn normalized(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        let a0_inv = 1.0 / a0;

        Self {
            b0: b0 * a0_inv,
            b1: b1 * a0_inv,
            b2: b2 * a0_inv,
            a1: a1 * a0_inv,
            a2: a2 * a0_inv,
        }
    }
}

impl Default for Coefficients {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Direct Form I second-order section.
///
/// ```text
/// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
///                - a1*y[n-1] - a2*y[n-2]
/// ```
#[derive(Debug, Clone, Default)]
pub struct Biquad {
    coefficients: Coefficients,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    /// Creates a biquad that passes its input unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the coefficients, keeping the delay lines.
    #[inline]
    pub fn set_coefficients(&mut self, coefficients: Coefficients) {
        self.coefficients = coefficients;
    }

    /// Current coefficients.
    #[inline]
    pub fn coefficients(&self) -> &Coefficients {
        &self.coefficients
    }

    /// Processes a single sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let c = &self.coefficients;
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    /// Clears the delay lines.
    pub fn clear(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}
