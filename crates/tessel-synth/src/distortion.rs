//! Carrier saturation with first-order antiderivative anti-aliasing.
//!
//! The shaper is `f(x) = tanh(s·x / 2)` with a fixed steepness `s`. Instead
//! of evaluating it directly, each output sample is the average of `f` over
//! the segment between consecutive inputs:
//!
//! ```text
//! y[n] = (F(x[n]) - F(x[n-1])) / (x[n] - x[n-1])
//! F(x) = |x| + (2/s)·ln(1 + e^(-s|x|))
//! ```
//!
//! falling back to `f` at the midpoint when the inputs are nearly equal. The
//! shaped signal is mixed with the input by the level parameter.

use libm::{exp, fabs, log1p, tanh};
use tessel_core::{
    FloatParam, Number, ParamBlock, ParamLeader, RenderConfig, Round, Sample, SignalProducer,
};

/// Steepness of the shaping curve.
pub const STEEPNESS: Number = 10.0;

/// Levels below this leave the signal untouched.
const LEVEL_EPSILON: Number = 0.000_001;

/// Input deltas below this use the midpoint fallback.
const DELTA_EPSILON: Number = 0.000_000_1;

#[inline]
fn shape(x: Number) -> Number {
    tanh(STEEPNESS * x * 0.5)
}

/// Close to `|x|`; differences of it need `Number` precision.
#[inline]
fn shape_antiderivative(x: Number) -> Number {
    let x = fabs(x);

    x + (2.0 / STEEPNESS) * log1p(exp(-STEEPNESS * x))
}

/// Saturation stage.
#[derive(Debug, Clone)]
pub struct Distortion {
    pub(crate) level: FloatParam,
    level_block: ParamBlock,
    previous_input: Number,
    previous_antiderivative: Number,
}

impl Distortion {
    /// Creates a distortion whose level follows `level_leader`.
    pub fn new(config: &RenderConfig, level_leader: &ParamLeader) -> Self {
        Self {
            level: FloatParam::follower_of(config, level_leader),
            level_block: ParamBlock::Constant(level_leader.value()),
            previous_input: 0.0,
            previous_antiderivative: shape_antiderivative(0.0),
        }
    }

    #[inline]
    fn distort(&mut self, input: Sample) -> Sample {
        let input = Number::from(input);
        let delta = input - self.previous_input;
        let antiderivative = shape_antiderivative(input);

        let output = if fabs(delta) < DELTA_EPSILON {
            shape((input + self.previous_input) * 0.5)
        } else {
            (antiderivative - self.previous_antiderivative) / delta
        };

        self.previous_input = input;
        self.previous_antiderivative = antiderivative;

        output as Sample
    }
}

impl SignalProducer<ParamLeader> for Distortion {
    fn initialize_rendering(&mut self, round: Round, sample_count: usize, level_leader: &ParamLeader) {
        self.level_block = self
            .level
            .produce_if_not_constant(round, sample_count, Some(level_leader));
    }

    fn render(&mut self, buffer: &mut [Sample]) {
        match self.level_block {
            ParamBlock::Constant(level) if level < LEVEL_EPSILON => {
                // Keep the history current so re-enabling does not click.
                if let Some(&last) = buffer.last() {
                    self.previous_input = Number::from(last);
                    self.previous_antiderivative = shape_antiderivative(self.previous_input);
                }
            }
            ParamBlock::Constant(level) => {
                let level = level as Sample;

                for sample in buffer.iter_mut() {
                    let input = *sample;
                    *sample = level * self.distort(input) + (1.0 - level) * input;
                }
            }
            ParamBlock::Varying => {
                for (i, sample) in buffer.iter_mut().enumerate() {
                    let level = self.level.buffer()[i];
                    let input = *sample;
                    *sample = level * self.distort(input) + (1.0 - level) * input;
                }
            }
        }
    }

    fn reset(&mut self) {
        self.level.reset();
        self.level_block = ParamBlock::Constant(self.level.value(None));
        self.previous_input = 0.0;
        self.previous_antiderivative = shape_antiderivative(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RenderConfig {
        RenderConfig::new(44100.0, 64)
    }

    fn sine(amplitude: Sample) -> Vec<Sample> {
        (0..64)
            .map(|i| amplitude * libm::sinf(2.0 * core::f32::consts::PI * i as Sample / 64.0))
            .collect()
    }

    #[test]
    fn test_antiderivative_matches_shape() {
        for x in [-2.0, -0.3, 0.1, 0.7, 1.5] {
            let h = 1e-4;
            let slope = (shape_antiderivative(x + h) - shape_antiderivative(x - h)) / (2.0 * h);
            assert!((slope - shape(x)).abs() < 1e-5, "x = {x}: {slope} vs {}", shape(x));
        }
    }

    #[test]
    fn test_zero_level_is_identity() {
        let leader = ParamLeader::new(0.0, 1.0, 0.0);
        let mut distortion = Distortion::new(&config(), &leader);
        let input = sine(0.8);
        let mut buffer = input.clone();

        distortion.initialize_rendering(1, 64, &leader);
        distortion.render(&mut buffer);

        assert_eq!(buffer, input);
    }

    #[test]
    fn test_full_level_saturates() {
        let leader = ParamLeader::new(0.0, 1.0, 1.0);
        let mut distortion = Distortion::new(&config(), &leader);
        let mut buffer = sine(0.8);

        distortion.initialize_rendering(1, 64, &leader);
        distortion.render(&mut buffer);

        let peak = buffer.iter().fold(0.0_f32, |peak, s| peak.max(s.abs()));
        assert!(peak <= 1.0 + 1e-4);
        assert!(peak > 0.9, "peak {peak}");
        assert!(buffer.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_slow_quiet_sine_tracks_midpoint_shape() {
        let leader = ParamLeader::new(0.0, 1.0, 1.0);
        let mut distortion = Distortion::new(&config(), &leader);
        let input: Vec<Sample> = (0..4096)
            .map(|i| 0.15 * libm::sinf(2.0 * core::f32::consts::PI * 5.0 * i as Sample / 44100.0))
            .collect();
        let mut output = input.clone();

        for (round, block) in output.chunks_mut(64).enumerate() {
            distortion.initialize_rendering(round as Round + 1, block.len(), &leader);
            distortion.render(block);
        }

        let mut previous = 0.0;
        let mut worst: Number = 0.0;
        for (&x, &y) in input.iter().zip(&output) {
            let midpoint = 0.5 * (Number::from(x) + previous);
            worst = worst.max((Number::from(y) - shape(midpoint)).abs());
            previous = Number::from(x);
        }

        assert!(worst < 1e-4, "worst deviation {worst}");
    }

    #[test]
    fn test_constant_input_uses_midpoint() {
        let leader = ParamLeader::new(0.0, 1.0, 1.0);
        let mut distortion = Distortion::new(&config(), &leader);
        let mut buffer = [0.0; 4];

        distortion.initialize_rendering(1, 4, &leader);
        distortion.render(&mut buffer);

        assert!(buffer.iter().all(|&s| s == 0.0));
    }
}
