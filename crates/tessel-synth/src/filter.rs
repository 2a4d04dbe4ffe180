//! Biquad stage of a voice.
//!
//! Wraps the RBJ [`Biquad`] kernel with per-voice frequency, Q and gain
//! parameters. When every input is constant for a block the coefficients are
//! computed once (and only if they changed); otherwise they are recomputed
//! per sample. Settings that leave the signal untouched skip the kernel
//! entirely.

use tessel_core::{
    Biquad, Coefficients, FilterType, FloatParam, Number, ParamBlock, ParamLeader, RenderConfig,
    Round, Sample, SignalProducer,
};

use crate::params::{FILTER_FREQUENCY_MIN, FilterParams};

/// Gains closer to 0 dB than this make shelving and peaking types
/// transparent.
const GAIN_EPSILON: Number = 0.000_001;

/// Highest frequency handed to the coefficient formulas, relative to Nyquist.
const MAX_FREQUENCY_RATIO: Number = 0.999;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Bypass,
    Fixed,
    Varying,
}

/// Biquad filter stage.
#[derive(Debug, Clone)]
pub struct Filter {
    biquad: Biquad,
    sample_rate: Number,
    nyquist_frequency: Number,
    pub(crate) frequency: FloatParam,
    pub(crate) q: FloatParam,
    pub(crate) gain: FloatParam,
    filter_type: FilterType,
    mode: Mode,
    frequency_block: ParamBlock,
    q_block: ParamBlock,
    gain_block: ParamBlock,
    cached_inputs: Option<(FilterType, Number, Number, Number)>,
}

impl Filter {
    /// Creates a filter whose parameters follow `params`.
    pub fn new(config: &RenderConfig, params: &FilterParams) -> Self {
        Self {
            biquad: Biquad::new(),
            sample_rate: config.sample_rate,
            nyquist_frequency: config.nyquist_frequency(),
            frequency: FloatParam::follower_of(config, &params.frequency),
            q: FloatParam::follower_of(config, &params.q),
            gain: FloatParam::follower_of(config, &params.gain),
            filter_type: params.filter_type.value(),
            mode: Mode::Bypass,
            frequency_block: ParamBlock::Constant(params.frequency.value()),
            q_block: ParamBlock::Constant(params.q.value()),
            gain_block: ParamBlock::Constant(params.gain.value()),
            cached_inputs: None,
        }
    }

    /// Whether the last initialized block skips the kernel.
    #[inline]
    pub fn is_bypassed(&self) -> bool {
        self.mode == Mode::Bypass
    }

    /// Applies `f` to frequency, Q and gain with their leaders, in that
    /// order.
    pub(crate) fn for_each_param(
        &mut self,
        params: &FilterParams,
        mut f: impl FnMut(&mut FloatParam, &ParamLeader),
    ) {
        f(&mut self.frequency, &params.frequency);
        f(&mut self.q, &params.q);
        f(&mut self.gain, &params.gain);
    }

    /// Cancels pending events of frequency, Q and gain.
    pub(crate) fn cancel_events(&mut self) {
        self.frequency.cancel_events();
        self.q.cancel_events();
        self.gain.cancel_events();
    }

    fn is_transparent(&self, frequency: Number, gain: Number) -> bool {
        match self.filter_type {
            FilterType::LowPass => frequency >= self.nyquist_frequency,
            FilterType::HighPass => frequency <= FILTER_FREQUENCY_MIN,
            FilterType::Peaking | FilterType::LowShelf | FilterType::HighShelf => {
                gain.abs() < GAIN_EPSILON
            }
            FilterType::BandPass | FilterType::Notch => false,
        }
    }

    fn coefficients(&self, frequency: Number, q: Number, gain: Number) -> Coefficients {
        let frequency = frequency.min(self.nyquist_frequency * MAX_FREQUENCY_RATIO);

        Coefficients::new(
            self.filter_type,
            frequency as f32,
            q as f32,
            gain as f32,
            self.sample_rate as f32,
        )
    }
}

#[inline]
fn block_value(block: ParamBlock, buffer: &[Sample], i: usize) -> Number {
    match block {
        ParamBlock::Constant(value) => value,
        ParamBlock::Varying => Number::from(buffer[i]),
    }
}

impl SignalProducer<FilterParams> for Filter {
    fn initialize_rendering(&mut self, round: Round, sample_count: usize, params: &FilterParams) {
        self.filter_type = params.filter_type.value();
        self.frequency_block =
            self.frequency
                .produce_if_not_constant(round, sample_count, Some(&params.frequency));
        self.q_block = self
            .q
            .produce_if_not_constant(round, sample_count, Some(&params.q));
        self.gain_block = self
            .gain
            .produce_if_not_constant(round, sample_count, Some(&params.gain));

        let (ParamBlock::Constant(frequency), ParamBlock::Constant(q), ParamBlock::Constant(gain)) =
            (self.frequency_block, self.q_block, self.gain_block)
        else {
            self.mode = Mode::Varying;
            self.cached_inputs = None;
            return;
        };

        if self.is_transparent(frequency, gain) {
            if self.mode != Mode::Bypass {
                self.biquad.clear();
            }
            self.mode = Mode::Bypass;
            return;
        }

        let inputs = Some((self.filter_type, frequency, q, gain));

        if self.cached_inputs != inputs {
            self.cached_inputs = inputs;
            self.biquad
                .set_coefficients(self.coefficients(frequency, q, gain));
        }

        self.mode = Mode::Fixed;
    }

    fn render(&mut self, buffer: &mut [Sample]) {
        match self.mode {
            Mode::Bypass => {}
            Mode::Fixed => {
                for sample in buffer.iter_mut() {
                    *sample = self.biquad.process(*sample);
                }
            }
            Mode::Varying => {
                for (i, sample) in buffer.iter_mut().enumerate() {
                    let coefficients = self.coefficients(
                        block_value(self.frequency_block, self.frequency.buffer(), i),
                        block_value(self.q_block, self.q.buffer(), i),
                        block_value(self.gain_block, self.gain.buffer(), i),
                    );

                    self.biquad.set_coefficients(coefficients);
                    *sample = self.biquad.process(*sample);
                }
            }
        }
    }

    fn reset(&mut self) {
        self.biquad.clear();
        self.frequency.reset();
        self.q.reset();
        self.gain.reset();
        self.mode = Mode::Bypass;
        self.cached_inputs = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 44100.0;
    const BLOCK: usize = 256;

    fn run(filter: &mut Filter, params: &FilterParams, round: Round, input: &[Sample]) -> Vec<Sample> {
        let mut buffer = input.to_vec();
        filter.initialize_rendering(round, buffer.len(), params);
        filter.render(&mut buffer);
        buffer
    }

    fn nyquist_tone() -> Vec<Sample> {
        (0..BLOCK).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect()
    }

    #[test]
    fn test_open_lowpass_is_bypassed() {
        let config = RenderConfig::new(SR, BLOCK);
        let params = FilterParams::new();
        let mut filter = Filter::new(&config, &params);
        let input = nyquist_tone();

        let output = run(&mut filter, &params, 1, &input);

        assert!(filter.is_bypassed());
        assert_eq!(output, input);
    }

    #[test]
    fn test_lowpass_attenuates_high_frequencies() {
        let config = RenderConfig::new(SR, BLOCK);
        let mut params = FilterParams::new();
        params.frequency.set_value(500.0);
        let mut filter = Filter::new(&config, &params);

        let mut output = Vec::new();
        for round in 1..=4 {
            output = run(&mut filter, &params, round, &nyquist_tone());
        }

        assert!(!filter.is_bypassed());
        assert!(output.iter().all(|s| s.abs() < 0.01));
    }

    #[test]
    fn test_flat_shelf_is_bypassed() {
        let config = RenderConfig::new(SR, BLOCK);
        let mut params = FilterParams::new();
        params.filter_type.set_value(FilterType::HighShelf);
        params.frequency.set_value(1000.0);
        let mut filter = Filter::new(&config, &params);

        run(&mut filter, &params, 1, &nyquist_tone());
        assert!(filter.is_bypassed());

        params.gain.set_value(-6.0);
        run(&mut filter, &params, 2, &nyquist_tone());
        assert!(!filter.is_bypassed());
    }

    #[test]
    fn test_swept_frequency_renders_per_sample() {
        let config = RenderConfig::new(SR, BLOCK);
        let mut params = FilterParams::new();
        params.frequency.set_logarithmic(true);
        params.frequency.set_envelope(Some(tessel_core::Envelope {
            initial_value: 0.9,
            attack_time: BLOCK as f64 / SR,
            peak_value: 0.3,
            ..tessel_core::Envelope::new()
        }));
        let mut filter = Filter::new(&config, &params);

        filter.frequency.start_envelope(0.0, Some(&params.frequency));
        let output = run(&mut filter, &params, 1, &nyquist_tone());

        assert_eq!(filter.mode, Mode::Varying);
        assert!(output.iter().all(|s| s.is_finite()));

        let swept = filter.frequency.buffer();
        assert!(swept[BLOCK - 1] < swept[1]);
    }
}
