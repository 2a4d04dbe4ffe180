//! Shared parameter leaders of one voice role.
//!
//! The enclosing engine owns one [`VoiceParams`] for its modulators and one
//! for its carriers. Voices only read them; every voice keeps its own
//! [`FloatParam`](tessel_core::FloatParam) copies for the parts that play
//! envelopes or ramps per note.

use tessel_core::{DiscreteParam, Envelope, FilterType, Number, ParamLeader};

use crate::tuning::Tuning;
use crate::wavetable::{CUSTOM_PARTIALS, Waveform};

/// Lowest oscillator frequency.
pub const FREQUENCY_MIN: Number = 0.001;
/// Highest oscillator frequency.
pub const FREQUENCY_MAX: Number = 24000.0;
/// Oscillator frequency before the first note.
pub const FREQUENCY_DEFAULT: Number = 440.0;

/// Detune range in cents.
pub const DETUNE_MAX: Number = 4800.0;
/// Fine detune range in cents.
pub const FINE_DETUNE_MAX: Number = 300.0;

/// Folding range of the wavefolder.
pub const FOLD_MAX: Number = 5.0;

/// Lowest filter frequency.
pub const FILTER_FREQUENCY_MIN: Number = 1.0;
/// Highest filter frequency.
pub const FILTER_FREQUENCY_MAX: Number = 24000.0;
/// Lowest filter Q.
pub const FILTER_Q_MIN: Number = 0.01;
/// Highest filter Q.
pub const FILTER_Q_MAX: Number = 30.0;
/// Filter gain range in dB.
pub const FILTER_GAIN_MAX: Number = 48.0;

/// Highest frequency modulation level in Hz.
pub const FREQUENCY_MODULATION_MAX: Number = 3000.0;
/// Highest phase modulation level in periods.
pub const PHASE_MODULATION_MAX: Number = 0.5;

/// Leaders of one biquad stage.
#[derive(Debug, Clone)]
pub struct FilterParams {
    /// Response type.
    pub filter_type: DiscreteParam<FilterType>,
    /// Cutoff, center or corner frequency. Set it logarithmic to run
    /// envelopes on a log scale.
    pub frequency: ParamLeader,
    /// Q factor.
    pub q: ParamLeader,
    /// Gain in dB for peaking and shelving types.
    pub gain: ParamLeader,
}

impl FilterParams {
    /// A low-pass wide open at the top of the audible range.
    pub fn new() -> Self {
        Self {
            filter_type: DiscreteParam::new(FilterType::LowPass),
            frequency: ParamLeader::new(
                FILTER_FREQUENCY_MIN,
                FILTER_FREQUENCY_MAX,
                FILTER_FREQUENCY_MAX,
            ),
            q: ParamLeader::new(FILTER_Q_MIN, FILTER_Q_MAX, 1.0),
            gain: ParamLeader::new(-FILTER_GAIN_MAX, FILTER_GAIN_MAX, 0.0),
        }
    }
}

impl Default for FilterParams {
    fn default() -> Self {
        Self::new()
    }
}

/// Every leader a voice reads.
///
/// Role-specific leaders exist on both roles and are ignored where they do
/// not apply: `subharmonic_amplitude` only affects modulators, while
/// `distortion` and the three modulation levels only affect carriers.
#[derive(Debug, Clone)]
pub struct VoiceParams {
    /// Pitch reference and drift model.
    pub tuning: DiscreteParam<Tuning>,
    /// Oscillator waveform.
    pub waveform: DiscreteParam<Waveform>,
    /// Oscillator amplitude, played through the default DAHDSR envelope.
    pub amplitude: ParamLeader,
    /// Shapes how strongly note velocity affects loudness.
    pub velocity_sensitivity: ParamLeader,
    /// Wavefolder drive.
    pub folding: ParamLeader,
    /// Glide time.
    pub portamento_length: ParamLeader,
    /// Glide start offset in cents; zero glides from the previous note.
    pub portamento_depth: ParamLeader,
    /// Coarse detune in cents.
    pub detune: ParamLeader,
    /// Fine detune in cents.
    pub fine_detune: ParamLeader,
    /// Stereo spread of notes across the keyboard.
    pub width: ParamLeader,
    /// Stereo position.
    pub panning: ParamLeader,
    /// Output volume.
    pub volume: ParamLeader,
    /// Harmonic amplitudes of the custom waveform.
    pub harmonics: [ParamLeader; CUSTOM_PARTIALS],
    /// Filter before the wavefolder.
    pub filter_1: FilterParams,
    /// Filter after the wavefolder.
    pub filter_2: FilterParams,
    /// Sine one octave below the note (modulators).
    pub subharmonic_amplitude: ParamLeader,
    /// Saturation mix (carriers).
    pub distortion: ParamLeader,
    /// Amplitude modulation by the paired modulator (carriers).
    pub amplitude_modulation_level: ParamLeader,
    /// Frequency modulation by the paired modulator, in Hz (carriers).
    pub frequency_modulation_level: ParamLeader,
    /// Phase modulation by the paired modulator, in periods (carriers).
    pub phase_modulation_level: ParamLeader,
}

impl VoiceParams {
    /// Leaders at their defaults.
    pub fn new() -> Self {
        let harmonic = |default| ParamLeader::new(-1.0, 1.0, default);

        Self {
            tuning: DiscreteParam::new(Tuning::Hz440),
            waveform: DiscreteParam::new(Waveform::Sine),
            amplitude: ParamLeader::new(0.0, 1.0, 0.75).with_envelope(Envelope::new()),
            velocity_sensitivity: ParamLeader::new(0.0, 2.0, 1.0),
            folding: ParamLeader::new(0.0, FOLD_MAX, 0.0),
            portamento_length: ParamLeader::new(0.0, 3.0, 0.0),
            portamento_depth: ParamLeader::new(-2400.0, 2400.0, 0.0),
            detune: ParamLeader::new(-DETUNE_MAX, DETUNE_MAX, 0.0).with_rounding(100.0),
            fine_detune: ParamLeader::new(-FINE_DETUNE_MAX, FINE_DETUNE_MAX, 0.0),
            width: ParamLeader::new(-1.0, 1.0, 0.2),
            panning: ParamLeader::new(-1.0, 1.0, 0.0),
            volume: ParamLeader::new(0.0, 1.0, 0.33),
            harmonics: [
                harmonic(0.333),
                harmonic(0.333),
                harmonic(0.333),
                harmonic(0.0),
                harmonic(0.0),
                harmonic(0.0),
                harmonic(0.0),
                harmonic(0.0),
                harmonic(0.0),
                harmonic(0.0),
            ],
            filter_1: FilterParams::new(),
            filter_2: FilterParams::new(),
            subharmonic_amplitude: ParamLeader::new(0.0, 1.0, 0.0),
            distortion: ParamLeader::new(0.0, 1.0, 0.0),
            amplitude_modulation_level: ParamLeader::new(0.0, 1.0, 0.0),
            frequency_modulation_level: ParamLeader::new(0.0, FREQUENCY_MODULATION_MAX, 0.0),
            phase_modulation_level: ParamLeader::new(0.0, PHASE_MODULATION_MAX, 0.0),
        }
    }

    /// Restores every leader to its default.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = VoiceParams::new();

        assert_eq!(params.tuning.value(), Tuning::Hz440);
        assert_eq!(params.waveform.value(), Waveform::Sine);
        assert_eq!(params.amplitude.value(), 0.75);
        assert_eq!(params.amplitude.envelope(), Some(&Envelope::new()));
        assert!(!params.volume.has_envelope());
        assert_eq!(params.volume.value(), 0.33);
        assert_eq!(params.width.value(), 0.2);
        assert_eq!(params.filter_1.frequency.value(), FILTER_FREQUENCY_MAX);
        assert_eq!(params.harmonics[2].value(), 0.333);
        assert_eq!(params.harmonics[3].value(), 0.0);
    }

    #[test]
    fn test_detune_rounds_to_semitones() {
        let mut params = VoiceParams::new();

        params.detune.set_value(149.0);
        assert_eq!(params.detune.value(), 100.0);

        params.detune.set_value(9000.0);
        assert_eq!(params.detune.value(), DETUNE_MAX);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut params = VoiceParams::new();

        params.volume.set_value(1.0);
        params.waveform.set_value(Waveform::Square);
        params.amplitude.set_envelope(None);
        params.reset();

        assert_eq!(params.volume.value(), 0.33);
        assert!(params.amplitude.has_envelope());
        assert_eq!(params.waveform.value(), Waveform::Sine);
    }
}
