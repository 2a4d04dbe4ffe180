//! Wavetable oscillator, the first stage of every voice.
//!
//! The oscillator turns its frequency, detune and amplitude parameters into a
//! block of band-limited samples. A carrier's oscillator can additionally be
//! driven by its modulator's output:
//!
//! | modulation | parameter | level range |
//! |---|---|---|
//! | amplitude (AM) | amplitude multiplier | 0 – 1 |
//! | frequency (FM) | frequency, in Hz | 0 – 3000 |
//! | phase (PM) | read position, in periods | 0 – 0.5 |
//!
//! Starting and stopping are sample-accurate events on the oscillator's own
//! clock. The phase restarts on the first sample after a start, offset by
//! how far that sample lies past the exact start time.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use tessel_core::{
    Clock, EventQueue, FloatParam, Frequency, ModulatableParam, Number, ParamBlock, RenderConfig,
    Round, Sample, Seconds, SignalProducer, detune,
};

use crate::params::{FREQUENCY_DEFAULT, FREQUENCY_MAX, FREQUENCY_MIN, VoiceParams};
use crate::wavetable::{CUSTOM_PARTIALS, StandardWaveforms, Waveform, Wavetable, WavetableState};

/// Pending start/stop events.
const EVENT_CAPACITY: usize = 8;

/// Levels below this are treated as off.
const SILENT: Number = 0.000_001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OscillatorEvent {
    Start,
    Stop,
}

/// What an oscillator reads while rendering one block.
#[derive(Debug, Clone, Copy)]
pub struct OscillatorInputs<'a> {
    /// Leaders of the voice's role.
    pub params: &'a VoiceParams,
    /// The paired modulator's output for this block, if it is sounding.
    pub modulator: Option<&'a [Sample]>,
}

/// Band-limited wavetable oscillator.
#[derive(Debug, Clone)]
pub struct Oscillator {
    clock: Clock,
    sampling_period: Seconds,
    nyquist_frequency: Frequency,
    events: EventQueue<OscillatorEvent, EVENT_CAPACITY>,
    standard_waveforms: Arc<StandardWaveforms>,
    custom_waveform: Wavetable,
    custom_coefficients: [Number; CUSTOM_PARTIALS],
    custom_change_indices: [Option<u32>; CUSTOM_PARTIALS],
    waveform: Waveform,
    state: WavetableState,
    pub(crate) modulated_amplitude: ModulatableParam,
    pub(crate) amplitude: FloatParam,
    pub(crate) frequency: ModulatableParam,
    pub(crate) phase: ModulatableParam,
    pub(crate) detune: FloatParam,
    pub(crate) fine_detune: FloatParam,
    pub(crate) subharmonic_amplitude: FloatParam,
    has_subharmonic: bool,
    amplitude_block: ParamBlock,
    frequency_block: ParamBlock,
    phase_block: ParamBlock,
    subharmonic_block: ParamBlock,
    computed_amplitude: Vec<Sample>,
    computed_frequency: Vec<Frequency>,
    is_on: bool,
    is_starting: bool,
    start_time_offset: Seconds,
}

impl Oscillator {
    /// Creates a stopped oscillator. `has_subharmonic` adds a sine one
    /// octave below the note, mixed by the subharmonic amplitude leader.
    pub fn new(
        config: &RenderConfig,
        params: &VoiceParams,
        standard_waveforms: Arc<StandardWaveforms>,
        has_subharmonic: bool,
    ) -> Self {
        Self {
            clock: Clock::new(config),
            sampling_period: config.sampling_period(),
            nyquist_frequency: config.nyquist_frequency(),
            events: EventQueue::new(),
            standard_waveforms,
            custom_waveform: Wavetable::new(&[0.0; CUSTOM_PARTIALS]),
            custom_coefficients: [0.0; CUSTOM_PARTIALS],
            custom_change_indices: [None; CUSTOM_PARTIALS],
            waveform: params.waveform.value(),
            state: WavetableState::new(config),
            modulated_amplitude: ModulatableParam::new(
                config,
                0.0,
                1.0,
                1.0,
                &params.amplitude_modulation_level,
            ),
            amplitude: FloatParam::follower_of(config, &params.amplitude),
            frequency: ModulatableParam::new(
                config,
                FREQUENCY_MIN,
                FREQUENCY_MAX,
                FREQUENCY_DEFAULT,
                &params.frequency_modulation_level,
            ),
            phase: ModulatableParam::new(config, 0.0, 1.0, 0.0, &params.phase_modulation_level),
            detune: FloatParam::follower_of(config, &params.detune),
            fine_detune: FloatParam::follower_of(config, &params.fine_detune),
            subharmonic_amplitude: FloatParam::follower_of(config, &params.subharmonic_amplitude),
            has_subharmonic,
            amplitude_block: ParamBlock::Constant(0.0),
            frequency_block: ParamBlock::Constant(FREQUENCY_DEFAULT),
            phase_block: ParamBlock::Constant(0.0),
            subharmonic_block: ParamBlock::Constant(0.0),
            computed_amplitude: vec![0.0; config.block_size],
            computed_frequency: vec![0.0; config.block_size],
            is_on: false,
            is_starting: false,
            start_time_offset: 0.0,
        }
    }

    /// Starts at `time_offset`, superseding later start/stop events.
    pub fn start(&mut self, time_offset: Seconds) {
        self.schedule(OscillatorEvent::Start, time_offset);
    }

    /// Stops at `time_offset`, superseding later start/stop events.
    pub fn stop(&mut self, time_offset: Seconds) {
        self.schedule(OscillatorEvent::Stop, time_offset);
    }

    fn schedule(&mut self, event: OscillatorEvent, time_offset: Seconds) {
        let time = self.clock.absolute(time_offset.max(0.0));

        self.events.drop_from(time);
        self.events.push(event, time);
    }

    /// Drops start/stop events at or after `time_offset`.
    pub fn cancel_events_at(&mut self, time_offset: Seconds) {
        self.events.drop_from(self.clock.absolute(time_offset));
    }

    /// Drops every pending start/stop event.
    pub fn cancel_events(&mut self) {
        self.events.clear();
    }

    /// Whether a start or stop is pending.
    #[inline]
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Whether a start or stop is pending after `time_offset`.
    #[inline]
    pub fn has_events_after(&self, time_offset: Seconds) -> bool {
        self.events.has_events_after(self.clock.absolute(time_offset))
    }

    /// Whether the oscillator is producing sound.
    #[inline]
    pub fn is_on(&self) -> bool {
        self.is_on
    }

    /// The wavetable phase.
    #[inline]
    pub fn state(&self) -> &WavetableState {
        &self.state
    }

    fn update_custom_waveform(&mut self, params: &VoiceParams) {
        let mut changed = false;

        for ((leader, coefficient), change_index) in params
            .harmonics
            .iter()
            .zip(self.custom_coefficients.iter_mut())
            .zip(self.custom_change_indices.iter_mut())
        {
            if *change_index != Some(leader.change_index()) {
                *change_index = Some(leader.change_index());
                *coefficient = leader.value();
                changed = true;
            }
        }

        if changed {
            self.custom_waveform
                .update_coefficients(&self.custom_coefficients, false);
        }
    }

    fn resolve_amplitude(
        &mut self,
        round: Round,
        sample_count: usize,
        inputs: &OscillatorInputs<'_>,
    ) {
        let params = inputs.params;
        let modulated = self.modulated_amplitude.produce_if_not_constant(
            round,
            sample_count,
            Some(&params.amplitude_modulation_level),
            inputs.modulator,
        );
        let amplitude =
            self.amplitude
                .produce_if_not_constant(round, sample_count, Some(&params.amplitude));

        self.amplitude_block = match (amplitude, modulated) {
            (ParamBlock::Constant(a), ParamBlock::Constant(m)) => ParamBlock::Constant(a * m),
            _ => {
                let count = sample_count.min(self.computed_amplitude.len());
                let amplitudes = self.amplitude.buffer();
                let modulations = self.modulated_amplitude.buffer();

                for (i, out) in self.computed_amplitude[..count].iter_mut().enumerate() {
                    *out = (block_value(amplitude, amplitudes, i)
                        * block_value(modulated, modulations, i)) as Sample;
                }

                ParamBlock::Varying
            }
        };
    }

    fn resolve_frequency(
        &mut self,
        round: Round,
        sample_count: usize,
        inputs: &OscillatorInputs<'_>,
    ) {
        let params = inputs.params;
        let frequency = self.frequency.produce_if_not_constant(
            round,
            sample_count,
            Some(&params.frequency_modulation_level),
            inputs.modulator,
        );
        let coarse = self
            .detune
            .produce_if_not_constant(round, sample_count, Some(&params.detune));
        let fine =
            self.fine_detune
                .produce_if_not_constant(round, sample_count, Some(&params.fine_detune));

        self.frequency_block = match (frequency, coarse, fine) {
            (ParamBlock::Constant(f), ParamBlock::Constant(c), ParamBlock::Constant(d)) => {
                ParamBlock::Constant(detune(f, c + d))
            }
            _ => {
                let count = sample_count.min(self.computed_frequency.len());
                let frequencies = self.frequency.buffer();
                let coarse_buffer = self.detune.buffer();
                let fine_buffer = self.fine_detune.buffer();

                for (i, out) in self.computed_frequency[..count].iter_mut().enumerate() {
                    *out = detune(
                        block_value(frequency, frequencies, i),
                        block_value(coarse, coarse_buffer, i) + block_value(fine, fine_buffer, i),
                    );
                }

                ParamBlock::Varying
            }
        };
    }

    fn handle_event(&mut self, kind: OscillatorEvent, event_time: Seconds, now: Seconds) {
        match kind {
            OscillatorEvent::Start => {
                self.is_on = true;
                self.is_starting = true;
                self.start_time_offset = (now - event_time).max(0.0);
            }
            OscillatorEvent::Stop => self.is_on = false,
        }
    }

    fn frequency_at(&self, i: usize) -> Frequency {
        match self.frequency_block {
            ParamBlock::Constant(frequency) => frequency,
            ParamBlock::Varying => self.computed_frequency[i],
        }
    }
}

#[inline]
fn block_value(block: ParamBlock, buffer: &[Sample], i: usize) -> Number {
    match block {
        ParamBlock::Constant(value) => value,
        ParamBlock::Varying => Number::from(buffer[i]),
    }
}

impl<'a> SignalProducer<OscillatorInputs<'a>> for Oscillator {
    fn initialize_rendering(&mut self, round: Round, sample_count: usize, inputs: &OscillatorInputs<'a>) {
        let params = inputs.params;

        self.waveform = params.waveform.value();

        if self.waveform == Waveform::Custom {
            self.update_custom_waveform(params);
        }

        self.resolve_amplitude(round, sample_count, inputs);
        self.resolve_frequency(round, sample_count, inputs);
        self.phase_block = self.phase.produce_if_not_constant(
            round,
            sample_count,
            Some(&params.phase_modulation_level),
            inputs.modulator,
        );
        self.subharmonic_block = if self.has_subharmonic {
            self.subharmonic_amplitude.produce_if_not_constant(
                round,
                sample_count,
                Some(&params.subharmonic_amplitude),
            )
        } else {
            ParamBlock::Constant(0.0)
        };
    }

    fn render(&mut self, buffer: &mut [Sample]) {
        let has_subharmonic = !matches!(self.subharmonic_block, ParamBlock::Constant(a) if a < SILENT);

        for (i, out) in buffer.iter_mut().enumerate() {
            let now = self.clock.sample_time(i);

            while let Some(event) = self.events.pop_due(now) {
                self.handle_event(event.kind, event.time, now);
            }

            if !self.is_on {
                *out = 0.0;
                continue;
            }

            let frequency = self.frequency_at(i);

            if self.is_starting {
                self.is_starting = false;
                self.state.reset(
                    self.sampling_period,
                    self.nyquist_frequency,
                    frequency,
                    self.start_time_offset,
                );
            }

            let wavetable = match self.standard_waveforms.get(self.waveform) {
                Some(wavetable) => wavetable,
                None => &self.custom_waveform,
            };
            let phase = block_value(self.phase_block, self.phase.buffer(), i);
            let amplitude = match self.amplitude_block {
                ParamBlock::Constant(amplitude) => amplitude as Sample,
                ParamBlock::Varying => self.computed_amplitude[i],
            };

            let mut sample =
                amplitude * wavetable.lookup_with_phase(&mut self.state, frequency, phase);

            if has_subharmonic {
                let level = block_value(self.subharmonic_block, self.subharmonic_amplitude.buffer(), i);
                sample += level as Sample * self.state.subharmonic(frequency);
            }

            *out = sample;
        }

        self.clock.advance(buffer.len());
    }

    fn reset(&mut self) {
        self.clock.reset();
        self.events.clear();
        self.state
            .reset(self.sampling_period, self.nyquist_frequency, 0.0, 0.0);
        self.modulated_amplitude.reset();
        self.amplitude.reset();
        self.frequency.reset();
        self.phase.reset();
        self.detune.reset();
        self.fine_detune.reset();
        self.subharmonic_amplitude.reset();
        self.is_on = false;
        self.is_starting = false;
        self.start_time_offset = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 44100.0;
    const BLOCK: usize = 64;

    fn setup() -> (RenderConfig, VoiceParams, Oscillator) {
        let config = RenderConfig::new(SR, BLOCK);
        let mut params = VoiceParams::new();
        params.amplitude.set_envelope(None);
        params.amplitude.set_value(1.0);
        let oscillator = Oscillator::new(
            &config,
            &params,
            Arc::new(StandardWaveforms::new()),
            false,
        );
        (config, params, oscillator)
    }

    fn render(
        oscillator: &mut Oscillator,
        params: &VoiceParams,
        round: Round,
        modulator: Option<&[Sample]>,
    ) -> Vec<Sample> {
        let mut buffer = vec![0.0; BLOCK];
        let inputs = OscillatorInputs { params, modulator };
        oscillator.initialize_rendering(round, BLOCK, &inputs);
        oscillator.render(&mut buffer);
        buffer
    }

    #[test]
    fn test_silent_until_started() {
        let (_, params, mut oscillator) = setup();

        let output = render(&mut oscillator, &params, 1, None);

        assert!(output.iter().all(|&s| s == 0.0));
        assert!(!oscillator.is_on());
    }

    #[test]
    fn test_start_is_sample_accurate() {
        let (_, params, mut oscillator) = setup();

        oscillator.frequency.param_mut().set_value(441.0);
        oscillator.start(10.0 / SR);
        let output = render(&mut oscillator, &params, 1, None);

        assert!(output[..10].iter().all(|&s| s == 0.0));
        // Phase restarts at zero on the start sample, then rises.
        assert!(output[10].abs() < 1e-4);
        assert!(output[11] > 0.0);
        assert!(oscillator.is_on());
    }

    #[test]
    fn test_stop_silences() {
        let (_, params, mut oscillator) = setup();

        oscillator.start(0.0);
        oscillator.stop(32.0 / SR);
        let output = render(&mut oscillator, &params, 1, None);

        assert!(output[1..32].iter().any(|&s| s != 0.0));
        assert!(output[32..].iter().all(|&s| s == 0.0));
        assert!(!oscillator.has_events());
    }

    #[test]
    fn test_cancel_events_at_drops_later_events() {
        let (_, _, mut oscillator) = setup();

        oscillator.start(0.0);
        oscillator.stop(1.0);
        oscillator.cancel_events_at(0.5);

        assert!(oscillator.has_events());
        assert!(!oscillator.has_events_after(0.0));
    }

    #[test]
    fn test_detune_shifts_frequency() {
        let (_, mut params, mut oscillator) = setup();

        params.detune.set_value(1200.0);
        oscillator.frequency.param_mut().set_value(220.0);
        let inputs = OscillatorInputs {
            params: &params,
            modulator: None,
        };
        oscillator.initialize_rendering(1, BLOCK, &inputs);

        match oscillator.frequency_block {
            ParamBlock::Constant(frequency) => assert!((frequency - 440.0).abs() < 1e-9),
            ParamBlock::Varying => panic!("expected a constant frequency"),
        }
    }

    #[test]
    fn test_amplitude_modulation() {
        let (_, mut params, mut oscillator) = setup();

        params.waveform.set_value(Waveform::Sine);
        params.amplitude_modulation_level.set_value(1.0);
        oscillator.modulated_amplitude.param_mut().set_value(0.0);
        oscillator.start(0.0);

        let silent_modulator = vec![0.0; BLOCK];
        let output = render(&mut oscillator, &params, 1, Some(&silent_modulator));
        assert!(output.iter().all(|&s| s == 0.0));

        let full_modulator = vec![1.0; BLOCK];
        let output = render(&mut oscillator, &params, 2, Some(&full_modulator));
        assert!(output.iter().any(|&s| s.abs() > 0.01));
    }

    #[test]
    fn test_custom_waveform_follows_harmonics() {
        let (_, mut params, mut oscillator) = setup();

        params.waveform.set_value(Waveform::Custom);
        for harmonic in &mut params.harmonics {
            harmonic.set_value(0.0);
        }
        params.harmonics[0].set_value(0.5);
        oscillator.start(0.0);

        let output = render(&mut oscillator, &params, 1, None);
        let peak = output.iter().fold(0.0_f32, |peak, s| peak.max(s.abs()));

        // Custom tables are not normalized after updates.
        assert!(peak > 0.0 && peak <= 0.5 + 1e-3, "peak {peak}");
    }

    #[test]
    fn test_subharmonic_only_when_enabled() {
        let config = RenderConfig::new(SR, BLOCK);
        let mut params = VoiceParams::new();
        params.amplitude.set_envelope(None);
        params.amplitude.set_value(0.0);
        params.subharmonic_amplitude.set_value(1.0);
        let waveforms = Arc::new(StandardWaveforms::new());

        let mut with = Oscillator::new(&config, &params, Arc::clone(&waveforms), true);
        let mut without = Oscillator::new(&config, &params, waveforms, false);
        with.start(0.0);
        without.start(0.0);

        let with_output = render(&mut with, &params, 1, None);
        let without_output = render(&mut without, &params, 1, None);

        assert!(with_output.iter().any(|&s| s.abs() > 0.001));
        assert!(without_output.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_reset_stops() {
        let (_, params, mut oscillator) = setup();

        oscillator.start(0.0);
        render(&mut oscillator, &params, 1, None);
        oscillator.reset();

        assert!(!oscillator.is_on());
        assert!(!oscillator.has_events());
    }
}
