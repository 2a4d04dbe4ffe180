//! A single synthesizer voice and its note lifecycle.
//!
//! A [`Voice`] owns one fixed signal chain:
//!
//! ```text
//! Oscillator → Filter 1 → Wavefolder → [Distortion] → Filter 2 → Volume → Panning
//! ```
//!
//! The [`Role`] type parameter decides the optional parts at construction:
//! a [`Modulator`] carries a subharmonic, a [`Carrier`] carries distortion
//! and takes its modulator's pre-panning output for AM, FM and PM.
//!
//! Lifecycle calls schedule events on the voice's parameters at a time
//! offset within the coming block; nothing takes effect until the next
//! render. Envelopes are started, updated and ended in the chain's order,
//! with the oscillator's own parameters last and the oscillator start or
//! stop after them.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::f64::consts::FRAC_PI_4;
use core::fmt;
use core::marker::PhantomData;

use tessel_core::{
    FloatParam, Frequency, INSIGNIFICANT, Number, ParamBlock, ParamLeader, RenderConfig, Round,
    Sample, Seconds, SignalProducer, clamp, detune, is_close,
};

use crate::distortion::Distortion;
use crate::filter::Filter;
use crate::inaccuracy::Inaccuracy;
use crate::oscillator::{Oscillator, OscillatorInputs};
use crate::params::VoiceParams;
use crate::tuning::{
    CHANNELS, DriftSource, FrequencyTable, NOTES, PerChannelFrequencyTable, Tuning,
};
use crate::volume::VolumeApplier;
use crate::wavefolder::Wavefolder;
use crate::wavetable::StandardWaveforms;

/// Length of the fade used by [`Voice::retrigger`] and
/// [`Voice::cancel_note_smoothly`].
pub const SMOOTH_NOTE_CANCELLATION_DURATION: Seconds = 0.01;

/// Portamento depths closer to zero than this glide from the previous note.
const PORTAMENTO_DEPTH_EPSILON: Number = 0.01;

/// Shortest ramp towards a retuned realtime frequency.
const REALTIME_TUNING_RAMP_TIME: Seconds = 0.003;

const NOTE_PANNING_SCALE: Number = 2.0 / 127.0;

const CENTS_PER_SEMITONE: Number = 100.0;

/// Caller-assigned note identifier.
pub type NoteId = u64;

/// Compile-time description of a voice's place in a modulator/carrier pair.
pub trait Role: fmt::Debug + Clone + Send + 'static {
    /// Short name for diagnostics.
    const NAME: &'static str;
    /// The oscillator mixes in a sine one octave below the note.
    const HAS_SUBHARMONIC: bool;
    /// The chain saturates between the wavefolder and the second filter.
    const HAS_DISTORTION: bool;
}

/// The voice whose output drives its paired carrier.
#[derive(Debug, Clone, Copy, Default)]
pub struct Modulator;

/// The voice modulated by its paired modulator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Carrier;

impl Role for Modulator {
    const NAME: &'static str = "modulator";
    const HAS_SUBHARMONIC: bool = true;
    const HAS_DISTORTION: bool = false;
}

impl Role for Carrier {
    const NAME: &'static str = "carrier";
    const HAS_SUBHARMONIC: bool = false;
    const HAS_DISTORTION: bool = true;
}

/// Whether a voice holds a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceState {
    /// Released or idle; a tail may still be ringing.
    #[default]
    Off,
    /// Holding a note.
    On,
}

/// A note as handed to the lifecycle calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    /// Identifier matched by [`Voice::note_off`].
    pub id: NoteId,
    /// MIDI note number.
    pub note: u8,
    /// MIDI channel.
    pub channel: u8,
    /// Velocity in `[0, 1]`.
    pub velocity: Number,
    /// The note played before this one, the glide source for portamento.
    pub previous_note: u8,
}

/// Everything a lifecycle call reads besides the voice itself.
#[derive(Debug, Clone, Copy)]
pub struct VoiceContext<'a> {
    /// Leaders of the voice's role.
    pub params: &'a VoiceParams,
    /// Static tunings.
    pub frequencies: &'a FrequencyTable,
    /// Externally supplied tuning.
    pub per_channel_frequencies: &'a PerChannelFrequencyTable,
    /// Drift shared by every voice.
    pub synced_inaccuracy: &'a Inaccuracy,
}

/// Maps raw velocity through the sensitivity curve.
///
/// Up to 1 the sensitivity blends between a constant 1 and the raw velocity;
/// above 1 it bends the response towards `v⁴`.
pub fn velocity_curve(sensitivity: Number, velocity: Number) -> Number {
    if sensitivity <= 1.0 {
        return 1.0 - sensitivity + sensitivity * velocity;
    }

    let velocity_sqr = velocity * velocity;

    velocity + (sensitivity - 1.0) * (velocity_sqr * velocity_sqr - velocity)
}

/// Stereo position of a note: low notes to the left, high notes to the
/// right, scaled by `width`.
pub fn note_panning(note: u8, detune_cents: Number, width: Number) -> Number {
    let position = NOTE_PANNING_SCALE * (Number::from(note) + detune_cents / CENTS_PER_SEMITONE);

    clamp(position - 1.0, -1.0, 1.0) * width
}

/// Equal-power gains for a panning position in `[-1, 1]`.
#[inline]
fn panning_gains(panning: Number) -> (Sample, Sample) {
    let x = (clamp(panning, -1.0, 1.0) + 1.0) * FRAC_PI_4;
    let (sin, cos) = libm::sincos(x);

    (cos as Sample, sin as Sample)
}

/// One voice of a given [`Role`].
#[derive(Debug, Clone)]
pub struct Voice<R: Role> {
    sampling_period: Seconds,
    state: VoiceState,
    note_id: NoteId,
    note: u8,
    channel: u8,
    inaccuracy: Inaccuracy,
    oscillator: Oscillator,
    filter_1: Filter,
    wavefolder: Wavefolder,
    distortion: Option<Distortion>,
    filter_2: Filter,
    volume_applier: VolumeApplier,
    note_panning: FloatParam,
    panning: FloatParam,
    panning_block: ParamBlock,
    note_panning_block: ParamBlock,
    buffer: Vec<Sample>,
    rendered: usize,
    role: PhantomData<R>,
}

impl<R: Role> Voice<R> {
    /// Creates an idle voice whose private drift starts at
    /// `inaccuracy_seed`.
    pub fn new(
        config: &RenderConfig,
        params: &VoiceParams,
        standard_waveforms: Arc<StandardWaveforms>,
        inaccuracy_seed: Number,
    ) -> Self {
        Self {
            sampling_period: config.sampling_period(),
            state: VoiceState::Off,
            note_id: 0,
            note: 0,
            channel: 0,
            inaccuracy: Inaccuracy::new(inaccuracy_seed),
            oscillator: Oscillator::new(config, params, standard_waveforms, R::HAS_SUBHARMONIC),
            filter_1: Filter::new(config, &params.filter_1),
            wavefolder: Wavefolder::new(config, &params.folding),
            distortion: R::HAS_DISTORTION.then(|| Distortion::new(config, &params.distortion)),
            filter_2: Filter::new(config, &params.filter_2),
            volume_applier: VolumeApplier::new(config, &params.volume),
            note_panning: FloatParam::new(config, -1.0, 1.0, 0.0),
            panning: FloatParam::follower_of(config, &params.panning),
            panning_block: ParamBlock::Constant(params.panning.value()),
            note_panning_block: ParamBlock::Constant(0.0),
            buffer: vec![0.0; config.block_size],
            rendered: 0,
            role: PhantomData,
        }
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> VoiceState {
        self.state
    }

    /// Identifier of the last note started.
    #[inline]
    pub fn note_id(&self) -> NoteId {
        self.note_id
    }

    /// Last note started.
    #[inline]
    pub fn note(&self) -> u8 {
        self.note
    }

    /// Channel of the last note started.
    #[inline]
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Current private drift value.
    #[inline]
    pub fn inaccuracy(&self) -> Number {
        self.inaccuracy.value()
    }

    /// The voice's oscillator.
    #[inline]
    pub fn oscillator(&self) -> &Oscillator {
        &self.oscillator
    }

    /// Current unmodulated oscillator frequency, before detune.
    #[inline]
    pub fn frequency(&self) -> Frequency {
        self.oscillator.frequency.value()
    }

    /// Whether the voice was released.
    #[inline]
    pub fn is_released(&self) -> bool {
        self.state == VoiceState::Off
    }

    /// Whether the voice is released with no oscillator start or stop
    /// pending after `time_offset`.
    pub fn is_off_after(&self, time_offset: Seconds) -> bool {
        self.is_released() && !self.oscillator.has_events_after(time_offset)
    }

    /// Whether the voice still has to be rendered: it holds a note, its
    /// oscillator is sounding, or a start or stop is pending.
    pub fn is_on(&self) -> bool {
        !self.is_off_after(0.0) || self.oscillator.is_on() || self.oscillator.has_events()
    }

    /// Whether a held note went silent during the attack, hold or decay of
    /// an amplitude or volume envelope that also ends in silence.
    pub fn has_decayed_during_envelope_dahds(&self, params: &VoiceParams) -> bool {
        if self.state != VoiceState::On {
            return false;
        }

        let volume = self
            .volume_applier
            .volume
            .has_decayed_during_envelope_dahds(Some(&params.volume));
        let amplitude = self
            .oscillator
            .amplitude
            .has_decayed_during_envelope_dahds(Some(&params.amplitude));

        if R::HAS_SUBHARMONIC {
            let subharmonic = self
                .oscillator
                .subharmonic_amplitude
                .has_decayed_during_envelope_dahds(Some(&params.subharmonic_amplitude));

            volume || (amplitude && subharmonic)
        } else {
            volume || amplitude
        }
    }

    /// Starts `note` at `time_offset`. Ignored while a note is held or when
    /// the note or channel is out of range.
    pub fn note_on(&mut self, time_offset: Seconds, note: Note, context: &VoiceContext<'_>) {
        if self.state == VoiceState::On
            || usize::from(note.note) >= NOTES
            || usize::from(note.channel) >= CHANNELS
        {
            return;
        }

        let params = context.params;

        self.state = VoiceState::On;
        self.save_note_info(note);
        self.inaccuracy.advance();

        let velocity = &mut self.volume_applier.velocity;
        velocity.cancel_events_at(time_offset);
        velocity.schedule_value(
            time_offset,
            velocity_curve(params.velocity_sensitivity.value(), note.velocity),
        );

        let panning = self.calculate_note_panning(note.note, params);
        self.note_panning.cancel_events_at(time_offset);
        self.note_panning.schedule_value(time_offset, panning);

        self.oscillator.cancel_events_at(time_offset);

        self.wavefolder
            .folding
            .start_envelope(time_offset, Some(&params.folding));

        if let Some(distortion) = &mut self.distortion {
            distortion
                .level
                .start_envelope(time_offset, Some(&params.distortion));
        }

        self.panning
            .start_envelope(time_offset, Some(&params.panning));
        self.volume_applier
            .volume
            .start_envelope(time_offset, Some(&params.volume));

        self.set_up_oscillator_frequency(time_offset, note, context);

        let oscillator = &mut self.oscillator;
        oscillator
            .modulated_amplitude
            .start_envelope(time_offset, Some(&params.amplitude_modulation_level));
        oscillator
            .amplitude
            .start_envelope(time_offset, Some(&params.amplitude));

        if R::HAS_SUBHARMONIC {
            oscillator
                .subharmonic_amplitude
                .start_envelope(time_offset, Some(&params.subharmonic_amplitude));
        }

        oscillator
            .frequency
            .start_envelope(time_offset, Some(&params.frequency_modulation_level));
        oscillator
            .phase
            .start_envelope(time_offset, Some(&params.phase_modulation_level));
        oscillator
            .fine_detune
            .start_envelope(time_offset, Some(&params.fine_detune));

        let start = |param: &mut FloatParam, leader: &ParamLeader| {
            param.start_envelope(time_offset, Some(leader));
        };
        self.filter_1.for_each_param(&params.filter_1, start);
        self.filter_2.for_each_param(&params.filter_2, start);

        self.oscillator.start(time_offset);
    }

    fn save_note_info(&mut self, note: Note) {
        self.note_id = note.id;
        self.note = note.note;
        self.channel = note.channel;
    }

    fn calculate_note_panning(&self, note: u8, params: &VoiceParams) -> Number {
        note_panning(note, params.detune.value(), params.width.value())
    }

    fn set_up_oscillator_frequency(
        &mut self,
        time_offset: Seconds,
        note: Note,
        context: &VoiceContext<'_>,
    ) {
        let params = context.params;
        let target = self.calculate_note_frequency(note.note, note.channel, context);
        let portamento_length = params.portamento_length.value();

        if portamento_length <= self.sampling_period {
            let frequency = self.oscillator.frequency.param_mut();
            frequency.cancel_events_at(time_offset);
            frequency.schedule_value(time_offset, target);
            return;
        }

        let portamento_depth = params.portamento_depth.value();
        let start = if portamento_depth.abs() < PORTAMENTO_DEPTH_EPSILON {
            self.calculate_note_frequency(note.previous_note, note.channel, context)
        } else {
            detune(target, portamento_depth)
        };

        let frequency = self.oscillator.frequency.param_mut();
        frequency.cancel_events_at(time_offset);
        frequency.schedule_value(time_offset, start);
        frequency.schedule_linear_ramp(portamento_length, target);
    }

    /// Frequency of `note` under the active tuning, including drift.
    pub fn calculate_note_frequency(
        &self,
        note: u8,
        channel: u8,
        context: &VoiceContext<'_>,
    ) -> Frequency {
        let tuning = context.params.tuning.value();

        if tuning.is_per_channel() {
            return context.per_channel_frequencies.get(channel, note);
        }

        let frequency = context.frequencies.get(tuning, note);

        match tuning.drift_source() {
            None => frequency,
            Some(source) => detune(
                frequency,
                tuning.detune_cents(self.drift(source, context.synced_inaccuracy)),
            ),
        }
    }

    fn drift(&self, source: DriftSource, synced_inaccuracy: &Inaccuracy) -> Number {
        match source {
            DriftSource::Private => self.inaccuracy.value(),
            DriftSource::Synced => synced_inaccuracy.value(),
        }
    }

    /// Fades out whatever is playing and starts `note` once the fade is
    /// over.
    pub fn retrigger(&mut self, time_offset: Seconds, note: Note, context: &VoiceContext<'_>) {
        if usize::from(note.note) >= NOTES {
            return;
        }

        self.cancel_note_smoothly(time_offset, context.params);
        self.note_on(
            time_offset + SMOOTH_NOTE_CANCELLATION_DURATION,
            note,
            context,
        );
    }

    /// Moves the held note to `note` without restarting anything: running
    /// envelopes pick up changes, and velocity, panning and frequency ramp
    /// to their new values over the portamento length. Falls back to
    /// [`retrigger`](Self::retrigger) when there is no portamento.
    pub fn glide_to(&mut self, time_offset: Seconds, note: Note, context: &VoiceContext<'_>) {
        if usize::from(note.note) >= NOTES {
            return;
        }

        let params = context.params;
        let portamento_length = params.portamento_length.value();

        if portamento_length <= INSIGNIFICANT {
            self.retrigger(time_offset, note, context);
            return;
        }

        self.save_note_info(note);
        self.inaccuracy.advance();

        self.wavefolder
            .folding
            .update_envelope(time_offset, Some(&params.folding));

        if let Some(distortion) = &mut self.distortion {
            distortion
                .level
                .update_envelope(time_offset, Some(&params.distortion));
        }

        self.panning
            .update_envelope(time_offset, Some(&params.panning));
        self.volume_applier
            .volume
            .update_envelope(time_offset, Some(&params.volume));

        let oscillator = &mut self.oscillator;
        oscillator
            .modulated_amplitude
            .update_envelope(time_offset, Some(&params.amplitude_modulation_level));
        oscillator
            .amplitude
            .update_envelope(time_offset, Some(&params.amplitude));

        if R::HAS_SUBHARMONIC {
            oscillator
                .subharmonic_amplitude
                .update_envelope(time_offset, Some(&params.subharmonic_amplitude));
        }

        oscillator
            .frequency
            .update_envelope(time_offset, Some(&params.frequency_modulation_level));
        oscillator
            .phase
            .update_envelope(time_offset, Some(&params.phase_modulation_level));
        oscillator
            .fine_detune
            .update_envelope(time_offset, Some(&params.fine_detune));

        let update = |param: &mut FloatParam, leader: &ParamLeader| {
            param.update_envelope(time_offset, Some(leader));
        };
        self.filter_1.for_each_param(&params.filter_1, update);
        self.filter_2.for_each_param(&params.filter_2, update);

        let velocity = velocity_curve(params.velocity_sensitivity.value(), note.velocity);
        let panning = self.calculate_note_panning(note.note, params);
        let frequency = self.calculate_note_frequency(note.note, note.channel, context);

        self.volume_applier.velocity.cancel_events_at(time_offset);
        self.note_panning.cancel_events_at(time_offset);
        self.oscillator
            .frequency
            .param_mut()
            .cancel_events_at(time_offset);

        self.volume_applier
            .velocity
            .schedule_linear_ramp(portamento_length, velocity);
        self.note_panning
            .schedule_linear_ramp(portamento_length, panning);
        self.oscillator
            .frequency
            .param_mut()
            .schedule_linear_ramp(portamento_length, frequency);
    }

    /// Releases the held note if `note_id` and `note` match it. The
    /// oscillator stops once the longest amplitude-bearing release is over.
    pub fn note_off(
        &mut self,
        time_offset: Seconds,
        note_id: NoteId,
        note: u8,
        params: &VoiceParams,
    ) {
        if self.state != VoiceState::On || note_id != self.note_id || note != self.note {
            return;
        }

        let oscillator = &mut self.oscillator;
        oscillator
            .modulated_amplitude
            .end_envelope(time_offset, Some(&params.amplitude_modulation_level));
        oscillator
            .frequency
            .end_envelope(time_offset, Some(&params.frequency_modulation_level));
        oscillator
            .phase
            .end_envelope(time_offset, Some(&params.phase_modulation_level));

        let mut release = oscillator
            .amplitude
            .end_envelope(time_offset, Some(&params.amplitude));

        if R::HAS_SUBHARMONIC {
            release = release.max(
                oscillator
                    .subharmonic_amplitude
                    .end_envelope(time_offset, Some(&params.subharmonic_amplitude)),
            );
        }

        release = release.max(
            self.volume_applier
                .volume
                .end_envelope(time_offset, Some(&params.volume)),
        );

        let off_after = time_offset + release;
        self.oscillator.cancel_events_at(off_after);
        self.oscillator.stop(off_after);

        self.state = VoiceState::Off;

        self.wavefolder
            .folding
            .end_envelope(time_offset, Some(&params.folding));

        if let Some(distortion) = &mut self.distortion {
            distortion
                .level
                .end_envelope(time_offset, Some(&params.distortion));
        }

        self.panning
            .end_envelope(time_offset, Some(&params.panning));
        self.oscillator
            .fine_detune
            .end_envelope(time_offset, Some(&params.fine_detune));

        let end = |param: &mut FloatParam, leader: &ParamLeader| {
            param.end_envelope(time_offset, Some(leader));
        };
        self.filter_1.for_each_param(&params.filter_1, end);
        self.filter_2.for_each_param(&params.filter_2, end);
    }

    /// Silences the voice at the start of the next block, without a fade.
    pub fn cancel_note(&mut self) {
        if self.state != VoiceState::On {
            return;
        }

        self.note_id = 0;
        self.note = 0;
        self.channel = 0;
        self.state = VoiceState::Off;

        self.oscillator.amplitude.cancel_events();
        self.oscillator.subharmonic_amplitude.cancel_events();
        self.volume_applier.volume.cancel_events();

        self.oscillator.cancel_events();
        self.oscillator.stop(0.0);

        self.wavefolder.folding.cancel_events();

        if let Some(distortion) = &mut self.distortion {
            distortion.level.cancel_events();
        }

        self.panning.cancel_events();
        self.oscillator.modulated_amplitude.cancel_events();
        self.oscillator.frequency.cancel_events();
        self.oscillator.phase.cancel_events();
        self.oscillator.fine_detune.cancel_events();

        self.filter_1.cancel_events();
        self.filter_2.cancel_events();
    }

    /// Releases every envelope over [`SMOOTH_NOTE_CANCELLATION_DURATION`]
    /// from `time_offset` and stops the oscillator when that is over.
    pub fn cancel_note_smoothly(&mut self, time_offset: Seconds, params: &VoiceParams) {
        const DURATION: Seconds = SMOOTH_NOTE_CANCELLATION_DURATION;

        self.state = VoiceState::Off;

        self.wavefolder
            .folding
            .cancel_envelope(time_offset, DURATION, Some(&params.folding));

        if let Some(distortion) = &mut self.distortion {
            distortion
                .level
                .cancel_envelope(time_offset, DURATION, Some(&params.distortion));
        }

        self.panning
            .cancel_envelope(time_offset, DURATION, Some(&params.panning));
        self.volume_applier
            .volume
            .cancel_envelope(time_offset, DURATION, Some(&params.volume));

        let oscillator = &mut self.oscillator;
        oscillator.modulated_amplitude.cancel_envelope(
            time_offset,
            DURATION,
            Some(&params.amplitude_modulation_level),
        );
        oscillator
            .amplitude
            .cancel_envelope(time_offset, DURATION, Some(&params.amplitude));

        if R::HAS_SUBHARMONIC {
            oscillator.subharmonic_amplitude.cancel_envelope(
                time_offset,
                DURATION,
                Some(&params.subharmonic_amplitude),
            );
        }

        oscillator.frequency.cancel_envelope(
            time_offset,
            DURATION,
            Some(&params.frequency_modulation_level),
        );
        oscillator.phase.cancel_envelope(
            time_offset,
            DURATION,
            Some(&params.phase_modulation_level),
        );

        oscillator.stop(time_offset + DURATION);

        oscillator
            .fine_detune
            .cancel_envelope(time_offset, DURATION, Some(&params.fine_detune));

        let cancel = |param: &mut FloatParam, leader: &ParamLeader| {
            param.cancel_envelope(time_offset, DURATION, Some(leader));
        };
        self.filter_1.for_each_param(&params.filter_1, cancel);
        self.filter_2.for_each_param(&params.filter_2, cancel);
    }

    /// Whether the oscillator is between a start and its first sample, has a
    /// stop pending, or is about to jump to a new frequency.
    fn is_oscillator_starting_or_stopping_or_expecting_glide(&self) -> bool {
        let frequency = self.oscillator.frequency.param();

        !self.oscillator.is_on()
            || self.oscillator.has_events()
            || (frequency.has_events() && !frequency.is_ramping())
    }

    /// Follows the realtime per-channel tuning: ramps to the held note's
    /// current table frequency when it changed.
    pub fn update_note_frequency_for_realtime_mts_esp(&mut self, context: &VoiceContext<'_>) {
        if self.is_oscillator_starting_or_stopping_or_expecting_glide() {
            return;
        }

        let target = context
            .per_channel_frequencies
            .get(self.channel, self.note);
        let frequency = self.oscillator.frequency.param_mut();
        let remaining = frequency.remaining_time_from_linear_ramp();

        if remaining < INSIGNIFICANT && is_close(target, frequency.value(None), INSIGNIFICANT) {
            return;
        }

        frequency.cancel_events_at(0.0);
        frequency.schedule_linear_ramp(remaining.max(REALTIME_TUNING_RAMP_TIME), target);
    }

    /// Drifts the held note's pitch under an inaccurate tuning. Once the
    /// previous drift ramp is over, the drift source advances (the synced
    /// one at most once per `round`) and a new ramp starts towards the
    /// drifted frequency.
    pub fn update_unstable_note_frequency(&mut self, round: Round, context: &VoiceContext<'_>) {
        if self.is_oscillator_starting_or_stopping_or_expecting_glide() {
            return;
        }

        if self
            .oscillator
            .frequency
            .param()
            .remaining_time_from_linear_ramp()
            > 0.0
        {
            return;
        }

        let tuning = context.params.tuning.value();
        let Some(source) = tuning.drift_source() else {
            return;
        };

        match source {
            DriftSource::Private => self.inaccuracy.advance(),
            DriftSource::Synced => context.synced_inaccuracy.update(round),
        }

        let target = self.calculate_note_frequency(self.note, self.channel, context);

        if is_close(target, self.frequency(), INSIGNIFICANT) {
            return;
        }

        let duration = Tuning::drift_ramp_duration(self.drift(source, context.synced_inaccuracy));
        let frequency = self.oscillator.frequency.param_mut();
        frequency.cancel_events_at(0.0);
        frequency.schedule_linear_ramp(duration, target);
    }

    /// Renders the mono chain for one block. `modulator` is the paired
    /// modulator's [`modulation_out`](Self::modulation_out) for carriers.
    pub fn render(
        &mut self,
        round: Round,
        sample_count: usize,
        params: &VoiceParams,
        modulator: Option<&[Sample]>,
    ) {
        let count = sample_count.min(self.buffer.len());
        let buffer = &mut self.buffer[..count];

        let inputs = OscillatorInputs { params, modulator };
        self.oscillator.initialize_rendering(round, count, &inputs);
        self.oscillator.render(buffer);

        self.filter_1
            .initialize_rendering(round, count, &params.filter_1);
        self.filter_1.render(buffer);

        self.wavefolder
            .initialize_rendering(round, count, &params.folding);
        self.wavefolder.render(buffer);

        if let Some(distortion) = &mut self.distortion {
            distortion.initialize_rendering(round, count, &params.distortion);
            distortion.render(buffer);
        }

        self.filter_2
            .initialize_rendering(round, count, &params.filter_2);
        self.filter_2.render(buffer);

        self.volume_applier
            .initialize_rendering(round, count, &params.volume);
        self.volume_applier.render(buffer);

        self.panning_block = self
            .panning
            .produce_if_not_constant(round, count, Some(&params.panning));
        self.note_panning_block = self
            .note_panning
            .produce_if_not_constant(round, count, None);

        self.rendered = count;
    }

    /// Mono output of the last rendered block, before panning.
    #[inline]
    pub fn modulation_out(&self) -> &[Sample] {
        &self.buffer[..self.rendered]
    }

    /// Pans the last rendered block and adds it, scaled by `gain`, to
    /// `left` and `right`.
    pub fn mix_into(&self, gain: Sample, left: &mut [Sample], right: &mut [Sample]) {
        let output = left.iter_mut().zip(right.iter_mut()).zip(self.modulation_out());

        match (self.panning_block, self.note_panning_block) {
            (ParamBlock::Constant(panning), ParamBlock::Constant(note_panning)) => {
                let (left_gain, right_gain) = panning_gains(panning + note_panning);
                let (left_gain, right_gain) = (gain * left_gain, gain * right_gain);

                for ((left, right), sample) in output {
                    *left += left_gain * sample;
                    *right += right_gain * sample;
                }
            }
            (ParamBlock::Varying, ParamBlock::Constant(note_panning)) => {
                for (((left, right), sample), panning) in output.zip(self.panning.buffer()) {
                    let (left_gain, right_gain) =
                        panning_gains(Number::from(*panning) + note_panning);

                    *left += gain * left_gain * sample;
                    *right += gain * right_gain * sample;
                }
            }
            (ParamBlock::Constant(panning), ParamBlock::Varying) => {
                for (((left, right), sample), note_panning) in
                    output.zip(self.note_panning.buffer())
                {
                    let (left_gain, right_gain) =
                        panning_gains(panning + Number::from(*note_panning));

                    *left += gain * left_gain * sample;
                    *right += gain * right_gain * sample;
                }
            }
            (ParamBlock::Varying, ParamBlock::Varying) => {
                let pannings = self.panning.buffer().iter().zip(self.note_panning.buffer());

                for (((left, right), sample), (panning, note_panning)) in output.zip(pannings) {
                    let (left_gain, right_gain) =
                        panning_gains(Number::from(*panning) + Number::from(*note_panning));

                    *left += gain * left_gain * sample;
                    *right += gain * right_gain * sample;
                }
            }
        }
    }

    /// Returns to the idle state with every parameter at its default and
    /// the private drift back at its seed.
    pub fn reset(&mut self) {
        self.state = VoiceState::Off;
        self.note_id = 0;
        self.note = 0;
        self.channel = 0;
        self.inaccuracy.reset();
        self.oscillator.reset();
        self.filter_1.reset();
        self.wavefolder.reset();

        if let Some(distortion) = &mut self.distortion {
            distortion.reset();
        }

        self.filter_2.reset();
        self.volume_applier.reset();
        self.note_panning.reset();
        self.panning.reset();
        self.panning_block = ParamBlock::Constant(self.panning.value(None));
        self.note_panning_block = ParamBlock::Constant(0.0);
        self.rendered = 0;
    }
}
