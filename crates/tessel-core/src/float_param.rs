//! Voice-local parameters with sample-accurate scheduling.
//!
//! A [`FloatParam`] belongs to one voice. While its leader has no envelope it
//! simply mirrors the leader's value. Otherwise (or when it has no leader at
//! all, like a note's velocity) it follows its own trajectory built from
//! scheduled events:
//!
//! - **set value** at a time,
//! - **linear ramp** from the value at the previous event to a target,
//! - **cancel**, freezing a running ramp where it is.
//!
//! Envelopes are nothing more than a canned series of such events.
//!
//! ## Rendering
//!
//! Once per round, [`produce_if_not_constant`](FloatParam::produce_if_not_constant)
//! either reports a constant value for the whole block or fills the
//! parameter's buffer with one value per sample.
//!
//! ```rust
//! use tessel_core::{FloatParam, ParamBlock, RenderConfig};
//!
//! let config = RenderConfig::new(100.0, 10);
//! let mut param = FloatParam::new(&config, 0.0, 1.0, 0.0);
//!
//! param.schedule_linear_ramp(0.05, 1.0);
//!
//! assert_eq!(param.produce_if_not_constant(1, 10, None), ParamBlock::Varying);
//! assert!((param.buffer()[2] - 0.4).abs() < 1e-6);
//! assert_eq!(param.buffer()[7], 1.0);
//! assert_eq!(param.produce_if_not_constant(2, 10, None), ParamBlock::Constant(1.0));
//! ```

use alloc::vec;
use alloc::vec::Vec;

use libm::{exp2, log2};

use crate::envelope::{Envelope, EnvelopeStage};
use crate::event_queue::{Event, EventQueue};
use crate::math::{INSIGNIFICANT, clamp, is_close};
use crate::param::{ParamBlock, ParamLeader};
use crate::signal::{Clock, Number, RenderConfig, Round, Sample, Seconds};

/// Pending events per parameter. A full envelope start plus release needs 11.
const EVENT_CAPACITY: usize = 32;

/// Ramp time used when a changed sustain level is picked up mid-note.
pub const ENVELOPE_UPDATE_RAMP_TIME: Seconds = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParamEvent {
    SetValue(Number),
    LinearRamp {
        duration: Seconds,
        target: Number,
        logarithmic: bool,
    },
    Cancel,
}

/// Progress of a running ramp, counted in samples.
#[derive(Debug, Clone, Default)]
struct LinearRamp {
    start_time: Seconds,
    initial: Number,
    delta: Number,
    target: Number,
    duration: Seconds,
    duration_in_samples: Number,
    done_samples: Number,
    speed: Number,
    logarithmic: bool,
    is_done: bool,
}

impl LinearRamp {
    #[allow(clippy::too_many_arguments)]
    fn start(
        &mut self,
        start_time: Seconds,
        value: Number,
        target: Number,
        duration: Seconds,
        elapsed_samples: Number,
        sample_rate: Number,
        logarithmic: bool,
    ) {
        let logarithmic = logarithmic && value > 0.0 && target > 0.0;
        let (from, to) = if logarithmic {
            (log2(value), log2(target))
        } else {
            (value, target)
        };

        self.start_time = start_time;
        self.initial = from;
        self.delta = to - from;
        self.target = target;
        self.duration = duration;
        self.duration_in_samples = duration * sample_rate;
        self.done_samples = elapsed_samples;
        self.speed = if self.duration_in_samples > 0.0 {
            1.0 / self.duration_in_samples
        } else {
            0.0
        };
        self.logarithmic = logarithmic;
        self.is_done = self.done_samples >= self.duration_in_samples;
    }

    #[inline]
    fn value_at_ratio(&self, ratio: Number) -> Number {
        let value = self.initial + self.delta * ratio;

        if self.logarithmic { exp2(value) } else { value }
    }

    #[inline]
    fn advance(&mut self) -> Number {
        if self.is_done {
            return self.target;
        }

        let value = self.value_at_ratio(self.done_samples * self.speed);
        self.done_samples += 1.0;
        self.is_done = self.done_samples >= self.duration_in_samples;

        value
    }

    fn value_at(&self, elapsed: Seconds) -> Number {
        if self.duration <= 0.0 || elapsed >= self.duration {
            self.target
        } else {
            self.value_at_ratio(elapsed.max(0.0) / self.duration)
        }
    }

    fn remaining_samples(&self) -> Number {
        (self.duration_in_samples - self.done_samples).max(0.0)
    }
}

/// A voice's own copy of a parameter, with scheduled trajectory and
/// envelope playback.
#[derive(Debug, Clone)]
pub struct FloatParam {
    min: Number,
    max: Number,
    default: Number,
    value: Number,
    clock: Clock,
    events: EventQueue<ParamEvent, EVENT_CAPACITY>,
    ramp: LinearRamp,
    /// The latest handled event was a ramp.
    is_ramping: bool,
    buffer: Vec<Sample>,
    block: ParamBlock,
    envelope: Option<Envelope>,
    envelope_stage: EnvelopeStage,
    envelope_canceled: bool,
    envelope_cancel_duration: Seconds,
    envelope_release_time: Seconds,
    envelope_final_value: Number,
}

impl FloatParam {
    /// Creates a parameter with its own range and a block buffer sized to
    /// `config.block_size`.
    pub fn new(config: &RenderConfig, min: Number, max: Number, default: Number) -> Self {
        let default = clamp(default, min, max);

        Self {
            min,
            max,
            default,
            value: default,
            clock: Clock::new(config),
            events: EventQueue::new(),
            ramp: LinearRamp::default(),
            is_ramping: false,
            buffer: vec![default as Sample; config.block_size],
            block: ParamBlock::Constant(default),
            envelope: None,
            envelope_stage: EnvelopeStage::None,
            envelope_canceled: false,
            envelope_cancel_duration: 0.0,
            envelope_release_time: 0.0,
            envelope_final_value: 0.0,
        }
    }

    /// Creates a parameter sharing `leader`'s range and default.
    pub fn follower_of(config: &RenderConfig, leader: &ParamLeader) -> Self {
        Self::new(config, leader.min(), leader.max(), leader.default_value())
    }

    /// The leader whose value is mirrored, if any.
    #[inline]
    fn followed(leader: Option<&ParamLeader>) -> Option<&ParamLeader> {
        leader.filter(|leader| !leader.has_envelope())
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

    /// Current value, or the leader's while it is being mirrored.
    #[inline]
    pub fn value(&self, leader: Option<&ParamLeader>) -> Number {
        match Self::followed(leader) {
            Some(leader) => leader.value(),
            None => self.value,
        }
    }

    /// Sets the value immediately, without touching pending events.
    pub fn set_value(&mut self, value: Number) {
        self.value = clamp(value, self.min, self.max);
        self.is_ramping = false;
    }

    /// Whether the leader drives this parameter through an envelope.
    #[inline]
    pub fn has_envelope(leader: Option<&ParamLeader>) -> bool {
        leader.is_some_and(ParamLeader::has_envelope)
    }

    /// Schedules a jump to `value` at `time_offset`.
    pub fn schedule_value(&mut self, time_offset: Seconds, value: Number) {
        let time = self.clock.absolute(time_offset);
        self.events.push(ParamEvent::SetValue(value), time);
    }

    /// Schedules a linear ramp to `target` starting at the last scheduled
    /// event (or now) and lasting `duration`.
    pub fn schedule_linear_ramp(&mut self, duration: Seconds, target: Number) {
        self.schedule_ramp(duration, target, false);
    }

    fn schedule_ramp(&mut self, duration: Seconds, target: Number, logarithmic: bool) {
        let start = self.last_event_time();
        let duration = duration.max(0.0);

        self.events.push(
            ParamEvent::LinearRamp {
                duration,
                target,
                logarithmic,
            },
            start,
        );
        self.events.push(
            ParamEvent::SetValue(clamp(target, self.min, self.max)),
            start + duration,
        );
    }

    fn last_event_time(&self) -> Seconds {
        let now = self.clock.current_time();

        self.events.last_time().map_or(now, |time| time.max(now))
    }

    /// Time of the last scheduled event relative to now, or zero.
    pub fn last_event_time_offset(&self) -> Seconds {
        self.clock.relative(self.last_event_time())
    }

    /// Drops events at or after `time_offset` and freezes a running ramp at
    /// the value it has at that time.
    pub fn cancel_events_at(&mut self, time_offset: Seconds) {
        let time = self.clock.absolute(time_offset);

        self.events.drop_from(time);
        self.events.push(ParamEvent::Cancel, time);
    }

    /// Drops every pending event and freezes the value at the start of the
    /// next block.
    pub fn cancel_events(&mut self) {
        self.cancel_events_at(0.0);
    }

    /// Whether any event is pending.
    #[inline]
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Whether an event is pending after `time_offset`.
    #[inline]
    pub fn has_events_after(&self, time_offset: Seconds) -> bool {
        self.events.has_events_after(self.clock.absolute(time_offset))
    }

    /// Whether a ramp is in progress.
    #[inline]
    pub fn is_ramping(&self) -> bool {
        self.is_ramping && !self.ramp.is_done
    }

    /// Time left until the running ramp reaches its target, or zero.
    pub fn remaining_time_from_linear_ramp(&self) -> Seconds {
        if self.is_ramping() {
            self.ramp.remaining_samples() * self.clock.sampling_period()
        } else {
            0.0
        }
    }

    /// Phase of the envelope this parameter is following.
    #[inline]
    pub fn envelope_stage(&self) -> EnvelopeStage {
        self.envelope_stage
    }

    /// Starts `leader`'s envelope at `time_offset`: initial level, delay,
    /// attack to peak, hold, decay to sustain. No-op without an envelope.
    pub fn start_envelope(&mut self, time_offset: Seconds, leader: Option<&ParamLeader>) {
        let Some(leader) = leader else {
            return;
        };
        let Some(envelope) = leader.envelope().copied() else {
            return;
        };

        self.capture_envelope(leader, envelope);
        self.envelope_stage = EnvelopeStage::Dahds;
        self.envelope_canceled = false;

        let level = |ratio: Number| leader.ratio_to_value(envelope.amount * ratio);
        let logarithmic = leader.is_logarithmic();
        let initial = level(envelope.initial_value);
        let peak = level(envelope.peak_value);
        let attack_start = time_offset + envelope.delay_time;
        let hold_end = attack_start + envelope.attack_time + envelope.hold_time;

        self.cancel_events_at(time_offset);
        self.schedule_value(time_offset, initial);
        self.schedule_value(attack_start, initial);
        self.schedule_ramp(envelope.attack_time, peak, logarithmic);
        self.schedule_value(hold_end, peak);
        self.schedule_ramp(
            envelope.decay_time,
            level(envelope.sustain_value),
            logarithmic,
        );
    }

    /// Picks up changes made to `leader`'s envelope since it was started.
    ///
    /// New release and final levels apply to the coming release. A changed
    /// sustain level is approached over [`ENVELOPE_UPDATE_RAMP_TIME`] once
    /// the decay has finished.
    pub fn update_envelope(&mut self, time_offset: Seconds, leader: Option<&ParamLeader>) {
        let Some(leader) = leader else {
            return;
        };
        let Some(envelope) = leader.envelope().copied() else {
            return;
        };

        if self.envelope == Some(envelope) {
            return;
        }

        let sustain_changed = self.envelope.is_none_or(|old| {
            !is_close(
                old.amount * old.sustain_value,
                envelope.amount * envelope.sustain_value,
                INSIGNIFICANT,
            )
        });

        self.capture_envelope(leader, envelope);

        if self.envelope_stage == EnvelopeStage::Dahds && sustain_changed && !self.has_events() {
            self.cancel_events_at(time_offset);
            self.schedule_ramp(
                ENVELOPE_UPDATE_RAMP_TIME,
                leader.ratio_to_value(envelope.amount * envelope.sustain_value),
                leader.is_logarithmic(),
            );
        }
    }

    /// Starts the release at `time_offset` and returns its duration.
    ///
    /// After [`cancel_envelope`](Self::cancel_envelope) this schedules
    /// nothing and returns the cancellation duration. Without an envelope it
    /// returns zero.
    pub fn end_envelope(&mut self, time_offset: Seconds, leader: Option<&ParamLeader>) -> Seconds {
        let Some(leader) = leader else {
            return 0.0;
        };
        let Some(envelope) = leader.envelope().copied() else {
            return 0.0;
        };

        if self.envelope_canceled {
            return self.envelope_cancel_duration;
        }

        if self.envelope.is_none() {
            self.capture_envelope(leader, envelope);
        }

        let release_time = self.envelope_release_time;
        self.release(time_offset, release_time, leader.is_logarithmic());

        release_time
    }

    /// Releases to the final level over `duration` instead of the envelope's
    /// own release time.
    pub fn cancel_envelope(
        &mut self,
        time_offset: Seconds,
        duration: Seconds,
        leader: Option<&ParamLeader>,
    ) {
        let Some(leader) = leader else {
            return;
        };
        let Some(envelope) = leader.envelope().copied() else {
            return;
        };

        if self.envelope.is_none() {
            self.capture_envelope(leader, envelope);
        }

        self.envelope_canceled = true;
        self.envelope_cancel_duration = duration;
        self.release(time_offset, duration, leader.is_logarithmic());
    }

    fn release(&mut self, time_offset: Seconds, duration: Seconds, logarithmic: bool) {
        self.envelope_stage = EnvelopeStage::Release;
        self.cancel_events_at(time_offset);
        self.schedule_ramp(duration, self.envelope_final_value, logarithmic);
    }

    fn capture_envelope(&mut self, leader: &ParamLeader, envelope: Envelope) {
        self.envelope = Some(envelope);
        self.envelope_release_time = envelope.release_time;
        self.envelope_final_value =
            leader.ratio_to_value(envelope.amount * envelope.final_value);
    }

    /// Value the envelope settles on after its release.
    #[inline]
    pub fn envelope_final_value(&self) -> Number {
        self.envelope_final_value
    }

    /// Whether the parameter fell silent during the delay-attack-hold-decay
    /// phase of an envelope that also ends in silence.
    pub fn has_decayed_during_envelope_dahds(&self, leader: Option<&ParamLeader>) -> bool {
        Self::has_envelope(leader)
            && self.envelope_stage == EnvelopeStage::Dahds
            && !self.has_events()
            && self.value < INSIGNIFICANT
            && self.envelope_final_value < INSIGNIFICANT
    }

    /// Resolves the parameter for `sample_count` samples of `round`.
    ///
    /// Returns [`ParamBlock::Constant`] when the value does not change during
    /// the block, otherwise renders [`buffer`](Self::buffer) and returns
    /// [`ParamBlock::Varying`]. Repeated calls within a round return the
    /// first result.
    pub fn produce_if_not_constant(
        &mut self,
        round: Round,
        sample_count: usize,
        leader: Option<&ParamLeader>,
    ) -> ParamBlock {
        if !self.clock.begin_round(round) {
            return self.block;
        }

        self.block = if let Some(leader) = Self::followed(leader) {
            self.skip_block(sample_count);
            ParamBlock::Constant(leader.value())
        } else if self.is_constant_in_next_block(sample_count) {
            self.skip_block(sample_count);
            ParamBlock::Constant(self.value)
        } else {
            self.render_block(sample_count);
            ParamBlock::Varying
        };

        self.block
    }

    /// Like [`produce_if_not_constant`](Self::produce_if_not_constant) but
    /// always returns the rendered samples.
    pub fn produce(
        &mut self,
        round: Round,
        sample_count: usize,
        leader: Option<&ParamLeader>,
    ) -> &[Sample] {
        let count = sample_count.min(self.buffer.len());

        if let ParamBlock::Constant(value) =
            self.produce_if_not_constant(round, sample_count, leader)
        {
            self.buffer[..count].fill(value as Sample);
            self.block = ParamBlock::Varying;
        }

        &self.buffer[..count]
    }

    /// Samples rendered by the last varying block.
    #[inline]
    pub fn buffer(&self) -> &[Sample] {
        &self.buffer
    }

    #[inline]
    pub(crate) fn buffer_mut(&mut self) -> &mut [Sample] {
        &mut self.buffer
    }

    fn is_constant_in_next_block(&self, sample_count: usize) -> bool {
        if self.is_ramping() {
            return false;
        }

        let last_sample_time = self.clock.sample_time(sample_count.saturating_sub(1));

        !self.events.has_due(last_sample_time)
    }

    fn skip_block(&mut self, sample_count: usize) {
        let last_sample_time = self.clock.sample_time(sample_count.saturating_sub(1));

        while let Some(event) = self.events.pop_due(last_sample_time) {
            self.handle_event(event, last_sample_time);
        }

        if self.is_ramping {
            self.value = self.ramp.target;
        }

        self.clock.advance(sample_count);
    }

    fn render_block(&mut self, sample_count: usize) {
        let count = sample_count.min(self.buffer.len());

        for i in 0..count {
            let now = self.clock.sample_time(i);

            while let Some(event) = self.events.pop_due(now) {
                self.handle_event(event, now);
            }

            if self.is_ramping {
                self.value = self.ramp.advance();
            }

            self.buffer[i] = self.value as Sample;
        }

        self.clock.advance(sample_count);
    }

    fn handle_event(&mut self, event: Event<ParamEvent>, now: Seconds) {
        match event.kind {
            ParamEvent::SetValue(value) => {
                self.is_ramping = false;
                self.value = clamp(value, self.min, self.max);
            }
            ParamEvent::LinearRamp {
                duration,
                target,
                logarithmic,
            } => {
                let (target, duration) = self.clamp_ramp(self.value, target, duration);
                let sample_rate = self.clock.sample_rate();
                let elapsed_samples = (now - event.time).max(0.0) * sample_rate;

                self.ramp.start(
                    event.time,
                    self.value,
                    target,
                    duration,
                    elapsed_samples,
                    sample_rate,
                    logarithmic,
                );
                self.is_ramping = true;
            }
            ParamEvent::Cancel => {
                if self.is_ramping {
                    self.value = self.ramp.value_at(event.time - self.ramp.start_time);
                    self.is_ramping = false;
                }
            }
        }
    }

    /// Keeps a ramp's target in range, shortening it so the slope is kept.
    fn clamp_ramp(&self, start: Number, target: Number, duration: Seconds) -> (Number, Seconds) {
        let limit = if target > self.max {
            self.max
        } else if target < self.min {
            self.min
        } else {
            return (target, duration);
        };

        let distance = target - start;
        let duration = if distance == 0.0 {
            0.0
        } else {
            (duration * (limit - start) / distance).max(0.0)
        };

        (limit, duration)
    }

    /// Drops every event and envelope state and returns to the default value.
    pub fn reset(&mut self) {
        self.events.clear();
        self.clock.reset();
        self.value = self.default;
        self.is_ramping = false;
        self.block = ParamBlock::Constant(self.default);
        self.envelope = None;
        self.envelope_stage = EnvelopeStage::None;
        self.envelope_canceled = false;
        self.envelope_cancel_duration = 0.0;
        self.envelope_release_time = 0.0;
        self.envelope_final_value = 0.0;
    }
}
