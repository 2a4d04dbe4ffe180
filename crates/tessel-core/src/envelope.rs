//! DAHDSR envelope definition.
//!
//! An [`Envelope`] is a plain description of a shape: delay, attack, hold,
//! decay, sustain, release, with every level given as a ratio in `[0, 1]`
//! of the target parameter's range. It carries no playback state; each
//! voice-local [`FloatParam`](crate::FloatParam) turns it into scheduled
//! events when a note starts or ends.
//!
//! ```text
//!  peak ─────────┐┌──── hold ────┐
//!               / │              \
//!              /  │               \ decay
//!  initial ───┘   │                \_______ sustain ______
//!       delay  attack                                      \ release
//!                                                           \__ final
//! ```

use crate::math::clamp;
use crate::signal::{Number, Seconds};

/// Longest duration accepted for any single envelope stage.
pub const MAX_STAGE_TIME: Seconds = 6.0;

/// Shape of a DAHDSR envelope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    /// Scales every level.
    pub amount: Number,
    /// Level at note start.
    pub initial_value: Number,
    /// Time spent at the initial level.
    pub delay_time: Seconds,
    /// Time to reach the peak.
    pub attack_time: Seconds,
    /// Level reached by the attack.
    pub peak_value: Number,
    /// Time spent at the peak.
    pub hold_time: Seconds,
    /// Time to fall from peak to sustain.
    pub decay_time: Seconds,
    /// Level held until note off.
    pub sustain_value: Number,
    /// Time to fall to the final level after note off.
    pub release_time: Seconds,
    /// Level after the release.
    pub final_value: Number,
}

impl Envelope {
    /// Creates an envelope with the default shape.
    pub fn new() -> Self {
        Self {
            amount: 1.0,
            initial_value: 0.0,
            delay_time: 0.0,
            attack_time: 0.02,
            peak_value: 1.0,
            hold_time: 0.3,
            decay_time: 0.6,
            sustain_value: 0.7,
            release_time: 0.1,
            final_value: 0.0,
        }
    }

    /// Returns a copy with levels clamped to `[0, 1]` and times to
    /// `[0, MAX_STAGE_TIME]`.
    pub fn clamped(self) -> Self {
        let level = |v: Number| clamp(v, 0.0, 1.0);
        let time = |t: Seconds| clamp(t, 0.0, MAX_STAGE_TIME);

        Self {
            amount: level(self.amount),
            initial_value: level(self.initial_value),
            delay_time: time(self.delay_time),
            attack_time: time(self.attack_time),
            peak_value: level(self.peak_value),
            hold_time: time(self.hold_time),
            decay_time: time(self.decay_time),
            sustain_value: level(self.sustain_value),
            release_time: time(self.release_time),
            final_value: level(self.final_value),
        }
    }

    /// Total time from note start until the sustain level is reached.
    pub fn dahds_duration(&self) -> Seconds {
        self.delay_time + self.attack_time + self.hold_time + self.decay_time
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

/// Which part of an envelope a parameter is currently following.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeStage {
    /// No envelope started since the last reset.
    #[default]
    None,
    /// Delay, attack, hold, decay, then sustain.
    Dahds,
    /// Release after note off or cancellation.
    Release,
}
