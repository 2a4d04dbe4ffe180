//! Parameters driven by another voice's signal.
//!
//! A [`ModulatableParam`] pairs a scheduled [`FloatParam`] with a second one
//! holding the modulation level. When a modulator signal is supplied and the
//! level is significant the rendered block is
//! `value + level * modulator`; otherwise it is the plain parameter.

use crate::float_param::FloatParam;
use crate::math::INSIGNIFICANT;
use crate::param::{ParamBlock, ParamLeader};
use crate::signal::{Number, RenderConfig, Round, Sample, Seconds};

/// A scheduled parameter plus a modulation level.
#[derive(Debug, Clone)]
pub struct ModulatableParam {
    param: FloatParam,
    level: FloatParam,
    cached_round: Option<Round>,
    block: ParamBlock,
}

impl ModulatableParam {
    /// Creates a parameter without a leader of its own; the level follows
    /// `level_leader`.
    pub fn new(
        config: &RenderConfig,
        min: Number,
        max: Number,
        default: Number,
        level_leader: &ParamLeader,
    ) -> Self {
        Self {
            param: FloatParam::new(config, min, max, default),
            level: FloatParam::follower_of(config, level_leader),
            cached_round: None,
            block: ParamBlock::Constant(default),
        }
    }

    /// The unmodulated parameter.
    #[inline]
    pub fn param(&self) -> &FloatParam {
        &self.param
    }

    /// The unmodulated parameter, for scheduling.
    #[inline]
    pub fn param_mut(&mut self) -> &mut FloatParam {
        &mut self.param
    }

    /// Current unmodulated value.
    #[inline]
    pub fn value(&self) -> Number {
        self.param.value(None)
    }

    /// Resolves the parameter for one block, adding `level * modulator`
    /// when a modulator is present and the level is significant.
    pub fn produce_if_not_constant(
        &mut self,
        round: Round,
        sample_count: usize,
        level_leader: Option<&ParamLeader>,
        modulator: Option<&[Sample]>,
    ) -> ParamBlock {
        if self.cached_round == Some(round) {
            return self.block;
        }

        self.cached_round = Some(round);
        self.block = self.resolve(round, sample_count, level_leader, modulator);

        self.block
    }

    fn resolve(
        &mut self,
        round: Round,
        sample_count: usize,
        level_leader: Option<&ParamLeader>,
        modulator: Option<&[Sample]>,
    ) -> ParamBlock {
        let level = self
            .level
            .produce_if_not_constant(round, sample_count, level_leader);

        let Some(modulator) = modulator else {
            return self.param.produce_if_not_constant(round, sample_count, None);
        };

        if level.constant().is_some_and(|level| level <= INSIGNIFICANT) {
            return self.param.produce_if_not_constant(round, sample_count, None);
        }

        let count = self.param.produce(round, sample_count, None).len();
        let count = count.min(modulator.len());
        let buffer = &mut self.param.buffer_mut()[..count];

        match level {
            ParamBlock::Constant(level) => {
                let level = level as Sample;

                for (out, m) in buffer.iter_mut().zip(modulator) {
                    *out += level * m;
                }
            }
            ParamBlock::Varying => {
                let levels = self.level.buffer();

                for ((out, m), level) in buffer.iter_mut().zip(modulator).zip(levels) {
                    *out += level * m;
                }
            }
        }

        ParamBlock::Varying
    }

    /// Samples of the last varying block.
    #[inline]
    pub fn buffer(&self) -> &[Sample] {
        self.param.buffer()
    }

    /// Starts the level's envelope.
    pub fn start_envelope(&mut self, time_offset: Seconds, level_leader: Option<&ParamLeader>) {
        self.level.start_envelope(time_offset, level_leader);
    }

    /// Updates the level's envelope.
    pub fn update_envelope(&mut self, time_offset: Seconds, level_leader: Option<&ParamLeader>) {
        self.level.update_envelope(time_offset, level_leader);
    }

    /// Releases the level's envelope, returning the release time.
    pub fn end_envelope(
        &mut self,
        time_offset: Seconds,
        level_leader: Option<&ParamLeader>,
    ) -> Seconds {
        self.level.end_envelope(time_offset, level_leader)
    }

    /// Cancels the level's envelope over `duration`.
    pub fn cancel_envelope(
        &mut self,
        time_offset: Seconds,
        duration: Seconds,
        level_leader: Option<&ParamLeader>,
    ) {
        self.level.cancel_envelope(time_offset, duration, level_leader);
    }

    /// Cancels pending events of the parameter and its level.
    pub fn cancel_events(&mut self) {
        self.param.cancel_events();
        self.level.cancel_events();
    }

    /// Resets the parameter and its level.
    pub fn reset(&mut self) {
        self.param.reset();
        self.level.reset();
        self.cached_round = None;
        self.block = ParamBlock::Constant(self.param.value(None));
    }
}
