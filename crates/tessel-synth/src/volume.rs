//! Last mono stage of a voice: note velocity times volume.

use tessel_core::{
    FloatParam, ParamBlock, ParamLeader, RenderConfig, Round, Sample, SignalProducer,
};

/// Scales the signal by the note's velocity and the role's volume.
#[derive(Debug, Clone)]
pub struct VolumeApplier {
    pub(crate) velocity: FloatParam,
    pub(crate) volume: FloatParam,
    velocity_block: ParamBlock,
    volume_block: ParamBlock,
}

impl VolumeApplier {
    /// Creates a volume stage following `volume_leader`, at full velocity.
    pub fn new(config: &RenderConfig, volume_leader: &ParamLeader) -> Self {
        Self {
            velocity: FloatParam::new(config, 0.0, 1.0, 1.0),
            volume: FloatParam::follower_of(config, volume_leader),
            velocity_block: ParamBlock::Constant(1.0),
            volume_block: ParamBlock::Constant(volume_leader.value()),
        }
    }
}

impl SignalProducer<ParamLeader> for VolumeApplier {
    fn initialize_rendering(&mut self, round: Round, sample_count: usize, volume_leader: &ParamLeader) {
        self.velocity_block = self
            .velocity
            .produce_if_not_constant(round, sample_count, None);
        self.volume_block =
            self.volume
                .produce_if_not_constant(round, sample_count, Some(volume_leader));
    }

    fn render(&mut self, buffer: &mut [Sample]) {
        match (self.velocity_block, self.volume_block) {
            (ParamBlock::Constant(velocity), ParamBlock::Constant(volume)) => {
                let gain = (velocity * volume) as Sample;

                for sample in buffer.iter_mut() {
                    *sample *= gain;
                }
            }
            (ParamBlock::Constant(velocity), ParamBlock::Varying) => {
                let velocity = velocity as Sample;

                for (sample, volume) in buffer.iter_mut().zip(self.volume.buffer()) {
                    *sample *= velocity * volume;
                }
            }
            (ParamBlock::Varying, ParamBlock::Constant(volume)) => {
                let volume = volume as Sample;

                for (sample, velocity) in buffer.iter_mut().zip(self.velocity.buffer()) {
                    *sample *= velocity * volume;
                }
            }
            (ParamBlock::Varying, ParamBlock::Varying) => {
                let gains = self.velocity.buffer().iter().zip(self.volume.buffer());

                for (sample, (velocity, volume)) in buffer.iter_mut().zip(gains) {
                    *sample *= velocity * volume;
                }
            }
        }
    }

    fn reset(&mut self) {
        self.velocity.reset();
        self.volume.reset();
        self.velocity_block = ParamBlock::Constant(self.velocity.value(None));
        self.volume_block = ParamBlock::Constant(self.volume.value(None));
    }
}
