//! Triangle wavefolder.
//!
//! Amplifies the signal by `1 + folding` and reflects everything beyond
//! `[-1, 1]` back into range, adding harmonics as the folding grows.

use tessel_core::{
    FloatParam, Number, ParamBlock, ParamLeader, RenderConfig, Round, Sample, SignalProducer, fold,
};

/// Folding amounts below this leave the signal untouched.
const FOLDING_EPSILON: Number = 0.000_001;

/// Wavefolder stage.
#[derive(Debug, Clone)]
pub struct Wavefolder {
    pub(crate) folding: FloatParam,
    folding_block: ParamBlock,
}

impl Wavefolder {
    /// Creates a wavefolder whose folding follows `folding_leader`.
    pub fn new(config: &RenderConfig, folding_leader: &ParamLeader) -> Self {
        Self {
            folding: FloatParam::follower_of(config, folding_leader),
            folding_block: ParamBlock::Constant(folding_leader.value()),
        }
    }
}

impl SignalProducer<ParamLeader> for Wavefolder {
    fn initialize_rendering(&mut self, round: Round, sample_count: usize, folding_leader: &ParamLeader) {
        self.folding_block =
            self.folding
                .produce_if_not_constant(round, sample_count, Some(folding_leader));
    }

    fn render(&mut self, buffer: &mut [Sample]) {
        match self.folding_block {
            ParamBlock::Constant(folding) if folding < FOLDING_EPSILON => {}
            ParamBlock::Constant(folding) => {
                let gain = (1.0 + folding) as Sample;

                for sample in buffer.iter_mut() {
                    *sample = fold(gain * *sample);
                }
            }
            ParamBlock::Varying => {
                for (sample, folding) in buffer.iter_mut().zip(self.folding.buffer()) {
                    *sample = fold((1.0 + folding) * *sample);
                }
            }
        }
    }

    fn reset(&mut self) {
        self.folding.reset();
        self.folding_block = ParamBlock::Constant(self.folding.value(None));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RenderConfig {
        RenderConfig::new(1000.0, 4)
    }

    #[test]
    fn test_zero_folding_is_identity() {
        let leader = ParamLeader::new(0.0, 5.0, 0.0);
        let mut folder = Wavefolder::new(&config(), &leader);
        let mut buffer = [1.5, -2.0, 0.3, 0.0];

        folder.initialize_rendering(1, 4, &leader);
        folder.render(&mut buffer);

        assert_eq!(buffer, [1.5, -2.0, 0.3, 0.0]);
    }

    #[test]
    fn test_folding_reflects_into_range() {
        let leader = ParamLeader::new(0.0, 5.0, 1.0);
        let mut folder = Wavefolder::new(&config(), &leader);
        let mut buffer = [0.25, 0.75, -0.75, 1.0];

        folder.initialize_rendering(1, 4, &leader);
        folder.render(&mut buffer);

        // Doubled: 0.5 stays, 1.5 folds to 0.5, -1.5 to -0.5, 2.0 to 0.0.
        let expected = [0.5, 0.5, -0.5, 0.0];
        for (actual, expected) in buffer.iter().zip(expected) {
            assert!((actual - expected).abs() < 1e-6, "{actual} vs {expected}");
        }
    }
}
