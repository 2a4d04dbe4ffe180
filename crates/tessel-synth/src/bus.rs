//! The pool of modulator/carrier voice pairs and its stereo mix.
//!
//! The bus owns everything voices share: the leaders of both roles, the
//! frequency tables, the synced [`Inaccuracy`] and the round counter. It
//! does not decide which slot plays which note; the caller picks a slot and
//! the bus forwards the lifecycle call to both voices of that pair.
//!
//! Each block the bus:
//!
//! 1. advances the round,
//! 2. lets sounding voices follow realtime or drifting tunings,
//! 3. renders each sounding modulator, then its carrier modulated by it,
//! 4. mixes carriers and `modulator_mix × modulator` into the stereo output.

use alloc::sync::Arc;
use alloc::vec::Vec;

use tessel_core::{Number, ParamLeader, RenderConfig, Round, Sample, Seconds};

use crate::inaccuracy::Inaccuracy;
use crate::params::VoiceParams;
use crate::tuning::{FrequencyTable, PerChannelFrequencyTable, Tuning};
use crate::voice::{Carrier, Modulator, Note, NoteId, Role, Voice, VoiceContext};
use crate::wavetable::StandardWaveforms;

/// A modulator and the carrier it drives.
#[derive(Debug, Clone)]
pub struct VoicePair {
    modulator: Voice<Modulator>,
    carrier: Voice<Carrier>,
}

impl VoicePair {
    /// The modulating voice.
    #[inline]
    pub fn modulator(&self) -> &Voice<Modulator> {
        &self.modulator
    }

    /// The modulated voice.
    #[inline]
    pub fn carrier(&self) -> &Voice<Carrier> {
        &self.carrier
    }

    /// Whether either voice still has to be rendered.
    #[inline]
    pub fn is_on(&self) -> bool {
        self.modulator.is_on() || self.carrier.is_on()
    }
}

/// Fixed pool of voice pairs rendering into a stereo buffer.
#[derive(Debug)]
pub struct Bus {
    config: RenderConfig,
    modulator_params: VoiceParams,
    carrier_params: VoiceParams,
    modulator_mix: ParamLeader,
    frequencies: FrequencyTable,
    per_channel_frequencies: PerChannelFrequencyTable,
    synced_inaccuracy: Inaccuracy,
    pairs: Vec<VoicePair>,
    round: Round,
}

impl Bus {
    /// Creates `polyphony` idle pairs. Voice drift seeds are derived from
    /// `inaccuracy_seed`, which also seeds the synced drift; both voices of
    /// a pair share a seed so they drift together.
    pub fn new(config: RenderConfig, polyphony: usize, inaccuracy_seed: Number) -> Self {
        let standard_waveforms = Arc::new(StandardWaveforms::new());
        let modulator_params = VoiceParams::new();
        let carrier_params = VoiceParams::new();

        let mut seed = inaccuracy_seed;
        let pairs = (0..polyphony)
            .map(|_| {
                seed = Inaccuracy::next_after(seed);

                VoicePair {
                    modulator: Voice::new(
                        &config,
                        &modulator_params,
                        Arc::clone(&standard_waveforms),
                        seed,
                    ),
                    carrier: Voice::new(
                        &config,
                        &carrier_params,
                        Arc::clone(&standard_waveforms),
                        seed,
                    ),
                }
            })
            .collect();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            polyphony,
            sample_rate = config.sample_rate,
            block_size = config.block_size,
            "bus created"
        );

        Self {
            config,
            modulator_params,
            carrier_params,
            modulator_mix: ParamLeader::new(0.0, 1.0, 1.0),
            frequencies: FrequencyTable::new(),
            per_channel_frequencies: PerChannelFrequencyTable::new(),
            synced_inaccuracy: Inaccuracy::new(inaccuracy_seed),
            pairs,
            round: 0,
        }
    }

    /// Sample rate and block size.
    #[inline]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Number of voice pairs.
    #[inline]
    pub fn polyphony(&self) -> usize {
        self.pairs.len()
    }

    /// Last rendered round.
    #[inline]
    pub fn round(&self) -> Round {
        self.round
    }

    /// Leaders of every modulator.
    #[inline]
    pub fn modulator_params(&self) -> &VoiceParams {
        &self.modulator_params
    }

    /// Leaders of every modulator, for changing.
    #[inline]
    pub fn modulator_params_mut(&mut self) -> &mut VoiceParams {
        &mut self.modulator_params
    }

    /// Leaders of every carrier.
    #[inline]
    pub fn carrier_params(&self) -> &VoiceParams {
        &self.carrier_params
    }

    /// Leaders of every carrier, for changing.
    #[inline]
    pub fn carrier_params_mut(&mut self) -> &mut VoiceParams {
        &mut self.carrier_params
    }

    /// How much of the modulators' own output reaches the mix.
    #[inline]
    pub fn modulator_mix(&self) -> &ParamLeader {
        &self.modulator_mix
    }

    /// How much of the modulators' own output reaches the mix, for changing.
    #[inline]
    pub fn modulator_mix_mut(&mut self) -> &mut ParamLeader {
        &mut self.modulator_mix
    }

    /// Selects `tuning` for both roles.
    pub fn set_tuning(&mut self, tuning: Tuning) {
        self.modulator_params.tuning.set_value(tuning);
        self.carrier_params.tuning.set_value(tuning);
    }

    /// Table written by an external realtime tuning source.
    #[inline]
    pub fn per_channel_frequencies_mut(&mut self) -> &mut PerChannelFrequencyTable {
        &mut self.per_channel_frequencies
    }

    /// The drift shared by every voice.
    #[inline]
    pub fn synced_inaccuracy(&self) -> &Inaccuracy {
        &self.synced_inaccuracy
    }

    /// The pair in `slot`.
    #[inline]
    pub fn pair(&self, slot: usize) -> Option<&VoicePair> {
        self.pairs.get(slot)
    }

    /// Every pair.
    pub fn pairs(&self) -> impl Iterator<Item = &VoicePair> {
        self.pairs.iter()
    }

    /// Number of pairs that still have to be rendered.
    pub fn active_pairs(&self) -> usize {
        self.pairs.iter().filter(|pair| pair.is_on()).count()
    }

    /// Runs `f` on both voices of `slot` with their role's context. Ignores
    /// slots outside the pool.
    fn with_slot(
        &mut self,
        slot: usize,
        f: impl FnOnce(&mut Voice<Modulator>, &VoiceContext<'_>, &mut Voice<Carrier>, &VoiceContext<'_>),
    ) {
        let Some(pair) = self.pairs.get_mut(slot) else {
            return;
        };

        let modulator_context = VoiceContext {
            params: &self.modulator_params,
            frequencies: &self.frequencies,
            per_channel_frequencies: &self.per_channel_frequencies,
            synced_inaccuracy: &self.synced_inaccuracy,
        };
        let carrier_context = VoiceContext {
            params: &self.carrier_params,
            ..modulator_context
        };

        f(
            &mut pair.modulator,
            &modulator_context,
            &mut pair.carrier,
            &carrier_context,
        );
    }

    /// Starts `note` on the pair in `slot`.
    pub fn note_on(&mut self, slot: usize, time_offset: Seconds, note: Note) {
        self.with_slot(slot, |modulator, modulator_context, carrier, carrier_context| {
            modulator.note_on(time_offset, note, modulator_context);
            carrier.note_on(time_offset, note, carrier_context);
        });
    }

    /// Releases the note held by the pair in `slot` if it matches.
    pub fn note_off(&mut self, slot: usize, time_offset: Seconds, note_id: NoteId, note: u8) {
        self.with_slot(slot, |modulator, modulator_context, carrier, carrier_context| {
            modulator.note_off(time_offset, note_id, note, modulator_context.params);
            carrier.note_off(time_offset, note_id, note, carrier_context.params);
        });
    }

    /// Fades out the pair in `slot` and starts `note` after the fade.
    pub fn retrigger(&mut self, slot: usize, time_offset: Seconds, note: Note) {
        self.with_slot(slot, |modulator, modulator_context, carrier, carrier_context| {
            modulator.retrigger(time_offset, note, modulator_context);
            carrier.retrigger(time_offset, note, carrier_context);
        });
    }

    /// Glides the pair in `slot` to `note`.
    pub fn glide_to(&mut self, slot: usize, time_offset: Seconds, note: Note) {
        self.with_slot(slot, |modulator, modulator_context, carrier, carrier_context| {
            modulator.glide_to(time_offset, note, modulator_context);
            carrier.glide_to(time_offset, note, carrier_context);
        });
    }

    /// Silences the pair in `slot` without a fade.
    pub fn cancel_note(&mut self, slot: usize) {
        if let Some(pair) = self.pairs.get_mut(slot) {
            pair.modulator.cancel_note();
            pair.carrier.cancel_note();
        }
    }

    /// Fades out the pair in `slot`.
    pub fn cancel_note_smoothly(&mut self, slot: usize, time_offset: Seconds) {
        self.with_slot(slot, |modulator, modulator_context, carrier, carrier_context| {
            modulator.cancel_note_smoothly(time_offset, modulator_context.params);
            carrier.cancel_note_smoothly(time_offset, carrier_context.params);
        });
    }

    /// Renders into `left` and `right`, overwriting them. Buffers longer
    /// than the block size are rendered in several rounds; samples past the
    /// shorter buffer are left untouched.
    pub fn render(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        let sample_count = left.len().min(right.len());
        let block_size = self.config.block_size.max(1);

        for (left, right) in left[..sample_count]
            .chunks_mut(block_size)
            .zip(right[..sample_count].chunks_mut(block_size))
        {
            self.render_block(left, right);
        }
    }

    fn render_block(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        self.round += 1;

        left.fill(0.0);
        right.fill(0.0);

        let round = self.round;
        let sample_count = left.len();
        let modulator_mix = self.modulator_mix.value() as Sample;
        let modulator_context = VoiceContext {
            params: &self.modulator_params,
            frequencies: &self.frequencies,
            per_channel_frequencies: &self.per_channel_frequencies,
            synced_inaccuracy: &self.synced_inaccuracy,
        };
        let carrier_context = VoiceContext {
            params: &self.carrier_params,
            ..modulator_context
        };

        for pair in &mut self.pairs {
            let modulator = &mut pair.modulator;
            let carrier = &mut pair.carrier;
            let modulator_is_on = modulator.is_on();

            if modulator_is_on {
                update_tuning(modulator, round, &modulator_context);
                modulator.render(round, sample_count, modulator_context.params, None);
                modulator.mix_into(modulator_mix, left, right);
            }

            if carrier.is_on() {
                update_tuning(carrier, round, &carrier_context);
                carrier.render(
                    round,
                    sample_count,
                    carrier_context.params,
                    modulator_is_on.then(|| modulator.modulation_out()),
                );
                carrier.mix_into(1.0, left, right);
            }
        }
    }

    /// Returns every voice, the synced drift and the round counter to their
    /// initial state. Leaders and tables keep their values.
    pub fn reset(&mut self) {
        for pair in &mut self.pairs {
            pair.modulator.reset();
            pair.carrier.reset();
        }

        self.synced_inaccuracy.reset();
        self.round = 0;
    }
}

fn update_tuning<R: Role>(voice: &mut Voice<R>, round: Round, context: &VoiceContext<'_>) {
    let tuning = context.params.tuning.value();

    if tuning.is_realtime() {
        voice.update_note_frequency_for_realtime_mts_esp(context);
    } else if tuning.is_unstable() {
        voice.update_unstable_note_frequency(round, context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::SMOOTH_NOTE_CANCELLATION_DURATION;
    use alloc::vec;

    const SR: f64 = 44100.0;
    const BLOCK: usize = 128;

    fn bus() -> Bus {
        Bus::new(RenderConfig::new(SR, BLOCK), 4, 0.5)
    }

    fn note(id: NoteId, note: u8) -> Note {
        Note {
            id,
            note,
            channel: 0,
            velocity: 1.0,
            previous_note: note,
        }
    }

    fn peak(buffer: &[Sample]) -> Sample {
        buffer.iter().fold(0.0, |peak, s| peak.max(s.abs()))
    }

    #[test]
    fn test_idle_bus_is_silent() {
        let mut bus = bus();
        let mut left = vec![1.0; BLOCK];
        let mut right = vec![1.0; BLOCK];

        bus.render(&mut left, &mut right);

        assert!(left.iter().chain(&right).all(|&s| s == 0.0));
        assert_eq!(bus.round(), 1);
        assert_eq!(bus.active_pairs(), 0);
    }

    #[test]
    fn test_note_on_reaches_both_voices() {
        let mut bus = bus();

        bus.note_on(2, 0.0, note(7, 64));

        let pair = bus.pair(2).unwrap();
        assert_eq!(pair.modulator().note_id(), 7);
        assert_eq!(pair.carrier().note_id(), 7);
        assert_eq!(bus.active_pairs(), 1);
    }

    #[test]
    fn test_out_of_range_slot_is_ignored() {
        let mut bus = bus();

        bus.note_on(4, 0.0, note(1, 60));
        bus.cancel_note(9);

        assert_eq!(bus.active_pairs(), 0);
    }

    #[test]
    fn test_modulator_mix() {
        let mut bus = bus();
        bus.carrier_params_mut().volume.set_value(0.0);
        bus.note_on(0, 0.0, note(1, 69));

        let mut left = vec![0.0; BLOCK * 4];
        let mut right = vec![0.0; BLOCK * 4];
        bus.render(&mut left, &mut right);
        assert!(peak(&left) > 0.05);
        assert_eq!(bus.round(), 4);

        bus.modulator_mix_mut().set_value(0.0);
        bus.render(&mut left, &mut right);
        assert!(peak(&left) < 1e-6);
    }

    #[test]
    fn test_frequency_modulation_changes_carrier() {
        let render = |level: f64| {
            let mut bus = bus();
            bus.modulator_mix_mut().set_value(0.0);
            bus.carrier_params_mut()
                .frequency_modulation_level
                .set_value(level);
            bus.note_on(0, 0.0, note(1, 69));

            let mut left = vec![0.0; BLOCK * 8];
            let mut right = vec![0.0; BLOCK * 8];
            bus.render(&mut left, &mut right);
            left
        };

        let plain = render(0.0);
        let modulated = render(1000.0);

        let difference = plain
            .iter()
            .zip(&modulated)
            .fold(0.0_f32, |peak, (a, b)| peak.max((a - b).abs()));
        assert!(difference > 0.01);
    }

    #[test]
    fn test_note_off_frees_pair() {
        let mut bus = bus();
        let mut left = vec![0.0; BLOCK];
        let mut right = vec![0.0; BLOCK];

        bus.note_on(1, 0.0, note(3, 60));
        bus.render(&mut left, &mut right);
        bus.note_off(1, 0.0, 3, 60);

        // The default amplitude envelope releases over 0.1 s.
        bus.render(&mut left, &mut right);
        assert_eq!(bus.active_pairs(), 1);

        for _ in 0..(0.1 * SR) as usize / BLOCK + 1 {
            bus.render(&mut left, &mut right);
        }

        assert_eq!(bus.active_pairs(), 0);
        assert!(peak(&left) < 1e-6);
    }

    #[test]
    fn test_retrigger_fades_with_default_params() {
        let mut bus = bus();
        let mut left = vec![0.0; BLOCK * 8];
        let mut right = vec![0.0; BLOCK * 8];

        bus.note_on(0, 0.0, note(1, 69));
        bus.render(&mut left, &mut right);
        let before = peak(&left[BLOCK * 7..]);

        bus.retrigger(0, 0.0, note(2, 69));

        let fade = (SMOOTH_NOTE_CANCELLATION_DURATION * SR) as usize;
        let mut left = vec![0.0; fade];
        let mut right = vec![0.0; fade];
        bus.render(&mut left, &mut right);

        let end = peak(&left[fade - 40..]);
        assert!(end < 0.2 * before, "end {end} before {before}");
        assert_eq!(bus.pair(0).unwrap().carrier().note_id(), 2);
    }

    #[test]
    fn test_smooth_cancellation_fades_with_default_params() {
        let mut bus = bus();
        let mut left = vec![0.0; BLOCK * 8];
        let mut right = vec![0.0; BLOCK * 8];

        bus.note_on(0, 0.0, note(1, 69));
        bus.render(&mut left, &mut right);
        let before = peak(&left[BLOCK * 7..]);

        bus.cancel_note_smoothly(0, 0.0);

        let fade = (SMOOTH_NOTE_CANCELLATION_DURATION * SR) as usize;
        let mut left = vec![0.0; fade];
        let mut right = vec![0.0; fade];
        bus.render(&mut left, &mut right);

        assert!(peak(&left[..20]) > 0.5 * before);
        assert!(peak(&left[fade - 40..]) < 0.2 * before);

        let mut left = vec![0.0; BLOCK];
        let mut right = vec![0.0; BLOCK];
        bus.render(&mut left, &mut right);
        bus.render(&mut left, &mut right);

        assert_eq!(bus.active_pairs(), 0);
        assert!(peak(&left) < 1e-6);
    }

    #[test]
    fn test_pairs_share_drift_seed() {
        let bus = bus();
        let pair = bus.pair(0).unwrap();

        assert_eq!(pair.modulator().inaccuracy(), pair.carrier().inaccuracy());
        assert_ne!(
            bus.pair(0).unwrap().carrier().inaccuracy(),
            bus.pair(1).unwrap().carrier().inaccuracy()
        );
    }

    #[test]
    fn test_reset() {
        let mut bus = bus();
        let mut left = vec![0.0; BLOCK];
        let mut right = vec![0.0; BLOCK];

        bus.set_tuning(Tuning::Hz440Inaccurate2Synced);
        bus.note_on(0, 0.0, note(1, 60));
        bus.render(&mut left, &mut right);
        bus.reset();

        assert_eq!(bus.round(), 0);
        assert_eq!(bus.active_pairs(), 0);
        assert_eq!(bus.synced_inaccuracy().value(), 0.5);
    }
}
