//! Criterion benchmarks for tessel-synth components
//!
//! Run with: cargo bench -p tessel-synth

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tessel_core::{Envelope, FilterType, RenderConfig, Round};
use tessel_synth::{
    Bus, Carrier, FrequencyTable, Inaccuracy, Modulator, Note, PerChannelFrequencyTable,
    StandardWaveforms, Tuning, Voice, VoiceContext, VoiceParams, Waveform, WavetableState,
};

const SAMPLE_RATE: f64 = 48000.0;
const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512, 1024];

fn note(id: u64, note: u8) -> Note {
    Note {
        id,
        note,
        channel: 0,
        velocity: 0.8,
        previous_note: note,
    }
}

// ============================================================================
// Wavetable benchmarks
// ============================================================================

fn bench_wavetable_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("Wavetable");
    let waveforms = StandardWaveforms::new();

    let cases = [
        ("Sine", Waveform::Sine),
        ("Saw", Waveform::Sawtooth),
        ("Triangle", Waveform::Triangle),
        ("Square", Waveform::Square),
    ];

    for (name, waveform) in &cases {
        let Some(wavetable) = waveforms.get(*waveform) else {
            continue;
        };

        for &block_size in BLOCK_SIZES {
            let mut state = WavetableState::new(&RenderConfig::new(SAMPLE_RATE, block_size));

            group.bench_with_input(
                BenchmarkId::new(*name, block_size),
                &block_size,
                |b, &size| {
                    b.iter(|| {
                        let mut sum = 0.0f32;
                        for _ in 0..size {
                            sum += wavetable.lookup(&mut state, 440.0);
                        }
                        black_box(sum)
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_wavetable_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("Wavetable_Sweep");
    let waveforms = StandardWaveforms::new();

    // Every lookup lands on a different table blend
    group.bench_function("saw_20hz_to_20khz", |b| {
        let wavetable = waveforms.get(Waveform::Sawtooth).unwrap();
        let mut state = WavetableState::new(&RenderConfig::new(SAMPLE_RATE, 1024));

        b.iter(|| {
            let mut sum = 0.0f32;
            let mut frequency = 20.0;
            while frequency < 20000.0 {
                sum += wavetable.lookup(&mut state, frequency);
                frequency *= 1.001;
            }
            black_box(sum)
        })
    });

    group.finish();
}

// ============================================================================
// Voice benchmarks
// ============================================================================

struct Tables {
    frequencies: FrequencyTable,
    per_channel_frequencies: PerChannelFrequencyTable,
    synced_inaccuracy: Inaccuracy,
}

impl Tables {
    fn new() -> Self {
        Self {
            frequencies: FrequencyTable::new(),
            per_channel_frequencies: PerChannelFrequencyTable::new(),
            synced_inaccuracy: Inaccuracy::new(0.5),
        }
    }

    fn context<'a>(&'a self, params: &'a VoiceParams) -> VoiceContext<'a> {
        VoiceContext {
            params,
            frequencies: &self.frequencies,
            per_channel_frequencies: &self.per_channel_frequencies,
            synced_inaccuracy: &self.synced_inaccuracy,
        }
    }
}

fn bench_voice_simple(c: &mut Criterion) {
    let mut group = c.benchmark_group("Voice_Simple");
    let waveforms = Arc::new(StandardWaveforms::new());
    let tables = Tables::new();
    let params = VoiceParams::new();

    for &block_size in BLOCK_SIZES {
        let config = RenderConfig::new(SAMPLE_RATE, block_size);
        let mut voice: Voice<Carrier> = Voice::new(&config, &params, Arc::clone(&waveforms), 0.5);
        voice.note_on(0.0, note(1, 69), &tables.context(&params));
        let mut round: Round = 0;

        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, &size| {
                b.iter(|| {
                    round += 1;
                    voice.render(round, size, &params, None);
                    black_box(voice.modulation_out()[0])
                })
            },
        );
    }

    group.finish();
}

fn bench_voice_full_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("Voice_FullChain");
    let waveforms = Arc::new(StandardWaveforms::new());
    let tables = Tables::new();

    let mut params = VoiceParams::new();
    params.waveform.set_value(Waveform::Sawtooth);
    params.folding.set_value(1.5);
    params.distortion.set_value(0.5);
    params.filter_1.frequency.set_logarithmic(true);
    params.filter_1.frequency.set_envelope(Some(Envelope::new()));
    params.filter_1.q.set_value(4.0);
    params.filter_2.filter_type.set_value(FilterType::HighPass);
    params.filter_2.frequency.set_value(80.0);

    for &block_size in BLOCK_SIZES {
        let config = RenderConfig::new(SAMPLE_RATE, block_size);
        let mut voice: Voice<Carrier> = Voice::new(&config, &params, Arc::clone(&waveforms), 0.5);
        voice.note_on(0.0, note(1, 45), &tables.context(&params));
        let mut round: Round = 0;

        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, &size| {
                b.iter(|| {
                    round += 1;
                    voice.render(round, size, &params, None);
                    black_box(voice.modulation_out()[0])
                })
            },
        );
    }

    group.finish();
}

fn bench_voice_frequency_modulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Voice_FM");
    let waveforms = Arc::new(StandardWaveforms::new());
    let tables = Tables::new();
    let modulator_params = VoiceParams::new();
    let mut carrier_params = VoiceParams::new();
    carrier_params.frequency_modulation_level.set_value(500.0);
    carrier_params.amplitude_modulation_level.set_value(0.3);

    for &block_size in BLOCK_SIZES {
        let config = RenderConfig::new(SAMPLE_RATE, block_size);
        let mut modulator: Voice<Modulator> =
            Voice::new(&config, &modulator_params, Arc::clone(&waveforms), 0.5);
        let mut carrier: Voice<Carrier> =
            Voice::new(&config, &carrier_params, Arc::clone(&waveforms), 0.5);
        modulator.note_on(0.0, note(1, 57), &tables.context(&modulator_params));
        carrier.note_on(0.0, note(1, 69), &tables.context(&carrier_params));
        let mut round: Round = 0;

        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, &size| {
                b.iter(|| {
                    round += 1;
                    modulator.render(round, size, &modulator_params, None);
                    carrier.render(
                        round,
                        size,
                        &carrier_params,
                        Some(modulator.modulation_out()),
                    );
                    black_box(carrier.modulation_out()[0])
                })
            },
        );
    }

    group.finish();
}

// ============================================================================
// Bus benchmarks
// ============================================================================

fn bench_bus_polyphony(c: &mut Criterion) {
    let mut group = c.benchmark_group("Bus_Polyphony");
    let block_size = 256;

    for &polyphony in &[1usize, 4, 8, 16] {
        let mut bus = Bus::new(RenderConfig::new(SAMPLE_RATE, block_size), polyphony, 0.5);
        bus.carrier_params_mut()
            .waveform
            .set_value(Waveform::Sawtooth);

        for slot in 0..polyphony {
            bus.note_on(slot, 0.0, note(slot as u64 + 1, 36 + 3 * slot as u8));
        }

        let mut left = vec![0.0f32; block_size];
        let mut right = vec![0.0f32; block_size];

        group.bench_with_input(
            BenchmarkId::from_parameter(polyphony),
            &polyphony,
            |b, _| {
                b.iter(|| {
                    bus.render(&mut left, &mut right);
                    black_box(left[0] + right[0])
                })
            },
        );
    }

    group.finish();
}

fn bench_bus_drifting_tuning(c: &mut Criterion) {
    let mut group = c.benchmark_group("Bus_Drift");

    for &block_size in BLOCK_SIZES {
        let mut bus = Bus::new(RenderConfig::new(SAMPLE_RATE, block_size), 8, 0.5);
        bus.set_tuning(Tuning::Hz440Inaccurate5Synced);

        for slot in 0..8 {
            bus.note_on(slot, 0.0, note(slot as u64 + 1, 48 + 4 * slot as u8));
        }

        let mut left = vec![0.0f32; block_size];
        let mut right = vec![0.0f32; block_size];

        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, _| {
                b.iter(|| {
                    bus.render(&mut left, &mut right);
                    black_box(left[0] + right[0])
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_wavetable_lookup,
    bench_wavetable_sweep,
    bench_voice_simple,
    bench_voice_full_chain,
    bench_voice_frequency_modulation,
    bench_bus_polyphony,
    bench_bus_drifting_tuning,
);

criterion_main!(benches);
