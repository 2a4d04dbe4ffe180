//! Tessel Synth - the voice engine
//!
//! Band-limited wavetables, analog-style tuning drift, the per-voice signal
//! chain and the note lifecycle, assembled into a [`Bus`] of
//! modulator/carrier voice pairs.
//!
//! # Signal Chain
//!
//! ```text
//! Oscillator → Filter 1 → Wavefolder → [Distortion] → Filter 2 → Volume → Panning
//! ```
//!
//! - [`Oscillator`] - Wavetable oscillator with AM, FM and PM inputs
//! - [`Filter`] - Biquad stage with per-sample coefficient updates when swept
//! - [`Wavefolder`] - Triangle folding
//! - [`Distortion`] - Anti-aliased `tanh` saturation (carriers only)
//! - [`VolumeApplier`] - Note velocity and volume
//!
//! # Voices
//!
//! - [`Voice`] - One chain plus its note lifecycle, specialised by [`Role`]
//!   into [`Modulator`] and [`Carrier`]
//! - [`Bus`] - Fixed pool of voice pairs mixed into a stereo buffer
//!
//! # Pitch
//!
//! - [`Tuning`] - 12-TET at 440 or 432 Hz, drifting variants, MTS-ESP
//! - [`Inaccuracy`] - Reproducible drift values, private or shared
//!
//! # Example
//!
//! ```rust
//! use tessel_core::RenderConfig;
//! use tessel_synth::{Bus, Note};
//!
//! let mut bus = Bus::new(RenderConfig::new(48000.0, 64), 2, 0.5);
//! let note = Note { id: 1, note: 69, channel: 0, velocity: 1.0, previous_note: 69 };
//!
//! bus.note_on(0, 0.0, note);
//!
//! let mut left = [0.0; 64];
//! let mut right = [0.0; 64];
//! bus.render(&mut left, &mut right);
//!
//! assert!(left.iter().any(|s| s.abs() > 0.0));
//! ```
//!
//! # Features
//!
//! - `std` (default) - Enables `std` in `tessel-core` and `std::error::Error`
//!   for [`ParseTuningError`]
//! - `tracing` - Debug events when wavetables and buses are built

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod bus;
pub mod distortion;
pub mod filter;
pub mod inaccuracy;
pub mod oscillator;
pub mod params;
pub mod tuning;
pub mod voice;
pub mod volume;
pub mod wavefolder;
pub mod wavetable;

pub use bus::{Bus, VoicePair};
pub use distortion::Distortion;
pub use filter::Filter;
pub use inaccuracy::Inaccuracy;
pub use oscillator::{Oscillator, OscillatorInputs};
pub use params::{FilterParams, VoiceParams};
pub use tuning::{
    CHANNELS, DriftSource, FrequencyTable, NOTES, ParseTuningError, PerChannelFrequencyTable,
    Tuning,
};
pub use voice::{
    Carrier, Modulator, Note, NoteId, Role, SMOOTH_NOTE_CANCELLATION_DURATION, Voice,
    VoiceContext, VoiceState, note_panning, velocity_curve,
};
pub use volume::VolumeApplier;
pub use wavefolder::Wavefolder;
pub use wavetable::{StandardWaveforms, Waveform, Wavetable, WavetableState};
