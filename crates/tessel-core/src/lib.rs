//! Tessel Core - real-time primitives for the tessel voice engine
//!
//! This crate provides the building blocks every voice is made of, designed
//! for block-based rendering with zero allocation in the audio path.
//!
//! # Core Abstractions
//!
//! ## Time and Rendering
//!
//! - [`RenderConfig`] - Sample rate and block size of an engine
//! - [`Clock`] - Per-producer time keeping and round caching
//! - [`SignalProducer`] - Trait implemented by every stage of a voice's chain
//!
//! ## Parameters
//!
//! - [`ParamLeader`] - Shared, externally controlled parameter definition
//! - [`DiscreteParam`] - Enumerated settings
//! - [`FloatParam`] - Voice-local parameter with scheduled values, ramps and
//!   envelopes
//! - [`ModulatableParam`] - Parameter offset by another voice's signal
//! - [`Envelope`] - DAHDSR envelope shape
//!
//! ## Scheduling
//!
//! - [`EventQueue`] - Fixed-capacity, time-ordered event queue
//!
//! ## Filters
//!
//! - [`Biquad`] / [`Coefficients`] - RBJ cookbook second-order sections
//!
//! ## Utilities
//!
//! - Pitch: [`detune`], [`midi_note_frequency`]
//! - Randomness: [`randomize`]
//! - Shaping: [`fold`], [`lagrange_weights`]
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible (it needs `alloc` for block buffers).
//! Disable the default `std` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! tessel-core = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust
//! use tessel_core::{Envelope, FloatParam, ParamLeader, RenderConfig};
//!
//! let config = RenderConfig::new(48000.0, 128);
//! let mut leader = ParamLeader::new(0.0, 1.0, 0.0);
//! leader.set_envelope(Some(Envelope::new()));
//!
//! // Each voice keeps its own copy and plays the envelope per note.
//! let mut amplitude = FloatParam::follower_of(&config, &leader);
//! amplitude.start_envelope(0.0, Some(&leader));
//! amplitude.produce_if_not_constant(1, 128, Some(&leader));
//! let release = amplitude.end_envelope(0.5, Some(&leader));
//!
//! assert!((release - 0.1).abs() < 1e-12);
//! ```
//!
//! # Design Principles
//!
//! - **Real-time safe**: No allocations after construction
//! - **No dependencies on std**: `libm` for math, `heapless` for queues
//! - **Explicit time**: Every scheduling call takes a time offset within the
//!   coming block, so rendering stays deterministic

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod biquad;
pub mod envelope;
pub mod event_queue;
pub mod float_param;
pub mod math;
pub mod modulatable;
pub mod param;
pub mod signal;

// Re-export main types at crate root
pub use biquad::{Biquad, Coefficients, FilterType};
pub use envelope::{Envelope, EnvelopeStage};
pub use event_queue::{Event, EventQueue};
pub use float_param::{ENVELOPE_UPDATE_RAMP_TIME, FloatParam};
pub use math::{
    INSIGNIFICANT, clamp, detune, fold, fract, is_abs_small, is_close, lagrange_weights, lerp,
    midi_note_frequency, randomize,
};
pub use modulatable::ModulatableParam;
pub use param::{DiscreteParam, ParamBlock, ParamLeader};
pub use signal::{
    Clock, Frequency, Number, RenderConfig, Round, Sample, Seconds, SignalProducer,
};
