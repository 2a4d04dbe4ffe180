//! Engine configuration for tessel.
//!
//! Reads and writes the TOML file describing an engine (sample rate, block
//! size, polyphony, tuning and drift seed), validates it, and builds a
//! ready-to-render [`Bus`](tessel_synth::Bus) from it.
//!
//! # Example
//!
//! ```rust
//! use tessel_config::EngineConfig;
//!
//! let config = EngineConfig::from_toml(
//!     r#"
//!     sample_rate = 48000.0
//!     polyphony = 4
//!     tuning = "440hz-inaccurate-2-synced"
//!     "#,
//! )
//! .unwrap();
//!
//! let bus = config.build_bus().unwrap();
//! assert_eq!(bus.polyphony(), 4);
//! ```
//!
//! Loading and validation are logged through `tracing`: successful loads at
//! `info`, rejected settings at `warn`.

mod engine;
mod error;

pub use engine::{
    BLOCK_SIZE_RANGE, EngineConfig, INACCURACY_SEED_RANGE, POLYPHONY_RANGE, SAMPLE_RATE_RANGE,
};
pub use error::ConfigError;
