//! Sample and time types, per-producer clocks, and the stage trait.
//!
//! Every component that renders audio or schedules events owns a [`Clock`].
//! Public scheduling APIs take *time offsets* relative to the start of the
//! next block; the clock turns them into absolute times so that events stay
//! put while blocks are rendered.

/// One audio sample.
pub type Sample = f32;

/// Generic parameter value.
pub type Number = f64;

/// Time in seconds.
pub type Seconds = f64;

/// Frequency in Hz.
pub type Frequency = f64;

/// Render round counter, incremented once per audio block.
pub type Round = u64;

/// Sample rate and maximum block size shared by every producer of an engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderConfig {
    /// Sample rate in Hz.
    pub sample_rate: Frequency,
    /// Maximum number of samples rendered per round.
    pub block_size: usize,
}

impl RenderConfig {
    /// Creates a render configuration.
    pub fn new(sample_rate: Frequency, block_size: usize) -> Self {
        Self {
            sample_rate,
            block_size,
        }
    }

    /// Duration of one sample.
    #[inline]
    pub fn sampling_period(&self) -> Seconds {
        1.0 / self.sample_rate
    }

    /// Half the sample rate.
    #[inline]
    pub fn nyquist_frequency(&self) -> Frequency {
        self.sample_rate * 0.5
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::new(44100.0, 128)
    }
}

/// Time keeping for a single producer.
///
/// Tracks the time of the first sample of the next block, and the last round
/// that was rendered so repeated render requests within a round are no-ops.
#[derive(Debug, Clone)]
pub struct Clock {
    sample_rate: Frequency,
    sampling_period: Seconds,
    current_time: Seconds,
    cached_round: Option<Round>,
}

impl Clock {
    /// Creates a clock at time zero.
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            sampling_period: config.sampling_period(),
            current_time: 0.0,
            cached_round: None,
        }
    }

    /// Time of the first sample of the next block.
    #[inline]
    pub fn current_time(&self) -> Seconds {
        self.current_time
    }

    /// Sample rate in Hz.
    #[inline]
    pub fn sample_rate(&self) -> Frequency {
        self.sample_rate
    }

    /// Duration of one sample.
    #[inline]
    pub fn sampling_period(&self) -> Seconds {
        self.sampling_period
    }

    /// Converts a time offset into an absolute time on this clock.
    #[inline]
    pub fn absolute(&self, time_offset: Seconds) -> Seconds {
        self.current_time + time_offset
    }

    /// Converts an absolute time into an offset from the current time.
    #[inline]
    pub fn relative(&self, time: Seconds) -> Seconds {
        time - self.current_time
    }

    /// Absolute time of the sample at `index` within the next block.
    #[inline]
    pub fn sample_time(&self, index: usize) -> Seconds {
        self.current_time + index as Seconds * self.sampling_period
    }

    /// Marks `round` as rendered. Returns `false` if it already was.
    #[inline]
    pub fn begin_round(&mut self, round: Round) -> bool {
        if self.cached_round == Some(round) {
            return false;
        }

        self.cached_round = Some(round);
        true
    }

    /// Moves the clock past a rendered block.
    #[inline]
    pub fn advance(&mut self, sample_count: usize) {
        self.current_time += sample_count as Seconds * self.sampling_period;
    }

    /// Returns to time zero and forgets the last rendered round.
    pub fn reset(&mut self) {
        self.current_time = 0.0;
        self.cached_round = None;
    }
}

/// A stage of a voice's signal chain.
///
/// Rendering is split in two: [`initialize_rendering`](Self::initialize_rendering)
/// resolves every input of the stage for the coming block (constant value or
/// per-sample buffer), then [`render`](Self::render) processes the block in
/// place. `C` is whatever the stage reads its shared parameters from.
pub trait SignalProducer<C: ?Sized> {
    /// Resolves the stage's inputs for `sample_count` samples of `round`.
    fn initialize_rendering(&mut self, round: Round, sample_count: usize, context: &C);

    /// Processes `buffer` in place. Its length is the `sample_count` passed
    /// to the preceding `initialize_rendering` call.
    fn render(&mut self, buffer: &mut [Sample]);

    /// Clears internal state and scheduled events.
    fn reset(&mut self);
}
