//! Slowly drifting pseudo-random values for analog-style tuning.
//!
//! Every voice owns a private [`Inaccuracy`] that moves to a new value on each
//! note. The bus owns one more, the synced instance, which every voice reads
//! through a shared reference so that all voices drift together; it moves at
//! most once per render round no matter how many voices ask.

use core::cell::Cell;

use tessel_core::{Number, Round, clamp, randomize};

/// Lower bound of generated values.
const MIN: Number = 0.1;

/// Width of the generated range.
const RANGE: Number = 0.9;

/// Distance kept from both ends of the range.
const MARGIN: Number = 0.000_000_001;

/// Maps `[0, 1]` into the open range.
#[inline]
fn to_range(unit: Number) -> Number {
    clamp(MIN + RANGE * unit, MIN + MARGIN, MIN + RANGE - MARGIN)
}

/// A value in `(0.1, 1.0)` that advances along a reproducible sequence.
///
/// ```rust
/// use tessel_synth::Inaccuracy;
///
/// let synced = Inaccuracy::new(0.5);
/// synced.update(1);
/// let first = synced.value();
///
/// // Further updates in the same round are ignored.
/// synced.update(1);
/// assert_eq!(synced.value(), first);
///
/// synced.reset();
/// assert_eq!(synced.value(), 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct Inaccuracy {
    seed: Number,
    value: Cell<Number>,
    last_update_round: Cell<Option<Round>>,
}

impl Inaccuracy {
    /// Creates a generator whose current value is `seed`.
    pub fn new(seed: Number) -> Self {
        Self {
            seed,
            value: Cell::new(seed),
            last_update_round: Cell::new(None),
        }
    }

    /// Next value of the sequence after `previous`.
    #[inline]
    pub fn next_after(previous: Number) -> Number {
        to_range(randomize(1.0, previous))
    }

    /// Current value.
    #[inline]
    pub fn value(&self) -> Number {
        self.value.get()
    }

    /// The value restored by [`reset`](Self::reset).
    #[inline]
    pub fn seed(&self) -> Number {
        self.seed
    }

    /// Advances once for `round`; repeated calls with the same round are
    /// no-ops.
    pub fn update(&self, round: Round) {
        if self.last_update_round.get() == Some(round) {
            return;
        }

        self.last_update_round.set(Some(round));
        self.advance();
    }

    /// Advances unconditionally.
    #[inline]
    pub fn advance(&self) {
        self.value.set(Self::next_after(self.value.get()));
    }

    /// Returns to the seed and forgets the last round.
    pub fn reset(&self) {
        self.value.set(self.seed);
        self.last_update_round.set(None);
    }
}
