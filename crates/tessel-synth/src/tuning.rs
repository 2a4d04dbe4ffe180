//! Tunings and note frequency tables.
//!
//! A [`Tuning`] selects a reference pitch and, for the inaccurate variants, a
//! detuning formula driven by an [`Inaccuracy`](crate::Inaccuracy). The two
//! MTS-ESP variants read frequencies from a [`PerChannelFrequencyTable`] that
//! an external tuning source keeps up to date.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use tessel_core::{Frequency, Number, Seconds, midi_note_frequency};

/// Number of MIDI notes.
pub const NOTES: usize = 128;

/// Number of MIDI channels.
pub const CHANNELS: usize = 16;

/// Where an inaccurate tuning takes its drift from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftSource {
    /// The voice's own generator.
    Private,
    /// The generator shared by every voice.
    Synced,
}

/// Pitch reference and drift model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tuning {
    /// 12-TET, A4 = 440 Hz.
    #[default]
    Hz440,
    /// 440 Hz, slight private drift.
    Hz440Inaccurate1,
    /// 440 Hz, slight synced drift.
    Hz440Inaccurate2Synced,
    /// 440 Hz, noticeable private drift.
    Hz440Inaccurate3,
    /// 440 Hz, slight private drift with a wider range.
    Hz440Inaccurate4,
    /// 440 Hz, heavy synced drift.
    Hz440Inaccurate5Synced,
    /// 440 Hz, heavy private drift.
    Hz440Inaccurate6,
    /// 12-TET, A4 = 432 Hz.
    Hz432,
    /// 432 Hz, slight private drift.
    Hz432Inaccurate1,
    /// 432 Hz, slight synced drift.
    Hz432Inaccurate2Synced,
    /// 432 Hz, noticeable private drift.
    Hz432Inaccurate3,
    /// 432 Hz, slight private drift with a wider range.
    Hz432Inaccurate4,
    /// 432 Hz, heavy synced drift.
    Hz432Inaccurate5Synced,
    /// 432 Hz, heavy private drift.
    Hz432Inaccurate6,
    /// Per-channel table, sampled when a note starts.
    MtsEspNoteOn,
    /// Per-channel table, followed while the note sounds.
    MtsEspRealtime,
}

impl Tuning {
    /// Every tuning, in table order.
    pub const ALL: [Self; 16] = [
        Self::Hz440,
        Self::Hz440Inaccurate1,
        Self::Hz440Inaccurate2Synced,
        Self::Hz440Inaccurate3,
        Self::Hz440Inaccurate4,
        Self::Hz440Inaccurate5Synced,
        Self::Hz440Inaccurate6,
        Self::Hz432,
        Self::Hz432Inaccurate1,
        Self::Hz432Inaccurate2Synced,
        Self::Hz432Inaccurate3,
        Self::Hz432Inaccurate4,
        Self::Hz432Inaccurate5Synced,
        Self::Hz432Inaccurate6,
        Self::MtsEspNoteOn,
        Self::MtsEspRealtime,
    ];

    /// Position in [`ALL`](Self::ALL).
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable name used in configuration files.
    pub fn name(self) -> &'static str {
        match self {
            Self::Hz440 => "440hz-12tet",
            Self::Hz440Inaccurate1 => "440hz-inaccurate-1",
            Self::Hz440Inaccurate2Synced => "440hz-inaccurate-2-synced",
            Self::Hz440Inaccurate3 => "440hz-inaccurate-3",
            Self::Hz440Inaccurate4 => "440hz-inaccurate-4",
            Self::Hz440Inaccurate5Synced => "440hz-inaccurate-5-synced",
            Self::Hz440Inaccurate6 => "440hz-inaccurate-6",
            Self::Hz432 => "432hz-12tet",
            Self::Hz432Inaccurate1 => "432hz-inaccurate-1",
            Self::Hz432Inaccurate2Synced => "432hz-inaccurate-2-synced",
            Self::Hz432Inaccurate3 => "432hz-inaccurate-3",
            Self::Hz432Inaccurate4 => "432hz-inaccurate-4",
            Self::Hz432Inaccurate5Synced => "432hz-inaccurate-5-synced",
            Self::Hz432Inaccurate6 => "432hz-inaccurate-6",
            Self::MtsEspNoteOn => "mts-esp-note-on",
            Self::MtsEspRealtime => "mts-esp-realtime",
        }
    }

    /// Frequency of A4.
    pub fn reference_frequency(self) -> Frequency {
        match self {
            Self::Hz432
            | Self::Hz432Inaccurate1
            | Self::Hz432Inaccurate2Synced
            | Self::Hz432Inaccurate3
            | Self::Hz432Inaccurate4
            | Self::Hz432Inaccurate5Synced
            | Self::Hz432Inaccurate6 => 432.0,
            _ => 440.0,
        }
    }

    /// Whether note frequencies come from the per-channel table.
    #[inline]
    pub fn is_per_channel(self) -> bool {
        matches!(self, Self::MtsEspNoteOn | Self::MtsEspRealtime)
    }

    /// Whether sounding notes follow per-channel table changes.
    #[inline]
    pub fn is_realtime(self) -> bool {
        self == Self::MtsEspRealtime
    }

    /// Drift source of an inaccurate tuning, `None` for stable tunings.
    pub fn drift_source(self) -> Option<DriftSource> {
        match self {
            Self::Hz440Inaccurate2Synced
            | Self::Hz440Inaccurate5Synced
            | Self::Hz432Inaccurate2Synced
            | Self::Hz432Inaccurate5Synced => Some(DriftSource::Synced),
            Self::Hz440Inaccurate1
            | Self::Hz440Inaccurate3
            | Self::Hz440Inaccurate4
            | Self::Hz440Inaccurate6
            | Self::Hz432Inaccurate1
            | Self::Hz432Inaccurate3
            | Self::Hz432Inaccurate4
            | Self::Hz432Inaccurate6 => Some(DriftSource::Private),
            _ => None,
        }
    }

    /// Whether the tuning drifts while notes sound.
    #[inline]
    pub fn is_unstable(self) -> bool {
        self.drift_source().is_some()
    }

    /// Detuning in cents for an inaccuracy value from the matching
    /// [`drift_source`](Self::drift_source). Stable tunings return 0.
    pub fn detune_cents(self, inaccuracy: Number) -> Number {
        match self {
            Self::Hz440Inaccurate1 | Self::Hz432Inaccurate1 => 1.5 * inaccuracy - 0.3,
            Self::Hz440Inaccurate2Synced
            | Self::Hz432Inaccurate2Synced
            | Self::Hz440Inaccurate4
            | Self::Hz432Inaccurate4 => 3.0 * inaccuracy - 0.6,
            Self::Hz440Inaccurate3 | Self::Hz432Inaccurate3 => 9.0 * inaccuracy - 3.5,
            Self::Hz440Inaccurate5Synced | Self::Hz432Inaccurate5Synced => 20.0 * inaccuracy - 8.0,
            Self::Hz440Inaccurate6 | Self::Hz432Inaccurate6 => 30.0 * inaccuracy - 14.0,
            _ => 0.0,
        }
    }

    /// Length of the ramp towards the next drifted pitch.
    #[inline]
    pub fn drift_ramp_duration(inaccuracy: Number) -> Seconds {
        0.3 + 1.7 * inaccuracy
    }
}

impl fmt::Display for Tuning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown tuning name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTuningError;

impl fmt::Display for ParseTuningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown tuning name")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseTuningError {}

impl FromStr for Tuning {
    type Err = ParseTuningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tuning| tuning.name().eq_ignore_ascii_case(s.trim()))
            .ok_or(ParseTuningError)
    }
}

/// Note frequencies of every tuning, without drift.
#[derive(Debug, Clone)]
pub struct FrequencyTable {
    rows: Vec<[Frequency; NOTES]>,
}

impl FrequencyTable {
    /// Computes the 12-TET table of every tuning. Per-channel tunings fall
    /// back to 440 Hz.
    pub fn new() -> Self {
        let rows = Tuning::ALL
            .iter()
            .map(|tuning| equal_temperament(tuning.reference_frequency()))
            .collect();

        Self { rows }
    }

    /// Frequency of `note` in `tuning`. Notes out of range clamp to the
    /// highest note.
    #[inline]
    pub fn get(&self, tuning: Tuning, note: u8) -> Frequency {
        self.rows[tuning.index()][usize::from(note).min(NOTES - 1)]
    }
}

impl Default for FrequencyTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-channel note frequencies written by an external tuning source.
#[derive(Debug, Clone)]
pub struct PerChannelFrequencyTable {
    rows: Vec<[Frequency; NOTES]>,
}

impl PerChannelFrequencyTable {
    /// Every channel starts at 440 Hz 12-TET.
    pub fn new() -> Self {
        Self {
            rows: vec![equal_temperament(440.0); CHANNELS],
        }
    }

    /// Frequency of `note` on `channel`. Out of range indices clamp.
    #[inline]
    pub fn get(&self, channel: u8, note: u8) -> Frequency {
        self.rows[usize::from(channel).min(CHANNELS - 1)][usize::from(note).min(NOTES - 1)]
    }

    /// Sets one entry. Out of range indices and non-positive frequencies are
    /// ignored.
    pub fn set(&mut self, channel: u8, note: u8, frequency: Frequency) {
        let (channel, note) = (usize::from(channel), usize::from(note));

        if channel >= CHANNELS || note >= NOTES || frequency.is_nan() || frequency <= 0.0 {
            return;
        }

        self.rows[channel][note] = frequency;
    }

    /// Restores 440 Hz 12-TET on every channel.
    pub fn reset(&mut self) {
        let row = equal_temperament(440.0);

        for channel in &mut self.rows {
            *channel = row;
        }
    }
}

impl Default for PerChannelFrequencyTable {
    fn default() -> Self {
        Self::new()
    }
}

fn equal_temperament(reference: Frequency) -> [Frequency; NOTES] {
    let mut row = [0.0; NOTES];

    for (note, frequency) in (0_u8..).zip(row.iter_mut()) {
        *frequency = midi_note_frequency(note, reference);
    }

    row
}
