// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::info;

pub mod notes;
pub mod waveform;

pub use notes::{key_for_char, note_frequency, KeyId, NoteRegistry};
pub use waveform::Waveform;

/// The process-wide waveform choice. Last writer wins.
struct WaveformSelection(AtomicU8);

impl WaveformSelection {
    fn new(waveform: Waveform) -> WaveformSelection {
        WaveformSelection(AtomicU8::new(Self::encode(waveform)))
    }

    fn load(&self) -> Waveform {
        match self.0.load(Ordering::Acquire) {
            1 => Waveform::Square,
            _ => Waveform::Sine,
        }
    }

    fn store(&self, waveform: Waveform) {
        self.0.store(Self::encode(waveform), Ordering::Release);
    }

    fn encode(waveform: Waveform) -> u8 {
        match waveform {
            Waveform::Sine => 0,
            Waveform::Square => 1,
        }
    }
}

/// Held notes plus the selected waveform: everything the generation thread
/// reads to fill a block.
pub struct Synthesizer {
    notes: NoteRegistry,
    waveform: WaveformSelection,
}

impl Synthesizer {
    pub fn new(waveform: Waveform) -> Synthesizer {
        Synthesizer {
            notes: NoteRegistry::new(),
            waveform: WaveformSelection::new(waveform),
        }
    }

    pub fn notes(&self) -> &NoteRegistry {
        &self.notes
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform.load()
    }

    pub fn select_waveform(&self, waveform: Waveform) {
        if self.waveform() != waveform {
            info!(waveform = %waveform, "Waveform selected");
        }
        self.waveform.store(waveform);
    }

    /// Captures the current notes and waveform. Changes made after this call
    /// are picked up by the next frame.
    pub fn frame(&self) -> Frame {
        Frame {
            frequencies: self.notes.snapshot_frequencies(),
            waveform: self.waveform(),
        }
    }
}

impl Default for Synthesizer {
    fn default() -> Self {
        Synthesizer::new(Waveform::default())
    }
}

/// A snapshot used to synthesize one block without touching any locks.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    frequencies: Vec<f64>,
    waveform: Waveform,
}

impl Frame {
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// The mixed amplitude at `time`, before clipping.
    pub fn sample(&self, time: f64) -> f64 {
        waveform::mix(&self.frequencies, time, self.waveform)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_waveform_selection() {
        let synth = Synthesizer::default();
        assert_eq!(synth.waveform(), Waveform::Sine);
        synth.select_waveform(Waveform::Square);
        synth.select_waveform(Waveform::Square);
        assert_eq!(synth.waveform(), Waveform::Square);
        synth.select_waveform(Waveform::Sine);
        assert_eq!(synth.waveform(), Waveform::Sine);
    }

    #[test]
    fn test_frame_is_a_snapshot() {
        let synth = Synthesizer::new(Waveform::Square);
        synth.notes().note_on(key_for_char('n'));
        let frame = synth.frame();

        synth.notes().note_off(key_for_char('n'));
        synth.select_waveform(Waveform::Sine);

        assert_eq!(frame.frequencies(), &[440.0]);
        assert_eq!(frame.waveform(), Waveform::Square);
        assert_eq!(frame.sample(0.0), 0.5);
        assert_eq!(synth.frame().sample(0.0), 0.0);
    }
}
