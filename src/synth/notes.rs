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

//! Held notes, keyed by the platform key code that started them.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{debug, trace};

/// An opaque platform key code. The note table uses the upper-case ASCII
/// letter codes, which match the Win32 virtual-key codes for letters.
pub type KeyId = u32;

/// Two keyboard rows: ZXCVBNM plays C4-B4 and QWERTYUIOP plays C5-E6.
const NOTE_TABLE: [(char, f64); 17] = [
    ('Z', 261.626),
    ('X', 293.665),
    ('C', 329.628),
    ('V', 349.228),
    ('B', 392.000),
    ('N', 440.000),
    ('M', 493.883),
    ('Q', 523.25),
    ('W', 587.33),
    ('E', 659.25),
    ('R', 698.46),
    ('T', 783.99),
    ('Y', 880.00),
    ('U', 987.77),
    ('I', 1046.50),
    ('O', 1174.66),
    ('P', 1318.51),
];

/// The key code for a typed character. Letters map case-insensitively.
pub fn key_for_char(c: char) -> KeyId {
    c.to_ascii_uppercase() as KeyId
}

/// The frequency played by `key`, or None if the key isn't a note.
pub fn note_frequency(key: KeyId) -> Option<f64> {
    NOTE_TABLE
        .iter()
        .find(|(note_key, _)| *note_key as KeyId == key)
        .map(|(_, frequency)| *frequency)
}

/// Currently held notes. Mutated from the input path and read by the
/// generation thread; the lock is only ever held for a map operation or copy.
#[derive(Default)]
pub struct NoteRegistry {
    notes: Mutex<HashMap<KeyId, f64>>,
}

impl NoteRegistry {
    pub fn new() -> NoteRegistry {
        NoteRegistry::default()
    }

    /// Starts the note for `key`. Unmapped keys and keys already held are
    /// ignored. Returns true if a note was started.
    pub fn note_on(&self, key: KeyId) -> bool {
        let Some(frequency) = note_frequency(key) else {
            trace!(key, "Ignoring unmapped key");
            return false;
        };

        let mut notes = self.notes.lock();
        if notes.contains_key(&key) {
            return false;
        }
        notes.insert(key, frequency);
        drop(notes);

        debug!(key, frequency, "Note on");
        true
    }

    /// Stops the note for `key`, if it is held.
    pub fn note_off(&self, key: KeyId) -> bool {
        let removed = self.notes.lock().remove(&key);
        if let Some(frequency) = removed {
            debug!(key, frequency, "Note off");
        }
        removed.is_some()
    }

    /// Copies out the held frequencies for one mixing pass.
    pub fn snapshot_frequencies(&self) -> Vec<f64> {
        self.notes.lock().values().copied().collect()
    }

    pub fn is_active(&self, key: KeyId) -> bool {
        self.notes.lock().contains_key(&key)
    }

    /// Held keys, sorted.
    pub fn active_keys(&self) -> Vec<KeyId> {
        let mut keys: Vec<KeyId> = self.notes.lock().keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.notes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases every held note.
    pub fn clear(&self) {
        self.notes.lock().clear();
    }
}
