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

//! Stateless oscillators. Phase is derived from absolute time rather than
//! accumulated per note, so notes of the same waveform always line up the same
//! way for a given time.

use std::{f64::consts::TAU, fmt, str::FromStr};

use serde::Deserialize;

/// Fixed scaling applied to the summed notes. Not normalization: several held
/// notes can still exceed [-1, 1] and are clipped when written to a block.
const HEADROOM: f64 = 0.5;

/// The oscillator shape used for every held note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
}

impl Waveform {
    pub fn as_str(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
        }
    }
}

impl FromStr for Waveform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sine" => Ok(Waveform::Sine),
            "square" => Ok(Waveform::Square),
            _ => Err(format!("Unsupported waveform: {}", s)),
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Amplitude of a single note at `time` seconds. Always within [-1, 1].
pub fn sample(frequency: f64, time: f64, waveform: Waveform) -> f64 {
    match waveform {
        Waveform::Sine => (TAU * frequency * time).sin(),
        Waveform::Square => {
            if (frequency * time) % 1.0 < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
    }
}

/// Sums every active note and applies the fixed headroom. No notes is silence.
pub fn mix(frequencies: &[f64], time: f64, waveform: Waveform) -> f64 {
    HEADROOM
        * frequencies
            .iter()
            .map(|frequency| sample(*frequency, time, waveform))
            .sum::<f64>()
}
