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
use std::sync::atomic::{AtomicU64, Ordering};

/// Elapsed synthesis time, counted in samples. Only the generation thread
/// advances it; readers see an eventually consistent value.
pub struct GlobalClock {
    samples: AtomicU64,
    sample_rate: u32,
}

impl GlobalClock {
    pub fn new(sample_rate: u32) -> GlobalClock {
        GlobalClock {
            samples: AtomicU64::new(0),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples produced so far.
    pub fn samples(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    /// Elapsed time in seconds.
    pub fn elapsed(&self) -> f64 {
        self.time_at(self.samples())
    }

    /// Returns the time of the sample about to be produced and moves the clock
    /// forward by one sample period.
    pub(crate) fn advance(&self) -> f64 {
        let sample = self.samples.fetch_add(1, Ordering::Relaxed);
        self.time_at(sample)
    }

    pub(crate) fn reset(&self) {
        self.samples.store(0, Ordering::Relaxed);
    }

    fn time_at(&self, sample: u64) -> f64 {
        sample as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_advance() {
        let clock = GlobalClock::new(44100);
        assert_eq!(clock.elapsed(), 0.0);

        assert_eq!(clock.advance(), 0.0);
        assert_eq!(clock.advance(), 1.0 / 44100.0);
        assert_eq!(clock.samples(), 2);
        assert_eq!(clock.elapsed(), 2.0 / 44100.0);
    }

    #[test]
    fn test_strictly_increasing() {
        let clock = GlobalClock::new(8000);
        let mut previous = clock.advance();
        for n in 1..20_000u64 {
            let time = clock.advance();
            assert!(time > previous);
            assert_eq!(time, n as f64 / 8000.0);
            previous = time;
        }
    }

    #[test]
    fn test_reset() {
        let clock = GlobalClock::new(48000);
        for _ in 0..100 {
            clock.advance();
        }
        clock.reset();
        assert_eq!(clock.samples(), 0);
        assert_eq!(clock.sample_rate(), 48000);
    }
}
