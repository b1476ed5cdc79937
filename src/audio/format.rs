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

use std::{fmt, str::FromStr};

use super::error::StartupError;

/// The stream sample type handed to the output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Integer samples (16 or 32 bit).
    Int,
    /// 32-bit floating point samples.
    Float,
}

impl FromStr for SampleFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "float" | "Float" => Ok(SampleFormat::Float),
            "int" | "Int" => Ok(SampleFormat::Int),
            _ => Err(format!("Unsupported sample format: {}", s)),
        }
    }
}

impl SampleFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            SampleFormat::Float => "float",
            SampleFormat::Int => "int",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output format for a session. Always mono; fixed for the lifetime of a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Sample format (integer or float)
    pub sample_format: SampleFormat,
    /// Bits per sample
    pub bits_per_sample: u16,
}

impl TargetFormat {
    /// Number of output channels. The synthesizer only produces mono.
    pub const CHANNELS: u16 = 1;

    /// Creates a new TargetFormat, rejecting combinations no backend can stream.
    pub fn new(
        sample_rate: u32,
        sample_format: SampleFormat,
        bits_per_sample: u16,
    ) -> Result<Self, StartupError> {
        if sample_rate == 0 {
            return Err(StartupError::UnsupportedFormat(
                "sample rate must be greater than 0".into(),
            ));
        }

        match (sample_format, bits_per_sample) {
            (SampleFormat::Int, 16) | (SampleFormat::Int, 32) | (SampleFormat::Float, 32) => {
                Ok(TargetFormat {
                    sample_rate,
                    sample_format,
                    bits_per_sample,
                })
            }
            (format, bits) => Err(StartupError::UnsupportedFormat(format!(
                "{} samples with {} bits",
                format, bits
            ))),
        }
    }

    /// The duration of one sample in seconds.
    pub fn sample_period(&self) -> f64 {
        1.0 / self.sample_rate as f64
    }
}

impl Default for TargetFormat {
    /// 44.1kHz, 32-bit integer.
    fn default() -> Self {
        TargetFormat {
            sample_rate: 44100,
            sample_format: SampleFormat::Int,
            bits_per_sample: 32,
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz {}{} mono",
            self.sample_rate, self.sample_format, self.bits_per_sample
        )
    }
}

/// A fixed-width signed integer sample.
pub trait IntegerSample: Copy + Default + Send + Sync + 'static {
    /// Largest positive value, as a float.
    const MAX_AMPLITUDE: f64;

    /// Truncates a scaled amplitude into the sample type.
    fn from_scaled(value: f64) -> Self;
}

impl IntegerSample for i16 {
    const MAX_AMPLITUDE: f64 = i16::MAX as f64;

    fn from_scaled(value: f64) -> Self {
        value as i16
    }
}

impl IntegerSample for i32 {
    const MAX_AMPLITUDE: f64 = i32::MAX as f64;

    fn from_scaled(value: f64) -> Self {
        value as i32
    }
}

/// An amplitude clamped to [-1.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct SampleClip(f64);

impl SampleClip {
    /// Clamps the amplitude. NaN becomes silence.
    pub fn new(amplitude: f64) -> SampleClip {
        if amplitude.is_nan() {
            return SampleClip(0.0);
        }
        SampleClip(amplitude.clamp(-1.0, 1.0))
    }

    pub fn amplitude(self) -> f64 {
        self.0
    }

    /// Scales the clipped amplitude to the integer range of `S`.
    pub fn to_sample<S: IntegerSample>(self) -> S {
        S::from_scaled(self.0 * S::MAX_AMPLITUDE)
    }
}

impl From<f64> for SampleClip {
    fn from(amplitude: f64) -> Self {
        SampleClip::new(amplitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_format_from_str() {
        assert_eq!(
            SampleFormat::from_str("float").unwrap(),
            SampleFormat::Float
        );
        assert_eq!(SampleFormat::from_str("Int").unwrap(), SampleFormat::Int);
        assert!(SampleFormat::from_str("double").is_err());
        assert!(SampleFormat::from_str("").is_err());
    }

    #[test]
    fn test_target_format_new() {
        let format = TargetFormat::new(48000, SampleFormat::Int, 16).unwrap();
        assert_eq!(format.sample_rate, 48000);
        assert_eq!(format.bits_per_sample, 16);

        assert!(TargetFormat::new(44100, SampleFormat::Float, 32).is_ok());
    }

    #[test]
    fn test_target_format_new_invalid() {
        assert!(matches!(
            TargetFormat::new(0, SampleFormat::Int, 32),
            Err(StartupError::UnsupportedFormat(_))
        ));
        assert!(TargetFormat::new(44100, SampleFormat::Int, 24).is_err());
        assert!(TargetFormat::new(44100, SampleFormat::Float, 16).is_err());
    }

    #[test]
    fn test_target_format_default() {
        let format = TargetFormat::default();
        assert_eq!(format.sample_rate, 44100);
        assert_eq!(format.sample_format, SampleFormat::Int);
        assert_eq!(format.bits_per_sample, 32);
        assert_eq!(format.sample_period(), 1.0 / 44100.0);
        assert_eq!(format.to_string(), "44100Hz int32 mono");
    }

    #[test]
    fn test_sample_clip_clamps() {
        assert_eq!(SampleClip::new(1.7).amplitude(), 1.0);
        assert_eq!(SampleClip::new(-3.0).amplitude(), -1.0);
        assert_eq!(SampleClip::new(0.25).amplitude(), 0.25);
        assert_eq!(SampleClip::new(f64::NAN).amplitude(), 0.0);
    }

    #[test]
    fn test_sample_clip_to_integer() {
        assert_eq!(SampleClip::new(1.0).to_sample::<i32>(), i32::MAX);
        assert_eq!(SampleClip::new(-1.0).to_sample::<i32>(), -i32::MAX);
        assert_eq!(SampleClip::new(0.0).to_sample::<i32>(), 0);
        assert_eq!(SampleClip::new(2.0).to_sample::<i16>(), i16::MAX);
        assert_eq!(SampleClip::new(0.5).to_sample::<i16>(), 16383);
    }
}
