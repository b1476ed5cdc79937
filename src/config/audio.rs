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
use std::str::FromStr;

use serde::Deserialize;

use super::error::ConfigError;
use crate::audio::{BlockLayout, SampleFormat, TargetFormat};

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Audio {
    /// The output device. The first available device is used when unset.
    device: Option<String>,

    /// Target sample rate in Hz (default: 44100)
    sample_rate: Option<u32>,

    /// Target sample format (default: "int")
    sample_format: Option<String>,

    /// Target bits per sample (default: 32)
    bits_per_sample: Option<u16>,

    /// Number of blocks in the ring (default: 8)
    block_count: Option<usize>,

    /// Samples per block (default: 512)
    block_samples: Option<usize>,
}

impl Audio {
    /// New will create a new Audio configuration for the given device.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: Some(device.to_string()),
            ..Audio::default()
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    /// Overrides the configured device.
    pub fn set_device(&mut self, device: &str) {
        self.device = Some(device.to_string());
    }

    /// Returns the target sample rate (default: 44100)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(TargetFormat::default().sample_rate)
    }

    /// Returns the target sample format (default: Int)
    pub fn sample_format(&self) -> Result<SampleFormat, ConfigError> {
        match self.sample_format.as_deref() {
            Some(format) => SampleFormat::from_str(format).map_err(ConfigError::Invalid),
            None => Ok(TargetFormat::default().sample_format),
        }
    }

    /// Returns the target bits per sample (default: 32)
    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample.unwrap_or(TargetFormat::default().bits_per_sample)
    }

    /// Returns the number of blocks in the ring (default: 8)
    pub fn block_count(&self) -> usize {
        self.block_count.unwrap_or(BlockLayout::default().block_count)
    }

    /// Returns the samples per block (default: 512)
    pub fn block_samples(&self) -> usize {
        self.block_samples.unwrap_or(BlockLayout::default().block_samples)
    }

    /// The validated output format.
    pub fn target_format(&self) -> Result<TargetFormat, ConfigError> {
        TargetFormat::new(
            self.sample_rate(),
            self.sample_format()?,
            self.bits_per_sample(),
        )
        .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// The validated block layout. The ring needs at least two blocks so one
    /// can be filled while another plays.
    pub fn block_layout(&self) -> Result<BlockLayout, ConfigError> {
        if self.block_count() < 2 {
            return Err(ConfigError::Invalid(format!(
                "block_count must be at least 2, got {}",
                self.block_count()
            )));
        }
        if self.block_samples() < 1 {
            return Err(ConfigError::Invalid(
                "block_samples must be at least 1".into(),
            ));
        }
        Ok(BlockLayout::new(self.block_count(), self.block_samples()))
    }
}
