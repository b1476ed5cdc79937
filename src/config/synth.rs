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
use std::path::Path;

use config::{Config, File, FileFormat};
use serde::Deserialize;

use super::{audio::Audio, error::ConfigError};
use crate::{
    audio::{thread_priority::AudioThreadPriority, EngineConfig},
    synth::Waveform,
};

/// The top level synthesizer configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Synth {
    /// Output device and stream settings.
    #[serde(default)]
    audio: Audio,

    /// The waveform selected when the session starts.
    waveform: Option<Waveform>,
}

impl Synth {
    /// Parse a synthesizer configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Synth, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Synth>()?)
    }

    /// Parse a synthesizer configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Synth, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<Synth>()?)
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut Audio {
        &mut self.audio
    }

    /// The initial waveform (default: sine).
    pub fn waveform(&self) -> Waveform {
        self.waveform.unwrap_or_default()
    }

    /// Validates the audio settings and builds the engine configuration.
    pub fn engine_config(
        &self,
        thread_priority: Option<AudioThreadPriority>,
    ) -> Result<EngineConfig, ConfigError> {
        Ok(EngineConfig {
            device: self.audio.device().map(str::to_string),
            format: self.audio.target_format()?,
            layout: self.audio.block_layout()?,
            thread_priority,
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use crate::audio::{BlockLayout, SampleFormat};

    use super::*;

    #[test]
    fn test_empty_config() {
        let synth = Synth::from_yaml("{}").unwrap();
        assert_eq!(synth.waveform(), Waveform::Sine);
        assert_eq!(synth.audio().device(), None);

        let engine = synth.engine_config(None).unwrap();
        assert_eq!(engine.device, None);
        assert_eq!(engine.layout, BlockLayout::default());
        assert!(engine.thread_priority.is_none());
    }

    #[test]
    fn test_full_config() {
        let synth = Synth::from_yaml(
            r#"
            audio:
              device: mock-device
              sample_rate: 48000
              sample_format: int
              bits_per_sample: 16
              block_count: 4
              block_samples: 128
            waveform: square
            "#,
        )
        .unwrap();

        assert_eq!(synth.waveform(), Waveform::Square);
        let engine = synth.engine_config(None).unwrap();
        assert_eq!(engine.device.as_deref(), Some("mock-device"));
        assert_eq!(engine.format.sample_rate, 48000);
        assert_eq!(engine.format.sample_format, SampleFormat::Int);
        assert_eq!(engine.format.bits_per_sample, 16);
        assert_eq!(engine.layout, BlockLayout::new(4, 128));
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            Synth::from_yaml("waveform: sawtooth"),
            Err(ConfigError::Load(_))
        ));
        assert!(matches!(
            Synth::from_yaml("audio:\n  block_count: 1\n")
                .unwrap()
                .engine_config(None),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_deserialize_file() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile()?;
        writeln!(file, "audio:\n  device: mock\nwaveform: square")?;

        let mut synth = Synth::deserialize(file.path())?;
        assert_eq!(synth.audio().device(), Some("mock"));
        assert_eq!(synth.waveform(), Waveform::Square);

        synth.audio_mut().set_device("mock-other");
        assert_eq!(synth.audio().device(), Some("mock-other"));

        assert!(matches!(
            Synth::deserialize(&file.path().with_extension("missing.yaml")),
            Err(ConfigError::Load(_))
        ));
        Ok(())
    }
}
