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
use serde::Deserialize;

use super::ConfigError;

const DEFAULT_SAMPLE_RATE: u32 = 48000;
const DEFAULT_BUFFER_SIZE: u32 = 256;
const DEFAULT_CHANNELS: usize = 1;

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Audio {
    /// Device used for both directions unless overridden below.
    device: Option<String>,

    input_device: Option<String>,

    output_device: Option<String>,

    /// Sample rate in Hz (default: 48000)
    sample_rate: Option<u32>,

    /// Frames per callback (default: 256)
    buffer_size: Option<u32>,

    /// Number of sampler channels (default: 1)
    channels: Option<usize>,

    /// Device input channel (1-based) for each sampler channel. Defaults
    /// to the first `channels` inputs.
    input_channels: Option<Vec<usize>>,

    /// Device output channel (1-based) for each sampler channel.
    output_channels: Option<Vec<usize>>,

    /// Copy the sampled inputs to the outputs.
    monitor: Option<bool>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: Some(device.to_string()),
            input_device: None,
            output_device: None,
            sample_rate: None,
            buffer_size: None,
            channels: None,
            input_channels: None,
            output_channels: None,
            monitor: None,
        }
    }

    pub fn input_device(&self) -> Result<&str, ConfigError> {
        self.input_device
            .as_deref()
            .or(self.device.as_deref())
            .ok_or(ConfigError::Invalid {
                field: "audio.input_device",
                message: "no input device or shared device configured".to_string(),
            })
    }

    pub fn output_device(&self) -> Result<&str, ConfigError> {
        self.output_device
            .as_deref()
            .or(self.device.as_deref())
            .ok_or(ConfigError::Invalid {
                field: "audio.output_device",
                message: "no output device or shared device configured".to_string(),
            })
    }

    /// Returns the sample rate (default: 48000)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the frames per callback (default: 256)
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE)
    }

    pub fn channels(&self) -> usize {
        self.channels.unwrap_or(DEFAULT_CHANNELS)
    }

    pub fn monitor(&self) -> bool {
        self.monitor.unwrap_or(false)
    }

    /// Zero-based device input channel for each sampler channel.
    pub fn input_map(&self) -> Result<Vec<usize>, ConfigError> {
        self.channel_map(self.input_channels.as_deref(), "audio.input_channels")
    }

    /// Zero-based device output channel for each sampler channel.
    pub fn output_map(&self) -> Result<Vec<usize>, ConfigError> {
        self.channel_map(self.output_channels.as_deref(), "audio.output_channels")
    }

    /// Input channels the device has to open.
    pub fn device_input_channels(&self) -> Result<usize, ConfigError> {
        Ok(self.input_map()?.iter().max().map_or(0, |channel| channel + 1))
    }

    /// Output channels the device has to open.
    pub fn device_output_channels(&self) -> Result<usize, ConfigError> {
        Ok(self.output_map()?.iter().max().map_or(0, |channel| channel + 1))
    }

    /// Checks the values that have no type level guarantee.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.input_device()?;
        self.output_device()?;
        if self.sample_rate() == 0 {
            return Err(ConfigError::Invalid {
                field: "audio.sample_rate",
                message: "must be greater than 0".to_string(),
            });
        }
        if self.buffer_size() == 0 {
            return Err(ConfigError::Invalid {
                field: "audio.buffer_size",
                message: "must be greater than 0".to_string(),
            });
        }
        self.input_map()?;
        self.output_map()?;
        Ok(())
    }

    fn channel_map(
        &self,
        mapping: Option<&[usize]>,
        field: &'static str,
    ) -> Result<Vec<usize>, ConfigError> {
        let channels = self.channels();
        if channels == 0 {
            return Err(ConfigError::Invalid {
                field: "audio.channels",
                message: "at least one channel is required".to_string(),
            });
        }

        let Some(mapping) = mapping else {
            return Ok((0..channels).collect());
        };
        if mapping.len() != channels {
            return Err(ConfigError::Invalid {
                field,
                message: format!("{} channels mapped, expected {}", mapping.len(), channels),
            });
        }
        mapping
            .iter()
            .map(|channel| {
                channel.checked_sub(1).ok_or(ConfigError::Invalid {
                    field,
                    message: "device channels are numbered from 1".to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use config::{Config, File, FileFormat};

    use super::Audio;
    use crate::config::ConfigError;

    fn parse(yaml: &str) -> Audio {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .and_then(|config| config.try_deserialize::<Audio>())
            .expect("audio config should parse")
    }

    #[test]
    fn defaults() {
        let audio = Audio::new("interface");
        assert_eq!("interface", audio.input_device().unwrap());
        assert_eq!("interface", audio.output_device().unwrap());
        assert_eq!(48000, audio.sample_rate());
        assert_eq!(256, audio.buffer_size());
        assert_eq!(vec![0], audio.input_map().unwrap());
        assert_eq!(vec![0], audio.output_map().unwrap());
        assert!(!audio.monitor());
    }

    #[test]
    fn split_devices_and_maps() {
        let audio = parse(
            r#"
            input_device: capture
            output_device: playback
            channels: 2
            input_channels: [3, 4]
            output_channels: [1, 2]
            monitor: true
        "#,
        );
        assert_eq!("capture", audio.input_device().unwrap());
        assert_eq!("playback", audio.output_device().unwrap());
        assert_eq!(vec![2, 3], audio.input_map().unwrap());
        assert_eq!(vec![0, 1], audio.output_map().unwrap());
        assert_eq!(4, audio.device_input_channels().unwrap());
        assert_eq!(2, audio.device_output_channels().unwrap());
        assert!(audio.monitor());
        assert!(audio.validate().is_ok());
    }

    #[test]
    fn missing_device() {
        let audio = parse("output_device: playback");
        assert!(matches!(
            audio.input_device(),
            Err(ConfigError::Invalid {
                field: "audio.input_device",
                ..
            })
        ));
        assert!(audio.validate().is_err());
    }

    #[test]
    fn bad_maps() {
        let audio = parse(
            r#"
            device: interface
            channels: 2
            input_channels: [1]
        "#,
        );
        assert!(audio.input_map().is_err());

        let audio = parse(
            r#"
            device: interface
            output_channels: [0]
        "#,
        );
        assert!(matches!(
            audio.output_map(),
            Err(ConfigError::Invalid {
                field: "audio.output_channels",
                ..
            })
        ));

        let audio = parse(
            r#"
            device: interface
            channels: 0
        "#,
        );
        assert!(audio.validate().is_err());
    }
}
