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
//! YAML configuration for the sampler binary.

use std::path::Path;

use ::config::{Config, Environment, File};
use serde::Deserialize;

mod audio;
mod engine;
mod error;
mod midi;
mod zone;

pub use self::audio::Audio;
pub use self::engine::Engine;
pub use self::error::ConfigError;
pub use self::midi::Midi;
pub use self::zone::{Control, Zone};

/// Prefix for environment overrides, e.g. RTSAMPLER_AUDIO__SAMPLE_RATE.
const ENV_PREFIX: &str = "RTSAMPLER";

/// The top level configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Sampler {
    audio: Audio,

    /// The instrument's MIDI input. Without it, zones are never triggered.
    midi: Option<Midi>,

    engine: Option<Engine>,

    zones: Option<Vec<Zone>>,
}

impl Sampler {
    /// Loads the configuration file, then applies environment overrides.
    pub fn deserialize(path: &Path) -> Result<Sampler, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Sampler>()?)
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn midi(&self) -> Option<&Midi> {
        self.midi.as_ref()
    }

    pub fn engine(&self) -> Engine {
        self.engine.clone().unwrap_or_default()
    }

    /// The configured zones in file order.
    pub fn zones(&self) -> &[Zone] {
        self.zones.as_deref().unwrap_or_default()
    }

    /// Engine settings derived from the audio and engine sections.
    pub fn settings(&self) -> Result<crate::engine::Settings, ConfigError> {
        let engine = self.engine();
        Ok(crate::engine::Settings {
            input_map: self.audio.input_map()?,
            output_map: self.audio.output_map()?,
            monitor: self.audio.monitor(),
            event_capacity: engine.event_capacity(),
            include_release_tail: engine.include_release_tail(),
        })
    }

    /// Checks every value that can only be checked after loading.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.audio.validate()?;
        if self.engine().event_capacity() < 2 {
            return Err(ConfigError::Invalid {
                field: "engine.event_capacity",
                message: "must be at least 2".to_string(),
            });
        }
        for zone in self.zones() {
            zone.to_zone()?;
        }
        Ok(())
    }
}
