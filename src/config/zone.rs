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
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use super::ConfigError;

const DEFAULT_CHANNEL: u8 = 1;

/// A controller value set before the note is triggered.
#[derive(Deserialize, Clone, Debug)]
pub struct Control {
    controller: u8,
    value: u8,
}

/// A YAML representation of a zone.
#[derive(Deserialize, Clone, Debug)]
pub struct Zone {
    /// Used to name the captured file. Derived from the MIDI values when
    /// unset.
    name: Option<String>,

    /// The MIDI channel, 1-16 (default: 1)
    channel: Option<u8>,

    note: u8,

    velocity: u8,

    aftertouch: Option<u8>,

    channel_pressure: Option<u8>,

    controls: Option<Vec<Control>>,

    /// How long the note is held, e.g. "2s".
    sample_time: String,

    /// How long to keep recording after the note off (default: 0s)
    release_time: Option<String>,
}

impl Zone {
    pub fn name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!(
                "ch{}-note{}-vel{}",
                self.channel(),
                self.note,
                self.velocity
            ),
        }
    }

    fn channel(&self) -> u8 {
        self.channel.unwrap_or(DEFAULT_CHANNEL)
    }

    /// Converts the YAML zone into an engine zone.
    pub fn to_zone(&self) -> Result<crate::job::Zone, ConfigError> {
        let mut zone = crate::job::Zone::new(self.channel(), self.note, self.velocity)?
            .with_sample_time(parse_duration("sample_time", &self.sample_time)?)
            .with_release_time(match &self.release_time {
                Some(release_time) => parse_duration("release_time", release_time)?,
                None => Duration::ZERO,
            });

        if let Some(aftertouch) = self.aftertouch {
            zone = zone.with_aftertouch(aftertouch)?;
        }
        if let Some(channel_pressure) = self.channel_pressure {
            zone = zone.with_channel_pressure(channel_pressure)?;
        }
        for control in self.controls.iter().flatten() {
            zone = zone.with_control(control.controller, control.value)?;
        }
        Ok(zone)
    }
}

fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    DurationString::from_string(value.to_string())
        .map(Duration::from)
        .map_err(|e| ConfigError::Duration {
            field,
            value: value.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod test {
    use std::{error::Error, time::Duration};

    use config::{Config, File, FileFormat};
    use midly::num::{u4, u7};

    use super::Zone;
    use crate::config::ConfigError;

    fn parse(yaml: &str) -> Result<Zone, Box<dyn Error>> {
        Ok(Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<Zone>()?)
    }

    #[test]
    fn full_zone() -> Result<(), Box<dyn Error>> {
        let zone = parse(
            r#"
            name: piano-c4
            channel: 2
            note: 60
            velocity: 100
            aftertouch: 20
            channel_pressure: 30
            controls:
              - controller: 64
                value: 127
              - controller: 1
                value: 10
            sample_time: 1s
            release_time: 500ms
        "#,
        )?;
        assert_eq!("piano-c4", zone.name());

        let zone = zone.to_zone()?;
        assert_eq!(u4::from(1), zone.channel());
        assert_eq!(u7::from(60), zone.note());
        assert_eq!(u7::from(100), zone.velocity());
        assert_eq!(Some(u7::from(20)), zone.aftertouch());
        assert_eq!(Some(u7::from(30)), zone.channel_pressure());
        assert_eq!(2, zone.controls().len());
        assert_eq!(Some(&u7::from(127)), zone.controls().get(&u7::from(64)));
        assert_eq!(Duration::from_secs(1), zone.sample_time());
        assert_eq!(Duration::from_millis(500), zone.release_time());
        Ok(())
    }

    #[test]
    fn defaults() -> Result<(), Box<dyn Error>> {
        let zone = parse(
            r#"
            note: 48
            velocity: 64
            sample_time: 2s
        "#,
        )?;
        assert_eq!("ch1-note48-vel64", zone.name());

        let zone = zone.to_zone()?;
        assert_eq!(u4::from(0), zone.channel());
        assert_eq!(Duration::ZERO, zone.release_time());
        assert!(zone.controls().is_empty());
        Ok(())
    }

    #[test]
    fn invalid_values() -> Result<(), Box<dyn Error>> {
        let zone = parse(
            r#"
            note: 48
            velocity: 64
            sample_time: forever
        "#,
        )?;
        assert!(matches!(
            zone.to_zone(),
            Err(ConfigError::Duration {
                field: "sample_time",
                ..
            })
        ));

        let zone = parse(
            r#"
            channel: 17
            note: 48
            velocity: 64
            sample_time: 1s
        "#,
        )?;
        assert!(matches!(zone.to_zone(), Err(ConfigError::Zone(_))));

        let zone = parse(
            r#"
            note: 200
            velocity: 64
            sample_time: 1s
        "#,
        )?;
        assert!(matches!(zone.to_zone(), Err(ConfigError::Zone(_))));
        Ok(())
    }
}
