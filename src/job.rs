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
use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

use midly::num::{u4, u7};

/// Errors raised while describing a zone.
#[derive(Debug, thiserror::Error)]
pub enum ZoneError {
    #[error("MIDI channel {0} is out of range, expected 1-16")]
    InvalidChannel(u8),

    #[error("{field} value {value} is not a 7-bit MIDI data byte")]
    InvalidData { field: &'static str, value: u8 },
}

/// The kind of work a job performs on the realtime thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobKind {
    /// Trigger the zone over MIDI and record the instrument's output.
    Sample,
    /// Play a previously recorded sample through the outputs.
    Play,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Sample => write!(f, "sample"),
            JobKind::Play => write!(f, "play"),
        }
    }
}

/// A zone describes a single capture target: the note to trigger and the
/// controller state the instrument should be in while it sounds.
#[derive(Clone, Debug, PartialEq)]
pub struct Zone {
    /// Wire channel, 0-15.
    channel: u4,
    note: u7,
    velocity: u7,
    aftertouch: Option<u7>,
    channel_pressure: Option<u7>,
    controls: BTreeMap<u7, u7>,
    sample_time: Duration,
    release_time: Duration,
}

fn data_byte(field: &'static str, value: u8) -> Result<u7, ZoneError> {
    u7::try_from(value).ok_or(ZoneError::InvalidData { field, value })
}

impl Zone {
    /// Creates a zone on the given 1-based MIDI channel. The zone starts with
    /// no controllers and zero sample and release times.
    pub fn new(channel: u8, note: u8, velocity: u8) -> Result<Zone, ZoneError> {
        let wire_channel = channel
            .checked_sub(1)
            .and_then(u4::try_from)
            .ok_or(ZoneError::InvalidChannel(channel))?;

        Ok(Zone {
            channel: wire_channel,
            note: data_byte("note", note)?,
            velocity: data_byte("velocity", velocity)?,
            aftertouch: None,
            channel_pressure: None,
            controls: BTreeMap::new(),
            sample_time: Duration::ZERO,
            release_time: Duration::ZERO,
        })
    }

    /// Sets how long the note is held. Recording covers exactly this long
    /// before the note off.
    pub fn with_sample_time(mut self, sample_time: Duration) -> Zone {
        self.sample_time = sample_time;
        self
    }

    /// Sets how long recording continues after the note off.
    pub fn with_release_time(mut self, release_time: Duration) -> Zone {
        self.release_time = release_time;
        self
    }

    /// Sets the polyphonic key pressure sent after the note on.
    pub fn with_aftertouch(mut self, pressure: u8) -> Result<Zone, ZoneError> {
        self.aftertouch = Some(data_byte("aftertouch", pressure)?);
        Ok(self)
    }

    /// Sets the channel pressure sent after the note on. It goes out before
    /// any polyphonic aftertouch.
    pub fn with_channel_pressure(mut self, pressure: u8) -> Result<Zone, ZoneError> {
        self.channel_pressure = Some(data_byte("channel pressure", pressure)?);
        Ok(self)
    }

    /// Sets a controller value. Setting the same controller twice keeps the
    /// last value.
    pub fn with_control(mut self, controller: u8, value: u8) -> Result<Zone, ZoneError> {
        self.controls.insert(
            data_byte("controller", controller)?,
            data_byte("controller value", value)?,
        );
        Ok(self)
    }

    /// The zero-based channel used on the wire.
    pub fn channel(&self) -> u4 {
        self.channel
    }

    /// The key triggered by the note on and released by the note off.
    pub fn note(&self) -> u7 {
        self.note
    }

    /// Velocity of both the note on and the note off.
    pub fn velocity(&self) -> u7 {
        self.velocity
    }

    /// Polyphonic key pressure for the zone's note, if any.
    pub fn aftertouch(&self) -> Option<u7> {
        self.aftertouch
    }

    /// Channel pressure, if any.
    pub fn channel_pressure(&self) -> Option<u7> {
        self.channel_pressure
    }

    /// Controller values, ordered by controller number.
    pub fn controls(&self) -> &BTreeMap<u7, u7> {
        &self.controls
    }

    /// How long the note is held.
    pub fn sample_time(&self) -> Duration {
        self.sample_time
    }

    /// How long recording runs past the note off. Zero means the capture
    /// ends with the note off.
    pub fn release_time(&self) -> Duration {
        self.release_time
    }

    /// The number of frames held while the note sounds.
    pub fn sample_frames(&self, sample_rate: u32) -> usize {
        frames_for(self.sample_time, sample_rate)
    }

    /// The number of frames recorded after the note off.
    pub fn release_frames(&self, sample_rate: u32) -> usize {
        frames_for(self.release_time, sample_rate)
    }

    /// The number of MIDI messages sent before recording starts.
    pub(crate) fn pre_midi_messages(&self) -> usize {
        self.controls.len()
            + 1
            + usize::from(self.channel_pressure.is_some())
            + usize::from(self.aftertouch.is_some())
    }
}

fn frames_for(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * f64::from(sample_rate)).round() as usize
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "channel {} note {} velocity {}",
            u8::from(self.channel) + 1,
            u8::from(self.note),
            u8::from(self.velocity)
        )
    }
}

/// A unit of realtime work. Jobs are cheap to clone; the zone is shared.
#[derive(Clone, Debug)]
pub struct Job {
    kind: JobKind,
    zone: Arc<Zone>,
}

impl Job {
    /// A job that triggers the zone and records it.
    pub fn sample(zone: Arc<Zone>) -> Job {
        Job {
            kind: JobKind::Sample,
            zone,
        }
    }

    /// A job that plays a recording back. The audio comes from the job's
    /// input stream, not from the zone.
    pub fn play(zone: Arc<Zone>) -> Job {
        Job {
            kind: JobKind::Play,
            zone,
        }
    }

    /// Whether the job records or plays back.
    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// The zone the job works on.
    pub fn zone(&self) -> &Arc<Zone> {
        &self.zone
    }
}
