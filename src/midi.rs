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
use std::fmt;

mod error;
mod message;
pub mod midir;
pub mod mock;

pub use error::MidiError;
pub use message::ShortMessage;

/// Per-buffer MIDI output as seen from the audio callback. Implementations
/// must not block or allocate in `send`.
pub trait MidiOutput {
    /// The number of messages that can still be accepted for the current
    /// buffer.
    fn vacant(&self) -> usize;

    /// Queues a message. Returns false if the message could not be taken.
    fn send(&mut self, message: &ShortMessage) -> bool;
}

/// Discards everything. Used when no MIDI device is configured, for example
/// when a machine is only used to audition samples.
pub struct Disconnected;

impl MidiOutput for Disconnected {
    fn vacant(&self) -> usize {
        usize::MAX
    }

    fn send(&mut self, _: &ShortMessage) -> bool {
        true
    }
}

/// A MIDI port as reported by midir.
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    pub name: String,
    pub input: bool,
    pub output: bool,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut capabilities: Vec<&str> = Vec::new();
        if self.input {
            capabilities.push("Input");
        }
        if self.output {
            capabilities.push("Output");
        }

        write!(f, "{} ({})", self.name, capabilities.join("/"))
    }
}

/// Lists devices known to midir.
pub fn list_devices() -> Result<Vec<DeviceInfo>, MidiError> {
    midir::list()
}
