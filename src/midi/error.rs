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

/// Errors raised while finding or driving a MIDI device.
#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error(transparent)]
    Init(#[from] midir::InitError),

    #[error(transparent)]
    PortInfo(#[from] midir::PortInfoError),

    #[error("no MIDI device found with name {0}")]
    NotFound(String),

    #[error("found too many MIDI devices that match ({0}), use a less ambiguous device name")]
    Ambiguous(String),

    #[error("unable to connect to MIDI device {name}: {message}")]
    Connect { name: String, message: String },

    #[error("unable to start the MIDI thread: {0}")]
    Spawn(#[from] std::io::Error),
}
