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

use crate::engine::DEFAULT_EVENT_CAPACITY;

/// Engine tuning. Everything is optional.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Engine {
    /// Capacity of the realtime event ring.
    event_capacity: Option<usize>,

    /// Write the release tail after the sampled frames.
    include_release_tail: Option<bool>,

    /// Realtime priority for the audio and MIDI threads. The
    /// RTSAMPLER_THREAD_PRIORITY environment variable takes precedence.
    thread_priority: Option<u8>,
}

impl Engine {
    pub fn event_capacity(&self) -> usize {
        self.event_capacity.unwrap_or(DEFAULT_EVENT_CAPACITY)
    }

    pub fn include_release_tail(&self) -> bool {
        self.include_release_tail.unwrap_or(false)
    }

    pub fn thread_priority(&self) -> Option<u8> {
        self.thread_priority
    }
}
