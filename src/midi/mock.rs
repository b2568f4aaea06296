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

use super::{MidiOutput, ShortMessage};

/// Messages an [`Output`] remembers before it starts forgetting the oldest.
pub const HISTORY: usize = 4096;

/// A MIDI output that accepts a fixed number of messages per audio buffer
/// and keeps the most recent [`HISTORY`] it accepted.
pub struct Output {
    capacity: usize,
    accepted_this_cycle: usize,
    messages: Vec<ShortMessage>,
}

impl Output {
    pub fn new(capacity: usize) -> Output {
        Output {
            capacity,
            accepted_this_cycle: 0,
            messages: Vec::with_capacity(64),
        }
    }

    /// Starts a new audio buffer, restoring the full capacity.
    pub fn begin_cycle(&mut self) {
        self.accepted_this_cycle = 0;
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    /// The remembered messages, oldest first.
    pub fn messages(&self) -> &[ShortMessage] {
        &self.messages
    }

    /// The messages accepted since the last [`Output::begin_cycle`].
    pub fn sent_this_cycle(&self) -> &[ShortMessage] {
        let sent = self.accepted_this_cycle.min(self.messages.len());
        &self.messages[self.messages.len() - sent..]
    }

    /// Removes and returns the remembered messages.
    pub fn take_messages(&mut self) -> Vec<ShortMessage> {
        std::mem::take(&mut self.messages)
    }
}

impl MidiOutput for Output {
    fn vacant(&self) -> usize {
        self.capacity.saturating_sub(self.accepted_this_cycle)
    }

    fn send(&mut self, message: &ShortMessage) -> bool {
        if self.vacant() == 0 {
            return false;
        }
        if self.messages.len() >= HISTORY {
            self.messages.drain(..HISTORY / 2);
        }
        self.accepted_this_cycle += 1;
        self.messages.push(*message);
        true
    }
}
