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
//! A MIDI driven realtime sampler. Zones are triggered on a hardware
//! instrument over MIDI while its audio output is recorded, and recorded
//! samples can be played back through the same interface.

pub mod audio;
pub mod config;
pub mod engine;
pub mod job;
pub mod midi;
pub mod stream;
pub mod sync;

#[cfg(test)]
mod testutil;
