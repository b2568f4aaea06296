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

use crate::{config::ConfigError, midi::MidiError};

/// Errors raised while opening or running an audio backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("no audio device found with name {0}")]
    DeviceNotFound(String),

    #[error("audio device {device} has no {direction} configuration with {channels} channels")]
    Channels {
        device: String,
        direction: &'static str,
        channels: u16,
    },

    #[error("unsupported sample format {0}")]
    UnsupportedFormat(String),

    #[error("the backend is already active")]
    AlreadyActive,

    #[error("the audio stream thread exited before the streams started")]
    StreamThread,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Midi(#[from] MidiError),

    #[error(transparent)]
    Devices(#[from] cpal::DevicesError),

    #[error(transparent)]
    DeviceName(#[from] cpal::DeviceNameError),

    #[error(transparent)]
    HostUnavailable(#[from] cpal::HostUnavailable),

    #[error(transparent)]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error(transparent)]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error(transparent)]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error(transparent)]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
