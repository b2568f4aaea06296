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

use crate::{audio::BackendError, job::JobKind, stream::StreamError};

/// A failure detected on the realtime thread. Each kind carries a static
/// message so reporting it never allocates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobError {
    MidiBufferExhausted,
    SampleRateMismatch,
    ChannelCountMismatch,
}

impl JobError {
    pub const fn message(self) -> &'static str {
        match self {
            JobError::MidiBufferExhausted => "MIDI output buffer exhausted",
            JobError::SampleRateMismatch => "Sample rate changed while the job was running",
            JobError::ChannelCountMismatch => {
                "The audio device no longer has the channels the sampler uses"
            }
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Errors returned to callers of the sampler.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("the sampler is busy with another job")]
    Busy,

    #[error("no job is running")]
    NotRunning,

    #[error("the sampler is not active")]
    Inactive,

    #[error("stream has {found} channels but the sampler uses {expected}")]
    ChannelMismatch { expected: usize, found: usize },

    #[error("stream sample rate is {found} Hz but the sampler runs at {expected} Hz")]
    SampleRateMismatch { expected: u32, found: u32 },

    #[error("{kind} jobs need an {expected} stream")]
    StreamKind {
        kind: JobKind,
        expected: &'static str,
    },

    #[error("the command channel is full")]
    CommandChannelFull,

    #[error("invalid sampler settings: {0}")]
    InvalidSettings(String),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("unable to start the worker thread: {0}")]
    Spawn(std::io::Error),
}
