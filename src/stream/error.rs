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

/// Errors raised by sample streams.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("write of {0} samples is not a whole number of frames")]
    PartialFrame(usize),

    #[error("stream ended after {found} of {expected} frames")]
    Truncated { expected: usize, found: usize },

    #[error("unsupported WAV format: {0}")]
    UnsupportedFormat(String),

    #[error("stream is already finished")]
    Finished,
}
