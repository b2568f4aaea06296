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
//! Streams that jobs read samples from or write captures to.

mod error;
pub mod memory;
pub mod wav;

pub use error::StreamError;

/// A source of interleaved frames played back by a `Play` job. The whole
/// stream is read into memory before the job starts.
pub trait SampleInputStream: Send {
    fn channels(&self) -> usize;

    fn sample_rate(&self) -> u32;

    /// The total number of frames in the stream.
    fn frames(&self) -> usize;

    /// Reads up to `buffer.len() / channels` interleaved frames and returns
    /// the number of frames read. Zero means the stream is exhausted.
    fn read(&mut self, buffer: &mut [f32]) -> Result<usize, StreamError>;
}

/// A sink for the interleaved frames captured by a `Sample` job.
pub trait SampleOutputStream: Send {
    fn channels(&self) -> usize;

    fn sample_rate(&self) -> u32;

    /// Writes whole interleaved frames.
    fn write(&mut self, frames: &[f32]) -> Result<(), StreamError>;

    /// Flushes and closes the stream. Writing afterwards is an error.
    fn finish(&mut self) -> Result<(), StreamError>;
}

/// The stream attached to a job: input for playback, output for capture.
pub enum JobStream {
    Input(Box<dyn SampleInputStream>),
    Output(Box<dyn SampleOutputStream>),
}

impl JobStream {
    pub fn channels(&self) -> usize {
        match self {
            JobStream::Input(stream) => stream.channels(),
            JobStream::Output(stream) => stream.channels(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        match self {
            JobStream::Input(stream) => stream.sample_rate(),
            JobStream::Output(stream) => stream.sample_rate(),
        }
    }

    /// A short name for log messages and errors.
    pub fn direction(&self) -> &'static str {
        match self {
            JobStream::Input(_) => "input",
            JobStream::Output(_) => "output",
        }
    }
}
