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
use std::{io, sync::Arc};

use parking_lot::Mutex;

use super::{SampleInputStream, SampleOutputStream, StreamError};

/// Plays interleaved frames held in memory.
pub struct MemoryInputStream {
    channels: usize,
    sample_rate: u32,
    samples: Vec<f32>,
    position: usize,
}

impl MemoryInputStream {
    /// Creates a stream from interleaved samples. A trailing partial frame is
    /// ignored.
    pub fn new(channels: usize, sample_rate: u32, mut samples: Vec<f32>) -> MemoryInputStream {
        let channels = channels.max(1);
        samples.truncate(samples.len() - samples.len() % channels);
        MemoryInputStream {
            channels,
            sample_rate,
            samples,
            position: 0,
        }
    }

    /// Creates a stream from one vector per channel. Shorter channels are
    /// padded with silence.
    pub fn from_channels(sample_rate: u32, channels: &[Vec<f32>]) -> MemoryInputStream {
        let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
        let mut samples = Vec::with_capacity(frames * channels.len());
        for frame in 0..frames {
            for channel in channels {
                samples.push(channel.get(frame).copied().unwrap_or(0.0));
            }
        }
        MemoryInputStream::new(channels.len(), sample_rate, samples)
    }
}

impl SampleInputStream for MemoryInputStream {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    fn read(&mut self, buffer: &mut [f32]) -> Result<usize, StreamError> {
        let wanted = buffer.len() - buffer.len() % self.channels;
        let count = wanted.min(self.samples.len() - self.position);
        buffer[..count].copy_from_slice(&self.samples[self.position..self.position + count]);
        self.position += count;
        Ok(count / self.channels)
    }
}

#[derive(Default)]
struct Captured {
    samples: Vec<f32>,
    finished: bool,
}

/// A handle onto what a [`MemoryOutputStream`] received. It stays usable
/// after the stream itself has been handed to a job.
#[derive(Clone)]
pub struct MemoryCapture {
    channels: usize,
    captured: Arc<Mutex<Captured>>,
}

impl MemoryCapture {
    /// All interleaved samples written so far.
    pub fn samples(&self) -> Vec<f32> {
        self.captured.lock().samples.clone()
    }

    /// The samples of a single channel.
    pub fn channel(&self, channel: usize) -> Vec<f32> {
        self.captured
            .lock()
            .samples
            .iter()
            .skip(channel)
            .step_by(self.channels)
            .copied()
            .collect()
    }

    pub fn frames(&self) -> usize {
        self.captured.lock().samples.len() / self.channels
    }

    pub fn is_finished(&self) -> bool {
        self.captured.lock().finished
    }
}

/// Collects captured frames in memory.
pub struct MemoryOutputStream {
    channels: usize,
    sample_rate: u32,
    fail_writes: bool,
    captured: Arc<Mutex<Captured>>,
}

impl MemoryOutputStream {
    pub fn new(channels: usize, sample_rate: u32) -> (MemoryOutputStream, MemoryCapture) {
        let channels = channels.max(1);
        let captured = Arc::new(Mutex::new(Captured::default()));
        (
            MemoryOutputStream {
                channels,
                sample_rate,
                fail_writes: false,
                captured: captured.clone(),
            },
            MemoryCapture { channels, captured },
        )
    }

    /// A stream whose writes always fail, for exercising error reporting.
    pub fn failing(channels: usize, sample_rate: u32) -> MemoryOutputStream {
        let (mut stream, _) = MemoryOutputStream::new(channels, sample_rate);
        stream.fail_writes = true;
        stream
    }
}

impl SampleOutputStream for MemoryOutputStream {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, frames: &[f32]) -> Result<(), StreamError> {
        if self.fail_writes {
            return Err(StreamError::Io(io::Error::new(
                io::ErrorKind::Other,
                "write refused",
            )));
        }
        if frames.len() % self.channels != 0 {
            return Err(StreamError::PartialFrame(frames.len()));
        }

        let mut captured = self.captured.lock();
        if captured.finished {
            return Err(StreamError::Finished);
        }
        captured.samples.extend_from_slice(frames);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), StreamError> {
        let mut captured = self.captured.lock();
        if captured.finished {
            return Err(StreamError::Finished);
        }
        captured.finished = true;
        Ok(())
    }
}
