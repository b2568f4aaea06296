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
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crate::stream::{SampleInputStream, SampleOutputStream, StreamError};

/// Frames moved per stream call when loading or storing a buffer.
const CHUNK_FRAMES: usize = 1024;

/// Counts buffer allocations and drops so leaks show up in tests and logs.
#[derive(Default)]
pub(crate) struct BufferLedger {
    allocated: AtomicUsize,
    dropped: AtomicUsize,
}

impl BufferLedger {
    /// Buffers allocated and not yet dropped.
    pub(crate) fn live(&self) -> usize {
        self.allocated
            .load(Ordering::Acquire)
            .saturating_sub(self.dropped.load(Ordering::Acquire))
    }

    pub(crate) fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Acquire)
    }
}

/// Per-job sample storage, one array per channel. Sample jobs size it for the
/// sampled frames followed by the release tail; play jobs for the whole
/// stream.
pub struct SampleBuffer {
    channels: Box<[Box<[f32]>]>,
    sample_frames: usize,
    release_frames: usize,
    ledger: Arc<BufferLedger>,
}

impl SampleBuffer {
    pub(crate) fn new(
        channels: usize,
        sample_frames: usize,
        release_frames: usize,
        ledger: &Arc<BufferLedger>,
    ) -> SampleBuffer {
        let total = sample_frames + release_frames;
        ledger.allocated.fetch_add(1, Ordering::AcqRel);
        SampleBuffer {
            channels: (0..channels)
                .map(|_| vec![0.0; total].into_boxed_slice())
                .collect(),
            sample_frames,
            release_frames,
            ledger: ledger.clone(),
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn sample_frames(&self) -> usize {
        self.sample_frames
    }

    pub fn release_frames(&self) -> usize {
        self.release_frames
    }

    pub fn total_frames(&self) -> usize {
        self.sample_frames + self.release_frames
    }

    pub fn channel(&self, channel: usize) -> &[f32] {
        &self.channels[channel]
    }

    pub(crate) fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        &mut self.channels[channel]
    }

    /// Fills the buffer from an interleaved stream with the same channel
    /// count.
    pub(crate) fn load(&mut self, stream: &mut dyn SampleInputStream) -> Result<(), StreamError> {
        let channels = self.channels.len();
        let total = self.total_frames();
        let mut scratch = vec![0.0; CHUNK_FRAMES * channels];
        let mut position = 0;

        while position < total {
            let wanted = CHUNK_FRAMES.min(total - position);
            let read = stream.read(&mut scratch[..wanted * channels])?;
            if read == 0 {
                return Err(StreamError::Truncated {
                    expected: total,
                    found: position,
                });
            }
            for (frame, samples) in scratch[..read * channels].chunks_exact(channels).enumerate() {
                for (channel, sample) in samples.iter().enumerate() {
                    self.channels[channel][position + frame] = *sample;
                }
            }
            position += read;
        }
        Ok(())
    }

    /// Writes the first `frames` frames to a stream, interleaved.
    pub(crate) fn store(
        &self,
        stream: &mut dyn SampleOutputStream,
        frames: usize,
    ) -> Result<(), StreamError> {
        let channels = self.channels.len();
        let frames = frames.min(self.total_frames());
        let mut scratch = Vec::with_capacity(CHUNK_FRAMES * channels);
        let mut position = 0;

        while position < frames {
            let count = CHUNK_FRAMES.min(frames - position);
            scratch.clear();
            for frame in position..position + count {
                scratch.extend(self.channels.iter().map(|channel| channel[frame]));
            }
            stream.write(&scratch)?;
            position += count;
        }
        Ok(())
    }
}

impl Drop for SampleBuffer {
    fn drop(&mut self) {
        self.ledger.dropped.fetch_add(1, Ordering::AcqRel);
    }
}
