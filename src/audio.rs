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

use tracing::info;

use crate::{config, engine::Backend};

pub mod cpal;
mod error;
pub mod mock;
pub mod thread_priority;

pub use error::BackendError;

/// An overrun or underrun reported by the backend for one buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Xrun {
    InputOverflow,
    InputUnderflow,
    OutputOverflow,
    OutputUnderflow,
}

impl fmt::Display for Xrun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self {
            Xrun::InputOverflow => "input overflow",
            Xrun::InputUnderflow => "input underflow",
            Xrun::OutputOverflow => "output overflow",
            Xrun::OutputUnderflow => "output underflow",
        };
        f.write_str(description)
    }
}

/// One audio buffer as handed to the processor: interleaved input and
/// output frames plus what the backend knows about them.
pub struct AudioBlock<'a> {
    pub input: &'a [f32],
    pub input_channels: usize,
    pub output: &'a mut [f32],
    pub output_channels: usize,
    /// Frames in this buffer, the smaller of what input and output hold.
    pub frames: usize,
    /// The device's sample rate at the time of this buffer.
    pub sample_rate: u32,
    pub xrun: Option<Xrun>,
}

impl<'a> AudioBlock<'a> {
    pub fn new(
        input: &'a [f32],
        input_channels: usize,
        output: &'a mut [f32],
        output_channels: usize,
        sample_rate: u32,
    ) -> AudioBlock<'a> {
        let output_frames = output.len().checked_div(output_channels).unwrap_or(0);
        let frames = match input.len().checked_div(input_channels) {
            Some(input_frames) => input_frames.min(output_frames),
            None => output_frames,
        };

        AudioBlock {
            input,
            input_channels,
            output,
            output_channels,
            frames,
            sample_rate,
            xrun: None,
        }
    }

    pub fn with_xrun(mut self, xrun: Option<Xrun>) -> AudioBlock<'a> {
        self.xrun = xrun;
        self
    }
}

/// Lists the audio devices known to cpal.
pub fn list_devices() -> Result<Vec<cpal::DeviceInfo>, BackendError> {
    cpal::list()
}

/// Opens the backend named by the configuration. Output devices whose name
/// starts with "mock" get a software clocked mock backend.
pub fn get_backend(config: &config::Sampler) -> Result<Box<dyn Backend>, BackendError> {
    let audio = config.audio();
    let output_device = audio.output_device()?;
    if output_device.starts_with("mock") {
        info!(device = output_device, "Using mock audio backend.");
        return Ok(Box::new(mock::Backend::clocked(
            output_device,
            audio.sample_rate(),
            audio.buffer_size() as usize,
            audio.device_input_channels()?,
            audio.device_output_channels()?,
        )));
    }

    Ok(Box::new(cpal::Backend::new(
        audio,
        config.midi(),
        config.engine().thread_priority(),
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_frames_follow_shortest_side() {
        let input = [0.0; 512];
        let mut output = [0.0; 768];
        let block = AudioBlock::new(&input, 2, &mut output, 3, 48000);
        assert_eq!(256, block.frames);

        let mut output = [0.0; 128];
        let block = AudioBlock::new(&input, 1, &mut output, 1, 48000);
        assert_eq!(128, block.frames);

        let mut output = [0.0; 64];
        let block = AudioBlock::new(&[], 0, &mut output, 2, 48000).with_xrun(Some(Xrun::OutputUnderflow));
        assert_eq!(32, block.frames);
        assert_eq!(Some(Xrun::OutputUnderflow), block.xrun);
    }
}
