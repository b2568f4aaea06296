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
use std::{fs::File, io::BufReader, io::BufWriter, path::Path};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use super::{SampleInputStream, SampleOutputStream, StreamError};

#[derive(Clone, Copy)]
enum Encoding {
    Float,
    Int { scale: f32 },
}

/// Reads a WAV file as normalized `f32` frames.
pub struct WavInputStream {
    reader: WavReader<BufReader<File>>,
    encoding: Encoding,
    channels: usize,
    sample_rate: u32,
    frames: usize,
}

impl WavInputStream {
    pub fn open(path: &Path) -> Result<WavInputStream, StreamError> {
        let reader = WavReader::open(path)?;
        let spec = reader.spec();
        let encoding = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Float, 32) => Encoding::Float,
            (SampleFormat::Int, bits @ 8..=32) => Encoding::Int {
                scale: 1.0 / (1i64 << (bits - 1)) as f32,
            },
            (format, bits) => {
                return Err(StreamError::UnsupportedFormat(format!(
                    "{format:?} with {bits} bits per sample"
                )))
            }
        };

        debug!(
            path = ?path,
            channels = spec.channels,
            sample_rate = spec.sample_rate,
            frames = reader.duration(),
            "Opened WAV input."
        );
        Ok(WavInputStream {
            channels: usize::from(spec.channels),
            sample_rate: spec.sample_rate,
            frames: reader.duration() as usize,
            reader,
            encoding,
        })
    }
}

impl SampleInputStream for WavInputStream {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frames(&self) -> usize {
        self.frames
    }

    fn read(&mut self, buffer: &mut [f32]) -> Result<usize, StreamError> {
        let wanted = buffer.len() - buffer.len() % self.channels;
        let mut read = 0;
        match self.encoding {
            Encoding::Float => {
                for (slot, sample) in buffer[..wanted].iter_mut().zip(self.reader.samples::<f32>()) {
                    *slot = sample?;
                    read += 1;
                }
            }
            Encoding::Int { scale } => {
                for (slot, sample) in buffer[..wanted].iter_mut().zip(self.reader.samples::<i32>()) {
                    *slot = sample? as f32 * scale;
                    read += 1;
                }
            }
        }
        Ok(read / self.channels)
    }
}

/// Writes captured frames to a 32-bit float WAV file.
pub struct WavOutputStream {
    writer: Option<WavWriter<BufWriter<File>>>,
    channels: usize,
    sample_rate: u32,
}

impl WavOutputStream {
    pub fn create(
        path: &Path,
        channels: usize,
        sample_rate: u32,
    ) -> Result<WavOutputStream, StreamError> {
        let spec = WavSpec {
            channels: u16::try_from(channels).map_err(|_| {
                StreamError::UnsupportedFormat(format!("{channels} channels"))
            })?,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };

        Ok(WavOutputStream {
            writer: Some(WavWriter::create(path, spec)?),
            channels,
            sample_rate,
        })
    }
}

impl SampleOutputStream for WavOutputStream {
    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, frames: &[f32]) -> Result<(), StreamError> {
        if frames.len() % self.channels != 0 {
            return Err(StreamError::PartialFrame(frames.len()));
        }
        let writer = self.writer.as_mut().ok_or(StreamError::Finished)?;
        for sample in frames {
            writer.write_sample(*sample)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), StreamError> {
        self.writer.take().ok_or(StreamError::Finished)?.finalize()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::testutil::write_wav_with_bits;

    use super::*;

    #[test]
    fn output_is_readable() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("capture.wav");

        let mut output = WavOutputStream::create(&path, 2, 44100)?;
        output.write(&[0.5, -0.5, 0.25, -0.25])?;
        output.write(&[1.0, -1.0])?;
        assert!(matches!(
            output.write(&[0.0]),
            Err(StreamError::PartialFrame(1))
        ));
        output.finish()?;
        assert!(matches!(output.finish(), Err(StreamError::Finished)));

        let mut input = WavInputStream::open(&path)?;
        assert_eq!(2, input.channels());
        assert_eq!(44100, input.sample_rate());
        assert_eq!(3, input.frames());

        // An odd sized buffer only holds whole frames.
        let mut buffer = [0.0; 5];
        assert_eq!(2, input.read(&mut buffer)?);
        assert_eq!([0.5, -0.5, 0.25, -0.25], buffer[..4]);
        assert_eq!(1, input.read(&mut buffer)?);
        assert_eq!([1.0, -1.0], buffer[..2]);
        assert_eq!(0, input.read(&mut buffer)?);
        Ok(())
    }

    #[test]
    fn integer_samples_are_normalized() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("int.wav");
        write_wav_with_bits(path.clone(), vec![vec![16384i16, -32768i16]], 48000, 16)?;

        let mut input = WavInputStream::open(&path)?;
        let mut buffer = [0.0; 4];
        assert_eq!(2, input.read(&mut buffer)?);
        assert_eq!([0.5, -1.0], buffer[..2]);
        Ok(())
    }
}
