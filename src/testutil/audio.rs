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

use std::{error::Error, fs::File, path::PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};

/// Writes one vector of samples per channel as an interleaved WAV file.
pub fn write_wav_with_bits<S: hound::Sample + Copy + 'static>(
    path: PathBuf,
    samples: Vec<Vec<S>>,
    sample_rate: u32,
    bits_per_sample: u16,
) -> Result<(), Box<dyn Error>> {
    let tempwav = File::create(path)?;

    // Determine sample format based on the type
    let sample_format = if std::any::TypeId::of::<S>() == std::any::TypeId::of::<f32>() {
        SampleFormat::Float
    } else if std::any::TypeId::of::<S>() == std::any::TypeId::of::<i32>()
        || std::any::TypeId::of::<S>() == std::any::TypeId::of::<i16>()
    {
        SampleFormat::Int
    } else {
        return Err("Unsupported sample format".into());
    };

    let frames = samples.iter().map(Vec::len).max().unwrap_or(0);
    if samples.iter().any(|channel| channel.len() != frames) {
        return Err("Channels must have the same length".into());
    }

    let mut writer = WavWriter::new(
        tempwav,
        WavSpec {
            channels: u16::try_from(samples.len())?,
            sample_rate,
            bits_per_sample,
            sample_format,
        },
    )?;

    for frame in 0..frames {
        for channel_samples in &samples {
            writer.write_sample(channel_samples[frame])?;
        }
    }
    writer.finalize()?;

    Ok(())
}
