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
use std::{
    error::Error,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{crate_version, Parser, Subcommand};
use crossbeam_channel::Receiver;
use rtsampler::{
    audio, config,
    engine::{Notification, Sampler},
    job::{Job, Zone},
    midi,
    stream::{
        wav::{WavInputStream, WavOutputStream},
        JobStream, SampleInputStream,
    },
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A MIDI driven sampler."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio devices.
    Devices {},
    /// Lists the available MIDI input/output devices.
    MidiDevices {},
    /// Verifies a sampler configuration.
    Verify {
        /// The path to the sampler config.
        config_path: PathBuf,
    },
    /// Samples the configured zones into WAV files.
    Sample {
        /// The path to the sampler config.
        config_path: PathBuf,
        /// The directory the captures are written to.
        output_dir: PathBuf,
        /// Only sample the zone with this name.
        #[arg(short, long)]
        zone: Option<String>,
    },
    /// Plays a WAV file through the configured outputs.
    Play {
        /// The path to the sampler config.
        config_path: PathBuf,
        /// The WAV file to play.
        wav_path: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;
            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }
            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;
            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }
            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Verify { config_path } => {
            let config = config::Sampler::deserialize(&config_path)?;
            config.validate()?;
            println!(
                "Configuration is valid. Zones (count: {}):",
                config.zones().len()
            );
            for zone in config.zones() {
                println!("- {}: {}", zone.name(), zone.to_zone()?);
            }
        }
        Commands::Sample {
            config_path,
            output_dir,
            zone,
        } => {
            let config = load(&config_path)?;
            let zones: Vec<&config::Zone> = config
                .zones()
                .iter()
                .filter(|candidate| zone.as_ref().map_or(true, |name| candidate.name() == *name))
                .collect();
            if zones.is_empty() {
                return Err("no zones to sample".into());
            }
            if config.midi().is_none() {
                warn!("No MIDI device configured, captures will only contain the inputs.");
            }
            fs::create_dir_all(&output_dir)?;

            let (sampler, notifications) = start_sampler(&config)?;
            for zone in zones {
                let path = output_dir.join(format!("{}.wav", zone.name()));
                let stream =
                    WavOutputStream::create(&path, sampler.channels(), sampler.sample_rate())?;
                sampler.start_job(
                    Job::sample(Arc::new(zone.to_zone()?)),
                    JobStream::Output(Box::new(stream)),
                )?;
                wait_for_outcome(&notifications)?;
                println!("Sampled {} to {}.", zone.name(), path.display());
            }
        }
        Commands::Play {
            config_path,
            wav_path,
        } => {
            let config = load(&config_path)?;
            let stream = WavInputStream::open(&wav_path)?;
            info!(
                path = %wav_path.display(),
                channels = stream.channels(),
                frames = stream.frames(),
                "Loaded sample."
            );
            let zone = match config.zones().first() {
                Some(zone) => zone.to_zone()?,
                None => Zone::new(1, 60, 100)?,
            };

            let (sampler, notifications) = start_sampler(&config)?;
            sampler.start_job(Job::play(Arc::new(zone)), JobStream::Input(Box::new(stream)))?;
            wait_for_outcome(&notifications)?;
            println!("Played {}.", wav_path.display());
        }
    }
    Ok(())
}

fn load(path: &Path) -> Result<config::Sampler, Box<dyn Error>> {
    let config = config::Sampler::deserialize(path)?;
    config.validate()?;
    Ok(config)
}

fn start_sampler(
    config: &config::Sampler,
) -> Result<(Sampler, Receiver<Notification>), Box<dyn Error>> {
    let (sender, receiver) = crossbeam_channel::unbounded();
    let backend = audio::get_backend(config)?;
    let sampler = Sampler::new(config.settings()?, backend, Arc::new(sender))?;
    Ok((sampler, receiver))
}

/// Blocks until the running job ends.
fn wait_for_outcome(notifications: &Receiver<Notification>) -> Result<(), Box<dyn Error>> {
    for notification in notifications.iter() {
        if notification.is_job_outcome() {
            info!(outcome = ?notification, "Job finished.");
        }
        match notification {
            Notification::Status(status) => info!(status = %status, "Sampler status."),
            Notification::JobCompleted => return Ok(()),
            Notification::JobAborted => return Err("job aborted".into()),
            Notification::JobError(message) => return Err(format!("job failed: {message}").into()),
            Notification::FatalError(message) => {
                return Err(format!("sampler stopped: {message}").into())
            }
            Notification::SampleRateChanged(sample_rate) => {
                warn!(sample_rate, "Device sample rate changed.")
            }
            Notification::Progress(_) | Notification::Xrun(_) => {}
        }
    }
    Err("sampler stopped unexpectedly".into())
}
