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
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    FromSample, Sample, SizedSample,
};
use crossbeam_channel::Sender;
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use thread_priority::ThreadPriority;
use tracing::{error, info, span, warn, Level};

use super::{
    thread_priority::{configure_thread_priority, rt_audio_enabled, thread_priority},
    AudioBlock, BackendError, Xrun,
};
use crate::{
    config,
    engine::{PriorityNotifier, Processor},
    midi::{self, MidiOutput},
};

/// Buffers of input the bridge between the two streams can hold.
const BRIDGE_BUFFERS: usize = 8;

/// Output scratch size in buffers. Larger host buffers are processed in
/// chunks.
const SCRATCH_BUFFERS: usize = 4;

/// A cpal device and its channel limits.
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    pub name: String,
    pub host: String,
    pub max_input_channels: u16,
    pub max_output_channels: u16,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (In={}, Out={}) ({})",
            self.name, self.max_input_channels, self.max_output_channels, self.host
        )
    }
}

struct Found {
    info: DeviceInfo,
    device: cpal::Device,
}

fn max_channels<I: Iterator<Item = u16>>(channels: I) -> u16 {
    channels.max().unwrap_or(0)
}

/// Lists cpal devices across every available host.
fn list_cpal_devices() -> Result<Vec<Found>, BackendError> {
    // Suppress noisy output here.
    let _shh_stdout = shh::stdout()?;
    let _shh_stderr = shh::stderr()?;

    let mut devices: Vec<Found> = Vec::new();
    for host_id in cpal::available_hosts() {
        let host_devices = match cpal::host_from_id(host_id)?.devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let max_input_channels = device
                .supported_input_configs()
                .map(|configs| max_channels(configs.map(|config| config.channels())))
                .unwrap_or(0);
            let max_output_channels = device
                .supported_output_configs()
                .map(|configs| max_channels(configs.map(|config| config.channels())))
                .unwrap_or(0);
            if max_input_channels == 0 && max_output_channels == 0 {
                continue;
            }

            devices.push(Found {
                info: DeviceInfo {
                    name: device.name()?,
                    host: host_id.name().to_string(),
                    max_input_channels,
                    max_output_channels,
                },
                device,
            });
        }
    }

    devices.sort_by(|a, b| a.info.name.cmp(&b.info.name));
    Ok(devices)
}

/// Lists cpal devices.
pub fn list() -> Result<Vec<DeviceInfo>, BackendError> {
    Ok(list_cpal_devices()?
        .into_iter()
        .map(|found| found.info)
        .collect())
}

fn find(
    devices: &[Found],
    name: &str,
    direction: &'static str,
    channels: u16,
) -> Result<cpal::Device, BackendError> {
    let found = devices
        .iter()
        .find(|found| found.info.name.trim() == name)
        .ok_or_else(|| BackendError::DeviceNotFound(name.to_string()))?;

    let available = match direction {
        "input" => found.info.max_input_channels,
        _ => found.info.max_output_channels,
    };
    if available < channels {
        return Err(BackendError::Channels {
            device: name.to_string(),
            direction,
            channels,
        });
    }
    Ok(found.device.clone())
}

struct StreamThread {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

/// Everything the stream thread needs to open the two streams.
#[derive(Clone)]
struct StreamSetup {
    input: cpal::Device,
    output: cpal::Device,
    sample_rate: u32,
    buffer_size: u32,
    input_channels: u16,
    output_channels: u16,
    priority: ThreadPriority,
    rt_audio: bool,
}

/// A full duplex cpal backend. The input stream feeds a ring that the output
/// callback drains before running the processor.
pub struct Backend {
    name: String,
    setup: StreamSetup,
    midi: Option<midi::midir::Connection>,
    midi_queue: Option<midi::midir::Queue>,
    streams: Option<StreamThread>,
}

impl Backend {
    pub fn new(
        audio: &config::Audio,
        midi: Option<&config::Midi>,
        priority: Option<u8>,
    ) -> Result<Backend, BackendError> {
        let span = span!(Level::INFO, "open backend (cpal)");
        let _enter = span.enter();

        let input_name = audio.input_device()?;
        let output_name = audio.output_device()?;
        let input_channels = u16::try_from(audio.device_input_channels()?)
            .map_err(|_| BackendError::UnsupportedFormat("too many input channels".to_string()))?;
        let output_channels = u16::try_from(audio.device_output_channels()?).map_err(|_| {
            BackendError::UnsupportedFormat("too many output channels".to_string())
        })?;

        let devices = list_cpal_devices()?;
        let input = find(&devices, input_name, "input", input_channels)?;
        let output = find(&devices, output_name, "output", output_channels)?;

        let priority = thread_priority(priority);
        let rt_audio = rt_audio_enabled();

        let (midi, midi_queue) = match midi {
            Some(midi) => {
                let (connection, queue) =
                    midi::midir::connect(midi.device(), midi.queue_capacity(), priority, rt_audio)?;
                (Some(connection), Some(queue))
            }
            None => {
                warn!("No MIDI output device configured, zones will not be triggered.");
                (None, None)
            }
        };

        info!(
            input = input_name,
            output = output_name,
            sample_rate = audio.sample_rate(),
            buffer_size = audio.buffer_size(),
            "Opened audio devices."
        );
        Ok(Backend {
            name: output_name.to_string(),
            setup: StreamSetup {
                input,
                output,
                sample_rate: audio.sample_rate(),
                buffer_size: audio.buffer_size(),
                input_channels,
                output_channels,
                priority,
                rt_audio,
            },
            midi,
            midi_queue,
            streams: None,
        })
    }
}

impl crate::engine::Backend for Backend {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> u32 {
        self.setup.sample_rate
    }

    fn activate(
        &mut self,
        processor: Processor,
        notifier: PriorityNotifier,
    ) -> Result<(), BackendError> {
        let span = span!(Level::INFO, "activate (cpal)");
        let _enter = span.enter();

        if self.streams.is_some() {
            return Err(BackendError::AlreadyActive);
        }

        let midi: Box<dyn MidiOutput + Send> = match self.midi_queue.take() {
            Some(queue) => Box::new(queue),
            None => Box::new(midi::Disconnected),
        };

        // cpal streams cannot move between threads, so they are built and
        // kept on a thread of their own.
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), BackendError>>(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let setup = self.setup.clone();
        let thread = thread::Builder::new()
            .name("cpal-streams".to_string())
            .spawn(move || {
                let streams = match setup.build(processor, midi, notifier) {
                    Ok(streams) => streams,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // Returns on stop or when the backend is dropped.
                let _ = stop_rx.recv();
                drop(streams);
            })?;

        let ready = ready_rx.recv();
        match ready {
            Ok(Ok(())) => {
                info!(device = self.name, "Audio streams started.");
                self.streams = Some(StreamThread {
                    stop: stop_tx,
                    thread,
                });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(BackendError::StreamThread)
            }
        }
    }

    fn deactivate(&mut self) {
        if let Some(streams) = self.streams.take() {
            let _ = streams.stop.send(());
            if streams.thread.join().is_err() {
                error!(device = self.name, "Audio stream thread panicked.");
            }
            info!(device = self.name, "Audio streams stopped.");
        }
        if let Some(mut midi) = self.midi.take() {
            midi.stop();
        }
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        crate::engine::Backend::deactivate(self);
    }
}

impl StreamSetup {
    fn stream_config(&self, channels: u16) -> cpal::StreamConfig {
        cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(self.buffer_size),
        }
    }

    fn build(
        self,
        processor: Processor,
        midi: Box<dyn MidiOutput + Send>,
        notifier: PriorityNotifier,
    ) -> Result<(cpal::Stream, cpal::Stream), BackendError> {
        let buffer_samples = self.buffer_size as usize * usize::from(self.input_channels);
        let (mut producer, consumer) =
            HeapRb::<f32>::new((buffer_samples * BRIDGE_BUFFERS).max(1024)).split();
        // One buffer of silence absorbs jitter between the two callbacks.
        producer.push_iter(std::iter::repeat(0.0).take(buffer_samples));
        let overflow = Arc::new(AtomicBool::new(false));

        let input_format = self.input.default_input_config()?.sample_format();
        let input_stream = match input_format {
            cpal::SampleFormat::F32 => {
                self.input_stream::<f32>(producer, overflow.clone(), notifier.clone())
            }
            cpal::SampleFormat::I16 => {
                self.input_stream::<i16>(producer, overflow.clone(), notifier.clone())
            }
            cpal::SampleFormat::I32 => {
                self.input_stream::<i32>(producer, overflow.clone(), notifier.clone())
            }
            other => Err(BackendError::UnsupportedFormat(format!("{other:?}"))),
        }?;

        let output_frames = self.buffer_size as usize * SCRATCH_BUFFERS;
        let callback = OutputCallback {
            processor,
            midi,
            consumer,
            overflow,
            input_scratch: vec![0.0; output_frames * usize::from(self.input_channels)],
            output_scratch: vec![0.0; output_frames * usize::from(self.output_channels)],
            input_channels: usize::from(self.input_channels),
            output_channels: usize::from(self.output_channels),
            sample_rate: self.sample_rate,
            priority: self.priority,
            rt_audio: self.rt_audio,
            priority_set: false,
        };

        let output_format = self.output.default_output_config()?.sample_format();
        let output_stream = match output_format {
            cpal::SampleFormat::F32 => self.output_stream::<f32>(callback, notifier),
            cpal::SampleFormat::I16 => self.output_stream::<i16>(callback, notifier),
            cpal::SampleFormat::I32 => self.output_stream::<i32>(callback, notifier),
            other => Err(BackendError::UnsupportedFormat(format!("{other:?}"))),
        }?;

        input_stream.play()?;
        output_stream.play()?;
        Ok((input_stream, output_stream))
    }

    fn input_stream<T>(
        &self,
        mut producer: HeapProd<f32>,
        overflow: Arc<AtomicBool>,
        notifier: PriorityNotifier,
    ) -> Result<cpal::Stream, BackendError>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let config = self.stream_config(self.input_channels);
        Ok(self.input.build_input_stream(
            &config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let pushed = producer.push_iter(data.iter().map(|sample| f32::from_sample(*sample)));
                if pushed < data.len() {
                    overflow.store(true, Ordering::Relaxed);
                }
            },
            stream_error_callback("input", notifier),
            None,
        )?)
    }

    fn output_stream<T>(
        &self,
        mut callback: OutputCallback,
        notifier: PriorityNotifier,
    ) -> Result<cpal::Stream, BackendError>
    where
        T: SizedSample + FromSample<f32>,
    {
        let config = self.stream_config(self.output_channels);
        Ok(self.output.build_output_stream(
            &config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| callback.run(data),
            stream_error_callback("output", notifier),
            None,
        )?)
    }
}

fn stream_error_callback(
    direction: &'static str,
    notifier: PriorityNotifier,
) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| {
        error!(direction, err = %err, "Audio stream error.");
        if let cpal::StreamError::DeviceNotAvailable = err {
            notifier.shutdown(format!("the {direction} device is no longer available"));
        }
    }
}

/// State owned by the output callback. Scratch buffers are allocated up
/// front.
struct OutputCallback {
    processor: Processor,
    midi: Box<dyn MidiOutput + Send>,
    consumer: HeapCons<f32>,
    overflow: Arc<AtomicBool>,
    input_scratch: Vec<f32>,
    output_scratch: Vec<f32>,
    input_channels: usize,
    output_channels: usize,
    sample_rate: u32,
    priority: ThreadPriority,
    rt_audio: bool,
    priority_set: bool,
}

impl OutputCallback {
    fn run<T: Sample + FromSample<f32>>(&mut self, data: &mut [T]) {
        configure_thread_priority(
            "audio-callback",
            self.priority,
            self.rt_audio,
            &mut self.priority_set,
        );

        for chunk in data.chunks_mut(self.output_scratch.len()) {
            let frames = chunk.len() / self.output_channels;
            let wanted = frames * self.input_channels;

            let input = &mut self.input_scratch[..wanted];
            let read = self.consumer.pop_slice(input);
            input[read..].fill(0.0);
            let xrun = if self.overflow.swap(false, Ordering::Relaxed) {
                Some(Xrun::InputOverflow)
            } else if read < wanted {
                Some(Xrun::InputUnderflow)
            } else {
                None
            };

            let output = &mut self.output_scratch[..frames * self.output_channels];
            let mut block = AudioBlock::new(
                input,
                self.input_channels,
                output,
                self.output_channels,
                self.sample_rate,
            )
            .with_xrun(xrun);
            self.processor.process(&mut block, self.midi.as_mut());

            for (destination, sample) in chunk.iter_mut().zip(output.iter()) {
                *destination = T::from_sample(*sample);
            }
        }
    }
}
