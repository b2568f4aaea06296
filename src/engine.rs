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
//! The sampling engine: a realtime [`Processor`] driven by an audio backend,
//! a worker thread that does everything the audio callback must not, and the
//! [`Sampler`] handle jobs are submitted through.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
};

use parking_lot::Mutex;
use tracing::{error, info, span, Level};

use crate::{
    audio::BackendError,
    job::{Job, JobKind},
    stream::JobStream,
    sync::Semaphore,
};

mod buffer;
mod command;
mod error;
mod event;
mod observer;
mod processor;
mod worker;

#[cfg(test)]
mod tests;

pub use buffer::SampleBuffer;
pub use command::Submission;
pub use error::{EngineError, JobError};
pub use event::{PriorityEvent, PriorityNotifier};
pub use observer::{Notification, Observer};
pub use processor::{Processor, State};

use buffer::BufferLedger;
use command::{command_channel, Command, CommandSender};
use event::event_channel;
use worker::Worker;

/// Default capacity of the realtime event ring.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// How the sampler maps its channels onto the device and sizes its queues.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Device input channel (zero-based) for each sampler channel.
    pub input_map: Vec<usize>,
    /// Device output channel (zero-based) for each sampler channel.
    pub output_map: Vec<usize>,
    /// Copy the mapped inputs to the mapped outputs.
    pub monitor: bool,
    pub event_capacity: usize,
    /// Write the release tail after the sampled frames when a capture
    /// completes.
    pub include_release_tail: bool,
}

impl Settings {
    /// Settings for `channels` channels mapped one to one onto the device.
    pub fn new(channels: usize) -> Settings {
        Settings {
            input_map: (0..channels).collect(),
            output_map: (0..channels).collect(),
            monitor: false,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            include_release_tail: false,
        }
    }

    /// The number of sampler channels, one per input map entry.
    pub fn channels(&self) -> usize {
        self.input_map.len()
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.input_map.is_empty() {
            return Err(EngineError::InvalidSettings(
                "the sampler needs at least one channel".to_string(),
            ));
        }
        if self.input_map.len() != self.output_map.len() {
            return Err(EngineError::InvalidSettings(format!(
                "{} input channels mapped but {} output channels",
                self.input_map.len(),
                self.output_map.len()
            )));
        }
        if self.event_capacity < 2 {
            return Err(EngineError::InvalidSettings(
                "the event channel needs room for at least two events".to_string(),
            ));
        }
        Ok(())
    }
}

/// An audio backend. Once activated, the backend calls
/// [`Processor::process`] once per buffer until it is deactivated.
pub trait Backend: Send {
    /// The device name, as shown in status messages.
    fn name(&self) -> &str;

    /// The device's current sample rate.
    fn sample_rate(&self) -> u32;

    /// Takes the processor and starts calling it. The notifier reports
    /// sample rate changes and shutdowns to the worker.
    fn activate(
        &mut self,
        processor: Processor,
        notifier: PriorityNotifier,
    ) -> Result<(), BackendError>;

    /// Stops the callbacks and drops the processor. Must be safe to call
    /// more than once.
    fn deactivate(&mut self);
}

/// State shared between the submitting side and the worker.
pub(crate) struct Shared {
    idle: AtomicBool,
    active: AtomicBool,
    abort_requested: AtomicBool,
    semaphore: Arc<Semaphore>,
    ledger: Arc<BufferLedger>,
}

impl Shared {
    fn new() -> Shared {
        Shared {
            idle: AtomicBool::new(true),
            active: AtomicBool::new(false),
            abort_requested: AtomicBool::new(false),
            semaphore: Arc::new(Semaphore::new()),
            ledger: Arc::new(BufferLedger::default()),
        }
    }

    pub(crate) fn mark_idle(&self) {
        self.idle.store(true, Ordering::Release);
    }

    /// Marks the engine inactive. Returns true if it was active.
    pub(crate) fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }
}

/// Runs one job at a time on an audio backend.
pub struct Sampler {
    channels: usize,
    shared: Arc<Shared>,
    commands: Mutex<CommandSender>,
    backend: Mutex<Box<dyn Backend>>,
    notifier: PriorityNotifier,
    observer: Arc<dyn Observer>,
    worker: Option<JoinHandle<()>>,
}

impl Sampler {
    /// Starts the worker and activates the backend.
    pub fn new(
        settings: Settings,
        mut backend: Box<dyn Backend>,
        observer: Arc<dyn Observer>,
    ) -> Result<Sampler, EngineError> {
        let span = span!(Level::INFO, "activate sampler");
        let _enter = span.enter();

        settings.validate()?;

        let shared = Arc::new(Shared::new());
        let (commands, command_receiver) = command_channel();
        let (event_sender, events) =
            event_channel(settings.event_capacity, shared.semaphore.clone());
        let (notifier, priority) = PriorityNotifier::new(shared.semaphore.clone());

        let processor = Processor::new(
            settings.input_map.clone().into_boxed_slice(),
            settings.output_map.clone().into_boxed_slice(),
            settings.monitor,
            command_receiver,
            event_sender,
        );

        let worker = Worker {
            shared: shared.clone(),
            events,
            priority,
            observer: observer.clone(),
            include_release_tail: settings.include_release_tail,
        }
        .spawn()
        .map_err(EngineError::Spawn)?;

        if let Err(e) = backend.activate(processor, notifier.clone()) {
            notifier.terminate();
            if worker.join().is_err() {
                error!("Sampler worker panicked.");
            }
            return Err(e.into());
        }
        shared.active.store(true, Ordering::Release);

        info!(
            backend = backend.name(),
            channels = settings.channels(),
            sample_rate = backend.sample_rate(),
            monitor = settings.monitor,
            "Sampler activated."
        );
        observer.status_changed("Idle.");

        Ok(Sampler {
            channels: settings.channels(),
            shared,
            commands: Mutex::new(commands),
            backend: Mutex::new(backend),
            notifier,
            observer,
            worker: Some(worker),
        })
    }

    /// The number of sampler channels. Streams handed to
    /// [`Sampler::start_job`] must have exactly this many.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// The backend's sample rate right now. This can change under a
    /// running job, which then fails.
    pub fn sample_rate(&self) -> u32 {
        self.backend.lock().sample_rate()
    }

    /// True when no job is running and none is waiting to be finalized.
    pub fn is_idle(&self) -> bool {
        self.shared.idle.load(Ordering::Acquire)
    }

    /// False once the backend has shut down. An inactive sampler rejects
    /// every job.
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Buffers allocated for jobs and not yet released.
    pub fn live_buffers(&self) -> usize {
        self.shared.ledger.live()
    }

    /// Submits a job. Fails if a job is already running, the engine is
    /// inactive, or the stream does not match the sampler.
    pub fn start_job(&self, job: Job, stream: JobStream) -> Result<(), EngineError> {
        if !self.is_active() {
            return Err(EngineError::Inactive);
        }
        if self
            .shared
            .idle
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(EngineError::Busy);
        }

        let kind = job.kind();
        let zone = job.zone().clone();
        let submission = match self.prepare(job, stream) {
            Ok(submission) => submission,
            Err(e) => {
                self.shared.mark_idle();
                return Err(e);
            }
        };
        let frames = submission.total_frames();

        self.shared.abort_requested.store(false, Ordering::Release);
        self.observer.status_changed(match kind {
            JobKind::Sample => "Sampling ...",
            JobKind::Play => "Playing sample ...",
        });

        if self
            .commands
            .lock()
            .submit(Command::Start(Box::new(submission)))
            .is_err()
        {
            self.shared.mark_idle();
            self.observer.status_changed("Idle.");
            return Err(EngineError::CommandChannelFull);
        }

        info!(%kind, %zone, frames, "Job started.");
        Ok(())
    }

    fn prepare(&self, job: Job, stream: JobStream) -> Result<Submission, EngineError> {
        if stream.channels() != self.channels {
            return Err(EngineError::ChannelMismatch {
                expected: self.channels,
                found: stream.channels(),
            });
        }
        let sample_rate = self.sample_rate();
        if stream.sample_rate() != sample_rate {
            return Err(EngineError::SampleRateMismatch {
                expected: sample_rate,
                found: stream.sample_rate(),
            });
        }

        Submission::prepare(job, stream, self.channels, sample_rate, &self.shared.ledger)
    }

    /// Asks the running job to stop. Repeated aborts of the same job are
    /// coalesced.
    pub fn abort_job(&self) -> Result<(), EngineError> {
        if self.is_idle() {
            return Err(EngineError::NotRunning);
        }
        if self.shared.abort_requested.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        if self.commands.lock().submit(Command::Abort).is_err() {
            self.shared.abort_requested.store(false, Ordering::Release);
            return Err(EngineError::CommandChannelFull);
        }
        self.observer.status_changed("Aborting ...");
        info!("Abort requested.");
        Ok(())
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.backend.lock().deactivate();
        self.shared.deactivate();
        self.notifier.terminate();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Sampler worker panicked.");
            }
        }
        info!("Sampler deactivated.");
    }
}
