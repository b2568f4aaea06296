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
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tracing::{debug, info, span, Level};

use super::{AudioBlock, BackendError, Xrun};
use crate::{
    engine::{PriorityNotifier, Processor, State},
    midi::{self, ShortMessage},
};

/// Messages the mock MIDI output accepts per buffer by default.
const DEFAULT_MIDI_CAPACITY: usize = 64;

struct Inner {
    processor: Option<Processor>,
    notifier: Option<PriorityNotifier>,
    midi: midi::mock::Output,
    sample_rate: u32,
    cycles: u64,
}

/// A backend without hardware. Buffers are run either by hand through a
/// [`Driver`] or by a software clock.
pub struct Backend {
    name: String,
    frames: usize,
    input_channels: usize,
    output_channels: usize,
    clocked: bool,
    inner: Arc<Mutex<Inner>>,
    clock: Option<(Arc<AtomicBool>, JoinHandle<()>)>,
}

impl Backend {
    /// A backend that only runs when its driver says so.
    pub fn new(
        name: &str,
        sample_rate: u32,
        frames: usize,
        input_channels: usize,
        output_channels: usize,
    ) -> Backend {
        Backend {
            name: name.to_string(),
            frames,
            input_channels,
            output_channels,
            clocked: false,
            inner: Arc::new(Mutex::new(Inner {
                processor: None,
                notifier: None,
                midi: midi::mock::Output::new(DEFAULT_MIDI_CAPACITY),
                sample_rate,
                cycles: 0,
            })),
            clock: None,
        }
    }

    /// A backend that runs silent buffers in real time once activated.
    pub fn clocked(
        name: &str,
        sample_rate: u32,
        frames: usize,
        input_channels: usize,
        output_channels: usize,
    ) -> Backend {
        let mut backend = Backend::new(name, sample_rate, frames, input_channels, output_channels);
        backend.clocked = true;
        backend
    }

    pub fn driver(&self) -> Driver {
        Driver {
            inner: self.inner.clone(),
            frames: self.frames,
            input_channels: self.input_channels,
            output_channels: self.output_channels,
        }
    }

    fn start_clock(&mut self) -> Result<(), BackendError> {
        let driver = self.driver();
        let period = Duration::from_secs_f64(
            self.frames as f64 / f64::from(self.inner.lock().sample_rate.max(1)),
        );
        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let stop = stop.clone();
            thread::Builder::new()
                .name("mock-clock".to_string())
                .spawn(move || {
                    let mut next = Instant::now();
                    while !stop.load(Ordering::Acquire) {
                        driver.silence(1);
                        next += period;
                        spin_sleep::sleep(next.saturating_duration_since(Instant::now()));
                    }
                })?
        };
        self.clock = Some((stop, thread));
        Ok(())
    }
}

impl crate::engine::Backend for Backend {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> u32 {
        self.inner.lock().sample_rate
    }

    fn activate(
        &mut self,
        processor: Processor,
        notifier: PriorityNotifier,
    ) -> Result<(), BackendError> {
        let span = span!(Level::INFO, "activate (mock)");
        let _enter = span.enter();

        {
            let mut inner = self.inner.lock();
            if inner.processor.is_some() {
                return Err(BackendError::AlreadyActive);
            }
            inner.processor = Some(processor);
            inner.notifier = Some(notifier);
        }
        if self.clocked {
            self.start_clock()?;
        }

        info!(
            device = self.name,
            frames = self.frames,
            clocked = self.clocked,
            "Mock backend active."
        );
        Ok(())
    }

    fn deactivate(&mut self) {
        if let Some((stop, thread)) = self.clock.take() {
            stop.store(true, Ordering::Release);
            let _ = thread.join();
        }

        let mut inner = self.inner.lock();
        if inner.processor.take().is_some() {
            info!(device = self.name, "Mock backend inactive.");
        }
        inner.notifier = None;
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        crate::engine::Backend::deactivate(self);
    }
}

/// Runs buffers through a mock backend's processor and inspects what came
/// out.
#[derive(Clone)]
pub struct Driver {
    inner: Arc<Mutex<Inner>>,
    frames: usize,
    input_channels: usize,
    output_channels: usize,
}

impl Driver {
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    /// Runs one buffer with the given interleaved input and returns the
    /// interleaved output. Inactive backends produce silence.
    pub fn cycle(&self, input: &[f32]) -> Vec<f32> {
        self.cycle_with_xrun(input, None)
    }

    pub fn cycle_with_xrun(&self, input: &[f32], xrun: Option<Xrun>) -> Vec<f32> {
        let mut output = vec![0.0; self.frames * self.output_channels];
        let mut inner = self.inner.lock();
        let Inner {
            processor,
            midi,
            sample_rate,
            cycles,
            ..
        } = &mut *inner;
        let Some(processor) = processor.as_mut() else {
            return output;
        };

        midi.begin_cycle();
        let mut block = AudioBlock::new(
            input,
            self.input_channels,
            &mut output,
            self.output_channels,
            *sample_rate,
        )
        .with_xrun(xrun);
        processor.process(&mut block, midi);
        for message in midi.sent_this_cycle() {
            debug!(cycle = *cycles, message = ?message, "Mock MIDI message.");
        }
        *cycles += 1;
        output
    }

    /// Runs `cycles` buffers of silence.
    pub fn silence(&self, cycles: usize) {
        let input = vec![0.0; self.frames * self.input_channels];
        for _ in 0..cycles {
            self.cycle(&input);
        }
    }

    /// The processor's state, or `None` while the backend is inactive.
    pub fn state(&self) -> Option<State> {
        self.inner.lock().processor.as_ref().map(Processor::state)
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().processor.is_some()
    }

    /// The MIDI messages the processor sent most recently, oldest first.
    pub fn midi_messages(&self) -> Vec<ShortMessage> {
        self.inner.lock().midi.messages().to_vec()
    }

    pub fn set_midi_capacity(&self, capacity: usize) {
        self.inner.lock().midi.set_capacity(capacity);
    }

    /// Changes the device's sample rate and tells the sampler about it.
    pub fn set_sample_rate(&self, sample_rate: u32) {
        let mut inner = self.inner.lock();
        inner.sample_rate = sample_rate;
        if let Some(notifier) = &inner.notifier {
            notifier.sample_rate_changed(sample_rate);
        }
    }

    /// Simulates the device going away: the processor is dropped and the
    /// sampler is told.
    pub fn shutdown(&self, message: &str) {
        let mut inner = self.inner.lock();
        inner.processor = None;
        if let Some(notifier) = inner.notifier.take() {
            notifier.shutdown(message);
        }
    }
}
