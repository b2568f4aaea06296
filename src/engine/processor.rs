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
use super::{
    command::{Command, CommandReceiver, Submission},
    event::{Event, EventSender},
    JobError,
};
use crate::{
    audio::AudioBlock,
    job::JobKind,
    midi::{MidiOutput, ShortMessage},
};

/// Callbacks a failing cleanup step is retried for before the job's error is
/// surfaced without it.
const CLEANUP_ATTEMPTS: u8 = 8;

/// Where the processor is in a job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    Play,
    SampleSendPreMidi,
    Sample,
    SampleRelease,
    Completed,
    Abort,
    Error(JobError),
}

/// The result of a state handler.
enum Flow {
    /// Run the next state within this callback.
    Enter(State),
    /// Stop here and resume in the given state on the next callback.
    Yield(State),
}

enum Interrupt {
    Abort,
    Error(JobError),
}

/// Sends a message, recording a MIDI error if the output refuses it.
fn emit<M: MidiOutput + ?Sized>(
    midi: &mut M,
    message: &ShortMessage,
    error: &mut Option<JobError>,
) -> bool {
    if midi.send(message) {
        return true;
    }
    error.get_or_insert(JobError::MidiBufferExhausted);
    false
}

/// The realtime half of the sampler. The backend calls [`Processor::process`]
/// once per audio buffer. Nothing reachable from it blocks, locks, or
/// allocates.
pub struct Processor {
    /// Device input channel for each sampler channel.
    input_map: Box<[usize]>,
    /// Device output channel for each sampler channel.
    output_map: Box<[usize]>,
    monitor: bool,
    commands: CommandReceiver,
    events: EventSender,
    state: State,
    job: Option<Box<Submission>>,
    /// A start that arrived while another job was still running.
    deferred: Option<Box<Submission>>,
    aborted: bool,
    error: Option<JobError>,
    /// Frames played, or frames recorded across the sample and release
    /// regions.
    current_frame: usize,
    /// Failed tries of the current cleanup step.
    cleanup_attempts: u8,
}

impl Processor {
    pub(crate) fn new(
        input_map: Box<[usize]>,
        output_map: Box<[usize]>,
        monitor: bool,
        commands: CommandReceiver,
        events: EventSender,
    ) -> Processor {
        Processor {
            input_map,
            output_map,
            monitor,
            commands,
            events,
            state: State::Idle,
            job: None,
            deferred: None,
            aborted: false,
            error: None,
            current_frame: 0,
            cleanup_attempts: 0,
        }
    }

    /// The state the next callback resumes in. Transient states entered
    /// and left within one callback are never seen here.
    pub fn state(&self) -> State {
        self.state
    }

    /// The number of sampler channels.
    pub fn channels(&self) -> usize {
        self.input_map.len()
    }

    /// Runs one audio buffer.
    pub fn process<M: MidiOutput + ?Sized>(&mut self, block: &mut AudioBlock<'_>, midi: &mut M) {
        let routable = self.routable(block);
        self.prepare_output(block, routable);

        if let Some(xrun) = block.xrun {
            let _ = self.events.send(Event::Xrun(xrun));
        }

        let mut state = self.state;
        loop {
            let flow = match state {
                State::Idle => self.idle(),
                State::Play => self.play(block, routable),
                State::SampleSendPreMidi => self.send_pre_midi(block, routable, midi),
                State::Sample => self.sample(block, routable, midi),
                State::SampleRelease => self.release(block, routable, midi),
                State::Completed => self.finalize(state, Event::Complete),
                State::Abort => self.finalize(state, Event::Aborted),
                State::Error(error) => {
                    self.finalize(state, |submission| Event::Error(error, submission))
                }
            };

            match flow {
                Flow::Enter(next) => state = next,
                Flow::Yield(next) => {
                    self.state = next;
                    return;
                }
            }
        }
    }

    /// Whether every mapped channel exists on the device for this buffer.
    fn routable(&self, block: &AudioBlock<'_>) -> bool {
        self.input_map.iter().all(|c| *c < block.input_channels)
            && self.output_map.iter().all(|c| *c < block.output_channels)
    }

    fn prepare_output(&self, block: &mut AudioBlock<'_>, routable: bool) {
        block.output.fill(0.0);
        if !self.monitor || !routable {
            return;
        }
        for frame in 0..block.frames {
            for (input, output) in self.input_map.iter().zip(self.output_map.iter()) {
                block.output[frame * block.output_channels + output] =
                    block.input[frame * block.input_channels + input];
            }
        }
    }

    /// Checks for a queued abort and for conditions that make the job fail.
    fn poll_interrupt(&mut self, block: &AudioBlock<'_>, routable: bool) -> Option<Interrupt> {
        if let Some(command) = self.commands.try_consume() {
            match command {
                Command::Abort if !self.aborted => {
                    self.aborted = true;
                    return Some(Interrupt::Abort);
                }
                Command::Abort => {}
                Command::Start(submission) => {
                    debug_assert!(self.deferred.is_none(), "more than one deferred job");
                    self.deferred = Some(submission);
                }
            }
        }

        if self.error.is_none() {
            if !routable {
                self.error = Some(JobError::ChannelCountMismatch);
            } else if self
                .job
                .as_ref()
                .is_some_and(|job| job.sample_rate != block.sample_rate)
            {
                self.error = Some(JobError::SampleRateMismatch);
            }
        }
        self.error.map(Interrupt::Error)
    }

    fn interrupted(&self, interrupt: Interrupt) -> Flow {
        match interrupt {
            Interrupt::Abort => Flow::Enter(State::Abort),
            Interrupt::Error(error) => Flow::Enter(State::Error(error)),
        }
    }

    fn progress(&mut self, done: usize, total: usize) {
        let fraction = if total == 0 {
            1.0
        } else {
            (done as f64 / total as f64).min(1.0) as f32
        };
        let _ = self.events.send(Event::Progress(fraction));
    }

    /// Copies `count` input frames into the job's buffer starting at `at`.
    fn record(&mut self, block: &AudioBlock<'_>, at: usize, count: usize) {
        let Some(submission) = self.job.as_deref_mut() else {
            return;
        };
        for (channel, input) in self.input_map.iter().enumerate() {
            let destination = &mut submission.buffer.channel_mut(channel)[at..at + count];
            for (frame, sample) in destination.iter_mut().enumerate() {
                *sample = block.input[frame * block.input_channels + input];
            }
        }
    }

    /// The state a winding down job ends in.
    fn outcome(&self) -> State {
        match self.error {
            Some(error) => State::Error(error),
            None if self.aborted => State::Abort,
            None => State::Completed,
        }
    }

    fn retry_cleanup(&mut self, state: State) -> Flow {
        self.cleanup_attempts = self.cleanup_attempts.saturating_add(1);
        if self.cleanup_attempts >= CLEANUP_ATTEMPTS {
            return Flow::Enter(self.outcome());
        }
        Flow::Yield(state)
    }

    fn idle(&mut self) -> Flow {
        loop {
            let command = match self.deferred.take() {
                Some(submission) => Command::Start(submission),
                None => match self.commands.try_consume() {
                    Some(command) => command,
                    None => return Flow::Yield(State::Idle),
                },
            };

            if let Command::Start(submission) = command {
                let next = match submission.job.kind() {
                    JobKind::Sample => State::SampleSendPreMidi,
                    JobKind::Play => State::Play,
                };
                self.aborted = false;
                self.error = None;
                self.current_frame = 0;
                self.cleanup_attempts = 0;
                self.job = Some(submission);
                return Flow::Enter(next);
            }
        }
    }

    fn play(&mut self, block: &mut AudioBlock<'_>, routable: bool) -> Flow {
        if let Some(interrupt) = self.poll_interrupt(block, routable) {
            return self.interrupted(interrupt);
        }
        let Some(submission) = self.job.as_deref() else {
            return Flow::Enter(State::Idle);
        };

        let total = submission.sample_frames;
        let start = self.current_frame.min(total);
        let count = block.frames.min(total - start);
        for (channel, (input, output)) in self
            .input_map
            .iter()
            .zip(self.output_map.iter())
            .enumerate()
        {
            let stored = &submission.buffer.channel(channel)[start..start + count];
            for (frame, sample) in stored.iter().enumerate() {
                let mut value = *sample;
                // Monitoring already put the input in the output.
                if !self.monitor {
                    value += block.input[frame * block.input_channels + input];
                }
                block.output[frame * block.output_channels + output] += value;
            }
        }

        if start + block.frames >= total {
            self.current_frame = total;
            self.progress(total, total);
            return Flow::Enter(State::Completed);
        }
        self.current_frame = start + block.frames;
        self.progress(self.current_frame, total);
        Flow::Yield(State::Play)
    }

    fn send_pre_midi<M: MidiOutput + ?Sized>(
        &mut self,
        block: &AudioBlock<'_>,
        routable: bool,
        midi: &mut M,
    ) -> Flow {
        // Nothing has been sent yet, so there is nothing to clean up.
        if let Some(interrupt) = self.poll_interrupt(block, routable) {
            return self.interrupted(interrupt);
        }
        let Some(submission) = self.job.as_deref() else {
            return Flow::Enter(State::Idle);
        };

        let zone = submission.job.zone();
        if midi.vacant() < zone.pre_midi_messages() {
            self.error = Some(JobError::MidiBufferExhausted);
            return Flow::Enter(State::Error(JobError::MidiBufferExhausted));
        }

        let channel = zone.channel();
        for (controller, value) in zone.controls() {
            emit(
                midi,
                &ShortMessage::control_change(channel, *controller, *value),
                &mut self.error,
            );
        }
        emit(
            midi,
            &ShortMessage::note_on(channel, zone.note(), zone.velocity()),
            &mut self.error,
        );
        if let Some(pressure) = zone.channel_pressure() {
            emit(
                midi,
                &ShortMessage::channel_pressure(channel, pressure),
                &mut self.error,
            );
        }
        if let Some(pressure) = zone.aftertouch() {
            emit(
                midi,
                &ShortMessage::aftertouch(channel, zone.note(), pressure),
                &mut self.error,
            );
        }

        // A refused message leaves an error behind, which sends the next
        // callback straight to the note off.
        Flow::Yield(State::Sample)
    }

    fn sample<M: MidiOutput + ?Sized>(
        &mut self,
        block: &AudioBlock<'_>,
        routable: bool,
        midi: &mut M,
    ) -> Flow {
        if self.poll_interrupt(block, routable).is_some() {
            return self.note_off(midi);
        }
        let Some(submission) = self.job.as_deref() else {
            return Flow::Enter(State::Idle);
        };

        let sample_frames = submission.sample_frames;
        let total = submission.total_frames();
        let start = self.current_frame;
        if start + block.frames < sample_frames {
            self.record(block, start, block.frames);
            self.current_frame = start + block.frames;
            self.progress(self.current_frame, total);
            return Flow::Yield(State::Sample);
        }

        // The note off goes out in this callback, so the rest of the block
        // already belongs to the release.
        let count = block.frames.min(total.saturating_sub(start));
        self.record(block, start, count);
        self.current_frame = start + count;
        self.progress(self.current_frame, total);
        self.note_off(midi)
    }

    fn note_off<M: MidiOutput + ?Sized>(&mut self, midi: &mut M) -> Flow {
        let Some(submission) = self.job.as_deref() else {
            return Flow::Enter(State::Idle);
        };
        let zone = submission.job.zone();
        let message = ShortMessage::note_off(zone.channel(), zone.note(), zone.velocity());

        if !emit(midi, &message, &mut self.error) {
            return self.retry_cleanup(State::Sample);
        }
        self.cleanup_attempts = 0;
        Flow::Yield(State::SampleRelease)
    }

    fn release<M: MidiOutput + ?Sized>(
        &mut self,
        block: &AudioBlock<'_>,
        routable: bool,
        midi: &mut M,
    ) -> Flow {
        self.poll_interrupt(block, routable);
        if self.aborted || self.error.is_some() {
            return self.reset_controllers(midi);
        }
        let Some(submission) = self.job.as_deref() else {
            return Flow::Enter(State::Idle);
        };

        let total = submission.total_frames();
        let start = self.current_frame;
        let count = block.frames.min(total.saturating_sub(start));
        self.record(block, start, count);

        self.current_frame = start + count;
        if self.current_frame < total {
            self.progress(self.current_frame, total);
            return Flow::Yield(State::SampleRelease);
        }
        self.progress(total, total);
        self.reset_controllers(midi)
    }

    fn reset_controllers<M: MidiOutput + ?Sized>(&mut self, midi: &mut M) -> Flow {
        let Some(submission) = self.job.as_deref() else {
            return Flow::Enter(State::Idle);
        };
        let channel = submission.job.zone().channel();

        // The pair goes out together or not at all.
        if midi.vacant() < 2 {
            self.error.get_or_insert(JobError::MidiBufferExhausted);
            return self.retry_cleanup(State::SampleRelease);
        }
        if !emit(midi, &ShortMessage::all_sound_off(channel), &mut self.error)
            || !emit(
                midi,
                &ShortMessage::reset_all_controllers(channel),
                &mut self.error,
            )
        {
            return self.retry_cleanup(State::SampleRelease);
        }
        Flow::Enter(self.outcome())
    }

    /// Hands the submission to the worker. If the event ring is full the
    /// job stays in its final state and delivery is retried next callback.
    fn finalize<F>(&mut self, state: State, event: F) -> Flow
    where
        F: FnOnce(Box<Submission>) -> Event,
    {
        let Some(submission) = self.job.take() else {
            return Flow::Enter(State::Idle);
        };
        match self.events.send(event(submission)) {
            Ok(()) => Flow::Enter(State::Idle),
            Err(event) => {
                self.job = event.into_submission();
                Flow::Yield(state)
            }
        }
    }
}
