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
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};

use super::{command::Submission, JobError};
use crate::{audio::Xrun, sync::Semaphore};

/// Notifications from the realtime thread to the worker. Finalization events
/// carry the submission so its buffer is dropped off the realtime thread.
pub(crate) enum Event {
    Progress(f32),
    Complete(Box<Submission>),
    Aborted(Box<Submission>),
    Error(JobError, Box<Submission>),
    Xrun(Xrun),
}

impl Event {
    /// Recovers the submission from a finalization event that could not be
    /// delivered.
    pub(crate) fn into_submission(self) -> Option<Box<Submission>> {
        match self {
            Event::Complete(submission)
            | Event::Aborted(submission)
            | Event::Error(_, submission) => Some(submission),
            Event::Progress(_) | Event::Xrun(_) => None,
        }
    }
}

/// The realtime side of the event channel. Every delivered event posts the
/// worker's semaphore once.
pub(crate) struct EventSender {
    producer: HeapProd<Event>,
    semaphore: Arc<Semaphore>,
}

impl EventSender {
    pub(crate) fn send(&mut self, event: Event) -> Result<(), Event> {
        self.producer.try_push(event)?;
        self.semaphore.post();
        Ok(())
    }
}

pub(crate) struct EventReceiver {
    consumer: HeapCons<Event>,
}

impl EventReceiver {
    pub(crate) fn try_recv(&mut self) -> Option<Event> {
        self.consumer.try_pop()
    }
}

pub(crate) fn event_channel(
    capacity: usize,
    semaphore: Arc<Semaphore>,
) -> (EventSender, EventReceiver) {
    let (producer, consumer) = HeapRb::new(capacity.max(1)).split();
    (
        EventSender {
            producer,
            semaphore,
        },
        EventReceiver { consumer },
    )
}

/// Engine level signals that bypass the event ring.
#[derive(Clone, Debug, PartialEq)]
pub enum PriorityEvent {
    SampleRateChanged(u32),
    /// The backend stopped and will not call the processor again.
    Shutdown(String),
    /// Stops the worker.
    Terminate,
}

/// Lets backends report priority events. Sending never blocks, but may
/// allocate, so it must not be used from the audio callback.
#[derive(Clone)]
pub struct PriorityNotifier {
    sender: Sender<PriorityEvent>,
    semaphore: Arc<Semaphore>,
}

impl PriorityNotifier {
    pub(crate) fn new(semaphore: Arc<Semaphore>) -> (PriorityNotifier, Receiver<PriorityEvent>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (PriorityNotifier { sender, semaphore }, receiver)
    }

    pub fn sample_rate_changed(&self, sample_rate: u32) {
        self.notify(PriorityEvent::SampleRateChanged(sample_rate));
    }

    pub fn shutdown(&self, message: impl Into<String>) {
        self.notify(PriorityEvent::Shutdown(message.into()));
    }

    pub(crate) fn terminate(&self) {
        self.notify(PriorityEvent::Terminate);
    }

    fn notify(&self, event: PriorityEvent) {
        // The receiver only goes away once the worker has exited.
        if self.sender.send(event).is_ok() {
            self.semaphore.post();
        }
    }
}
