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
    io,
    sync::Arc,
    thread::{self, JoinHandle},
};

use crossbeam_channel::Receiver;
use tracing::{debug, error, info, span, warn, Level};

use super::{
    command::Submission,
    event::{Event, EventReceiver, PriorityEvent},
    Observer, Shared,
};
use crate::{job::JobKind, stream::JobStream, stream::StreamError};

const IDLE_STATUS: &str = "Idle.";

/// The non-realtime half of the sampler. Wakes on the shared semaphore,
/// handles priority events first, then one event from the ring.
pub(crate) struct Worker {
    pub(crate) shared: Arc<Shared>,
    pub(crate) events: EventReceiver,
    pub(crate) priority: Receiver<PriorityEvent>,
    pub(crate) observer: Arc<dyn Observer>,
    pub(crate) include_release_tail: bool,
}

impl Worker {
    pub(crate) fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("sampler-worker".to_string())
            .spawn(move || self.run())
    }

    fn run(mut self) {
        let span = span!(Level::INFO, "sampler worker");
        let _enter = span.enter();

        debug!("Worker started.");
        loop {
            self.shared.semaphore.wait();

            if let Ok(event) = self.priority.try_recv() {
                if !self.handle_priority(event) {
                    break;
                }
                continue;
            }

            match self.events.try_recv() {
                Some(event) => self.handle_event(event),
                None => debug!("Woke without a pending event."),
            }
        }
        debug!("Worker stopped.");
    }

    /// Returns false when the worker should stop.
    fn handle_priority(&self, event: PriorityEvent) -> bool {
        match event {
            PriorityEvent::SampleRateChanged(sample_rate) => {
                info!(sample_rate, "Sample rate changed.");
                self.observer.sample_rate_changed(sample_rate);
            }
            PriorityEvent::Shutdown(message) => {
                if self.shared.deactivate() {
                    error!(reason = %message, "Audio backend shut down.");
                    self.observer.fatal_error(&message);
                } else {
                    debug!(reason = %message, "Backend shutdown reported while inactive.");
                }
            }
            PriorityEvent::Terminate => return false,
        }
        true
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Progress(progress) => self.observer.progress_changed(progress),
            Event::Complete(submission) => self.complete(submission),
            Event::Aborted(submission) => {
                info!(zone = %submission.job().zone(), "Job aborted.");
                self.finish(submission);
                self.observer.job_aborted();
                self.observer.progress_changed(0.0);
            }
            Event::Error(job_error, submission) => {
                error!(zone = %submission.job().zone(), err = %job_error, "Job failed.");
                self.finish(submission);
                self.observer.job_error(job_error.message());
                self.observer.progress_changed(0.0);
            }
            Event::Xrun(xrun) => {
                warn!(%xrun, "Audio xrun.");
                self.observer.xrun(xrun);
            }
        }
    }

    fn complete(&self, mut submission: Box<Submission>) {
        let kind = submission.job().kind();
        let result = match kind {
            JobKind::Sample => self.write_capture(&mut submission),
            JobKind::Play => Ok(()),
        };
        let zone = submission.job().zone().clone();
        self.finish(submission);

        match result {
            Ok(()) => {
                info!(%kind, %zone, "Job completed.");
                self.observer.job_completed();
            }
            Err(e) => {
                error!(%kind, %zone, err = %e, "Unable to write the captured sample.");
                self.observer.job_error(&e.to_string());
            }
        }
        self.observer.progress_changed(0.0);
    }

    fn write_capture(&self, submission: &mut Submission) -> Result<(), StreamError> {
        let frames = if self.include_release_tail {
            submission.buffer.total_frames()
        } else {
            submission.buffer.sample_frames()
        };
        let JobStream::Output(stream) = &mut submission.stream else {
            return Ok(());
        };

        submission.buffer.store(stream.as_mut(), frames)?;
        stream.finish()?;
        debug!(frames, "Wrote captured sample.");
        Ok(())
    }

    /// Drops the job's buffer and opens the sampler for the next job.
    fn finish(&self, submission: Box<Submission>) {
        drop(submission);
        self.shared.mark_idle();
        self.observer.status_changed(IDLE_STATUS);
        debug!(live_buffers = self.shared.ledger.live(), "Released job buffer.");
    }
}
