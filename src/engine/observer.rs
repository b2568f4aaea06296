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
use crossbeam_channel::Sender;

use crate::audio::Xrun;

/// Receives the sampler's notifications. Every method is called from the
/// worker thread, never from the audio callback. The defaults ignore the
/// notification.
pub trait Observer: Send + Sync {
    fn status_changed(&self, _status: &str) {}

    /// Job progress in `[0.0, 1.0]`. Drops back to 0.0 once a job ends.
    fn progress_changed(&self, _progress: f32) {}

    fn job_completed(&self) {}

    fn job_aborted(&self) {}

    fn job_error(&self, _message: &str) {}

    /// The backend died. The sampler is inactive from here on.
    fn fatal_error(&self, _message: &str) {}

    fn sample_rate_changed(&self, _sample_rate: u32) {}

    fn xrun(&self, _xrun: Xrun) {}
}

/// A notification in value form, for observers that forward to a channel.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    Status(String),
    Progress(f32),
    JobCompleted,
    JobAborted,
    JobError(String),
    FatalError(String),
    SampleRateChanged(u32),
    Xrun(Xrun),
}

impl Notification {
    /// True for the notifications that end a job.
    pub fn is_job_outcome(&self) -> bool {
        matches!(
            self,
            Notification::JobCompleted | Notification::JobAborted | Notification::JobError(_)
        )
    }
}

/// Forwards every notification into a channel. Send errors mean the
/// receiver is gone and are ignored.
impl Observer for Sender<Notification> {
    fn status_changed(&self, status: &str) {
        let _ = self.send(Notification::Status(status.to_string()));
    }

    fn progress_changed(&self, progress: f32) {
        let _ = self.send(Notification::Progress(progress));
    }

    fn job_completed(&self) {
        let _ = self.send(Notification::JobCompleted);
    }

    fn job_aborted(&self) {
        let _ = self.send(Notification::JobAborted);
    }

    fn job_error(&self, message: &str) {
        let _ = self.send(Notification::JobError(message.to_string()));
    }

    fn fatal_error(&self, message: &str) {
        let _ = self.send(Notification::FatalError(message.to_string()));
    }

    fn sample_rate_changed(&self, sample_rate: u32) {
        let _ = self.send(Notification::SampleRateChanged(sample_rate));
    }

    fn xrun(&self, xrun: Xrun) {
        let _ = self.send(Notification::Xrun(xrun));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_observer_forwards_outcomes() {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let observer: &dyn Observer = &sender;
        observer.status_changed("Sampling");
        observer.progress_changed(0.5);
        observer.job_error("MIDI output full");
        observer.job_completed();

        let notifications: Vec<Notification> = receiver.try_iter().collect();
        assert_eq!(
            vec![
                Notification::Status("Sampling".to_string()),
                Notification::Progress(0.5),
                Notification::JobError("MIDI output full".to_string()),
                Notification::JobCompleted,
            ],
            notifications
        );
        let outcomes: Vec<bool> = notifications.iter().map(Notification::is_job_outcome).collect();
        assert_eq!(vec![false, false, true, true], outcomes);
        assert!(Notification::JobAborted.is_job_outcome());
        assert!(!Notification::FatalError("gone".to_string()).is_job_outcome());
    }
}
