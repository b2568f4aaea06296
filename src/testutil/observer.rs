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

use parking_lot::Mutex;

use crate::{
    audio::Xrun,
    engine::{Notification, Observer},
};

/// Records every notification in order.
#[derive(Default)]
pub struct Recorder {
    notifications: Mutex<Vec<Notification>>,
}

impl Recorder {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    pub fn contains(&self, notification: &Notification) -> bool {
        self.notifications.lock().contains(notification)
    }

    pub fn count(&self, notification: &Notification) -> usize {
        self.notifications
            .lock()
            .iter()
            .filter(|recorded| *recorded == notification)
            .count()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.notifications
            .lock()
            .iter()
            .filter_map(|notification| match notification {
                Notification::Status(status) => Some(status.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<f32> {
        self.notifications
            .lock()
            .iter()
            .filter_map(|notification| match notification {
                Notification::Progress(progress) => Some(*progress),
                _ => None,
            })
            .collect()
    }

    fn record(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}

impl Observer for Recorder {
    fn status_changed(&self, status: &str) {
        self.record(Notification::Status(status.to_string()));
    }

    fn progress_changed(&self, progress: f32) {
        self.record(Notification::Progress(progress));
    }

    fn job_completed(&self) {
        self.record(Notification::JobCompleted);
    }

    fn job_aborted(&self) {
        self.record(Notification::JobAborted);
    }

    fn job_error(&self, message: &str) {
        self.record(Notification::JobError(message.to_string()));
    }

    fn fatal_error(&self, message: &str) {
        self.record(Notification::FatalError(message.to_string()));
    }

    fn sample_rate_changed(&self, sample_rate: u32) {
        self.record(Notification::SampleRateChanged(sample_rate));
    }

    fn xrun(&self, xrun: Xrun) {
        self.record(Notification::Xrun(xrun));
    }
}
