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

use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};

use super::{
    buffer::{BufferLedger, SampleBuffer},
    EngineError,
};
use crate::{
    job::{Job, JobKind},
    stream::JobStream,
};

/// Room for one job and one abort.
const COMMAND_CAPACITY: usize = 2;

/// Everything the realtime thread needs to run a job. A submission travels
/// to the realtime thread inside a command and comes back inside the job's
/// finalization event.
pub struct Submission {
    pub(crate) job: Job,
    pub(crate) stream: JobStream,
    pub(crate) buffer: SampleBuffer,
    pub(crate) sample_frames: usize,
    pub(crate) release_frames: usize,
    pub(crate) sample_rate: u32,
}

impl Submission {
    /// Allocates the job's buffer. Play jobs read their whole stream here so
    /// the realtime thread never touches the stream.
    pub(crate) fn prepare(
        job: Job,
        stream: JobStream,
        channels: usize,
        sample_rate: u32,
        ledger: &Arc<BufferLedger>,
    ) -> Result<Submission, EngineError> {
        match (job.kind(), stream) {
            (JobKind::Sample, stream @ JobStream::Output(_)) => {
                let sample_frames = job.zone().sample_frames(sample_rate);
                let release_frames = job.zone().release_frames(sample_rate);
                Ok(Submission {
                    buffer: SampleBuffer::new(channels, sample_frames, release_frames, ledger),
                    job,
                    stream,
                    sample_frames,
                    release_frames,
                    sample_rate,
                })
            }
            (JobKind::Play, JobStream::Input(mut input)) => {
                let frames = input.frames();
                let mut buffer = SampleBuffer::new(channels, frames, 0, ledger);
                buffer.load(input.as_mut())?;
                Ok(Submission {
                    job,
                    stream: JobStream::Input(input),
                    buffer,
                    sample_frames: frames,
                    release_frames: 0,
                    sample_rate,
                })
            }
            (kind, _) => Err(EngineError::StreamKind {
                kind,
                expected: match kind {
                    JobKind::Sample => "output",
                    JobKind::Play => "input",
                },
            }),
        }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub(crate) fn total_frames(&self) -> usize {
        self.sample_frames + self.release_frames
    }
}

pub(crate) enum Command {
    Start(Box<Submission>),
    Abort,
}

/// The submitting side of the command channel.
pub(crate) struct CommandSender {
    producer: HeapProd<Command>,
}

impl CommandSender {
    /// Queues a command, handing it back if the channel is full.
    pub(crate) fn submit(&mut self, command: Command) -> Result<(), Command> {
        self.producer.try_push(command)
    }
}

/// The realtime side of the command channel.
pub(crate) struct CommandReceiver {
    consumer: HeapCons<Command>,
}

impl CommandReceiver {
    pub(crate) fn try_consume(&mut self) -> Option<Command> {
        self.consumer.try_pop()
    }
}

pub(crate) fn command_channel() -> (CommandSender, CommandReceiver) {
    let (producer, consumer) = HeapRb::new(COMMAND_CAPACITY).split();
    (CommandSender { producer }, CommandReceiver { consumer })
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        job::Zone,
        stream::memory::{MemoryInputStream, MemoryOutputStream},
    };

    fn zone() -> Arc<Zone> {
        Arc::new(
            Zone::new(1, 60, 100)
                .expect("valid zone")
                .with_sample_time(Duration::from_millis(10))
                .with_release_time(Duration::from_millis(5)),
        )
    }

    #[test]
    fn channel_holds_a_job_and_an_abort() {
        let ledger = Arc::new(BufferLedger::default());
        let (mut sender, mut receiver) = command_channel();
        let (output, _) = MemoryOutputStream::new(1, 48000);
        let submission = Submission::prepare(
            Job::sample(zone()),
            JobStream::Output(Box::new(output)),
            1,
            48000,
            &ledger,
        )
        .expect("prepare");

        assert!(sender.submit(Command::Start(Box::new(submission))).is_ok());
        assert!(sender.submit(Command::Abort).is_ok());
        assert!(matches!(sender.submit(Command::Abort), Err(Command::Abort)));

        assert!(matches!(receiver.try_consume(), Some(Command::Start(_))));
        assert!(matches!(receiver.try_consume(), Some(Command::Abort)));
        assert!(receiver.try_consume().is_none());
        assert_eq!(0, ledger.live());
    }

    #[test]
    fn sample_submission_sizes_buffer() {
        let ledger = Arc::new(BufferLedger::default());
        let (output, _) = MemoryOutputStream::new(2, 48000);
        let submission = Submission::prepare(
            Job::sample(zone()),
            JobStream::Output(Box::new(output)),
            2,
            48000,
            &ledger,
        )
        .expect("prepare");

        assert_eq!(480, submission.sample_frames);
        assert_eq!(240, submission.release_frames);
        assert_eq!(720, submission.buffer().total_frames());
        assert_eq!(2, submission.buffer().channel_count());
        assert_eq!(1, ledger.live());
    }

    #[test]
    fn play_submission_loads_stream() {
        let ledger = Arc::new(BufferLedger::default());
        let input = MemoryInputStream::new(1, 48000, vec![0.25; 300]);
        let submission = Submission::prepare(
            Job::play(zone()),
            JobStream::Input(Box::new(input)),
            1,
            48000,
            &ledger,
        )
        .expect("prepare");

        assert_eq!(300, submission.sample_frames);
        assert_eq!(0, submission.release_frames);
        assert!(submission.buffer().channel(0).iter().all(|s| *s == 0.25));
    }

    #[test]
    fn stream_direction_must_match_job() {
        let ledger = Arc::new(BufferLedger::default());
        let input = MemoryInputStream::new(1, 48000, vec![0.0; 10]);
        let result = Submission::prepare(
            Job::sample(zone()),
            JobStream::Input(Box::new(input)),
            1,
            48000,
            &ledger,
        );
        assert!(matches!(
            result,
            Err(EngineError::StreamKind {
                kind: JobKind::Sample,
                expected: "output"
            })
        ));
        assert_eq!(0, ledger.live());
    }
}
