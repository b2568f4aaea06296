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
use std::{sync::Arc, time::Duration};

use crate::{
    audio::{mock, Xrun},
    engine::{EngineError, Notification, Sampler, Settings, State},
    job::{Job, Zone},
    midi::ShortMessage,
    stream::{
        memory::{MemoryCapture, MemoryInputStream, MemoryOutputStream},
        JobStream,
    },
    testutil::{eventually, Recorder},
};

const SAMPLE_RATE: u32 = 48000;
const FRAMES: usize = 256;

struct Fixture {
    sampler: Sampler,
    driver: mock::Driver,
    recorder: Arc<Recorder>,
}

impl Fixture {
    fn new(channels: usize) -> Fixture {
        Fixture::with_settings(Settings::new(channels), channels, channels)
    }

    fn with_settings(settings: Settings, input_channels: usize, output_channels: usize) -> Fixture {
        let backend = mock::Backend::new(
            "mock-test",
            SAMPLE_RATE,
            FRAMES,
            input_channels,
            output_channels,
        );
        let driver = backend.driver();
        let recorder = Arc::new(Recorder::default());
        let sampler = Sampler::new(settings, Box::new(backend), recorder.clone())
            .expect("sampler should activate");
        Fixture {
            sampler,
            driver,
            recorder,
        }
    }

    fn input(&self, value: f32) -> Vec<f32> {
        vec![value; self.driver.frames() * self.driver.input_channels()]
    }

    fn start_sample(&self, zone: Zone) -> MemoryCapture {
        let (stream, capture) = MemoryOutputStream::new(self.sampler.channels(), SAMPLE_RATE);
        self.sampler
            .start_job(Job::sample(Arc::new(zone)), JobStream::Output(Box::new(stream)))
            .expect("job should start");
        capture
    }

    /// Cycles with a constant input until the processor is idle again and
    /// returns the outputs.
    fn run_to_idle(&self, value: f32, limit: usize) -> Vec<Vec<f32>> {
        let input = self.input(value);
        let mut outputs = Vec::new();
        for _ in 0..limit {
            outputs.push(self.driver.cycle(&input));
            if self.driver.state() == Some(State::Idle) {
                return outputs;
            }
        }
        panic!("job did not finish within {limit} buffers");
    }

    fn wait_for(&self, notification: Notification) {
        let message = format!("expected {notification:?}");
        eventually(|| self.recorder.contains(&notification), &message);
    }

    fn wait_for_buffers_released(&self) {
        eventually(
            || self.sampler.live_buffers() == 0 && self.sampler.is_idle(),
            "job buffer was not released",
        );
    }
}

fn zone(sample: Duration, release: Duration) -> Zone {
    Zone::new(1, 60, 100)
        .expect("valid zone")
        .with_sample_time(sample)
        .with_release_time(release)
}

fn statuses(messages: &[ShortMessage]) -> Vec<u8> {
    messages.iter().map(|message| message.status() & 0xF0).collect()
}

#[test]
fn sample_job_writes_capture() {
    let fixture = Fixture::new(1);
    let capture = fixture.start_sample(zone(Duration::from_secs(1), Duration::from_millis(500)));
    assert!(!fixture.sampler.is_idle());

    fixture.run_to_idle(0.5, 400);
    fixture.wait_for(Notification::JobCompleted);
    fixture.wait_for_buffers_released();

    assert!(capture.is_finished());
    assert_eq!(48000, capture.frames());
    assert!(capture.samples().iter().all(|sample| *sample == 0.5));

    let messages = fixture.driver.midi_messages();
    assert_eq!(vec![0x90, 0x80, 0xB0, 0xB0], statuses(&messages));
    assert_eq!(&[0xB0, 0x78, 0x00], messages[2].as_bytes());
    assert_eq!(&[0xB0, 0x79, 0x00], messages[3].as_bytes());

    let statuses = fixture.recorder.statuses();
    assert_eq!(Some("Sampling ..."), statuses.get(1).map(String::as_str));
    assert_eq!(Some("Idle."), statuses.last().map(String::as_str));
}

#[test]
fn progress_ends_at_one_then_zero() {
    let fixture = Fixture::new(1);
    fixture.start_sample(zone(Duration::from_millis(100), Duration::from_millis(50)));
    fixture.run_to_idle(0.0, 100);
    fixture.wait_for(Notification::JobCompleted);
    eventually(
        || fixture.recorder.progress().last() == Some(&0.0),
        "progress was not reset",
    );

    let progress = fixture.recorder.progress();
    let (reset, during) = progress.split_last().expect("progress reported");
    assert_eq!(0.0, *reset);
    assert_eq!(Some(&1.0), during.last());
    assert!(during.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn release_tail_is_written_when_configured() {
    let mut settings = Settings::new(1);
    settings.include_release_tail = true;
    let fixture = Fixture::with_settings(settings, 1, 1);
    let capture = fixture.start_sample(zone(Duration::from_millis(100), Duration::from_millis(50)));

    fixture.run_to_idle(0.25, 100);
    fixture.wait_for(Notification::JobCompleted);
    assert_eq!(7200, capture.frames());
}

#[test]
fn second_job_is_rejected_while_busy() {
    let fixture = Fixture::new(1);
    fixture.start_sample(zone(Duration::from_secs(1), Duration::ZERO));

    let (stream, _capture) = MemoryOutputStream::new(1, SAMPLE_RATE);
    let result = fixture.sampler.start_job(
        Job::sample(Arc::new(zone(Duration::from_secs(1), Duration::ZERO))),
        JobStream::Output(Box::new(stream)),
    );
    assert!(matches!(result, Err(EngineError::Busy)));
    assert_eq!(1, fixture.sampler.live_buffers());

    fixture.sampler.abort_job().expect("abort should be accepted");
    fixture.run_to_idle(0.0, 10);
    fixture.wait_for(Notification::JobAborted);
    fixture.wait_for_buffers_released();
}

#[test]
fn abort_without_job_is_rejected() {
    let fixture = Fixture::new(1);
    assert!(matches!(
        fixture.sampler.abort_job(),
        Err(EngineError::NotRunning)
    ));
}

#[test]
fn abort_cleans_up_before_reporting() {
    let fixture = Fixture::new(1);
    let capture = fixture.start_sample(zone(Duration::from_secs(1), Duration::from_millis(500)));

    let input = fixture.input(0.1);
    for _ in 0..80 {
        fixture.driver.cycle(&input);
    }
    assert_eq!(Some(State::Sample), fixture.driver.state());

    fixture.sampler.abort_job().expect("abort should be accepted");
    fixture.sampler.abort_job().expect("repeated abort is coalesced");
    fixture.run_to_idle(0.1, 10);
    fixture.wait_for(Notification::JobAborted);
    fixture.wait_for_buffers_released();

    assert_eq!(
        vec![0x90, 0x80, 0xB0, 0xB0],
        statuses(&fixture.driver.midi_messages())
    );
    assert_eq!(1, fixture.recorder.count(&Notification::JobAborted));
    assert!(!fixture.recorder.contains(&Notification::JobCompleted));
    assert_eq!(0, capture.frames());
    assert!(fixture
        .recorder
        .statuses()
        .contains(&"Aborting ...".to_string()));
}

#[test]
fn midi_failure_fails_the_job() {
    let fixture = Fixture::new(1);
    fixture.driver.set_midi_capacity(0);
    let capture = fixture.start_sample(zone(Duration::from_secs(1), Duration::ZERO));

    fixture.run_to_idle(0.0, 10);
    fixture.wait_for(Notification::JobError(
        "MIDI output buffer exhausted".to_string(),
    ));
    fixture.wait_for_buffers_released();

    assert!(fixture.driver.midi_messages().is_empty());
    assert_eq!(0, capture.frames());
}

#[test]
fn mismatched_streams_are_rejected() {
    let fixture = Fixture::new(1);

    let (stream, _capture) = MemoryOutputStream::new(2, SAMPLE_RATE);
    let result = fixture.sampler.start_job(
        Job::sample(Arc::new(zone(Duration::from_secs(1), Duration::ZERO))),
        JobStream::Output(Box::new(stream)),
    );
    assert!(matches!(
        result,
        Err(EngineError::ChannelMismatch {
            expected: 1,
            found: 2
        })
    ));

    let (stream, _capture) = MemoryOutputStream::new(1, 44100);
    let result = fixture.sampler.start_job(
        Job::sample(Arc::new(zone(Duration::from_secs(1), Duration::ZERO))),
        JobStream::Output(Box::new(stream)),
    );
    assert!(matches!(
        result,
        Err(EngineError::SampleRateMismatch {
            expected: 48000,
            found: 44100
        })
    ));

    let stream = MemoryInputStream::new(1, SAMPLE_RATE, vec![0.0; 10]);
    let result = fixture.sampler.start_job(
        Job::sample(Arc::new(zone(Duration::from_secs(1), Duration::ZERO))),
        JobStream::Input(Box::new(stream)),
    );
    assert!(matches!(result, Err(EngineError::StreamKind { .. })));

    assert!(fixture.sampler.is_idle());
    assert_eq!(0, fixture.sampler.live_buffers());
}

#[test]
fn play_job_mixes_into_outputs() {
    let fixture = Fixture::new(1);
    let stream = MemoryInputStream::new(1, SAMPLE_RATE, vec![0.5; 600]);
    fixture
        .sampler
        .start_job(
            Job::play(Arc::new(zone(Duration::ZERO, Duration::ZERO))),
            JobStream::Input(Box::new(stream)),
        )
        .expect("job should start");

    let outputs = fixture.run_to_idle(0.0, 10);
    fixture.wait_for(Notification::JobCompleted);
    fixture.wait_for_buffers_released();

    assert_eq!(3, outputs.len());
    let played: Vec<f32> = outputs.concat();
    assert!(played[..600].iter().all(|sample| *sample == 0.5));
    assert!(played[600..].iter().all(|sample| *sample == 0.0));
    assert!(fixture.driver.midi_messages().is_empty());
    assert!(fixture
        .recorder
        .statuses()
        .contains(&"Playing sample ...".to_string()));
}

#[test]
fn backend_shutdown_deactivates() {
    let fixture = Fixture::new(1);
    fixture.driver.shutdown("device unplugged");

    fixture.wait_for(Notification::FatalError("device unplugged".to_string()));
    eventually(|| !fixture.sampler.is_active(), "sampler still active");

    let (stream, _capture) = MemoryOutputStream::new(1, SAMPLE_RATE);
    let result = fixture.sampler.start_job(
        Job::sample(Arc::new(zone(Duration::from_secs(1), Duration::ZERO))),
        JobStream::Output(Box::new(stream)),
    );
    assert!(matches!(result, Err(EngineError::Inactive)));
}

#[test]
fn shutdown_mid_job_releases_buffer() {
    let fixture = Fixture::new(1);
    fixture.start_sample(zone(Duration::from_secs(1), Duration::ZERO));
    fixture.driver.silence(5);
    assert_eq!(1, fixture.sampler.live_buffers());

    fixture.driver.shutdown("device unplugged");
    fixture.wait_for(Notification::FatalError("device unplugged".to_string()));
    eventually(
        || fixture.sampler.live_buffers() == 0,
        "buffer outlived the processor",
    );
}

#[test]
fn sample_rate_changes_are_reported() {
    let fixture = Fixture::new(1);
    fixture.driver.set_sample_rate(44100);

    fixture.wait_for(Notification::SampleRateChanged(44100));
    assert_eq!(44100, fixture.sampler.sample_rate());
}

#[test]
fn sample_rate_change_mid_job_fails_it() {
    let fixture = Fixture::new(1);
    fixture.start_sample(zone(Duration::from_secs(1), Duration::ZERO));
    fixture.driver.silence(3);

    fixture.driver.set_sample_rate(44100);
    fixture.run_to_idle(0.0, 10);
    eventually(
        || {
            fixture
                .recorder
                .notifications()
                .iter()
                .any(|notification| matches!(notification, Notification::JobError(_)))
        },
        "job did not fail",
    );
    fixture.wait_for_buffers_released();
    assert_eq!(
        vec![0x90, 0x80, 0xB0, 0xB0],
        statuses(&fixture.driver.midi_messages())
    );
}

#[test]
fn xruns_reach_the_observer() {
    let fixture = Fixture::new(1);
    let input = fixture.input(0.0);
    fixture
        .driver
        .cycle_with_xrun(&input, Some(Xrun::InputUnderflow));

    fixture.wait_for(Notification::Xrun(Xrun::InputUnderflow));
}

#[test]
fn mapped_channels_and_monitoring() {
    let settings = Settings {
        input_map: vec![1],
        output_map: vec![0],
        monitor: true,
        ..Settings::new(1)
    };
    let fixture = Fixture::with_settings(settings, 2, 2);

    let mut input = Vec::with_capacity(FRAMES * 2);
    for _ in 0..FRAMES {
        input.extend_from_slice(&[0.9, 0.3]);
    }
    let output = fixture.driver.cycle(&input);
    assert!(output.chunks(2).all(|frame| frame == [0.3, 0.0]));
}

#[test]
fn dropping_the_sampler_deactivates_the_backend() {
    let fixture = Fixture::new(1);
    let driver = fixture.driver.clone();
    assert!(driver.is_active());

    drop(fixture);
    assert!(!driver.is_active());
}
