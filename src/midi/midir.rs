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
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use midir::{MidiInput, MidiOutput, MidiOutputConnection, MidiOutputPort};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use thread_priority::ThreadPriority;
use tracing::{debug, error, info, span, Level};

use super::{DeviceInfo, MidiError, ShortMessage};
use crate::{audio::thread_priority::configure_thread_priority, sync::Semaphore};

/// Default number of messages that can be queued for the MIDI thread.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// The audio callback's side of a midir connection. Messages are queued into
/// a ring and the MIDI thread is woken to write them, since midir's send may
/// block.
pub struct Queue {
    producer: HeapProd<ShortMessage>,
    semaphore: Arc<Semaphore>,
}

impl super::MidiOutput for Queue {
    fn vacant(&self) -> usize {
        self.producer.vacant_len()
    }

    fn send(&mut self, message: &ShortMessage) -> bool {
        if self.producer.try_push(*message).is_err() {
            return false;
        }
        self.semaphore.post();
        true
    }
}

/// Owns the MIDI thread. Dropping the connection drains the queue, stops the
/// thread and closes the port.
pub struct Connection {
    name: String,
    stop: Arc<AtomicBool>,
    semaphore: Arc<Semaphore>,
    thread: Option<JoinHandle<()>>,
}

impl Connection {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops the MIDI thread after it has written everything queued so far.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        self.stop.store(true, Ordering::Release);
        self.semaphore.post();
        if thread.join().is_err() {
            error!(device = self.name, "MIDI thread panicked.");
        }
        info!(device = self.name, "MIDI connection closed.");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Lists midir ports, merging inputs and outputs that share a name.
pub fn list() -> Result<Vec<DeviceInfo>, MidiError> {
    let input = MidiInput::new("rtsampler input listing")?;
    let output = MidiOutput::new("rtsampler output listing")?;

    let mut devices: BTreeMap<String, DeviceInfo> = BTreeMap::new();
    for port in input.ports() {
        let name = input.port_name(&port)?;
        devices
            .entry(name.clone())
            .or_insert_with(|| DeviceInfo {
                name,
                input: false,
                output: false,
            })
            .input = true;
    }
    for port in output.ports() {
        let name = output.port_name(&port)?;
        devices
            .entry(name.clone())
            .or_insert_with(|| DeviceInfo {
                name,
                input: false,
                output: false,
            })
            .output = true;
    }

    Ok(devices.into_values().collect())
}

/// Finds the single output port whose name contains `name`.
fn find_output_port(output: &MidiOutput, name: &str) -> Result<(String, MidiOutputPort), MidiError> {
    let mut matches = Vec::new();
    for port in output.ports() {
        let port_name = output.port_name(&port)?;
        if port_name.contains(name) {
            matches.push((port_name, port));
        }
    }

    if matches.is_empty() {
        return Err(MidiError::NotFound(name.to_string()));
    }
    if matches.len() > 1 {
        return Err(MidiError::Ambiguous(
            matches
                .iter()
                .map(|(name, _)| name.clone())
                .collect::<Vec<String>>()
                .join(", "),
        ));
    }

    Ok(matches.swap_remove(0))
}

/// Connects to the named output port and starts the MIDI thread.
pub fn connect(
    name: &str,
    capacity: usize,
    priority: ThreadPriority,
    rt_audio: bool,
) -> Result<(Connection, Queue), MidiError> {
    let span = span!(Level::INFO, "connect MIDI (midir)");
    let _enter = span.enter();

    let output = MidiOutput::new("rtsampler output")?;
    let (port_name, port) = find_output_port(&output, name)?;
    let connection = output
        .connect(&port, "rtsampler sampler")
        .map_err(|e| MidiError::Connect {
            name: port_name.clone(),
            message: e.to_string(),
        })?;

    let (producer, consumer) = HeapRb::<ShortMessage>::new(capacity.max(1)).split();
    let semaphore = Arc::new(Semaphore::new());
    let stop = Arc::new(AtomicBool::new(false));

    let thread = {
        let semaphore = semaphore.clone();
        let stop = stop.clone();
        let device = port_name.clone();
        thread::Builder::new()
            .name("midi-output".to_string())
            .spawn(move || {
                let mut priority_set = false;
                configure_thread_priority("midi-output", priority, rt_audio, &mut priority_set);
                write_messages(&device, connection, consumer, &semaphore, &stop);
            })?
    };

    info!(device = port_name, capacity, "MIDI connection opened.");
    Ok((
        Connection {
            name: port_name,
            stop,
            semaphore: semaphore.clone(),
            thread: Some(thread),
        },
        Queue {
            producer,
            semaphore,
        },
    ))
}

/// The MIDI thread body. Each queued message carries one post; a post with
/// nothing queued and the stop flag set ends the loop.
fn write_messages(
    device: &str,
    mut connection: MidiOutputConnection,
    mut consumer: HeapCons<ShortMessage>,
    semaphore: &Semaphore,
    stop: &AtomicBool,
) {
    loop {
        semaphore.wait();
        match consumer.try_pop() {
            Some(message) => {
                if let Err(e) = connection.send(message.as_bytes()) {
                    error!(
                        device,
                        err = %e,
                        message = ?message,
                        "Error sending MIDI message."
                    );
                } else {
                    debug!(device, message = ?message, "Sent MIDI message.");
                }
            }
            None => {
                if stop.load(Ordering::Acquire) {
                    break;
                }
            }
        }
    }
    connection.close();
}
