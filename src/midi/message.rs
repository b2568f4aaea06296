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
use std::fmt;

use midly::num::{u4, u7};

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const POLY_AFTERTOUCH: u8 = 0xA0;
const CONTROL_CHANGE: u8 = 0xB0;
const CHANNEL_PRESSURE: u8 = 0xD0;

/// Channel mode controllers sent when a job winds down.
const ALL_SOUND_OFF: u8 = 0x78;
const RESET_ALL_CONTROLLERS: u8 = 0x79;

/// A two or three byte MIDI channel message. Messages live on the stack so
/// they can be assembled on the realtime thread.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ShortMessage {
    bytes: [u8; 3],
    len: u8,
}

impl ShortMessage {
    /// Builds a message from raw parts. The status byte must have its high bit
    /// set and data bytes must not.
    pub fn new(status: u8, data1: u8, data2: Option<u8>) -> ShortMessage {
        debug_assert!(status & 0x80 != 0, "status byte {status:#04x}");
        debug_assert!(data1 < 0x80 && data2.unwrap_or(0) < 0x80);

        match data2 {
            Some(data2) => ShortMessage {
                bytes: [status, data1, data2],
                len: 3,
            },
            None => ShortMessage {
                bytes: [status, data1, 0],
                len: 2,
            },
        }
    }

    fn channel_message(kind: u8, channel: u4, data1: u7, data2: Option<u7>) -> ShortMessage {
        ShortMessage::new(
            kind | u8::from(channel),
            u8::from(data1),
            data2.map(u8::from),
        )
    }

    pub fn control_change(channel: u4, controller: u7, value: u7) -> ShortMessage {
        Self::channel_message(CONTROL_CHANGE, channel, controller, Some(value))
    }

    pub fn note_on(channel: u4, note: u7, velocity: u7) -> ShortMessage {
        Self::channel_message(NOTE_ON, channel, note, Some(velocity))
    }

    pub fn note_off(channel: u4, note: u7, velocity: u7) -> ShortMessage {
        Self::channel_message(NOTE_OFF, channel, note, Some(velocity))
    }

    pub fn channel_pressure(channel: u4, pressure: u7) -> ShortMessage {
        Self::channel_message(CHANNEL_PRESSURE, channel, pressure, None)
    }

    /// Polyphonic key pressure for a single note.
    pub fn aftertouch(channel: u4, note: u7, pressure: u7) -> ShortMessage {
        Self::channel_message(POLY_AFTERTOUCH, channel, note, Some(pressure))
    }

    pub fn all_sound_off(channel: u4) -> ShortMessage {
        Self::channel_message(
            CONTROL_CHANGE,
            channel,
            u7::from(ALL_SOUND_OFF),
            Some(u7::from(0)),
        )
    }

    pub fn reset_all_controllers(channel: u4) -> ShortMessage {
        Self::channel_message(
            CONTROL_CHANGE,
            channel,
            u7::from(RESET_ALL_CONTROLLERS),
            Some(u7::from(0)),
        )
    }

    /// The bytes as they go on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }

    pub fn status(&self) -> u8 {
        self.bytes[0]
    }

    /// The zero-based channel carried in the status byte.
    pub fn channel(&self) -> u8 {
        self.bytes[0] & 0x0F
    }
}

impl fmt::Debug for ShortMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortMessage(")?;
        for (i, byte) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use midly::{live::LiveEvent, MidiMessage};

    use super::*;

    fn parse(message: &ShortMessage) -> (u8, MidiMessage) {
        match LiveEvent::parse(message.as_bytes()).expect("message should parse") {
            LiveEvent::Midi { channel, message } => (u8::from(channel), message),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn channel_messages_parse() {
        let channel = u4::from(3);

        let (ch, message) = parse(&ShortMessage::note_on(channel, 60.into(), 100.into()));
        assert_eq!(3, ch);
        assert_eq!(
            MidiMessage::NoteOn {
                key: 60.into(),
                vel: 100.into()
            },
            message
        );

        let (_, message) = parse(&ShortMessage::note_off(channel, 60.into(), 100.into()));
        assert_eq!(
            MidiMessage::NoteOff {
                key: 60.into(),
                vel: 100.into()
            },
            message
        );

        let (_, message) = parse(&ShortMessage::control_change(channel, 7.into(), 90.into()));
        assert_eq!(
            MidiMessage::Controller {
                controller: 7.into(),
                value: 90.into()
            },
            message
        );

        let (_, message) = parse(&ShortMessage::aftertouch(channel, 60.into(), 12.into()));
        assert_eq!(
            MidiMessage::Aftertouch {
                key: 60.into(),
                vel: 12.into()
            },
            message
        );

        let (_, message) = parse(&ShortMessage::channel_pressure(channel, 44.into()));
        assert_eq!(MidiMessage::ChannelAftertouch { vel: 44.into() }, message);
    }

    #[test]
    fn wire_bytes() {
        assert_eq!(
            &[0xD5, 0x10],
            ShortMessage::channel_pressure(5.into(), 0x10.into()).as_bytes()
        );
        assert_eq!(
            &[0xBF, 0x78, 0x00],
            ShortMessage::all_sound_off(15.into()).as_bytes()
        );
        assert_eq!(
            &[0xB0, 0x79, 0x00],
            ShortMessage::reset_all_controllers(0.into()).as_bytes()
        );
        assert_eq!(0x0F, ShortMessage::all_sound_off(15.into()).channel());
        assert_eq!(
            "ShortMessage(90 3C 64)",
            format!("{:?}", ShortMessage::note_on(0.into(), 60.into(), 100.into()))
        );
    }
}
