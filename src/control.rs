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
use std::{error::Error, fmt, sync::Arc, time::Duration};

use midly::{
    live::LiveEvent,
    num::{u4, u7},
    MidiMessage,
};

use crate::bank::Channel;

mod midir;
mod mock;

/// A command sent to the sample players.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Sets a control to a value between 0 and 127.
    Control {
        channel: Channel,
        control: u8,
        value: u8,
    },
    /// Plays a note. The note is released by the sink.
    Note {
        channel: Channel,
        note: u8,
        velocity: u8,
    },
}

impl Command {
    pub fn channel(&self) -> Channel {
        match self {
            Command::Control { channel, .. } | Command::Note { channel, .. } => *channel,
        }
    }

    /// Converts the command into the MIDI event that starts it.
    pub fn to_midi_event(&self) -> LiveEvent<'static> {
        match *self {
            Command::Control {
                channel,
                control,
                value,
            } => LiveEvent::Midi {
                channel: u4::from(channel.number()),
                message: MidiMessage::Controller {
                    controller: u7::from(control),
                    value: u7::from(value),
                },
            },
            Command::Note {
                channel,
                note,
                velocity,
            } => LiveEvent::Midi {
                channel: u4::from(channel.number()),
                message: MidiMessage::NoteOn {
                    key: u7::from(note),
                    vel: u7::from(velocity),
                },
            },
        }
    }

    /// The MIDI event that ends the command, if it needs one.
    pub fn to_release_event(&self) -> Option<LiveEvent<'static>> {
        match *self {
            Command::Control { .. } => None,
            Command::Note {
                channel,
                note,
                velocity,
            } => Some(LiveEvent::Midi {
                channel: u4::from(channel.number()),
                message: MidiMessage::NoteOff {
                    key: u7::from(note),
                    vel: u7::from(velocity),
                },
            }),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Control {
                channel,
                control,
                value,
            } => write!(f, "{} control {} = {}", channel, control, value),
            Command::Note {
                channel,
                note,
                velocity,
            } => write!(f, "{} note {} ({})", channel, note, velocity),
        }
    }
}

/// Accepts commands for the sample players. Sending never blocks and is never acknowledged;
/// commands are delivered in submission order.
pub trait ControlSink: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Queues a command.
    fn send(&self, command: Command);

    /// Sets a control on the given channel.
    fn set_control(&self, channel: Channel, control: u8, value: u8) {
        debug_assert!(value <= 127, "control value {} out of range", value);
        self.send(Command::Control {
            channel,
            control,
            value,
        });
    }

    /// Plays a note on the given channel.
    fn trigger_note(&self, channel: Channel, note: u8, velocity: u8) {
        debug_assert!(note <= 127, "note {} out of range", note);
        self.send(Command::Note {
            channel,
            note,
            velocity,
        });
    }
}

/// Lists the names of the MIDI output ports.
pub fn list_outputs() -> Result<Vec<String>, Box<dyn Error>> {
    midir::list()
}

/// Gets a sink for the output port with the given name. Names starting with "mock" record
/// commands instead of sending them.
pub fn get_sink(name: &str, note_length: Duration) -> Result<Arc<dyn ControlSink>, Box<dyn Error>> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Sink::get(name)));
    }

    Ok(Arc::new(midir::connect(name, note_length)?))
}

#[cfg(test)]
pub mod test {
    pub use super::mock::Sink;

    use midly::{
        live::LiveEvent,
        num::{u4, u7},
        MidiMessage,
    };

    use super::Command;
    use crate::bank::Channel;

    #[test]
    fn control_event() {
        let command = Command::Control {
            channel: Channel::Music,
            control: 42,
            value: 127,
        };
        assert_eq!(
            LiveEvent::Midi {
                channel: u4::from(1),
                message: MidiMessage::Controller {
                    controller: u7::from(42),
                    value: u7::from(127),
                },
            },
            command.to_midi_event()
        );
        assert_eq!(None, command.to_release_event());
    }

    #[test]
    fn note_events() {
        let command = Command::Note {
            channel: Channel::Return,
            note: 100,
            velocity: 64,
        };
        assert_eq!(
            LiveEvent::Midi {
                channel: u4::from(2),
                message: MidiMessage::NoteOn {
                    key: u7::from(100),
                    vel: u7::from(64),
                },
            },
            command.to_midi_event()
        );
        assert_eq!(
            Some(LiveEvent::Midi {
                channel: u4::from(2),
                message: MidiMessage::NoteOff {
                    key: u7::from(100),
                    vel: u7::from(64),
                },
            }),
            command.to_release_event()
        );
    }

    #[test]
    fn mock_sink_by_name() {
        let sink = super::get_sink("mock-surface", std::time::Duration::ZERO).unwrap();
        assert_eq!("mock-surface (Mock)", sink.to_string());
    }
}
