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

/// The number of sample banks addressable on a channel.
pub const BANK_COUNT: usize = 12;

/// The distance between the base control offsets of two adjacent banks.
pub const BANK_STRIDE: u8 = 10;

/// Banks below this index hold drum loops and are eligible for fills.
pub const DRUM_LOOP_BANKS: usize = 4;

/// The sample index that stops a bank.
pub const STOP: u8 = 8;

/// The number of ambient banks on the ambient channel: one per sensor plus a shared bank.
pub const AMBIENT_BANKS: usize = 5;

/// The ambient bank that plays through every speaker.
pub const SHARED_AMBIENT_BANK: Bank = Bank(4);

/// Full gain for a bank routed to a single speaker.
pub const SOLO_GAIN: u8 = 95;

/// Gain for a bank routed to every speaker.
pub const SHARED_GAIN: u8 = 63;

/// Centered pan.
pub const PAN_CENTER: u8 = 63;

/// Maximum control value.
pub const CONTROL_MAX: u8 = 127;

/// A sample-player bank. Each bank owns six consecutive controls starting at its base offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bank(u8);

impl Bank {
    /// Gets the bank at the given index (0-11).
    pub fn from_index(index: usize) -> Bank {
        assert!(index < BANK_COUNT, "bank index {} out of range", index);
        Bank(index as u8)
    }

    /// Gets the bank with the given base offset (0, 10, ..., 110).
    pub fn from_offset(offset: u8) -> Option<Bank> {
        if offset % BANK_STRIDE != 0 || usize::from(offset / BANK_STRIDE) >= BANK_COUNT {
            return None;
        }
        Some(Bank(offset / BANK_STRIDE))
    }

    /// All banks in offset order.
    pub fn all() -> impl Iterator<Item = Bank> {
        (0..BANK_COUNT).map(Bank::from_index)
    }

    /// The ambient bank that follows the given sensor.
    pub fn ambient_for_sensor(sensor: usize) -> Bank {
        assert!(
            sensor < AMBIENT_BANKS - 1,
            "sensor {} has no ambient bank",
            sensor
        );
        Bank(sensor as u8)
    }

    /// All ambient banks, sensor banks first.
    pub fn ambient() -> impl Iterator<Item = Bank> {
        (0..AMBIENT_BANKS).map(Bank::from_index)
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    pub fn offset(self) -> u8 {
        self.0 * BANK_STRIDE
    }

    /// Returns true if the bank holds drum loops.
    pub fn is_drum_loop(self) -> bool {
        self.index() < DRUM_LOOP_BANKS
    }

    /// The control number for the given bank parameter.
    pub fn control(self, control: BankControl) -> u8 {
        self.offset() + control.offset()
    }

    /// The note that starts the given sample on this bank.
    pub fn note(self, sample: u8) -> u8 {
        debug_assert!(sample <= STOP, "sample {} out of range", sample);
        self.offset() + sample
    }
}

impl fmt::Display for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.offset())
    }
}

/// One of the four auxiliary sends on a bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuxSend {
    A,
    B,
    C,
    D,
}

impl AuxSend {
    pub const ALL: [AuxSend; 4] = [AuxSend::A, AuxSend::B, AuxSend::C, AuxSend::D];

    fn index(self) -> u8 {
        match self {
            AuxSend::A => 0,
            AuxSend::B => 1,
            AuxSend::C => 2,
            AuxSend::D => 3,
        }
    }
}

/// A parameter on a bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BankControl {
    Gain,
    Pan,
    Send(AuxSend),
}

impl BankControl {
    fn offset(self) -> u8 {
        match self {
            BankControl::Gain => 0,
            BankControl::Pan => 1,
            BankControl::Send(send) => 2 + send.index(),
        }
    }
}

/// A speaker in the installation. Speakers are addressed by hard panning on one of two sends:
/// speaker 0 is send C left, 1 is send C right, 2 is send D left and 3 is send D right.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Speaker(usize);

impl Speaker {
    pub const COUNT: usize = 4;

    pub fn new(id: usize) -> Speaker {
        assert!(id < Speaker::COUNT, "speaker {} out of range", id);
        Speaker(id)
    }

    pub fn pan(self) -> u8 {
        if self.0 % 2 == 0 {
            0
        } else {
            CONTROL_MAX
        }
    }

    pub fn send(self) -> AuxSend {
        if self.0 < 2 {
            AuxSend::C
        } else {
            AuxSend::D
        }
    }
}

/// A MIDI channel on the control surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Ambient sample banks.
    Ambient,
    /// Music sample banks.
    Music,
    /// The return/master bus.
    Return,
}

/// How a channel's banks are routed when they play through every speaker.
pub struct Routing {
    pub name: &'static str,
    /// Level for sends A and B.
    pub ab_level: u8,
    /// Level for sends C and D.
    pub cd_level: u8,
}

const AMBIENT_ROUTING: Routing = Routing {
    name: "Ambient",
    ab_level: CONTROL_MAX,
    cd_level: 0,
};

const MUSIC_ROUTING: Routing = Routing {
    name: "Music",
    ab_level: 0,
    cd_level: CONTROL_MAX,
};

impl Channel {
    /// The zero-based MIDI channel number.
    pub fn number(self) -> u8 {
        match self {
            Channel::Ambient => 0,
            Channel::Music => 1,
            Channel::Return => 2,
        }
    }

    pub fn from_number(number: u8) -> Option<Channel> {
        match number {
            0 => Some(Channel::Ambient),
            1 => Some(Channel::Music),
            2 => Some(Channel::Return),
            _ => None,
        }
    }

    /// The bank routing table for this channel. The return channel carries no banks.
    pub fn routing(self) -> Option<&'static Routing> {
        match self {
            Channel::Ambient => Some(&AMBIENT_ROUTING),
            Channel::Music => Some(&MUSIC_ROUTING),
            Channel::Return => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Ambient => write!(f, "ambient"),
            Channel::Music => write!(f, "music"),
            Channel::Return => write!(f, "return"),
        }
    }
}

/// A stereo bus on the return channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bus {
    Ambient,
    Music,
}

impl Bus {
    /// The return channel controls that set this bus's gain.
    pub fn controls(self) -> [u8; 2] {
        match self {
            Bus::Ambient => [0, 1],
            Bus::Music => [2, 3],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bank_offsets() {
        assert_eq!(Some(Bank::from_index(3)), Bank::from_offset(30));
        assert_eq!(Some(Bank::from_index(11)), Bank::from_offset(110));
        assert_eq!(None, Bank::from_offset(120));
        assert_eq!(None, Bank::from_offset(15));
        assert_eq!(12, Bank::all().count());
    }

    #[test]
    fn bank_controls() {
        let bank = Bank::from_offset(40).unwrap();
        assert_eq!(40, bank.control(BankControl::Gain));
        assert_eq!(41, bank.control(BankControl::Pan));
        assert_eq!(42, bank.control(BankControl::Send(AuxSend::A)));
        assert_eq!(45, bank.control(BankControl::Send(AuxSend::D)));
        assert_eq!(48, bank.note(STOP));
    }

    #[test]
    fn drum_loops() {
        assert!(Bank::from_index(3).is_drum_loop());
        assert!(!Bank::from_index(4).is_drum_loop());
    }

    #[test]
    fn speakers() {
        for (id, pan, send) in [
            (0, 0, AuxSend::C),
            (1, 127, AuxSend::C),
            (2, 0, AuxSend::D),
            (3, 127, AuxSend::D),
        ] {
            let speaker = Speaker::new(id);
            assert_eq!(pan, speaker.pan());
            assert_eq!(send, speaker.send());
        }
    }

    #[test]
    fn routing_table() {
        assert_eq!(127, Channel::Ambient.routing().unwrap().ab_level);
        assert_eq!(127, Channel::Music.routing().unwrap().cd_level);
        assert!(Channel::Return.routing().is_none());
        assert_eq!(Some(Channel::Music), Channel::from_number(1));
        assert_eq!(None, Channel::from_number(3));
    }

    #[test]
    #[should_panic]
    fn sensor_without_ambient_bank() {
        Bank::ambient_for_sensor(4);
    }
}
