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
//! Bank routing primitives. Gain and pan are always written before the sends.

use tracing::debug;

use crate::bank::{
    AuxSend, Bank, BankControl, Channel, Routing, Speaker, CONTROL_MAX, PAN_CENTER, SHARED_GAIN,
    SOLO_GAIN,
};
use crate::control::ControlSink;

fn routing(channel: Channel) -> &'static Routing {
    match channel.routing() {
        Some(routing) => routing,
        None => panic!("the {} channel has no sample banks to route", channel),
    }
}

/// Plays the bank through every speaker using the channel's default send levels.
pub fn all_speakers(sink: &dyn ControlSink, channel: Channel, bank: Bank) {
    let routing = routing(channel);
    debug!(channel = routing.name, bank = %bank, "Routing bank to all speakers.");

    sink.set_control(channel, bank.control(BankControl::Gain), SHARED_GAIN);
    sink.set_control(channel, bank.control(BankControl::Pan), PAN_CENTER);
    for send in AuxSend::ALL {
        let level = match send {
            AuxSend::A | AuxSend::B => routing.ab_level,
            AuxSend::C | AuxSend::D => routing.cd_level,
        };
        sink.set_control(channel, bank.control(BankControl::Send(send)), level);
    }
}

/// Plays the bank through a single speaker at full gain.
pub fn solo_speaker(sink: &dyn ControlSink, channel: Channel, bank: Bank, speaker: Speaker) {
    let routing = routing(channel);
    debug!(
        channel = routing.name,
        bank = %bank,
        speaker = ?speaker,
        "Routing bank to one speaker."
    );

    sink.set_control(channel, bank.control(BankControl::Gain), SOLO_GAIN);
    sink.set_control(channel, bank.control(BankControl::Pan), speaker.pan());
    for send in AuxSend::ALL {
        let level = if send == speaker.send() { CONTROL_MAX } else { 0 };
        sink.set_control(channel, bank.control(BankControl::Send(send)), level);
    }
}

/// Silences the bank and closes its sends.
pub fn all_off(sink: &dyn ControlSink, channel: Channel, bank: Bank) {
    let routing = routing(channel);
    debug!(channel = routing.name, bank = %bank, "Switching bank off.");

    sink.set_control(channel, bank.control(BankControl::Gain), 0);
    sink.set_control(channel, bank.control(BankControl::Pan), PAN_CENTER);
    for send in AuxSend::ALL {
        sink.set_control(channel, bank.control(BankControl::Send(send)), 0);
    }
}

/// Sets only the bank's gain.
pub fn gain(sink: &dyn ControlSink, channel: Channel, bank: Bank, gain: u8) {
    let routing = routing(channel);
    debug!(channel = routing.name, bank = %bank, gain, "Setting bank gain.");
    sink.set_control(channel, bank.control(BankControl::Gain), gain);
}
