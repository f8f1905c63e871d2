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
    collections::VecDeque,
    error::Error,
    fmt,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use midir::{MidiOutput, MidiOutputConnection};
use midly::live::LiveEvent;
use tracing::{debug, error, info, span, Level};

use super::Command;

/// A sink backed by a midir output port. A worker thread owns the connection so sending never
/// blocks the caller.
pub struct Sink {
    name: String,
    commands: Sender<Command>,
    _worker: JoinHandle<()>,
}

impl super::ControlSink for Sink {
    fn send(&self, command: Command) {
        if let Err(e) = self.commands.send(command) {
            error!(
                device = self.name,
                err = e.to_string(),
                "MIDI output worker has stopped."
            );
        }
    }
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (midir)", self.name)
    }
}

/// Lists the midir output ports.
pub fn list() -> Result<Vec<String>, Box<dyn Error>> {
    let output = MidiOutput::new("creatures output listing")?;
    let mut names = output
        .ports()
        .iter()
        .map(|port| output.port_name(port))
        .collect::<Result<Vec<String>, _>>()?;
    names.sort();
    Ok(names)
}

/// Connects to the output port whose name contains the given name.
pub fn connect(name: &str, note_length: Duration) -> Result<Sink, Box<dyn Error>> {
    let output = MidiOutput::new("creatures output")?;
    let mut matches = Vec::new();
    for port in output.ports() {
        let port_name = output.port_name(&port)?;
        if port_name.contains(name) {
            matches.push((port_name, port));
        }
    }

    if matches.is_empty() {
        return Err(format!("no MIDI output found with name {}", name).into());
    }
    if matches.len() > 1 {
        return Err(format!(
            "found too many MIDI outputs that match ({}), use a less ambiguous name",
            matches
                .iter()
                .map(|(port_name, _)| port_name.clone())
                .collect::<Vec<String>>()
                .join(", ")
        )
        .into());
    }

    // We've verified that there's only one element in the vector, so this should be safe.
    let (port_name, port) = matches.swap_remove(0);
    let connection = output
        .connect(&port, "creatures control")
        .map_err(|e| e.to_string())?;
    info!(device = port_name, "Connected to MIDI output.");

    let (commands_tx, commands_rx) = crossbeam_channel::unbounded();
    let worker = {
        let port_name = port_name.clone();
        thread::spawn(move || deliver(port_name, connection, commands_rx, note_length))
    };

    Ok(Sink {
        name: port_name,
        commands: commands_tx,
        _worker: worker,
    })
}

/// Writes commands to the connection in order. Notes are released once note_length has passed.
fn deliver(
    name: String,
    mut connection: MidiOutputConnection,
    commands: Receiver<Command>,
    note_length: Duration,
) {
    let span = span!(Level::INFO, "MIDI output", device = name);
    let _enter = span.enter();

    // Notes all last the same time, so releases are already ordered by deadline.
    let mut releases: VecDeque<(Instant, LiveEvent<'static>)> = VecDeque::new();
    loop {
        let received = match releases.front() {
            Some((deadline, _)) => commands.recv_deadline(*deadline),
            None => commands.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(command) => {
                debug!(command = %command, "Sending command.");
                write(&mut connection, command.to_midi_event());
                if let Some(release) = command.to_release_event() {
                    releases.push_back((Instant::now() + note_length, release));
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                releases
                    .drain(..)
                    .for_each(|(_, release)| write(&mut connection, release));
                info!("MIDI output closed.");
                return;
            }
        }

        let now = Instant::now();
        while releases.front().is_some_and(|(deadline, _)| *deadline <= now) {
            if let Some((_, release)) = releases.pop_front() {
                write(&mut connection, release);
            }
        }
    }
}

fn write(connection: &mut MidiOutputConnection, event: LiveEvent<'static>) {
    let mut buf: Vec<u8> = Vec::with_capacity(3);
    if let Err(e) = event.write(&mut buf) {
        error!(err = format!("{:?}", e), "Error encoding MIDI event.");
        return;
    }
    if let Err(e) = connection.send(&buf) {
        error!(err = e.to_string(), "Error sending MIDI event.");
    }
}
