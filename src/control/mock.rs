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
use std::{collections::VecDeque, fmt, sync::Arc};

use parking_lot::Mutex;
use tracing::debug;

use super::Command;

/// The most commands a mock sink holds on to. Older commands are dropped first.
const RECORDED_COMMANDS: usize = 4096;

/// A mock sink. Records the latest commands instead of sending them.
#[derive(Clone)]
pub struct Sink {
    name: String,
    commands: Arc<Mutex<VecDeque<Command>>>,
}

impl Sink {
    /// Gets the given mock sink.
    pub fn get(name: &str) -> Sink {
        Sink {
            name: name.to_string(),
            commands: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    #[cfg(test)]
    /// Takes every command sent so far, leaving the sink empty.
    pub fn take(&self) -> Vec<Command> {
        self.commands.lock().drain(..).collect()
    }
}

impl super::ControlSink for Sink {
    fn send(&self, command: Command) {
        debug!(sink = self.name, command = %command, "Recorded command.");
        let mut commands = self.commands.lock();
        if commands.len() == RECORDED_COMMANDS {
            commands.pop_front();
        }
        commands.push_back(command);
    }
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
