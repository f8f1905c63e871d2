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
//! Shared inputs written by external producers and read by the playback engine: the timestep
//! advanced by the beat clock, the tempo estimate and the presence sensor flags.

use std::{
    error::Error,
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

use midir::{MidiInput, MidiInputConnection};
use midly::live::{LiveEvent, SystemRealtime};
use tracing::{debug, info, span, Level};

use crate::assignment::SENSOR_COUNT;
use crate::engine::Observation;

/// The presence sensor flags. Only an external sensor reader writes them, never the binary.
#[derive(Default)]
pub struct SensorFlags {
    flags: [AtomicBool; SENSOR_COUNT],
}

impl SensorFlags {
    pub fn set(&self, sensor: usize, active: bool) {
        self.flags[sensor].store(active, Ordering::Relaxed);
    }

    pub fn get(&self) -> [bool; SENSOR_COUNT] {
        std::array::from_fn(|sensor| self.flags[sensor].load(Ordering::Relaxed))
    }
}

/// Handles to the shared inputs. Cloning shares the same underlying values.
#[derive(Clone)]
pub struct Inputs {
    timestep: Arc<AtomicU64>,
    tempo: Arc<AtomicU32>,
    sensors: Option<Arc<SensorFlags>>,
}

impl Inputs {
    /// Creates inputs starting at the given timestep. Sensor flags only exist if sensors are
    /// installed.
    pub fn new(start_timestep: u64, sensors: bool) -> Inputs {
        Inputs {
            timestep: Arc::new(AtomicU64::new(start_timestep)),
            tempo: Arc::new(AtomicU32::new(0)),
            sensors: sensors.then(|| Arc::new(SensorFlags::default())),
        }
    }

    pub fn timestep(&self) -> u64 {
        self.timestep.load(Ordering::Relaxed)
    }

    /// Advances the timestep by one and returns the new value.
    pub fn advance(&self) -> u64 {
        self.timestep.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The last tempo estimate in beats per minute, or 0 if there is none yet.
    pub fn tempo(&self) -> u32 {
        self.tempo.load(Ordering::Relaxed)
    }

    pub fn set_tempo(&self, tempo: u32) {
        self.tempo.store(tempo, Ordering::Relaxed);
    }

    pub fn sensors(&self) -> Option<&Arc<SensorFlags>> {
        self.sensors.as_ref()
    }

    /// Reads the current values.
    pub fn observe(&self) -> Observation {
        Observation {
            timestep: self.timestep(),
            sensors: self.sensors.as_ref().map(|sensors| sensors.get()),
        }
    }
}

/// Counts MIDI clock ticks into timesteps.
pub struct ClockCounter {
    ticks_per_timestep: u32,
    ticks: u64,
    last_advance: Option<Instant>,
}

impl ClockCounter {
    pub fn new(ticks_per_timestep: u32) -> ClockCounter {
        ClockCounter {
            ticks_per_timestep: ticks_per_timestep.max(1),
            ticks: 0,
            last_advance: None,
        }
    }

    /// Counts a clock tick received at the given instant. Returns None if the timestep stays put,
    /// otherwise the new tempo estimate if one is available.
    pub fn tick(&mut self, now: Instant) -> Option<Option<u32>> {
        let advance = self.ticks % u64::from(self.ticks_per_timestep) == 0;
        self.ticks += 1;
        if !advance {
            return None;
        }

        let tempo = self.last_advance.and_then(|last| {
            let elapsed = now.duration_since(last).as_secs_f64();
            (elapsed > 0.0).then(|| (16.0 / elapsed) as u32)
        });
        self.last_advance = Some(now);
        Some(tempo)
    }
}

/// Keeps the clock input connection open. Dropping it stops listening.
pub struct ClockListener {
    _connection: MidiInputConnection<()>,
}

/// Lists the names of the MIDI input ports.
pub fn list_inputs() -> Result<Vec<String>, Box<dyn Error>> {
    let input = MidiInput::new("creatures input listing")?;
    let mut names = input
        .ports()
        .iter()
        .map(|port| input.port_name(port))
        .collect::<Result<Vec<String>, _>>()?;
    names.sort();
    Ok(names)
}

/// Listens for MIDI clock on the input port whose name contains the given name and advances the
/// shared timestep.
pub fn listen(
    name: &str,
    inputs: Inputs,
    ticks_per_timestep: u32,
) -> Result<ClockListener, Box<dyn Error>> {
    let span = span!(Level::INFO, "clock listener");
    let _enter = span.enter();

    let input = MidiInput::new("creatures clock")?;
    let port = {
        let mut matches = Vec::new();
        for port in input.ports() {
            if input.port_name(&port)?.contains(name) {
                matches.push(port);
            }
        }
        if matches.len() != 1 {
            return Err(format!(
                "expected exactly one MIDI input matching {}, found {}",
                name,
                matches.len()
            )
            .into());
        }
        matches.swap_remove(0)
    };

    let mut counter = ClockCounter::new(ticks_per_timestep);
    let connection = input
        .connect(
            &port,
            "creatures clock watcher",
            move |_, raw_event, _| {
                if let Ok(LiveEvent::Realtime(SystemRealtime::TimingClock)) =
                    LiveEvent::parse(raw_event)
                {
                    if let Some(tempo) = counter.tick(Instant::now()) {
                        let timestep = inputs.advance();
                        if let Some(tempo) = tempo {
                            inputs.set_tempo(tempo);
                        }
                        debug!(timestep, tempo = inputs.tempo(), "Clock advanced.");
                    }
                }
            },
            (),
        )
        .map_err(|e| e.to_string())?;

    info!(device = name, "Ready for MIDI clock.");
    Ok(ClockListener {
        _connection: connection,
    })
}
