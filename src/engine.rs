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
//! The playback engine. Each time the observed timestep advances, the engine works out what the
//! sample players should be doing and emits only the commands that change something.

use std::{sync::Arc, thread, time::Duration};

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info, span, warn, Level, Span};

use crate::assignment::{ResourceAssignment, SENSOR_ADDRESSABLE_BANKS, SENSOR_COUNT};
use crate::bank::{Bank, Bus, Channel, Speaker, SHARED_AMBIENT_BANK, SOLO_GAIN};
use crate::clock::Inputs;
use crate::control::ControlSink;
use crate::light::AmbientLight;
use crate::schedule::{self, day_minute, Schedule, ScheduleError, DAY_MINUTES};

use self::state::{ambient_volume, PlaybackState, AMBIENT_VARIANTS, BUS_GAIN};

mod routing;
mod state;

/// The note on the return channel that starts playback.
pub const START_NOTE: u8 = 100;

/// The velocity of every note the engine plays.
pub const VELOCITY: u8 = 64;

/// The day-minute just before the midday transition's pre-roll when the schedule is regenerated.
pub const REGENERATION_MINUTE: u16 = 720 - 4 - 4;

/// The day-minute just before midnight when a new ambient variant is chosen.
pub const VARIANT_MINUTE: u16 = DAY_MINUTES as u16 - 4 - 4;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no music bank left for sensor {sensor}")]
    BanksExhausted { sensor: usize },

    #[error("{banks} sensor-addressable banks for {sensors} sensors")]
    BankCount { banks: usize, sensors: usize },

    #[error("unable to generate a schedule: {0}")]
    Schedule(#[from] ScheduleError),
}

/// Whether presence sensors drive the per-speaker banks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// No sensors: every per-speaker bank plays on its own speaker.
    Automatic,
    /// Sensors switch their speaker's banks on and off.
    Sensors,
}

/// What the engine saw on one poll of the shared inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Observation {
    pub timestep: u64,
    /// The sensor flags, or None if there is no reading.
    pub sensors: Option<[bool; SENSOR_COUNT]>,
}

/// Engine settings.
#[derive(Clone, Copy, Debug)]
pub struct Settings {
    pub mode: Mode,
    /// How many sensor-addressable banks the sensors can claim. Must equal the number of sensors.
    pub sensor_addressable_banks: usize,
    /// How many times to try generating a schedule before giving up.
    pub regeneration_attempts: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            mode: Mode::Automatic,
            sensor_addressable_banks: SENSOR_ADDRESSABLE_BANKS,
            regeneration_attempts: 3,
        }
    }
}

/// Drives the sample players from the schedule, the ambient light and the sensors.
pub struct PlaybackEngine {
    sink: Arc<dyn ControlSink>,
    light: Arc<dyn AmbientLight>,
    settings: Settings,
    rng: StdRng,
    schedule: Schedule,
    assignment: ResourceAssignment,
    state: PlaybackState,
    span: Span,
}

impl PlaybackEngine {
    /// Creates an engine with a freshly generated schedule.
    pub fn new(
        sink: Arc<dyn ControlSink>,
        light: Arc<dyn AmbientLight>,
        settings: Settings,
        mut rng: StdRng,
    ) -> Result<PlaybackEngine, EngineError> {
        if settings.sensor_addressable_banks != SENSOR_COUNT {
            return Err(EngineError::BankCount {
                banks: settings.sensor_addressable_banks,
                sensors: SENSOR_COUNT,
            });
        }

        let schedule = schedule::generate_with_retry(&mut rng, settings.regeneration_attempts)?;
        let banks = settings.sensor_addressable_banks;
        let assignment = ResourceAssignment::new(schedule.order(), banks);
        let state = PlaybackState::new(rng.gen_range(0..AMBIENT_VARIANTS));

        Ok(PlaybackEngine {
            sink,
            light,
            settings,
            rng,
            schedule,
            assignment,
            state,
            span: span!(Level::INFO, "playback engine"),
        })
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Starts playback and sets up the default routing and bus gains for the given timestep.
    pub fn initialize(&mut self, timestep: u64) {
        let _enter = self.span.clone().entered();
        info!(
            timestep,
            mode = ?self.settings.mode,
            order = %self.schedule.order(),
            "Starting playback."
        );

        self.sink
            .trigger_note(Channel::Return, START_NOTE, VELOCITY);
        self.route_music();
        self.route_ambient();

        let volume = ambient_volume(self.light.direct_beam(timestep));
        if let Some(volume) = self.state.volume_change(volume) {
            self.set_bus_gains(volume);
        }
    }

    /// Processes one observation. Nothing is emitted unless the timestep has advanced since the
    /// last observation processed.
    pub fn update(&mut self, observation: &Observation) -> Result<(), EngineError> {
        let timestep = observation.timestep;
        if !self.state.advanced(timestep) {
            return Ok(());
        }

        let _enter = self.span.clone().entered();
        let minute = day_minute(timestep);
        debug!(timestep, minute, "Timestep advanced.");

        let volume = ambient_volume(self.light.direct_beam(timestep));

        if self.settings.mode == Mode::Sensors {
            match observation.sensors {
                Some(flags) => self.process_sensors(flags)?,
                None => self.fall_back_to_automatic(timestep),
            }
        }

        if let Some(variant) = self.state.pending_variant() {
            self.broadcast_variant(variant);
        }

        if let Some(volume) = self.state.volume_change(volume) {
            self.set_bus_gains(volume);
        }

        for (bank, sample) in self.state.sample_changes(self.schedule.row_at(minute)) {
            info!(bank = %bank, sample, "Triggering sample.");
            self.sink
                .trigger_note(Channel::Music, bank.note(sample), VELOCITY);
        }

        if self.state.reached(timestep, REGENERATION_MINUTE) {
            self.regenerate()?;
        }

        if self.state.reached(timestep, VARIANT_MINUTE) {
            let variant = self.state.choose_variant(&mut self.rng);
            info!(variant, "Chose a new ambient variant.");
        }

        self.state.processed(timestep);
        Ok(())
    }

    /// Polls the shared inputs until an error occurs.
    pub fn run(mut self, inputs: &Inputs, poll_interval: Duration) -> Result<(), EngineError> {
        self.initialize(inputs.timestep());
        loop {
            self.update(&inputs.observe())?;
            thread::sleep(poll_interval);
        }
    }

    fn process_sensors(&mut self, flags: [bool; SENSOR_COUNT]) -> Result<(), EngineError> {
        for (sensor, active) in self.state.sensor_changes(flags) {
            if active {
                self.activate(sensor)?;
            } else {
                self.deactivate(sensor);
            }
        }
        Ok(())
    }

    /// Without sensor readings the per-speaker banks play on their own speakers for the rest of
    /// the run.
    fn fall_back_to_automatic(&mut self, timestep: u64) {
        warn!(timestep, "No sensor reading, switching to automatic mode.");
        self.settings.mode = Mode::Automatic;
        self.state.forget_sensors();
        self.route_music();
        self.route_ambient();
    }

    fn activate(&mut self, sensor: usize) -> Result<(), EngineError> {
        info!(sensor, "Sensor on.");
        let sink = self.sink.as_ref();
        match self.assignment.assigned(sensor) {
            Some(bank) => routing::gain(sink, Channel::Music, bank, SOLO_GAIN),
            None => {
                let bank = self
                    .assignment
                    .assign(sensor)
                    .ok_or(EngineError::BanksExhausted { sensor })?;
                routing::solo_speaker(sink, Channel::Music, bank, Speaker::new(sensor));
            }
        }

        routing::gain(
            sink,
            Channel::Ambient,
            Bank::ambient_for_sensor(sensor),
            SOLO_GAIN,
        );
        Ok(())
    }

    fn deactivate(&mut self, sensor: usize) {
        info!(sensor, "Sensor off.");
        let sink = self.sink.as_ref();
        if let Some(bank) = self.assignment.assigned(sensor) {
            routing::gain(sink, Channel::Music, bank, 0);
        }
        routing::gain(sink, Channel::Ambient, Bank::ambient_for_sensor(sensor), 0);
    }

    fn broadcast_variant(&self, variant: u8) {
        info!(variant, "Switching ambient variant.");
        for bank in Bank::ambient() {
            self.sink
                .trigger_note(Channel::Ambient, bank.note(variant), VELOCITY);
        }
    }

    fn set_bus_gains(&self, ambient: u8) {
        debug!(ambient, music = BUS_GAIN - ambient, "Setting bus gains.");
        for control in Bus::Ambient.controls() {
            self.sink.set_control(Channel::Return, control, ambient);
        }
        for control in Bus::Music.controls() {
            self.sink
                .set_control(Channel::Return, control, BUS_GAIN - ambient);
        }
    }

    fn regenerate(&mut self) -> Result<(), EngineError> {
        self.schedule =
            schedule::generate_with_retry(&mut self.rng, self.settings.regeneration_attempts)?;
        info!(order = %self.schedule.order(), "Regenerated schedule.");

        self.assignment.reset(self.schedule.order());
        self.state.forget_sensors();
        self.route_music();
        Ok(())
    }

    /// The shared banks play everywhere. The sensor-addressable banks take a speaker each, or wait
    /// for a sensor. Every other bank is off.
    fn route_music(&self) {
        let sink = self.sink.as_ref();
        let order = self.schedule.order();
        for bank in order.shared() {
            routing::all_speakers(sink, Channel::Music, *bank);
        }
        for (speaker, bank) in order.sensor_addressable().iter().enumerate() {
            match self.settings.mode {
                Mode::Automatic => {
                    routing::solo_speaker(sink, Channel::Music, *bank, Speaker::new(speaker))
                }
                Mode::Sensors => routing::all_off(sink, Channel::Music, *bank),
            }
        }
        for bank in Bank::all().filter(|bank| !order.contains(*bank)) {
            routing::all_off(sink, Channel::Music, bank);
        }
    }

    fn route_ambient(&self) {
        let sink = self.sink.as_ref();
        routing::all_speakers(sink, Channel::Ambient, SHARED_AMBIENT_BANK);
        for (speaker, bank) in Bank::ambient()
            .filter(|bank| *bank != SHARED_AMBIENT_BANK)
            .enumerate()
        {
            match self.settings.mode {
                Mode::Automatic => {
                    routing::solo_speaker(sink, Channel::Ambient, bank, Speaker::new(speaker))
                }
                Mode::Sensors => routing::all_off(sink, Channel::Ambient, bank),
            }
        }
    }

    #[cfg(test)]
    fn assignment(&self) -> &ResourceAssignment {
        &self.assignment
    }

    #[cfg(test)]
    fn state(&self) -> &PlaybackState {
        &self.state
    }
}
