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
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::assignment::{SENSOR_ADDRESSABLE_BANKS, SENSOR_COUNT};
use crate::engine::{Mode, Settings};

const DEFAULT_TICKS: u32 = 6;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2);
const DEFAULT_NOTE_LENGTH: Duration = Duration::from_secs(1);
const DEFAULT_REGENERATION_ATTEMPTS: usize = 3;

/// A YAML representation of an installation.
#[derive(Deserialize, Clone, Debug)]
pub struct Installation {
    /// The MIDI output port the sample players listen on.
    midi_output: String,

    /// The MIDI input port providing beat clock.
    clock_input: Option<String>,

    /// MIDI clock ticks per timestep (default: 6).
    ticks_per_timestep: Option<u32>,

    /// A JSON file of per-minute direct beam readings. Relative paths are resolved against the
    /// directory of the config file.
    light_table: Option<PathBuf>,

    /// Whether presence sensors are installed (default: false).
    sensors: Option<bool>,

    /// The timestep to start from (default: 0).
    start_timestep: Option<u64>,

    /// How often the engine polls its inputs (default: 2ms).
    poll_interval: Option<String>,

    /// How long notes are held before they are released (default: 1s).
    note_length: Option<String>,

    /// The number of banks the sensors can claim. Must match the number of sensors.
    sensor_addressable_banks: Option<usize>,

    /// How many times to try generating a schedule (default: 3).
    regeneration_attempts: Option<usize>,

    #[serde(skip)]
    base_path: Option<PathBuf>,
}

impl Installation {
    /// Creates an installation configuration with defaults for everything but the output.
    pub fn new(midi_output: &str) -> Installation {
        Installation {
            midi_output: midi_output.to_string(),
            clock_input: None,
            ticks_per_timestep: None,
            light_table: None,
            sensors: None,
            start_timestep: None,
            poll_interval: None,
            note_length: None,
            sensor_addressable_banks: None,
            regeneration_attempts: None,
            base_path: None,
        }
    }

    /// Parse and validate an installation from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Installation, ConfigError> {
        let mut installation = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Installation>()?;
        installation.base_path = path.parent().map(Path::to_path_buf);
        installation.validate()?;
        Ok(installation)
    }

    /// Checks the values that can't be expressed in the YAML types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.midi_output.is_empty() {
            return Err(ConfigError::Invalid("midi_output must not be empty".into()));
        }
        if self.ticks_per_timestep == Some(0) {
            return Err(ConfigError::Invalid(
                "ticks_per_timestep must be at least 1".into(),
            ));
        }
        if self.regeneration_attempts == Some(0) {
            return Err(ConfigError::Invalid(
                "regeneration_attempts must be at least 1".into(),
            ));
        }
        let banks = self.sensor_addressable_banks();
        if banks != SENSOR_COUNT {
            return Err(ConfigError::Invalid(format!(
                "sensor_addressable_banks is {} but there are {} sensors",
                banks, SENSOR_COUNT
            )));
        }
        self.poll_interval()?;
        self.note_length()?;
        Ok(())
    }

    pub fn midi_output(&self) -> &str {
        &self.midi_output
    }

    pub fn clock_input(&self) -> Option<&str> {
        self.clock_input.as_deref()
    }

    pub fn ticks_per_timestep(&self) -> u32 {
        self.ticks_per_timestep.unwrap_or(DEFAULT_TICKS)
    }

    /// The light table path, resolved against the config file's directory.
    pub fn light_table(&self) -> Option<PathBuf> {
        let path = self.light_table.as_ref()?;
        match &self.base_path {
            Some(base) if path.is_relative() => Some(base.join(path)),
            _ => Some(path.clone()),
        }
    }

    pub fn sensors(&self) -> bool {
        self.sensors.unwrap_or(false)
    }

    pub fn start_timestep(&self) -> u64 {
        self.start_timestep.unwrap_or(0)
    }

    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        parse_duration("poll_interval", &self.poll_interval, DEFAULT_POLL_INTERVAL)
    }

    pub fn note_length(&self) -> Result<Duration, ConfigError> {
        parse_duration("note_length", &self.note_length, DEFAULT_NOTE_LENGTH)
    }

    pub fn sensor_addressable_banks(&self) -> usize {
        self.sensor_addressable_banks
            .unwrap_or(SENSOR_ADDRESSABLE_BANKS)
    }

    pub fn regeneration_attempts(&self) -> usize {
        self.regeneration_attempts
            .unwrap_or(DEFAULT_REGENERATION_ATTEMPTS)
    }

    /// The engine settings for this installation.
    pub fn settings(&self) -> Settings {
        Settings {
            mode: if self.sensors() {
                Mode::Sensors
            } else {
                Mode::Automatic
            },
            sensor_addressable_banks: self.sensor_addressable_banks(),
            regeneration_attempts: self.regeneration_attempts(),
        }
    }
}

fn parse_duration(
    field: &'static str,
    value: &Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => DurationString::from_string(value.clone())
            .map(Duration::from)
            .map_err(|e| ConfigError::Duration {
                field,
                value: value.clone(),
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod test {
    use std::{fs, path::PathBuf, time::Duration};

    use tempfile::TempDir;

    use super::*;

    fn write(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("installation.yaml");
        fs::write(&path, contents).expect("unable to write config");
        path
    }

    #[test]
    fn defaults() -> Result<(), ConfigError> {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        let installation = Installation::deserialize(&write(&dir, "midi_output: UM-ONE\n"))?;

        assert_eq!("UM-ONE", installation.midi_output());
        assert_eq!(None, installation.clock_input());
        assert_eq!(6, installation.ticks_per_timestep());
        assert_eq!(None, installation.light_table());
        assert!(!installation.sensors());
        assert_eq!(0, installation.start_timestep());
        assert_eq!(Duration::from_millis(2), installation.poll_interval()?);
        assert_eq!(Duration::from_secs(1), installation.note_length()?);
        assert_eq!(4, installation.sensor_addressable_banks());
        assert_eq!(3, installation.regeneration_attempts());

        let settings = installation.settings();
        assert_eq!(Mode::Automatic, settings.mode);
        assert_eq!(3, settings.regeneration_attempts);
        Ok(())
    }

    #[test]
    fn full() -> Result<(), ConfigError> {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        let installation = Installation::deserialize(&write(
            &dir,
            r#"
midi_output: Sampler
clock_input: Clock
ticks_per_timestep: 24
light_table: light.json
sensors: true
start_timestep: 700
poll_interval: 10ms
note_length: 500ms
sensor_addressable_banks: 4
regeneration_attempts: 5
"#,
        ))?;

        assert_eq!(Some("Clock"), installation.clock_input());
        assert_eq!(24, installation.ticks_per_timestep());
        assert_eq!(
            Some(dir.path().join("light.json")),
            installation.light_table()
        );
        assert_eq!(700, installation.start_timestep());
        assert_eq!(Duration::from_millis(10), installation.poll_interval()?);
        assert_eq!(Duration::from_millis(500), installation.note_length()?);

        let settings = installation.settings();
        assert_eq!(Mode::Sensors, settings.mode);
        assert_eq!(5, settings.regeneration_attempts);
        assert_eq!(4, settings.sensor_addressable_banks);
        Ok(())
    }

    #[test]
    fn absolute_light_table() -> Result<(), ConfigError> {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        let installation = Installation::deserialize(&write(
            &dir,
            "midi_output: Sampler\nlight_table: /var/lib/light.json\n",
        ))?;
        assert_eq!(
            Some(PathBuf::from("/var/lib/light.json")),
            installation.light_table()
        );
        Ok(())
    }

    #[test]
    fn bank_count_must_match_sensors() {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        let path = write(&dir, "midi_output: Out\nsensor_addressable_banks: 3\n");
        let result = Installation::deserialize(&path);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn bad_durations() {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        let path = write(&dir, "midi_output: Out\nnote_length: forever\n");
        match Installation::deserialize(&path) {
            Err(ConfigError::Duration { field, .. }) => assert_eq!("note_length", field),
            _ => panic!("expected a duration error"),
        }
    }

    #[test]
    fn zero_ticks() {
        let mut installation = Installation::new("Sampler");
        assert!(installation.validate().is_ok());

        installation.ticks_per_timestep = Some(0);
        assert!(matches!(installation.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_output() {
        let dir = tempfile::tempdir().expect("unable to create temp dir");
        let result = Installation::deserialize(&write(&dir, "sensors: true\n"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
