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
use rand::seq::IteratorRandom;
use rand::Rng;

use crate::assignment::SENSOR_COUNT;
use crate::bank::{Bank, BANK_COUNT};
use crate::schedule::{Row, DAY_MINUTES};

/// The number of ambient variants to choose from.
pub const AMBIENT_VARIANTS: u8 = 5;

/// The highest gain either bus reaches.
pub const BUS_GAIN: u8 = 95;

/// The ambient bus gain for a direct beam reading.
pub fn ambient_volume(direct_beam: f64) -> u8 {
    (f64::from(BUS_GAIN) * direct_beam.clamp(0.0, 1.0)).round() as u8
}

/// Everything the engine last emitted, so each iteration only emits what changed.
#[derive(Debug)]
pub struct PlaybackState {
    /// The last timestep processed.
    timestep: Option<u64>,
    /// The last sample triggered on each bank.
    samples: [Option<u8>; BANK_COUNT],
    /// The last ambient bus gain written.
    ambient_volume: Option<u8>,
    /// The ambient variant that should be playing.
    ambient_variant: u8,
    /// The ambient variant last broadcast.
    broadcast_variant: Option<u8>,
    /// The last sensor flags processed.
    sensors: Option<[bool; SENSOR_COUNT]>,
}

impl PlaybackState {
    pub fn new(ambient_variant: u8) -> PlaybackState {
        PlaybackState {
            timestep: None,
            samples: [None; BANK_COUNT],
            ambient_volume: None,
            ambient_variant,
            broadcast_variant: None,
            sensors: None,
        }
    }

    /// Returns true if the timestep differs from the last one processed.
    pub fn advanced(&self, timestep: u64) -> bool {
        self.timestep != Some(timestep)
    }

    /// Records the timestep as processed.
    pub fn processed(&mut self, timestep: u64) {
        self.timestep = Some(timestep);
    }

    /// Returns true if the given day-minute was reached on the way from the last timestep processed
    /// to this one. Without a previous timestep only an exact match counts.
    pub fn reached(&self, timestep: u64, minute: u16) -> bool {
        let minute = u64::from(minute);
        match self.timestep {
            None => timestep % DAY_MINUTES == minute,
            Some(last) if timestep <= last => false,
            Some(last) => {
                let next = last + 1;
                let first = next + (minute + DAY_MINUTES - next % DAY_MINUTES) % DAY_MINUTES;
                first <= timestep
            }
        }
    }

    /// Records the ambient gain, returning it if it differs from the last one written.
    pub fn volume_change(&mut self, volume: u8) -> Option<u8> {
        if self.ambient_volume == Some(volume) {
            return None;
        }
        self.ambient_volume = Some(volume);
        Some(volume)
    }

    /// Records the samples of the row, returning each bank whose sample changed.
    pub fn sample_changes(&mut self, row: &Row) -> Vec<(Bank, u8)> {
        let mut changes = Vec::new();
        for (bank, sample) in row.iter() {
            let last = &mut self.samples[bank.index()];
            if *last != Some(sample) {
                *last = Some(sample);
                changes.push((bank, sample));
            }
        }
        changes
    }

    /// Records the sensor flags, returning each sensor whose flag changed. Every sensor counts as
    /// changed on the first reading.
    pub fn sensor_changes(&mut self, flags: [bool; SENSOR_COUNT]) -> Vec<(usize, bool)> {
        let changes = (0..SENSOR_COUNT)
            .filter(|sensor| {
                self.sensors
                    .map_or(true, |last| last[*sensor] != flags[*sensor])
            })
            .map(|sensor| (sensor, flags[sensor]))
            .collect();
        self.sensors = Some(flags);
        changes
    }

    /// Forgets the last sensor flags so every sensor is processed again.
    pub fn forget_sensors(&mut self) {
        self.sensors = None;
    }

    pub fn ambient_variant(&self) -> u8 {
        self.ambient_variant
    }

    /// Returns the ambient variant if it has not been broadcast yet, and marks it broadcast.
    pub fn pending_variant(&mut self) -> Option<u8> {
        if self.broadcast_variant == Some(self.ambient_variant) {
            return None;
        }
        self.broadcast_variant = Some(self.ambient_variant);
        Some(self.ambient_variant)
    }

    /// Picks a new ambient variant different from the current one.
    pub fn choose_variant<R: Rng>(&mut self, rng: &mut R) -> u8 {
        let current = self.ambient_variant;
        if let Some(variant) = (0..AMBIENT_VARIANTS)
            .filter(|variant| *variant != current)
            .choose(rng)
        {
            self.ambient_variant = variant;
        }
        self.ambient_variant
    }
}

#[cfg(test)]
mod test {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::bank::STOP;

    #[test]
    fn volumes() {
        assert_eq!(0, ambient_volume(0.0));
        assert_eq!(10, ambient_volume(0.1));
        assert_eq!(48, ambient_volume(0.5));
        assert_eq!(95, ambient_volume(1.0));
        assert_eq!(95, ambient_volume(3.0));
    }

    #[test]
    fn volume_changes_only_when_different() {
        let mut state = PlaybackState::new(0);
        assert_eq!(Some(10), state.volume_change(10));
        assert_eq!(None, state.volume_change(10));
        assert_eq!(Some(48), state.volume_change(48));
    }

    #[test]
    fn sample_changes() {
        let mut state = PlaybackState::new(0);
        let mut row = Row::stopped();
        assert_eq!(12, state.sample_changes(&row).len());
        assert!(state.sample_changes(&row).is_empty());

        row.set(Bank::from_index(5), 2);
        assert_eq!(vec![(Bank::from_index(5), 2)], state.sample_changes(&row));

        row.set(Bank::from_index(5), STOP);
        row.set(Bank::from_index(0), 6);
        assert_eq!(
            vec![(Bank::from_index(0), 6), (Bank::from_index(5), STOP)],
            state.sample_changes(&row)
        );
    }

    #[test]
    fn sensor_changes() {
        let mut state = PlaybackState::new(0);
        assert_eq!(
            vec![(0, true), (1, false), (2, false), (3, false)],
            state.sensor_changes([true, false, false, false])
        );
        assert!(state.sensor_changes([true, false, false, false]).is_empty());
        assert_eq!(
            vec![(0, false), (3, true)],
            state.sensor_changes([false, false, false, true])
        );

        state.forget_sensors();
        assert_eq!(4, state.sensor_changes([false, false, false, true]).len());
    }

    #[test]
    fn reached_minutes() {
        let mut state = PlaybackState::new(0);
        assert!(state.reached(712, 712));
        assert!(!state.reached(713, 712));

        state.processed(700);
        assert!(!state.reached(700, 712));
        assert!(!state.reached(711, 712));
        assert!(state.reached(712, 712));
        assert!(state.reached(720, 712));

        state.processed(712);
        assert!(!state.reached(713, 712));
        assert!(state.reached(712 + 1440, 712));

        state.processed(1430);
        assert!(state.reached(1440 + 5, 1432));
        assert!(!state.reached(1431, 1432));
    }

    #[test]
    fn variants() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = PlaybackState::new(2);
        assert_eq!(Some(2), state.pending_variant());
        assert_eq!(None, state.pending_variant());

        for _ in 0..50 {
            let previous = state.ambient_variant();
            let variant = state.choose_variant(&mut rng);
            assert_ne!(previous, variant);
            assert!(variant < AMBIENT_VARIANTS);
            assert_eq!(Some(variant), state.pending_variant());
        }
    }
}
