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
//! The day-long sample schedule and its lookups.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::bank::{Bank, BANK_COUNT, STOP};

mod generator;

pub use generator::{generate, generate_with_retry};

/// The number of minutes in the cyclic schedule.
pub const DAY_MINUTES: u64 = 1440;

/// Samples are triggered this many minutes before they are meant to be heard.
pub const PRE_ROLL: u16 = 4;

/// Fills start this many minutes before the pre-rolled transition.
pub const FILL_LEAD: u16 = 16;

/// The musical transitions in day-minutes, in the order they are played: midday, early evening,
/// late evening and three pre-dawn slots.
pub const TRANSITIONS: [u16; ANCHOR_COUNT] = [720, 1104, 1232, 1360, 48, 176];

/// The number of anchors, which is also the length of the sample order.
pub const ANCHOR_COUNT: usize = 6;

/// The day-minute of a timestep.
pub fn day_minute(timestep: u64) -> u16 {
    (timestep % DAY_MINUTES) as u16
}

/// The day-minute at which the given transition is triggered.
pub fn anchor(transition: usize) -> u16 {
    TRANSITIONS[transition] - PRE_ROLL
}

/// The day-minute at which the fill before the given transition starts.
pub fn fill(transition: usize) -> u16 {
    anchor(transition) - FILL_LEAD
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("anchor {anchor} has no sample assigned")]
    EmptyAnchor { anchor: u16 },

    #[error("row at minute {minute} has an invalid sample {sample} for bank {bank}")]
    InvalidSample { minute: u16, bank: Bank, sample: u8 },

    #[error("no row at minute {minute}")]
    MissingRow { minute: u16 },

    #[error("bank {bank} appears more than once in the sample order")]
    DuplicateOrder { bank: Bank },

    #[error("gave up generating a schedule after {attempts} attempts: {last}")]
    Exhausted {
        attempts: usize,
        last: Box<ScheduleError>,
    },
}

/// The active sample of every bank at one point in the day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Row([u8; BANK_COUNT]);

impl Row {
    pub fn new(samples: [u8; BANK_COUNT]) -> Row {
        Row(samples)
    }

    /// A row with every bank stopped.
    pub fn stopped() -> Row {
        Row([STOP; BANK_COUNT])
    }

    pub fn sample(&self, bank: Bank) -> u8 {
        self.0[bank.index()]
    }

    pub fn set(&mut self, bank: Bank, sample: u8) {
        self.0[bank.index()] = sample;
    }

    /// Iterates over every bank and its sample.
    pub fn iter(&self) -> impl Iterator<Item = (Bank, u8)> + '_ {
        self.0
            .iter()
            .enumerate()
            .map(|(index, sample)| (Bank::from_index(index), *sample))
    }

    /// The banks whose sample differs between this row and the other.
    pub fn changed_banks<'a>(&'a self, other: &'a Row) -> impl Iterator<Item = Bank> + 'a {
        Bank::all().filter(move |bank| self.sample(*bank) != other.sample(*bank))
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let samples = self
            .0
            .iter()
            .map(|sample| sample.to_string())
            .collect::<Vec<String>>();
        write!(f, "{}", samples.join(" "))
    }
}

/// The banks in the order they first receive a sample, one per anchor. The first two are shared by
/// every speaker; the remaining four can be addressed by sensors or individual speakers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleOrder([Bank; ANCHOR_COUNT]);

impl SampleOrder {
    pub fn new(banks: [Bank; ANCHOR_COUNT]) -> SampleOrder {
        SampleOrder(banks)
    }

    /// The banks played through every speaker.
    pub fn shared(&self) -> &[Bank] {
        &self.0[..2]
    }

    /// The banks that sensors or individual speakers take over.
    pub fn sensor_addressable(&self) -> &[Bank] {
        &self.0[2..]
    }

    pub fn contains(&self, bank: Bank) -> bool {
        self.0.contains(&bank)
    }

    pub fn banks(&self) -> &[Bank] {
        &self.0
    }
}

impl fmt::Display for SampleOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let banks = self
            .0
            .iter()
            .map(|bank| bank.to_string())
            .collect::<Vec<String>>();
        write!(f, "[{}]", banks.join(", "))
    }
}

/// A day of sample changes keyed by day-minute. Looking up a minute returns the most recent row at
/// or before it; the row at minute 0 repeats the last row of the day so every minute resolves.
#[derive(Clone, Debug)]
pub struct Schedule {
    rows: BTreeMap<u16, Row>,
    order: SampleOrder,
}

impl Schedule {
    /// Creates a schedule from its rows. The rows are validated.
    pub fn new(rows: BTreeMap<u16, Row>, order: SampleOrder) -> Result<Schedule, ScheduleError> {
        let schedule = Schedule { rows, order };
        schedule.validate()?;
        Ok(schedule)
    }

    /// The row in effect at the given day-minute.
    pub fn row_at(&self, minute: u16) -> &Row {
        match self.rows.range(..=minute).next_back() {
            Some((_, row)) => row,
            None => panic!("schedule has no row at or before minute {}", minute),
        }
    }

    /// The row in effect at the given timestep.
    pub fn row_at_timestep(&self, timestep: u64) -> &Row {
        self.row_at(day_minute(timestep))
    }

    pub fn order(&self) -> &SampleOrder {
        &self.order
    }

    /// Iterates over the rows in day-minute order.
    pub fn rows(&self) -> impl Iterator<Item = (u16, &Row)> {
        self.rows.iter().map(|(minute, row)| (*minute, row))
    }

    /// The row stored exactly at the given minute, if any.
    pub fn row(&self, minute: u16) -> Option<&Row> {
        self.rows.get(&minute)
    }

    fn validate(&self) -> Result<(), ScheduleError> {
        if !self.rows.contains_key(&0) {
            return Err(ScheduleError::MissingRow { minute: 0 });
        }
        for transition in 0..ANCHOR_COUNT {
            let minute = anchor(transition);
            if !self.rows.contains_key(&minute) {
                return Err(ScheduleError::MissingRow { minute });
            }
        }
        for (minute, row) in self.rows() {
            if let Some((bank, sample)) = row.iter().find(|(_, sample)| *sample > STOP) {
                return Err(ScheduleError::InvalidSample {
                    minute,
                    bank,
                    sample,
                });
            }
        }

        let mut seen = HashSet::new();
        for bank in self.order.banks() {
            if !seen.insert(*bank) {
                return Err(ScheduleError::DuplicateOrder { bank: *bank });
            }
        }
        Ok(())
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (minute, row) in self.rows() {
            writeln!(f, "{:>4} | {}", minute, row)?;
        }
        write!(f, "order: {}", self.order)
    }
}
