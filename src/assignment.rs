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
use tracing::{debug, info};

use crate::bank::Bank;
use crate::schedule::SampleOrder;

/// The number of presence sensors in the installation.
pub const SENSOR_COUNT: usize = 4;

/// The default number of music banks sensors can take over. Each sensor must be able to claim its
/// own bank.
pub const SENSOR_ADDRESSABLE_BANKS: usize = 4;

/// Tracks which sensor-addressable music bank each sensor has claimed. A bank is held by at most
/// one sensor, and a sensor keeps its bank until it is released or the assignment is reset.
#[derive(Debug)]
pub struct ResourceAssignment {
    /// How many of the order's sensor-addressable banks can be claimed.
    count: usize,
    /// The claimable banks, in the order they are handed out.
    banks: Vec<Bank>,
    /// The index into banks claimed by each sensor.
    claims: [Option<usize>; SENSOR_COUNT],
}

impl ResourceAssignment {
    /// Creates an assignment over the first `count` sensor-addressable banks of the given order.
    pub fn new(order: &SampleOrder, count: usize) -> ResourceAssignment {
        ResourceAssignment {
            count,
            banks: ResourceAssignment::banks(order, count),
            claims: [None; SENSOR_COUNT],
        }
    }

    fn banks(order: &SampleOrder, count: usize) -> Vec<Bank> {
        let banks = order.sensor_addressable();
        banks[..count.min(banks.len())].to_vec()
    }

    /// Claims a bank for the sensor. A sensor that already holds a bank keeps it; otherwise it gets
    /// the first bank nobody holds. Returns None if every bank is claimed.
    pub fn assign(&mut self, sensor: usize) -> Option<Bank> {
        if let Some(bank) = self.assigned(sensor) {
            return Some(bank);
        }

        let free = (0..self.banks.len()).find(|slot| !self.claims.contains(&Some(*slot)))?;
        self.claims[sensor] = Some(free);

        let bank = self.banks[free];
        info!(sensor, bank = %bank, "Assigned sensor to music bank.");
        Some(bank)
    }

    /// The bank currently held by the sensor.
    pub fn assigned(&self, sensor: usize) -> Option<Bank> {
        self.claims[sensor].map(|slot| self.banks[slot])
    }

    /// Releases the sensor's bank so another sensor may claim it.
    ///
    /// The playback engine never calls this: a sensor that switches off only mutes its bank and
    /// keeps the claim until the schedule is regenerated.
    pub fn release(&mut self, sensor: usize) {
        if let Some(slot) = self.claims[sensor].take() {
            debug!(sensor, bank = %self.banks[slot], "Released music bank.");
        }
    }

    /// Drops every claim and hands out the sensor-addressable banks of a new order.
    pub fn reset(&mut self, order: &SampleOrder) {
        self.banks = ResourceAssignment::banks(order, self.count);
        self.claims = [None; SENSOR_COUNT];
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;

    fn order() -> SampleOrder {
        SampleOrder::new([9, 10, 2, 6, 0, 5].map(Bank::from_index))
    }

    #[test]
    fn assigns_lowest_free_bank() {
        let mut assignment = ResourceAssignment::new(&order(), SENSOR_ADDRESSABLE_BANKS);
        assert_eq!(Some(Bank::from_index(2)), assignment.assign(3));
        assert_eq!(Some(Bank::from_index(6)), assignment.assign(1));
        assert_eq!(Some(Bank::from_index(2)), assignment.assigned(3));
        assert_eq!(None, assignment.assigned(0));
    }

    #[test]
    fn reassigning_keeps_the_bank() {
        let mut assignment = ResourceAssignment::new(&order(), SENSOR_ADDRESSABLE_BANKS);
        assert_eq!(Some(Bank::from_index(2)), assignment.assign(0));
        assert_eq!(Some(Bank::from_index(2)), assignment.assign(0));
        assert_eq!(Some(Bank::from_index(6)), assignment.assign(2));
    }

    #[test]
    fn banks_are_never_shared() {
        let mut assignment = ResourceAssignment::new(&order(), SENSOR_ADDRESSABLE_BANKS);
        let banks = (0..SENSOR_COUNT)
            .map(|sensor| assignment.assign(sensor).expect("bank available"))
            .collect::<HashSet<Bank>>();
        assert_eq!(SENSOR_COUNT, banks.len());
        for bank in &banks {
            assert!(order().sensor_addressable().contains(bank));
        }
    }

    #[test]
    fn last_sensor_gets_the_last_bank() {
        let mut assignment = ResourceAssignment::new(&order(), SENSOR_ADDRESSABLE_BANKS);
        for sensor in 0..SENSOR_COUNT - 1 {
            assignment.assign(sensor);
        }
        assert_eq!(Some(Bank::from_index(5)), assignment.assign(3));
    }

    #[test]
    fn release_frees_the_bank() {
        let mut assignment = ResourceAssignment::new(&order(), SENSOR_ADDRESSABLE_BANKS);
        assert_eq!(Some(Bank::from_index(2)), assignment.assign(0));
        assignment.release(0);
        assert_eq!(None, assignment.assigned(0));
        assert_eq!(Some(Bank::from_index(2)), assignment.assign(1));
    }

    #[test]
    fn reset_clears_claims_and_takes_the_new_order() {
        let mut assignment = ResourceAssignment::new(&order(), SENSOR_ADDRESSABLE_BANKS);
        assignment.assign(0);
        assignment.assign(1);

        let new_order = SampleOrder::new([0, 1, 4, 5, 6, 7].map(Bank::from_index));
        assignment.reset(&new_order);
        assert_eq!(None, assignment.assigned(0));
        assert_eq!(None, assignment.assigned(1));
        assert_eq!(Some(Bank::from_index(4)), assignment.assign(1));
    }

    #[test]
    fn fewer_banks_than_sensors() {
        let mut assignment = ResourceAssignment::new(&order(), 2);
        assert_eq!(Some(Bank::from_index(2)), assignment.assign(0));
        assert_eq!(Some(Bank::from_index(6)), assignment.assign(1));
        assert_eq!(None, assignment.assign(2));

        let new_order = SampleOrder::new([0, 1, 4, 5, 6, 7].map(Bank::from_index));
        assignment.reset(&new_order);
        assert_eq!(Some(Bank::from_index(4)), assignment.assign(2));
        assert_eq!(Some(Bank::from_index(5)), assignment.assign(3));
        assert_eq!(None, assignment.assign(0));
    }
}
