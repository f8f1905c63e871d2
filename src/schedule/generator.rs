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
use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

use super::{anchor, fill, Row, SampleOrder, Schedule, ScheduleError, ANCHOR_COUNT};
use crate::bank::{Bank, BANK_COUNT, STOP};

/// The number of drum loop rows. Every other row holds a keyed music sample.
const DRUM_ROWS: usize = 2;

/// The number of rows kept together at the start of the day, before the rest are played.
const LEADING_ROWS: usize = 2;

/// Drum loops choose from this many samples.
const DRUM_SAMPLES: u8 = 6;

/// The number of keys music samples are recorded in.
const KEYS: u8 = 7;

/// Fill variants live just above the regular drum samples.
const FILL_SAMPLES: std::ops::Range<u8> = 6..8;

/// One unresolved row per anchor. Each row assigns exactly one bank.
type Grid = [[Option<u8>; BANK_COUNT]; ANCHOR_COUNT];

/// Generates a day of sample changes.
///
/// Each anchor switches on one bank: two drum loops with random samples and four music banks that
/// share a single random key. Each row picks one of the two banks it owns at random. The last two
/// rows open the day at midday and early evening; the other four follow in random order. Banks keep
/// their sample until a later anchor replaces it and start out stopped. Before every anchor but the
/// first, a fill swaps each drum loop that keeps playing onto a fill variant.
pub fn generate<R: Rng>(rng: &mut R) -> Result<Schedule, ScheduleError> {
    let grid = populate(rng);
    let grid = arrange(rng, grid);
    let order = sample_order(&grid)?;
    let resolved = forward_fill(&grid);

    let mut rows = BTreeMap::new();
    for (transition, row) in resolved.iter().enumerate() {
        rows.insert(anchor(transition), *row);
    }

    for transition in 1..ANCHOR_COUNT {
        let next = &resolved[transition];
        let mut row = resolved[transition - 1];
        for bank in Bank::all().filter(|bank| bank.is_drum_loop()) {
            if next.sample(bank) != STOP {
                row.set(bank, rng.gen_range(FILL_SAMPLES));
            }
        }
        rows.insert(fill(transition), row);
    }

    // The day wraps, so the latest row is also in effect before the earliest one.
    if let Some((_, last)) = rows.iter().next_back() {
        let last = *last;
        rows.entry(0).or_insert(last);
    }

    let schedule = Schedule::new(rows, order)?;
    debug!(order = %schedule.order(), "Generated schedule.");
    Ok(schedule)
}

/// Generates a schedule, retrying with fresh randomness if a generated schedule is rejected.
pub fn generate_with_retry<R: Rng>(
    rng: &mut R,
    attempts: usize,
) -> Result<Schedule, ScheduleError> {
    retry(attempts, || generate(&mut *rng))
}

fn retry<F>(attempts: usize, mut generate: F) -> Result<Schedule, ScheduleError>
where
    F: FnMut() -> Result<Schedule, ScheduleError>,
{
    let mut last = None;
    for attempt in 1..=attempts.max(1) {
        match generate() {
            Ok(schedule) => return Ok(schedule),
            Err(e) => {
                warn!(attempt, err = %e, "Generated schedule was rejected.");
                last = Some(e);
            }
        }
    }

    Err(ScheduleError::Exhausted {
        attempts: attempts.max(1),
        last: Box::new(last.unwrap_or(ScheduleError::MissingRow { minute: 0 })),
    })
}

/// Assigns a sample to one of the two candidate banks of each row.
fn populate<R: Rng>(rng: &mut R) -> Grid {
    let mut grid: Grid = [[None; BANK_COUNT]; ANCHOR_COUNT];

    for (row, cells) in grid.iter_mut().enumerate().take(DRUM_ROWS) {
        cells[2 * row + rng.gen_range(0..2)] = Some(rng.gen_range(0..DRUM_SAMPLES));
    }

    let key = rng.gen_range(0..KEYS);
    for (row, cells) in grid.iter_mut().enumerate().skip(DRUM_ROWS) {
        cells[2 * row + rng.gen_range(0..2)] = Some(key);
    }

    grid
}

/// Shuffles the leading and trailing rows separately, then puts the trailing rows first.
fn arrange<R: Rng>(rng: &mut R, grid: Grid) -> Grid {
    let split = ANCHOR_COUNT - LEADING_ROWS;
    let mut others = grid[..split].to_vec();
    let mut leading = grid[split..].to_vec();
    others.shuffle(rng);
    leading.shuffle(rng);

    let mut arranged = grid;
    for (slot, row) in arranged.iter_mut().zip(leading.into_iter().chain(others)) {
        *slot = row;
    }
    arranged
}

/// The first assigned bank of each row, in anchor order.
fn sample_order(grid: &Grid) -> Result<SampleOrder, ScheduleError> {
    let mut order = [Bank::from_index(0); ANCHOR_COUNT];
    for (transition, cells) in grid.iter().enumerate() {
        order[transition] = match cells.iter().position(Option::is_some) {
            Some(index) => Bank::from_index(index),
            None => {
                return Err(ScheduleError::EmptyAnchor {
                    anchor: anchor(transition),
                })
            }
        };
    }
    Ok(SampleOrder::new(order))
}

/// Carries every assigned sample forward through the later anchors. Banks without a sample yet
/// are stopped.
fn forward_fill(grid: &Grid) -> [Row; ANCHOR_COUNT] {
    let mut current = [None; BANK_COUNT];
    let mut rows = [Row::stopped(); ANCHOR_COUNT];
    for (cells, row) in grid.iter().zip(rows.iter_mut()) {
        for (index, cell) in cells.iter().enumerate() {
            if cell.is_some() {
                current[index] = *cell;
            }
            row.set(Bank::from_index(index), current[index].unwrap_or(STOP));
        }
    }
    rows
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::schedule::{fill, TRANSITIONS};

    fn schedules() -> impl Iterator<Item = Schedule> {
        (0..200).map(|seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            generate(&mut rng).expect("schedule should generate")
        })
    }

    #[test]
    fn every_anchor_resolves_every_bank() {
        for schedule in schedules() {
            for transition in 0..ANCHOR_COUNT {
                let row = schedule.row(anchor(transition)).expect("anchor row");
                for (_, sample) in row.iter() {
                    assert!(sample <= STOP);
                }
            }
        }
    }

    #[test]
    fn sample_order_has_one_distinct_bank_per_anchor() {
        for schedule in schedules() {
            let order = schedule.order().banks();
            assert_eq!(ANCHOR_COUNT, order.len());
            assert_eq!(ANCHOR_COUNT, order.iter().collect::<HashSet<&Bank>>().len());

            // Each bank in the order starts playing at its own anchor.
            for (transition, bank) in order.iter().enumerate() {
                let row = schedule.row(anchor(transition)).unwrap();
                assert_ne!(STOP, row.sample(*bank));
                if transition > 0 {
                    let previous = schedule.row(anchor(transition - 1)).unwrap();
                    assert_eq!(STOP, previous.sample(*bank));
                }
            }
        }
    }

    #[test]
    fn midday_and_evening_play_the_trailing_rows() {
        // Rows 4 and 5 own banks 80 through 110 and always open the day.
        for schedule in schedules() {
            for bank in &schedule.order().banks()[..2] {
                assert!(bank.index() >= 8, "bank {} opened the day", bank);
            }
            for bank in &schedule.order().banks()[2..] {
                assert!(bank.index() < 8, "bank {} played late", bank);
            }
        }
    }

    #[test]
    fn music_banks_share_a_key() {
        for schedule in schedules() {
            let last = schedule.row(anchor(ANCHOR_COUNT - 1)).unwrap();
            let keys = last
                .iter()
                .filter(|(bank, sample)| !bank.is_drum_loop() && *sample != STOP)
                .map(|(_, sample)| sample)
                .collect::<HashSet<u8>>();
            assert_eq!(1, keys.len());
            assert!(keys.iter().all(|key| *key < KEYS));
        }
    }

    #[test]
    fn samples_carry_forward() {
        for schedule in schedules() {
            for transition in 1..ANCHOR_COUNT {
                let previous = schedule.row(anchor(transition - 1)).unwrap();
                let current = schedule.row(anchor(transition)).unwrap();
                let changed = previous.changed_banks(current).collect::<Vec<Bank>>();
                assert_eq!(vec![schedule.order().banks()[transition]], changed);
            }
        }
    }

    #[test]
    fn fills_only_touch_drum_loops_that_keep_playing() {
        for schedule in schedules() {
            for transition in 1..ANCHOR_COUNT {
                let previous = schedule.row(anchor(transition - 1)).unwrap();
                let next = schedule.row(anchor(transition)).unwrap();
                let row = schedule.row(fill(transition)).expect("fill row");
                for (bank, sample) in row.iter() {
                    if bank.is_drum_loop() && next.sample(bank) != STOP {
                        assert!(FILL_SAMPLES.contains(&sample));
                    } else {
                        assert_eq!(previous.sample(bank), sample);
                    }
                }
            }
        }
    }

    #[test]
    fn no_fill_before_midday() {
        for schedule in schedules() {
            assert!(schedule.row(fill(0)).is_none());
            let rows = schedule.rows().count();
            // Six anchors, five fills and the wrapped row at midnight.
            assert_eq!(ANCHOR_COUNT * 2, rows);
        }
    }

    #[test]
    fn midnight_repeats_the_last_row() {
        for schedule in schedules() {
            let latest = anchor(TRANSITIONS.iter().position(|t| *t == 1360).unwrap());
            assert_eq!(schedule.row(latest), schedule.row(0));
            assert_eq!(schedule.row_at(1439), schedule.row_at(0));
        }
    }

    #[test]
    fn generation_is_deterministic_for_a_seed() {
        let first = generate(&mut StdRng::seed_from_u64(7)).unwrap();
        let second = generate(&mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(first.order(), second.order());
        assert!(first.rows().eq(second.rows()));
    }

    #[test]
    fn retry_recovers_from_rejected_schedules() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut calls = 0;
        let schedule = retry(3, || {
            calls += 1;
            if calls < 3 {
                Err(ScheduleError::EmptyAnchor { anchor: 716 })
            } else {
                generate(&mut rng)
            }
        });
        assert!(schedule.is_ok());
        assert_eq!(3, calls);
    }

    #[test]
    fn retry_gives_up() {
        let mut calls = 0;
        let result = retry(2, || {
            calls += 1;
            Err(ScheduleError::EmptyAnchor { anchor: 716 })
        });
        assert_eq!(2, calls);
        assert_eq!(
            Some(ScheduleError::Exhausted {
                attempts: 2,
                last: Box::new(ScheduleError::EmptyAnchor { anchor: 716 }),
            }),
            result.err()
        );
    }

    #[test]
    fn empty_row_is_rejected() {
        let grid: Grid = [[None; BANK_COUNT]; ANCHOR_COUNT];
        assert_eq!(
            Some(ScheduleError::EmptyAnchor { anchor: 716 }),
            sample_order(&grid).err()
        );
    }
}
