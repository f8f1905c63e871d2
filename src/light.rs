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
use std::{error::Error, fs, path::Path};

use tracing::{info, warn};

/// A source of ambient light readings.
pub trait AmbientLight: std::marker::Send + std::marker::Sync {
    /// The normalized direct beam intensity for the given timestep, between 0 and 1.
    fn direct_beam(&self, timestep: u64) -> f64;
}

/// Per-minute direct beam readings indexed by timestep. Timesteps past the end of the table wrap.
pub struct LightTable {
    direct_beam: Vec<f64>,
}

impl LightTable {
    pub fn new(direct_beam: Vec<f64>) -> LightTable {
        LightTable { direct_beam }
    }

    /// A table that is always dark.
    pub fn dark() -> LightTable {
        LightTable::new(Vec::new())
    }

    /// Loads a table from a JSON array of readings.
    pub fn load(path: &Path) -> Result<LightTable, Box<dyn Error>> {
        let direct_beam: Vec<f64> = serde_json::from_str(&fs::read_to_string(path)?)
            .map_err(|e| format!("error parsing light table {}: {}", path.display(), e))?;
        info!(
            path = path.display().to_string(),
            minutes = direct_beam.len(),
            "Loaded light table."
        );
        Ok(LightTable::new(direct_beam))
    }

    pub fn len(&self) -> usize {
        self.direct_beam.len()
    }

    pub fn is_empty(&self) -> bool {
        self.direct_beam.is_empty()
    }
}

impl AmbientLight for LightTable {
    fn direct_beam(&self, timestep: u64) -> f64 {
        if self.direct_beam.is_empty() {
            return 0.0;
        }

        let index = (timestep % self.direct_beam.len() as u64) as usize;
        let value = self.direct_beam[index];
        if !(0.0..=1.0).contains(&value) {
            warn!(timestep, value, "Direct beam reading out of range.");
            if value.is_nan() {
                return 0.0;
            }
        }
        value.clamp(0.0, 1.0)
    }
}
