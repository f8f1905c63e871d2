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
//! Generative playback for a sound installation: a daily schedule of sample changes, ambient light
//! driven bus gains and presence sensors, all played through MIDI-controlled sample players.

pub mod assignment;
pub mod bank;
pub mod clock;
pub mod config;
pub mod control;
pub mod engine;
pub mod light;
pub mod schedule;
