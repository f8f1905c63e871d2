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
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use creatures::clock::{self, Inputs};
use creatures::config::Installation;
use creatures::control;
use creatures::engine::PlaybackEngine;
use creatures::light::{AmbientLight, LightTable};
use creatures::schedule;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Generative playback for a sound installation."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Starts the installation.
    Start {
        /// The path to the installation configuration.
        config_path: String,
    },
    /// Lists the available MIDI input/output devices.
    MidiDevices {},
    /// Generates and prints a schedule.
    Schedule {
        /// Seed for the generator. A random seed is used if absent.
        #[arg(long)]
        seed: Option<u64>,
        /// How many times to try generating the schedule.
        #[arg(long, default_value_t = 3)]
        attempts: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config_path } => {
            if let Err(e) = start(PathBuf::from(config_path)).await {
                error!(err = %e, "Installation stopped.");
                return Err(e);
            }
        }
        Commands::MidiDevices {} => {
            let outputs = control::list_outputs()?;
            let inputs = clock::list_inputs()?;

            if outputs.is_empty() && inputs.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Outputs:");
            for output in outputs {
                println!("- {}", output);
            }
            println!("Inputs:");
            for input in inputs {
                println!("- {}", input);
            }
        }
        Commands::Schedule { seed, attempts } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            println!("{}", schedule::generate_with_retry(&mut rng, attempts)?);
        }
    }

    Ok(())
}

/// Connects the devices described by the configuration and plays until an error stops the engine.
async fn start(config_path: PathBuf) -> Result<(), Box<dyn Error>> {
    let installation = Installation::deserialize(&config_path)?;

    let sink = control::get_sink(installation.midi_output(), installation.note_length()?)?;
    let light: Arc<dyn AmbientLight> = match installation.light_table() {
        Some(path) => Arc::new(LightTable::load(&path)?),
        None => {
            warn!("No light table configured, the ambient bus stays silent.");
            Arc::new(LightTable::dark())
        }
    };

    let inputs = Inputs::new(installation.start_timestep(), installation.sensors());
    let ticks = installation.ticks_per_timestep();
    let _listener = match installation.clock_input() {
        Some(name) => Some(clock::listen(name, inputs.clone(), ticks)?),
        None => {
            warn!(
                timestep = inputs.timestep(),
                "No clock input configured, the timestep will not advance on its own."
            );
            None
        }
    };

    let settings = installation.settings();
    let engine = PlaybackEngine::new(sink, light, settings, StdRng::from_entropy())?;
    info!(output = installation.midi_output(), "Installation ready.");

    let poll_interval = installation.poll_interval()?;
    let worker = tokio::task::spawn_blocking(move || engine.run(&inputs, poll_interval));
    worker.await??;
    Ok(())
}
