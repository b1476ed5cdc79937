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
use keysynth::audio::{self, thread_priority::AudioThreadPriority};
use keysynth::config;
use keysynth::controller::{keyboard, Controller};
use keysynth::session::AudioSession;
use tracing::{error, info};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A polyphonic keyboard synthesizer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Plays notes typed on the terminal until "quit" or the end of input.
    Play {
        /// The path to the synthesizer config.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// The device name to play through. Overrides the config.
        #[arg(short, long)]
        device: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Play { config, device } => {
            let mut synth = match config {
                Some(path) => config::Synth::deserialize(&path)?,
                None => config::Synth::default(),
            };
            if let Some(device) = device {
                synth.audio_mut().set_device(&device);
            }

            let engine_config = synth.engine_config(Some(AudioThreadPriority::from_env()))?;
            let host = audio::get_host(engine_config.device.as_deref());
            let session = Arc::new(AudioSession::new(host, engine_config, synth.waveform()));
            session.start()?;
            info!(
                device = session.device_name().unwrap_or_default(),
                waveform = %session.waveform(),
                "Playing."
            );

            let controller = Controller::new(session.clone(), Arc::new(keyboard::Driver::new()));
            if controller.join().is_err() {
                error!("Controller panicked");
            }

            session.stop();
            info!(elapsed = session.elapsed(), "Stopped.");
        }
    }

    Ok(())
}
