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
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{
    audio::{EngineConfig, EngineState, GlobalClock, Host, StartupError, StreamEngine},
    synth::{KeyId, Synthesizer, Waveform},
};

/// The entry point for a shell: routes key and waveform events into the
/// synthesizer and owns the engine's lifecycle.
///
/// Every method is safe to call from any thread. Only `start` and `stop` touch
/// the engine lock; key and waveform events never wait on the generation thread.
pub struct AudioSession {
    host: Arc<dyn Host>,
    synth: Arc<Synthesizer>,
    clock: Arc<GlobalClock>,
    state: Arc<Mutex<EngineState>>,
    engine: Mutex<StreamEngine>,
}

impl AudioSession {
    pub fn new(host: Arc<dyn Host>, config: EngineConfig, waveform: Waveform) -> AudioSession {
        let synth = Arc::new(Synthesizer::new(waveform));
        let engine = StreamEngine::new(host.clone(), config, synth.clone());
        AudioSession {
            host,
            synth,
            clock: engine.clock(),
            state: engine.shared_state(),
            engine: Mutex::new(engine),
        }
    }

    /// Opens the output device and begins streaming from silence.
    pub fn start(&self) -> Result<(), StartupError> {
        let mut engine = self.engine.lock();
        if engine.state() != EngineState::Running {
            // A key event racing a previous stop may have slipped a note in.
            self.synth.notes().clear();
        }
        engine.start()
    }

    /// Alias for `start`.
    pub fn initialize(&self) -> Result<(), StartupError> {
        self.start()
    }

    /// Stops streaming and releases every held note. Does nothing when already
    /// stopped.
    pub fn stop(&self) {
        self.engine.lock().stop();
        self.synth.notes().clear();
    }

    /// Alias for `stop`.
    pub fn shutdown(&self) {
        self.stop();
    }

    /// Starts the note mapped to `key`. Ignored unless the engine is running.
    pub fn key_down(&self, key: KeyId) {
        if !self.is_running() {
            debug!(key, state = %self.state(), "Ignoring key down");
            return;
        }
        self.synth.notes().note_on(key);
    }

    /// Stops the note mapped to `key`. Ignored unless the engine is running.
    pub fn key_up(&self, key: KeyId) {
        if !self.is_running() {
            debug!(key, state = %self.state(), "Ignoring key up");
            return;
        }
        self.synth.notes().note_off(key);
    }

    /// Selects the waveform for every note, including notes already held. The
    /// selection is kept while stopped.
    pub fn select_waveform(&self, waveform: Waveform) {
        self.synth.select_waveform(waveform);
    }

    pub fn waveform(&self) -> Waveform {
        self.synth.waveform()
    }

    /// Keys whose notes are currently sounding, sorted.
    pub fn active_notes(&self) -> Vec<KeyId> {
        self.synth.notes().active_keys()
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock()
    }

    /// Seconds of audio generated since the engine last started.
    pub fn elapsed(&self) -> f64 {
        self.clock.elapsed()
    }

    /// Output devices available on this session's host.
    pub fn list_devices(&self) -> Result<Vec<String>, StartupError> {
        let devices = self.host.output_devices()?;
        info!(count = devices.len(), "Listed output devices.");
        Ok(devices)
    }

    /// The name of the open device, if running.
    pub fn device_name(&self) -> Option<String> {
        self.engine.lock().device_name().map(str::to_string)
    }

    fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }
}
