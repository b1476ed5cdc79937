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

//! The block-streaming engine.
//!
//! A single generation thread fills free blocks in ring order and submits them
//! to the output stream. It only ever blocks waiting for a free block; the
//! stream's completion handler releases played blocks and wakes it.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{error, info, span, warn, Level};

use super::{
    thread_priority::AudioThreadPriority, BlockLayout, BlockPool, CompletionHandler, GlobalClock,
    Host, OutputStream, SampleClip, StartupError, SubmitError, SubmittedBlock, TargetFormat,
};
use crate::synth::Synthesizer;

/// Lifecycle of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            EngineState::Stopped => "stopped",
            EngineState::Starting => "starting",
            EngineState::Running => "running",
            EngineState::Stopping => "stopping",
        };
        write!(f, "{}", state)
    }
}

/// Construction-time settings. Nothing here can change while running.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Output device name. The first available device is used when unset.
    pub device: Option<String>,
    /// Output format.
    pub format: TargetFormat,
    /// Number and size of blocks.
    pub layout: BlockLayout,
    /// Scheduling for the generation thread. Left at the OS default when unset.
    pub thread_priority: Option<AudioThreadPriority>,
}

/// Resources that only exist while the engine is running.
struct Generation {
    device: String,
    pool: Arc<BlockPool>,
    /// Hands the output stream back when the thread exits so it is closed
    /// after generation has stopped.
    thread: thread::JoinHandle<Box<dyn OutputStream>>,
}

pub struct StreamEngine {
    host: Arc<dyn Host>,
    config: EngineConfig,
    synth: Arc<Synthesizer>,
    clock: Arc<GlobalClock>,
    state: Arc<Mutex<EngineState>>,
    running: Arc<AtomicBool>,
    blocks_submitted: Arc<AtomicU64>,
    submit_failures: Arc<AtomicU64>,
    generation: Option<Generation>,
}

impl StreamEngine {
    pub fn new(host: Arc<dyn Host>, config: EngineConfig, synth: Arc<Synthesizer>) -> Self {
        let clock = Arc::new(GlobalClock::new(config.format.sample_rate));
        StreamEngine {
            host,
            config,
            synth,
            clock,
            state: Arc::new(Mutex::new(EngineState::Stopped)),
            running: Arc::new(AtomicBool::new(false)),
            blocks_submitted: Arc::new(AtomicU64::new(0)),
            submit_failures: Arc::new(AtomicU64::new(0)),
            generation: None,
        }
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock()
    }

    /// A handle for observing the state without access to the engine.
    pub(crate) fn shared_state(&self) -> Arc<Mutex<EngineState>> {
        self.state.clone()
    }

    pub fn clock(&self) -> Arc<GlobalClock> {
        self.clock.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The device currently open, if running.
    pub fn device_name(&self) -> Option<&str> {
        self.generation
            .as_ref()
            .map(|generation| generation.device.as_str())
    }

    /// Blocks accepted by the device since the engine was created.
    pub fn blocks_submitted(&self) -> u64 {
        self.blocks_submitted.load(Ordering::Relaxed)
    }

    /// Blocks the device refused since the engine was created.
    pub fn submit_failures(&self) -> u64 {
        self.submit_failures.load(Ordering::Relaxed)
    }

    /// Opens the device and starts the generation thread. Does nothing if the
    /// engine is already running. On failure the engine is left stopped.
    pub fn start(&mut self) -> Result<(), StartupError> {
        if self.generation.is_some() {
            return Ok(());
        }

        self.set_state(EngineState::Starting);
        match self.open() {
            Ok(generation) => {
                self.generation = Some(generation);
                self.set_state(EngineState::Running);
                Ok(())
            }
            Err(e) => {
                error!(err = %e, "Unable to start audio output");
                self.running.store(false, Ordering::Release);
                self.set_state(EngineState::Stopped);
                Err(e)
            }
        }
    }

    /// Stops the generation thread, then closes the device and frees the
    /// blocks. Safe to call at any time, any number of times.
    ///
    /// # Panics
    ///
    /// Panics if the generation thread panicked.
    pub fn stop(&mut self) {
        let Some(generation) = self.generation.take() else {
            return;
        };

        self.set_state(EngineState::Stopping);
        self.running.store(false, Ordering::Release);
        generation.pool.notify_all();

        let stream = generation
            .thread
            .join()
            .expect("generation thread failed to join");
        drop(stream);
        drop(generation.pool);

        info!(
            device = %generation.device,
            submitted = self.blocks_submitted(),
            failures = self.submit_failures(),
            elapsed = self.clock.elapsed(),
            "Audio output stopped."
        );
        self.set_state(EngineState::Stopped);
    }

    fn set_state(&self, state: EngineState) {
        *self.state.lock() = state;
    }

    fn select_device(&self) -> Result<String, StartupError> {
        let devices = self.host.output_devices()?;
        if devices.is_empty() {
            return Err(StartupError::NoOutputDevice);
        }

        match &self.config.device {
            Some(name) => devices
                .into_iter()
                .find(|device| device.trim() == name.as_str())
                .ok_or_else(|| StartupError::DeviceNotFound(name.clone())),
            None => devices
                .into_iter()
                .next()
                .ok_or(StartupError::NoOutputDevice),
        }
    }

    fn open(&mut self) -> Result<Generation, StartupError> {
        let device = self.select_device()?;
        let pool = Arc::new(BlockPool::allocate(self.config.layout)?);

        let on_complete: CompletionHandler = {
            let pool = pool.clone();
            Arc::new(move |ticket| {
                pool.release(ticket);
            })
        };
        let stream = self
            .host
            .open(&device, &self.config.format, pool.clone(), on_complete)?;
        info!(
            device = %device,
            format = %self.config.format,
            blocks = self.config.layout.block_count,
            block_samples = self.config.layout.block_samples,
            "Opened audio output."
        );

        self.clock.reset();
        self.running.store(true, Ordering::Release);

        let generator = Generator {
            pool: pool.clone(),
            stream,
            synth: self.synth.clone(),
            clock: self.clock.clone(),
            running: self.running.clone(),
            blocks_submitted: self.blocks_submitted.clone(),
            submit_failures: self.submit_failures.clone(),
            thread_priority: self.config.thread_priority,
            block_duration: self.config.layout.block_duration(self.config.format.sample_rate),
        };
        let thread = thread::Builder::new()
            .name("keysynth-generation".into())
            .spawn(move || generator.run())
            .map_err(|e| StartupError::Allocation(format!("generation thread: {}", e)))?;

        Ok(Generation {
            device,
            pool,
            thread,
        })
    }
}

impl Drop for StreamEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the generation thread.
struct Generator {
    pool: Arc<BlockPool>,
    stream: Box<dyn OutputStream>,
    synth: Arc<Synthesizer>,
    clock: Arc<GlobalClock>,
    running: Arc<AtomicBool>,
    blocks_submitted: Arc<AtomicU64>,
    submit_failures: Arc<AtomicU64>,
    thread_priority: Option<AudioThreadPriority>,
    block_duration: Duration,
}

impl Generator {
    fn run(mut self) -> Box<dyn OutputStream> {
        let span = span!(Level::INFO, "generation thread");
        let _enter = span.enter();

        if let Some(priority) = self.thread_priority {
            priority.apply_to_current_thread();
        }
        info!("Generation thread started.");

        loop {
            if !self.pool.wait_for_free(&self.running) {
                break;
            }
            if !self.running.load(Ordering::Acquire) {
                break;
            }

            let ticket = self.fill_next();
            if !self.submit(ticket) {
                // The block was released straight away, so hold off for as long
                // as it would have played to avoid spinning on a failing device.
                thread::sleep(self.block_duration);
            }
        }

        info!(samples = self.clock.samples(), "Generation thread exiting.");
        self.stream
    }

    /// Synthesizes the next block in ring order. Notes and waveform are read
    /// once per block.
    fn fill_next(&self) -> SubmittedBlock {
        let mut block = self.pool.acquire_next();
        let frame = self.synth.frame();
        for sample in block.samples_mut() {
            let time = self.clock.advance();
            *sample = SampleClip::new(frame.sample(time)).to_sample::<i32>();
        }
        self.pool.mark_submitted(block)
    }

    /// Hands a block to the device. A block the device refuses is released
    /// straight back to the pool and the device plays a gap instead. Returns
    /// false if the block was refused.
    fn submit(&mut self, ticket: SubmittedBlock) -> bool {
        match self.stream.submit(ticket) {
            Ok(()) => {
                self.blocks_submitted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                let failures = self.submit_failures.fetch_add(1, Ordering::Relaxed) + 1;
                match e {
                    SubmitError::Disconnected => error!(
                        block = ticket.index(),
                        failures,
                        err = %e,
                        "Dropped audio block"
                    ),
                    SubmitError::Rejected(_) => warn!(
                        block = ticket.index(),
                        failures,
                        err = %e,
                        "Dropped audio block"
                    ),
                }
                self.pool.release(ticket);
                false
            }
        }
    }
}
