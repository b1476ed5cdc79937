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

pub mod clock;
pub mod cpal;
pub mod engine;
pub mod error;
pub mod format;
pub mod mock;
pub mod pool;
pub mod thread_priority;

pub use clock::GlobalClock;
pub use engine::{EngineConfig, EngineState, StreamEngine};
pub use error::{StartupError, SubmitError};
pub use format::{SampleClip, SampleFormat, TargetFormat};
pub use pool::{BlockLayout, BlockPool, BlockState, SubmittedBlock};

/// Called by a backend once a submitted block has finished playing. Runs on
/// the backend's own thread, so it must only do bookkeeping.
pub type CompletionHandler = Arc<dyn Fn(SubmittedBlock) + Send + Sync>;

/// A source of output devices.
pub trait Host: Send + Sync {
    /// Names of the output devices currently available, in preference order.
    fn output_devices(&self) -> Result<Vec<String>, StartupError>;

    /// Opens a mono output stream on the named device. Blocks submitted to the
    /// stream are read from `pool`, and `on_complete` is invoked exactly once for
    /// each of them after it has been played.
    fn open(
        &self,
        device: &str,
        format: &TargetFormat,
        pool: Arc<BlockPool>,
        on_complete: CompletionHandler,
    ) -> Result<Box<dyn OutputStream>, StartupError>;
}

/// An open device stream. Dropping it closes the device.
pub trait OutputStream: Send {
    /// Queues a filled block for playback. Must not block.
    fn submit(&mut self, block: SubmittedBlock) -> Result<(), SubmitError>;
}

/// Gets the host for the given device name. Names starting with "mock" select
/// the in-process mock host.
pub fn get_host(device: Option<&str>) -> Arc<dyn Host> {
    match device {
        Some(device) if device.starts_with("mock") => Arc::new(mock::Host::new(vec![device.into()])),
        _ => Arc::new(cpal::Host::new()),
    }
}

/// Lists the output devices known to cpal.
pub fn list_devices() -> Result<Vec<String>, StartupError> {
    cpal::Host::new().output_devices()
}
