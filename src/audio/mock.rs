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
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use parking_lot::Mutex;
use tracing::{info, span, Level};

use super::{
    BlockPool, CompletionHandler, OutputStream, StartupError, SubmitError, SubmittedBlock,
    TargetFormat,
};

/// Upper bound on recorded output so a long-running mock can't grow forever.
const MAX_RECORDED_SAMPLES: usize = 1 << 22;

/// When the mock device finishes playing submitted blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// A playback thread completes one block per block duration.
    Realtime,
    /// Blocks complete only when `Host::complete_next` is called.
    Manual,
}

#[derive(Default)]
struct State {
    pool: Option<Arc<BlockPool>>,
    on_complete: Option<CompletionHandler>,
    pending: VecDeque<SubmittedBlock>,
    played: Vec<i32>,
    submitted: usize,
    completed: usize,
    reject_submits: usize,
    opened: usize,
    open: bool,
}

/// A mock host with a fixed device list. Doesn't produce any sound; played
/// samples are recorded for inspection.
#[derive(Clone)]
pub struct Host {
    devices: Vec<String>,
    completion: Completion,
    fail_open: bool,
    state: Arc<Mutex<State>>,
}

impl Host {
    /// A host with the given devices, completing blocks in real time.
    pub fn new(devices: Vec<String>) -> Host {
        Host {
            devices,
            completion: Completion::Realtime,
            fail_open: false,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// A host whose blocks only complete when told to.
    pub fn manual(devices: Vec<String>) -> Host {
        Host {
            completion: Completion::Manual,
            ..Host::new(devices)
        }
    }

    /// Makes every `open` call fail.
    pub fn failing_open(mut self) -> Host {
        self.fail_open = true;
        self
    }

    /// Rejects the next `count` submitted blocks.
    pub fn reject_next_submits(&self, count: usize) {
        self.state.lock().reject_submits = count;
    }

    /// Plays the oldest submitted block and reports its completion. Returns
    /// false if nothing was queued.
    pub fn complete_next(&self) -> bool {
        complete_next(&self.state)
    }

    /// Blocks accepted by the device.
    pub fn submitted(&self) -> usize {
        self.state.lock().submitted
    }

    /// Blocks played and reported back.
    pub fn completed(&self) -> usize {
        self.state.lock().completed
    }

    /// Blocks accepted but not yet played.
    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Everything played so far, in order.
    pub fn played(&self) -> Vec<i32> {
        self.state.lock().played.clone()
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// How many streams have been opened on this host.
    pub fn opened(&self) -> usize {
        self.state.lock().opened
    }
}

fn complete_next(state: &Mutex<State>) -> bool {
    let (ticket, pool, on_complete) = {
        let mut state = state.lock();
        let Some(ticket) = state.pending.pop_front() else {
            return false;
        };
        let (Some(pool), Some(on_complete)) = (state.pool.clone(), state.on_complete.clone())
        else {
            return false;
        };
        (ticket, pool, on_complete)
    };

    if let Some(samples) = pool.read_submitted(ticket, |samples| samples.to_vec()) {
        let mut state = state.lock();
        let room = MAX_RECORDED_SAMPLES.saturating_sub(state.played.len());
        let take = room.min(samples.len());
        state.played.extend_from_slice(&samples[..take]);
        state.completed += 1;
    }

    on_complete(ticket);
    true
}

impl super::Host for Host {
    fn output_devices(&self) -> Result<Vec<String>, StartupError> {
        Ok(self.devices.clone())
    }

    fn open(
        &self,
        device: &str,
        format: &TargetFormat,
        pool: Arc<BlockPool>,
        on_complete: CompletionHandler,
    ) -> Result<Box<dyn OutputStream>, StartupError> {
        if self.fail_open {
            return Err(StartupError::DeviceOpen(format!("{} (Mock)", device)));
        }
        if !self.devices.iter().any(|name| name == device) {
            return Err(StartupError::DeviceNotFound(device.to_string()));
        }

        let block_duration = pool.layout().block_duration(format.sample_rate);
        {
            let mut state = self.state.lock();
            state.pool = Some(pool);
            state.on_complete = Some(on_complete);
            state.pending.clear();
            state.open = true;
            state.opened += 1;
        }
        info!(device, format = %format, "Opened mock output stream.");

        let stop = Arc::new(AtomicBool::new(false));
        let playback_thread = match self.completion {
            Completion::Manual => None,
            Completion::Realtime => {
                let state = self.state.clone();
                let stop = stop.clone();
                Some(thread::spawn(move || {
                    let span = span!(Level::DEBUG, "mock playback");
                    let _enter = span.enter();
                    while !stop.load(Ordering::Acquire) {
                        thread::sleep(block_duration);
                        complete_next(&state);
                    }
                }))
            }
        };

        Ok(Box::new(Stream {
            state: self.state.clone(),
            stop,
            playback_thread,
        }))
    }
}

struct Stream {
    state: Arc<Mutex<State>>,
    stop: Arc<AtomicBool>,
    playback_thread: Option<thread::JoinHandle<()>>,
}

impl OutputStream for Stream {
    fn submit(&mut self, block: SubmittedBlock) -> Result<(), SubmitError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(SubmitError::Disconnected);
        }
        if state.reject_submits > 0 {
            state.reject_submits -= 1;
            return Err(SubmitError::Rejected("mock rejection".into()));
        }
        state.pending.push_back(block);
        state.submitted += 1;
        Ok(())
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.playback_thread.take() {
            let _ = thread.join();
        }

        let mut state = self.state.lock();
        state.open = false;
        state.pending.clear();
        state.pool = None;
        state.on_complete = None;
    }
}

#[cfg(test)]
mod test {
    use crate::audio::{BlockLayout, Host as _};

    use super::*;

    fn open_manual(host: &Host) -> (Arc<BlockPool>, Box<dyn OutputStream>) {
        let pool = Arc::new(BlockPool::allocate(BlockLayout::new(2, 3)).unwrap());
        let on_complete: CompletionHandler = {
            let pool = pool.clone();
            Arc::new(move |ticket| {
                pool.release(ticket);
            })
        };
        let stream = host
            .open("mock", &TargetFormat::default(), pool.clone(), on_complete)
            .unwrap();
        (pool, stream)
    }

    #[test]
    fn test_output_devices() {
        let host = Host::new(vec!["mock-a".into(), "mock-b".into()]);
        assert_eq!(host.output_devices().unwrap(), vec!["mock-a", "mock-b"]);
        assert!(Host::new(vec![]).output_devices().unwrap().is_empty());
    }

    #[test]
    fn test_open_errors() {
        let host = Host::manual(vec!["mock".into()]);
        let pool = Arc::new(BlockPool::allocate(BlockLayout::default()).unwrap());
        let on_complete: CompletionHandler = Arc::new(|_| {});

        let result = host.open("other", &TargetFormat::default(), pool.clone(), on_complete.clone());
        assert!(matches!(result, Err(StartupError::DeviceNotFound(_))));

        let failing = host.clone().failing_open();
        let result = failing.open("mock", &TargetFormat::default(), pool, on_complete);
        assert!(matches!(result, Err(StartupError::DeviceOpen(_))));
        assert_eq!(host.opened(), 0);
    }

    #[test]
    fn test_manual_completion() {
        let host = Host::manual(vec!["mock".into()]);
        let (pool, mut stream) = open_manual(&host);
        assert!(host.is_open());

        let mut filling = pool.acquire_next();
        filling.samples_mut().copy_from_slice(&[1, 2, 3]);
        let ticket = pool.mark_submitted(filling);
        stream.submit(ticket).unwrap();
        assert_eq!(host.submitted(), 1);
        assert_eq!(pool.free_blocks(), 1);

        assert!(host.complete_next());
        assert!(!host.complete_next());
        assert_eq!(host.completed(), 1);
        assert_eq!(host.played(), vec![1, 2, 3]);
        assert_eq!(pool.free_blocks(), 2);

        drop(stream);
        assert!(!host.is_open());
    }

    #[test]
    fn test_rejected_submit() {
        let host = Host::manual(vec!["mock".into()]);
        let (pool, mut stream) = open_manual(&host);
        host.reject_next_submits(1);

        let ticket = pool.mark_submitted(pool.acquire_next());
        assert!(matches!(
            stream.submit(ticket),
            Err(SubmitError::Rejected(_))
        ));
        assert_eq!(host.submitted(), 0);
        assert!(stream.submit(ticket).is_ok());
    }
}
