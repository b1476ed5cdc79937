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
use std::{sync::Arc, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{error, info};

use super::{
    BlockPool, CompletionHandler, OutputStream, SampleFormat, StartupError, SubmitError,
    SubmittedBlock, TargetFormat,
};

/// Output devices from every cpal host available on this machine.
#[derive(Default)]
pub struct Host {}

impl Host {
    pub fn new() -> Host {
        Host {}
    }

    /// Finds output devices across all hosts. The first entry is the default
    /// output device of the default host, if there is one.
    fn list_cpal_devices() -> Result<Vec<(String, cpal::Device)>, StartupError> {
        // Suppress noisy backend output while probing.
        let _shh_stdout = shh::stdout().ok();
        let _shh_stderr = shh::stderr().ok();

        let mut devices: Vec<(String, cpal::Device)> = Vec::new();
        if let Some(device) = cpal::default_host().default_output_device() {
            if let Some(name) = device_name(&device) {
                devices.push((name, device));
            }
        }

        for host_id in cpal::available_hosts() {
            let host =
                cpal::host_from_id(host_id).map_err(|e| StartupError::Enumeration(e.to_string()))?;
            let host_devices = match host.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let supports_output = device
                    .supported_output_configs()
                    .map(|mut configs| configs.next().is_some())
                    .unwrap_or(false);
                if !supports_output {
                    continue;
                }
                let Some(name) = device_name(&device) else {
                    continue;
                };
                if devices.iter().any(|(existing, _)| *existing == name) {
                    continue;
                }
                devices.push((name, device));
            }
        }

        Ok(devices)
    }
}

fn device_name(device: &cpal::Device) -> Option<String> {
    device
        .description()
        .ok()
        .map(|description| description.name().trim().to_string())
}

impl super::Host for Host {
    fn output_devices(&self) -> Result<Vec<String>, StartupError> {
        Ok(Host::list_cpal_devices()?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    fn open(
        &self,
        device_name: &str,
        format: &TargetFormat,
        pool: Arc<BlockPool>,
        on_complete: CompletionHandler,
    ) -> Result<Box<dyn OutputStream>, StartupError> {
        let device = Host::list_cpal_devices()?
            .into_iter()
            .find(|(name, _)| name == device_name)
            .map(|(_, device)| device)
            .ok_or_else(|| StartupError::DeviceNotFound(device_name.to_string()))?;

        // At most every block in the pool can be queued at once.
        let (block_tx, block_rx) = crossbeam_channel::bounded(pool.block_count());
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);

        let format = format.clone();
        let reader = BlockReader {
            pool,
            blocks: block_rx,
            on_complete,
            current: None,
            offset: 0,
        };

        // The cpal stream is created and kept on its own thread, since it isn't
        // Send on every platform.
        let output_thread = thread::spawn(move || {
            let stream = match build_stream(&device, &format, reader) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(StartupError::DeviceOpen(e.to_string())));
                return;
            }
            info!(format = %format, "CPAL output stream started successfully");
            let _ = ready_tx.send(Ok(()));

            // Keep the stream alive until the sender is dropped.
            let _ = shutdown_rx.recv();
            drop(stream);
            info!("CPAL output stream closed");
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(Stream {
                blocks: block_tx,
                shutdown: Some(shutdown_tx),
                output_thread: Some(output_thread),
            })),
            Ok(Err(e)) => {
                let _ = output_thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = output_thread.join();
                Err(StartupError::DeviceOpen(
                    "output thread exited before the stream started".into(),
                ))
            }
        }
    }
}

fn build_stream(
    device: &cpal::Device,
    format: &TargetFormat,
    mut reader: BlockReader,
) -> Result<cpal::Stream, StartupError> {
    let config = cpal::StreamConfig {
        channels: TargetFormat::CHANNELS,
        sample_rate: format.sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };
    let on_error = |err: cpal::StreamError| error!("CPAL output stream error: {}", err);

    let stream = match (format.sample_format, format.bits_per_sample) {
        (SampleFormat::Float, _) => device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| reader.fill(data),
            on_error,
            None,
        ),
        (SampleFormat::Int, 16) => device.build_output_stream(
            &config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| reader.fill(data),
            on_error,
            None,
        ),
        (SampleFormat::Int, 32) => device.build_output_stream(
            &config,
            move |data: &mut [i32], _: &cpal::OutputCallbackInfo| reader.fill(data),
            on_error,
            None,
        ),
        (sample_format, bits) => {
            return Err(StartupError::UnsupportedFormat(format!(
                "{} samples with {} bits",
                sample_format, bits
            )))
        }
    };

    stream.map_err(|e| StartupError::DeviceOpen(e.to_string()))
}

/// Copies submitted blocks into the device buffer from inside the cpal
/// callback, reporting each block once its last sample has been handed over.
struct BlockReader {
    pool: Arc<BlockPool>,
    blocks: Receiver<SubmittedBlock>,
    on_complete: CompletionHandler,
    current: Option<SubmittedBlock>,
    offset: usize,
}

impl BlockReader {
    fn fill<T>(&mut self, data: &mut [T])
    where
        T: cpal::Sample + cpal::FromSample<i32>,
    {
        let mut written = 0;
        while written < data.len() {
            let ticket = match self.current {
                Some(ticket) => ticket,
                None => match self.blocks.try_recv() {
                    Ok(ticket) => {
                        self.current = Some(ticket);
                        self.offset = 0;
                        ticket
                    }
                    // Underrun: nothing queued.
                    Err(_) => break,
                },
            };

            let offset = self.offset;
            let out = &mut data[written..];
            let copied = self.pool.read_submitted(ticket, |samples| {
                let count = (samples.len() - offset).min(out.len());
                for (dst, &src) in out.iter_mut().zip(&samples[offset..offset + count]) {
                    *dst = T::from_sample(src);
                }
                (count, offset + count == samples.len())
            });

            match copied {
                Some((count, finished)) => {
                    written += count;
                    self.offset += count;
                    if finished {
                        self.current = None;
                        (self.on_complete)(ticket);
                    }
                }
                None => self.current = None,
            }
        }

        data[written..].fill(T::EQUILIBRIUM);
    }
}

struct Stream {
    blocks: Sender<SubmittedBlock>,
    shutdown: Option<Sender<()>>,
    output_thread: Option<thread::JoinHandle<()>>,
}

impl OutputStream for Stream {
    fn submit(&mut self, block: SubmittedBlock) -> Result<(), SubmitError> {
        self.blocks.try_send(block).map_err(|e| match e {
            TrySendError::Full(_) => SubmitError::Rejected("device queue is full".into()),
            TrySendError::Disconnected(_) => SubmitError::Disconnected,
        })
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        drop(self.shutdown.take());
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::audio::BlockLayout;

    use super::*;

    fn reader_with_blocks(
        blocks: &[&[i32]],
    ) -> (BlockReader, Arc<BlockPool>, Arc<AtomicUsize>) {
        let pool = Arc::new(BlockPool::allocate(BlockLayout::new(4, 4)).unwrap());
        let (tx, rx) = crossbeam_channel::bounded(4);
        for samples in blocks {
            let mut filling = pool.acquire_next();
            filling.samples_mut().copy_from_slice(samples);
            tx.send(pool.mark_submitted(filling)).unwrap();
        }

        let completed = Arc::new(AtomicUsize::new(0));
        let on_complete: CompletionHandler = {
            let pool = pool.clone();
            let completed = completed.clone();
            Arc::new(move |ticket| {
                pool.release(ticket);
                completed.fetch_add(1, Ordering::SeqCst);
            })
        };

        let reader = BlockReader {
            pool: pool.clone(),
            blocks: rx,
            on_complete,
            current: None,
            offset: 0,
        };
        (reader, pool, completed)
    }

    #[test]
    fn test_fill_across_blocks() {
        let (mut reader, pool, completed) = reader_with_blocks(&[&[1, 2, 3, 4], &[5, 6, 7, 8]]);

        let mut data = [0i32; 6];
        reader.fill(&mut data[..]);
        assert_eq!(data, [1, 2, 3, 4, 5, 6]);
        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.free_blocks(), 3);

        let mut data = [0i32; 2];
        reader.fill(&mut data[..]);
        assert_eq!(data, [7, 8]);
        assert_eq!(completed.load(Ordering::SeqCst), 2);
        assert_eq!(pool.free_blocks(), 4);
    }

    #[test]
    fn test_fill_underrun_is_silent() {
        let (mut reader, _pool, completed) = reader_with_blocks(&[&[9, 9, 9, 9]]);

        let mut data = [1i32; 7];
        reader.fill(&mut data[..]);
        assert_eq!(data, [9, 9, 9, 9, 0, 0, 0]);
        assert_eq!(completed.load(Ordering::SeqCst), 1);

        let mut data = [1.0f32; 3];
        reader.fill(&mut data[..]);
        assert_eq!(data, [0.0; 3]);
    }

    #[test]
    fn test_fill_converts_to_float() {
        let (mut reader, _pool, _completed) = reader_with_blocks(&[&[i32::MAX, 0, i32::MIN, 0]]);

        let mut data = [0.0f32; 4];
        reader.fill(&mut data[..]);
        assert!((data[0] - 1.0).abs() < 1e-6);
        assert_eq!(data[1], 0.0);
        assert_eq!(data[2], -1.0);
    }
}
