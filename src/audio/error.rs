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

/// Failures that keep a session from starting. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("No audio output device available")]
    NoOutputDevice,

    #[error("No audio output device found with name {0}")]
    DeviceNotFound(String),

    #[error("Unable to list audio devices: {0}")]
    Enumeration(String),

    #[error("Unable to open audio device: {0}")]
    DeviceOpen(String),

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("Unable to allocate audio blocks: {0}")]
    Allocation(String),
}

/// A filled block the device refused. Playback continues without it.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Device rejected block: {0}")]
    Rejected(String),

    #[error("Device stream is no longer running")]
    Disconnected,
}
