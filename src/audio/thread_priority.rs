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

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Used when KEYSYNTH_THREAD_PRIORITY is unset or invalid.
const DEFAULT_GENERATION_THREAD_PRIORITY: u8 = 70;

/// How the generation thread should be scheduled. Read from the environment
/// before the thread is spawned.
#[derive(Debug, Clone, Copy)]
pub struct AudioThreadPriority {
    priority: u8,
    realtime: bool,
}

impl AudioThreadPriority {
    pub fn from_env() -> AudioThreadPriority {
        AudioThreadPriority {
            priority: generation_thread_priority(),
            realtime: rt_audio_enabled(),
        }
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn realtime(&self) -> bool {
        self.realtime
    }

    /// Applies the priority to the calling thread. Failures are logged and
    /// otherwise ignored: synthesis still works at normal priority.
    pub fn apply_to_current_thread(&self) {
        let value = match ThreadPriorityValue::try_from(self.priority) {
            Ok(value) => value,
            Err(e) => {
                warn!(priority = self.priority, error = ?e, "Invalid thread priority");
                return;
            }
        };
        let tp = ThreadPriority::Crossplatform(value);
        if let Err(e) = set_current_thread_priority(tp) {
            warn!(error = ?e, "Failed to raise generation thread priority");
        }

        #[cfg(unix)]
        if self.realtime {
            use thread_priority::unix::{
                set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
                ThreadSchedulePolicy,
            };
            match set_thread_priority_and_policy(
                thread_native_id(),
                tp,
                ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
            ) {
                Ok(()) => info!("Enabled RT SCHED_FIFO for generation thread"),
                Err(e) => warn!(error = %e, "Failed to set RT SCHED_FIFO for generation thread"),
            }
        }
    }
}

/// Reads KEYSYNTH_THREAD_PRIORITY (0-99).
fn generation_thread_priority() -> u8 {
    std::env::var("KEYSYNTH_THREAD_PRIORITY")
        .ok()
        .and_then(|v| v.parse::<u8>().ok())
        .filter(|n| *n < 100)
        .unwrap_or(DEFAULT_GENERATION_THREAD_PRIORITY)
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| {
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

/// SCHED_FIFO is attempted unless KEYSYNTH_DISABLE_RT_AUDIO is set.
fn rt_audio_enabled() -> bool {
    !env_flag("KEYSYNTH_DISABLE_RT_AUDIO")
}
