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

/// Priority used for the audio callback and MIDI threads when neither the
/// configuration nor RTSAMPLER_THREAD_PRIORITY set one.
pub const DEFAULT_THREAD_PRIORITY: u8 = 70;

/// Resolves the priority for realtime threads. RTSAMPLER_THREAD_PRIORITY
/// (0-99) wins over the configured value. Read once when streams are built,
/// never from the callback itself.
pub fn thread_priority(configured: Option<u8>) -> ThreadPriority {
    let from_env = std::env::var("RTSAMPLER_THREAD_PRIORITY")
        .ok()
        .and_then(|v| v.parse::<u8>().ok())
        .filter(|n| *n < 100);

    let priority = from_env
        .or(configured.filter(|n| *n < 100))
        .unwrap_or(DEFAULT_THREAD_PRIORITY);
    ThreadPriorityValue::try_from(priority)
        .map(ThreadPriority::Crossplatform)
        .unwrap_or(ThreadPriority::Max)
}

pub(crate) fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| {
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

/// Whether realtime (SCHED_FIFO) scheduling should be attempted. Enabled
/// unless RTSAMPLER_DISABLE_RT_AUDIO is set.
pub fn rt_audio_enabled() -> bool {
    !env_flag("RTSAMPLER_DISABLE_RT_AUDIO")
}

/// Raises the priority of the calling thread once. `priority_set` lives in
/// the callback's closure so later invocations return immediately.
pub fn configure_thread_priority(
    thread: &str,
    priority: ThreadPriority,
    rt_audio: bool,
    priority_set: &mut bool,
) {
    if *priority_set {
        return;
    }
    *priority_set = true;

    if let Err(e) = set_current_thread_priority(priority) {
        warn!(thread, error = ?e, "Unable to raise thread priority.");
    }

    #[cfg(unix)]
    if rt_audio {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        match set_thread_priority_and_policy(
            thread_native_id(),
            priority,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => info!(thread, "Enabled SCHED_FIFO."),
            Err(e) => warn!(thread, error = %e, "Failed to enable SCHED_FIFO."),
        }
    }
    #[cfg(not(unix))]
    let _ = rt_audio;
}
