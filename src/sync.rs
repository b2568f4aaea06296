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
    sync::{
        atomic::{AtomicUsize, Ordering},
        OnceLock,
    },
    thread::{self, Thread},
};

/// A counting semaphore with a single waiter. Posting never blocks and never
/// allocates, so the realtime thread may post to wake the worker.
pub struct Semaphore {
    /// The number of outstanding posts.
    permits: AtomicUsize,
    /// The thread that waits on this semaphore, registered on first wait.
    waiter: OnceLock<Thread>,
}

impl Semaphore {
    pub fn new() -> Semaphore {
        Semaphore {
            permits: AtomicUsize::new(0),
            waiter: OnceLock::new(),
        }
    }

    /// Adds a permit and wakes the waiter if one is registered.
    pub fn post(&self) {
        self.permits.fetch_add(1, Ordering::Release);
        if let Some(waiter) = self.waiter.get() {
            waiter.unpark();
        }
    }

    /// Takes a permit if one is available.
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.load(Ordering::Acquire);
        while permits > 0 {
            match self.permits.compare_exchange_weak(
                permits,
                permits - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => permits = actual,
            }
        }
        false
    }

    /// Blocks until a permit is available and takes it. Only one thread may
    /// ever wait on a given semaphore.
    pub fn wait(&self) {
        self.register();
        while !self.try_acquire() {
            thread::park();
        }
    }

    /// The number of permits currently available.
    pub fn permits(&self) -> usize {
        self.permits.load(Ordering::Acquire)
    }

    fn register(&self) {
        let waiter = self.waiter.get_or_init(thread::current);
        debug_assert_eq!(
            waiter.id(),
            thread::current().id(),
            "semaphore waited on from more than one thread"
        );
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Semaphore::new()
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn test_post_before_wait() {
        let semaphore = Semaphore::new();
        semaphore.post();
        semaphore.post();
        assert_eq!(2, semaphore.permits());

        semaphore.wait();
        semaphore.wait();
        assert_eq!(0, semaphore.permits());
        assert!(!semaphore.try_acquire());
    }

    #[test]
    fn test_wakes_waiter_on_another_thread() {
        let semaphore = Arc::new(Semaphore::new());
        let join = {
            let semaphore = semaphore.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    semaphore.wait();
                }
            })
        };

        for _ in 0..100 {
            semaphore.post();
        }

        assert!(join.join().is_ok());
        assert_eq!(0, semaphore.permits());
    }
}
