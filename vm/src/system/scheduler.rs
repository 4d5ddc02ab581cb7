//! Periodic tick sources for auto-advancing a simulation.
//!
//! The engine never sleeps or spawns anything itself. It asks a [`Scheduler`]
//! for a single tick after a delay, and the host hands the fired handle back
//! through `Simulator::on_tick`. Cancelling a handle guarantees it will not be
//! delivered.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, warn};

pub type TickHandle = u64;

pub trait Scheduler {
    /// Requests one tick after `delay`
    fn schedule_next(&mut self, delay: Duration) -> TickHandle;

    /// Drops a pending tick. Unknown or already delivered handles are ignored.
    fn cancel(&mut self, handle: TickHandle);
}

/// Ticks only fire when the host says so
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_handle: TickHandle,
    pending: VecDeque<(TickHandle, Duration)>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers the oldest pending tick
    pub fn fire(&mut self) -> Option<TickHandle> {
        self.pending.pop_front().map(|(handle, _)| handle)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_next(&mut self, delay: Duration) -> TickHandle {
        self.next_handle += 1;
        self.pending.push_back((self.next_handle, delay));
        self.next_handle
    }

    fn cancel(&mut self, handle: TickHandle) {
        self.pending.retain(|(pending, _)| *pending != handle);
    }
}

/// Wall-clock ticks, one short-lived sleeper thread per tick
pub struct ThreadScheduler {
    next_handle: TickHandle,
    sender: Sender<TickHandle>,
    receiver: Receiver<TickHandle>,
    timers: HashMap<TickHandle, Arc<AtomicBool>>,
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadScheduler {
    pub fn new() -> Self {
        let (sender, receiver) = channel();
        Self {
            next_handle: 0,
            sender,
            receiver,
            timers: HashMap::new(),
        }
    }

    /// Blocks until the next live tick fires. Returns `None` when nothing is
    /// scheduled.
    pub fn wait(&mut self) -> Option<TickHandle> {
        while !self.timers.is_empty() {
            let Ok(handle) = self.receiver.recv() else {
                warn!("Scheduler: Tick channel closed");
                return None;
            };
            if self.timers.remove(&handle).is_some() {
                return Some(handle);
            }
            debug!("Scheduler: Dropping stale tick {handle}");
        }
        None
    }

    pub fn pending(&self) -> usize {
        self.timers.len()
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule_next(&mut self, delay: Duration) -> TickHandle {
        self.next_handle += 1;
        let handle = self.next_handle;
        let cancelled = Arc::new(AtomicBool::new(false));
        self.timers.insert(handle, Arc::clone(&cancelled));

        let sender = self.sender.clone();
        thread::spawn(move || {
            thread::sleep(delay);
            if !cancelled.load(Ordering::Acquire) {
                // the receiver only goes away with the scheduler
                let _ = sender.send(handle);
            }
        });
        handle
    }

    fn cancel(&mut self, handle: TickHandle) {
        if let Some(cancelled) = self.timers.remove(&handle) {
            cancelled.store(true, Ordering::Release);
        }
    }
}
