//! Background registry of open handles and load buffers.
//!
//! Every open and every whole-file load posts a [`FileEvent`] on an unbounded
//! channel. A single housekeeping thread drains it and keeps an id-keyed map
//! of weak references, so it can force-close whatever callers leaked when a
//! mod switch invalidates file state or when the filesystem shuts down.
//! Callers still close and free in the normal case; the registry never keeps
//! anything alive.

use std::io;
use std::sync::Weak;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::handle::{BufferSlot, HandleSlot};

/// Counts of tracked resources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tracked {
    /// Open file handles.
    pub handles: usize,
    /// Live load buffers.
    pub buffers: usize,
}

/// Messages consumed by the housekeeping thread.
pub(crate) enum FileEvent {
    Opened {
        id: u64,
        slot: Weak<HandleSlot>,
        label: String,
    },
    Closed {
        id: u64,
    },
    Loaded {
        id: u64,
        buffer: Weak<BufferSlot>,
        label: String,
    },
    Freed {
        id: u64,
    },
    /// Force-close everything registered so far and report what was closed.
    Purge {
        done: Sender<Tracked>,
    },
    /// Report current counts.
    Query {
        reply: Sender<Tracked>,
    },
    Stop,
}

/// Producer side of the event queue, cloned into every handle.
pub(crate) type EventSender = Sender<FileEvent>;

struct Entry<T> {
    slot: Weak<T>,
    label: String,
}

#[derive(Default)]
struct Registry {
    handles: FxHashMap<u64, Entry<HandleSlot>>,
    buffers: FxHashMap<u64, Entry<BufferSlot>>,
}

impl Registry {
    /// Apply one event. Returns false on `Stop`.
    fn apply(&mut self, event: FileEvent) -> bool {
        match event {
            FileEvent::Opened { id, slot, label } => {
                self.handles.insert(id, Entry { slot, label });
            }
            FileEvent::Closed { id } => {
                self.handles.remove(&id);
            }
            FileEvent::Loaded { id, buffer, label } => {
                self.buffers.insert(id, Entry { slot: buffer, label });
            }
            FileEvent::Freed { id } => {
                self.buffers.remove(&id);
            }
            FileEvent::Purge { done } => {
                let closed = self.force_close_all();
                done.send(closed).ok();
            }
            FileEvent::Query { reply } => {
                reply.send(self.counts()).ok();
            }
            FileEvent::Stop => return false,
        }
        true
    }

    fn counts(&self) -> Tracked {
        Tracked {
            handles: self.handles.len(),
            buffers: self.buffers.len(),
        }
    }

    fn force_close_all(&mut self) -> Tracked {
        let mut closed = Tracked::default();

        for (id, entry) in self.handles.drain() {
            if let Some(slot) = entry.slot.upgrade() {
                if slot.lock().take().is_some() {
                    debug!(id, file = %entry.label, "force-closed handle");
                    closed.handles += 1;
                }
            }
        }
        for (id, entry) in self.buffers.drain() {
            if let Some(buffer) = entry.slot.upgrade() {
                if buffer.lock().take().is_some() {
                    debug!(id, file = %entry.label, "freed load buffer");
                    closed.buffers += 1;
                }
            }
        }

        closed
    }
}

fn run(events: Receiver<FileEvent>) -> Tracked {
    let mut registry = Registry::default();

    // Blocks while idle; every send wakes it.
    while let Ok(event) = events.recv() {
        if !registry.apply(event) {
            break;
        }
    }

    // Whatever was queued before the stop still counts.
    while let Ok(event) = events.try_recv() {
        registry.apply(event);
    }

    let leaked = registry.force_close_all();
    if leaked.handles > 0 || leaked.buffers > 0 {
        warn!(
            handles = leaked.handles,
            buffers = leaked.buffers,
            "force-closed leaked files at shutdown"
        );
    }
    leaked
}

/// Owner of the housekeeping thread.
pub(crate) struct Housekeeper {
    events: EventSender,
    thread: Mutex<Option<JoinHandle<Tracked>>>,
}

impl Housekeeper {
    pub(crate) fn spawn() -> io::Result<Self> {
        let (events, receiver) = crossbeam_channel::unbounded();
        let thread = thread::Builder::new()
            .name("strata-housekeeper".to_string())
            .spawn(move || run(receiver))?;
        Ok(Self {
            events,
            thread: Mutex::new(Some(thread)),
        })
    }

    pub(crate) fn sender(&self) -> EventSender {
        self.events.clone()
    }

    /// Force-close every handle and free every buffer opened so far.
    pub(crate) fn purge(&self) -> Tracked {
        let (done, wait) = crossbeam_channel::bounded(1);
        if self.events.send(FileEvent::Purge { done }).is_err() {
            return Tracked::default();
        }
        wait.recv().unwrap_or_default()
    }

    pub(crate) fn tracked(&self) -> Tracked {
        let (reply, wait) = crossbeam_channel::bounded(1);
        if self.events.send(FileEvent::Query { reply }).is_err() {
            return Tracked::default();
        }
        wait.recv().unwrap_or_default()
    }

    /// Stop the thread and wait for it. Returns what it had to force-close.
    pub(crate) fn shutdown(&self) -> Tracked {
        let Some(thread) = self.thread.lock().take() else {
            return Tracked::default();
        };
        self.events.send(FileEvent::Stop).ok();
        match thread.join() {
            Ok(leaked) => leaked,
            Err(_) => {
                warn!("housekeeping thread panicked");
                Tracked::default()
            }
        }
    }
}

impl Drop for Housekeeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}
