//! The driver's event queue.
//!
//! A multi-producer FIFO: any thread may append, the dispatch thread alone
//! pops. Expired timers and released deferred events are inserted at the
//! front. Popping blocks with an optional timeout so that the dispatch thread
//! can wait for the next timer and an incoming event at once.

use crate::core::{Event, Machine};
use crate::driver::status::QueuedEvent;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Work items processed by the dispatch loop.
pub(crate) enum Item {
    /// Deliver an event to a registered machine.
    Event(Event),
    /// Register a machine and run its initial transition.
    Register(Box<Machine>),
    /// Deregister a machine; queued by do-action workers.
    Terminate(String),
}

#[derive(Default)]
struct Pending {
    items: VecDeque<Item>,
    woken: bool,
}

#[derive(Default)]
pub(crate) struct EventQueue {
    pending: Mutex<Pending>,
    ready: Condvar,
}

impl EventQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_back(&self, item: Item) {
        self.pending.lock().items.push_back(item);
        self.ready.notify_one();
    }

    pub(crate) fn push_front(&self, item: Item) {
        self.pending.lock().items.push_front(item);
        self.ready.notify_one();
    }

    /// Insert `items` at the front, keeping their relative order.
    pub(crate) fn extend_front<I>(&self, items: I)
    where
        I: IntoIterator<Item = Item>,
        I::IntoIter: DoubleEndedIterator,
    {
        let mut pending = self.pending.lock();
        for item in items.into_iter().rev() {
            pending.items.push_front(item);
        }
        drop(pending);
        self.ready.notify_one();
    }

    /// Interrupt a blocked `pop` without delivering anything.
    pub(crate) fn wake(&self) {
        self.pending.lock().woken = true;
        self.ready.notify_one();
    }

    /// Pop the head item, waiting up to `timeout` (forever when `None`).
    ///
    /// Returns `None` on timeout or when woken.
    pub(crate) fn pop(&self, timeout: Option<Duration>) -> Option<Item> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut pending = self.pending.lock();
        loop {
            if let Some(item) = pending.items.pop_front() {
                pending.woken = false;
                return Some(item);
            }
            if pending.woken {
                pending.woken = false;
                return None;
            }
            match deadline {
                None => self.ready.wait(&mut pending),
                Some(deadline) => {
                    if self.ready.wait_until(&mut pending, deadline).timed_out() {
                        return pending.items.pop_front();
                    }
                }
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.lock().items.len()
    }

    /// Events waiting in the queue, head first. Registrations show up as
    /// trigger-less events for the machine being added.
    pub(crate) fn snapshot(&self) -> Vec<QueuedEvent> {
        self.pending
            .lock()
            .items
            .iter()
            .filter_map(|item| match item {
                Item::Event(event) => Some(QueuedEvent::from(event)),
                Item::Register(machine) => Some(QueuedEvent::from(&Event::initial(machine.id()))),
                Item::Terminate(_) => None,
            })
            .collect()
    }
}
