//! Fixed-capacity, time-ordered event queue.
//!
//! Events are appended in non-decreasing time order by their owner (callers
//! cancel later events before scheduling earlier ones), so the queue is a
//! plain ring buffer: due events are taken from the front, cancellations
//! trim the back. Nothing here allocates; a full queue drops new events.

use heapless::Deque;

use crate::signal::Seconds;

/// Tolerance for deciding whether an event falls on a given sample.
const TIME_EPSILON: Seconds = 0.000_000_001;

/// An event of kind `K` scheduled at an absolute time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event<K> {
    /// What happens.
    pub kind: K,
    /// When it happens, on the owning producer's clock.
    pub time: Seconds,
}

impl<K> Event<K> {
    /// Creates an event.
    pub const fn new(kind: K, time: Seconds) -> Self {
        Self { kind, time }
    }
}

/// Time-ordered queue holding at most `N` events.
#[derive(Debug, Clone)]
pub struct EventQueue<K, const N: usize> {
    events: Deque<Event<K>, N>,
}

impl<K: Copy, const N: usize> EventQueue<K, N> {
    /// Creates an empty queue.
    pub const fn new() -> Self {
        Self {
            events: Deque::new(),
        }
    }

    /// Appends an event. Returns `false` if the queue was full and the event
    /// was dropped.
    pub fn push(&mut self, kind: K, time: Seconds) -> bool {
        self.events.push_back(Event::new(kind, time)).is_ok()
    }

    /// Removes and returns the first event if it is due at `time`.
    #[inline]
    pub fn pop_due(&mut self, time: Seconds) -> Option<Event<K>> {
        if self.has_due(time) {
            self.events.pop_front()
        } else {
            None
        }
    }

    /// Whether the first event is due no later than `time`.
    #[inline]
    pub fn has_due(&self, time: Seconds) -> bool {
        self.events
            .front()
            .is_some_and(|event| event.time <= time + TIME_EPSILON)
    }

    /// Drops every event scheduled at or after `time`.
    pub fn drop_from(&mut self, time: Seconds) {
        while let Some(event) = self.events.back() {
            if event.time + TIME_EPSILON < time {
                break;
            }

            self.events.pop_back();
        }
    }

    /// Drops every event.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Whether any event is pending.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of pending events.
    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether an event is pending strictly after `time`.
    #[inline]
    pub fn has_events_after(&self, time: Seconds) -> bool {
        self.events.back().is_some_and(|event| event.time > time)
    }

    /// Time of the last pending event.
    #[inline]
    pub fn last_time(&self) -> Option<Seconds> {
        self.events.back().map(|event| event.time)
    }

    /// Pending events in time order.
    pub fn iter(&self) -> impl Iterator<Item = &Event<K>> {
        self.events.iter()
    }
}

impl<K: Copy, const N: usize> Default for EventQueue<K, N> {
    fn default() -> Self {
        Self::new()
    }
}
