//! Facility event feed.
//!
//! Events are buffered while a tick runs and delivered when it completes.
//! Each [`EventKind`] has a bounded [`EventBuffer`]; when one fills up its
//! oldest entries are dropped. Every event is stamped with a bus-wide
//! sequence number, so delivery follows emission order across kinds: a
//! listener on both tickets and exits sees them interleaved exactly as they
//! happened.
//!
//! The [`Event::TicketIssued`] stream is the ticket feed consumed by receipt
//! renderers. Kinds nobody cares about can be switched off with
//! [`EventBus::suppress`]; a suppressed kind is never recorded.

use std::collections::VecDeque;

use crate::id::{BlockCoord, GateId, SpotId, TicketNumber, ZoneId};
use crate::ledger::Ticket;
use crate::maintenance::Toggle;
use crate::traffic::TrafficLevel;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Something that happened in the facility. `tick` counts occupancy and
/// traffic ticks together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A vehicle entered and took a spot.
    TicketIssued {
        ticket: Ticket,
        zone: ZoneId,
        tick: u64,
    },
    /// A vehicle left and freed its spot.
    VehicleExited {
        ticket: TicketNumber,
        spot: SpotId,
        exit_gate: GateId,
        tick: u64,
    },
    /// A queued maintenance toggle took effect.
    MaintenanceApplied { toggle: Toggle, tick: u64 },
    /// An ambient traffic pass rewrote `rewritten` segments.
    TrafficAmbient { rewritten: usize, tick: u64 },
    /// An entry or exit reset the segments serving `block`.
    TrafficDensity {
        block: BlockCoord,
        level: TrafficLevel,
        tick: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TicketIssued,
    VehicleExited,
    MaintenanceApplied,
    TrafficAmbient,
    TrafficDensity,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::TicketIssued,
        EventKind::VehicleExited,
        EventKind::MaintenanceApplied,
        EventKind::TrafficAmbient,
        EventKind::TrafficDensity,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

const KINDS: usize = EventKind::ALL.len();

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::TicketIssued { .. } => EventKind::TicketIssued,
            Event::VehicleExited { .. } => EventKind::VehicleExited,
            Event::MaintenanceApplied { .. } => EventKind::MaintenanceApplied,
            Event::TrafficAmbient { .. } => EventKind::TrafficAmbient,
            Event::TrafficDensity { .. } => EventKind::TrafficDensity,
        }
    }

    pub fn tick(&self) -> u64 {
        match *self {
            Event::TicketIssued { tick, .. }
            | Event::VehicleExited { tick, .. }
            | Event::MaintenanceApplied { tick, .. }
            | Event::TrafficAmbient { tick, .. }
            | Event::TrafficDensity { tick, .. } => tick,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBuffer
// ---------------------------------------------------------------------------

/// Bounded queue of `(sequence, event)` pairs for one kind.
#[derive(Debug)]
pub struct EventBuffer {
    events: VecDeque<(u64, Event)>,
    capacity: usize,
    /// Everything ever pushed, dropped entries included.
    total_written: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            total_written: 0,
        }
    }

    /// Append an event, dropping the oldest one if the buffer is full.
    pub fn push(&mut self, sequence: u64, event: Event) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back((sequence, event));
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Buffered events, oldest first.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Event> + '_ {
        self.events.iter().map(|(_, event)| event)
    }

    fn take(&mut self) -> VecDeque<(u64, Event)> {
        std::mem::take(&mut self.events)
    }
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// Receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// Predicate a listener can attach to see only some events of its kind.
pub type EventFilter = Box<dyn Fn(&Event) -> bool>;

/// Listeners run in priority order, then in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubscriberPriority {
    Pre = 0,
    Normal = 1,
    Post = 2,
}

struct Subscriber {
    priority: SubscriberPriority,
    filter: Option<EventFilter>,
    listener: PassiveListener,
}

impl Subscriber {
    fn accepts(&self, event: &Event) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(event))
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

pub struct EventBus {
    buffers: [Option<EventBuffer>; KINDS],
    suppressed: [bool; KINDS],
    subscribers: [Vec<Subscriber>; KINDS],
    capacity: usize,
    next_sequence: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners: Vec<usize> = self.subscribers.iter().map(Vec::len).collect();
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("listeners", &listeners)
            .field("next_sequence", &self.next_sequence)
            .finish()
    }
}

impl EventBus {
    /// `capacity` bounds each kind's buffer between deliveries.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; KINDS],
            subscribers: Default::default(),
            capacity,
            next_sequence: 0,
        }
    }

    /// Stop recording `kind`. Anything already buffered for it is dropped.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.slot()] = true;
        self.buffers[kind.slot()] = None;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.slot()]
    }

    /// Buffer an event for the next delivery.
    pub fn emit(&mut self, event: Event) {
        let slot = event.kind().slot();
        if self.suppressed[slot] {
            return;
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let capacity = self.capacity;
        self.buffers[slot]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push(sequence, event);
    }

    /// Register a listener with Normal priority and no filter.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.on_passive_filtered(kind, SubscriberPriority::Normal, None, listener);
    }

    pub fn on_passive_filtered(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        listener: PassiveListener,
    ) {
        let subscribers = &mut self.subscribers[kind.slot()];
        // After every listener of equal or higher precedence.
        let at = subscribers.partition_point(|s| s.priority <= priority);
        subscribers.insert(
            at,
            Subscriber {
                priority,
                filter,
                listener,
            },
        );
    }

    /// Hand every buffered event to its listeners in emission order, then
    /// empty the buffers.
    pub fn deliver(&mut self) {
        let mut pending: Vec<(u64, Event)> = self
            .buffers
            .iter_mut()
            .flatten()
            .flat_map(EventBuffer::take)
            .collect();
        if pending.is_empty() {
            return;
        }
        pending.sort_unstable_by_key(|(sequence, _)| *sequence);

        for (_, event) in &pending {
            for subscriber in &mut self.subscribers[event.kind().slot()] {
                if subscriber.accepts(event) {
                    (subscriber.listener)(event);
                }
            }
        }
    }

    /// The buffer for `kind`, if anything was ever emitted for it.
    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind.slot()].as_ref()
    }

    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffer(kind).map_or(0, EventBuffer::len)
    }

    /// Total events ever emitted for `kind`, dropped ones included.
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffer(kind).map_or(0, EventBuffer::total_written)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
