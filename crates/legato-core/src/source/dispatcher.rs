//! Time-ordered event scheduling wrapped around a child source.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::{Error, Result};
use crate::source::{AudioSource, NodeId, SharedSource};

/// An event fired by the dispatcher. Runs on the audio thread while the
/// output bridge lock is held, so it must be short; it receives a
/// [`Scheduler`] to queue follow-up events.
pub type EventFn = Box<dyn FnOnce(&mut Scheduler<'_>) + Send>;

struct QueuedEvent {
    trigger_time: f64,
    seq: u64,
    event: EventFn,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.trigger_time == other.trigger_time && self.seq == other.seq
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the earliest trigger time pops
        // first, with ties resolved in insertion order.
        other
            .trigger_time
            .total_cmp(&self.trigger_time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Scheduling view handed to a firing event.
pub struct Scheduler<'a> {
    queue: &'a mut BinaryHeap<QueuedEvent>,
    next_seq: &'a mut u64,
    current_time: f64,
}

impl Scheduler<'_> {
    /// Simulated time of the event currently firing.
    #[inline]
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Queue `event` to fire `delta_time` seconds from now. Zero is allowed
    /// and fires within the current `advance_time` call.
    ///
    /// # Panics
    ///
    /// Panics if `delta_time` is negative.
    pub fn schedule_event(&mut self, delta_time: f64, event: EventFn) {
        assert!(delta_time >= 0.0, "events cannot be scheduled in the past");
        let seq = *self.next_seq;
        *self.next_seq += 1;
        self.queue.push(QueuedEvent {
            trigger_time: self.current_time + delta_time,
            seq,
            event,
        });
    }
}

/// Advances its child in event-sized slices, firing queued events exactly at
/// their trigger times.
///
/// Events with equal trigger times fire in insertion order, and a zero-delay
/// event queued by a firing event runs before the child advances any further.
/// The dispatcher is not duplicable.
pub struct EventDispatcher {
    id: NodeId,
    queue: BinaryHeap<QueuedEvent>,
    next_seq: u64,
    current_time: f64,
    source: Option<SharedSource>,
}

impl EventDispatcher {
    pub fn new(source: Option<SharedSource>) -> Self {
        Self {
            id: NodeId::fresh(),
            queue: BinaryHeap::new(),
            next_seq: 0,
            current_time: 0.0,
            source,
        }
    }

    /// Simulated time this dispatcher has advanced to.
    #[inline]
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Number of events still queued.
    #[inline]
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Queue `event` to fire `delta_time` seconds from now.
    ///
    /// # Panics
    ///
    /// Panics if `delta_time` is negative.
    pub fn schedule_event(&mut self, delta_time: f64, event: EventFn) {
        let mut scheduler = Scheduler {
            queue: &mut self.queue,
            next_seq: &mut self.next_seq,
            current_time: self.current_time,
        };
        scheduler.schedule_event(delta_time, event);
    }
}

impl AudioSource for EventDispatcher {
    fn current_sample(&self, channel: usize) -> f32 {
        match &self.source {
            Some(source) => source.lock().current_sample(channel),
            None => 0.0,
        }
    }

    fn advance_time(&mut self, delta_time: f64) {
        let final_time = self.current_time + delta_time;
        loop {
            match self.queue.peek() {
                Some(head) if head.trigger_time <= final_time => {}
                _ => break,
            }
            let Some(queued) = self.queue.pop() else {
                break;
            };
            if let Some(source) = &self.source {
                if self.current_time != queued.trigger_time {
                    source
                        .lock()
                        .advance_time(queued.trigger_time - self.current_time);
                }
            }
            self.current_time = queued.trigger_time;
            let mut scheduler = Scheduler {
                queue: &mut self.queue,
                next_seq: &mut self.next_seq,
                current_time: self.current_time,
            };
            (queued.event)(&mut scheduler);
        }
        if let Some(source) = &self.source {
            if self.current_time != final_time {
                source.lock().advance_time(final_time - self.current_time);
            }
        }
        self.current_time = final_time;
    }

    fn duplicate(&self) -> Result<SharedSource> {
        Err(Error::NotDuplicable)
    }

    fn id(&self) -> NodeId {
        self.id
    }

    fn for_each_child(&self, visit: &mut dyn FnMut(SharedSource)) {
        if let Some(source) = &self.source {
            visit(source.clone());
        }
    }
}
