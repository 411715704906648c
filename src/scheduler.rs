//! A discrete event scheduler.

use crate::error::{SimError, SimResult};
use crate::GtuId;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// An event of the traffic simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimEvent {
    /// Evaluates a GTU. Ignored if the GTU has been rescheduled since,
    /// which is detected through the GTU's generation counter.
    Move { gtu: GtuId, generation: u64 },
    /// Fires a vehicle generator.
    Generate { generator: usize },
}

struct Entry<E> {
    time: f64,
    order: u64,
    event: E,
}

impl<E> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<E> Eq for Entry<E> {}

impl<E> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Entry<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed, so the heap pops the earliest event, first scheduled first
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// A queue of events ordered by time, which owns the simulation clock.
pub struct EventQueue<E> {
    queue: BinaryHeap<Entry<E>>,
    counter: u64,
    now: f64,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            counter: 0,
            now: 0.0,
        }
    }

    /// The current simulation time in s.
    pub fn simulator_time(&self) -> f64 {
        self.now
    }

    /// Schedules an event at an absolute time, which must not lie in the past.
    pub fn schedule_event_abs(&mut self, time: f64, event: E) -> SimResult<()> {
        if time < self.now || time.is_nan() {
            return Err(SimError::EventInPast {
                time,
                now: self.now,
            });
        }
        let order = self.counter;
        self.counter += 1;
        self.queue.push(Entry { time, order, event });
        Ok(())
    }

    /// Schedules an event `delay` seconds from now.
    pub fn schedule_event_rel(&mut self, delay: f64, event: E) -> SimResult<()> {
        self.schedule_event_abs(self.now + delay, event)
    }

    /// The time of the next event, if any.
    pub fn peek_time(&self) -> Option<f64> {
        self.queue.peek().map(|entry| entry.time)
    }

    /// Removes the next event and advances the clock to its time.
    pub fn pop(&mut self) -> Option<(f64, E)> {
        let entry = self.queue.pop()?;
        self.now = entry.time;
        Some((entry.time, entry.event))
    }

    /// Advances the clock without firing events. The clock never runs backwards.
    pub fn advance_to(&mut self, time: f64) {
        self.now = self.now.max(time);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fires_in_time_then_fifo_order() {
        let mut queue = EventQueue::new();
        queue.schedule_event_abs(2.0, "c").unwrap();
        queue.schedule_event_abs(1.0, "a").unwrap();
        queue.schedule_event_abs(1.0, "b").unwrap();
        queue.schedule_event_rel(0.5, "first").unwrap();
        assert_eq!(queue.len(), 4);
        assert_eq!(queue.peek_time(), Some(0.5));

        let order: Vec<_> = std::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(
            order,
            vec![(0.5, "first"), (1.0, "a"), (1.0, "b"), (2.0, "c")]
        );
        assert_eq!(queue.simulator_time(), 2.0);
        assert!(queue.is_empty());
    }

    #[test]
    fn rejects_events_in_the_past() {
        let mut queue = EventQueue::new();
        queue.schedule_event_abs(5.0, ()).unwrap();
        queue.pop();
        assert_eq!(
            queue.schedule_event_abs(4.0, ()),
            Err(SimError::EventInPast {
                time: 4.0,
                now: 5.0
            })
        );
        assert!(queue.schedule_event_rel(-1.0, ()).is_err());
        // Now is fine
        assert!(queue.schedule_event_rel(0.0, ()).is_ok());

        queue.advance_to(3.0);
        assert_eq!(queue.simulator_time(), 5.0);
    }
}
