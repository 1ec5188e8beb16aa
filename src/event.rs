//! Event System
//!
//! Notifications the companion view sends to the host. Events are queued
//! while a frame runs and delivered to listeners once, at the end of the
//! frame, so a listener never observes a half-updated view.
//!
//! Example flow:
//! 1. Evolution finishes the swap → `EvolutionComplete { stage }` is queued
//! 2. Frame ends → every registered listener receives it
//! 3. The host persists the new stage

use crate::config::StageId;

/// Events emitted by the companion view
#[derive(Debug, Clone, PartialEq)]
pub enum CompanionEvent {
    /// The companion model was clicked
    CompanionClicked,
    EvolutionStarted { from: StageId, to: StageId },
    EvolutionComplete { stage: StageId },
    /// Pointer entered (true) or left (false) the companion
    Hover { hovering: bool },
}

/// A queue for events of a single type.
/// Events are collected during the frame and drained at specific points.
#[derive(Debug)]
pub struct EventQueue<T> {
    events: Vec<T>,
}

impl<T> EventQueue<T> {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Send an event (add to queue)
    pub fn send(&mut self, event: T) {
        self.events.push(event);
    }

    /// Iterate over events without clearing
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.events.iter()
    }

    /// Drain all events (returns iterator and clears queue)
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.events.drain(..)
    }

    /// Check if there are any events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Clear all events without processing
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Number of events in queue
    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by `Listeners::add`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<T> = Box<dyn FnMut(&T)>;

/// Registered observers for one event type
pub struct Listeners<T> {
    entries: Vec<(ListenerId, Listener<T>)>,
    next_id: u64,
}

impl<T> Listeners<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    pub fn add(&mut self, listener: impl FnMut(&T) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, Box::new(listener)));
        id
    }

    /// Returns false if the id was not registered
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(lid, _)| *lid != id);
        self.entries.len() != before
    }

    /// Deliver every queued event to every listener, in registration order
    pub fn dispatch(&mut self, queue: &mut EventQueue<T>) {
        for event in queue.drain() {
            for (_, listener) in self.entries.iter_mut() {
                listener(&event);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_event_queue() {
        let mut queue: EventQueue<CompanionEvent> = EventQueue::new();
        assert!(queue.is_empty());

        queue.send(CompanionEvent::CompanionClicked);
        queue.send(CompanionEvent::Hover { hovering: true });
        assert_eq!(queue.len(), 2);

        let events: Vec<_> = queue.drain().collect();
        assert_eq!(events.len(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dispatch_reaches_all_listeners_and_drains() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = Listeners::new();
        for tag in 0..2 {
            let seen = seen.clone();
            listeners.add(move |e: &CompanionEvent| seen.borrow_mut().push((tag, e.clone())));
        }

        let mut queue = EventQueue::new();
        queue.send(CompanionEvent::EvolutionComplete { stage: StageId::from("teen") });
        listeners.dispatch(&mut queue);

        assert!(queue.is_empty());
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(seen.borrow()[0].0, 0);
    }

    #[test]
    fn test_removed_listener_is_not_called() {
        let count = Rc::new(RefCell::new(0));
        let mut listeners = Listeners::new();
        let c = count.clone();
        let id = listeners.add(move |_: &CompanionEvent| *c.borrow_mut() += 1);
        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));

        let mut queue = EventQueue::new();
        queue.send(CompanionEvent::CompanionClicked);
        listeners.dispatch(&mut queue);
        assert_eq!(*count.borrow(), 0);
    }
}
