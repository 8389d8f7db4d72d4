//! Per-subscriber delivery with self-echo suppression.
//!
//! A subscriber lives in a [`SinkCell`]. [`DispatchAdapter::bind`] registers
//! one primary and one after listener on the stream that hold only a weak
//! reference to the cell, and hands the subscriber a mutation surface that
//! tags every change with the subscriber's own id. Events carrying that id
//! are never delivered back to it.
//!
//! Delivery to a subscriber whose handler is already running (because its
//! own handler triggered a nested mutation) is queued on the cell and
//! drained, in arrival order, as soon as the running handler returns.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use peel_types::{Emitter, GraphEvent, SubscriberId};
use tracing::{debug, warn};

use crate::access::GraphAccess;
use crate::error::DispatchError;
use crate::stream::{EventStream, ListenerId};

/// Which listener registry an event was delivered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The primary registry.
    Primary,
    /// The after registry.
    After,
}

/// Receiver of graph events.
pub trait EventSink {
    /// Error returned by the handlers; logged, never propagated to the
    /// mutating caller.
    type Error: std::error::Error;

    /// Called for every event not emitted by this subscriber.
    fn on_event(&mut self, event: &GraphEvent) -> Result<(), Self::Error>;

    /// Called after every primary listener has seen the event.
    fn on_after_event(&mut self, _event: &GraphEvent) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Owner of one subscriber and its pending deliveries.
#[derive(Debug)]
pub struct SinkCell<S> {
    id: SubscriberId,
    pending: RefCell<VecDeque<(Phase, GraphEvent)>>,
    sink: RefCell<S>,
}

impl<S: EventSink> SinkCell<S> {
    /// Wrap a subscriber under a fresh id.
    pub fn new(sink: S) -> Self {
        Self::with_id(SubscriberId::new(), sink)
    }

    /// Wrap a subscriber under a known id.
    pub const fn with_id(id: SubscriberId, sink: S) -> Self {
        Self {
            id,
            pending: RefCell::new(VecDeque::new()),
            sink: RefCell::new(sink),
        }
    }

    /// The subscriber's id.
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Number of events waiting for the subscriber to become free.
    pub fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Deliver an event, unless the subscriber emitted it.
    pub fn deliver(&self, phase: Phase, event: &GraphEvent) {
        if event.emitter == Emitter::Subscriber(self.id) {
            return;
        }
        self.pending.borrow_mut().push_back((phase, event.clone()));
        self.drain();
    }

    /// Run `f` with exclusive access to the subscriber, then deliver any
    /// events that arrived meanwhile.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::SinkBusy`] if the subscriber is already
    /// borrowed further up the call stack.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut S) -> R) -> Result<R, DispatchError> {
        let result = {
            let mut sink = self.sink.try_borrow_mut().map_err(|source| {
                debug!(subscriber = %self.id, %source, "subscriber busy");
                DispatchError::SinkBusy {
                    subscriber: self.id,
                }
            })?;
            f(&mut sink)
        };
        self.drain();
        Ok(result)
    }

    fn drain(&self) {
        let Ok(mut sink) = self.sink.try_borrow_mut() else {
            debug!(
                subscriber = %self.id,
                pending = self.pending_len(),
                "subscriber busy, delivery queued"
            );
            return;
        };
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some((phase, event)) = next else {
                break;
            };
            let outcome = match phase {
                Phase::Primary => sink.on_event(&event),
                Phase::After => sink.on_after_event(&event),
            };
            if let Err(err) = outcome {
                warn!(
                    subscriber = %self.id,
                    kind = %event.kind,
                    key = %event.key,
                    error = %err,
                    "event handler failed"
                );
            }
        }
    }
}

/// A subscriber's connection to one event stream.
///
/// Mutations made through the adapter are attributed to the subscriber.
#[derive(Debug, Clone)]
pub struct DispatchAdapter {
    id: SubscriberId,
    stream: EventStream,
    primary: ListenerId,
    after: ListenerId,
}

impl DispatchAdapter {
    /// Connect `cell` to `stream`.
    pub fn bind<S: EventSink + 'static>(stream: &EventStream, cell: &Rc<SinkCell<S>>) -> Self {
        let primary = {
            let cell = Rc::downgrade(cell);
            stream.add_listener(move |event| {
                if let Some(cell) = cell.upgrade() {
                    cell.deliver(Phase::Primary, event);
                }
            })
        };
        let after = {
            let cell = Rc::downgrade(cell);
            stream.add_after_listener(move |event| {
                if let Some(cell) = cell.upgrade() {
                    cell.deliver(Phase::After, event);
                }
            })
        };
        debug!(
            subscriber = %cell.id(),
            generation = stream.generation(),
            "dispatch adapter bound"
        );
        Self {
            id: cell.id(),
            stream: stream.clone(),
            primary,
            after,
        }
    }

    /// The subscriber this adapter delivers to.
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Stop delivering events from the stream.
    pub fn unbind(&self) {
        self.stream.remove_listener(self.primary);
        self.stream.remove_listener(self.after);
    }
}

impl GraphAccess for DispatchAdapter {
    fn stream(&self) -> &EventStream {
        &self.stream
    }

    fn emitter(&self) -> Emitter {
        Emitter::Subscriber(self.id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use peel_graph::KeyAllocator;
    use peel_types::{GraphEventKind, NodeKey};
    use serde_json::Value;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("rejected {0}")]
    struct Rejected(String);

    /// Records everything it receives; optionally mirrors each foreign node
    /// with a node of its own, or fails on a given key.
    #[derive(Default)]
    struct Recorder {
        seen: Vec<String>,
        after: Vec<String>,
        adapter: Option<DispatchAdapter>,
        mirror: bool,
        echo_through: Option<EventStream>,
        fail_on: Option<String>,
    }

    impl EventSink for Recorder {
        type Error = Rejected;

        fn on_event(&mut self, event: &GraphEvent) -> Result<(), Rejected> {
            self.seen.push(format!("{}:{}", event.kind, event.key));
            if self.fail_on.as_deref() == Some(event.key.as_str()) {
                return Err(Rejected(event.key.clone()));
            }
            if self.mirror && event.kind == GraphEventKind::NodeAdded {
                if let Some(adapter) = &self.adapter {
                    adapter.add_node(Value::Null).unwrap();
                }
            }
            if event.key == "0" {
                if let Some(stream) = &self.echo_through {
                    stream.add_node(Value::Null).unwrap();
                }
            }
            Ok(())
        }

        fn on_after_event(&mut self, event: &GraphEvent) -> Result<(), Rejected> {
            self.after.push(format!("{}:{}", event.kind, event.key));
            Ok(())
        }
    }

    fn connect(stream: &EventStream, recorder: Recorder) -> (Rc<SinkCell<Recorder>>, DispatchAdapter) {
        let cell = Rc::new(SinkCell::new(recorder));
        let adapter = DispatchAdapter::bind(stream, &cell);
        let handle = adapter.clone();
        cell.with_mut(|r| r.adapter = Some(handle)).unwrap();
        (cell, adapter)
    }

    fn seen(cell: &SinkCell<Recorder>) -> Vec<String> {
        cell.with_mut(|r| r.seen.clone()).unwrap()
    }

    #[test]
    fn own_mutations_are_not_echoed() {
        let stream = EventStream::new(KeyAllocator::new(), 0);
        let (first, first_adapter) = connect(&stream, Recorder::default());
        let (second, _second_adapter) = connect(&stream, Recorder::default());

        first_adapter.add_node(Value::Null).unwrap();

        assert!(seen(&first).is_empty());
        assert_eq!(seen(&second), vec!["node_added:0"]);
        assert_eq!(
            second.with_mut(|r| r.after.clone()).unwrap(),
            vec!["node_added:0"]
        );
    }

    #[test]
    fn stream_mutations_reach_every_subscriber() {
        let stream = EventStream::new(KeyAllocator::new(), 0);
        let (first, _a) = connect(&stream, Recorder::default());
        let (second, _b) = connect(&stream, Recorder::default());

        stream.add_node(Value::Null).unwrap();

        assert_eq!(seen(&first), vec!["node_added:0"]);
        assert_eq!(seen(&second), vec!["node_added:0"]);
    }

    #[test]
    fn nested_mutation_from_handler_is_broadcast_first() {
        let stream = EventStream::new(KeyAllocator::new(), 0);
        let (mirror, _adapter) = connect(
            &stream,
            Recorder {
                mirror: true,
                ..Recorder::default()
            },
        );
        let (observer, _b) = connect(&stream, Recorder::default());

        // The mirror reacts to "0" by adding "1" through its adapter. The
        // observer sees "1" first because the nested broadcast completes
        // before the outer one reaches it.
        stream.add_node(Value::Null).unwrap();

        assert_eq!(seen(&mirror), vec!["node_added:0"]);
        assert_eq!(seen(&observer), vec!["node_added:1", "node_added:0"]);
        assert_eq!(mirror.pending_len(), 0);
        assert_eq!(stream.node_count(), 2);
    }

    #[test]
    fn reentrant_delivery_is_queued_until_handler_returns() {
        let stream = EventStream::new(KeyAllocator::new(), 0);
        let (cell, _adapter) = connect(
            &stream,
            Recorder {
                echo_through: Some(stream.clone()),
                ..Recorder::default()
            },
        );
        let (observer, _b) = connect(&stream, Recorder::default());

        // Adding "1" through the stream itself is not attributed to the
        // subscriber, so it comes back while the "0" handler is running.
        stream.add_node(Value::Null).unwrap();

        assert_eq!(seen(&cell), vec!["node_added:0", "node_added:1"]);
        assert_eq!(seen(&observer), vec!["node_added:1", "node_added:0"]);
        assert_eq!(cell.pending_len(), 0);
    }

    #[test]
    fn busy_subscriber_receives_queued_events_afterwards() {
        let stream = EventStream::new(KeyAllocator::new(), 0);
        let (cell, _adapter) = connect(&stream, Recorder::default());
        let stream_handle = stream.clone();

        let inside = cell
            .with_mut(|r| {
                stream_handle.add_node(Value::Null).unwrap();
                r.seen.len()
            })
            .unwrap();

        assert_eq!(inside, 0);
        assert_eq!(seen(&cell), vec!["node_added:0"]);
    }

    #[test]
    fn nested_access_reports_busy() {
        let cell = Rc::new(SinkCell::new(Recorder::default()));
        let id = cell.id();
        let nested = cell.with_mut(|_| cell.with_mut(|_| ())).unwrap();
        assert_eq!(nested.unwrap_err(), DispatchError::SinkBusy { subscriber: id });
    }

    #[test]
    fn handler_error_does_not_stop_other_subscribers() {
        let stream = EventStream::new(KeyAllocator::new(), 0);
        let (failing, _a) = connect(
            &stream,
            Recorder {
                fail_on: Some("0".to_owned()),
                ..Recorder::default()
            },
        );
        let (healthy, _b) = connect(&stream, Recorder::default());

        stream.add_node(Value::Null).unwrap();
        stream.add_node(Value::Null).unwrap();

        assert_eq!(seen(&failing), vec!["node_added:0", "node_added:1"]);
        assert_eq!(seen(&healthy), vec!["node_added:0", "node_added:1"]);
    }

    #[test]
    fn dropped_subscriber_is_skipped() {
        let stream = EventStream::new(KeyAllocator::new(), 0);
        let delivered = Rc::new(Cell::new(0_u32));
        {
            let cell = Rc::new(SinkCell::new(Recorder::default()));
            let _adapter = DispatchAdapter::bind(&stream, &cell);
        }
        {
            let delivered = Rc::clone(&delivered);
            stream.add_listener(move |_| delivered.set(delivered.get().saturating_add(1)));
        }

        stream.add_node(Value::Null).unwrap();
        assert_eq!(delivered.get(), 1);
    }

    #[test]
    fn unbound_adapter_stops_delivery() {
        let stream = EventStream::new(KeyAllocator::new(), 0);
        let (cell, adapter) = connect(&stream, Recorder::default());
        adapter.unbind();

        stream.add_node(Value::Null).unwrap();
        assert!(seen(&cell).is_empty());
        assert!(stream.contains_node(&NodeKey::from("0")));
    }
}
