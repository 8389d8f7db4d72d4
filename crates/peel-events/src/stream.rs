//! The event stream: a graph store plus synchronous listener fan-out.
//!
//! Every mutation is applied to the [`Graph`] first and, only if it
//! succeeded, announced to every primary listener and then every after
//! listener, in registration order. The graph borrow is released before any
//! listener runs, so listeners may read the graph and mutate it again; such
//! nested broadcasts finish before the outer one continues.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use peel_graph::{Edge, Graph, KeyAllocator, Node};
use peel_types::{EdgeKey, Emitter, GraphEvent, GraphEventKind, NodeKey};
use serde_json::Value;
use tracing::debug;

use crate::error::StreamError;

/// Handle returned when registering a listener; used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn(&GraphEvent)>;

struct StreamInner {
    generation: u64,
    graph: RefCell<Graph>,
    primary: RefCell<Vec<(ListenerId, Listener)>>,
    after: RefCell<Vec<(ListenerId, Listener)>>,
    next_listener: Cell<u64>,
}

/// Shared handle over one generation of the graph and its listeners.
///
/// Cloning the handle is cheap; all clones see the same graph.
#[derive(Clone)]
pub struct EventStream {
    inner: Rc<StreamInner>,
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("generation", &self.inner.generation)
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

impl EventStream {
    /// Create a stream over an empty graph that draws keys from `allocator`.
    pub fn new(allocator: KeyAllocator, generation: u64) -> Self {
        Self {
            inner: Rc::new(StreamInner {
                generation,
                graph: RefCell::new(Graph::with_allocator(allocator)),
                primary: RefCell::new(Vec::new()),
                after: RefCell::new(Vec::new()),
                next_listener: Cell::new(0),
            }),
        }
    }

    /// Generation number assigned by the owner of the stream.
    pub fn generation(&self) -> u64 {
        self.inner.generation
    }

    /// Whether two handles refer to the same stream.
    pub fn same_stream(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // -------------------------------------------------------------------
    // Listener registry
    // -------------------------------------------------------------------

    /// Register a primary listener.
    pub fn add_listener(&self, listener: impl Fn(&GraphEvent) + 'static) -> ListenerId {
        let id = self.next_listener_id();
        let listener: Listener = Rc::new(listener);
        self.inner.primary.borrow_mut().push((id, listener));
        id
    }

    /// Register an after listener, run once every primary listener has seen
    /// the event.
    pub fn add_after_listener(&self, listener: impl Fn(&GraphEvent) + 'static) -> ListenerId {
        let id = self.next_listener_id();
        let listener: Listener = Rc::new(listener);
        self.inner.after.borrow_mut().push((id, listener));
        id
    }

    /// Remove a listener from whichever registry holds it.
    ///
    /// Returns `false` if no listener has this id.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut removed = false;
        for registry in [&self.inner.primary, &self.inner.after] {
            let mut listeners = registry.borrow_mut();
            let before = listeners.len();
            listeners.retain(|(listener, _)| *listener != id);
            removed |= listeners.len() != before;
        }
        removed
    }

    /// Number of registered listeners across both registries.
    pub fn listener_count(&self) -> usize {
        self.inner
            .primary
            .borrow()
            .len()
            .saturating_add(self.inner.after.borrow().len())
    }

    fn next_listener_id(&self) -> ListenerId {
        let value = self.inner.next_listener.get();
        self.inner.next_listener.set(value.wrapping_add(1));
        ListenerId(value)
    }

    // -------------------------------------------------------------------
    // Graph access
    // -------------------------------------------------------------------

    /// Run `f` with read access to the graph.
    ///
    /// Mutating the stream from inside `f` fails with
    /// [`StreamError::GraphBusy`].
    pub fn with_graph<R>(&self, f: impl FnOnce(&Graph) -> R) -> R {
        f(&self.graph())
    }

    fn graph(&self) -> Ref<'_, Graph> {
        self.inner.graph.borrow()
    }

    fn graph_mut(&self) -> Result<RefMut<'_, Graph>, StreamError> {
        self.inner.graph.try_borrow_mut().map_err(|source| {
            debug!(generation = self.inner.generation, %source, "graph busy");
            StreamError::GraphBusy
        })
    }

    // -------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------

    /// Add a node on behalf of `emitter` and broadcast [`GraphEventKind::NodeAdded`].
    pub fn add_node_as(&self, payload: Value, emitter: Emitter) -> Result<Node, StreamError> {
        let node = self.graph_mut()?.add_node(payload)?.clone();
        self.broadcast(&GraphEvent::new(
            GraphEventKind::NodeAdded,
            node.key.as_str(),
            emitter,
        ));
        Ok(node)
    }

    /// Connect two nodes on behalf of `emitter` and broadcast
    /// [`GraphEventKind::EdgeAdded`].
    ///
    /// Nothing is broadcast when the graph rejects the edge.
    pub fn add_edge_as(
        &self,
        first: &NodeKey,
        second: &NodeKey,
        payload: Value,
        emitter: Emitter,
    ) -> Result<Edge, StreamError> {
        let edge = self.graph_mut()?.add_edge(first, second, payload)?.clone();
        self.broadcast(&GraphEvent::new(
            GraphEventKind::EdgeAdded,
            edge.key.as_str(),
            emitter,
        ));
        Ok(edge)
    }

    /// Remove a node on behalf of `emitter`.
    ///
    /// Incident edges are removed one at a time first, each announced with
    /// the same emitter, then the node itself. Returns `false` if the node
    /// was not removed by this call.
    pub fn remove_node_as(&self, key: &NodeKey, emitter: Emitter) -> Result<bool, StreamError> {
        if !self.graph().contains_node(key) {
            return Ok(false);
        }
        loop {
            let incident = self.graph().edges_of_node(key).next().cloned();
            let Some(edge) = incident else {
                break;
            };
            if !self.remove_edge_as(&edge, emitter)? {
                break;
            }
        }
        let removed = self.graph_mut()?.remove_node(key);
        if removed.is_none() {
            return Ok(false);
        }
        self.broadcast(&GraphEvent::new(GraphEventKind::NodeRemoved, key.as_str(), emitter));
        Ok(true)
    }

    /// Remove an edge on behalf of `emitter`.
    ///
    /// Returns `false` (and broadcasts nothing) if the edge does not exist.
    pub fn remove_edge_as(&self, key: &EdgeKey, emitter: Emitter) -> Result<bool, StreamError> {
        let removed = self.graph_mut()?.remove_edge(key);
        if removed.is_none() {
            return Ok(false);
        }
        self.broadcast(&GraphEvent::new(GraphEventKind::EdgeRemoved, key.as_str(), emitter));
        Ok(true)
    }

    fn broadcast(&self, event: &GraphEvent) {
        let primary = snapshot(&self.inner.primary);
        let after = snapshot(&self.inner.after);
        debug!(
            generation = self.inner.generation,
            kind = %event.kind,
            key = %event.key,
            emitter = %event.emitter,
            listeners = primary.len().saturating_add(after.len()),
            "broadcasting graph event"
        );
        for listener in primary.iter().chain(after.iter()) {
            listener(event);
        }
    }
}

fn snapshot(registry: &RefCell<Vec<(ListenerId, Listener)>>) -> Vec<Listener> {
    registry
        .borrow()
        .iter()
        .map(|(_, listener)| Rc::clone(listener))
        .collect()
}
