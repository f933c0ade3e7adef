//! The audio-source graph: recursively composable pull-model nodes.
//!
//! Every node answers [`AudioSource::current_sample`] for the current instant
//! and moves forward with [`AudioSource::advance_time`]. Composites pull from
//! their children, so the device callback only ever talks to the root.

mod amplify;
mod combine;
mod dispatcher;
mod oscillator;
mod sampled;
mod scale;

pub use amplify::Amplify;
pub use combine::{Mix, Modulate, Pan, SlotId};
pub use dispatcher::{EventDispatcher, EventFn, Scheduler};
pub use oscillator::{Silence, Sine, Triangle};
pub use sampled::Sampled;
pub use scale::TimeScale;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;

/// A node in the audio-source graph.
pub trait AudioSource: Send {
    /// Output sample for `channel` at the current instant.
    ///
    /// Pure: repeated calls without an intervening `advance_time` return the
    /// same value. Must not allocate; allocation belongs to constructors and
    /// `duplicate`.
    fn current_sample(&self, channel: usize) -> f32;

    /// Advance simulated time by `delta_time` seconds, recursing into
    /// children.
    fn advance_time(&mut self, delta_time: f64);

    /// Deep-copy this node and everything below it into a fresh subgraph.
    ///
    /// Fails with [`Error::NotDuplicable`](crate::Error::NotDuplicable) when
    /// the subgraph contains a node that cannot be copied (the event
    /// dispatcher, live MIDI voices).
    fn duplicate(&self) -> Result<SharedSource>;

    /// Identity of this node, used by the cycle check on insertion.
    fn id(&self) -> NodeId;

    /// Visit the direct children of this node. Control path only.
    fn for_each_child(&self, _visit: &mut dyn FnMut(SharedSource)) {}
}

/// Shared handle to a graph node.
///
/// Children may be shared between composites; the graph is a DAG whose nodes
/// live as long as their longest holder.
pub type SharedSource = Arc<Mutex<dyn AudioSource>>;

/// Wrap a node for insertion into the graph.
pub fn shared<S: AudioSource + 'static>(source: S) -> SharedSource {
    Arc::new(Mutex::new(source))
}

/// Process-unique node identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate a fresh identity.
    pub fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        NodeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// True if `target` is `source` itself or reachable from it.
pub(crate) fn subtree_contains(source: &SharedSource, target: NodeId) -> bool {
    let mut pending = vec![Arc::clone(source)];
    while let Some(node) = pending.pop() {
        let node = node.lock();
        if node.id() == target {
            return true;
        }
        node.for_each_child(&mut |child| pending.push(child));
    }
    false
}
