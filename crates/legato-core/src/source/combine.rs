//! Combining nodes: weighted mix, modulation product, per-channel pan.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::source::{shared, subtree_contains, AudioSource, NodeId, SharedSource};

/// Stable handle to an entry in a combining node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(u64);

/// Weighted sum of its children.
///
/// Children keep insertion order, which does not affect the output; an empty
/// mix is silent.
pub struct Mix {
    id: NodeId,
    entries: Vec<(SlotId, SharedSource, f32)>,
    next_slot: u64,
}

impl Mix {
    pub fn new() -> Self {
        Self {
            id: NodeId::fresh(),
            entries: Vec::new(),
            next_slot: 0,
        }
    }

    /// Insert `source`, scaled by `gain`. Fails if the child's subtree
    /// already contains this mix.
    pub fn insert(&mut self, source: SharedSource, gain: f32) -> Result<SlotId> {
        if subtree_contains(&source, self.id) {
            return Err(Error::Cycle);
        }
        let slot = SlotId(self.next_slot);
        self.next_slot += 1;
        self.entries.push((slot, source, gain));
        Ok(slot)
    }

    /// Remove the entry behind `slot`. Returns false if it was already gone.
    pub fn remove(&mut self, slot: SlotId) -> bool {
        match self.entries.iter().position(|(entry, _, _)| *entry == slot) {
            Some(position) => {
                self.entries.remove(position);
                true
            }
            None => false,
        }
    }

    /// Remove the first entry holding `source`.
    pub fn remove_source(&mut self, source: &SharedSource) -> bool {
        match self
            .entries
            .iter()
            .position(|(_, entry, _)| Arc::ptr_eq(entry, source))
        {
            Some(position) => {
                self.entries.remove(position);
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Mix {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for Mix {
    fn current_sample(&self, channel: usize) -> f32 {
        self.entries
            .iter()
            .map(|(_, source, gain)| gain * source.lock().current_sample(channel))
            .sum()
    }

    fn advance_time(&mut self, delta_time: f64) {
        for (_, source, _) in &self.entries {
            source.lock().advance_time(delta_time);
        }
    }

    fn duplicate(&self) -> Result<SharedSource> {
        let mut copy = Mix::new();
        for (_, source, gain) in &self.entries {
            copy.insert(source.lock().duplicate()?, *gain)?;
        }
        Ok(shared(copy))
    }

    fn id(&self) -> NodeId {
        self.id
    }

    fn for_each_child(&self, visit: &mut dyn FnMut(SharedSource)) {
        for (_, source, _) in &self.entries {
            visit(source.clone());
        }
    }
}

/// Product of its children, used for ring modulation and tremolo.
///
/// An empty modulator passes unity through.
pub struct Modulate {
    id: NodeId,
    entries: Vec<(SlotId, SharedSource)>,
    next_slot: u64,
}

impl Modulate {
    pub fn new() -> Self {
        Self {
            id: NodeId::fresh(),
            entries: Vec::new(),
            next_slot: 0,
        }
    }

    /// Insert `source`. Fails if the child's subtree already contains this
    /// node.
    pub fn insert(&mut self, source: SharedSource) -> Result<SlotId> {
        if subtree_contains(&source, self.id) {
            return Err(Error::Cycle);
        }
        let slot = SlotId(self.next_slot);
        self.next_slot += 1;
        self.entries.push((slot, source));
        Ok(slot)
    }

    /// Remove the entry behind `slot`. Returns false if it was already gone.
    pub fn remove(&mut self, slot: SlotId) -> bool {
        match self.entries.iter().position(|(entry, _)| *entry == slot) {
            Some(position) => {
                self.entries.remove(position);
                true
            }
            None => false,
        }
    }

    /// Remove the first entry holding `source`.
    pub fn remove_source(&mut self, source: &SharedSource) -> bool {
        match self
            .entries
            .iter()
            .position(|(_, entry)| Arc::ptr_eq(entry, source))
        {
            Some(position) => {
                self.entries.remove(position);
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Modulate {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for Modulate {
    fn current_sample(&self, channel: usize) -> f32 {
        self.entries
            .iter()
            .map(|(_, source)| source.lock().current_sample(channel))
            .product()
    }

    fn advance_time(&mut self, delta_time: f64) {
        for (_, source) in &self.entries {
            source.lock().advance_time(delta_time);
        }
    }

    fn duplicate(&self) -> Result<SharedSource> {
        let mut copy = Modulate::new();
        for (_, source) in &self.entries {
            copy.insert(source.lock().duplicate()?)?;
        }
        Ok(shared(copy))
    }

    fn id(&self) -> NodeId {
        self.id
    }

    fn for_each_child(&self, visit: &mut dyn FnMut(SharedSource)) {
        for (_, source) in &self.entries {
            visit(source.clone());
        }
    }
}

/// Applies a fixed per-channel gain to its child.
///
/// Channels beyond the gain array pass through unmodified.
pub struct Pan {
    id: NodeId,
    source: SharedSource,
    gains: [f32; crate::channels::CHANNELS],
}

impl Pan {
    pub fn new(source: SharedSource, gains: [f32; crate::channels::CHANNELS]) -> Self {
        Self {
            id: NodeId::fresh(),
            source,
            gains,
        }
    }
}

impl AudioSource for Pan {
    fn current_sample(&self, channel: usize) -> f32 {
        match self.gains.get(channel) {
            Some(gain) => gain * self.source.lock().current_sample(channel),
            None => self.source.lock().current_sample(channel),
        }
    }

    fn advance_time(&mut self, delta_time: f64) {
        self.source.lock().advance_time(delta_time);
    }

    fn duplicate(&self) -> Result<SharedSource> {
        Ok(shared(Pan::new(self.source.lock().duplicate()?, self.gains)))
    }

    fn id(&self) -> NodeId {
        self.id
    }

    fn for_each_child(&self, visit: &mut dyn FnMut(SharedSource)) {
        visit(self.source.clone());
    }
}
