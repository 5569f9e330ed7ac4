#![forbid(unsafe_code)]
//! Entry point for vertex-centric bulk computation.
//!
//! A [`TraversalRoot`] is bound to exactly one transaction for its whole
//! life; the borrow makes it impossible to hand it to another. Vertices it
//! produces are [`ComputeVertex`] wrappers that satisfy the same identity
//! contract as transactional [`Vertex`]es, so results computed per partition
//! can be merged with results keyed by transactional elements.

use std::collections::hash_map::Entry;
use std::collections::BTreeMap;
use std::thread;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::IdConfig;
use crate::element::{
    cross_identity, element_identity, Element, ElementCore, ElementKey, ElementKind,
    GraphElement, Identified, Vertex, VertexProxy,
};
use crate::ids::{ElementId, IdLayout};
use crate::tx::{Transaction, TxId};
use crate::types::DecodingError;

/// Read-only, partition-local view of a persisted vertex.
#[derive(Clone, Debug)]
pub struct ComputeVertex {
    core: ElementCore,
    label: String,
    partition: u32,
}

impl ComputeVertex {
    /// Wraps a persisted vertex living in `partition`.
    pub fn new(
        id: ElementId,
        label: impl Into<String>,
        partition: u32,
    ) -> Result<Self, DecodingError> {
        Ok(Self {
            core: ElementCore::loaded(id)?,
            label: label.into(),
            partition,
        })
    }

    /// Vertex label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Partition that owns this vertex.
    pub fn partition(&self) -> u32 {
        self.partition
    }
}

impl GraphElement for ComputeVertex {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Vertex
    }
}

element_identity!(ComputeVertex);
cross_identity!(ComputeVertex, Vertex);
cross_identity!(ComputeVertex, VertexProxy);
cross_identity!(ComputeVertex, Element);

/// Traversal anchored to one transaction.
#[derive(Debug, Clone, Copy)]
pub struct TraversalRoot<'tx> {
    tx: &'tx Transaction,
    layout: IdLayout,
    hide_invisible: bool,
}

impl<'tx> TraversalRoot<'tx> {
    /// Binds a root to `tx`, hiding invisible vertices.
    pub fn of(tx: &'tx Transaction) -> Self {
        Self {
            tx,
            layout: tx.layout(),
            hide_invisible: true,
        }
    }

    /// Binds a root to `tx` using the visibility rule from `config`.
    pub fn with_config(tx: &'tx Transaction, config: &IdConfig) -> Self {
        Self {
            hide_invisible: config.hide_invisible,
            ..Self::of(tx)
        }
    }

    /// Transaction this root is bound to.
    pub fn tx_id(&self) -> TxId {
        self.tx.id()
    }

    /// Persisted, live vertices of the bound transaction. Vertices still
    /// holding a temporary id are skipped; their ids mean nothing outside
    /// the transaction.
    pub fn vertices(&self) -> impl Iterator<Item = ComputeVertex> + 'tx {
        let tx = self.tx;
        let layout = self.layout;
        let hide_invisible = self.hide_invisible;
        tx.placed_vertices()
            .filter(move |(_, v)| !(hide_invisible && v.is_invisible(&layout)))
            .filter_map(|(partition, v)| ComputeVertex::new(v.id(), v.label(), partition).ok())
    }

    /// Vertex with the given id, if visible to this root.
    pub fn vertex(&self, id: ElementId) -> Option<ComputeVertex> {
        self.vertices().find(|v| v.id() == id)
    }

    /// Vertices owned by one partition.
    pub fn partition(&self, partition: u32) -> Vec<ComputeVertex> {
        self.vertices()
            .filter(|v| v.partition() == partition)
            .collect()
    }

    /// Vertices grouped by partition, in partition order.
    pub fn partitions(&self) -> BTreeMap<u32, Vec<ComputeVertex>> {
        let mut grouped: BTreeMap<u32, Vec<ComputeVertex>> = BTreeMap::new();
        for vertex in self.vertices() {
            grouped.entry(vertex.partition()).or_default().push(vertex);
        }
        grouped
    }

    /// Handle for a vertex named by a neighbour, without materializing it.
    pub fn proxy(&self, id: ElementId) -> VertexProxy {
        VertexProxy::new(id)
    }

    /// Runs `compute` once per partition on its own thread and returns the
    /// results in partition order. Each call owns its partition's vertices.
    pub fn scatter<F, R>(&self, compute: F) -> Vec<(u32, R)>
    where
        F: Fn(u32, &[ComputeVertex]) -> R + Sync,
        R: Send,
    {
        let grouped = self.partitions();
        debug!(
            tx_id = self.tx_id(),
            partitions = grouped.len(),
            "olap.scatter.start"
        );
        let compute = &compute;
        thread::scope(|scope| {
            let handles: Vec<_> = grouped
                .iter()
                .map(|(&partition, vertices)| {
                    scope.spawn(move || {
                        debug!(partition, vertices = vertices.len(), "olap.partition.run");
                        (partition, compute(partition, vertices.as_slice()))
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
                })
                .collect()
        })
    }
}

/// Folds keyed results into one entry per logical element, whichever
/// wrapper produced the key.
pub fn merge_by_identity<K, V, I, C>(results: I, mut combine: C) -> FxHashMap<ElementKey, V>
where
    K: Identified,
    I: IntoIterator<Item = (K, V)>,
    C: FnMut(&mut V, V),
{
    let mut merged: FxHashMap<ElementKey, V> = FxHashMap::default();
    for (key, value) in results {
        match merged.entry(key.element_key()) {
            Entry::Occupied(mut slot) => combine(slot.get_mut(), value),
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
        }
    }
    merged
}
