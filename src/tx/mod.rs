#![forbid(unsafe_code)]
//! In-memory transaction: owns the elements it materializes and assigns
//! persisted ids at commit.
//!
//! A transaction is single-threaded. Elements never leave it by reference
//! for mutation; other transactions observe them only after commit, through
//! storage.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::config::IdConfig;
use crate::element::{
    Cardinality, Edge, Element, ElementKey, ElementKind, ExternalRef, GraphElement, Identified,
    LifecycleState, PropertyValue, Vertex, VertexProperty,
};
use crate::ids::{ElementId, IdLayout};
use crate::types::{DecodingError, EncodingError, InvariantViolation, Result};

pub mod allocator;

pub use allocator::{IdAllocator, SequenceAllocator, SharedAllocator};

/// Transaction identifier.
pub type TxId = u64;

/// The state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxState {
    /// Accepting operations.
    Active,
    /// Ids assigned and batch handed to storage.
    Committed,
    /// Discarded on request.
    RolledBack,
    /// Discarded after an identity invariant violation.
    Aborted,
}

/// Position of an element inside its owning transaction.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ElementHandle(usize);

impl ElementHandle {
    /// Raw slot index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// What a commit contributes to the storage write batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommitBatch {
    /// New elements, under their freshly assigned ids.
    pub writes: Vec<ExternalRef>,
    /// Loaded elements removed in this transaction.
    pub deletes: Vec<ExternalRef>,
    /// Elements created and removed in this transaction; nothing to store.
    pub discarded: usize,
    /// Temporary id to persisted id, in assignment order.
    pub assigned: Vec<(ElementId, ElementId)>,
}

#[derive(Debug, Clone)]
struct Slot {
    element: Element,
    partition: u32,
    invisible: bool,
}

/// A transaction over graph elements.
#[derive(Debug)]
pub struct Transaction {
    id: TxId,
    state: TxState,
    layout: IdLayout,
    next_temporary: Option<i64>,
    slots: Vec<Slot>,
    index: HashMap<ElementKey, ElementHandle>,
}

impl Transaction {
    /// Opens a transaction.
    pub fn begin(id: TxId, config: &IdConfig) -> Result<Self> {
        config.validate()?;
        let layout = config.layout()?;
        debug!(tx_id = id, partition_bits = layout.partition_bits(), "tx.begin");
        Ok(Self {
            id,
            state: TxState::Active,
            layout,
            next_temporary: Some(config.temporary_id_start),
            slots: Vec::new(),
            index: HashMap::new(),
        })
    }

    /// Returns the unique identifier for this transaction.
    pub fn id(&self) -> TxId {
        self.id
    }

    /// Returns the current state of the transaction.
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Codec layout used at commit.
    pub fn layout(&self) -> IdLayout {
        self.layout
    }

    /// Number of elements materialized, removed ones included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// `true` when nothing has been materialized.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Creates a vertex in `partition` under a temporary id.
    pub fn add_vertex(&mut self, label: impl Into<String>, partition: u32) -> Result<ElementHandle> {
        let result = self.create_vertex(label.into(), partition, false);
        self.guard(result)
    }

    /// Creates a system vertex whose persisted id carries the invisibility
    /// flag.
    pub fn add_system_vertex(
        &mut self,
        label: impl Into<String>,
        partition: u32,
    ) -> Result<ElementHandle> {
        let result = self.create_vertex(label.into(), partition, true);
        self.guard(result)
    }

    /// Creates an edge stored in the partition of its out vertex.
    pub fn add_edge(
        &mut self,
        label: impl Into<String>,
        out_vertex: ElementHandle,
        in_vertex: ElementHandle,
    ) -> Result<ElementHandle> {
        let result = self.create_edge(label.into(), out_vertex, in_vertex);
        self.guard(result)
    }

    /// Adds a property to a vertex, honouring `cardinality`:
    /// `Single` replaces live values under the same key, `Set` returns the
    /// existing handle for an equal value, `List` always appends.
    pub fn add_property(
        &mut self,
        vertex: ElementHandle,
        key: impl Into<String>,
        value: PropertyValue,
        cardinality: Cardinality,
    ) -> Result<ElementHandle> {
        let result = self.create_property(vertex, key.into(), value, cardinality);
        self.guard(result)
    }

    /// Materializes an element read from storage. The element must be
    /// `Loaded` and its id's tag must match its kind. Loading the same logical
    /// element twice returns the handle of the first copy.
    pub fn load(&mut self, element: impl Into<Element>) -> Result<ElementHandle> {
        let result = self.load_element(element.into());
        self.guard(result)
    }

    /// Marks an element removed. Removing a vertex also removes its live
    /// edges and properties.
    pub fn remove(&mut self, handle: ElementHandle) -> Result<()> {
        let result = self.remove_element(handle);
        self.guard(result)
    }

    /// Returns the element behind `handle`, removed or not.
    pub fn get(&self, handle: ElementHandle) -> Result<&Element> {
        self.slot(handle).map(|slot| &slot.element)
    }

    /// Handle of the element identified by `key`, if materialized here.
    pub fn find<K: Identified + ?Sized>(&self, key: &K) -> Option<ElementHandle> {
        self.index.get(&key.element_key()).copied()
    }

    /// Elements not removed in this transaction.
    pub fn visible(&self) -> impl Iterator<Item = &Element> + '_ {
        self.slots
            .iter()
            .map(|slot| &slot.element)
            .filter(|element| !element.is_removed())
    }

    /// Vertices not removed in this transaction.
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> + '_ {
        self.visible().filter_map(Element::as_vertex)
    }

    /// Vertices not removed in this transaction, with their partition.
    pub fn placed_vertices(&self) -> impl Iterator<Item = (u32, &Vertex)> + '_ {
        self.slots.iter().filter_map(|slot| match &slot.element {
            Element::Vertex(v) if !v.is_removed() => Some((slot.partition, v)),
            _ => None,
        })
    }

    /// Live properties of a vertex.
    pub fn properties(&self, vertex: ElementHandle) -> Result<Vec<&VertexProperty>> {
        let (vertex_id, _) = self.live_vertex(vertex)?;
        Ok(self
            .visible()
            .filter_map(Element::as_property)
            .filter(|p| p.vertex() == vertex_id)
            .collect())
    }

    /// Assigns persisted ids and returns the storage batch.
    ///
    /// Sequences are drawn for every pending element before any element is
    /// touched: an allocation or encoding failure leaves the transaction
    /// active and unchanged. An invariant violation while applying ids aborts
    /// the transaction.
    pub fn commit(&mut self, allocator: &mut dyn IdAllocator) -> Result<CommitBatch> {
        self.ensure_active()?;
        debug!(tx_id = self.id, elements = self.slots.len(), "tx.commit.start");
        let plan = match self.plan_assignments(allocator) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(tx_id = self.id, error = %err, "tx.commit.allocation_failed");
                return Err(err);
            }
        };
        let result = self.apply_assignments(plan);
        let batch = self.guard(result)?;
        self.state = TxState::Committed;
        debug!(
            tx_id = self.id,
            writes = batch.writes.len(),
            deletes = batch.deletes.len(),
            discarded = batch.discarded,
            "tx.commit.done"
        );
        Ok(batch)
    }

    /// Discards the transaction, returning how many new elements were
    /// dropped. No persisted id was ever handed out, so nothing needs undoing.
    pub fn rollback(&mut self) -> Result<usize> {
        self.ensure_active()?;
        let discarded = self.slots.iter().filter(|s| s.element.is_new()).count();
        self.state = TxState::RolledBack;
        debug!(tx_id = self.id, discarded, "tx.rollback");
        Ok(discarded)
    }

    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if err.is_fatal() && self.state == TxState::Active {
                self.state = TxState::Aborted;
                error!(tx_id = self.id, error = %err, "tx.aborted");
            }
        }
        result
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state != TxState::Active {
            return Err(InvariantViolation::TransactionClosed(self.id).into());
        }
        Ok(())
    }

    fn check_partition(&self, partition: u32) -> Result<()> {
        if partition > self.layout.max_partition() {
            return Err(EncodingError::PartitionOverflow {
                partition,
                max: self.layout.max_partition(),
            }
            .into());
        }
        Ok(())
    }

    fn temporary_id(&mut self) -> Result<ElementId> {
        let id = self.next_temporary.ok_or(EncodingError::TemporaryExhausted)?;
        self.next_temporary = id.checked_sub(1);
        Ok(ElementId(id))
    }

    fn slot(&self, handle: ElementHandle) -> Result<&Slot> {
        self.slots
            .get(handle.0)
            .ok_or_else(|| InvariantViolation::UnknownHandle(handle.0).into())
    }

    fn push(&mut self, element: Element, partition: u32, invisible: bool) -> ElementHandle {
        let handle = ElementHandle(self.slots.len());
        self.index.insert(element.element_key(), handle);
        self.slots.push(Slot {
            element,
            partition,
            invisible,
        });
        handle
    }

    fn live_vertex(&self, handle: ElementHandle) -> Result<(ElementId, u32)> {
        let slot = self.slot(handle)?;
        let vertex = slot
            .element
            .as_vertex()
            .ok_or(InvariantViolation::NotAVertex(handle.0))?;
        if vertex.is_removed() {
            return Err(InvariantViolation::AlreadyRemoved(vertex.id().raw()).into());
        }
        Ok((vertex.id(), slot.partition))
    }

    fn create_vertex(&mut self, label: String, partition: u32, invisible: bool) -> Result<ElementHandle> {
        self.ensure_active()?;
        self.check_partition(partition)?;
        let id = self.temporary_id()?;
        Ok(self.push(Element::Vertex(Vertex::new(id, label)), partition, invisible))
    }

    fn create_edge(
        &mut self,
        label: String,
        out_vertex: ElementHandle,
        in_vertex: ElementHandle,
    ) -> Result<ElementHandle> {
        self.ensure_active()?;
        let (out_id, partition) = self.live_vertex(out_vertex)?;
        let (in_id, _) = self.live_vertex(in_vertex)?;
        let id = self.temporary_id()?;
        let edge = Edge::new(id, label, out_id, in_id);
        Ok(self.push(Element::Edge(edge), partition, false))
    }

    fn create_property(
        &mut self,
        vertex: ElementHandle,
        key: String,
        value: PropertyValue,
        cardinality: Cardinality,
    ) -> Result<ElementHandle> {
        self.ensure_active()?;
        let (vertex_id, partition) = self.live_vertex(vertex)?;
        let existing: Vec<ElementHandle> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| match &slot.element {
                Element::Property(p)
                    if !p.is_removed() && p.vertex() == vertex_id && p.key() == key =>
                {
                    Some(ElementHandle(idx))
                }
                _ => None,
            })
            .collect();
        if cardinality == Cardinality::Set {
            let duplicate = existing.iter().copied().find(|handle| {
                self.slots[handle.0]
                    .element
                    .as_property()
                    .is_some_and(|p| p.value() == &value)
            });
            if let Some(handle) = duplicate {
                return Ok(handle);
            }
        }
        let id = self.temporary_id()?;
        if cardinality == Cardinality::Single {
            for handle in existing {
                self.slots[handle.0].element.remove()?;
            }
        }
        let property = VertexProperty::new(id, vertex_id, key, value, cardinality);
        Ok(self.push(Element::Property(property), partition, false))
    }

    fn load_element(&mut self, element: Element) -> Result<ElementHandle> {
        self.ensure_active()?;
        let id = element.id().raw();
        let decoded = self.layout.decode(id)?;
        if ElementKind::from_type_tag(decoded.type_tag) != Some(element.kind()) {
            return Err(DecodingError::TagMismatch {
                id,
                tag: decoded.type_tag,
                kind: element.kind(),
            }
            .into());
        }
        match element.lifecycle() {
            LifecycleState::Loaded => {}
            LifecycleState::New => return Err(InvariantViolation::NotLoaded(id).into()),
            LifecycleState::Removed | LifecycleState::LoadedRemoved => {
                return Err(InvariantViolation::AlreadyRemoved(id).into())
            }
        }
        if let Some(handle) = self.find(&element) {
            return Ok(handle);
        }
        debug!(
            tx_id = self.id,
            id = element.id().raw(),
            partition = decoded.partition,
            "tx.load"
        );
        Ok(self.push(element, decoded.partition, decoded.invisible))
    }

    fn remove_element(&mut self, handle: ElementHandle) -> Result<()> {
        self.ensure_active()?;
        let slot = self
            .slots
            .get_mut(handle.0)
            .ok_or(InvariantViolation::UnknownHandle(handle.0))?;
        slot.element.remove()?;
        let Some(vertex_id) = slot.element.as_vertex().map(GraphElement::id) else {
            return Ok(());
        };
        let mut cascaded = 0usize;
        for slot in &mut self.slots {
            let incident = match &slot.element {
                Element::Edge(e) => e.other_vertex(vertex_id).is_some(),
                Element::Property(p) => p.vertex() == vertex_id,
                Element::Vertex(_) => false,
            };
            if incident && !slot.element.is_removed() {
                slot.element.remove()?;
                cascaded += 1;
            }
        }
        debug!(tx_id = self.id, vertex = vertex_id.raw(), cascaded, "tx.remove_vertex");
        Ok(())
    }

    fn plan_assignments(&self, allocator: &mut dyn IdAllocator) -> Result<Vec<(usize, ElementId)>> {
        let (vertices, others): (Vec<_>, Vec<_>) = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.element.lifecycle() == LifecycleState::New)
            .partition(|(_, slot)| matches!(slot.element, Element::Vertex(_)));
        let mut plan = Vec::with_capacity(vertices.len() + others.len());
        for (idx, slot) in vertices.into_iter().chain(others) {
            let tag = slot.element.kind().type_tag();
            let sequence = allocator.next_sequence(slot.partition, tag)?;
            let id = self
                .layout
                .encode(slot.partition, tag, sequence, slot.invisible)?;
            plan.push((idx, id));
        }
        Ok(plan)
    }

    fn apply_assignments(&mut self, plan: Vec<(usize, ElementId)>) -> Result<CommitBatch> {
        let mut batch = CommitBatch::default();
        let mut assigned = HashMap::with_capacity(plan.len());
        for (idx, id) in plan {
            let element = &mut self.slots[idx].element;
            let temporary = element.id();
            element.assign_id(id)?;
            assigned.insert(temporary, id);
            batch.assigned.push((temporary, id));
            batch.writes.push(ExternalRef {
                kind: element.kind(),
                id,
            });
        }
        for slot in &mut self.slots {
            match &mut slot.element {
                Element::Edge(e) => e.rewrite_endpoints(&assigned),
                Element::Property(p) => p.rewrite_vertex(&assigned),
                Element::Vertex(_) => {}
            }
            match slot.element.lifecycle() {
                LifecycleState::LoadedRemoved => batch.deletes.push(ExternalRef {
                    kind: slot.element.kind(),
                    id: slot.element.id(),
                }),
                LifecycleState::Removed => batch.discarded += 1,
                LifecycleState::New | LifecycleState::Loaded => {}
            }
        }
        self.index = self
            .slots
            .iter()
            .enumerate()
            .map(|(idx, slot)| (slot.element.element_key(), ElementHandle(idx)))
            .collect();
        Ok(batch)
    }
}
