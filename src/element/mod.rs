#![forbid(unsafe_code)]
//! Graph elements: identity, lifecycle and the equality contract.
//!
//! Every concrete kind embeds an [`ElementCore`] by value and exposes it
//! through [`GraphElement`]. Equality, hashing and ordering are derived from
//! one [`ElementKey`] (kind plus compare key), so two independently built
//! handles for the same logical element are interchangeable in sets and maps.
//! This holds across wrappers as well: a [`VertexProxy`] or an OLAP-side
//! vertex compares equal to the transactional [`Vertex`] it names.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::ids::{ElementId, IdLayout, TypeTag};
use crate::types::{DecodingError, InvariantViolation};

pub mod lifecycle;

pub use lifecycle::LifecycleState;

/// Implements [`Identified`] and the std comparison traits for an element
/// type from its [`GraphElement::kind`] and [`GraphElement::compare_key`].
macro_rules! element_identity {
    ($ty:ty) => {
        impl $crate::element::Identified for $ty {
            fn element_key(&self) -> $crate::element::ElementKey {
                $crate::element::ElementKey::new(
                    $crate::element::GraphElement::kind(self),
                    $crate::element::GraphElement::compare_key(self),
                )
            }
        }

        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                $crate::element::same_element(self, other)
            }
        }

        impl Eq for $ty {}

        impl std::hash::Hash for $ty {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                std::hash::Hash::hash(&$crate::element::Identified::element_key(self), state);
            }
        }

        impl PartialOrd for $ty {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $ty {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                $crate::element::compare_elements(self, other)
            }
        }
    };
}

/// Implements `PartialEq` in both directions between two identified types.
macro_rules! cross_identity {
    ($a:ty, $b:ty) => {
        impl PartialEq<$b> for $a {
            fn eq(&self, other: &$b) -> bool {
                $crate::element::same_element(self, other)
            }
        }

        impl PartialEq<$a> for $b {
            fn eq(&self, other: &$a) -> bool {
                $crate::element::same_element(self, other)
            }
        }
    };
}

pub(crate) use cross_identity;
pub(crate) use element_identity;

mod edge;
mod property;
mod proxy;
mod vertex;

pub use edge::Edge;
pub use property::{Cardinality, PropertyValue, VertexProperty};
pub use proxy::VertexProxy;
pub use vertex::Vertex;

/// Element kind taking part in identity. Two elements of different kinds are
/// never equal, whatever their ids.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// Vertex.
    Vertex,
    /// Edge.
    Edge,
    /// Vertex property.
    VertexProperty,
}

impl ElementKind {
    /// Type tag used when encoding ids for this kind.
    pub const fn type_tag(self) -> TypeTag {
        match self {
            ElementKind::Vertex => TypeTag::Vertex,
            ElementKind::Edge => TypeTag::Edge,
            ElementKind::VertexProperty => TypeTag::Property,
        }
    }

    /// Kind denoted by a type tag; schema types have none.
    pub const fn from_type_tag(tag: TypeTag) -> Option<Self> {
        match tag {
            TypeTag::Vertex => Some(ElementKind::Vertex),
            TypeTag::Edge => Some(ElementKind::Edge),
            TypeTag::Property => Some(ElementKind::VertexProperty),
            TypeTag::Schema => None,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::Vertex => "vertex",
            ElementKind::Edge => "edge",
            ElementKind::VertexProperty => "vertex_property",
        };
        f.write_str(name)
    }
}

/// Identity of an element: its kind and compare key.
///
/// Hashing only looks at `key`, so proxy/target pairs land in the same bucket
/// regardless of how they were built. Ordering is by `key` first; `kind` only
/// breaks ties so the order stays consistent with equality.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct ElementKey {
    /// Element kind.
    pub kind: ElementKind,
    /// Compare key, usually the element id.
    pub key: i64,
}

impl ElementKey {
    /// Creates a key.
    pub const fn new(kind: ElementKind, key: i64) -> Self {
        Self { kind, key }
    }
}

impl Hash for ElementKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for ElementKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ElementKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.kind.cmp(&other.kind))
    }
}

/// Anything that carries element identity, including bare references handed
/// in from outside the element model.
pub trait Identified {
    /// Kind and compare key of the element.
    fn element_key(&self) -> ElementKey;
}

impl Identified for ElementKey {
    fn element_key(&self) -> ElementKey {
        *self
    }
}

/// Bare identifier-bearing value from an external representation, such as a
/// row decoded by the storage layer or a vertex named in an OLAP message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub struct ExternalRef {
    /// Element kind.
    pub kind: ElementKind,
    /// Element id.
    pub id: ElementId,
}

impl ExternalRef {
    /// Reference to a vertex.
    pub const fn vertex(id: ElementId) -> Self {
        Self {
            kind: ElementKind::Vertex,
            id,
        }
    }

    /// Reference to an edge.
    pub const fn edge(id: ElementId) -> Self {
        Self {
            kind: ElementKind::Edge,
            id,
        }
    }
}

impl Identified for ExternalRef {
    fn element_key(&self) -> ElementKey {
        ElementKey::new(self.kind, self.id.raw())
    }
}

/// Returns `true` when both values denote the same logical element.
///
/// Base identity only; kind-specific structural checks such as
/// [`Edge::structurally_eq`] are separate.
pub fn same_element<A, B>(a: &A, b: &B) -> bool
where
    A: Identified + ?Sized,
    B: Identified + ?Sized,
{
    a.element_key() == b.element_key()
}

/// Total order over identified values by compare key.
pub fn compare_elements<A, B>(a: &A, b: &B) -> Ordering
where
    A: Identified + ?Sized,
    B: Identified + ?Sized,
{
    a.element_key().cmp(&b.element_key())
}

/// Identifier plus lifecycle state, embedded by value in every element kind.
///
/// The id is immutable once persisted; [`ElementCore::assign_id`] is the only
/// way to set it and refuses to overwrite a persisted value.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct ElementCore {
    id: ElementId,
    lifecycle: LifecycleState,
}

impl ElementCore {
    /// Element created in the current transaction under a temporary or
    /// virtual id.
    pub fn new_element(id: ElementId) -> Self {
        debug_assert!(!id.is_persisted(), "new elements start without a persisted id");
        Self {
            id,
            lifecycle: LifecycleState::New,
        }
    }

    /// Element materialized from storage. Only persisted ids exist there.
    pub fn loaded(id: ElementId) -> Result<Self, DecodingError> {
        if !id.is_persisted() {
            return Err(DecodingError::NotPersisted(id.raw()));
        }
        Ok(Self {
            id,
            lifecycle: LifecycleState::Loaded,
        })
    }

    /// Implied element with no storage footprint. Never persisted.
    pub fn virtual_element() -> Self {
        Self::new_element(ElementId::VIRTUAL)
    }

    #[cfg(test)]
    pub(crate) fn with_state(id: ElementId, lifecycle: LifecycleState) -> Self {
        Self { id, lifecycle }
    }

    /// Current identifier.
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle
    }

    /// `true` unless the id is a temporary placeholder.
    pub fn has_id(&self) -> bool {
        !self.id.is_temporary()
    }

    /// Assigns the persisted id at commit and promotes `New` to `Loaded`.
    /// Only an unremoved `New` element without a persisted id accepts one.
    pub fn assign_id(&mut self, id: ElementId) -> Result<(), InvariantViolation> {
        if !id.is_persisted() {
            return Err(InvariantViolation::NonPositiveId(id.raw()));
        }
        if self.id.is_persisted() {
            return Err(InvariantViolation::AlreadyPersisted {
                current: self.id.raw(),
                attempted: id.raw(),
            });
        }
        match self.lifecycle {
            LifecycleState::New => {}
            LifecycleState::Loaded => return Err(InvariantViolation::NotNew(self.id.raw())),
            LifecycleState::Removed | LifecycleState::LoadedRemoved => {
                return Err(InvariantViolation::AlreadyRemoved(self.id.raw()))
            }
        }
        self.id = id;
        self.lifecycle = self.lifecycle.committed();
        Ok(())
    }

    /// Applies the delete transition.
    pub fn mark_removed(&mut self) -> Result<(), InvariantViolation> {
        match self.lifecycle.removed() {
            Some(next) => {
                self.lifecycle = next;
                Ok(())
            }
            None => Err(InvariantViolation::AlreadyRemoved(self.id.raw())),
        }
    }
}

/// Shared identity and lifecycle surface of vertices, edges and properties.
pub trait GraphElement: Identified {
    /// Embedded identity state.
    fn core(&self) -> &ElementCore;

    /// Mutable identity state.
    fn core_mut(&mut self) -> &mut ElementCore;

    /// Element kind.
    fn kind(&self) -> ElementKind;

    /// Current identifier (temporary, virtual or persisted).
    fn id(&self) -> ElementId {
        self.core().id()
    }

    /// Value used for equality, hashing and ordering. Wrappers that stand in
    /// for another element return the id of the element they proxy.
    fn compare_key(&self) -> i64 {
        self.id().raw()
    }

    /// Current lifecycle state.
    fn lifecycle(&self) -> LifecycleState {
        self.core().lifecycle()
    }

    /// See [`LifecycleState::is_new`].
    fn is_new(&self) -> bool {
        self.lifecycle().is_new()
    }

    /// See [`LifecycleState::is_loaded`].
    fn is_loaded(&self) -> bool {
        self.lifecycle().is_loaded()
    }

    /// See [`LifecycleState::is_removed`].
    fn is_removed(&self) -> bool {
        self.lifecycle().is_removed()
    }

    /// `true` unless the id is still a temporary placeholder.
    fn has_id(&self) -> bool {
        self.core().has_id()
    }

    /// `true` for persisted ids carrying the invisibility flag.
    fn is_invisible(&self, layout: &IdLayout) -> bool {
        layout.is_invisible(self.id().raw()).unwrap_or(false)
    }

    /// See [`ElementCore::assign_id`].
    fn assign_id(&mut self, id: ElementId) -> Result<(), InvariantViolation> {
        self.core_mut().assign_id(id)
    }

    /// See [`ElementCore::mark_removed`].
    fn remove(&mut self) -> Result<(), InvariantViolation> {
        self.core_mut().mark_removed()
    }
}

/// Any element kind, for heterogeneous element sets.
#[derive(Clone, Debug)]
pub enum Element {
    /// Vertex.
    Vertex(Vertex),
    /// Edge.
    Edge(Edge),
    /// Vertex property.
    Property(VertexProperty),
}

impl Element {
    /// Returns the vertex, if this is one.
    pub fn as_vertex(&self) -> Option<&Vertex> {
        match self {
            Element::Vertex(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the edge, if this is one.
    pub fn as_edge(&self) -> Option<&Edge> {
        match self {
            Element::Edge(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the property, if this is one.
    pub fn as_property(&self) -> Option<&VertexProperty> {
        match self {
            Element::Property(p) => Some(p),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn GraphElement {
        match self {
            Element::Vertex(v) => v,
            Element::Edge(e) => e,
            Element::Property(p) => p,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn GraphElement {
        match self {
            Element::Vertex(v) => v,
            Element::Edge(e) => e,
            Element::Property(p) => p,
        }
    }
}

impl GraphElement for Element {
    fn core(&self) -> &ElementCore {
        self.inner().core()
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        self.inner_mut().core_mut()
    }

    fn kind(&self) -> ElementKind {
        self.inner().kind()
    }

    fn compare_key(&self) -> i64 {
        self.inner().compare_key()
    }
}

element_identity!(Element);
cross_identity!(Element, Vertex);
cross_identity!(Element, Edge);
cross_identity!(Element, VertexProperty);

impl From<Vertex> for Element {
    fn from(value: Vertex) -> Self {
        Element::Vertex(value)
    }
}

impl From<Edge> for Element {
    fn from(value: Edge) -> Self {
        Element::Edge(value)
    }
}

impl From<VertexProperty> for Element {
    fn from(value: VertexProperty) -> Self {
        Element::Property(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::{BTreeSet, HashSet};
    use std::hash::BuildHasher;

    #[test]
    fn temporary_element_gets_one_assignment() {
        let mut core = ElementCore::new_element(ElementId(-7));
        assert!(core.id().is_temporary());
        assert!(!core.has_id());
        assert_eq!(core.lifecycle(), LifecycleState::New);

        core.assign_id(ElementId(1001)).unwrap();
        assert_eq!(core.id(), ElementId(1001));
        assert_eq!(core.lifecycle(), LifecycleState::Loaded);

        assert_eq!(
            core.assign_id(ElementId(1002)),
            Err(InvariantViolation::AlreadyPersisted {
                current: 1001,
                attempted: 1002
            })
        );
        assert_eq!(core.id(), ElementId(1001));
    }

    #[test]
    fn loaded_element_refuses_assignment() {
        let mut core = ElementCore::loaded(ElementId(10)).unwrap();
        assert!(core.assign_id(ElementId(11)).is_err());
        assert_eq!(core.id(), ElementId(10));
    }

    #[test]
    fn loaded_requires_a_persisted_id() {
        assert_eq!(
            ElementCore::loaded(ElementId(-3)),
            Err(DecodingError::NotPersisted(-3))
        );
        assert_eq!(
            ElementCore::loaded(ElementId::VIRTUAL),
            Err(DecodingError::NotPersisted(0))
        );
    }

    #[test]
    fn virtual_element_promoted_once_then_refuses() {
        let mut core = ElementCore::virtual_element();
        core.assign_id(ElementId(8)).unwrap();
        assert_eq!(core.lifecycle(), LifecycleState::Loaded);
        assert!(core.assign_id(ElementId(9)).is_err());
        assert_eq!(core.id(), ElementId(8));
    }

    #[test]
    fn only_new_elements_accept_an_id() {
        let mut core = ElementCore {
            id: ElementId(-3),
            lifecycle: LifecycleState::Loaded,
        };
        assert_eq!(
            core.assign_id(ElementId(5)),
            Err(InvariantViolation::NotNew(-3))
        );
        assert_eq!(core.id(), ElementId(-3));
        assert_eq!(core.lifecycle(), LifecycleState::Loaded);
    }

    #[test]
    fn non_positive_assignment_is_refused() {
        let mut core = ElementCore::new_element(ElementId(-1));
        assert_eq!(
            core.assign_id(ElementId(0)),
            Err(InvariantViolation::NonPositiveId(0))
        );
        assert_eq!(
            core.assign_id(ElementId(-4)),
            Err(InvariantViolation::NonPositiveId(-4))
        );
        assert_eq!(core.id(), ElementId(-1));
    }

    #[test]
    fn removed_new_element_cannot_be_assigned() {
        let mut core = ElementCore::new_element(ElementId(-5));
        core.mark_removed().unwrap();
        assert_eq!(
            core.assign_id(ElementId(9)),
            Err(InvariantViolation::AlreadyRemoved(-5))
        );
    }

    #[test]
    fn double_remove_is_refused() {
        let mut core = ElementCore::loaded(ElementId(10)).unwrap();
        core.mark_removed().unwrap();
        assert_eq!(core.lifecycle(), LifecycleState::LoadedRemoved);
        assert_eq!(
            core.mark_removed(),
            Err(InvariantViolation::AlreadyRemoved(10))
        );
    }

    #[test]
    fn virtual_core_has_an_id_but_is_not_persisted() {
        let core = ElementCore::virtual_element();
        assert!(core.has_id());
        assert!(core.id().is_virtual());
        assert_eq!(core.lifecycle(), LifecycleState::New);
    }

    #[test]
    fn same_id_different_kind_is_unequal() {
        let vertex = Vertex::loaded(ElementId(55), "person").unwrap();
        let edge = Edge::loaded(ElementId(55), "knows", ElementId(1), ElementId(2)).unwrap();
        assert!(!same_element(&vertex, &edge));
        assert_ne!(Element::from(vertex.clone()), edge);
        assert_eq!(Element::from(vertex.clone()), vertex);
    }

    #[test]
    fn external_reference_compares_like_an_element() {
        let vertex = Vertex::loaded(ElementId(55), "person").unwrap();
        assert!(same_element(&vertex, &ExternalRef::vertex(ElementId(55))));
        assert!(!same_element(&vertex, &ExternalRef::edge(ElementId(55))));
        assert_eq!(
            compare_elements(&vertex, &ExternalRef::vertex(ElementId(56))),
            Ordering::Less
        );
    }

    #[test]
    fn ordering_is_by_compare_key() {
        let set: BTreeSet<Vertex> = [30, 2, 7, 30]
            .into_iter()
            .map(|id| Vertex::loaded(ElementId(id), "v").unwrap())
            .chain([Vertex::new(ElementId(-2), "v")])
            .collect();
        let ids: Vec<i64> = set.iter().map(|v| v.id().raw()).collect();
        assert_eq!(ids, vec![-2, 2, 7, 30]);
    }

    #[test]
    fn element_enum_dedups_in_hash_sets() {
        let mut set = HashSet::new();
        set.insert(Element::from(Vertex::loaded(ElementId(3), "a").unwrap()));
        set.insert(Element::from(Vertex::loaded(ElementId(3), "b").unwrap()));
        set.insert(Element::from(
            Edge::loaded(ElementId(3), "e", ElementId(1), ElementId(2)).unwrap(),
        ));
        assert_eq!(set.len(), 2);
    }

    proptest! {
        #[test]
        fn equal_keys_imply_equal_hashes(id in 1i64..i64::MAX, label_a in "[a-z]{1,6}", label_b in "[a-z]{1,6}") {
            let a = Vertex::loaded(ElementId(id), label_a).unwrap();
            let b = Vertex::loaded(ElementId(id), label_b).unwrap();
            prop_assert_eq!(a.compare_key(), b.compare_key());
            prop_assert!(a == b);
            let state = std::collections::hash_map::RandomState::new();
            prop_assert_eq!(state.hash_one(&a), state.hash_one(&b));
        }

        #[test]
        fn key_order_is_total(a in any::<i64>(), b in any::<i64>()) {
            let ka = ElementKey::new(ElementKind::Vertex, a);
            let kb = ElementKey::new(ElementKind::Vertex, b);
            prop_assert_eq!(ka.cmp(&kb), a.cmp(&b));
            prop_assert_eq!(ka == kb, a == b);
        }
    }

    #[test]
    fn key_hash_ignores_kind() {
        let state = std::collections::hash_map::RandomState::new();
        assert_eq!(
            state.hash_one(ElementKey::new(ElementKind::Vertex, 9)),
            state.hash_one(ElementKey::new(ElementKind::Edge, 9))
        );
    }
}
