use crate::ids::ElementId;

use super::{cross_identity, element_identity, ElementCore, ElementKind, GraphElement, Vertex};

/// Virtual handle standing in for a vertex it does not own, for example a
/// neighbour named in a message during bulk computation.
///
/// The proxy's own id is virtual; its compare key is the target's id, so it
/// is equal to, and hashes with, the vertex it names.
#[derive(Clone, Debug)]
pub struct VertexProxy {
    core: ElementCore,
    target: ElementId,
}

impl VertexProxy {
    /// Proxy for `target`.
    pub fn new(target: ElementId) -> Self {
        Self {
            core: ElementCore::virtual_element(),
            target,
        }
    }

    /// Id of the proxied vertex.
    pub fn target(&self) -> ElementId {
        self.target
    }
}

impl GraphElement for VertexProxy {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Vertex
    }

    fn compare_key(&self) -> i64 {
        self.target.raw()
    }
}

element_identity!(VertexProxy);
cross_identity!(VertexProxy, Vertex);
