use std::collections::HashMap;

use crate::ids::ElementId;
use crate::types::DecodingError;

use super::{element_identity, ElementCore, ElementKind, GraphElement};

/// Directed, labelled edge between two vertices.
#[derive(Clone, Debug)]
pub struct Edge {
    core: ElementCore,
    label: String,
    out_vertex: ElementId,
    in_vertex: ElementId,
}

impl Edge {
    /// Edge created in the current transaction under a temporary id.
    pub fn new(
        id: ElementId,
        label: impl Into<String>,
        out_vertex: ElementId,
        in_vertex: ElementId,
    ) -> Self {
        Self {
            core: ElementCore::new_element(id),
            label: label.into(),
            out_vertex,
            in_vertex,
        }
    }

    /// Edge read from storage; `id` must be persisted.
    pub fn loaded(
        id: ElementId,
        label: impl Into<String>,
        out_vertex: ElementId,
        in_vertex: ElementId,
    ) -> Result<Self, DecodingError> {
        Ok(Self {
            core: ElementCore::loaded(id)?,
            label: label.into(),
            out_vertex,
            in_vertex,
        })
    }

    /// Edge label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Tail vertex.
    pub fn out_vertex(&self) -> ElementId {
        self.out_vertex
    }

    /// Head vertex.
    pub fn in_vertex(&self) -> ElementId {
        self.in_vertex
    }

    /// Endpoint opposite `vertex`, or `None` if `vertex` is not incident.
    pub fn other_vertex(&self, vertex: ElementId) -> Option<ElementId> {
        if vertex == self.out_vertex {
            Some(self.in_vertex)
        } else if vertex == self.in_vertex {
            Some(self.out_vertex)
        } else {
            None
        }
    }

    /// Identity plus label and endpoints.
    pub fn structurally_eq(&self, other: &Edge) -> bool {
        self == other
            && self.label == other.label
            && self.out_vertex == other.out_vertex
            && self.in_vertex == other.in_vertex
    }

    pub(crate) fn rewrite_endpoints(&mut self, assigned: &HashMap<ElementId, ElementId>) {
        if let Some(id) = assigned.get(&self.out_vertex) {
            self.out_vertex = *id;
        }
        if let Some(id) = assigned.get(&self.in_vertex) {
            self.in_vertex = *id;
        }
    }
}

impl GraphElement for Edge {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Edge
    }
}

element_identity!(Edge);
