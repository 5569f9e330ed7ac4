use crate::ids::ElementId;
use crate::types::DecodingError;

use super::{element_identity, ElementCore, ElementKind, GraphElement};

/// Vertex as materialized by a transaction.
#[derive(Clone, Debug)]
pub struct Vertex {
    core: ElementCore,
    label: String,
}

impl Vertex {
    /// Vertex created in the current transaction under a temporary id.
    pub fn new(id: ElementId, label: impl Into<String>) -> Self {
        Self {
            core: ElementCore::new_element(id),
            label: label.into(),
        }
    }

    /// Vertex read from storage; `id` must be persisted.
    pub fn loaded(id: ElementId, label: impl Into<String>) -> Result<Self, DecodingError> {
        Ok(Self {
            core: ElementCore::loaded(id)?,
            label: label.into(),
        })
    }

    /// Vertex label.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl GraphElement for Vertex {
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

element_identity!(Vertex);
