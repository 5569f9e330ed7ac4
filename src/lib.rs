//! Identity, encoding and lifecycle core of a partitioned graph database.
//!
//! * [`ids`] packs partition, type tag, sequence and visibility into one
//!   64-bit id and classifies raw ids as temporary, virtual or persisted.
//! * [`element`] defines the identity and lifecycle contract shared by
//!   vertices, edges and properties, and by every wrapper around them.
//! * [`tx`] is the transaction boundary that hands out temporary ids and
//!   assigns persisted ones at commit.
//! * [`olap`] binds bulk-computation traversals to one transaction.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod element;
pub mod ids;
pub mod olap;
pub mod tx;
pub mod types;

pub use config::IdConfig;
pub use element::{
    Cardinality, Edge, Element, ElementCore, ElementKey, ElementKind, ExternalRef, GraphElement,
    Identified, LifecycleState, PropertyValue, Vertex, VertexProperty, VertexProxy,
};
pub use ids::{is_temporary, DecodedId, ElementId, IdClass, IdLayout, TypeTag};
pub use olap::{merge_by_identity, ComputeVertex, TraversalRoot};
pub use tx::{
    CommitBatch, ElementHandle, IdAllocator, SequenceAllocator, SharedAllocator, Transaction,
    TxId, TxState,
};
pub use types::{DecodingError, EncodingError, IdError, InvariantViolation, Result};
