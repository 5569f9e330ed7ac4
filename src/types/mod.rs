#![forbid(unsafe_code)]
//! Error taxonomy shared by the codec, element and transaction layers.

use thiserror::Error;

use crate::element::ElementKind;
use crate::ids::TypeTag;

/// A structural field did not fit the bit range reserved for it.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EncodingError {
    /// Partition id is wider than the configured partition bits.
    #[error("partition {partition} exceeds maximum {max}")]
    PartitionOverflow {
        /// Requested partition.
        partition: u32,
        /// Largest partition the layout can represent.
        max: u32,
    },
    /// Sequence count is wider than the bits left after partition and tag.
    #[error("sequence {sequence} exceeds maximum {max}")]
    SequenceOverflow {
        /// Requested sequence count.
        sequence: u64,
        /// Largest sequence the layout can represent.
        max: u64,
    },
    /// Sequence counts start at one; zero would alias the virtual id.
    #[error("sequence zero is reserved")]
    ZeroSequence,
    /// A transaction counted its temporary ids down to `i64::MIN`.
    #[error("transaction has no temporary ids left")]
    TemporaryExhausted,
    /// The allocator handed out every sequence of a partition.
    #[error("partition {partition} has no sequence space left")]
    PartitionExhausted {
        /// Partition that ran dry.
        partition: u32,
    },
}

/// Decode was attempted on a value that is not a persisted identifier.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodingError {
    /// Temporary (`< 0`) and virtual (`== 0`) ids carry no structure.
    #[error("id {0} is not a persisted identifier")]
    NotPersisted(i64),
    /// Tag bits name no known element type.
    #[error("unknown type tag {0}")]
    UnknownTypeTag(u8),
    /// Tag bits disagree with the kind of element carrying the id.
    #[error("id {id} carries the {tag} tag but was given as a {kind}")]
    TagMismatch {
        /// Offending id.
        id: i64,
        /// Tag decoded from the id.
        tag: TypeTag,
        /// Kind of the element holding the id.
        kind: ElementKind,
    },
}

/// Identity invariant broken by the caller. Never recovered from in place:
/// the owning transaction aborts when it sees one.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
    /// `assign_id` on an element that already holds a persisted id.
    #[error("element already persisted as {current}, refusing reassignment to {attempted}")]
    AlreadyPersisted {
        /// Id the element already holds.
        current: i64,
        /// Id the caller tried to assign.
        attempted: i64,
    },
    /// `assign_id` on an element that was not created in this transaction.
    #[error("element {0} was not created in this transaction")]
    NotNew(i64),
    /// `assign_id` with a value that is not a persisted id.
    #[error("cannot assign non-positive id {0}")]
    NonPositiveId(i64),
    /// Mutation of an element past its terminal lifecycle state.
    #[error("element {0} has already been removed")]
    AlreadyRemoved(i64),
    /// Operation on a committed, rolled back or aborted transaction.
    #[error("transaction {0} is closed")]
    TransactionClosed(u64),
    /// Handle does not belong to the transaction.
    #[error("unknown element handle {0}")]
    UnknownHandle(usize),
    /// Element handed to `load` was not materialized from storage.
    #[error("element {0} is not in the loaded state")]
    NotLoaded(i64),
    /// Handle names an edge or property where a vertex is required.
    #[error("element handle {0} is not a vertex")]
    NotAVertex(usize),
}

/// Crate-wide error.
#[derive(Debug, Error)]
pub enum IdError {
    /// Encoding failure, surfaced to the allocator or caller.
    #[error("encoding: {0}")]
    Encoding(#[from] EncodingError),
    /// Decoding failure, surfaced to the storage layer or caller.
    #[error("decoding: {0}")]
    Decoding(#[from] DecodingError),
    /// Fatal identity invariant violation.
    #[error("invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),
    /// Invalid configuration.
    #[error("config: {0}")]
    Config(String),
    /// I/O error while reading configuration.
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

impl IdError {
    /// Returns `true` when the error must abort the owning transaction.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IdError::Invariant(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, IdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_invariant_violations_are_fatal() {
        assert!(IdError::from(InvariantViolation::NonPositiveId(0)).is_fatal());
        assert!(!IdError::from(EncodingError::ZeroSequence).is_fatal());
        assert!(!IdError::from(DecodingError::NotPersisted(-3)).is_fatal());
    }

    #[test]
    fn messages_name_the_offending_value() {
        let err = IdError::from(DecodingError::NotPersisted(-7));
        assert_eq!(err.to_string(), "decoding: id -7 is not a persisted identifier");
        let err = IdError::from(EncodingError::PartitionOverflow {
            partition: 40,
            max: 31,
        });
        assert_eq!(err.to_string(), "encoding: partition 40 exceeds maximum 31");
        let err = IdError::from(DecodingError::TagMismatch {
            id: 66,
            tag: TypeTag::Edge,
            kind: ElementKind::Vertex,
        });
        assert_eq!(
            err.to_string(),
            "decoding: id 66 carries the edge tag but was given as a vertex"
        );
    }
}
