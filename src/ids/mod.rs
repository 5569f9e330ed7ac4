#![forbid(unsafe_code)]
//! 64-bit element identifiers and the bit-packing codec for persisted ids.
//!
//! A raw id falls into one of three disjoint classes:
//!
//! * `id < 0`: temporary, valid only inside the issuing transaction
//! * `id == 0`: virtual, an implied element with no storage footprint
//! * `id > 0`: persisted, packed as shown below
//!
//! ```text
//! 63  62                      4+P         4            1        0
//! ┌───┬─────────────────────────┬───────────┬────────────┬─────────┐
//! │ 0 │ sequence (59-P)         │ partition │ type tag(3)│ invis(1)│
//! └───┴─────────────────────────┴───────────┴────────────┴─────────┘
//! ```
//!
//! `P` is the configured partition width. Keeping the partition inline lets
//! the storage backend route a read or write from the id alone.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{DecodingError, EncodingError, IdError, Result};

/// Bits reserved for the invisibility flag.
pub const INVISIBLE_BITS: u32 = 1;
/// Bits reserved for the element type tag.
pub const TYPE_TAG_BITS: u32 = 3;
/// Bits usable by a persisted id; the sign bit is never set.
pub const PAYLOAD_BITS: u32 = 63;
/// Widest partition field a layout accepts.
pub const MAX_PARTITION_BITS: u8 = 16;
/// Partition width used when nothing is configured (32 partitions).
pub const DEFAULT_PARTITION_BITS: u8 = 5;

const INVISIBLE_MASK: u64 = 1;
const TYPE_TAG_SHIFT: u32 = INVISIBLE_BITS;
const TYPE_TAG_MASK: u64 = (1 << TYPE_TAG_BITS) - 1;
const PARTITION_SHIFT: u32 = INVISIBLE_BITS + TYPE_TAG_BITS;

/// Returns `true` when `id` is a transaction-local placeholder.
pub const fn is_temporary(id: i64) -> bool {
    id < 0
}

/// Value class of a raw identifier.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdClass {
    /// Negative placeholder issued by a transaction.
    Temporary,
    /// Zero; the element is implied and never stored.
    Virtual,
    /// Positive id packed by [`IdLayout::encode`].
    Persisted,
}

impl IdClass {
    /// Classifies a raw identifier.
    pub const fn of(id: i64) -> Self {
        if id < 0 {
            IdClass::Temporary
        } else if id == 0 {
            IdClass::Virtual
        } else {
            IdClass::Persisted
        }
    }

    /// Lower-case name used by the CLI and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            IdClass::Temporary => "temporary",
            IdClass::Virtual => "virtual",
            IdClass::Persisted => "persisted",
        }
    }
}

impl fmt::Display for IdClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a graph element in any of the three value classes.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct ElementId(pub i64);

impl ElementId {
    /// The virtual id shared by every implied element.
    pub const VIRTUAL: ElementId = ElementId(0);

    /// Returns the raw signed value.
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Returns `true` for transaction-local placeholders.
    pub const fn is_temporary(self) -> bool {
        is_temporary(self.0)
    }

    /// Returns `true` for the virtual id.
    pub const fn is_virtual(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` for ids produced by the codec.
    pub const fn is_persisted(self) -> bool {
        self.0 > 0
    }

    /// Returns the value class of this id.
    pub const fn class(self) -> IdClass {
        IdClass::of(self.0)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ElementId {
    fn from(value: i64) -> Self {
        ElementId(value)
    }
}

impl From<ElementId> for i64 {
    fn from(value: ElementId) -> Self {
        value.0
    }
}

/// Element type recorded in the tag bits of a persisted id.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    /// Vertex.
    Vertex = 0,
    /// Edge.
    Edge = 1,
    /// Vertex property.
    Property = 2,
    /// Schema type (labels, keys); hidden from ordinary traversal.
    Schema = 3,
}

impl TypeTag {
    /// Raw tag value as stored in the id.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Lower-case name used by the CLI and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            TypeTag::Vertex => "vertex",
            TypeTag::Edge => "edge",
            TypeTag::Property => "property",
            TypeTag::Schema => "schema",
        }
    }
}

impl TryFrom<u8> for TypeTag {
    type Error = DecodingError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(TypeTag::Vertex),
            1 => Ok(TypeTag::Edge),
            2 => Ok(TypeTag::Property),
            3 => Ok(TypeTag::Schema),
            other => Err(DecodingError::UnknownTypeTag(other)),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured view of a persisted identifier.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct DecodedId {
    /// Routing partition.
    pub partition: u32,
    /// Element type.
    pub type_tag: TypeTag,
    /// Per-partition sequence count, starting at one.
    pub sequence: u64,
    /// System element hidden from normal traversal.
    pub invisible: bool,
}

/// Bit layout of persisted identifiers.
///
/// The layout is a pure value: every operation is a function of its inputs
/// and the configured partition width.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct IdLayout {
    partition_bits: u8,
}

impl Default for IdLayout {
    fn default() -> Self {
        Self {
            partition_bits: DEFAULT_PARTITION_BITS,
        }
    }
}

impl IdLayout {
    /// Creates a layout with `partition_bits` bits of routing information.
    pub fn new(partition_bits: u8) -> Result<Self> {
        if partition_bits > MAX_PARTITION_BITS {
            return Err(IdError::Config(format!(
                "partition_bits {partition_bits} exceeds maximum {MAX_PARTITION_BITS}"
            )));
        }
        Ok(Self { partition_bits })
    }

    /// Width of the partition field.
    pub const fn partition_bits(&self) -> u8 {
        self.partition_bits
    }

    /// Width of the sequence field.
    pub const fn sequence_bits(&self) -> u32 {
        PAYLOAD_BITS - PARTITION_SHIFT - self.partition_bits as u32
    }

    /// Number of partitions this layout can address.
    pub const fn partition_count(&self) -> u64 {
        1u64 << self.partition_bits
    }

    /// Largest encodable partition id.
    pub const fn max_partition(&self) -> u32 {
        ((1u64 << self.partition_bits) - 1) as u32
    }

    /// Largest encodable sequence count.
    pub const fn max_sequence(&self) -> u64 {
        (1u64 << self.sequence_bits()) - 1
    }

    const fn sequence_shift(&self) -> u32 {
        PARTITION_SHIFT + self.partition_bits as u32
    }

    /// Packs the fields into a persisted id.
    ///
    /// Fails instead of truncating: a wrapped field would alias two distinct
    /// elements to the same identifier.
    pub fn encode(
        &self,
        partition: u32,
        type_tag: TypeTag,
        sequence: u64,
        invisible: bool,
    ) -> std::result::Result<ElementId, EncodingError> {
        if partition > self.max_partition() {
            return Err(EncodingError::PartitionOverflow {
                partition,
                max: self.max_partition(),
            });
        }
        if sequence == 0 {
            return Err(EncodingError::ZeroSequence);
        }
        if sequence > self.max_sequence() {
            return Err(EncodingError::SequenceOverflow {
                sequence,
                max: self.max_sequence(),
            });
        }
        let raw = (sequence << self.sequence_shift())
            | ((partition as u64) << PARTITION_SHIFT)
            | ((type_tag.as_u8() as u64) << TYPE_TAG_SHIFT)
            | invisible as u64;
        Ok(ElementId(raw as i64))
    }

    /// Unpacks a persisted id.
    pub fn decode(&self, id: i64) -> std::result::Result<DecodedId, DecodingError> {
        if id <= 0 {
            return Err(DecodingError::NotPersisted(id));
        }
        let raw = id as u64;
        let type_tag = TypeTag::try_from(((raw >> TYPE_TAG_SHIFT) & TYPE_TAG_MASK) as u8)?;
        Ok(DecodedId {
            partition: ((raw >> PARTITION_SHIFT) & self.max_partition() as u64) as u32,
            type_tag,
            sequence: raw >> self.sequence_shift(),
            invisible: raw & INVISIBLE_MASK != 0,
        })
    }

    /// Returns the invisibility flag of a persisted id.
    pub fn is_invisible(&self, id: i64) -> std::result::Result<bool, DecodingError> {
        self.decode(id).map(|decoded| decoded.invisible)
    }

    /// Returns the routing partition of a persisted id.
    pub fn partition_of(&self, id: i64) -> std::result::Result<u32, DecodingError> {
        self.decode(id).map(|decoded| decoded.partition)
    }
}

impl fmt::Display for IdLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sequence:{} partition:{} type:{} invisible:{}",
            self.sequence_bits(),
            self.partition_bits,
            TYPE_TAG_BITS,
            INVISIBLE_BITS
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_tag() -> impl Strategy<Value = TypeTag> {
        prop_oneof![
            Just(TypeTag::Vertex),
            Just(TypeTag::Edge),
            Just(TypeTag::Property),
            Just(TypeTag::Schema),
        ]
    }

    #[test]
    fn vertex_in_partition_three_roundtrips() {
        let layout = IdLayout::default();
        let id = layout.encode(3, TypeTag::Vertex, 42, false).unwrap();
        assert!(id.is_persisted());
        let decoded = layout.decode(id.raw()).unwrap();
        assert_eq!(
            decoded,
            DecodedId {
                partition: 3,
                type_tag: TypeTag::Vertex,
                sequence: 42,
                invisible: false,
            }
        );
    }

    #[test]
    fn classes_are_disjoint() {
        assert_eq!(IdClass::of(-7), IdClass::Temporary);
        assert_eq!(IdClass::of(0), IdClass::Virtual);
        assert_eq!(IdClass::of(1), IdClass::Persisted);
        assert!(ElementId(-1).is_temporary());
        assert!(ElementId::VIRTUAL.is_virtual());
        assert!(!ElementId::VIRTUAL.is_temporary());
    }

    #[test]
    fn decode_rejects_virtual_and_temporary() {
        let layout = IdLayout::default();
        assert_eq!(layout.decode(0), Err(DecodingError::NotPersisted(0)));
        assert_eq!(layout.decode(-5), Err(DecodingError::NotPersisted(-5)));
        assert_eq!(layout.is_invisible(-5), Err(DecodingError::NotPersisted(-5)));
    }

    #[test]
    fn unknown_tag_bits_fail_to_decode() {
        let layout = IdLayout::default();
        let raw = (1i64 << 9) | (5 << TYPE_TAG_SHIFT);
        assert_eq!(layout.decode(raw), Err(DecodingError::UnknownTypeTag(5)));
    }

    #[test]
    fn zero_sequence_is_rejected() {
        let layout = IdLayout::default();
        assert_eq!(
            layout.encode(0, TypeTag::Vertex, 0, false),
            Err(EncodingError::ZeroSequence)
        );
    }

    #[test]
    fn smallest_id_is_positive() {
        let layout = IdLayout::default();
        let id = layout.encode(0, TypeTag::Vertex, 1, false).unwrap();
        assert!(id.raw() > 0);
    }

    #[test]
    fn largest_fields_stay_positive() {
        for bits in [0u8, 5, 10, MAX_PARTITION_BITS] {
            let layout = IdLayout::new(bits).unwrap();
            let id = layout
                .encode(
                    layout.max_partition(),
                    TypeTag::Schema,
                    layout.max_sequence(),
                    true,
                )
                .unwrap();
            assert!(id.raw() > 0, "bits={bits}");
            let decoded = layout.decode(id.raw()).unwrap();
            assert_eq!(decoded.partition, layout.max_partition());
            assert_eq!(decoded.sequence, layout.max_sequence());
        }
    }

    #[test]
    fn partition_overflow_is_an_error() {
        let layout = IdLayout::default();
        assert_eq!(
            layout.encode(32, TypeTag::Edge, 1, false),
            Err(EncodingError::PartitionOverflow {
                partition: 32,
                max: 31
            })
        );
    }

    #[test]
    fn layout_rejects_wide_partitions() {
        assert!(matches!(
            IdLayout::new(MAX_PARTITION_BITS + 1),
            Err(IdError::Config(_))
        ));
    }

    #[test]
    fn layout_display_lists_field_widths() {
        let layout = IdLayout::default();
        assert_eq!(
            layout.to_string(),
            "sequence:54 partition:5 type:3 invisible:1"
        );
    }

    proptest! {
        #[test]
        fn encode_decode_roundtrip(
            bits in 0u8..=MAX_PARTITION_BITS,
            partition in any::<u32>(),
            tag in arb_tag(),
            sequence in 1u64..u64::MAX,
            invisible in any::<bool>(),
        ) {
            let layout = IdLayout::new(bits).unwrap();
            let partition = partition & layout.max_partition();
            let sequence = (sequence % layout.max_sequence()).max(1);
            let id = layout.encode(partition, tag, sequence, invisible).unwrap();
            prop_assert!(id.is_persisted());
            let decoded = layout.decode(id.raw()).unwrap();
            prop_assert_eq!(decoded, DecodedId { partition, type_tag: tag, sequence, invisible });
            prop_assert_eq!(layout.partition_of(id.raw()).unwrap(), partition);
        }

        #[test]
        fn oversized_sequence_never_wraps(
            bits in 0u8..=MAX_PARTITION_BITS,
            excess in 1u64..1024,
        ) {
            let layout = IdLayout::new(bits).unwrap();
            let sequence = layout.max_sequence().saturating_add(excess);
            let result = layout.encode(0, TypeTag::Vertex, sequence, false);
            let is_sequence_overflow = matches!(result, Err(EncodingError::SequenceOverflow { .. }));
            prop_assert!(is_sequence_overflow);
        }

        #[test]
        fn oversized_partition_never_wraps(
            bits in 0u8..MAX_PARTITION_BITS,
            partition in any::<u32>(),
        ) {
            let layout = IdLayout::new(bits).unwrap();
            prop_assume!(partition > layout.max_partition());
            let result = layout.encode(partition, TypeTag::Vertex, 1, false);
            let is_partition_overflow = matches!(result, Err(EncodingError::PartitionOverflow { .. }));
            prop_assert!(is_partition_overflow);
        }

        #[test]
        fn negative_ids_are_temporary_and_undecodable(id in i64::MIN..0) {
            prop_assert!(is_temporary(id));
            prop_assert_eq!(IdLayout::default().decode(id), Err(DecodingError::NotPersisted(id)));
        }
    }
}
