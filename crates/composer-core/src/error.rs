//! Error types for document engine operations.
//!
//! Everything here is either a programming error (a caller broke one of the
//! content/selection contracts) or a parse failure on host-supplied HTML.
//! User-recoverable validation lives with the controls, not here.

use miette::Diagnostic;
use thiserror::Error;

use crate::block::BlockKey;
use crate::entity::{EntityKey, EntityType};

/// Errors raised by the document engine.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ComposerError {
    /// An entity key that is not present in the entity store.
    #[error("unknown entity key {0}")]
    #[diagnostic(code(composer::unknown_entity))]
    UnknownEntity(EntityKey),

    /// A block key that is not present in the content model.
    #[error("unknown block key {0}")]
    #[diagnostic(
        code(composer::unknown_block),
        help("selections must be repaired after any block-removing edit")
    )]
    UnknownBlock(BlockKey),

    /// Entity data update of the wrong shape (e.g. image fields on a link).
    #[error("entity {key} is a {found:?}, not a {expected:?}")]
    #[diagnostic(code(composer::entity_type_mismatch))]
    EntityTypeMismatch {
        key: EntityKey,
        expected: EntityType,
        found: EntityType,
    },

    /// Two blocks with the same key in one content model.
    #[error("duplicate block key {0}")]
    #[diagnostic(code(composer::duplicate_block))]
    DuplicateBlock(BlockKey),

    /// A range that cuts through an atomic block.
    #[error("atomic block {0} can only be removed as a whole")]
    #[diagnostic(
        code(composer::partial_atomic_range),
        help("select the full block span (offset 0 to 1) before removing it")
    )]
    PartialAtomicRange(BlockKey),

    /// An offset past the end of a block's text.
    #[error("offset {offset} is out of bounds for block {key} (length {len})")]
    #[diagnostic(code(composer::offset_out_of_bounds))]
    OffsetOutOfBounds {
        key: BlockKey,
        offset: usize,
        len: usize,
    },

    /// Host HTML that could not be tokenized.
    #[error("html parse error: {message}")]
    #[diagnostic(code(composer::parse))]
    Parse { message: String },
}

impl ComposerError {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}

pub type Result<T, E = ComposerError> = std::result::Result<T, E>;
