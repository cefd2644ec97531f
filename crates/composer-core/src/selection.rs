//! Anchor/focus selection addressed by (block, char offset).

use serde::{Deserialize, Serialize};

use crate::block::BlockKey;
use crate::content::ContentModel;
use crate::error::{ComposerError, Result};

/// A selection in document coordinates.
///
/// The anchor is where the selection started, the focus is where the caret is
/// now. They may be in either order; use [`SelectionState::ordered`] for
/// document-order bounds.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionState {
    pub anchor_key: BlockKey,
    pub anchor_offset: usize,
    pub focus_key: BlockKey,
    pub focus_offset: usize,
}

/// A selection resolved to document order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderedSelection {
    pub start_key: BlockKey,
    pub start_offset: usize,
    pub end_key: BlockKey,
    pub end_offset: usize,
    pub start_index: usize,
    pub end_index: usize,
}

impl OrderedSelection {
    pub fn is_single_block(&self) -> bool {
        self.start_index == self.end_index
    }

    pub fn is_collapsed(&self) -> bool {
        self.is_single_block() && self.start_offset == self.end_offset
    }
}

impl SelectionState {
    pub fn new(
        anchor_key: BlockKey,
        anchor_offset: usize,
        focus_key: BlockKey,
        focus_offset: usize,
    ) -> Self {
        Self {
            anchor_key,
            anchor_offset,
            focus_key,
            focus_offset,
        }
    }

    /// A caret at `offset` within `key`.
    pub fn collapsed(key: BlockKey, offset: usize) -> Self {
        Self::new(key.clone(), offset, key, offset)
    }

    /// A selection within a single block.
    pub fn within(key: BlockKey, start: usize, end: usize) -> Self {
        Self::new(key.clone(), start, key, end)
    }

    /// The caret at the start of the document.
    pub fn document_start(content: &ContentModel) -> Self {
        let key = content
            .first_block()
            .map(|b| b.key().clone())
            .unwrap_or_else(|| BlockKey::new(""));
        Self::collapsed(key, 0)
    }

    /// A selection spanning the whole of block `key`.
    pub fn block_span(content: &ContentModel, key: &BlockKey) -> Result<Self> {
        let len = content.require_block(key)?.len_chars();
        Ok(Self::within(key.clone(), 0, len))
    }

    /// A selection spanning the whole document.
    pub fn all(content: &ContentModel) -> Self {
        match (content.first_block(), content.last_block()) {
            (Some(first), Some(last)) => Self::new(
                first.key().clone(),
                0,
                last.key().clone(),
                last.len_chars(),
            ),
            _ => Self::document_start(content),
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor_key == self.focus_key && self.anchor_offset == self.focus_offset
    }

    /// Check that both ends point into existing blocks within bounds.
    pub fn validate(&self, content: &ContentModel) -> Result<()> {
        for (key, offset) in [
            (&self.anchor_key, self.anchor_offset),
            (&self.focus_key, self.focus_offset),
        ] {
            let len = content.require_block(key)?.len_chars();
            if offset > len {
                return Err(ComposerError::OffsetOutOfBounds {
                    key: key.clone(),
                    offset,
                    len,
                });
            }
        }
        Ok(())
    }

    pub fn is_valid(&self, content: &ContentModel) -> bool {
        self.validate(content).is_ok()
    }

    /// Resolve anchor/focus into document-order start/end.
    pub fn ordered(&self, content: &ContentModel) -> Result<OrderedSelection> {
        self.validate(content)?;
        let anchor_index = content
            .index_of(&self.anchor_key)
            .ok_or_else(|| ComposerError::UnknownBlock(self.anchor_key.clone()))?;
        let focus_index = content
            .index_of(&self.focus_key)
            .ok_or_else(|| ComposerError::UnknownBlock(self.focus_key.clone()))?;

        let anchor_first = (anchor_index, self.anchor_offset) <= (focus_index, self.focus_offset);
        let ordered = if anchor_first {
            OrderedSelection {
                start_key: self.anchor_key.clone(),
                start_offset: self.anchor_offset,
                end_key: self.focus_key.clone(),
                end_offset: self.focus_offset,
                start_index: anchor_index,
                end_index: focus_index,
            }
        } else {
            OrderedSelection {
                start_key: self.focus_key.clone(),
                start_offset: self.focus_offset,
                end_key: self.anchor_key.clone(),
                end_offset: self.anchor_offset,
                start_index: focus_index,
                end_index: anchor_index,
            }
        };
        Ok(ordered)
    }

    /// Whether the focus precedes the anchor in document order.
    pub fn is_backward(&self, content: &ContentModel) -> Result<bool> {
        let ordered = self.ordered(content)?;
        Ok(ordered.start_key == self.focus_key && ordered.start_offset == self.focus_offset
            && !self.is_collapsed())
    }

    /// The selected text, blocks joined with newlines.
    pub fn selected_text(&self, content: &ContentModel) -> Result<String> {
        let ordered = self.ordered(content)?;
        let mut out = String::new();
        for index in ordered.start_index..=ordered.end_index {
            let Some(block) = content.block_at(index) else {
                break;
            };
            if index > ordered.start_index {
                out.push('\n');
            }
            if block.is_atomic() {
                continue;
            }
            let start = if index == ordered.start_index { ordered.start_offset } else { 0 };
            let end = if index == ordered.end_index {
                ordered.end_offset
            } else {
                block.len_chars()
            };
            out.push_str(block.slice(start..end));
        }
        Ok(out)
    }

    /// Where the caret goes once block `removed` is gone from `before`.
    ///
    /// Policy: the start of the block that followed the removed one, or the
    /// start of the document when it was the last block.
    pub fn after_block_removal(
        before: &ContentModel,
        removed: &BlockKey,
        after: &ContentModel,
    ) -> Self {
        let successor = before
            .index_of(removed)
            .and_then(|i| before.block_at(i + 1))
            .filter(|b| after.block(b.key()).is_some());

        match successor {
            Some(block) => Self::collapsed(block.key().clone(), 0),
            None => Self::document_start(after),
        }
    }
}
