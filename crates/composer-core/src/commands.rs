//! Editor actions and their dispatch onto [`EditorState`].
//!
//! Actions operate on the state's current selection. Each returns the next
//! state, or `None` when the action does nothing here (backspace at document
//! start, typing onto an image, undo with no history).

use serde::{Deserialize, Serialize};

use crate::block::BlockKey;
use crate::content::ContentModel;
use crate::error::{ComposerError, Result};
use crate::modifier::{self, RemovalDirection};
use crate::selection::SelectionState;
use crate::state::{ChangeType, EditorState};

/// Input-level editing operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditorAction {
    /// Insert text at the selection, replacing anything selected.
    InsertText { text: String },
    /// Soft line break within the block (Shift+Enter).
    InsertLineBreak,
    /// Split the block at the caret (Enter).
    SplitBlock,
    /// Backspace.
    DeleteBackward,
    /// Delete key.
    DeleteForward,
    /// Replace the selection.
    Select(SelectionState),
    SelectAll,
    Undo,
    Redo,
}

/// Apply `action` to `state`.
///
/// Errors are programming errors only: a state whose selection no longer fits
/// its content. User-level no-ops come back as `Ok(None)`.
pub fn execute_action(state: &EditorState, action: &EditorAction) -> Result<Option<EditorState>> {
    match action {
        EditorAction::InsertText { text } => execute_insert(state, text),
        EditorAction::InsertLineBreak => execute_insert(state, "\n"),
        EditorAction::SplitBlock => {
            let edit = modifier::split_block(state.content(), state.selection())?;
            state
                .push(edit.content, edit.selection, ChangeType::Undoable)
                .map(Some)
        }
        EditorAction::DeleteBackward => execute_delete(state, RemovalDirection::Backward),
        EditorAction::DeleteForward => execute_delete(state, RemovalDirection::Forward),
        EditorAction::Select(selection) => {
            if selection == state.selection() {
                return Ok(None);
            }
            state.force_selection(selection.clone()).map(Some)
        }
        EditorAction::SelectAll => {
            let all = SelectionState::all(state.content());
            if &all == state.selection() {
                return Ok(None);
            }
            state.force_selection(all).map(Some)
        }
        EditorAction::Undo => Ok(state.undo()),
        EditorAction::Redo => Ok(state.redo()),
    }
}

fn execute_insert(state: &EditorState, text: &str) -> Result<Option<EditorState>> {
    if text.is_empty() {
        return Ok(None);
    }
    match modifier::insert_text(state.content(), state.selection(), text) {
        Ok(edit) => state
            .push(edit.content, edit.selection, ChangeType::Undoable)
            .map(Some),
        Err(ComposerError::PartialAtomicRange(key)) => {
            tracing::trace!(target: "composer::history", %key, "ignored text input on atomic block");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn execute_delete(state: &EditorState, direction: RemovalDirection) -> Result<Option<EditorState>> {
    let content = state.content();
    let selection = state.selection();
    let ordered = selection.ordered(content)?;

    if ordered.is_collapsed() {
        let key = &ordered.start_key;
        let offset = ordered.start_offset;
        let block = content.require_block(key)?;

        // The caret sits on an image: the whole block goes.
        if block.is_atomic() {
            return remove_atomic(state, key, None).map(Some);
        }

        let neighbour = match direction {
            RemovalDirection::Backward if offset == 0 => Some(content.block_before(key)),
            RemovalDirection::Forward if offset == block.len_chars() => {
                Some(content.block_after(key))
            }
            _ => None,
        };
        match neighbour {
            // Nothing to join with.
            Some(None) => return Ok(None),
            Some(Some(next)) if next.is_atomic() => {
                let caret = SelectionState::collapsed(key.clone(), offset);
                return remove_atomic(state, next.key(), Some(caret)).map(Some);
            }
            _ => {}
        }
    }

    let next = modifier::remove_range(content, selection, direction)?;
    let caret = caret_after_removal(content, selection, direction)?;
    let caret = if caret.is_valid(&next) {
        caret
    } else {
        SelectionState::document_start(&next)
    };
    state.push(next, caret, ChangeType::Undoable).map(Some)
}

/// Where the caret lands once `selection` is removed, in pre-edit terms.
///
/// Removal keeps the key of the first touched block, so a position computed
/// against `content` stays meaningful afterwards.
fn caret_after_removal(
    content: &ContentModel,
    selection: &SelectionState,
    direction: RemovalDirection,
) -> Result<SelectionState> {
    let ordered = selection.ordered(content)?;
    if !ordered.is_collapsed() {
        return Ok(SelectionState::collapsed(ordered.start_key, ordered.start_offset));
    }

    let key = ordered.start_key;
    let offset = ordered.start_offset;
    Ok(match direction {
        RemovalDirection::Forward => SelectionState::collapsed(key, offset),
        RemovalDirection::Backward if offset > 0 => SelectionState::collapsed(key, offset - 1),
        RemovalDirection::Backward => match content.block_before(&key) {
            Some(prev) => SelectionState::collapsed(prev.key().clone(), prev.len_chars()),
            None => SelectionState::collapsed(key, 0),
        },
    })
}

/// Drop atomic block `key`, placing the caret at `caret` or the repair default.
fn remove_atomic(
    state: &EditorState,
    key: &BlockKey,
    caret: Option<SelectionState>,
) -> Result<EditorState> {
    let content = state.content();
    let span = SelectionState::block_span(content, key)?;
    let emptied = modifier::remove_range(content, &span, RemovalDirection::Backward)?;
    let next = modifier::delete_block(&emptied, key)?;
    let selection = caret
        .filter(|c| c.is_valid(&next))
        .unwrap_or_else(|| SelectionState::after_block_removal(content, key, &next));
    state.push(next, selection, ChangeType::Undoable)
}
