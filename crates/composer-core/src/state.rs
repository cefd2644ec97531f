//! Immutable editor snapshots with undo/redo history.
//!
//! An [`EditorState`] is never modified; [`EditorState::push`] returns the next
//! snapshot. Whether a push is recorded in history is decided by its
//! [`ChangeType`].

use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::ComposerConfig;
use crate::content::ContentModel;
use crate::error::Result;
use crate::selection::SelectionState;

/// Whether a change is recorded in undo history.
///
/// `SelectionOnly` pushes replace content and selection without a history
/// entry. Cosmetic entity edits (image resize, alt text) use it so that they
/// never disturb the caret or the undo stack. A consequence worth knowing:
/// undoing an earlier `Undoable` change restores the snapshot taken before
/// it, which predates any later `SelectionOnly` edits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ChangeType {
    #[default]
    Undoable,
    SelectionOnly,
}

#[derive(Clone, Debug)]
struct Snapshot {
    content: ContentModel,
    selection: SelectionState,
}

type History = Arc<VecDeque<Snapshot>>;

/// Document + selection + history, as one immutable value.
#[derive(Clone, Debug)]
pub struct EditorState {
    content: ContentModel,
    selection: SelectionState,
    last_change: ChangeType,
    undo_stack: History,
    redo_stack: History,
    max_undo_steps: Option<usize>,
}

impl Default for EditorState {
    fn default() -> Self {
        Self::create(ContentModel::empty())
    }
}

impl EditorState {
    /// A fresh state with the caret at the start of the document.
    pub fn create(content: ContentModel) -> Self {
        Self::create_with_config(content, &ComposerConfig::default())
    }

    pub fn create_with_config(content: ContentModel, config: &ComposerConfig) -> Self {
        let selection = SelectionState::document_start(&content);
        Self {
            content,
            selection,
            last_change: ChangeType::Undoable,
            undo_stack: History::default(),
            redo_stack: History::default(),
            max_undo_steps: config.max_undo_steps,
        }
    }

    pub fn content(&self) -> &ContentModel {
        &self.content
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn last_change_type(&self) -> ChangeType {
        self.last_change
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Produce the next snapshot.
    ///
    /// `selection` must be valid for `content`; a selection pointing at a
    /// removed block is a caller bug and is rejected.
    pub fn push(
        &self,
        content: ContentModel,
        selection: SelectionState,
        change: ChangeType,
    ) -> Result<Self> {
        selection.validate(&content)?;

        let mut next = Self {
            content,
            selection,
            last_change: change,
            undo_stack: self.undo_stack.clone(),
            redo_stack: self.redo_stack.clone(),
            max_undo_steps: self.max_undo_steps,
        };

        if change == ChangeType::Undoable {
            let undo = Arc::make_mut(&mut next.undo_stack);
            undo.push_back(Snapshot {
                content: self.content.clone(),
                selection: self.selection.clone(),
            });
            if let Some(max) = self.max_undo_steps {
                while undo.len() > max {
                    undo.pop_front();
                    tracing::trace!(target: "composer::history", "evicted oldest undo entry");
                }
            }
            next.redo_stack = History::default();
        }

        tracing::trace!(
            target: "composer::history",
            ?change,
            undo_depth = next.undo_stack.len(),
            "push"
        );
        Ok(next)
    }

    /// Move the caret/selection without touching content or history.
    pub fn force_selection(&self, selection: SelectionState) -> Result<Self> {
        self.push(self.content.clone(), selection, ChangeType::SelectionOnly)
    }

    /// Step back one undoable change. `None` when there is nothing to undo.
    pub fn undo(&self) -> Option<Self> {
        let mut undo = self.undo_stack.clone();
        let Some(previous) = Arc::make_mut(&mut undo).pop_back() else {
            tracing::debug!(target: "composer::history", "undo requested with empty history");
            return None;
        };

        let mut redo = self.redo_stack.clone();
        Arc::make_mut(&mut redo).push_back(self.snapshot());

        Some(Self {
            content: previous.content,
            selection: previous.selection,
            last_change: ChangeType::Undoable,
            undo_stack: undo,
            redo_stack: redo,
            max_undo_steps: self.max_undo_steps,
        })
    }

    /// Re-apply the last undone change. `None` when there is nothing to redo.
    pub fn redo(&self) -> Option<Self> {
        let mut redo = self.redo_stack.clone();
        let Some(next) = Arc::make_mut(&mut redo).pop_back() else {
            tracing::debug!(target: "composer::history", "redo requested with empty history");
            return None;
        };

        let mut undo = self.undo_stack.clone();
        Arc::make_mut(&mut undo).push_back(self.snapshot());

        Some(Self {
            content: next.content,
            selection: next.selection,
            last_change: ChangeType::Undoable,
            undo_stack: undo,
            redo_stack: redo,
            max_undo_steps: self.max_undo_steps,
        })
    }

    /// Drop all history, keeping the current document.
    pub fn clear_history(&self) -> Self {
        Self {
            undo_stack: History::default(),
            redo_stack: History::default(),
            ..self.clone()
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            content: self.content.clone(),
            selection: self.selection.clone(),
        }
    }
}
