//! composer-core: the rich-text document engine behind the answer composer.
//!
//! This crate provides:
//! - `ContentModel` - ordered blocks plus an `EntityStore` of links and images
//! - `SelectionState` - anchor/focus addressed by (block, char offset)
//! - `EditorState` - immutable snapshots with undo/redo history
//! - `Decorator` / `DecoratorSet` - pure render descriptions shared by editor and preview
//! - `to_html` / `from_html` - the persisted HTML form
//! - `EditorAction` / `execute_action` - input-level editing on top of `modifier`

pub mod block;
pub mod commands;
pub mod config;
pub mod content;
pub mod decorator;
pub mod entity;
pub mod error;
pub mod html;
pub mod modifier;
pub mod selection;
pub mod state;

pub use block::{ATOMIC_PLACEHOLDER, Block, BlockKey, BlockKind, EntityRange, Segment};
pub use commands::{EditorAction, execute_action};
pub use config::ComposerConfig;
pub use content::ContentModel;
pub use decorator::{
    BlockRender, BlockView, Decorator, DecoratorSet, ImageControls, ImageSize, ImageView,
    LinkDecorator, RenderNode, Surface,
};
pub use entity::{
    DEFAULT_IMAGE_HEIGHT, DEFAULT_IMAGE_WIDTH, Entity, EntityData, EntityKey, EntityPatch,
    EntityStore, EntityType, ImageData, ImagePatch, LinkData, LinkPatch,
};
pub use error::{ComposerError, Result};
pub use html::{from_html, to_html, try_from_html, write_html};
pub use modifier::{Edit, RemovalDirection};
pub use selection::{OrderedSelection, SelectionState};
pub use smol_str::SmolStr;
pub use state::{ChangeType, EditorState};
