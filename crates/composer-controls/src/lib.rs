//! composer-controls: everything around the document engine.
//!
//! - `Composer` - host embedding, HTML in and out
//! - `LinkControl` - link insertion/editing over a selection
//! - `ImageInsertControl` - file pick, upload, alt text, insert
//! - `ImageBlockControls` - resize, alt text and removal on an image block
//! - `UploadAdapter` - the upload contract the host implements
//!
//! Controls never hold the editor state. They take the current
//! [`EditorState`](composer_core::EditorState) and return the next one, which
//! the host commits.

pub mod error;
pub mod host;
pub mod image_block;
pub mod image_insert;
pub mod link;
pub mod upload;

pub use error::{ControlError, Result, UploadError};
pub use host::{Composer, preview};
pub use image_block::ImageBlockControls;
pub use image_insert::{ImageInsertControl, PendingUpload, UploadOutcome, UploadState};
pub use link::LinkControl;
pub use upload::{UploadAdapter, UploadFile, UploadedImage, mime_matches};
