//! Error types for the composer controls.

use composer_core::ComposerError;
use miette::Diagnostic;
use smol_str::SmolStr;

/// User-recoverable validation failures, plus engine errors passed through.
#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// Link control opened with no text selected and no link under the caret.
    #[error("nothing to link")]
    #[diagnostic(code(composer::controls::nothing_to_link), help("Highlight text to link"))]
    NothingToLink,

    /// Link confirmed with an empty URL.
    #[error("link URL is empty")]
    #[diagnostic(code(composer::controls::empty_url), help("Enter the address to link to"))]
    EmptyUrl,

    /// Image insert attempted before alt text was given.
    #[error("image needs alt text")]
    #[diagnostic(
        code(composer::controls::missing_alt_text),
        help("Describe this image for people who can't see it")
    )]
    MissingAltText,

    /// A file that does not match the accepted image types.
    #[error("{mime} is not an accepted image type")]
    #[diagnostic(code(composer::controls::not_an_image), help("Choose an image file"))]
    NotAnImage { mime: SmolStr },

    /// A new upload was started while one is still in flight.
    #[error("an upload is already in progress")]
    #[diagnostic(code(composer::controls::upload_in_progress))]
    UploadInProgress,

    /// Insert requested while the upload has not produced an image yet.
    #[error("no uploaded image to insert")]
    #[diagnostic(code(composer::controls::not_ready))]
    NotReady,

    /// Image resize to a width that is not one of the configured presets.
    #[error("{size}% is not an image size preset")]
    #[diagnostic(code(composer::controls::unsupported_size), help("Pick one of the offered sizes"))]
    UnsupportedSize { size: u8 },

    /// Engine contract violation.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] ComposerError),
}

/// Failure reported by an [`crate::UploadAdapter`].
#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// The host refused the file (size, type, quota).
    #[error("upload rejected: {reason}")]
    #[diagnostic(code(composer::upload::rejected))]
    Rejected { reason: String },

    /// The transport itself failed.
    #[error("upload failed: {0}")]
    #[diagnostic(code(composer::upload::transport), help("Try selecting the file again"))]
    Transport(String),
}

pub type Result<T, E = ControlError> = std::result::Result<T, E>;
