//! The upload contract: the composer hands over bytes, the host returns a URL.
//!
//! Transport is entirely the host's business. The controls only care about
//! the call shape and the state transitions around it.

use std::future::Future;

use bytes::Bytes;
use mime_sniffer::MimeTypeSniffer;
use smol_str::SmolStr;

use crate::error::UploadError;

const OCTET_STREAM: &str = "application/octet-stream";

/// A file picked or dropped by the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFile {
    pub name: SmolStr,
    /// MIME type declared by the picker, if any.
    pub mime_type: Option<SmolStr>,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<SmolStr>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            data: data.into(),
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<SmolStr>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Declared MIME type, or one sniffed from the bytes.
    pub fn resolved_mime_type(&self) -> SmolStr {
        match &self.mime_type {
            Some(mime) if !mime.is_empty() => mime.clone(),
            _ => SmolStr::new(self.data.sniff_mime_type().unwrap_or(OCTET_STREAM)),
        }
    }
}

/// A successful upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedImage {
    /// Where the host now serves the file.
    pub url: SmolStr,
}

impl UploadedImage {
    pub fn new(url: impl Into<SmolStr>) -> Self {
        Self { url: url.into() }
    }
}

/// The trait for uploading image files.
pub trait UploadAdapter {
    /// Upload `file`, resolving to its hosted URL.
    fn upload(
        &self,
        file: UploadFile,
    ) -> impl Future<Output = Result<UploadedImage, UploadError>> + Send;
}

impl<T: UploadAdapter> UploadAdapter for &T {
    fn upload(
        &self,
        file: UploadFile,
    ) -> impl Future<Output = Result<UploadedImage, UploadError>> + Send {
        (**self).upload(file)
    }
}

/// Whether `mime` satisfies an `accept`-style pattern list (`"image/*"`,
/// `"image/png, image/gif"`). Parameters after `;` are ignored.
pub fn mime_matches(accept: &str, mime: &str) -> bool {
    let mime = mime.split(';').next().unwrap_or_default().trim();
    let Some((kind, _)) = mime.split_once('/') else {
        return false;
    };
    accept
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .any(|pattern| match pattern.split_once('/') {
            Some(("*", "*")) => true,
            Some((p_kind, "*")) => p_kind.eq_ignore_ascii_case(kind),
            Some(_) => pattern.eq_ignore_ascii_case(mime),
            None => false,
        })
}
