//! Image upload and remote fetch interfaces.
//!
//! The lib only defines the interfaces and error types. Hosts provide the
//! concrete services (see `inkpad-term` for a local-directory uploader).

use std::{
  borrow::Cow,
  sync::Arc,
};

use async_trait::async_trait;
use thiserror::Error;

/// An image file waiting to be uploaded.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFile {
  pub name:  String,
  pub mime:  String,
  pub bytes: Arc<[u8]>,
}

impl std::fmt::Debug for ImageFile {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ImageFile")
      .field("name", &self.name)
      .field("mime", &self.mime)
      .field("bytes", &self.bytes.len())
      .finish()
  }
}

impl ImageFile {
  pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
    Self {
      name:  name.into(),
      mime:  mime.into(),
      bytes: bytes.into(),
    }
  }

  pub fn is_image(&self) -> bool {
    self.mime.starts_with("image/")
  }

  /// A file extension for the mime type, e.g. `png` for `image/png`.
  pub fn extension(&self) -> &str {
    extension_for_mime(&self.mime)
  }
}

pub fn extension_for_mime(mime: &str) -> &str {
  match mime.strip_prefix("image/") {
    Some("jpeg") => "jpg",
    Some("svg+xml") => "svg",
    Some(subtype) if !subtype.is_empty() => subtype,
    _ => "bin",
  }
}

/// What the upload service hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
  pub url:    String,
  pub width:  u32,
  pub height: u32,
  pub format: String,
  pub bytes:  u64,
}

#[derive(Debug, Error)]
pub enum UploadError {
  #[error(transparent)]
  Io(#[from] std::io::Error),
  #[error("{0} is not an image")]
  NotAnImage(String),
  #[error("upload rejected: {0}")]
  Rejected(String),
  #[error("no upload service is configured")]
  Unavailable,
}

#[derive(Debug, Error)]
pub enum FetchError {
  #[error(transparent)]
  Io(#[from] std::io::Error),
  #[error("request failed with status {0}")]
  Status(u16),
  #[error("{0} did not return an image")]
  NotAnImage(String),
  #[error("cannot fetch {0}")]
  Unsupported(String),
}

#[async_trait]
pub trait ImageUploader: Send + Sync {
  fn name(&self) -> Cow<'_, str>;
  async fn upload(&self, file: ImageFile) -> Result<UploadedImage, UploadError>;
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
  fn name(&self) -> Cow<'_, str>;
  async fn fetch(&self, url: &str) -> Result<ImageFile, FetchError>;
}

#[derive(Debug, Default)]
pub struct NoUploader;

#[async_trait]
impl ImageUploader for NoUploader {
  fn name(&self) -> Cow<'_, str> {
    "none".into()
  }

  async fn upload(&self, _file: ImageFile) -> Result<UploadedImage, UploadError> {
    Err(UploadError::Unavailable)
  }
}

#[derive(Debug, Default)]
pub struct NoFetcher;

#[async_trait]
impl ImageFetcher for NoFetcher {
  fn name(&self) -> Cow<'_, str> {
    "none".into()
  }

  async fn fetch(&self, url: &str) -> Result<ImageFile, FetchError> {
    Err(FetchError::Unsupported(url.to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extensions_follow_mime_subtype() {
    assert_eq!(extension_for_mime("image/png"), "png");
    assert_eq!(extension_for_mime("image/jpeg"), "jpg");
    assert_eq!(extension_for_mime("image/svg+xml"), "svg");
    assert_eq!(extension_for_mime("text/plain"), "bin");
  }

  #[test]
  fn placeholders_fail() {
    let upload = futures_executor::block_on(NoUploader.upload(ImageFile::new(
      "a.png",
      "image/png",
      vec![1, 2, 3],
    )));
    assert!(matches!(upload, Err(UploadError::Unavailable)));

    let fetch = futures_executor::block_on(NoFetcher.fetch("https://x.io/a.png"));
    assert!(matches!(fetch, Err(FetchError::Unsupported(url)) if url == "https://x.io/a.png"));
  }
}
