//! Local stand-ins for the upload and fetch services.

use std::{
  borrow::Cow,
  path::{
    Path,
    PathBuf,
  },
  sync::atomic::{
    AtomicUsize,
    Ordering,
  },
};

use async_trait::async_trait;
use inkpad_lib::upload::{
  FetchError,
  ImageFetcher,
  ImageFile,
  ImageUploader,
  UploadError,
  UploadedImage,
};
use url::Url;

/// Stores uploads as files in a directory and hands back `file://` URLs.
#[derive(Debug)]
pub struct DirectoryUploader {
  dir:  PathBuf,
  next: AtomicUsize,
}

impl DirectoryUploader {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self {
      dir:  dir.into(),
      next: AtomicUsize::new(1),
    }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }
}

#[async_trait]
impl ImageUploader for DirectoryUploader {
  fn name(&self) -> Cow<'_, str> {
    Cow::Owned(format!("directory:{}", self.dir.display()))
  }

  async fn upload(&self, file: ImageFile) -> Result<UploadedImage, UploadError> {
    if !file.is_image() {
      return Err(UploadError::NotAnImage(file.name));
    }
    let format =
      image::guess_format(&file.bytes).map_err(|err| UploadError::Rejected(err.to_string()))?;
    let decoded = image::load_from_memory_with_format(&file.bytes, format)
      .map_err(|err| UploadError::Rejected(err.to_string()))?;

    tokio::fs::create_dir_all(&self.dir).await?;
    let n = self.next.fetch_add(1, Ordering::Relaxed);
    let extension = format.extensions_str().first().copied().unwrap_or("bin");
    let path = self.dir.join(format!("{n:04}.{extension}"));
    tokio::fs::write(&path, &file.bytes).await?;

    let absolute = std::path::absolute(&path)?;
    let url = Url::from_file_path(&absolute)
      .map_err(|()| UploadError::Rejected(format!("no URL for {}", absolute.display())))?;
    log::info!("stored {} as {}", file.name, path.display());

    Ok(UploadedImage {
      url:    url.into(),
      width:  decoded.width(),
      height: decoded.height(),
      format: extension.to_string(),
      bytes:  file.bytes.len() as u64,
    })
  }
}

/// Fetches `file://` images. Other schemes are unsupported, so pasted remote
/// images are linked by their URL instead.
#[derive(Debug, Default)]
pub struct FileFetcher;

#[async_trait]
impl ImageFetcher for FileFetcher {
  fn name(&self) -> Cow<'_, str> {
    "file".into()
  }

  async fn fetch(&self, url: &str) -> Result<ImageFile, FetchError> {
    let parsed = Url::parse(url).map_err(|_| FetchError::Unsupported(url.to_string()))?;
    if parsed.scheme() != "file" {
      return Err(FetchError::Unsupported(url.to_string()));
    }
    let path = parsed
      .to_file_path()
      .map_err(|()| FetchError::Unsupported(url.to_string()))?;
    let bytes = tokio::fs::read(&path).await?;
    let format =
      image::guess_format(&bytes).map_err(|_| FetchError::NotAnImage(url.to_string()))?;
    let name = path
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_else(|| "image".to_string());
    Ok(ImageFile::new(name, format.to_mime_type(), bytes))
  }
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use image::ImageFormat;

  use super::*;

  fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image::RgbImage::new(width, height)
      .write_to(&mut out, ImageFormat::Png)
      .unwrap();
    out.into_inner()
  }

  #[tokio::test]
  async fn upload_stores_file_and_reads_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let uploader = DirectoryUploader::new(dir.path().join("uploads"));
    let uploaded = uploader
      .upload(ImageFile::new("shot.png", "image/png", png_bytes(3, 2)))
      .await
      .unwrap();

    assert_eq!((uploaded.width, uploaded.height), (3, 2));
    assert_eq!(uploaded.format, "png");
    assert!(uploaded.url.starts_with("file://"));
    assert!(dir.path().join("uploads/0001.png").is_file());
  }

  #[tokio::test]
  async fn garbage_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let uploader = DirectoryUploader::new(dir.path());
    let result = uploader
      .upload(ImageFile::new("x.png", "image/png", vec![1, 2, 3]))
      .await;
    assert!(matches!(result, Err(UploadError::Rejected(_))));
  }

  #[tokio::test]
  async fn fetches_file_urls_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("remote.png");
    std::fs::write(&path, png_bytes(1, 1)).unwrap();
    let url = Url::from_file_path(&path).unwrap();

    let file = FileFetcher.fetch(url.as_str()).await.unwrap();
    assert_eq!(file.name, "remote.png");
    assert_eq!(file.mime, "image/png");

    let remote = FileFetcher.fetch("https://cdn.example.com/a.png").await;
    assert!(matches!(remote, Err(FetchError::Unsupported(_))));
  }
}
