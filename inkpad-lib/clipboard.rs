//! Clipboard classification and paste planning.
//!
//! A paste is handled in two halves. The synchronous half runs inside the
//! host's paste event: it suppresses the default paste
//! ([`PasteEvent::prevent_default`]), classifies the raw [`ClipboardData`]
//! into exactly one [`ClipboardPayload`] and turns it into a [`PastePlan`].
//! The asynchronous half (see `Editor::run_paste`) executes the plan's
//! steps in order, awaiting uploads and fetches in between.
//!
//! Planning is pure: nothing here touches the document.

use base64::{
  Engine,
  engine::general_purpose::STANDARD,
};
use inkpad_core::line_ending::{
  collapse_blank_lines,
  normalize_line_endings,
};
use thiserror::Error;

use crate::{
  html,
  node::{
    NodeKind,
    visit,
  },
  upload::{
    ImageFile,
    extension_for_mime,
  },
};

/// Everything the host's clipboard offered for one paste.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardData {
  pub files: Vec<ImageFile>,
  pub html:  Option<String>,
  pub text:  Option<String>,
}

impl ClipboardData {
  pub fn plain(text: impl Into<String>) -> Self {
    Self {
      text: Some(text.into()),
      ..Default::default()
    }
  }

  pub fn html(html: impl Into<String>, text: Option<String>) -> Self {
    Self {
      html: Some(html.into()),
      text,
      ..Default::default()
    }
  }

  pub fn files(files: Vec<ImageFile>, text: Option<String>) -> Self {
    Self {
      files,
      text,
      ..Default::default()
    }
  }
}

/// A paste as delivered by the host.
#[derive(Debug)]
pub struct PasteEvent {
  data:              ClipboardData,
  default_prevented: bool,
}

impl PasteEvent {
  pub fn new(data: ClipboardData) -> Self {
    Self {
      data,
      default_prevented: false,
    }
  }

  /// Tells the host not to perform its own insertion.
  pub fn prevent_default(&mut self) {
    self.default_prevented = true;
  }

  pub fn is_default_prevented(&self) -> bool {
    self.default_prevented
  }

  pub fn data(&self) -> &ClipboardData {
    &self.data
  }

  pub fn take_data(&mut self) -> ClipboardData {
    std::mem::take(&mut self.data)
  }
}

/// The single kind of content a paste is handled as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardPayload {
  ImageFiles {
    files: Vec<ImageFile>,
    text:  Option<String>,
  },
  Html {
    html: String,
    text: Option<String>,
  },
  PlainText(String),
}

impl ClipboardPayload {
  /// Picks the payload kind: image files win over HTML, HTML over plain
  /// text. Non-image files and empty strings are ignored. Returns `None` when
  /// nothing pasteable is left.
  pub fn classify(data: ClipboardData) -> Option<Self> {
    let text = data.text.filter(|text| !text.is_empty());
    let files: Vec<_> = data
      .files
      .into_iter()
      .filter(ImageFile::is_image)
      .collect();

    if !files.is_empty() {
      return Some(Self::ImageFiles { files, text });
    }
    if let Some(html) = data.html.filter(|html| !html.trim().is_empty()) {
      return Some(Self::Html { html, text });
    }
    text.map(Self::PlainText)
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataUriError {
  #[error("not a data URI")]
  NotDataUri,
  #[error("data URI has no payload")]
  MissingPayload,
  #[error("data URI holds {0}, not an image")]
  NotAnImage(String),
  #[error("data URI is not base64 encoded")]
  NotBase64,
  #[error("invalid base64 in data URI: {0}")]
  Decode(#[from] base64::DecodeError),
}

/// Decodes a base64 `data:image/...` URI into a file named `name`, with the
/// extension taken from the mime type.
pub fn decode_data_uri(uri: &str, name: &str) -> Result<ImageFile, DataUriError> {
  let rest = uri
    .get(..5)
    .filter(|scheme| scheme.eq_ignore_ascii_case("data:"))
    .map(|_| &uri[5..])
    .ok_or(DataUriError::NotDataUri)?;
  let (meta, payload) = rest
    .split_once(',')
    .ok_or(DataUriError::MissingPayload)?;

  let mut params = meta.split(';');
  let mime = params
    .next()
    .map(|mime| mime.trim().to_ascii_lowercase())
    .filter(|mime| !mime.is_empty())
    .unwrap_or_else(|| "text/plain".to_string());
  let is_base64 = params.any(|param| param.trim().eq_ignore_ascii_case("base64"));

  if !mime.starts_with("image/") {
    return Err(DataUriError::NotAnImage(mime));
  }
  if !is_base64 {
    return Err(DataUriError::NotBase64);
  }

  let cleaned: String = payload
    .chars()
    .filter(|c| !c.is_ascii_whitespace())
    .collect();
  let bytes = STANDARD.decode(cleaned)?;
  let name = format!("{name}.{}", extension_for_mime(&mime));
  Ok(ImageFile::new(name, mime, bytes))
}

/// One insertion the paste will perform, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasteStep {
  /// Text (newlines included) to insert at the caret.
  InsertText(String),
  UploadImage(ImageFile),
  /// A non-data image source. Fetched and uploaded, or referenced directly
  /// when the fetch fails.
  FetchRemote {
    url: String,
    alt: Option<String>,
  },
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PastePlan {
  pub steps:    Vec<PasteStep>,
  /// Inline images that could not be decoded; reported, then skipped.
  pub rejected: Vec<DataUriError>,
}

impl PastePlan {
  pub fn is_empty(&self) -> bool {
    self.steps.is_empty() && self.rejected.is_empty()
  }

  pub fn image_count(&self) -> usize {
    self
      .steps
      .iter()
      .filter(|step| !matches!(step, PasteStep::InsertText(_)))
      .count()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasteOptions {
  /// Collapse runs of 3+ newlines to 2 in text accompanying images or HTML.
  pub collapse_blank_lines: bool,
}

impl Default for PasteOptions {
  fn default() -> Self {
    Self {
      collapse_blank_lines: true,
    }
  }
}

/// Turns a payload into ordered steps: text first, then images in clipboard
/// order.
pub fn plan(payload: ClipboardPayload, options: PasteOptions) -> PastePlan {
  let mut plan = PastePlan::default();
  let tidy = |text: &str| -> String {
    let text = normalize_line_endings(text);
    if options.collapse_blank_lines {
      collapse_blank_lines(&text).into_owned()
    } else {
      text.into_owned()
    }
  };

  match payload {
    ClipboardPayload::ImageFiles { files, text } => {
      if let Some(text) = text {
        plan.push_text(tidy(&text));
      }
      plan
        .steps
        .extend(files.into_iter().map(PasteStep::UploadImage));
    },
    ClipboardPayload::Html { html, text } => {
      let nodes = html::parse_fragment(&html);
      let text = text.unwrap_or_else(|| html::text_content(&nodes));
      plan.push_text(tidy(&text));

      let mut sources = Vec::new();
      visit(&nodes, &mut |node| {
        if let NodeKind::Image(image) = &node.kind {
          sources.push((image.src.trim().to_string(), image.alt.clone()));
        }
      });
      for (index, (src, alt)) in sources.into_iter().enumerate() {
        if src.is_empty() {
          continue;
        }
        if src.get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:")) {
          match decode_data_uri(&src, &format!("pasted-image-{}", index + 1)) {
            Ok(file) => plan.steps.push(PasteStep::UploadImage(file)),
            Err(err) => {
              tracing::warn!("skipping inline image: {err}");
              plan.rejected.push(err);
            },
          }
        } else {
          plan.steps.push(PasteStep::FetchRemote { url: src, alt });
        }
      }
    },
    ClipboardPayload::PlainText(text) => {
      plan.push_text(normalize_line_endings(&text).into_owned());
    },
  }

  plan
}

impl PastePlan {
  fn push_text(&mut self, text: String) {
    if !text.is_empty() {
      self.steps.push(PasteStep::InsertText(text));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn png(name: &str) -> ImageFile {
    ImageFile::new(name, "image/png", vec![0x89, b'P', b'N', b'G'])
  }

  #[test]
  fn image_files_win() {
    let data = ClipboardData {
      files: vec![png("a.png")],
      html:  Some("<b>x</b>".into()),
      text:  Some("x".into()),
    };
    let payload = ClipboardPayload::classify(data).unwrap();
    assert!(matches!(payload, ClipboardPayload::ImageFiles { ref files, .. } if files.len() == 1));
  }

  #[test]
  fn non_image_files_fall_through() {
    let data = ClipboardData {
      files: vec![ImageFile::new("a.pdf", "application/pdf", vec![1])],
      html:  None,
      text:  Some("hello".into()),
    };
    assert_eq!(
      ClipboardPayload::classify(data),
      Some(ClipboardPayload::PlainText("hello".into()))
    );
  }

  #[test]
  fn empty_clipboard_has_no_payload() {
    assert_eq!(ClipboardPayload::classify(ClipboardData::default()), None);
    assert_eq!(ClipboardPayload::classify(ClipboardData::plain("")), None);
  }

  #[test]
  fn paste_event_defers_default() {
    let mut event = PasteEvent::new(ClipboardData::plain("x"));
    assert!(!event.is_default_prevented());
    event.prevent_default();
    assert!(event.is_default_prevented());
    assert_eq!(event.take_data(), ClipboardData::plain("x"));
    assert_eq!(event.data(), &ClipboardData::default());
  }

  #[test]
  fn text_precedes_images_in_clipboard_order() {
    let payload = ClipboardPayload::ImageFiles {
      files: vec![png("1.png"), png("2.png")],
      text:  Some("caption\r\n\r\n\r\n\r\nmore".into()),
    };
    let plan = plan(payload, PasteOptions::default());
    assert_eq!(plan.steps, vec![
      PasteStep::InsertText("caption\n\nmore".into()),
      PasteStep::UploadImage(png("1.png")),
      PasteStep::UploadImage(png("2.png")),
    ]);
  }

  #[test]
  fn collapsing_can_be_disabled() {
    let payload = ClipboardPayload::ImageFiles {
      files: vec![png("1.png")],
      text:  Some("a\n\n\n\nb".into()),
    };
    let plan = plan(payload, PasteOptions {
      collapse_blank_lines: false,
    });
    assert_eq!(plan.steps[0], PasteStep::InsertText("a\n\n\n\nb".into()));
  }

  #[test]
  fn html_images_are_decoded_or_fetched() {
    let html = concat!(
      r#"<p>Screenshot:</p>"#,
      r#"<img src="data:image/png;base64,aGVs bG8=">"#,
      r#"<img src="https://cdn.example.com/a.gif" alt="gif">"#,
      r#"<img src="data:image/png;base64,@@@">"#,
      r#"<img src="data:text/plain;base64,aGk=">"#,
    );
    let plan = plan(
      ClipboardPayload::Html {
        html: html.into(),
        text: None,
      },
      PasteOptions::default(),
    );

    assert_eq!(plan.steps, vec![
      PasteStep::InsertText("Screenshot:".into()),
      PasteStep::UploadImage(ImageFile::new(
        "pasted-image-1.png",
        "image/png",
        b"hello".to_vec()
      )),
      PasteStep::FetchRemote {
        url: "https://cdn.example.com/a.gif".into(),
        alt: Some("gif".into()),
      },
    ]);
    assert_eq!(plan.rejected.len(), 2);
    assert_eq!(
      plan.rejected[1],
      DataUriError::NotAnImage("text/plain".into())
    );
    assert_eq!(plan.image_count(), 2);
  }

  #[test]
  fn html_prefers_accompanying_text() {
    let plan = plan(
      ClipboardPayload::Html {
        html: "<b>bold</b>".into(),
        text: Some("bold".into()),
      },
      PasteOptions::default(),
    );
    assert_eq!(plan.steps, vec![PasteStep::InsertText("bold".into())]);
  }

  #[test]
  fn plain_text_keeps_blank_lines() {
    let plan = plan(
      ClipboardPayload::PlainText("a\r\n\r\n\r\nb".into()),
      PasteOptions::default(),
    );
    assert_eq!(plan.steps, vec![PasteStep::InsertText("a\n\n\nb".into())]);
  }

  #[test]
  fn data_uri_errors() {
    assert_eq!(
      decode_data_uri("https://x", "a"),
      Err(DataUriError::NotDataUri)
    );
    assert_eq!(
      decode_data_uri("data:image/png;base64", "a"),
      Err(DataUriError::MissingPayload)
    );
    assert_eq!(
      decode_data_uri("data:image/svg+xml,<svg/>", "a"),
      Err(DataUriError::NotBase64)
    );
    assert_eq!(
      decode_data_uri("DATA:image/jpeg;base64,aGk=", "a").map(|file| file.name),
      Ok("a.jpg".to_string())
    );
  }
}
