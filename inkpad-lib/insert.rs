//! Insertion executors.
//!
//! Each executor performs one semantic edit (text, link, image or macro) at
//! the caret or at a position saved before an async step, and goes through
//! [`Surface::apply`] so the change listener fires once per edit.

use std::ops::Range;

use inkpad_core::{
  line_ending::normalize_line_endings,
  link::{
    Segment,
    split_links,
  },
};

use crate::{
  html,
  node::{
    Image,
    Node,
  },
  selection::{
    self,
    SelectionHandle,
  },
  surface::{
    EditOp,
    Surface,
  },
  trigger::TriggerContext,
  upload::UploadedImage,
};

/// Converts plain text to nodes. Newlines become line breaks; with
/// `autolink`, `http(s)://` URLs become links labelled with the URL.
pub fn text_nodes(text: &str, autolink: bool) -> Vec<Node> {
  let mut nodes = Vec::new();
  for (i, line) in text.split('\n').enumerate() {
    if i > 0 {
      nodes.push(Node::line_break());
    }
    if line.is_empty() {
      continue;
    }
    if !autolink {
      nodes.push(Node::text(line));
      continue;
    }
    for segment in split_links(line) {
      nodes.push(match segment {
        Segment::Text(text) => Node::text(text),
        Segment::Link(url) => Node::link(url, url),
      });
    }
  }
  nodes
}

/// Inserts plain text at the caret. Line endings are normalized first.
pub fn insert_text(surface: &mut Surface, text: &str, autolink: bool) -> bool {
  let text = normalize_line_endings(text);
  surface.apply(EditOp::InsertNodes(text_nodes(&text, autolink)))
}

/// Inserts a link at the caret. Without a label the link shows its href.
pub fn insert_link(surface: &mut Surface, href: &str, label: Option<&str>) -> bool {
  let href = href.trim();
  if href.is_empty() {
    return false;
  }
  let label = label.filter(|label| !label.is_empty()).unwrap_or(href);
  surface.insert_at_cursor(vec![Node::link(href, label)])
}

/// Inserts an image by URL reference at the caret.
pub fn insert_image_url(surface: &mut Surface, url: &str, alt: Option<&str>) -> bool {
  let image = Image {
    alt: alt.map(str::to_string),
    ..Image::new(url)
  };
  surface.insert_at_cursor(vec![Node::image(image)])
}

/// The image node for a finished upload. The alt text is the file name.
pub fn uploaded_image_node(uploaded: &UploadedImage, alt: &str) -> Node {
  Node::image(Image {
    src:    uploaded.url.clone(),
    alt:    Some(alt.to_string()).filter(|alt| !alt.is_empty()),
    width:  Some(uploaded.width).filter(|width| *width > 0),
    height: Some(uploaded.height).filter(|height| *height > 0),
    attrs:  Vec::new(),
  })
}

/// An image whose upload (or fetch) is in flight, with the selection it goes
/// back to.
#[derive(Debug, Clone)]
pub struct PendingImage {
  handle:  Option<SelectionHandle>,
  pub alt: String,
}

impl PendingImage {
  pub fn has_saved_selection(&self) -> bool {
    self.handle.is_some()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePlacement {
  AtSelection,
  /// The saved selection was gone; the image went to the end.
  AppendedAtEnd,
}

/// Saves the selection before an image is uploaded. `alt` is usually the
/// file name.
pub fn begin_image_insert(surface: &Surface, alt: impl Into<String>) -> PendingImage {
  PendingImage {
    handle: selection::save(surface),
    alt:    alt.into(),
  }
}

fn place(surface: &mut Surface, pending: &PendingImage) -> ImagePlacement {
  let restored = pending
    .handle
    .as_ref()
    .is_some_and(|handle| selection::restore(surface, handle));
  if restored {
    ImagePlacement::AtSelection
  } else {
    tracing::debug!("appending image {:?} at the end", pending.alt);
    surface.move_cursor_to_end();
    ImagePlacement::AppendedAtEnd
  }
}

/// Inserts the uploaded image where the selection was when the upload
/// started, or at the end when that selection cannot be restored.
pub fn finish_image_insert(
  surface: &mut Surface,
  pending: PendingImage,
  uploaded: &UploadedImage,
) -> ImagePlacement {
  let placement = place(surface, &pending);
  surface.insert_at_cursor(vec![uploaded_image_node(uploaded, &pending.alt)]);
  placement
}

/// Like [`finish_image_insert`], for an image that is referenced by its
/// original URL instead of being uploaded.
pub fn finish_image_link(surface: &mut Surface, pending: PendingImage, url: &str) -> ImagePlacement {
  let placement = place(surface, &pending);
  let alt = Some(pending.alt.as_str()).filter(|alt| !alt.is_empty());
  insert_image_url(surface, url, alt);
  placement
}

/// Flat range and text of a trigger as last observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
  pub range: Range<usize>,
  pub text:  String,
}

/// Replace a trigger with a macro's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroInsertionRequest {
  pub replace_span:     Option<TextSpan>,
  /// HTML fragment.
  pub inserted_content: String,
}

impl MacroInsertionRequest {
  pub fn from_trigger(context: &TriggerContext, content: impl Into<String>) -> Self {
    Self {
      replace_span:     Some(TextSpan {
        range: context.span.clone(),
        text:  context.span_text(),
      }),
      inserted_content: content.into(),
    }
  }

  /// Insert `content` at the caret without removing anything.
  pub fn at_cursor(content: impl Into<String>) -> Self {
    Self {
      replace_span:     None,
      inserted_content: content.into(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroPlacement {
  /// The trigger was still where it was observed.
  Replaced,
  /// The trigger had moved; its last occurrence before the caret was replaced.
  ReplacedLastOccurrence,
  /// No trigger text was found; the content went to the caret.
  AtCursor,
}

/// Removes the trigger text and inserts the macro content in its place.
///
/// The recorded span is used when the document still has the trigger text
/// there. Otherwise the last occurrence of that text before the caret is
/// replaced, and when there is none the content is inserted at the caret.
pub fn insert_macro(surface: &mut Surface, request: &MacroInsertionRequest) -> MacroPlacement {
  let nodes = html::parse_fragment(&request.inserted_content);

  let Some(span) = request
    .replace_span
    .as_ref()
    .filter(|span| !span.text.is_empty())
  else {
    surface.insert_at_cursor(nodes);
    return MacroPlacement::AtCursor;
  };

  let text = surface.document().text();
  let (range, placement) = if char_slice(&text, span.range.clone()) == Some(span.text.as_str()) {
    (span.range.clone(), MacroPlacement::Replaced)
  } else {
    let cursor = surface
      .cursor_offset()
      .unwrap_or_else(|| text.chars().count());
    match last_occurrence_before(&text, &span.text, cursor) {
      Some(range) => (range, MacroPlacement::ReplacedLastOccurrence),
      None => {
        tracing::debug!("trigger {:?} not found, inserting at the caret", span.text);
        surface.insert_at_cursor(nodes);
        return MacroPlacement::AtCursor;
      },
    }
  };

  surface.apply(EditOp::ReplaceSpan { span: range, nodes });
  placement
}

fn char_slice(text: &str, range: Range<usize>) -> Option<&str> {
  let mut indices = text.char_indices().map(|(idx, _)| idx).chain([text.len()]);
  let start = indices.nth(range.start)?;
  let end = if range.end == range.start {
    start
  } else {
    indices.nth(range.end - range.start - 1)?
  };
  text.get(start..end)
}

fn last_occurrence_before(text: &str, needle: &str, cursor: usize) -> Option<Range<usize>> {
  let end = text
    .char_indices()
    .nth(cursor)
    .map_or(text.len(), |(idx, _)| idx);
  let byte = text[..end].rfind(needle)?;
  let start = text[..byte].chars().count();
  Some(start..start + needle.chars().count())
}
