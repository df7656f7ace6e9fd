//! The editable surface: a [`Document`] plus caret, focus and change
//! notification.
//!
//! Every mutation goes through [`Surface::apply`]. A successful edit fires the
//! change listener with the serialized content, unless a batch is open, in
//! which case a single notification fires when the outermost batch closes.

use std::ops::Range;

use unicode_segmentation::UnicodeSegmentation;

use crate::{
  document::Document,
  insert,
  node::Node,
  selection::{
    Position,
    Selection,
  },
};

pub type ChangeListener = Box<dyn FnMut(&str) + Send>;

#[derive(Debug)]
pub enum EditOp {
  /// Insert plain text at the caret. Newlines become line breaks.
  InsertText(String),
  InsertNodes(Vec<Node>),
  InsertLineBreak,
  /// Delete the selection, or the grapheme before the caret.
  DeleteBackward,
  /// Delete the selection, or the grapheme after the caret.
  DeleteForward,
  /// Replace a flat range with `nodes`, leaving the caret after them.
  ReplaceSpan {
    span:  Range<usize>,
    nodes: Vec<Node>,
  },
  /// Replace the whole document with an HTML fragment; the caret moves to
  /// the end.
  ReplaceContent(String),
}

pub struct Surface {
  document:    Document,
  selection:   Option<Selection>,
  focused:     bool,
  on_change:   Option<ChangeListener>,
  batch_depth: usize,
  batch_dirty: bool,
  version:     u64,
}

impl std::fmt::Debug for Surface {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Surface")
      .field("document", &self.document)
      .field("selection", &self.selection)
      .field("focused", &self.focused)
      .field("batch_depth", &self.batch_depth)
      .field("version", &self.version)
      .finish_non_exhaustive()
  }
}

impl Surface {
  pub fn new(content: &str) -> Self {
    Self {
      document:    Document::from_html(content),
      selection:   None,
      focused:     false,
      on_change:   None,
      batch_depth: 0,
      batch_dirty: false,
      version:     0,
    }
  }

  pub fn set_on_change(&mut self, listener: impl FnMut(&str) + Send + 'static) {
    self.on_change = Some(Box::new(listener));
  }

  pub fn document(&self) -> &Document {
    &self.document
  }

  pub fn content(&self) -> String {
    self.document.to_html()
  }

  /// Bumped on every mutation, including external syncs.
  pub fn version(&self) -> u64 {
    self.version
  }

  pub fn selection(&self) -> Option<Selection> {
    self.selection
  }

  pub fn set_selection(&mut self, selection: Selection) {
    self.selection = Some(selection);
  }

  pub fn clear_selection(&mut self) {
    self.selection = None;
  }

  pub fn move_cursor_to(&mut self, offset: usize) {
    self.selection = Some(Selection::point(self.document.position_at(offset)));
  }

  pub fn move_cursor_to_end(&mut self) {
    self.selection = Some(Selection::point(self.document.end_position()));
  }

  pub fn is_focused(&self) -> bool {
    self.focused
  }

  /// Focuses the surface. Without a selection the caret goes to the end.
  pub fn focus(&mut self) {
    self.focused = true;
    if self.selection.is_none() {
      self.move_cursor_to_end();
    }
  }

  pub fn blur(&mut self) {
    self.focused = false;
  }

  /// Flat offset of the caret.
  pub fn cursor_offset(&self) -> Option<usize> {
    self
      .selection
      .and_then(|selection| self.document.flat_offset(selection.head))
  }

  /// Flat range covered by the selection, in document order.
  pub fn selected_range(&self) -> Option<Range<usize>> {
    let selection = self.selection?;
    let anchor = self.document.flat_offset(selection.anchor)?;
    let head = self.document.flat_offset(selection.head)?;
    Some(anchor.min(head)..anchor.max(head))
  }

  /// The plain-text projection up to the caret.
  pub fn text_before_cursor(&self) -> Option<String> {
    let offset = self.cursor_offset()?;
    Some(self.document.text().chars().take(offset).collect())
  }

  pub fn begin_batch(&mut self) {
    self.batch_depth += 1;
  }

  /// Closes a batch. Closing the outermost batch fires one change
  /// notification if anything changed inside it.
  pub fn end_batch(&mut self) {
    self.batch_depth = self.batch_depth.saturating_sub(1);
    if self.batch_depth == 0 && std::mem::take(&mut self.batch_dirty) {
      self.notify();
    }
  }

  pub fn in_batch(&self) -> bool {
    self.batch_depth > 0
  }

  /// Applies an edit. Returns whether the document changed.
  pub fn apply(&mut self, op: EditOp) -> bool {
    let changed = match op {
      EditOp::InsertText(text) if text.is_empty() => false,
      EditOp::InsertText(text) => {
        if text.contains('\n') {
          self.insert_at_cursor_quiet(insert::text_nodes(&text, false))
        } else {
          self.insert_at_cursor_quiet(vec![Node::text(text)])
        }
      },
      EditOp::InsertNodes(nodes) => self.insert_at_cursor_quiet(nodes),
      EditOp::InsertLineBreak => self.insert_at_cursor_quiet(vec![Node::line_break()]),
      EditOp::DeleteBackward => self.delete(true),
      EditOp::DeleteForward => self.delete(false),
      EditOp::ReplaceSpan { span, nodes } => {
        let removed = self.document.delete_flat(span.clone());
        let at = self.document.position_at(span.start);
        self.selection = Some(Selection::point(at));
        let inserted = self.insert_at_cursor_quiet(nodes);
        removed > 0 || inserted
      },
      EditOp::ReplaceContent(content) => {
        self.document.set_html(&content);
        self.move_cursor_to_end();
        true
      },
    };

    if changed {
      self.version += 1;
      self.notify();
    }
    changed
  }

  /// Inserts nodes at the caret, or at the end of the document when there is
  /// no usable caret.
  pub fn insert_at_cursor(&mut self, nodes: Vec<Node>) -> bool {
    self.apply(EditOp::InsertNodes(nodes))
  }

  /// Replaces the whole content, firing the change listener.
  pub fn replace_content(&mut self, content: &str) {
    self.apply(EditOp::ReplaceContent(content.to_string()));
  }

  /// Adopts content pushed by the host. Ignored while the surface is focused
  /// so the user's typing is never clobbered; never fires the change listener.
  /// Returns whether the document was replaced.
  pub fn sync_external(&mut self, content: &str) -> bool {
    if self.focused {
      tracing::debug!("ignoring external content while focused");
      return false;
    }
    if self.document.to_html() == content {
      return false;
    }
    self.document.set_html(content);
    self.selection = None;
    self.version += 1;
    true
  }

  fn insertion_point(&mut self) -> Position {
    if let Some(range) = self.selected_range()
      && !range.is_empty()
    {
      self.document.delete_flat(range.clone());
      return self.document.position_at(range.start);
    }
    self
      .selection
      .and_then(|selection| self.document.clamp_position(selection.head))
      .unwrap_or_else(|| self.document.end_position())
  }

  fn insert_at_cursor_quiet(&mut self, nodes: Vec<Node>) -> bool {
    if nodes.is_empty() {
      return false;
    }
    let at = self.insertion_point();
    match self.document.insert_nodes(at, nodes) {
      Ok(after) => {
        self.selection = Some(Selection::point(after));
        true
      },
      Err(err) => {
        tracing::warn!("failed to insert at caret: {err}");
        false
      },
    }
  }

  fn delete(&mut self, backward: bool) -> bool {
    if let Some(range) = self.selected_range()
      && !range.is_empty()
    {
      let removed = self.document.delete_flat(range.clone());
      self.move_cursor_to(range.start);
      return removed > 0;
    }

    let Some(offset) = self.cursor_offset() else {
      return false;
    };
    let text = self.document.text();
    let (before, after) = split_at_char(&text, offset);
    let span = if backward {
      let Some(grapheme) = before.graphemes(true).next_back() else {
        return false;
      };
      offset - grapheme.chars().count()..offset
    } else {
      let Some(grapheme) = after.graphemes(true).next() else {
        return false;
      };
      offset..offset + grapheme.chars().count()
    };

    let removed = self.document.delete_flat(span.clone());
    if removed > 0 {
      self.move_cursor_to(span.start);
    }
    removed > 0
  }

  fn notify(&mut self) {
    if self.batch_depth > 0 {
      self.batch_dirty = true;
      return;
    }
    if let Some(listener) = self.on_change.as_mut() {
      let content = self.document.to_html();
      listener(&content);
    }
  }
}

fn split_at_char(text: &str, offset: usize) -> (&str, &str) {
  let at = text
    .char_indices()
    .nth(offset)
    .map_or(text.len(), |(idx, _)| idx);
  text.split_at(at)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use parking_lot::Mutex;

  use super::*;

  fn recording(surface: &mut Surface) -> Arc<Mutex<Vec<String>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    surface.set_on_change(move |content| sink.lock().push(content.to_string()));
    seen
  }

  #[test]
  fn typing_notifies_each_edit() {
    let mut surface = Surface::new("");
    let seen = recording(&mut surface);
    surface.focus();
    surface.apply(EditOp::InsertText("a".into()));
    surface.apply(EditOp::InsertText("b".into()));
    assert_eq!(*seen.lock(), vec!["a".to_string(), "ab".to_string()]);
  }

  #[test]
  fn batch_notifies_once() {
    let mut surface = Surface::new("x");
    let seen = recording(&mut surface);
    surface.move_cursor_to_end();

    surface.begin_batch();
    surface.apply(EditOp::InsertText("1".into()));
    surface.begin_batch();
    surface.apply(EditOp::InsertText("2".into()));
    surface.end_batch();
    assert!(seen.lock().is_empty());
    surface.apply(EditOp::InsertText("3".into()));
    surface.end_batch();

    assert_eq!(*seen.lock(), vec!["x123".to_string()]);
  }

  #[test]
  fn empty_batch_is_silent() {
    let mut surface = Surface::new("x");
    let seen = recording(&mut surface);
    surface.begin_batch();
    surface.end_batch();
    assert!(seen.lock().is_empty());
  }

  #[test]
  fn multiline_text_becomes_line_breaks() {
    let mut surface = Surface::new("");
    surface.apply(EditOp::InsertText("one\ntwo".into()));
    assert_eq!(surface.content(), "one<br>two");
    assert_eq!(surface.cursor_offset(), Some(7));
  }

  #[test]
  fn insert_without_caret_appends() {
    let mut surface = Surface::new("<p>first</p>");
    surface.apply(EditOp::InsertText(" last".into()));
    assert_eq!(surface.content(), "<p>first last</p>");
  }

  #[test]
  fn typing_replaces_selection() {
    let mut surface = Surface::new("hello world");
    let doc = surface.document();
    surface.set_selection(Selection::new(doc.position_at(6), doc.position_at(11)));
    surface.apply(EditOp::InsertText("there".into()));
    assert_eq!(surface.content(), "hello there");
  }

  #[test]
  fn backspace_removes_whole_grapheme() {
    let mut surface = Surface::new("cafe\u{301}");
    surface.move_cursor_to_end();
    assert!(surface.apply(EditOp::DeleteBackward));
    assert_eq!(surface.content(), "caf");
    assert_eq!(surface.cursor_offset(), Some(3));
  }

  #[test]
  fn backspace_at_start_does_nothing() {
    let mut surface = Surface::new("abc");
    surface.move_cursor_to(0);
    let version = surface.version();
    assert!(!surface.apply(EditOp::DeleteBackward));
    assert_eq!(surface.version(), version);
  }

  #[test]
  fn delete_forward_removes_images() {
    let mut surface = Surface::new(r#"a<img src="x.png">b"#);
    surface.move_cursor_to(1);
    assert!(surface.apply(EditOp::DeleteForward));
    assert_eq!(surface.content(), "ab");
  }

  #[test]
  fn replace_span_leaves_caret_after_insert() {
    let mut surface = Surface::new("hi #inv");
    surface.apply(EditOp::ReplaceSpan {
      span:  3..7,
      nodes: vec![Node::text("Invoice")],
    });
    assert_eq!(surface.content(), "hi Invoice");
    assert_eq!(surface.cursor_offset(), Some(10));
  }

  #[test]
  fn external_sync_waits_for_blur() {
    let mut surface = Surface::new("old");
    let seen = recording(&mut surface);

    surface.focus();
    assert!(!surface.sync_external("new"));
    assert_eq!(surface.content(), "old");

    surface.blur();
    assert!(surface.sync_external("new"));
    assert_eq!(surface.content(), "new");
    assert!(!surface.sync_external("new"));
    assert!(seen.lock().is_empty());
  }
}
