//! The editable node tree and its plain-text projection.
//!
//! Besides tree positions, every place in the document has a flat offset into
//! [`Document::text`], a plain-text projection where
//!
//! - text contributes its chars,
//! - a `<br>` contributes `'\n'`,
//! - an image contributes [`OBJECT_REPLACEMENT`],
//! - a block element (`<p>`, `<div>`, ...) contributes one `'\n'` separating
//!   it from the content before it, and one separating it from the content
//!   after it; neither is emitted at the very start of the document.
//!
//! The projection is what trigger detection and macro span matching look at.

use std::ops::Range;

use inkpad_core::OBJECT_REPLACEMENT;
use thiserror::Error;

use crate::{
  Tendril,
  html,
  node::{
    Node,
    NodeId,
    NodeKind,
  },
  selection::Position,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
  #[error("node {0} is not in the document")]
  UnknownNode(u64),
  #[error("node {0} cannot hold a caret")]
  NotAContainer(u64),
}

pub type Result<T> = std::result::Result<T, DocumentError>;

#[derive(Debug, Clone, Copy)]
enum StopKind<'a> {
  /// Between two children of `container`, before child `index`.
  Gap {
    container: NodeId,
    index:     usize,
    depth:     usize,
    last:      bool,
  },
  Text {
    id:   NodeId,
    text: &'a str,
    len:  usize,
  },
  Atom {
    id: NodeId,
    ch: char,
  },
  BlockBreak,
}

#[derive(Debug, Clone, Copy)]
struct Stop<'a> {
  start: usize,
  kind:  StopKind<'a>,
}

impl Stop<'_> {
  fn width(&self) -> usize {
    match self.kind {
      StopKind::Gap { .. } => 0,
      StopKind::Text { len, .. } => len,
      StopKind::Atom { .. } | StopKind::BlockBreak => 1,
    }
  }
}

#[derive(Default)]
struct Layout<'a> {
  stops:         Vec<Stop<'a>>,
  len:           usize,
  pending_break: bool,
}

impl<'a> Layout<'a> {
  fn emit(&mut self, kind: StopKind<'a>) {
    let stop = Stop {
      start: self.len,
      kind,
    };
    self.len += stop.width();
    self.stops.push(stop);
  }

  fn flush_break(&mut self) {
    if std::mem::take(&mut self.pending_break) && self.len > 0 {
      self.emit(StopKind::BlockBreak);
    }
  }

  fn walk(&mut self, container: NodeId, children: &'a [Node], depth: usize) {
    for (index, child) in children.iter().enumerate() {
      self.emit(StopKind::Gap {
        container,
        index,
        depth,
        last: false,
      });
      match &child.kind {
        NodeKind::Text(text) => {
          if !text.is_empty() {
            self.flush_break();
          }
          self.emit(StopKind::Text {
            id:   child.id(),
            text: text.as_str(),
            len:  text.chars().count(),
          });
        },
        NodeKind::LineBreak => {
          self.flush_break();
          self.emit(StopKind::Atom {
            id: child.id(),
            ch: '\n',
          });
        },
        NodeKind::Image(_) => {
          self.flush_break();
          self.emit(StopKind::Atom {
            id: child.id(),
            ch: OBJECT_REPLACEMENT,
          });
        },
        NodeKind::Link(_) | NodeKind::Element(_) => {
          let block = child.is_block();
          if block {
            self.pending_break = true;
            self.flush_break();
          }
          if let Some(grandchildren) = child.children() {
            self.walk(child.id(), grandchildren, depth + 1);
          }
          if block {
            self.pending_break = true;
          }
        },
      }
    }
    self.emit(StopKind::Gap {
      container,
      index: children.len(),
      depth,
      last: true,
    });
  }
}

/// A rich-text document: a forest of nodes under an implicit root.
#[derive(Debug)]
pub struct Document {
  root:     NodeId,
  children: Vec<Node>,
}

impl Default for Document {
  fn default() -> Self {
    Self::new()
  }
}

impl Document {
  pub fn new() -> Self {
    Self {
      root:     NodeId::fresh(),
      children: Vec::new(),
    }
  }

  pub fn from_html(html: &str) -> Self {
    Self {
      root:     NodeId::fresh(),
      children: html::parse_fragment(html),
    }
  }

  /// Id of the implicit root. Positions may point into it by child index.
  pub fn root_id(&self) -> NodeId {
    self.root
  }

  pub fn children(&self) -> &[Node] {
    &self.children
  }

  pub fn is_empty(&self) -> bool {
    self.children.iter().all(|node| node.text_len() == 0 && !node.is_block())
  }

  pub fn to_html(&self) -> String {
    html::serialize(&self.children)
  }

  /// Replaces the whole tree. Every previously issued [`Position`] becomes
  /// detached, including positions in the root.
  pub fn set_html(&mut self, html: &str) {
    *self = Self::from_html(html);
  }

  pub fn contains(&self, id: NodeId) -> bool {
    id == self.root || find(&self.children, id).is_some()
  }

  pub fn node(&self, id: NodeId) -> Option<&Node> {
    find(&self.children, id)
  }

  fn layout(&self) -> Layout<'_> {
    let mut layout = Layout::default();
    layout.walk(self.root, &self.children, 0);
    layout
  }

  /// The plain-text projection of the document.
  pub fn text(&self) -> String {
    let layout = self.layout();
    let mut out = String::with_capacity(layout.len);
    for stop in &layout.stops {
      match stop.kind {
        StopKind::Text { text, .. } => out.push_str(text),
        StopKind::Atom { ch, .. } => out.push(ch),
        StopKind::BlockBreak => out.push('\n'),
        StopKind::Gap { .. } => {},
      }
    }
    out
  }

  /// Length of [`Document::text`] in chars.
  pub fn len_chars(&self) -> usize {
    self.layout().len
  }

  /// The flat offset of `pos`, or `None` when `pos` is detached.
  pub fn flat_offset(&self, pos: Position) -> Option<usize> {
    let layout = self.layout();
    layout.stops.iter().find_map(|stop| {
      match stop.kind {
        StopKind::Text { id, len, .. } if id == pos.node => Some(stop.start + pos.offset.min(len)),
        StopKind::Gap {
          container,
          index,
          last,
          ..
        } if container == pos.node && (index == pos.offset || (last && pos.offset > index)) => {
          Some(stop.start)
        },
        _ => None,
      }
    })
  }

  /// The tree position for a flat offset, clamped to the document length.
  ///
  /// Offsets at the end of a text node resolve into that node rather than the
  /// start of whatever follows, so typing extends the text to the left of the
  /// caret.
  pub fn position_at(&self, offset: usize) -> Position {
    let layout = self.layout();
    let offset = offset.min(layout.len);

    if let Some(pos) = layout.stops.iter().find_map(|stop| {
      match stop.kind {
        StopKind::Text { id, len, .. } if (stop.start..=stop.start + len).contains(&offset) => {
          Some(Position::new(id, offset - stop.start))
        },
        _ => None,
      }
    }) {
      return pos;
    }

    let mut best: Option<(usize, Position)> = None;
    for stop in &layout.stops {
      if let StopKind::Gap {
        container,
        index,
        depth,
        ..
      } = stop.kind
        && stop.start == offset
        && best.is_none_or(|(best_depth, _)| depth > best_depth)
      {
        best = Some((depth, Position::new(container, index)));
      }
    }
    best.map_or_else(
      || Position::new(self.root, self.children.len()),
      |(_, pos)| pos,
    )
  }

  /// Where appended content goes: the end of the last text, or after the last
  /// node of the last non-link container.
  pub fn end_position(&self) -> Position {
    fn end_in(container: NodeId, children: &[Node]) -> Position {
      match children.last() {
        None => Position::new(container, 0),
        Some(last) => {
          match &last.kind {
            NodeKind::Text(text) => Position::new(last.id(), text.chars().count()),
            NodeKind::Element(element) if last.is_container() => {
              end_in(last.id(), &element.children)
            },
            _ => Position::new(container, children.len()),
          }
        },
      }
    }
    end_in(self.root, &self.children)
  }

  /// Clamps `pos` into its node, or returns `None` when it is detached or
  /// points into a node that cannot hold a caret.
  pub fn clamp_position(&self, pos: Position) -> Option<Position> {
    if pos.node == self.root {
      return Some(Position::new(pos.node, pos.offset.min(self.children.len())));
    }
    let node = self.node(pos.node)?;
    let max = match (&node.kind, node.children()) {
      (NodeKind::Text(text), _) => text.chars().count(),
      (_, Some(children)) if node.is_container() => children.len(),
      _ => return None,
    };
    Some(Position::new(pos.node, pos.offset.min(max)))
  }

  fn children_mut(&mut self, container: NodeId) -> Result<&mut Vec<Node>> {
    if container == self.root {
      return Ok(&mut self.children);
    }
    let node =
      find_mut(&mut self.children, container).ok_or(DocumentError::UnknownNode(container.get()))?;
    if !node.is_container() {
      return Err(DocumentError::NotAContainer(container.get()));
    }
    node
      .children_mut()
      .ok_or(DocumentError::NotAContainer(container.get()))
  }

  fn parent_of(&self, id: NodeId) -> Option<(NodeId, usize)> {
    parent_of(self.root, &self.children, id)
  }

  /// Resolves `pos` to a gap between children, splitting a text node when the
  /// position is strictly inside it.
  fn split_at(&mut self, pos: Position) -> Result<(NodeId, usize)> {
    let pos = self
      .clamp_position(pos)
      .ok_or(DocumentError::UnknownNode(pos.node.get()))?;
    let Some(NodeKind::Text(text)) = self.node(pos.node).map(|node| &node.kind) else {
      return Ok((pos.node, pos.offset));
    };
    let len = text.chars().count();
    let (parent, index) = self
      .parent_of(pos.node)
      .ok_or(DocumentError::UnknownNode(pos.node.get()))?;

    if pos.offset == 0 {
      return Ok((parent, index));
    }
    if pos.offset >= len {
      return Ok((parent, index + 1));
    }

    let tail = match find_mut(&mut self.children, pos.node).map(|node| &mut node.kind) {
      Some(NodeKind::Text(text)) => {
        let at = byte_offset(text, pos.offset);
        let tail = Tendril::from(&text[at..]);
        text.truncate(at);
        tail
      },
      _ => return Err(DocumentError::UnknownNode(pos.node.get())),
    };
    self
      .children_mut(parent)?
      .insert(index + 1, Node::text(tail));
    Ok((parent, index + 1))
  }

  /// Inserts plain text at `pos`, extending an adjacent text node when there
  /// is one. Returns the position right after the inserted text.
  pub fn insert_text(&mut self, pos: Position, text: &str) -> Result<Position> {
    let pos = self
      .clamp_position(pos)
      .ok_or(DocumentError::UnknownNode(pos.node.get()))?;
    let inserted = text.chars().count();

    if let Some(node) = find_mut(&mut self.children, pos.node)
      && let NodeKind::Text(existing) = &mut node.kind
    {
      let at = byte_offset(existing, pos.offset);
      existing.insert_str(at, text);
      return Ok(Position::new(pos.node, pos.offset + inserted));
    }

    let children = self.children_mut(pos.node)?;
    let index = pos.offset.min(children.len());

    if index > 0
      && let NodeKind::Text(before) = &mut children[index - 1].kind
    {
      before.push_str(text);
      let len = before.chars().count();
      return Ok(Position::new(children[index - 1].id(), len));
    }
    if let Some(after) = children.get_mut(index)
      && let NodeKind::Text(existing) = &mut after.kind
    {
      existing.insert_str(0, text);
      return Ok(Position::new(after.id(), inserted));
    }

    let node = Node::text(text);
    let id = node.id();
    children.insert(index, node);
    Ok(Position::new(id, inserted))
  }

  /// Inserts `nodes` at `pos`. Returns the position right after the last
  /// inserted node.
  pub fn insert_nodes(&mut self, pos: Position, nodes: Vec<Node>) -> Result<Position> {
    if nodes.len() == 1
      && let NodeKind::Text(text) = &nodes[0].kind
    {
      return self.insert_text(pos, text);
    }
    if nodes.is_empty() {
      return self
        .clamp_position(pos)
        .ok_or(DocumentError::UnknownNode(pos.node.get()));
    }

    let (container, index) = self.split_at(pos)?;
    let trailing_text = nodes
      .last()
      .and_then(|node| node.as_text().map(|text| (node.id(), text.chars().count())));
    let count = nodes.len();

    let children = self.children_mut(container)?;
    let index = index.min(children.len());
    children.splice(index..index, nodes);

    Ok(match trailing_text {
      Some((id, len)) => Position::new(id, len),
      None => Position::new(container, index + count),
    })
  }

  /// Deletes the flat range `range`. Block separators cannot be deleted and
  /// are skipped. Returns the number of chars removed.
  pub fn delete_flat(&mut self, range: Range<usize>) -> usize {
    let mut cuts = Vec::new();
    let mut removals = Vec::new();
    let mut removed = 0;

    for stop in &self.layout().stops {
      match stop.kind {
        StopKind::Text { id, len, .. } => {
          let from = range.start.max(stop.start);
          let to = range.end.min(stop.start + len);
          if from < to {
            cuts.push((id, from - stop.start..to - stop.start));
            removed += to - from;
          }
        },
        StopKind::Atom { id, .. } if range.contains(&stop.start) => {
          removals.push(id);
          removed += 1;
        },
        _ => {},
      }
    }

    for (id, chars) in cuts {
      if let Some(node) = find_mut(&mut self.children, id)
        && let NodeKind::Text(text) = &mut node.kind
      {
        let from = byte_offset(text, chars.start);
        let to = byte_offset(text, chars.end);
        let mut rest = Tendril::from(&text[..from]);
        rest.push_str(&text[to..]);
        *text = rest;
      }
    }
    for id in removals {
      if let Some((parent, index)) = self.parent_of(id)
        && let Ok(children) = self.children_mut(parent)
      {
        children.remove(index);
      }
    }
    if removed > 0 {
      prune_empty_links(&mut self.children);
    }
    removed
  }

  /// The char at flat offset `offset`, block separators included.
  pub fn char_at(&self, offset: usize) -> Option<char> {
    self.text().chars().nth(offset)
  }
}

fn byte_offset(text: &str, char_idx: usize) -> usize {
  text
    .char_indices()
    .nth(char_idx)
    .map_or(text.len(), |(idx, _)| idx)
}

fn find(nodes: &[Node], id: NodeId) -> Option<&Node> {
  for node in nodes {
    if node.id() == id {
      return Some(node);
    }
    if let Some(found) = node.children().and_then(|children| find(children, id)) {
      return Some(found);
    }
  }
  None
}

fn find_mut(nodes: &mut [Node], id: NodeId) -> Option<&mut Node> {
  for node in nodes.iter_mut() {
    if node.id() == id {
      return Some(node);
    }
    if let Some(children) = node.children_mut()
      && let Some(found) = find_mut(children, id)
    {
      return Some(found);
    }
  }
  None
}

fn parent_of(container: NodeId, children: &[Node], id: NodeId) -> Option<(NodeId, usize)> {
  for (index, node) in children.iter().enumerate() {
    if node.id() == id {
      return Some((container, index));
    }
    if let Some(found) = node
      .children()
      .and_then(|grandchildren| parent_of(node.id(), grandchildren, id))
    {
      return Some(found);
    }
  }
  None
}

fn prune_empty_links(nodes: &mut Vec<Node>) {
  nodes.retain_mut(|node| {
    if let Some(children) = node.children_mut() {
      prune_empty_links(children);
    }
    !matches!(&node.kind, NodeKind::Link(link) if link.children.iter().all(|c| c.text_len() == 0))
  });
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::node::Image;

  #[test]
  fn text_projection() {
    let doc = Document::from_html("<p>one<br>two</p><p><img src=a.png>x</p>tail");
    assert_eq!(doc.text(), "one\ntwo\n\u{FFFC}x\ntail");
    assert_eq!(doc.len_chars(), 15);
  }

  #[test]
  fn projection_has_no_leading_break() {
    let doc = Document::from_html("<div>a</div>");
    assert_eq!(doc.text(), "a");
    let doc = Document::from_html("<p>a</p><p></p>");
    assert_eq!(doc.text(), "a\n");
  }

  #[test]
  fn flat_offsets_roundtrip_through_positions() {
    let doc = Document::from_html("<p>ab</p><p>cd<br>e</p>");
    for offset in 0..=doc.len_chars() {
      let pos = doc.position_at(offset);
      assert_eq!(doc.flat_offset(pos), Some(offset), "offset {offset}");
    }
  }

  #[test]
  fn end_of_text_prefers_left_node() {
    let doc = Document::from_html("ab<b>cd</b>");
    let pos = doc.position_at(2);
    assert_eq!(doc.node(pos.node).and_then(Node::as_text), Some("ab"));
    assert_eq!(pos.offset, 2);
  }

  #[test]
  fn empty_block_gets_a_caret_inside() {
    let doc = Document::from_html("<p>a</p><p></p>");
    let pos = doc.position_at(2);
    let p = &doc.children()[1];
    assert_eq!(pos, Position::new(p.id(), 0));
  }

  #[test]
  fn insert_text_extends_neighbours() {
    let mut doc = Document::from_html("<p>hello</p>");
    let pos = doc.position_at(5);
    let after = doc.insert_text(pos, " world").unwrap();
    assert_eq!(doc.to_html(), "<p>hello world</p>");
    assert_eq!(doc.flat_offset(after), Some(11));

    let mut doc = Document::from_html("<img src=a.png>");
    let after = doc.insert_text(doc.end_position(), "x").unwrap();
    assert_eq!(doc.to_html(), r#"<img src="a.png">x"#);
    assert_eq!(doc.flat_offset(after), Some(2));
  }

  #[test]
  fn insert_nodes_splits_text() {
    let mut doc = Document::from_html("<p>abcd</p>");
    let pos = doc.position_at(2);
    let after = doc
      .insert_nodes(pos, vec![Node::image(Image::new("x.png")), Node::line_break()])
      .unwrap();
    assert_eq!(doc.to_html(), r#"<p>ab<img src="x.png"><br>cd</p>"#);
    assert_eq!(doc.flat_offset(after), Some(4));
  }

  #[test]
  fn insert_at_detached_position_fails() {
    let mut doc = Document::from_html("abc");
    let stale = doc.position_at(1);
    doc.set_html("abc");
    assert_eq!(
      doc.insert_text(stale, "x"),
      Err(DocumentError::UnknownNode(stale.node.get()))
    );
  }

  #[test]
  fn delete_spans_nodes() {
    let mut doc = Document::from_html("<p>ab<br>cd</p>ef");
    // "ab\ncd\nef", delete "b\ncd\ne"
    let removed = doc.delete_flat(1..7);
    assert_eq!(removed, 5);
    assert_eq!(doc.to_html(), "<p>a</p>f");
  }

  #[test]
  fn delete_removes_emptied_links() {
    let mut doc = Document::from_html(r#"see <a href="https://x.io">x.io</a>!"#);
    doc.delete_flat(4..8);
    assert_eq!(doc.to_html(), "see !");
  }

  #[test]
  fn clamp_rejects_atoms() {
    let doc = Document::from_html("<br>");
    let br = doc.children()[0].id();
    assert_eq!(doc.clamp_position(Position::new(br, 0)), None);
    assert_eq!(
      doc.clamp_position(Position::new(doc.root_id(), 9)),
      Some(Position::new(doc.root_id(), 1))
    );
  }
}
