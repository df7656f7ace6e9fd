//! Document tree nodes.
//!
//! A document is a forest of [`Node`]s. Every node carries a process-unique
//! [`NodeId`] so selections can refer to nodes and detect when they are gone.
//! Only [`NodeKind::Element`] and [`NodeKind::Link`] have children; text, line
//! breaks and images are leaves.

use std::{
  num::NonZeroU64,
  sync::atomic::{
    AtomicU64,
    Ordering,
  },
};

use crate::Tendril;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(NonZeroU64);

impl NodeId {
  pub fn fresh() -> Self {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    let id = NEXT.fetch_add(1, Ordering::Relaxed);
    Self(NonZeroU64::new(id).unwrap_or(NonZeroU64::MIN))
  }

  pub fn get(self) -> u64 {
    self.0.get()
  }
}

/// An attribute as `(name, value)`. Names are lowercase.
pub type Attr = (String, String);

/// Elements that never have children or a closing tag.
pub const VOID_TAGS: &[&str] = &[
  "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
  "wbr",
];

/// Elements that start a new line in the plain-text projection.
pub const BLOCK_TAGS: &[&str] = &[
  "address",
  "article",
  "aside",
  "blockquote",
  "div",
  "dl",
  "dd",
  "dt",
  "figure",
  "footer",
  "h1",
  "h2",
  "h3",
  "h4",
  "h5",
  "h6",
  "header",
  "hr",
  "li",
  "ol",
  "p",
  "pre",
  "section",
  "table",
  "tr",
  "ul",
];

pub fn is_void_tag(tag: &str) -> bool {
  VOID_TAGS.contains(&tag)
}

pub fn is_block_tag(tag: &str) -> bool {
  BLOCK_TAGS.contains(&tag)
}

#[derive(Debug, Clone)]
pub struct Node {
  id:       NodeId,
  pub kind: NodeKind,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
  Text(Tendril),
  LineBreak,
  Image(Image),
  Link(Link),
  Element(Element),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Image {
  pub src:    String,
  pub alt:    Option<String>,
  pub width:  Option<u32>,
  pub height: Option<u32>,
  /// Any other attributes, in source order.
  pub attrs:  Vec<Attr>,
}

impl Image {
  pub fn new(src: impl Into<String>) -> Self {
    Self {
      src: src.into(),
      ..Default::default()
    }
  }
}

#[derive(Debug, Clone)]
pub struct Link {
  pub href:     String,
  /// Any other attributes, in source order.
  pub attrs:    Vec<Attr>,
  pub children: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct Element {
  pub tag:      Tendril,
  pub attrs:    Vec<Attr>,
  pub children: Vec<Node>,
}

impl Node {
  pub fn new(kind: NodeKind) -> Self {
    Self {
      id: NodeId::fresh(),
      kind,
    }
  }

  pub fn text(text: impl Into<Tendril>) -> Self {
    Self::new(NodeKind::Text(text.into()))
  }

  pub fn line_break() -> Self {
    Self::new(NodeKind::LineBreak)
  }

  pub fn image(image: Image) -> Self {
    Self::new(NodeKind::Image(image))
  }

  /// A link opening in a new tab, labelled with `label`.
  pub fn link(href: impl Into<String>, label: &str) -> Self {
    Self::new(NodeKind::Link(Link {
      href:     href.into(),
      attrs:    vec![
        ("target".to_string(), "_blank".to_string()),
        ("rel".to_string(), "noopener noreferrer".to_string()),
      ],
      children: vec![Node::text(label)],
    }))
  }

  pub fn element(tag: impl Into<Tendril>, attrs: Vec<Attr>, children: Vec<Node>) -> Self {
    Self::new(NodeKind::Element(Element {
      tag: tag.into(),
      attrs,
      children,
    }))
  }

  pub fn id(&self) -> NodeId {
    self.id
  }

  pub fn as_text(&self) -> Option<&str> {
    match &self.kind {
      NodeKind::Text(text) => Some(text.as_str()),
      _ => None,
    }
  }

  pub fn is_text(&self) -> bool {
    matches!(self.kind, NodeKind::Text(_))
  }

  /// Whether a position may point inside this node by child index.
  pub fn is_container(&self) -> bool {
    match &self.kind {
      NodeKind::Link(_) => true,
      NodeKind::Element(element) => !is_void_tag(&element.tag),
      _ => false,
    }
  }

  pub fn is_block(&self) -> bool {
    matches!(&self.kind, NodeKind::Element(element) if is_block_tag(&element.tag))
  }

  pub fn children(&self) -> Option<&[Node]> {
    match &self.kind {
      NodeKind::Link(link) => Some(&link.children),
      NodeKind::Element(element) => Some(&element.children),
      _ => None,
    }
  }

  pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
    match &mut self.kind {
      NodeKind::Link(link) => Some(&mut link.children),
      NodeKind::Element(element) => Some(&mut element.children),
      _ => None,
    }
  }

  /// Length in the plain-text projection, ignoring block breaks.
  pub fn text_len(&self) -> usize {
    match &self.kind {
      NodeKind::Text(text) => text.chars().count(),
      NodeKind::LineBreak | NodeKind::Image(_) => 1,
      NodeKind::Link(_) | NodeKind::Element(_) => {
        self
          .children()
          .map_or(0, |children| children.iter().map(Node::text_len).sum())
      },
    }
  }
}

/// Depth-first, pre-order visit of `nodes` and all their descendants.
pub fn visit<'a>(nodes: &'a [Node], f: &mut impl FnMut(&'a Node)) {
  for node in nodes {
    f(node);
    if let Some(children) = node.children() {
      visit(children, f);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fresh_ids_are_unique() {
    let a = Node::text("a");
    let b = Node::text("a");
    assert_ne!(a.id(), b.id());
  }

  #[test]
  fn containers_and_blocks() {
    let p = Node::element("p", vec![], vec![Node::text("x")]);
    let hr = Node::element("hr", vec![], vec![]);
    let link = Node::link("https://example.com", "x");

    assert!(p.is_container() && p.is_block());
    assert!(!hr.is_container() && hr.is_block());
    assert!(link.is_container() && !link.is_block());
    assert!(!Node::line_break().is_container());
  }

  #[test]
  fn text_len_counts_chars_and_atoms() {
    let p = Node::element("p", vec![], vec![
      Node::text("héllo"),
      Node::line_break(),
      Node::image(Image::new("a.png")),
    ]);
    assert_eq!(p.text_len(), 7);
  }

  #[test]
  fn visit_is_pre_order() {
    let nodes = vec![
      Node::element("p", vec![], vec![Node::text("a")]),
      Node::text("b"),
    ];
    let mut seen = Vec::new();
    visit(&nodes, &mut |node| {
      seen.push(node.as_text().map(str::to_owned));
    });
    assert_eq!(seen, vec![None, Some("a".to_string()), Some("b".to_string())]);
  }
}
