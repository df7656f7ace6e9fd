//! Caret positions inside the node tree, and saving them across async work.
//!
//! A [`Position`] points either into a text node (the offset counts chars) or
//! between the children of a container (the offset is a child index). A
//! [`Selection`] is an `anchor` and a `head`; the head is where the caret is
//! drawn. When both are equal the selection is a caret.
//!
//! ```text
//! <p>he[llo</p><p>wor]ld</p>   anchor=(text "hello", 2), head=(text "world", 3)
//! <p>hello|</p>                anchor=head=(text "hello", 5)
//! <p><img>|</p>                anchor=head=(p, 1)
//! ```
//!
//! Positions refer to nodes by [`NodeId`]. When the node a position refers to
//! is removed (or the whole tree is replaced) the position is detached and
//! [`restore`] refuses it.

use crate::{
  node::NodeId,
  surface::Surface,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
  pub node:   NodeId,
  pub offset: usize,
}

impl Position {
  pub fn new(node: NodeId, offset: usize) -> Self {
    Self { node, offset }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selection {
  pub anchor: Position,
  pub head:   Position,
}

impl Selection {
  pub fn new(anchor: Position, head: Position) -> Self {
    Self { anchor, head }
  }

  pub fn point(pos: Position) -> Self {
    Self {
      anchor: pos,
      head:   pos,
    }
  }

  pub fn is_collapsed(&self) -> bool {
    self.anchor == self.head
  }

  /// Where the caret is drawn.
  pub fn cursor(&self) -> Position {
    self.head
  }
}

/// A selection saved before an async step, to be restored after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionHandle {
  selection: Selection,
}

impl SelectionHandle {
  pub fn selection(&self) -> Selection {
    self.selection
  }
}

/// Snapshots the surface's current selection, if it has one.
pub fn save(surface: &Surface) -> Option<SelectionHandle> {
  surface
    .selection()
    .map(|selection| SelectionHandle { selection })
}

/// Re-establishes a saved selection and focuses the surface.
///
/// Returns `false`, leaving the surface untouched, when either end of the
/// selection refers to a node that is no longer in the document. Offsets past
/// the end of a node that still exists are clamped.
pub fn restore(surface: &mut Surface, handle: &SelectionHandle) -> bool {
  let doc = surface.document();
  let (Some(anchor), Some(head)) = (
    doc.clamp_position(handle.selection.anchor),
    doc.clamp_position(handle.selection.head),
  ) else {
    tracing::debug!(
      "saved selection at node {} is detached",
      handle.selection.head.node.get()
    );
    return false;
  };
  surface.set_selection(Selection::new(anchor, head));
  surface.focus();
  true
}
