//! Trigger detection for the macro suggestion flow.
//!
//! After every edit and caret move the editor hands the text between the
//! document start and the caret to [`TriggerDetector::detect`]. Only a
//! trailing run matches: the trigger char followed by word chars, up to the
//! caret. `#inv` matches with query `inv`; `#inv ` does not match.

use std::ops::Range;

use regex::Regex;

pub const DEFAULT_TRIGGER: char = '#';

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
  pub x: f32,
  pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
  pub x:      f32,
  pub y:      f32,
  pub width:  f32,
  pub height: f32,
}

impl Rect {
  pub fn bottom(&self) -> f32 {
    self.y + self.height
  }
}

/// Where the caret and the editable surface are on screen.
pub trait CaretGeometry: Send + Sync {
  /// The caret rectangle for a caret placed after `text_before_cursor`.
  fn caret_rect(&self, text_before_cursor: &str) -> Option<Rect>;
  fn surface_rect(&self) -> Rect;

  /// Where the suggestion list opens: the caret's bottom-left corner,
  /// relative to the surface.
  fn anchor(&self, text_before_cursor: &str) -> Point {
    let surface = self.surface_rect();
    match self.caret_rect(text_before_cursor) {
      Some(caret) => Point {
        x: caret.x - surface.x,
        y: caret.bottom() - surface.y,
      },
      None => Point::default(),
    }
  }
}

/// Caret geometry for a fixed-size character grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
  pub origin:      Point,
  pub cell_width:  f32,
  pub cell_height: f32,
  pub columns:     u16,
}

impl Default for GridGeometry {
  fn default() -> Self {
    Self {
      origin:      Point::default(),
      cell_width:  1.0,
      cell_height: 1.0,
      columns:     80,
    }
  }
}

impl CaretGeometry for GridGeometry {
  fn caret_rect(&self, text_before_cursor: &str) -> Option<Rect> {
    let columns = usize::from(self.columns.max(1));
    let mut row = 0usize;
    let mut col = 0usize;
    for ch in text_before_cursor.chars() {
      if ch == '\n' {
        row += 1;
        col = 0;
        continue;
      }
      if col == columns {
        row += 1;
        col = 0;
      }
      col += 1;
    }
    Some(Rect {
      x:      self.origin.x + col as f32 * self.cell_width,
      y:      self.origin.y + row as f32 * self.cell_height,
      width:  self.cell_width,
      height: self.cell_height,
    })
  }

  fn surface_rect(&self) -> Rect {
    Rect {
      x:      self.origin.x,
      y:      self.origin.y,
      width:  f32::from(self.columns) * self.cell_width,
      height: self.cell_height,
    }
  }
}

/// A match of the trigger pattern at the caret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMatch {
  pub query: String,
  /// Flat range of the trigger char and the query.
  pub span:  Range<usize>,
}

#[derive(Debug, Clone)]
pub struct TriggerDetector {
  trigger: char,
  pattern: Regex,
}

impl Default for TriggerDetector {
  fn default() -> Self {
    Self::new(DEFAULT_TRIGGER)
  }
}

impl TriggerDetector {
  pub fn new(trigger: char) -> Self {
    let pattern = format!(r"{}(\w*)$", regex::escape(&trigger.to_string()));
    Self {
      trigger,
      pattern: Regex::new(&pattern).expect("escaped trigger pattern is valid"),
    }
  }

  pub fn trigger(&self) -> char {
    self.trigger
  }

  pub fn detect(&self, text_before_cursor: &str) -> Option<TriggerMatch> {
    let captures = self.pattern.captures(text_before_cursor)?;
    let whole = captures.get(0)?;
    let query = captures.get(1).map_or("", |query| query.as_str());
    let start = text_before_cursor[..whole.start()].chars().count();
    let end = start + whole.as_str().chars().count();
    Some(TriggerMatch {
      query: query.to_string(),
      span:  start..end,
    })
  }
}

/// An open trigger: what the suggestion list needs to show and where.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerContext {
  pub trigger:    char,
  pub query:      String,
  pub anchor:     Point,
  pub span:       Range<usize>,
  /// Bumped whenever the query changes; tags candidate searches.
  pub generation: u64,
}

impl TriggerContext {
  /// The text the trigger occupies in the document, e.g. `#inv`.
  pub fn span_text(&self) -> String {
    format!("{}{}", self.trigger, self.query)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerEvent {
  Open(TriggerContext),
  Closed,
}
