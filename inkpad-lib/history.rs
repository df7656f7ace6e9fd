use std::{
  sync::Arc,
  time::{
    Duration,
    Instant,
  },
};

use parking_lot::Mutex;

pub const DEFAULT_LIMIT: usize = 100;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Stores snapshots of the serialized content for undo and redo.
///
/// The history is a bounded list of snapshots and a pointer to the one that
/// matches what the surface currently shows. There is always at least one
/// snapshot: the content the editor was created with.
///
/// Snapshots are taken in two ways:
///
///  * Typing calls [`History::record_input`], which (re)starts a debounce
///    window. When the window expires without further input, [`History::poll`]
///    takes a snapshot. A burst of keystrokes therefore becomes one undo step.
///  * Word boundaries, paste, macro insertion and blur call
///    [`History::save_boundary`], which takes a snapshot right away and cancels
///    any pending debounce.
///
/// A snapshot equal to the current one is never recorded, so idle polls and
/// repeated boundaries do not create empty undo steps. Recording a snapshot
/// while the pointer is not at the end discards the redo tail. When the list
/// grows past its limit the oldest snapshot is dropped.
///
/// Undo and redo first record the live content if it differs from the current
/// snapshot, so edits still inside a debounce window are not lost. While the
/// caller applies an undo or redo it marks the history as applying; input
/// recorded in that window is ignored, since it is the history's own change
/// echoing back.
#[derive(Debug)]
pub struct History {
  entries:  Vec<Arc<str>>,
  current:  usize,
  limit:    usize,
  debounce: Duration,
  deadline: Option<Instant>,
  applying: bool,
}

impl History {
  /// Creates a history seeded with `initial`. A `limit` of zero is treated
  /// as one.
  pub fn new(initial: &str, limit: usize, debounce: Duration) -> Self {
    Self {
      entries: vec![Arc::from(initial)],
      current: 0,
      limit: limit.max(1),
      debounce,
      deadline: None,
      applying: false,
    }
  }

  pub fn with_defaults(initial: &str) -> Self {
    Self::new(initial, DEFAULT_LIMIT, DEFAULT_DEBOUNCE)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Index of the snapshot the surface currently shows.
  pub fn current_index(&self) -> usize {
    self.current
  }

  pub fn current(&self) -> &str {
    &self.entries[self.current]
  }

  pub fn entries(&self) -> impl Iterator<Item = &str> {
    self.entries.iter().map(|entry| &**entry)
  }

  pub fn can_undo(&self) -> bool {
    self.current > 0
  }

  pub fn can_redo(&self) -> bool {
    self.current + 1 < self.entries.len()
  }

  /// When the pending debounce window expires.
  pub fn deadline(&self) -> Option<Instant> {
    self.deadline
  }

  pub fn is_applying(&self) -> bool {
    self.applying
  }

  pub fn set_applying(&mut self, applying: bool) {
    self.applying = applying;
  }

  /// Notes user input at `now`, restarting the debounce window.
  pub fn record_input(&mut self, now: Instant) {
    if self.applying {
      return;
    }
    self.deadline = Some(now + self.debounce);
  }

  /// Takes the debounced snapshot if the window has expired by `now`.
  /// Returns whether a snapshot was recorded.
  pub fn poll(&mut self, now: Instant, content: &str) -> bool {
    match self.deadline {
      Some(deadline) if now >= deadline => {
        self.deadline = None;
        self.push_if_changed(content)
      },
      _ => false,
    }
  }

  /// Snapshots `content` immediately, dropping any pending debounce.
  pub fn save_boundary(&mut self, content: &str) -> bool {
    self.deadline = None;
    self.push_if_changed(content)
  }

  fn push_if_changed(&mut self, content: &str) -> bool {
    if *self.entries[self.current] == *content {
      return false;
    }
    self.entries.truncate(self.current + 1);
    self.entries.push(Arc::from(content));
    if self.entries.len() > self.limit {
      let excess = self.entries.len() - self.limit;
      self.entries.drain(..excess);
    }
    self.current = self.entries.len() - 1;
    true
  }

  /// Steps back one snapshot. `content` is what the surface shows right now.
  /// Returns the snapshot to display, or `None` at the oldest snapshot.
  pub fn undo(&mut self, content: &str) -> Option<Arc<str>> {
    self.save_boundary(content);
    if self.current == 0 {
      return None;
    }
    self.current -= 1;
    Some(self.entries[self.current].clone())
  }

  /// Steps forward one snapshot. `content` is what the surface shows right
  /// now. Returns the snapshot to display, or `None` at the newest snapshot.
  ///
  /// If `content` differs from the current snapshot the live edit becomes the
  /// newest snapshot and there is nothing left to redo.
  pub fn redo(&mut self, content: &str) -> Option<Arc<str>> {
    self.save_boundary(content);
    if !self.can_redo() {
      return None;
    }
    self.current += 1;
    Some(self.entries[self.current].clone())
  }
}

/// Source of the current time for debounce decisions.
pub trait Clock: Send + Sync {
  fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> Instant {
    Instant::now()
  }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
  now: Arc<Mutex<Instant>>,
}

impl Default for ManualClock {
  fn default() -> Self {
    Self::new(Instant::now())
  }
}

impl ManualClock {
  pub fn new(start: Instant) -> Self {
    Self {
      now: Arc::new(Mutex::new(start)),
    }
  }

  pub fn advance(&self, by: Duration) {
    *self.now.lock() += by;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> Instant {
    *self.now.lock()
  }
}

#[cfg(test)]
mod test {
  use quickcheck::quickcheck;

  use super::*;

  const MS: Duration = Duration::from_millis(1);

  #[test]
  fn burst_of_input_is_one_step() {
    let t0 = Instant::now();
    let mut history = History::with_defaults("");

    history.record_input(t0);
    history.record_input(t0 + 100 * MS);
    history.record_input(t0 + 300 * MS);
    assert!(!history.poll(t0 + 700 * MS, "abc"));
    assert!(history.poll(t0 + 800 * MS, "abc"));

    assert_eq!(history.entries().collect::<Vec<_>>(), vec!["", "abc"]);
    assert_eq!(history.deadline(), None);
  }

  #[test]
  fn undo_and_redo_walk_snapshots() {
    let mut history = History::with_defaults("a");
    history.save_boundary("ab");
    history.save_boundary("abc");

    assert_eq!(history.undo("abc").as_deref(), Some("ab"));
    assert_eq!(history.undo("ab").as_deref(), Some("a"));
    assert_eq!(history.undo("a"), None);
    assert_eq!(history.redo("a").as_deref(), Some("ab"));
    assert_eq!(history.redo("ab").as_deref(), Some("abc"));
    assert_eq!(history.redo("abc"), None);
  }

  #[test]
  fn undo_keeps_pending_edit() {
    let t0 = Instant::now();
    let mut history = History::with_defaults("hello");
    history.record_input(t0);

    assert_eq!(history.undo("hello world").as_deref(), Some("hello"));
    assert_eq!(history.deadline(), None);
    assert_eq!(history.redo("hello").as_deref(), Some("hello world"));
  }

  #[test]
  fn new_edit_discards_redo_tail() {
    let mut history = History::with_defaults("a");
    history.save_boundary("ab");
    history.save_boundary("abc");
    history.undo("abc");

    history.save_boundary("abX");
    assert_eq!(history.entries().collect::<Vec<_>>(), vec!["a", "ab", "abX"]);
    assert!(!history.can_redo());
  }

  #[test]
  fn live_edit_during_redo_becomes_newest() {
    let mut history = History::with_defaults("a");
    history.save_boundary("ab");
    history.undo("ab");

    assert_eq!(history.redo("a!"), None);
    assert_eq!(history.current(), "a!");
  }

  #[test]
  fn limit_drops_oldest() {
    let mut history = History::new("0", 3, DEFAULT_DEBOUNCE);
    for n in 1..=5 {
      history.save_boundary(&n.to_string());
    }
    assert_eq!(history.entries().collect::<Vec<_>>(), vec!["3", "4", "5"]);
    assert_eq!(history.current_index(), 2);
  }

  #[test]
  fn zero_limit_keeps_one_entry() {
    let mut history = History::new("a", 0, DEFAULT_DEBOUNCE);
    history.save_boundary("b");
    assert_eq!(history.entries().collect::<Vec<_>>(), vec!["b"]);
    assert_eq!(history.undo("b"), None);
  }

  #[test]
  fn input_while_applying_is_ignored() {
    let t0 = Instant::now();
    let mut history = History::with_defaults("a");
    history.set_applying(true);
    history.record_input(t0);
    history.set_applying(false);
    assert_eq!(history.deadline(), None);
  }

  #[test]
  fn manual_clock_advances() {
    let clock = ManualClock::default();
    let start = clock.now();
    clock.advance(500 * MS);
    assert_eq!(clock.now() - start, 500 * MS);
  }

  quickcheck! {
    fn never_exceeds_limit(limit: u8, edits: Vec<u8>) -> bool {
      let limit = usize::from(limit % 10);
      let mut history = History::new("", limit, DEFAULT_DEBOUNCE);
      for edit in edits {
        history.save_boundary(&edit.to_string());
      }
      history.len() <= limit.max(1) && history.current_index() < history.len()
    }

    fn no_adjacent_duplicates(edits: Vec<bool>) -> bool {
      let mut history = History::with_defaults("");
      for edit in edits {
        history.save_boundary(if edit { "x" } else { "y" });
      }
      let entries: Vec<_> = history.entries().collect();
      entries.windows(2).all(|pair| pair[0] != pair[1])
    }
  }
}
