//! User-visible notices raised by the editor, e.g. a failed upload.
//!
//! The host's toast UI reads [`MessageCenter::active`] or follows the event
//! log with [`MessageCenter::events_since`].

use std::collections::VecDeque;

use serde::{
  Deserialize,
  Serialize,
};

pub const DEFAULT_HISTORY_LIMIT: usize = 64;
pub const DEFAULT_EVENT_LIMIT: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
  Info,
  Warning,
  Error,
}

/// What raised a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
  Upload,
  Fetch,
  Paste,
  Macro,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
  pub id:       u64,
  pub severity: Severity,
  pub origin:   Origin,
  pub text:     String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoticeEventKind {
  Shown { notice: Notice },
  Dismissed { id: u64 },
  Cleared,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeEvent {
  pub seq:  u64,
  #[serde(flatten)]
  pub kind: NoticeEventKind,
}

#[derive(Debug, Clone)]
pub struct MessageCenter {
  active:        Option<Notice>,
  history:       VecDeque<Notice>,
  events:        VecDeque<NoticeEvent>,
  next_id:       u64,
  next_seq:      u64,
  history_limit: usize,
  event_limit:   usize,
}

impl Default for MessageCenter {
  fn default() -> Self {
    Self::with_limits(DEFAULT_HISTORY_LIMIT, DEFAULT_EVENT_LIMIT)
  }
}

impl MessageCenter {
  pub fn with_limits(history_limit: usize, event_limit: usize) -> Self {
    Self {
      active:        None,
      history:       VecDeque::new(),
      events:        VecDeque::new(),
      next_id:       1,
      next_seq:      1,
      history_limit: history_limit.max(1),
      event_limit:   event_limit.max(1),
    }
  }

  pub fn active(&self) -> Option<&Notice> {
    self.active.as_ref()
  }

  pub fn history(&self) -> impl Iterator<Item = &Notice> {
    self.history.iter()
  }

  pub fn history_len(&self) -> usize {
    self.history.len()
  }

  pub fn latest_seq(&self) -> u64 {
    self.next_seq.saturating_sub(1)
  }

  pub fn events_since(&self, seq: u64) -> Vec<NoticeEvent> {
    self
      .events
      .iter()
      .filter(|event| event.seq > seq)
      .cloned()
      .collect()
  }

  /// Shows a notice. A notice less severe than the active one is recorded
  /// but does not replace it.
  pub fn publish(&mut self, severity: Severity, origin: Origin, text: impl Into<String>) -> Notice {
    let notice = Notice {
      id: self.next_id,
      severity,
      origin,
      text: text.into(),
    };
    self.next_id = self.next_id.saturating_add(1);

    match severity {
      Severity::Error => tracing::error!("{:?}: {}", origin, notice.text),
      Severity::Warning => tracing::warn!("{:?}: {}", origin, notice.text),
      Severity::Info => tracing::info!("{:?}: {}", origin, notice.text),
    }

    if self
      .active
      .as_ref()
      .is_none_or(|active| active.severity <= severity)
    {
      self.active = Some(notice.clone());
    }

    self.history.push_back(notice.clone());
    while self.history.len() > self.history_limit {
      self.history.pop_front();
    }

    self.push_event(NoticeEventKind::Shown {
      notice: notice.clone(),
    });
    notice
  }

  pub fn info(&mut self, origin: Origin, text: impl Into<String>) -> Notice {
    self.publish(Severity::Info, origin, text)
  }

  pub fn warning(&mut self, origin: Origin, text: impl Into<String>) -> Notice {
    self.publish(Severity::Warning, origin, text)
  }

  pub fn error(&mut self, origin: Origin, text: impl Into<String>) -> Notice {
    self.publish(Severity::Error, origin, text)
  }

  pub fn dismiss_active(&mut self) -> Option<Notice> {
    let notice = self.active.take();
    if let Some(notice) = notice.as_ref() {
      self.push_event(NoticeEventKind::Dismissed { id: notice.id });
    }
    notice
  }

  pub fn clear(&mut self) {
    let changed = self.active.take().is_some() || !self.history.is_empty();
    self.history.clear();
    if changed {
      self.push_event(NoticeEventKind::Cleared);
    }
  }

  fn push_event(&mut self, kind: NoticeEventKind) {
    let event = NoticeEvent {
      seq: self.next_seq,
      kind,
    };
    self.next_seq = self.next_seq.saturating_add(1);
    self.events.push_back(event);
    while self.events.len() > self.event_limit {
      self.events.pop_front();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn publish_shows_and_logs_event() {
    let mut center = MessageCenter::default();
    let notice = center.error(Origin::Upload, "upload failed");
    assert_eq!(center.active(), Some(&notice));

    let events = center.events_since(0);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0].kind, NoticeEventKind::Shown { .. }));
  }

  #[test]
  fn limits_drop_oldest() {
    let mut center = MessageCenter::with_limits(2, 2);
    center.info(Origin::Paste, "a");
    center.info(Origin::Paste, "b");
    center.info(Origin::Paste, "c");
    assert_eq!(center.history_len(), 2);
    let seqs: Vec<_> = center.events_since(0).iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![2, 3]);
  }

  #[test]
  fn lesser_notice_keeps_active_error() {
    let mut center = MessageCenter::default();
    let error = center.error(Origin::Upload, "upload failed");
    center.info(Origin::Fetch, "linked remote image");
    assert_eq!(center.active().map(|n| n.id), Some(error.id));
    assert_eq!(center.history_len(), 2);

    center.dismiss_active();
    center.info(Origin::Fetch, "next");
    assert_eq!(center.active().map(|n| n.text.as_str()), Some("next"));
  }

  #[test]
  fn event_serializes_with_kind_tag() {
    let mut center = MessageCenter::default();
    center.warning(Origin::Paste, "skipped");
    let json = serde_json::to_value(&center.events_since(0)[0]).unwrap();
    assert_eq!(json["kind"], "shown");
    assert_eq!(json["notice"]["origin"], "paste");
  }
}
