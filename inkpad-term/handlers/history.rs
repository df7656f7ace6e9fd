use inkpad_event::{
  AsyncHook,
  send_blocking,
};
use tokio::{
  sync::mpsc::Sender,
  time::Instant,
};

use super::AppEvent;

/// Input moved the history debounce deadline.
#[derive(Debug, Clone, Copy)]
pub struct HistoryEvent {
  pub deadline: std::time::Instant,
}

/// Wakes the application when the history debounce window expires, so the
/// pending snapshot is taken without waiting for the next input.
pub struct HistoryDebounce {
  app: Sender<AppEvent>,
}

impl HistoryDebounce {
  pub fn new(app: Sender<AppEvent>) -> Self {
    Self { app }
  }
}

impl AsyncHook for HistoryDebounce {
  type Event = HistoryEvent;

  fn handle_event(&mut self, event: HistoryEvent, _timeout: Option<Instant>) -> Option<Instant> {
    Some(Instant::from_std(event.deadline))
  }

  fn finish_debounce(&mut self) {
    send_blocking(&self.app, AppEvent::PollHistory);
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use tokio::sync::mpsc;

  use super::*;

  #[tokio::test(start_paused = true)]
  async fn moved_deadline_fires_once() {
    let (tx, mut rx) = mpsc::channel(8);
    let hook = HistoryDebounce::new(tx).spawn();

    let start = Instant::now().into_std();
    hook
      .send(HistoryEvent {
        deadline: start + Duration::from_millis(500),
      })
      .await
      .unwrap();
    hook
      .send(HistoryEvent {
        deadline: start + Duration::from_millis(700),
      })
      .await
      .unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(rx.try_recv().is_err());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(matches!(rx.try_recv(), Ok(AppEvent::PollHistory)));
    assert!(rx.try_recv().is_err());
  }
}
