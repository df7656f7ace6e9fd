//! Utilities for declaring an async (usually debounced) hook

use std::time::Duration;

use futures_executor::block_on;
use tokio::{
  sync::mpsc::{
    self,
    Sender,
    error::TrySendError,
  },
  time::Instant,
};

/// Longest a synchronous sender may block on a full channel before the
/// message is dropped.
const SEND_TIMEOUT_MS: u64 = 2;

/// A background task that receives events over a channel and decides, per
/// event, whether to act now or wait for a quiet period.
///
/// `handle_event` returns the deadline the hook wants to be woken at (or
/// `None` for no pending work). Each new event may move the deadline; when it
/// passes without a newer event arriving, `finish_debounce` runs.
pub trait AsyncHook: Send + 'static + Sized {
  type Event: Send + 'static;

  fn handle_event(&mut self, event: Self::Event, timeout: Option<Instant>) -> Option<Instant>;

  /// Called whenever the debounce deadline is reached
  fn finish_debounce(&mut self);

  fn spawn(self) -> mpsc::Sender<Self::Event> {
    let (tx, rx) = mpsc::channel(128);
    // without a runtime (plain unit tests) the sender is still handed out,
    // events just go nowhere
    if tokio::runtime::Handle::try_current().is_ok() {
      tokio::spawn(run(self, rx));
    }
    tx
  }
}

async fn run<Hook: AsyncHook>(mut hook: Hook, mut rx: mpsc::Receiver<Hook::Event>) {
  let mut deadline = None;
  loop {
    let event = match deadline {
      Some(deadline_) => {
        match tokio::time::timeout_at(deadline_, rx.recv()).await {
          Ok(event) => event,
          Err(_) => {
            hook.finish_debounce();
            deadline = None;
            continue;
          },
        }
      },
      None => rx.recv().await,
    };
    let Some(event) = event else {
      // flush whatever is still pending before the hook goes away
      if deadline.is_some() {
        hook.finish_debounce();
      }
      break;
    };
    deadline = hook.handle_event(event, deadline);
  }
}

/// Send an event from synchronous code, blocking at most `SEND_TIMEOUT_MS`
/// when the channel is full. The event is dropped if the channel stays full
/// or is closed.
pub fn send_blocking<T>(tx: &Sender<T>, data: T) {
  match tx.try_send(data) {
    Ok(()) => {},
    Err(TrySendError::Full(data)) => {
      if block_on(tx.send_timeout(data, Duration::from_millis(SEND_TIMEOUT_MS))).is_err() {
        log::warn!("dropping event: hook channel is full");
      }
    },
    Err(TrySendError::Closed(_)) => {
      log::warn!("attempted to send to closed hook channel");
    },
  }
}

/// Try to send an event without blocking at all.
pub fn try_send<T>(tx: &Sender<T>, data: T) -> bool {
  tx.try_send(data).is_ok()
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Arc,
    atomic::{
      AtomicUsize,
      Ordering,
    },
  };

  use super::*;

  struct Counter {
    fired: Arc<AtomicUsize>,
  }

  impl AsyncHook for Counter {
    type Event = ();

    fn handle_event(&mut self, _event: (), _timeout: Option<Instant>) -> Option<Instant> {
      Some(Instant::now() + Duration::from_millis(100))
    }

    fn finish_debounce(&mut self) {
      self.fired.fetch_add(1, Ordering::SeqCst);
    }
  }

  #[tokio::test(start_paused = true)]
  async fn rapid_events_fire_once() {
    let fired = Arc::new(AtomicUsize::new(0));
    let tx = Counter {
      fired: fired.clone(),
    }
    .spawn();

    for _ in 0..5 {
      tx.send(()).await.unwrap();
      tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn spaced_events_fire_each_time() {
    let fired = Arc::new(AtomicUsize::new(0));
    let tx = Counter {
      fired: fired.clone(),
    }
    .spawn();

    for _ in 0..3 {
      tx.send(()).await.unwrap();
      tokio::time::sleep(Duration::from_millis(150)).await;
    }
    assert_eq!(fired.load(Ordering::SeqCst), 3);
  }

  #[test]
  fn try_send_reports_closed_channel() {
    let (tx, rx) = mpsc::channel::<u8>(1);
    drop(rx);
    assert!(!try_send(&tx, 1));
  }
}
