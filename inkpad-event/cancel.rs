//! Cancellation for superseded background work.
//!
//! A [`TaskController`] owns at most one live task at a time. Calling
//! [`TaskController::restart`] cancels the previous task and hands out a new
//! [`TaskHandle`]; futures wrapped with [`cancelable_future`] resolve to
//! `None` once their handle is cancelled.

use std::{
  borrow::Borrow,
  future::Future,
  sync::{
    Arc,
    atomic::{
      AtomicBool,
      Ordering,
    },
  },
};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct TaskState {
  cancelled: AtomicBool,
  notify:    Notify,
}

#[derive(Debug, Default)]
pub struct TaskController {
  current: Option<Arc<TaskState>>,
}

impl TaskController {
  pub fn new() -> Self {
    Self::default()
  }

  /// Cancels the current task, if any. Returns whether a task was still
  /// running.
  pub fn cancel(&mut self) -> bool {
    let Some(state) = self.current.take() else {
      return false;
    };
    let running = Arc::strong_count(&state) > 1;
    state.cancelled.store(true, Ordering::Release);
    state.notify.notify_waiters();
    running
  }

  /// Whether a handle for the current task is still alive.
  pub fn is_running(&self) -> bool {
    self
      .current
      .as_ref()
      .is_some_and(|state| Arc::strong_count(state) > 1)
  }

  /// Cancels the current task and starts tracking a new one.
  pub fn restart(&mut self) -> TaskHandle {
    self.cancel();
    let state = Arc::new(TaskState::default());
    self.current = Some(state.clone());
    TaskHandle { state }
  }
}

impl Drop for TaskController {
  fn drop(&mut self) {
    self.cancel();
  }
}

#[derive(Debug, Clone)]
pub struct TaskHandle {
  state: Arc<TaskState>,
}

impl TaskHandle {
  pub fn is_canceled(&self) -> bool {
    self.state.cancelled.load(Ordering::Acquire)
  }

  /// Resolves once the task has been cancelled.
  pub async fn canceled(&self) {
    // the notified future must exist before the flag check so a cancel in
    // between is not missed
    let notified = self.state.notify.notified();
    if self.is_canceled() {
      return;
    }
    notified.await;
  }
}

/// Runs `future` until it completes or `handle` is cancelled, whichever comes
/// first. Returns `None` when cancelled.
pub async fn cancelable_future<T>(
  future: impl Future<Output = T>,
  handle: impl Borrow<TaskHandle>,
) -> Option<T> {
  tokio::select! {
    biased;
    _ = handle.borrow().canceled() => None,
    res = future => Some(res),
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;

  #[tokio::test(start_paused = true)]
  async fn restart_cancels_previous_task() {
    let mut controller = TaskController::new();
    let first = controller.restart();
    let second = controller.restart();

    assert!(first.is_canceled());
    assert!(!second.is_canceled());

    let stale = cancelable_future(
      tokio::time::sleep(Duration::from_secs(1)),
      first,
    )
    .await;
    assert!(stale.is_none());

    let fresh = cancelable_future(async { 7 }, second).await;
    assert_eq!(fresh, Some(7));
  }

  #[tokio::test(start_paused = true)]
  async fn cancel_wakes_pending_future() {
    let mut controller = TaskController::new();
    let handle = controller.restart();
    let task = tokio::spawn(cancelable_future(
      tokio::time::sleep(Duration::from_secs(60)),
      handle,
    ));
    tokio::task::yield_now().await;
    assert!(controller.is_running());
    assert!(controller.cancel());
    assert_eq!(task.await.unwrap(), None);
    assert!(!controller.is_running());
  }
}
