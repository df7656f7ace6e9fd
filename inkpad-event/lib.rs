//! Async plumbing for editor hosts: debounced hooks and cancellable tasks.

mod cancel;
mod debounce;

pub use cancel::{
  TaskController,
  TaskHandle,
  cancelable_future,
};
pub use debounce::{
  AsyncHook,
  send_blocking,
  try_send,
};
