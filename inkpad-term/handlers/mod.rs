//! Background hooks that feed work back into the application loop.

use std::sync::Arc;

use inkpad_event::{
  AsyncHook,
  send_blocking,
};
use inkpad_lib::{
  Editor,
  candidates::{
    CandidateSource,
    SearchResults,
  },
};
use tokio::sync::mpsc::Sender;

pub mod history;
pub mod search;

/// Work a hook hands back to the application loop.
#[derive(Debug)]
pub enum AppEvent {
  /// The history debounce window has passed.
  PollHistory,
  Suggestions(SearchResults),
}

pub struct Handlers {
  pub history:   Sender<history::HistoryEvent>,
  pub search:    Sender<inkpad_lib::candidates::SearchRequest>,
  last_deadline: Option<std::time::Instant>,
  last_search:   Option<u64>,
}

impl Handlers {
  /// Spawns the hooks. Must be called inside a tokio runtime.
  pub fn spawn(app: Sender<AppEvent>, source: Arc<dyn CandidateSource>) -> Self {
    Self {
      history:       history::HistoryDebounce::new(app.clone()).spawn(),
      search:        search::SearchHook::new(source, app).spawn(),
      last_deadline: None,
      last_search:   None,
    }
  }

  /// Tells the hooks about a new history deadline or trigger query.
  pub fn after_action(&mut self, editor: &Editor) {
    let deadline = editor.history().deadline();
    if let Some(deadline) = deadline
      && self.last_deadline != Some(deadline)
    {
      send_blocking(&self.history, history::HistoryEvent { deadline });
    }
    self.last_deadline = deadline;

    match editor.search_request() {
      Some(request) if self.last_search != Some(request.generation) => {
        self.last_search = Some(request.generation);
        send_blocking(&self.search, request);
      },
      Some(_) => {},
      None => self.last_search = None,
    }
  }
}
