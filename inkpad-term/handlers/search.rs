use std::{
  sync::Arc,
  time::Duration,
};

use inkpad_event::{
  AsyncHook,
  TaskController,
  cancelable_future,
};
use inkpad_lib::candidates::{
  CandidateSource,
  SearchRequest,
};
use tokio::{
  sync::mpsc::Sender,
  time::Instant,
};

use super::AppEvent;

/// Pause in trigger typing before the candidate search runs.
const SEARCH_DEBOUNCE: Duration = Duration::from_millis(50);

/// Runs candidate searches for the open trigger. A newer query cancels the
/// search in flight; whatever still arrives late is dropped by the editor's
/// generation check.
pub struct SearchHook {
  source:  Arc<dyn CandidateSource>,
  app:     Sender<AppEvent>,
  pending: Option<SearchRequest>,
  tasks:   TaskController,
}

impl SearchHook {
  pub fn new(source: Arc<dyn CandidateSource>, app: Sender<AppEvent>) -> Self {
    Self {
      source,
      app,
      pending: None,
      tasks: TaskController::new(),
    }
  }
}

impl AsyncHook for SearchHook {
  type Event = SearchRequest;

  fn handle_event(&mut self, request: SearchRequest, _timeout: Option<Instant>) -> Option<Instant> {
    self.tasks.cancel();
    self.pending = Some(request);
    Some(Instant::now() + SEARCH_DEBOUNCE)
  }

  fn finish_debounce(&mut self) {
    let Some(request) = self.pending.take() else {
      return;
    };
    let handle = self.tasks.restart();
    let source = self.source.clone();
    let app = self.app.clone();
    tokio::spawn(async move {
      let generation = request.generation;
      match cancelable_future(request.run(source.as_ref()), handle).await {
        Some(results) => {
          if app.send(AppEvent::Suggestions(results)).await.is_err() {
            log::debug!("application went away before results arrived");
          }
        },
        None => log::debug!("search for generation {generation} was superseded"),
      }
    });
  }
}

#[cfg(test)]
mod tests {
  use inkpad_lib::candidates::{
    Candidate,
    StaticCandidates,
  };
  use tokio::sync::mpsc;

  use super::*;

  fn source() -> Arc<dyn CandidateSource> {
    Arc::new(StaticCandidates::new(vec![
      Candidate {
        id:      "1".into(),
        title:   "Invoice".into(),
        content: "<p>invoice</p>".into(),
      },
      Candidate {
        id:      "2".into(),
        title:   "Refund".into(),
        content: "<p>refund</p>".into(),
      },
    ]))
  }

  #[tokio::test(start_paused = true)]
  async fn only_latest_query_is_searched() {
    let (tx, mut rx) = mpsc::channel(8);
    let hook = SearchHook::new(source(), tx).spawn();

    for (generation, query) in [(1, "i"), (2, "in"), (3, "ref")] {
      hook
        .send(SearchRequest {
          generation,
          query: query.into(),
        })
        .await
        .unwrap();
    }

    let Some(AppEvent::Suggestions(results)) = rx.recv().await else {
      panic!("expected suggestions");
    };
    assert_eq!(results.generation, 3);
    assert_eq!(results.candidates.len(), 1);
    assert_eq!(results.candidates[0].id, "2");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err());
  }
}
