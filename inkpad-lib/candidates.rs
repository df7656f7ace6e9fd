//! Macro candidates for the trigger suggestion list.
//!
//! The search backend is external; [`CandidateSource`] is its interface.
//! [`StaticCandidates`] serves an in-memory list and ranks it with [`nucleo`]
//! fuzzy matching on the title, using smart case: a lowercase query matches
//! case-insensitively, a query with uppercase chars matches case-sensitively.
//!
//! Searches are tagged with the trigger's generation so a slow result for an
//! old query cannot replace the list for a newer one.

use std::cell::RefCell;

use async_trait::async_trait;
use nucleo::{
  Config,
  Matcher,
  pattern::{
    Atom,
    AtomKind,
    CaseMatching,
    Normalization,
  },
};
use serde::{
  Deserialize,
  Serialize,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
  pub id:      String,
  pub title:   String,
  /// HTML fragment inserted when the candidate is chosen.
  #[serde(alias = "insertable-content")]
  pub content: String,
}

#[derive(Debug, Error)]
pub enum CandidateError {
  #[error("candidate search is unavailable: {0}")]
  Unavailable(String),
  #[error("candidate search failed: {0}")]
  Backend(String),
}

#[async_trait]
pub trait CandidateSource: Send + Sync {
  async fn search(&self, query: &str) -> Result<Vec<Candidate>, CandidateError>;

  /// Everything, shown when the trigger has no query yet.
  fn list_all(&self) -> Vec<Candidate>;
}

/// A request for candidates matching an open trigger's query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
  pub generation: u64,
  pub query:      String,
}

impl SearchRequest {
  /// Runs the search. An empty query lists everything; a failing backend
  /// yields an empty list.
  pub async fn run(self, source: &dyn CandidateSource) -> SearchResults {
    if self.query.is_empty() {
      return SearchResults {
        generation: self.generation,
        candidates: source.list_all(),
      };
    }
    let candidates = match source.search(&self.query).await {
      Ok(candidates) => candidates,
      Err(err) => {
        tracing::warn!("search for {:?} failed: {err}", self.query);
        Vec::new()
      },
    };
    SearchResults {
      generation: self.generation,
      candidates,
    }
  }
}

/// Results for a [`SearchRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResults {
  pub generation: u64,
  pub candidates: Vec<Candidate>,
}

thread_local! {
  static MATCHER: RefCell<Matcher> = RefCell::new(Matcher::default());
}

struct ByTitle<'a>(&'a Candidate);

impl AsRef<str> for ByTitle<'_> {
  fn as_ref(&self) -> &str {
    &self.0.title
  }
}

/// Ranks `candidates` by how well their titles match `query`, best first.
/// Candidates that do not match are dropped; an empty query keeps all.
pub fn rank<'a>(query: &str, candidates: &'a [Candidate]) -> Vec<&'a Candidate> {
  MATCHER.with(|matcher| {
    let mut matcher = matcher.borrow_mut();
    matcher.config = Config::DEFAULT;
    let atom = Atom::new(
      query,
      CaseMatching::Smart,
      Normalization::Smart,
      AtomKind::Fuzzy,
      false,
    );
    atom
      .match_list(candidates.iter().map(ByTitle), &mut matcher)
      .into_iter()
      .map(|(candidate, _score)| candidate.0)
      .collect()
  })
}

#[derive(Debug, Clone, Default)]
pub struct StaticCandidates {
  items: Vec<Candidate>,
  limit: Option<usize>,
}

impl StaticCandidates {
  pub fn new(items: Vec<Candidate>) -> Self {
    Self { items, limit: None }
  }

  /// Caps the results of [`CandidateSource::search`]. `list_all` is not
  /// capped.
  pub fn with_limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }
}

#[async_trait]
impl CandidateSource for StaticCandidates {
  async fn search(&self, query: &str) -> Result<Vec<Candidate>, CandidateError> {
    let ranked = rank(query, &self.items);
    let limit = self.limit.unwrap_or(ranked.len());
    Ok(ranked.into_iter().take(limit).cloned().collect())
  }

  fn list_all(&self) -> Vec<Candidate> {
    self.items.clone()
  }
}

#[cfg(test)]
mod tests {
  use futures_executor::block_on;

  use super::*;

  fn candidate(id: &str, title: &str) -> Candidate {
    Candidate {
      id:      id.into(),
      title:   title.into(),
      content: format!("<p>{title}</p>"),
    }
  }

  fn titles(candidates: &[Candidate]) -> Vec<&str> {
    candidates.iter().map(|c| c.title.as_str()).collect()
  }

  #[test]
  fn ranks_closest_title_first() {
    let items = vec![
      candidate("1", "Refund policy"),
      candidate("2", "Reinvoicing"),
      candidate("3", "Invoice copy"),
    ];
    let ranked = rank("invoice", &items);
    let ids: Vec<_> = ranked.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["3", "2"]);
  }

  #[test]
  fn empty_query_matches_all() {
    let items = vec![candidate("1", "a"), candidate("2", "b")];
    assert_eq!(rank("", &items).len(), 2);
  }

  #[test]
  fn static_source_respects_limit() {
    let source = StaticCandidates::new(vec![
      candidate("1", "inv one"),
      candidate("2", "inv two"),
      candidate("3", "inv three"),
    ])
    .with_limit(2);
    let found = block_on(source.search("inv")).unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(source.list_all().len(), 3);
  }

  #[test]
  fn failed_search_yields_empty_results() {
    struct Down;

    #[async_trait]
    impl CandidateSource for Down {
      async fn search(&self, _query: &str) -> Result<Vec<Candidate>, CandidateError> {
        Err(CandidateError::Unavailable("offline".into()))
      }

      fn list_all(&self) -> Vec<Candidate> {
        Vec::new()
      }
    }

    let request = SearchRequest {
      generation: 4,
      query:      "x".into(),
    };
    let results = block_on(request.run(&Down));
    assert_eq!(results.generation, 4);
    assert!(results.candidates.is_empty());
  }

  #[test]
  fn empty_query_lists_everything() {
    let source = StaticCandidates::new(vec![candidate("1", "a"), candidate("2", "b")]).with_limit(1);
    let request = SearchRequest {
      generation: 1,
      query:      String::new(),
    };
    assert_eq!(block_on(request.run(&source)).candidates.len(), 2);
  }

  #[test]
  fn deserializes_kebab_content_alias() {
    let json = r#"{"id":"7","title":"Greeting","insertable-content":"<p>Hi</p>"}"#;
    let parsed: Candidate = serde_json::from_str(json).unwrap();
    assert_eq!(parsed.content, "<p>Hi</p>");
    assert_eq!(titles(&[parsed]), vec!["Greeting"]);
  }
}
