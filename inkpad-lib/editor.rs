//! One editor instance: the surface plus everything that reacts to it.
//!
//! [`Editor`] wires the pieces together the way a host uses them. Typing goes
//! to the surface, restarts the history debounce and rescans for a trigger.
//! Boundary keys, blur, paste and macro insertion take an immediate history
//! snapshot. Pastes are planned synchronously and executed asynchronously,
//! with uploads and fetches awaited in between.

use std::{
  future::Future,
  sync::Arc,
};

use inkpad_core::chars::{
  char_is_line_ending,
  char_is_word_boundary,
};

use crate::{
  candidates::{
    Candidate,
    CandidateSource,
    SearchRequest,
    SearchResults,
    StaticCandidates,
  },
  clipboard::{
    self,
    ClipboardPayload,
    PasteEvent,
    PasteOptions,
    PastePlan,
    PasteStep,
  },
  config::EditorConfig,
  history::{
    Clock,
    History,
    SystemClock,
  },
  insert::{
    self,
    ImagePlacement,
    MacroInsertionRequest,
    MacroPlacement,
  },
  messages::{
    MessageCenter,
    Origin,
  },
  selection::Selection,
  surface::{
    EditOp,
    Surface,
  },
  trigger::{
    CaretGeometry,
    GridGeometry,
    TriggerContext,
    TriggerDetector,
    TriggerEvent,
  },
  upload::{
    ImageFetcher,
    ImageFile,
    ImageUploader,
    NoFetcher,
    NoUploader,
    UploadError,
  },
};

pub type TriggerListener = Box<dyn FnMut(&TriggerEvent) + Send>;
pub type CandidateListener = Box<dyn FnMut(&Candidate) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
  Char(char),
  Enter,
  Backspace,
  Delete,
  Left,
  Right,
  Home,
  End,
  Escape,
}

/// What a paste did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasteReport {
  pub text_inserted:   bool,
  /// Images uploaded and inserted.
  pub images_inserted: usize,
  /// Remote images inserted by their original URL because fetching or
  /// uploading them failed.
  pub images_linked:   usize,
  /// Images dropped because their upload failed.
  pub images_failed:   usize,
  /// Inline images that could not be decoded.
  pub images_rejected: usize,
}

pub struct Editor {
  surface:               Surface,
  history:               History,
  detector:              TriggerDetector,
  trigger:               Option<TriggerContext>,
  generation:            u64,
  suggestions:           Vec<Candidate>,
  messages:              MessageCenter,
  config:                EditorConfig,
  clock:                 Arc<dyn Clock>,
  uploader:              Arc<dyn ImageUploader>,
  fetcher:               Arc<dyn ImageFetcher>,
  candidates:            Arc<dyn CandidateSource>,
  geometry:              Arc<dyn CaretGeometry>,
  on_trigger:            Option<TriggerListener>,
  on_candidate_selected: Option<CandidateListener>,
}

impl std::fmt::Debug for Editor {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Editor")
      .field("surface", &self.surface)
      .field("history", &self.history)
      .field("trigger", &self.trigger)
      .field("generation", &self.generation)
      .field("config", &self.config)
      .finish_non_exhaustive()
  }
}

impl Editor {
  pub fn new(content: &str, config: EditorConfig) -> Self {
    let surface = Surface::new(content);
    let history = History::new(
      &surface.content(),
      config.history_limit,
      config.history_debounce(),
    );
    Self {
      surface,
      history,
      detector: TriggerDetector::new(config.trigger_char),
      trigger: None,
      generation: 0,
      suggestions: Vec::new(),
      messages: MessageCenter::default(),
      config,
      clock: Arc::new(SystemClock),
      uploader: Arc::new(NoUploader),
      fetcher: Arc::new(NoFetcher),
      candidates: Arc::new(StaticCandidates::default()),
      geometry: Arc::new(GridGeometry::default()),
      on_trigger: None,
      on_candidate_selected: None,
    }
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn with_uploader(mut self, uploader: Arc<dyn ImageUploader>) -> Self {
    self.uploader = uploader;
    self
  }

  pub fn with_fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
    self.fetcher = fetcher;
    self
  }

  pub fn with_candidates(mut self, candidates: Arc<dyn CandidateSource>) -> Self {
    self.candidates = candidates;
    self
  }

  pub fn with_geometry(mut self, geometry: Arc<dyn CaretGeometry>) -> Self {
    self.geometry = geometry;
    self
  }

  pub fn set_on_change(&mut self, listener: impl FnMut(&str) + Send + 'static) {
    self.surface.set_on_change(listener);
  }

  pub fn set_on_trigger(&mut self, listener: impl FnMut(&TriggerEvent) + Send + 'static) {
    self.on_trigger = Some(Box::new(listener));
  }

  pub fn set_on_candidate_selected(&mut self, listener: impl FnMut(&Candidate) + Send + 'static) {
    self.on_candidate_selected = Some(Box::new(listener));
  }

  pub fn surface(&self) -> &Surface {
    &self.surface
  }

  pub fn content(&self) -> String {
    self.surface.content()
  }

  pub fn history(&self) -> &History {
    &self.history
  }

  pub fn messages(&self) -> &MessageCenter {
    &self.messages
  }

  pub fn messages_mut(&mut self) -> &mut MessageCenter {
    &mut self.messages
  }

  pub fn config(&self) -> &EditorConfig {
    &self.config
  }

  pub fn trigger(&self) -> Option<&TriggerContext> {
    self.trigger.as_ref()
  }

  pub fn suggestions(&self) -> &[Candidate] {
    &self.suggestions
  }

  pub fn candidate_source(&self) -> Arc<dyn CandidateSource> {
    self.candidates.clone()
  }

  pub fn focus(&mut self) {
    self.surface.focus();
    self.scan_trigger();
  }

  /// Loses focus: pending input is snapshotted and the trigger closes.
  pub fn blur(&mut self) {
    self.surface.blur();
    self.save_boundary();
    self.close_trigger();
  }

  pub fn set_selection(&mut self, selection: Selection) {
    self.surface.set_selection(selection);
    self.scan_trigger();
  }

  pub fn move_cursor_to(&mut self, offset: usize) {
    self.surface.move_cursor_to(offset);
    self.scan_trigger();
  }

  /// Types `text` at the caret as a single edit.
  pub fn insert_text(&mut self, text: &str) -> bool {
    let changed = self.surface.apply(EditOp::InsertText(text.to_string()));
    self.after_input(changed);
    changed
  }

  /// Handles one key press. Returns whether the document changed.
  pub fn key(&mut self, key: Key) -> bool {
    match key {
      Key::Char(ch) => {
        let changed = self.surface.apply(EditOp::InsertText(ch.to_string()));
        self.after_input(changed);
        if char_is_word_boundary(ch) {
          self.save_boundary();
        }
        changed
      },
      Key::Enter => {
        let changed = self.surface.apply(EditOp::InsertLineBreak);
        self.after_input(changed);
        self.save_boundary();
        changed
      },
      Key::Backspace | Key::Delete => {
        let op = if key == Key::Backspace {
          EditOp::DeleteBackward
        } else {
          EditOp::DeleteForward
        };
        let changed = self.surface.apply(op);
        self.after_input(changed);
        changed
      },
      Key::Left | Key::Right | Key::Home | Key::End => {
        if let Some(offset) = self.caret_target(key) {
          self.move_cursor_to(offset);
        }
        false
      },
      Key::Escape => {
        self.close_trigger();
        false
      },
    }
  }

  fn caret_target(&self, key: Key) -> Option<usize> {
    let text = self.surface.document().text();
    let len = text.chars().count();
    let range = self.surface.selected_range();
    let offset = self.surface.cursor_offset().unwrap_or(len);
    Some(match key {
      Key::Left => range.filter(|r| !r.is_empty()).map_or(offset.saturating_sub(1), |r| r.start),
      Key::Right => range.filter(|r| !r.is_empty()).map_or((offset + 1).min(len), |r| r.end),
      Key::Home => {
        text
          .chars()
          .take(offset)
          .collect::<Vec<_>>()
          .iter()
          .rposition(|ch| char_is_line_ending(*ch))
          .map_or(0, |idx| idx + 1)
      },
      Key::End => {
        text
          .chars()
          .skip(offset)
          .position(char_is_line_ending)
          .map_or(len, |idx| offset + idx)
      },
      _ => return None,
    })
  }

  fn after_input(&mut self, changed: bool) {
    if changed && !self.history.is_applying() {
      self.history.record_input(self.clock.now());
    }
    self.scan_trigger();
  }

  fn save_boundary(&mut self) -> bool {
    if self.history.is_applying() {
      return false;
    }
    let content = self.surface.content();
    self.history.save_boundary(&content)
  }

  /// Takes the debounced snapshot if its window has passed. Returns whether
  /// one was taken.
  pub fn poll(&mut self) -> bool {
    let content = self.surface.content();
    self.history.poll(self.clock.now(), &content)
  }

  pub fn undo(&mut self) -> bool {
    let content = self.surface.content();
    match self.history.undo(&content) {
      Some(entry) => {
        self.apply_snapshot(&entry);
        true
      },
      None => false,
    }
  }

  pub fn redo(&mut self) -> bool {
    let content = self.surface.content();
    match self.history.redo(&content) {
      Some(entry) => {
        self.apply_snapshot(&entry);
        true
      },
      None => false,
    }
  }

  fn apply_snapshot(&mut self, snapshot: &str) {
    self.history.set_applying(true);
    self.surface.replace_content(snapshot);
    self.history.set_applying(false);
    self.close_trigger();
  }

  /// Adopts content pushed by the host. Ignored while focused; see
  /// [`Surface::sync_external`].
  pub fn sync_external(&mut self, content: &str) -> bool {
    if !self.surface.sync_external(content) {
      return false;
    }
    self.save_boundary();
    self.close_trigger();
    true
  }

  pub fn insert_link(&mut self, href: &str, label: Option<&str>) -> bool {
    let changed = insert::insert_link(&mut self.surface, href, label);
    if changed {
      self.save_boundary();
      self.scan_trigger();
    }
    changed
  }

  /// Uploads `file` and inserts it where the caret was when the upload
  /// started. A failed upload leaves the document untouched and shows an
  /// error.
  pub async fn insert_image_file(&mut self, file: ImageFile) -> Result<ImagePlacement, UploadError> {
    if !file.is_image() {
      let err = UploadError::NotAnImage(file.name.clone());
      self.messages.error(Origin::Upload, err.to_string());
      return Err(err);
    }
    let pending = insert::begin_image_insert(&self.surface, file.name.clone());
    let uploader = self.uploader.clone();
    match uploader.upload(file).await {
      Ok(uploaded) => {
        let placement = insert::finish_image_insert(&mut self.surface, pending, &uploaded);
        self.save_boundary();
        self.scan_trigger();
        Ok(placement)
      },
      Err(err) => {
        self
          .messages
          .error(Origin::Upload, format!("failed to upload {}: {err}", pending.alt));
        Err(err)
      },
    }
  }

  /// The synchronous half of a paste: suppresses the host's own paste,
  /// flushes pending input to history and plans the insertions.
  pub fn begin_paste(&mut self, event: &mut PasteEvent) -> Option<PastePlan> {
    event.prevent_default();
    self.save_boundary();
    let payload = ClipboardPayload::classify(event.take_data())?;
    let options = PasteOptions {
      collapse_blank_lines: self.config.collapse_blank_lines,
    };
    Some(clipboard::plan(payload, options))
  }

  /// Handles a paste. The default paste is prevented before this returns,
  /// the insertions happen when the returned future runs.
  pub fn paste<'a>(
    &'a mut self,
    event: &mut PasteEvent,
  ) -> impl Future<Output = PasteReport> + Send + use<'a> {
    let plan = self.begin_paste(event);
    async move {
      match plan {
        Some(plan) => self.run_paste(plan).await,
        None => PasteReport::default(),
      }
    }
  }

  /// The asynchronous half of a paste. All insertions produce one change
  /// notification and one history snapshot.
  pub async fn run_paste(&mut self, plan: PastePlan) -> PasteReport {
    let mut report = PasteReport::default();
    self.surface.begin_batch();

    for step in plan.steps {
      match step {
        PasteStep::InsertText(text) => {
          report.text_inserted |= insert::insert_text(&mut self.surface, &text, self.config.autolink);
        },
        PasteStep::UploadImage(file) => self.paste_image(file, &mut report).await,
        PasteStep::FetchRemote { url, alt } => self.paste_remote(url, alt, &mut report).await,
      }
    }
    for err in plan.rejected {
      self
        .messages
        .error(Origin::Paste, format!("could not read a pasted image: {err}"));
      report.images_rejected += 1;
    }

    self.surface.end_batch();
    self.save_boundary();
    self.scan_trigger();
    report
  }

  async fn paste_image(&mut self, file: ImageFile, report: &mut PasteReport) {
    let pending = insert::begin_image_insert(&self.surface, file.name.clone());
    let uploader = self.uploader.clone();
    match uploader.upload(file).await {
      Ok(uploaded) => {
        insert::finish_image_insert(&mut self.surface, pending, &uploaded);
        report.images_inserted += 1;
      },
      Err(err) => {
        self
          .messages
          .error(Origin::Upload, format!("failed to upload {}: {err}", pending.alt));
        report.images_failed += 1;
      },
    }
  }

  async fn paste_remote(&mut self, url: String, alt: Option<String>, report: &mut PasteReport) {
    let pending = insert::begin_image_insert(&self.surface, alt.unwrap_or_default());
    let fetcher = self.fetcher.clone();
    let uploader = self.uploader.clone();

    let uploaded = match fetcher.fetch(&url).await {
      Ok(file) => uploader.upload(file).await.map_err(|err| err.to_string()),
      Err(err) => Err(err.to_string()),
    };
    match uploaded {
      Ok(uploaded) => {
        insert::finish_image_insert(&mut self.surface, pending, &uploaded);
        report.images_inserted += 1;
      },
      Err(err) => {
        tracing::debug!("linking {url} directly: {err}");
        self
          .messages
          .warning(Origin::Fetch, format!("could not copy {url}, linked it instead"));
        insert::finish_image_link(&mut self.surface, pending, &url);
        report.images_linked += 1;
      },
    }
  }

  /// Rescans the text before the caret for a trigger and notifies the
  /// trigger listener.
  pub fn scan_trigger(&mut self) {
    let found = self.surface.text_before_cursor().and_then(|before| {
      self
        .detector
        .detect(&before)
        .map(|found| (self.geometry.anchor(&before), found))
    });
    let Some((anchor, found)) = found else {
      self.close_trigger();
      return;
    };

    let moved = self
      .trigger
      .as_ref()
      .is_none_or(|ctx| ctx.query != found.query || ctx.span != found.span);
    if moved {
      self.generation += 1;
    }
    let context = TriggerContext {
      trigger: self.detector.trigger(),
      query: found.query,
      anchor,
      span: found.span,
      generation: self.generation,
    };
    self.trigger = Some(context.clone());
    self.emit(TriggerEvent::Open(context));
  }

  /// Closes the trigger and drops its suggestions.
  pub fn close_trigger(&mut self) {
    if self.trigger.take().is_some() {
      self.generation += 1;
    }
    self.suggestions.clear();
    self.emit(TriggerEvent::Closed);
  }

  fn emit(&mut self, event: TriggerEvent) {
    if let Some(listener) = self.on_trigger.as_mut() {
      listener(&event);
    }
  }

  /// The search the suggestion list needs for the open trigger.
  pub fn search_request(&self) -> Option<SearchRequest> {
    self.trigger.as_ref().map(|ctx| {
      SearchRequest {
        generation: ctx.generation,
        query:      ctx.query.clone(),
      }
    })
  }

  /// Adopts search results unless a newer query (or a closed trigger) has
  /// superseded them. Returns whether they were adopted.
  pub fn apply_search_results(&mut self, results: SearchResults) -> bool {
    let current = self
      .trigger
      .as_ref()
      .is_some_and(|ctx| ctx.generation == results.generation);
    if !current {
      tracing::debug!("dropping stale results for generation {}", results.generation);
      return false;
    }
    let mut candidates = results.candidates;
    if let Some(limit) = self.config.search_limit {
      candidates.truncate(limit);
    }
    self.suggestions = candidates;
    true
  }

  /// Searches for the open trigger's query and adopts the results.
  pub async fn refresh_suggestions(&mut self) -> bool {
    let Some(request) = self.search_request() else {
      return false;
    };
    let source = self.candidates.clone();
    let results = request.run(source.as_ref()).await;
    self.apply_search_results(results)
  }

  /// Replaces the open trigger with `candidate`'s content, or inserts it at
  /// the caret when no trigger is open.
  pub fn select_candidate(&mut self, candidate: &Candidate) -> MacroPlacement {
    let request = match &self.trigger {
      Some(ctx) => MacroInsertionRequest::from_trigger(ctx, candidate.content.clone()),
      None => MacroInsertionRequest::at_cursor(candidate.content.clone()),
    };
    let placement = insert::insert_macro(&mut self.surface, &request);
    self.close_trigger();
    if let Some(listener) = self.on_candidate_selected.as_mut() {
      listener(candidate);
    }
    self.save_boundary();
    placement
  }

  /// [`Editor::select_candidate`] for one of the current suggestions.
  pub fn select_suggestion(&mut self, id: &str) -> Option<MacroPlacement> {
    let candidate = self.suggestions.iter().find(|c| c.id == id)?.clone();
    Some(self.select_candidate(&candidate))
  }
}
