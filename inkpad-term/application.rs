use std::{
  path::Path,
  sync::Arc,
  time::Duration,
};

use anyhow::{
  Context,
  Result,
};
use inkpad_lib::{
  Editor,
  candidates::{
    Candidate,
    StaticCandidates,
  },
  clipboard::{
    ClipboardData,
    PasteEvent,
  },
  config::EditorConfig,
  history::Clock,
  messages::Notice,
  upload::ImageFile,
};
use tokio::sync::mpsc::{
  self,
  Receiver,
};

use crate::{
  cli::ReplayOptions,
  handlers::{
    AppEvent,
    Handlers,
  },
  script::Action,
  uploads::{
    DirectoryUploader,
    FileFetcher,
  },
};

/// Reads time from tokio, so paused test runtimes drive the history debounce.
#[derive(Debug, Default)]
struct TokioClock;

impl Clock for TokioClock {
  fn now(&self) -> std::time::Instant {
    tokio::time::Instant::now().into_std()
  }
}

pub struct Application {
  editor:   Editor,
  handlers: Handlers,
  events:   Receiver<AppEvent>,
}

impl Application {
  /// Builds the editor for a replay. Must be called inside a tokio runtime.
  pub fn new(config: EditorConfig, options: &ReplayOptions) -> Result<Self> {
    let content = match &options.content {
      Some(path) => {
        std::fs::read_to_string(path)
          .with_context(|| format!("failed to read {}", path.display()))?
      },
      None => String::new(),
    };
    let candidates: Vec<Candidate> = match &options.candidates {
      Some(path) => {
        let source = std::fs::read_to_string(path)
          .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&source)
          .with_context(|| format!("invalid candidates in {}", path.display()))?
      },
      None => Vec::new(),
    };
    log::info!("loaded {} candidates", candidates.len());

    // `search-limit` is applied by the editor when results arrive.
    let source = Arc::new(StaticCandidates::new(candidates));

    let editor = Editor::new(&content, config)
      .with_clock(Arc::new(TokioClock))
      .with_uploader(Arc::new(DirectoryUploader::new(&options.uploads)))
      .with_fetcher(Arc::new(FileFetcher))
      .with_candidates(source.clone());

    let (tx, events) = mpsc::channel(64);
    let handlers = Handlers::spawn(tx, source);

    Ok(Self {
      editor,
      handlers,
      events,
    })
  }

  /// Runs every action in order and returns the final document.
  pub async fn replay(&mut self, actions: Vec<Action>) -> Result<String> {
    self.editor.focus();
    for action in actions {
      log::debug!("replaying {action:?}");
      self.run_action(action).await?;
      self.handlers.after_action(&self.editor);
      self.drain_events();
    }
    Ok(self.editor.content())
  }

  pub fn notices(&self) -> impl Iterator<Item = &Notice> {
    self.editor.messages().history()
  }

  async fn run_action(&mut self, action: Action) -> Result<()> {
    match action {
      Action::Focus => self.editor.focus(),
      Action::Blur => self.editor.blur(),
      Action::Type { text } => {
        for ch in text.chars() {
          let key = if ch == '\n' {
            inkpad_lib::Key::Enter
          } else {
            inkpad_lib::Key::Char(ch)
          };
          self.editor.key(key);
        }
      },
      Action::Key { key } => {
        self.editor.key(key.into());
      },
      Action::Cursor { offset } => self.editor.move_cursor_to(offset),
      Action::Paste { text, html, images } => {
        let files = images
          .iter()
          .map(|path| read_image(path))
          .collect::<Result<Vec<_>>>()?;
        let mut event = PasteEvent::new(ClipboardData { files, html, text });
        let report = self.editor.paste(&mut event).await;
        log::info!("paste: {report:?}");
      },
      Action::Undo => {
        if !self.editor.undo() {
          log::info!("nothing to undo");
        }
      },
      Action::Redo => {
        if !self.editor.redo() {
          log::info!("nothing to redo");
        }
      },
      Action::Wait { ms } => self.wait(Duration::from_millis(ms)).await,
      Action::Select { id } => {
        if self.editor.select_suggestion(&id).is_none() {
          self.editor.refresh_suggestions().await;
          if self.editor.select_suggestion(&id).is_none() {
            log::warn!("no suggestion with id {id}");
          }
        }
      },
      Action::Link { href, label } => {
        self.editor.insert_link(&href, label.as_deref());
      },
      Action::Image { path } => {
        let file = read_image(&path)?;
        if let Err(err) = self.editor.insert_image_file(file).await {
          log::warn!("image not inserted: {err}");
        }
      },
      Action::Sync { content } => {
        if !self.editor.sync_external(&content) {
          log::info!("external content ignored");
        }
      },
    }
    Ok(())
  }

  /// Lets time pass while handling whatever the hooks send back.
  async fn wait(&mut self, duration: Duration) {
    let sleep = tokio::time::sleep(duration);
    tokio::pin!(sleep);
    loop {
      tokio::select! {
        _ = &mut sleep => break,
        Some(event) = self.events.recv() => self.handle_event(event),
      }
    }
  }

  fn drain_events(&mut self) {
    while let Ok(event) = self.events.try_recv() {
      self.handle_event(event);
    }
  }

  fn handle_event(&mut self, event: AppEvent) {
    match event {
      AppEvent::PollHistory => {
        if self.editor.poll() {
          log::debug!("history snapshot after pause");
        }
      },
      AppEvent::Suggestions(results) => {
        let count = results.candidates.len();
        if self.editor.apply_search_results(results) {
          log::debug!("{count} suggestions");
        }
      },
    }
  }
}

fn read_image(path: &Path) -> Result<ImageFile> {
  let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
  let mime = image::guess_format(&bytes)
    .map(|format| format.to_mime_type())
    .unwrap_or("application/octet-stream");
  let name = path
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_else(|| "image".to_string());
  Ok(ImageFile::new(name, mime, bytes))
}
