use smartstring::{
  LazyCompact,
  SmartString,
};

pub mod candidates;
pub mod clipboard;
pub mod config;
pub mod document;
pub mod editor;
pub mod history;
pub mod html;
pub mod insert;
pub mod messages;
pub mod node;
pub mod selection;
pub mod surface;
pub mod trigger;
pub mod upload;

pub type Tendril = SmartString<LazyCompact>;

pub use editor::{
  Editor,
  Key,
  PasteReport,
};
