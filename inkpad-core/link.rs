//! Detection of bare `http(s)://` URLs inside plain text.

use std::{
  ops::Range,
  sync::LazyLock,
};

use regex::Regex;

static URL_REGEX: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r#"(?i)\bhttps?://[^\s<>"']+"#).expect("valid url regex"));

/// A URL found in a piece of text. `range` is a byte range into that text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMatch<'a> {
  pub range: Range<usize>,
  pub url:   &'a str,
}

/// A piece of text split around the URLs it contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
  Text(&'a str),
  Link(&'a str),
}

/// Finds every URL in `text`, left to right.
///
/// Trailing sentence punctuation and unbalanced closing brackets are not part
/// of a match, and candidates `url` cannot parse (or without a host) are
/// skipped.
pub fn find_links(text: &str) -> Vec<LinkMatch<'_>> {
  URL_REGEX
    .find_iter(text)
    .filter_map(|m| {
      let trimmed = trim_trailing(m.as_str());
      let parsed = url::Url::parse(trimmed).ok()?;
      parsed.host_str().filter(|host| !host.is_empty())?;
      let start = m.start();
      Some(LinkMatch {
        range: start..start + trimmed.len(),
        url:   trimmed,
      })
    })
    .collect()
}

/// Splits `text` into alternating text and link segments. Empty text segments
/// are omitted.
pub fn split_links(text: &str) -> Vec<Segment<'_>> {
  let mut segments = Vec::new();
  let mut last = 0;
  for link in find_links(text) {
    if link.range.start > last {
      segments.push(Segment::Text(&text[last..link.range.start]));
    }
    segments.push(Segment::Link(link.url));
    last = link.range.end;
  }
  if last < text.len() {
    segments.push(Segment::Text(&text[last..]));
  }
  segments
}

fn trim_trailing(candidate: &str) -> &str {
  let mut end = candidate.len();
  loop {
    let Some(ch) = candidate[..end].chars().next_back() else {
      break;
    };
    let strip = match ch {
      '.' | ',' | ';' | ':' | '!' | '?' => true,
      ')' => !balanced(&candidate[..end], '(', ')'),
      ']' => !balanced(&candidate[..end], '[', ']'),
      _ => false,
    };
    if !strip {
      break;
    }
    end -= ch.len_utf8();
  }
  &candidate[..end]
}

fn balanced(text: &str, open: char, close: char) -> bool {
  let opens = text.chars().filter(|&c| c == open).count();
  let closes = text.chars().filter(|&c| c == close).count();
  opens >= closes
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn finds_link_in_sentence() {
    let text = "see https://example.com for more";
    let links = find_links(text);
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].url, "https://example.com");
    assert_eq!(&text[links[0].range.clone()], "https://example.com");
  }

  #[test]
  fn splits_around_links() {
    let segments = split_links("see https://example.com for more");
    assert_eq!(segments, vec![
      Segment::Text("see "),
      Segment::Link("https://example.com"),
      Segment::Text(" for more"),
    ]);
  }

  #[test]
  fn trims_sentence_punctuation() {
    let links = find_links("go to http://a.io/x. Then (https://b.io/y).");
    let urls: Vec<_> = links.iter().map(|l| l.url).collect();
    assert_eq!(urls, vec!["http://a.io/x", "https://b.io/y"]);
  }

  #[test]
  fn keeps_balanced_parens() {
    let links = find_links("https://en.wikipedia.org/wiki/Rust_(language)");
    assert_eq!(links[0].url, "https://en.wikipedia.org/wiki/Rust_(language)");
  }

  #[test]
  fn ignores_non_http_schemes_and_bare_scheme() {
    assert!(find_links("ftp://example.com mailto:a@b.c").is_empty());
    assert!(find_links("https://").is_empty());
  }

  #[test]
  fn plain_text_is_single_segment() {
    assert_eq!(split_links("no links here"), vec![Segment::Text(
      "no links here"
    )]);
    assert!(split_links("").is_empty());
  }
}
