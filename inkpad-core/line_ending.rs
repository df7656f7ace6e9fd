use std::borrow::Cow;

/// Rewrites CRLF and lone CR line endings to LF.
pub fn normalize_line_endings(text: &str) -> Cow<'_, str> {
  if !text.contains('\r') {
    return Cow::Borrowed(text);
  }

  let mut out = String::with_capacity(text.len());
  let mut chars = text.chars().peekable();
  while let Some(ch) = chars.next() {
    if ch == '\r' {
      if chars.peek() == Some(&'\n') {
        chars.next();
      }
      out.push('\n');
    } else {
      out.push(ch);
    }
  }
  Cow::Owned(out)
}

/// Collapses every run of three or more LF characters into exactly two.
///
/// Expects LF line endings; run [`normalize_line_endings`] first.
pub fn collapse_blank_lines(text: &str) -> Cow<'_, str> {
  if !text.contains("\n\n\n") {
    return Cow::Borrowed(text);
  }

  let mut out = String::with_capacity(text.len());
  let mut run = 0usize;
  for ch in text.chars() {
    if ch == '\n' {
      run += 1;
      if run <= 2 {
        out.push(ch);
      }
    } else {
      run = 0;
      out.push(ch);
    }
  }
  Cow::Owned(out)
}
