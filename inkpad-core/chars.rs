#[inline]
pub fn char_is_line_ending(ch: char) -> bool {
  matches!(ch, '\n' | '\r')
}

/// Keys that close a word and force an immediate history save.
#[inline]
pub fn char_is_word_boundary(ch: char) -> bool {
  ch == ' ' || char_is_line_ending(ch)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn boundaries_are_space_and_newline() {
    assert!(char_is_word_boundary(' '));
    assert!(char_is_word_boundary('\n'));
    assert!(char_is_word_boundary('\r'));
    assert!(!char_is_word_boundary('\t'));
    assert!(!char_is_word_boundary('x'));
  }
}
