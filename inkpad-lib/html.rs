//! A lenient HTML fragment codec.
//!
//! [`parse_fragment`] never fails: unknown tags are kept as generic elements,
//! stray closing tags are dropped, unclosed elements are closed at the end of
//! input and a `<` that does not start a tag is plain text. Comments,
//! doctypes, `<script>` and `<style>` are discarded.
//!
//! [`serialize`] writes attributes in a fixed order, so that
//! `serialize(&parse_fragment(&serialize(nodes)))` equals `serialize(nodes)`.

use html_escape::{
  decode_html_entities,
  encode_double_quoted_attribute,
  encode_text,
};

use crate::{
  Tendril,
  node::{
    Attr,
    Element,
    Image,
    Link,
    Node,
    NodeKind,
    is_block_tag,
    is_void_tag,
  },
};

/// Elements whose content is dropped together with the element.
const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

struct Frame {
  tag:      Tendril,
  attrs:    Vec<Attr>,
  children: Vec<Node>,
}

impl Frame {
  fn into_node(self) -> Node {
    if self.tag == "a" {
      let mut href = None;
      let mut attrs = Vec::with_capacity(self.attrs.len());
      for (name, value) in self.attrs {
        if name == "href" && href.is_none() {
          href = Some(value);
        } else {
          attrs.push((name, value));
        }
      }
      return Node::new(NodeKind::Link(Link {
        href: href.unwrap_or_default(),
        attrs,
        children: self.children,
      }));
    }
    Node::element(self.tag, self.attrs, self.children)
  }
}

struct TreeBuilder {
  root:  Vec<Node>,
  stack: Vec<Frame>,
}

impl TreeBuilder {
  fn children(&mut self) -> &mut Vec<Node> {
    match self.stack.last_mut() {
      Some(frame) => &mut frame.children,
      None => &mut self.root,
    }
  }

  fn push_text(&mut self, text: &str) {
    if text.is_empty() {
      return;
    }
    let children = self.children();
    if let Some(NodeKind::Text(last)) = children.last_mut().map(|node| &mut node.kind) {
      last.push_str(text);
    } else {
      children.push(Node::text(text));
    }
  }

  fn push(&mut self, node: Node) {
    self.children().push(node);
  }

  fn open(&mut self, tag: Tendril, attrs: Vec<Attr>) {
    self.stack.push(Frame {
      tag,
      attrs,
      children: Vec::new(),
    });
  }

  fn close(&mut self, tag: &str) {
    let Some(depth) = self.stack.iter().rposition(|frame| frame.tag == tag) else {
      return;
    };
    while self.stack.len() > depth {
      self.pop();
    }
  }

  fn pop(&mut self) {
    if let Some(frame) = self.stack.pop() {
      let node = frame.into_node();
      self.push(node);
    }
  }

  fn finish(mut self) -> Vec<Node> {
    while !self.stack.is_empty() {
      self.pop();
    }
    self.root
  }
}

enum Token<'a> {
  Text(&'a str),
  Open {
    tag:          Tendril,
    attrs:        Vec<Attr>,
    self_closing: bool,
  },
  Close(Tendril),
  Skip,
}

struct Tokenizer<'a> {
  src: &'a str,
  pos: usize,
}

impl<'a> Tokenizer<'a> {
  fn rest(&self) -> &'a str {
    &self.src[self.pos..]
  }

  fn skip_past(&mut self, needle: &str) {
    match self.rest().find(needle) {
      Some(idx) => self.pos += idx + needle.len(),
      None => self.pos = self.src.len(),
    }
  }

  fn next_token(&mut self) -> Option<Token<'a>> {
    let rest = self.rest();
    if rest.is_empty() {
      return None;
    }

    if !rest.starts_with('<') {
      let end = rest.find('<').unwrap_or(rest.len());
      self.pos += end;
      return Some(Token::Text(&rest[..end]));
    }

    if rest.starts_with("<!--") {
      self.skip_past("-->");
      return Some(Token::Skip);
    }
    if rest.starts_with("<!") || rest.starts_with("<?") {
      self.skip_past(">");
      return Some(Token::Skip);
    }

    let closing = rest.starts_with("</");
    let name_start = if closing { 2 } else { 1 };
    let name_len = rest[name_start..]
      .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == ':'))
      .unwrap_or(rest.len() - name_start);
    let starts_with_letter = rest[name_start..]
      .chars()
      .next()
      .is_some_and(|c| c.is_ascii_alphabetic());

    if name_len == 0 || !starts_with_letter || !rest.contains('>') {
      // not a tag, keep the bracket as text
      self.pos += 1;
      return Some(Token::Text("<"));
    }

    let tag = Tendril::from(rest[name_start..name_start + name_len].to_ascii_lowercase());
    self.pos += name_start + name_len;

    if closing {
      self.skip_past(">");
      return Some(Token::Close(tag));
    }

    let (attrs, self_closing) = self.attributes();
    Some(Token::Open {
      tag,
      attrs,
      self_closing,
    })
  }

  /// Reads attributes up to and including the closing `>`.
  fn attributes(&mut self) -> (Vec<Attr>, bool) {
    let mut attrs = Vec::new();
    loop {
      let rest = self.rest();
      let trimmed = rest.trim_start();
      self.pos += rest.len() - trimmed.len();

      if trimmed.is_empty() {
        return (attrs, false);
      }
      if let Some(after) = trimmed.strip_prefix("/>") {
        self.pos = self.src.len() - after.len();
        return (attrs, true);
      }
      if let Some(after) = trimmed.strip_prefix('>') {
        self.pos = self.src.len() - after.len();
        return (attrs, false);
      }
      if trimmed.starts_with('/') {
        self.pos += 1;
        continue;
      }

      let name_len = trimmed
        .find(|c: char| c.is_whitespace() || matches!(c, '=' | '>' | '/'))
        .unwrap_or(trimmed.len())
        .max(1);
      let name = trimmed[..name_len].to_ascii_lowercase();
      self.pos += name_len;

      let rest = self.rest();
      let after_ws = rest.trim_start();
      let Some(value_src) = after_ws.strip_prefix('=') else {
        attrs.push((name, String::new()));
        continue;
      };
      let value_src = value_src.trim_start();
      self.pos = self.src.len() - value_src.len();

      let value = match value_src.chars().next() {
        Some(quote @ ('"' | '\'')) => {
          let body = &value_src[1..];
          let end = body.find(quote).unwrap_or(body.len());
          self.pos += 1 + end + usize::from(end < body.len());
          &body[..end]
        },
        _ => {
          let end = value_src
            .find(|c: char| c.is_whitespace() || c == '>')
            .unwrap_or(value_src.len());
          self.pos += end;
          &value_src[..end]
        },
      };
      attrs.push((name, decode_html_entities(value).into_owned()));
    }
  }
}

/// Parses an HTML fragment into nodes.
pub fn parse_fragment(html: &str) -> Vec<Node> {
  let mut tokens = Tokenizer { src: html, pos: 0 };
  let mut builder = TreeBuilder {
    root:  Vec::new(),
    stack: Vec::new(),
  };

  while let Some(token) = tokens.next_token() {
    match token {
      Token::Text(text) => builder.push_text(&decode_html_entities(text)),
      Token::Skip => {},
      Token::Close(tag) => builder.close(&tag),
      Token::Open { tag, .. } if RAW_TEXT_TAGS.contains(&tag.as_str()) => {
        let close = format!("</{tag}");
        let rest = tokens.rest();
        let lower = rest.to_ascii_lowercase();
        match lower.find(&close) {
          Some(idx) => {
            tokens.pos += idx;
            tokens.skip_past(">");
          },
          None => tokens.pos = html.len(),
        }
      },
      Token::Open { tag, .. } if tag == "br" => builder.push(Node::line_break()),
      Token::Open { tag, attrs, .. } if tag == "img" => builder.push(image_from_attrs(attrs)),
      Token::Open { tag, attrs, .. } if is_void_tag(&tag) => {
        builder.push(Node::element(tag, attrs, Vec::new()))
      },
      Token::Open {
        tag,
        attrs,
        self_closing: true,
      } => builder.push(Frame {
        tag,
        attrs,
        children: Vec::new(),
      }
      .into_node()),
      Token::Open { tag, attrs, .. } => builder.open(tag, attrs),
    }
  }

  builder.finish()
}

fn image_from_attrs(attrs: Vec<Attr>) -> Node {
  let mut image = Image::default();
  let mut src = None;
  for (name, value) in attrs {
    match name.as_str() {
      "src" if src.is_none() => src = Some(value),
      "alt" if image.alt.is_none() => image.alt = Some(value),
      "width" if image.width.is_none() && value.parse::<u32>().is_ok() => {
        image.width = value.parse().ok();
      },
      "height" if image.height.is_none() && value.parse::<u32>().is_ok() => {
        image.height = value.parse().ok();
      },
      _ => image.attrs.push((name, value)),
    }
  }
  image.src = src.unwrap_or_default();
  Node::image(image)
}

/// Serializes nodes back to HTML.
pub fn serialize(nodes: &[Node]) -> String {
  let mut out = String::new();
  write_nodes(&mut out, nodes);
  out
}

fn write_nodes(out: &mut String, nodes: &[Node]) {
  for node in nodes {
    write_node(out, node);
  }
}

fn write_attr(out: &mut String, name: &str, value: &str) {
  out.push(' ');
  out.push_str(name);
  out.push_str("=\"");
  out.push_str(&encode_double_quoted_attribute(value));
  out.push('"');
}

fn write_attrs(out: &mut String, attrs: &[Attr]) {
  for (name, value) in attrs {
    write_attr(out, name, value);
  }
}

fn write_node(out: &mut String, node: &Node) {
  match &node.kind {
    NodeKind::Text(text) => out.push_str(&encode_text(text)),
    NodeKind::LineBreak => out.push_str("<br>"),
    NodeKind::Image(image) => {
      out.push_str("<img");
      write_attr(out, "src", &image.src);
      if let Some(alt) = &image.alt {
        write_attr(out, "alt", alt);
      }
      if let Some(width) = image.width {
        write_attr(out, "width", &width.to_string());
      }
      if let Some(height) = image.height {
        write_attr(out, "height", &height.to_string());
      }
      write_attrs(out, &image.attrs);
      out.push('>');
    },
    NodeKind::Link(link) => {
      out.push_str("<a");
      write_attr(out, "href", &link.href);
      write_attrs(out, &link.attrs);
      out.push('>');
      write_nodes(out, &link.children);
      out.push_str("</a>");
    },
    NodeKind::Element(Element {
      tag,
      attrs,
      children,
    }) => {
      out.push('<');
      out.push_str(tag);
      write_attrs(out, attrs);
      out.push('>');
      if !is_void_tag(tag) {
        write_nodes(out, children);
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
      }
    },
  }
}

/// The readable text of a fragment: line breaks and block boundaries become
/// newlines, images are skipped.
pub fn text_content(nodes: &[Node]) -> String {
  fn walk(out: &mut String, nodes: &[Node]) {
    for node in nodes {
      match &node.kind {
        NodeKind::Text(text) => out.push_str(text),
        NodeKind::LineBreak => out.push('\n'),
        NodeKind::Image(_) => {},
        NodeKind::Link(link) => walk(out, &link.children),
        NodeKind::Element(element) => {
          let block = is_block_tag(&element.tag);
          if block && !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
          }
          walk(out, &element.children);
          if block && !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
          }
        },
      }
    }
  }

  let mut out = String::new();
  walk(&mut out, nodes);
  let trimmed = out.trim_end_matches('\n').len();
  out.truncate(trimmed);
  out
}

#[cfg(test)]
mod tests {
  use quickcheck::quickcheck;

  use super::*;

  fn roundtrip(html: &str) -> String {
    serialize(&parse_fragment(html))
  }

  #[test]
  fn plain_text_passes_through() {
    assert_eq!(roundtrip("hello world"), "hello world");
    assert_eq!(roundtrip("a &amp; b &lt;c&gt;"), "a &amp; b &lt;c&gt;");
  }

  #[test]
  fn entities_are_decoded_into_text() {
    let nodes = parse_fragment("caf&eacute; &#38; bar&nbsp;");
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].as_text(), Some("café & bar\u{a0}"));
  }

  #[test]
  fn nested_elements() {
    let html = r#"<p>Hi <b>there</b><br>next</p><div class="x">y</div>"#;
    assert_eq!(roundtrip(html), html);
  }

  #[test]
  fn images_write_known_attributes_first() {
    let html = r#"<img data-id="7" height="20" src="a.png" width="10" alt="pic">"#;
    assert_eq!(
      roundtrip(html),
      r#"<img src="a.png" alt="pic" width="10" height="20" data-id="7">"#
    );
  }

  #[test]
  fn links_keep_href_first() {
    let html = r#"<a target="_blank" href="https://example.com/?a=1&amp;b=2">x</a>"#;
    let nodes = parse_fragment(html);
    let NodeKind::Link(link) = &nodes[0].kind else {
      panic!("expected a link");
    };
    assert_eq!(link.href, "https://example.com/?a=1&b=2");
    assert_eq!(
      serialize(&nodes),
      r#"<a href="https://example.com/?a=1&amp;b=2" target="_blank">x</a>"#
    );
  }

  #[test]
  fn malformed_input_is_tolerated() {
    assert_eq!(roundtrip("a < b"), "a &lt; b");
    assert_eq!(roundtrip("<p>open"), "<p>open</p>");
    assert_eq!(roundtrip("text</span> more"), "text more");
    assert_eq!(roundtrip("<b><i>x</b>y"), "<b><i>x</i></b>y");
    assert_eq!(roundtrip("tail <"), "tail &lt;");
  }

  #[test]
  fn unsafe_and_invisible_content_is_dropped() {
    assert_eq!(
      roundtrip("a<!-- note --><script>alert(1)</script><style>p{}</style>b"),
      "ab"
    );
    assert_eq!(roundtrip("<!DOCTYPE html><p>x</p>"), "<p>x</p>");
  }

  #[test]
  fn self_closing_and_valueless_attributes() {
    assert_eq!(roundtrip("<br/>x<hr />"), "<br>x<hr>");
    assert_eq!(
      roundtrip("<input disabled><span/>"),
      r#"<input disabled=""><span></span>"#
    );
  }

  #[test]
  fn single_quoted_and_unquoted_values() {
    assert_eq!(
      roundtrip("<span title='say \"hi\"' lang=en>x</span>"),
      r#"<span title="say &quot;hi&quot;" lang="en">x</span>"#
    );
  }

  #[test]
  fn text_content_separates_blocks() {
    let nodes = parse_fragment("<p>one</p><p>two<br>three</p><img src=x>four");
    assert_eq!(text_content(&nodes), "one\ntwo\nthree\nfour");
  }

  quickcheck! {
    fn serialization_is_idempotent(input: String) -> bool {
      let once = roundtrip(&input);
      roundtrip(&once) == once
    }
  }
}
