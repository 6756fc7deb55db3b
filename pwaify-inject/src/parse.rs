//! Tolerant HTML parser producing a [`Document`].
//!
//! This is not a full HTML5 tree builder. It handles what page heads
//! contain in practice: doctype, comments, void and raw-text elements,
//! unquoted attributes, unmatched end tags and missing end tags. Everything it
//! does not understand is kept as text, so serialization stays lossless.

use crate::error::ParseError;
use crate::node::{Attribute, Document, Element, EndTag, Node, RAW_TEXT_ELEMENTS, is_void};

/// Parse `source` into a document.
///
/// Fails only on input that is clearly not an HTML document (NUL bytes).
pub fn parse_document(source: &str) -> Result<Document, ParseError> {
    if let Some(offset) = source.find('\0') {
        return Err(ParseError::BinaryContent { offset });
    }
    Ok(Parser::new(source).run())
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    root: Vec<Node>,
    open: Vec<Element>,
    /// Offsets of the last `"` and `'` in the source.
    last_quote: [Option<usize>; 2],
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            root: Vec::new(),
            open: Vec::new(),
            last_quote: [src.rfind('"'), src.rfind('\'')],
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn push(&mut self, node: Node) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.root.push(node),
        }
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let children = match self.open.last_mut() {
            Some(parent) => &mut parent.children,
            None => &mut self.root,
        };
        if let Some(Node::Text(prev)) = children.last_mut() {
            prev.push_str(text);
        } else {
            children.push(Node::Text(text.to_string()));
        }
    }

    /// Pop the top open element and attach it to its parent.
    fn close_top(&mut self, end: EndTag) {
        if let Some(mut el) = self.open.pop() {
            el.end = end;
            self.push(Node::Element(el));
        }
    }

    fn run(mut self) -> Document {
        while self.pos < self.src.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                self.comment();
            } else if rest.starts_with("</") {
                self.end_tag();
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                self.declaration();
            } else if rest.starts_with('<')
                && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic())
            {
                self.start_tag();
            } else {
                self.text();
            }
        }
        while !self.open.is_empty() {
            self.close_top(EndTag::Implied);
        }
        Document {
            children: std::mem::take(&mut self.root),
        }
    }

    fn text(&mut self) {
        let rest = self.rest();
        // Always consume at least one char so a stray '<' makes progress.
        let first = rest.chars().next().map(char::len_utf8).unwrap_or(1);
        let len = rest[first..].find('<').map(|i| i + first).unwrap_or(rest.len());
        self.push_text(&rest[..len]);
        self.pos += len;
    }

    fn comment(&mut self) {
        let rest = self.rest();
        match rest[4..].find("-->") {
            Some(end) => {
                self.push(Node::Comment(rest[4..4 + end].to_string()));
                self.pos += 4 + end + 3;
            }
            None => {
                // Unterminated: keep the remainder verbatim.
                self.push_text(rest);
                self.pos = self.src.len();
            }
        }
    }

    fn declaration(&mut self) {
        let rest = self.rest();
        match rest.find('>') {
            Some(end) => {
                self.push(Node::Doctype(rest[..=end].to_string()));
                self.pos += end + 1;
            }
            None => {
                self.push_text(rest);
                self.pos = self.src.len();
            }
        }
    }

    fn end_tag(&mut self) {
        let rest = self.rest();
        // A '<' before the closing '>' means this was never an end tag.
        let Some(close) = rest[2..]
            .find(['>', '<'])
            .map(|i| i + 2)
            .filter(|&i| rest.as_bytes()[i] == b'>')
        else {
            self.push_text("</");
            self.pos += 2;
            return;
        };
        let raw = &rest[..=close];
        let name = tag_name(&rest[2..close]);
        self.pos += close + 1;

        match self.open.iter().rposition(|el| el.name() == name) {
            Some(index) => {
                while self.open.len() > index + 1 {
                    self.close_top(EndTag::Implied);
                }
                self.close_top(EndTag::Explicit(raw.to_string()));
            }
            // Stray end tag: keep it as text so nothing is lost.
            None => self.push_text(raw),
        }
    }

    fn start_tag(&mut self) {
        let rest = self.rest();
        let Some(close) = self.find_tag_end() else {
            // Not a well-formed tag: the '<' is text, keep scanning after it.
            self.push_text("<");
            self.pos += 1;
            return;
        };
        let raw = &rest[..=close];
        let inner = &rest[1..close];
        let self_closing = inner.trim_end().ends_with('/');
        let (name, attrs) = parse_tag_body(inner);
        self.pos += close + 1;

        // A body start tag ends an unclosed head.
        if name == "body"
            && let Some(index) = self.open.iter().rposition(|el| el.name() == "head")
        {
            while self.open.len() > index {
                self.close_top(EndTag::Implied);
            }
        }

        if is_void(&name) || self_closing {
            let el = Element::parsed(name, attrs, raw.to_string(), EndTag::None);
            self.push(Node::Element(el));
            return;
        }

        if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            self.raw_text_element(name, attrs, raw.to_string());
            return;
        }

        self.open
            .push(Element::parsed(name, attrs, raw.to_string(), EndTag::Implied));
    }

    fn raw_text_element(&mut self, name: String, attrs: Vec<Attribute>, raw_start: String) {
        let rest = self.rest();
        let found = find_end_tag_ci(rest, &name);
        let mut el = Element::parsed(name, attrs, raw_start, EndTag::Implied);

        match found {
            Some(start) => {
                let body = &rest[..start];
                let end_len = rest[start..].find('>').map(|i| i + 1).unwrap_or(rest.len() - start);
                if !body.is_empty() {
                    el.children.push(Node::Text(body.to_string()));
                }
                el.end = EndTag::Explicit(rest[start..start + end_len].to_string());
                self.pos += start + end_len;
            }
            None => {
                if !rest.is_empty() {
                    el.children.push(Node::Text(rest.to_string()));
                }
                self.pos = self.src.len();
            }
        }
        self.push(Node::Element(el));
    }

    /// Index in `rest()` of the `>` closing a start tag, honouring quoted
    /// attribute values.
    fn find_tag_end(&self) -> Option<usize> {
        let s = self.rest();
        let mut quote: Option<u8> = None;
        for (i, b) in s.bytes().enumerate().skip(1) {
            match (quote, b) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, b'"' | b'\'') => {
                    // A quote with no partner later in the source never closes.
                    let last = self.last_quote[usize::from(b == b'\'')];
                    if last.is_none_or(|last| last <= self.pos + i) {
                        return None;
                    }
                    quote = Some(b);
                }
                (None, b'>') => return Some(i),
                (None, b'<') => return None,
                _ => {}
            }
        }
        None
    }
}

/// Offset of the first `</name` in `s`, ASCII case-insensitive.
fn find_end_tag_ci(s: &str, name: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    s.match_indices("</").map(|(i, _)| i).find(|&i| {
        bytes
            .get(i + 2..i + 2 + name.len())
            .is_some_and(|tag| tag.eq_ignore_ascii_case(name.as_bytes()))
    })
}

fn tag_name(s: &str) -> String {
    s.trim_start()
        .split(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn parse_tag_body(inner: &str) -> (String, Vec<Attribute>) {
    let name_len = inner
        .find(|c: char| c.is_whitespace() || c == '/')
        .unwrap_or(inner.len());
    let name = inner[..name_len].to_ascii_lowercase();
    let bytes = inner.as_bytes();
    let mut attrs = Vec::new();
    let mut i = name_len;

    while i < bytes.len() {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && bytes[i] != b'='
            && bytes[i] != b'/'
        {
            i += 1;
        }
        let attr_name = inner[start..i].to_string();
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        let mut value = None;
        if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                let quote = bytes[i];
                let vstart = i + 1;
                let vend = inner[vstart..]
                    .bytes()
                    .position(|b| b == quote)
                    .map(|p| vstart + p)
                    .unwrap_or(bytes.len());
                value = Some(inner[vstart..vend].to_string());
                i = (vend + 1).min(bytes.len());
            } else {
                let vstart = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                value = Some(inner[vstart..i].to_string());
            }
        }

        if !attr_name.is_empty() {
            attrs.push(Attribute {
                name: attr_name,
                value,
            });
        } else if i == start {
            // Lone '=' or similar: skip a byte to guarantee progress.
            i += 1;
        }
    }

    (name, attrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::to_html;

    fn roundtrip(src: &str) {
        let doc = parse_document(src).expect("parse");
        assert_eq!(to_html(&doc), src);
    }

    #[test]
    fn lossless_for_typical_page() {
        roundtrip(
            "<!DOCTYPE html>\n<html lang=en>\n  <head>\n    <meta charset='utf-8'>\n    \
             <title>Demo &amp; co</title>\n    <!-- note -->\n  </head>\n  <body class=\"x\">\
             <p>Hi<br/>there</p></body>\n</html>\n",
        );
    }

    #[test]
    fn lossless_for_broken_markup() {
        roundtrip("<div><span>unclosed</div></p> stray < text <a href=\"x>");
        roundtrip("<!-- never closed");
        roundtrip("<script>if (a < b) { x = '</div>'; }</script>");
        roundtrip("<style>p{}</STYLE >tail");
        roundtrip("</unclosed<p>x</p>");
    }

    #[test]
    fn attributes_are_parsed_case_insensitively() {
        let doc = parse_document("<LINK REL=\"Manifest\" href='/m.json' disabled>").unwrap();
        let link = doc.element(&[0]).unwrap();
        assert_eq!(link.name(), "link");
        assert!(link.attr_eq("rel", "manifest"));
        assert_eq!(link.attr("href"), Some("/m.json"));
        assert_eq!(link.attr("disabled"), Some(""));
    }

    #[test]
    fn body_closes_unterminated_head() {
        let doc = parse_document("<html><head><title>t</title><body></body></html>").unwrap();
        let head = doc.find_first(|e| e.name() == "head").unwrap();
        let body = doc.find_first(|e| e.name() == "body").unwrap();
        assert_eq!(head.len(), body.len());
        assert_eq!(doc.element(&head).unwrap().end(), &EndTag::Implied);
    }

    #[test]
    fn script_content_is_not_parsed_as_markup() {
        let doc = parse_document("<script>var s = '<meta name=x>';</script>").unwrap();
        assert_eq!(doc.find_all(|e| e.name() == "meta").len(), 0);
    }

    #[test]
    fn nul_bytes_are_rejected() {
        assert!(matches!(
            parse_document("<html>\0</html>"),
            Err(ParseError::BinaryContent { offset: 6 })
        ));
    }

    #[test]
    fn raw_text_end_tag_is_matched_case_insensitively() {
        let doc = parse_document("<SCRIPT>a</Script><p>b</p>").unwrap();
        let script = doc.element(&[0]).unwrap();
        assert_eq!(script.text(), "a");
        assert_eq!(script.end(), &EndTag::Explicit("</Script>".to_string()));
        assert_eq!(doc.find_all(|e| e.name() == "p").len(), 1);
    }

    #[test]
    fn many_raw_text_elements_parse_losslessly() {
        let src = "<script>x()</script><style>p{}</style>".repeat(20_000);
        let doc = parse_document(&src).unwrap();
        assert_eq!(doc.children.len(), 40_000);
        assert_eq!(to_html(&doc), src);
    }

    #[test]
    fn unterminated_quotes_stay_text() {
        let src = "<a \"x".repeat(20_000);
        let doc = parse_document(&src).unwrap();
        assert!(doc.find_first(|e| e.name() == "a").is_none());
        assert_eq!(to_html(&doc), src);
        roundtrip("<a href='x>y<b title=\"z\">w</b>");
    }

    #[test]
    fn deep_nesting_does_not_overflow() {
        let depth = 50_000;
        let src = format!("{}{}", "<div>".repeat(depth), "</div>".repeat(depth));
        let doc = parse_document(&src).unwrap();
        assert_eq!(to_html(&doc), src);
    }
}
