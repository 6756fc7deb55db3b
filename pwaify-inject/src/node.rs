//! Closed HTML node model.
//!
//! Nodes keep the raw source text of tags they were parsed from, so an
//! unmodified element serializes back to exactly the bytes it came from.
//! Traversals use an explicit stack; nothing here recurses on document depth.

use std::ops::ControlFlow;

/// A path from the document root to a node: child indices at each level.
pub type NodePath = Vec<usize>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Raw text, entities left undecoded.
    Text(String),
    /// Comment body between `<!--` and `-->`.
    Comment(String),
    /// A declaration such as `<!DOCTYPE html>`, stored verbatim.
    Doctype(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn is_whitespace_text(&self) -> bool {
        matches!(self, Node::Text(t) if t.chars().all(char::is_whitespace))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Name as written; lookups ignore case.
    pub name: String,
    /// Raw value without surrounding quotes; `None` for bare attributes.
    pub value: Option<String>,
}

/// How an element's end is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndTag {
    /// Void element (`<meta>`), or `<x/>`; no end tag.
    None,
    /// End tag present in the source, kept verbatim.
    Explicit(String),
    /// Closed implicitly (end of input or parent closed); nothing is written.
    Implied,
    /// Newly created element; serializer writes `</name>`.
    Generated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attrs: Vec<Attribute>,
    pub children: Vec<Node>,
    /// Source text of the start tag; cleared once attributes change.
    raw_start: Option<String>,
    pub(crate) end: EndTag,
}

pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

impl Element {
    /// Create an element that did not come from source text.
    pub fn new(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        let end = if is_void(&name) {
            EndTag::None
        } else {
            EndTag::Generated
        };
        Self {
            name,
            attrs: Vec::new(),
            children: Vec::new(),
            raw_start: None,
            end,
        }
    }

    pub(crate) fn parsed(name: String, attrs: Vec<Attribute>, raw_start: String, end: EndTag) -> Self {
        Self {
            name,
            attrs,
            children: Vec::new(),
            raw_start: Some(raw_start),
            end,
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.children.push(Node::Text(text.to_string()));
        self
    }

    /// Lowercased tag name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attrs(&self) -> &[Attribute] {
        &self.attrs
    }

    pub(crate) fn raw_start(&self) -> Option<&str> {
        self.raw_start.as_deref()
    }

    pub fn end(&self) -> &EndTag {
        &self.end
    }

    /// Attribute value by case-insensitive name. Bare attributes yield `""`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_deref().unwrap_or(""))
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Case-insensitive attribute comparison, surrounding whitespace ignored.
    pub fn attr_eq(&self, name: &str, expected: &str) -> bool {
        self.attr(name)
            .map(|v| v.trim().eq_ignore_ascii_case(expected))
            .unwrap_or(false)
    }

    /// Set an attribute; returns `true` if the element changed.
    ///
    /// `value` is escaped for a double-quoted attribute.
    pub fn set_attr(&mut self, name: &str, value: &str) -> bool {
        let escaped = escape_attr(value);
        if let Some(existing) = self
            .attrs
            .iter_mut()
            .find(|a| a.name.eq_ignore_ascii_case(name))
        {
            if existing.value.as_deref() == Some(escaped.as_str()) {
                return false;
            }
            existing.value = Some(escaped);
        } else {
            self.attrs.push(Attribute {
                name: name.to_string(),
                value: Some(escaped),
            });
        }
        self.raw_start = None;
        true
    }

    /// Concatenated direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                Node::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace all children with a single text node; returns `true` on change.
    pub fn set_text(&mut self, text: &str) -> bool {
        if self.children.len() == 1 && self.text() == text {
            return false;
        }
        self.children.clear();
        self.children.push(Node::Text(text.to_string()));
        if self.end == EndTag::Implied {
            self.end = EndTag::Generated;
        }
        true
    }
}

// Dropping a deeply nested tree must not recurse once per level.
impl Drop for Element {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(node) = pending.pop() {
            if let Node::Element(mut el) = node {
                pending.append(&mut el.children);
            }
        }
    }
}

pub(crate) fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// A parsed HTML document: a forest of top-level nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub children: Vec<Node>,
}

impl Document {
    /// Visit every element in document (pre-)order until `visit` breaks.
    ///
    /// The path handed to `visit` is only valid for that call; one shared
    /// buffer is pushed and popped as the walk descends.
    pub fn walk(&self, mut visit: impl FnMut(&[usize], &Element) -> ControlFlow<()>) {
        let mut path: Vec<usize> = Vec::new();
        let mut stack = vec![self.children.iter().enumerate()];
        while let Some(siblings) = stack.last_mut() {
            let Some((index, node)) = siblings.next() else {
                stack.pop();
                path.pop();
                continue;
            };
            let Node::Element(el) = node else {
                continue;
            };
            path.push(index);
            if visit(&path, el).is_break() {
                return;
            }
            stack.push(el.children.iter().enumerate());
        }
    }

    /// Paths of elements matching `pred`, in document order.
    pub fn find_all(&self, pred: impl Fn(&Element) -> bool) -> Vec<NodePath> {
        let mut out = Vec::new();
        self.walk(|path, el| {
            if pred(el) {
                out.push(path.to_vec());
            }
            ControlFlow::Continue(())
        });
        out
    }

    pub fn find_first(&self, pred: impl Fn(&Element) -> bool) -> Option<NodePath> {
        let mut found = None;
        self.walk(|path, el| {
            if pred(el) {
                found = Some(path.to_vec());
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        });
        found
    }

    /// Number of elements matching `pred`.
    pub fn count(&self, pred: impl Fn(&Element) -> bool) -> usize {
        let mut n = 0;
        self.walk(|_, el| {
            n += usize::from(pred(el));
            ControlFlow::Continue(())
        });
        n
    }

    pub fn node(&self, path: &[usize]) -> Option<&Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.children.get(*first)?;
        for &i in rest {
            node = node.as_element()?.children.get(i)?;
        }
        Some(node)
    }

    pub fn node_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.children.get_mut(*first)?;
        for &i in rest {
            node = node.as_element_mut()?.children.get_mut(i)?;
        }
        Some(node)
    }

    pub fn element(&self, path: &[usize]) -> Option<&Element> {
        self.node(path).and_then(Node::as_element)
    }

    pub fn element_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        self.node_mut(path).and_then(Node::as_element_mut)
    }

    /// Children list that contains the node at `path`.
    fn siblings_mut(&mut self, path: &[usize]) -> Option<&mut Vec<Node>> {
        match path.split_last() {
            Some((_, [])) => Some(&mut self.children),
            Some((_, parent)) => self.element_mut(parent).map(|el| &mut el.children),
            None => None,
        }
    }

    /// Detach the node at `path`. Paths after it in document order shift.
    pub fn remove(&mut self, path: &[usize]) -> Option<Node> {
        let index = *path.last()?;
        let siblings = self.siblings_mut(path)?;
        (index < siblings.len()).then(|| siblings.remove(index))
    }

    /// Insert `node` so that it ends up at `path`.
    pub fn insert(&mut self, path: &[usize], node: Node) -> bool {
        let Some(&index) = path.last() else {
            return false;
        };
        match self.siblings_mut(path) {
            Some(siblings) if index <= siblings.len() => {
                siblings.insert(index, node);
                true
            }
            _ => false,
        }
    }
}

impl Drop for Document {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(node) = pending.pop() {
            if let Node::Element(mut el) = node {
                pending.append(&mut el.children);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        let head = Element::new("head").with_text("\n");
        let mut html = Element::new("html");
        html.children.push(Node::Element(head));
        html.children.push(Node::Element(Element::new("body")));
        Document {
            children: vec![
                Node::Doctype("<!DOCTYPE html>".to_string()),
                Node::Element(html),
            ],
        }
    }

    #[test]
    fn walk_visits_elements_in_document_order() {
        let doc = sample();
        let mut seen = Vec::new();
        doc.walk(|path, el| {
            seen.push((path.to_vec(), el.name().to_string()));
            ControlFlow::Continue(())
        });
        assert_eq!(
            seen,
            vec![
                (vec![1], "html".to_string()),
                (vec![1, 0], "head".to_string()),
                (vec![1, 1], "body".to_string()),
            ]
        );
    }

    #[test]
    fn walk_stops_at_break() {
        let doc = sample();
        let mut visited = 0;
        doc.walk(|_, el| {
            visited += 1;
            if el.name() == "head" {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(visited, 2);
        assert_eq!(doc.count(|e| e.name() != "head"), 2);
    }

    #[test]
    fn paths_address_nodes() {
        let doc = sample();
        let head = doc.find_first(|e| e.name() == "head").unwrap();
        assert_eq!(head, vec![1, 0]);
        assert_eq!(doc.element(&head).unwrap().name(), "head");
    }

    #[test]
    fn set_attr_reports_change_and_escapes() {
        let mut el = Element::new("meta");
        assert!(el.set_attr("content", "a\"b"));
        assert_eq!(el.attr("content"), Some("a&quot;b"));
        assert!(!el.set_attr("CONTENT", "a\"b"));
    }

    #[test]
    fn remove_and_insert_roundtrip() {
        let mut doc = sample();
        let body = doc.find_first(|e| e.name() == "body").unwrap();
        let node = doc.remove(&body).unwrap();
        assert!(doc.find_first(|e| e.name() == "body").is_none());
        assert!(doc.insert(&body, node));
        assert_eq!(doc.find_first(|e| e.name() == "body"), Some(body));
    }

    #[test]
    fn void_elements_have_no_end_tag() {
        assert_eq!(Element::new("LINK").end(), &EndTag::None);
        assert_eq!(Element::new("script").end(), &EndTag::Generated);
    }

    #[test]
    fn deep_trees_are_searched_in_linear_time() {
        let depth = 100_000;
        let mut root = Element::new("div").with_attr("id", "leaf");
        for _ in 0..depth {
            let mut parent = Element::new("div");
            parent.children.push(Node::Element(root));
            root = parent;
        }
        let mut html = Element::new("html");
        html.children.push(Node::Element(Element::new("head")));
        html.children.push(Node::Element(root));
        let doc = Document {
            children: vec![Node::Element(html)],
        };

        assert_eq!(doc.find_first(|e| e.name() == "head"), Some(vec![0, 0]));
        assert_eq!(doc.count(|e| e.name() == "div"), depth + 1);
        let leaf = doc.find_all(|e| e.attr_eq("id", "leaf"));
        assert_eq!(leaf.len(), 1);
        assert_eq!(leaf[0].len(), depth + 2);
    }

    #[test]
    fn deep_trees_drop_without_overflow() {
        let mut root = Element::new("div");
        for _ in 0..200_000 {
            let mut parent = Element::new("div");
            parent.children.push(Node::Element(root));
            root = parent;
        }
        drop(Document {
            children: vec![Node::Element(root)],
        });
    }
}
