use crate::node::{Document, Element, EndTag, Node};

enum Step<'a> {
    Enter(&'a Node),
    Leave(&'a Element),
}

/// Serialize a whole document.
pub fn to_html(doc: &Document) -> String {
    let mut out = String::new();
    write_nodes(&doc.children, &mut out);
    out
}

/// Serialize one element including its start and end tags.
pub fn element_to_html(el: &Element) -> String {
    let mut out = String::new();
    write_start_tag(el, &mut out);
    write_nodes(&el.children, &mut out);
    write_end_tag(el, &mut out);
    out
}

fn write_nodes(nodes: &[Node], out: &mut String) {
    let mut stack: Vec<Step<'_>> = nodes.iter().rev().map(Step::Enter).collect();

    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(Node::Text(text)) => out.push_str(text),
            Step::Enter(Node::Comment(body)) => {
                out.push_str("<!--");
                out.push_str(body);
                out.push_str("-->");
            }
            Step::Enter(Node::Doctype(raw)) => out.push_str(raw),
            Step::Enter(Node::Element(el)) => {
                write_start_tag(el, out);
                stack.push(Step::Leave(el));
                stack.extend(el.children.iter().rev().map(Step::Enter));
            }
            Step::Leave(el) => write_end_tag(el, out),
        }
    }
}

fn write_start_tag(el: &Element, out: &mut String) {
    if let Some(raw) = el.raw_start() {
        out.push_str(raw);
        return;
    }
    out.push('<');
    out.push_str(el.name());
    for attr in el.attrs() {
        out.push(' ');
        out.push_str(&attr.name);
        if let Some(value) = &attr.value {
            // Source values may carry a literal '"' from single-quoted input.
            let quote = if value.contains('"') { '\'' } else { '"' };
            out.push('=');
            out.push(quote);
            out.push_str(value);
            out.push(quote);
        }
    }
    out.push('>');
}

fn write_end_tag(el: &Element, out: &mut String) {
    match el.end() {
        EndTag::None | EndTag::Implied => {}
        EndTag::Explicit(raw) => out.push_str(raw),
        EndTag::Generated => {
            out.push_str("</");
            out.push_str(el.name());
            out.push('>');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_elements_use_double_quotes() {
        let el = Element::new("link")
            .with_attr("rel", "manifest")
            .with_attr("href", "/manifest.json");
        assert_eq!(
            element_to_html(&el),
            "<link rel=\"manifest\" href=\"/manifest.json\">"
        );
    }

    #[test]
    fn generated_script_gets_end_tag() {
        let el = Element::new("script").with_text("go()");
        assert_eq!(element_to_html(&el), "<script>go()</script>");
    }
}
