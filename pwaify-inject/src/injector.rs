//! Idempotent head injection.
//!
//! Each [`MarkerSlot`] maps to at most one element in the document. Existing
//! elements are found by sentinel first, then by legacy shape, and updated in
//! place; only when neither finds one is a new element appended to `<head>`.

use crate::error::InjectError;
use crate::node::{Document, Element, Node, NodePath};
use crate::parse::parse_document;
use crate::serialize::{element_to_html, to_html};
use crate::slots::{MarkerSlot, SENTINEL_ATTR};
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use tracing::debug;

/// Upper bound on the serialized `<head>` after injection.
pub const HEAD_BUDGET_BYTES: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotValue {
    pub slot: MarkerSlot,
    pub value: String,
}

impl SlotValue {
    pub fn new(slot: MarkerSlot, value: impl Into<String>) -> Self {
        Self {
            slot,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotAction {
    /// Marked element already carried the desired value.
    Unchanged,
    /// Marked element was updated in place.
    Updated,
    /// Unmarked legacy element was updated and marked.
    Adopted,
    /// No element existed; a new one was appended to the head.
    Inserted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionReport {
    pub actions: Vec<(MarkerSlot, SlotAction)>,
    pub duplicates_removed: usize,
    pub head_created: bool,
    pub head_bytes: usize,
}

impl InjectionReport {
    pub fn action(&self, slot: MarkerSlot) -> Option<SlotAction> {
        self.actions
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, a)| *a)
    }
}

#[derive(Debug, Clone)]
pub struct InjectedHtml {
    pub html: String,
    /// `false` when the output is byte-identical to the input.
    pub changed: bool,
    pub report: InjectionReport,
}

/// Ways of locating a slot's existing element, tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    Sentinel,
    Legacy,
}

const LOOKUP_ORDER: [Lookup; 2] = [Lookup::Sentinel, Lookup::Legacy];

impl Lookup {
    fn find(self, doc: &Document, slot: MarkerSlot) -> Option<NodePath> {
        match self {
            Lookup::Sentinel => doc.find_first(|el| slot.is_marked(el)),
            Lookup::Legacy => {
                doc.find_first(|el| !el.has_attr(SENTINEL_ATTR) && slot.matches_legacy(el))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarkerInjector {
    values: Vec<SlotValue>,
    head_budget: usize,
}

impl MarkerInjector {
    /// One value per slot; a later value for the same slot replaces an earlier one.
    pub fn new(values: impl IntoIterator<Item = SlotValue>) -> Self {
        let mut out: Vec<SlotValue> = Vec::new();
        for value in values {
            match out.iter_mut().find(|v| v.slot == value.slot) {
                Some(existing) => *existing = value,
                None => out.push(value),
            }
        }
        Self {
            values: out,
            head_budget: HEAD_BUDGET_BYTES,
        }
    }

    pub fn with_head_budget(mut self, bytes: usize) -> Self {
        self.head_budget = bytes;
        self
    }

    pub fn values(&self) -> &[SlotValue] {
        &self.values
    }

    /// Parse, inject and serialize. Nothing is written anywhere.
    pub fn inject_html(&self, source: &str) -> Result<InjectedHtml, InjectError> {
        let mut doc = parse_document(source)?;
        let report = self.inject(&mut doc)?;
        let html = to_html(&doc);
        let changed = html != source;
        Ok(InjectedHtml {
            html,
            changed,
            report,
        })
    }

    /// Inject into a parsed document.
    ///
    /// On error the document may be partly modified and should be discarded.
    pub fn inject(&self, doc: &mut Document) -> Result<InjectionReport, InjectError> {
        let mut report = InjectionReport {
            head_created: ensure_head(doc),
            ..InjectionReport::default()
        };

        for SlotValue { slot, value } in &self.values {
            let slot = *slot;
            let found = LOOKUP_ORDER
                .iter()
                .find_map(|lookup| lookup.find(doc, slot).map(|path| (*lookup, path)));

            let action = match found {
                Some((Lookup::Sentinel, path)) => {
                    report.duplicates_removed += collapse_duplicates(doc, slot, &path);
                    match doc.element_mut(&path).map(|el| slot.apply(el, value)) {
                        Some(true) => SlotAction::Updated,
                        _ => SlotAction::Unchanged,
                    }
                }
                Some((Lookup::Legacy, path)) => {
                    if let Some(el) = doc.element_mut(&path) {
                        slot.apply(el, value);
                    }
                    SlotAction::Adopted
                }
                None => {
                    let head = find_head(doc)
                        .and_then(|path| doc.element_mut(&path))
                        .ok_or(InjectError::MarkerCount { slot, count: 0 })?;
                    append_to_head(head, slot.build(value));
                    SlotAction::Inserted
                }
            };
            debug!(slot = %slot, ?action, "slot injected");
            report.actions.push((slot, action));
        }

        for SlotValue { slot, .. } in &self.values {
            let count = count_sentinels(doc, *slot);
            if count != 1 {
                return Err(InjectError::MarkerCount { slot: *slot, count });
            }
        }

        report.head_bytes = find_head(doc)
            .and_then(|path| doc.element(&path).map(element_to_html))
            .map(|html| html.len())
            .unwrap_or(0);
        if report.head_bytes > self.head_budget {
            return Err(InjectError::HeadBudgetExceeded {
                bytes: report.head_bytes,
                limit: self.head_budget,
            });
        }

        Ok(report)
    }
}

/// Number of elements carrying `slot`'s sentinel.
pub fn count_sentinels(doc: &Document, slot: MarkerSlot) -> usize {
    doc.count(|el| slot.is_marked(el))
}

/// Sentinel counts for every slot present in `doc`.
pub fn sentinel_counts(doc: &Document) -> BTreeMap<MarkerSlot, usize> {
    let mut counts = BTreeMap::new();
    doc.walk(|_, el| {
        if let Some(slot) = MarkerSlot::ALL.into_iter().find(|s| s.is_marked(el)) {
            *counts.entry(slot).or_insert(0) += 1;
        }
        ControlFlow::Continue(())
    });
    counts
}

/// Remove every marked element for `slot` other than the one at `keep`.
fn collapse_duplicates(doc: &mut Document, slot: MarkerSlot, keep: &[usize]) -> usize {
    let extra: Vec<NodePath> = doc
        .find_all(|el| slot.is_marked(el))
        .into_iter()
        .filter(|path| path.as_slice() != keep)
        .collect();
    // Reverse document order keeps earlier paths (including `keep`) valid.
    for path in extra.iter().rev() {
        doc.remove(path);
    }
    if !extra.is_empty() {
        debug!(slot = %slot, removed = extra.len(), "collapsed duplicate markers");
    }
    extra.len()
}

fn find_head(doc: &Document) -> Option<NodePath> {
    doc.find_first(|el| el.name() == "head")
}

/// Create `<head>` when the document has none. Returns `true` if one was created.
fn ensure_head(doc: &mut Document) -> bool {
    if find_head(doc).is_some() {
        return false;
    }
    let head = Node::Element(Element::new("head"));
    if let Some(html) = doc
        .find_first(|el| el.name() == "html")
        .and_then(|path| doc.element_mut(&path))
    {
        html.children.insert(0, head);
        return true;
    }
    let at = doc
        .children
        .iter()
        .position(|n| !matches!(n, Node::Doctype(_) | Node::Comment(_)) && !n.is_whitespace_text())
        .unwrap_or(doc.children.len());
    doc.children.insert(at, head);
    true
}

/// Append `el` as the last element of `head`, following its indentation.
fn append_to_head(head: &mut Element, el: Element) {
    let children = &mut head.children;
    let indent = children.first().and_then(|n| match n {
        Node::Text(t) if n.is_whitespace_text() => t.rfind('\n').map(|i| t[i..].to_string()),
        _ => None,
    });
    let trailing_ws = children.last().is_some_and(Node::is_whitespace_text);
    let mut at = if trailing_ws {
        children.len() - 1
    } else {
        children.len()
    };
    if let Some(indent) = indent
        && at > 0
    {
        children.insert(at, Node::Text(indent));
        at += 1;
    }
    children.insert(at, Node::Element(el));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::service_worker_snippet;

    fn injector() -> MarkerInjector {
        MarkerInjector::new([
            SlotValue::new(MarkerSlot::ManifestLink, "/manifest.json"),
            SlotValue::new(MarkerSlot::ThemeColor, "#000000"),
        ])
    }

    #[test]
    fn inserts_into_indented_head() {
        let src = "<html>\n  <head>\n    <title>x</title>\n  </head>\n</html>";
        let out = injector().inject_html(src).unwrap();
        assert_eq!(
            out.html,
            "<html>\n  <head>\n    <title>x</title>\n    \
             <link rel=\"manifest\" href=\"/manifest.json\" data-pwaify=\"manifest-link\">\n    \
             <meta name=\"theme-color\" content=\"#000000\" data-pwaify=\"theme-color\">\n  \
             </head>\n</html>"
        );
        assert!(out.changed);
    }

    #[test]
    fn second_pass_is_byte_identical() {
        let src = "<!doctype html><html><head><meta charset=utf-8></head><body></body></html>";
        let first = injector().inject_html(src).unwrap();
        let second = injector().inject_html(&first.html).unwrap();
        assert_eq!(second.html, first.html);
        assert!(!second.changed);
        assert_eq!(
            second.report.action(MarkerSlot::ManifestLink),
            Some(SlotAction::Unchanged)
        );
    }

    #[test]
    fn marked_element_with_new_value_is_updated() {
        let src = "<head><meta name=\"theme-color\" content=\"#111111\" data-pwaify=\"theme-color\"></head>";
        let out = MarkerInjector::new([SlotValue::new(MarkerSlot::ThemeColor, "#222222")])
            .inject_html(src)
            .unwrap();
        assert_eq!(
            out.report.action(MarkerSlot::ThemeColor),
            Some(SlotAction::Updated)
        );
        assert!(out.html.contains("content=\"#222222\""));
        assert!(!out.html.contains("#111111"));
    }

    #[test]
    fn deeply_nested_body_is_injected() {
        let depth = 20_000;
        let src = format!(
            "<html><head></head><body>{}{}</body></html>",
            "<div>".repeat(depth),
            "</div>".repeat(depth)
        );
        let out = injector().inject_html(&src).unwrap();
        assert!(out.changed);
        let doc = parse_document(&out.html).unwrap();
        assert_eq!(count_sentinels(&doc, MarkerSlot::ManifestLink), 1);
        assert_eq!(count_sentinels(&doc, MarkerSlot::ThemeColor), 1);
    }

    #[test]
    fn legacy_link_is_adopted_not_duplicated() {
        let src = "<head><link rel=\"manifest\" href=\"/old.json\"></head>";
        let out = injector().inject_html(src).unwrap();
        assert_eq!(
            out.report.action(MarkerSlot::ManifestLink),
            Some(SlotAction::Adopted)
        );
        let doc = parse_document(&out.html).unwrap();
        assert_eq!(doc.find_all(|e| e.attr_eq("rel", "manifest")).len(), 1);
        assert_eq!(count_sentinels(&doc, MarkerSlot::ManifestLink), 1);
        assert!(out.html.contains("href=\"/manifest.json\""));
    }

    #[test]
    fn duplicate_markers_collapse_to_first() {
        let src = "<head>\
            <meta name=\"theme-color\" content=\"#111111\" data-pwaify=\"theme-color\">\
            <meta name=\"theme-color\" content=\"#222222\" data-pwaify=\"theme-color\">\
            </head><body><meta data-pwaify=\"theme-color\"></body>";
        let out = MarkerInjector::new([SlotValue::new(MarkerSlot::ThemeColor, "#333333")])
            .inject_html(src)
            .unwrap();
        assert_eq!(out.report.duplicates_removed, 2);
        let doc = parse_document(&out.html).unwrap();
        assert_eq!(count_sentinels(&doc, MarkerSlot::ThemeColor), 1);
        assert!(out.html.contains("#333333"));
        assert!(!out.html.contains("#222222"));
    }

    #[test]
    fn missing_head_is_created_inside_html() {
        let out = injector()
            .inject_html("<!DOCTYPE html><html><body>hi</body></html>")
            .unwrap();
        assert!(out.report.head_created);
        assert!(out.html.starts_with("<!DOCTYPE html><html><head><link rel=\"manifest\""));
        assert!(out.html.contains("</head><body>hi</body>"));
    }

    #[test]
    fn fragment_without_html_gets_a_head_after_doctype() {
        let out = injector().inject_html("<!DOCTYPE html>\n<p>x</p>").unwrap();
        assert!(out.html.starts_with("<!DOCTYPE html>\n<head>"));
    }

    #[test]
    fn oversized_head_is_rejected() {
        let big = "x".repeat(HEAD_BUDGET_BYTES);
        let src = format!("<head><title>{big}</title></head>");
        let err = injector().inject_html(&src).unwrap_err();
        assert!(matches!(
            err,
            InjectError::HeadBudgetExceeded { limit: HEAD_BUDGET_BYTES, .. }
        ));
    }

    #[test]
    fn custom_budget_applies() {
        let err = injector()
            .with_head_budget(16)
            .inject_html("<head></head>")
            .unwrap_err();
        assert!(matches!(err, InjectError::HeadBudgetExceeded { limit: 16, .. }));
    }

    #[test]
    fn registration_script_is_updated_in_place() {
        let old = service_worker_snippet("/old-sw.js", "/");
        let src = format!("<head><script>{old}</script></head>");
        let new = service_worker_snippet("/sw.js", "/");
        let out = MarkerInjector::new([SlotValue::new(
            MarkerSlot::ServiceWorkerRegistration,
            new.clone(),
        )])
        .inject_html(&src)
        .unwrap();
        let doc = parse_document(&out.html).unwrap();
        let scripts = doc.find_all(|e| e.name() == "script");
        assert_eq!(scripts.len(), 1);
        assert_eq!(doc.element(&scripts[0]).unwrap().text(), new);
    }

    #[test]
    fn later_value_for_same_slot_wins() {
        let inj = MarkerInjector::new([
            SlotValue::new(MarkerSlot::ThemeColor, "#000000"),
            SlotValue::new(MarkerSlot::ThemeColor, "#ffffff"),
        ]);
        assert_eq!(inj.values().len(), 1);
        assert_eq!(inj.values()[0].value, "#ffffff");
    }

    #[test]
    fn sentinel_counts_cover_all_slots() {
        let doc = parse_document(
            "<link data-pwaify=manifest-link><meta data-pwaify=theme-color><meta data-pwaify=theme-color>",
        )
        .unwrap();
        let counts = sentinel_counts(&doc);
        assert_eq!(counts.get(&MarkerSlot::ManifestLink), Some(&1));
        assert_eq!(counts.get(&MarkerSlot::ThemeColor), Some(&2));
    }
}
