//! The fixed registry of injectable head elements.

use crate::node::Element;
use std::fmt;

/// Attribute carried by every generated element; its value is the slot name.
pub const SENTINEL_ATTR: &str = "data-pwaify";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarkerSlot {
    ManifestLink,
    ThemeColor,
    AppleTouchIcon,
    AppleWebAppCapable,
    MobileWebAppCapable,
    AppleWebAppTitle,
    ServiceWorkerRegistration,
}

/// Element shape behind a slot, and which part holds the slot's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// `<link rel=.. href=value>`
    Link { rel: &'static str },
    /// `<meta name=.. content=value>`
    Meta { name: &'static str },
    /// Inline `<script>value</script>`
    Script,
}

impl MarkerSlot {
    pub const ALL: [MarkerSlot; 7] = [
        MarkerSlot::ManifestLink,
        MarkerSlot::ThemeColor,
        MarkerSlot::AppleTouchIcon,
        MarkerSlot::AppleWebAppCapable,
        MarkerSlot::MobileWebAppCapable,
        MarkerSlot::AppleWebAppTitle,
        MarkerSlot::ServiceWorkerRegistration,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MarkerSlot::ManifestLink => "manifest-link",
            MarkerSlot::ThemeColor => "theme-color",
            MarkerSlot::AppleTouchIcon => "apple-touch-icon",
            MarkerSlot::AppleWebAppCapable => "apple-mobile-web-app-capable",
            MarkerSlot::MobileWebAppCapable => "mobile-web-app-capable",
            MarkerSlot::AppleWebAppTitle => "apple-mobile-web-app-title",
            MarkerSlot::ServiceWorkerRegistration => "service-worker-registration",
        }
    }

    fn shape(self) -> Shape {
        match self {
            MarkerSlot::ManifestLink => Shape::Link { rel: "manifest" },
            MarkerSlot::AppleTouchIcon => Shape::Link {
                rel: "apple-touch-icon",
            },
            MarkerSlot::ThemeColor => Shape::Meta {
                name: "theme-color",
            },
            MarkerSlot::AppleWebAppCapable => Shape::Meta {
                name: "apple-mobile-web-app-capable",
            },
            MarkerSlot::MobileWebAppCapable => Shape::Meta {
                name: "mobile-web-app-capable",
            },
            MarkerSlot::AppleWebAppTitle => Shape::Meta {
                name: "apple-mobile-web-app-title",
            },
            MarkerSlot::ServiceWorkerRegistration => Shape::Script,
        }
    }

    /// Does `el` carry this slot's sentinel?
    pub fn is_marked(self, el: &Element) -> bool {
        el.attr(SENTINEL_ATTR)
            .map(|v| v.trim() == self.as_str())
            .unwrap_or(false)
    }

    /// Pre-sentinel recognition: the semantic attributes alone.
    pub fn matches_legacy(self, el: &Element) -> bool {
        match self.shape() {
            Shape::Link { rel } => {
                el.name() == "link"
                    && el
                        .attr("rel")
                        .map(|v| v.split_whitespace().any(|t| t.eq_ignore_ascii_case(rel)))
                        .unwrap_or(false)
            }
            Shape::Meta { name } => el.name() == "meta" && el.attr_eq("name", name),
            Shape::Script => {
                el.name() == "script" && !el.has_attr("src") && is_registration_snippet(&el.text())
            }
        }
    }

    /// A fresh element for this slot, sentinel included.
    pub fn build(self, value: &str) -> Element {
        let el = match self.shape() {
            Shape::Link { rel } => Element::new("link")
                .with_attr("rel", rel)
                .with_attr("href", value),
            Shape::Meta { name } => Element::new("meta")
                .with_attr("name", name)
                .with_attr("content", value),
            Shape::Script => Element::new("script").with_text(value),
        };
        el.with_attr(SENTINEL_ATTR, self.as_str())
    }

    /// Bring an existing element to the desired value; returns `true` on change.
    pub fn apply(self, el: &mut Element, value: &str) -> bool {
        let mut changed = false;
        match self.shape() {
            Shape::Link { rel } => {
                if !self.matches_legacy(el) {
                    changed |= el.set_attr("rel", rel);
                }
                changed |= el.set_attr("href", value);
            }
            Shape::Meta { name } => {
                if !el.attr_eq("name", name) {
                    changed |= el.set_attr("name", name);
                }
                changed |= el.set_attr("content", value);
            }
            Shape::Script => changed |= el.set_text(value),
        }
        if !self.is_marked(el) {
            changed |= el.set_attr(SENTINEL_ATTR, self.as_str());
        }
        changed
    }
}

impl fmt::Display for MarkerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SNIPPET_PREFIXES: [&str; 2] = [
    "if ('serviceWorker' in navigator)",
    "if (\"serviceWorker\" in navigator)",
];

/// Only snippets shaped like the generated one are adopted; hand-written
/// registration code is left alone.
fn is_registration_snippet(text: &str) -> bool {
    let trimmed = text.trim_start();
    SNIPPET_PREFIXES.iter().any(|p| trimmed.starts_with(p))
        && trimmed.contains("serviceWorker.register(")
}

/// Inline registration script for a service worker at `url`.
pub fn service_worker_snippet(url: &str, scope: &str) -> String {
    let url = url.replace('\'', "\\'");
    let scope = scope.replace('\'', "\\'");
    format!(
        "if ('serviceWorker' in navigator) {{ window.addEventListener('load', function () {{ \
         navigator.serviceWorker.register('{url}', {{ scope: '{scope}' }}); }}); }}"
    )
}
