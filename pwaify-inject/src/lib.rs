//! Idempotent `<head>` injection for PWA metadata.
//!
//! [`MarkerInjector`] owns a fixed set of [`MarkerSlot`]s. Every element it
//! writes carries a `data-pwaify` sentinel naming its slot, so re-running
//! injection updates elements in place instead of appending duplicates.

pub mod error;
pub mod injector;
pub mod node;
pub mod parse;
pub mod serialize;
pub mod slots;

pub use error::{InjectError, ParseError};
pub use injector::{
    HEAD_BUDGET_BYTES, InjectedHtml, InjectionReport, MarkerInjector, SlotAction, SlotValue,
    count_sentinels, sentinel_counts,
};
pub use node::{Document, Element, Node};
pub use parse::parse_document;
pub use serialize::to_html;
pub use slots::{MarkerSlot, SENTINEL_ATTR, service_worker_snippet};
