//! Default collaborators for the pwaify pipeline.
//!
//! This crate owns *what* gets generated: framework detection, manifest
//! contents, service worker rules and icon bytes. It does not write to disk;
//! that goes through the transaction log in `pwaify-core`.

mod error;
mod icons;
mod layout;
mod manifest;
mod ports;
mod scanner;
mod service_worker;

pub use error::{IconError, ManifestError, ScanError};
pub use icons::{
    APPLE_TOUCH_SIZE, DEFAULT_ICON_SIZES, IconSource, ImageFormat, icon_file_name,
};
pub use layout::OutputLayout;
pub use manifest::{
    BuiltManifest, ManifestOptions, SHORT_NAME_MAX_CHARS, build_manifest, is_hex_color,
    render_manifest,
};
pub use ports::{FsProjectView, ProjectView};
pub use scanner::{architecture_for, scan_project};
pub use service_worker::{
    Handler, RuntimeRule, ServiceWorkerOptions, cache_version, render_service_worker,
    runtime_rules,
};
