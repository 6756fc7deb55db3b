//! Icon sources and per-size rendering.
//!
//! SVG sources are re-emitted at each size by rewriting the root element's
//! dimensions. Raster sources are copied as-is; there is no pixel resampling.

use crate::error::IconError;
use camino::Utf8Path;
use fs_err as fs;
use pwaify_inject::{parse_document, to_html};

pub const DEFAULT_ICON_SIZES: [u32; 8] = [72, 96, 128, 144, 152, 192, 384, 512];

/// Size used for the `apple-touch-icon` link.
pub const APPLE_TOUCH_SIZE: u32 = 192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
    Svg,
}

impl ImageFormat {
    /// Identify a format from leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            return Some(Self::Png);
        }
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            return Some(Self::Webp);
        }
        let head = &bytes[..bytes.len().min(1024)];
        let text = String::from_utf8_lossy(head);
        let text = text.trim_start_matches('\u{feff}').trim_start();
        if (text.starts_with("<svg") || text.starts_with("<?xml") || text.starts_with("<!--"))
            && text.contains("<svg")
        {
            return Some(Self::Svg);
        }
        None
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
            Self::Svg => "svg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Svg => "image/svg+xml",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IconSource {
    format: ImageFormat,
    bytes: Vec<u8>,
    placeholder: bool,
}

impl IconSource {
    pub fn from_bytes(bytes: Vec<u8>, origin: &str) -> Result<Self, IconError> {
        let format = ImageFormat::sniff(&bytes).ok_or_else(|| IconError::InvalidFormat {
            origin: origin.to_string(),
        })?;
        Ok(Self {
            format,
            bytes,
            placeholder: false,
        })
    }

    pub fn load(path: &Utf8Path) -> Result<Self, IconError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(bytes, path.as_str())
    }

    /// A square SVG with the app's initial on a solid background.
    pub fn placeholder(app_name: &str, background: &str, foreground: &str) -> Self {
        let initial: String = app_name
            .trim()
            .chars()
            .find(|c| c.is_alphanumeric())
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_else(|| "A".to_string());
        let svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"512\" height=\"512\" viewBox=\"0 0 512 512\">\
             <rect width=\"512\" height=\"512\" rx=\"96\" fill=\"{bg}\"/>\
             <text x=\"256\" y=\"256\" dy=\".35em\" text-anchor=\"middle\" \
             font-family=\"sans-serif\" font-size=\"280\" fill=\"{fg}\">{initial}</text></svg>\n",
            bg = xml_escape(background),
            fg = xml_escape(foreground),
            initial = xml_escape(&initial),
        );
        Self {
            format: ImageFormat::Svg,
            bytes: svg.into_bytes(),
            placeholder: true,
        }
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn file_name(&self, size: u32) -> String {
        icon_file_name(size, self.format)
    }

    /// Bytes for an icon of `size` x `size` pixels.
    pub fn render(&self, size: u32) -> Result<Vec<u8>, IconError> {
        match self.format {
            ImageFormat::Svg => resize_svg(&self.bytes, size).map(String::into_bytes),
            _ => Ok(self.bytes.clone()),
        }
    }
}

pub fn icon_file_name(size: u32, format: ImageFormat) -> String {
    format!("icon-{size}x{size}.{}", format.extension())
}

fn resize_svg(bytes: &[u8], size: u32) -> Result<String, IconError> {
    let invalid = || IconError::InvalidFormat {
        origin: "svg source".to_string(),
    };
    let text = std::str::from_utf8(bytes).map_err(|_| invalid())?;
    let mut doc = parse_document(text).map_err(|_| invalid())?;
    let path = doc.find_first(|el| el.name() == "svg").ok_or_else(invalid)?;
    let svg = doc.element_mut(&path).ok_or_else(invalid)?;

    if !svg.has_attr("viewbox") {
        let dims = (
            svg.attr("width").and_then(parse_length),
            svg.attr("height").and_then(parse_length),
        );
        if let (Some(w), Some(h)) = dims {
            svg.set_attr("viewBox", &format!("0 0 {w} {h}"));
        }
    }
    let px = size.to_string();
    svg.set_attr("width", &px);
    svg.set_attr("height", &px);
    Ok(to_html(&doc))
}

fn parse_length(value: &str) -> Option<f64> {
    let number = value.trim().trim_end_matches("px");
    number.parse::<f64>().ok().filter(|n| *n > 0.0)
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
