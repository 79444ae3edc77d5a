//! Paper format → CSS `@page` rules.
//!
//! The engine knows nothing about the host's paper formats; it only reads
//! CSS. Every report therefore gets a small stylesheet injected into its
//! `<head>` that carries the page size, the four margins and the header
//! spacing. Reports can override some of these per template through
//! `data-report-*` attributes, collected in [`SpecificArgs`].

use crate::css::{header_fixups_css, standard_css};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute overriding the top margin (millimetres).
pub const ATTR_MARGIN_TOP: &str = "data-report-margin-top";
/// Attribute overriding the bottom margin (millimetres).
pub const ATTR_MARGIN_BOTTOM: &str = "data-report-margin-bottom";
/// Attribute overriding the header spacing (millimetres).
pub const ATTR_HEADER_SPACING: &str = "data-report-header-spacing";
/// Attribute requesting landscape orientation.
pub const ATTR_LANDSCAPE: &str = "data-report-landscape";

/// Format name meaning "use `page_width` × `page_height`".
pub const CUSTOM_FORMAT: &str = "custom";

/// A host paper format. All lengths are millimetres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperFormat {
    /// Named format (`A4`, `Letter`, …) or `custom`.
    pub format: Option<String>,
    pub page_width: Option<f64>,
    pub page_height: Option<f64>,
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
    pub margin_right: f64,
    /// Space between the header and the body.
    pub header_spacing: Option<f64>,
}

impl Default for PaperFormat {
    fn default() -> Self {
        Self::a4()
    }
}

impl PaperFormat {
    /// A4 with the host's default 10mm margins.
    pub fn a4() -> Self {
        Self::named("A4")
    }

    /// A named format with 10mm margins and no header spacing.
    pub fn named(format: impl Into<String>) -> Self {
        Self {
            format: Some(format.into()),
            page_width: None,
            page_height: None,
            margin_top: 10.0,
            margin_bottom: 10.0,
            margin_left: 10.0,
            margin_right: 10.0,
            header_spacing: None,
        }
    }

    /// A custom page size in millimetres.
    pub fn custom(width: f64, height: f64) -> Self {
        Self {
            format: Some(CUSTOM_FORMAT.to_string()),
            page_width: Some(width),
            page_height: Some(height),
            ..Self::named(CUSTOM_FORMAT)
        }
    }

    fn named_format(&self) -> Option<&str> {
        self.format
            .as_deref()
            .filter(|f| !f.is_empty() && *f != CUSTOM_FORMAT)
    }

    /// The CSS `size:` declaration, or an empty string when the format
    /// carries neither a name nor a complete custom size.
    pub fn size_declaration(&self, landscape: bool) -> String {
        if let Some(name) = self.named_format() {
            return if landscape {
                format!("size: {name} landscape;")
            } else {
                format!("size: {name};")
            };
        }
        match (self.page_width, self.page_height) {
            (Some(w), Some(h)) if w > 0.0 && h > 0.0 => {
                let (w, h) = if landscape { (h, w) } else { (w, h) };
                format!("size: {}mm {}mm;", fmt_mm(w), fmt_mm(h))
            }
            _ => String::new(),
        }
    }

    /// Build the stylesheet injected in front of the report.
    ///
    /// `landscape` wins over the template's `data-report-landscape`; the
    /// attribute is only consulted when the caller passes `None`.
    pub fn to_css(
        &self,
        specific: &SpecificArgs,
        landscape: Option<bool>,
        profile: CssProfile,
    ) -> String {
        let landscape = landscape.unwrap_or_else(|| specific.landscape());
        let size = self.size_declaration(landscape);
        let right = fmt_mm(self.margin_right);
        let left = fmt_mm(self.margin_left);

        match profile {
            CssProfile::Standard => {
                let top = specific
                    .get(ATTR_MARGIN_TOP)
                    .map(str::to_string)
                    .unwrap_or_else(|| fmt_mm(self.margin_top));
                let bottom = specific
                    .get(ATTR_MARGIN_BOTTOM)
                    .map(str::to_string)
                    .unwrap_or_else(|| fmt_mm(self.margin_bottom));
                let spacing = specific
                    .get(ATTR_HEADER_SPACING)
                    .map(str::to_string)
                    .unwrap_or_else(|| fmt_mm(self.header_spacing.unwrap_or(0.0)));
                standard_css(&size, &top, &right, &bottom, &left, &spacing)
            }
            CssProfile::HeaderFixups => header_fixups_css(&size, &right, &left),
        }
    }
}

/// Which stylesheet template to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CssProfile {
    /// `@page` size and margins plus the header spacing. (default)
    #[default]
    Standard,
    /// Tight 2mm vertical margins and rules that undo layout features the
    /// engine renders differently from a browser (flex header logos, page
    /// counters).
    HeaderFixups,
}

/// `data-report-*` attributes read from the report's root element.
///
/// Values are kept as the raw attribute strings: they are pasted verbatim
/// into the stylesheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificArgs(BTreeMap<String, String>);

impl SpecificArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// The trimmed value of `key`; empty values count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Whether the template asks for landscape output.
    pub fn landscape(&self) -> bool {
        matches!(self.get(ATTR_LANDSCAPE), Some("True" | "true" | "1"))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SpecificArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Millimetre values without a trailing `.0` (`10` not `10.0`).
fn fmt_mm(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}
