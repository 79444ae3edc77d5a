//! Start/end tag scanner for report HTML.
//!
//! Only tags are reported, with byte spans into the source so callers can
//! slice or patch the original markup without re-serialising it. Comments,
//! doctype/processing instructions and the content of raw-text elements
//! (`script`, `style`, `textarea`, `title`) are skipped; attribute values are
//! read with their quotes, so a `>` or `</div>` inside a value or comment
//! never counts as markup.

use std::ops::Range;

/// Elements whose content is text up to the matching end tag.
const RAW_TEXT: [&str; 4] = ["script", "style", "textarea", "title"];

/// One attribute of a start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Attribute {
    /// Lowercased name.
    pub name: String,
    /// Raw value (entities are not decoded).
    pub value: String,
    /// Byte range of the value in the source; `None` for bare attributes.
    pub value_span: Option<Range<usize>>,
}

/// A start or end tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tag {
    /// Lowercased element name.
    pub name: String,
    pub closing: bool,
    pub attrs: Vec<Attribute>,
    /// Byte range from `<` to just past `>`.
    pub span: Range<usize>,
}

impl Tag {
    pub fn is_open(&self, name: &str) -> bool {
        !self.closing && self.name == name
    }

    pub fn is_close(&self, name: &str) -> bool {
        self.closing && self.name == name
    }

    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.name == name)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|a| a.value.split_whitespace().any(|c| c == class))
    }
}

/// Every tag of `text`, in document order.
pub(crate) fn scan_tags(text: &str) -> Vec<Tag> {
    let bytes = text.as_bytes();
    let mut tags = Vec::new();
    let mut pos = 0;

    while let Some(offset) = text[pos..].find('<') {
        let start = pos + offset;
        let rest = &text[start..];

        if let Some(comment) = rest.strip_prefix("<!--") {
            pos = comment
                .find("-->")
                .map_or(text.len(), |i| start + 4 + i + 3);
            continue;
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            pos = rest.find('>').map_or(text.len(), |i| start + i + 1);
            continue;
        }

        let closing = rest.starts_with("</");
        let name_start = start + if closing { 2 } else { 1 };
        let name_len = bytes[name_start..]
            .iter()
            .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b':' | b'_'))
            .count();
        if name_len == 0 || !bytes[name_start].is_ascii_alphabetic() {
            // A stray '<' in text.
            pos = start + 1;
            continue;
        }

        let name = text[name_start..name_start + name_len].to_ascii_lowercase();
        let (attrs, end) = parse_attributes(text, name_start + name_len);
        pos = end;
        if !closing && RAW_TEXT.contains(&name.as_str()) {
            pos = raw_text_end(text, end, &name);
        }
        tags.push(Tag {
            name,
            closing,
            attrs,
            span: start..end,
        });
    }
    tags
}

/// Index of the tag closing the element opened at `tags[open]`, counting
/// nested elements of the same name.
pub(crate) fn closing_index(tags: &[Tag], open: usize) -> Option<usize> {
    let name = tags.get(open)?.name.as_str();
    let mut depth = 0usize;
    for (i, tag) in tags.iter().enumerate().skip(open) {
        if tag.name != name {
            continue;
        }
        if tag.closing {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(i);
            }
        } else {
            depth += 1;
        }
    }
    None
}

/// Start of the `</name` ending a raw-text element whose content begins at
/// `from`, or the end of input.
fn raw_text_end(text: &str, from: usize, name: &str) -> usize {
    let needle = format!("</{name}");
    text[from..]
        .to_ascii_lowercase()
        .find(&needle)
        .map_or(text.len(), |i| from + i)
}

/// Attributes from `from` up to the tag's `>`; returns them with the offset
/// just past `>`.
fn parse_attributes(text: &str, from: usize) -> (Vec<Attribute>, usize) {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let skip_ws = |mut i: usize| {
        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        i
    };

    let mut attrs = Vec::new();
    let mut i = from;
    loop {
        while i < len && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        if i >= len {
            return (attrs, len);
        }
        if bytes[i] == b'>' {
            return (attrs, i + 1);
        }

        let name_start = i;
        while i < len && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'=' | b'>' | b'/')
        {
            i += 1;
        }
        let name = text[name_start..i].to_ascii_lowercase();

        let mut value = String::new();
        let mut value_span = None;
        let after_name = skip_ws(i);
        if after_name < len && bytes[after_name] == b'=' {
            i = skip_ws(after_name + 1);
            if i < len && matches!(bytes[i], b'"' | b'\'') {
                let quote = bytes[i];
                let value_start = i + 1;
                let value_end = bytes[value_start..]
                    .iter()
                    .position(|b| *b == quote)
                    .map_or(len, |p| value_start + p);
                value = text[value_start..value_end].to_string();
                value_span = Some(value_start..value_end);
                i = (value_end + 1).min(len);
            } else {
                let value_start = i;
                while i < len && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                    i += 1;
                }
                value = text[value_start..i].to_string();
                value_span = Some(value_start..i);
            }
        }

        if !name.is_empty() {
            attrs.push(Attribute {
                name,
                value,
                value_span,
            });
        }
    }
}
