//! `<head>` injection: place the generated stylesheet in front of the report.
//!
//! The engine applies styles in document order, so injecting right after the
//! opening `<head>` lets the template's own stylesheets still override the
//! paper rules when they need to.

use tracing::debug;

const HEAD_MARKER: &[u8] = b"<head>";

/// Insert `<style>` + `css` (joined by newlines) + `</style>` right after the
/// first literal `<head>`.
///
/// Documents without a bare `<head>` tag are returned unchanged.
pub fn inject_css<S: AsRef<str>>(doc: &[u8], css: &[S]) -> Vec<u8> {
    let Some(pos) = find(doc, HEAD_MARKER) else {
        debug!("No <head> in document; stylesheet not injected");
        return doc.to_vec();
    };
    let split = pos + HEAD_MARKER.len();

    let joined = css.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("\n");
    let mut out = Vec::with_capacity(doc.len() + joined.len() + 15);
    out.extend_from_slice(&doc[..split]);
    out.extend_from_slice(b"<style>");
    out.extend_from_slice(joined.as_bytes());
    out.extend_from_slice(b"</style>");
    out.extend_from_slice(&doc[split..]);
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
