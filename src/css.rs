//! Stylesheet templates injected in front of every report.
//!
//! Keeping the templates here, away from the paper-format logic in
//! [`crate::paper`], means a tweak to the emitted CSS touches exactly one
//! place and tests can assert on it without a paper format at hand.

/// Rules appended by the [`crate::paper::CssProfile::HeaderFixups`] profile.
///
/// The engine lays out flex headers and the `.topage` page counter of the
/// host's standard layouts differently from a browser.
pub const HEADER_FIXUP_RULES: &str = r#"
        .header ul { margin-bottom: 0 !important; }

        .header .row { margin-bottom: 0 !important; }

        .header .d-flex {
            justify-content: flex-start !important;
        }
        .header img {
            margin-left: 0 !important;
            margin-right: auto !important;
            align-self: flex-start !important;
        }

        .page .topage {
            display: none !important;
        }

        .page::after {
            display: none;
        }

        .topage::after {
            display: none;
        }
"#;

/// Vertical page margin of the header-fixups profile, in millimetres.
pub const FIXUP_VERTICAL_MARGIN_MM: &str = "2";

/// `@page` block followed by the header spacing rule.
///
/// All lengths are raw millimetre values without unit.
pub fn standard_css(
    size: &str,
    top: &str,
    right: &str,
    bottom: &str,
    left: &str,
    header_spacing: &str,
) -> String {
    format!(
        "
        @page {{
            {size}
            margin: {top}mm {right}mm {bottom}mm {left}mm;
        }}
        .header {{ padding-bottom: {header_spacing}mm; }}
        "
    )
}

/// `@page` block with fixed 2mm vertical margins plus [`HEADER_FIXUP_RULES`].
pub fn header_fixups_css(size: &str, right: &str, left: &str) -> String {
    let m = FIXUP_VERTICAL_MARGIN_MM;
    format!(
        "
        @page {{
            {size}
            margin: {m}mm {right}mm {m}mm {left}mm;
        }}
{HEADER_FIXUP_RULES}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_css_layout() {
        let css = standard_css("size: A4;", "1", "2", "3", "4", "5");
        assert!(css.contains("@page {"));
        assert!(css.contains("size: A4;"));
        assert!(css.contains("margin: 1mm 2mm 3mm 4mm;"));
        assert!(css.contains(".header { padding-bottom: 5mm; }"));
    }

    #[test]
    fn empty_size_leaves_no_declaration() {
        let css = standard_css("", "1", "2", "3", "4", "0");
        assert!(!css.contains("size:"));
    }

    #[test]
    fn fixups_hide_page_counters() {
        let css = header_fixups_css("size: Letter;", "7", "7");
        assert!(css.contains("margin: 2mm 7mm 2mm 7mm;"));
        assert!(css.contains(".topage::after"));
        assert!(!css.contains("padding-bottom"));
    }
}
