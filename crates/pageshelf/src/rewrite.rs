//! Absolute-to-relative asset rewriting for entry documents
//!
//! Pages are served below `/p/{tenant}/{slug}/`, never at the host root, so a
//! root-relative reference such as `src="/app.js"` would miss the page's own
//! files. Only the single-leading-slash form is touched; protocol-relative
//! (`//cdn.example`) and scheme-qualified URLs are left alone.

const ATTRIBUTES: [&str; 2] = ["href", "src"];

/// Rewrite `href="/x"` and `src="/x"` into `href="x"` and `src="x"`
pub fn relativize_asset_urls(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some((start, attr_len)) = next_attribute(rest) {
        let after_attr = start + attr_len;
        let candidate = &rest[after_attr..];

        out.push_str(&rest[..after_attr]);

        // attr_len already covers `href=` / `src=`
        let mut chars = candidate.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(quote @ ('"' | '\'')), Some('/'), Some(next))
                if next != '/' && next != quote =>
            {
                out.push(quote);
                rest = &candidate[2..];
            }
            _ => {
                rest = candidate;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Position and length of the next `href=` / `src=` occurrence
fn next_attribute(haystack: &str) -> Option<(usize, usize)> {
    ATTRIBUTES
        .iter()
        .filter_map(|attr| {
            let needle = format!("{attr}=");
            find_attribute(haystack, &needle).map(|pos| (pos, needle.len()))
        })
        .min_by_key(|(pos, _)| *pos)
}

/// Find `needle` where it starts an attribute name (not e.g. `data-src=`)
fn find_attribute(haystack: &str, needle: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(pos) = haystack[offset..].find(needle) {
        let absolute = offset + pos;
        let boundary = haystack[..absolute]
            .chars()
            .next_back()
            .is_none_or(|c| c.is_ascii_whitespace());
        if boundary {
            return Some(absolute);
        }
        offset = absolute + needle.len();
    }
    None
}
