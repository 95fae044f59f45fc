//! Display label normalization
//!
//! The marker store keeps labels HTML-escaped; commands carry them as typed.
//! Both sides go through [`normalize`] before comparison.

/// Decode the HTML entities the marker store writes into labels
///
/// Handles `&amp; &lt; &gt; &quot; &#39; &apos;` plus decimal (`&#233;`) and
/// hex (`&#xE9;`) character references in a single pass. Anything that does
/// not decode to a valid `char` is left verbatim.
///
/// Decoded text is never rescanned, so `&amp;lt;` becomes `&lt;`. Chained
/// per-entity replacement would turn it into `<` instead.
#[must_use]
pub fn unescape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];
        match candidate.find(';').and_then(|semi| {
            decode_entity(&candidate[1..semi]).map(|c| (c, semi))
        }) {
            Some((decoded, semi)) => {
                out.push(decoded);
                rest = &candidate[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(body: &str) -> Option<char> {
    match body {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let numeric = body.strip_prefix('#')?;
            let code = match numeric.strip_prefix(['x', 'X']) {
                Some(hex) if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) => {
                    u32::from_str_radix(hex, 16).ok()?
                }
                Some(_) => return None,
                None if !numeric.is_empty() && numeric.chars().all(|c| c.is_ascii_digit()) => {
                    numeric.parse().ok()?
                }
                None => return None,
            };
            char::from_u32(code)
        }
    }
}

/// Unescape and trim a label for comparison
#[inline]
#[must_use]
pub fn normalize(label: &str) -> String {
    unescape_html(label).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_entities() {
        assert_eq!(unescape_html("Fish &amp; Chips"), "Fish & Chips");
        assert_eq!(unescape_html("&lt;b&gt;"), "<b>");
        assert_eq!(unescape_html("&quot;hi&quot; &#39;x&apos;"), "\"hi\" 'x'");
    }

    #[test]
    fn numeric_entities() {
        assert_eq!(unescape_html("Caf&#233;"), "Café");
        assert_eq!(unescape_html("Caf&#xE9;"), "Café");
    }

    #[test]
    fn single_pass_does_not_double_decode() {
        assert_eq!(unescape_html("&amp;lt;"), "&lt;");
    }

    #[test]
    fn malformed_entities_pass_through() {
        assert_eq!(unescape_html("AT&T"), "AT&T");
        assert_eq!(unescape_html("&bogus; & &#xZZ; &#;"), "&bogus; & &#xZZ; &#;");
        assert_eq!(unescape_html("&#1114112;"), "&#1114112;");
    }

    #[test]
    fn normalize_trims() {
        assert_eq!(normalize("  Home &amp; Hearth \t"), "Home & Hearth");
    }
}
