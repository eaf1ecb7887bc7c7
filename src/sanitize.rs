//! Best-effort HTML pre-filter.
//!
//! This is a lexical pass over the markup, not a parse. It strips the obvious
//! script vectors (`<script>` blocks, inline `on*=` handlers, `javascript:`
//! links) and nothing more. It is **not** a security boundary: `data:` URIs,
//! entity-encoded schemes, CSS-based exfiltration and handlers hidden in
//! unusual markup all pass through. Callers needing real guarantees must run
//! the content through a structural HTML sanitizer instead.

use once_cell::sync::Lazy;
use regex::Regex;

/// `<script …>…</script>` blocks, across lines.
static RE_SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap());

/// Opening or closing script tags left without a partner.
static RE_SCRIPT_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</?script\b[^>]*>?").unwrap());

/// Inline event handlers: `onclick="…"`, `onload='…'`, `onerror=x`.
static RE_EVENT_HANDLER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).unwrap()
});

static RE_JS_URI_DOUBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\b(href|src)\s*=\s*"\s*javascript:[^"]*""#).unwrap());

static RE_JS_URI_SINGLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(href|src)\s*=\s*'\s*javascript:[^']*'").unwrap());

static RE_JS_URI_BARE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(href|src)\s*=\s*javascript:[^\s>]*").unwrap());

/// Upper bound on sanitising passes for nested or split tags.
const MAX_PASSES: usize = 8;

/// Neutralises script-injection vectors in `html`, best-effort.
///
/// The whole chain repeats until the markup stops changing, since removing
/// a handler or a block can splice the surrounding text into a new tag.
/// Clean markup comes back unchanged, so the pass is idempotent on its own
/// output.
pub fn sanitize_html(html: &str) -> String {
    let mut current = html.to_string();
    for _ in 0..MAX_PASSES {
        let next = sanitize_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn sanitize_once(html: &str) -> String {
    let out = RE_SCRIPT_BLOCK.replace_all(html, "");
    let out = RE_SCRIPT_TAG.replace_all(&out, "");
    let out = RE_EVENT_HANDLER.replace_all(&out, "");
    let out = RE_JS_URI_DOUBLE.replace_all(&out, r##"${1}="#""##);
    let out = RE_JS_URI_SINGLE.replace_all(&out, "${1}='#'");
    RE_JS_URI_BARE.replace_all(&out, r##"${1}="#""##).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_script_block() {
        let out = sanitize_html("<script>alert(1)</script><p>hi</p>");
        assert!(!out.contains("<script"));
        assert!(out.contains("<p>hi</p>"));
    }

    #[test]
    fn test_removes_multiline_script() {
        let html = "<head><SCRIPT type=\"text/javascript\">\n  var x = 1;\n  steal(x);\n</script >\n</head><body>ok</body>";
        let out = sanitize_html(html);
        assert!(!out.to_lowercase().contains("script"));
        assert!(out.contains("<body>ok</body>"));
    }

    #[test]
    fn test_removes_split_script_tags() {
        let out = sanitize_html("<scr<script></script>ipt>alert(1)</script>");
        assert!(!out.to_lowercase().contains("<script"));
    }

    #[test]
    fn test_handler_removal_cannot_rebuild_script() {
        let input = r#"<scr onx="1"ipt>alert(1)</scr onx="1"ipt><p>hi</p>"#;
        let once = sanitize_html(input);
        assert!(!once.to_lowercase().contains("<script"));
        assert_eq!(once, "<p>hi</p>");
        assert_eq!(sanitize_html(&once), once);
    }

    #[test]
    fn test_removes_event_handlers() {
        let out = sanitize_html(r#"<img src="a.png" onerror="alert(1)"><div onclick='go()' onmouseover=x>t</div>"#);
        assert_eq!(out, r#"<img src="a.png"><div>t</div>"#);
    }

    #[test]
    fn test_neutralises_javascript_uri() {
        let out = sanitize_html(r#"<a href="javascript:evil()">x</a>"#);
        assert_eq!(out, r##"<a href="#">x</a>"##);

        let out = sanitize_html("<a HREF='JavaScript:evil()'>x</a><iframe src=javascript:void(0)></iframe>");
        assert!(!out.to_lowercase().contains("javascript:"));
    }

    #[test]
    fn test_clean_html_untouched() {
        let html = r#"<!DOCTYPE html><html><head><style>body { color: red; }</style></head>
<body><a href="https://example.com">link</a><img src="logo.png" alt="logo"></body></html>"#;
        assert_eq!(sanitize_html(html), html);
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "<p>plain</p>",
            "<script>alert(1)</script><p>hi</p>",
            r#"<a href="javascript:evil()" onclick="x()">x</a>"#,
            r#"<scr onx="1"ipt>alert(1)</scr onx="1"ipt>"#,
        ];
        for input in inputs {
            let once = sanitize_html(input);
            assert_eq!(sanitize_html(&once), once);
        }
    }

    #[test]
    fn test_data_uri_passes_through() {
        // Known gap: only javascript: schemes are handled.
        let html = r#"<a href="data:text/html,hello">x</a>"#;
        assert_eq!(sanitize_html(html), html);
    }
}
