// src/inject.rs
//! Splices the reload client into HTML documents.

use std::borrow::Cow;

const BODY_CLOSE: &[u8] = b"</body>";

/// Position of the last closing body tag, matched ASCII case-insensitively.
pub fn find_body_close(content: &[u8]) -> Option<usize> {
    content
        .windows(BODY_CLOSE.len())
        .rposition(|window| window.eq_ignore_ascii_case(BODY_CLOSE))
}

/// Inserts `script` immediately before the last closing body tag.
///
/// Content without a closing body tag is returned borrowed and unchanged.
pub fn inject_before_body_close<'a>(content: &'a [u8], script: &[u8]) -> Cow<'a, [u8]> {
    let Some(at) = find_body_close(content) else {
        return Cow::Borrowed(content);
    };
    let mut out = Vec::with_capacity(content.len() + script.len());
    out.extend_from_slice(&content[..at]);
    out.extend_from_slice(script);
    out.extend_from_slice(&content[at..]);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &[u8] = b"<script>x()</script>";

    #[test]
    fn inserts_before_closing_tag() {
        let out = inject_before_body_close(b"<body>Hi</body></html>", SCRIPT);
        assert_eq!(
            out.as_ref(),
            b"<body>Hi<script>x()</script></body></html>".as_slice()
        );
    }

    #[test]
    fn grows_by_exactly_the_script_length() {
        let page = b"<html><body><p>docs</p></body></html>";
        let out = inject_before_body_close(page, SCRIPT);
        assert_eq!(out.len(), page.len() + SCRIPT.len());
    }

    #[test]
    fn leaves_content_without_body_close_untouched() {
        let page = b"<html><p>fragment</p></html>";
        let out = inject_before_body_close(page, SCRIPT);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out.as_ref(), page.as_slice());
    }

    #[test]
    fn matches_uppercase_tag() {
        let out = inject_before_body_close(b"<BODY>Hi</BODY>", SCRIPT);
        assert_eq!(out.as_ref(), b"<BODY>Hi<script>x()</script></BODY>".as_slice());
    }

    #[test]
    fn targets_the_last_closing_tag() {
        let page = b"<body><pre>&lt;/body&gt; </body> in text</pre></body>";
        let at = find_body_close(page).unwrap();
        assert_eq!(&page[at..], b"</body>".as_slice());
    }

    #[test]
    fn handles_content_shorter_than_the_tag() {
        assert!(find_body_close(b"</bo").is_none());
        assert!(find_body_close(b"").is_none());
    }
}
