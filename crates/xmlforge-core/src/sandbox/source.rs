//! Locating the program inside generator output.

const FENCE: &str = "```";

/// Body of the first ```` ```xform ```` fence, else of the first fence of any
/// kind, else the whole text. Always trimmed.
pub fn extract_source(text: &str) -> &str {
    fenced(text, |info| info.eq_ignore_ascii_case("xform"))
        .or_else(|| fenced(text, |_| true))
        .unwrap_or(text)
        .trim()
}

fn fenced(text: &str, wanted: impl Fn(&str) -> bool) -> Option<&str> {
    let mut rest = text;
    while let Some(start) = rest.find(FENCE) {
        let after = &rest[start + FENCE.len()..];
        let line_end = after.find('\n').unwrap_or(after.len());
        if let Some(close) = after[..line_end].find(FENCE) {
            // Inline span such as ```x```, not a block.
            rest = &after[close + FENCE.len()..];
            continue;
        }
        let Some(body) = after.get(line_end + 1..) else {
            return None;
        };
        let info = after[..line_end].trim();
        let body_end = body.find(FENCE).unwrap_or(body.len());
        if wanted(info) {
            return Some(&body[..body_end]);
        }
        match body.get(body_end + FENCE.len()..) {
            Some(next) => rest = next,
            None => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_trimmed() {
        assert_eq!(extract_source("\n  fn transform_xml(i) { return i; }\n"), "fn transform_xml(i) { return i; }");
    }

    #[test]
    fn test_tagged_fence_wins() {
        let text = "Here:\n```text\nnot this\n```\nand\n```xform\nfn a() {}\n```\n";
        assert_eq!(extract_source(text), "fn a() {}");
    }

    #[test]
    fn test_generic_fence() {
        let text = "Explanation\n```\nfn b() {}\n```\ntrailing prose";
        assert_eq!(extract_source(text), "fn b() {}");

        let text = "```rust\nfn c() {}\n```";
        assert_eq!(extract_source(text), "fn c() {}");
    }

    #[test]
    fn test_unterminated_fence_takes_rest() {
        assert_eq!(extract_source("```xform\nfn d() {}\n"), "fn d() {}");
    }

    #[test]
    fn test_inline_fence_does_not_hide_later_block() {
        let text = "Use ```x``` for short code.\n```xform\nfn e() {}\n```\n";
        assert_eq!(extract_source(text), "fn e() {}");

        let text = "Inline ```y``` only, then\n```\nfn f() {}\n```";
        assert_eq!(extract_source(text), "fn f() {}");
    }

    #[test]
    fn test_fence_at_end_of_text() {
        assert_eq!(extract_source("fn g() {}\n```"), "fn g() {}\n```");
    }
}
