//! Block enhancement: wraps each highlighted code block with a toolbar
//! holding a language label and a copy control.
//!
//! Wrapping is idempotent (an enhanced block is skipped on later passes) and
//! reversible ([`remove_all`] restores the original block placement with no
//! residual markers). Blocks with empty or whitespace-only text get no
//! toolbar; there is nothing useful to copy.

use crate::blocks::{
    CODE_BLOCK_RE, ENHANCED_CLASS, add_class, block_language, has_class, literal_text,
    remove_class,
};
use crate::language;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Matches a toolbar wrapper produced by [`enhance_all`], capturing the
/// wrapped block's attributes and body. The header holds no nested `div`, so
/// the lazy match cannot overrun it.
static TOOLBAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<div class="code-toolbar"[^>]*>\s*<div class="code-toolbar-header">.*?</div>\s*<pre([^>]*)>\s*<code([^>]*)>(.*?)</code>\s*</pre>\s*</div>"#,
    )
    .expect("TOOLBAR_RE: hardcoded regex is statically valid")
});

/// Wrap every eligible code block in `html` with an enhancement toolbar.
pub fn enhance_all(html: &str) -> String {
    CODE_BLOCK_RE
        .replace_all(html, |caps: &Captures| {
            let (pre_attrs, code_attrs, body) = (&caps[1], &caps[2], &caps[3]);
            if has_class(pre_attrs, ENHANCED_CLASS) {
                return caps[0].to_owned();
            }
            let Some(token) = block_language(pre_attrs, code_attrs) else {
                return caps[0].to_owned();
            };
            let text = literal_text(body);
            if text.trim().is_empty() {
                return caps[0].to_owned();
            }

            let label = language::display_name(&token);
            let copy_text = html_escape::encode_safe(&text);
            let marked = add_class(pre_attrs, ENHANCED_CLASS);
            format!(
                concat!(
                    "<div class=\"code-toolbar\" data-language=\"{token}\">",
                    "<div class=\"code-toolbar-header\">",
                    "<span class=\"code-language-label\">{label}</span>",
                    "<button type=\"button\" class=\"code-copy-button\" ",
                    "aria-label=\"Copy {token} code to clipboard\" ",
                    "data-copy-text=\"{copy_text}\">Copy</button>",
                    "</div>",
                    "<pre{pre_attrs}><code{code_attrs}>{body}</code></pre>",
                    "</div>",
                ),
                token = token,
                label = label,
                copy_text = copy_text,
                pre_attrs = marked,
                code_attrs = code_attrs,
                body = body,
            )
        })
        .into_owned()
}

/// Unwrap every toolbar, restoring blocks to their pre-enhancement form.
/// Used when content is about to be replaced.
pub fn remove_all(html: &str) -> String {
    TOOLBAR_RE
        .replace_all(html, |caps: &Captures| {
            let restored = remove_class(&caps[1], ENHANCED_CLASS);
            format!("<pre{restored}><code{}>{}</code></pre>", &caps[2], &caps[3])
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: &str = r#"<pre class="code-processed"><code class="language-python">print(1)</code></pre>"#;

    #[test]
    fn wraps_block_with_label_and_copy_button() {
        let enhanced = enhance_all(BLOCK);
        assert!(enhanced.contains(r#"<div class="code-toolbar" data-language="python">"#));
        assert!(enhanced.contains(r#"<span class="code-language-label">Python</span>"#));
        assert!(enhanced.contains(r#"data-copy-text="print(1)""#));
        assert!(enhanced.contains(r#"aria-label="Copy python code to clipboard""#));
        assert!(enhanced.contains(ENHANCED_CLASS));
    }

    #[test]
    fn enhancement_is_idempotent() {
        let once = enhance_all(BLOCK);
        let twice = enhance_all(&once);
        assert_eq!(once, twice);
        assert_eq!(twice.matches("code-toolbar-header").count(), 1);
    }

    #[test]
    fn enhance_then_remove_round_trips() {
        let page = format!("<p>intro</p>{BLOCK}<p>outro</p>");
        let enhanced = enhance_all(&page);
        assert_ne!(enhanced, page);
        let restored = remove_all(&enhanced);
        assert_eq!(restored, page);
    }

    #[test]
    fn empty_blocks_get_no_toolbar() {
        let html = r#"<pre><code class="language-js">   </code></pre>"#;
        assert_eq!(enhance_all(html), html);
    }

    #[test]
    fn blocks_without_language_are_skipped() {
        let html = "<pre><code>anonymous()</code></pre>";
        assert_eq!(enhance_all(html), html);
    }

    #[test]
    fn unknown_language_label_falls_back_to_uppercase() {
        let html = r#"<pre><code class="language-befunge">@</code></pre>"#;
        let enhanced = enhance_all(html);
        assert!(enhanced.contains(r#"<span class="code-language-label">BEFUNGE</span>"#));
    }

    #[test]
    fn copy_text_is_literal_code_not_markup() {
        let html = concat!(
            r#"<pre><code class="language-rust">"#,
            r#"<span class="syntax-keyword">let</span> x = &lt;5&gt;;"#,
            "</code></pre>",
        );
        let enhanced = enhance_all(html);
        assert!(
            enhanced.contains(r#"data-copy-text="let x = &lt;5&gt;;""#),
            "{enhanced}"
        );
    }

    #[test]
    fn multiple_blocks_each_get_one_toolbar() {
        let html = concat!(
            r#"<pre><code class="language-sql">select 1</code></pre>"#,
            r#"<pre><code class="language-go">package main</code></pre>"#,
        );
        let enhanced = enhance_all(html);
        assert_eq!(enhanced.matches("code-toolbar-header").count(), 2);
        assert!(enhanced.contains(r#"data-language="sql""#));
        assert!(enhanced.contains(r#"data-language="go""#));
    }
}
