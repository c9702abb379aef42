//! Legacy editor code-block normalization.
//!
//! Feed-sourced posts written with older rich-text editors carry two code
//! block shapes the rest of the pipeline cannot use directly:
//!
//! - a nested two-level `pre` structure, `<pre ...><pre ...><code>…`,
//!   produced by fence-style editors, and
//! - a widget built from per-line `div` elements
//!   (`<div class="code-block-widget"><div class="code-line">…`), where
//!   line markup is span-level only.
//!
//! Both are rewritten into one flat
//! `<pre class="cleaned-codemirror-block" data-lang="X"><code class="language-X">…</code></pre>`
//! per logical block. Non-breaking spaces in recovered text become regular
//! spaces, placeholder filler lines (`^x+$`) are discarded, and a block whose
//! filtered text is empty is removed rather than replaced. Input without
//! legacy structure comes back unchanged; that is the common case, not an
//! error. This operates on strings only, never on a rendered tree.

use crate::blocks::{attr_value, class_list, literal_text};
use crate::language;
use regex::{Captures, Regex};
use smol_str::SmolStr;
use std::sync::LazyLock;

/// Nested two-level pre with an inner `code` element.
static NESTED_PRE_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<pre([^>]*)>\s*<pre([^>]*)>\s*<code([^>]*)>(.*?)</code>\s*</pre>\s*</pre>")
        .expect("NESTED_PRE_CODE_RE: hardcoded regex is statically valid")
});

/// Nested two-level pre without an inner `code` element.
static NESTED_PRE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<pre([^>]*)>\s*<pre([^>]*)>(.*?)</pre>\s*</pre>")
        .expect("NESTED_PRE_RE: hardcoded regex is statically valid")
});

/// Rich-editor widget: an outer marker div holding per-line divs.
static WIDGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<div([^>]*class="[^"]*(?:code-block-widget|CodeMirror)[^"]*"[^>]*)>\s*((?:<div[^>]*>.*?</div>\s*)*)</div>"#,
    )
    .expect("WIDGET_RE: hardcoded regex is statically valid")
});

/// One per-line div inside a widget.
static WIDGET_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<div[^>]*>(.*?)</div>")
        .expect("WIDGET_LINE_RE: hardcoded regex is statically valid")
});

/// Rewrite every legacy code block in `html` into the canonical flat form.
pub fn normalize(html: &str) -> String {
    // Fast path for posts without legacy markup.
    if !html.contains("<pre") && !WIDGET_RE.is_match(html) {
        return html.to_owned();
    }

    let pass = NESTED_PRE_CODE_RE.replace_all(html, |caps: &Captures| {
        rebuild(&[&caps[1], &caps[2], &caps[3]], &caps[4])
    });
    let pass = NESTED_PRE_RE.replace_all(&pass, |caps: &Captures| {
        rebuild(&[&caps[1], &caps[2]], &caps[3])
    });
    let pass = WIDGET_RE.replace_all(&pass, |caps: &Captures| {
        let lines: Vec<String> = WIDGET_LINE_RE
            .captures_iter(&caps[2])
            .map(|line| literal_text(&line[1]))
            .collect();
        rebuild_from_text(&[&caps[1]], &lines.join("\n"))
    });
    pass.into_owned()
}

/// Canonical block from raw legacy body markup.
fn rebuild(attr_sets: &[&str], body: &str) -> String {
    rebuild_from_text(attr_sets, &literal_text(body))
}

/// Canonical block from already-recovered text. Returns the empty string
/// when nothing meaningful survives filtering, removing the block.
fn rebuild_from_text(attr_sets: &[&str], text: &str) -> String {
    let filtered = filter_lines(text);
    if filtered.trim().is_empty() {
        return String::new();
    }
    let lang = detect_language(attr_sets);
    let escaped = html_escape::encode_text(&filtered);
    match lang {
        Some(lang) => format!(
            "<pre class=\"cleaned-codemirror-block\" data-lang=\"{lang}\"><code class=\"language-{lang}\">{escaped}</code></pre>"
        ),
        None => {
            format!("<pre class=\"cleaned-codemirror-block\"><code>{escaped}</code></pre>")
        }
    }
}

/// Drop placeholder filler lines and trailing empty lines.
fn filter_lines(text: &str) -> String {
    let mut kept: Vec<&str> = text
        .lines()
        .filter(|line| {
            let line = line.trim_end_matches('\r');
            line.is_empty() || !line.bytes().all(|b| b == b'x')
        })
        .collect();
    while kept.last().is_some_and(|line| line.trim().is_empty()) {
        kept.pop();
    }
    kept.join("\n")
}

/// Language detection precedence: explicit attribute on the outer block, then
/// on the inner block, then a class token encoding a language, then a class
/// token carrying an editor mode/theme prefix, then nothing.
fn detect_language(attr_sets: &[&str]) -> Option<SmolStr> {
    for attrs in attr_sets {
        if let Some(lang) = explicit_attribute(attrs) {
            return Some(lang);
        }
    }
    for attrs in attr_sets {
        if let Some(lang) = language_class(attrs) {
            return Some(lang);
        }
    }
    for attrs in attr_sets {
        if let Some(lang) = editor_mode_class(attrs) {
            return Some(lang);
        }
    }
    None
}

fn explicit_attribute(attrs: &str) -> Option<SmolStr> {
    for name in ["lang", "data-lang", "data-language"] {
        if let Some(value) = attr_value(attrs, name)
            && !value.trim().is_empty()
        {
            return Some(SmolStr::new(value.trim()));
        }
    }
    None
}

fn language_class(attrs: &str) -> Option<SmolStr> {
    for token in class_list(attrs) {
        if let Some(rest) = token
            .strip_prefix("language-")
            .or_else(|| token.strip_prefix("lang-"))
            && !rest.is_empty()
        {
            return Some(SmolStr::new(rest));
        }
    }
    None
}

/// Editor mode/theme classes (`cm-s-python`, `mode-sql`, `hljs-rust`) only
/// count when the suffix is a known language token, so theme names like
/// `cm-s-monokai` don't masquerade as languages.
fn editor_mode_class(attrs: &str) -> Option<SmolStr> {
    for token in class_list(attrs) {
        for prefix in ["cm-s-", "mode-", "hljs-", "prism-"] {
            if let Some(rest) = token.strip_prefix(prefix)
                && language::descriptor(rest).is_some()
            {
                return Some(SmolStr::new(rest));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_fence_block_flattens_to_canonical_form() {
        let input = r#"<pre class="md-fences" lang="python"><pre class="cleaned-codemirror-block"><code>x = 1</code></pre></pre>"#;
        assert_eq!(
            normalize(input),
            r#"<pre class="cleaned-codemirror-block" data-lang="python"><code class="language-python">x = 1</code></pre>"#
        );
    }

    #[test]
    fn posts_without_legacy_blocks_are_unchanged() {
        let input = r#"<p>Hello</p><pre><code class="language-rust">fn main() {}</code></pre>"#;
        assert_eq!(normalize(input), input);
    }

    #[test]
    fn nbsp_becomes_space_and_filler_lines_are_dropped() {
        let input = "<pre lang=\"sql\"><pre><code>select\u{00A0}1\nxxxx\nfrom t</code></pre></pre>";
        let output = normalize(input);
        assert!(output.contains("select 1\nfrom t"), "{output}");
        assert!(!output.contains("xxxx"));
    }

    #[test]
    fn block_with_only_filler_is_removed_entirely() {
        let input = "<p>before</p><pre lang=\"go\"><pre><code>xxxx\nxx</code></pre></pre><p>after</p>";
        assert_eq!(normalize(input), "<p>before</p><p>after</p>");
    }

    #[test]
    fn each_legacy_block_yields_exactly_one_canonical_block() {
        let input = concat!(
            "<pre lang=\"rust\"><pre><code>a</code></pre></pre>",
            "<pre lang=\"sql\"><pre><code>b</code></pre></pre>",
        );
        let output = normalize(input);
        assert_eq!(output.matches("<pre class=\"cleaned-codemirror-block\"").count(), 2);
        assert_eq!(output.matches("language-rust").count(), 1);
        assert_eq!(output.matches("language-sql").count(), 1);
    }

    #[test]
    fn per_line_widget_is_flattened() {
        let input = concat!(
            "<div class=\"code-block-widget\" data-lang=\"python\">",
            "<div class=\"code-line\">def f():</div>",
            "<div class=\"code-line\">    return\u{00A0}1</div>",
            "<div class=\"code-line\">xxxxxx</div>",
            "</div>",
        );
        assert_eq!(
            normalize(input),
            "<pre class=\"cleaned-codemirror-block\" data-lang=\"python\"><code class=\"language-python\">def f():\n    return 1</code></pre>"
        );
    }

    #[test]
    fn widget_lines_keep_text_only() {
        let input = concat!(
            "<div class=\"CodeMirror\" lang=\"js\">",
            "<div class=\"code-line\"><span class=\"cm-kw\">let</span> x = 1;</div>",
            "</div>",
        );
        let output = normalize(input);
        assert!(output.contains("let x = 1;"), "{output}");
        assert!(!output.contains("cm-kw"));
    }

    #[test]
    fn inner_attribute_wins_when_outer_is_silent() {
        let input = r#"<pre class="md-fences"><pre data-lang="ruby"><code>puts 1</code></pre></pre>"#;
        let output = normalize(input);
        assert!(output.contains(r#"data-lang="ruby""#), "{output}");
        assert!(output.contains("language-ruby"));
    }

    #[test]
    fn language_class_beats_editor_mode_class() {
        let input = r#"<pre class="language-sql cm-s-python"><pre><code>select 1</code></pre></pre>"#;
        let output = normalize(input);
        assert!(output.contains("language-sql"), "{output}");
    }

    #[test]
    fn editor_mode_class_is_used_when_it_names_a_language() {
        let input = r#"<pre class="cm-s-python"><pre><code>x = 1</code></pre></pre>"#;
        assert!(normalize(input).contains("language-python"));
    }

    #[test]
    fn editor_theme_names_are_not_languages() {
        let input = r#"<pre class="cm-s-monokai"><pre><code>x = 1</code></pre></pre>"#;
        let output = normalize(input);
        assert!(!output.contains("language-"), "{output}");
        assert!(output.contains("<code>x = 1</code>"));
    }

    #[test]
    fn no_language_yields_bare_code_element() {
        let input = "<pre><pre><code>plain</code></pre></pre>";
        assert_eq!(
            normalize(input),
            "<pre class=\"cleaned-codemirror-block\"><code>plain</code></pre>"
        );
    }

    #[test]
    fn entities_survive_the_round_trip() {
        let input = "<pre lang=\"rust\"><pre><code>if a &lt; b { }</code></pre></pre>";
        let output = normalize(input);
        assert!(output.contains("if a &lt; b { }"), "{output}");
    }

    #[test]
    fn nested_block_without_code_element_is_recovered() {
        let input = "<pre lang=\"sql\"><pre>select 1</pre></pre>";
        let output = normalize(input);
        assert!(output.contains("language-sql"), "{output}");
        assert!(output.contains("select 1"));
    }
}
