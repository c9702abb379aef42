//! Shared code-block scanning helpers.
//!
//! Code blocks are located the same way in every stage: a `pre` element
//! directly containing a `code` element. Language tags ride on the `class`
//! attribute as `language-X` tokens.

use regex::Regex;
use smol_str::SmolStr;
use std::sync::LazyLock;

/// Matches `<pre ...><code ...>body</code></pre>`. Whitespace between the
/// elements is tolerated; the body is matched lazily so sibling blocks do not
/// merge.
pub(crate) static CODE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<pre([^>]*)>\s*<code([^>]*)>(.*?)</code>\s*</pre>"#)
        .expect("CODE_BLOCK_RE: hardcoded regex is statically valid")
});

/// Matches one `language-X` class token.
pub(crate) static LANGUAGE_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"language-([A-Za-z0-9#+_-]+)"#)
        .expect("LANGUAGE_CLASS_RE: hardcoded regex is statically valid")
});

/// Marker class on a `pre` that has completed a highlight pass.
pub(crate) const PROCESSED_CLASS: &str = "code-processed";

/// Marker class on a `pre` that is wrapped by an enhancement toolbar.
pub(crate) const ENHANCED_CLASS: &str = "code-enhanced";

/// Extract the value of a named attribute from a raw attribute string. The
/// match must start at an attribute boundary so `lang` never reads from
/// `data-lang`.
pub(crate) fn attr_value<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!("{name}=\"");
    let mut search = 0;
    while let Some(found) = attrs[search..].find(&needle) {
        let at = search + found;
        let start = at + needle.len();
        let at_boundary = attrs[..at]
            .chars()
            .next_back()
            .is_none_or(|c| c.is_ascii_whitespace());
        if at_boundary {
            let rest = &attrs[start..];
            let end = rest.find('"')?;
            return Some(&rest[..end]);
        }
        search = start;
    }
    None
}

/// Class tokens of a raw attribute string.
pub(crate) fn class_list<'a>(attrs: &'a str) -> Vec<&'a str> {
    attr_value(attrs, "class")
        .map(|classes| classes.split_ascii_whitespace().collect())
        .unwrap_or_default()
}

pub(crate) fn has_class(attrs: &str, class: &str) -> bool {
    class_list(attrs).contains(&class)
}

/// Attribute string with `class` extended by `class_name` (added if absent,
/// left alone if present).
pub(crate) fn add_class(attrs: &str, class_name: &str) -> String {
    if has_class(attrs, class_name) {
        return attrs.to_owned();
    }
    match attr_value(attrs, "class") {
        Some(existing) => {
            let old = format!("class=\"{existing}\"");
            let new = if existing.is_empty() {
                format!("class=\"{class_name}\"")
            } else {
                format!("class=\"{existing} {class_name}\"")
            };
            attrs.replacen(&old, &new, 1)
        }
        None => format!("{attrs} class=\"{class_name}\""),
    }
}

/// Attribute string with `class_name` removed from the class list. An empty
/// class attribute left behind is dropped entirely.
pub(crate) fn remove_class(attrs: &str, class_name: &str) -> String {
    let Some(existing) = attr_value(attrs, "class") else {
        return attrs.to_owned();
    };
    let remaining: Vec<&str> = existing
        .split_ascii_whitespace()
        .filter(|token| *token != class_name)
        .collect();
    let old = format!("class=\"{existing}\"");
    if remaining.is_empty() {
        let stripped = attrs.replacen(&old, "", 1);
        let trimmed = stripped.trim_end();
        if trimmed.is_empty() {
            String::new()
        } else {
            trimmed.to_owned()
        }
    } else {
        attrs.replacen(&old, &format!("class=\"{}\"", remaining.join(" ")), 1)
    }
}

/// The `language-X` token of a block, looking at the `code` attributes first
/// and falling back to the `pre` attributes.
pub(crate) fn block_language(pre_attrs: &str, code_attrs: &str) -> Option<SmolStr> {
    for attrs in [code_attrs, pre_attrs] {
        if let Some(classes) = attr_value(attrs, "class")
            && let Some(caps) = LANGUAGE_CLASS_RE.captures(classes)
        {
            return Some(SmolStr::new(&caps[1]));
        }
    }
    None
}

/// Literal source text of a block body: highlighter spans stripped, entities
/// decoded, decorative non-breaking spaces replaced by regular spaces.
pub(crate) fn literal_text(body: &str) -> String {
    static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"<[^>]+>").expect("TAG_RE: hardcoded regex is statically valid")
    });
    let stripped = TAG_RE.replace_all(body, "");
    html_escape::decode_html_entities(stripped.as_ref())
        .replace('\u{00A0}', " ")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attr_value_reads_quoted_attributes() {
        let attrs = r#" class="md-fences" lang="python" data-lang="py""#;
        assert_eq!(attr_value(attrs, "class"), Some("md-fences"));
        assert_eq!(attr_value(attrs, "lang"), Some("python"));
        assert_eq!(attr_value(attrs, "data-lang"), Some("py"));
        assert_eq!(attr_value(attrs, "id"), None);
    }

    #[test]
    fn attr_value_does_not_read_lang_out_of_data_lang() {
        let attrs = r#" data-lang="py""#;
        assert_eq!(attr_value(attrs, "lang"), None);
        assert_eq!(attr_value(attrs, "data-lang"), Some("py"));
    }

    #[test]
    fn add_class_is_idempotent() {
        let attrs = r#" class="a b""#;
        let once = add_class(attrs, "c");
        assert_eq!(once, r#" class="a b c""#);
        assert_eq!(add_class(&once, "c"), once);
    }

    #[test]
    fn add_class_creates_attribute_when_missing() {
        assert_eq!(add_class("", "marker"), r#" class="marker""#);
    }

    #[test]
    fn remove_class_round_trips() {
        let attrs = r#" class="language-rust""#;
        let marked = add_class(attrs, PROCESSED_CLASS);
        assert_eq!(remove_class(&marked, PROCESSED_CLASS), attrs);
    }

    #[test]
    fn remove_class_drops_empty_attribute() {
        assert_eq!(remove_class(r#" class="only""#, "only"), "");
    }

    #[test]
    fn block_language_prefers_code_attrs() {
        let lang = block_language(r#" class="language-sql""#, r#" class="language-python""#);
        assert_eq!(lang.as_deref(), Some("python"));
    }

    #[test]
    fn literal_text_strips_markup_and_nbsp() {
        let body = "<span class=\"syntax-keyword\">let</span>\u{00A0}x = &lt;5&gt;;";
        assert_eq!(literal_text(body), "let x = <5>;");
    }
}
