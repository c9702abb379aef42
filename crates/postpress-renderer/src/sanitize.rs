//! HTML sanitization stage.
//!
//! Feed-sourced markup is untrusted; it is cleaned after normalization and
//! before any language extraction or DOM-producing stage. The builder extends
//! ammonia's defaults just enough for the pipeline's own markers to survive:
//! class lists on `pre`/`code`/`div`/`span` and the `data-lang` attribute the
//! normalizer emits.

use std::sync::LazyLock;

fn build_post_sanitizer() -> ammonia::Builder<'static> {
    let mut builder = ammonia::Builder::default();
    builder
        .add_tag_attributes("pre", &["class", "data-lang"])
        .add_tag_attributes("code", &["class"])
        .add_tag_attributes("div", &["class"])
        .add_tag_attributes("span", &["class"]);
    builder
}

static POST_SANITIZER: LazyLock<ammonia::Builder<'static>> = LazyLock::new(build_post_sanitizer);

/// Clean one post body. Unsafe markup is stripped, pipeline markers survive.
pub fn sanitize(html: &str) -> String {
    POST_SANITIZER.clean(html).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_are_stripped() {
        let cleaned = sanitize(r#"<p>hi</p><script>alert(1)</script>"#);
        assert!(!cleaned.contains("script"));
        assert!(cleaned.contains("<p>hi</p>"));
    }

    #[test]
    fn event_handlers_are_stripped() {
        let cleaned = sanitize(r#"<pre class="x" onclick="evil()"><code>a</code></pre>"#);
        assert!(!cleaned.contains("onclick"));
        assert!(cleaned.contains(r#"class="x""#));
    }

    #[test]
    fn pipeline_markers_survive() {
        let input = r#"<pre class="cleaned-codemirror-block" data-lang="python"><code class="language-python">x = 1</code></pre>"#;
        let cleaned = sanitize(input);
        assert!(cleaned.contains(r#"data-lang="python""#), "{cleaned}");
        assert!(cleaned.contains(r#"class="language-python""#));
    }
}
