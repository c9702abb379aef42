//! Highlight driver: runs the engine over eligible code blocks and retries
//! with a linearly growing delay while unhighlighted blocks remain.
//!
//! A block is eligible when it carries a `language-` class and no processed
//! marker. Blocks whose language is not yet in the registry stay unprocessed
//! and drive the retry loop; once the bound is reached every remaining block
//! is marked processed unconditionally so the pipeline always makes forward
//! progress. Engine errors are logged and leave the block for the next cycle.

use crate::blocks::{
    CODE_BLOCK_RE, PROCESSED_CLASS, add_class, block_language, has_class, literal_text,
};
use crate::language::{self, LanguageService, PLAIN_TEXT};
use crate::{CSS_PREFIX, RenderError, enhance};
use postpress_common::RetryPolicy;
use regex::Captures;
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;
use tokio_util::sync::CancellationToken;

/// What a bounded highlight run produced.
pub struct HighlightReport {
    /// Enhanced HTML (the driver hands off to enhancement when it settles).
    pub html: String,
    /// Blocks marked processed unconditionally after the retry bound.
    pub forced_blocks: usize,
    /// The run was cancelled by pipeline teardown before settling.
    pub cancelled: bool,
}

pub struct HighlightDriver {
    languages: LanguageService,
    cancel: CancellationToken,
}

impl HighlightDriver {
    pub fn new(languages: LanguageService, cancel: CancellationToken) -> Self {
        Self { languages, cancel }
    }

    /// Run highlight passes until no eligible block remains, retrying at most
    /// `policy.max_attempts` times, then trigger enhancement.
    #[tracing::instrument(skip(self, html))]
    pub async fn run_with_retry(&self, html: String, policy: RetryPolicy) -> HighlightReport {
        let mut current = html;
        let mut attempt = 0u32;
        let mut forced_blocks = 0;
        let mut cancelled = false;

        loop {
            let registry = self.languages.registry();
            let (next, remaining) = pass(&registry, &current);
            current = next;
            if remaining == 0 {
                break;
            }
            if attempt >= policy.max_attempts {
                tracing::warn!(
                    remaining,
                    "retry bound reached, marking remaining blocks processed"
                );
                current = mark_all_processed(&current);
                forced_blocks = remaining;
                break;
            }
            let delay = policy.delay(attempt);
            tracing::debug!(attempt, remaining, ?delay, "unhighlighted blocks remain");
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }

        if !cancelled {
            current = enhance::enhance_all(&current);
        }
        HighlightReport {
            html: current,
            forced_blocks,
            cancelled,
        }
    }
}

/// One highlight pass. Returns the rewritten HTML and the number of eligible
/// blocks still lacking the processed marker.
fn pass(registry: &SyntaxSet, html: &str) -> (String, usize) {
    let mut remaining = 0;
    let rewritten = CODE_BLOCK_RE.replace_all(html, |caps: &Captures| {
        let (pre_attrs, code_attrs, body) = (&caps[1], &caps[2], &caps[3]);
        if has_class(pre_attrs, PROCESSED_CLASS) {
            return caps[0].to_owned();
        }
        let Some(token) = block_language(pre_attrs, code_attrs) else {
            // No language class: not eligible, never retried.
            return caps[0].to_owned();
        };

        let canonical = language::canonical(&token);
        if canonical.as_deref() == Some(PLAIN_TEXT) {
            // Plain text has no grammar; the escaped body is already final.
            let marked = add_class(pre_attrs, PROCESSED_CLASS);
            return format!("<pre{marked}><code{code_attrs}>{body}</code></pre>");
        }

        let syntax = registry
            .find_syntax_by_token(&token)
            .or_else(|| canonical.as_deref().and_then(|c| registry.find_syntax_by_token(c)));
        let Some(syntax) = syntax else {
            remaining += 1;
            return caps[0].to_owned();
        };

        match highlight_block(registry, syntax, &literal_text(body)) {
            Ok(highlighted) => {
                let marked = add_class(pre_attrs, PROCESSED_CLASS);
                format!("<pre{marked}><code{code_attrs}>{highlighted}</code></pre>")
            }
            Err(error) => {
                tracing::warn!(language = %token, %error, "highlight pass failed for block");
                remaining += 1;
                caps[0].to_owned()
            }
        }
    });
    (rewritten.into_owned(), remaining)
}

fn highlight_block(
    registry: &SyntaxSet,
    syntax: &syntect::parsing::SyntaxReference,
    code: &str,
) -> Result<String, RenderError> {
    let mut generator = ClassedHTMLGenerator::new_with_class_style(
        syntax,
        registry,
        ClassStyle::SpacedPrefixed { prefix: CSS_PREFIX },
    );
    for line in LinesWithEndings::from(code) {
        generator.parse_html_for_line_which_includes_newline(line)?;
    }
    Ok(generator.finalize())
}

/// Unconditionally mark every eligible block processed. Used at the retry
/// bound: a block that can never highlight must not retry forever.
fn mark_all_processed(html: &str) -> String {
    CODE_BLOCK_RE
        .replace_all(html, |caps: &Captures| {
            let (pre_attrs, code_attrs, body) = (&caps[1], &caps[2], &caps[3]);
            if has_class(pre_attrs, PROCESSED_CLASS)
                || block_language(pre_attrs, code_attrs).is_none()
            {
                return caps[0].to_owned();
            }
            let marked = add_class(pre_attrs, PROCESSED_CLASS);
            format!("<pre{marked}><code{code_attrs}>{body}</code></pre>")
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use postpress_common::Config;
    use std::sync::Arc;

    struct NeverFetch;

    #[async_trait::async_trait]
    impl crate::language::DefinitionFetcher for NeverFetch {
        async fn fetch(&self, url: &str) -> Result<String, RenderError> {
            Err(RenderError::Clipboard(format!("no network in tests: {url}")))
        }
    }

    fn driver() -> HighlightDriver {
        let languages = LanguageService::new(Config::default(), Arc::new(NeverFetch));
        HighlightDriver::new(languages, CancellationToken::new())
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 1,
        }
    }

    #[tokio::test]
    async fn known_language_is_highlighted_and_marked() {
        let html = r#"<pre><code class="language-rust">fn main() {}</code></pre>"#;
        let report = driver().run_with_retry(html.to_owned(), fast_policy(3)).await;

        assert_eq!(report.forced_blocks, 0);
        assert!(!report.cancelled);
        assert!(report.html.contains(PROCESSED_CLASS), "{}", report.html);
        assert!(
            report.html.contains(&format!("{CSS_PREFIX}source")),
            "{}",
            report.html
        );
    }

    #[tokio::test]
    async fn plain_text_blocks_settle_on_first_pass() {
        let html = r#"<pre><code class="language-text">just words</code></pre>"#;
        let report = driver().run_with_retry(html.to_owned(), fast_policy(3)).await;

        assert_eq!(report.forced_blocks, 0);
        assert!(report.html.contains("just words"));
        assert!(report.html.contains(PROCESSED_CLASS));
        assert!(!report.html.contains(&format!("{CSS_PREFIX}source")));
    }

    #[tokio::test]
    async fn retry_bound_terminates_and_forces_markers() {
        // tsx is in the metadata table but not in the engine's default set,
        // and the test fetcher never delivers it.
        let html = r#"<pre><code class="language-tsx">let x = 1</code></pre>"#;
        let report = driver().run_with_retry(html.to_owned(), fast_policy(3)).await;

        assert!(!report.cancelled);
        assert_eq!(report.forced_blocks, 1);
        assert!(report.html.contains(PROCESSED_CLASS), "{}", report.html);
        // Forced blocks still get their toolbar from the enhancement pass.
        assert!(report.html.contains("code-toolbar"), "{}", report.html);
    }

    #[tokio::test]
    async fn blocks_without_language_class_are_left_alone() {
        let html = "<pre><code>plain block</code></pre>";
        let report = driver().run_with_retry(html.to_owned(), fast_policy(0)).await;

        assert_eq!(report.forced_blocks, 0);
        assert!(!report.html.contains(PROCESSED_CLASS));
        assert!(!report.html.contains("code-toolbar"));
    }

    #[tokio::test]
    async fn teardown_cancels_pending_retries() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let languages = LanguageService::new(Config::default(), Arc::new(NeverFetch));
        let driver = HighlightDriver::new(languages, cancel);

        let html = r#"<pre><code class="language-tsx">let x = 1</code></pre>"#;
        let policy = RetryPolicy {
            max_attempts: 100,
            base_delay_ms: 60_000,
        };
        let report = driver.run_with_retry(html.to_owned(), policy).await;

        assert!(report.cancelled);
        assert!(!report.html.contains("code-toolbar"));
    }
}
