//! Pipeline orchestrator.
//!
//! Drives one piece of post content through
//! `Cleaning → Resolving → Highlighting → Enhancing → Observing` and stays in
//! `Observing` until the next activation or teardown. Activation never fails:
//! every stage degrades in place (plain code, missing toolbar) and reports
//! what went wrong through [`PipelineOutcome`].

use crate::blocks::{CODE_BLOCK_RE, ENHANCED_CLASS, PROCESSED_CLASS, remove_class};
use crate::highlight::HighlightDriver;
use crate::language::{self, LanguageService};
use crate::observe::InsertionObserver;
use crate::{enhance, normalize, sanitize};
use crate::theme::Theme;
use postpress_common::RetryPolicy;
use regex::Captures;
use smol_str::SmolStr;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Cleaning,
    Resolving,
    Highlighting,
    Enhancing,
    Observing,
}

/// A stage that finished in a degraded way. Never fatal.
#[derive(Debug, Clone)]
pub struct Degradation {
    pub stage: Stage,
    pub detail: String,
}

/// What an activation produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Final enhanced HTML.
    pub html: String,
    /// Per-stage degradation notes, in the order they occurred.
    pub degradations: Vec<Degradation>,
    /// Languages referenced by this content whose definitions failed to load.
    pub failed_languages: Vec<SmolStr>,
}

pub struct Pipeline {
    languages: LanguageService,
    stage: Stage,
    theme: Theme,
    /// Bumped on every activation and teardown; stale observers compare
    /// against it and go inert.
    generation: Arc<AtomicU64>,
    observer: Option<InsertionObserver>,
    cancel: CancellationToken,
    activated_once: bool,
    last_input: Option<(String, Theme)>,
    last_outcome: Option<PipelineOutcome>,
}

impl Pipeline {
    pub fn new(languages: LanguageService) -> Self {
        Self {
            languages,
            stage: Stage::Idle,
            theme: Theme::default(),
            generation: Arc::new(AtomicU64::new(0)),
            observer: None,
            cancel: CancellationToken::new(),
            activated_once: false,
            last_input: None,
            last_outcome: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Handle for collaborators that splice fragments into live content.
    /// `None` until the first activation reaches `Observing`.
    pub fn observer(&self) -> Option<InsertionObserver> {
        self.observer.clone()
    }

    /// Run the full pipeline over `raw_html`. A repeat call with identical
    /// content and theme is a no-op returning the previous outcome; changing
    /// either re-enters `Cleaning` even when the other is unchanged.
    #[tracing::instrument(skip_all, fields(theme = %theme, bytes = raw_html.len()))]
    pub async fn activate(&mut self, raw_html: &str, theme: Theme) -> PipelineOutcome {
        if let Some((last_html, last_theme)) = &self.last_input
            && last_html == raw_html
            && *last_theme == theme
            && let Some(outcome) = &self.last_outcome
        {
            debug!("content and theme unchanged, staying in observing state");
            return outcome.clone();
        }

        self.teardown_current();
        self.theme = theme;
        let mut degradations = Vec::new();

        // Cleaning: drop prior wrappers and markers, then normalize the
        // legacy editor structures and sanitize the result.
        self.stage = Stage::Cleaning;
        let cleaned = clear_markers(&enhance::remove_all(raw_html));
        let cleaned = sanitize::sanitize(&normalize::normalize(&cleaned));

        // Resolving: best-effort batch load of every referenced language.
        self.stage = Stage::Resolving;
        let requested = language::languages_in(&cleaned);
        let wanted = dependency_closure(&requested);
        self.languages.resolve_many(requested).await;
        let failed_languages: Vec<SmolStr> = self
            .languages
            .failed()
            .into_iter()
            .filter(|name| wanted.contains(name))
            .collect();
        for name in &failed_languages {
            degradations.push(Degradation {
                stage: Stage::Resolving,
                detail: format!("definition for {name} failed to load"),
            });
        }

        // Highlighting, with the driver handing off to enhancement when the
        // document settles.
        self.stage = Stage::Highlighting;
        let policy = self.next_policy();
        let driver = HighlightDriver::new(self.languages.clone(), self.cancel.clone());
        let report = driver.run_with_retry(cleaned, policy).await;
        if report.forced_blocks > 0 {
            degradations.push(Degradation {
                stage: Stage::Highlighting,
                detail: format!(
                    "{} block(s) left unhighlighted after {} retries",
                    report.forced_blocks, policy.max_attempts
                ),
            });
        }
        if report.cancelled {
            degradations.push(Degradation {
                stage: Stage::Highlighting,
                detail: "highlighting cancelled by teardown".to_owned(),
            });
            self.stage = Stage::Idle;
            return PipelineOutcome {
                html: report.html,
                degradations,
                failed_languages,
            };
        }

        // Enhancement already ran inside the driver; this pass exists only to
        // pick up blocks a collaborator spliced in mid-flight. Idempotent.
        self.stage = Stage::Enhancing;
        let html = enhance::enhance_all(&report.html);

        self.stage = Stage::Observing;
        let generation = self.generation.load(Ordering::SeqCst);
        self.observer = Some(InsertionObserver::new(generation, Arc::clone(&self.generation)));

        let outcome = PipelineOutcome {
            html,
            degradations,
            failed_languages,
        };
        self.last_input = Some((raw_html.to_owned(), theme));
        self.last_outcome = Some(outcome.clone());
        outcome
    }

    /// Disconnect the observer and cancel pending retry sleeps. In-flight
    /// language fetches are left to settle into the shared service registry.
    pub fn teardown(&mut self) {
        self.teardown_current();
        self.stage = Stage::Idle;
        self.last_input = None;
        self.last_outcome = None;
    }

    fn teardown_current(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        if let Some(observer) = self.observer.take() {
            observer.disconnect();
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn next_policy(&mut self) -> RetryPolicy {
        if self.activated_once {
            self.languages.config().content_retry
        } else {
            self.activated_once = true;
            self.languages.config().mount_retry
        }
    }
}

/// Strip processed/enhanced marker classes left on blocks from a previous
/// activation.
fn clear_markers(html: &str) -> String {
    CODE_BLOCK_RE
        .replace_all(html, |caps: &Captures| {
            let pre_attrs = remove_class(&remove_class(&caps[1], PROCESSED_CLASS), ENHANCED_CLASS);
            format!("<pre{pre_attrs}><code{}>{}</code></pre>", &caps[2], &caps[3])
        })
        .into_owned()
}

/// The requested languages plus every transitive dependency.
fn dependency_closure(requested: &BTreeSet<SmolStr>) -> BTreeSet<SmolStr> {
    let mut closure = BTreeSet::new();
    let mut stack: Vec<SmolStr> = requested.iter().cloned().collect();
    while let Some(token) = stack.pop() {
        let Some(descriptor) = language::descriptor(&token) else {
            continue;
        };
        if closure.insert(SmolStr::new(descriptor.name)) {
            stack.extend(descriptor.deps.iter().map(|dep| SmolStr::new(*dep)));
        }
    }
    closure
}
