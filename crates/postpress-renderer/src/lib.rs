//! postpress renderer
//!
//! Content pipeline for feed-sourced blog posts: normalizes legacy editor
//! code-block markup, sanitizes the HTML, resolves missing highlighter
//! language definitions over the network, highlights code blocks with a
//! bounded retry loop, wraps them with a language-label/copy toolbar, and
//! re-applies enhancement to late-inserted subtrees.
//!
//! The pipeline never fails its caller: every stage degrades (plain code,
//! missing toolbar) and reports the cause through [`PipelineOutcome`].

use miette::Diagnostic;
use smol_str::SmolStr;

mod blocks;
pub mod copy;
pub mod css;
pub mod enhance;
pub mod highlight;
pub mod language;
pub mod normalize;
pub mod observe;
pub mod pipeline;
pub mod sanitize;
pub mod theme;


pub use language::LanguageService;
pub use observe::InsertionObserver;
pub use pipeline::{Degradation, Pipeline, PipelineOutcome, Stage};
pub use theme::Theme;

/// CSS class prefix applied to highlighter token spans, shared with the
/// theme stylesheet generator.
pub const CSS_PREFIX: &str = "syntax-";

/// Errors produced inside pipeline stages. These never cross the pipeline
/// boundary; [`pipeline::Pipeline::activate`] absorbs them into
/// [`pipeline::Degradation`] entries.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum RenderError {
    /// Network fetch of a language definition failed.
    #[error("failed to fetch language definition from {url}")]
    #[diagnostic(code(postpress::language::fetch))]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A fetched definition did not parse as a syntax definition.
    #[error("invalid syntax definition for {language}")]
    #[diagnostic(code(postpress::language::definition))]
    Definition {
        language: SmolStr,
        #[source]
        source: syntect::parsing::ParseSyntaxError,
    },

    /// Highlighting engine error during a pass.
    #[error(transparent)]
    Highlight(#[from] syntect::Error),

    /// No highlighter theme with the given name.
    #[error("unknown theme {0:?}, expected \"light\" or \"dark\"")]
    #[diagnostic(code(postpress::theme::unknown))]
    ThemeUnavailable(String),

    /// No clipboard implementation could take the write.
    #[error("clipboard unavailable")]
    #[diagnostic(code(postpress::copy::unavailable))]
    ClipboardUnavailable,

    /// The clipboard implementation rejected the write.
    #[error("clipboard write failed: {0}")]
    #[diagnostic(code(postpress::copy::write))]
    Clipboard(String),
}
