//! Copy control backing the toolbar's copy button.
//!
//! The host supplies both clipboard paths through traits so the control works
//! the same whether it is wired to a real system clipboard or a test double.
//! The async primary is tried first; on failure the synchronous fallback
//! writer takes over. The only overlap guard is the transient label itself:
//! the most recent write decides what the label shows and when it reverts.

use crate::RenderError;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

pub const IDLE_LABEL: &str = "Copy";
pub const SUCCESS_LABEL: &str = "Copied!";
pub const FAILURE_LABEL: &str = "Failed";

/// How long a success/failure label stays up before reverting.
pub const LABEL_RESET: Duration = Duration::from_secs(2);

/// Primary clipboard path.
#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), RenderError>;
}

/// Synchronous fallback writer, used when the primary path is unavailable
/// or rejects the write.
pub trait FallbackClipboard: Send + Sync {
    fn write_text(&self, text: &str) -> Result<(), RenderError>;
}

/// One copy button's worth of state. Cheap to clone; clones share the label.
#[derive(Clone)]
pub struct CopyControl {
    primary: Arc<dyn Clipboard>,
    fallback: Option<Arc<dyn FallbackClipboard>>,
    label: Arc<watch::Sender<&'static str>>,
    epoch: Arc<AtomicU64>,
}

impl CopyControl {
    pub fn new(
        primary: Arc<dyn Clipboard>,
        fallback: Option<Arc<dyn FallbackClipboard>>,
    ) -> Self {
        let (label, _) = watch::channel(IDLE_LABEL);
        Self {
            primary,
            fallback,
            label: Arc::new(label),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Write `text` to the clipboard, preferring the primary path. Returns
    /// whether the write landed; the label flashes the result either way.
    pub async fn copy(&self, text: &str) -> bool {
        let wrote = match self.primary.write_text(text).await {
            Ok(()) => true,
            Err(err) => {
                debug!(%err, "primary clipboard write failed, trying fallback");
                match &self.fallback {
                    Some(fallback) => match fallback.write_text(text) {
                        Ok(()) => true,
                        Err(err) => {
                            warn!(%err, "fallback clipboard write failed");
                            false
                        }
                    },
                    None => false,
                }
            }
        };
        self.flash(if wrote { SUCCESS_LABEL } else { FAILURE_LABEL });
        wrote
    }

    /// Current label text.
    pub fn label(&self) -> &'static str {
        *self.label.borrow()
    }

    /// Watch the label as it flips between idle and transient states.
    pub fn watch_label(&self) -> watch::Receiver<&'static str> {
        self.label.subscribe()
    }

    fn flash(&self, text: &'static str) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.label.send(text);
        let label = Arc::clone(&self.label);
        let guard = Arc::clone(&self.epoch);
        tokio::spawn(async move {
            tokio::time::sleep(LABEL_RESET).await;
            // A later write supersedes this revert.
            if guard.load(Ordering::SeqCst) == epoch {
                let _ = label.send(IDLE_LABEL);
            }
        });
    }
}
