//! Late-insertion handling.
//!
//! After the initial enhancement pass the pipeline hands out an
//! [`InsertionObserver`]. Collaborators that splice fragments into already
//! rendered content (embeds resolving, comments expanding) push each fragment
//! through [`InsertionObserver::on_subtree_added`] so freshly inserted code
//! blocks pick up the same toolbar as the original ones.
//!
//! Each observer is scoped to one activation generation. Once the pipeline
//! re-activates or tears down, stale handles turn into no-ops rather than
//! enhancing content they no longer own.

use crate::enhance;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

#[derive(Clone)]
pub struct InsertionObserver {
    generation: u64,
    current: Arc<AtomicU64>,
    connected: Arc<AtomicBool>,
}

impl InsertionObserver {
    pub(crate) fn new(generation: u64, current: Arc<AtomicU64>) -> Self {
        Self {
            generation,
            current,
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Enhance any unenhanced code blocks in a freshly inserted fragment.
    /// Returns the fragment unchanged when the handle is disconnected or
    /// belongs to a superseded activation.
    pub fn on_subtree_added(&self, fragment: &str) -> String {
        if !self.is_connected() {
            debug!(generation = self.generation, "ignoring insertion on inactive observer");
            return fragment.to_owned();
        }
        enhance::enhance_all(fragment)
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
            && self.current.load(Ordering::SeqCst) == self.generation
    }
}
