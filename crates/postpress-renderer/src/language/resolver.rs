//! Runtime language service: alias resolution, transitive dependency loading,
//! and per-language network dedup.
//!
//! The service is intentionally shared across content activations (clone it,
//! it is an `Arc` handle): downloaded definitions and failure markers are a
//! process-wide cache, so navigating between posts never refetches a
//! language. A failed load is marked attempted and not retried within the
//! session.

use super::{PLAIN_TEXT, canonical, descriptor};
use crate::RenderError;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use postpress_common::Config;
use smol_str::SmolStr;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use syntect::parsing::{SyntaxDefinition, SyntaxSet};
use tokio::sync::watch;

/// Network seam for syntax definition downloads. Production uses
/// [`HttpFetcher`]; tests inject an in-memory store.
#[async_trait]
pub trait DefinitionFetcher: Send + Sync + 'static {
    async fn fetch(&self, url: &str) -> Result<String, RenderError>;
}

/// Fetches definitions from the configured CDN with a shared client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DefinitionFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, RenderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|source| RenderError::Fetch {
                url: url.to_owned(),
                source,
            })?;
        response.text().await.map_err(|source| RenderError::Fetch {
            url: url.to_owned(),
            source,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    /// Definition registered in the runtime registry.
    Loaded,
    /// Load failed; not retried this session.
    Attempted,
}

struct Inner {
    config: Config,
    fetcher: Arc<dyn DefinitionFetcher>,
    /// The highlighting engine's runtime registry. Pre-bundled grammars come
    /// from the base set; fetched definitions are added here.
    registry: RwLock<SyntaxSet>,
    states: DashMap<SmolStr, LoadState>,
    /// One entry per language load currently on the wire. Waiters share the
    /// leader's settlement instead of issuing a second fetch.
    inflight: DashMap<SmolStr, watch::Receiver<bool>>,
}

/// Cloneable handle to the shared language state.
#[derive(Clone)]
pub struct LanguageService {
    inner: Arc<Inner>,
}

impl LanguageService {
    /// Service backed by the engine's pre-bundled grammar set.
    pub fn new(config: Config, fetcher: Arc<dyn DefinitionFetcher>) -> Self {
        Self::with_base_registry(config, fetcher, SyntaxSet::load_defaults_newlines())
    }

    /// Service with an explicit base registry. Tests start from an empty set
    /// so every language goes through the fetch path.
    pub fn with_base_registry(
        config: Config,
        fetcher: Arc<dyn DefinitionFetcher>,
        registry: SyntaxSet,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                fetcher,
                registry: RwLock::new(registry),
                states: DashMap::new(),
                inflight: DashMap::new(),
            }),
        }
    }

    /// Configuration the service was built with.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Snapshot of the current registry for a highlight pass.
    pub fn registry(&self) -> SyntaxSet {
        self.inner
            .registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Whether the canonical language is available to the engine.
    pub fn is_registered(&self, name: &str) -> bool {
        if name == PLAIN_TEXT {
            return true;
        }
        if matches!(
            self.inner.states.get(name).map(|state| *state),
            Some(LoadState::Loaded)
        ) {
            return true;
        }
        self.inner
            .registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .find_syntax_by_token(name)
            .is_some()
    }

    /// Canonical languages whose load failed this session.
    pub fn failed(&self) -> Vec<SmolStr> {
        self.inner
            .states
            .iter()
            .filter(|entry| *entry.value() == LoadState::Attempted)
            .map(|entry| entry.key().clone())
            .collect()
    }

    fn is_settled(&self, name: &str) -> bool {
        self.inner.states.get(name).is_some() || self.is_registered(name)
    }

    /// Resolve an identifier or alias: when this returns, the language and
    /// its transitive dependencies are available to the engine, or their
    /// failures have been logged and marked. Never fails the caller.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, token: &str) {
        let Some(name) = canonical(token) else {
            tracing::warn!(token, "unknown language token, skipping");
            return;
        };
        self.resolve_canonical(name).await;
    }

    /// Resolve a batch, waiting for all to settle (no fail-fast).
    pub async fn resolve_many<I>(&self, tokens: I)
    where
        I: IntoIterator<Item = SmolStr>,
    {
        let handles: Vec<_> = tokens
            .into_iter()
            .map(|token| {
                let service = self.clone();
                tokio::spawn(async move { service.resolve(&token).await })
            })
            .collect();
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Recursive step over canonical names: direct dependencies first, in
    /// parallel with each other, each recursing into its own dependencies.
    fn resolve_canonical(&self, name: SmolStr) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        let service = self.clone();
        Box::pin(async move {
            if service.is_settled(&name) {
                return;
            }
            let deps = descriptor(&name).map(|found| found.deps).unwrap_or(&[]);
            if !deps.is_empty() {
                let handles: Vec<_> = deps
                    .iter()
                    .map(|dep| tokio::spawn(service.resolve_canonical(SmolStr::new(dep))))
                    .collect();
                for handle in handles {
                    let _ = handle.await;
                }
            }
            service.ensure_loaded(name).await;
        })
    }

    /// Load one canonical language, sharing the fetch with any concurrent
    /// request for the same name.
    async fn ensure_loaded(&self, name: SmolStr) {
        if self.is_settled(&name) {
            return;
        }

        enum Role {
            Leader(watch::Sender<bool>),
            Waiter(watch::Receiver<bool>),
        }

        let role = match self.inner.inflight.entry(name.clone()) {
            Entry::Occupied(entry) => Role::Waiter(entry.get().clone()),
            Entry::Vacant(slot) => {
                let (tx, rx) = watch::channel(false);
                slot.insert(rx);
                Role::Leader(tx)
            }
        };

        match role {
            Role::Waiter(mut rx) => {
                let _ = rx.wait_for(|settled| *settled).await;
            }
            Role::Leader(tx) => {
                match self.load_definition(&name).await {
                    Ok(()) => {
                        self.inner.states.insert(name.clone(), LoadState::Loaded);
                        tracing::debug!(language = %name, "language definition registered");
                    }
                    Err(error) => {
                        self.inner.states.insert(name.clone(), LoadState::Attempted);
                        tracing::warn!(language = %name, %error, "language load failed, degrading to plain text");
                    }
                }
                // Settle order matters: state first, then clear the in-flight
                // entry, then wake waiters.
                self.inner.inflight.remove(&name);
                let _ = tx.send(true);
            }
        }
    }

    async fn load_definition(&self, name: &SmolStr) -> Result<(), RenderError> {
        if self.is_registered(name) {
            return Ok(());
        }
        let url = self.inner.config.definition_url(name);
        tracing::debug!(language = %name, %url, "fetching language definition");
        let text = self.inner.fetcher.fetch(&url).await?;
        let definition = SyntaxDefinition::load_from_str(&text, true, Some(name)).map_err(
            |source| RenderError::Definition {
                language: name.clone(),
                source,
            },
        )?;

        let mut registry = self
            .inner
            .registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut builder = registry.clone().into_builder();
        builder.add(definition);
        *registry = builder.build();
        Ok(())
    }
}
