//! Request-scoped batching loaders.
//!
//! Loader-marked field resolutions issued during one GraphQL execution are
//! coalesced into single batched remote calls: N same-key resolutions in the
//! same tick become one call instead of the naive N+1 pattern's N calls.
//!
//! Loaders live in a per-request map keyed by action + static-params + args
//! identity. They are created lazily on first use, may be shared by any
//! number of field resolutions within the request whose identity matches,
//! and die with the request context. They are never shared across requests.

mod batch;
mod key;

pub use batch::ActionLoader;
pub use key::{BatchKey, loader_key, stable_hash};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_graphql::dataloader::DataLoader;
use switchboard_broker::LoaderOptions;
use tokio::sync::Mutex;
use tracing::trace;

/// Per-action loader configuration, rebuilt from action declarations on
/// every schema regeneration.
pub type LoaderOptionMap = HashMap<String, LoaderOptions>;

/// The per-request cache of batching loaders.
///
/// Exclusively owned by one request context; access from concurrently
/// resolving sibling fields is serialized by the internal lock.
#[derive(Default)]
pub struct LoaderMap {
    inner: Mutex<HashMap<String, Arc<DataLoader<ActionLoader>>>>,
}

impl LoaderMap {
    /// Creates an empty loader map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the loader registered under `key`, creating it with `build`
    /// on first use.
    pub async fn get_or_create<F>(&self, key: &str, build: F) -> Arc<DataLoader<ActionLoader>>
    where
        F: FnOnce() -> DataLoader<ActionLoader>,
    {
        let mut loaders = self.inner.lock().await;
        if let Some(existing) = loaders.get(key) {
            return Arc::clone(existing);
        }
        trace!(key = %key, "creating request-scoped loader");
        let loader = Arc::new(build());
        loaders.insert(key.to_string(), Arc::clone(&loader));
        loader
    }

    /// Number of loaders created so far in this request.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Returns whether no loader has been created yet.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

impl std::fmt::Debug for LoaderMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderMap").finish_non_exhaustive()
    }
}

/// Constructs a [`DataLoader`] around `loader`, applying per-action options
/// over the gateway-wide defaults.
#[must_use]
pub fn build_data_loader(
    loader: ActionLoader,
    options: Option<LoaderOptions>,
    defaults: LoaderOptions,
) -> DataLoader<ActionLoader> {
    let mut data_loader = DataLoader::new(loader, tokio::spawn);

    let max_batch_size = options
        .and_then(|o| o.max_batch_size)
        .or(defaults.max_batch_size);
    if let Some(max) = max_batch_size {
        data_loader = data_loader.max_batch_size(max);
    }

    let delay_ms = options.and_then(|o| o.delay_ms).or(defaults.delay_ms);
    if let Some(delay) = delay_ms {
        data_loader = data_loader.delay(Duration::from_millis(delay));
    }

    data_loader
}
