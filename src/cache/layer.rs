//! Cache layer that orchestrates manifest installs and network-first serving.

use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::storage::AssetStorage;
use super::traits::{FetchedAsset, InstallState, ServeSource, ServedAsset};

/// Asset cache over an explicit storage capability.
///
/// Install pre-populates the named cache from a fixed manifest; serve
/// prefers a live network response and falls back to the cache only when
/// the network fails. Serving never writes back to the cache.
pub struct AssetCache<S: AssetStorage> {
  storage: Arc<S>,
  cache_name: String,
  installing: AtomicBool,
}

impl<S: AssetStorage> AssetCache<S> {
  pub fn new(storage: S, cache_name: impl Into<String>) -> Self {
    Self {
      storage: Arc::new(storage),
      cache_name: cache_name.into(),
      installing: AtomicBool::new(false),
    }
  }

  /// Install the manifest into the cache, all or nothing.
  ///
  /// Every path is fetched before anything is written; a transport error or
  /// a non-success status for any single path aborts the install and leaves
  /// the cache unchanged. Returns the number of assets stored.
  pub async fn install<F, Fut>(&self, manifest: &[String], fetch: F) -> Result<usize>
  where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<FetchedAsset>>,
  {
    self.installing.store(true, Ordering::SeqCst);
    let result = self.install_inner(manifest, fetch).await;
    self.installing.store(false, Ordering::SeqCst);
    result
  }

  async fn install_inner<F, Fut>(&self, manifest: &[String], fetch: F) -> Result<usize>
  where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<FetchedAsset>>,
  {
    let fetches = manifest.iter().map(|path| {
      let fut = fetch(path.clone());
      async move { (path, fut.await) }
    });

    let mut entries = Vec::with_capacity(manifest.len());
    for (path, result) in futures::future::join_all(fetches).await {
      let fetched =
        result.map_err(|e| eyre!("Install aborted, failed to fetch {}: {}", path, e))?;

      if !fetched.is_success() {
        return Err(eyre!(
          "Install aborted, {} returned status {}",
          path,
          fetched.status
        ));
      }

      entries.push((path.clone(), fetched));
    }

    self.storage.replace_all(&self.cache_name, &entries)?;
    info!(
      cache = %self.cache_name,
      assets = entries.len(),
      "asset cache installed"
    );

    Ok(entries.len())
  }

  /// Serve an asset network-first.
  ///
  /// A live response of any status wins; the cached copy is consulted only
  /// when the network itself fails. With neither available the network
  /// error surfaces to the caller.
  pub async fn serve<F, Fut>(&self, path: &str, fetch: F) -> Result<ServedAsset>
  where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<FetchedAsset>>,
  {
    match fetch(path.to_string()).await {
      Ok(fetched) => Ok(ServedAsset {
        body: fetched.body,
        content_type: fetched.content_type,
        source: ServeSource::Network,
      }),
      Err(net_err) => {
        debug!(path, "network fetch failed, trying cache");
        match self.storage.get(&self.cache_name, path)? {
          Some(cached) => Ok(ServedAsset {
            body: cached.body,
            content_type: cached.content_type,
            source: ServeSource::Cache,
          }),
          None => Err(net_err.wrap_err(format!("no cached copy of {}", path))),
        }
      }
    }
  }

  /// Current lifecycle state of the cache.
  pub fn state(&self) -> Result<InstallState> {
    if self.installing.load(Ordering::SeqCst) {
      return Ok(InstallState::Installing);
    }

    if self.storage.entry_count(&self.cache_name)? > 0 {
      Ok(InstallState::Installed)
    } else {
      Ok(InstallState::Uninstalled)
    }
  }

  /// Paths currently stored in the cache.
  pub fn cached_paths(&self) -> Result<Vec<String>> {
    self.storage.paths(&self.cache_name)
  }
}

impl<S: AssetStorage> Clone for AssetCache<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      cache_name: self.cache_name.clone(),
      installing: AtomicBool::new(false),
    }
  }
}
