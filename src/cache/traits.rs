//! Core types for the asset cache.

use chrono::{DateTime, Utc};

/// An asset as fetched from the origin server.
///
/// A value of this type means the transport succeeded; the HTTP status is
/// carried so install can reject non-success responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedAsset {
  pub status: u16,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
}

impl FetchedAsset {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// An asset as stored by the installer.
#[derive(Debug, Clone)]
pub struct CachedAsset {
  pub path: String,
  pub content_type: Option<String>,
  /// Hex-encoded SHA-256 of `body`, computed at install time.
  pub checksum: String,
  pub body: Vec<u8>,
  pub cached_at: DateTime<Utc>,
}

/// Lifecycle of the asset cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
  /// No assets stored for this cache name.
  Uninstalled,
  /// An install is in flight; nothing is committed yet.
  Installing,
  /// The manifest was stored in full.
  Installed,
}

/// Where a served asset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeSource {
  /// Live response from the network.
  Network,
  /// Network unreachable, served from the cache.
  Cache,
}

/// Result of a network-first asset lookup.
#[derive(Debug, Clone)]
pub struct ServedAsset {
  pub body: Vec<u8>,
  pub content_type: Option<String>,
  pub source: ServeSource,
}
