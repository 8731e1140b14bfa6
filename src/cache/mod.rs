//! Asset cache for the exam page's static files.
//!
//! Install fetches a fixed manifest in full and commits it atomically;
//! reads go network-first with the cache as the offline fallback. The
//! cache is populated only at install time, serving never writes to it.

mod client;
mod layer;
mod storage;
mod traits;

pub use client::AssetClient;
pub use layer::AssetCache;
pub use storage::{AssetStorage, SqliteAssets};
pub use traits::{CachedAsset, FetchedAsset, InstallState, ServeSource, ServedAsset};
