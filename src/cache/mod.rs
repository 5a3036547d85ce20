//! Response cache for built pages.
//!
//! Entries are keyed by request path and carry the content hash of the data
//! they were rendered from, so re-adding unchanged content keeps its original
//! generation date. Controlled by the `[cache]` section of `frugal.toml`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! response_limit = 1000
//! snapshot_path = "target/frugal-cache.json"
//! ```

mod config;
mod entry;
mod error;
mod lock;
mod snapshot;
mod store;

pub use config::CacheConfig;
pub use entry::{CachedResponse, GENERATION_DATE_HEADER, MAX_AGE_HEADER};
pub use error::CacheError;
pub use snapshot::{SNAPSHOT_VERSION, SerializedResponse, Snapshot};
pub use store::ResponseCache;
