// Cache module for repository detail data.
// Per-field freshness policy plus a memory + disk store keyed by host/owner/repository.

pub mod detail;
pub mod paths;
pub mod policy;
pub mod store;

pub use detail::{CacheKey, Cached, RepoDetailCache};
pub use paths::{default_cache_dir, default_config_path, detail_cache_path};
pub use policy::{CacheTtls, DetailCacheState, DetailField, FieldFreshness, freshness};
pub use store::DetailCacheStore;
