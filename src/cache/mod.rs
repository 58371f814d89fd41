mod lru;
mod two_tier;

pub use lru::LruCache;
pub use two_tier::{Tier, TwoTierCache, DEFAULT_PRELOAD_CAPACITY, DEFAULT_RAM_CAPACITY};
