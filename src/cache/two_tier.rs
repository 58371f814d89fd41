//! Two-Tier Preview Cache (C2): composes a RAM and a Preload LRU with
//! RAM-first lookup fallthrough and no cross-tier promotion.

use crate::preview::PreviewImage;

use super::lru::LruCache;

pub const DEFAULT_RAM_CAPACITY: usize = 64;
pub const DEFAULT_PRELOAD_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Ram,
    Preload,
}

pub struct TwoTierCache {
    ram: LruCache<String, PreviewImage>,
    preload: LruCache<String, PreviewImage>,
}

impl TwoTierCache {
    pub fn new(ram_capacity: usize, preload_capacity: usize) -> Self {
        Self {
            ram: LruCache::new(ram_capacity),
            preload: LruCache::new(preload_capacity),
        }
    }

    /// Write `image` to the specified tier only.
    pub fn put(&mut self, image: PreviewImage, tier: Tier) {
        let key = image.cache_key.clone();
        match tier {
            Tier::Ram => self.ram.store(key, image),
            Tier::Preload => self.preload.store(key, image),
        }
    }

    /// RAM first, then Preload on miss. No cross-tier promotion: a
    /// Preload hit stays in Preload.
    pub fn get(&mut self, key: &str) -> Option<&PreviewImage> {
        if self.ram.contains(&key.to_string()) {
            return self.ram.get(&key.to_string());
        }
        self.preload.get(&key.to_string())
    }

    pub fn ram_size(&self) -> usize {
        self.ram.size()
    }

    pub fn preload_size(&self) -> usize {
        self.preload.size()
    }
}
