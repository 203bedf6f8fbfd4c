/*
 * Copyright 2021 Actyx AG
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */
//! The `space -> MemorySpaceCache` map (spec §5). Entries address caches by
//! space number rather than by pointer (design notes §9), so every accessor
//! and the orchestrator go through this registry to find the right cache.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::{
    cache::{CacheConfig, MemorySpaceCache},
    space::MemorySpace,
    transport::Transport,
};

pub struct CacheRegistry {
    node: String,
    transport: Arc<dyn Transport>,
    config: CacheConfig,
    caches: Mutex<HashMap<MemorySpace, Arc<MemorySpaceCache>>>,
}

impl CacheRegistry {
    pub fn new(node: impl Into<String>, transport: Arc<dyn Transport>, config: CacheConfig) -> Self {
        Self {
            node: node.into(),
            transport,
            config,
            caches: Mutex::new(HashMap::new()),
        }
    }

    /// Atomic lookup-or-create of the cache for `space` (spec §5: "lookup is
    /// atomic and creates on first use").
    pub fn get_or_create(&self, space: MemorySpace) -> Arc<MemorySpaceCache> {
        let mut caches = self.caches.lock().unwrap();
        caches
            .entry(space)
            .or_insert_with(|| Arc::new(MemorySpaceCache::new(self.node.clone(), space, self.transport.clone(), self.config)))
            .clone()
    }

    /// All caches created so far, in unspecified order — used by the
    /// orchestrator to drive `fill_cache` across every registered space.
    pub fn all(&self) -> Vec<Arc<MemorySpaceCache>> {
        self.caches.lock().unwrap().values().cloned().collect()
    }
}
